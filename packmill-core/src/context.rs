//! Run context and the interruption seam.
//!
//! Interruption is a level-triggered signal owned by a file-watching
//! collaborator outside this crate. The core only polls it at cycle
//! boundaries; it never preempts a running filter.

use std::path::{Path, PathBuf};

use crate::config::Project;
use crate::error::FilterError;
use crate::resolver::{resolve_profile, Profile};

/// Level-triggered external change signal, polled at run boundaries.
pub trait InterruptionSignal {
    /// Consume and report any pending change. With `only`, restrict the
    /// poll to a single source label (`"resources"`, `"behaviors"`,
    /// `"data"`) and leave other labels pending.
    fn is_interrupted(&self, only: Option<&str>) -> bool;
}

/// Signal used outside watch mode: never interrupted.
pub struct NeverInterrupted;

impl InterruptionSignal for NeverInterrupted {
    fn is_interrupted(&self, _only: Option<&str>) -> bool {
        false
    }
}

/// Ephemeral state threaded through one profile run. Nested-profile
/// filters derive a child context whose `parent` chains back, which is
/// what makes circular profile references detectable.
pub struct RunContext<'a> {
    pub project: &'a Project,
    pub profile_name: &'a str,
    /// `.packmill` directory of the project (workspace + caches).
    pub dot_path: &'a Path,
    pub signal: &'a dyn InterruptionSignal,
    pub parent: Option<&'a RunContext<'a>>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        project: &'a Project,
        profile_name: &'a str,
        dot_path: &'a Path,
        signal: &'a dyn InterruptionSignal,
    ) -> Self {
        RunContext {
            project,
            profile_name,
            dot_path,
            signal,
            parent: None,
        }
    }

    /// Scratch workspace root the filters read from and write to.
    pub fn tmp_path(&self) -> PathBuf {
        self.dot_path.join("tmp")
    }

    /// Resolve the active profile from the project configuration.
    pub fn profile(&self) -> Result<Profile, FilterError> {
        let raw = self.project.profiles.get(self.profile_name).ok_or_else(|| {
            FilterError::ProfileNotFound {
                name: self.profile_name.to_string(),
            }
        })?;
        resolve_profile(
            self.profile_name,
            raw,
            &self.project.filter_definitions,
            &self.project.root,
        )
    }

    /// Poll (and consume) the change signal for any source.
    pub fn is_interrupted(&self) -> bool {
        self.signal.is_interrupted(None)
    }

    /// Poll (and consume) the change signal for a single source label.
    pub fn is_interrupted_from(&self, label: &str) -> bool {
        self.signal.is_interrupted(Some(label))
    }

    /// Child context for a nested-profile filter.
    pub fn nested(&'a self, profile_name: &'a str) -> RunContext<'a> {
        RunContext {
            project: self.project,
            profile_name,
            dot_path: self.dot_path,
            signal: self.signal,
            parent: Some(self),
        }
    }

    /// Whether `name` is this profile or any ancestor on the nesting path.
    pub fn in_ancestry(&self, name: &str) -> bool {
        if self.profile_name == name {
            return true;
        }
        match self.parent {
            Some(parent) => parent.in_ancestry(name),
            None => false,
        }
    }
}
