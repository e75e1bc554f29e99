//! Filter runners — one executable pipeline step each.
//!
//! A filter is local (a script run by an interpreter), remote (a fetched
//! package whose manifest expands into sub-filters), or a nested profile.
//! The variants share the capability set the runner relies on: identity,
//! disabled flag, static `check`, interruptible `run`, and argument
//! inheritance for expanded sub-filters.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::context::RunContext;
use crate::error::{ConfigError, FilterError};
use crate::resolver::resolve_subfilters;

/// Canonical package repository used to expand bare filter names.
pub const FILTER_LIBRARY_URL: &str = "github.com/packmill/filter-library";

/// Map a bare filter name onto the standard-library locator.
pub fn filter_name_to_locator(name: &str) -> String {
    format!("{FILTER_LIBRARY_URL}//{name}")
}

// ---------------------------------------------------------------------------
// RunWith
// ---------------------------------------------------------------------------

/// Interpreter used to execute a local filter script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunWith {
    Python,
    Node,
    Shell,
}

impl RunWith {
    pub fn parse(value: &str, location: &str) -> Result<Self, ConfigError> {
        match value {
            "python" => Ok(RunWith::Python),
            "node" | "nodejs" => Ok(RunWith::Node),
            "shell" => Ok(RunWith::Shell),
            other => Err(ConfigError::UnknownRunWith {
                location: location.to_string(),
                value: other.to_string(),
            }),
        }
    }

    pub fn interpreter(&self) -> &'static str {
        match self {
            RunWith::Python => "python3",
            RunWith::Node => "node",
            RunWith::Shell => "sh",
        }
    }
}

// ---------------------------------------------------------------------------
// FilterCollection
// ---------------------------------------------------------------------------

/// An ordered list of filters; insertion order is execution order.
#[derive(Debug, Default)]
pub struct FilterCollection(pub Vec<FilterRunner>);

impl FilterCollection {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilterRunner> {
        self.0.iter()
    }

    /// Static validation of every enabled filter, before any run.
    pub fn check(&self, ctx: &RunContext) -> Result<(), FilterError> {
        for filter in &self.0 {
            if filter.is_disabled() {
                continue;
            }
            filter.check(ctx)?;
        }
        Ok(())
    }

    /// Run the filters strictly in declared order. Returns `true` when a
    /// filter reported interruption; the remaining filters do not run.
    pub fn run(&self, ctx: &RunContext) -> Result<bool, FilterError> {
        for filter in &self.0 {
            if filter.is_disabled() {
                log::info!("filter '{}' is disabled, skipping", filter.id());
                continue;
            }
            // Nested profiles are anonymous; skip the noise for them.
            if !filter.id().is_empty() {
                log::info!("running filter {}", filter.id());
            }
            if filter.run(ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// FilterRunner
// ---------------------------------------------------------------------------

/// One runnable pipeline step.
#[derive(Debug)]
pub enum FilterRunner {
    Local(LocalFilter),
    Remote(RemoteFilter),
    Profile(ProfileFilter),
}

impl FilterRunner {
    /// Identifier; empty for anonymous nested-profile entries.
    pub fn id(&self) -> &str {
        match self {
            FilterRunner::Local(f) => &f.id,
            FilterRunner::Remote(f) => &f.id,
            FilterRunner::Profile(_) => "",
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            FilterRunner::Local(f) => f.disabled,
            FilterRunner::Remote(f) => f.disabled,
            FilterRunner::Profile(f) => f.disabled,
        }
    }

    pub fn check(&self, ctx: &RunContext) -> Result<(), FilterError> {
        match self {
            FilterRunner::Local(f) => f.check(),
            FilterRunner::Remote(f) => f.check(ctx),
            FilterRunner::Profile(f) => f.check(ctx),
        }
    }

    pub fn run(&self, ctx: &RunContext) -> Result<bool, FilterError> {
        match self {
            FilterRunner::Local(f) => f.run(ctx),
            FilterRunner::Remote(f) => f.run(ctx),
            FilterRunner::Profile(f) => f.run(ctx),
        }
    }

    /// Inherit the invocation arguments of the remote filter that
    /// expanded this runner as a sub-filter.
    pub fn copy_arguments_from(&mut self, source: &RemoteFilter) {
        match self {
            FilterRunner::Local(f) => f.arguments = source.arguments.clone(),
            FilterRunner::Remote(f) => f.arguments = source.arguments.clone(),
            FilterRunner::Profile(f) => f.arguments = source.arguments.clone(),
        }
    }

    pub(crate) fn set_id(&mut self, id: String) {
        match self {
            FilterRunner::Local(f) => f.id = id,
            FilterRunner::Remote(f) => f.id = id,
            // Nested profiles stay anonymous.
            FilterRunner::Profile(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// LocalFilter
// ---------------------------------------------------------------------------

/// A filter implemented by an interpreter + script invocation.
#[derive(Debug)]
pub struct LocalFilter {
    pub id: String,
    pub disabled: bool,
    pub run_with: RunWith,
    /// Script path, relative to `script_root`.
    pub script: PathBuf,
    /// Project root for profile-declared filters; the package install
    /// path for sub-filters expanded from a remote manifest.
    pub script_root: PathBuf,
    /// Declared JSON configuration, passed to the process as its first
    /// argument (JSON-encoded).
    pub settings: Option<Map<String, Value>>,
    /// Extra command-line arguments.
    pub arguments: Vec<String>,
}

impl LocalFilter {
    fn script_path(&self) -> PathBuf {
        self.script_root.join(&self.script)
    }

    pub fn check(&self) -> Result<(), FilterError> {
        let path = self.script_path();
        if !path.is_file() {
            return Err(FilterError::ScriptNotFound {
                id: self.id.clone(),
                path,
            });
        }
        Ok(())
    }

    /// Spawn the filter process and block on it. The workspace tmp root
    /// is the working directory; the invocation is synchronous regardless
    /// of what the filter does internally.
    pub fn run(&self, ctx: &RunContext) -> Result<bool, FilterError> {
        if ctx.is_interrupted() {
            return Ok(true);
        }
        let mut cmd = Command::new(self.run_with.interpreter());
        cmd.arg(self.script_path());
        if let Some(settings) = &self.settings {
            cmd.arg(Value::Object(settings.clone()).to_string());
        }
        cmd.args(&self.arguments);
        cmd.current_dir(ctx.tmp_path());
        cmd.env("PACKMILL_ROOT", &ctx.project.root);
        cmd.env("PACKMILL_FILTER_DIR", &self.script_root);

        let status = cmd.status().map_err(|e| FilterError::Spawn {
            id: self.id.clone(),
            source: e,
        })?;
        if !status.success() {
            return Err(FilterError::RunFailed {
                id: self.id.clone(),
                code: status.code(),
            });
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// RemoteFilter
// ---------------------------------------------------------------------------

/// A filter fetched from a package locator; running it expands the
/// package manifest into sub-filters and runs those.
#[derive(Debug)]
pub struct RemoteFilter {
    pub id: String,
    pub disabled: bool,
    /// Locator string — cache key and fetch source at once.
    pub locator: String,
    /// Invocation arguments, inherited verbatim by every expanded
    /// sub-filter. A remote filter never spawns a process of its own;
    /// version pinning and per-entry settings stay with the installer
    /// and the manifest entries respectively.
    pub arguments: Vec<String>,
    /// Resolved at most once per run.
    subfilters: OnceLock<FilterCollection>,
}

impl RemoteFilter {
    pub fn new(id: String, disabled: bool, locator: String, arguments: Vec<String>) -> Self {
        RemoteFilter {
            id,
            disabled,
            locator,
            arguments,
            subfilters: OnceLock::new(),
        }
    }

    /// Local cache location of the installed package, derived verbatim
    /// from the locator string.
    pub fn download_path(&self, dot_path: &Path) -> PathBuf {
        dot_path.join("cache").join(&self.locator)
    }

    fn subfilters(&self, ctx: &RunContext) -> Result<&FilterCollection, FilterError> {
        if let Some(children) = self.subfilters.get() {
            return Ok(children);
        }
        let children = resolve_subfilters(self, &self.download_path(ctx.dot_path))?;
        Ok(self.subfilters.get_or_init(|| children))
    }

    pub fn check(&self, ctx: &RunContext) -> Result<(), FilterError> {
        let manifest = self.download_path(ctx.dot_path).join("filter.json");
        if !manifest.is_file() {
            return Err(FilterError::NotInstalled {
                id: self.id.clone(),
                path: manifest,
            });
        }
        Ok(())
    }

    pub fn run(&self, ctx: &RunContext) -> Result<bool, FilterError> {
        if ctx.is_interrupted() {
            return Ok(true);
        }
        self.subfilters(ctx)?.run(ctx)
    }
}

// ---------------------------------------------------------------------------
// ProfileFilter
// ---------------------------------------------------------------------------

/// A nested profile run in place as a single (anonymous) pipeline step.
#[derive(Debug)]
pub struct ProfileFilter {
    pub profile: String,
    pub disabled: bool,
    pub arguments: Vec<String>,
}

impl ProfileFilter {
    pub fn check(&self, ctx: &RunContext) -> Result<(), FilterError> {
        if !ctx.project.profiles.contains_key(&self.profile) {
            return Err(FilterError::ProfileNotFound {
                name: self.profile.clone(),
            });
        }
        if ctx.in_ancestry(&self.profile) {
            return Err(FilterError::CircularProfile {
                name: self.profile.clone(),
            });
        }
        let nested = ctx.nested(&self.profile);
        nested.profile()?.filters.check(&nested)
    }

    pub fn run(&self, ctx: &RunContext) -> Result<bool, FilterError> {
        if ctx.is_interrupted() {
            return Ok(true);
        }
        let nested = ctx.nested(&self.profile);
        nested.profile()?.filters.run(&nested)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
