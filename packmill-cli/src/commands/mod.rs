pub mod init;
pub mod install;
pub mod run;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use packmill_core::Project;

/// Resolve the project root for a command: the given path or the
/// current directory, canonicalized.
pub(crate) fn resolve_root(path: Option<&Path>) -> Result<PathBuf> {
    let root = path.unwrap_or(Path::new("."));
    root.canonicalize()
        .with_context(|| format!("cannot resolve path '{}'", root.display()))
}

pub(crate) fn load_project(root: &Path) -> Result<Project> {
    Project::load_at(root)
        .with_context(|| format!("failed to load project at '{}'", root.display()))
}

pub(crate) fn dot_path(root: &Path) -> PathBuf {
    root.join(".packmill")
}
