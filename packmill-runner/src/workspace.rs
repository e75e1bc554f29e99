//! Build workspace setup.
//!
//! The workspace is `<dot>/tmp` with one subtree per pack source:
//!
//! ```text
//! .packmill/tmp/
//!   resources/
//!   behaviors/
//!   data/
//! ```
//!
//! Full setup wipes the whole workspace and mirrors the sources in.
//! Recycled setup hash-diffs each subtree against its fingerprint state
//! so filters see an up-to-date workspace without a full copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use packmill_core::Project;
use packmill_sync::{mirror_full, recycled_sync, HashCacheStore, SyncError, SyncOptions, SyncStats};

use crate::error::RunError;

/// Source labels, in sync order. These double as the interruption-signal
/// labels the watcher tags its events with.
pub const SOURCE_LABELS: [&str; 3] = ["resources", "behaviors", "data"];

/// Workspace subtree for one source label.
pub fn subtree(tmp: &Path, label: &str) -> PathBuf {
    tmp.join(label)
}

fn source_for<'a>(project: &'a Project, label: &str) -> Option<&'a Path> {
    match label {
        "resources" => project.resource_path.as_deref(),
        "behaviors" => project.behavior_path.as_deref(),
        _ => project.data_path.as_deref(),
    }
}

/// Delete the workspace and rebuild every subtree as a plain mirror of
/// its source.
pub fn setup_full(project: &Project, tmp: &Path) -> Result<(), RunError> {
    match std::fs::remove_dir_all(tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SyncError::Io {
                path: tmp.to_path_buf(),
                source: e,
            }
            .into())
        }
    }
    for label in SOURCE_LABELS {
        mirror_full(source_for(project, label), &subtree(tmp, label), label)?;
    }
    Ok(())
}

/// Bring every subtree up to date against its source using hash-gated
/// copies. Source files are always rehashed; nothing is recorded during
/// the copy, persistence happens at the interruption boundary.
pub fn setup_recycled(
    store: &mut HashCacheStore,
    project: &Project,
    tmp: &Path,
) -> Result<SyncStats, RunError> {
    let opts = SyncOptions {
        reload_source_hashes: true,
        ..SyncOptions::default()
    };
    let mut total = SyncStats::default();
    for label in SOURCE_LABELS {
        let target = subtree(tmp, label);
        let stats = match source_for(project, label) {
            Some(source) => recycled_sync(store, source, &target, &opts)?,
            None => {
                mirror_full(None, &target, label)?;
                SyncStats::default()
            }
        };
        total.copied += stats.copied;
        total.skipped += stats.skipped;
        total.removed += stats.removed;
    }
    Ok(total)
}

/// Persist the fingerprint state of every workspace subtree.
pub fn persist_workspace_state(store: &mut HashCacheStore, tmp: &Path) -> Result<(), SyncError> {
    for label in SOURCE_LABELS {
        store.save_state(&subtree(tmp, label))?;
    }
    Ok(())
}
