//! Export — moving the built workspace to its destination.
//!
//! The export object of a profile stays opaque until it reaches the
//! [`Exporter`]; the core never interprets it. [`LocalExporter`]
//! understands two targets:
//!
//! - `"local"` (the default): `<project root>/build/<project name>`
//! - `"exact"`: a required `path`, resolved against the project root
//!
//! Resource and behavior trees are replaced wholesale. The data tree is
//! written back to the project's own data source, file by file and only
//! when contents actually differ, so a watcher observing the data path
//! settles instead of re-triggering forever.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use packmill_core::RunContext;
use packmill_sync::{copy_if_changed, mirror_full, relative_files, SyncError};

use crate::workspace::subtree;

/// All errors an export can fail with.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown export target: {value}")]
    UnknownTarget { value: String },

    #[error("missing required key at {location}")]
    MissingKey { location: String },

    #[error("wrong type at {location}, expected {expected}")]
    WrongType {
        location: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.into(),
        source,
    }
}

/// Destination seam for a built workspace.
pub trait Exporter {
    fn export(&self, ctx: &RunContext, export: &Map<String, Value>) -> Result<(), ExportError>;
}

/// Exports onto the local filesystem.
#[derive(Debug, Default)]
pub struct LocalExporter;

impl LocalExporter {
    fn output_root(ctx: &RunContext, export: &Map<String, Value>) -> Result<PathBuf, ExportError> {
        let target = match export.get("target") {
            None => "local",
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(ExportError::WrongType {
                    location: "export->target".to_string(),
                    expected: "string",
                })
            }
        };
        match target {
            "local" => Ok(ctx
                .project
                .root
                .join("build")
                .join(&ctx.project.name)),
            "exact" => match export.get("path") {
                Some(Value::String(path)) => Ok(ctx.project.root.join(path)),
                Some(_) => Err(ExportError::WrongType {
                    location: "export->path".to_string(),
                    expected: "string",
                }),
                None => Err(ExportError::MissingKey {
                    location: "export->path".to_string(),
                }),
            },
            other => Err(ExportError::UnknownTarget {
                value: other.to_string(),
            }),
        }
    }
}

impl Exporter for LocalExporter {
    fn export(&self, ctx: &RunContext, export: &Map<String, Value>) -> Result<(), ExportError> {
        let out = Self::output_root(ctx, export)?;
        let tmp = ctx.tmp_path();
        log::info!("exporting to {}", out.display());

        mirror_full(
            Some(&subtree(&tmp, "resources")),
            &out.join("resources"),
            "resources",
        )?;
        mirror_full(
            Some(&subtree(&tmp, "behaviors")),
            &out.join("behaviors"),
            "behaviors",
        )?;

        if let Some(data_path) = &ctx.project.data_path {
            write_back_data(&subtree(&tmp, "data"), data_path)?;
        }
        Ok(())
    }
}

/// Mirror the workspace data tree back onto the project's data source.
/// Unchanged files are left alone so their modification times (and any
/// watcher looking at them) stay quiet.
fn write_back_data(workspace_data: &Path, data_path: &Path) -> Result<(), ExportError> {
    if !workspace_data.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(data_path).map_err(|e| io_err(data_path, e))?;

    let mut keep: HashSet<PathBuf> = HashSet::new();
    for rel in relative_files(workspace_data)? {
        copy_if_changed(&workspace_data.join(&rel), &data_path.join(&rel))?;
        keep.insert(rel);
    }
    for rel in relative_files(data_path)? {
        if keep.contains(&rel) {
            continue;
        }
        let stale = data_path.join(&rel);
        std::fs::remove_file(&stale).map_err(|e| io_err(&stale, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use packmill_core::{NeverInterrupted, Project};
    use serde_json::json;
    use tempfile::TempDir;

    fn project(root: &Path) -> Project {
        Project::from_value(
            root,
            &json!({
                "name": "demo",
                "dataPath": "packs/data",
                "profiles": { "default": { "filters": [], "export": {} } }
            }),
        )
        .expect("project")
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn local_target_exports_under_build_dir() {
        let root = TempDir::new().unwrap();
        let project = project(root.path());
        let dot = root.path().join(".packmill");
        write(&dot.join("tmp/resources/tex.png"), "png");
        write(&dot.join("tmp/behaviors/ai.json"), "{}");

        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let export = json!({ "target": "local" });
        LocalExporter
            .export(&ctx, export.as_object().unwrap())
            .unwrap();

        let out = root.path().join("build/demo");
        assert!(out.join("resources/tex.png").exists());
        assert!(out.join("behaviors/ai.json").exists());
    }

    #[test]
    fn exact_target_requires_a_path() {
        let root = TempDir::new().unwrap();
        let project = project(root.path());
        let dot = root.path().join(".packmill");
        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);

        let export = json!({ "target": "exact" });
        let err = LocalExporter
            .export(&ctx, export.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, ExportError::MissingKey { location } if location == "export->path"));
    }

    #[test]
    fn unknown_target_rejected() {
        let root = TempDir::new().unwrap();
        let project = project(root.path());
        let dot = root.path().join(".packmill");
        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);

        let export = json!({ "target": "ftp" });
        let err = LocalExporter
            .export(&ctx, export.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, ExportError::UnknownTarget { value } if value == "ftp"));
    }

    #[test]
    fn data_write_back_leaves_unchanged_files_alone() {
        let root = TempDir::new().unwrap();
        let project = project(root.path());
        let dot = root.path().join(".packmill");
        write(&dot.join("tmp/data/state.json"), "same");
        write(&root.path().join("packs/data/state.json"), "same");
        write(&root.path().join("packs/data/stale.json"), "old");

        let pinned = FileTime::from_unix_time(1_000_000, 0);
        set_file_mtime(root.path().join("packs/data/state.json"), pinned).unwrap();

        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let export = json!({});
        LocalExporter
            .export(&ctx, export.as_object().unwrap())
            .unwrap();

        let after = FileTime::from_last_modification_time(
            &std::fs::metadata(root.path().join("packs/data/state.json")).unwrap(),
        );
        assert_eq!(after, pinned, "identical data file must not be rewritten");
        assert!(
            !root.path().join("packs/data/stale.json").exists(),
            "files absent from the workspace are removed"
        );
    }
}
