//! The profile run state machine.
//!
//! One run is a loop over three stages:
//!
//! ```text
//! Sync ──resolve/check──▶ Run ──not interrupted──▶ Export ──quiet──▶ done
//!  ▲                       │                          │
//!  └──────interrupted──────┴───────data changed───────┘
//! ```
//!
//! Sync brings the workspace up to date, Run executes the filter
//! pipeline, Export publishes the result. An interruption observed
//! before or during the filter pass abandons it and loops back to Sync;
//! a data-path change observed after Export (the export itself writes
//! data back) loops back as well. Every failure wipes the fingerprint
//! cache before surfacing so the next run starts from a full sync.

use packmill_core::{Profile, RunContext};
use packmill_sync::HashCacheStore;

use crate::error::RunError;
use crate::export::Exporter;
use crate::workspace::{persist_workspace_state, setup_full, setup_recycled};

/// Observable shape of one [`run_profile`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Sync stages entered (1 for an uninterrupted run).
    pub cycles: usize,
    /// Filter pipeline passes that actually started.
    pub filter_passes: usize,
    /// Completed exports.
    pub exports: usize,
}

enum Stage {
    Sync,
    Run(Profile),
    Export(Profile),
}

/// Run the context's profile to completion.
///
/// `recycled` selects the hash-gated incremental workspace setup (watch
/// mode); otherwise the cached states are discarded up front and the
/// workspace is rebuilt from scratch, so the two modes never trust each
/// other's fingerprints.
pub fn run_profile(
    ctx: &RunContext,
    store: &mut HashCacheStore,
    exporter: &dyn Exporter,
    recycled: bool,
) -> Result<RunReport, RunError> {
    if !recycled {
        store.clear_cached_states()?;
    }

    let mut report = RunReport::default();
    let mut stage = Stage::Sync;
    loop {
        stage = match stage {
            Stage::Sync => {
                report.cycles += 1;
                let setup = if recycled {
                    setup_recycled(store, ctx.project, &ctx.tmp_path()).map(|stats| {
                        log::debug!(
                            "workspace synced: {} copied, {} skipped, {} removed",
                            stats.copied,
                            stats.skipped,
                            stats.removed
                        );
                    })
                } else {
                    setup_full(ctx.project, &ctx.tmp_path())
                };
                let profile = setup
                    .and_then(|()| ctx.profile().map_err(RunError::from))
                    .and_then(|profile| {
                        profile.filters.check(ctx)?;
                        Ok(profile)
                    });
                match profile {
                    Ok(profile) => Stage::Run(profile),
                    Err(e) => return fail(store, e),
                }
            }

            Stage::Run(profile) => {
                if ctx.is_interrupted() {
                    log::info!("change detected, restarting sync");
                    persist(ctx, store, recycled)?;
                    Stage::Sync
                } else {
                    report.filter_passes += 1;
                    match profile.filters.run(ctx) {
                        Ok(true) => {
                            log::info!("filter pass interrupted, restarting sync");
                            persist(ctx, store, recycled)?;
                            Stage::Sync
                        }
                        Ok(false) => Stage::Export(profile),
                        Err(e) => return fail(store, e.into()),
                    }
                }
            }

            Stage::Export(profile) => {
                if let Err(e) = exporter.export(ctx, &profile.export) {
                    return fail(store, e.into());
                }
                report.exports += 1;
                persist(ctx, store, recycled)?;
                // The export writes the data tree back; consume the
                // resulting self-triggered event and loop once more.
                if ctx.is_interrupted_from("data") {
                    log::info!("data changed during export, restarting sync");
                    Stage::Sync
                } else {
                    break;
                }
            }
        };
    }
    Ok(report)
}

/// Persist the workspace fingerprint state at an interruption boundary.
/// A persistence failure is fatal: the cache is wiped so the next run
/// never trusts half-written state.
fn persist(
    ctx: &RunContext,
    store: &mut HashCacheStore,
    recycled: bool,
) -> Result<(), RunError> {
    if !recycled {
        return Ok(());
    }
    match persist_workspace_state(store, &ctx.tmp_path()) {
        Ok(()) => Ok(()),
        Err(source) => fail(store, RunError::CacheSave { source }),
    }
}

/// Wipe the fingerprint cache (best effort) before surfacing an error.
fn fail<T>(store: &mut HashCacheStore, err: RunError) -> Result<T, RunError> {
    if let Err(e) = store.clear_cached_states() {
        log::warn!("failed to clear cached states after run error: {e}");
    }
    Err(err)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::LocalExporter;
    use packmill_core::{InterruptionSignal, NeverInterrupted, Project, RunContext};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays a fixed answer sequence; exhausted means quiet.
    struct ScriptedSignal {
        answers: Mutex<VecDeque<bool>>,
    }

    impl ScriptedSignal {
        fn new(answers: &[bool]) -> Self {
            ScriptedSignal {
                answers: Mutex::new(answers.iter().copied().collect()),
            }
        }
    }

    impl InterruptionSignal for ScriptedSignal {
        fn is_interrupted(&self, _only: Option<&str>) -> bool {
            self.answers.lock().unwrap().pop_front().unwrap_or(false)
        }
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn project(root: &Path, config: serde_json::Value) -> Project {
        write(&root.join("packs/resources/tex.png"), "png");
        Project::from_value(root, &config).expect("project")
    }

    fn empty_profile_config() -> serde_json::Value {
        json!({
            "name": "demo",
            "resourcePath": "packs/resources",
            "profiles": {
                "default": { "filters": [], "export": { "target": "local" } }
            }
        })
    }

    #[test]
    fn uninterrupted_run_is_one_cycle_one_export() {
        let root = TempDir::new().unwrap();
        let project = project(root.path(), empty_profile_config());
        let dot = root.path().join(".packmill");

        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let mut store = HashCacheStore::new(&dot);
        let report = run_profile(&ctx, &mut store, &LocalExporter, false).unwrap();

        assert_eq!(
            report,
            RunReport {
                cycles: 1,
                filter_passes: 1,
                exports: 1
            }
        );
        assert!(root.path().join("build/demo/resources/tex.png").exists());
    }

    #[test]
    fn interruptions_loop_back_before_the_filter_pass() {
        let root = TempDir::new().unwrap();
        let project = project(root.path(), empty_profile_config());
        let dot = root.path().join(".packmill");

        // Two pending changes, then quiet: three sync cycles but only
        // one filter pass and one export.
        let signal = ScriptedSignal::new(&[true, true, false]);
        let ctx = RunContext::new(&project, "default", &dot, &signal);
        let mut store = HashCacheStore::new(&dot);
        let report = run_profile(&ctx, &mut store, &LocalExporter, true).unwrap();

        assert_eq!(
            report,
            RunReport {
                cycles: 3,
                filter_passes: 1,
                exports: 1
            }
        );
    }

    #[test]
    fn data_change_after_export_loops_once_more() {
        let root = TempDir::new().unwrap();
        let project = project(root.path(), empty_profile_config());
        let dot = root.path().join(".packmill");

        // Quiet before the pass, one data event after the export.
        let signal = ScriptedSignal::new(&[false, true, false, false]);
        let ctx = RunContext::new(&project, "default", &dot, &signal);
        let mut store = HashCacheStore::new(&dot);
        let report = run_profile(&ctx, &mut store, &LocalExporter, true).unwrap();

        assert_eq!(report.cycles, 2);
        assert_eq!(report.exports, 2);
    }

    #[test]
    fn unknown_profile_fails_and_clears_cached_states() {
        let root = TempDir::new().unwrap();
        let project = project(root.path(), empty_profile_config());
        let dot = root.path().join(".packmill");

        let mut store = HashCacheStore::new(&dot);
        store.save_state(&root.path().join("packs/resources")).unwrap();
        assert!(store.states_dir().exists());

        let ctx = RunContext::new(&project, "nope", &dot, &NeverInterrupted);
        let err = run_profile(&ctx, &mut store, &LocalExporter, true).unwrap_err();
        assert!(matches!(err, RunError::Filter(_)));
        assert!(
            !store.states_dir().exists(),
            "failure must leave no trusted fingerprint state behind"
        );
    }

    #[test]
    fn missing_filter_script_fails_the_check_stage() {
        let root = TempDir::new().unwrap();
        let project = project(
            root.path(),
            json!({
                "name": "demo",
                "resourcePath": "packs/resources",
                "profiles": {
                    "default": {
                        "filters": [ { "runWith": "shell", "script": "missing.sh" } ],
                        "export": { "target": "local" }
                    }
                }
            }),
        );
        let dot = root.path().join(".packmill");
        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let mut store = HashCacheStore::new(&dot);

        let err = run_profile(&ctx, &mut store, &LocalExporter, false).unwrap_err();
        assert!(matches!(
            err,
            RunError::Filter(packmill_core::FilterError::ScriptNotFound { .. })
        ));
    }

    #[test]
    fn disabled_filter_is_not_checked_or_run() {
        let root = TempDir::new().unwrap();
        let project = project(
            root.path(),
            json!({
                "name": "demo",
                "resourcePath": "packs/resources",
                "profiles": {
                    "default": {
                        "filters": [
                            { "runWith": "shell", "script": "missing.sh", "disabled": true }
                        ],
                        "export": { "target": "local" }
                    }
                }
            }),
        );
        let dot = root.path().join(".packmill");
        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let mut store = HashCacheStore::new(&dot);

        let report = run_profile(&ctx, &mut store, &LocalExporter, false).unwrap();
        assert_eq!(report.exports, 1);
    }

    #[cfg(unix)]
    #[test]
    fn shell_filter_output_lands_in_the_export() {
        let root = TempDir::new().unwrap();
        let project = project(
            root.path(),
            json!({
                "name": "demo",
                "resourcePath": "packs/resources",
                "profiles": {
                    "default": {
                        "filters": [ { "runWith": "shell", "script": "gen.sh" } ],
                        "export": { "target": "local" }
                    }
                }
            }),
        );
        // The filter runs with the workspace tmp root as its cwd.
        write(
            &root.path().join("gen.sh"),
            "echo generated > resources/generated.txt\n",
        );

        let dot = root.path().join(".packmill");
        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let mut store = HashCacheStore::new(&dot);
        run_profile(&ctx, &mut store, &LocalExporter, false).unwrap();

        assert!(root
            .path()
            .join("build/demo/resources/generated.txt")
            .exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_filter_clears_cached_states() {
        let root = TempDir::new().unwrap();
        let project = project(
            root.path(),
            json!({
                "name": "demo",
                "resourcePath": "packs/resources",
                "profiles": {
                    "default": {
                        "filters": [ { "runWith": "shell", "script": "boom.sh" } ],
                        "export": { "target": "local" }
                    }
                }
            }),
        );
        write(&root.path().join("boom.sh"), "exit 3\n");

        let dot = root.path().join(".packmill");
        let ctx = RunContext::new(&project, "default", &dot, &NeverInterrupted);
        let mut store = HashCacheStore::new(&dot);

        let err = run_profile(&ctx, &mut store, &LocalExporter, true).unwrap_err();
        match err {
            RunError::Filter(packmill_core::FilterError::RunFailed { id, code }) => {
                assert_eq!(id, "boom.sh");
                assert_eq!(code, Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.states_dir().exists());
    }
}
