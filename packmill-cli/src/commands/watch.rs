//! `packmill watch` — rerun the profile on every source change.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use packmill_core::RunContext;
use packmill_runner::{run_profile, LocalExporter};
use packmill_sync::HashCacheStore;

use crate::watcher::{self, WatchSignal};

/// Watch the pack sources and rebuild incrementally on change.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Profile to run.
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// Project root. Defaults to the current directory.
    #[arg(long)]
    pub path: Option<PathBuf>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let root = super::resolve_root(self.path.as_deref())?;
        let project = super::load_project(&root)?;
        let dot = super::dot_path(&root);

        let signal = Arc::new(WatchSignal::new());
        let _watcher = watcher::spawn_watcher(&project, Arc::clone(&signal))?;
        let mut store = HashCacheStore::new(&dot);

        println!(
            "{} Watching '{}' (profile '{}'), press Ctrl-C to stop",
            "▸".cyan(),
            project.name,
            self.profile
        );

        loop {
            let ctx = RunContext::new(&project, &self.profile, &dot, signal.as_ref());
            // A run failure must not stop the watch; report it and wait
            // for the next change.
            match run_profile(&ctx, &mut store, &LocalExporter, true) {
                Ok(report) => println!(
                    "{} Built profile '{}' ({} sync cycle(s), {} export(s))",
                    "✓".green(),
                    self.profile,
                    report.cycles,
                    report.exports
                ),
                Err(e) => eprintln!("{} {e}", "✗".red()),
            }
            signal.wait_for_change();
        }
    }
}
