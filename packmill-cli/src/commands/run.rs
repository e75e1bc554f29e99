//! `packmill run` — single pass over a profile, from a clean workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use packmill_core::{NeverInterrupted, RunContext};
use packmill_runner::{run_profile, LocalExporter};
use packmill_sync::HashCacheStore;

/// Build and export a profile once.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Profile to run.
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// Project root. Defaults to the current directory.
    #[arg(long)]
    pub path: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let root = super::resolve_root(self.path.as_deref())?;
        let project = super::load_project(&root)?;
        let dot = super::dot_path(&root);

        let ctx = RunContext::new(&project, &self.profile, &dot, &NeverInterrupted);
        let mut store = HashCacheStore::new(&dot);
        let report = run_profile(&ctx, &mut store, &LocalExporter, false)
            .with_context(|| format!("profile '{}' failed", self.profile))?;

        println!(
            "{} Built profile '{}' ({} export(s))",
            "✓".green(),
            self.profile,
            report.exports
        );
        Ok(())
    }
}
