//! `packmill install` — fetch every referenced remote filter package.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use packmill_installer::{gather_dependencies, GitFetcher, Installer};

/// Install all remote filter packages referenced by any profile.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Project root. Defaults to the current directory.
    #[arg(long)]
    pub path: Option<PathBuf>,
}

impl InstallArgs {
    pub fn run(self) -> Result<()> {
        let root = super::resolve_root(self.path.as_deref())?;
        let project = super::load_project(&root)?;
        let dot = super::dot_path(&root);

        let deps = gather_dependencies(&project);
        if deps.is_empty() {
            println!("No remote filters referenced; nothing to install.");
            return Ok(());
        }

        let fetcher = GitFetcher;
        let installer = Installer::new(&dot, &fetcher);
        let report = installer
            .install_all(&deps)
            .context("dependency installation failed")?;

        println!(
            "{} Installed {} package(s), {} already present",
            "✓".green(),
            report.fetched,
            report.skipped
        );
        Ok(())
    }
}
