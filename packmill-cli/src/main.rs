//! packmill — incremental build orchestrator for content packs.
//!
//! # Usage
//!
//! ```text
//! packmill init [path]
//! packmill install
//! packmill run [--profile <name>]
//! packmill watch [--profile <name>]
//! ```

mod commands;
mod watcher;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, install::InstallArgs, run::RunArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "packmill",
    version,
    about = "Build, filter and export game content packs",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold a new pack project.
    Init(InitArgs),

    /// Install every remote filter package the profiles reference.
    Install(InstallArgs),

    /// Run a profile once, from a clean workspace.
    Run(RunArgs),

    /// Watch the pack sources and rerun the profile on every change.
    Watch(WatchArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Install(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}
