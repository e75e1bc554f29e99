//! `packmill init [path]` — scaffold a new pack project.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;

/// Scaffold `config.json`, the pack source directories and a
/// `.gitignore` for the build outputs.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to scaffold into (created if missing). Defaults to the
    /// current directory.
    pub path: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let root = self.path.unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("cannot create '{}'", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", root.display()))?;

        let config_path = root.join("config.json");
        if config_path.exists() {
            bail!("config.json already exists at '{}'", config_path.display());
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pack".to_string());

        for dir in ["packs/resources", "packs/behaviors", "packs/data"] {
            std::fs::create_dir_all(root.join(dir))
                .with_context(|| format!("cannot create '{dir}'"))?;
        }

        let config = json!({
            "name": name,
            "resourcePath": "packs/resources",
            "behaviorPath": "packs/behaviors",
            "dataPath": "packs/data",
            "filterDefinitions": {},
            "profiles": {
                "default": { "filters": [], "export": { "target": "local" } }
            }
        });
        std::fs::write(
            &config_path,
            format!("{}\n", serde_json::to_string_pretty(&config)?),
        )
        .with_context(|| format!("cannot write '{}'", config_path.display()))?;

        let gitignore = root.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, ".packmill/\nbuild/\n")
                .with_context(|| format!("cannot write '{}'", gitignore.display()))?;
        }

        println!("{} Scaffolded pack project '{}'", "✓".green(), name);
        println!("  config.json, packs/{{resources,behaviors,data}}, .gitignore");
        Ok(())
    }
}
