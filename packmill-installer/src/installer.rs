//! Remote filter package installation.
//!
//! [`gather_dependencies`] scans every profile of a project for remote
//! filter references and produces the flat locator list, exactly as
//! written. [`Installer`] materializes each locator into the package
//! cache at `<dot>/cache/<locator>`, skipping locators whose cache
//! directory already exists. Fetching goes through the
//! [`PackageFetcher`] seam; the default [`GitFetcher`] shallow-clones
//! the repository half of the locator and copies the package subpath
//! out of it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

use packmill_core::{filter_name_to_locator, FilterDefinition, Project};
use packmill_sync::copy_dir_recursive;

use crate::error::{io_err, InstallError};

// ---------------------------------------------------------------------------
// Dependency gathering
// ---------------------------------------------------------------------------

/// One remote package a project needs installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub locator: String,
    pub version: Option<String>,
}

/// Collect every remote filter reference across all profiles, in
/// profile and entry order, duplicates included. Entries that are not
/// remote references (inline scripts, profile nesting, local
/// definitions) are skipped, as are entries too malformed to classify;
/// shape faults are the run command's problem, not the installer's.
pub fn gather_dependencies(project: &Project) -> Vec<Dependency> {
    let mut out = Vec::new();
    for (profile_name, raw) in &project.profiles {
        let Some(entries) = raw.get("filters").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(obj) = entry.as_object() else {
                log::warn!(
                    "skipping malformed filter entry in profile {profile_name} while gathering dependencies"
                );
                continue;
            };
            let version = obj.get("version").and_then(Value::as_str).map(String::from);
            if let Some(url) = obj.get("url").and_then(Value::as_str) {
                out.push(Dependency {
                    locator: url.to_string(),
                    version,
                });
                continue;
            }
            if obj.contains_key("profile") || obj.contains_key("runWith") {
                continue;
            }
            if let Some(name) = obj.get("filter").and_then(Value::as_str) {
                if let Some(dep) = dependency_for_name(name, version, &project.filter_definitions)
                {
                    out.push(dep);
                }
            }
        }
    }
    out
}

fn dependency_for_name(
    name: &str,
    version: Option<String>,
    definitions: &BTreeMap<String, FilterDefinition>,
) -> Option<Dependency> {
    match definitions.get(name) {
        Some(FilterDefinition::Local(_)) => None,
        Some(FilterDefinition::Remote(def)) => Some(Dependency {
            locator: def.url.clone(),
            version: version.or_else(|| def.version.clone()),
        }),
        None => Some(Dependency {
            locator: filter_name_to_locator(name),
            version,
        }),
    }
}

/// Cache directory a locator installs into. The locator is used
/// verbatim as a relative path, which keeps the mapping between
/// reference and cache entry inspectable.
pub fn locator_cache_path(dot_path: &Path, locator: &str) -> PathBuf {
    dot_path.join("cache").join(locator)
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Retrieval seam for remote packages. Tests substitute an in-process
/// fake; production uses [`GitFetcher`].
pub trait PackageFetcher {
    /// Materialize the package behind `locator` (at `version`, when
    /// pinned) into `dest`. `dest` does not exist yet.
    fn fetch(
        &self,
        locator: &str,
        version: Option<&str>,
        dest: &Path,
    ) -> Result<(), InstallError>;
}

/// Fetches `host/org/repo//subpath` locators by shallow-cloning
/// `https://host/org/repo` and copying `subpath` out of the clone.
#[derive(Debug, Default)]
pub struct GitFetcher;

impl GitFetcher {
    fn split_locator(locator: &str) -> Result<(&str, &str), InstallError> {
        match locator.split_once("//") {
            Some((repo, subpath)) if !repo.is_empty() && !subpath.is_empty() => {
                Ok((repo, subpath))
            }
            _ => Err(InstallError::BadLocator {
                locator: locator.to_string(),
            }),
        }
    }
}

impl PackageFetcher for GitFetcher {
    fn fetch(
        &self,
        locator: &str,
        version: Option<&str>,
        dest: &Path,
    ) -> Result<(), InstallError> {
        let (repo, subpath) = Self::split_locator(locator)?;

        let staging = dest.with_extension("clone");
        match std::fs::remove_dir_all(&staging) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&staging, e)),
        }
        if let Some(parent) = staging.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let mut cmd = Command::new("git");
        cmd.arg("clone").arg("--depth").arg("1");
        if let Some(version) = version {
            cmd.arg("--branch").arg(version);
        }
        cmd.arg(format!("https://{repo}")).arg(&staging);
        log::debug!("cloning https://{repo} (version {version:?})");
        let output = cmd.output().map_err(|e| InstallError::Fetch {
            locator: locator.to_string(),
            detail: format!("failed to run git: {e}"),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallError::Fetch {
                locator: locator.to_string(),
                detail: format!("git clone exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let package_dir = staging.join(subpath);
        if !package_dir.is_dir() {
            std::fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
            return Err(InstallError::Fetch {
                locator: locator.to_string(),
                detail: format!("package subpath {subpath} not found in repository"),
            });
        }

        std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
        copy_dir_recursive(&package_dir, dest)?;
        std::fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Installer
// ---------------------------------------------------------------------------

/// What one [`Installer::install_all`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub fetched: usize,
    pub skipped: usize,
}

/// Installs remote packages into a project's package cache.
pub struct Installer<'a> {
    dot_path: PathBuf,
    fetcher: &'a dyn PackageFetcher,
}

impl<'a> Installer<'a> {
    pub fn new(dot_path: &Path, fetcher: &'a dyn PackageFetcher) -> Self {
        Installer {
            dot_path: dot_path.to_path_buf(),
            fetcher,
        }
    }

    /// Install every dependency in order. The first fetch failure
    /// aborts the pass; already-installed packages are left alone.
    pub fn install_all(&self, deps: &[Dependency]) -> Result<InstallReport, InstallError> {
        let cache_root = self.dot_path.join("cache");
        std::fs::create_dir_all(&cache_root).map_err(|e| io_err(&cache_root, e))?;

        let mut report = InstallReport::default();
        for dep in deps {
            if self.install_one(dep)? {
                report.fetched += 1;
            } else {
                report.skipped += 1;
            }
        }
        Ok(report)
    }

    /// Install a single dependency unless its cache directory already
    /// exists. Returns whether a fetch happened.
    pub fn install_one(&self, dep: &Dependency) -> Result<bool, InstallError> {
        let dest = locator_cache_path(&self.dot_path, &dep.locator);
        if dest.exists() {
            log::debug!("already installed: {}", dep.locator);
            return Ok(false);
        }
        log::info!("installing {}", dep.locator);
        self.fetcher.fetch(&dep.locator, dep.version.as_deref(), &dest)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Writes a marker file per fetch and records the locators seen.
    struct FakeFetcher {
        calls: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            FakeFetcher {
                calls: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(locator: &str) -> Self {
            FakeFetcher {
                calls: RefCell::new(Vec::new()),
                fail_on: Some(locator.to_string()),
            }
        }
    }

    impl PackageFetcher for FakeFetcher {
        fn fetch(
            &self,
            locator: &str,
            _version: Option<&str>,
            dest: &Path,
        ) -> Result<(), InstallError> {
            self.calls.borrow_mut().push(locator.to_string());
            if self.fail_on.as_deref() == Some(locator) {
                return Err(InstallError::Fetch {
                    locator: locator.to_string(),
                    detail: "simulated failure".to_string(),
                });
            }
            std::fs::create_dir_all(dest).unwrap();
            std::fs::write(dest.join("filter.json"), "{\"filters\":[]}").unwrap();
            Ok(())
        }
    }

    fn project(config: serde_json::Value) -> Project {
        Project::from_value(Path::new("/proj"), &config).expect("project")
    }

    fn dep(locator: &str) -> Dependency {
        Dependency {
            locator: locator.to_string(),
            version: None,
        }
    }

    #[test]
    fn gathers_remote_references_without_dedup() {
        let project = project(json!({
            "name": "demo",
            "filterDefinitions": {
                "local_one": { "runWith": "python", "script": "a.py" },
                "remote_one": { "url": "github.com/acme/filters//strip", "version": "2.0" }
            },
            "profiles": {
                "default": { "filters": [
                    { "filter": "remote_one" },
                    { "filter": "local_one" },
                    { "url": "github.com/acme/filters//pack" },
                    { "filter": "bare_name" },
                    { "runWith": "shell", "script": "x.sh" },
                    { "profile": "other" }
                ], "export": {} },
                "other": { "filters": [
                    { "filter": "remote_one" }
                ], "export": {} }
            }
        }));

        let deps = gather_dependencies(&project);
        let locators: Vec<&str> = deps.iter().map(|d| d.locator.as_str()).collect();
        assert_eq!(
            locators,
            vec![
                "github.com/acme/filters//strip",
                "github.com/acme/filters//pack",
                "github.com/packmill/filter-library//bare_name",
                "github.com/acme/filters//strip",
            ]
        );
        assert_eq!(deps[0].version.as_deref(), Some("2.0"));
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let project = project(json!({
            "name": "demo",
            "profiles": {
                "default": { "filters": [
                    42,
                    { "url": "github.com/acme/filters//ok" }
                ], "export": {} }
            }
        }));
        let deps = gather_dependencies(&project);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].locator, "github.com/acme/filters//ok");
    }

    #[test]
    fn install_is_idempotent() {
        let dot = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let installer = Installer::new(dot.path(), &fetcher);
        let deps = vec![dep("github.com/acme/filters//strip")];

        let first = installer.install_all(&deps).unwrap();
        assert_eq!(first.fetched, 1);
        let second = installer.install_all(&deps).unwrap();
        assert_eq!(second.fetched, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(fetcher.calls.borrow().len(), 1);
    }

    #[test]
    fn duplicate_locators_in_one_pass_fetch_once() {
        let dot = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let installer = Installer::new(dot.path(), &fetcher);
        let deps = vec![
            dep("github.com/acme/filters//strip"),
            dep("github.com/acme/filters//strip"),
        ];

        let report = installer.install_all(&deps).unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn first_fetch_failure_aborts_the_pass() {
        let dot = TempDir::new().unwrap();
        let fetcher = FakeFetcher::failing_on("github.com/acme/filters//bad");
        let installer = Installer::new(dot.path(), &fetcher);
        let deps = vec![
            dep("github.com/acme/filters//ok"),
            dep("github.com/acme/filters//bad"),
            dep("github.com/acme/filters//never"),
        ];

        let err = installer.install_all(&deps).unwrap_err();
        assert!(matches!(err, InstallError::Fetch { .. }));
        assert_eq!(
            *fetcher.calls.borrow(),
            vec![
                "github.com/acme/filters//ok".to_string(),
                "github.com/acme/filters//bad".to_string(),
            ]
        );
    }

    #[test]
    fn cache_path_uses_the_locator_verbatim() {
        let path = locator_cache_path(Path::new("/p/.packmill"), "github.com/acme/filters//strip");
        assert_eq!(
            path,
            Path::new("/p/.packmill/cache/github.com/acme/filters//strip")
        );
    }

    #[test]
    fn locator_without_subpath_is_rejected() {
        let err = GitFetcher::split_locator("github.com/acme/filters").unwrap_err();
        assert!(matches!(err, InstallError::BadLocator { .. }));
        let (repo, subpath) =
            GitFetcher::split_locator("github.com/acme/filters//strip").unwrap();
        assert_eq!(repo, "github.com/acme/filters");
        assert_eq!(subpath, "strip");
    }
}
