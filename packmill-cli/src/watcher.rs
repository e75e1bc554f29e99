//! File watching for `packmill watch`.
//!
//! A notify watcher tags every filesystem event with the source label
//! its path falls under and marks it on the shared [`WatchSignal`]. The
//! run loop polls the signal at its interruption boundaries and blocks
//! on it when quiescent.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use packmill_core::{InterruptionSignal, Project};

/// Pending-change set shared between the watcher callback and the run
/// loop. Level triggered: a mark stays pending until a poll consumes it.
#[derive(Debug, Default)]
pub struct WatchSignal {
    pending: Mutex<HashSet<String>>,
    changed: Condvar,
}

impl WatchSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change under `label` and wake any blocked waiter.
    pub fn mark(&self, label: &str) {
        let mut pending = self.pending.lock().unwrap();
        pending.insert(label.to_string());
        self.changed.notify_all();
    }

    /// Block until at least one change is pending. The pending set is
    /// left intact; the run loop's polls consume it.
    pub fn wait_for_change(&self) {
        let mut pending = self.pending.lock().unwrap();
        while pending.is_empty() {
            pending = self.changed.wait(pending).unwrap();
        }
    }
}

impl InterruptionSignal for WatchSignal {
    fn is_interrupted(&self, only: Option<&str>) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match only {
            Some(label) => pending.remove(label),
            None => {
                let any = !pending.is_empty();
                pending.clear();
                any
            }
        }
    }
}

/// Watched source roots of a project, canonicalized and labeled.
fn watch_roots(project: &Project) -> Vec<(PathBuf, &'static str)> {
    let sources = [
        (project.resource_path.as_deref(), "resources"),
        (project.behavior_path.as_deref(), "behaviors"),
        (project.data_path.as_deref(), "data"),
    ];
    sources
        .into_iter()
        .filter_map(|(path, label)| {
            let path = path?;
            match path.canonicalize() {
                Ok(canonical) => Some((canonical, label)),
                Err(_) => {
                    log::warn!("not watching missing source path: {}", path.display());
                    None
                }
            }
        })
        .collect()
}

/// Start watching every configured source root. The returned watcher
/// must be kept alive for the duration of the watch loop.
pub fn spawn_watcher(project: &Project, signal: Arc<WatchSignal>) -> Result<RecommendedWatcher> {
    let roots = watch_roots(project);
    let callback_roots = roots.clone();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in &event.paths {
                for (root, label) in &callback_roots {
                    if path.starts_with(root) {
                        signal.mark(label);
                    }
                }
            }
        }
        Err(e) => log::warn!("watch error: {e}"),
    })
    .context("failed to create file watcher")?;

    for (root, label) in &roots {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {label} path '{}'", root.display()))?;
    }
    Ok(watcher)
}
