//! Fingerprint cache — SHA-256 content state per synchronized root.
//!
//! One [`RootState`] per synchronized directory, persisted as a JSON
//! document at `<dot>/cache/states/<key>.json` where `key` is derived
//! from the root path. Writes use the atomic `.tmp` + rename pattern.
//!
//! The store is an explicitly constructed service: the profile runner
//! owns one instance per run, persists it only at safe interruption
//! boundaries, and wipes it wholesale on any failure path so a later run
//! never trusts possibly-inconsistent state.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};
use crate::synchronizer::relative_files;

/// Fingerprint of one file: content digest, the modification time
/// observed when the digest was computed, and the clock reading taken
/// just before hashing. The timestamps let a rescan skip rehashing
/// files that have not moved since.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub digest: String,
    pub modified_unix_ns: i64,
    pub hashed_at_unix_ns: i64,
}

impl FileEntry {
    /// Whether the memoized digest still describes a file whose current
    /// modification time is `modified_ns`. Equal timestamps are treated
    /// as stale: filesystem clocks are coarse, so a rewrite can land in
    /// the same instant as the recorded hash without advancing the
    /// mtime. Only a file strictly older than the hashing moment is
    /// known to be unchanged.
    pub(crate) fn digest_current(&self, modified_ns: i64) -> bool {
        self.modified_unix_ns == modified_ns && self.modified_unix_ns < self.hashed_at_unix_ns
    }
}

/// On-disk fingerprint state for one synchronized root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootState {
    pub synced_at: DateTime<Utc>,
    pub files: HashMap<String, FileEntry>,
}

impl RootState {
    fn empty() -> Self {
        RootState {
            synced_at: Utc::now(),
            files: HashMap::new(),
        }
    }
}

/// Process-explicit fingerprint store over every synchronized root.
#[derive(Debug)]
pub struct HashCacheStore {
    states_dir: PathBuf,
    states: HashMap<PathBuf, RootState>,
}

impl HashCacheStore {
    /// Store rooted at `<dot_path>/cache/states`.
    pub fn new(dot_path: &Path) -> Self {
        HashCacheStore {
            states_dir: dot_path.join("cache").join("states"),
            states: HashMap::new(),
        }
    }

    /// Directory holding the persisted per-root state files.
    pub fn states_dir(&self) -> &Path {
        &self.states_dir
    }

    /// In-memory state for `root`, loading the persisted document on
    /// first access (empty when none exists).
    pub fn state_mut(&mut self, root: &Path) -> Result<&mut RootState, SyncError> {
        match self.states.entry(root.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let state = load_state(&self.states_dir, root)?;
                Ok(entry.insert(state))
            }
        }
    }

    /// Rescan `root`, fingerprint its files (reusing a memoized digest
    /// when the stored modification time matches) and persist the state
    /// atomically. A missing root persists as an empty state.
    pub fn save_state(&mut self, root: &Path) -> Result<(), SyncError> {
        let previous = self.state_mut(root)?.files.clone();

        let mut files = HashMap::new();
        if root.is_dir() {
            for rel in relative_files(root)? {
                let abs = root.join(&rel);
                let key = rel_key(&rel);
                // The stamp is taken before hashing: any write landing
                // after it carries an mtime >= stamp and fails the
                // strict digest_current comparison next time around.
                let stamp = now_ns();
                let mtime = modified_ns(&abs)?;
                let (digest, hashed_at) = match previous.get(&key) {
                    Some(entry) if entry.digest_current(mtime) => {
                        (entry.digest.clone(), entry.hashed_at_unix_ns)
                    }
                    _ => (hash_file(&abs)?, stamp),
                };
                files.insert(
                    key,
                    FileEntry {
                        digest,
                        modified_unix_ns: mtime,
                        hashed_at_unix_ns: hashed_at,
                    },
                );
            }
        }
        let state = RootState {
            synced_at: Utc::now(),
            files,
        };

        std::fs::create_dir_all(&self.states_dir).map_err(|e| io_err(&self.states_dir, e))?;
        let path = state_path(&self.states_dir, root);
        let json = serde_json::to_string_pretty(&state)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;

        self.states.insert(root.to_path_buf(), state);
        Ok(())
    }

    /// Discard all persisted and in-memory fingerprint state for every
    /// root, unconditionally. Used defensively on any failure path.
    pub fn clear_cached_states(&mut self) -> Result<(), SyncError> {
        self.states.clear();
        match std::fs::remove_dir_all(&self.states_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.states_dir, e)),
        }
    }
}

fn load_state(states_dir: &Path, root: &Path) -> Result<RootState, SyncError> {
    let path = state_path(states_dir, root);
    if !path.exists() {
        return Ok(RootState::empty());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// `<states_dir>/<key>.json`; the key is a digest of the root path so
/// arbitrary roots map onto flat, collision-free file names.
fn state_path(states_dir: &Path, root: &Path) -> PathBuf {
    let digest = {
        let mut h = Sha256::new();
        h.update(root.to_string_lossy().as_bytes());
        hex::encode(h.finalize())
    };
    states_dir.join(format!("{}.json", &digest[..16]))
}

/// Normalized map key for a relative path (forward slashes on every
/// platform).
pub(crate) fn rel_key(rel: &Path) -> String {
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

/// SHA-256 hex digest of a file's contents.
pub fn hash_file(path: &Path) -> Result<String, SyncError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Modification time in Unix nanoseconds.
pub(crate) fn modified_ns(path: &Path) -> Result<i64, SyncError> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| io_err(path, e))?;
    Ok(system_time_ns(modified))
}

/// Current clock reading in Unix nanoseconds.
pub(crate) fn now_ns() -> i64 {
    system_time_ns(std::time::SystemTime::now())
}

fn system_time_ns(t: std::time::SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
