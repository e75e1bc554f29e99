//! Directory synchronization, hash-gated and full.
//!
//! [`recycled_sync`] mirrors a source tree into a target tree while
//! copying only files whose content digest differs from the fingerprint
//! the target's [`RootState`](crate::hash_cache::RootState) remembers.
//! Unchanged files are left untouched so downstream tools see stable
//! modification times. [`mirror_full`] is the trust-nothing variant used
//! when no usable fingerprint state exists.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};
use crate::hash_cache::{hash_file, modified_ns, now_ns, rel_key, FileEntry, HashCacheStore};

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Knobs for one [`recycled_sync`] invocation. The defaults copy
/// conservatively and record nothing.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Move files out of the source instead of copying them. The source
    /// tree is consumed; leftovers are removed afterwards.
    pub can_move: bool,
    /// Record the fingerprints of source files into the source root's
    /// state as they are visited.
    pub save_source_hashes: bool,
    /// Record the fingerprints of written files into the target root's
    /// state as they are visited.
    pub save_target_hashes: bool,
    /// Give newly created files the permission bits of the target root
    /// rather than whatever the source carried (Unix only).
    pub copy_target_acl_from_parent: bool,
    /// Rehash every source file instead of trusting a memoized digest
    /// whose recorded modification time still matches.
    pub reload_source_hashes: bool,
}

/// What one synchronization pass actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub copied: usize,
    pub skipped: usize,
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// Hash-gated sync
// ---------------------------------------------------------------------------

/// Mirror `source` into `target`, copying only files whose digest
/// differs from the target state's memory of them and deleting target
/// files with no source counterpart.
///
/// A missing source is treated as an empty directory (with a warning);
/// a source that is a plain file is a configuration error.
pub fn recycled_sync(
    store: &mut HashCacheStore,
    source: &Path,
    target: &Path,
    opts: &SyncOptions,
) -> Result<SyncStats, SyncError> {
    std::fs::create_dir_all(target).map_err(|e| io_err(target, e))?;

    let rel_paths = if !source.exists() {
        log::warn!("source path does not exist, syncing nothing: {}", source.display());
        Vec::new()
    } else if source.is_file() {
        return Err(SyncError::SourceNotADirectory {
            path: source.to_path_buf(),
        });
    } else {
        relative_files(source)?
    };

    let mut stats = SyncStats::default();
    let mut keep: HashSet<String> = HashSet::new();

    for rel in &rel_paths {
        let src = source.join(rel);
        let dst = target.join(rel);
        let key = rel_key(rel);
        keep.insert(key.clone());

        // Stamp before hashing, so a write racing the hash is caught
        // by the strict mtime-vs-stamp comparison on the next pass.
        let stamp = now_ns();
        let src_mtime = modified_ns(&src)?;
        let digest = source_digest(store, source, &key, &src, src_mtime, opts)?;

        let remembered = store
            .state_mut(target)?
            .files
            .get(&key)
            .map(|entry| entry.digest.clone());

        if remembered.as_deref() == Some(digest.as_str()) && dst.exists() {
            stats.skipped += 1;
        } else {
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            if opts.can_move {
                move_file(&src, &dst)?;
            } else {
                std::fs::copy(&src, &dst).map_err(|e| io_err(&dst, e))?;
            }
            if opts.copy_target_acl_from_parent {
                copy_acl_from_parent(target, &dst)?;
            }
            stats.copied += 1;
        }

        if opts.save_source_hashes {
            store.state_mut(source)?.files.insert(
                key.clone(),
                FileEntry {
                    digest: digest.clone(),
                    modified_unix_ns: src_mtime,
                    hashed_at_unix_ns: stamp,
                },
            );
        }
        if opts.save_target_hashes {
            let dst_stamp = now_ns();
            let dst_mtime = modified_ns(&dst)?;
            store.state_mut(target)?.files.insert(
                key,
                FileEntry {
                    digest,
                    modified_unix_ns: dst_mtime,
                    hashed_at_unix_ns: dst_stamp,
                },
            );
        }
    }

    // Mirror deletions: anything in the target without a source
    // counterpart goes, in the tree and in the remembered state.
    for rel in relative_files(target)? {
        let key = rel_key(&rel);
        if keep.contains(&key) {
            continue;
        }
        let dst = target.join(&rel);
        std::fs::remove_file(&dst).map_err(|e| io_err(&dst, e))?;
        store.state_mut(target)?.files.remove(&key);
        stats.removed += 1;
    }
    remove_empty_dirs(target, target)?;

    if opts.can_move && source.exists() {
        std::fs::remove_dir_all(source).map_err(|e| io_err(source, e))?;
    }

    Ok(stats)
}

fn source_digest(
    store: &mut HashCacheStore,
    source: &Path,
    key: &str,
    src: &Path,
    src_mtime: i64,
    opts: &SyncOptions,
) -> Result<String, SyncError> {
    if !opts.reload_source_hashes {
        if let Some(entry) = store.state_mut(source)?.files.get(key) {
            if entry.digest_current(src_mtime) {
                return Ok(entry.digest.clone());
            }
        }
    }
    hash_file(src)
}

// ---------------------------------------------------------------------------
// Full sync
// ---------------------------------------------------------------------------

/// Wipe `target` and rebuild it as a plain copy of `source`. `None` or a
/// missing source produces an empty target directory; `label` names the
/// root in the warning when the source is missing.
pub fn mirror_full(source: Option<&Path>, target: &Path, label: &str) -> Result<(), SyncError> {
    match std::fs::remove_dir_all(target) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(target, e)),
    }
    std::fs::create_dir_all(target).map_err(|e| io_err(target, e))?;

    let source = match source {
        Some(path) => path,
        None => return Ok(()),
    };
    if !source.exists() {
        log::warn!("{} path does not exist, syncing nothing: {}", label, source.display());
        return Ok(());
    }
    if source.is_file() {
        return Err(SyncError::SourceNotADirectory {
            path: source.to_path_buf(),
        });
    }
    copy_dir_recursive(source, target)
}

/// Recursively copy the contents of `source` into `target` (which must
/// already exist).
pub fn copy_dir_recursive(source: &Path, target: &Path) -> Result<(), SyncError> {
    for entry in std::fs::read_dir(source).map_err(|e| io_err(source, e))? {
        let entry = entry.map_err(|e| io_err(source, e))?;
        let src = entry.path();
        let dst = target.join(entry.file_name());
        let ty = entry.file_type().map_err(|e| io_err(&src, e))?;
        if ty.is_dir() {
            std::fs::create_dir_all(&dst).map_err(|e| io_err(&dst, e))?;
            copy_dir_recursive(&src, &dst)?;
        } else {
            std::fs::copy(&src, &dst).map_err(|e| io_err(&dst, e))?;
        }
    }
    Ok(())
}

/// Copy `src` over `dst` only when the contents differ (or `dst` does
/// not exist yet). Returns whether a write happened.
pub fn copy_if_changed(src: &Path, dst: &Path) -> Result<bool, SyncError> {
    if dst.is_file() {
        let a = std::fs::read(src).map_err(|e| io_err(src, e))?;
        let b = std::fs::read(dst).map_err(|e| io_err(dst, e))?;
        if a == b {
            return Ok(false);
        }
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::copy(src, dst).map_err(|e| io_err(dst, e))?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

/// Every file under `root`, as paths relative to `root`.
pub fn relative_files(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut out = Vec::new();
    collect_relative(root, Path::new(""), &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_relative(root: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    let dir = root.join(rel);
    for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let child = rel.join(entry.file_name());
        let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if ty.is_dir() {
            collect_relative(root, &child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(src: &Path, dst: &Path) -> Result<(), SyncError> {
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dst).map_err(|e| io_err(dst, e))?;
            std::fs::remove_file(src).map_err(|e| io_err(src, e))?;
            Ok(())
        }
    }
}

/// Drop directories that ended up empty after deletion mirroring. The
/// root itself is kept.
fn remove_empty_dirs(root: &Path, dir: &Path) -> Result<(), SyncError> {
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
        if ty.is_dir() {
            remove_empty_dirs(root, &path)?;
            let empty = std::fs::read_dir(&path)
                .map_err(|e| io_err(&path, e))?
                .next()
                .is_none();
            if empty && path != root {
                std::fs::remove_dir(&path).map_err(|e| io_err(&path, e))?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_acl_from_parent(parent: &Path, file: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(parent)
        .map_err(|e| io_err(parent, e))?
        .permissions()
        .mode();
    // Strip the execute and setuid bits a directory mode carries.
    let file_mode = mode & 0o666;
    std::fs::set_permissions(file, std::fs::Permissions::from_mode(file_mode))
        .map_err(|e| io_err(file, e))
}

#[cfg(not(unix))]
fn copy_acl_from_parent(_parent: &Path, _file: &Path) -> Result<(), SyncError> {
    Ok(())
}
