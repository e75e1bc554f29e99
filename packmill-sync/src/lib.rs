//! # packmill-sync
//!
//! Content-hash synchronization between pack sources and the build
//! workspace: the fingerprint store ([`HashCacheStore`]), the hash-gated
//! incremental sync ([`recycled_sync`]) and the trust-nothing full
//! mirror ([`mirror_full`]).
//!
//! Layout on disk:
//!
//! ```text
//! .packmill/
//!   cache/
//!     states/       per-root fingerprint documents (JSON)
//! ```

pub mod error;
pub mod hash_cache;
pub mod synchronizer;

pub use error::SyncError;
pub use hash_cache::{hash_file, FileEntry, HashCacheStore, RootState};
pub use synchronizer::{
    copy_dir_recursive, copy_if_changed, mirror_full, recycled_sync, relative_files, SyncOptions,
    SyncStats,
};
