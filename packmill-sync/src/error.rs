//! Error types for packmill-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from synchronization and fingerprint-state
/// operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (fingerprint state).
    #[error("fingerprint state JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configured source path resolves to a file where a directory is
    /// required. This is a configuration fault, not a transient error.
    #[error("configured source path is a file, not a directory: {path}")]
    SourceNotADirectory { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
