//! Error types for packmill-installer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from dependency installation.
#[derive(Debug, Error)]
pub enum InstallError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A locator string that cannot be split into repository and
    /// package subpath.
    #[error("malformed package locator: {locator}")]
    BadLocator { locator: String },

    /// The underlying fetch (git clone) failed.
    #[error("failed to fetch {locator}: {detail}")]
    Fetch { locator: String, detail: String },

    /// Copying the fetched package into the cache failed.
    #[error(transparent)]
    Copy(#[from] packmill_sync::SyncError),
}

/// Convenience constructor for [`InstallError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> InstallError {
    InstallError::Io {
        path: path.into(),
        source,
    }
}
