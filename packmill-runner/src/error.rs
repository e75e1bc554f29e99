//! Error types for packmill-runner.

use thiserror::Error;

use packmill_core::FilterError;
use packmill_sync::SyncError;

use crate::export::ExportError;

/// All errors a profile run can end in. Any of these has already
/// cleared the fingerprint cache by the time the caller sees it.
#[derive(Debug, Error)]
pub enum RunError {
    /// Filter resolution, validation or execution failed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Workspace synchronization failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Exporting the built workspace failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Persisting fingerprint state at the interruption boundary
    /// failed. The cache has been wiped; the next run starts cold.
    #[error("failed to persist fingerprint state: {source}")]
    CacheSave {
        #[source]
        source: SyncError,
    },
}
