//! # packmill-runner
//!
//! The profile run loop: workspace setup over the three source
//! subtrees, the Sync / Run / Export state machine ([`run_profile`]),
//! and the [`Exporter`] destination seam with its local-filesystem
//! implementation.

pub mod error;
pub mod export;
pub mod profile_runner;
pub mod workspace;

pub use error::RunError;
pub use export::{ExportError, Exporter, LocalExporter};
pub use profile_runner::{run_profile, RunReport};
pub use workspace::{
    persist_workspace_state, setup_full, setup_recycled, subtree, SOURCE_LABELS,
};
