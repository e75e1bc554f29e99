//! # packmill-installer
//!
//! Remote filter package installation: dependency gathering across
//! profiles, the [`PackageFetcher`] retrieval seam and the cache-backed
//! [`Installer`].

pub mod error;
pub mod installer;

pub use error::InstallError;
pub use installer::{
    gather_dependencies, locator_cache_path, Dependency, GitFetcher, InstallReport, Installer,
    PackageFetcher,
};
