//! # packmill-core
//!
//! Data model, configuration loading and filter resolution for the
//! packmill build pipeline: [`Project`] (the parsed `config.json`),
//! the [`FilterRunner`] variants, the profile/sub-filter resolver with
//! its nested-remote recursion guard, and the [`RunContext`] +
//! [`InterruptionSignal`] seam the watch loop polls.

pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod resolver;

pub use config::{FilterDefinition, LocalDefinition, Project, RemoteDefinition};
pub use context::{InterruptionSignal, NeverInterrupted, RunContext};
pub use error::{ConfigError, FilterError};
pub use filters::{
    filter_name_to_locator, FilterCollection, FilterRunner, LocalFilter, ProfileFilter,
    RemoteFilter, RunWith, FILTER_LIBRARY_URL,
};
pub use resolver::{filter_runner_from_object, resolve_profile, resolve_subfilters, Profile};
