//! Error types for packmill-core.
//!
//! Every variant is a stable kind tag carrying the contextual parameters
//! (path, filter id, JSON location) the outer CLI layer maps to messages.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-shape and filesystem faults raised while loading and
/// decoding `config.json` (and other JSON documents sharing its helpers).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON document.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required key is absent. `location` is a JSON-pointer-like path
    /// such as `profiles->default->filters`.
    #[error("missing required key at '{location}'")]
    MissingKey { location: String },

    /// A key is present but holds the wrong JSON type.
    #[error("wrong type at '{location}': expected {expected}")]
    WrongType {
        location: String,
        expected: &'static str,
    },

    /// A filter definition declares neither `url` nor `runWith`.
    #[error("filter definition at '{location}' must declare either 'url' or 'runWith'")]
    UnknownDefinitionKind { location: String },

    /// An unsupported `runWith` interpreter name.
    #[error("unknown runWith value '{value}' at '{location}': expected python, node, or shell")]
    UnknownRunWith { location: String, value: String },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Filter-resolution and filter-run faults.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A configuration-shape fault encountered during resolution.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The package manifest for a remote filter could not be read. The raw
    /// filesystem error is deliberately omitted; it is almost always an
    /// uninformative "no such file" for a package that was never fetched.
    #[error("filter '{id}' is not installed; missing manifest at {path} (run `packmill install`)")]
    NotInstalled { id: String, path: PathBuf },

    /// A remote package manifest references another remote filter.
    #[error(
        "manifest {path} at '{location}': a remote filter may not reference \
         another remote filter (parent filter '{id}')"
    )]
    NestedRemoteReference {
        id: String,
        path: PathBuf,
        location: String,
    },

    /// Any other fault raised while decoding a manifest entry, annotated
    /// with the manifest path and the JSON location of the entry.
    #[error("manifest {path} at '{location}': {source}")]
    Manifest {
        path: PathBuf,
        location: String,
        #[source]
        source: Box<FilterError>,
    },

    /// A filter entry carries none of the recognized discriminant keys.
    #[error(
        "unknown filter entry at '{location}': expected one of \
         'profile', 'url', 'runWith' or 'filter' keys"
    )]
    UnknownFilterKind { location: String },

    /// A nested-profile filter names a profile that does not exist.
    #[error("profile '{name}' not found in config")]
    ProfileNotFound { name: String },

    /// A nested-profile filter refers to a profile already on the
    /// execution path.
    #[error("circular nested profile reference: '{name}'")]
    CircularProfile { name: String },

    /// A local filter's script is missing at check time.
    #[error("filter '{id}' script not found: {path}")]
    ScriptNotFound { id: String, path: PathBuf },

    /// The filter process could not be spawned.
    #[error("failed to start filter '{id}': {source}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// The filter process exited unsuccessfully.
    #[error("filter '{id}' failed with exit code {code:?}")]
    RunFailed { id: String, code: Option<i32> },
}
