//! Project configuration (`config.json`).
//!
//! # File shape
//!
//! ```text
//! {
//!   "name": "my-pack",
//!   "resourcePath": "packs/resources",   (optional)
//!   "behaviorPath": "packs/behaviors",   (optional)
//!   "dataPath": "packs/data",            (optional)
//!   "filterDefinitions": { "<name>": { ... } },
//!   "profiles": { "<name>": { "filters": [...], "export": {...} } }
//! }
//! ```
//!
//! Profiles are kept as raw JSON here; the resolver turns the active one
//! into runnable filters per run. Decoding is manual over
//! `serde_json::Value` so every shape fault carries a JSON-pointer-like
//! location (`profiles->default`, `filters->3`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{io_err, ConfigError};
use crate::filters::RunWith;

// ---------------------------------------------------------------------------
// JSON shape helpers
// ---------------------------------------------------------------------------

pub(crate) fn as_object<'a>(
    value: &'a Value,
    location: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value.as_object().ok_or_else(|| ConfigError::WrongType {
        location: location.to_string(),
        expected: "object",
    })
}

/// Optional string key; `WrongType` if present with another type.
pub(crate) fn str_key(
    obj: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Option<String>, ConfigError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::WrongType {
            location: format!("{location}->{key}"),
            expected: "string",
        }),
    }
}

/// Optional bool key, defaulting to `false`.
pub(crate) fn bool_key(
    obj: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<bool, ConfigError> {
    match obj.get(key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ConfigError::WrongType {
            location: format!("{location}->{key}"),
            expected: "bool",
        }),
    }
}

/// Optional object key.
pub(crate) fn object_key<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(_) => Err(ConfigError::WrongType {
            location: format!("{location}->{key}"),
            expected: "object",
        }),
    }
}

/// Optional array-of-strings key, defaulting to empty.
pub(crate) fn string_array_key(
    obj: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Vec<String>, ConfigError> {
    let Some(value) = obj.get(key) else {
        return Ok(Vec::new());
    };
    let items = value.as_array().ok_or_else(|| ConfigError::WrongType {
        location: format!("{location}->{key}"),
        expected: "array",
    })?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let s = item.as_str().ok_or_else(|| ConfigError::WrongType {
            location: format!("{location}->{key}->{i}"),
            expected: "string",
        })?;
        out.push(s.to_string());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Filter definitions
// ---------------------------------------------------------------------------

/// A named filter definition from `filterDefinitions`, classified by
/// discriminant key: `url` (remote) versus `runWith` (local).
#[derive(Debug, Clone)]
pub enum FilterDefinition {
    Local(LocalDefinition),
    Remote(RemoteDefinition),
}

/// A filter implemented by a script inside the project tree.
#[derive(Debug, Clone)]
pub struct LocalDefinition {
    pub run_with: RunWith,
    pub script: PathBuf,
}

/// A filter fetched from a remote package locator.
#[derive(Debug, Clone)]
pub struct RemoteDefinition {
    pub url: String,
    pub version: Option<String>,
}

impl FilterDefinition {
    pub fn from_object(obj: &Map<String, Value>, location: &str) -> Result<Self, ConfigError> {
        if let Some(url) = str_key(obj, "url", location)? {
            return Ok(FilterDefinition::Remote(RemoteDefinition {
                url,
                version: str_key(obj, "version", location)?,
            }));
        }
        if let Some(run_with) = str_key(obj, "runWith", location)? {
            let script = str_key(obj, "script", location)?.ok_or_else(|| {
                ConfigError::MissingKey {
                    location: format!("{location}->script"),
                }
            })?;
            return Ok(FilterDefinition::Local(LocalDefinition {
                run_with: RunWith::parse(&run_with, location)?,
                script: PathBuf::from(script),
            }));
        }
        Err(ConfigError::UnknownDefinitionKind {
            location: location.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A loaded project: the immutable input of a whole run.
#[derive(Debug)]
pub struct Project {
    pub name: String,
    /// Directory containing `config.json`; source paths below are joined
    /// onto it at load time.
    pub root: PathBuf,
    pub resource_path: Option<PathBuf>,
    pub behavior_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    pub filter_definitions: BTreeMap<String, FilterDefinition>,
    /// Raw profile objects, keyed by profile name.
    pub profiles: BTreeMap<String, Value>,
}

impl Project {
    /// Load `<root>/config.json`.
    pub fn load_at(root: &Path) -> Result<Project, ConfigError> {
        let path = root.join("config.json");
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
            path: path.clone(),
            source: e,
        })?;
        Self::from_value(root, &value)
    }

    /// Decode a parsed configuration document rooted at `root`.
    pub fn from_value(root: &Path, value: &Value) -> Result<Project, ConfigError> {
        let obj = as_object(value, "config")?;

        let name = str_key(obj, "name", "config")?.ok_or_else(|| ConfigError::MissingKey {
            location: "config->name".to_string(),
        })?;

        let source_path = |key: &str| -> Result<Option<PathBuf>, ConfigError> {
            Ok(str_key(obj, key, "config")?.map(|s| root.join(s)))
        };
        let resource_path = source_path("resourcePath")?;
        let behavior_path = source_path("behaviorPath")?;
        let data_path = source_path("dataPath")?;

        let mut filter_definitions = BTreeMap::new();
        if let Some(defs) = object_key(obj, "filterDefinitions", "config")? {
            for (def_name, def_value) in defs {
                let location = format!("filterDefinitions->{def_name}");
                let def_obj = as_object(def_value, &location)?;
                let definition = FilterDefinition::from_object(def_obj, &location)?;
                filter_definitions.insert(def_name.clone(), definition);
            }
        }

        let profiles_obj =
            object_key(obj, "profiles", "config")?.ok_or_else(|| ConfigError::MissingKey {
                location: "config->profiles".to_string(),
            })?;
        let profiles = profiles_obj
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Project {
            name,
            root: root.to_path_buf(),
            resource_path,
            behavior_path,
            data_path,
            filter_definitions,
            profiles,
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> PathBuf {
        PathBuf::from("/proj")
    }

    #[test]
    fn minimal_config_loads() {
        let value = json!({
            "name": "demo",
            "profiles": { "default": { "filters": [], "export": {} } }
        });
        let project = Project::from_value(&root(), &value).expect("load");
        assert_eq!(project.name, "demo");
        assert!(project.resource_path.is_none());
        assert!(project.profiles.contains_key("default"));
    }

    #[test]
    fn source_paths_joined_onto_root() {
        let value = json!({
            "name": "demo",
            "resourcePath": "packs/resources",
            "profiles": {}
        });
        let project = Project::from_value(&root(), &value).expect("load");
        assert_eq!(
            project.resource_path,
            Some(PathBuf::from("/proj/packs/resources"))
        );
    }

    #[test]
    fn missing_name_is_shape_error() {
        let value = json!({ "profiles": {} });
        let err = Project::from_value(&root(), &value).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { location } if location == "config->name"));
    }

    #[test]
    fn missing_profiles_is_shape_error() {
        let value = json!({ "name": "demo" });
        let err = Project::from_value(&root(), &value).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingKey { location } if location == "config->profiles")
        );
    }

    #[test]
    fn definition_classifier_prefers_url() {
        let obj = json!({ "url": "github.com/acme/filters//strip", "version": "1.2.0" });
        let def = FilterDefinition::from_object(obj.as_object().unwrap(), "filterDefinitions->x")
            .expect("definition");
        match def {
            FilterDefinition::Remote(remote) => {
                assert_eq!(remote.url, "github.com/acme/filters//strip");
                assert_eq!(remote.version.as_deref(), Some("1.2.0"));
            }
            FilterDefinition::Local(_) => panic!("expected remote definition"),
        }
    }

    #[test]
    fn definition_without_discriminant_rejected() {
        let obj = json!({ "script": "main.py" });
        let err = FilterDefinition::from_object(obj.as_object().unwrap(), "filterDefinitions->x")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDefinitionKind { .. }));
    }

    #[test]
    fn unknown_run_with_rejected_with_location() {
        let obj = json!({ "runWith": "cobol", "script": "main.cob" });
        let err = FilterDefinition::from_object(obj.as_object().unwrap(), "filterDefinitions->x")
            .unwrap_err();
        match err {
            ConfigError::UnknownRunWith { location, value } => {
                assert_eq!(location, "filterDefinitions->x");
                assert_eq!(value, "cobol");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_type_reports_json_location() {
        let value = json!({ "name": 7, "profiles": {} });
        let err = Project::from_value(&root(), &value).unwrap_err();
        assert!(matches!(err, ConfigError::WrongType { location, .. } if location == "config->name"));
    }
}
