//! Filter resolution — declarative profile to runnable filter list.
//!
//! Entries are classified by which discriminant key is present, in this
//! order: `profile`, `url`, `runWith`, `filter`. Manifest-expanded
//! sub-filters reuse the same classifier with the package install path as
//! script root, so there is no synthetic-key object mutation anywhere.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::{
    as_object, bool_key, object_key, str_key, string_array_key, FilterDefinition,
};
use crate::error::{ConfigError, FilterError};
use crate::filters::{
    filter_name_to_locator, FilterCollection, FilterRunner, LocalFilter, ProfileFilter,
    RemoteFilter, RunWith,
};

/// A resolved profile: the ordered filter pipeline plus its export
/// target. The export object stays opaque here; the Exporter owns its
/// schema.
#[derive(Debug)]
pub struct Profile {
    pub filters: FilterCollection,
    pub export: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Profile resolution
// ---------------------------------------------------------------------------

/// Turn a raw profile object into a [`Profile`].
///
/// Requires `filters` (array of objects) and `export` (object); every
/// entry error carries the zero-based index (`...->filters-><i>`).
pub fn resolve_profile(
    profile_name: &str,
    raw: &Value,
    definitions: &BTreeMap<String, FilterDefinition>,
    project_root: &Path,
) -> Result<Profile, FilterError> {
    let location = format!("profiles->{profile_name}");
    let obj = as_object(raw, &location)?;

    let filters_value = obj.get("filters").ok_or_else(|| ConfigError::MissingKey {
        location: format!("{location}->filters"),
    })?;
    let entries = filters_value
        .as_array()
        .ok_or_else(|| ConfigError::WrongType {
            location: format!("{location}->filters"),
            expected: "array",
        })?;

    let mut runners = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let entry_location = format!("{location}->filters->{i}");
        let entry_obj = as_object(entry, &entry_location)?;
        let runner =
            filter_runner_from_object(entry_obj, definitions, project_root, &entry_location)?;
        runners.push(runner);
    }

    let export = object_key(obj, "export", &location)?
        .ok_or_else(|| ConfigError::MissingKey {
            location: format!("{location}->export"),
        })?
        .clone();

    Ok(Profile {
        filters: FilterCollection(runners),
        export,
    })
}

// ---------------------------------------------------------------------------
// Entry classifier
// ---------------------------------------------------------------------------

/// Classify one filter entry and construct the matching runner variant.
///
/// `script_root` anchors relative script paths: the project root for
/// profile entries, the package install path for manifest entries.
pub fn filter_runner_from_object(
    obj: &Map<String, Value>,
    definitions: &BTreeMap<String, FilterDefinition>,
    script_root: &Path,
    location: &str,
) -> Result<FilterRunner, FilterError> {
    let disabled = bool_key(obj, "disabled", location)?;
    let settings = object_key(obj, "settings", location)?.cloned();
    let arguments = string_array_key(obj, "arguments", location)?;

    if let Some(profile) = str_key(obj, "profile", location)? {
        return Ok(FilterRunner::Profile(ProfileFilter {
            profile,
            disabled,
            arguments,
        }));
    }

    if let Some(url) = str_key(obj, "url", location)? {
        return Ok(FilterRunner::Remote(RemoteFilter::new(
            url.clone(),
            disabled,
            url,
            arguments,
        )));
    }

    if let Some(run_with) = str_key(obj, "runWith", location)? {
        let script = str_key(obj, "script", location)?.ok_or_else(|| ConfigError::MissingKey {
            location: format!("{location}->script"),
        })?;
        let id = str_key(obj, "filter", location)?.unwrap_or_else(|| script.clone());
        return Ok(FilterRunner::Local(LocalFilter {
            id,
            disabled,
            run_with: RunWith::parse(&run_with, location)?,
            script: script.into(),
            script_root: script_root.to_path_buf(),
            settings,
            arguments,
        }));
    }

    if let Some(name) = str_key(obj, "filter", location)? {
        return Ok(match definitions.get(&name) {
            Some(FilterDefinition::Local(def)) => FilterRunner::Local(LocalFilter {
                id: name,
                disabled,
                run_with: def.run_with,
                script: def.script.clone(),
                script_root: script_root.to_path_buf(),
                settings,
                arguments,
            }),
            Some(FilterDefinition::Remote(def)) => FilterRunner::Remote(RemoteFilter::new(
                name,
                disabled,
                def.url.clone(),
                arguments,
            )),
            // Bare names fall through to the standard filter library.
            None => {
                let locator = filter_name_to_locator(&name);
                FilterRunner::Remote(RemoteFilter::new(name, disabled, locator, arguments))
            }
        });
    }

    Err(FilterError::UnknownFilterKind {
        location: location.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Sub-filter resolution
// ---------------------------------------------------------------------------

/// Expand the `filter.json` manifest of an installed remote package into
/// the parent's sub-filter collection.
///
/// Child identifiers are synthesized as `<parent id>:subfilter<i>`, in
/// manifest order. Children inherit the parent's invocation arguments.
/// A child that is itself a remote filter is rejected; remote packages
/// may not reference other remote packages.
pub fn resolve_subfilters(
    parent: &RemoteFilter,
    install_path: &Path,
) -> Result<FilterCollection, FilterError> {
    let manifest_path = install_path.join("filter.json");
    // The raw read error is dropped on purpose; "not installed" is the
    // useful diagnostic here.
    let contents =
        std::fs::read_to_string(&manifest_path).map_err(|_| FilterError::NotInstalled {
            id: parent.id.clone(),
            path: manifest_path.clone(),
        })?;
    let value: Value = serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
        path: manifest_path.clone(),
        source: e,
    })?;

    let in_manifest = |location: &str, source: FilterError| FilterError::Manifest {
        path: manifest_path.clone(),
        location: location.to_string(),
        source: Box::new(source),
    };

    let obj = as_object(&value, "manifest").map_err(|e| in_manifest("manifest", e.into()))?;
    let entries = obj
        .get("filters")
        .ok_or_else(|| {
            in_manifest(
                "filters",
                ConfigError::MissingKey {
                    location: "filters".to_string(),
                }
                .into(),
            )
        })?
        .as_array()
        .ok_or_else(|| {
            in_manifest(
                "filters",
                ConfigError::WrongType {
                    location: "filters".to_string(),
                    expected: "array",
                }
                .into(),
            )
        })?;

    let no_definitions = BTreeMap::new();
    let mut children = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let location = format!("filters->{i}");
        let entry_obj =
            as_object(entry, &location).map_err(|e| in_manifest(&location, e.into()))?;
        let mut child =
            filter_runner_from_object(entry_obj, &no_definitions, install_path, &location)
                .map_err(|e| in_manifest(&location, e))?;
        if matches!(child, FilterRunner::Remote(_)) {
            return Err(FilterError::NestedRemoteReference {
                id: parent.id.clone(),
                path: manifest_path.clone(),
                location,
            });
        }
        child.set_id(format!("{}:subfilter{}", parent.id, i));
        child.copy_arguments_from(parent);
        children.push(child);
    }
    Ok(FilterCollection(children))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
