//! Desired-state manifest loading.
//!
//! A manifest is a TOML file of `[[resource]]` entries; loading turns it
//! into `ResourceSpec`s, filling default actions from the registry and
//! expanding `~` in path-typed names.
//!
//! ```toml
//! [[resource]]
//! type = "file"
//! name = "~/.config/motd"
//! action = "create"
//!
//! [resource.properties]
//! content = "hello"
//! ```

use anyhow::{Context, Result, bail};
use convergence::{ProviderRegistry, ResourceSpec};
use serde::Deserialize;
use std::path::Path;

/// Resource types whose names (and path properties) are filesystem paths.
const PATH_TYPES: &[&str] = &["file", "directory", "link"];

/// Top-level manifest document.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
}

/// One `[[resource]]` entry.
#[derive(Debug, Deserialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub action: ActionField,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub properties: toml::Table,
}

/// The `action` key accepts a single string or a list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum ActionField {
    #[default]
    Unset,
    One(String),
    Many(Vec<String>),
}

/// Load a manifest from disk.
pub fn load(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    parse(&content).with_context(|| format!("invalid manifest {}", path.display()))
}

/// Parse manifest content.
pub fn parse(content: &str) -> Result<Manifest> {
    Ok(toml::from_str(content)?)
}

/// Turn manifest entries into resource specs, consulting the registry
/// for default actions.
pub fn to_specs(manifest: Manifest, registry: &ProviderRegistry) -> Result<Vec<ResourceSpec>> {
    manifest
        .resources
        .into_iter()
        .map(|entry| entry_to_spec(entry, registry))
        .collect()
}

fn entry_to_spec(entry: ResourceEntry, registry: &ProviderRegistry) -> Result<ResourceSpec> {
    let is_path_type = PATH_TYPES.contains(&entry.type_name.as_str());
    let name = if is_path_type {
        expand_path(&entry.name)
    } else {
        entry.name.clone()
    };

    let mut spec = ResourceSpec::new(&entry.type_name, name);

    let actions = match entry.action {
        ActionField::One(action) => vec![action],
        ActionField::Many(actions) => actions,
        ActionField::Unset => match registry.default_action(&entry.type_name) {
            Some(action) => vec![action.to_string()],
            None => bail!(
                "resource {}[{}]: no action given and no default action registered for type `{}`",
                entry.type_name,
                entry.name,
                entry.type_name
            ),
        },
    };
    if actions.is_empty() {
        bail!(
            "resource {}[{}]: action list must not be empty",
            entry.type_name,
            entry.name
        );
    }
    for action in actions {
        spec = spec.with_action(action);
    }

    if let Some(provider) = entry.provider {
        spec = spec.with_provider(provider);
    }

    for (key, value) in entry.properties {
        let mut json = toml_to_json(value);
        if is_path_type && matches!(key.as_str(), "path" | "to") {
            if let serde_json::Value::String(s) = &json {
                json = serde_json::Value::String(expand_path(s));
            }
        }
        spec.set(key, json);
    }

    Ok(spec)
}

fn expand_path(raw: &str) -> String {
    shellexpand::tilde_with_context(raw, || dirs::home_dir().map(|p| p.to_string_lossy().into_owned()))
        .into_owned()
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
