//! Resource specifications and property validation.
//!
//! A [`ResourceSpec`] declares desired state for one manageable entity:
//! a type name, an identity name, requested actions, and a property map.
//! The same shape doubles as the current-state mirror a provider builds
//! in `load_current_resource`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Lightweight identity of a resource, rendered `type[name]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdent {
    pub type_name: String,
    pub name: String,
}

impl fmt::Display for ResourceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.name)
    }
}

/// Desired state for one manageable entity.
///
/// Identity fields are immutable once the spec enters the engine;
/// property values may be filled in by a provider as new-state
/// bookkeeping during convergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource type (e.g. "file", "package", "service")
    pub type_name: String,
    /// Identity within the type (a path, a package name, ...)
    pub name: String,
    /// Requested actions, in order
    pub actions: Vec<String>,
    /// Explicit provider override; bypasses resolution entirely
    pub provider: Option<String>,
    /// Property name → value
    pub properties: BTreeMap<String, Value>,
}

impl ResourceSpec {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            actions: Vec::new(),
            provider: None,
            properties: BTreeMap::new(),
        }
    }

    /// Append a requested action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Force a specific provider id, bypassing resolution.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set a property (builder form).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn ident(&self) -> ResourceIdent {
        ResourceIdent {
            type_name: self.type_name.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.name)
    }
}

/// Mirror of [`ResourceSpec`] populated from the live system.
///
/// Owned exclusively by one provider instance during one action's
/// execution and thrown away afterwards.
pub type CurrentResourceSpec = ResourceSpec;

/// Expected JSON shape of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Bool,
    Integer,
    /// No shape constraint
    Any,
}

impl PropertyKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Any => true,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::Integer => "an integer",
            Self::Any => "any value",
        }
    }
}

type Validator = Box<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// Declaration of one property: shape, default, required-ness, optional
/// callback validator.
pub struct PropertyDefinition {
    kind: PropertyKind,
    default: Option<Value>,
    required_for: Vec<String>,
    validator: Option<Validator>,
}

impl PropertyDefinition {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            default: None,
            required_for: Vec::new(),
            validator: None,
        }
    }

    pub fn string() -> Self {
        Self::new(PropertyKind::String)
    }

    pub fn boolean() -> Self {
        Self::new(PropertyKind::Bool)
    }

    pub fn integer() -> Self {
        Self::new(PropertyKind::Integer)
    }

    /// Default applied when the property is unset.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Actions for which the property must be set.
    pub fn required_for(mut self, actions: &[&str]) -> Self {
        self.required_for = actions.iter().map(ToString::to_string).collect();
        self
    }

    /// Callback validator; return `Err(reason)` to reject the value.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }
}

/// Per-resource-type property declarations.
///
/// Validation runs before the provider probes the live system: defaults
/// are applied to unset properties, then shape, required-ness and
/// callback validators are checked against the requested action.
#[derive(Default)]
pub struct PropertySchema {
    defs: BTreeMap<String, PropertyDefinition>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, def: PropertyDefinition) -> Self {
        self.defs.insert(name.into(), def);
        self
    }

    /// Validate and coerce `spec`'s properties for `action`.
    pub fn validate(&self, spec: &mut ResourceSpec, action: &str) -> Result<()> {
        for (name, def) in &self.defs {
            if !spec.is_set(name) {
                if let Some(default) = &def.default {
                    spec.set(name.clone(), default.clone());
                }
            }

            if def.required_for.iter().any(|a| a == action) && !spec.is_set(name) {
                return Err(Error::ValidationFailed {
                    resource: spec.to_string(),
                    message: format!("property `{name}` is required for action `{action}`"),
                });
            }

            if let Some(value) = spec.get(name) {
                if !def.kind.accepts(value) {
                    return Err(Error::ValidationFailed {
                        resource: spec.to_string(),
                        message: format!(
                            "property `{name}` must be {}, got {value}",
                            def.kind.expected()
                        ),
                    });
                }
                if let Some(validator) = &def.validator {
                    if let Err(reason) = validator(value) {
                        return Err(Error::ValidationFailed {
                            resource: spec.to_string(),
                            message: format!("property `{name}`: {reason}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
