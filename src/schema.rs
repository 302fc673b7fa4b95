//! Schema definitions and structural rules
//!
//! Each managed kind is described by a [`KindDefinition`]: its group, its hub
//! version, and for every served version the fields that version requires and
//! the [`StructuralRule`]s that carry a document of that version to the hub.
//!
//! Definitions are plain data (YAML files under `schemas/`), so adding a
//! version means adding an entry, not code.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::identity::ResourceIdentity;
use crate::path::{describe, FieldError, FieldPath};

/// Expected shape of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Object,
    Sequence,
    String,
    Integer,
    Boolean,
    /// Any value is accepted; only presence is checked
    Any,
}

impl Shape {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Shape::Object => value.is_object(),
            Shape::Sequence => value.is_array(),
            Shape::String => value.is_string(),
            Shape::Integer => value.is_i64() || value.is_u64(),
            Shape::Boolean => value.is_boolean(),
            Shape::Any => true,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Shape::Object => "a mapping",
            Shape::Sequence => "a sequence",
            Shape::String => "a string",
            Shape::Integer => "an integer",
            Shape::Boolean => "a boolean",
            Shape::Any => "a value",
        }
    }
}

/// A field a version declares, with its shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub path: FieldPath,
    pub shape: Shape,
    #[serde(default)]
    pub required: bool,
}

/// One declarative step from a spoke version towards the hub.
///
/// Rules are applied in order on the way to the hub and inverted in reverse
/// order on the way back, so every rule must be invertible on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StructuralRule {
    /// Move the value at `from` (spoke layout) to `to` (hub layout)
    Move { from: FieldPath, to: FieldPath },
    /// Translate string values at `path`, spoke value -> hub value
    MapValues {
        path: FieldPath,
        values: BTreeMap<String, String>,
    },
}

impl StructuralRule {
    /// Apply this rule in the spoke -> hub direction.
    ///
    /// A value mapping rejects a spoke value that is already one of the hub
    /// spellings, since the way back could not restore it.
    pub fn apply(&self, body: &mut Map<String, Value>) -> Result<(), FieldError> {
        match self {
            StructuralRule::Move { from, to } => move_value(body, from, to),
            StructuralRule::MapValues { path, values } => map_value(body, path, |v| {
                if let Some(hub) = values.get(v) {
                    return Ok(Some(hub.clone()));
                }
                match values.iter().find(|(_, hub)| hub.as_str() == v) {
                    Some((spoke, _)) => Err(ambiguous_value(v, spoke)),
                    None => Ok(None),
                }
            }),
        }
    }

    /// Apply the inverse of this rule (hub -> spoke).
    ///
    /// A value mapping rejects a hub value that is one of the spoke spellings.
    pub fn invert(&self, body: &mut Map<String, Value>) -> Result<(), FieldError> {
        match self {
            StructuralRule::Move { from, to } => move_value(body, to, from),
            StructuralRule::MapValues { path, values } => map_value(body, path, |v| {
                if let Some((spoke, _)) = values.iter().find(|(_, hub)| hub.as_str() == v) {
                    return Ok(Some(spoke.clone()));
                }
                match values.get_key_value(v) {
                    Some((_, hub)) => Err(ambiguous_value(v, hub)),
                    None => Ok(None),
                }
            }),
        }
    }

    /// Check that this rule can be inverted without ambiguity
    pub fn check_invertible(&self) -> Result<(), String> {
        match self {
            StructuralRule::Move { from, to } if from == to => {
                Err(format!("move rule for \"{from}\" has identical source and destination"))
            }
            StructuralRule::Move { .. } => Ok(()),
            StructuralRule::MapValues { path, values } => {
                let mut seen = std::collections::BTreeSet::new();
                for hub in values.values() {
                    if !seen.insert(hub) {
                        return Err(format!(
                            "value mapping at \"{path}\" maps more than one value to \"{hub}\""
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

fn move_value(
    body: &mut Map<String, Value>,
    from: &FieldPath,
    to: &FieldPath,
) -> Result<(), FieldError> {
    if to.get(body).is_some() && from.get(body).is_some() {
        return Err(FieldError::new(
            from.to_string(),
            format!("conflicts with \"{to}\", which is also set"),
        ));
    }
    match from.take(body) {
        Some(value) => to.insert(body, value),
        None => Ok(()),
    }
}

fn ambiguous_value(value: &str, counterpart: &str) -> String {
    format!("value \"{value}\" collides with the mapping for \"{counterpart}\" and would not survive a round trip")
}

fn map_value(
    body: &mut Map<String, Value>,
    path: &FieldPath,
    lookup: impl Fn(&str) -> Result<Option<String>, String>,
) -> Result<(), FieldError> {
    let Some(value) = path.get_mut(body) else {
        return Ok(());
    };
    match value {
        Value::Null => Ok(()),
        Value::String(current) => {
            let mapped = lookup(current).map_err(|reason| FieldError::new(path.to_string(), reason))?;
            if let Some(mapped) = mapped {
                *current = mapped;
            }
            Ok(())
        }
        other => Err(FieldError::new(
            path.to_string(),
            format!("expected a string, found {}", describe(other)),
        )),
    }
}

/// One served version of a kind, as declared in a definition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub rules: Vec<StructuralRule>,
}

/// A managed kind with all of its versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDefinition {
    pub group: String,
    pub kind: String,
    pub hub: String,
    pub versions: Vec<VersionDefinition>,
}

/// Top-level fields every managed resource may carry, all mappings
const COMMON_MAPPINGS: [&str; 3] = ["metadata", "spec", "status"];

/// Structural schema for one (group, kind, version)
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    identity: ResourceIdentity,
    fields: Vec<FieldSpec>,
    rules: Vec<StructuralRule>,
    is_hub: bool,
}

impl SchemaDescriptor {
    pub fn new(
        identity: ResourceIdentity,
        fields: Vec<FieldSpec>,
        rules: Vec<StructuralRule>,
        is_hub: bool,
    ) -> Self {
        Self {
            identity,
            fields,
            rules,
            is_hub,
        }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Rules carrying this version to the hub (empty for the hub itself)
    pub fn rules(&self) -> &[StructuralRule] {
        &self.rules
    }

    pub fn is_hub(&self) -> bool {
        self.is_hub
    }

    /// Check a document body against this version's declared structure.
    ///
    /// Returns the first violation: a missing required field or a present
    /// field of the wrong shape. A null value counts as absent.
    pub fn validate(&self, body: &Map<String, Value>) -> Result<(), FieldError> {
        for name in COMMON_MAPPINGS {
            if let Some(value) = body.get(name) {
                if !value.is_object() && !value.is_null() {
                    return Err(FieldError::new(
                        name,
                        format!("expected a mapping, found {}", describe(value)),
                    ));
                }
            }
        }

        for field in &self.fields {
            match field.path.get(body).filter(|value| !value.is_null()) {
                None if field.required => {
                    return Err(FieldError::new(field.path.to_string(), "required field is missing"));
                }
                Some(value) if !field.shape.matches(value) => {
                    return Err(FieldError::new(
                        field.path.to_string(),
                        format!("expected {}, found {}", field.shape.expected(), describe(value)),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
