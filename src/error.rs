//! Error types for resource conversion

use std::fmt;

use thiserror::Error;

use crate::identity::{GroupKind, ResourceIdentity};

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Which side of a conversion a version belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRole {
    /// The version a document declares
    Source,
    /// The version a document is being converted to
    Target,
}

impl fmt::Display for VersionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRole::Source => write!(f, "source"),
            VersionRole::Target => write!(f, "target"),
        }
    }
}

/// A batch item whose kind is not managed by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignItem {
    /// Position of the item within its batch
    pub position: usize,
    pub identity: ResourceIdentity,
}

impl fmt::Display for ForeignItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {} ({})", self.position, self.identity)
    }
}

/// Conversion errors
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("unknown resource type \"{identity}\"{}", did_you_mean(.suggestion))]
    UnknownKind {
        identity: ResourceIdentity,
        suggestion: Option<String>,
    },

    #[error("unknown {role} version \"{version}\" for {kind} (registered: {})", .known.join(", "))]
    UnknownVersion {
        kind: GroupKind,
        version: String,
        role: VersionRole,
        known: Vec<String>,
    },

    #[error("unknown target group \"{group}\" (managed groups: {})", .managed.join(", "))]
    UnknownTargetGroup { group: String, managed: Vec<String> },

    #[error("batch contains {} item(s) of unsupported resource types: {}", .items.len(), list_items(.items))]
    ForeignItems { items: Vec<ForeignItem> },

    #[error("cannot convert {identity}: field \"{path}\": {reason}")]
    StructuralConversionFailure {
        identity: ResourceIdentity,
        path: String,
        reason: String,
    },

    #[error("no conversion path from {from} to {to}")]
    NoConversionPath {
        from: ResourceIdentity,
        to: ResourceIdentity,
    },

    #[error("item {position} ({identity}): {source}")]
    ItemFailed {
        position: usize,
        identity: ResourceIdentity,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("document {position} is missing type information: {reason}")]
    MissingTypeInformation { position: usize, reason: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid target version: {0}")]
    InvalidTarget(String),

    #[error("invalid schema definition in {origin}: {reason}")]
    InvalidDefinition { origin: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConvertError {
    /// The innermost error, looking through batch item wrappers
    pub fn root_cause(&self) -> &ConvertError {
        match self {
            ConvertError::ItemFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(kind) => format!(", did you mean \"{kind}\"?"),
        None => String::new(),
    }
}

fn list_items(items: &[ForeignItem]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
