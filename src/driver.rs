//! Conversion Driver
//!
//! Runs one conversion request end to end: classify the input, reject foreign
//! content, resolve the target version of every item, convert each item
//! through the [`ConverterGraph`], normalize the results and reassemble them
//! in input order under the original wrapper.
//!
//! A request either yields fully converted output or an error. Batches are
//! planned completely (foreign items, source and target versions) before any
//! item is converted, and any per-item failure aborts the whole batch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::classify::Classifier;
use crate::converter::ConverterGraph;
use crate::document::{Document, Resources};
use crate::error::{ConvertError, Result, VersionRole};
use crate::identity::{split_api_version, ApiVersion};
use crate::registry::SchemaRegistry;

// ============================================================================
// Target version
// ============================================================================

/// Requested output version: `group/version` or a bare `version`.
///
/// The version applies to every item in its own group; a group, when given,
/// must be one the registry manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetVersion {
    pub group: Option<String>,
    pub version: String,
}

impl TargetVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            group: None,
            version: version.into(),
        }
    }
}

impl FromStr for TargetVersion {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConvertError::InvalidTarget("target version is empty".to_string()));
        }
        let (group, version) = split_api_version(s);
        if ApiVersion::parse(version).is_none() {
            return Err(ConvertError::InvalidTarget(format!(
                "\"{version}\" is not a valid API version"
            )));
        }
        let group = match group {
            "" if s.contains('/') => {
                return Err(ConvertError::InvalidTarget(format!(
                    "\"{s}\" has an empty group"
                )))
            }
            "" => None,
            group => Some(group.to_string()),
        };
        Ok(Self {
            group,
            version: version.to_string(),
        })
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}/{}", group, self.version),
            None => write!(f, "{}", self.version),
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Orchestrates classification and conversion over a shared registry
#[derive(Debug, Clone)]
pub struct ConversionDriver {
    registry: Arc<SchemaRegistry>,
    classifier: Classifier,
    graph: ConverterGraph,
}

impl ConversionDriver {
    /// Build a driver whose classifier and graph share `registry`
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            classifier: Classifier::new(Arc::clone(&registry)),
            graph: ConverterGraph::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// Driver over the built-in cert-manager definitions
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Arc::new(SchemaRegistry::builtin()?)))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn graph(&self) -> &ConverterGraph {
        &self.graph
    }

    /// Convert classified input to `target` (each item's hub when `None`).
    ///
    /// The input is left untouched; output keeps its shape, item order and
    /// wrapper fields.
    pub fn run(&self, input: &Resources, target: Option<&TargetVersion>) -> Result<Resources> {
        if let Some(target) = target {
            self.check_target_group(target)?;
        }
        self.classifier.ensure_convertible(input)?;

        match input {
            Resources::Single(document) => {
                let version = self.plan(document, target)?;
                let converted = normalize(self.graph.convert(document, &version)?);
                info!(
                    kind = %document.identity().kind,
                    from = %document.identity().version,
                    to = %version,
                    "converted document"
                );
                Ok(Resources::Single(converted))
            }
            Resources::Batch(collection) => {
                let plan = collection
                    .items()
                    .iter()
                    .map(|item| {
                        self.plan(item, target)
                            .map(|version| (item, version))
                            .map_err(|e| item_failed(item, e))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let converted = plan
                    .into_iter()
                    .map(|(item, version)| {
                        self.graph
                            .convert(item, &version)
                            .map(normalize)
                            .map_err(|e| item_failed(item, e))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let target = target.map_or_else(|| "hub".to_string(), ToString::to_string);
                info!(items = converted.len(), target = %target, "converted batch");
                Ok(Resources::Batch(collection.with_items(converted)))
            }
        }
    }

    /// Decode-free convenience: classify one value, convert it, and return
    /// the converted value
    pub fn convert_value(&self, value: Value, target: Option<&TargetVersion>) -> Result<Value> {
        let input = self.classifier.classify(value)?;
        Ok(self.run(&input, target)?.into_value())
    }

    /// Convert a stream of decoded documents; several documents come back as
    /// one synthesized list
    pub fn convert_documents(
        &self,
        values: Vec<Value>,
        target: Option<&TargetVersion>,
    ) -> Result<Value> {
        let input = self.classifier.classify_stream(values)?;
        Ok(self.run(&input, target)?.into_value())
    }

    fn check_target_group(&self, target: &TargetVersion) -> Result<()> {
        match &target.group {
            Some(group) if !self.registry.is_known_group(group) => {
                Err(ConvertError::UnknownTargetGroup {
                    group: group.clone(),
                    managed: self.registry.groups(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Resolve the version `document` converts to, checking both ends exist
    fn plan(&self, document: &Document, target: Option<&TargetVersion>) -> Result<String> {
        let identity = document.identity();
        self.registry.resolve(identity, VersionRole::Source)?;

        let version = match target {
            Some(target) => target.version.clone(),
            None => self
                .registry
                .hub_version(&identity.group, &identity.kind)
                .map(str::to_string)
                .ok_or_else(|| ConvertError::UnknownKind {
                    identity: identity.clone(),
                    suggestion: self.registry.suggest_kind(&identity.kind),
                })?,
        };
        self.registry
            .resolve(&identity.with_version(version.as_str()), VersionRole::Target)?;

        debug!(
            position = document.position(),
            identity = %identity,
            target = %version,
            "planned conversion"
        );
        Ok(version)
    }
}

fn item_failed(item: &Document, source: ConvertError) -> ConvertError {
    ConvertError::ItemFailed {
        position: item.position(),
        identity: item.identity().clone(),
        source: Box::new(source),
    }
}

/// Top-level sections every emitted resource carries
const NORMALIZED_SECTIONS: [&str; 3] = ["metadata", "spec", "status"];

/// Give a converted document the canonical resource layout: `metadata`,
/// `spec` and `status` mappings (empty when absent) and a
/// `metadata.creationTimestamp` (null when absent). Idempotent.
pub fn normalize(document: Document) -> Document {
    let identity = document.identity().clone();
    let position = document.position();
    let mut body = document.into_body();

    for section in NORMALIZED_SECTIONS {
        let entry = body.entry(section).or_insert(Value::Null);
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
    }
    if let Some(Value::Object(metadata)) = body.get_mut("metadata") {
        metadata
            .entry("creationTimestamp")
            .or_insert(Value::Null);
    }

    Document::with_body(identity, body, position)
}
