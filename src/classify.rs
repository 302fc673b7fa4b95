//! Document Classification
//!
//! Decides the shape of decoded input (a single resource or a list batch)
//! and whether each document belongs to a kind the registry manages.
//!
//! Foreign content is never passed through: a foreign single document fails
//! with `UnknownKind`, and a batch holding any foreign item fails as a whole
//! with `ForeignItems` naming every offender.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::document::{Collection, Document, Resources};
use crate::error::{ConvertError, ForeignItem, Result};
use crate::identity::ResourceIdentity;
use crate::registry::SchemaRegistry;

/// Whether a document can be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemClass {
    Convertible,
    /// (group, kind) is not managed by the registry
    Foreign(ResourceIdentity),
}

/// Classifies decoded documents against a registry
#[derive(Debug, Clone)]
pub struct Classifier {
    registry: Arc<SchemaRegistry>,
}

impl Classifier {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Classify one decoded document by shape.
    ///
    /// A `kind: List` wrapper becomes a batch of its items; anything else is a
    /// single document.
    pub fn classify(&self, decoded: Value) -> Result<Resources> {
        let document = Document::from_value(decoded, 0)?;
        if document.identity().is_list() {
            let collection = Collection::from_wrapper(document.into_body())?;
            debug!(items = collection.len(), "classified input as list batch");
            Ok(Resources::Batch(collection))
        } else {
            debug!(identity = %document.identity(), "classified input as single document");
            Ok(Resources::Single(document))
        }
    }

    /// Classify a stream of decoded documents (e.g. a multi-document YAML file
    /// or several input files).
    ///
    /// One document is classified on its own. Several are combined into a
    /// synthesized list batch; list documents among them are flattened into
    /// their items so the batch stays one level deep.
    pub fn classify_stream(&self, mut decoded: Vec<Value>) -> Result<Resources> {
        match decoded.len() {
            0 => Err(ConvertError::MalformedInput("no documents in input".to_string())),
            1 => self.classify(decoded.remove(0)),
            _ => {
                let mut flattened = Vec::with_capacity(decoded.len());
                for (position, value) in decoded.into_iter().enumerate() {
                    let document = Document::from_value(value, position)?;
                    if document.identity().is_list() {
                        let collection = Collection::from_wrapper(document.into_body())?;
                        flattened.extend(collection.items().iter().cloned().map(Document::into_value));
                    } else {
                        flattened.push(document.into_value());
                    }
                }
                debug!(items = flattened.len(), "combined input documents into list batch");
                Ok(Resources::Batch(Collection::synthesize(flattened)?))
            }
        }
    }

    /// Tag a single document as convertible or foreign
    pub fn tag(&self, document: &Document) -> ItemClass {
        let identity = document.identity();
        if self.registry.is_known_kind(&identity.group, &identity.kind) {
            ItemClass::Convertible
        } else {
            ItemClass::Foreign(identity.clone())
        }
    }

    /// Fail unless every document in `resources` is convertible
    pub fn ensure_convertible(&self, resources: &Resources) -> Result<()> {
        match resources {
            Resources::Single(document) => match self.tag(document) {
                ItemClass::Convertible => Ok(()),
                ItemClass::Foreign(identity) => Err(ConvertError::UnknownKind {
                    suggestion: self.registry.suggest_kind(&identity.kind),
                    identity,
                }),
            },
            Resources::Batch(collection) => {
                let foreign: Vec<ForeignItem> = collection
                    .items()
                    .iter()
                    .filter_map(|item| match self.tag(item) {
                        ItemClass::Convertible => None,
                        ItemClass::Foreign(identity) => Some(ForeignItem {
                            position: item.position(),
                            identity,
                        }),
                    })
                    .collect();
                if foreign.is_empty() {
                    Ok(())
                } else {
                    Err(ConvertError::ForeignItems { items: foreign })
                }
            }
        }
    }
}
