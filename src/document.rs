//! Document model
//!
//! A [`Document`] is one decoded resource: its body (an ordered mapping), the
//! identity parsed from `apiVersion`/`kind`, and its position in the input.
//! A [`Collection`] is a list wrapper with its member documents.

use serde_json::{Map, Value};

use crate::error::{ConvertError, Result};
use crate::identity::{ResourceIdentity, LIST_API_VERSION, LIST_KIND};

/// Key the item sequence is read from and written back to
pub const ITEMS_KEY: &str = "items";

/// Capitalized spelling emitted by some older tooling for synthesized lists
pub const LEGACY_ITEMS_KEY: &str = "Items";

/// One resource document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    identity: ResourceIdentity,
    body: Map<String, Value>,
    position: usize,
}

impl Document {
    /// Build a document from a decoded value.
    ///
    /// The value must be a mapping with string `apiVersion` and `kind` fields.
    pub fn from_value(value: Value, position: usize) -> Result<Self> {
        let Value::Object(body) = value else {
            return Err(ConvertError::MissingTypeInformation {
                position,
                reason: "document is not a mapping".to_string(),
            });
        };
        let identity = type_meta(&body, position)?;
        Ok(Self {
            identity,
            body,
            position,
        })
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Position in the original input (index within its batch, 0 for a single)
    pub fn position(&self) -> usize {
        self.position
    }

    /// The same content under a new identity; `apiVersion` is rewritten to match
    pub fn with_body(identity: ResourceIdentity, mut body: Map<String, Value>, position: usize) -> Self {
        body.insert("apiVersion".to_string(), Value::String(identity.api_version()));
        body.insert("kind".to_string(), Value::String(identity.kind.clone()));
        Self {
            identity,
            body,
            position,
        }
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

fn type_meta(body: &Map<String, Value>, position: usize) -> Result<ResourceIdentity> {
    let api_version = string_field(body, "apiVersion", position)?;
    let kind = string_field(body, "kind", position)?;
    Ok(ResourceIdentity::from_type_meta(api_version, kind))
}

fn string_field<'a>(body: &'a Map<String, Value>, name: &str, position: usize) -> Result<&'a str> {
    match body.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
        Some(_) => Err(ConvertError::MissingTypeInformation {
            position,
            reason: format!("\"{name}\" must be a non-empty string"),
        }),
        None => Err(ConvertError::MissingTypeInformation {
            position,
            reason: format!("\"{name}\" is not set"),
        }),
    }
}

/// A list wrapper and its member documents, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Wrapper fields other than the item sequence, carried through untouched
    wrapper: Map<String, Value>,
    items_key: String,
    items: Vec<Document>,
}

impl Collection {
    /// Unwrap a decoded `kind: List` mapping into its items.
    ///
    /// A wrapper may carry `items` or the legacy `Items`, never both.
    pub fn from_wrapper(mut wrapper: Map<String, Value>) -> Result<Self> {
        let items_key = match (wrapper.contains_key(ITEMS_KEY), wrapper.contains_key(LEGACY_ITEMS_KEY)) {
            (true, true) => {
                return Err(ConvertError::MalformedInput(format!(
                    "list has both \"{ITEMS_KEY}\" and \"{LEGACY_ITEMS_KEY}\""
                )))
            }
            (false, true) => LEGACY_ITEMS_KEY,
            _ => ITEMS_KEY,
        };
        let items = match wrapper.remove(items_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ConvertError::MalformedInput(format!(
                    "list \"{items_key}\" must be a sequence"
                )))
            }
        };

        let items = items
            .into_iter()
            .enumerate()
            .map(|(position, item)| Document::from_value(item, position))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            wrapper,
            items_key: items_key.to_string(),
            items,
        })
    }

    /// Wrap documents in a fresh `apiVersion: v1, kind: List` wrapper
    pub fn synthesize(documents: Vec<Value>) -> Result<Self> {
        let items = documents
            .into_iter()
            .enumerate()
            .map(|(position, item)| Document::from_value(item, position))
            .collect::<Result<Vec<_>>>()?;
        let mut wrapper = Map::new();
        wrapper.insert("apiVersion".to_string(), Value::String(LIST_API_VERSION.to_string()));
        wrapper.insert("kind".to_string(), Value::String(LIST_KIND.to_string()));
        Ok(Self {
            wrapper,
            items_key: ITEMS_KEY.to_string(),
            items,
        })
    }

    pub fn items(&self) -> &[Document] {
        &self.items
    }

    pub fn items_key(&self) -> &str {
        &self.items_key
    }

    pub fn wrapper(&self) -> &Map<String, Value> {
        &self.wrapper
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Same wrapper with a replacement item sequence
    pub fn with_items(&self, items: Vec<Document>) -> Self {
        Self {
            wrapper: self.wrapper.clone(),
            items_key: self.items_key.clone(),
            items,
        }
    }

    pub fn into_value(self) -> Value {
        let mut wrapper = self.wrapper;
        let items = self.items.into_iter().map(Document::into_value).collect();
        wrapper.insert(self.items_key, Value::Array(items));
        Value::Object(wrapper)
    }
}

/// Decoded input, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum Resources {
    Single(Document),
    Batch(Collection),
}

impl Resources {
    pub fn into_value(self) -> Value {
        match self {
            Resources::Single(doc) => doc.into_value(),
            Resources::Batch(collection) => collection.into_value(),
        }
    }

    /// Every document, in input order
    pub fn documents(&self) -> &[Document] {
        match self {
            Resources::Single(doc) => std::slice::from_ref(doc),
            Resources::Batch(collection) => collection.items(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_from_value() {
        let doc = Document::from_value(
            json!({"apiVersion": "cert-manager.io/v1alpha2", "kind": "Issuer", "spec": {}}),
            3,
        )
        .unwrap();
        assert_eq!(doc.identity().kind, "Issuer");
        assert_eq!(doc.identity().version, "v1alpha2");
        assert_eq!(doc.position(), 3);
    }

    #[test]
    fn test_document_requires_type_meta() {
        let err = Document::from_value(json!({"kind": "Issuer"}), 0).unwrap_err();
        assert!(err.to_string().contains("\"apiVersion\" is not set"));

        let err = Document::from_value(json!({"apiVersion": "v1", "kind": 7}), 1).unwrap_err();
        assert!(err.to_string().contains("document 1"));

        assert!(Document::from_value(json!(["not", "a", "mapping"]), 0).is_err());
    }

    #[test]
    fn test_with_body_rewrites_api_version() {
        let doc = Document::from_value(
            json!({"apiVersion": "cert-manager.io/v1alpha2", "kind": "Issuer"}),
            0,
        )
        .unwrap();
        let target = doc.identity().with_version("v1");
        let converted = Document::with_body(target, doc.body().clone(), doc.position());
        assert_eq!(converted.body()["apiVersion"], json!("cert-manager.io/v1"));
    }

    #[test]
    fn test_collection_round_trip_keeps_wrapper_and_order() {
        let wrapper = json!({
            "apiVersion": "v1",
            "kind": "List",
            "metadata": {"resourceVersion": ""},
            "items": [
                {"apiVersion": "cert-manager.io/v1", "kind": "Issuer", "metadata": {"name": "a"}},
                {"apiVersion": "cert-manager.io/v1", "kind": "Issuer", "metadata": {"name": "b"}}
            ]
        });
        let collection = Collection::from_wrapper(wrapper.as_object().unwrap().clone()).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.items()[1].position(), 1);
        assert_eq!(collection.into_value(), wrapper);
    }

    #[test]
    fn test_collection_legacy_items_key() {
        let wrapper = json!({"apiVersion": "v1", "kind": "List", "Items": []});
        let collection = Collection::from_wrapper(wrapper.as_object().unwrap().clone()).unwrap();
        assert_eq!(collection.items_key(), LEGACY_ITEMS_KEY);
        assert!(collection.is_empty());
        assert_eq!(collection.into_value(), wrapper);
    }

    #[test]
    fn test_collection_rejects_non_sequence_items() {
        let wrapper = json!({"apiVersion": "v1", "kind": "List", "items": {"a": 1}});
        assert!(Collection::from_wrapper(wrapper.as_object().unwrap().clone()).is_err());
    }

    #[test]
    fn test_collection_rejects_both_items_keys() {
        let wrapper = json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": [{"apiVersion": "cert-manager.io/v1alpha2", "kind": "Issuer"}],
            "Items": [{"apiVersion": "v1", "kind": "Namespace"}]
        });
        match Collection::from_wrapper(wrapper.as_object().unwrap().clone()).unwrap_err() {
            ConvertError::MalformedInput(message) => {
                assert!(message.contains("\"items\"") && message.contains("\"Items\""));
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_synthesize() {
        let collection = Collection::synthesize(vec![
            json!({"apiVersion": "cert-manager.io/v1", "kind": "Issuer"}),
            json!({"apiVersion": "v1", "kind": "Namespace"}),
        ])
        .unwrap();
        let value = collection.into_value();
        assert_eq!(value["kind"], json!("List"));
        assert_eq!(value["apiVersion"], json!("v1"));
        assert_eq!(value["items"][1]["kind"], json!("Namespace"));
    }
}
