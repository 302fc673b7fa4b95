//! Converter Graph
//!
//! Hub-and-spoke conversion between the versions of each managed kind. Every
//! registered version is a node; every spoke version has exactly two edges,
//! one to its kind's hub and one back. Spoke-to-spoke conversion always
//! passes through the hub, so it takes exactly two transforms and no spoke
//! pair ever needs its own converter.
//!
//! The graph is built once from a [`SchemaRegistry`] and never mutated, so it
//! can be shared across threads.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::Document;
use crate::error::{ConvertError, Result, VersionRole};
use crate::identity::ResourceIdentity;
use crate::path::FieldError;
use crate::registry::SchemaRegistry;
use crate::schema::StructuralRule;

/// Which way an edge crosses between a spoke and its hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    ToHub,
    FromHub,
}

/// One conversion step, spoke -> hub or hub -> spoke
#[derive(Debug, Clone)]
pub struct ConversionEdge {
    direction: EdgeDirection,
    rules: Vec<StructuralRule>,
}

impl ConversionEdge {
    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    /// Rewrite `body` across this edge.
    ///
    /// Towards the hub the spoke's rules run in declaration order; away from
    /// it their inverses run in reverse order.
    fn apply(&self, body: &mut Map<String, Value>) -> std::result::Result<(), FieldError> {
        match self.direction {
            EdgeDirection::ToHub => {
                for rule in &self.rules {
                    rule.apply(body)?;
                }
            }
            EdgeDirection::FromHub => {
                for rule in self.rules.iter().rev() {
                    rule.invert(body)?;
                }
            }
        }
        Ok(())
    }
}

/// How a document gets from its version to the target version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Already at the target version
    Identity,
    /// Spoke to its hub
    ToHub,
    /// Hub to one of its spokes
    FromHub,
    /// Spoke to spoke through the hub (two transforms)
    ThroughHub { hub: String },
}

/// Version conversion graph over every managed kind
#[derive(Debug, Clone)]
pub struct ConverterGraph {
    registry: Arc<SchemaRegistry>,
    graph: DiGraph<ResourceIdentity, ConversionEdge>,
    nodes: HashMap<ResourceIdentity, NodeIndex>,
}

impl ConverterGraph {
    /// Build the graph from every kind in `registry`
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for kind in registry.kinds() {
            for descriptor in kind.descriptors() {
                let index = graph.add_node(descriptor.identity().clone());
                nodes.insert(descriptor.identity().clone(), index);
            }

            let hub_identity = ResourceIdentity::new(
                kind.group_kind().group.clone(),
                kind.group_kind().kind.clone(),
                kind.hub(),
            );
            let Some(&hub) = nodes.get(&hub_identity) else {
                continue;
            };

            for descriptor in kind.descriptors().filter(|d| !d.is_hub()) {
                let spoke = nodes[descriptor.identity()];
                graph.add_edge(
                    spoke,
                    hub,
                    ConversionEdge {
                        direction: EdgeDirection::ToHub,
                        rules: descriptor.rules().to_vec(),
                    },
                );
                graph.add_edge(
                    hub,
                    spoke,
                    ConversionEdge {
                        direction: EdgeDirection::FromHub,
                        rules: descriptor.rules().to_vec(),
                    },
                );
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built converter graph"
        );

        Self {
            registry,
            graph,
            nodes,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Route from `source` to `target_version` of the same kind
    pub fn route(&self, source: &ResourceIdentity, target_version: &str) -> Result<Route> {
        let target = source.with_version(target_version);
        let path = self.path(source, &target)?;
        Ok(match path.as_slice() {
            [] => Route::Identity,
            [edge] => match self.graph[*edge].direction {
                EdgeDirection::ToHub => Route::ToHub,
                EdgeDirection::FromHub => Route::FromHub,
            },
            [up, _] => {
                let (_, hub) = self
                    .graph
                    .edge_endpoints(*up)
                    .ok_or_else(|| no_path(source, &target))?;
                Route::ThroughHub {
                    hub: self.graph[hub].version.clone(),
                }
            }
            _ => return Err(no_path(source, &target)),
        })
    }

    /// Edges from `source` to `target`: none, one, or two through the hub
    fn path(&self, source: &ResourceIdentity, target: &ResourceIdentity) -> Result<Vec<EdgeIndex>> {
        let node = |identity: &ResourceIdentity, role: VersionRole| -> Result<NodeIndex> {
            self.registry.resolve(identity, role)?;
            self.nodes.get(identity).copied().ok_or_else(|| no_path(source, target))
        };

        let from = node(source, VersionRole::Source)?;
        let to = node(target, VersionRole::Target)?;
        if from == to {
            return Ok(Vec::new());
        }
        if let Some(edge) = self.graph.find_edge(from, to) {
            return Ok(vec![edge]);
        }

        let hub_version = self
            .registry
            .hub_version(&source.group, &source.kind)
            .ok_or_else(|| no_path(source, target))?;
        let hub = self
            .nodes
            .get(&source.with_version(hub_version))
            .copied()
            .ok_or_else(|| no_path(source, target))?;

        match (self.graph.find_edge(from, hub), self.graph.find_edge(hub, to)) {
            (Some(up), Some(down)) => Ok(vec![up, down]),
            _ => Err(no_path(source, target)),
        }
    }

    /// Convert one document to `target_version` of its own kind.
    ///
    /// The input document is never modified. The source document is checked
    /// against its version's schema first, and the result against the target
    /// version's schema. Converting to the document's own version returns it
    /// unchanged.
    pub fn convert(&self, document: &Document, target_version: &str) -> Result<Document> {
        let source = document.identity();
        let target = source.with_version(target_version);

        let source_schema = self.registry.resolve(source, VersionRole::Source)?;
        let target_schema = self.registry.resolve(&target, VersionRole::Target)?;

        source_schema
            .validate(document.body())
            .map_err(|e| structural(source, e))?;

        let path = self.path(source, &target)?;
        if path.is_empty() {
            return Ok(document.clone());
        }

        let mut body = document.body().clone();
        for edge in &path {
            self.graph[*edge]
                .apply(&mut body)
                .map_err(|e| structural(source, e))?;
        }

        let converted = Document::with_body(target, body, document.position());
        target_schema
            .validate(converted.body())
            .map_err(|e| structural(converted.identity(), e))?;

        debug!(
            from = %source.api_version(),
            to = %converted.identity().api_version(),
            kind = %source.kind,
            steps = path.len(),
            "converted document"
        );
        Ok(converted)
    }
}

fn structural(identity: &ResourceIdentity, error: FieldError) -> ConvertError {
    ConvertError::StructuralConversionFailure {
        identity: identity.clone(),
        path: error.path,
        reason: error.reason,
    }
}

fn no_path(source: &ResourceIdentity, target: &ResourceIdentity) -> ConvertError {
    ConvertError::NoConversionPath {
        from: source.clone(),
        to: target.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> ConverterGraph {
        ConverterGraph::new(Arc::new(SchemaRegistry::builtin().unwrap()))
    }

    fn certificate(version: &str, spec: Value) -> Document {
        Document::from_value(
            json!({
                "apiVersion": format!("cert-manager.io/{version}"),
                "kind": "Certificate",
                "metadata": {"name": "example", "namespace": "default"},
                "spec": spec
            }),
            0,
        )
        .unwrap()
    }

    fn alpha2_spec() -> Value {
        json!({
            "secretName": "example-tls",
            "issuerRef": {"name": "ca-issuer", "kind": "Issuer"},
            "commonName": "example.com",
            "dnsNames": ["example.com", "www.example.com"],
            "organization": ["Jetstack"],
            "keyAlgorithm": "rsa",
            "keySize": 2048,
            "keyEncoding": "pkcs8",
            "emailSANs": ["admin@example.com"],
            "uriSANs": ["spiffe://example.com/ns/default"]
        })
    }

    #[test]
    fn test_graph_shape() {
        let g = graph();
        // six kinds with four versions each, three spokes per kind
        assert_eq!(g.node_count(), 24);
        assert_eq!(g.edge_count(), 6 * 3 * 2);
    }

    #[test]
    fn test_routes() {
        let g = graph();
        let alpha2 = ResourceIdentity::new("cert-manager.io", "Certificate", "v1alpha2");
        let hub = alpha2.with_version("v1");

        assert_eq!(g.route(&alpha2, "v1alpha2").unwrap(), Route::Identity);
        assert_eq!(g.route(&alpha2, "v1").unwrap(), Route::ToHub);
        assert_eq!(g.route(&hub, "v1beta1").unwrap(), Route::FromHub);
        assert_eq!(
            g.route(&alpha2, "v1alpha3").unwrap(),
            Route::ThroughHub { hub: "v1".to_string() }
        );
    }

    #[test]
    fn test_identity_conversion_is_unchanged() {
        let g = graph();
        let doc = certificate("v1alpha2", alpha2_spec());
        let converted = g.convert(&doc, "v1alpha2").unwrap();
        assert_eq!(converted, doc);
    }

    #[test]
    fn test_spoke_to_hub() {
        let g = graph();
        let converted = g.convert(&certificate("v1alpha2", alpha2_spec()), "v1").unwrap();
        assert_eq!(
            converted.into_value(),
            json!({
                "apiVersion": "cert-manager.io/v1",
                "kind": "Certificate",
                "metadata": {"name": "example", "namespace": "default"},
                "spec": {
                    "secretName": "example-tls",
                    "issuerRef": {"name": "ca-issuer", "kind": "Issuer"},
                    "commonName": "example.com",
                    "dnsNames": ["example.com", "www.example.com"],
                    "subject": {"organizations": ["Jetstack"]},
                    "privateKey": {"algorithm": "RSA", "size": 2048, "encoding": "PKCS8"},
                    "emailAddresses": ["admin@example.com"],
                    "uris": ["spiffe://example.com/ns/default"]
                }
            })
        );
    }

    #[test]
    fn test_organization_moves_between_alpha_versions() {
        let g = graph();
        let spec = json!({
            "secretName": "tls",
            "issuerRef": {"name": "ca"},
            "organization": ["Jetstack"]
        });
        let converted = g.convert(&certificate("v1alpha2", spec), "v1alpha3").unwrap();
        assert_eq!(converted.body()["apiVersion"], json!("cert-manager.io/v1alpha3"));
        assert_eq!(
            converted.body()["spec"],
            json!({
                "secretName": "tls",
                "issuerRef": {"name": "ca"},
                "subject": {"organizations": ["Jetstack"]}
            })
        );
    }

    #[test]
    fn test_round_trip_through_every_version() {
        let g = graph();
        let original = certificate("v1alpha2", alpha2_spec());
        for version in ["v1alpha3", "v1beta1", "v1"] {
            let there = g.convert(&original, version).unwrap();
            assert_eq!(there.identity().version, version);
            let back = g.convert(&there, "v1alpha2").unwrap();
            assert_eq!(back, original, "round trip through {version}");
        }
    }

    #[test]
    fn test_unknown_fields_survive() {
        let g = graph();
        let mut spec = alpha2_spec();
        spec["renewBefore"] = json!("360h");
        let doc = certificate("v1alpha2", spec);
        let converted = g.convert(&doc, "v1beta1").unwrap();
        assert_eq!(converted.body()["spec"]["renewBefore"], json!("360h"));
    }

    #[test]
    fn test_input_is_not_modified() {
        let g = graph();
        let doc = certificate("v1alpha2", alpha2_spec());
        let before = doc.clone();
        g.convert(&doc, "v1").unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_conflicting_fields_fail() {
        let g = graph();
        let mut spec = alpha2_spec();
        spec["subject"] = json!({"organizations": ["Other"]});
        let err = g.convert(&certificate("v1alpha2", spec), "v1").unwrap_err();
        match err {
            ConvertError::StructuralConversionFailure { path, .. } => {
                assert_eq!(path, "spec.organization");
            }
            other => panic!("Expected StructuralConversionFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_source_validation_fails_even_for_identity() {
        let g = graph();
        let doc = certificate("v1alpha2", json!({"issuerRef": {"name": "ca"}}));
        let err = g.convert(&doc, "v1alpha2").unwrap_err();
        match err {
            ConvertError::StructuralConversionFailure { path, .. } => {
                assert_eq!(path, "spec.secretName");
            }
            other => panic!("Expected StructuralConversionFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_versions() {
        let g = graph();
        let doc = certificate("v1alpha2", alpha2_spec());
        match g.convert(&doc, "v2").unwrap_err() {
            ConvertError::UnknownVersion { role, .. } => assert_eq!(role, VersionRole::Target),
            other => panic!("Expected UnknownVersion, got {:?}", other),
        }

        let doc = certificate("v1alpha1", alpha2_spec());
        match g.convert(&doc, "v1").unwrap_err() {
            ConvertError::UnknownVersion { role, .. } => assert_eq!(role, VersionRole::Source),
            other => panic!("Expected UnknownVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_challenge_type_values() {
        let g = graph();
        let doc = Document::from_value(
            json!({
                "apiVersion": "acme.cert-manager.io/v1alpha3",
                "kind": "Challenge",
                "spec": {
                    "url": "https://acme.example/chall/1",
                    "type": "dns-01",
                    "authzURL": "https://acme.example/authz/1"
                }
            }),
            0,
        )
        .unwrap();
        let converted = g.convert(&doc, "v1beta1").unwrap();
        assert_eq!(
            converted.body()["spec"],
            json!({
                "url": "https://acme.example/chall/1",
                "type": "DNS-01",
                "authorizationURL": "https://acme.example/authz/1"
            })
        );
    }

    #[test]
    fn test_hub_spelling_in_spoke_is_rejected() {
        let g = graph();
        let doc = Document::from_value(
            json!({
                "apiVersion": "acme.cert-manager.io/v1alpha2",
                "kind": "Challenge",
                "spec": {"url": "https://acme.example/chall/1", "type": "HTTP-01"}
            }),
            0,
        )
        .unwrap();
        match g.convert(&doc, "v1").unwrap_err() {
            ConvertError::StructuralConversionFailure { path, .. } => assert_eq!(path, "spec.type"),
            other => panic!("Expected StructuralConversionFailure, got {:?}", other),
        }

        let mut spec = alpha2_spec();
        spec["keyAlgorithm"] = json!("RSA");
        assert!(g.convert(&certificate("v1alpha2", spec), "v1alpha3").is_err());
    }

    #[test]
    fn test_null_optional_field_converts() {
        let g = graph();
        let mut spec = alpha2_spec();
        spec["commonName"] = Value::Null;
        spec["keyAlgorithm"] = Value::Null;
        let original = certificate("v1alpha2", spec);

        let converted = g.convert(&original, "v1alpha3").unwrap();
        assert_eq!(converted.body()["spec"]["commonName"], Value::Null);
        assert_eq!(converted.body()["spec"]["keyAlgorithm"], Value::Null);
        assert_eq!(g.convert(&converted, "v1alpha2").unwrap(), original);
    }

    #[test]
    fn test_scoped_registry_graph() {
        let yaml = r#"
group: example.io
kind: Widget
hub: v2
versions:
  - name: v2
    fields:
      - { path: spec.size, shape: integer, required: true }
  - name: v1
    fields:
      - { path: spec.width, shape: integer, required: true }
    rules:
      - { op: move, from: spec.width, to: spec.size }
"#;
        let registry = SchemaRegistry::builder()
            .load_str("inline", yaml)
            .unwrap()
            .build()
            .unwrap();
        let g = ConverterGraph::new(Arc::new(registry));
        let doc = Document::from_value(
            json!({"apiVersion": "example.io/v1", "kind": "Widget", "spec": {"width": 3}}),
            0,
        )
        .unwrap();
        let converted = g.convert(&doc, "v2").unwrap();
        assert_eq!(converted.body()["spec"], json!({"size": 3}));
    }
}
