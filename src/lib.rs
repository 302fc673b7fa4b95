//! Resource Version Converter
//!
//! Converts Kubernetes-style resource documents of the cert-manager family
//! between the API versions each kind is served at.
//!
//! ## Features
//!
//! - **Hub-and-Spoke Conversion**: every kind has one hub version; each other
//!   version only knows how to reach the hub and come back
//! - **Declarative Rules**: field moves and value mappings are data in
//!   `schemas/`, applied forwards and inverted backwards
//! - **All-or-Nothing Batches**: a list holding any unmanaged kind, or any
//!   item that fails to convert, produces an error and no output
//! - **Scoped Registries**: the registry is built explicitly and shared, so
//!   tests and callers can register their own kinds
//!
//! ## Architecture
//!
//! ```text
//! text ──codec──▶ Value ──Classifier──▶ Single | Batch
//!                                          │
//!                  ConversionDriver ◀──────┘
//!                    │  plan: foreign items, source + target versions
//!                    │  convert: ConverterGraph (spoke ─▶ hub ─▶ spoke)
//!                    ▼
//!                 normalized output ──codec──▶ text
//! ```

pub mod classify;
pub mod codec;
pub mod config;
pub mod converter;
pub mod document;
pub mod driver;
pub mod error;
pub mod identity;
pub mod path;
pub mod registry;
pub mod schema;

pub use classify::{Classifier, ItemClass};
pub use codec::OutputFormat;
pub use config::ConvertConfig;
pub use converter::{ConverterGraph, Route};
pub use document::{Collection, Document, Resources};
pub use driver::{ConversionDriver, TargetVersion};
pub use error::{ConvertError, Result, VersionRole};
pub use identity::{ApiVersion, GroupKind, ResourceIdentity};
pub use registry::SchemaRegistry;
pub use schema::{KindDefinition, SchemaDescriptor, StructuralRule};
