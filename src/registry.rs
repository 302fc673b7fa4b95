//! Schema Registry
//!
//! Immutable table of every managed (group, kind, version) and the hub version
//! of each kind. Built once from [`KindDefinition`]s, either the definitions
//! embedded in the binary or files loaded from disk, and shared read-only by
//! the classifier and the converter graph.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use include_dir::{include_dir, Dir};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{ConvertError, Result, VersionRole};
use crate::identity::{sort_by_priority, ApiVersion, GroupKind, ResourceIdentity, LIST_KIND};
use crate::schema::{KindDefinition, SchemaDescriptor};

/// Definition files compiled into the binary
static BUILTIN_SCHEMAS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// All registered versions of one kind
#[derive(Debug, Clone)]
pub struct KindSchema {
    group_kind: GroupKind,
    hub: String,
    versions: BTreeMap<String, SchemaDescriptor>,
}

impl KindSchema {
    pub fn group_kind(&self) -> &GroupKind {
        &self.group_kind
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }

    /// Version names, highest priority first
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.versions.keys().cloned().collect();
        sort_by_priority(&mut versions);
        versions
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.versions.values()
    }
}

/// The schema registry
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    kinds: BTreeMap<GroupKind, KindSchema>,
}

impl SchemaRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry of the definitions embedded at compile time
    pub fn builtin() -> Result<Self> {
        Self::builder().load_builtin()?.build()
    }

    /// Look up the schema for an exact identity
    pub fn lookup(&self, identity: &ResourceIdentity) -> Option<&SchemaDescriptor> {
        self.kinds
            .get(&identity.group_kind())
            .and_then(|kind| kind.versions.get(&identity.version))
    }

    /// Whether (group, kind) is managed at all, regardless of version
    pub fn is_known_kind(&self, group: &str, kind: &str) -> bool {
        self.kinds.contains_key(&GroupKind::new(group, kind))
    }

    /// Whether any managed kind lives in `group`
    pub fn is_known_group(&self, group: &str) -> bool {
        self.kinds.keys().any(|gk| gk.group == group)
    }

    /// Hub version of a managed kind
    pub fn hub_version(&self, group: &str, kind: &str) -> Option<&str> {
        self.kinds
            .get(&GroupKind::new(group, kind))
            .map(|kind| kind.hub.as_str())
    }

    /// Registered versions of a managed kind, highest priority first
    pub fn versions(&self, group: &str, kind: &str) -> Option<Vec<String>> {
        self.kinds
            .get(&GroupKind::new(group, kind))
            .map(KindSchema::versions)
    }

    pub fn kind(&self, group_kind: &GroupKind) -> Option<&KindSchema> {
        self.kinds.get(group_kind)
    }

    /// All managed kinds, ordered by group then kind
    pub fn kinds(&self) -> impl Iterator<Item = &KindSchema> {
        self.kinds.values()
    }

    /// Distinct managed groups, sorted
    pub fn groups(&self) -> Vec<String> {
        self.kinds
            .keys()
            .map(|gk| gk.group.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolve an identity to its schema, distinguishing an unknown kind from
    /// an unknown version of a known kind
    pub fn resolve(
        &self,
        identity: &ResourceIdentity,
        role: VersionRole,
    ) -> Result<&SchemaDescriptor> {
        let Some(kind) = self.kinds.get(&identity.group_kind()) else {
            return Err(ConvertError::UnknownKind {
                identity: identity.clone(),
                suggestion: self.suggest_kind(&identity.kind),
            });
        };
        kind.versions
            .get(&identity.version)
            .ok_or_else(|| ConvertError::UnknownVersion {
                kind: kind.group_kind.clone(),
                version: identity.version.clone(),
                role,
                known: kind.versions(),
            })
    }

    /// Closest managed kind name for a misspelled or unknown kind
    pub fn suggest_kind(&self, kind: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default().ignore_case();
        self.kinds
            .keys()
            .filter(|gk| gk.kind != kind)
            .filter_map(|gk| {
                matcher
                    .fuzzy_match(&gk.kind, kind)
                    .map(|score| (score, gk.kind.as_str()))
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, name)| name.to_string())
    }
}

/// Collects definitions and validates them into a [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: Vec<(String, KindDefinition)>,
}

impl RegistryBuilder {
    /// Add one definition; `origin` names it in error messages
    pub fn definition(mut self, origin: impl Into<String>, definition: KindDefinition) -> Self {
        self.definitions.push((origin.into(), definition));
        self
    }

    /// Parse definitions from YAML text (one or more `---` separated documents)
    pub fn load_str(mut self, origin: &str, source: &str) -> Result<Self> {
        for document in serde_yaml::Deserializer::from_str(source) {
            let definition = Option::<KindDefinition>::deserialize(document).map_err(|e| {
                ConvertError::InvalidDefinition {
                    origin: origin.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if let Some(definition) = definition {
                self.definitions.push((origin.to_string(), definition));
            }
        }
        Ok(self)
    }

    /// Add the definitions embedded at compile time
    pub fn load_builtin(self) -> Result<Self> {
        self.load_embedded(&BUILTIN_SCHEMAS)
    }

    /// Load every definition file from an embedded directory tree
    pub fn load_embedded(mut self, dir: &'static Dir<'static>) -> Result<Self> {
        let mut files = Vec::new();
        collect_embedded_files(dir, &mut files);
        files.sort_by(|a, b| a.0.cmp(b.0));

        for (path, content) in files {
            self = self.load_str(&path.display().to_string(), content)?;
        }
        Ok(self)
    }

    /// Load every `.yaml`/`.yml` definition file below `dir`
    pub fn load_dir(mut self, dir: &Path) -> Result<Self> {
        let entries = WalkDir::new(dir).sort_by_file_name().into_iter();
        for entry in entries {
            let entry = entry.map_err(|e| ConvertError::InvalidDefinition {
                origin: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() || !is_definition_file(path) {
                continue;
            }
            let content = fs::read_to_string(path)?;
            self = self.load_str(&path.display().to_string(), &content)?;
        }
        Ok(self)
    }

    /// Validate all definitions and build the registry
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut kinds = BTreeMap::new();

        for (origin, definition) in self.definitions {
            let invalid = |reason: String| ConvertError::InvalidDefinition {
                origin: origin.clone(),
                reason,
            };
            let group_kind = GroupKind::new(definition.group.clone(), definition.kind.clone());

            if definition.kind.is_empty() {
                return Err(invalid("kind is empty".to_string()));
            }
            if definition.group.is_empty() && definition.kind == LIST_KIND {
                return Err(invalid("the generic List kind cannot be registered".to_string()));
            }
            if kinds.contains_key(&group_kind) {
                return Err(invalid(format!("{group_kind} is defined more than once")));
            }
            if !definition.versions.iter().any(|v| v.name == definition.hub) {
                return Err(invalid(format!(
                    "hub version \"{}\" of {group_kind} is not among its versions",
                    definition.hub
                )));
            }

            let mut versions = BTreeMap::new();
            for version in definition.versions {
                if ApiVersion::parse(&version.name).is_none() {
                    return Err(invalid(format!(
                        "\"{}\" is not a valid API version",
                        version.name
                    )));
                }
                let is_hub = version.name == definition.hub;
                if is_hub && !version.rules.is_empty() {
                    return Err(invalid(format!(
                        "hub version \"{}\" of {group_kind} must not declare rules",
                        version.name
                    )));
                }
                for rule in &version.rules {
                    rule.check_invertible().map_err(|reason| invalid(reason))?;
                }
                if versions.contains_key(&version.name) {
                    return Err(invalid(format!(
                        "version \"{}\" of {group_kind} is declared more than once",
                        version.name
                    )));
                }

                let identity = ResourceIdentity::new(
                    definition.group.clone(),
                    definition.kind.clone(),
                    version.name.clone(),
                );
                versions.insert(
                    version.name,
                    SchemaDescriptor::new(identity, version.fields, version.rules, is_hub),
                );
            }

            kinds.insert(
                group_kind.clone(),
                KindSchema {
                    group_kind,
                    hub: definition.hub,
                    versions,
                },
            );
        }

        Ok(SchemaRegistry { kinds })
    }
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn collect_embedded_files(dir: &'static Dir<'static>, out: &mut Vec<(&'static Path, &'static str)>) {
    for file in dir.files() {
        if !is_definition_file(file.path()) {
            continue;
        }
        if let Some(content) = file.contents_utf8() {
            out.push((file.path(), content));
        }
    }
    for sub in dir.dirs() {
        collect_embedded_files(sub, out);
    }
}
