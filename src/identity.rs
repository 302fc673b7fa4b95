//! Resource identity and API version utilities
//!
//! A document declares its type through `apiVersion` (`group/version`, or a
//! bare `version` for the core group) and `kind`. This module parses those
//! into a [`ResourceIdentity`] and provides Kubernetes version priority
//! ordering through [`ApiVersion`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// Kind of the generic list wrapper (`apiVersion: v1, kind: List`)
pub const LIST_KIND: &str = "List";

/// API version used when synthesizing a list wrapper
pub const LIST_API_VERSION: &str = "v1";

/// Split an `apiVersion` string into `(group, version)`.
///
/// The core group has no prefix, so `"v1"` yields `("", "v1")`.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// A (group, kind) pair, independent of version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Identifies one schema: (group, kind, version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub group: String,
    pub kind: String,
    pub version: String,
}

impl ResourceIdentity {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            version: version.into(),
        }
    }

    /// Build an identity from a document's `apiVersion` and `kind` fields
    pub fn from_type_meta(api_version: &str, kind: &str) -> Self {
        let (group, version) = split_api_version(api_version);
        Self::new(group, kind, version)
    }

    /// The `apiVersion` string for this identity (e.g. "cert-manager.io/v1")
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group.clone(), self.kind.clone())
    }

    /// Same group and kind at another version
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            group: self.group.clone(),
            kind: self.kind.clone(),
            version: version.into(),
        }
    }

    /// Whether this is the generic list wrapper
    pub fn is_list(&self) -> bool {
        self.group.is_empty() && self.kind == LIST_KIND
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Maturity stage of a Kubernetes API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Alpha,
    Beta,
    Stable,
}

/// A parsed Kubernetes API version such as `v1`, `v1beta1` or `v1alpha2`
///
/// Ordering follows Kubernetes version priority: any stable version sorts
/// above any beta, beta above alpha, then higher major and minor numbers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub stage: Stage,
    pub minor: u32,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^v([1-9][0-9]*)(?:(alpha|beta)([1-9][0-9]*))?$")
            .expect("version pattern is a valid regex")
    })
}

impl ApiVersion {
    /// Parse a Kubernetes-style version string, returning `None` if it does
    /// not follow the `v<major>[(alpha|beta)<minor>]` pattern
    pub fn parse(version: &str) -> Option<Self> {
        let caps = version_pattern().captures(version)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let (stage, minor) = match (caps.get(2), caps.get(3)) {
            (Some(stage), Some(minor)) => {
                let stage = match stage.as_str() {
                    "alpha" => Stage::Alpha,
                    _ => Stage::Beta,
                };
                (stage, minor.as_str().parse().ok()?)
            }
            _ => (Stage::Stable, 0),
        };
        Some(Self { major, stage, minor })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Stage::Stable => write!(f, "v{}", self.major),
            Stage::Beta => write!(f, "v{}beta{}", self.major, self.minor),
            Stage::Alpha => write!(f, "v{}alpha{}", self.major, self.minor),
        }
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.stage
            .cmp(&other.stage)
            .then(self.major.cmp(&other.major))
            .then(self.minor.cmp(&other.minor))
    }
}

/// Sort version strings by descending Kubernetes priority.
///
/// Strings that don't parse sort last, alphabetically.
pub fn sort_by_priority(versions: &mut [String]) {
    versions.sort_by(|a, b| match (ApiVersion::parse(a), ApiVersion::parse(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}
