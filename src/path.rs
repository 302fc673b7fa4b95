//! Dotted field paths into a document body
//!
//! Paths address nested mappings from the document root, e.g.
//! `spec.subject.organizations`. Sequences are never traversed; rules only
//! move whole values between mapping keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A path of mapping keys from the document root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

/// Why a path operation failed, with the path that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl FieldPath {
    /// Parse a dotted path; empty segments are rejected
    pub fn parse(path: &str) -> Result<Self, String> {
        if path.is_empty() {
            return Err("field path is empty".to_string());
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("field path \"{path}\" has an empty segment"));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Dotted form of the first `len` segments
    fn prefix(&self, len: usize) -> String {
        self.0[..len].join(".")
    }

    /// Look up the value at this path, if every step is a mapping
    pub fn get<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (last, parents) = self.0.split_last()?;
        let mut current = root;
        for segment in parents {
            current = current.get(segment)?.as_object()?;
        }
        current.get(last)
    }

    pub fn get_mut<'a>(&self, root: &'a mut Map<String, Value>) -> Option<&'a mut Value> {
        let (last, parents) = self.0.split_last()?;
        let mut current = root;
        for segment in parents {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.get_mut(last)
    }

    /// Remove and return the value at this path.
    ///
    /// Parent mappings left empty by the removal are pruned, except the
    /// top-level field itself.
    pub fn take(&self, root: &mut Map<String, Value>) -> Option<Value> {
        take_segments(root, &self.0, 0)
    }

    /// Insert a value at this path, creating intermediate mappings.
    ///
    /// Fails if the destination is already occupied or an intermediate step
    /// exists but is not a mapping.
    pub fn insert(&self, root: &mut Map<String, Value>, value: Value) -> Result<(), FieldError> {
        let Some((last, parents)) = self.0.split_last() else {
            return Err(FieldError::new("", "empty field path"));
        };
        let mut current = root;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                other => {
                    return Err(FieldError::new(
                        self.prefix(depth + 1),
                        format!("expected a mapping, found {}", describe(other)),
                    ))
                }
            };
        }
        if current.contains_key(last) {
            return Err(FieldError::new(self.to_string(), "destination is already set"));
        }
        current.insert(last.clone(), value);
        Ok(())
    }
}

fn take_segments(map: &mut Map<String, Value>, segments: &[String], depth: usize) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return map.remove(first);
    }
    let child = map.get_mut(first)?.as_object_mut()?;
    let taken = take_segments(child, rest, depth + 1)?;
    if child.is_empty() && depth > 0 {
        map.remove(first);
    }
    Some(taken)
}

/// Short description of a value's shape for error messages
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "an integer",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}
