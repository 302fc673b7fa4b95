//! Codec boundary
//!
//! Reads input sources into decoded documents and serializes converted output.
//! JSON is a subset of YAML, so one YAML decoder handles both input formats.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};

/// Path argument meaning standard input
pub const STDIN_PATH: &str = "-";

/// Output serialization format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Decode a YAML or JSON stream into documents.
///
/// `---` separated documents are returned in order; empty documents are
/// skipped.
pub fn decode_documents(source: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(source).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| ConvertError::MalformedInput(format!("document {index}: {e}")))?;
        if value.is_null() {
            warn!(document = index, "skipping empty document");
            continue;
        }
        documents.push(value);
    }
    Ok(documents)
}

/// Serialize a converted value
pub fn encode(value: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(value)?;
            text.push('\n');
            Ok(text)
        }
    }
}

/// Expand input paths into the files to read, in order.
///
/// Directories contribute their `.yaml`, `.yml` and `.json` files sorted by
/// name, descending into subdirectories only when `recursive` is set. `-`
/// is kept as is and stands for standard input.
pub fn expand_paths(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.as_os_str() == STDIN_PATH || path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            return Err(ConvertError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("the path \"{}\" does not exist", path.display()),
            )));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(path).max_depth(max_depth).sort_by_file_name() {
            let entry = entry.map_err(|e| ConvertError::Io(io::Error::other(e.to_string())))?;
            if entry.file_type().is_file() && is_input_file(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Read and decode every document from `paths`, in input order
pub fn read_sources(paths: &[PathBuf], recursive: bool) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for file in expand_paths(paths, recursive)? {
        let text = if file.as_os_str() == STDIN_PATH {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        } else {
            fs::read_to_string(&file)?
        };
        let decoded = decode_documents(&text).map_err(|e| match e {
            ConvertError::MalformedInput(reason) => {
                ConvertError::MalformedInput(format!("{}: {reason}", file.display()))
            }
            other => other,
        })?;
        debug!(file = %file.display(), documents = decoded.len(), "read input");
        documents.extend(decoded);
    }
    Ok(documents)
}

fn is_input_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml") | Some("json")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_multi_document_stream() {
        let source = "\
apiVersion: cert-manager.io/v1alpha2
kind: Issuer
---
---
apiVersion: v1
kind: Namespace
";
        let documents = decode_documents(source).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["kind"], json!("Issuer"));
        assert_eq!(documents[1]["kind"], json!("Namespace"));
    }

    #[test]
    fn test_decode_json() {
        let documents =
            decode_documents(r#"{"apiVersion": "cert-manager.io/v1", "kind": "Issuer", "spec": {}}"#)
                .unwrap();
        assert_eq!(documents, vec![json!({"apiVersion": "cert-manager.io/v1", "kind": "Issuer", "spec": {}})]);
    }

    #[test]
    fn test_decode_error_is_malformed_input() {
        let err = decode_documents("kind: [unterminated").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput(_)));
    }

    #[test]
    fn test_encode_formats() {
        let value = json!({"kind": "Issuer", "apiVersion": "cert-manager.io/v1"});
        let yaml = encode(&value, OutputFormat::Yaml).unwrap();
        assert_eq!(yaml, "apiVersion: cert-manager.io/v1\nkind: Issuer\n");

        let json_text = encode(&value, OutputFormat::Json).unwrap();
        assert!(json_text.ends_with("}\n"));
        assert_eq!(serde_json::from_str::<Value>(&json_text).unwrap(), value);
    }

    #[test]
    fn test_expand_paths_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "kind: B").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.yml"), "kind: C").unwrap();

        let flat = expand_paths(&[dir.path().to_path_buf()], false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml"]);

        let deep = expand_paths(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_expand_paths_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(expand_paths(&[missing], false).is_err());
    }

    #[test]
    fn test_read_sources_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.yaml");
        let second = dir.path().join("second.yaml");
        std::fs::write(&first, "apiVersion: v1\nkind: A\n---\napiVersion: v1\nkind: B\n").unwrap();
        std::fs::write(&second, "apiVersion: v1\nkind: C\n").unwrap();

        let documents = read_sources(&[second, first], false).unwrap();
        let kinds: Vec<_> = documents.iter().map(|d| d["kind"].clone()).collect();
        assert_eq!(kinds, vec![json!("C"), json!("A"), json!("B")]);
    }
}
