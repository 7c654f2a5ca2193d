//! Structural validation of an OpenAPI 3.0 document.
use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::resolve::REF_KEY;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("document has no `openapi` version field")]
    MissingVersion,
    #[error("unsupported API description version {0} (expected OpenAPI 3.0.x)")]
    UnsupportedVersion(String),
    #[error("at {path}: {message}")]
    Schema { path: String, message: String },
    #[error("dangling reference(s): {}", .0.join(", "))]
    DanglingRefs(Vec<String>),
}

pub fn validate(doc: &Value) -> Result<(), ValidationError> {
    check_version(doc)?;
    deserialize_with_path::<openapiv3::OpenAPI>(doc)?;

    let mut dangling = IndexSet::new();
    collect_dangling_refs(doc, doc, &mut dangling);
    if !dangling.is_empty() {
        return Err(ValidationError::DanglingRefs(dangling.into_iter().collect()));
    }
    tracing::debug!("API description is valid");
    Ok(())
}

fn check_version(doc: &Value) -> Result<(), ValidationError> {
    if let Some(swagger) = doc.get("swagger") {
        let version = format!("swagger {}", scalar_text(swagger));
        return Err(ValidationError::UnsupportedVersion(version));
    }
    match doc.get("openapi") {
        None => Err(ValidationError::MissingVersion),
        Some(Value::String(v)) if v.starts_with("3.0") => Ok(()),
        Some(other) => Err(ValidationError::UnsupportedVersion(scalar_text(other))),
    }
}

fn scalar_text(v: &Value) -> String {
    v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())
}

/// Deserialize with JSON-path context in error messages.
fn deserialize_with_path<T: DeserializeOwned>(doc: &Value) -> Result<T, ValidationError> {
    serde_path_to_error::deserialize(doc).map_err(|err| ValidationError::Schema {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Internal (`#/...`) references that do not land on anything.
fn collect_dangling_refs(node: &Value, root: &Value, out: &mut IndexSet<String>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(pointer)) = map.get(REF_KEY) {
                if let Some(path) = pointer.strip_prefix('#') {
                    if root.pointer(path).is_none() {
                        out.insert(pointer.clone());
                    }
                }
            }
            for value in map.values() {
                collect_dangling_refs(value, root, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_dangling_refs(item, root, out);
            }
        }
        _ => {}
    }
}
