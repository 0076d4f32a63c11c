//! Change-detection hashing
//!
//! A pod template annotated with the hash of the objects it depends on is
//! rolled whenever one of them changes.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::objects::Object;

/// Pod template annotation carrying a config hash
pub const CHECKSUM_CONFIG_ANNOTATION: &str = "stowage.io/checksum_config";

/// Recursively sort map keys
pub fn canonicalize(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            JsonValue::Object(sorted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// SHA-256 over the canonical YAML of each object, in order.
///
/// Takes the producer's result directly so an error passes through untouched.
pub fn object_hash(objects: Result<Vec<Object>>) -> Result<String> {
    let objects = objects?;
    let mut hasher = Sha256::new();
    for object in &objects {
        let yaml = serde_yaml::to_string(&canonicalize(object.value()))?;
        hasher.update(yaml.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}
