//! Canonical JSON for reproducible artifact hashes
//!
//! Object keys are sorted recursively and output is compact, so the same
//! bundle always serialises to the same bytes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Serialise with sorted keys and no whitespace
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let value = serde_json::to_value(value).map_err(|e| CanonicalError::Serialization(e.to_string()))?;
    serde_json::to_string(&sort_keys(value)).map_err(|e| CanonicalError::Serialization(e.to_string()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Blake3 digest of raw bytes as lowercase hex
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Blake3 digest of the canonical JSON form
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    Ok(hash_hex(to_canonical_json(value)?.as_bytes()))
}
