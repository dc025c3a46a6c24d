//! Value and record types crossing the storage/backend seam.
//!
//! `Value` is the tagged variant spec.md §9 recommends in place of raw
//! bytes + content-type string: a small enum for the content types the
//! system actually understands, with everything else falling back to
//! `Bytes`. Grounded on the teacher's `DocumentMetadata`
//! (`aerolithdb-storage/src/lib.rs`) for the record shape, generalized from
//! a fixed document schema to the unconstrained `(key, value, metadata)`
//! triple spec.md §3 describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stored value, tagged by the content type it was produced from.
///
/// Unknown content types collapse to `Bytes` on the way in; there is no
/// variant for them because by definition the adapter cannot interpret
/// their structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Value {
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    /// MIME-ish content type this value serializes to on the wire.
    pub fn content_type(&self) -> &'static str {
        match self {
            Value::Text(_) => "text/plain",
            Value::Bytes(_) => "application/octet-stream",
            Value::Json(_) => "application/json",
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

/// Metadata map crossing the storage boundary: string keys to dynamic
/// (JSON-representable) values, per spec.md §3.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A stored item: unique key, unconstrained value, metadata map, and (for
/// backends that track it) creation/update timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Value,
    pub metadata: Metadata,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<Value>, metadata: Metadata) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            metadata,
            created_at: None,
            updated_at: None,
        }
    }
}

/// A filter over record metadata: every listed key must be present with
/// exactly the given value for the record to pass (spec.md §4.1 `Retrieve`).
pub type Filter = HashMap<String, serde_json::Value>;

/// Returns whether `metadata` satisfies every constraint in `filter`.
pub fn matches_filter(metadata: &Metadata, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(k, v)| metadata.get(k).map(|mv| mv == v).unwrap_or(false))
}
