//! Conversions across the plugin boundary: `portunix_storage::Value`
//! (the typed value this crate's `Backend` consumers see) to and from
//! [`WireValue`] (content-type-tagged bytes, spec.md §4.3), and
//! `Metadata` (string→dynamic) to and from a plain `string→string` map
//! the wire schema carries (spec.md §4.3 "Metadata", §6.4).

use crate::wire::{WireRecord, WireValue};
use chrono::{DateTime, Utc};
use portunix_storage::{Metadata, Record, Value};
use std::collections::HashMap;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_BYTES: &str = "application/octet-stream";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Outgoing value encoding (spec.md §4.3 "Serializes"):
/// `string → (utf-8 bytes, "text/plain")`; `bytes → (bytes,
/// "application/octet-stream")`; anything else → JSON-encoded with
/// `"application/json"`.
pub fn encode_value(value: &Value) -> WireValue {
    match value {
        Value::Text(s) => WireValue {
            content_type: CONTENT_TYPE_TEXT.to_string(),
            data: s.as_bytes().to_vec(),
        },
        Value::Bytes(b) => WireValue {
            content_type: CONTENT_TYPE_BYTES.to_string(),
            data: b.clone(),
        },
        Value::Json(j) => WireValue {
            content_type: CONTENT_TYPE_JSON.to_string(),
            data: serde_json::to_vec(j).unwrap_or_default(),
        },
    }
}

/// Incoming value decoding by content type; unknown types fall through
/// as raw bytes (spec.md §4.3 "Deserializes").
pub fn decode_value(wire: &WireValue) -> Value {
    match wire.content_type.as_str() {
        CONTENT_TYPE_TEXT => String::from_utf8(wire.data.clone())
            .map(Value::Text)
            .unwrap_or_else(|_| Value::Bytes(wire.data.clone())),
        CONTENT_TYPE_JSON => serde_json::from_slice(&wire.data)
            .map(Value::Json)
            .unwrap_or_else(|_| Value::Bytes(wire.data.clone())),
        _ => Value::Bytes(wire.data.clone()),
    }
}

/// Metadata crosses as `string→string`; dynamic values are JSON-encoded
/// when not already strings (spec.md §4.3 "Metadata").
pub fn encode_metadata(metadata: &Metadata) -> HashMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| {
            let encoded = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), encoded)
        })
        .collect()
}

/// Best-effort JSON-decoded on return, falling back to a raw string
/// (spec.md §4.3 "Metadata").
pub fn decode_metadata(wire: &HashMap<String, String>) -> Metadata {
    wire.iter()
        .map(|(k, v)| {
            let decoded = serde_json::from_str(v).unwrap_or_else(|_| serde_json::Value::String(v.clone()));
            (k.clone(), decoded)
        })
        .collect()
}

pub fn encode_record(key: &str, value: &Value, metadata: &Metadata) -> (WireValue, HashMap<String, String>) {
    (encode_value(value), encode_metadata(metadata))
}

pub fn decode_record(wire: &WireRecord) -> Record {
    Record {
        key: wire.key.clone(),
        value: decode_value(&wire.value),
        metadata: decode_metadata(&wire.metadata),
        created_at: wire.created_at.as_deref().and_then(parse_timestamp),
        updated_at: wire.updated_at.as_deref().and_then(parse_timestamp),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
