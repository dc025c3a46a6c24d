//! Request/response message shapes for the plugin RPC schema (spec.md
//! §4.3, §6.4), hand-written in the style of the teacher's
//! `aerolithdb-api/src/grpc.rs` manual `DataService` types rather than
//! generated from a `.proto` file — there is no protobuf schema to
//! compile against here, only the method set and field shapes spec.md
//! names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value crossing the wire as bytes tagged with a content type (spec.md
/// §4.3 "Serializes"/"Deserializes"). `content_type` is one of
/// `text/plain`, `application/octet-stream`, `application/json`; anything
/// else is treated as opaque bytes on the way back in (spec.md §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireValue {
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    pub key: String,
    pub value: WireValue,
    pub metadata: HashMap<String, String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub settings: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub key: String,
    pub value: WireValue,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    pub message: String,
    pub record: Option<WireRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub success: bool,
    pub message: String,
    pub record: Option<WireRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection: Option<String>,
    pub filter: HashMap<String, String>,
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_descending: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStatsRequest {}

/// Plugin-reported millisecond latencies (spec.md §4.3 "Statistics
/// mapping" — the adapter converts these to durations) and a
/// seconds-since-epoch `last_updated_timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStatsResponse {
    pub record_count: u64,
    pub bytes_stored: u64,
    #[serde(default)]
    pub collections: HashMap<String, u64>,
    #[serde(default)]
    pub latency_ms: HashMap<String, f64>,
    pub last_updated_timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShutdownRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownResponse {
    pub success: bool,
}
