//! Health and statistics types returned by `StorageManager::health` and
//! `::stats` (spec.md §4.1: "returns a map `plugin → HealthStatus`" /
//! "returns a map `plugin → Stats`"), modeled after the teacher's
//! `StorageResult<T>` envelope in `aerolithdb-storage/src/lib.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub status: String,
    pub message: Option<String>,
}

impl BackendHealth {
    pub fn ok() -> Self {
        Self {
            healthy: true,
            status: "ok".to_string(),
            message: None,
        }
    }

    /// Errors become `{healthy=false, status="error", message=err}`
    /// (spec.md §4.1 `Health`).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

/// `plugin → HealthStatus` (spec.md §4.1 `Health`).
pub type HealthMap = HashMap<String, BackendHealth>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatastoreStats {
    pub record_count: u64,
    pub bytes_stored: u64,
    /// Per-collection key count, keyed by the top-level directory
    /// (spec.md §4.2 "Statistics").
    #[serde(default)]
    pub collections: HashMap<String, u64>,
    /// Per-operation latency, keyed by operation name. Populated by
    /// backends that report it (spec.md §4.3 "Statistics mapping":
    /// plugin-reported millisecond latencies become durations); file
    /// backends leave this empty.
    #[serde(default)]
    pub latency: HashMap<String, Duration>,
    /// When these stats were last refreshed. Plugin backends interpret
    /// their wire `last_updated_timestamp` as seconds-since-epoch
    /// (spec.md §4.3 "Statistics mapping").
    pub last_updated: Option<DateTime<Utc>>,
}

/// `plugin → Stats`; backends that fail are omitted (spec.md §4.1 `Stats`).
pub type StatsMap = HashMap<String, DatastoreStats>;
