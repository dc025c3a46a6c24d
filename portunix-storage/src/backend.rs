//! The `Backend` trait: the seam both the file datastore backend and the
//! plugin RPC adapter implement, generalizing the teacher's
//! `StorageBackend` trait (`aerolithdb-plugins/src/lib.rs`) from raw
//! bytes to the richer `Record`/`Query` types this crate needs.

use crate::query::Query;
use crate::record::{Metadata, Record, Value};
use crate::stats::{BackendHealth, DatastoreStats};
use async_trait::async_trait;

pub type BackendResult<T> = anyhow::Result<T>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable name this backend is registered under, for error messages
    /// and stats reporting.
    fn name(&self) -> &str;

    async fn store(&self, key: &str, value: Value, metadata: Metadata) -> BackendResult<Record>;

    async fn retrieve(&self, key: &str) -> BackendResult<Option<Record>>;

    async fn delete(&self, key: &str) -> BackendResult<bool>;

    /// Lists records whose key matches `glob` (spec.md §4.2's
    /// position-scan pattern).
    async fn list(&self, glob: &str) -> BackendResult<Vec<Record>>;

    /// Filters records by `query.collection`/`query.filter`. Does not
    /// sort or paginate — the manager applies `sort`/`limit`/`offset`
    /// once, globally, after concatenating every backend's results
    /// (spec.md §4.1 `Query`).
    async fn query(&self, query: &Query) -> BackendResult<Vec<Record>>;

    async fn health(&self) -> BackendResult<BackendHealth>;

    async fn stats(&self) -> BackendResult<DatastoreStats>;

    /// Releases any resources held (open file handles, RPC connections).
    /// Called once by the manager's `Close`; implementations must
    /// tolerate being called more than once.
    async fn shutdown(&self) -> BackendResult<()>;
}

/// Result of a fan-out operation across multiple backends (spec.md §9's
/// recommended improvement over all-or-nothing error handling): partial
/// results are always available, with the per-backend failures recorded
/// alongside so callers can decide how to react.
#[derive(Debug, Default)]
pub struct FanoutOutcome<T> {
    pub results: Vec<T>,
    pub errors: Vec<(String, String)>,
}

impl<T> FanoutOutcome<T> {
    pub fn is_total_failure(&self) -> bool {
        self.results.is_empty() && !self.errors.is_empty()
    }
}

/// Lazily initializes a single plugin-backed datastore on a
/// [`crate::manager::StorageManager`] read-miss (spec.md §4.1
/// "Concurrency"): locate the plugin, verify `database_access`, start it
/// if not running, connect, and return the resulting backend. Implemented
/// by `portunix-plugin`, which depends on this crate — keeping this crate
/// free of any dependency on the plugin transport itself.
#[async_trait]
pub trait PluginInitializer: Send + Sync {
    async fn initialize_plugin(&self, datastore_name: &str) -> anyhow::Result<std::sync::Arc<dyn Backend>>;
}
