//! Plugin RPC Adapter (spec.md §4.3): presents a plugin speaking the
//! datastore gRPC schema as a local [`portunix_storage::Backend`],
//! translating values, metadata, and errors across the boundary.

use crate::client::DatastorePluginClient;
use crate::convert::{decode_record, encode_metadata, encode_record};
use crate::descriptor::PluginEndpoint;
use crate::error::PluginError;
use crate::wire::{
    DeleteRequest, GetStatsRequest, HealthRequest, ListRequest, QueryRequest as WireQueryRequest,
    RetrieveRequest, ShutdownRequest, StoreRequest,
};
use async_trait::async_trait;
use portunix_storage::{Backend, BackendHealth, BackendResult, DatastoreStats, Metadata, Query, Record, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tonic::transport::Channel;
use tracing::warn;

/// Adapts one running plugin into a storage backend. Operations map 1:1
/// to the `Initialize/Store/Retrieve/Query/Delete/List/Health/GetStats/
/// Shutdown` RPCs (spec.md §4.3). `Shutdown` is idempotent on this side
/// even though the RPC itself should only ever be issued once by the
/// owning manager — `Backend::shutdown` may be called more than once by
/// callers that don't track that themselves.
pub struct PluginRpcAdapter {
    plugin_name: String,
    channel: Channel,
    token: Option<String>,
    shutdown_called: AtomicBool,
}

impl PluginRpcAdapter {
    pub fn new(plugin_name: impl Into<String>, channel: Channel, endpoint: &PluginEndpoint) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            channel,
            token: crate::transport::auth_token(endpoint),
            shutdown_called: AtomicBool::new(false),
        }
    }

    fn client(&self) -> DatastorePluginClient {
        DatastorePluginClient::new(self.channel.clone(), self.token.clone())
    }

    fn remote_error(&self, op: &str, message: String) -> anyhow::Error {
        PluginError::Remote {
            plugin: self.plugin_name.clone(),
            op: op.to_string(),
            message,
        }
        .into()
    }
}

/// Translates a local query into the wire shape, mapping `Sort`'s
/// direction onto the single `sort_descending` flag the schema carries.
fn build_query_request(query: &Query) -> WireQueryRequest {
    WireQueryRequest {
        collection: query.collection.clone(),
        filter: encode_metadata(&query.filter),
        sort_field: query.sort.as_ref().map(|s| s.field.clone()),
        sort_descending: matches!(
            query.sort.as_ref().map(|s| s.direction),
            Some(portunix_storage::SortDirection::Descending)
        ),
        limit: query.limit.map(|v| v as u32),
        offset: query.offset.map(|v| v as u32),
    }
}

#[async_trait]
impl Backend for PluginRpcAdapter {
    fn name(&self) -> &str {
        &self.plugin_name
    }

    async fn store(&self, key: &str, value: Value, metadata: Metadata) -> BackendResult<Record> {
        let (wire_value, wire_metadata) = encode_record(key, &value, &metadata);
        let response = self
            .client()
            .store(StoreRequest {
                key: key.to_string(),
                value: wire_value,
                metadata: wire_metadata,
            })
            .await?;
        if !response.success {
            return Err(self.remote_error("Store", response.message));
        }
        match response.record {
            Some(record) => Ok(decode_record(&record)),
            None => Ok(Record::new(key, value, metadata)),
        }
    }

    async fn retrieve(&self, key: &str) -> BackendResult<Option<Record>> {
        let response = self
            .client()
            .retrieve(RetrieveRequest { key: key.to_string() })
            .await?;
        if !response.success {
            return Err(self.remote_error("Retrieve", response.message));
        }
        Ok(response.record.as_ref().map(decode_record))
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let response = self
            .client()
            .delete(DeleteRequest { key: key.to_string() })
            .await?;
        if !response.success {
            return Err(self.remote_error("Delete", response.message));
        }
        Ok(response.deleted)
    }

    async fn list(&self, glob: &str) -> BackendResult<Vec<Record>> {
        let response = self
            .client()
            .list(ListRequest { pattern: glob.to_string() })
            .await?;
        if !response.success {
            return Err(self.remote_error("List", response.message));
        }
        Ok(response.records.iter().map(decode_record).collect())
    }

    async fn query(&self, query: &Query) -> BackendResult<Vec<Record>> {
        let request = build_query_request(query);
        let response = self.client().query(request).await?;
        if !response.success {
            return Err(self.remote_error("Query", response.message));
        }
        Ok(response.records.iter().map(decode_record).collect())
    }

    async fn health(&self) -> BackendResult<BackendHealth> {
        let response = self.client().health(HealthRequest {}).await?;
        Ok(BackendHealth {
            healthy: response.healthy,
            status: response.status,
            message: response.message,
        })
    }

    async fn stats(&self) -> BackendResult<DatastoreStats> {
        let response = self.client().get_stats(GetStatsRequest {}).await?;
        let latency = response
            .latency_ms
            .iter()
            .map(|(op, ms)| (op.clone(), std::time::Duration::from_secs_f64(ms / 1000.0)))
            .collect();
        let last_updated = chrono::DateTime::from_timestamp(response.last_updated_timestamp, 0);
        Ok(DatastoreStats {
            record_count: response.record_count,
            bytes_stored: response.bytes_stored,
            collections: response.collections,
            latency,
            last_updated,
        })
    }

    async fn shutdown(&self) -> BackendResult<()> {
        if self.shutdown_called.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Transport failures during shutdown are non-fatal (spec.md
        // §4.3): the plugin process may already be gone.
        if let Err(e) = self.client().shutdown(ShutdownRequest {}).await {
            warn!(plugin = %self.plugin_name, error = %e, "shutdown RPC failed, continuing");
        }
        Ok(())
    }
}
