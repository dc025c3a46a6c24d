//! Storage routing manager: spec.md §4.1's public surface. Owns a
//! lock-guarded table of named backends and a route table, exactly as the
//! teacher's `StorageHierarchy` owns its tiered caches behind `Arc`
//! fields — generalized here to a data-driven `HashMap` because routes
//! and datastores are configured, not fixed.

use crate::backend::{Backend, FanoutOutcome, PluginInitializer};
use crate::config::{FileFormatConfig, StorageManagerConfig};
use crate::error::{Result, StorageError};
use crate::file_backend::{FileBackend, FileFormat};
use crate::query::{self, Query};
use crate::record::{matches_filter, Filter, Metadata, Record, Value};
use crate::route::RouteTable;
use crate::stats::{BackendHealth, DatastoreStats, HealthMap, StatsMap};
use async_trait::async_trait;
use portunix_core::lifecycle::CoreService;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Bound on single-plugin lazy initialization, held across the exclusive
/// lock acquired on a read-miss (spec.md §4.1 "Concurrency").
const PLUGIN_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// The storage routing layer: resolves a key to a backend via the route
/// table, then delegates the operation. Fan-out operations (`List`,
/// `Query`, `Health`, `Stats`) touch every relevant backend and aggregate
/// via [`FanoutOutcome`] or a `plugin → result` map.
pub struct StorageManager {
    backends: RwLock<HashMap<String, Arc<dyn Backend>>>,
    routes: RwLock<RouteTable>,
    plugin_initializer: RwLock<Option<Arc<dyn PluginInitializer>>>,
}

impl StorageManager {
    /// Constructs a manager from `config`, validating it first per
    /// spec.md §6.2 and failing fast on any dangling reference or
    /// duplicate name rather than partially wiring backends.
    pub async fn new(config: StorageManagerConfig) -> std::result::Result<Self, StorageError> {
        config.validate()?;

        let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
        for fd in &config.file_datastores {
            let format = match fd.format {
                FileFormatConfig::Json => FileFormat::Json,
                FileFormatConfig::Yaml => FileFormat::Yaml,
            };
            let backend = FileBackend::new(&fd.name, &fd.path, format, fd.backup_on_overwrite)
                .await
                .map_err(|e| StorageError::Backend {
                    backend: fd.name.clone(),
                    source: e,
                })?;
            backends.insert(fd.name.clone(), Arc::new(backend));
        }

        // Plugin datastores are wired by `portunix-plugin` at a higher
        // layer, which constructs an RPC adapter implementing `Backend`
        // (only plugins with `database_access` capability, per spec.md
        // §4.1 `Initialize`) and registers it here via
        // `register_backend`, or lazily via `set_plugin_initializer` —
        // this crate has no dependency on the plugin transport itself.
        if !config.plugin_datastores.is_empty() {
            info!(
                count = config.plugin_datastores.len(),
                "plugin datastores configured; awaiting registration by the plugin wiring layer"
            );
        }

        let routes = RouteTable::new(config.routes);

        Ok(Self {
            backends: RwLock::new(backends),
            routes: RwLock::new(routes),
            plugin_initializer: RwLock::new(None),
        })
    }

    /// Registers a backend constructed elsewhere (e.g. a plugin RPC
    /// adapter) under `name`. Overwrites any existing registration.
    /// `Store`/`Retrieve`/`Delete` hold only the read lock while
    /// resolving the backend name via the route table; this write lock is
    /// held only for the duration of the insert itself (spec.md §4.1
    /// "Concurrency").
    pub async fn register_backend(&self, name: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.write().await.insert(name.into(), backend);
    }

    /// Installs the hook `backend` falls back to on a read-miss to
    /// lazily initialize a plugin-backed datastore (spec.md §4.1
    /// "Concurrency"). Set once at start-up, alongside whatever eagerly
    /// registers the plugin datastores already named in routes.
    pub async fn set_plugin_initializer(&self, initializer: Arc<dyn PluginInitializer>) {
        *self.plugin_initializer.write().await = Some(initializer);
    }

    /// Resolves `name` to its backend. A miss re-acquires the map
    /// exclusively, re-checks (another caller may have raced us), and
    /// only then invokes single-plugin initialization, bounded by
    /// [`PLUGIN_INIT_TIMEOUT`] (spec.md §4.1 "Concurrency" / §3 "at most
    /// once per lifecycle").
    async fn backend(&self, name: &str) -> Result<Arc<dyn Backend>> {
        if let Some(backend) = self.backends.read().await.get(name).cloned() {
            return Ok(backend);
        }

        let mut backends = self.backends.write().await;
        if let Some(backend) = backends.get(name).cloned() {
            return Ok(backend);
        }

        let initializer = self
            .plugin_initializer
            .read()
            .await
            .clone()
            .ok_or_else(|| StorageError::UnknownDatastore(name.to_string()))?;

        let backend = tokio::time::timeout(PLUGIN_INIT_TIMEOUT, initializer.initialize_plugin(name))
            .await
            .map_err(|_| StorageError::Backend {
                backend: name.to_string(),
                source: anyhow::anyhow!(
                    "plugin initialization timed out after {}s",
                    PLUGIN_INIT_TIMEOUT.as_secs()
                ),
            })?
            .map_err(|source| StorageError::Backend {
                backend: name.to_string(),
                source,
            })?;

        backends.insert(name.to_string(), backend.clone());
        Ok(backend)
    }

    #[instrument(skip(self, value, metadata), fields(key = %key))]
    pub async fn store(&self, key: &str, value: Value, metadata: Metadata) -> Result<Record> {
        let route = {
            let routes = self.routes.read().await;
            routes
                .resolve(key)
                .cloned()
                .ok_or_else(|| StorageError::NoRoute { key: key.to_string() })?
        };
        let backend = self.backend(&route.datastore).await?;

        // Augment metadata with route_name, plugin, and route_<k> per
        // route-config key (spec.md §4.1 `Store`).
        let mut enriched = metadata;
        enriched.insert(
            "route_name".to_string(),
            serde_json::Value::String(route.name.clone()),
        );
        enriched.insert(
            "plugin".to_string(),
            serde_json::Value::String(route.datastore.clone()),
        );
        for (k, v) in &route.config {
            enriched.insert(format!("route_{k}"), serde_json::Value::String(v.clone()));
        }

        backend
            .store(key, value, enriched)
            .await
            .map_err(|source| StorageError::Backend {
                backend: backend.name().to_string(),
                source,
            })
    }

    /// `filter`, if non-empty, requires the returned record's metadata to
    /// match all listed keys; a mismatch surfaces `FilterMismatch`
    /// (spec.md §4.1 `Retrieve`).
    #[instrument(skip(self, filter), fields(key = %key))]
    pub async fn retrieve(&self, key: &str, filter: &Filter) -> Result<Option<Record>> {
        let datastore = {
            let routes = self.routes.read().await;
            routes
                .resolve(key)
                .map(|r| r.datastore.clone())
                .ok_or_else(|| StorageError::NoRoute { key: key.to_string() })?
        };
        let backend = self.backend(&datastore).await?;
        let record = backend
            .retrieve(key)
            .await
            .map_err(|source| StorageError::Backend {
                backend: backend.name().to_string(),
                source,
            })?;

        match record {
            Some(record) if !filter.is_empty() && !matches_filter(&record.metadata, filter) => {
                Err(StorageError::FilterMismatch {
                    field: filter.keys().next().cloned().unwrap_or_default(),
                    reason: "stored metadata does not satisfy the supplied filter".to_string(),
                })
            }
            other => Ok(other),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let datastore = {
            let routes = self.routes.read().await;
            routes
                .resolve(key)
                .map(|r| r.datastore.clone())
                .ok_or_else(|| StorageError::NoRoute { key: key.to_string() })?
        };
        let backend = self.backend(&datastore).await?;
        backend
            .delete(key)
            .await
            .map_err(|source| StorageError::Backend {
                backend: backend.name().to_string(),
                source,
            })
    }

    /// Fans a glob out across every backend whose routes could overlap it
    /// (spec.md §4.1 `List`), returning partial results even if some
    /// backends fail — per the Open Question resolution in
    /// SPEC_FULL.md §E, this only becomes an error if *every* backend
    /// fails.
    #[instrument(skip(self), fields(glob = %glob))]
    pub async fn list(&self, glob: &str) -> Result<FanoutOutcome<Record>> {
        let datastores = {
            let routes = self.routes.read().await;
            let names = routes.datastores_for_glob(glob);
            if names.is_empty() {
                routes.routes().iter().map(|r| r.datastore.clone()).collect()
            } else {
                names.into_iter().map(|s| s.to_string()).collect::<Vec<_>>()
            }
        };

        self.fan_out(datastores, |backend| {
            let glob = glob.to_string();
            Box::pin(async move { backend.list(&glob).await })
        })
        .await
    }

    /// Selects backends whose routes match `query.collection` (or all
    /// registered backends when empty), fans out a filter-only pass, then
    /// applies `sort`/`limit`/`offset` once, globally, over the
    /// concatenated results (spec.md §4.1 `Query`).
    #[instrument(skip(self, q))]
    pub async fn query(&self, q: &Query) -> Result<FanoutOutcome<Record>> {
        let datastores: Vec<String> = match &q.collection {
            Some(collection) if !collection.is_empty() => {
                let routes = self.routes.read().await;
                let names = routes.datastores_for_glob(collection);
                if names.is_empty() {
                    self.backends.read().await.keys().cloned().collect()
                } else {
                    names.into_iter().map(|s| s.to_string()).collect()
                }
            }
            _ => self.backends.read().await.keys().cloned().collect(),
        };

        let mut outcome = self
            .fan_out(datastores, |backend| {
                let q = q.clone();
                Box::pin(async move { backend.query(&q).await })
            })
            .await?;

        outcome.results = query::paginate(q, outcome.results);
        Ok(outcome)
    }

    async fn fan_out<F>(&self, datastores: Vec<String>, op: F) -> Result<FanoutOutcome<Record>>
    where
        F: Fn(
            Arc<dyn Backend>,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = anyhow::Result<Vec<Record>>> + Send>,
        >,
    {
        let mut outcome = FanoutOutcome::default();
        for name in datastores {
            let backend = match self.backend(&name).await {
                Ok(b) => b,
                Err(e) => {
                    outcome.errors.push((name, e.to_string()));
                    continue;
                }
            };
            match op(backend).await {
                Ok(records) => outcome.results.extend(records),
                Err(e) => outcome.errors.push((name, e.to_string())),
            }
        }

        if outcome.is_total_failure() {
            return Err(StorageError::AllBackendsFailed {
                count: outcome.errors.len(),
                last: outcome
                    .errors
                    .last()
                    .map(|(_, msg)| msg.clone())
                    .unwrap_or_default(),
            });
        }

        Ok(outcome)
    }

    /// Returns a `plugin → HealthStatus` map by polling every initialized
    /// backend; errors become `{healthy=false, status="error", message}`
    /// rather than failing the whole call (spec.md §4.1 `Health`).
    pub async fn health(&self) -> HealthMap {
        let backends: Vec<Arc<dyn Backend>> = self.backends.read().await.values().cloned().collect();
        let mut map = HealthMap::new();
        for backend in backends {
            let health = match backend.health().await {
                Ok(h) => h,
                Err(e) => BackendHealth::error(e.to_string()),
            };
            map.insert(backend.name().to_string(), health);
        }
        map
    }

    /// Returns a `plugin → Stats` map; backends that fail are omitted
    /// entirely (spec.md §4.1 `Stats`).
    pub async fn stats(&self) -> StatsMap {
        let backends: Vec<Arc<dyn Backend>> = self.backends.read().await.values().cloned().collect();
        let mut map = StatsMap::new();
        for backend in backends {
            if let Ok(s) = backend.stats().await {
                map.insert(backend.name().to_string(), s);
            }
        }
        map
    }
}

#[async_trait]
impl CoreService for StorageManager {
    type Error = StorageError;

    async fn initialize(&self, _cancel: CancellationToken) -> std::result::Result<(), StorageError> {
        info!(
            backend_count = self.backends.read().await.len(),
            "storage manager initialized"
        );
        Ok(())
    }

    async fn close(&self) -> std::result::Result<(), StorageError> {
        let backends: Vec<Arc<dyn Backend>> = self.backends.read().await.values().cloned().collect();
        for backend in backends {
            if let Err(e) = backend.shutdown().await {
                warn!(backend = backend.name(), error = %e, "backend shutdown failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileDatastoreConfig;
    use crate::route::Route;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A no-op [`Backend`], just enough to be registered and named.
    struct NullBackend {
        name: String,
    }

    #[async_trait]
    impl Backend for NullBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn store(&self, key: &str, value: Value, metadata: Metadata) -> crate::backend::BackendResult<Record> {
            Ok(Record::new(key, value, metadata))
        }

        async fn retrieve(&self, _key: &str) -> crate::backend::BackendResult<Option<Record>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> crate::backend::BackendResult<bool> {
            Ok(false)
        }

        async fn list(&self, _glob: &str) -> crate::backend::BackendResult<Vec<Record>> {
            Ok(vec![])
        }

        async fn query(&self, _query: &Query) -> crate::backend::BackendResult<Vec<Record>> {
            Ok(vec![])
        }

        async fn health(&self) -> crate::backend::BackendResult<BackendHealth> {
            Ok(BackendHealth::ok())
        }

        async fn stats(&self) -> crate::backend::BackendResult<DatastoreStats> {
            Ok(DatastoreStats::default())
        }

        async fn shutdown(&self) -> crate::backend::BackendResult<()> {
            Ok(())
        }
    }

    struct CountingInitializer {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PluginInitializer for CountingInitializer {
        async fn initialize_plugin(&self, datastore_name: &str) -> anyhow::Result<Arc<dyn Backend>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullBackend { name: datastore_name.to_string() }))
        }
    }

    async fn manager_with_tmp() -> (StorageManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageManagerConfig {
            routes: vec![Route {
                name: "all".into(),
                pattern: "*".into(),
                datastore: "main".into(),
                priority: 0,
                config: Default::default(),
            }],
            file_datastores: vec![FileDatastoreConfig {
                name: "main".into(),
                path: dir.path().to_string_lossy().to_string(),
                format: FileFormatConfig::Json,
                backup_on_overwrite: true,
            }],
            plugin_datastores: vec![],
        };
        (StorageManager::new(config).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn store_and_retrieve_round_trip() {
        let (manager, _dir) = manager_with_tmp().await;
        manager
            .store("k1", Value::Text("hi".into()), Metadata::new())
            .await
            .unwrap();
        let record = manager.retrieve("k1", &Filter::new()).await.unwrap().unwrap();
        assert_eq!(record.value, Value::Text("hi".into()));
    }

    #[tokio::test]
    async fn store_enriches_metadata_with_route_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut route_config = HashMap::new();
        route_config.insert("ttl".to_string(), "3600".to_string());
        let config = StorageManagerConfig {
            routes: vec![Route {
                name: "logs".into(),
                pattern: "logs/*".into(),
                datastore: "file-plugin".into(),
                priority: 0,
                config: route_config,
            }],
            file_datastores: vec![FileDatastoreConfig {
                name: "file-plugin".into(),
                path: dir.path().to_string_lossy().to_string(),
                format: FileFormatConfig::Json,
                backup_on_overwrite: false,
            }],
            plugin_datastores: vec![],
        };
        let manager = StorageManager::new(config).await.unwrap();
        let record = manager
            .store("logs/2024", Value::Text("x".into()), Metadata::new())
            .await
            .unwrap();
        assert_eq!(record.metadata.get("route_ttl"), Some(&json!("3600")));
        assert_eq!(record.metadata.get("route_name"), Some(&json!("logs")));
        assert_eq!(record.metadata.get("plugin"), Some(&json!("file-plugin")));
    }

    #[tokio::test]
    async fn route_resolution_matches_seed_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageManagerConfig {
            routes: vec![
                Route {
                    name: "logs".into(),
                    pattern: "logs/*".into(),
                    datastore: "file-plugin".into(),
                    priority: 0,
                    config: Default::default(),
                },
                Route {
                    name: "general".into(),
                    pattern: "*".into(),
                    datastore: "p2".into(),
                    priority: 0,
                    config: Default::default(),
                },
            ],
            file_datastores: vec![
                FileDatastoreConfig {
                    name: "file-plugin".into(),
                    path: dir.path().join("fp").to_string_lossy().to_string(),
                    format: FileFormatConfig::Json,
                    backup_on_overwrite: false,
                },
                FileDatastoreConfig {
                    name: "p2".into(),
                    path: dir.path().join("p2").to_string_lossy().to_string(),
                    format: FileFormatConfig::Json,
                    backup_on_overwrite: false,
                },
            ],
            plugin_datastores: vec![],
        };
        let manager = StorageManager::new(config).await.unwrap();
        let logs_record = manager
            .store("logs/2024", Value::Text("x".into()), Metadata::new())
            .await
            .unwrap();
        assert_eq!(logs_record.metadata.get("plugin"), Some(&json!("file-plugin")));

        let users_record = manager
            .store("users/1", Value::Text("y".into()), Metadata::new())
            .await
            .unwrap();
        assert_eq!(users_record.metadata.get("plugin"), Some(&json!("p2")));
    }

    #[tokio::test]
    async fn unrouted_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageManagerConfig {
            routes: vec![Route {
                name: "users".into(),
                pattern: "users/*".into(),
                datastore: "main".into(),
                priority: 0,
                config: Default::default(),
            }],
            file_datastores: vec![FileDatastoreConfig {
                name: "main".into(),
                path: dir.path().to_string_lossy().to_string(),
                format: FileFormatConfig::Json,
                backup_on_overwrite: false,
            }],
            plugin_datastores: vec![],
        };
        let manager = StorageManager::new(config).await.unwrap();
        let err = manager.retrieve("orders/1", &Filter::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::NoRoute { .. }));
    }

    #[tokio::test]
    async fn retrieve_with_mismatched_filter_errors() {
        let (manager, _dir) = manager_with_tmp().await;
        manager
            .store("k1", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap();
        let mut filter = Filter::new();
        filter.insert("tag".to_string(), json!("missing"));
        let err = manager.retrieve("k1", &filter).await.unwrap_err();
        assert!(matches!(err, StorageError::FilterMismatch { .. }));
    }

    #[tokio::test]
    async fn delete_then_retrieve_finds_nothing() {
        let (manager, _dir) = manager_with_tmp().await;
        manager
            .store("k1", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap();
        assert!(manager.delete("k1").await.unwrap());
        assert!(manager.retrieve("k1", &Filter::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_fans_out_and_aggregates() {
        let (manager, _dir) = manager_with_tmp().await;
        manager
            .store("a", Value::Text("1".into()), Metadata::new())
            .await
            .unwrap();
        manager
            .store("b", Value::Text("2".into()), Metadata::new())
            .await
            .unwrap();
        let outcome = manager.list("*").await.unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn health_reports_one_entry_per_backend() {
        let (manager, _dir) = manager_with_tmp().await;
        let health = manager.health().await;
        assert_eq!(health.len(), 1);
        assert!(health.get("main").unwrap().healthy);
    }

    #[tokio::test]
    async fn lazily_initializes_a_plugin_backend_on_first_miss() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageManagerConfig {
            routes: vec![Route {
                name: "cache".into(),
                pattern: "cache/*".into(),
                datastore: "cache-plugin".into(),
                priority: 0,
                config: Default::default(),
            }],
            file_datastores: vec![FileDatastoreConfig {
                name: "main".into(),
                path: dir.path().to_string_lossy().to_string(),
                format: FileFormatConfig::Json,
                backup_on_overwrite: true,
            }],
            plugin_datastores: vec![],
        };
        let manager = StorageManager::new(config).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        manager
            .set_plugin_initializer(Arc::new(CountingInitializer { calls: calls.clone() }))
            .await;

        manager
            .store("cache/1", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A second access against the now-registered backend must not
        // re-invoke the initializer.
        manager
            .store("cache/2", Value::Text("w".into()), Metadata::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn miss_with_no_initializer_set_is_unknown_datastore() {
        let config = StorageManagerConfig {
            routes: vec![Route {
                name: "cache".into(),
                pattern: "cache/*".into(),
                datastore: "cache-plugin".into(),
                priority: 0,
                config: Default::default(),
            }],
            plugin_datastores: vec![crate::config::PluginDatastoreConfig {
                name: "cache-plugin".into(),
                plugin: "cache".into(),
                settings: Default::default(),
            }],
            file_datastores: vec![],
        };
        let manager = StorageManager::new(config).await.unwrap();
        let err = manager
            .store("cache/1", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownDatastore(name) if name == "cache-plugin"));
    }

    #[tokio::test]
    async fn stats_reports_one_entry_per_backend() {
        let (manager, _dir) = manager_with_tmp().await;
        manager
            .store("k1", Value::Text("v".into()), Metadata::new())
            .await
            .unwrap();
        let stats: HashMap<String, DatastoreStats> = manager.stats().await;
        assert_eq!(stats.get("main").unwrap().record_count, 1);
    }
}
