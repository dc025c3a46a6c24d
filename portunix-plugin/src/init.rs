//! Wires plugin-backed datastores into a `StorageManager`, implementing
//! spec.md §4.1 "Initialization": for each distinct `route.plugin`,
//! locate it in the process manager, verify `database_access`, start it
//! if not running, connect a gRPC client, `Initialize` it with its
//! settings block, and register the resulting adapter as a backend.

use crate::adapter::PluginRpcAdapter;
use crate::client::DatastorePluginClient;
use crate::error::{PluginError, Result};
use crate::process::PluginProcessManager;
use crate::wire::InitializeRequest;
use async_trait::async_trait;
use portunix_storage::config::PluginDatastoreConfig;
use portunix_storage::{Backend, PluginInitializer, StorageManager};
use std::collections::HashMap;
use std::sync::Arc;

/// Eagerly initializes every configured plugin datastore and registers
/// it with `storage` (spec.md §4.1 "Initialization"). A cancellation
/// aborts further plugin inits but leaves already-registered adapters in
/// place (spec.md §5 "Cancellation semantics"): on the first error, the
/// caller decides whether to retry the remainder or `Close`.
pub async fn initialize_plugin_datastores(
    storage: &StorageManager,
    process_manager: &PluginProcessManager,
    plugin_datastores: &[PluginDatastoreConfig],
) -> Result<()> {
    for datastore in plugin_datastores {
        let backend = connect_datastore_backend(process_manager, datastore).await?;
        storage.register_backend(datastore.name.clone(), backend).await;
    }
    Ok(())
}

/// Locates, starts (if needed), connects, and `Initialize`-RPCs a single
/// plugin datastore, wrapping the result as a [`Backend`] (spec.md §4.1
/// "Initialization", §4.3).
async fn connect_datastore_backend(
    process_manager: &PluginProcessManager,
    datastore: &PluginDatastoreConfig,
) -> Result<Arc<dyn Backend>> {
    let descriptor = process_manager.get_plugin(&datastore.plugin).await?;
    if !descriptor.is_datastore() {
        return Err(PluginError::NotADatastorePlugin(datastore.plugin.clone()));
    }

    process_manager.start_plugin(&datastore.plugin).await?;
    let descriptor = process_manager.get_plugin(&datastore.plugin).await?;
    let endpoint = descriptor.endpoint.clone().ok_or_else(|| PluginError::Transport {
        op: "connect".to_string(),
        cause: format!("plugin '{}' has no endpoint registered", datastore.plugin),
    })?;

    let channel = crate::transport::connect(&endpoint).await?;
    let mut client = DatastorePluginClient::new(channel.clone(), crate::transport::auth_token(&endpoint));
    let response = client
        .initialize(InitializeRequest {
            settings: datastore.settings.clone(),
        })
        .await?;
    if !response.success {
        return Err(PluginError::Remote {
            plugin: datastore.plugin.clone(),
            op: "Initialize".to_string(),
            message: response.message,
        });
    }

    Ok(Arc::new(PluginRpcAdapter::new(datastore.name.clone(), channel, &endpoint)))
}

/// Backs `StorageManager::backend`'s lazy single-plugin initialization
/// path (spec.md §4.1 "Concurrency"): a read-miss on a datastore name
/// this holds a [`PluginDatastoreConfig`] for runs the same
/// locate/verify/start/connect sequence [`initialize_plugin_datastores`]
/// runs eagerly.
pub struct PluginBackendInitializer {
    process_manager: Arc<PluginProcessManager>,
    plugin_datastores: HashMap<String, PluginDatastoreConfig>,
}

impl PluginBackendInitializer {
    pub fn new(process_manager: Arc<PluginProcessManager>, plugin_datastores: Vec<PluginDatastoreConfig>) -> Self {
        Self {
            process_manager,
            plugin_datastores: plugin_datastores.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }
}

#[async_trait]
impl PluginInitializer for PluginBackendInitializer {
    async fn initialize_plugin(&self, datastore_name: &str) -> anyhow::Result<Arc<dyn Backend>> {
        let datastore = self
            .plugin_datastores
            .get(datastore_name)
            .ok_or_else(|| PluginError::UnknownPlugin(datastore_name.to_string()))?;
        Ok(connect_datastore_backend(&self.process_manager, datastore).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{PluginCapabilities, PluginEndpoint};
    use crate::process::PluginLaunchSpec;
    use std::net::SocketAddr;

    fn plugin_only_spec(database_access: bool) -> PluginLaunchSpec {
        PluginLaunchSpec {
            command: "true".to_string(),
            args: vec![],
            endpoint: PluginEndpoint::Tcp {
                addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
                token: None,
            },
            capabilities: PluginCapabilities { database_access },
        }
    }

    fn datastore(name: &str, plugin: &str) -> PluginDatastoreConfig {
        PluginDatastoreConfig {
            name: name.to_string(),
            plugin: plugin.to_string(),
            settings: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn routing_to_a_plugin_without_database_access_is_rejected() {
        let process_manager = PluginProcessManager::new();
        process_manager.register("cache", plugin_only_spec(false)).await;

        let err = connect_datastore_backend(&process_manager, &datastore("cache-store", "cache"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::NotADatastorePlugin(name) if name == "cache"));
    }

    #[tokio::test]
    async fn routing_to_an_unregistered_plugin_is_unknown() {
        let process_manager = PluginProcessManager::new();
        let err = connect_datastore_backend(&process_manager, &datastore("cache-store", "cache"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::UnknownPlugin(name) if name == "cache"));
    }

    #[tokio::test]
    async fn lazy_initializer_rejects_a_datastore_it_has_no_config_for() {
        let process_manager = Arc::new(PluginProcessManager::new());
        let initializer = PluginBackendInitializer::new(process_manager, vec![]);
        let err = initializer.initialize_plugin("unknown-store").await.unwrap_err();
        assert!(err.downcast_ref::<PluginError>().is_some());
    }
}
