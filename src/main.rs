//! Entry point wiring the five Core services together (spec.md §1: the
//! command tree, install wizards, and other shallow wrappers are
//! external collaborators, out of scope here). This binary starts the
//! storage manager, discovers virtualization capabilities, and serves
//! the MCP control surface until signalled; the self-update engine is
//! invoked on demand rather than kept running.

use anyhow::Result;
use portunix_core::lifecycle::CoreService;
use portunix_mcp::{Dispatcher, McpServer, PermissionLevel, Transport};
use portunix_plugin::{PluginBackendInitializer, PluginProcessManager};
use portunix_storage::{StorageManager, StorageManagerConfig};
use portunix_virt::VirtualizationManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    portunix_core::logging::init_tracing("portunix=info", false)?;

    info!("starting portunix core services");

    let storage_config = StorageManagerConfig::load(std::path::Path::new("portunix-storage.json")).await?;
    let plugin_datastores = storage_config.plugin_datastores.clone();
    let storage = StorageManager::new(storage_config).await?;

    let process_manager = Arc::new(PluginProcessManager::new());
    portunix_plugin::initialize_plugin_datastores(&storage, &process_manager, &plugin_datastores).await?;
    storage
        .set_plugin_initializer(Arc::new(PluginBackendInitializer::new(
            process_manager,
            plugin_datastores,
        )))
        .await;

    storage.initialize(CancellationToken::new()).await?;
    info!("storage routing layer ready");

    let virt = VirtualizationManager::new().await;
    match virt.selected_provider_name() {
        Some(name) => info!(provider = %name, "virtualization provider selected"),
        None => info!("no virtualization provider available on this host"),
    }

    let bind_address: SocketAddr = "127.0.0.1:7337".parse()?;
    let dispatcher = Dispatcher::new(PermissionLevel::Standard, "portunix", env!("CARGO_PKG_VERSION"));
    let transport = Transport::detect(bind_address);
    let mcp = McpServer::new(dispatcher, transport);

    info!(permissions = mcp.permission().as_str(), "MCP server starting");
    if let Err(e) = mcp.serve().await {
        error!(error = %e, "MCP server exited with an error");
    }

    if let Err(e) = storage.close().await {
        error!(error = %e, "error while closing storage manager");
    }

    info!("portunix shut down cleanly");
    Ok(())
}
