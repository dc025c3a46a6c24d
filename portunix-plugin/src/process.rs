//! Plugin Process Manager contract (spec.md §4.4): `GetPlugin`,
//! `StartPlugin`, `StopPlugin`, plus the state machine backing them.
//! Grounded on `other_examples`'
//! `d1f9e8cd_bobmatnyc-rustbot__src-mcp-manager.rs`'s `McpPluginManager`:
//! a `config`/`plugins`/`running_plugins` split behind `Arc<RwLock<...>>`,
//! idempotent start/stop (a no-op if the plugin is already in the target
//! state), and a status enum tracked per plugin.
//!
//! spec.md marks the Process Manager itself "out of scope as a core" —
//! only the contract the storage layer depends on is specified. This
//! implementation exists so the storage manager's `Initialize` (spec.md
//! §4.1) has something concrete to call.

use crate::client::DatastorePluginClient;
use crate::descriptor::{PluginCapabilities, PluginDescriptor, PluginEndpoint, PluginStatus};
use crate::error::{PluginError, Result};
use crate::wire::{HealthRequest, ShutdownRequest};
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use tracing::{info, instrument, warn};

const START_HEALTH_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(200);

struct RunningPlugin {
    child: Child,
    endpoint: PluginEndpoint,
}

/// A subprocess-backed plugin's launch configuration: the command used
/// to start it and the endpoint it will be reachable on once up.
#[derive(Debug, Clone)]
pub struct PluginLaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub endpoint: PluginEndpoint,
    pub capabilities: PluginCapabilities,
}

pub struct PluginProcessManager {
    descriptors: RwLock<HashMap<String, PluginDescriptor>>,
    specs: RwLock<HashMap<String, PluginLaunchSpec>>,
    running: RwLock<HashMap<String, RunningPlugin>>,
}

impl Default for PluginProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginProcessManager {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            specs: RwLock::new(HashMap::new()),
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a plugin the manager knows how to launch, in the
    /// `installed` state.
    pub async fn register(&self, name: impl Into<String>, spec: PluginLaunchSpec) {
        let name = name.into();
        let mut descriptor = PluginDescriptor::new(&name);
        descriptor.capabilities = spec.capabilities.clone();
        descriptor.endpoint = Some(spec.endpoint.clone());
        self.descriptors.write().await.insert(name.clone(), descriptor);
        self.specs.write().await.insert(name, spec);
    }

    /// `GetPlugin(name) → (descriptor, err)` (spec.md §4.4).
    pub async fn get_plugin(&self, name: &str) -> Result<PluginDescriptor> {
        self.descriptors
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))
    }

    async fn set_status(&self, name: &str, status: PluginStatus) {
        if let Some(descriptor) = self.descriptors.write().await.get_mut(name) {
            descriptor.status = status;
        }
    }

    /// Transitions status through `starting → running` (or `failed`),
    /// blocking until a health probe succeeds or `START_HEALTH_TIMEOUT`
    /// elapses. A no-op if the plugin is already `running` (spec.md §4.4
    /// "idempotent with respect to current state").
    #[instrument(skip(self))]
    pub async fn start_plugin(&self, name: &str) -> Result<()> {
        let current = self.get_plugin(name).await?.status;
        if current == PluginStatus::Running {
            return Ok(());
        }

        let spec = self
            .specs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;

        self.set_status(name, PluginStatus::Starting).await;

        let child = tokio::process::Command::new(&spec.command)
            .args(&spec.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PluginError::Transport {
                op: "spawn".to_string(),
                cause: e.to_string(),
            })?;

        self.running.write().await.insert(
            name.to_string(),
            RunningPlugin {
                child,
                endpoint: spec.endpoint.clone(),
            },
        );

        match timeout(START_HEALTH_TIMEOUT, self.wait_until_healthy(&spec.endpoint)).await {
            Ok(Ok(())) => {
                self.set_status(name, PluginStatus::Running).await;
                info!(plugin = name, "plugin started");
                Ok(())
            }
            _ => {
                self.set_status(name, PluginStatus::Failed).await;
                Err(PluginError::StartTimeout {
                    name: name.to_string(),
                    timeout_secs: START_HEALTH_TIMEOUT.as_secs(),
                })
            }
        }
    }

    async fn wait_until_healthy(&self, endpoint: &PluginEndpoint) -> anyhow::Result<()> {
        loop {
            if let Ok(channel) = crate::transport::connect(endpoint).await {
                let mut client = DatastorePluginClient::new(channel, crate::transport::auth_token(endpoint));
                if let Ok(health) = client.health(HealthRequest {}).await {
                    if health.healthy {
                        return Ok(());
                    }
                }
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    /// Sends the shutdown RPC, then waits for the process to exit; if
    /// non-responsive within `STOP_GRACE_PERIOD`, forcibly terminates it
    /// (spec.md §4.4). A no-op if the plugin is already stopped.
    #[instrument(skip(self))]
    pub async fn stop_plugin(&self, name: &str) -> Result<()> {
        let status = self.get_plugin(name).await?.status;
        if matches!(status, PluginStatus::Stopped | PluginStatus::Installed) {
            return Ok(());
        }

        self.set_status(name, PluginStatus::Stopping).await;

        let endpoint = self
            .descriptors
            .read()
            .await
            .get(name)
            .and_then(|d| d.endpoint.clone());

        if let Some(endpoint) = endpoint {
            if let Ok(channel) = crate::transport::connect(&endpoint).await {
                let mut client = DatastorePluginClient::new(channel, crate::transport::auth_token(&endpoint));
                let _ = client.shutdown(ShutdownRequest {}).await;
            }
        }

        let mut running = self.running.write().await;
        if let Some(mut plugin) = running.remove(name) {
            match timeout(STOP_GRACE_PERIOD, plugin.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(plugin = name, "plugin did not exit within grace period, killing");
                    let _ = plugin.child.kill().await;
                }
            }
        }

        self.set_status(name, PluginStatus::Stopped).await;
        Ok(())
    }

    pub async fn list(&self) -> Vec<PluginDescriptor> {
        self.descriptors.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PluginEndpoint;
    use std::net::SocketAddr;

    fn spec() -> PluginLaunchSpec {
        PluginLaunchSpec {
            command: "true".to_string(),
            args: vec![],
            endpoint: PluginEndpoint::Tcp {
                addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
                token: None,
            },
            capabilities: PluginCapabilities { database_access: true },
        }
    }

    #[tokio::test]
    async fn get_plugin_reports_unknown_before_registration() {
        let manager = PluginProcessManager::new();
        let err = manager.get_plugin("file-plugin").await.unwrap_err();
        assert!(matches!(err, PluginError::UnknownPlugin(name) if name == "file-plugin"));
    }

    #[tokio::test]
    async fn registered_plugin_starts_in_installed_state() {
        let manager = PluginProcessManager::new();
        manager.register("file-plugin", spec()).await;
        let descriptor = manager.get_plugin("file-plugin").await.unwrap();
        assert_eq!(descriptor.status, PluginStatus::Installed);
        assert!(descriptor.is_datastore());
    }

    #[tokio::test]
    async fn stop_on_an_unstarted_plugin_is_a_no_op() {
        let manager = PluginProcessManager::new();
        manager.register("file-plugin", spec()).await;
        manager.stop_plugin("file-plugin").await.unwrap();
        let descriptor = manager.get_plugin("file-plugin").await.unwrap();
        assert_eq!(descriptor.status, PluginStatus::Installed);
    }

    #[tokio::test]
    async fn list_reflects_every_registered_plugin() {
        let manager = PluginProcessManager::new();
        manager.register("file-plugin", spec()).await;
        manager.register("cache-plugin", spec()).await;
        let names: Vec<_> = manager.list().await.into_iter().map(|d| d.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"file-plugin".to_string()));
        assert!(names.contains(&"cache-plugin".to_string()));
    }
}
