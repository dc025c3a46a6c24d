//! `(name, status, capabilities, endpoint)` plugin descriptor, spec.md §3
//! "Plugin Descriptor", and the status state machine it carries. Naming
//! mirrors the lifecycle states in `other_examples`'
//! `d1f9e8cd_bobmatnyc-rustbot__src-mcp-manager.rs`'s `PluginState`,
//! adapted to the six-state vocabulary spec.md actually names.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Installed,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Boolean feature flags a plugin advertises; only `database_access`
/// gates datastore-backend use (spec.md §3, GLOSSARY "Capability").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginCapabilities {
    pub database_access: bool,
}

/// Where a running plugin can be reached, resolving spec.md §9's "Open
/// question" on endpoint discovery: a plugin descriptor carries either a
/// TCP address (with an optional bearer token forwarded as gRPC
/// metadata) or a Unix domain socket path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PluginEndpoint {
    Tcp {
        addr: SocketAddr,
        #[serde(default)]
        token: Option<String>,
    },
    UnixSocket {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub status: PluginStatus,
    pub capabilities: PluginCapabilities,
    pub endpoint: Option<PluginEndpoint>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: PluginStatus::Installed,
            capabilities: PluginCapabilities::default(),
            endpoint: None,
        }
    }

    pub fn is_datastore(&self) -> bool {
        self.capabilities.database_access
    }
}
