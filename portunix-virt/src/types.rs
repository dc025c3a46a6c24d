//! VM data model (spec.md §3 "VM Descriptor", §4.5 "Capability
//! detection"/"Diagnostic info").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `state ∈ {running, stopped, suspended, stopping, error, not_found,
/// unknown}` (spec.md §3). Transition rules are in the module-level state
/// machine each adapter implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Running,
    Stopped,
    Suspended,
    Stopping,
    Error,
    NotFound,
    Unknown,
}

/// `(name, state, ram, cpus, disk_size, ip, backend, error_detail?)`
/// (spec.md §3 "VM Descriptor").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmDescriptor {
    pub name: String,
    pub state: VmState,
    pub ram_mb: Option<u64>,
    pub cpus: Option<u32>,
    pub disk_size_mb: Option<u64>,
    pub ip: Option<String>,
    pub backend: String,
    pub error_detail: Option<String>,
}

impl VmDescriptor {
    pub fn not_found(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: VmState::NotFound,
            ram_mb: None,
            cpus: None,
            disk_size_mb: None,
            ip: None,
            backend: backend.into(),
            error_detail: None,
        }
    }

    pub fn error(name: impl Into<String>, backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: VmState::Error,
            ram_mb: None,
            cpus: None,
            disk_size_mb: None,
            ip: None,
            backend: backend.into(),
            error_detail: Some(detail.into()),
        }
    }
}

/// Whether to wait for graceful shutdown or terminate immediately
/// (spec.md §4.5 state machine: `Stop(force=false)` vs `Stop(force=true)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopOptions {
    pub force: bool,
}

/// One provider's detected availability (spec.md §4.5 "Capability
/// detection").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapability {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub installation_path: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// The full capability report the manager produces at construction,
/// including the platform-specific `recommended_provider` priority pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub platform: String,
    pub hardware_virtualization: bool,
    pub providers: HashMap<String, ProviderCapability>,
    pub recommended_provider: Option<String>,
}

/// Diagnostic info surfaced for troubleshooting (spec.md §4.5 "Diagnostic
/// info"): tool location, conflicts, and remediation text, kept
/// serializable so it can be handed straight to an MCP tool or REST
/// handler outside the Core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub provider: String,
    pub platform: String,
    pub tool_path: Option<String>,
    pub tool_version: Option<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub remediation: Vec<String>,
}

/// A point-in-time snapshot of a VM's disk state (spec.md §4.5 common
/// contract: `CreateSnapshot/ListSnapshots/RevertSnapshot/DeleteSnapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub description: Option<String>,
}

/// Parameters for `Create` (spec.md §4.5 common contract).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmSpec {
    pub name: String,
    pub ram_mb: Option<u64>,
    pub cpus: Option<u32>,
    pub disk_size_mb: Option<u64>,
    pub image: Option<String>,
}
