//! The Virtualization Manager (spec.md §4.5 "Capability detection",
//! "Selection"): probes every known provider once at construction, picks
//! the first available one in platform priority order, and retains it
//! for the process lifetime (spec.md §5 "no hot reselection").

use crate::error::{Result, VirtError};
use crate::provider::Provider;
use crate::qemu::QemuAdapter;
use crate::types::{
    Capabilities, Diagnostics, ProviderCapability, Snapshot, StopOptions, VmDescriptor, VmSpec, VmState,
};
use crate::vbox::VBoxAdapter;
use async_trait::async_trait;
use portunix_core::lifecycle::CoreService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Priority order per platform (spec.md §4.5 "Selection"): the manager
/// walks this list and takes the first provider reporting available.
fn priority_order(platform: &str) -> &'static [&'static str] {
    match platform {
        "linux" => &["kvm", "qemu", "virtualbox", "vmware"],
        "windows" => &["virtualbox", "hyperv", "vmware", "qemu"],
        "macos" => &["virtualbox", "vmware", "qemu"],
        _ => &["virtualbox", "qemu"],
    }
}

fn all_known_providers() -> Vec<Arc<dyn Provider>> {
    vec![Arc::new(VBoxAdapter::new()), Arc::new(QemuAdapter::new())]
}

/// `kvm` is not a distinct adapter here — it is QEMU accelerated by the
/// KVM kernel modules, so the priority list's `kvm` entry resolves to the
/// `qemu` adapter when `/dev/kvm` is present.
fn resolve_priority_name(name: &str) -> &str {
    if name == "kvm" {
        "qemu"
    } else {
        name
    }
}

pub struct VirtualizationManager {
    providers: HashMap<String, Arc<dyn Provider>>,
    capabilities: Capabilities,
    selected: Option<Arc<dyn Provider>>,
}

impl VirtualizationManager {
    /// Probes every known provider and retains the first available one
    /// in platform priority order. Never fails: a host with no usable
    /// provider simply has `selected = None`, and every VM operation
    /// returns [`VirtError::NoProviderAvailable`].
    pub async fn new() -> Self {
        let platform = std::env::consts::OS.to_string();
        let mut providers = HashMap::new();
        let mut provider_caps = HashMap::new();

        for provider in all_known_providers() {
            let available = provider.is_available().await;
            let version = if available { provider.get_version().await.ok().flatten() } else { None };
            provider_caps.insert(
                provider.name().to_string(),
                ProviderCapability {
                    name: provider.name().to_string(),
                    available,
                    version,
                    installation_path: None,
                    features: provider.probe_features().await,
                    recommendations: Vec::new(),
                },
            );
            providers.insert(provider.name().to_string(), provider);
        }

        let hardware_virtualization = tokio::fs::metadata("/dev/kvm").await.is_ok();

        let mut recommended = None;
        let mut selected = None;
        for candidate in priority_order(&platform) {
            let adapter_name = resolve_priority_name(candidate);
            if let Some(cap) = provider_caps.get(adapter_name) {
                if cap.available {
                    recommended = Some(candidate.to_string());
                    selected = providers.get(adapter_name).cloned();
                    break;
                }
            }
        }

        if let Some(provider) = &selected {
            info!(provider = provider.name(), "virtualization provider selected");
        } else {
            info!("no virtualization provider available on this host");
        }

        let capabilities = Capabilities {
            platform,
            hardware_virtualization,
            providers: provider_caps,
            recommended_provider: recommended,
        };

        Self {
            providers,
            capabilities,
            selected,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn selected_provider_name(&self) -> Option<&str> {
        self.selected.as_ref().map(|p| p.name())
    }

    fn provider(&self) -> Result<&Arc<dyn Provider>> {
        self.selected.as_ref().ok_or(VirtError::NoProviderAvailable)
    }

    /// Looks up a specific known provider by name regardless of which one
    /// is selected, for diagnostics/introspection callers.
    pub fn provider_by_name(&self, name: &str) -> Result<&Arc<dyn Provider>> {
        self.providers
            .get(name)
            .ok_or_else(|| VirtError::UnknownProvider(name.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn create(&self, spec: &VmSpec) -> Result<VmDescriptor> {
        self.provider()?.create(spec).await
    }

    pub async fn start(&self, name: &str) -> Result<()> {
        self.provider()?.start(name).await
    }

    pub async fn stop(&self, name: &str, opts: StopOptions) -> Result<()> {
        self.provider()?.stop(name, opts).await
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        self.provider()?.restart(name).await
    }

    pub async fn suspend(&self, name: &str) -> Result<()> {
        self.provider()?.suspend(name).await
    }

    pub async fn resume(&self, name: &str) -> Result<()> {
        self.provider()?.resume(name).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.provider()?.delete(name).await
    }

    /// Never returns entries with an empty name (spec.md §8 "Virt
    /// manager" invariant).
    pub async fn list(&self) -> Result<Vec<VmDescriptor>> {
        let all = self.provider()?.list().await?;
        Ok(all.into_iter().filter(|vm| !vm.name.is_empty()).collect())
    }

    pub async fn get_info(&self, name: &str) -> Result<VmDescriptor> {
        self.provider()?.get_info(name).await
    }

    /// `GetState` on a nonexistent VM returns `not_found` rather than an
    /// error (spec.md §8 "Virt manager" invariant).
    pub async fn get_state(&self, name: &str) -> Result<VmState> {
        match self.provider()?.get_state(name).await {
            Ok(state) => Ok(state),
            Err(VirtError::NotFound(_)) => Ok(VmState::NotFound),
            Err(e) => Err(e),
        }
    }

    pub async fn get_ip(&self, name: &str) -> Result<Option<String>> {
        self.provider()?.get_ip(name).await
    }

    pub async fn is_ssh_ready(&self, name: &str) -> Result<bool> {
        self.provider()?.is_ssh_ready(name).await
    }

    pub async fn connect(&self, name: &str) -> Result<()> {
        self.provider()?.connect(name).await
    }

    pub async fn create_snapshot(&self, name: &str, snapshot: &str) -> Result<()> {
        self.provider()?.create_snapshot(name, snapshot).await
    }

    pub async fn list_snapshots(&self, name: &str) -> Result<Vec<Snapshot>> {
        self.provider()?.list_snapshots(name).await
    }

    pub async fn revert_snapshot(&self, name: &str, snapshot: &str) -> Result<()> {
        self.provider()?.revert_snapshot(name, snapshot).await
    }

    pub async fn delete_snapshot(&self, name: &str, snapshot: &str) -> Result<()> {
        self.provider()?.delete_snapshot(name, snapshot).await
    }

    pub async fn get_diagnostic_info(&self) -> Result<Diagnostics> {
        self.provider()?.get_diagnostic_info().await
    }
}

#[async_trait]
impl CoreService for VirtualizationManager {
    type Error = VirtError;

    /// A no-op beyond what `new` already does: capability detection is
    /// eager and happens at construction, not at `Initialize` (there is
    /// no lazy per-provider startup to perform here, unlike the plugin
    /// manager's per-plugin `Initialize`).
    async fn initialize(&self, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_priority_order_favors_kvm_then_qemu() {
        assert_eq!(priority_order("linux"), &["kvm", "qemu", "virtualbox", "vmware"]);
    }

    #[test]
    fn windows_priority_order_favors_virtualbox() {
        assert_eq!(priority_order("windows")[0], "virtualbox");
    }

    #[test]
    fn kvm_priority_name_resolves_to_the_qemu_adapter() {
        assert_eq!(resolve_priority_name("kvm"), "qemu");
        assert_eq!(resolve_priority_name("virtualbox"), "virtualbox");
    }

    #[tokio::test]
    async fn manager_with_no_available_providers_reports_no_selection() {
        // In the CI/sandbox environment this test runs in, neither
        // VBoxManage nor virsh is on PATH, so no provider is ever
        // selected and every operation surfaces NoProviderAvailable.
        let manager = VirtualizationManager::new().await;
        if manager.selected_provider_name().is_none() {
            let err = manager.list().await.unwrap_err();
            assert!(matches!(err, VirtError::NoProviderAvailable));
        }
    }
}
