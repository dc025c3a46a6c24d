//! The common VM contract every backend adapter implements (spec.md §4.5
//! "Common VM contract"). Modeled the way the storage layer's
//! `portunix_storage::Backend` trait is modeled: one `#[async_trait]`
//! surface, `Arc<dyn Provider>` held by the manager, unimplemented
//! operations return a descriptive error rather than panicking.

use crate::error::{Result, VirtError};
use crate::types::{Capabilities, Diagnostics, Snapshot, StopOptions, VmDescriptor, VmSpec};
use async_trait::async_trait;
use std::path::Path;

/// One virtualization backend (VirtualBox, QEMU/libvirt, ...). All
/// methods are async since every adapter shells out to an external tool.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Version string reported by the underlying tool, if available.
    async fn get_version(&self) -> Result<Option<String>>;

    /// Whether the backend's tool is present and usable on this host
    /// (spec.md §4.5 "Capability detection").
    async fn is_available(&self) -> bool;

    async fn get_diagnostic_info(&self) -> Result<Diagnostics>;

    async fn create(&self, spec: &VmSpec) -> Result<VmDescriptor>;
    async fn start(&self, name: &str) -> Result<()>;
    async fn stop(&self, name: &str, opts: StopOptions) -> Result<()>;
    async fn restart(&self, name: &str) -> Result<()> {
        self.stop(name, StopOptions { force: false }).await?;
        self.start(name).await
    }
    async fn suspend(&self, name: &str) -> Result<()>;
    async fn resume(&self, name: &str) -> Result<()>;
    async fn delete(&self, name: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<VmDescriptor>>;
    async fn get_info(&self, name: &str) -> Result<VmDescriptor>;
    async fn get_state(&self, name: &str) -> Result<crate::types::VmState>;
    async fn get_ip(&self, name: &str) -> Result<Option<String>>;

    async fn is_ssh_ready(&self, name: &str) -> Result<bool> {
        let _ = name;
        Err(self.unsupported("IsSSHReady"))
    }
    async fn connect(&self, name: &str) -> Result<()> {
        let _ = name;
        Err(self.unsupported("Connect"))
    }

    async fn create_snapshot(&self, name: &str, snapshot: &str) -> Result<()> {
        let _ = (name, snapshot);
        Err(self.unsupported("CreateSnapshot"))
    }
    async fn list_snapshots(&self, name: &str) -> Result<Vec<Snapshot>> {
        let _ = name;
        Err(self.unsupported("ListSnapshots"))
    }
    async fn revert_snapshot(&self, name: &str, snapshot: &str) -> Result<()> {
        let _ = (name, snapshot);
        Err(self.unsupported("RevertSnapshot"))
    }
    async fn delete_snapshot(&self, name: &str, snapshot: &str) -> Result<()> {
        let _ = (name, snapshot);
        Err(self.unsupported("DeleteSnapshot"))
    }

    async fn copy_to_vm(&self, name: &str, local: &Path, remote: &str) -> Result<()> {
        let _ = (name, local, remote);
        Err(self.unsupported("CopyToVM"))
    }
    async fn copy_from_vm(&self, name: &str, remote: &str, local: &Path) -> Result<()> {
        let _ = (name, remote, local);
        Err(self.unsupported("CopyFromVM"))
    }

    /// Detects provider-specific probe data for `Capabilities` beyond
    /// plain availability (features, recommendations). Default: none.
    async fn probe_features(&self) -> Vec<String> {
        Vec::new()
    }

    fn unsupported(&self, op: &'static str) -> VirtError {
        VirtError::Unsupported {
            provider: self.name(),
            op,
        }
    }
}
