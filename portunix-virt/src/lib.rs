//! Virtualization Provider Abstraction (spec.md §4.5): capability
//! detection and first-available-provider selection across VirtualBox
//! and QEMU/libvirt, behind one common async VM contract.

pub mod error;
pub mod manager;
pub mod process;
pub mod provider;
pub mod qemu;
pub mod types;
pub mod vbox;

pub use error::{Result, VirtError};
pub use manager::VirtualizationManager;
pub use provider::Provider;
pub use types::{
    Capabilities, Diagnostics, ProviderCapability, Snapshot, StopOptions, VmDescriptor, VmSpec, VmState,
};
