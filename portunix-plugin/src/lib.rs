//! Plugin Lifecycle & RPC Adapter (spec.md §4.3, §4.4): turns a plugin
//! process speaking the datastore gRPC schema into a local
//! [`portunix_storage::Backend`], plus the process manager that starts,
//! health-checks, and stops the plugin that backend talks to.

pub mod adapter;
pub mod client;
pub mod codec;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod init;
pub mod process;
pub mod transport;
pub mod wire;

pub use adapter::PluginRpcAdapter;
pub use client::DatastorePluginClient;
pub use descriptor::{PluginCapabilities, PluginDescriptor, PluginEndpoint, PluginStatus};
pub use error::{PluginError, Result};
pub use init::{initialize_plugin_datastores, PluginBackendInitializer};
pub use process::{PluginLaunchSpec, PluginProcessManager};
