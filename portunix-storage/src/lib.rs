//! Storage Routing Layer and File Datastore Backend.
//!
//! Resolves keys to named backends via a configured route table and
//! delegates `Store`/`Retrieve`/`Delete`/`List`/`Query`/`Health`/`Stats`
//! to whichever backend owns them. Ships one backend implementation
//! (the local file datastore); `portunix-plugin`'s RPC adapter implements
//! the same [`Backend`] trait and is wired in externally via
//! [`StorageManager::register_backend`], keeping this crate free of any
//! dependency on the plugin transport.

pub mod backend;
pub mod config;
pub mod error;
pub mod file_backend;
pub mod manager;
pub mod pattern;
pub mod query;
pub mod record;
pub mod route;
pub mod stats;

pub use backend::{Backend, BackendResult, FanoutOutcome, PluginInitializer};
pub use config::StorageManagerConfig;
pub use error::{Result, StorageError};
pub use file_backend::{FileBackend, FileFormat};
pub use manager::StorageManager;
pub use query::{Query, Sort, SortDirection};
pub use record::{Filter, Metadata, Record, Value};
pub use route::{Route, RouteTable};
pub use stats::{BackendHealth, DatastoreStats, HealthMap, StatsMap};
