//! Plugin subsystem error taxonomy, composed in the style of the
//! teacher's `aerolithdb-saas/src/errors.rs`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    /// Lower-level I/O or RPC failure, wrapped with the operation name
    /// (spec.md §7 `TransportError`).
    #[error("transport error during '{op}': {cause}")]
    Transport { op: String, cause: String },

    /// The plugin responded with `success=false` (spec.md §7
    /// `PluginError`).
    #[error("plugin '{plugin}' reported failure during '{op}': {message}")]
    Remote {
        plugin: String,
        op: String,
        message: String,
    },

    /// A route named a plugin lacking the `database_access` capability
    /// (spec.md §4.1 `Initialize`).
    #[error("plugin '{0}' does not have the database_access capability")]
    NotADatastorePlugin(String),

    /// `GetPlugin` was asked about a name the process manager has never
    /// heard of.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    /// `StartPlugin` did not observe a healthy status within its budget.
    #[error("plugin '{name}' failed to start within {timeout_secs}s")]
    StartTimeout { name: String, timeout_secs: u64 },

    /// An operation exceeded its deadline (spec.md §7 `TimeoutError`).
    #[error("operation '{op}' timed out after {timeout_secs}s")]
    Timeout { op: String, timeout_secs: u64 },

    #[error(transparent)]
    Config(#[from] portunix_core::ConfigError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PluginError>;
