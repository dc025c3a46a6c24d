//! Shared configuration-error taxonomy.
//!
//! Every Core service (storage manager, plugin manager, virt manager, MCP
//! server, updater) exposes a factory of the shape `NewX(config) -> Result<X,
//! ConfigError>` per the contract in spec §6.1. `ConfigError` is the one error
//! type shared verbatim across crates; everything past construction uses a
//! crate-local taxonomy instead (see each crate's `error` module).

use thiserror::Error;

/// Malformed or inconsistent configuration, fatal at service construction.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field was empty where a non-empty value is mandatory.
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    /// A reference (e.g. a route's `plugin`) names an entry that does not
    /// exist in the rest of the configuration.
    #[error("{kind} '{name}' references undefined {target_kind} '{target}'")]
    DanglingReference {
        kind: &'static str,
        name: String,
        target_kind: &'static str,
        target: String,
    },

    /// Two entries that must be unique share a name.
    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    /// A value failed basic type/range validation.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// The configuration file could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(String),
}
