//! Storage subsystem error taxonomy.
//!
//! Follows the composition style of the teacher's
//! `aerolithdb-saas/src/errors.rs`: one `#[derive(Error)]` enum per crate,
//! field-carrying variants with `#[error("...")]` messages that already
//! contain the context a caller needs, and an `#[from]` bridge for
//! configuration errors raised during construction.

use portunix_core::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// `Retrieve`/`Delete` addressed a key that does not exist in the
    /// resolved backend.
    #[error("key '{key}' not found in datastore '{datastore}'")]
    NotFound { datastore: String, key: String },

    /// No configured route matched the given key.
    #[error("no route matches key '{key}'")]
    NoRoute { key: String },

    /// A `List`/`Query` filter referenced a comparison the backend cannot
    /// evaluate (e.g. an operator the file backend doesn't implement).
    #[error("filter mismatch on field '{field}': {reason}")]
    FilterMismatch { field: String, reason: String },

    /// The named datastore has no registered backend.
    #[error("unknown datastore '{0}'")]
    UnknownDatastore(String),

    /// Every backend touched by a fan-out operation failed.
    #[error("all {count} backend(s) failed: {last}")]
    AllBackendsFailed { count: usize, last: String },

    /// Underlying backend I/O (file, plugin transport) failed.
    #[error("backend '{backend}' error: {source}")]
    Backend {
        backend: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
