//! Virtualization subsystem error taxonomy, composed in the style of the
//! teacher's `aerolithdb-saas/src/errors.rs`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VirtError {
    /// No provider could be detected as available on this host (spec.md
    /// §4.5 "Capability detection").
    #[error("no virtualization provider is available on this host")]
    NoProviderAvailable,

    /// A caller asked for a provider name the manager doesn't recognize.
    #[error("unknown virtualization provider '{0}'")]
    UnknownProvider(String),

    /// `GetState`/`GetInfo`/etc. on a VM the backend has never heard of
    /// (spec.md §7 `NotFoundError`).
    #[error("VM '{0}' not found")]
    NotFound(String),

    /// An OS permission was denied, wrapped with an actionable hint
    /// (spec.md §7 `PermissionError`): reinstall, elevate, join a group.
    #[error("{detail} ({hint})")]
    Permission { detail: String, hint: String },

    /// The VM backend reported an error state mid-operation, carrying
    /// whatever detail the backend's own tool emitted (spec.md §7
    /// `VMStateError`).
    #[error("VM entered error state: {detail}")]
    VmState { detail: String },

    /// The backend tool's output could not be parsed into a structured
    /// record.
    #[error("failed to parse '{tool}' output: {reason}")]
    ParseFailure { tool: &'static str, reason: String },

    /// The requested operation is not implemented by this adapter
    /// (spec.md §4.5 "Adapters may declare unimplemented operations by
    /// returning a descriptive error").
    #[error("'{op}' is not supported by the {provider} adapter")]
    Unsupported { provider: &'static str, op: &'static str },

    /// Launching or communicating with the backend's CLI tool failed.
    #[error("failed to run '{tool}': {cause}")]
    Io { tool: &'static str, cause: String },

    #[error(transparent)]
    Config(#[from] portunix_core::ConfigError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VirtError>;
