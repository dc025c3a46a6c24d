//! Error taxonomy for the self-update engine (spec.md §4.7, §7): registry
//! lookup, download, checksum, archive, and apply failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    /// No release could be found (registry empty, or the requested tag
    /// does not exist).
    #[error("no release found: {0}")]
    NotFound(String),

    /// A release is missing the binary or checksum asset this platform
    /// needs.
    #[error("release {tag} has no {kind} asset matching {pattern}")]
    MissingAsset {
        tag: String,
        kind: &'static str,
        pattern: String,
    },

    /// The downloaded archive's digest did not match its checksum
    /// asset, or the checksum file had no matching entry.
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// An archive did not contain the mandatory primary binary.
    #[error("archive is missing the primary binary {0}")]
    MissingPrimaryBinary(String),

    /// Applying the update failed partway; all prior backups were
    /// restored before this error was returned.
    #[error("failed to apply update to {binary}: {cause}")]
    ApplyFailed { binary: String, cause: String },

    /// Windows only: the live binary's directory is not writable by the
    /// current process. A PowerShell fallback script was written instead
    /// of performing a partial update.
    #[error("write permission denied for {path}; run the generated script at {script_path}")]
    NeedsElevation { path: String, script_path: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] portunix_core::ConfigError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, UpdateError>;
