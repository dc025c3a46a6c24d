//! Structured logging setup, shared by the long-running server binary and
//! the ambient test harnesses. Mirrors the teacher's `tracing_subscriber`
//! configuration: `EnvFilter` driven by `RUST_LOG`, with a default level
//! derived from a verbosity flag, and JSON output for production deployments.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber.
///
/// `default_directive` sets the fallback level (e.g. `"portunix=info"`) used
/// when `RUST_LOG` is unset. `json` selects structured JSON output, suited to
/// log aggregation; plain output is easier to read interactively.
pub fn init_tracing(default_directive: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
