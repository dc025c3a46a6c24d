//! Lifecycle contract shared by every Core service.
//!
//! Per spec §6.1, each service exposes `Initialize(ctx)` and `Close(ctx)` in
//! addition to its own operations. Rust has no implicit per-call context
//! object the way Go does; `tokio_util::sync::CancellationToken` plays that
//! role here and is threaded explicitly wherever spec §5 requires
//! cancellation to propagate (Initialize, fan-out List/Query).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A Core service with an explicit ready/torn-down lifecycle.
///
/// `initialize` must be idempotent-safe to call once; a second call before
/// `close` is a caller error, not something this trait enforces — each
/// implementor documents its own re-entrancy rules (the storage manager, for
/// instance, allows `close` then `initialize` again via `ReloadConfig`).
#[async_trait]
pub trait CoreService: Send + Sync {
    type Error;

    /// Transition from constructed to ready, propagating `cancel` into any
    /// work this service must perform to become operational.
    async fn initialize(&self, cancel: CancellationToken) -> Result<(), Self::Error>;

    /// Tear down all owned resources and return to an uninitialized state.
    async fn close(&self) -> Result<(), Self::Error>;
}
