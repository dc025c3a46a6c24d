//! Server lifecycle (spec.md §4.6 "Lifecycle"): installs a root
//! cancellable context, runs whichever transport applies, and cancels it
//! on `SIGINT`/`SIGTERM`.

use crate::dispatcher::{Dispatcher, PermissionLevel};
use crate::{stdio, websocket};
use portunix_core::lifecycle::CoreService;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Config(#[from] portunix_core::ConfigError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Which transport this invocation serves. Both are fully implemented;
/// the choice between them is made once at startup (spec.md §4.6
/// "Entered automatically when...").
#[derive(Debug, Clone)]
pub enum Transport {
    Stdio,
    WebSocket { bind_address: SocketAddr },
}

impl Transport {
    /// The auto-entry heuristic (spec.md §4.6): stdio when the process
    /// looks like it was launched by an AI assistant, WebSocket
    /// otherwise.
    pub fn detect(bind_address: SocketAddr) -> Self {
        if stdio::should_auto_enter_stdio() {
            Transport::Stdio
        } else {
            Transport::WebSocket { bind_address }
        }
    }
}

pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    transport: Transport,
    cancel: CancellationToken,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher, transport: Transport) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            transport,
            cancel: CancellationToken::new(),
        }
    }

    pub fn permission(&self) -> PermissionLevel {
        self.dispatcher.permission()
    }

    /// Runs the selected transport until `SIGINT`/`SIGTERM` or EOF.
    /// Returns once shutdown is clean.
    pub async fn serve(&self) -> anyhow::Result<()> {
        let signal_cancel = self.cancel.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("MCP server received shutdown signal");
            signal_cancel.cancel();
        });

        match &self.transport {
            Transport::Stdio => stdio::run(self.dispatcher.clone(), self.cancel.clone()).await,
            Transport::WebSocket { bind_address } => {
                websocket::run(*bind_address, self.dispatcher.clone(), self.cancel.clone()).await
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[async_trait::async_trait]
impl CoreService for McpServer {
    type Error = McpError;

    /// The dispatcher and transport are already fully constructed by
    /// [`McpServer::new`]; `initialize` has nothing left to do before
    /// [`McpServer::serve`] can be called.
    async fn initialize(&self, _cancel: CancellationToken) -> Result<(), McpError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        self.cancel.cancel();
        Ok(())
    }
}
