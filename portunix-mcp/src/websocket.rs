//! Transport 2: WebSocket (spec.md §4.6 "Transport 2: WebSocket"). An
//! `axum` HTTP server serving `/mcp` (upgrade) and `/health` (JSON
//! status), grounded in the teacher's `aerolithdb-api/src/rest.rs`
//! `Router::new()...with_state(...)` shape and `axum::serve` start-up.

use crate::dispatcher::Dispatcher;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const GRACEFUL_SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    port: u16,
}

/// Binds `addr` and serves until `cancel` fires, then allows in-flight
/// connections up to [`GRACEFUL_SHUTDOWN_BUDGET`] to drain before
/// returning (spec.md §4.6 "Lifecycle"). Returns `Ok(())` on a clean
/// shutdown either way.
pub async fn run(addr: SocketAddr, dispatcher: Arc<Dispatcher>, cancel: CancellationToken) -> anyhow::Result<()> {
    let app = build_router(dispatcher, addr.port());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "MCP WebSocket transport listening");

    let shutdown_signal = {
        let cancel = cancel.clone();
        async move { cancel.cancelled().await }
    };
    let serve_task = tokio::spawn(async move {
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await
    });

    cancel.cancelled().await;
    match tokio::time::timeout(GRACEFUL_SHUTDOWN_BUDGET, serve_task).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(e.into()),
        Ok(Err(join_err)) => Err(join_err.into()),
        Err(_) => {
            warn!("MCP WebSocket shutdown exceeded its 10s budget");
            Ok(())
        }
    }
}

fn build_router(dispatcher: Arc<Dispatcher>, port: u16) -> Router {
    let state = AppState { dispatcher, port };
    Router::new()
        .route("/health", get(health))
        .route("/mcp", get(upgrade))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "port": state.port,
        "permissions": state.dispatcher.permission().as_str(),
        "timestamp": chrono::Utc::now(),
    }))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.dispatcher))
}

/// Per-connection read loop: decode JSON, dispatch, write JSON reply.
/// Closes on any I/O error; the server itself keeps running (spec.md
/// §4.6 "Connections close on any I/O error; server continues").
async fn handle_socket(mut socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    loop {
        let message = match socket.recv().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(error = %e, "MCP WebSocket connection error, closing");
                return;
            }
            None => return,
        };

        let raw = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(_) => return,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let response = dispatcher.handle(&raw).await;
        if socket.send(Message::Text(String::from_utf8_lossy(&response).into_owned())).await.is_err() {
            return;
        }
    }
}
