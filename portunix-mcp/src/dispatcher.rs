//! Transport-agnostic JSON-RPC dispatcher (spec.md §4.6 "Dispatcher", §9
//! "Keep the dispatcher pure": `request → response`, fed by any
//! transport). The fixed vocabulary (`initialize`, `ping`, `tools/list`,
//! `tools/call`) lives here; concrete tool handler bodies are registered
//! by the caller and are outside the Core (spec.md §4.6).

use crate::protocol::{Request, Response};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// `limited|standard|full` (spec.md §4.6 "Permissions"). No capability is
/// added to the dispatcher itself beyond echoing the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    Limited,
    Standard,
    Full,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Limited => "limited",
            PermissionLevel::Standard => "standard",
            PermissionLevel::Full => "full",
        }
    }
}

pub type HandlerFn = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Metadata surfaced by `tools/list` for a registered tool method
/// (spec.md §4.6: "tool methods with the `mcp_` prefix").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// Maps method names to handlers and answers the fixed MCP vocabulary.
/// One instance is shared (read-only after construction) across every
/// stdio and WebSocket connection.
pub struct Dispatcher {
    methods: HashMap<String, HandlerFn>,
    tools: Vec<ToolDescriptor>,
    permission: PermissionLevel,
    server_name: String,
    server_version: String,
}

impl Dispatcher {
    pub fn new(permission: PermissionLevel, server_name: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self {
            methods: HashMap::new(),
            tools: Vec::new(),
            permission,
            server_name: server_name.into(),
            server_version: server_version.into(),
        }
    }

    pub fn permission(&self) -> PermissionLevel {
        self.permission
    }

    /// Registers a bare JSON-RPC method, invisible to `tools/list`.
    pub fn register_method(&mut self, name: impl Into<String>, handler: HandlerFn) {
        self.methods.insert(name.into(), handler);
    }

    /// Registers a tool: visible via `tools/list` and callable either
    /// directly by its `mcp_`-prefixed method name or via `tools/call`.
    pub fn register_tool(&mut self, descriptor: ToolDescriptor, handler: HandlerFn) {
        self.methods.insert(descriptor.name.clone(), handler);
        self.tools.push(descriptor);
    }

    /// `fn handle(&self, raw) -> Vec<u8>` (spec.md §9): decodes one
    /// request, dispatches it, and re-encodes the response. Malformed
    /// input yields a JSON-RPC parse-error response rather than a
    /// transport-level failure, so both transports can feed it arbitrary
    /// bytes uniformly.
    #[instrument(skip(self, raw))]
    pub async fn handle(&self, raw: &[u8]) -> Vec<u8> {
        let response = match serde_json::from_slice::<Request>(raw) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "failed to parse JSON-RPC request");
                Response::parse_error(e.to_string())
            }
        };
        serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec())
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => Response::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            other => self.dispatch_registered(other, request).await,
        }
    }

    async fn dispatch_registered(&self, method: &str, request: Request) -> Response {
        match self.methods.get(method) {
            Some(handler) => match handler(request.params).await {
                Ok(result) => Response::success(request.id, result),
                Err(e) => Response::internal_error(request.id, e),
            },
            None => Response::method_not_found(request.id, method),
        }
    }

    fn handle_initialize(&self, request: Request) -> Response {
        Response::success(
            request.id,
            json!({
                "serverInfo": { "name": self.server_name, "version": self.server_version },
                "permissions": self.permission.as_str(),
                "capabilities": { "tools": {} },
            }),
        )
    }

    fn handle_tools_list(&self, request: Request) -> Response {
        Response::success(request.id, json!({ "tools": self.tools }))
    }

    async fn handle_tools_call(&self, request: Request) -> Response {
        let name = request.params.get("name").and_then(Value::as_str).map(str::to_string);
        let Some(name) = name else {
            return Response::internal_error(request.id, "tools/call requires a string 'name' parameter");
        };
        let arguments = request.params.get("arguments").cloned().unwrap_or(Value::Null);
        match self.methods.get(&name) {
            Some(handler) => match handler(arguments).await {
                Ok(result) => Response::success(request.id, result),
                Err(e) => Response::internal_error(request.id, e),
            },
            None => Response::method_not_found(request.id, &name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(PermissionLevel::Standard, "portunix-mcp", "0.1.0")
    }

    #[tokio::test]
    async fn unknown_method_reports_the_spec_error_shape() {
        let dispatcher = dispatcher();
        let raw = br#"{"jsonrpc":"2.0","method":"nope","id":7}"#;
        let response_bytes = dispatcher.handle(raw).await;
        let response: Value = serde_json::from_slice(&response_bytes).unwrap();
        assert_eq!(response["id"], 7);
        assert_eq!(response["error"]["code"], -32601);
        assert_eq!(response["error"]["message"], "Method not found");
        assert_eq!(response["error"]["data"], "nope");
    }

    #[tokio::test]
    async fn registered_handler_echoes_the_request_id() {
        let mut dispatcher = dispatcher();
        dispatcher.register_method(
            "echo",
            Arc::new(|params: Value| Box::pin(async move { Ok(params) })),
        );
        let raw = br#"{"jsonrpc":"2.0","method":"echo","params":{"a":1},"id":"req-1"}"#;
        let response_bytes = dispatcher.handle(raw).await;
        let response: Value = serde_json::from_slice(&response_bytes).unwrap();
        assert_eq!(response["id"], "req-1");
        assert_eq!(response["result"]["a"], 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_an_internal_error_response() {
        let mut dispatcher = dispatcher();
        dispatcher.register_method(
            "boom",
            Arc::new(|_: Value| Box::pin(async move { Err(anyhow::anyhow!("kaboom")) })),
        );
        let raw = br#"{"jsonrpc":"2.0","method":"boom","id":1}"#;
        let response_bytes = dispatcher.handle(raw).await;
        let response: Value = serde_json::from_slice(&response_bytes).unwrap();
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["data"], "kaboom");
    }

    #[tokio::test]
    async fn tools_list_reports_registered_tools() {
        let mut dispatcher = dispatcher();
        dispatcher.register_tool(
            ToolDescriptor {
                name: "mcp_system_info".to_string(),
                description: "reports host system info".to_string(),
            },
            Arc::new(|_: Value| Box::pin(async move { Ok(json!({"os": "linux"})) })),
        );
        let raw = br#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#;
        let response_bytes = dispatcher.handle(raw).await;
        let response: Value = serde_json::from_slice(&response_bytes).unwrap();
        assert_eq!(response["result"]["tools"][0]["name"], "mcp_system_info");
    }

    #[tokio::test]
    async fn tools_call_dispatches_by_name() {
        let mut dispatcher = dispatcher();
        dispatcher.register_tool(
            ToolDescriptor {
                name: "mcp_system_info".to_string(),
                description: "reports host system info".to_string(),
            },
            Arc::new(|_: Value| Box::pin(async move { Ok(json!({"os": "linux"})) })),
        );
        let raw = br#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"mcp_system_info"},"id":1}"#;
        let response_bytes = dispatcher.handle(raw).await;
        let response: Value = serde_json::from_slice(&response_bytes).unwrap();
        assert_eq!(response["result"]["os"], "linux");
    }

    #[tokio::test]
    async fn initialize_echoes_the_permission_label() {
        let dispatcher = Dispatcher::new(PermissionLevel::Full, "portunix-mcp", "0.1.0");
        let raw = br#"{"jsonrpc":"2.0","method":"initialize","id":1}"#;
        let response_bytes = dispatcher.handle(raw).await;
        let response: Value = serde_json::from_slice(&response_bytes).unwrap();
        assert_eq!(response["result"]["permissions"], "full");
    }
}
