//! MCP Server (spec.md §4.6): a transport-agnostic JSON-RPC dispatcher
//! fed by either a stdio or a WebSocket transport, wired together by
//! [`server::McpServer`] with `SIGINT`/`SIGTERM`-driven shutdown.

pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod stdio;
pub mod websocket;

pub use dispatcher::{Dispatcher, HandlerFn, PermissionLevel, ToolDescriptor};
pub use protocol::{ErrorObject, Request, Response};
pub use server::{McpError, McpServer, Transport};
