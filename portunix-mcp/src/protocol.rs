//! JSON-RPC 2.0 envelope (spec.md §4.6, §6.5): `{jsonrpc, method, params,
//! id}` requests and `{jsonrpc, result|error, id}` responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;
pub const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    pub id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
                data,
            }),
            id,
        }
    }

    /// `{code: -32601, message: "Method not found", data: method}`
    /// (spec.md §4.6 "Dispatcher").
    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(Value::String(method.to_string())),
        )
    }

    /// `{code: -32603, message: "Internal error", data: err.String()}`
    /// (spec.md §4.6 "Dispatcher").
    pub fn internal_error(id: Value, err: impl std::fmt::Display) -> Self {
        Self::error(
            id,
            INTERNAL_ERROR,
            "Internal error",
            Some(Value::String(err.to_string())),
        )
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message, None)
    }
}
