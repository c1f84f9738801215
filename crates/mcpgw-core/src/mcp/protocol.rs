//! Wire shapes for the MCP subprocess protocol (spec §4.1, §6).
//!
//! Tool definitions and call results are treated as opaque JSON per
//! spec §9 ("Dynamic shape of MCP messages") — only the envelope
//! (`jsonrpc`, `id`, `method`, `params`, `result`, `error`) is typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol version this client speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Client name advertised during the `initialize` handshake.
pub const CLIENT_NAME: &str = "mcp-cli";
/// Client version advertised during the `initialize` handshake.
pub const CLIENT_VERSION: &str = "1.0.0";

/// An outbound JSON-RPC request or notification.
#[derive(Debug, Clone, Serialize)]
pub struct RpcMessage {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcMessage {
    /// Build a request carrying the given id.
    #[must_use]
    pub fn request(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Build a notification (no id, no response expected).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.into(),
            params,
        }
    }
}

/// Error object embedded in a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// An inbound JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Build the `initialize` request params (spec §4.1).
#[must_use]
pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "roots": { "listChanged": true },
            "sampling": {}
        },
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": CLIENT_VERSION
        }
    })
}
