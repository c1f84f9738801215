//! Unix-socket wire protocol (spec §4.5, §6): one line of UTF-8 JSON
//! per request/response, `\n`-terminated, no request ids — strictly
//! one-request-one-response-then-close.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard cap on a single wire line (spec §4.5, §6).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// An inbound IPC request, as decoded off the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl Request {
    /// Serialize as the single wire line (no trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// An outbound IPC response, serialized as a single wire line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "config_path")]
    pub config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "server_count")]
    pub server_count: Option<usize>,
}

impl Response {
    /// A bare success response, optionally carrying `message`.
    #[must_use]
    pub fn ok(message: impl Into<Option<String>>) -> Self {
        Self {
            success: Some(true),
            message: message.into(),
            ..Default::default()
        }
    }

    /// An error response. `retry` marks the documented retry hint
    /// (spec §7 taxonomy item 3).
    #[must_use]
    pub fn err(message: impl Into<String>, retry: bool) -> Self {
        Self {
            success: Some(false),
            error: Some(message.into()),
            retry: if retry { Some(true) } else { None },
            ..Default::default()
        }
    }

    /// Serialize as the single wire line (no trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"error\":\"serialization failure\"}".to_string())
    }
}
