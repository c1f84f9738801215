//! MCP stdio client (component A, spec §4.1).

mod client;
mod protocol;

pub use client::McpStdioClient;
pub use protocol::{initialize_params, RpcMessage, RpcResponse, PROTOCOL_VERSION};
