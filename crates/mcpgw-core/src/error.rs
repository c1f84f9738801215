//! Error taxonomy (spec §7).
//!
//! Each component gets its own `thiserror` enum rather than one big
//! catch-all, mirroring `astrid-mcp`'s `McpError` / `McpResult` split.

use thiserror::Error;

/// Errors from the MCP stdio client (component A).
#[derive(Debug, Error)]
pub enum McpError {
    /// The child process could not be spawned.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Command that failed to spawn.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The `initialize` handshake response carried a JSON-RPC error.
    #[error("initialize failed: {reason} (stderr: {stderr_tail})")]
    HandshakeFailed {
        /// Reason string taken from the response's `error` field.
        reason: String,
        /// Last captured bytes of the child's stderr.
        stderr_tail: String,
    },

    /// Stdout closed before a response arrived (the child exited).
    #[error("server process exited unexpectedly (stderr: {stderr_tail})")]
    UnexpectedEof {
        /// Last captured bytes of the child's stderr.
        stderr_tail: String,
    },

    /// A response line could not be parsed as JSON.
    #[error("malformed response: {reason} (stderr: {stderr_tail})")]
    MalformedResponse {
        /// Parse error description.
        reason: String,
        /// Last captured bytes of the child's stderr.
        stderr_tail: String,
    },

    /// The server returned a JSON-RPC `error` object for a request.
    #[error("server error for {method}: {message} (stderr: {stderr_tail})")]
    RpcError {
        /// Method the request was for.
        method: String,
        /// Message from the `error` object.
        message: String,
        /// Last captured bytes of the child's stderr.
        stderr_tail: String,
    },

    /// I/O error writing to or reading from the child's stdio pipes.
    #[error("stdio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from registry/supervisor operations (components B, C).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `server-id` not present in the registry.
    #[error("server '{0}' is not running")]
    NotRunning(String),

    /// `server-id` already present (on `startServer`).
    #[error("server '{0}' is already running")]
    AlreadyRunning(String),

    /// `DaemonSettings.maxServers` admission cap reached.
    #[error("cannot start '{name}': maxServers ({max}) reached")]
    CapacityExceeded {
        /// Server id that was rejected.
        name: String,
        /// The configured cap.
        max: usize,
    },

    /// The underlying MCP client operation failed; caller should evict
    /// and, for tool calls, retry.
    #[error("{0}")]
    Client(#[from] McpError),
}

impl RegistryError {
    /// Whether a fresh `start` + retry of the same operation is the
    /// documented recovery path (spec §4.2, §7 taxonomy item 3).
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}

/// Errors from the IPC client / availability probe (component G).
#[derive(Debug, Error)]
pub enum IpcClientError {
    /// No socket file, connection refused, or EOF before a response.
    #[error("daemon unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete within its configured deadline.
    #[error("daemon request timed out")]
    Timeout,

    /// The response could not be parsed as JSON.
    #[error("malformed daemon response: {0}")]
    Malformed(String),
}

/// Errors surfaced by the mode dispatcher (component H).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The daemon path failed for a reason other than unavailability.
    #[error("daemon error: {0}")]
    Daemon(String),

    /// The direct (transient) path failed.
    #[error("direct invocation failed: {0}")]
    Direct(#[from] McpError),

    /// The referenced server name is unknown and the string could not
    /// be used as a raw command either (e.g. empty).
    #[error("invalid server reference: {0}")]
    InvalidReference(String),
}
