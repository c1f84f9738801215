//! MCP stdio client (component A, spec §4.1).
//!
//! Speaks MCP JSON-RPC over one child process's stdio. Correlation is
//! done by strict sequencing (spec §4.1): callers are required to hold
//! this client behind whatever serialization the caller needs, since a
//! given `McpStdioClient` allows only one in-flight request at a time
//! by construction — there is no internal mailbox.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::McpError;
use crate::mcp::protocol::{initialize_params, RpcMessage, RpcResponse};

/// Bound on retained stderr output, for diagnostics (spec §4.1).
const STDERR_TAIL_CAP: usize = 64 * 1024;
/// Grace period before a forced kill on `stop` (spec §4.1).
const STOP_GRACE: Duration = Duration::from_secs(5);
/// Hard cap on a single response line, matching the IPC transport's cap.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Ring buffer retaining at most the last [`STDERR_TAIL_CAP`] bytes of a
/// child's stderr, for attachment to error reports.
#[derive(Default)]
struct StderrTail {
    buf: VecDeque<u8>,
}

impl StderrTail {
    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend(chunk.iter().copied());
        while self.buf.len() > STDERR_TAIL_CAP {
            self.buf.pop_front();
        }
    }

    fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.buf.iter().copied().collect::<Vec<_>>()).into_owned()
    }
}

/// A single MCP server child process, speaking JSON-RPC over stdio.
pub struct McpStdioClient {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    stderr_tail: Arc<Mutex<StderrTail>>,
}

impl McpStdioClient {
    /// Spawn `command_string` (shell-style split), perform the MCP
    /// `initialize` handshake, and return a ready client.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Spawn`] if the process cannot be started, or
    /// [`McpError::HandshakeFailed`]/[`McpError::UnexpectedEof`] if the
    /// handshake does not complete.
    pub async fn start(
        command_string: &str,
        env: &std::collections::HashMap<String, String>,
    ) -> Result<Self, McpError> {
        let parts = shell_split(command_string);
        let Some((program, args)) = parts.split_first() else {
            return Err(McpError::Spawn {
                command: command_string.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: command_string.to_string(),
            source,
        })?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
        let stderr = child.stderr.take().expect("piped stderr");

        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));
        spawn_stderr_drain(stderr, Arc::clone(&stderr_tail));

        let mut client = Self {
            child,
            stdin,
            stdout,
            next_id: 0,
            stderr_tail,
        };

        client.handshake().await?;
        Ok(client)
    }

    async fn handshake(&mut self) -> Result<(), McpError> {
        let response = self
            .request("initialize", Some(initialize_params()))
            .await?;

        if let Some(err) = response.error {
            return Err(McpError::HandshakeFailed {
                reason: err.message,
                stderr_tail: self.stderr_tail().await,
            });
        }

        self.notify("notifications/initialized", None).await?;
        info!("MCP handshake complete");
        Ok(())
    }

    /// `tools/list` — returns the raw `result.tools` array.
    ///
    /// # Errors
    ///
    /// See [`McpError`] variants; all carry the stderr tail.
    pub async fn list_tools(&mut self) -> Result<Vec<Value>, McpError> {
        let response = self.request("tools/list", None).await?;
        let result = self.unwrap_result(response, "tools/list").await?;
        Ok(result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// `tools/call` — returns the raw `result` object.
    ///
    /// # Errors
    ///
    /// See [`McpError`] variants; all carry the stderr tail.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let response = self.request("tools/call", Some(params)).await?;
        self.unwrap_result(response, "tools/call").await
    }

    async fn unwrap_result(&self, response: RpcResponse, method: &str) -> Result<Value, McpError> {
        if let Some(err) = response.error {
            return Err(McpError::RpcError {
                method: method.to_string(),
                message: err.message,
                stderr_tail: self.stderr_tail().await,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Close stdin, then terminate the child with a grace period before
    /// a forced kill (spec §4.1).
    pub async fn stop(&mut self) {
        let _ = self.stdin.shutdown().await;

        if let Some(id) = self.child.id() {
            debug!(pid = id, "stopping MCP server child");
        }

        match timeout(STOP_GRACE, self.child.wait()).await {
            Ok(_) => {},
            Err(_) => {
                warn!("MCP server did not exit within grace period, killing");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            },
        }
    }

    async fn stderr_tail(&self) -> String {
        self.stderr_tail.lock().await.as_string()
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<RpcResponse, McpError> {
        let id = self.allocate_id();
        let message = RpcMessage::request(id, method, params);
        self.write_line(&message).await?;
        self.read_response(id).await
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let message = RpcMessage::notification(method, params);
        self.write_line(&message).await
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    async fn write_line(&mut self, message: &RpcMessage) -> Result<(), McpError> {
        let mut line = serde_json::to_vec(message).map_err(|e| McpError::MalformedResponse {
            reason: e.to_string(),
            stderr_tail: String::new(),
        })?;
        line.push(b'\n');
        self.stdin.write_all(&line).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Reads one line and validates it is actually a JSON-RPC response
    /// addressed to `expected_id`, not a request/notification echoed
    /// back by something that isn't speaking MCP at all (e.g. `cat`).
    /// `RpcResponse` has no `deny_unknown_fields`, so a naive parse would
    /// happily accept an echoed request body.
    async fn read_response(&mut self, expected_id: u64) -> Result<RpcResponse, McpError> {
        let mut line = String::new();
        let mut limited = (&mut self.stdout).take(MAX_LINE_BYTES as u64);
        let n = limited
            .read_line(&mut line)
            .await
            .map_err(McpError::from)?;

        if n == 0 {
            return Err(McpError::UnexpectedEof {
                stderr_tail: self.stderr_tail().await,
            });
        }

        let value: Value = serde_json::from_str(line.trim_end()).map_err(|e| McpError::MalformedResponse {
            reason: e.to_string(),
            stderr_tail: String::new(),
        })?;

        if value.get("method").is_some() {
            return Err(McpError::MalformedResponse {
                reason: "expected a JSON-RPC response but received a request/notification".to_string(),
                stderr_tail: String::new(),
            });
        }

        match value.get("id").and_then(Value::as_u64) {
            Some(id) if id == expected_id => {},
            Some(other) => {
                return Err(McpError::MalformedResponse {
                    reason: format!("response id {other} did not match request id {expected_id}"),
                    stderr_tail: String::new(),
                });
            },
            None => {
                return Err(McpError::MalformedResponse {
                    reason: "response missing 'id'".to_string(),
                    stderr_tail: String::new(),
                });
            },
        }

        serde_json::from_value(value).map_err(|e| McpError::MalformedResponse {
            reason: e.to_string(),
            stderr_tail: String::new(),
        })
    }
}

fn spawn_stderr_drain(stderr: tokio::process::ChildStderr, tail: Arc<Mutex<StderrTail>>) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = [0u8; 4096];
        loop {
            match tokio::io::AsyncReadExt::read(&mut reader, &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.lock().await.push(&buf[..n]);
                },
            }
        }
    });
}

/// Shell-style whitespace split, honoring single and double quotes.
/// Good enough for the simple `command` + `args` strings this gateway
/// forwards; not a full POSIX shell grammar.
fn shell_split(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            },
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
