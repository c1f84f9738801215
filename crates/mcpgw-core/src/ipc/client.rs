//! IPC client and availability probe (component G, spec §4.6).

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::IpcClientError;
use crate::ipc::protocol::{Request, Response, MAX_LINE_BYTES};

/// Deadline for the cheap "is a daemon listening" probe (spec §4.6).
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Deadline for control-plane requests (`start`, `stop`, `status`, ...).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// A one-shot connection to the daemon's Unix socket: connect, send one
/// request line, read one response line, close (spec §4.5, §4.6).
pub struct SocketClient {
    socket_path: std::path::PathBuf,
}

impl SocketClient {
    /// Build a client targeting `socket_path`. Connection happens lazily
    /// per request, matching the daemon's one-request-one-response-then-
    /// close contract.
    #[must_use]
    pub fn new(socket_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Send `request` and await the single-line response, bounded by
    /// `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`IpcClientError::Unavailable`] if the socket cannot be
    /// connected to, [`IpcClientError::Timeout`] if `deadline` elapses,
    /// or [`IpcClientError::Malformed`] if the response is not valid
    /// `Response` JSON.
    pub async fn send_request(
        &self,
        request: &Request,
        deadline: Duration,
    ) -> Result<Response, IpcClientError> {
        tokio::time::timeout(deadline, self.send_request_inner(request))
            .await
            .map_err(|_| IpcClientError::Timeout)?
    }

    /// [`Self::send_request`] with the standard control-plane deadline.
    pub async fn send_control(&self, request: &Request) -> Result<Response, IpcClientError> {
        self.send_request(request, CONTROL_TIMEOUT).await
    }

    async fn send_request_inner(&self, request: &Request) -> Result<Response, IpcClientError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcClientError::Unavailable(e.to_string()))?;

        let mut line = request.to_line();
        line.push('\n');
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| IpcClientError::Unavailable(e.to_string()))?;
        let _ = stream.shutdown().await;

        let line = read_response_line(&mut stream)
            .await
            .map_err(|e| IpcClientError::Unavailable(e.to_string()))?;

        serde_json::from_str(&line).map_err(|e| IpcClientError::Malformed(e.to_string()))
    }
}

async fn read_response_line(stream: &mut UnixStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if buf.len() >= MAX_LINE_BYTES {
            break;
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 || byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Cheap availability probe: true only if a `status` round-trip
/// succeeds within [`PROBE_TIMEOUT`] (spec §4.6, used by the mode
/// dispatcher to decide daemon-vs-direct).
pub async fn probe_daemon(socket_path: &Path) -> bool {
    if !socket_path.exists() {
        return false;
    }
    let client = SocketClient::new(socket_path.to_path_buf());
    let request = Request {
        command: "status".to_string(),
        ..Default::default()
    };
    client
        .send_request(&request, PROBE_TIMEOUT)
        .await
        .is_ok_and(|r| r.success == Some(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_returns_false_when_socket_file_absent() {
        let path = Path::new("/tmp/definitely-not-a-real-mcpgw-socket.sock");
        assert!(!probe_daemon(path).await);
    }

    #[tokio::test]
    async fn send_request_fails_fast_against_missing_socket() {
        let client = SocketClient::new("/tmp/definitely-not-a-real-mcpgw-socket.sock");
        let request = Request {
            command: "status".to_string(),
            ..Default::default()
        };
        let err = client
            .send_request(&request, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, IpcClientError::Unavailable(_)));
    }
}
