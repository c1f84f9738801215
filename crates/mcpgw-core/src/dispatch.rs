//! Mode dispatcher (component H, spec §4.6): resolves a server
//! reference against configuration, prefers the daemon when reachable,
//! and falls back to a transient direct client otherwise.

use std::path::PathBuf;

use serde_json::Value;

use crate::error::DispatchError;
use crate::ipc::{probe_daemon, Request, SocketClient};
use crate::mcp::McpStdioClient;
use crate::model::GatewayConfig;

/// Outcome of resolving a caller-supplied server reference against
/// configuration (spec §4.6 step 1).
enum Resolved<'a> {
    /// A name present in `mcpServers`.
    Configured { name: &'a str, command: String },
    /// A raw command string with no matching configuration entry.
    Raw(String),
}

fn resolve<'a>(config: &'a GatewayConfig, reference: &'a str) -> Result<Resolved<'a>, DispatchError> {
    if reference.trim().is_empty() {
        return Err(DispatchError::InvalidReference(reference.to_string()));
    }
    if let Some(spec) = config.mcp_servers.get(reference) {
        return Ok(Resolved::Configured {
            name: reference,
            command: spec.command_string(),
        });
    }
    Ok(Resolved::Raw(reference.to_string()))
}

/// Chooses between the daemon and a transient direct client for each
/// call, so CLI callers never need to know whether a daemon is running
/// (spec §4.6, §1 "transparent fallback").
pub struct Dispatcher {
    config: GatewayConfig,
    socket_path: PathBuf,
}

impl Dispatcher {
    /// Build a dispatcher bound to `config` and the daemon socket at
    /// `socket_path`.
    #[must_use]
    pub fn new(config: GatewayConfig, socket_path: PathBuf) -> Self {
        Self { config, socket_path }
    }

    /// Whether a live daemon currently answers on the configured socket.
    pub async fn daemon_available(&self) -> bool {
        probe_daemon(&self.socket_path).await
    }

    /// List tools for `reference`, via the daemon if reachable, else a
    /// transient direct connection.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on resolution failure or if both paths
    /// fail.
    pub async fn list_tools(&self, reference: &str) -> Result<Vec<Value>, DispatchError> {
        let resolved = resolve(&self.config, reference)?;

        if self.daemon_available().await {
            match self.list_tools_via_daemon(&resolved).await {
                Ok(tools) => return Ok(tools),
                Err(DispatchError::Daemon(msg)) => {
                    tracing::warn!(error = %msg, "daemon list failed, falling back to direct");
                },
                Err(e) => return Err(e),
            }
        }

        self.list_tools_direct(&resolved).await
    }

    /// Call `tool` on `reference`, via the daemon if reachable, else a
    /// transient direct connection.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on resolution failure or if both paths
    /// fail.
    pub async fn call_tool(
        &self,
        reference: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, DispatchError> {
        let resolved = resolve(&self.config, reference)?;

        if self.daemon_available().await {
            match self.call_tool_via_daemon(&resolved, tool, arguments.clone()).await {
                Ok(value) => return Ok(value),
                Err(DispatchError::Daemon(msg)) => {
                    tracing::warn!(error = %msg, "daemon call failed, falling back to direct");
                },
                Err(e) => return Err(e),
            }
        }

        self.call_tool_direct(&resolved, tool, arguments).await
    }

    async fn ensure_started_on_daemon(&self, resolved: &Resolved<'_>) -> Result<String, DispatchError> {
        let client = SocketClient::new(self.socket_path.clone());
        let (id, command) = match resolved {
            Resolved::Configured { name, command } => (name.to_string(), command.clone()),
            Resolved::Raw(command) => (crate::id::synthesize(command), command.clone()),
        };

        let request = Request {
            command: "start".to_string(),
            server: Some(id.clone()),
            server_command: Some(command),
            ..Default::default()
        };
        let response = client
            .send_control(&request)
            .await
            .map_err(|e| DispatchError::Daemon(e.to_string()))?;

        if response.success == Some(true) {
            Ok(id)
        } else {
            Err(DispatchError::Daemon(
                response.error.unwrap_or_else(|| "start failed".to_string()),
            ))
        }
    }

    async fn list_tools_via_daemon(&self, resolved: &Resolved<'_>) -> Result<Vec<Value>, DispatchError> {
        let id = self.ensure_started_on_daemon(resolved).await?;
        let client = SocketClient::new(self.socket_path.clone());
        let request = Request {
            command: "list".to_string(),
            server: Some(id),
            ..Default::default()
        };
        let response = client
            .send_control(&request)
            .await
            .map_err(|e| DispatchError::Daemon(e.to_string()))?;

        if response.success == Some(true) {
            Ok(response
                .tools
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default())
        } else {
            Err(DispatchError::Daemon(
                response.error.unwrap_or_else(|| "list failed".to_string()),
            ))
        }
    }

    async fn call_tool_via_daemon(
        &self,
        resolved: &Resolved<'_>,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, DispatchError> {
        let id = self.ensure_started_on_daemon(resolved).await?;
        let client = SocketClient::new(self.socket_path.clone());
        let request = Request {
            command: "call".to_string(),
            server: Some(id),
            tool: Some(tool.to_string()),
            arguments: Some(arguments),
            ..Default::default()
        };
        let response = client
            .send_control(&request)
            .await
            .map_err(|e| DispatchError::Daemon(e.to_string()))?;

        if response.success == Some(true) {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            Err(DispatchError::Daemon(
                response.error.unwrap_or_else(|| "call failed".to_string()),
            ))
        }
    }

    async fn list_tools_direct(&self, resolved: &Resolved<'_>) -> Result<Vec<Value>, DispatchError> {
        let command = match resolved {
            Resolved::Configured { command, .. } => command.clone(),
            Resolved::Raw(command) => command.clone(),
        };
        let env = match resolved {
            Resolved::Configured { name, .. } => self
                .config
                .mcp_servers
                .get(*name)
                .map(|s| s.env.clone())
                .unwrap_or_default(),
            Resolved::Raw(_) => Default::default(),
        };

        let mut client = McpStdioClient::start(&command, &env).await?;
        let tools = client.list_tools().await?;
        client.stop().await;
        Ok(tools)
    }

    async fn call_tool_direct(
        &self,
        resolved: &Resolved<'_>,
        tool: &str,
        arguments: Value,
    ) -> Result<Value, DispatchError> {
        let command = match resolved {
            Resolved::Configured { command, .. } => command.clone(),
            Resolved::Raw(command) => command.clone(),
        };
        let env = match resolved {
            Resolved::Configured { name, .. } => self
                .config
                .mcp_servers
                .get(*name)
                .map(|s| s.env.clone())
                .unwrap_or_default(),
            Resolved::Raw(_) => Default::default(),
        };

        let mut client = McpStdioClient::start(&command, &env).await?;
        let result = client.call_tool(tool, arguments).await;
        client.stop().await;
        Ok(result?)
    }
}

/// Default socket path when neither an explicit argument nor
/// `MCP_DAEMON_SOCKET` is set (spec §6).
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/mcp-daemon.sock";

/// Resolve the daemon socket path with precedence: explicit argument >
/// `MCP_DAEMON_SOCKET` env var > [`DEFAULT_SOCKET_PATH`] (spec §6).
#[must_use]
pub fn resolve_socket_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("MCP_DAEMON_SOCKET") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerSpec;
    use std::collections::HashMap;

    #[test]
    fn resolve_socket_path_prefers_explicit_argument() {
        let path = resolve_socket_path(Some("/custom/sock"));
        assert_eq!(path, PathBuf::from("/custom/sock"));
    }

    #[test]
    fn resolve_socket_path_falls_back_to_default() {
        std::env::remove_var("MCP_DAEMON_SOCKET");
        let path = resolve_socket_path(None);
        assert_eq!(path, PathBuf::from(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn resolve_empty_reference_is_rejected() {
        let config = GatewayConfig::default();
        let err = resolve(&config, "   ").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReference(_)));
    }

    #[test]
    fn resolve_prefers_configured_name_over_raw_command() {
        let mut config = GatewayConfig::default();
        config.mcp_servers.insert(
            "echo".to_string(),
            ServerSpec {
                name: "echo".to_string(),
                command: "npx".to_string(),
                args: vec!["-y".to_string(), "echo-server".to_string()],
                env: HashMap::new(),
                description: None,
                auto_start: true,
                optional: false,
            },
        );
        match resolve(&config, "echo").unwrap() {
            Resolved::Configured { name, command } => {
                assert_eq!(name, "echo");
                assert_eq!(command, "npx -y echo-server");
            },
            Resolved::Raw(_) => panic!("expected Configured"),
        }
    }

    #[tokio::test]
    async fn daemon_unavailable_when_no_socket_file() {
        let config = GatewayConfig::default();
        let dispatcher = Dispatcher::new(config, PathBuf::from("/tmp/no-such-mcpgw-socket.sock"));
        assert!(!dispatcher.daemon_available().await);
    }
}
