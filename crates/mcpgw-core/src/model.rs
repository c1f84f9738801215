//! Data model shared by every component of the gateway (spec §3).
//!
//! These types are filled in by the config loader (an external
//! collaborator — see `mcpgw-config`) and otherwise treated as opaque,
//! already-validated records by the core.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Immutable descriptor of how to launch one MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Unique, non-empty identity used by clients. Filled in from the
    /// `mcpServers` map key by the config loader; absent from the TOML
    /// representation itself.
    #[serde(default, skip_serializing)]
    pub name: String,
    /// Executable path or program name.
    pub command: String,
    /// Ordered argument list; may be empty.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overlay; empty means inherit parent only.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Free-form, opaque-to-the-core description.
    #[serde(default)]
    pub description: Option<String>,
    /// Include in daemon boot initialization.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    /// Failure to initialize is tolerated when policy is `warn`.
    #[serde(default)]
    pub optional: bool,
}

fn default_true() -> bool {
    true
}

impl ServerSpec {
    /// Build the shell-style command string the MCP stdio client spawns:
    /// `command` followed by space-joined `args`.
    #[must_use]
    pub fn command_string(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Policy applied when one or more auto-start servers fail to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnInitFailure {
    /// Abort daemon startup if any required server failed.
    Fail,
    /// Continue; log required failures at error, optional at warn.
    Warn,
    /// Continue; log everything at debug.
    Ignore,
}

impl Default for OnInitFailure {
    fn default() -> Self {
        Self::Warn
    }
}

/// Daemon-wide tunables (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSettings {
    /// Absolute filesystem path to the Unix socket.
    pub socket: Option<String>,
    /// Per-tool-call deadline, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Admission cap on concurrently running servers.
    #[serde(default = "default_max_servers")]
    pub max_servers: usize,
    /// Per-server startup deadline, in seconds.
    #[serde(default = "default_init_timeout")]
    pub initialization_timeout: u64,
    /// Batch width (≥ 1) for parallel initialization.
    #[serde(default = "default_parallel")]
    pub parallel_initialization: usize,
    /// Failure policy for the initializer.
    #[serde(default)]
    pub on_init_failure: OnInitFailure,
    /// Health monitor sweep interval, in seconds.
    #[serde(default = "default_health_interval")]
    pub health_interval_seconds: u64,
}

fn default_timeout() -> u64 {
    30
}
fn default_max_servers() -> usize {
    32
}
fn default_init_timeout() -> u64 {
    15
}
fn default_parallel() -> usize {
    4
}
fn default_health_interval() -> u64 {
    30
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket: None,
            timeout: default_timeout(),
            max_servers: default_max_servers(),
            initialization_timeout: default_init_timeout(),
            parallel_initialization: default_parallel(),
            on_init_failure: OnInitFailure::default(),
            health_interval_seconds: default_health_interval(),
        }
    }
}

impl DaemonSettings {
    /// Validate the fields the core actually consumes (spec §6).
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field encountered.
    pub fn validate(&self) -> Result<(), String> {
        if self.parallel_initialization == 0 {
            return Err("parallelInitialization must be >= 1".to_string());
        }
        if self.timeout == 0 {
            return Err("timeout must be > 0".to_string());
        }
        if self.initialization_timeout == 0 {
            return Err("initializationTimeout must be > 0".to_string());
        }
        Ok(())
    }

    /// Per-tool-call deadline as a [`Duration`].
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Per-server startup deadline as a [`Duration`].
    #[must_use]
    pub fn init_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.initialization_timeout)
    }

    /// Health monitor sweep interval as a [`Duration`].
    #[must_use]
    pub fn health_interval_duration(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds)
    }
}

/// A validated bundle of server specs plus daemon tunables — what the
/// config loader hands to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Configured MCP servers, keyed by name.
    #[serde(default)]
    pub mcp_servers: HashMap<String, ServerSpec>,
    /// Daemon tunables; defaulted if absent.
    #[serde(default)]
    pub daemon: DaemonSettings,
    /// Absolute path the config was loaded from, if any (for `get-config`).
    #[serde(skip)]
    pub source_path: Option<String>,
}

impl GatewayConfig {
    /// Servers with `autoStart = true`, in configuration iteration order.
    #[must_use]
    pub fn auto_start_servers(&self) -> Vec<&ServerSpec> {
        self.mcp_servers.values().filter(|s| s.auto_start).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_string_joins_args() {
        let spec = ServerSpec {
            name: "echo".to_string(),
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "echo-server".to_string()],
            env: HashMap::new(),
            description: None,
            auto_start: true,
            optional: false,
        };
        assert_eq!(spec.command_string(), "npx -y echo-server");
    }

    #[test]
    fn settings_reject_zero_batch_width() {
        let mut settings = DaemonSettings::default();
        settings.parallel_initialization = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn settings_default_is_valid() {
        assert!(DaemonSettings::default().validate().is_ok());
    }
}
