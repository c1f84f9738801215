//! mcpgw-core - daemon runtime and client-side dispatch for the MCP
//! tool-invocation gateway.
//!
//! This crate provides:
//! - A stdio JSON-RPC client for one MCP server child process
//! - A server registry and supervisor with per-server locking
//! - Parallel, policy-driven auto-initialization at daemon startup
//! - A background health monitor that restarts crashed auto-started servers
//! - A Unix-socket IPC server and client speaking a line-delimited JSON protocol
//! - A mode dispatcher that transparently prefers the daemon and falls back
//!   to a transient direct connection
//!
//! # Example
//!
//! ```rust,no_run
//! use mcpgw_core::{Dispatcher, resolve_socket_path};
//! use mcpgw_core::model::GatewayConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GatewayConfig::default();
//! let dispatcher = Dispatcher::new(config, resolve_socket_path(None));
//! let tools = dispatcher.list_tools("filesystem").await?;
//! println!("{} tools available", tools.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(unreachable_pub)]

pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod id;
pub mod init;
pub mod ipc;
pub mod mcp;
pub mod model;
pub mod registry;

pub use daemon::Daemon;
pub use dispatch::{resolve_socket_path, Dispatcher, DEFAULT_SOCKET_PATH};
pub use error::{DispatchError, IpcClientError, McpError, RegistryError};
pub use health::HealthMonitor;
pub use init::{InitializationResult, Initializer, ServerInitResult};
pub use mcp::McpStdioClient;
pub use registry::Registry;
