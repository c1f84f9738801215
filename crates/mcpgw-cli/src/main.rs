//! `mcp-cli` — command-line front end for the MCP tool-invocation
//! gateway. Argument parsing, output formatting, and daemon process
//! management live here; everything protocol- and lifecycle-related
//! lives in `mcpgw-core`.

mod format;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcpgw_core::ipc::{Request, SocketClient};
use mcpgw_core::{resolve_socket_path, Daemon, Dispatcher};

#[derive(Parser)]
#[command(name = "mcp-cli", about = "Invoke tools on MCP servers via a shared daemon or directly")]
struct Cli {
    /// Path to the gateway config file (default: discovered automatically).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the daemon's Unix socket (default: `$MCP_DAEMON_SOCKET` or
    /// `/tmp/mcp-daemon.sock`).
    #[arg(long, global = true)]
    socket: Option<String>,

    /// Skip the daemon entirely and always use a transient direct client.
    #[arg(long, global = true)]
    no_daemon: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tools available on a server.
    ListTools {
        /// Configured server name or raw command string.
        server: String,
        /// Print raw JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
    /// Call a tool on a server.
    CallTool {
        /// Configured server name or raw command string.
        server: String,
        /// Tool name.
        tool: String,
        /// JSON-encoded arguments object.
        #[arg(default_value = "{}")]
        parameters: String,
    },
    /// List tools across every currently running daemon-managed server.
    ListAll,
    /// Daemon process management.
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon and serve the IPC socket.
    Start {
        /// Stay attached to the terminal instead of double-forking.
        #[arg(long)]
        foreground: bool,
    },
    /// Ask a running daemon to shut down gracefully.
    Stop,
    /// Report whether a daemon is reachable and what it has running.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let socket_path = resolve_socket_path(cli.socket.as_deref());

    match cli.command {
        Command::Daemon { action: DaemonAction::Start { foreground } } => {
            if !foreground {
                #[cfg(unix)]
                mcpgw_core::daemon::daemonize().context("failed to daemonize")?;
            }
            let config = mcpgw_config::load_or_default(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(Daemon::new(config, socket_path).run())
        },
        other => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_client_command(other, cli.config, socket_path, cli.no_daemon))
        },
    }
}

async fn run_client_command(
    command: Command,
    config_path: Option<PathBuf>,
    socket_path: PathBuf,
    no_daemon: bool,
) -> Result<()> {
    match command {
        Command::ListTools { server, json } => {
            let config = mcpgw_config::load_or_default(config_path.as_deref())?;
            let tools = if no_daemon {
                direct_list_tools(&config, &server).await?
            } else {
                Dispatcher::new(config, socket_path)
                    .list_tools(&server)
                    .await
                    .context("listing tools failed")?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
            } else {
                println!("{}", format::render_markdown(&server, &tools));
            }
            Ok(())
        },
        Command::CallTool { server, tool, parameters } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&parameters).context("invalid JSON parameters")?;
            let config = mcpgw_config::load_or_default(config_path.as_deref())?;
            let result = if no_daemon {
                direct_call_tool(&config, &server, &tool, arguments).await?
            } else {
                Dispatcher::new(config, socket_path)
                    .call_tool(&server, &tool, arguments)
                    .await
                    .context("calling tool failed")?
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        },
        Command::ListAll => {
            let client = SocketClient::new(socket_path);
            let request = Request {
                command: "list-all".to_string(),
                ..Default::default()
            };
            let response = client.send_control(&request).await.context("daemon unreachable")?;
            if response.success != Some(true) {
                anyhow::bail!(response.error.unwrap_or_else(|| "list-all failed".to_string()));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&response.servers.unwrap_or(serde_json::Value::Null))?
            );
            Ok(())
        },
        Command::Daemon { action } => run_daemon_action(action, socket_path).await,
    }
}

async fn run_daemon_action(action: DaemonAction, socket_path: PathBuf) -> Result<()> {
    let client = SocketClient::new(socket_path);
    let request = match action {
        DaemonAction::Stop => Request {
            command: "shutdown".to_string(),
            ..Default::default()
        },
        DaemonAction::Status => Request {
            command: "status".to_string(),
            ..Default::default()
        },
        DaemonAction::Start { .. } => unreachable!("handled in main()"),
    };

    let response = client.send_control(&request).await.context("daemon unreachable")?;
    if response.success != Some(true) {
        anyhow::bail!(response.error.unwrap_or_else(|| "daemon request failed".to_string()));
    }

    if let Some(message) = response.message {
        println!("{message}");
    }
    if let Some(status) = response.status {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Ok(())
}

async fn direct_list_tools(
    config: &mcpgw_core::model::GatewayConfig,
    server: &str,
) -> Result<Vec<serde_json::Value>> {
    let command_string = config
        .mcp_servers
        .get(server)
        .map(mcpgw_core::model::ServerSpec::command_string)
        .unwrap_or_else(|| server.to_string());
    let env = config
        .mcp_servers
        .get(server)
        .map(|s| s.env.clone())
        .unwrap_or_default();

    let mut client = mcpgw_core::McpStdioClient::start(&command_string, &env).await?;
    let tools = client.list_tools().await;
    client.stop().await;
    Ok(tools?)
}

async fn direct_call_tool(
    config: &mcpgw_core::model::GatewayConfig,
    server: &str,
    tool: &str,
    arguments: serde_json::Value,
) -> Result<serde_json::Value> {
    let command_string = config
        .mcp_servers
        .get(server)
        .map(mcpgw_core::model::ServerSpec::command_string)
        .unwrap_or_else(|| server.to_string());
    let env = config
        .mcp_servers
        .get(server)
        .map(|s| s.env.clone())
        .unwrap_or_default();

    let mut client = mcpgw_core::McpStdioClient::start(&command_string, &env).await?;
    let result = client.call_tool(tool, arguments).await;
    client.stop().await;
    Ok(result?)
}
