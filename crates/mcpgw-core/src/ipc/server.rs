//! Local IPC server (component F, spec §4.5).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::ipc::protocol::{Request, Response, MAX_LINE_BYTES};
use crate::model::GatewayConfig;
use crate::registry::Registry;

/// How long `accept()` blocks before the loop re-checks `running`
/// (spec §4.5 step 2, §5 cancellation).
const ACCEPT_POLL: Duration = Duration::from_secs(1);

/// Listens on a Unix-domain stream socket and dispatches each
/// connection's single request to the [`Registry`].
pub struct IpcServer {
    registry: Arc<Registry>,
    config: Arc<GatewayConfig>,
    socket_path: PathBuf,
    running: Arc<AtomicBool>,
}

impl IpcServer {
    /// Build a server bound to `socket_path`, backed by `registry` and
    /// `config` (the latter only for `get-config`).
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        config: Arc<GatewayConfig>,
        socket_path: PathBuf,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            config,
            socket_path,
            running,
        }
    }

    /// Bind, unlinking any stale socket file first, and run the accept
    /// loop until `running` becomes false (spec §4.5 steps 1–3).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn run(self) -> std::io::Result<()> {
        unlink_stale(&self.socket_path);

        if let Some(parent) = self.socket_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "IPC server listening");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            match tokio::time::timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, _addr))) => {
                    let registry = Arc::clone(&self.registry);
                    let config = Arc::clone(&self.config);
                    let running = Arc::clone(&self.running);
                    tokio::spawn(async move {
                        handle_connection(stream, registry, config, running).await;
                    });
                },
                Ok(Err(e)) => warn!(error = %e, "accept failed"),
                Err(_) => continue, // poll timeout; recheck `running`
            }
        }

        info!("IPC accept loop exiting");
        self.registry.stop_all().await;
        drop(listener);
        unlink_stale(&self.socket_path);
        info!("IPC server shut down cleanly");
        Ok(())
    }
}

fn unlink_stale(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    registry: Arc<Registry>,
    config: Arc<GatewayConfig>,
    running: Arc<AtomicBool>,
) {
    let response = match read_request_line(&mut stream).await {
        Ok(None) => return, // client closed without sending anything
        Ok(Some(line)) => match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(request, &registry, &config, &running).await,
            Err(e) => Response::err(format!("Invalid JSON: {e}"), false),
        },
        Err(e) => {
            debug!(error = %e, "error reading IPC request");
            Response::err(format!("{e}"), false)
        },
    };

    let mut line = response.to_line();
    line.push('\n');
    if let Err(e) = stream.write_all(line.as_bytes()).await {
        warn!(error = %e, "failed to write IPC response");
    }
}

/// Reads up to the first `\n` or [`MAX_LINE_BYTES`], whichever first.
async fn read_request_line(stream: &mut UnixStream) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        if buf.len() >= MAX_LINE_BYTES {
            break;
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }

    if buf.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

async fn dispatch(
    request: Request,
    registry: &Registry,
    config: &GatewayConfig,
    running: &AtomicBool,
) -> Response {
    match request.command.as_str() {
        "start" => cmd_start(request, registry).await,
        "call" => cmd_call(request, registry).await,
        "list" => cmd_list(request, registry).await,
        "list-all" => cmd_list_all(registry).await,
        "stop" => cmd_stop(request, registry).await,
        "status" => cmd_status(registry).await,
        "get-config" => cmd_get_config(registry, config).await,
        "shutdown" => cmd_shutdown(running),
        other => Response::err(format!("Unknown command: {other}"), false),
    }
}

async fn cmd_start(request: Request, registry: &Registry) -> Response {
    let (Some(server), Some(server_command)) = (request.server, request.server_command) else {
        return Response::err("start requires 'server' and 'server_command'", false);
    };

    match registry.start_server(&server, &server_command, None, false).await {
        Ok(true) => Response::ok(Some(format!("Server '{server}' started"))),
        Ok(false) => Response::ok(Some("Server already running".to_string())),
        Err(e) => Response::err(e.to_string(), false),
    }
}

async fn cmd_call(request: Request, registry: &Registry) -> Response {
    let (Some(server), Some(tool)) = (request.server, request.tool) else {
        return Response::err("call requires 'server' and 'tool'", false);
    };
    let args = request.arguments.unwrap_or(serde_json::json!({}));

    match registry.call_tool(&server, &tool, args).await {
        Ok(result) => Response {
            success: Some(true),
            result: Some(result),
            ..Default::default()
        },
        Err(e) => Response::err(e.to_string(), e.retryable()),
    }
}

async fn cmd_list(request: Request, registry: &Registry) -> Response {
    let Some(server) = request.server else {
        return Response::err("list requires 'server'", false);
    };

    match registry.list_tools(&server).await {
        Ok(tools) => Response {
            success: Some(true),
            tools: Some(serde_json::Value::Array(tools)),
            ..Default::default()
        },
        Err(e) => Response::err(e.to_string(), false),
    }
}

async fn cmd_list_all(registry: &Registry) -> Response {
    let all = registry.list_all_tools().await;
    let servers = serde_json::to_value(&all).unwrap_or(serde_json::json!({}));
    Response {
        success: Some(true),
        servers: Some(servers),
        server_count: Some(all.len()),
        ..Default::default()
    }
}

async fn cmd_stop(request: Request, registry: &Registry) -> Response {
    let Some(server) = request.server else {
        return Response::err("stop requires 'server'", false);
    };

    if registry.stop_server(&server).await {
        Response::ok(Some(format!("Server '{server}' stopped")))
    } else {
        Response::ok(Some(format!("Server '{server}' not running")))
    }
}

async fn cmd_status(registry: &Registry) -> Response {
    let entries = registry.status().await;
    let status = serde_json::to_value(&entries).unwrap_or(serde_json::json!([]));
    Response {
        success: Some(true),
        status: Some(status),
        ..Default::default()
    }
}

async fn cmd_get_config(registry: &Registry, config: &GatewayConfig) -> Response {
    let mut servers = serde_json::Map::new();
    for (name, spec) in &config.mcp_servers {
        servers.insert(
            name.clone(),
            serde_json::json!({
                "command": spec.command,
                "args": spec.args,
                "description": spec.description,
                "running": registry.is_running(name).await,
            }),
        );
    }

    Response {
        success: Some(true),
        config_path: config.source_path.clone(),
        servers: Some(serde_json::Value::Object(servers)),
        server_count: Some(config.mcp_servers.len()),
        ..Default::default()
    }
}

fn cmd_shutdown(running: &AtomicBool) -> Response {
    // Eviction/teardown of children happens in `IpcServer::run` once the
    // accept loop observes `running == false` (spec §4.5 "Shutdown
    // ordering"); here we only flip the flag and ack.
    running.store(false, Ordering::SeqCst);
    Response::ok(Some("Daemon shutting down".to_string()))
}
