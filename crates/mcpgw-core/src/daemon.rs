//! Daemon process glue: wires the registry, initializer, health
//! monitor and IPC server together and owns the shutdown signal
//! handling (spec §4.3–§4.5, §6 "Signals").

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::health::HealthMonitor;
use crate::init::Initializer;
use crate::ipc::IpcServer;
use crate::model::GatewayConfig;
use crate::registry::Registry;

/// Owns every long-lived daemon component for one run of `mcp-cli
/// daemon start` (spec §4).
pub struct Daemon {
    config: Arc<GatewayConfig>,
    socket_path: PathBuf,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
}

impl Daemon {
    /// Build a daemon for `config`, listening on `socket_path`.
    #[must_use]
    pub fn new(config: GatewayConfig, socket_path: PathBuf) -> Self {
        let registry = Arc::new(Registry::new(config.daemon.max_servers));
        Self {
            config: Arc::new(config),
            socket_path,
            registry,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Run the full daemon lifecycle: auto-initialize configured
    /// servers, start the health monitor, then serve the IPC socket
    /// until a shutdown signal or `shutdown` IPC command arrives (spec
    /// §4.3 step 6, §4.5 shutdown ordering, §6 "Signals").
    ///
    /// # Errors
    ///
    /// Returns an error if the IPC socket cannot be bound, or if
    /// `onInitFailure = fail` and a required server failed to start.
    pub async fn run(self) -> anyhow::Result<()> {
        let init_result = Initializer::new(&self.registry, &self.config.daemon)
            .run(&self.config)
            .await;

        info!(
            total = init_result.total,
            successful = init_result.successful,
            failed = init_result.failed,
            "initialization complete"
        );

        if init_result.should_abort {
            self.registry.stop_all().await;
            anyhow::bail!(
                "aborting startup: {} required server(s) failed to initialize under onInitFailure=fail",
                init_result.failed - init_result.optional_failures
            );
        }

        let health_handle = if init_result.successful > 0 {
            let monitor = HealthMonitor::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.config),
                self.config.daemon.health_interval_duration(),
                Arc::clone(&self.running),
            );
            Some(monitor.spawn())
        } else {
            None
        };

        let signal_running = Arc::clone(&self.running);
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received");
            signal_running.store(false, Ordering::SeqCst);
        });

        let ipc_server = IpcServer::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            self.socket_path.clone(),
            Arc::clone(&self.running),
        );

        let result = ipc_server.run().await;

        if let Some(handle) = health_handle {
            handle.abort();
        }

        result.map_err(anyhow::Error::from)
    }
}

/// Double-fork and `setsid` so the grandchild survives its controlling
/// terminal closing (spec §6 "Daemonization"). Must be called before
/// the tokio runtime starts — `fork` in a multi-threaded process is
/// only safe this early.
///
/// # Errors
///
/// Returns an error if either fork or `setsid` fails (spec §7,
/// resource exhaustion item 4). The intermediate and original
/// processes call [`std::process::exit`] directly and never return.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn daemonize() -> anyhow::Result<()> {
    use nix::unistd::{fork, setsid, ForkResult};

    // SAFETY: called before the tokio runtime is built, so the process
    // is still single-threaded.
    match unsafe { fork() }? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {},
    }

    setsid()?;

    // SAFETY: still single-threaded; this is the standard double-fork
    // idiom to guarantee the grandchild can never reacquire a
    // controlling terminal.
    match unsafe { fork() }? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {},
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        },
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
            unreachable!()
        },
    };

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_policy_abort_short_circuits_before_serving() {
        use crate::model::{DaemonSettings, OnInitFailure, ServerSpec};
        use std::collections::HashMap;

        let mut config = GatewayConfig::default();
        config.daemon = DaemonSettings {
            on_init_failure: OnInitFailure::Fail,
            initialization_timeout: 2,
            ..DaemonSettings::default()
        };
        config.mcp_servers.insert(
            "ghost".to_string(),
            ServerSpec {
                name: "ghost".to_string(),
                command: "definitely-not-a-real-binary-xyz".to_string(),
                args: Vec::new(),
                env: HashMap::new(),
                description: None,
                auto_start: true,
                optional: false,
            },
        );

        let daemon = Daemon::new(config, PathBuf::from("/tmp/mcpgw-test-unused.sock"));
        let result = daemon.run().await;
        assert!(result.is_err());
    }
}
