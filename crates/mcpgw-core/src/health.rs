//! Health monitor (component E, spec §4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::model::GatewayConfig;
use crate::registry::Registry;

/// Periodic background sweep that restarts crashed auto-started servers.
///
/// Never touches on-demand servers (spec §4.4): a server evicted by a
/// failed tool call is restarted here, or sooner, on the next inbound
/// request for it.
pub struct HealthMonitor {
    registry: Arc<Registry>,
    config: Arc<GatewayConfig>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl HealthMonitor {
    /// Build a monitor bound to `registry` and `config`, sweeping every
    /// `interval`.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        config: Arc<GatewayConfig>,
        interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            config,
            interval,
            running,
        }
    }

    /// Spawn the background sweep loop. Started only if at least one
    /// auto-started server exists (caller's responsibility, per spec
    /// §4.4).
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            ticker.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                info!("health monitor exiting, daemon stopping");
                return;
            }
            self.sweep().await;
        }
    }

    async fn sweep(&self) {
        let missing = self.registry.missing_auto_started().await;
        for id in missing {
            let Some(spec) = self.config.mcp_servers.get(&id) else {
                continue;
            };
            let command_string = spec.command_string();
            match self
                .registry
                .start_server(&id, &command_string, Some(spec.clone()), true)
                .await
            {
                Ok(true) => info!(server = %id, "health monitor restarted crashed server"),
                Ok(false) => {}, // raced with someone else restarting it first
                Err(e) => warn!(server = %id, error = %e, "health monitor restart failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerSpec;
    use std::collections::HashMap as Map;

    #[tokio::test]
    async fn sweep_ignores_ids_absent_from_config() {
        let registry = Arc::new(Registry::new(8));
        let config = Arc::new(GatewayConfig::default());
        let running = Arc::new(AtomicBool::new(true));
        let monitor = HealthMonitor::new(registry, config, Duration::from_secs(30), running);
        // No auto-started ids are missing, so this should be a no-op.
        monitor.sweep().await;
    }

    #[tokio::test]
    async fn sweep_attempts_restart_for_known_missing_spec() {
        let registry = Arc::new(Registry::new(8));
        let mut config = GatewayConfig::default();
        config.mcp_servers.insert(
            "ghost".to_string(),
            ServerSpec {
                name: "ghost".to_string(),
                command: "definitely-not-a-real-binary-xyz".to_string(),
                args: Vec::new(),
                env: Map::new(),
                description: None,
                auto_start: true,
                optional: false,
            },
        );
        let config = Arc::new(config);
        let running = Arc::new(AtomicBool::new(true));

        // Manually mark "ghost" as a missing auto-started id by recording
        // it in the registry's auto-started set without a live entry:
        // simplest way from outside the module is via a failed start that
        // sets the set, then stop_server to remove only the map entry.
        // Since Registry doesn't expose that directly, this test only
        // exercises the not-found path (no panic, no restart attempted).
        let monitor = HealthMonitor::new(registry, config, Duration::from_secs(30), running);
        monitor.sweep().await;
    }
}
