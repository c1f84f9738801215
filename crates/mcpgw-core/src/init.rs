//! Auto-initialization engine (component D, spec §4.3).

use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::model::{DaemonSettings, GatewayConfig, OnInitFailure};
use crate::registry::Registry;

/// Outcome of starting a single configured server.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerInitResult {
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub optional: bool,
}

/// Aggregate outcome of a full initialization pass (spec §4.3 step 6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct InitializationResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub optional_failures: usize,
    pub details: Vec<ServerInitResult>,
    /// Set when `onInitFailure=fail` and a required server failed.
    pub should_abort: bool,
}

/// Runs the auto-start sequence once at daemon startup.
pub struct Initializer<'a> {
    registry: &'a Registry,
    settings: &'a DaemonSettings,
}

impl<'a> Initializer<'a> {
    /// Build an initializer bound to `registry` and `settings`.
    #[must_use]
    pub fn new(registry: &'a Registry, settings: &'a DaemonSettings) -> Self {
        Self { registry, settings }
    }

    /// Run the full batch sequence against `config`'s `autoStart`
    /// servers (spec §4.3 steps 1–6).
    pub async fn run(&self, config: &GatewayConfig) -> InitializationResult {
        let auto_start = config.auto_start_servers();

        if auto_start.is_empty() {
            return InitializationResult {
                total: 0,
                successful: 0,
                failed: 0,
                optional_failures: 0,
                details: Vec::new(),
                should_abort: false,
            };
        }

        let batch_width = self.settings.parallel_initialization.max(1);
        let deadline = self.settings.init_timeout_duration();

        let mut details = Vec::with_capacity(auto_start.len());
        for batch in auto_start.chunks(batch_width) {
            let mut results = self.run_batch(batch, deadline).await;
            details.append(&mut results);
        }

        self.finalize(details)
    }

    async fn run_batch(
        &self,
        batch: &[&crate::model::ServerSpec],
        per_server_deadline: Duration,
    ) -> Vec<ServerInitResult> {
        let tasks = batch.iter().map(|spec| self.start_one(spec, per_server_deadline));

        // Batch-wide deadline equals the per-server deadline (spec §4.3
        // step 3): stragglers past it are reported as timeouts even if
        // their individual future hadn't itself expired yet.
        match timeout(per_server_deadline, futures::future::join_all(tasks)).await {
            Ok(results) => results,
            Err(_) => batch
                .iter()
                .map(|spec| ServerInitResult {
                    name: spec.name.clone(),
                    success: false,
                    error: Some("batch deadline exceeded".to_string()),
                    duration_ms: per_server_deadline.as_millis() as u64,
                    optional: spec.optional,
                })
                .collect(),
        }
    }

    async fn start_one(
        &self,
        spec: &crate::model::ServerSpec,
        deadline: Duration,
    ) -> ServerInitResult {
        let start = Instant::now();
        let command_string = spec.command_string();

        let outcome = timeout(
            deadline,
            self.registry
                .start_server(&spec.name, &command_string, Some(spec.clone()), true),
        )
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(_)) => ServerInitResult {
                name: spec.name.clone(),
                success: true,
                error: None,
                duration_ms,
                optional: spec.optional,
            },
            Ok(Err(e)) => ServerInitResult {
                name: spec.name.clone(),
                success: false,
                error: Some(e.to_string()),
                duration_ms,
                optional: spec.optional,
            },
            Err(_) => ServerInitResult {
                name: spec.name.clone(),
                success: false,
                error: Some("initialization timed out".to_string()),
                duration_ms,
                optional: spec.optional,
            },
        }
    }

    fn finalize(&self, details: Vec<ServerInitResult>) -> InitializationResult {
        let total = details.len();
        let successful = details.iter().filter(|d| d.success).count();
        let failed = total - successful;
        let optional_failures = details
            .iter()
            .filter(|d| !d.success && d.optional)
            .count();
        let required_failed = details.iter().any(|d| !d.success && !d.optional);

        for d in &details {
            if d.success {
                continue;
            }
            match (self.settings.on_init_failure, d.optional) {
                (OnInitFailure::Fail, _) | (OnInitFailure::Warn, false) => {
                    error!(server = %d.name, error = ?d.error, "required server failed to initialize");
                },
                (OnInitFailure::Warn, true) => {
                    warn!(server = %d.name, error = ?d.error, "optional server failed to initialize");
                },
                (OnInitFailure::Ignore, _) => {
                    debug!(server = %d.name, error = ?d.error, "server failed to initialize (ignored)");
                },
            }
        }

        let should_abort = self.settings.on_init_failure == OnInitFailure::Fail && required_failed;

        InitializationResult {
            total,
            successful,
            failed,
            optional_failures,
            details,
            should_abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerSpec;
    use std::collections::HashMap as Map;

    fn spec(name: &str, optional: bool) -> ServerSpec {
        ServerSpec {
            name: name.to_string(),
            command: "definitely-not-a-real-binary-xyz".to_string(),
            args: Vec::new(),
            env: Map::new(),
            description: None,
            auto_start: true,
            optional,
        }
    }

    #[tokio::test]
    async fn empty_config_reports_zero_total() {
        let registry = Registry::new(8);
        let settings = DaemonSettings::default();
        let config = GatewayConfig::default();
        let result = Initializer::new(&registry, &settings).run(&config).await;
        assert_eq!(result.total, 0);
        assert!(!result.should_abort);
    }

    #[tokio::test]
    async fn failing_required_server_triggers_abort_under_fail_policy() {
        let registry = Registry::new(8);
        let mut settings = DaemonSettings::default();
        settings.on_init_failure = OnInitFailure::Fail;
        settings.initialization_timeout = 2;

        let mut config = GatewayConfig::default();
        config.mcp_servers.insert("a".to_string(), spec("a", false));

        let result = Initializer::new(&registry, &settings).run(&config).await;
        assert_eq!(result.total, 1);
        assert_eq!(result.failed, 1);
        assert!(result.should_abort);
    }

    #[tokio::test]
    async fn optional_failure_does_not_abort_under_warn_policy() {
        let registry = Registry::new(8);
        let mut settings = DaemonSettings::default();
        settings.on_init_failure = OnInitFailure::Warn;
        settings.initialization_timeout = 2;

        let mut config = GatewayConfig::default();
        config.mcp_servers.insert("opt".to_string(), spec("opt", true));

        let result = Initializer::new(&registry, &settings).run(&config).await;
        assert_eq!(result.optional_failures, 1);
        assert!(!result.should_abort);
    }
}
