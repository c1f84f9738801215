//! Server registry and child supervisor (components B and C, spec §4.2).
//!
//! The registry holds `server-id -> LiveServer` behind a short-lived
//! map-level lock; each [`LiveServer`] additionally carries its own
//! lock so that the single blocking stdio exchange of one operation
//! never head-of-line-blocks a concurrent call against a *different*
//! server (spec §4.2 "Concurrency contract", option b).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::mcp::McpStdioClient;
use crate::model::ServerSpec;

/// Runtime record for one running child (spec §3).
pub struct LiveServer {
    /// The spec used to start it, if started from configuration.
    pub spec: Option<ServerSpec>,
    /// The owned stdio client.
    client: McpStdioClient,
    /// When the server was started.
    pub started_at: Instant,
    /// Whether the initializer (or health monitor) started this server.
    pub auto_started: bool,
}

/// A server's status, as reported by [`Registry::status`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerStatusEntry {
    pub id: String,
    pub auto_started: bool,
    pub uptime_seconds: u64,
}

/// Aggregate result of [`Registry::list_all_tools`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct AllToolsEntry {
    pub tools: Vec<Value>,
    pub count: usize,
}

type Entry = Arc<Mutex<LiveServer>>;

/// Process-wide map of `server-id -> LiveServer`, plus the auxiliary
/// `autoStartedIds` set (spec §3).
pub struct Registry {
    servers: Mutex<HashMap<String, Entry>>,
    auto_started_ids: Mutex<HashSet<String>>,
    max_servers: usize,
}

impl Registry {
    /// Create an empty registry enforcing `max_servers` as the
    /// admission cap (spec §9, Open Question: `maxServers` is enforced).
    #[must_use]
    pub fn new(max_servers: usize) -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            auto_started_ids: Mutex::new(HashSet::new()),
            max_servers,
        }
    }

    /// Start and register `id` by spawning `command_string`. Idempotent:
    /// returns `Ok(false)` (not an error) if already running.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExceeded`] if `max_servers` is
    /// already reached, or [`RegistryError::Client`] if the handshake
    /// fails.
    pub async fn start_server(
        &self,
        id: &str,
        command_string: &str,
        spec: Option<ServerSpec>,
        auto_start: bool,
    ) -> Result<bool, RegistryError> {
        {
            let servers = self.servers.lock().await;
            if servers.contains_key(id) {
                return Ok(false);
            }
            if servers.len() >= self.max_servers {
                return Err(RegistryError::CapacityExceeded {
                    name: id.to_string(),
                    max: self.max_servers,
                });
            }
        }

        let env = spec
            .as_ref()
            .map(|s| s.env.clone())
            .unwrap_or_default();
        let client = McpStdioClient::start(command_string, &env).await?;

        let live = LiveServer {
            spec,
            client,
            started_at: Instant::now(),
            auto_started: auto_start,
        };

        {
            let mut servers = self.servers.lock().await;
            // Another concurrent start could have landed first; keep theirs.
            if servers.contains_key(id) {
                return Ok(false);
            }
            servers.insert(id.to_string(), Arc::new(Mutex::new(live)));
        }

        if auto_start {
            self.auto_started_ids.lock().await.insert(id.to_string());
        }

        info!(server = id, "server started");
        Ok(true)
    }

    /// Stop and remove `id`. Returns `false` if it was not running.
    pub async fn stop_server(&self, id: &str) -> bool {
        let entry = {
            let mut servers = self.servers.lock().await;
            servers.remove(id)
        };
        self.auto_started_ids.lock().await.remove(id);

        let Some(entry) = entry else {
            return false;
        };
        entry.lock().await.client.stop().await;
        info!(server = id, "server stopped");
        true
    }

    /// Stop every running server (best-effort; spec §4.2 `stopAll`).
    pub async fn stop_all(&self) {
        let entries: Vec<(String, Entry)> = {
            let mut servers = self.servers.lock().await;
            servers.drain().collect()
        };
        self.auto_started_ids.lock().await.clear();

        for (id, entry) in entries {
            entry.lock().await.client.stop().await;
            debug!(server = %id, "server stopped during stop_all");
        }
    }

    /// Call `tool` on `id` with `args`. On client failure, atomically
    /// evicts the entry and terminates the child (spec §4.2, §7 item 3).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRunning`] if `id` is absent, or
    /// [`RegistryError::Client`] (always `retryable()`) on failure.
    pub async fn call_tool(
        &self,
        id: &str,
        tool: &str,
        args: Value,
    ) -> Result<Value, RegistryError> {
        let entry = self.get_entry(id).await?;

        let result = {
            let mut live = entry.lock().await;
            live.client.call_tool(tool, args).await
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                self.evict_if_current(id, &entry).await;
                Err(RegistryError::Client(e))
            },
        }
    }

    /// `tools/list` against `id`, evicting on failure (no retry hint).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRunning`] if `id` is absent, or
    /// [`RegistryError::Client`] on failure.
    pub async fn list_tools(&self, id: &str) -> Result<Vec<Value>, RegistryError> {
        let entry = self.get_entry(id).await?;

        let result = {
            let mut live = entry.lock().await;
            live.client.list_tools().await
        };

        match result {
            Ok(tools) => Ok(tools),
            Err(e) => {
                self.evict_if_current(id, &entry).await;
                Err(RegistryError::Client(e))
            },
        }
    }

    /// `tools/list` against every registered server. Per spec §9's
    /// resolved Open Question, a server whose listing fails is silently
    /// evicted and omitted from the result rather than surfaced as an
    /// error.
    pub async fn list_all_tools(&self) -> HashMap<String, AllToolsEntry> {
        let ids: Vec<String> = self.servers.lock().await.keys().cloned().collect();
        let mut out = HashMap::new();

        for id in ids {
            if let Ok(tools) = self.list_tools(&id).await {
                out.insert(
                    id,
                    AllToolsEntry {
                        count: tools.len(),
                        tools,
                    },
                );
            }
        }
        out
    }

    /// Server-ids partitioned into auto-started and on-demand, each
    /// with uptime (spec §4.2 `status`).
    pub async fn status(&self) -> Vec<ServerStatusEntry> {
        let auto_ids = self.auto_started_ids.lock().await.clone();
        let servers = self.servers.lock().await;
        let mut out = Vec::with_capacity(servers.len());

        for (id, entry) in servers.iter() {
            let live = entry.lock().await;
            out.push(ServerStatusEntry {
                id: id.clone(),
                auto_started: auto_ids.contains(id),
                uptime_seconds: live.started_at.elapsed().as_secs(),
            });
        }
        out
    }

    /// Whether `id` is currently present in the registry.
    pub async fn is_running(&self, id: &str) -> bool {
        self.servers.lock().await.contains_key(id)
    }

    /// Snapshot of `autoStartedIds` not currently present in the
    /// registry (for the health monitor, spec §4.4).
    pub async fn missing_auto_started(&self) -> Vec<String> {
        let auto_ids = self.auto_started_ids.lock().await.clone();
        let servers = self.servers.lock().await;
        auto_ids
            .into_iter()
            .filter(|id| !servers.contains_key(id))
            .collect()
    }

    async fn get_entry(&self, id: &str) -> Result<Entry, RegistryError> {
        self.servers
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotRunning(id.to_string()))
    }

    /// Remove `id` from the registry only if it still maps to the same
    /// entry we just operated on — avoids evicting a server that was
    /// independently restarted between the failed call and eviction.
    ///
    /// Deliberately leaves `auto_started_ids` untouched: a crash
    /// eviction must keep the id eligible for the health monitor's next
    /// sweep (spec §4.4, §8 "Crash-then-retry convergence"). Only
    /// `stop_server`/`stop_all` clear that membership, since those are
    /// the deliberate-removal paths.
    async fn evict_if_current(&self, id: &str, observed: &Entry) {
        let mut servers = self.servers.lock().await;
        if let Some(current) = servers.get(id) {
            if Arc::ptr_eq(current, observed) {
                servers.remove(id);
                warn!(server = id, "evicted after failed operation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_nonexistent_binary_fails_without_inserting() {
        let registry = Registry::new(8);
        let result = registry
            .start_server("x", "definitely-not-a-real-binary-xyz", None, false)
            .await;
        assert!(result.is_err());
        assert!(!registry.is_running("x").await);
    }

    #[tokio::test]
    async fn call_tool_on_missing_server_is_not_running() {
        let registry = Registry::new(8);
        let err = registry
            .call_tool("missing", "tool", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotRunning(_)));
    }

    #[tokio::test]
    async fn stop_missing_server_returns_false() {
        let registry = Registry::new(8);
        assert!(!registry.stop_server("missing").await);
    }

    #[tokio::test]
    async fn capacity_cap_is_enforced() {
        let registry = Registry::new(0);
        let err = registry
            .start_server("x", "definitely-not-a-real-binary-xyz", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn status_is_empty_initially() {
        let registry = Registry::new(8);
        assert!(registry.status().await.is_empty());
    }

    #[tokio::test]
    async fn list_all_tools_is_empty_initially() {
        let registry = Registry::new(8);
        assert!(registry.list_all_tools().await.is_empty());
    }
}
