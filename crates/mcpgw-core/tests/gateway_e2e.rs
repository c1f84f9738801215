//! End-to-end scenarios against the `fake_server.mjs` fixture.
//!
//! These tests require `node` on `$PATH`; they skip themselves (rather
//! than fail) when it is absent, matching the retrieval pack's own
//! `node_available()` guard for subprocess-dependent MCP bridge tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mcpgw_core::ipc::{IpcServer, Request, SocketClient};
use mcpgw_core::model::{DaemonSettings, GatewayConfig, ServerSpec};
use mcpgw_core::registry::Registry;
use mcpgw_core::McpStdioClient;

fn node_available() -> bool {
    which::which("node").is_ok()
}

fn fixture_command() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fake_server.mjs");
    format!("node {}", path.display())
}

fn test_config() -> GatewayConfig {
    let mut servers = HashMap::new();
    servers.insert(
        "echo".to_string(),
        ServerSpec {
            name: "echo".to_string(),
            command: "node".to_string(),
            args: vec![PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("tests/fixtures/fake_server.mjs")
                .display()
                .to_string()],
            env: HashMap::new(),
            description: None,
            auto_start: true,
            optional: false,
        },
    );
    GatewayConfig {
        mcp_servers: servers,
        daemon: DaemonSettings::default(),
        source_path: None,
    }
}

// Scenario 1 + 2 (spec §8): list tools then call a tool, directly
// against the MCP stdio client (the layer both daemon and direct mode
// ultimately share).
#[tokio::test]
async fn direct_client_lists_and_calls_tools() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let mut client = McpStdioClient::start(&fixture_command(), &HashMap::new())
        .await
        .expect("fake server should start");

    let tools = client.list_tools().await.expect("list_tools");
    let names: Vec<_> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"echo"));
    assert!(names.contains(&"add"));

    let result = client
        .call_tool("add", serde_json::json!({"a": 2, "b": 3}))
        .await
        .expect("call_tool");
    assert_eq!(result["content"][0]["text"], "5");

    client.stop().await;
}

// Scenario 4 (spec §8): a tool call that crashes the child evicts it
// from the registry; a fresh `start` recovers.
#[tokio::test]
async fn registry_evicts_after_crash_and_recovers_on_restart() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let registry = Registry::new(8);
    let command = fixture_command();

    registry
        .start_server("echo", &command, None, false)
        .await
        .expect("start");

    let err = registry
        .call_tool("echo", "crash", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(err.retryable());
    assert!(!registry.is_running("echo").await);

    registry
        .start_server("echo", &command, None, false)
        .await
        .expect("restart after crash");
    let result = registry
        .call_tool("echo", "add", serde_json::json!({"a": 1, "b": 1}))
        .await
        .expect("call after restart");
    assert_eq!(result["content"][0]["text"], "2");

    registry.stop_all().await;
}

// Spec §4.4 "crash-then-retry convergence": an auto-started server that
// crashes on a call must stay eligible for the health monitor's next
// sweep, not just for an on-demand restart.
#[tokio::test]
async fn crash_eviction_keeps_auto_started_membership_for_health_monitor() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let registry = Registry::new(8);
    let command = fixture_command();

    registry
        .start_server("echo", &command, None, true)
        .await
        .expect("start");

    let err = registry
        .call_tool("echo", "crash", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(err.retryable());
    assert!(!registry.is_running("echo").await);

    let missing = registry.missing_auto_started().await;
    assert!(
        missing.contains(&"echo".to_string()),
        "crash-evicted auto-started server must remain visible to the health monitor"
    );

    registry.stop_all().await;
}

// Scenario 6 (spec §8): calls against two distinct servers run
// concurrently rather than serializing behind one lock.
#[tokio::test]
async fn concurrent_calls_against_distinct_servers_do_not_serialize() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let registry = Arc::new(Registry::new(8));
    let command = fixture_command();

    registry.start_server("a", &command, None, false).await.expect("start a");
    registry.start_server("b", &command, None, false).await.expect("start b");

    let start = std::time::Instant::now();
    let (r1, r2) = tokio::join!(
        registry.call_tool("a", "add", serde_json::json!({"a": 1, "b": 1})),
        registry.call_tool("b", "add", serde_json::json!({"a": 2, "b": 2})),
    );
    assert!(r1.is_ok());
    assert!(r2.is_ok());
    // Both calls should complete well under a sequential-sum deadline;
    // generous bound to avoid CI flakiness while still catching
    // accidental serialization.
    assert!(start.elapsed() < Duration::from_secs(5));

    registry.stop_all().await;
}

// Scenario 1 + 8 (spec §8) via the wire protocol: start the IPC server,
// drive it over the real Unix socket, then shut it down gracefully.
#[tokio::test]
async fn ipc_server_serves_list_and_shuts_down_cleanly() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("mcpgw-e2e.sock");

    let config = Arc::new(test_config());
    let registry = Arc::new(Registry::new(config.daemon.max_servers));
    let running = Arc::new(std::sync::atomic::AtomicBool::new(true));

    let server = IpcServer::new(
        Arc::clone(&registry),
        Arc::clone(&config),
        socket_path.clone(),
        Arc::clone(&running),
    );
    let server_handle = tokio::spawn(server.run());

    // Give the listener a moment to bind.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = SocketClient::new(socket_path.clone());
    let start_request = Request {
        command: "start".to_string(),
        server: Some("echo".to_string()),
        server_command: Some(fixture_command()),
        ..Default::default()
    };
    let response = client.send_control(&start_request).await.expect("start request");
    assert_eq!(response.success, Some(true));

    let list_request = Request {
        command: "list".to_string(),
        server: Some("echo".to_string()),
        ..Default::default()
    };
    let response = client.send_control(&list_request).await.expect("list request");
    assert_eq!(response.success, Some(true));
    assert!(response.tools.unwrap().as_array().unwrap().len() >= 2);

    let shutdown_request = Request {
        command: "shutdown".to_string(),
        ..Default::default()
    };
    let response = client.send_control(&shutdown_request).await.expect("shutdown request");
    assert_eq!(response.success, Some(true));

    tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("server should exit after shutdown")
        .expect("server task should not panic")
        .expect("server run() should return Ok");

    assert!(!socket_path.exists(), "socket file should be unlinked after clean shutdown");
}
