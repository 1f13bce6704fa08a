#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Full call pipeline: router, policy file, circuit breaker and the mock
//! backend process.

use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use hexgate_core::policy::{PolicyWatcher, ReloadOutcome};
use hexgate_core::{CircuitBreaker, PolicyEngine};
use hexgate_gateway::bridge::{BackendBridge, BridgeConfig};
use hexgate_gateway::server::{AppState, HealthReport, IDENTITY_HEADER, build_router};

const POLICY_V1: &str = r#"{
    "version": "v1",
    "grants": [
        {"src": "alice@tailnet", "app": ["port_scan"], "parameter_constraints": {"target": "10.0.*"}},
        {"src": "*", "app": ["dns_lookup", "stall"]}
    ],
    "denied": ["exploit_run"]
}"#;

const POLICY_V2: &str = r#"{
    "version": "v2",
    "grants": [{"src": "*", "app": ["dns_lookup"]}],
    "denied": ["exploit_run", "port_scan"]
}"#;

struct Harness {
    app: Router,
    state: AppState,
    bridge: BackendBridge,
    watcher: PolicyWatcher,
    dir: tempfile::TempDir,
}

async fn harness(call_timeout: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, POLICY_V1).unwrap();

    let policy = Arc::new(PolicyEngine::from_path(Some(&path)).unwrap());
    let watcher = PolicyWatcher::new(Arc::clone(&policy), &path, Duration::from_secs(60));
    let bridge = BackendBridge::spawn(
        BridgeConfig::new(env!("CARGO_BIN_EXE_hexgate-mock-backend")).with_call_timeout(call_timeout),
    )
    .await
    .unwrap();
    let state = AppState::new(policy, Arc::new(CircuitBreaker::new()), Arc::new(bridge.clone()));
    Harness {
        app: build_router(state.clone()),
        state,
        bridge,
        watcher,
        dir,
    }
}

async fn post(app: &Router, uri: &str, caller: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(IDENTITY_HEADER, caller);
    }
    let resp = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn tool_call(name: &str, target: &str) -> Value {
    json!({"method": "tools/call", "params": {"name": name, "arguments": {"target": target}}})
}

#[tokio::test]
async fn granted_call_round_trips_through_backend() {
    let h = harness(Duration::from_secs(10)).await;
    let (status, body) = post(&h.app, "/mcp", Some("alice@tailnet"), tool_call("port_scan", "10.0.3.4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["tool"], "port_scan");
    assert_eq!(body["result"]["arguments"]["target"], "10.0.3.4");

    let (status, body) = post(&h.app, "/mcp", None, json!({"method": "tools/list"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["tools"][1]["name"], "dns_lookup");
    h.bridge.stop().await;
}

#[tokio::test]
async fn denials_never_reach_backend() {
    let h = harness(Duration::from_secs(10)).await;
    let cases = [
        ("alice@tailnet", "exploit_run", "10.0.0.1", "policy denied: explicitly denied"),
        ("bob@tailnet", "port_scan", "10.0.0.1", "policy denied: no matching grant"),
        (
            "alice@tailnet",
            "port_scan",
            "8.8.8.8",
            r#"policy denied: parameter "target" violates constraint "10.0.*""#,
        ),
    ];
    for (caller, tool, target, reason) in cases {
        let (status, body) = post(&h.app, "/mcp", Some(caller), tool_call(tool, target)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{caller} {tool} {target}");
        assert_eq!(body["error"], reason);
    }
    assert_eq!(h.bridge.in_flight(), 0);
    h.bridge.stop().await;
}

#[tokio::test]
async fn webhook_trip_and_reset() {
    let h = harness(Duration::from_secs(10)).await;
    let signal = |action: &str| json!({"type": "rate_limit", "tool_name": "dns_lookup", "action": action});

    let (status, _) = post(&h.app, "/aperture/webhook", None, signal("trip")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(&h.app, "/mcp", Some("carol@tailnet"), tool_call("dns_lookup", "example.org")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate limited: dns_lookup");

    let (status, _) = post(&h.app, "/aperture/webhook", None, signal("reset")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!h.state.breaker.is_tripped("dns_lookup"));
    let (status, _) = post(&h.app, "/mcp", Some("carol@tailnet"), tool_call("dns_lookup", "example.org")).await;
    assert_eq!(status, StatusCode::OK);
    h.bridge.stop().await;
}

#[tokio::test]
async fn backend_timeout_is_internal_error() {
    let h = harness(Duration::from_millis(300)).await;
    let (status, body) = post(&h.app, "/mcp", Some("dave@tailnet"), tool_call("stall", "x")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
    h.bridge.stop().await;
}

#[tokio::test]
async fn policy_reload_takes_effect_without_restart() {
    let h = harness(Duration::from_secs(10)).await;
    let (status, _) = post(&h.app, "/mcp", Some("alice@tailnet"), tool_call("port_scan", "10.0.0.9")).await;
    assert_eq!(status, StatusCode::OK);

    let path = h.dir.path().join("policy.json");
    std::fs::write(&path, POLICY_V2).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(30))
        .unwrap();
    assert_eq!(h.watcher.check_reload(), ReloadOutcome::Reloaded);
    assert_eq!(h.state.policy.version().as_deref(), Some("v2"));

    let (status, body) = post(&h.app, "/mcp", Some("alice@tailnet"), tool_call("port_scan", "10.0.0.9")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "policy denied: explicitly denied");

    // A broken edit keeps v2 live.
    std::fs::write(&path, "{ broken").unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    assert!(matches!(h.watcher.check_reload(), ReloadOutcome::Failed(_)));
    assert_eq!(h.state.policy.version().as_deref(), Some("v2"));
    h.bridge.stop().await;
}

#[tokio::test]
async fn health_degrades_when_backend_stops() {
    let h = harness(Duration::from_secs(10)).await;
    let health = |app: Router| async move {
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice::<HealthReport>(&bytes).unwrap()
    };

    let report = health(h.app.clone()).await;
    assert_eq!(report.status, "ok");
    assert_eq!(report.policy_version.as_deref(), Some("v1"));

    h.bridge.stop().await;
    let report = health(h.app.clone()).await;
    assert_eq!(report.status, "degraded");
    assert_eq!(report.backend, "down");
}
