//! hexgate gateway
//!
//! Serves the HTTP call pipeline in front of a stdio JSON-RPC tool backend:
//! every tool call is checked against the grant policy and the circuit
//! breaker before it reaches the backend, and completed calls are metered.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use hexgate_core::config::{GatewayConfig, load_config};
use hexgate_core::policy::PolicyWatcher;
use hexgate_core::{CircuitBreaker, PolicyEngine};
use hexgate_gateway::bridge::{BackendBridge, BridgeConfig};
use hexgate_gateway::credentials::{BrokerConfig, CredentialBroker};
use hexgate_gateway::server::{AppState, build_router, serve};
use hexgate_gateway::usage::{MeteringClient, UsageRecorder};

#[derive(Parser, Debug)]
#[command(name = "hexgate")]
#[command(version, about = "hexgate - access-controlled gateway for an MCP tool backend")]
struct Args {
    /// JSON settings file; CLI flags and `HEXGATE_*` variables override it
    #[arg(long, env = "HEXGATE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long, env = "HEXGATE_LISTEN")]
    listen: Option<String>,

    /// Backend executable speaking JSON-RPC on stdio
    #[arg(long, env = "HEXGATE_BACKEND_BIN")]
    backend_bin: Option<String>,

    /// Extra argument for the backend (repeatable)
    #[arg(long = "backend-arg", allow_hyphen_values = true)]
    backend_args: Vec<String>,

    /// Grant policy file (JSON). Without one every call is allowed.
    #[arg(long, env = "HEXGATE_POLICY_PATH")]
    policy: Option<PathBuf>,

    /// Seconds between policy file change checks
    #[arg(long, env = "HEXGATE_POLICY_POLL_SECS")]
    policy_poll_secs: Option<u64>,

    /// SOPS-encrypted credential file
    #[arg(long, env = "HEXGATE_SOPS_FILE")]
    sops_file: Option<PathBuf>,

    /// KeePass adapter endpoint
    #[arg(long, env = "HEXGATE_ADAPTER_URL")]
    adapter_url: Option<String>,

    /// Setec secret store base URL
    #[arg(long, env = "HEXGATE_SETEC_URL")]
    setec_url: Option<String>,

    /// Metering service base URL; unset disables usage recording
    #[arg(long, env = "HEXGATE_APERTURE_URL")]
    aperture_url: Option<String>,

    /// Credential key to resolve and inject into the backend env (repeatable)
    #[arg(long = "credential")]
    credentials: Vec<String>,

    /// Per-call backend timeout in seconds
    #[arg(long, env = "HEXGATE_CALL_TIMEOUT_SECS")]
    call_timeout_secs: Option<u64>,

    /// Backend calls admitted concurrently (1 = strict lockstep)
    #[arg(long, env = "HEXGATE_MAX_IN_FLIGHT")]
    max_in_flight: Option<usize>,

    /// Usage events buffered before new ones are dropped
    #[arg(long, env = "HEXGATE_USAGE_QUEUE")]
    usage_queue: Option<usize>,

    /// Seconds to let in-flight requests finish on shutdown
    #[arg(long, env = "HEXGATE_SHUTDOWN_GRACE_SECS")]
    shutdown_grace_secs: Option<u64>,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, env = "HEXGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "HEXGATE_LOG_JSON")]
    log_json: bool,

    /// OpenTelemetry OTLP endpoint for traces and metrics export
    /// (e.g. `http://localhost:4317`). Requires the `metrics` feature.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "HEXGATE_METRICS_ENDPOINT")]
    metrics_endpoint: Option<String>,
}

impl Args {
    /// CLI values win over the file and environment.
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(program) = self.backend_bin {
            config.backend.program = program;
        }
        if !self.backend_args.is_empty() {
            config.backend.args = self.backend_args;
        }
        config.backend.inject_credentials.extend(self.credentials);
        if let Some(path) = self.policy {
            config.policy.path = Some(path);
        }
        if let Some(secs) = self.policy_poll_secs {
            config.policy.poll_interval_secs = secs;
        }
        if let Some(path) = self.sops_file {
            config.credentials.sops_file = Some(path);
        }
        if let Some(url) = self.adapter_url {
            config.credentials.kdbx_endpoint = Some(url);
        }
        if let Some(url) = self.setec_url {
            config.credentials.setec_url = Some(url);
        }
        if let Some(url) = self.aperture_url {
            config.usage.aperture_url = Some(url);
        }
        if let Some(secs) = self.call_timeout_secs {
            config.backend.call_timeout_secs = secs;
        }
        if let Some(n) = self.max_in_flight {
            config.backend.max_in_flight = n;
        }
        if let Some(n) = self.usage_queue {
            config.usage.queue_capacity = n;
        }
        if let Some(secs) = self.shutdown_grace_secs {
            config.server.shutdown_grace_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
        config.server.log_json |= self.log_json;
        #[cfg(feature = "metrics")]
        if let Some(endpoint) = self.metrics_endpoint {
            config.server.metrics_endpoint = Some(endpoint);
        }
    }
}

// jscpd:ignore-start -- binary bootstrap is inherently similar across daemons
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);

    // Hold the guard so the OTel pipeline stays alive for the process lifetime.
    let log_filter = hexgate_core::tracing_init::default_filter(&config.server.log_level);
    let telemetry_guard = hexgate_core::tracing_init::init_tracing_with_metrics(
        &log_filter,
        config.server.log_json,
        config.server.metrics_endpoint.as_deref(),
    );
    // jscpd:ignore-end

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen,
        backend = %config.backend.program,
        policy = ?config.policy.path,
        metering = config.usage.aperture_url.is_some(),
        "Starting hexgate"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Policy: a missing or broken file at startup falls back to default-allow.
    let policy = Arc::new(PolicyEngine::load_or_default(config.policy.path.as_deref()));
    let watcher_handle = config.policy.path.clone().map(|path| {
        let watcher = Arc::new(PolicyWatcher::new(
            Arc::clone(&policy),
            path,
            Duration::from_secs(config.policy.poll_interval_secs.max(1)),
        ));
        watcher.spawn(shutdown_rx.clone())
    });
    drop(shutdown_rx);

    // Credentials are resolved once, before the backend starts.
    let broker = CredentialBroker::from_config(&BrokerConfig::from(&config.credentials))
        .context("Failed to build credential broker")?;
    info!(sources = ?broker.resolver_names(), "Credential broker ready");
    let backend_env = broker.resolve_env(&config.backend.inject_credentials).await;

    let bridge = BackendBridge::spawn(BridgeConfig::from_section(&config.backend).with_envs(backend_env))
        .await
        .context("Backend failed to start")?;
    info!(pid = ?bridge.pid(), "Backend ready");

    let recorder = match config.usage.aperture_url.clone() {
        Some(url) => {
            let client = MeteringClient::new(Some(url)).context("Failed to build metering client")?;
            Some(Arc::new(UsageRecorder::spawn(Arc::new(client), config.usage.queue_capacity)))
        }
        None => None,
    };

    let mut state = AppState::new(
        Arc::clone(&policy),
        Arc::new(CircuitBreaker::new()),
        Arc::new(bridge.clone()),
    )
    .with_max_body_bytes(config.server.max_body_bytes);
    if let Some(recorder) = &recorder {
        state = state.with_usage(Arc::clone(recorder));
    }
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    let addr = listener.local_addr()?;

    let mut server = tokio::spawn(serve(
        listener,
        app,
        Duration::from_secs(config.server.header_read_timeout_secs),
        shutdown_tx.subscribe(),
    ));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the gateway is ready to serve (unix only).
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    info!(addr = %addr, "HTTP server ready");

    let server_finished = tokio::select! {
        result = &mut server => {
            match result {
                Ok(()) => info!("HTTP server exited"),
                Err(e) => warn!(error = %e, "HTTP server task failed"),
            }
            true
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
            false
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
            false
        }
    };

    // Stop accepting, let in-flight calls drain, then stop the policy watcher.
    let _ = shutdown_tx.send(true);
    if !server_finished {
        let grace = Duration::from_secs(config.server.shutdown_grace_secs);
        if tokio::time::timeout(grace, &mut server).await.is_err() {
            warn!(grace_secs = grace.as_secs(), "Shutdown grace elapsed, dropping open requests");
            server.abort();
        }
    }
    if let Some(handle) = watcher_handle {
        let _ = handle.await;
    }

    if let Some(recorder) = recorder {
        recorder.shutdown().await;
    }
    bridge.stop().await;

    info!("hexgate stopped");
    telemetry_guard.shutdown();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let args = Args::try_parse_from([
            "hexgate",
            "--listen",
            "127.0.0.1:9000",
            "--backend-bin",
            "/opt/tools/mcp",
            "--backend-arg",
            "--stdio",
            "--credential",
            "shodan.api_key",
            "--max-in-flight",
            "4",
            "--aperture-url",
            "http://aperture:8080",
        ])
        .unwrap();
        let mut config = GatewayConfig::default();
        config.backend.inject_credentials.push("vt.api_key".into());
        args.apply(&mut config);

        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.backend.program, "/opt/tools/mcp");
        assert_eq!(config.backend.args, vec!["--stdio".to_string()]);
        assert_eq!(config.backend.inject_credentials, vec!["vt.api_key", "shodan.api_key"]);
        assert_eq!(config.backend.max_in_flight, 4);
        assert_eq!(config.usage.aperture_url.as_deref(), Some("http://aperture:8080"));
    }

    #[test]
    fn absent_flags_keep_config() {
        let args = Args::try_parse_from(["hexgate"]).unwrap();
        let mut config = GatewayConfig::default();
        config.policy.path = Some(PathBuf::from("/etc/hexgate/policy.json"));
        args.apply(&mut config);
        assert_eq!(config.policy.path, Some(PathBuf::from("/etc/hexgate/policy.json")));
        assert_eq!(config.backend.call_timeout_secs, 300);
    }
}
