//! Shared tracing/logging initialization.
//!
//! The gateway binary and the test fixtures use the same pattern for setting
//! up `tracing_subscriber` with an env-filter and optional JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive for a log level, e.g.
/// `"hexgate_gateway=info,hexgate_core=info"`.
pub fn default_filter(level: &str) -> String {
    format!("hexgate_gateway={level},hexgate_core={level}")
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"hexgate_gateway=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Opaque guard returned by [`init_tracing_with_metrics`].
///
/// Holds the `OpenTelemetry` providers when an endpoint was configured.
pub struct TelemetryGuard {
    #[cfg(feature = "metrics")]
    inner: Option<crate::metrics::MetricsGuard>,
}

impl TelemetryGuard {
    /// Flush and shut down any telemetry pipeline held by this guard.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        if let Some(guard) = self.inner {
            if let Err(e) = guard.shutdown() {
                tracing::warn!(error = %e, "OpenTelemetry shutdown failed");
            }
        }
    }
}

/// Initialise tracing and, when the `metrics` feature is enabled and an
/// endpoint is given, the OTLP traces + metrics pipeline.
///
/// A failure to build the OTLP exporters is logged and the gateway keeps
/// running with plain logging.
pub fn init_tracing_with_metrics(
    default_filter: &str,
    log_json: bool,
    metrics_endpoint: Option<&str>,
) -> TelemetryGuard {
    init_tracing(default_filter, log_json);

    #[cfg(feature = "metrics")]
    {
        let inner = metrics_endpoint.and_then(|endpoint| {
            match crate::metrics::init_metrics(endpoint) {
                Ok(guard) => {
                    tracing::info!(endpoint, "OpenTelemetry pipeline initialised");
                    Some(guard)
                }
                Err(e) => {
                    tracing::warn!(endpoint, error = %e, "OpenTelemetry pipeline unavailable");
                    None
                }
            }
        });
        TelemetryGuard { inner }
    }

    #[cfg(not(feature = "metrics"))]
    {
        if let Some(endpoint) = metrics_endpoint {
            tracing::warn!(endpoint, "metrics endpoint ignored: built without `metrics` feature");
        }
        TelemetryGuard {}
    }
}
