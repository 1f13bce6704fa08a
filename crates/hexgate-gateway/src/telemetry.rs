//! Request instruments.
//!
//! With the `metrics` feature these record through the global
//! `OpenTelemetry` meter installed by `hexgate_core::tracing_init`; without it
//! every method is a no-op.

use std::time::Duration;

#[cfg(feature = "metrics")]
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

#[derive(Clone)]
pub struct GatewayMetrics {
    #[cfg(feature = "metrics")]
    requests: Counter<u64>,
    #[cfg(feature = "metrics")]
    duration: Histogram<f64>,
    #[cfg(feature = "metrics")]
    decisions: Counter<u64>,
    #[cfg(feature = "metrics")]
    tool_errors: Counter<u64>,
    #[cfg(feature = "metrics")]
    usage_dropped: Counter<u64>,
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    #[cfg(feature = "metrics")]
    pub fn new() -> Self {
        let meter = global::meter("hexgate");
        Self {
            requests: meter
                .u64_counter("hexgate.requests")
                .with_description("Calls received on /mcp")
                .build(),
            duration: meter
                .f64_histogram("hexgate.request.duration")
                .with_description("Time spent serving a call")
                .with_unit("s")
                .build(),
            decisions: meter
                .u64_counter("hexgate.policy.decisions")
                .with_description("Policy evaluations by outcome")
                .build(),
            tool_errors: meter
                .u64_counter("hexgate.tool.errors")
                .with_description("Calls that failed in the backend")
                .build(),
            usage_dropped: meter
                .u64_counter("hexgate.usage.dropped")
                .with_description("Usage events dropped on a full queue")
                .build(),
        }
    }

    #[cfg(not(feature = "metrics"))]
    pub const fn new() -> Self {
        Self {}
    }

    pub fn record_request(&self, method: &str, tool: &str, elapsed: Duration) {
        #[cfg(feature = "metrics")]
        {
            let attrs = [
                KeyValue::new("method", method.to_string()),
                KeyValue::new("tool", tool.to_string()),
            ];
            self.requests.add(1, &attrs);
            self.duration.record(elapsed.as_secs_f64(), &attrs);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (method, tool, elapsed);
    }

    pub fn record_decision(&self, tool: &str, allowed: bool) {
        #[cfg(feature = "metrics")]
        self.decisions.add(
            1,
            &[
                KeyValue::new("tool", tool.to_string()),
                KeyValue::new("decision", if allowed { "allow" } else { "deny" }),
            ],
        );
        #[cfg(not(feature = "metrics"))]
        let _ = (tool, allowed);
    }

    pub fn record_tool_error(&self, tool: &str) {
        #[cfg(feature = "metrics")]
        self.tool_errors.add(1, &[KeyValue::new("tool", tool.to_string())]);
        #[cfg(not(feature = "metrics"))]
        let _ = tool;
    }

    pub fn record_usage_dropped(&self) {
        #[cfg(feature = "metrics")]
        self.usage_dropped.add(1, &[]);
    }
}
