//! HTTP surface of the gateway.
//!
//! `POST /mcp` runs the call pipeline: policy (outermost) -> circuit-breaker
//! admission and usage accounting -> backend call. `POST /aperture/webhook`
//! takes rate-limit signals and `GET /health` reports liveness. [`serve`]
//! runs the router on a listener.

mod admission_layer;
mod caller;
mod error;
mod health;
mod listener;
mod mcp;
mod policy_layer;
mod webhook;

pub use caller::{IDENTITY_HEADER, ToolTag, caller_identity};
pub use error::GatewayError;
pub use health::HealthReport;
pub use listener::serve;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use hexgate_core::{CircuitBreaker, PolicyEngine};

use crate::bridge::ToolBackend;
use crate::telemetry::GatewayMetrics;
use crate::usage::UsageRecorder;

/// Default limit on a buffered call body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<PolicyEngine>,
    pub breaker: Arc<CircuitBreaker>,
    pub backend: Arc<dyn ToolBackend>,
    pub usage: Option<Arc<UsageRecorder>>,
    pub metrics: GatewayMetrics,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(policy: Arc<PolicyEngine>, breaker: Arc<CircuitBreaker>, backend: Arc<dyn ToolBackend>) -> Self {
        Self {
            policy,
            breaker,
            backend,
            usage: None,
            metrics: GatewayMetrics::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, recorder: Arc<UsageRecorder>) -> Self {
        self.usage = Some(recorder);
        self
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    // Layers wrap outward: the last one added runs first.
    let call = post(mcp::handle_call)
        .layer(middleware::from_fn_with_state(state.clone(), admission_layer::admit))
        .layer(middleware::from_fn_with_state(state.clone(), policy_layer::enforce_policy));

    Router::new()
        .route("/mcp", call)
        .route("/aperture/webhook", post(webhook::admission_signal))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
