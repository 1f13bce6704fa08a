//! `GET /health`.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::AppState;

/// Health report. Always served with 200; `status` carries degradation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub gateway: String,
    pub backend: String,
    pub version: String,
    pub policy_version: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let backend_up = state.backend.alive();
    Json(HealthReport {
        status: if backend_up { "ok" } else { "degraded" }.to_string(),
        gateway: "up".to_string(),
        backend: if backend_up { "up" } else { "down" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        policy_version: state.policy.version(),
    })
}
