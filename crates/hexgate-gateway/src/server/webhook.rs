//! `POST /aperture/webhook`: rate-limit signals from the metering service.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use hexgate_core::circuit::{AdmissionSignal, apply_signal};

use super::AppState;
use super::error::GatewayError;

/// Apply a signal to the breaker. Unknown actions are accepted and ignored.
pub async fn admission_signal(State(state): State<AppState>, body: Bytes) -> Response {
    let Ok(signal) = serde_json::from_slice::<AdmissionSignal>(&body) else {
        return GatewayError::Validation("invalid JSON".into()).into_response();
    };
    let outcome = apply_signal(&state.breaker, &signal);
    debug!(tool = %signal.tool_name, action = %signal.action, ?outcome, "Admission signal applied");
    StatusCode::OK.into_response()
}
