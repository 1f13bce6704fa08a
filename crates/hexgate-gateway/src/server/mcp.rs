//! `POST /mcp` call handler.

use std::time::Instant;

use axum::Json;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use hexgate_core::envelope::{CallEnvelope, CallReply};

use super::AppState;
use super::caller::ToolTag;
use super::error::GatewayError;

/// Forward the call to the backend and wrap its result.
pub async fn handle_call(State(state): State<AppState>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(result) => Json(CallReply::Result { result }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn forward(state: &AppState, request: Request) -> Result<serde_json::Value, GatewayError> {
    let tool = request
        .extensions()
        .get::<ToolTag>()
        .map(|t| t.tool.clone())
        .unwrap_or_default();
    let bytes = to_bytes(request.into_body(), state.max_body_bytes)
        .await
        .map_err(|e| GatewayError::Validation(format!("read body failed: {e}")))?;
    let envelope: CallEnvelope =
        serde_json::from_slice(&bytes).map_err(|_| GatewayError::Validation("invalid JSON".into()))?;
    if envelope.method.is_empty() {
        return Err(GatewayError::Validation("method is required".into()));
    }

    let start = Instant::now();
    let result = state.backend.send_request(&envelope.method, envelope.params).await;
    state.metrics.record_request(&envelope.method, &tool, start.elapsed());

    result.map_err(|e| {
        warn!(method = %envelope.method, tool = %tool, error = %e, "Backend call failed");
        state.metrics.record_tool_error(&tool);
        GatewayError::Backend(e)
    })
}
