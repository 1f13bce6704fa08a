//! Circuit-breaker admission and usage accounting for tagged calls.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::info;

use hexgate_core::usage::UsageEvent;

use super::AppState;
use super::caller::ToolTag;
use super::error::GatewayError;

/// Refuse tripped tools; time the rest and queue a usage event once the
/// response is ready.
pub async fn admit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let tag = request.extensions().get::<ToolTag>().cloned();
    if let Some(tag) = &tag {
        if state.breaker.is_tripped(&tag.tool) {
            info!(tool = %tag.tool, caller = %tag.caller, "Circuit breaker open");
            return GatewayError::RateLimited(tag.tool.clone()).into_response();
        }
    }

    let started_at = Utc::now();
    let start = Instant::now();
    let response = next.run(request).await;
    let Some(tag) = tag else {
        return response;
    };

    let success = response.status().as_u16() < 400;
    info!(
        tool = %tag.tool,
        caller = %tag.caller,
        audit_level = %tag.audit_level,
        status = response.status().as_u16(),
        elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Tool call finished"
    );
    if let Some(recorder) = &state.usage {
        let event = UsageEvent::completed(tag.caller, tag.tool, started_at, start.elapsed(), success);
        if !recorder.record(event) {
            state.metrics.record_usage_dropped();
        }
    }
    response
}
