//! Outermost stage: buffer the call, enforce policy on tool calls.

use std::net::SocketAddr;

use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use hexgate_core::envelope::{CallEnvelope, extract_tool_name, tool_arguments};

use super::AppState;
use super::caller::{ToolTag, caller_identity};
use super::error::GatewayError;

/// Buffer the body, evaluate `tools/call` against the policy, and replay
/// the body to the next stage. Other methods pass through unguarded.
pub async fn enforce_policy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return GatewayError::Validation(format!("read body failed: {e}")).into_response(),
    };
    let Ok(envelope) = serde_json::from_slice::<CallEnvelope>(&bytes) else {
        return GatewayError::Validation("invalid JSON".into()).into_response();
    };

    if envelope.is_tool_call() {
        let tool = extract_tool_name(envelope.params.as_ref());
        let caller = caller_identity(&parts.headers, parts.extensions.get::<ConnectInfo<SocketAddr>>());
        let args = tool_arguments(envelope.params.as_ref());

        let decision = state.policy.evaluate_with_params(&caller, &tool, &args);
        state.metrics.record_decision(&tool, decision.allowed);
        if !decision.allowed {
            warn!(caller = %caller, tool = %tool, reason = %decision.reason, "Policy denied");
            return GatewayError::PolicyDenied(decision.reason).into_response();
        }
        debug!(
            caller = %caller,
            tool = %tool,
            reason = %decision.reason,
            audit_level = %decision.audit_level,
            "Policy allowed"
        );
        parts.extensions.insert(ToolTag {
            tool,
            caller,
            audit_level: decision.audit_level,
        });
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
