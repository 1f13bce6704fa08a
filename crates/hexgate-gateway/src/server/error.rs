use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use hexgate_core::envelope::CallReply;

use crate::bridge::BridgeError;

/// Terminal outcomes of a gateway request, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Backend(#[from] BridgeError),
}

impl GatewayError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::PolicyDenied(_) => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(CallReply::error(self.to_string()))).into_response()
    }
}
