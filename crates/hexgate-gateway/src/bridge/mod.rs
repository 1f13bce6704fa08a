//! Bridge to the tool-execution backend.
//!
//! The backend is a child process speaking line-delimited JSON-RPC 2.0 on
//! stdin/stdout. One reader task routes response lines to waiting callers by
//! id; an exit monitor owns the child and flips liveness when it goes away.

mod backend;
mod config;
mod error;
mod pending;

pub use backend::{BackendBridge, BridgeState};
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use pending::PendingCalls;

use async_trait::async_trait;
use serde_json::Value;

/// What the request pipeline needs from a backend.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, BridgeError>;

    fn alive(&self) -> bool;
}

#[async_trait]
impl ToolBackend for BackendBridge {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, BridgeError> {
        Self::send_request(self, method, params).await
    }

    fn alive(&self) -> bool {
        Self::alive(self)
    }
}
