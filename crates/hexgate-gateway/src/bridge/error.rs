use std::time::Duration;

/// Errors from the backend bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn backend: {0}")]
    Spawn(String),

    #[error("Backend handshake failed: {0}")]
    Handshake(String),

    /// The backend answered with a JSON-RPC error object.
    #[error("Backend error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Backend transport error: {0}")]
    Transport(String),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend bridge stopped")]
    Stopped,
}
