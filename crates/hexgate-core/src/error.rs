//! Error types for the hexgate core library.

use thiserror::Error;

/// Result type alias using hexgate Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for hexgate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Policy file could not be read or parsed
    #[error("Policy error: {0}")]
    Policy(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON-RPC framing or protocol error
    #[error("JSON-RPC error: {0}")]
    JsonRpc(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
