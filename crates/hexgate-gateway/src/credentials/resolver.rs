//! The single-source resolver seam.

use async_trait::async_trait;

/// Timeout for network-backed resolvers.
pub const RESOLVER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Why a single resolver could not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("{0}")]
    Missing(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// One credential source in the broker chain.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name used in logs (`env`, `sops`, ...).
    fn name(&self) -> &'static str;

    async fn resolve(&self, key: &str) -> Result<String, ResolverError>;

    /// Swap the HTTP transport. No-op for resolvers that do not use one.
    fn set_http_client(&mut self, _client: reqwest::Client) {}
}
