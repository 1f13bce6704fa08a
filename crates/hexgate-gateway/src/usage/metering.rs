//! Client for the metering service's usage endpoint.

use std::time::Duration;

use async_trait::async_trait;

use hexgate_core::usage::UsageEvent;

use crate::http::{client_with_timeout, join_url};

/// Timeout for a single usage post.
pub const METERING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("usage post failed: {0}")]
    Transport(String),

    #[error("metering service returned {0}")]
    Status(u16),

    #[error("failed to encode usage event: {0}")]
    Encode(String),
}

/// Where completed calls are reported.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, event: &UsageEvent) -> Result<(), UsageError>;
}

/// Posts usage events to `<base>/api/v1/usage`. With no base URL every
/// record is a no-op.
#[derive(Debug, Clone)]
pub struct MeteringClient {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl MeteringClient {
    pub fn new(base_url: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(base_url, client_with_timeout(METERING_TIMEOUT)?))
    }

    pub fn with_client(base_url: Option<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.filter(|u| !u.is_empty()),
            http,
        }
    }

    pub const fn enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub fn set_http_client(&mut self, client: reqwest::Client) {
        self.http = client;
    }
}

#[async_trait]
impl UsageSink for MeteringClient {
    async fn record(&self, event: &UsageEvent) -> Result<(), UsageError> {
        let Some(base) = &self.base_url else {
            return Ok(());
        };
        let body = serde_json::to_vec(event).map_err(|e| UsageError::Encode(e.to_string()))?;
        let resp = self
            .http
            .post(join_url(base, "/api/v1/usage"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| UsageError::Transport(e.to_string()))?;
        if resp.status().as_u16() >= 400 {
            return Err(UsageError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}
