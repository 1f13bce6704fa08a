use async_trait::async_trait;
use serde::Deserialize;

use super::resolver::{RESOLVER_TIMEOUT, Resolver, ResolverError};
use crate::http::{client_with_timeout, join_url};

/// Fetches secrets from a Setec server. Authentication is by network
/// identity, so the request carries no credentials of its own.
#[derive(Debug, Clone)]
pub struct SetecResolver {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct SecretBody {
    value: String,
}

impl SetecResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(base_url, client_with_timeout(RESOLVER_TIMEOUT)?))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn secret_url(&self, key: &str) -> String {
        join_url(&self.base_url, &format!("/api/v1/secret/{key}"))
    }
}

#[async_trait]
impl Resolver for SetecResolver {
    fn name(&self) -> &'static str {
        "setec"
    }

    async fn resolve(&self, key: &str) -> Result<String, ResolverError> {
        if self.base_url.is_empty() {
            return Err(ResolverError::NotConfigured("setec base URL"));
        }
        let resp = self
            .http
            .get(self.secret_url(key))
            .send()
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(ResolverError::Status(resp.status().as_u16()));
        }
        let body: SecretBody = resp
            .json()
            .await
            .map_err(|e| ResolverError::Decode(e.to_string()))?;
        Ok(body.value)
    }

    fn set_http_client(&mut self, client: reqwest::Client) {
        self.http = client;
    }
}
