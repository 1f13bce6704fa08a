use async_trait::async_trait;
use serde_json::{Value, json};

use super::resolver::{RESOLVER_TIMEOUT, Resolver, ResolverError};
use crate::http::client_with_timeout;

/// Sidecar tool that looks a key up in the KeePass database.
const LOOKUP_TOOL: &str = "juggler_keys_resolve";

/// Resolves keys through the adapter sidecar's KeePass lookup tool.
#[derive(Debug, Clone)]
pub struct KdbxResolver {
    endpoint: String,
    http: reqwest::Client,
}

impl KdbxResolver {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(endpoint, client_with_timeout(RESOLVER_TIMEOUT)?))
    }

    pub fn with_client(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }
}

/// Pull the secret out of an MCP `tools/call` result: the first text content
/// block, or a bare string result.
fn extract_value(result: &Value) -> Option<String> {
    result
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .or_else(|| result.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[async_trait]
impl Resolver for KdbxResolver {
    fn name(&self) -> &'static str {
        "kdbx"
    }

    async fn resolve(&self, key: &str) -> Result<String, ResolverError> {
        if self.endpoint.is_empty() {
            return Err(ResolverError::NotConfigured("kdbx endpoint"));
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": LOOKUP_TOOL, "arguments": {"query": key}},
        });
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ResolverError::Status(status.as_u16()));
        }
        let reply: Value = resp
            .json()
            .await
            .map_err(|e| ResolverError::Decode(e.to_string()))?;
        if let Some(err) = reply.get("error") {
            return Err(ResolverError::Missing(format!("kdbx: key {key:?} not found: {err}")));
        }
        reply
            .get("result")
            .and_then(extract_value)
            .ok_or_else(|| ResolverError::Missing(format!("kdbx: key {key:?} not found")))
    }

    fn set_http_client(&mut self, client: reqwest::Client) {
        self.http = client;
    }
}
