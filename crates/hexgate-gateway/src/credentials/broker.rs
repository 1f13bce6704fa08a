//! Ordered credential resolution chain.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::env::{EnvResolver, env_var_name};
use super::kdbx::KdbxResolver;
use super::resolver::Resolver;
use super::setec::SetecResolver;
use super::sops::SopsResolver;

/// Which secret sources exist beyond the environment.
#[derive(Debug, Clone, Default)]
pub struct BrokerConfig {
    pub sops_file: Option<PathBuf>,
    pub kdbx_endpoint: Option<String>,
    pub setec_url: Option<String>,
}

impl From<&hexgate_core::config::CredentialsSection> for BrokerConfig {
    fn from(section: &hexgate_core::config::CredentialsSection) -> Self {
        Self {
            sops_file: section.sops_file.clone(),
            kdbx_endpoint: section.kdbx_endpoint.clone(),
            setec_url: section.setec_url.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential {key:?} not found in any source")]
    NotFound { key: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Tries each resolver in order; the first non-empty value wins.
pub struct CredentialBroker {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl CredentialBroker {
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    /// Chain `env -> sops -> kdbx -> setec`; kdbx and setec only when
    /// their endpoint is set.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, CredentialError> {
        let mut resolvers: Vec<Box<dyn Resolver>> = vec![
            Box::new(EnvResolver::new()),
            Box::new(SopsResolver::new(config.sops_file.clone())),
        ];
        if let Some(endpoint) = config.kdbx_endpoint.as_deref().filter(|e| !e.is_empty()) {
            resolvers.push(Box::new(KdbxResolver::new(endpoint)?));
        }
        if let Some(url) = config.setec_url.as_deref().filter(|u| !u.is_empty()) {
            resolvers.push(Box::new(SetecResolver::new(url)?));
        }
        Ok(Self::new(resolvers))
    }

    /// Append a source at the end of the chain.
    pub fn push(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    pub fn resolver_names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Give every network-backed resolver a new HTTP client. Order is kept.
    pub fn set_http_client(&mut self, client: &reqwest::Client) {
        for resolver in &mut self.resolvers {
            resolver.set_http_client(client.clone());
        }
    }

    pub async fn resolve(&self, key: &str) -> Result<String, CredentialError> {
        for resolver in &self.resolvers {
            match resolver.resolve(key).await {
                Ok(value) if !value.is_empty() => {
                    info!(key, resolver = resolver.name(), "Credential resolved");
                    return Ok(value);
                }
                Ok(_) => debug!(key, resolver = resolver.name(), "Resolver returned empty value"),
                Err(e) => debug!(key, resolver = resolver.name(), error = %e, "Resolver miss"),
            }
        }
        Err(CredentialError::NotFound { key: key.to_string() })
    }

    /// Resolve `keys` into `(ENV_NAME, value)` pairs for a child process.
    /// Keys no source knows are logged and skipped.
    pub async fn resolve_env(&self, keys: &[String]) -> Vec<(String, String)> {
        let mut vars = Vec::with_capacity(keys.len());
        for key in keys {
            match self.resolve(key).await {
                Ok(value) => vars.push((env_var_name(key), value)),
                Err(e) => warn!(key = %key, error = %e, "Skipping credential for backend environment"),
            }
        }
        vars
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::credentials::resolver::ResolverError;

    /// Answers one fixed key and counts lookups.
    struct Fixed {
        name: &'static str,
        key: &'static str,
        value: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn boxed(name: &'static str, key: &'static str, value: &'static str) -> (Box<dyn Resolver>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let resolver = Self {
                name,
                key,
                value,
                calls: Arc::clone(&calls),
            };
            (Box::new(resolver), calls)
        }
    }

    #[async_trait]
    impl Resolver for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn resolve(&self, key: &str) -> Result<String, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key == self.key {
                Ok(self.value.to_string())
            } else {
                Err(ResolverError::Missing(format!("{} has no {key}", self.name)))
            }
        }
    }

    #[tokio::test]
    async fn first_source_wins_and_later_sources_are_skipped() {
        let (first, first_calls) = Fixed::boxed("first", "api.key", "from-first");
        let (second, second_calls) = Fixed::boxed("second", "api.key", "from-second");
        let broker = CredentialBroker::new(vec![first, second]);

        assert_eq!(broker.resolve("api.key").await.unwrap(), "from-first");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_misses_and_empty_values() {
        let (empty, _) = Fixed::boxed("empty", "api.key", "");
        let (other, _) = Fixed::boxed("other", "db.password", "x");
        let (last, _) = Fixed::boxed("last", "api.key", "from-last");
        let broker = CredentialBroker::new(vec![empty, other, last]);
        assert_eq!(broker.resolve("api.key").await.unwrap(), "from-last");
    }

    #[tokio::test]
    async fn all_sources_fail() {
        let broker = CredentialBroker::new(vec![Box::new(EnvResolver::with_lookup(|_| None))]);
        let err = broker.resolve("nope").await.unwrap_err();
        assert_eq!(err.to_string(), r#"credential "nope" not found in any source"#);
    }

    #[tokio::test]
    async fn push_appends_without_reordering() {
        let mut broker = CredentialBroker::new(vec![Box::new(EnvResolver::with_lookup(|_| None))]);
        let (extra, _) = Fixed::boxed("extra", "k", "v");
        broker.push(extra);
        assert_eq!(broker.resolver_names(), vec!["env", "extra"]);
        assert_eq!(broker.resolve("k").await.unwrap(), "v");
    }

    #[test]
    fn default_chain_order() {
        let broker = CredentialBroker::from_config(&BrokerConfig::default()).unwrap();
        assert_eq!(broker.resolver_names(), vec!["env", "sops"]);

        let full = CredentialBroker::from_config(&BrokerConfig {
            sops_file: Some("secrets.yaml".into()),
            kdbx_endpoint: Some("http://127.0.0.1:9/mcp".into()),
            setec_url: Some("http://127.0.0.1:9".into()),
        })
        .unwrap();
        assert_eq!(full.resolver_names(), vec!["env", "sops", "kdbx", "setec"]);
    }

    #[test]
    fn swapping_client_keeps_order() {
        let mut broker = CredentialBroker::from_config(&BrokerConfig {
            setec_url: Some("http://127.0.0.1:9".into()),
            ..BrokerConfig::default()
        })
        .unwrap();
        let client = crate::http::client_with_timeout(std::time::Duration::from_secs(1)).unwrap();
        broker.set_http_client(&client);
        assert_eq!(broker.resolver_names(), vec!["env", "sops", "setec"]);
    }

    #[tokio::test]
    async fn resolve_env_skips_missing_keys() {
        let broker = CredentialBroker::new(vec![Box::new(EnvResolver::with_lookup(|name| {
            (name == "SHODAN_API_KEY").then(|| "sk".to_string())
        }))]);
        let vars = broker
            .resolve_env(&["shodan.api.key".to_string(), "missing.key".to_string()])
            .await;
        assert_eq!(vars, vec![("SHODAN_API_KEY".to_string(), "sk".to_string())]);
    }
}
