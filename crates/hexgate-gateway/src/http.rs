//! Outbound HTTP client construction.

use std::time::Duration;

/// Build a `reqwest` client with the given request timeout.
pub fn client_with_timeout(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    // reqwest is built with rustls-no-provider. `Err` only means a provider
    // was already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
    reqwest::Client::builder().timeout(timeout).build()
}

/// Join a base URL and an absolute path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
