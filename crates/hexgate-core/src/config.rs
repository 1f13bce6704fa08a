//! Configuration resolution for hexgate.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. JSON settings file (`--config`)
//! 3. Environment variables (`HEXGATE_*`)
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub usage: UsageSection,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSection {
    pub listen: String,
    pub max_body_bytes: usize,
    /// Connections that have not sent complete request headers by then are
    /// closed.
    pub header_read_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub log_level: String,
    pub log_json: bool,
    pub metrics_endpoint: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024, // 1 MiB
            header_read_timeout_secs: 10,
            shutdown_grace_secs: 10,
            log_level: "info".to_string(),
            log_json: false,
            metrics_endpoint: None,
        }
    }
}

/// Tool-execution backend process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendSection {
    pub program: String,
    pub args: Vec<String>,
    /// Credential keys resolved at startup and injected into the backend env.
    pub inject_credentials: Vec<String>,
    pub call_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub max_in_flight: usize,
    pub max_line_bytes: usize,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            program: "hexstrike-mcp".to_string(),
            args: Vec::new(),
            inject_credentials: Vec::new(),
            call_timeout_secs: 300,
            handshake_timeout_secs: 30,
            max_in_flight: 1,
            max_line_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

/// Policy file settings. No path means default-allow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicySection {
    pub path: Option<PathBuf>,
    pub poll_interval_secs: u64,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            path: None,
            poll_interval_secs: 5,
        }
    }
}

/// Secret sources, consulted in the order env, sops, kdbx, setec.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsSection {
    pub sops_file: Option<PathBuf>,
    pub kdbx_endpoint: Option<String>,
    pub setec_url: Option<String>,
}

/// Usage metering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UsageSection {
    /// Metering service base URL; unset disables recording.
    pub aperture_url: Option<String>,
    pub queue_capacity: usize,
}

impl Default for UsageSection {
    fn default() -> Self {
        Self {
            aperture_url: None,
            queue_capacity: 1024,
        }
    }
}

/// Load configuration with hierarchical resolution from the process env.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, env);
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<GatewayConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut GatewayConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("HEXGATE_LISTEN") {
        config.server.listen = val;
    }
    if let Some(n) = env("HEXGATE_HEADER_READ_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.server.header_read_timeout_secs = n;
    }
    if let Some(val) = env("HEXGATE_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let Some(val) = env("HEXGATE_BACKEND_BIN") {
        config.backend.program = val;
    }
    if let Some(n) = env("HEXGATE_CALL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.backend.call_timeout_secs = n;
    }
    if let Some(n) = env("HEXGATE_MAX_IN_FLIGHT").and_then(|v| v.parse().ok()) {
        config.backend.max_in_flight = n;
    }
    if let Some(val) = env("HEXGATE_POLICY_PATH") {
        config.policy.path = Some(PathBuf::from(val));
    }
    if let Some(n) = env("HEXGATE_POLICY_POLL_SECS").and_then(|v| v.parse().ok()) {
        config.policy.poll_interval_secs = n;
    }
    if let Some(val) = env("HEXGATE_SOPS_FILE") {
        config.credentials.sops_file = Some(PathBuf::from(val));
    }
    if let Some(val) = env("HEXGATE_ADAPTER_URL") {
        config.credentials.kdbx_endpoint = Some(val);
    }
    if let Some(val) = env("HEXGATE_SETEC_URL") {
        config.credentials.setec_url = Some(val);
    }
    if let Some(val) = env("HEXGATE_APERTURE_URL") {
        config.usage.aperture_url = Some(val);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.header_read_timeout_secs, 10);
        assert_eq!(config.backend.program, "hexstrike-mcp");
        assert_eq!(config.backend.call_timeout_secs, 300);
        assert_eq!(config.backend.max_in_flight, 1);
        assert_eq!(config.policy.poll_interval_secs, 5);
        assert_eq!(config.usage.queue_capacity, 1024);
        assert!(config.policy.path.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"backend":{"program":"/opt/tools/mcp","max_in_flight":4},"policy":{"path":"/etc/hexgate/policy.json"}}"#,
        )
        .unwrap();

        let config = load_config_with_env(Some(&path), no_env).unwrap();
        assert_eq!(config.backend.program, "/opt/tools/mcp");
        assert_eq!(config.backend.max_in_flight, 4);
        assert_eq!(config.backend.call_timeout_secs, 300);
        assert_eq!(
            config.policy.path.as_deref(),
            Some(Path::new("/etc/hexgate/policy.json"))
        );
        assert_eq!(config.server, ServerSection::default());
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"listen":"127.0.0.1:9000"}}"#).unwrap();

        let config = load_config_with_env(Some(&path), |key| match key {
            "HEXGATE_LISTEN" => Some("127.0.0.1:9100".into()),
            "HEXGATE_MAX_IN_FLIGHT" => Some("not-a-number".into()),
            "HEXGATE_SETEC_URL" => Some("http://setec.internal".into()),
            "HEXGATE_HEADER_READ_TIMEOUT_SECS" => Some("3".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.server.header_read_timeout_secs, 3);
        assert_eq!(config.server.listen, "127.0.0.1:9100");
        assert_eq!(config.backend.max_in_flight, 1);
        assert_eq!(config.credentials.setec_url.as_deref(), Some("http://setec.internal"));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_config_with_env(Some(&path), no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
