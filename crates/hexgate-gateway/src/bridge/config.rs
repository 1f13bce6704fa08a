//! Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

use hexgate_core::config::BackendSection;
use hexgate_core::jsonrpc::DEFAULT_MAX_LINE_BYTES;

/// How to launch and talk to the backend process.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Backend executable.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment for the child (injected credentials).
    pub env: Vec<(String, String)>,
    /// Bound on a single call, from write to response.
    pub call_timeout: Duration,
    /// Bound on the `initialize` handshake.
    pub handshake_timeout: Duration,
    /// Calls admitted concurrently. 1 keeps strict request/response lockstep.
    pub max_in_flight: usize,
    /// Longest accepted response line.
    pub max_line_bytes: usize,
}

impl BridgeConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            call_timeout: Duration::from_secs(300),
            handshake_timeout: Duration::from_secs(30),
            max_in_flight: 1,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Build from the `backend` config section; env is added separately.
    pub fn from_section(section: &BackendSection) -> Self {
        Self {
            program: PathBuf::from(&section.program),
            args: section.args.clone(),
            env: Vec::new(),
            call_timeout: Duration::from_secs(section.call_timeout_secs),
            handshake_timeout: Duration::from_secs(section.handshake_timeout_secs),
            max_in_flight: section.max_in_flight.max(1),
            max_line_bytes: section.max_line_bytes,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    #[must_use]
    pub const fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }
}
