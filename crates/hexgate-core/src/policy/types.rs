//! Policy data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Capability / pattern wildcard.
pub const WILDCARD: &str = "*";

/// Audit level reported when neither the policy nor the grant sets one.
pub const DEFAULT_AUDIT_LEVEL: &str = "standard";

/// A capability grant: who (`src`) may call which tools (`app`) from which
/// namespace (`dst`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Caller pattern (`*`, `prefix*`, or exact identity).
    pub src: String,
    /// Namespace pattern (`*`, `internal`, `external`, or exact identity).
    #[serde(default = "wildcard")]
    pub dst: String,
    /// Permitted tool names; `*` permits every tool.
    #[serde(default)]
    pub app: Vec<String>,
    /// Per-parameter value patterns the call must satisfy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_constraints: BTreeMap<String, String>,
    /// Advisory rate limit carried into the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_level: Option<String>,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

impl Grant {
    /// Whether this grant's capability set covers `tool`.
    pub fn permits(&self, tool: &str) -> bool {
        self.app.iter().any(|cap| cap == tool || cap == WILDCARD)
    }
}

/// In-memory form of a compiled policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPolicy {
    #[serde(default)]
    pub grants: Vec<Grant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denied: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CompiledPolicy {
    /// The permissive policy used when no file is configured or loading fails.
    pub fn default_allow() -> Self {
        Self {
            grants: Vec::new(),
            denied: Vec::new(),
            version: Some("default-allow".to_string()),
        }
    }

    /// Whether `tool` is on the deny list.
    pub fn is_denied(&self, tool: &str) -> bool {
        self.denied.iter().any(|d| d == tool)
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Human-readable reason, surfaced to denied callers.
    pub reason: String,
    pub audit_level: String,
    pub rate_limit: Option<u32>,
}

impl Decision {
    pub(crate) fn allow(reason: impl Into<String>, grant: Option<&Grant>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            audit_level: grant
                .and_then(|g| g.audit_level.clone())
                .unwrap_or_else(|| DEFAULT_AUDIT_LEVEL.to_string()),
            rate_limit: grant.and_then(|g| g.rate_limit),
        }
    }

    pub(crate) fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            audit_level: DEFAULT_AUDIT_LEVEL.to_string(),
            rate_limit: None,
        }
    }
}
