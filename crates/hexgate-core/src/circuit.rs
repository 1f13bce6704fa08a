//! Per-tool admission control driven by external rate-limit signals.
//!
//! The metering service pushes `trip`/`reset` signals; a tripped tool is
//! refused until it is explicitly reset. There is no automatic expiry.

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Set of tools currently refused admission.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    tripped: RwLock<HashSet<String>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tripped(&self, tool: &str) -> bool {
        self.tripped.read().contains(tool)
    }

    /// Refuse further calls to `tool`. Returns `true` if the state changed.
    pub fn trip(&self, tool: &str) -> bool {
        let changed = self.tripped.write().insert(tool.to_string());
        if changed {
            info!(tool, "Circuit breaker tripped");
        } else {
            debug!(tool, "Circuit breaker already tripped");
        }
        changed
    }

    /// Re-admit `tool`. Returns `true` if the state changed.
    pub fn reset(&self, tool: &str) -> bool {
        let changed = self.tripped.write().remove(tool);
        if changed {
            info!(tool, "Circuit breaker reset");
        } else {
            debug!(tool, "Circuit breaker already clear");
        }
        changed
    }

    /// Currently tripped tools, sorted.
    pub fn tripped_tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = self.tripped.read().iter().cloned().collect();
        tools.sort();
        tools
    }
}

/// Rate-limit signal pushed by the metering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSignal {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub action: String,
}

/// What [`apply_signal`] did with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Tripped,
    Reset,
    /// Valid action, but the tool was already in that state.
    NoChange,
    /// Unknown action or missing tool name.
    Ignored,
}

/// Apply an admission signal to the breaker. Malformed signals are logged
/// and ignored.
pub fn apply_signal(breaker: &CircuitBreaker, signal: &AdmissionSignal) -> SignalOutcome {
    if signal.tool_name.is_empty() {
        warn!(action = %signal.action, "Admission signal without tool name ignored");
        return SignalOutcome::Ignored;
    }
    match signal.action.as_str() {
        "trip" => {
            if breaker.trip(&signal.tool_name) {
                SignalOutcome::Tripped
            } else {
                SignalOutcome::NoChange
            }
        }
        "reset" => {
            if breaker.reset(&signal.tool_name) {
                SignalOutcome::Reset
            } else {
                SignalOutcome::NoChange
            }
        }
        other => {
            warn!(action = other, tool = %signal.tool_name, "Unknown admission action ignored");
            SignalOutcome::Ignored
        }
    }
}
