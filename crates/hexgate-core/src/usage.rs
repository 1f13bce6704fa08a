//! Usage accounting record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed tool invocation, as posted to the metering service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub caller: String,
    pub tool_name: String,
    /// Token accounting is done by the metering service; always 0 here.
    #[serde(default)]
    pub tokens: u64,
    pub duration_seconds: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl UsageEvent {
    /// Build an event for a call that started at `started` and ended now.
    pub fn completed(
        caller: impl Into<String>,
        tool_name: impl Into<String>,
        started: DateTime<Utc>,
        elapsed: std::time::Duration,
        success: bool,
    ) -> Self {
        Self {
            caller: caller.into(),
            tool_name: tool_name.into(),
            tokens: 0,
            duration_seconds: elapsed.as_secs_f64(),
            success,
            timestamp: started,
        }
    }
}
