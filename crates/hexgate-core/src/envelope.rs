//! Inbound call envelope and reply shapes for the `/mcp` endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only method the policy layer guards.
pub const TOOLS_CALL_METHOD: &str = "tools/call";

/// Tool name used when the call parameters do not name one.
pub const UNKNOWN_TOOL: &str = "unknown";

/// Request body: `{method, params}` with opaque params.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl CallEnvelope {
    pub fn is_tool_call(&self) -> bool {
        self.method == TOOLS_CALL_METHOD
    }
}

/// Response body: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallReply {
    Result { result: Value },
    Error { error: String },
}

impl CallReply {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// Tool name from `params.name`, or [`UNKNOWN_TOOL`] for a missing, empty,
/// non-string or null name.
pub fn extract_tool_name(params: Option<&Value>) -> String {
    params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_TOOL)
        .to_string()
}

/// Flatten `params.arguments` into the string map the policy engine checks
/// constraints against. Strings are taken as-is; numbers and booleans are
/// stringified; nulls, arrays and objects are skipped.
pub fn tool_arguments(params: Option<&Value>) -> HashMap<String, String> {
    let Some(Value::Object(args)) = params.and_then(|p| p.get("arguments")) else {
        return HashMap::new();
    };
    args.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}
