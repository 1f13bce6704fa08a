//! Caller identity and the per-request tool tag.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

/// Identity header set by the tailnet-aware listener in front of us.
pub const IDENTITY_HEADER: &str = "Tailscale-User-Login";

/// Set on guarded requests the policy allowed; read by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTag {
    pub tool: String,
    pub caller: String,
    pub audit_level: String,
}

/// Identity header if present and non-empty, else the remote address.
pub fn caller_identity(headers: &HeaderMap, remote: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .or_else(|| remote.map(|ConnectInfo(addr)| addr.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
