//! Grant-based access control for tool invocations.
//!
//! A compiled policy file carries an ordered list of grants and a set of
//! denied tools. Denial is absolute; an empty grant list is default-allow.
//! The engine swaps whole snapshots on reload so concurrent evaluations
//! never see a half-loaded policy.

mod engine;
mod matcher;
mod types;
mod watcher;

pub use engine::PolicyEngine;
pub use matcher::{matches_caller, matches_namespace, matches_pattern};
pub use types::{CompiledPolicy, DEFAULT_AUDIT_LEVEL, Decision, Grant, WILDCARD};
pub use watcher::{DEFAULT_POLL_INTERVAL, PolicyWatcher, ReloadOutcome};
