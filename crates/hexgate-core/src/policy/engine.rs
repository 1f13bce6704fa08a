//! Policy evaluation against an atomically swappable snapshot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::matcher::{matches_caller, matches_namespace, matches_pattern};
use super::types::{CompiledPolicy, Decision, Grant};
use crate::error::{Error, Result};

/// Evaluates tool calls against the currently loaded [`CompiledPolicy`].
///
/// Readers clone the snapshot `Arc` and evaluate without holding the lock, so
/// a reload never blocks or tears an in-flight evaluation.
#[derive(Debug)]
pub struct PolicyEngine {
    current: RwLock<Arc<CompiledPolicy>>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::default_allow()
    }
}

impl PolicyEngine {
    /// Engine with no grants and no denials.
    pub fn default_allow() -> Self {
        Self::with_policy(CompiledPolicy::default_allow())
    }

    pub fn with_policy(policy: CompiledPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// Load the policy at `path`, or default-allow when no path is given.
    pub fn from_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self::with_policy(read_policy(path)?)),
            None => Ok(Self::default_allow()),
        }
    }

    /// Like [`Self::from_path`] but a load failure degrades to default-allow.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match Self::from_path(path) {
            Ok(engine) => engine,
            Err(e) => {
                warn!(error = %e, "policy load failed, falling back to default-allow");
                Self::default_allow()
            }
        }
    }

    /// Re-read `path` and swap the snapshot. On failure the old policy stays.
    pub fn reload(&self, path: &Path) -> Result<()> {
        let policy = read_policy(path)?;
        info!(
            path = %path.display(),
            grants = policy.grants.len(),
            denied = policy.denied.len(),
            version = policy.version.as_deref().unwrap_or("-"),
            "Policy reloaded"
        );
        *self.current.write() = Arc::new(policy);
        Ok(())
    }

    /// The snapshot evaluations currently run against.
    pub fn snapshot(&self) -> Arc<CompiledPolicy> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> Option<String> {
        self.current.read().version.clone()
    }

    /// Decide whether `caller` may invoke `tool`.
    pub fn evaluate(&self, caller: &str, tool: &str) -> Decision {
        let policy = self.snapshot();
        let (decision, _) = decide(&policy, caller, tool);
        debug!(caller, tool, allowed = decision.allowed, reason = %decision.reason, "Policy evaluated");
        decision
    }

    /// Like [`Self::evaluate`], then enforce the parameter constraints of the
    /// grant that allowed the call.
    ///
    /// Constraints naming parameters absent from `params` are not enforced.
    pub fn evaluate_with_params(
        &self,
        caller: &str,
        tool: &str,
        params: &HashMap<String, String>,
    ) -> Decision {
        let policy = self.snapshot();
        let (decision, grant) = decide(&policy, caller, tool);
        let decision = match grant {
            Some(grant) if decision.allowed => {
                check_constraints(grant, params).map_or(decision, Decision::deny)
            }
            _ => decision,
        };
        debug!(caller, tool, allowed = decision.allowed, reason = %decision.reason, "Policy evaluated");
        decision
    }
}

fn read_policy(path: &Path) -> Result<CompiledPolicy> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Policy(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Policy(format!("failed to parse {}: {e}", path.display())))
}

/// First-match evaluation. Returns the grant that produced an allow, if any.
fn decide<'a>(policy: &'a CompiledPolicy, caller: &str, tool: &str) -> (Decision, Option<&'a Grant>) {
    if policy.is_denied(tool) {
        return (Decision::deny("explicitly denied"), None);
    }
    if policy.grants.is_empty() {
        return (Decision::allow("default-allow", None), None);
    }
    policy
        .grants
        .iter()
        .find(|g| matches_caller(&g.src, caller) && matches_namespace(&g.dst, caller) && g.permits(tool))
        .map_or_else(
            || (Decision::deny("no matching grant"), None),
            |g| (Decision::allow(format!("granted by {}", g.src), Some(g)), Some(g)),
        )
}

/// Returns the denial reason for the first violated constraint.
fn check_constraints(grant: &Grant, params: &HashMap<String, String>) -> Option<String> {
    grant
        .parameter_constraints
        .iter()
        .find_map(|(name, pattern)| {
            let value = params.get(name)?;
            (!matches_pattern(pattern, value))
                .then(|| format!("parameter \"{name}\" violates constraint \"{pattern}\""))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;

    use proptest::prelude::*;

    use super::*;
    use crate::policy::types::DEFAULT_AUDIT_LEVEL;

    fn grant(src: &str, dst: &str, app: &[&str]) -> Grant {
        Grant {
            src: src.into(),
            dst: dst.into(),
            app: app.iter().map(|s| (*s).to_string()).collect(),
            parameter_constraints: BTreeMap::new(),
            rate_limit: None,
            audit_level: None,
        }
    }

    fn engine(grants: Vec<Grant>, denied: &[&str]) -> PolicyEngine {
        PolicyEngine::with_policy(CompiledPolicy {
            grants,
            denied: denied.iter().map(|s| (*s).to_string()).collect(),
            version: Some("test".into()),
        })
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_policy_allows_everything() {
        let engine = PolicyEngine::default_allow();
        let decision = engine.evaluate("anyone", "anything");
        assert!(decision.allowed);
        assert_eq!(decision.reason, "default-allow");
        assert_eq!(decision.audit_level, DEFAULT_AUDIT_LEVEL);
    }

    #[test]
    fn denial_beats_wildcard_grant() {
        let engine = engine(vec![grant("*", "*", &["*"])], &["exploit_run"]);
        let decision = engine.evaluate("alice@tailnet", "exploit_run");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "explicitly denied");
    }

    #[test]
    fn denial_applies_even_without_grants() {
        let engine = engine(vec![], &["exploit_run"]);
        assert!(!engine.evaluate("alice@tailnet", "exploit_run").allowed);
        assert!(engine.evaluate("alice@tailnet", "port_scan").allowed);
    }

    #[test]
    fn first_matching_grant_wins() {
        let mut verbose = grant("alice@tailnet", "*", &["port_scan"]);
        verbose.audit_level = Some("verbose".into());
        verbose.rate_limit = Some(5);
        let engine = engine(vec![verbose, grant("*", "*", &["*"])], &[]);

        let decision = engine.evaluate("alice@tailnet", "port_scan");
        assert!(decision.allowed);
        assert_eq!(decision.reason, "granted by alice@tailnet");
        assert_eq!(decision.audit_level, "verbose");
        assert_eq!(decision.rate_limit, Some(5));

        let fallback = engine.evaluate("bob@tailnet", "port_scan");
        assert_eq!(fallback.reason, "granted by *");
        assert_eq!(fallback.audit_level, DEFAULT_AUDIT_LEVEL);
    }

    #[test]
    fn no_matching_grant_denies() {
        let engine = engine(vec![grant("alice@tailnet", "*", &["port_scan"])], &[]);
        let decision = engine.evaluate("bob@tailnet", "port_scan");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "no matching grant");
        assert!(!engine.evaluate("alice@tailnet", "dns_lookup").allowed);
    }

    #[test]
    fn namespace_gates_grants() {
        let engine = engine(vec![grant("*", "internal", &["*"])], &[]);
        assert!(engine.evaluate("alice@tailnet", "port_scan").allowed);
        assert!(!engine.evaluate("203.0.113.9:5555", "port_scan").allowed);
    }

    #[test]
    fn parameter_constraint_violation_denies() {
        let mut g = grant("alice@tailnet", "*", &["port_scan"]);
        g.parameter_constraints.insert("target".into(), "10.0.*".into());
        let engine = engine(vec![g], &[]);

        let ok = engine.evaluate_with_params("alice@tailnet", "port_scan", &params(&[("target", "10.0.1.1")]));
        assert!(ok.allowed);

        let denied = engine.evaluate_with_params(
            "alice@tailnet",
            "port_scan",
            &params(&[("target", "192.168.1.1")]),
        );
        assert!(!denied.allowed);
        assert_eq!(denied.reason, r#"parameter "target" violates constraint "10.0.*""#);
    }

    #[test]
    fn absent_parameters_are_not_enforced() {
        let mut g = grant("*", "*", &["port_scan"]);
        g.parameter_constraints.insert("target".into(), "10.0.*".into());
        let engine = engine(vec![g], &[]);
        assert!(engine.evaluate_with_params("bob", "port_scan", &HashMap::new()).allowed);
    }

    #[test]
    fn params_do_not_rescue_base_denial() {
        let engine = engine(vec![grant("alice@tailnet", "*", &["port_scan"])], &[]);
        let decision = engine.evaluate_with_params("bob", "port_scan", &params(&[("target", "x")]));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "no matching grant");
    }

    #[test]
    fn from_path_and_reload_swap_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"grants":[{{"src":"alice@tailnet","app":["port_scan"]}}],"version":"v1"}}"#).unwrap();
        let engine = PolicyEngine::from_path(Some(file.path())).unwrap();
        assert_eq!(engine.version().as_deref(), Some("v1"));
        assert!(!engine.evaluate("bob@tailnet", "port_scan").allowed);

        let before = engine.snapshot();
        std::fs::write(file.path(), r#"{"grants":[],"version":"v2"}"#).unwrap();
        engine.reload(file.path()).unwrap();
        assert_eq!(engine.version().as_deref(), Some("v2"));
        assert!(engine.evaluate("bob@tailnet", "port_scan").allowed);
        // Holders of the old snapshot keep evaluating against it.
        assert_eq!(before.version.as_deref(), Some("v1"));
    }

    #[test]
    fn failed_reload_keeps_previous_policy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"denied":["exploit_run"],"version":"good"}}"#).unwrap();
        let engine = PolicyEngine::from_path(Some(file.path())).unwrap();

        std::fs::write(file.path(), "{not json").unwrap();
        assert!(engine.reload(file.path()).is_err());
        assert_eq!(engine.version().as_deref(), Some("good"));
        assert!(!engine.evaluate("x", "exploit_run").allowed);
    }

    #[test]
    fn missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(PolicyEngine::from_path(Some(&path)).is_err());
        let engine = PolicyEngine::load_or_default(Some(&path));
        assert!(engine.evaluate("anyone", "anything").allowed);
        assert!(PolicyEngine::load_or_default(None).evaluate("a", "b").allowed);
    }

    proptest! {
        /// With two grants that both admit the caller, only the first grant's
        /// constraints decide the outcome.
        #[test]
        fn constraints_come_from_first_matching_grant(
            first_pattern in "[a-z]{1,4}\\*?",
            second_pattern in "[a-z]{1,4}\\*?",
            value in "[a-z]{1,6}",
        ) {
            let mut first = grant("*", "*", &["scan"]);
            first.parameter_constraints.insert("target".into(), first_pattern.clone());
            let mut second = grant("*", "*", &["scan"]);
            second.parameter_constraints.insert("target".into(), second_pattern);
            let engine = engine(vec![first, second], &[]);

            let decision = engine.evaluate_with_params("agent", "scan", &params(&[("target", &value)]));
            prop_assert_eq!(decision.allowed, matches_pattern(&first_pattern, &value));
        }
    }
}
