//! Pattern matching for grant fields.

use super::types::WILDCARD;

/// Check if a grant source pattern matches the caller identity.
///
/// `*` matches anything, a trailing `*` is a prefix match, anything else is
/// compared exactly.
pub fn matches_caller(pattern: &str, caller: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return caller.starts_with(prefix);
    }
    pattern == caller
}

/// Check if a grant destination namespace applies to the caller.
///
/// Callers with an `@` in their identity are tailnet (`internal`) callers.
pub fn matches_namespace(dst: &str, caller: &str) -> bool {
    let tailnet = caller.contains('@');
    match dst {
        WILDCARD => true,
        "internal" => tailnet,
        "external" => !tailnet,
        exact => exact == caller,
    }
}

/// Check a parameter value against a constraint pattern.
///
/// Supports `*`, suffix globs (`*.example.com`), prefix globs (`10.0.*`) and
/// exact values.
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    pattern == value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_exact_and_prefix() {
        assert!(matches_caller("alice@tailnet", "alice@tailnet"));
        assert!(!matches_caller("alice@tailnet", "bob@tailnet"));
        assert!(matches_caller("agent-*", "agent-hexstrike"));
        assert!(!matches_caller("agent-*", "user-bob"));
        assert!(matches_caller("*", ""));
    }

    #[test]
    fn namespace_internal_external_are_inverse() {
        for caller in ["alice@tailnet", "10.0.0.5:4711", "agent-x"] {
            assert_ne!(
                matches_namespace("internal", caller),
                matches_namespace("external", caller),
                "{caller}"
            );
        }
        assert!(matches_namespace("internal", "alice@tailnet"));
        assert!(matches_namespace("external", "10.0.0.5:4711"));
    }

    #[test]
    fn namespace_literal_must_equal_caller() {
        assert!(matches_namespace("alice@tailnet", "alice@tailnet"));
        assert!(!matches_namespace("alice@tailnet", "bob@tailnet"));
        assert!(matches_namespace("*", "anyone"));
    }

    #[test]
    fn parameter_patterns() {
        assert!(matches_pattern("10.0.*", "10.0.1.1"));
        assert!(!matches_pattern("10.0.*", "192.168.1.1"));
        assert!(matches_pattern("*.example.com", "api.example.com"));
        assert!(!matches_pattern("*.example.com", "example.org"));
        assert!(matches_pattern("443", "443"));
        assert!(!matches_pattern("443", "4430"));
        assert!(matches_pattern("*", "whatever"));
    }
}
