use async_trait::async_trait;

use super::resolver::{Resolver, ResolverError};

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads `a.b.c` from the environment variable `A_B_C`.
pub struct EnvResolver {
    lookup: Lookup,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvResolver {
    /// Resolver over the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolver over an arbitrary name -> value lookup.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

/// Map a dotted credential key to its environment variable name.
pub fn env_var_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' | '/' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

#[async_trait]
impl Resolver for EnvResolver {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn resolve(&self, key: &str) -> Result<String, ResolverError> {
        let var = env_var_name(key);
        match (self.lookup)(&var) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ResolverError::Missing(format!("env {var} not set"))),
        }
    }
}
