use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::resolver::{Resolver, ResolverError};

/// Longest stderr excerpt carried into an error.
const STDERR_EXCERPT: usize = 200;

/// Decrypts a single key out of a SOPS-encrypted file via the `sops` CLI.
#[derive(Debug, Clone)]
pub struct SopsResolver {
    file: Option<PathBuf>,
    program: PathBuf,
}

impl SopsResolver {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self {
            file,
            program: PathBuf::from("sops"),
        }
    }

    /// Use a different `sops` executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

/// `--extract` path selecting the top-level `key`, quoted as a JSON string.
fn extract_path(key: &str) -> String {
    format!("[{}]", serde_json::Value::String(key.to_owned()))
}

#[async_trait]
impl Resolver for SopsResolver {
    fn name(&self) -> &'static str {
        "sops"
    }

    async fn resolve(&self, key: &str) -> Result<String, ResolverError> {
        let file = self
            .file
            .as_ref()
            .ok_or(ResolverError::NotConfigured("sops file path"))?;

        let output = Command::new(&self.program)
            .arg("--decrypt")
            .arg("--extract")
            .arg(extract_path(key))
            .arg(file)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolverError::Command(format!("{}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(ResolverError::Command(format!("sops decrypt ({}): {excerpt}", output.status)));
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Err(ResolverError::Missing(format!("sops: key {key:?} empty")));
        }
        Ok(value)
    }
}
