//! Hot reload of the policy file by modification-time polling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::engine::PolicyEngine;

/// Default interval between modification-time checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Result of a single reload check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The file changed and the new policy is live.
    Reloaded,
    /// The file has not changed since the last successful load.
    Unchanged,
    /// The file could not be stat'ed; the current policy stays.
    Unavailable(String),
    /// The file changed but failed to load; the current policy stays.
    Failed(String),
}

/// Polls a policy file and reloads the engine when it changes.
pub struct PolicyWatcher {
    engine: Arc<PolicyEngine>,
    path: PathBuf,
    interval: Duration,
    last_loaded: Mutex<Option<SystemTime>>,
}

impl PolicyWatcher {
    /// Create a watcher. The file's current modification time is taken as
    /// the baseline, since the engine was loaded from it at startup.
    pub fn new(engine: Arc<PolicyEngine>, path: impl Into<PathBuf>, interval: Duration) -> Self {
        let path = path.into();
        let baseline = modified(&path).ok();
        Self {
            engine,
            path,
            interval,
            last_loaded: Mutex::new(baseline),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload if the file is newer than the last successful load.
    ///
    /// A failed load does not advance the recorded modification time, so the
    /// next edit is retried.
    pub fn check_reload(&self) -> ReloadOutcome {
        let mtime = match modified(&self.path) {
            Ok(mtime) => mtime,
            Err(e) => return ReloadOutcome::Unavailable(e.to_string()),
        };
        if self.last_loaded.lock().is_some_and(|last| mtime <= last) {
            return ReloadOutcome::Unchanged;
        }
        match self.engine.reload(&self.path) {
            Ok(()) => {
                *self.last_loaded.lock() = Some(mtime);
                ReloadOutcome::Reloaded
            }
            Err(e) => ReloadOutcome::Failed(e.to_string()),
        }
    }

    /// Run the polling loop until `shutdown` flips.
    pub fn spawn(
        self: Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                path = %self.path.display(),
                interval_secs = self.interval.as_secs(),
                "Policy watcher started"
            );
            let mut timer = tokio::time::interval(self.interval);
            // First tick fires immediately; the startup load already covered it.
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => match self.check_reload() {
                        ReloadOutcome::Reloaded => {
                            info!(version = self.engine.version().as_deref().unwrap_or("-"), "Policy file change applied");
                        }
                        ReloadOutcome::Unchanged => {}
                        ReloadOutcome::Unavailable(e) => {
                            debug!(error = %e, "Policy file not readable, keeping current policy");
                        }
                        ReloadOutcome::Failed(e) => {
                            warn!(error = %e, "Policy reload failed, keeping last good policy");
                        }
                    },
                    _ = shutdown.changed() => {
                        info!("Policy watcher shutting down");
                        return;
                    }
                }
            }
        })
    }
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}
