//! Backend process lifecycle and request/response correlation.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Notify, Semaphore, watch};
use tracing::{debug, error, info, warn};

use hexgate_core::jsonrpc::{LineRead, RpcRequest, decode_response, encode_request, read_bounded_line};

use super::config::BridgeConfig;
use super::error::BridgeError;
use super::pending::PendingCalls;

/// Time `stop` waits for the child to be reaped after the kill.
const STOP_WAIT: Duration = Duration::from_secs(5);

/// Lifecycle of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Spawned, handshake not yet complete.
    Starting,
    Ready,
    /// Stopped by the gateway or the backend exited.
    Stopped,
}

struct Inner {
    config: BridgeConfig,
    pid: Option<u32>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    pending: Arc<PendingCalls>,
    next_id: AtomicU64,
    admission: Semaphore,
    state: Arc<Mutex<BridgeState>>,
    kill: Arc<Notify>,
    exited: watch::Receiver<bool>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.kill.notify_one();
    }
}

/// Handle to the single backend process. Cheap to clone.
#[derive(Clone)]
pub struct BackendBridge {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BackendBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendBridge")
            .field("pid", &self.inner.pid)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl BackendBridge {
    /// Launch the backend and complete the `initialize` handshake.
    pub async fn spawn(config: BridgeConfig) -> Result<Self, BridgeError> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            program = %config.program.display(),
            args = ?config.args,
            injected_env = config.env.len(),
            "Spawning backend process"
        );
        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::Spawn(format!("{}: {e}", config.program.display())))?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Spawn("Failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn("Failed to capture stdout".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(pid, "backend stderr: {}", line);
                }
                debug!(pid, "stderr reader finished");
            });
        }

        let pending = Arc::new(PendingCalls::new());
        let state = Arc::new(Mutex::new(BridgeState::Starting));
        let kill = Arc::new(Notify::new());
        let (exit_tx, exited) = watch::channel(false);

        tokio::spawn(read_responses(
            stdout,
            Arc::clone(&pending),
            Arc::clone(&kill),
            config.max_line_bytes,
            pid,
        ));
        tokio::spawn(monitor_exit(
            child,
            Arc::clone(&pending),
            Arc::clone(&state),
            Arc::clone(&kill),
            exit_tx,
        ));

        let bridge = Self {
            inner: Arc::new(Inner {
                admission: Semaphore::new(config.max_in_flight.max(1)),
                config,
                pid,
                stdin: tokio::sync::Mutex::new(Some(stdin)),
                pending,
                next_id: AtomicU64::new(0),
                state,
                kill,
                exited,
            }),
        };

        let handshake_timeout = bridge.inner.config.handshake_timeout;
        match bridge.call("initialize", Some(json!({})), handshake_timeout).await {
            Ok(result) => {
                {
                    let mut state = bridge.inner.state.lock();
                    if *state == BridgeState::Starting {
                        *state = BridgeState::Ready;
                    }
                }
                info!(
                    pid,
                    server = ?result.get("serverInfo"),
                    "Backend handshake complete"
                );
                Ok(bridge)
            }
            Err(e) => {
                error!(pid, error = %e, "Backend handshake failed");
                bridge.stop().await;
                Err(BridgeError::Handshake(e.to_string()))
            }
        }
    }

    /// Send one JSON-RPC request and wait for its response.
    ///
    /// At most `max_in_flight` calls are admitted; others wait their turn.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, BridgeError> {
        let _permit = self
            .inner
            .admission
            .acquire()
            .await
            .map_err(|_| BridgeError::Stopped)?;
        self.call(method, params, self.inner.config.call_timeout).await
    }

    /// Register, write and wait under a single deadline.
    async fn call(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value, BridgeError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let line = encode_request(&RpcRequest::new(id, method, params))
            .map_err(|e| BridgeError::Transport(format!("encode request: {e}")))?;

        let rx = self.inner.pending.register(id)?;
        let mut written = false;
        let exchange = async {
            self.write_line(&line).await?;
            written = true;
            debug!(id, method, "Request sent to backend");
            rx.await
                .map_err(|_| BridgeError::Transport("response channel closed".into()))?
        };
        let outcome = tokio::time::timeout(timeout, exchange).await;

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                self.inner.pending.remove(id);
                Err(e)
            }
            Err(_) if written => {
                self.inner.pending.remove(id);
                warn!(id, method, ?timeout, "Backend call timed out");
                Err(BridgeError::Timeout(timeout))
            }
            Err(_) => {
                // A partial line may be on the pipe; the stream can't be reused.
                error!(id, method, ?timeout, "Backend stopped reading its input, stopping backend");
                self.inner.pending.remove(id);
                self.inner
                    .pending
                    .close(BridgeError::Transport("backend stopped reading requests".into()));
                self.inner.kill.notify_one();
                Err(BridgeError::Timeout(timeout))
            }
        }
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), BridgeError> {
        let mut guard = self.inner.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(BridgeError::Stopped)?;
        stdin
            .write_all(line)
            .await
            .map_err(|e| BridgeError::Transport(format!("write to backend: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| BridgeError::Transport(format!("flush backend stdin: {e}")))
    }

    /// Whether the backend is up and answering.
    pub fn alive(&self) -> bool {
        self.state() == BridgeState::Ready && !*self.inner.exited.borrow()
    }

    pub fn state(&self) -> BridgeState {
        *self.inner.state.lock()
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Calls currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.len()
    }

    /// Close stdin, kill the child and wait for it. Safe to call repeatedly.
    pub async fn stop(&self) {
        let was = std::mem::replace(&mut *self.inner.state.lock(), BridgeState::Stopped);
        if was != BridgeState::Stopped {
            info!(pid = self.inner.pid, "Stopping backend");
        }
        self.inner.pending.close(BridgeError::Stopped);
        drop(self.inner.stdin.lock().await.take());
        self.inner.kill.notify_one();

        let mut exited = self.inner.exited.clone();
        match tokio::time::timeout(STOP_WAIT, exited.wait_for(|done| *done)).await {
            Ok(_) => {}
            Err(_) => warn!(pid = self.inner.pid, "Backend did not exit in time"),
        }
    }
}

/// Route response lines to waiting calls until the stream ends or breaks.
async fn read_responses(
    stdout: ChildStdout,
    pending: Arc<PendingCalls>,
    kill: Arc<Notify>,
    max_line_bytes: usize,
    pid: Option<u32>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        match read_bounded_line(&mut reader, &mut buf, max_line_bytes).await {
            Ok(LineRead::Line(_)) => {
                if buf.trim_ascii().is_empty() {
                    continue;
                }
                match decode_response(&buf) {
                    Ok(response) => {
                        let Some(id) = response.id else {
                            // An error the backend could not tie to a request id.
                            if let Some(err) = response.error {
                                let failed = pending.fail_all(&BridgeError::Rpc {
                                    code: err.code,
                                    message: err.message,
                                });
                                warn!(pid, code = err.code, failed, "Backend error without request id");
                            } else {
                                debug!(pid, "Skipping backend notification");
                            }
                            continue;
                        };
                        let result = response.into_result().map_err(|e| BridgeError::Rpc {
                            code: e.code,
                            message: e.message,
                        });
                        if !pending.complete(id, result) {
                            debug!(pid, id, "Discarding response with no waiting call");
                        }
                    }
                    Err(e) => {
                        let failed = pending.fail_all(&BridgeError::Transport(e.to_string()));
                        warn!(pid, error = %e, failed, "Malformed line from backend");
                    }
                }
            }
            Ok(LineRead::Eof) => {
                pending.close(BridgeError::Transport("backend closed its output".into()));
                debug!(pid, "stdout reader finished");
                return;
            }
            Ok(LineRead::TooLarge) => {
                error!(pid, max_line_bytes, "Backend response line too large, stopping backend");
                pending.close(BridgeError::Transport(format!(
                    "response line exceeds {max_line_bytes} bytes"
                )));
                kill.notify_one();
                return;
            }
            Err(e) => {
                error!(pid, error = %e, "Failed to read backend output");
                pending.close(BridgeError::Transport(format!("read from backend: {e}")));
                kill.notify_one();
                return;
            }
        }
    }
}

/// Own the child until it exits or a kill is requested.
async fn monitor_exit(
    mut child: Child,
    pending: Arc<PendingCalls>,
    state: Arc<Mutex<BridgeState>>,
    kill: Arc<Notify>,
    exit_tx: watch::Sender<bool>,
) {
    let pid = child.id();
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = kill.notified() => None,
    };
    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                debug!(pid, error = %e, "Kill failed, backend may have exited already");
            }
            child.wait().await
        }
    };
    match &status {
        Ok(status) if status.success() => info!(pid, %status, "Backend exited"),
        Ok(status) => warn!(pid, %status, "Backend exited"),
        Err(e) => error!(pid, error = %e, "Failed to wait for backend"),
    }

    *state.lock() = BridgeState::Stopped;
    let reason = status.map_or_else(
        |e| format!("backend wait failed: {e}"),
        |s| format!("backend exited ({s})"),
    );
    pending.close(BridgeError::Transport(reason));
    exit_tx.send_replace(true);
}
