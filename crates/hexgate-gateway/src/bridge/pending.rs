//! Calls awaiting a response line, keyed by JSON-RPC id.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use super::error::BridgeError;

pub type CallResult = Result<Value, BridgeError>;

#[derive(Default)]
struct PendingState {
    calls: HashMap<u64, oneshot::Sender<CallResult>>,
    /// Set once the transport is gone; later registrations fail with it.
    closed: Option<BridgeError>,
}

/// Id-keyed table of in-flight calls.
#[derive(Default)]
pub struct PendingCalls {
    state: Mutex<PendingState>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and get the receiver for its result.
    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<CallResult>, BridgeError> {
        let mut state = self.state.lock();
        if let Some(err) = &state.closed {
            return Err(err.clone());
        }
        let (tx, rx) = oneshot::channel();
        state.calls.insert(id, tx);
        Ok(rx)
    }

    /// Deliver a result. Returns `false` if no call is waiting on `id`
    /// (timed out, or an id the gateway never issued).
    pub fn complete(&self, id: u64, result: CallResult) -> bool {
        let Some(tx) = self.state.lock().calls.remove(&id) else {
            return false;
        };
        if tx.send(result).is_err() {
            debug!(id, "Caller gone before response arrived");
        }
        true
    }

    /// Forget a call without delivering anything.
    pub fn remove(&self, id: u64) {
        self.state.lock().calls.remove(&id);
    }

    /// Fail every waiting call with `err`; the table stays open.
    pub fn fail_all(&self, err: &BridgeError) -> usize {
        let drained: Vec<_> = self.state.lock().calls.drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(err.clone()));
        }
        count
    }

    /// Fail every waiting call and refuse new ones. The first close wins.
    pub fn close(&self, err: BridgeError) -> usize {
        {
            let mut state = self.state.lock();
            if state.closed.is_none() {
                state.closed = Some(err.clone());
            }
        }
        self.fail_all(&err)
    }

    pub fn len(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
