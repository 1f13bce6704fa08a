//! Bounded, non-blocking usage recording.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hexgate_core::usage::UsageEvent;

use super::metering::UsageSink;

/// Hands usage events to a single background worker.
///
/// `record` never waits: when the queue is full the new event is dropped and
/// counted.
pub struct UsageRecorder {
    tx: Mutex<Option<mpsc::Sender<UsageEvent>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl UsageRecorder {
    pub fn spawn(sink: Arc<dyn UsageSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<UsageEvent>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.record(&event).await {
                    warn!(tool = %event.tool_name, caller = %event.caller, error = %e, "Usage recording failed");
                }
            }
            debug!("Usage recorder drained");
        });
        Self {
            tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue an event. Returns `false` if it was dropped.
    pub fn record(&self, event: UsageEvent) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            debug!(tool = %event.tool_name, "Usage recorder closed, event dropped");
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(tool = %event.tool_name, dropped_total = total, "Usage queue full, event dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(tool = %event.tool_name, "Usage worker gone, event dropped");
                false
            }
        }
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting events and wait for the queued ones to be sent.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Usage worker ended abnormally");
            }
            info!(dropped = self.dropped(), "Usage recorder stopped");
        }
    }
}
