//! Pending correlated calls.
//!
//! Each call is removed exactly once by whichever comes first: its
//! `CallBack`, its deadline, or shutdown. Deadlines live in a single tracker
//! task backed by a [`DelayQueue`] rather than one timer task per call.

use std::future::poll_fn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bridgewire_core::{BridgeError, CallbackId, Envelope};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::{debug, trace};

/// Outcome delivered to the caller awaiting a reply.
pub type ReplyResult = Result<Envelope, BridgeError>;

struct Entry {
    tx: oneshot::Sender<ReplyResult>,
    timeout: Duration,
}

#[derive(Default)]
struct Table {
    entries: DashMap<String, Entry>,
    closed: AtomicBool,
}

impl Table {
    fn expire(&self, callback_id: &str) -> bool {
        let Some((_, entry)) = self.entries.remove(callback_id) else {
            return false;
        };
        let timeout_ms = u64::try_from(entry.timeout.as_millis()).unwrap_or(u64::MAX);
        debug!(callback_id, timeout_ms, "correlated call timed out");
        let _ = entry.tx.send(Err(BridgeError::Timeout {
            callback_id: callback_id.to_string(),
            timeout_ms,
        }));
        true
    }
}

/// Table of calls awaiting a `CallBack`.
pub struct PendingCalls {
    table: Arc<Table>,
    deadlines: mpsc::UnboundedSender<(String, Duration)>,
}

impl PendingCalls {
    /// Create the table and start its deadline tracker.
    ///
    /// The tracker stops when `cancel` fires. Must be called from within a
    /// tokio runtime.
    pub fn spawn(cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let table = Arc::new(Table::default());
        let (deadlines, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_deadline_tracker(Arc::clone(&table), rx, cancel));
        (Self { table, deadlines }, handle)
    }

    /// Register a call and return the receiver its outcome arrives on.
    ///
    /// After [`PendingCalls::fail_all`] the receiver resolves immediately
    /// with [`BridgeError::Shutdown`].
    pub fn register(&self, callback_id: &CallbackId, timeout: Duration) -> oneshot::Receiver<ReplyResult> {
        let (tx, rx) = oneshot::channel();
        if self.table.closed.load(Ordering::Acquire) {
            let _ = tx.send(Err(BridgeError::Shutdown));
            return rx;
        }

        let id = callback_id.as_str().to_string();
        let _ = self.table.entries.insert(id.clone(), Entry { tx, timeout });
        // fail_all may have drained between the check and the insert
        if self.table.closed.load(Ordering::Acquire) {
            self.cancel(&id);
            return rx;
        }
        if self.deadlines.send((id.clone(), timeout)).is_err() {
            self.cancel(&id);
        }
        trace!(callback_id = %id, ?timeout, "registered correlated call");
        rx
    }

    /// Deliver a reply. Returns `false` when no call is waiting for it.
    pub fn resolve(&self, callback_id: &str, reply: Envelope) -> bool {
        match self.table.entries.remove(callback_id) {
            Some((_, entry)) => {
                let _ = entry.tx.send(Ok(reply));
                true
            }
            None => {
                debug!(callback_id, "callback for unknown or expired call ignored");
                false
            }
        }
    }

    /// Fail one call with [`BridgeError::Timeout`]. Returns `false` if it
    /// already completed.
    pub fn expire(&self, callback_id: &str) -> bool {
        self.table.expire(callback_id)
    }

    /// Fail one call with [`BridgeError::Shutdown`].
    pub fn cancel(&self, callback_id: &str) {
        if let Some((_, entry)) = self.table.entries.remove(callback_id) {
            let _ = entry.tx.send(Err(BridgeError::Shutdown));
        }
    }

    /// Fail every call with [`BridgeError::Shutdown`] and refuse new ones.
    /// Returns the number of calls failed.
    pub fn fail_all(&self) -> usize {
        self.table.closed.store(true, Ordering::Release);
        let ids: Vec<String> = self.table.entries.iter().map(|e| e.key().clone()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, entry)) = self.table.entries.remove(&id) {
                let _ = entry.tx.send(Err(BridgeError::Shutdown));
                failed += 1;
            }
        }
        failed
    }

    /// Whether a call is waiting under `callback_id`.
    #[must_use]
    pub fn contains(&self, callback_id: &str) -> bool {
        self.table.entries.contains_key(callback_id)
    }

    /// Number of calls waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    /// Whether no call is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }
}

impl std::fmt::Debug for PendingCalls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCalls")
            .field("pending", &self.len())
            .field("closed", &self.table.closed.load(Ordering::Relaxed))
            .finish()
    }
}

async fn run_deadline_tracker(
    table: Arc<Table>,
    mut rx: mpsc::UnboundedReceiver<(String, Duration)>,
    cancel: CancellationToken,
) {
    let mut queue: DelayQueue<String> = DelayQueue::new();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(tracked = queue.len(), "deadline tracker stopped");
                break;
            }
            registration = rx.recv() => match registration {
                Some((id, timeout)) => {
                    let _ = queue.insert(id, timeout);
                }
                None => break,
            },
            Some(expired) = poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                let _ = table.expire(expired.get_ref());
            }
        }
    }
}
