//! Bounded executor for inbound RPC calls.
//!
//! Calls run off the inbound path so a slow method never delays the next
//! envelope. At most `workers` calls run at once; the rest wait for a permit.
//! Shutdown cancels queued calls and interrupts running ones at their next
//! await point.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default number of concurrent RPC calls.
pub const DEFAULT_RPC_WORKERS: usize = 16;

/// Bounded, cancellable pool for RPC work.
#[derive(Debug)]
pub struct RpcExecutor {
    workers: usize,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl RpcExecutor {
    /// Create an executor running at most `workers` calls at once.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            permits: Arc::new(Semaphore::new(workers)),
            cancel: CancellationToken::new(),
        }
    }

    /// Queue `task`. Returns `None` once the executor is shut down.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return None;
        }
        let permits = Arc::clone(&self.permits);
        let cancel = self.cancel.clone();
        Some(tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("queued rpc call dropped on shutdown");
                    return;
                }
                permit = permits.acquire_owned() => permit.ok(),
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => debug!("running rpc call interrupted on shutdown"),
                () = task => {}
            }
        }))
    }

    /// Stop accepting work and cancel what is queued or running.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether [`RpcExecutor::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Calls currently holding a permit.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.workers - self.permits.available_permits()
    }

    /// Maximum concurrent calls.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for RpcExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let executor = RpcExecutor::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(
                executor
                    .spawn(async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        let _ = peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        let _ = running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap(),
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_and_rejects() {
        let executor = RpcExecutor::new(1);
        let finished = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&finished);
        let handle = executor
            .spawn(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let _ = done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        executor.shutdown();
        handle.await.unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(executor.is_shut_down());
        assert!(executor.spawn(async {}).is_none());
    }
}
