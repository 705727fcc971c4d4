//! Bounded background task execution.

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::warn;

/// Submit-and-forget execution of background work.
pub trait TaskExecutor: Send + Sync {
    fn submit(&self, task: BoxFuture<'static, ()>);
}

/// Runs tasks on a tokio runtime, at most `max_concurrent` at a time.
///
/// Tasks beyond the limit wait for a permit; submission never blocks.
pub struct BoundedExecutor {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl BoundedExecutor {
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Executor on the runtime of the calling task.
    pub fn current(max_concurrent: usize) -> Self {
        Self::new(Handle::current(), max_concurrent)
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl TaskExecutor for BoundedExecutor {
    fn submit(&self, task: BoxFuture<'static, ()>) {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Task executor closed, dropping task");
                    return;
                }
            };
            task.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_submitted_tasks() {
        let executor = BoundedExecutor::current(2);
        let (tx, rx) = tokio::sync::oneshot::channel();

        executor.submit(
            async move {
                let _ = tx.send(42);
            }
            .boxed(),
        );

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let executor = BoundedExecutor::current(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::channel(8);

        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let done_tx = done_tx.clone();
            executor.submit(
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    let _ = done_tx.send(()).await;
                }
                .boxed(),
            );
        }

        for _ in 0..6 {
            done_rx.recv().await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
