use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub trait Runtime {
    fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;

    /// Runs `action` once after `after`. Aborting the handle cancels it.
    fn schedule_once<A, F>(&self, after: Duration, action: F) -> JoinHandle<()>
    where
        A: Send + 'static,
        F: Future<Output = anyhow::Result<A>> + Send + 'static;
}

pub struct TokioRuntime {
    handle: Handle,
}

impl TokioRuntime {
    pub fn new(handle: Handle) -> TokioRuntime {
        TokioRuntime { handle }
    }

    /// Runtime of the calling task. Panics outside of a tokio context, like
    /// `Handle::current`.
    pub fn current() -> TokioRuntime {
        TokioRuntime::new(Handle::current())
    }
}

impl Runtime for TokioRuntime {
    fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(task)
    }

    fn schedule_once<A, F>(&self, after: Duration, action: F) -> JoinHandle<()>
    where
        A: Send + 'static,
        F: Future<Output = anyhow::Result<A>> + Send + 'static,
    {
        self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(e) = action.await {
                tracing::debug!("Scheduled action failed: {e}");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn scheduled_action_runs_after_delay_unless_aborted() {
        let runtime = TokioRuntime::current();
        let fired = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        runtime.schedule_once(Duration::from_millis(50), async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        let flag = cancelled.clone();
        let handle = runtime.schedule_once(Duration::from_millis(50), async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        handle.abort();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!cancelled.load(Ordering::SeqCst));
    }
}
