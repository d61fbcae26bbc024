use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const QUIET: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

struct Pending {
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

/// Runs only the most recently scheduled task, once `delay` has passed
/// without another being scheduled.
///
/// Only a task still in its quiet period is ever cancelled. Once it has
/// started it runs to completion, even if it is replaced or cancelled.
pub struct Debouncer {
    delay: Duration,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any waiting task with `task`, restarting the quiet period
    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        let state = Arc::new(AtomicU8::new(QUIET));
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_state
                .compare_exchange(QUIET, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                task.await;
            }
        });
        self.pending = Some(Pending { state, handle });
    }

    /// Drop the waiting task, if any, without running it. A task already
    /// running is left to finish.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            if pending
                .state
                .compare_exchange(QUIET, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                pending.handle.abort();
            }
        }
    }

    /// Whether the latest task is still waiting or running
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| !pending.handle.is_finished())
    }
}
