use super::Disposable;
use futures::Future;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};

/// Execution context for asynchronous producers and timers.
///
/// This is a thin wrapper around a tokio runtime handle. Work scheduled here is
/// cancelled by disposing the returned handle.
#[derive(Clone, Debug)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// The scheduler of the runtime the caller is running on.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Run a future to completion on this scheduler.
    pub fn spawn<F>(&self, future: F) -> Disposable
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = self.handle.spawn(future);
        Disposable::new(move || task.abort())
    }

    /// Run an action once after the given delay.
    pub fn schedule_after<F>(&self, delay: Duration, action: F) -> Disposable
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        })
    }
}
