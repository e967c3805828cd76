//! # Read-only views over the containers.
//!
//! [`ReadOnlyBackground`] and [`ReadOnlyTimer`] wrap a shared container and
//! pass every query through unchanged while rejecting every mutation with
//! [`RuntimeError::ReadOnly`]. They are plain wrappers, not snapshots: a
//! query always reflects the wrapped container's current state.
//!
//! ## Rules
//! - Mutators fail fast with `ReadOnly` and never touch the container, even
//!   when the mutation would have been a no-op.
//! - Observer registration counts as a query: handing a component a read-only
//!   view still lets it watch events, it just cannot steer the container.

use std::sync::Arc;
use std::time::Duration;

use crate::core::background::Background;
use crate::core::timer::Timer;
use crate::error::RuntimeError;
use crate::events::{Observe, ObserverId};
use crate::plans::Plan;
use crate::tasks::Task;

/// Query-only view over a [`Background`] pool.
#[derive(Clone)]
pub struct ReadOnlyBackground {
    inner: Arc<Background>,
}

impl ReadOnlyBackground {
    /// Wraps a pool. The underlying pool stays fully operational through its
    /// own handle.
    pub fn new(inner: Arc<Background>) -> Self {
        Self { inner }
    }

    /// Rejected: read-only views cannot submit work.
    pub fn submit(&self, _task: &Arc<Task>) -> Result<bool, RuntimeError> {
        Err(RuntimeError::ReadOnly)
    }

    /// Rejected: read-only views cannot shut the pool down.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::ReadOnly)
    }

    /// `true` once shutdown was requested on the underlying pool.
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// `true` once the underlying pool has fully terminated.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    /// Waits until the underlying pool terminates.
    pub async fn wait_terminated(&self) {
        self.inner.wait_terminated().await;
    }

    /// Waits until the underlying pool terminates, up to `timeout`.
    pub async fn wait_terminated_timeout(&self, timeout: Duration) -> bool {
        self.inner.wait_terminated_timeout(timeout).await
    }

    /// Snapshot of the currently active tasks.
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.inner.tasks()
    }

    /// Registers an observer on the underlying pool.
    pub fn observe(&self, observer: Arc<dyn Observe>) -> ObserverId {
        self.inner.observe(observer)
    }

    /// Removes a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.unobserve(id)
    }
}

/// Query-only view over a [`Timer`].
#[derive(Clone)]
pub struct ReadOnlyTimer {
    inner: Arc<Timer>,
}

impl ReadOnlyTimer {
    /// Wraps a timer. The underlying timer stays fully operational through
    /// its own handle.
    pub fn new(inner: Arc<Timer>) -> Self {
        Self { inner }
    }

    /// Rejected: read-only views cannot schedule plans.
    pub fn schedule(&self, _plan: &Arc<Plan>) -> Result<bool, RuntimeError> {
        Err(RuntimeError::ReadOnly)
    }

    /// Rejected: read-only views cannot remove plans.
    pub fn remove(&self, _plan: &Arc<Plan>) -> Result<bool, RuntimeError> {
        Err(RuntimeError::ReadOnly)
    }

    /// Rejected: read-only views cannot clear the timer.
    pub fn clear(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::ReadOnly)
    }

    /// Rejected: read-only views cannot shut the timer down.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::ReadOnly)
    }

    /// `true` once shutdown was requested on the underlying timer.
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// `true` once the underlying timer has terminated.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    /// Waits until the underlying timer terminates.
    pub async fn wait_terminated(&self) {
        self.inner.wait_terminated().await;
    }

    /// Waits until the underlying timer terminates, up to `timeout`.
    pub async fn wait_terminated_timeout(&self, timeout: Duration) -> bool {
        self.inner.wait_terminated_timeout(timeout).await
    }

    /// Snapshot of the tracked plans, in admission order.
    pub fn plans(&self) -> Vec<Arc<Plan>> {
        self.inner.plans()
    }

    /// Registers an observer on the underlying timer.
    pub fn observe(&self, observer: Arc<dyn Observe>) -> ObserverId {
        self.inner.observe(observer)
    }

    /// Removes a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.unobserve(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;
    use crate::core::spawn::TokioSpawner;
    use crate::error::TaskError;
    use crate::plans::Every;
    use crate::tasks::WorkFn;

    #[tokio::test]
    async fn background_view_rejects_mutations_but_answers_queries() {
        let pool = Background::new(Arc::new(TokioSpawner));
        let view = ReadOnlyBackground::new(Arc::clone(&pool));

        let task = Arc::new(Task::new(WorkFn::arc("noop", |_ctx| async {
            Ok::<_, TaskError>(())
        })));
        assert_eq!(view.submit(&task), Err(RuntimeError::ReadOnly));
        assert_eq!(view.shutdown(), Err(RuntimeError::ReadOnly));
        assert!(view.tasks().is_empty());
        assert!(!view.is_shutdown());

        // The rejected shutdown left the pool untouched.
        assert_eq!(pool.submit(&task), Ok(true));
        task.wait_finished().await;

        pool.shutdown();
        assert!(view.wait_terminated_timeout(Duration::from_secs(5)).await);
        assert!(view.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_view_rejects_mutations_but_answers_queries() {
        let timer = Timer::new(TimerConfig::default());
        let view = ReadOnlyTimer::new(Arc::clone(&timer));

        let plan = Plan::arc(Every::arc("tick", Duration::from_secs(60), |_ctx| {
            async { Ok(()) }
        }));
        assert_eq!(view.schedule(&plan), Err(RuntimeError::ReadOnly));
        assert_eq!(view.remove(&plan), Err(RuntimeError::ReadOnly));
        assert_eq!(view.clear(), Err(RuntimeError::ReadOnly));
        assert_eq!(view.shutdown(), Err(RuntimeError::ReadOnly));
        assert!(view.plans().is_empty());

        assert_eq!(timer.schedule(&plan), Ok(true));
        assert_eq!(view.plans().len(), 1);

        timer.shutdown();
        assert!(view.wait_terminated_timeout(Duration::from_secs(5)).await);
        assert!(view.is_shutdown());
        assert!(view.is_terminated());
    }
}
