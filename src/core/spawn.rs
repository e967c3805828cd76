//! # Executor capability consumed by [`Background`](crate::Background).
//!
//! [`Spawn`] abstracts "accept a work item for asynchronous execution". The
//! pool makes no assumption about thread count or fairness: whether submitted
//! tasks run concurrently with each other is entirely the executor's policy.
//!
//! The executor is passed explicitly at construction — there is no
//! process-wide default instance.

use std::sync::Arc;

use futures::future::BoxFuture;

/// Shared handle to an executor.
pub type SpawnRef = Arc<dyn Spawn>;

/// Accepts a work item for asynchronous execution.
pub trait Spawn: Send + Sync + 'static {
    /// Dispatches `work`; must not block the caller.
    fn spawn(&self, work: BoxFuture<'static, ()>);
}

/// Executor backed by the ambient tokio runtime.
///
/// Must be used from within a runtime; concurrency is whatever the runtime
/// provides (a `current_thread` runtime interleaves, a multi-thread runtime
/// runs tasks in parallel).
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSpawner;

impl Spawn for TokioSpawner {
    fn spawn(&self, work: BoxFuture<'static, ()>) {
        tokio::spawn(work);
    }
}
