//! # Dependency-blocked work.
//!
//! [`DependentWork`] gates a work body behind a list of prerequisite
//! [`Task`]s: the wrapped hook sequence starts only after every prerequisite
//! reports finished. It is a composition-time decorator — the resulting unit
//! is an ordinary [`Task`] and is submitted to a
//! [`Background`](crate::Background) like any other.
//!
//! ## Rules
//! - Prerequisites are awaited one by one, in the order given.
//! - Cancellation while waiting surfaces as [`TaskError::Canceled`], which is
//!   distinct from a body failure.
//! - Prerequisite *outcomes* are not inspected: a failed prerequisite still
//!   counts as finished. Inspect the prerequisites yourself if their results
//!   matter.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::Task;
use crate::tasks::work::{Work, WorkRef};

/// Work decorator that waits for prerequisite tasks before delegating.
pub struct DependentWork {
    inner: WorkRef,
    prerequisites: Vec<Arc<Task>>,
}

impl DependentWork {
    /// Wraps `inner` so its hook sequence starts only after every task in
    /// `prerequisites` finished.
    pub fn new(inner: WorkRef, prerequisites: Vec<Arc<Task>>) -> Self {
        Self {
            inner,
            prerequisites,
        }
    }

    /// Creates the decorator and returns it as a shared handle.
    pub fn arc(inner: WorkRef, prerequisites: Vec<Arc<Task>>) -> Arc<Self> {
        Arc::new(Self::new(inner, prerequisites))
    }
}

#[async_trait]
impl Work for DependentWork {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn setup(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        for dep in &self.prerequisites {
            tokio::select! {
                _ = dep.wait_finished() => {}
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
            }
        }
        self.inner.setup(ctx).await
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.inner.run(ctx).await
    }

    async fn teardown(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.inner.teardown(ctx).await
    }
}
