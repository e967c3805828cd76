//! # Lifetime-limited recurrence.
//!
//! [`BoundedRecur`] forces a recurrence to report terminal once a wall-clock
//! deadline or an iteration ceiling is reached, without touching the wrapped
//! recurrence's own computation. Composition-time decorator: wrap before
//! constructing the [`Plan`](crate::Plan).
//!
//! ## Rules
//! - A due time the delegate computes **past** the deadline is also terminal:
//!   the plan never starts a run it could not have started in time.
//! - The iteration ceiling counts started runs: `max_runs = n` allows exactly
//!   `n` iterations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::plans::recur::{Recur, RecurRef};

/// Recurrence decorator bounding the delegate's lifetime.
pub struct BoundedRecur {
    inner: RecurRef,
    deadline: Option<Instant>,
    max_runs: Option<u64>,
}

impl BoundedRecur {
    /// Wraps `inner` with no bounds yet; combine with
    /// [`with_deadline`](Self::with_deadline) and/or
    /// [`with_max_runs`](Self::with_max_runs).
    pub fn new(inner: RecurRef) -> Self {
        Self {
            inner,
            deadline: None,
            max_runs: None,
        }
    }

    /// Terminal once the next due time would land past `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Terminal after `max_runs` started iterations.
    pub fn with_max_runs(mut self, max_runs: u64) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Returns the decorator as a shared handle.
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn clamp(&self, at: Instant) -> Option<Instant> {
        match self.deadline {
            Some(deadline) if at > deadline => None,
            _ => Some(at),
        }
    }
}

#[async_trait]
impl Recur for BoundedRecur {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.inner.run(ctx).await
    }

    fn first_run_time(&self, now: Instant) -> Option<Instant> {
        if self.max_runs == Some(0) {
            return None;
        }
        self.clamp(self.inner.first_run_time(now)?)
    }

    fn next_run_time(&self, iteration: u64, expected: Instant, actual: Instant) -> Option<Instant> {
        if let Some(max) = self.max_runs {
            if iteration >= max {
                return None;
            }
        }
        self.clamp(self.inner.next_run_time(iteration, expected, actual)?)
    }
}
