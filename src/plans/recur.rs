//! # Recurrence abstraction and a fixed-period implementation.
//!
//! This module defines the [`Recur`] trait — the pluggable part of a
//! [`Plan`](crate::Plan): the async body plus the function that computes each
//! following run time. The common handle type is [`RecurRef`].
//!
//! `None` is the terminal sentinel: a recurrence that returns it will never
//! run again and its plan is dropped by the [`Timer`](crate::Timer).

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a recurrence implementation.
pub type RecurRef = Arc<dyn Recur>;

/// # Recurring unit body plus its own schedule.
///
/// A `Recur` decides when it runs: [`first_run_time`](Recur::first_run_time)
/// seeds the plan at construction, and after each run starts,
/// [`next_run_time`](Recur::next_run_time) computes the following due time.
/// Returning `None` from either ends the recurrence.
///
/// ## Contract
/// The value returned by `next_run_time` must stay stable between runs — the
/// [`Timer`](crate::Timer) relies on it while deciding scheduling order. Both
/// schedule methods must be cheap and side-effect free.
#[async_trait]
pub trait Recur: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Executes one iteration of the body.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;

    /// The due time of the first run, given the construction instant.
    /// `None` means the plan is terminal from the start.
    fn first_run_time(&self, now: Instant) -> Option<Instant>;

    /// The due time following the run that is starting now.
    ///
    /// - `iteration`: 1-based counter of the run being started
    /// - `expected`: the due time the previous cycle computed for this run
    /// - `actual`: the instant the run actually started
    ///
    /// `None` stops all future runs.
    fn next_run_time(&self, iteration: u64, expected: Instant, actual: Instant) -> Option<Instant>;
}

/// Function-backed fixed-period recurrence.
///
/// Runs the wrapped closure with a constant period measured between run
/// *starts*; a slow body therefore does not stretch the schedule, although the
/// scheduler runs iterations strictly one after another. The first run is due
/// one initial delay after construction (the period, unless overridden with
/// [`Every::with_delay`]).
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use taskplan::{Every, TaskError};
///
/// let every = Every::new("heartbeat", Duration::from_secs(30), |_ctx: CancellationToken| async {
///     // emit heartbeat...
///     Ok::<_, TaskError>(())
/// })
/// .with_delay(Duration::ZERO);
/// ```
#[derive(Debug)]
pub struct Every<F> {
    name: Cow<'static, str>,
    period: Duration,
    delay: Duration,
    f: F,
}

impl<F> Every<F> {
    /// Creates a fixed-period recurrence; the first run is due after one
    /// period.
    pub fn new(name: impl Into<Cow<'static, str>>, period: Duration, f: F) -> Self {
        Self {
            name: name.into(),
            period,
            delay: period,
            f,
        }
    }

    /// Creates the recurrence and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, period: Duration, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, period, f))
    }

    /// Overrides the delay before the first run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl<F, Fut> Recur for Every<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }

    fn first_run_time(&self, now: Instant) -> Option<Instant> {
        Some(now + self.delay)
    }

    fn next_run_time(
        &self,
        _iteration: u64,
        _expected: Instant,
        actual: Instant,
    ) -> Option<Instant> {
        Some(actual + self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every(period_ms: u64) -> Every<impl Fn(CancellationToken) -> futures::future::Ready<Result<(), TaskError>> + Send + Sync>
    {
        Every::new("t", Duration::from_millis(period_ms), |_ctx| {
            futures::future::ready(Ok(()))
        })
    }

    #[tokio::test]
    async fn first_run_is_one_period_out_by_default() {
        let e = every(250);
        let now = Instant::now();
        assert_eq!(e.first_run_time(now), Some(now + Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn delay_override_shifts_only_the_first_run() {
        let e = every(250).with_delay(Duration::ZERO);
        let now = Instant::now();
        assert_eq!(e.first_run_time(now), Some(now));
        assert_eq!(
            e.next_run_time(1, now, now),
            Some(now + Duration::from_millis(250))
        );
    }

    #[tokio::test]
    async fn period_is_anchored_at_the_actual_start() {
        let e = every(100);
        let expected = Instant::now();
        let actual = expected + Duration::from_millis(40); // started late
        assert_eq!(
            e.next_run_time(3, expected, actual),
            Some(actual + Duration::from_millis(100))
        );
    }
}
