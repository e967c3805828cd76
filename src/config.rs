//! # Scheduler configuration.
//!
//! Provides [`TimerConfig`], the settings consumed by [`Timer`](crate::Timer)
//! at construction. Executor selection for [`Background`](crate::Background)
//! is injected separately via the [`Spawn`](crate::Spawn) trait; there is no
//! process-wide default.

use std::time::Duration;

/// Configuration for the [`Timer`](crate::Timer) scheduler loop.
///
/// ## Field semantics
/// - `min_run_period`: floor slept after every executed plan before the loop
///   inspects the queue again. Bounds tight loops when a plan reschedules
///   itself at (or before) the current time. `Duration::ZERO` disables the
///   floor entirely.
#[derive(Clone, Copy, Debug)]
pub struct TimerConfig {
    /// Minimum pause between two consecutive plan executions on the
    /// scheduler thread.
    pub min_run_period: Duration,
}

impl Default for TimerConfig {
    /// Returns a configuration with:
    ///
    /// - `min_run_period = 10ms`
    fn default() -> Self {
        Self {
            min_run_period: Duration::from_millis(10),
        }
    }
}
