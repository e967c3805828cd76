//! # Lifecycle events emitted by units and containers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Unit events**: a task or plan moving through its lifecycle
//!   (started, finished, run).
//! - **Container events**: membership changes in a [`Background`](crate::Background)
//!   or [`Timer`](crate::Timer) (submitted, scheduled, removed, cleared).
//! - **Terminal events**: container shutdown and termination.
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! unit name, iteration counters, and the expected/actual run instants of a
//! plan execution.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events from
//! different components are interleaved.
//!
//! ## Example
//! ```rust
//! use taskplan::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::PlanFinished)
//!     .with_task("refresh-cache")
//!     .with_iteration(3);
//!
//! assert_eq!(ev.kind, EventKind::PlanFinished);
//! assert_eq!(ev.task.as_deref(), Some("refresh-cache"));
//! assert_eq!(ev.iteration, Some(3));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::time::Instant;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle ===
    /// A task began its hook sequence.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskStarted,

    /// A task completed its hook sequence (successfully or with a captured
    /// failure; inspect the task for the failure).
    ///
    /// Sets:
    /// - `task`: task name
    /// - `reason`: failure message, only when the hook sequence failed
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskFinished,

    // === Background membership ===
    /// A task was accepted by a [`Background`](crate::Background).
    ///
    /// Sets:
    /// - `task`: task name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskSubmitted,

    /// A finished task was forgotten by its [`Background`](crate::Background).
    ///
    /// Sets:
    /// - `task`: task name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskRemoved,

    // === Plan lifecycle ===
    /// A plan iteration is starting on the scheduler thread.
    ///
    /// Sets:
    /// - `task`: plan name
    /// - `iteration`: 1-based run counter
    /// - `expected`: the run time computed by the previous cycle
    /// - `actual`: the instant the run actually started
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PlanRun,

    /// A plan iteration finished (successfully or with a captured failure).
    ///
    /// Sets:
    /// - `task`: plan name
    /// - `iteration`: 1-based run counter
    /// - `reason`: failure message, only when the body failed
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PlanFinished,

    // === Timer membership ===
    /// A plan was accepted by a [`Timer`](crate::Timer).
    ///
    /// Sets:
    /// - `task`: plan name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PlanScheduled,

    /// A plan left its [`Timer`](crate::Timer): explicit removal, a terminal
    /// next-run time, or discard during shutdown.
    ///
    /// Sets:
    /// - `task`: plan name
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PlanRemoved,

    /// Every scheduled plan was removed at once via
    /// [`Timer::clear`](crate::Timer::clear).
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    Cleared,

    // === Container terminal states ===
    /// Shutdown was requested on the container.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ShutdownRequested,

    /// The container finished its last unit after shutdown and will never
    /// run anything again. Fired exactly once.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    Terminated,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task or plan, if applicable.
    pub task: Option<Arc<str>>,
    /// 1-based run counter of a plan iteration.
    pub iteration: Option<u64>,
    /// Human-readable reason (captured failure messages, etc.).
    pub reason: Option<Arc<str>>,
    /// The run time the previous cycle computed for this iteration.
    pub expected: Option<Instant>,
    /// The instant the iteration actually started.
    pub actual: Option<Instant>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            iteration: None,
            reason: None,
            expected: None,
            actual: None,
        }
    }

    /// Attaches a task or plan name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a 1-based iteration counter.
    #[inline]
    pub fn with_iteration(mut self, n: u64) -> Self {
        self.iteration = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the expected run instant of a plan iteration.
    #[inline]
    pub fn with_expected(mut self, at: Instant) -> Self {
        self.expected = Some(at);
        self
    }

    /// Attaches the actual start instant of a plan iteration.
    #[inline]
    pub fn with_actual(mut self, at: Instant) -> Self {
        self.actual = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::now(EventKind::TaskStarted);
        let b = Event::now(EventKind::TaskFinished);
        let c = Event::now(EventKind::Terminated);
        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = Event::now(EventKind::PlanRun)
            .with_task("p")
            .with_iteration(7)
            .with_reason("late");
        assert_eq!(ev.task.as_deref(), Some("p"));
        assert_eq!(ev.iteration, Some(7));
        assert_eq!(ev.reason.as_deref(), Some("late"));
    }
}
