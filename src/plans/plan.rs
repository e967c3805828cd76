//! # Plan: recurring unit of work with run-count and failure bookkeeping.
//!
//! A [`Plan`] wraps a [`Recur`] and persists across many runs:
//!
//! ```text
//! run() (on the Timer's scheduler thread):
//!   ├─► expected = next_run          (computed by the previous cycle)
//!   ├─► actual   = now
//!   ├─► next_run = recur.next_run_time(...)    (None ⇒ never again)
//!   ├─► running  = true,  PlanRun fired (iteration, expected, actual)
//!   ├─► body executes; Err/panic captured as last_error, never rethrown
//!   └─► running  = false, finished_count += 1, PlanFinished fired,
//!       wait_finished waiters woken
//! ```
//!
//! ## Rules
//! - `next_run` is stable between completed runs: it changes only as a side
//!   effect of `run()`.
//! - `run()` at a terminal `next_run` is a programmer error and panics; the
//!   [`Timer`](crate::Timer) never admits a terminal plan.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{catch_failures, TaskError};
use crate::events::{Event, EventKind, Observe, ObserverId, Observers};
use crate::plans::recur::RecurRef;

static PLAN_ID: AtomicU64 = AtomicU64::new(0);

/// Unique identity of a [`Plan`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(u64);

/// Bookkeeping guarded by the plan's lock.
#[derive(Debug)]
struct Bookkeeping {
    running: bool,
    expected: Option<Instant>,
    actual: Option<Instant>,
    next_run: Option<Instant>,
    finished_count: u64,
    last_error: Option<Arc<TaskError>>,
    error_count: u64,
}

/// Recurring unit of work.
///
/// ### Responsibilities
/// - **Schedule bookkeeping**: expected/actual run instants and the next due
///   time, seeded from [`Recur::first_run_time`](crate::Recur::first_run_time)
///   at construction.
/// - **Failure history**: the most recent captured failure plus a running
///   count; a failing iteration never stops future iterations.
/// - **Events**: `PlanRun` / `PlanFinished` delivered to registered observers
///   on the scheduler thread.
pub struct Plan {
    id: PlanId,
    recur: RecurRef,
    book: Mutex<Bookkeeping>,
    observers: Observers,
    /// Completed-run counter; waiters watch it grow.
    finished: watch::Sender<u64>,
    /// Set while some container tracks this plan.
    claimed: std::sync::atomic::AtomicBool,
}

impl Plan {
    /// Creates a plan around the given recurrence, seeding its first due time.
    pub fn new(recur: RecurRef) -> Self {
        let next_run = recur.first_run_time(Instant::now());
        let (finished, _) = watch::channel(0);
        Self {
            id: PlanId(PLAN_ID.fetch_add(1, AtomicOrdering::Relaxed)),
            recur,
            book: Mutex::new(Bookkeeping {
                running: false,
                expected: None,
                actual: None,
                next_run,
                finished_count: 0,
                last_error: None,
                error_count: 0,
            }),
            observers: Observers::new(),
            finished,
            claimed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Creates the plan and returns it as a shared handle.
    pub fn arc(recur: RecurRef) -> Arc<Self> {
        Arc::new(Self::new(recur))
    }

    /// Unique identity of this instance.
    pub fn id(&self) -> PlanId {
        self.id
    }

    /// Name of the underlying recurrence.
    pub fn name(&self) -> &str {
        self.recur.name()
    }

    /// `true` while an iteration is executing.
    pub fn is_running(&self) -> bool {
        self.lock_book().running
    }

    /// The due time the previous cycle computed for the most recent run.
    pub fn expected_run_time(&self) -> Option<Instant> {
        self.lock_book().expected
    }

    /// The instant the most recent run actually started.
    pub fn actual_run_time(&self) -> Option<Instant> {
        self.lock_book().actual
    }

    /// The next due time; `None` means the plan will never run again.
    pub fn next_run(&self) -> Option<Instant> {
        self.lock_book().next_run
    }

    /// Number of completed iterations.
    pub fn finished_count(&self) -> u64 {
        self.lock_book().finished_count
    }

    /// The most recent captured failure, if any iteration failed.
    pub fn last_error(&self) -> Option<Arc<TaskError>> {
        self.lock_book().last_error.clone()
    }

    /// Number of failed iterations.
    pub fn error_count(&self) -> u64 {
        self.lock_book().error_count
    }

    /// Registers an observer for this plan's lifecycle events.
    pub fn observe(&self, observer: Arc<dyn Observe>) -> ObserverId {
        self.observers.register(observer)
    }

    /// Removes a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Runs one iteration.
    ///
    /// Called by the [`Timer`](crate::Timer) scheduler thread; the following
    /// due time is computed **before** the body runs, so a slow body does not
    /// shift the value the scheduler reads afterwards.
    ///
    /// # Panics
    /// Panics if `next_run` is terminal — invoking a dead plan is a
    /// programmer error, not a recoverable condition.
    pub async fn run(&self, ctx: CancellationToken) {
        let (iteration, expected, actual) = {
            let mut book = self.lock_book();
            let expected = book
                .next_run
                .expect("plan invoked past its terminal next-run time");
            let actual = Instant::now();
            let iteration = book.finished_count + 1;
            book.expected = Some(expected);
            book.actual = Some(actual);
            book.next_run = self.recur.next_run_time(iteration, expected, actual);
            book.running = true;
            (iteration, expected, actual)
        };

        self.observers.fire(
            &Event::now(EventKind::PlanRun)
                .with_task(self.name())
                .with_iteration(iteration)
                .with_expected(expected)
                .with_actual(actual),
        );

        let result = catch_failures(self.recur.run(ctx)).await;

        let mut event = Event::now(EventKind::PlanFinished)
            .with_task(self.name())
            .with_iteration(iteration);
        {
            let mut book = self.lock_book();
            book.running = false;
            book.finished_count += 1;
            if let Err(err) = result {
                event = event.with_reason(err.as_message());
                book.error_count += 1;
                book.last_error = Some(Arc::new(err));
            }
        }

        self.finished.send_modify(|n| *n += 1);
        self.observers.fire(&event);
    }

    /// Waits until one more iteration completes.
    ///
    /// Counts from the moment of the call: an iteration already in flight
    /// satisfies the wait when it finishes.
    pub async fn wait_finished(&self) {
        let mut rx = self.finished.subscribe();
        let seen = *rx.borrow();
        // The sender lives in `self`, so the channel cannot close mid-wait.
        let _ = rx.wait_for(|n| *n > seen).await;
    }

    /// Waits until one more iteration completes, up to `timeout`.
    ///
    /// Returns `false` on expiry, `true` otherwise.
    pub async fn wait_finished_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait_finished()).await.is_ok()
    }

    /// Claims this plan for a container. Fails if another container already
    /// tracks it.
    pub(crate) fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(
                false,
                true,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            )
            .is_ok()
    }

    /// Releases the container claim once the plan is forgotten.
    pub(crate) fn release_claim(&self) {
        self.claimed.store(false, AtomicOrdering::Release);
    }

    fn lock_book(&self) -> MutexGuard<'_, Bookkeeping> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
