//! # Task: one-shot unit of work with an observable lifecycle.
//!
//! A [`Task`] wraps a [`Work`] implementation and drives it through an
//! explicit state machine:
//!
//! ```text
//! Created ──run()──► Running ──► Finished (terminal)
//!                      │
//!                      ├─► TaskStarted fired
//!                      ├─► setup → run → teardown   (stops at first error)
//!                      │        any Err/panic captured, never rethrown
//!                      └─► TaskFinished fired, waiters woken
//! ```
//!
//! ## Rules
//! - `Finished` is monotone: it is never reset.
//! - The captured failure is set at most once, only if the hook sequence failed.
//! - A second `run()` observes a non-`Created` state and returns immediately.
//! - Observers are fired **after** the state transition they describe, with no
//!   internal lock held.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{catch_failures, TaskError};
use crate::events::{Event, EventKind, Observe, ObserverId, Observers};
use crate::tasks::work::WorkRef;

static TASK_ID: AtomicU64 = AtomicU64::new(0);

/// Unique identity of a [`Task`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Lifecycle states of a [`Task`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Constructed, never run.
    Created,
    /// The hook sequence is executing.
    Running,
    /// The hook sequence completed; terminal.
    Finished,
}

/// One-shot unit of work with lifecycle tracking and a captured failure.
///
/// ### Responsibilities
/// - **State machine**: `Created → Running → Finished`, exposed via
///   [`state`](Task::state) and the completion waits.
/// - **Failure capture**: an `Err` or panic from any hook is stored and
///   inspectable via [`error`](Task::error); it never escapes `run`.
/// - **Events**: `TaskStarted` / `TaskFinished` delivered to registered
///   observers on the running thread.
///
/// Completion is a watch channel consumed by both observers and blocking
/// waiters, so [`wait_finished`](Task::wait_finished) is safe against
/// spurious wake-ups.
pub struct Task {
    id: TaskId,
    work: WorkRef,
    state: watch::Sender<TaskState>,
    error: Mutex<Option<Arc<TaskError>>>,
    observers: Observers,
    /// Set while some container tracks this task.
    claimed: AtomicBool,
}

impl Task {
    /// Creates a task around the given work body.
    pub fn new(work: WorkRef) -> Self {
        let (state, _) = watch::channel(TaskState::Created);
        Self {
            id: TaskId(TASK_ID.fetch_add(1, AtomicOrdering::Relaxed)),
            work,
            state,
            error: Mutex::new(None),
            observers: Observers::new(),
            claimed: AtomicBool::new(false),
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(work: WorkRef) -> Arc<Self> {
        Arc::new(Self::new(work))
    }

    /// Unique identity of this instance.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Name of the underlying work body.
    pub fn name(&self) -> &str {
        self.work.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// `true` once `run()` has been entered.
    pub fn is_started(&self) -> bool {
        self.state() != TaskState::Created
    }

    /// `true` once the hook sequence completed.
    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// The captured failure, if the hook sequence failed.
    pub fn error(&self) -> Option<Arc<TaskError>> {
        self.lock_error().clone()
    }

    /// Registers an observer for this task's lifecycle events.
    pub fn observe(&self, observer: Arc<dyn Observe>) -> ObserverId {
        self.observers.register(observer)
    }

    /// Removes a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Runs the hook sequence to completion.
    ///
    /// Fires `TaskStarted`, executes `setup → run → teardown` stopping at the
    /// first error, captures any error or panic, transitions to `Finished`,
    /// fires `TaskFinished`, and wakes every waiter. Never returns a failure:
    /// inspect [`error`](Task::error) after completion.
    ///
    /// A task runs at most once; a repeated call is a no-op.
    pub async fn run(&self, ctx: CancellationToken) {
        let mut entered = false;
        self.state.send_if_modified(|s| {
            if *s == TaskState::Created {
                *s = TaskState::Running;
                entered = true;
                true
            } else {
                false
            }
        });
        if !entered {
            return;
        }

        self.observers
            .fire(&Event::now(EventKind::TaskStarted).with_task(self.name()));

        let result = catch_failures(self.sequence(ctx)).await;

        let mut finished = Event::now(EventKind::TaskFinished).with_task(self.name());
        if let Err(err) = result {
            finished = finished.with_reason(err.as_message());
            *self.lock_error() = Some(Arc::new(err));
        }

        self.state.send_modify(|s| *s = TaskState::Finished);
        self.observers.fire(&finished);
    }

    /// Waits until the task reaches `Finished`.
    ///
    /// Returns immediately if it already has. Dropping the returned future
    /// abandons the wait without affecting the task.
    pub async fn wait_finished(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close mid-wait.
        let _ = rx.wait_for(|s| *s == TaskState::Finished).await;
    }

    /// Waits until the task reaches `Finished`, up to `timeout`.
    ///
    /// Returns `false` on expiry, `true` otherwise.
    pub async fn wait_finished_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait_finished()).await.is_ok()
    }

    /// Claims this task for a container. Fails if another container already
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

    /// Releases the container claim once the task is forgotten.
    pub(crate) fn release_claim(&self) {
        self.claimed.store(false, AtomicOrdering::Release);
    }

    async fn sequence(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.work.setup(ctx.clone()).await?;
        self.work.run(ctx.clone()).await?;
        self.work.teardown(ctx).await
    }

    fn lock_error(&self) -> MutexGuard<'_, Option<Arc<TaskError>>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Observe;
    use crate::tasks::work::WorkFn;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn ok_task(name: &'static str) -> Arc<Task> {
        Task::arc(WorkFn::arc(name, |_ctx: CancellationToken| async move {
            Ok(())
        }))
    }

    #[tokio::test]
    async fn run_moves_through_lifecycle() {
        let task = ok_task("lifecycle");
        assert_eq!(task.state(), TaskState::Created);
        assert!(!task.is_started());

        task.run(CancellationToken::new()).await;

        assert!(task.is_started());
        assert!(task.is_finished());
        assert!(task.error().is_none());
    }

    #[tokio::test]
    async fn body_error_is_captured_not_rethrown() {
        let task = Task::arc(WorkFn::arc("failing", |_ctx: CancellationToken| async {
            Err(TaskError::Fail {
                error: "boom".into(),
            })
        }));

        task.run(CancellationToken::new()).await;

        assert!(task.is_finished());
        match task.error().as_deref() {
            Some(TaskError::Fail { error }) => assert_eq!(error, "boom"),
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn body_panic_is_captured() {
        let task = Task::arc(WorkFn::arc("panicking", |_ctx: CancellationToken| async {
            panic!("kaboom")
        }));

        task.run(CancellationToken::new()).await;

        assert!(task.is_finished());
        assert!(matches!(
            task.error().as_deref(),
            Some(TaskError::Panicked { .. })
        ));
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let task = Task::arc(WorkFn::arc("once", move |_ctx: CancellationToken| {
            let h = h.clone();
            async move {
                h.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            }
        }));

        task.run(CancellationToken::new()).await;
        task.run(CancellationToken::new()).await;

        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn setup_failure_skips_body_and_teardown() {
        struct Staged {
            body_runs: AtomicUsize,
            teardown_runs: AtomicUsize,
        }

        #[async_trait]
        impl crate::tasks::work::Work for Staged {
            fn name(&self) -> &str {
                "staged"
            }

            async fn setup(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
                Err(TaskError::Fail {
                    error: "setup".into(),
                })
            }

            async fn run(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
                self.body_runs.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            }

            async fn teardown(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
                self.teardown_runs.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            }
        }

        let staged = Arc::new(Staged {
            body_runs: AtomicUsize::new(0),
            teardown_runs: AtomicUsize::new(0),
        });
        let task = Task::arc(staged.clone());
        task.run(CancellationToken::new()).await;

        assert_eq!(staged.body_runs.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(staged.teardown_runs.load(AtomicOrdering::SeqCst), 0);
        assert!(matches!(
            task.error().as_deref(),
            Some(TaskError::Fail { .. })
        ));
    }

    #[tokio::test]
    async fn wait_finished_timeout_reports_expiry() {
        let task = ok_task("waited");
        assert!(!task.wait_finished_timeout(Duration::from_millis(10)).await);

        task.run(CancellationToken::new()).await;
        assert!(task.wait_finished_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn observers_see_start_and_finish() {
        struct Kinds(Mutex<Vec<EventKind>>);
        impl Observe for Kinds {
            fn on_event(&self, event: &Event) {
                self.0.lock().unwrap().push(event.kind);
            }
        }

        let kinds = Arc::new(Kinds(Mutex::new(Vec::new())));
        let task = ok_task("observed");
        let id = task.observe(kinds.clone());

        task.run(CancellationToken::new()).await;
        assert_eq!(
            *kinds.0.lock().unwrap(),
            vec![EventKind::TaskStarted, EventKind::TaskFinished]
        );
        assert!(task.unobserve(id));
    }
}
