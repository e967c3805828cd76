//! # Background: task pool with pooled dispatch and lifecycle tracking.
//!
//! The [`Background`] accepts [`Task`]s, dispatches them to a pluggable
//! executor ([`Spawn`]), tracks the active set, and manages the
//! shutdown/termination protocol.
//!
//! ## Architecture
//! ```text
//! submit(task)
//!   ├─► reject: Err(ShutDown) after shutdown; Ok(false) for finished,
//!   │           duplicate, or otherwise-claimed tasks
//!   ├─► attach inspector (task observer → pool events)
//!   ├─► record in the active set
//!   ├─► dispatch task.run() to the executor
//!   └─► fire TaskSubmitted
//!
//! inspector, on TaskFinished:
//!   ├─► forward TaskStarted/TaskFinished to pool observers
//!   ├─► remove from the active set, detach, fire TaskRemoved
//!   └─► shutdown requested && set now empty ⇒ terminated (exactly once)
//! ```
//!
//! ## Rules
//! - A task is tracked by at most one pool at a time; double submission is
//!   rejected with `Ok(false)`, never an error.
//! - `shutdown()` with an empty active set flips `terminated` synchronously,
//!   before it returns; otherwise the last finishing inspector flips it.
//! - A task-body failure never aborts the pool; inspect the task afterwards.
//! - Inspector callbacks acquire the **pool's** lock, never a task lock, so
//!   there is a single lock-acquisition order across components.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::spawn::SpawnRef;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind, Observe, ObserverId, Observers};
use crate::tasks::{Task, TaskId};

/// A tracked task plus the inspector registered on it.
struct ActiveTask {
    task: Arc<Task>,
    inspector: ObserverId,
}

/// State guarded by the pool's lock.
struct PoolState {
    active: HashMap<TaskId, ActiveTask>,
    shutdown: bool,
}

/// Pool dispatching one-shot tasks to an executor and tracking their
/// lifecycle through to termination.
pub struct Background {
    spawner: SpawnRef,
    state: Mutex<PoolState>,
    observers: Observers,
    terminated: watch::Sender<bool>,
    /// Root token; each dispatched task receives a child of it.
    token: CancellationToken,
}

impl Background {
    /// Creates a pool delegating execution to `spawner`.
    pub fn new(spawner: SpawnRef) -> Arc<Self> {
        let (terminated, _) = watch::channel(false);
        Arc::new(Self {
            spawner,
            state: Mutex::new(PoolState {
                active: HashMap::new(),
                shutdown: false,
            }),
            observers: Observers::new(),
            terminated,
            token: CancellationToken::new(),
        })
    }

    /// Registers an observer for pool-level events.
    pub fn observe(&self, observer: Arc<dyn Observe>) -> ObserverId {
        self.observers.register(observer)
    }

    /// Removes a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Submits a task for execution.
    ///
    /// - `Err(RuntimeError::ShutDown)` once the pool is shut down.
    /// - `Ok(false)` (no error) for a task that already finished, is already
    ///   tracked here, or is claimed by another container.
    /// - `Ok(true)` exactly once per task: the inspector is attached, the
    ///   task recorded, its `run` dispatched to the executor, and
    ///   `TaskSubmitted` fired.
    pub fn submit(self: &Arc<Self>, task: &Arc<Task>) -> Result<bool, RuntimeError> {
        {
            let mut state = self.lock_state();
            if state.shutdown {
                return Err(RuntimeError::ShutDown);
            }
            if task.is_finished() || state.active.contains_key(&task.id()) {
                return Ok(false);
            }
            if !task.try_claim() {
                return Ok(false);
            }

            let inspector = task.observe(Arc::new(Inspector {
                pool: Arc::downgrade(self),
                task_id: task.id(),
            }));
            state.active.insert(
                task.id(),
                ActiveTask {
                    task: Arc::clone(task),
                    inspector,
                },
            );
        }

        let runner = Arc::clone(task);
        let ctx = self.token.child_token();
        self.spawner.spawn(Box::pin(async move {
            runner.run(ctx).await;
        }));

        self.observers
            .fire(&Event::now(EventKind::TaskSubmitted).with_task(task.name()));
        Ok(true)
    }

    /// Submits every task in the collection.
    ///
    /// Returns `Ok(true)` if at least one submission succeeded. Stops with
    /// `Err(RuntimeError::ShutDown)` only when the pool is shut down.
    pub fn submit_all(
        self: &Arc<Self>,
        tasks: impl IntoIterator<Item = Arc<Task>>,
    ) -> Result<bool, RuntimeError> {
        let mut any = false;
        for task in tasks {
            any |= self.submit(&task)?;
        }
        Ok(any)
    }

    /// Requests shutdown: no further submissions are accepted.
    ///
    /// Idempotent. Fires `ShutdownRequested`; when the active set is already
    /// empty the pool is terminated synchronously, before this call returns.
    /// Otherwise termination is deferred to the last finishing task. In-flight
    /// tasks are never interrupted.
    pub fn shutdown(&self) {
        let already_empty = {
            let mut state = self.lock_state();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.active.is_empty()
        };

        self.observers.fire(&Event::now(EventKind::ShutdownRequested));
        if already_empty {
            self.mark_terminated();
        }
    }

    /// `true` once shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.lock_state().shutdown
    }

    /// `true` once the pool is shut down **and** its active set drained.
    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Waits until the pool is terminated.
    pub async fn wait_terminated(&self) {
        let mut rx = self.terminated.subscribe();
        // The sender lives in `self`, so the channel cannot close mid-wait.
        let _ = rx.wait_for(|t| *t).await;
    }

    /// Waits until the pool is terminated, up to `timeout`.
    ///
    /// Returns `false` on expiry, `true` otherwise.
    pub async fn wait_terminated_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait_terminated()).await.is_ok()
    }

    /// Snapshot of the currently active tasks.
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.lock_state()
            .active
            .values()
            .map(|a| Arc::clone(&a.task))
            .collect()
    }

    /// Forgets a finished task: removes it from the active set, detaches the
    /// inspector, and completes the termination protocol if this was the last
    /// task after shutdown.
    fn finish_task(&self, id: TaskId) {
        let (removed, terminate) = {
            let mut state = self.lock_state();
            let removed = state.active.remove(&id);
            let terminate = removed.is_some() && state.shutdown && state.active.is_empty();
            (removed, terminate)
        };

        let Some(active) = removed else {
            return;
        };
        active.task.unobserve(active.inspector);
        active.task.release_claim();
        self.observers
            .fire(&Event::now(EventKind::TaskRemoved).with_task(active.task.name()));
        if terminate {
            self.mark_terminated();
        }
    }

    /// Flips `terminated` and fires `Terminated`, exactly once.
    fn mark_terminated(&self) {
        let flipped = self.terminated.send_if_modified(|t| {
            if *t {
                false
            } else {
                *t = true;
                true
            }
        });
        if flipped {
            self.observers.fire(&Event::now(EventKind::Terminated));
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Internal observer the pool attaches to every tracked task, relaying
/// unit-level events into the pool's own observer set.
struct Inspector {
    pool: Weak<Background>,
    task_id: TaskId,
}

impl Observe for Inspector {
    fn on_event(&self, event: &Event) {
        let Some(pool) = self.pool.upgrade() else {
            return;
        };
        match event.kind {
            EventKind::TaskStarted => pool.observers.fire(event),
            EventKind::TaskFinished => {
                pool.observers.fire(event);
                pool.finish_task(self.task_id);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "background-inspector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spawn::TokioSpawner;
    use crate::tasks::WorkFn;
    use tokio::sync::Notify;

    fn pool() -> Arc<Background> {
        Background::new(Arc::new(TokioSpawner))
    }

    fn quick(name: &'static str) -> Arc<Task> {
        Task::arc(WorkFn::arc(name, |_ctx: CancellationToken| async move {
            Ok(())
        }))
    }

    fn gated(name: &'static str, gate: Arc<Notify>) -> Arc<Task> {
        Task::arc(WorkFn::arc(name, move |_ctx: CancellationToken| {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn submit_accepts_a_fresh_task_exactly_once() {
        let bg = pool();
        let task = quick("fresh");

        assert_eq!(bg.submit(&task), Ok(true));
        assert_eq!(bg.submit(&task), Ok(false));
        assert_eq!(bg.tasks().len(), 1);
    }

    #[tokio::test]
    async fn a_task_belongs_to_one_pool_at_a_time() {
        let first = pool();
        let second = pool();
        let gate = Arc::new(Notify::new());
        let task = gated("contested", gate.clone());

        assert_eq!(first.submit(&task), Ok(true));
        assert_eq!(second.submit(&task), Ok(false));

        gate.notify_waiters();
        gate.notify_one();
        task.wait_finished().await;
        // Forgotten by the first pool, the task is claimable again — but it
        // already finished, so it is rejected as input rather than re-run.
        assert_eq!(second.submit(&task), Ok(false));
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_an_error() {
        let bg = pool();
        bg.shutdown();
        assert_eq!(bg.submit(&quick("late")), Err(RuntimeError::ShutDown));
    }

    #[tokio::test]
    async fn shutdown_with_no_active_tasks_terminates_synchronously() {
        let bg = pool();
        assert!(!bg.is_terminated());
        bg.shutdown();
        assert!(bg.is_shutdown());
        assert!(bg.is_terminated());
    }

    #[tokio::test]
    async fn termination_waits_for_every_active_task() {
        let bg = pool();
        let gate = Arc::new(Notify::new());
        let tasks: Vec<_> = (0..3).map(|_| gated("slow", gate.clone())).collect();
        assert_eq!(bg.submit_all(tasks.iter().cloned()), Ok(true));

        bg.shutdown();
        assert!(bg.is_shutdown());
        assert!(!bg.wait_terminated_timeout(Duration::from_millis(50)).await);

        gate.notify_waiters();
        for task in &tasks {
            gate.notify_one();
            task.wait_finished().await;
        }
        assert!(bg.wait_terminated_timeout(Duration::from_secs(5)).await);
        assert!(bg.tasks().is_empty());
    }

    #[tokio::test]
    async fn finished_tasks_are_forgotten() {
        let bg = pool();
        let task = quick("ephemeral");
        assert_eq!(bg.submit(&task), Ok(true));

        task.wait_finished().await;
        // The inspector runs on the task's thread right after the finish
        // event; give the executor one turn.
        tokio::task::yield_now().await;
        assert!(bg.tasks().is_empty());
    }

    #[tokio::test]
    async fn failures_stay_on_the_task() {
        let bg = pool();
        let task = Task::arc(WorkFn::arc("doomed", |_ctx: CancellationToken| async {
            Err(crate::TaskError::Fail {
                error: "doomed".into(),
            })
        }));
        assert_eq!(bg.submit(&task), Ok(true));
        task.wait_finished().await;

        assert!(task.error().is_some());
        bg.shutdown();
        assert!(bg.wait_terminated_timeout(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn pool_events_are_forwarded_in_order() {
        struct Kinds(Mutex<Vec<EventKind>>);
        impl Observe for Kinds {
            fn on_event(&self, event: &Event) {
                self.0.lock().unwrap().push(event.kind);
            }
        }

        let bg = pool();
        let kinds = Arc::new(Kinds(Mutex::new(Vec::new())));
        bg.observe(kinds.clone());

        let task = quick("observed");
        assert_eq!(bg.submit(&task), Ok(true));
        task.wait_finished().await;
        tokio::task::yield_now().await;
        bg.shutdown();
        bg.wait_terminated().await;

        assert_eq!(
            *kinds.0.lock().unwrap(),
            vec![
                EventKind::TaskSubmitted,
                EventKind::TaskStarted,
                EventKind::TaskFinished,
                EventKind::TaskRemoved,
                EventKind::ShutdownRequested,
                EventKind::Terminated,
            ]
        );
    }
}
