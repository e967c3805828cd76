//! # Timer: single-threaded scheduler executing plans in due-time order.
//!
//! The [`Timer`] owns one dedicated scheduler task. Plans execute **inline on
//! that task**, strictly one at a time — a slow body delays every later due
//! time. That is an explicit, accepted trade-off: no preemption, no per-plan
//! worker.
//!
//! ## Architecture
//! ```text
//! schedule()/remove()/clear()/shutdown()        scheduler task
//!        │   (pending queues + Notify)       ┌──────────────────────────────┐
//!        └────────────────────────────────►  │ loop:                        │
//!                                            │  ├─ drain removals           │
//!                                            │  ├─ drain schedules ─► heap  │
//!                                            │  ├─ shutdown? discard all,   │
//!                                            │  │    terminate              │
//!                                            │  ├─ empty? park on Notify    │
//!                                            │  └─ peek earliest:           │
//!                                            │      due ─► run plan,        │
//!                                            │             reinsert/remove, │
//!                                            │             sleep floor      │
//!                                            │      not due ─► sleep until  │
//!                                            └──────────────────────────────┘
//! ```
//!
//! The authoritative structure is a min-heap keyed by `(due time, admission
//! seq)`; only the scheduler task mutates it. External calls park their
//! requests in a pending-schedule queue / pending-removal set and wake the
//! loop, so they never race the scan.
//!
//! ## Rules
//! - Plans with equal due times run **FIFO by schedule admission order**; a
//!   plan keeps its admission seq across reinsertion, so a rescheduled plan
//!   does not overtake an equally-due earlier admission.
//! - A plan whose fresh due time is terminal is auto-removed.
//! - After `shutdown()`: an in-flight run finishes naturally but its freshly
//!   computed due time is discarded; every remaining plan is dropped without
//!   executing. No resurrection after shutdown.
//! - Events are fired with no scheduler lock held.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::TimerConfig;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind, Observe, ObserverId, Observers};
use crate::plans::{Plan, PlanId};

/// Heap entry; min-order by `(at, seq)`.
struct Entry {
    at: Instant,
    seq: u64,
    plan: Arc<Plan>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// A tracked plan plus its admission bookkeeping.
struct Tracked {
    seq: u64,
    inspector: ObserverId,
    plan: Arc<Plan>,
}

/// State guarded by the scheduler lock.
struct Sched {
    heap: BinaryHeap<Reverse<Entry>>,
    tracked: HashMap<PlanId, Tracked>,
    pending_add: Vec<Arc<Plan>>,
    pending_remove: HashSet<PlanId>,
    clear_requested: bool,
    shutdown: bool,
    next_seq: u64,
}

/// One step decided by the loop while holding the scheduler lock.
enum Step {
    /// Nothing scheduled; park until woken.
    Park,
    /// Earliest plan not yet due; sleep until then or an earlier wake-up.
    SleepUntil(Instant),
    /// Earliest plan is due; popped from the heap, run it.
    Run(Arc<Plan>),
    /// Shut down and drained; exit the loop.
    Terminate,
}

/// Single-threaded scheduler running [`Plan`]s in ascending due-time order.
pub struct Timer {
    cfg: TimerConfig,
    sched: Mutex<Sched>,
    notify: Notify,
    observers: Observers,
    terminated: watch::Sender<bool>,
    /// Root token; each plan run receives a child of it. Never cancelled by
    /// the timer itself: an in-flight run always finishes naturally.
    token: CancellationToken,
}

impl Timer {
    /// Creates a timer and spawns its scheduler task on the ambient runtime.
    pub fn new(cfg: TimerConfig) -> Arc<Self> {
        let (terminated, _) = watch::channel(false);
        let timer = Arc::new(Self {
            cfg,
            sched: Mutex::new(Sched {
                heap: BinaryHeap::new(),
                tracked: HashMap::new(),
                pending_add: Vec::new(),
                pending_remove: HashSet::new(),
                clear_requested: false,
                shutdown: false,
                next_seq: 0,
            }),
            notify: Notify::new(),
            observers: Observers::new(),
            terminated,
            token: CancellationToken::new(),
        });

        tokio::spawn(Arc::clone(&timer).scheduler_loop());
        timer
    }

    /// Registers an observer for timer-level events.
    pub fn observe(&self, observer: Arc<dyn Observe>) -> ObserverId {
        self.observers.register(observer)
    }

    /// Removes a previously registered observer.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Schedules a plan.
    ///
    /// - `Err(RuntimeError::ShutDown)` once the timer is shut down.
    /// - `Ok(false)` (no error) for a plan that is already tracked, claimed
    ///   by another container, or already terminal.
    /// - `Ok(true)` otherwise: an inspector is attached, the plan parked in
    ///   the pending-schedule queue, `PlanScheduled` fired, and the scheduler
    ///   woken.
    pub fn schedule(self: &Arc<Self>, plan: &Arc<Plan>) -> Result<bool, RuntimeError> {
        {
            let mut s = self.lock_sched();
            if s.shutdown {
                return Err(RuntimeError::ShutDown);
            }
            if s.tracked.contains_key(&plan.id()) || plan.next_run().is_none() {
                return Ok(false);
            }
            if !plan.try_claim() {
                return Ok(false);
            }

            let inspector = plan.observe(Arc::new(Inspector {
                timer: Arc::downgrade(self),
            }));
            let seq = s.next_seq;
            s.next_seq += 1;
            s.tracked.insert(
                plan.id(),
                Tracked {
                    seq,
                    inspector,
                    plan: Arc::clone(plan),
                },
            );
            s.pending_add.push(Arc::clone(plan));
        }

        self.observers
            .fire(&Event::now(EventKind::PlanScheduled).with_task(plan.name()));
        self.notify.notify_one();
        Ok(true)
    }

    /// Requests removal of a plan.
    ///
    /// Returns `false` if the plan is not tracked or its removal is already
    /// pending. The structural mutation —
    /// and the `PlanRemoved` event — happen on the scheduler task; an
    /// in-flight run of the plan is never interrupted.
    pub fn remove(&self, plan: &Arc<Plan>) -> bool {
        {
            let mut s = self.lock_sched();
            if !s.tracked.contains_key(&plan.id()) || !s.pending_remove.insert(plan.id()) {
                return false;
            }
        }
        self.notify.notify_one();
        true
    }

    /// Requests removal of every tracked plan.
    ///
    /// Drained by the scheduler task, which fires a single `Cleared` event.
    pub fn clear(&self) {
        {
            let mut s = self.lock_sched();
            s.clear_requested = true;
        }
        self.notify.notify_one();
    }

    /// Requests shutdown: no further schedules are accepted.
    ///
    /// Idempotent. The currently-selected plan (if mid-run) finishes
    /// naturally; every other plan is discarded without executing, after
    /// which the timer terminates.
    pub fn shutdown(&self) {
        {
            let mut s = self.lock_sched();
            if s.shutdown {
                return;
            }
            s.shutdown = true;
        }
        self.observers.fire(&Event::now(EventKind::ShutdownRequested));
        self.notify.notify_one();
    }

    /// `true` once shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.lock_sched().shutdown
    }

    /// `true` once the scheduler loop has drained and exited.
    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Waits until the timer is terminated.
    pub async fn wait_terminated(&self) {
        let mut rx = self.terminated.subscribe();
        // The sender lives in `self`, so the channel cannot close mid-wait.
        let _ = rx.wait_for(|t| *t).await;
    }

    /// Waits until the timer is terminated, up to `timeout`.
    ///
    /// Returns `false` on expiry, `true` otherwise.
    pub async fn wait_terminated_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait_terminated()).await.is_ok()
    }

    /// Snapshot of the tracked plans, in admission order.
    pub fn plans(&self) -> Vec<Arc<Plan>> {
        let s = self.lock_sched();
        let mut tracked: Vec<_> = s.tracked.values().collect();
        tracked.sort_unstable_by_key(|t| t.seq);
        tracked.iter().map(|t| Arc::clone(&t.plan)).collect()
    }

    /// The dedicated scheduler task.
    async fn scheduler_loop(self: Arc<Self>) {
        loop {
            match self.next_step() {
                Step::Park => self.notify.notified().await,
                Step::SleepUntil(at) => {
                    tokio::select! {
                        _ = time::sleep_until(at) => {}
                        _ = self.notify.notified() => {}
                    }
                }
                Step::Run(plan) => {
                    // Outside the scheduler lock: schedule/remove/shutdown
                    // stay callable while the body runs.
                    plan.run(self.token.child_token()).await;
                    self.settle(&plan);
                    if !self.cfg.min_run_period.is_zero() {
                        time::sleep(self.cfg.min_run_period).await;
                    }
                }
                Step::Terminate => {
                    self.mark_terminated();
                    break;
                }
            }
        }
    }

    /// Drains the request queues and decides the next step.
    ///
    /// Events for the drained requests are fired after the lock is released.
    fn next_step(&self) -> Step {
        let mut fired = Vec::new();
        let step = {
            let mut s = self.lock_sched();
            Self::drain_requests(&mut s, &mut fired);

            if s.shutdown {
                Self::discard_all(&mut s, &mut fired);
                Step::Terminate
            } else {
                match s.heap.pop() {
                    None => Step::Park,
                    Some(Reverse(entry)) if entry.at > Instant::now() => {
                        let at = entry.at;
                        s.heap.push(Reverse(entry));
                        Step::SleepUntil(at)
                    }
                    Some(Reverse(entry)) => Step::Run(entry.plan),
                }
            }
        };

        for ev in &fired {
            self.observers.fire(ev);
        }
        step
    }

    /// Applies pending clears, removals, and schedules to the heap.
    fn drain_requests(s: &mut Sched, fired: &mut Vec<Event>) {
        if s.clear_requested {
            s.clear_requested = false;
            s.pending_add.clear();
            s.pending_remove.clear();
            s.heap.clear();
            for (_, t) in s.tracked.drain() {
                t.plan.unobserve(t.inspector);
                t.plan.release_claim();
            }
            fired.push(Event::now(EventKind::Cleared));
        }

        if !s.pending_remove.is_empty() {
            let removals: Vec<PlanId> = s.pending_remove.drain().collect();
            for id in removals {
                if let Some(t) = s.tracked.remove(&id) {
                    t.plan.unobserve(t.inspector);
                    t.plan.release_claim();
                    fired.push(Event::now(EventKind::PlanRemoved).with_task(t.plan.name()));
                }
            }
            let Sched { heap, tracked, pending_add, .. } = s;
            heap.retain(|Reverse(e)| tracked.contains_key(&e.plan.id()));
            pending_add.retain(|p| tracked.contains_key(&p.id()));
        }

        let adds: Vec<Arc<Plan>> = s.pending_add.drain(..).collect();
        for plan in adds {
            let Some(at) = plan.next_run() else {
                // Turned terminal between schedule() and the drain.
                if let Some(t) = s.tracked.remove(&plan.id()) {
                    t.plan.unobserve(t.inspector);
                    t.plan.release_claim();
                    fired.push(Event::now(EventKind::PlanRemoved).with_task(plan.name()));
                }
                continue;
            };
            let Some(seq) = s.tracked.get(&plan.id()).map(|t| t.seq) else {
                continue;
            };
            s.heap.push(Reverse(Entry { at, seq, plan }));
        }
    }

    /// Drops every tracked plan without executing it (shutdown path).
    fn discard_all(s: &mut Sched, fired: &mut Vec<Event>) {
        s.pending_add.clear();
        s.pending_remove.clear();
        s.clear_requested = false;
        s.heap.clear();
        for (_, t) in s.tracked.drain() {
            t.plan.unobserve(t.inspector);
            t.plan.release_claim();
            fired.push(Event::now(EventKind::PlanRemoved).with_task(t.plan.name()));
        }
    }

    /// Reinserts or retires a plan after one executed iteration.
    fn settle(&self, plan: &Arc<Plan>) {
        let mut fired = Vec::new();
        {
            let mut s = self.lock_sched();
            let removal_requested = s.pending_remove.remove(&plan.id());

            match plan.next_run() {
                // The fresh due time survives only on a live, wanted plan.
                Some(at) if !s.shutdown && !removal_requested => {
                    if let Some(seq) = s.tracked.get(&plan.id()).map(|t| t.seq) {
                        s.heap.push(Reverse(Entry {
                            at,
                            seq,
                            plan: Arc::clone(plan),
                        }));
                    }
                }
                _ => {
                    if let Some(t) = s.tracked.remove(&plan.id()) {
                        t.plan.unobserve(t.inspector);
                        t.plan.release_claim();
                        fired.push(Event::now(EventKind::PlanRemoved).with_task(plan.name()));
                    }
                }
            }
        }
        for ev in &fired {
            self.observers.fire(ev);
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

    fn lock_sched(&self) -> MutexGuard<'_, Sched> {
        self.sched.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Internal observer the timer attaches to every tracked plan, relaying
/// unit-level run/finished events into the timer's own observer set.
struct Inspector {
    timer: Weak<Timer>,
}

impl Observe for Inspector {
    fn on_event(&self, event: &Event) {
        let Some(timer) = self.timer.upgrade() else {
            return;
        };
        if matches!(event.kind, EventKind::PlanRun | EventKind::PlanFinished) {
            timer.observers.fire(event);
        }
    }

    fn name(&self) -> &'static str {
        "timer-inspector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::{BoundedRecur, Every};
    use std::sync::Mutex as StdMutex;

    fn timer() -> Arc<Timer> {
        Timer::new(TimerConfig {
            min_run_period: Duration::from_millis(1),
        })
    }

    /// A plan that appends its tag to a shared log on every run.
    fn logging_plan(
        tag: &'static str,
        delay: Duration,
        runs: u64,
        log: &Arc<StdMutex<Vec<&'static str>>>,
    ) -> Arc<Plan> {
        let log = Arc::clone(log);
        let every = Every::new(tag, Duration::from_millis(100), move |_ctx| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(tag);
                Ok(())
            }
        })
        .with_delay(delay);
        Plan::arc(BoundedRecur::new(Arc::new(every)).with_max_runs(runs).arc())
    }

    #[tokio::test(start_paused = true)]
    async fn runs_twice_then_retires_the_plan() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let plan = logging_plan("p", Duration::from_millis(100), 2, &log);

        assert_eq!(t.schedule(&plan), Ok(true));
        assert_eq!(t.plans().len(), 1);

        plan.wait_finished().await;
        plan.wait_finished().await;

        // Retirement happens on the scheduler task right after the run.
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(plan.finished_count(), 2);
        assert!(plan.next_run().is_none());
        assert!(t.plans().is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["p", "p"]);
    }

    #[tokio::test(start_paused = true)]
    async fn plans_run_in_ascending_due_time_order() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let p3 = logging_plan("p3", Duration::from_millis(300), 1, &log);
        let p1 = logging_plan("p1", Duration::from_millis(100), 1, &log);
        let p2 = logging_plan("p2", Duration::from_millis(200), 1, &log);

        // Admission order deliberately differs from due-time order.
        assert_eq!(t.schedule(&p3), Ok(true));
        assert_eq!(t.schedule(&p1), Ok(true));
        assert_eq!(t.schedule(&p2), Ok(true));

        for p in [&p1, &p2, &p3] {
            p.wait_finished().await;
        }
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*log.lock().unwrap(), vec!["p1", "p2", "p3"]);
        assert!(t.plans().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn equal_due_times_run_fifo_by_admission() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let delay = Duration::from_millis(100);
        let a = logging_plan("a", delay, 1, &log);
        let b = logging_plan("b", delay, 1, &log);
        let c = logging_plan("c", delay, 1, &log);

        assert_eq!(t.schedule(&a), Ok(true));
        assert_eq!(t.schedule(&b), Ok(true));
        assert_eq!(t.schedule(&c), Ok(true));

        for p in [&a, &b, &c] {
            p.wait_finished().await;
        }
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_rejections() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));

        // Already terminal.
        let dead = logging_plan("dead", Duration::from_millis(10), 0, &log);
        assert!(dead.next_run().is_none());
        assert_eq!(t.schedule(&dead), Ok(false));

        // Duplicate.
        let plan = logging_plan("dup", Duration::from_secs(60), 1, &log);
        assert_eq!(t.schedule(&plan), Ok(true));
        assert_eq!(t.schedule(&plan), Ok(false));

        // Claimed by another timer.
        let other = timer();
        assert_eq!(other.schedule(&plan), Ok(false));

        // After shutdown.
        t.shutdown();
        let late = logging_plan("late", Duration::from_millis(10), 1, &log);
        assert_eq!(t.schedule(&late), Err(RuntimeError::ShutDown));
        assert!(t.wait_terminated_timeout(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_unschedules_a_pending_plan() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let plan = logging_plan("removed", Duration::from_secs(60), 1, &log);

        assert_eq!(t.schedule(&plan), Ok(true));
        assert!(t.remove(&plan));
        assert!(!t.remove(&plan));

        time::sleep(Duration::from_millis(50)).await;
        assert!(t.plans().is_empty());
        assert_eq!(plan.finished_count(), 0);
        // Released: another timer may claim it now.
        let other = timer();
        assert_eq!(other.schedule(&plan), Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything_at_once() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let a = logging_plan("a", Duration::from_secs(60), 1, &log);
        let b = logging_plan("b", Duration::from_secs(60), 1, &log);
        assert_eq!(t.schedule(&a), Ok(true));
        assert_eq!(t.schedule(&b), Ok(true));

        t.clear();
        time::sleep(Duration::from_millis(50)).await;
        assert!(t.plans().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_pending_plans_without_running_them() {
        let t = timer();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let far = logging_plan("far", Duration::from_secs(60), 1, &log);
        assert_eq!(t.schedule(&far), Ok(true));

        t.shutdown();
        assert!(t.is_shutdown());
        assert!(t.wait_terminated_timeout(Duration::from_secs(5)).await);
        assert!(t.is_terminated());
        assert!(t.plans().is_empty());
        assert_eq!(far.finished_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_with_no_plans_terminates_promptly() {
        let t = timer();
        t.shutdown();
        assert!(t.wait_terminated_timeout(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_events_cover_the_plan_lifecycle() {
        struct Kinds(StdMutex<Vec<EventKind>>);
        impl Observe for Kinds {
            fn on_event(&self, event: &Event) {
                self.0.lock().unwrap().push(event.kind);
            }
        }

        let t = timer();
        let kinds = Arc::new(Kinds(StdMutex::new(Vec::new())));
        t.observe(kinds.clone());

        let log = Arc::new(StdMutex::new(Vec::new()));
        let plan = logging_plan("observed", Duration::from_millis(100), 1, &log);
        assert_eq!(t.schedule(&plan), Ok(true));
        plan.wait_finished().await;
        time::sleep(Duration::from_millis(50)).await;

        t.shutdown();
        t.wait_terminated().await;

        assert_eq!(
            *kinds.0.lock().unwrap(),
            vec![
                EventKind::PlanScheduled,
                EventKind::PlanRun,
                EventKind::PlanFinished,
                EventKind::PlanRemoved,
                EventKind::ShutdownRequested,
                EventKind::Terminated,
            ]
        );
    }
}
