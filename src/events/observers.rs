//! # Synchronous event fan-out with explicit registration.
//!
//! Provides [`Observers`] — an ordered registry of [`Observe`] implementations
//! attached to a unit or container.
//!
//! ## Delivery model
//! ```text
//! fire(event)
//!     │ (snapshot of the registration list, lock released)
//!     ├──► observer 1.on_event(&event)   ── panic → caught, skipped
//!     ├──► observer 2.on_event(&event)
//!     └──► observer N.on_event(&event)
//! ```
//!
//! ## Rules
//! - **Synchronous**: delivery happens on the detecting thread, before the
//!   firing call returns.
//! - **Registration order**: observers see each event in the order they were
//!   registered.
//! - **Isolation**: a panicking observer is caught via `catch_unwind` and the
//!   remaining observers still run; the firing component's state is unaffected.
//! - **Explicit ownership**: registration hands back an [`ObserverId`]; the
//!   registrant is responsible for unregistering it. Nothing is weakly held.
//!
//! **Warning**: `AssertUnwindSafe` is used around callbacks, which can leave
//! an observer's own shared state inconsistent if it panics while holding a lock.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::Event;

/// Contract for event observers.
///
/// Called synchronously on whatever thread detected the event, so
/// implementations must be quick and must not block.
pub trait Observe: Send + Sync + 'static {
    /// Handles a single event.
    fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Handle returned by [`Observers::register`], consumed by
/// [`Observers::unregister`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered, thread-safe registry of observers.
///
/// Every unit and container owns one of these; containers additionally
/// register internal inspectors on the units they track through the same API.
#[derive(Default)]
pub struct Observers {
    entries: Mutex<Vec<(ObserverId, Arc<dyn Observe>)>>,
    next_id: AtomicU64,
}

impl Observers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer at the end of the delivery order.
    pub fn register(&self, observer: Arc<dyn Observe>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    /// Removes a previously registered observer.
    ///
    /// Returns `false` if the id is unknown (already unregistered).
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(eid, _)| *eid != id);
        entries.len() != before
    }

    /// Number of currently registered observers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Delivers `event` to every observer, in registration order.
    ///
    /// The registry lock is released before the first callback runs, so an
    /// observer may register or unregister (including itself) from within
    /// `on_event`; such changes take effect for the next `fire`.
    pub fn fire(&self, event: &Event) {
        let snapshot: Vec<Arc<dyn Observe>> =
            self.lock().iter().map(|(_, o)| Arc::clone(o)).collect();

        for observer in snapshot {
            // A throwing observer must not disturb delivery or the firing site.
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(event)));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ObserverId, Arc<dyn Observe>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        tag: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Observe for Recorder {
        fn on_event(&self, _event: &Event) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    struct Bomb;

    impl Observe for Bomb {
        fn on_event(&self, _event: &Event) {
            panic!("observer bomb");
        }
    }

    #[test]
    fn delivery_follows_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observers = Observers::new();
        for tag in 0..4 {
            observers.register(Arc::new(Recorder {
                tag,
                log: log.clone(),
            }));
        }

        observers.fire(&Event::now(EventKind::TaskStarted));
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn panicking_observer_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observers = Observers::new();
        observers.register(Arc::new(Recorder {
            tag: 1,
            log: log.clone(),
        }));
        observers.register(Arc::new(Bomb));
        observers.register(Arc::new(Recorder {
            tag: 2,
            log: log.clone(),
        }));

        observers.fire(&Event::now(EventKind::TaskFinished));
        // The bomb is swallowed; delivery continues to the rest.
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn unregister_stops_delivery() {
        static HITS: AtomicUsize = AtomicUsize::new(0);

        struct Counter;
        impl Observe for Counter {
            fn on_event(&self, _event: &Event) {
                HITS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let observers = Observers::new();
        let id = observers.register(Arc::new(Counter));
        observers.fire(&Event::now(EventKind::Cleared));
        assert!(observers.unregister(id));
        assert!(!observers.unregister(id));
        observers.fire(&Event::now(EventKind::Cleared));
        assert_eq!(HITS.load(Ordering::Relaxed), 1);
    }
}
