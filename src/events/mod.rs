//! Lifecycle events: data model and synchronous fan-out.
//!
//! This module groups the event **data model** and the **observer registry**
//! used to deliver lifecycle events emitted by tasks, plans, and their
//! containers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Observe`], [`Observers`], [`ObserverId`] explicit register/unregister
//!   fan-out with registration-order, panic-isolated delivery
//!
//! ## Quick reference
//! - **Firing sites**: `Task::run`, `Plan::run`, `Background` membership
//!   changes, the `Timer` scheduler loop.
//! - **Consumers**: user-registered observers, plus the internal inspectors a
//!   container attaches to each unit it tracks.

mod event;
mod observers;

#[cfg(feature = "logging")]
mod log;

pub use event::{Event, EventKind};
pub use observers::{Observe, ObserverId, Observers};

#[cfg(feature = "logging")]
pub use log::LogWriter;
