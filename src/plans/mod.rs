//! # Recurring work units.
//!
//! This module provides the plan-related types:
//! - [`Recur`] - trait pairing an async body with its own schedule function
//! - [`RecurRef`] - shared reference to a recurrence (`Arc<dyn Recur>`)
//! - [`Every`] - function-based fixed-period recurrence
//! - [`Plan`] - recurring unit with run-count and failure bookkeeping
//! - [`BoundedRecur`] - decorator limiting a recurrence's lifetime

mod bounded;
mod plan;
mod recur;

pub use bounded::BoundedRecur;
pub use plan::{Plan, PlanId};
pub use recur::{Every, Recur, RecurRef};
