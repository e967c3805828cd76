//! # One-shot work units.
//!
//! This module provides the task-related types:
//! - [`Work`] - trait for implementing async cancelable work bodies with hooks
//! - [`WorkFn`] - function-based work implementation
//! - [`WorkRef`] - shared reference to a work body (`Arc<dyn Work>`)
//! - [`Task`] - one-shot unit with lifecycle state, captured failure, observers
//! - [`DependentWork`] - decorator gating a body behind prerequisite tasks

mod dependent;
mod task;
mod work;

pub use dependent::DependentWork;
pub use task::{Task, TaskId, TaskState};
pub use work::{Work, WorkFn, WorkRef};
