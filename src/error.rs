//! Error types used by the taskplan containers and work units.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — misuse of a container's API surface, raised synchronously
//!   to the caller (submitting into a shut-down pool, mutating a read-only view).
//! - [`TaskError`] — failures of an individual work body. These are **captured**
//!   on the unit that ran the body and never propagate to the container.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::any::Any;
use std::future::Future;

use futures::FutureExt;
use thiserror::Error;

/// # Errors raised by container API misuse.
///
/// These are the only errors the containers throw to callers; everything that
/// happens inside a work body is recovered locally and captured instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// The container was already shut down; no further submissions are accepted.
    #[error("container is shut down")]
    ShutDown,

    /// The operation was invoked through a read-only view.
    #[error("read-only view rejects mutation")]
    ReadOnly,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskplan::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::ShutDown.as_label(), "runtime_shut_down");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ShutDown => "runtime_shut_down",
            RuntimeError::ReadOnly => "runtime_read_only",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::ShutDown => "container is shut down".to_string(),
            RuntimeError::ReadOnly => "read-only view rejects mutation".to_string(),
        }
    }
}

/// # Failures of a work body.
///
/// Captured on the [`Task`](crate::Task) or [`Plan`](crate::Plan) that ran the
/// body and inspectable after completion. The containers keep operating
/// regardless of individual unit failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The body returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The body panicked; the panic payload was caught at the unit boundary.
    #[error("execution panicked: {error}")]
    Panicked {
        /// The panic message, if one could be extracted.
        error: String,
    },

    /// The body observed cancellation and exited early.
    ///
    /// Distinct from [`TaskError::Fail`]: a dependency gate that is interrupted
    /// while waiting reports `Canceled`, not a body failure.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskplan::TaskError;
    ///
    /// let err = TaskError::Fail { error: "boom".into() };
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { error } => format!("panic: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }
}

/// Runs a fallible body, converting panics into [`TaskError::Panicked`].
///
/// The unit boundary is where failures stop: neither an `Err` nor a panic
/// from a body may cross into the container or the executor.
pub(crate) async fn catch_failures<F>(body: F) -> Result<(), TaskError>
where
    F: Future<Output = Result<(), TaskError>>,
{
    match std::panic::AssertUnwindSafe(body).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(TaskError::Panicked {
            error: panic_message(payload.as_ref()),
        }),
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catch_failures_passes_results_through() {
        assert_eq!(catch_failures(async { Ok(()) }).await, Ok(()));
        let failed = catch_failures(async {
            Err(TaskError::Fail {
                error: "boom".into(),
            })
        })
        .await;
        assert_eq!(
            failed,
            Err(TaskError::Fail {
                error: "boom".into()
            })
        );
    }

    #[tokio::test]
    async fn catch_failures_converts_panics() {
        let res = catch_failures(async { panic!("kaboom") }).await;
        match res {
            Err(TaskError::Panicked { error }) => assert_eq!(error, "kaboom"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }
}
