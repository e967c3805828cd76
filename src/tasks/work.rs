//! # Work abstraction and function-backed work implementation.
//!
//! This module defines the [`Work`] trait (async, cancelable, with optional
//! setup/teardown hooks) and a convenient function-backed implementation
//! [`WorkFn`]. The common handle type is [`WorkRef`], an `Arc<dyn Work>`
//! suitable for sharing across the runtime.
//!
//! A work body receives a [`CancellationToken`] and should periodically check
//! it to stop cooperatively.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a work implementation.
pub type WorkRef = Arc<dyn Work>;

/// # Asynchronous, cancelable unit body with hooks.
///
/// `Work` has a stable [`name`](Work::name) and an ordered hook sequence:
/// [`setup`](Work::setup) → [`run`](Work::run) → [`teardown`](Work::teardown).
/// [`Task::run`](crate::Task::run) executes the sequence and stops at the
/// first error; both hooks default to no-ops.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use taskplan::{TaskError, Work};
///
/// struct Demo;
///
/// #[async_trait]
/// impl Work for Demo {
///     fn name(&self) -> &str { "demo" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         // do work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Work: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Pre-hook, executed before [`run`](Work::run). An error here skips the
    /// body and teardown.
    async fn setup(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        Ok(())
    }

    /// Executes the main body until completion or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;

    /// Post-hook, executed after a successful [`run`](Work::run).
    async fn teardown(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Function-backed work implementation.
///
/// Wraps a closure that *creates* a new future per invocation, so there is no
/// shared mutable state between the closure and the produced future. If shared
/// state is needed, move an explicit `Arc<...>` into the closure.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use taskplan::{TaskError, WorkFn, WorkRef};
///
/// let w: WorkRef = WorkFn::arc("worker", |ctx: CancellationToken| async move {
///     if ctx.is_cancelled() {
///         return Err(TaskError::Canceled);
///     }
///     // do work...
///     Ok::<_, TaskError>(())
/// });
///
/// assert_eq!(w.name(), "worker");
/// ```
#[derive(Debug)]
pub struct WorkFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> WorkFn<F> {
    /// Creates a new function-backed work body.
    ///
    /// Prefer [`WorkFn::arc`] when you immediately need a [`WorkRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the work body and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}
