//! # taskplan
//!
//! **Taskplan** is a lightweight execution core for one-shot and recurring
//! async work in Rust.
//!
//! It provides two containers — a [`Background`] pool for fire-and-forget
//! [`Task`]s and a [`Timer`] for periodically recurring [`Plan`]s — plus the
//! unit types they manage. Failures of a unit are captured on the unit, never
//! rethrown into the container: both containers keep operating regardless of
//! what individual bodies do.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌────────────┐  ┌────────────┐        ┌────────────┐  ┌────────────┐
//!   │    Task    │  │    Task    │        │    Plan    │  │    Plan    │
//!   │ (one-shot) │  │ (one-shot) │        │ (recurring)│  │ (recurring)│
//!   └──────┬─────┘  └──────┬─────┘        └──────┬─────┘  └──────┬─────┘
//!          ▼               ▼                     ▼               ▼
//! ┌─────────────────────────────────┐  ┌──────────────────────────────────┐
//! │  Background (pool)              │  │  Timer (scheduler)               │
//! │  - submit() ─► Spawn executor   │  │  - schedule() ─► pending queue   │
//! │  - tracks active tasks          │  │  - min-heap keyed (due, seq)     │
//! │  - shutdown: drain then         │  │  - one scheduler task, runs      │
//! │    terminate                    │  │    plans inline, earliest first  │
//! │                                 │  │  - shutdown: discard pending,    │
//! │                                 │  │    then terminate                │
//! └───────────────┬─────────────────┘  └────────────────┬─────────────────┘
//!                 │                                     │
//!                 │ Events: TaskSubmitted, TaskStarted, │ Events: PlanScheduled,
//!                 │ TaskFinished, TaskRemoved,          │ PlanRun, PlanFinished,
//!                 │ ShutdownRequested, Terminated       │ PlanRemoved, Cleared, ...
//!                 ▼                                     ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │    Observers (synchronous fan-out, registration order, panic-safe)    │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Unit lifecycle
//! ```text
//! Task: Created ──run()──► Running ──► Finished          (exactly once;
//!       Err/panic captured as error(), wait_finished() wakes)
//!
//! Plan: next_run() ──due──► run() ─► next_run() recomputed ─► ...
//!       until next_run() == None (terminal) ─► removed from the Timer
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / traits                  |
//! |-----------------|--------------------------------------------------------------|-------------------------------------|
//! | **Tasks**       | One-shot units with a captured, inspectable failure.         | [`Task`], [`Work`], [`WorkFn`]      |
//! | **Plans**       | Recurring units computing their own next due time.           | [`Plan`], [`Recur`], [`Every`]      |
//! | **Containers**  | Pool for tasks, scheduler for plans, shutdown protocol.      | [`Background`], [`Timer`]           |
//! | **Decorators**  | Dependency gating, run limits, read-only views.              | [`DependentWork`], [`BoundedRecur`], [`ReadOnlyBackground`], [`ReadOnlyTimer`] |
//! | **Observer API**| Hook into unit/container lifecycle events.                   | [`Observe`], [`Event`]              |
//! | **Executors**   | Pluggable spawning for the pool.                             | [`Spawn`], [`TokioSpawner`]         |
//! | **Errors**      | Typed errors for container misuse and body failures.         | [`RuntimeError`], [`TaskError`]     |
//! | **Configuration** | Scheduler pacing settings.                                 | [`TimerConfig`]                     |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskplan::{Background, Every, Plan, Task, Timer, TimerConfig, TokioSpawner, WorkFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One-shot work through the pool.
//!     let pool = Background::new(Arc::new(TokioSpawner));
//!     let hello = Task::arc(WorkFn::arc("hello", |ctx: CancellationToken| async move {
//!         if ctx.is_cancelled() { return Ok(()); }
//!         println!("Hello from task!");
//!         Ok(())
//!     }));
//!     pool.submit(&hello)?;
//!     hello.wait_finished().await;
//!
//!     // Recurring work through the timer.
//!     let timer = Timer::new(TimerConfig::default());
//!     let beat = Plan::arc(Every::arc("heartbeat", Duration::from_millis(10), |_ctx| async {
//!         println!("beat");
//!         Ok(())
//!     }));
//!     timer.schedule(&beat)?;
//!     beat.wait_finished().await;
//!
//!     pool.shutdown();
//!     timer.shutdown();
//!     pool.wait_terminated().await;
//!     timer.wait_terminated().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod plans;
mod tasks;

// ---- Public re-exports ----

pub use config::TimerConfig;
pub use core::{
    wait_for_shutdown_signal, Background, ReadOnlyBackground, ReadOnlyTimer, Spawn, SpawnRef,
    Timer, TokioSpawner,
};
pub use error::{RuntimeError, TaskError};
pub use events::{Event, EventKind, Observe, ObserverId, Observers};
pub use plans::{BoundedRecur, Every, Plan, PlanId, Recur, RecurRef};
pub use tasks::{DependentWork, Task, TaskId, TaskState, Work, WorkFn, WorkRef};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
