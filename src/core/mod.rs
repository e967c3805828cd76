//! Runtime core: containers and their execution plumbing.
//!
//! This module contains the two containers of the taskplan runtime plus the
//! seams around them:
//! - [`background`]: pool dispatching one-shot [`Task`](crate::Task)s to a
//!   pluggable executor;
//! - [`timer`]: single scheduler task running [`Plan`](crate::Plan)s in
//!   ascending due-time order;
//! - [`readonly`]: query-only views over both containers;
//! - [`spawn`]: the executor seam ([`Spawn`]) and its tokio implementation;
//! - [`signals`]: cross-platform shutdown signal handling.

pub(crate) mod background;
mod readonly;
mod signals;
mod spawn;
pub(crate) mod timer;

pub use background::Background;
pub use readonly::{ReadOnlyBackground, ReadOnlyTimer};
pub use signals::wait_for_shutdown_signal;
pub use spawn::{Spawn, SpawnRef, TokioSpawner};
pub use timer::Timer;
