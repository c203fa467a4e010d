//! Runtime core: service lifecycle supervision.
//!
//! The public API from this module is [`Supervisor`] (with its builder,
//! configuration and state), plus the [`Signal`] set it listens for.
//!
//! Internal modules:
//! - [`runner`]: the starter, stop-watcher and signal-watcher tasks;
//! - [`supervisor`]: spawns the tasks, aggregates the first real error;
//! - [`lifecycle`]: shared cancellation token and state machine;
//! - [`shutdown`]: cross-platform signal handling;
//! - [`builder`]: fluent construction.

mod builder;
mod config;
mod lifecycle;
mod runner;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use lifecycle::SupervisorState;
pub use shutdown::{Signal, SignalListener};
pub use supervisor::Supervisor;
