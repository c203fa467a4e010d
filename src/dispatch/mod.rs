//! Asynchronous dispatch: a bounded queue and worker pool in front of a slow sink.
//!
//! The public API from this module is [`Dispatcher`] with its
//! [`DispatchConfig`] and [`DispatchStats`], the [`Sink`] trait, and the
//! built-in [`JsonLinesSink`].
//!
//! Internal modules:
//! - [`dispatcher`]: queue, workers, drop-on-overload and drain-on-flush;
//! - [`writer`]: `io::Write` / `MakeWriter` adapters for logging layers;
//! - [`stats`]: delivery and drop counters;
//! - [`embedded`]: ready-made sinks.

mod config;
mod dispatcher;
mod embedded;
mod sink;
mod stats;
mod writer;

pub use config::DispatchConfig;
pub use dispatcher::{DIAGNOSTIC_TARGET, Dispatcher};
pub use embedded::JsonLinesSink;
pub use sink::{Sink, SinkRef};
pub use stats::DispatchStats;
pub use writer::DispatchWriter;
