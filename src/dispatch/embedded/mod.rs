//! # Built-in sinks
//!
//! Ready-made [`Sink`](crate::Sink) implementations.
//!
//! - [`JsonLinesSink`]: writes one JSON object per line to any async writer,
//!   merging the dispatcher's `extra` metadata into each record.

mod json_lines;

pub use json_lines::JsonLinesSink;
