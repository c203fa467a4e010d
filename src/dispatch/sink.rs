//! # Dispatch sink trait.
//!
//! Provides [`Sink`], the destination a [`Dispatcher`](crate::Dispatcher) hands
//! records to: a database table, a file, a remote collector.
//!
//! ```text
//! Dispatcher::write ──► [bounded queue] ──► worker ──► sink.exec(extra, payload)
//!                                                 └─► error/panic → logged, worker continues
//! Dispatcher::flush ──► drain ──► sink.close()
//! ```
//!
//! ## Rules
//! - `exec` may be called concurrently from several workers.
//! - Errors are logged by the dispatcher and never retried.
//! - `close` is called at most once, after the last `exec` returned.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;

/// Shared handle to a sink.
pub type SinkRef = Arc<dyn Sink>;

/// Destination for dispatched records.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Be safe to call from `max_workers` workers at once.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Delivers one payload.
    ///
    /// `extra` is the dispatcher's static metadata; merging it into the stored
    /// record is up to the sink.
    async fn exec(&self, extra: &HashMap<String, String>, payload: Bytes) -> Result<(), SinkError>;

    /// Releases the destination.
    async fn close(&self) -> Result<(), SinkError>;
}
