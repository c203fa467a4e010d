//! # Dispatcher configuration.
//!
//! ## Ordering
//! With `max_workers = 1` the sink sees payloads in enqueue order. With more
//! workers each worker still delivers its own payloads in order, but payloads
//! handled by different workers interleave in no particular order: a parallel
//! sink trades global ordering for throughput. Sinks that need a total order
//! should either run with one worker or order records themselves (e.g. by a
//! timestamp field inside the payload).

use std::collections::HashMap;

use serde::Deserialize;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// ## Field semantics
/// - `max_jobs`: queue capacity; writes beyond it are dropped (min 1)
/// - `max_workers`: number of concurrent sink workers (min 1)
/// - `extra`: static metadata handed to every `Sink::exec`
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of the bounded queue.
    pub max_jobs: usize,
    /// Number of workers draining the queue.
    pub max_workers: usize,
    /// Static key/value metadata merged into every delivered record.
    pub extra: HashMap<String, String>,
}

impl DispatchConfig {
    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn max_jobs_clamped(&self) -> usize {
        self.max_jobs.max(1)
    }

    /// Worker count clamped to a minimum of 1.
    #[inline]
    pub fn max_workers_clamped(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Sets the queue capacity.
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    /// Sets the worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Adds one `extra` entry.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl Default for DispatchConfig {
    /// Default configuration:
    ///
    /// - `max_jobs = 1024`
    /// - `max_workers = 2`
    /// - `extra = {}`
    fn default() -> Self {
        Self {
            max_jobs: 1024,
            max_workers: 2,
            extra: HashMap::new(),
        }
    }
}
