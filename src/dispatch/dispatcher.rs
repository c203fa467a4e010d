//! # Bounded, non-blocking dispatch to a slow sink.
//!
//! Provides [`Dispatcher`]: producers push serialized records without ever
//! waiting; a fixed pool of workers forwards them to a [`Sink`](crate::Sink).
//!
//! ## Architecture
//! ```text
//! write(payload)                                  ┌──► worker 0 ──► sink.exec(extra, payload)
//!     │ closed?  → discard (dropped_closed)       │
//!     │ full?    → discard + warn (dropped_full)  ├──► worker 1 ──► sink.exec(extra, payload)
//!     └─ copy ──► [bounded MPMC queue] ───────────┤      ...
//!                  (capacity: max_jobs)           └──► worker N-1     (N = max_workers)
//!
//! flush():
//!   closed = true ──► drop sender (queue closed) ──► join workers (they drain) ──► sink.close()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `write()` never waits and always reports the full length as written
//! - **Drop on overload**: a full queue discards the new record, never an old one
//! - **Drain on shutdown**: every record accepted before `flush()` closed the queue
//!   reaches `Sink::exec` exactly once
//! - **Containment**: sink errors and panics are logged per record; the worker keeps going
//! - **Ordering**: FIFO with one worker; per-worker only with more (see [`DispatchConfig`])
//!
//! Diagnostics are emitted under the [`DIAGNOSTIC_TARGET`] target. A logging
//! layer that writes into a dispatcher must filter that target out, or a full
//! queue would keep feeding itself.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;
use flume::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::dispatch::config::DispatchConfig;
use crate::dispatch::sink::SinkRef;
use crate::dispatch::stats::{Counters, DispatchStats};
use crate::panic::catch_panic;

/// Tracing target of every diagnostic the dispatcher emits.
pub const DIAGNOSTIC_TARGET: &str = "appvisor::dispatch";

/// Bounded queue plus worker pool in front of a [`Sink`](crate::Sink).
///
/// Cheap to clone; all clones share the same queue and workers.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: DispatchConfig,
    sender: RwLock<Option<flume::Sender<Bytes>>>,
    closed: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sink: SinkRef,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Creates the queue and spawns `max_workers` workers.
    ///
    /// Must be called from within a Tokio runtime. Dropping every handle
    /// without calling [`flush`](Self::flush) lets the workers drain in the
    /// background but never closes the sink.
    #[must_use]
    pub fn new(sink: SinkRef, cfg: DispatchConfig) -> Self {
        let (tx, rx) = flume::bounded::<Bytes>(cfg.max_jobs_clamped());
        let extra = Arc::new(cfg.extra.clone());
        let counters = Arc::new(Counters::default());

        let workers = (0..cfg.max_workers_clamped())
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    rx.clone(),
                    Arc::clone(&sink),
                    Arc::clone(&extra),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                cfg,
                sender: RwLock::new(Some(tx)),
                closed: AtomicBool::new(false),
                workers: Mutex::new(workers),
                sink,
                counters,
            }),
        }
    }

    /// Enqueues a copy of `payload` without blocking.
    ///
    /// Always returns `Ok(payload.len())`: a record discarded because the
    /// dispatcher is closed or the queue is full is indistinguishable from an
    /// accepted one to the caller. The two cases are counted in [`stats`](Self::stats).
    pub fn write(&self, payload: &[u8]) -> io::Result<usize> {
        let len = payload.len();
        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.counters.dropped_closed();
            return Ok(len);
        }

        let full = {
            let sender = self
                .inner
                .sender
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match sender.as_ref() {
                None => {
                    self.inner.counters.dropped_closed();
                    false
                }
                Some(tx) if tx.is_full() => true,
                Some(tx) => match tx.try_send(Bytes::copy_from_slice(payload)) {
                    Ok(()) => {
                        self.inner.counters.accepted();
                        false
                    }
                    Err(TrySendError::Full(_)) => true,
                    Err(TrySendError::Disconnected(_)) => {
                        self.inner.counters.dropped_closed();
                        false
                    }
                },
            }
        };
        if full {
            self.overflow();
        }
        Ok(len)
    }

    /// Closes the queue, waits for the workers to drain it, then closes the sink.
    ///
    /// Idempotent: only the first call does the work; later calls return
    /// immediately. Never fails: a sink close error is logged.
    pub async fn flush(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.close_queue();

        for (id, handle) in self.take_workers().into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(target: DIAGNOSTIC_TARGET, worker = id, error = %e, "dispatch worker aborted");
            }
        }

        match catch_panic(self.inner.sink.close()).await {
            Ok(Ok(())) => debug!(target: DIAGNOSTIC_TARGET, "sink closed"),
            Ok(Err(e)) => {
                error!(target: DIAGNOSTIC_TARGET, error = %e, label = e.as_label(), "failed to close sink");
            }
            Err(info) => error!(target: DIAGNOSTIC_TARGET, panic = %info, "sink panicked while closing"),
        }
    }

    /// `true` once [`flush`](Self::flush) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of records waiting in the queue.
    pub fn pending(&self) -> usize {
        self.inner
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, flume::Sender::len)
    }

    /// Snapshot of the dispatcher's counters.
    pub fn stats(&self) -> DispatchStats {
        self.inner.counters.snapshot()
    }

    /// Configuration the dispatcher was built with.
    pub fn config(&self) -> &DispatchConfig {
        &self.inner.cfg
    }

    fn overflow(&self) {
        let dropped = self.inner.counters.dropped_full();
        warn!(
            target: DIAGNOSTIC_TARGET,
            capacity = self.inner.cfg.max_jobs_clamped(),
            dropped,
            "dispatch queue full; record discarded"
        );
    }

    /// Drops the only sender; workers see the queue disconnect once it is empty.
    fn close_queue(&self) {
        let mut sender = self
            .inner
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sender.take();
    }

    fn take_workers(&self) -> Vec<JoinHandle<()>> {
        let mut workers = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *workers)
    }
}

/// Pulls records until the queue is closed and empty.
async fn worker(
    id: usize,
    rx: flume::Receiver<Bytes>,
    sink: SinkRef,
    extra: Arc<HashMap<String, String>>,
    counters: Arc<Counters>,
) {
    while let Ok(payload) = rx.recv_async().await {
        match catch_panic(sink.exec(&extra, payload)).await {
            Ok(Ok(())) => counters.delivered(),
            Ok(Err(e)) => {
                counters.failed();
                error!(target: DIAGNOSTIC_TARGET, worker = id, error = %e, label = e.as_label(), "failed to deliver record");
            }
            Err(info) => {
                counters.panicked();
                error!(target: DIAGNOSTIC_TARGET, worker = id, panic = %info, "sink panicked while delivering record");
            }
        }
    }
    debug!(target: DIAGNOSTIC_TARGET, worker = id, "dispatch worker drained");
}
