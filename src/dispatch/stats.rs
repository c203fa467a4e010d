use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a dispatcher's counters.
///
/// `dropped_full` and `dropped_closed` are both silent to the writer; they are
/// counted apart so an operator can tell overload from late writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Payloads enqueued.
    pub accepted: u64,
    /// `exec` calls that returned `Ok`.
    pub delivered: u64,
    /// `exec` calls that returned `Err`.
    pub failed: u64,
    /// `exec` calls that panicked.
    pub panicked: u64,
    /// Writes discarded because the queue was full.
    pub dropped_full: u64,
    /// Writes discarded because the dispatcher was closed.
    pub dropped_closed: u64,
}

impl DispatchStats {
    /// Total payloads handed to the sink (whatever the outcome).
    pub fn handled(&self) -> u64 {
        self.delivered + self.failed + self.panicked
    }

    /// Total writes discarded.
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_closed
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    dropped_full: AtomicU64,
    dropped_closed: AtomicU64,
}

impl Counters {
    #[inline]
    pub(crate) fn accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new total.
    #[inline]
    pub(crate) fn dropped_full(&self) -> u64 {
        self.dropped_full.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub(crate) fn dropped_closed(&self) {
        self.dropped_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
        }
    }
}
