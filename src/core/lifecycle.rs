//! # Supervisor lifecycle: shared cancellation token plus state machine.
//!
//! ```text
//! Idle ──run()──► Running ──stop() / signal / service error / parent cancel──► Stopping
//!                                                                                 │
//!                                                          all tasks returned ────▼
//!                                                                              Stopped
//! ```
//!
//! ## Rules
//! - The token is derived once, at construction; cancellation never un-fires
//! - `stop()` is idempotent, never blocks and never fails
//! - State only moves forward

use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;

/// Observable supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SupervisorState {
    /// Constructed, `run` not called yet.
    Idle = 0,
    /// `run` in progress, no shutdown requested.
    Running = 1,
    /// Shutdown requested; waiting for services to return.
    Stopping = 2,
    /// `run` returned.
    Stopped = 3,
}

impl SupervisorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SupervisorState::Idle,
            1 => SupervisorState::Running,
            2 => SupervisorState::Stopping,
            _ => SupervisorState::Stopped,
        }
    }
}

/// Cancellation token and state shared by the supervisor and its tasks.
pub(crate) struct Lifecycle {
    token: CancellationToken,
    state: AtomicU8,
}

impl Lifecycle {
    /// Derives the lifecycle token from `parent`, or a fresh root.
    pub(crate) fn new(parent: Option<&CancellationToken>) -> Self {
        let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
        Self {
            token,
            state: AtomicU8::new(SupervisorState::Idle as u8),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn state(&self) -> SupervisorState {
        SupervisorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Idle → Running`; `false` if the supervisor already ran.
    pub(crate) fn begin(&self) -> bool {
        self.advance(SupervisorState::Idle, SupervisorState::Running)
    }

    /// Requests shutdown.
    pub(crate) fn stop(&self) {
        self.token.cancel();
        self.mark_stopping();
    }

    /// `Running → Stopping`; no-op in any other state.
    pub(crate) fn mark_stopping(&self) {
        self.advance(SupervisorState::Running, SupervisorState::Stopping);
    }

    /// Stops and finishes the lifecycle when dropped, however `run` exits.
    pub(crate) fn finish_on_drop(&self) -> FinishGuard<'_> {
        FinishGuard(self)
    }

    /// Terminal transition.
    pub(crate) fn finish(&self) {
        self.state
            .store(SupervisorState::Stopped as u8, Ordering::Release);
    }

    fn advance(&self, from: SupervisorState, to: SupervisorState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// See [`Lifecycle::finish_on_drop`].
pub(crate) struct FinishGuard<'a>(&'a Lifecycle);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.stop();
        self.0.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_forward_only() {
        let lc = Lifecycle::new(None);
        assert_eq!(lc.state(), SupervisorState::Idle);

        lc.mark_stopping();
        assert_eq!(lc.state(), SupervisorState::Idle);

        assert!(lc.begin());
        assert!(!lc.begin());
        assert_eq!(lc.state(), SupervisorState::Running);

        lc.stop();
        lc.stop();
        assert_eq!(lc.state(), SupervisorState::Stopping);
        assert!(lc.token().is_cancelled());

        lc.finish();
        lc.mark_stopping();
        assert_eq!(lc.state(), SupervisorState::Stopped);
    }

    #[test]
    fn finish_guard_stops_and_finishes() {
        let lc = Lifecycle::new(None);
        assert!(lc.begin());
        drop(lc.finish_on_drop());
        assert!(lc.token().is_cancelled());
        assert_eq!(lc.state(), SupervisorState::Stopped);
    }

    #[test]
    fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let lc = Lifecycle::new(Some(&parent));
        assert!(!lc.token().is_cancelled());

        parent.cancel();
        assert!(lc.token().is_cancelled());
    }

    #[test]
    fn own_cancellation_does_not_reach_parent() {
        let parent = CancellationToken::new();
        let lc = Lifecycle::new(Some(&parent));
        lc.stop();
        assert!(!parent.is_cancelled());
    }
}
