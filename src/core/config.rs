//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the constructor-time settings of a
//! [`Supervisor`](crate::Supervisor).
//!
//! ## Sentinel values
//! - `grace = 0s` → no stop deadline (the context handed to `Service::stop` is never cancelled)
//! - `signals = []` → no OS signal handling; only [`Supervisor::stop`](crate::Supervisor::stop)
//!   or a failing service ends the run

use std::time::Duration;

use crate::core::shutdown::Signal;

/// Configuration for a supervisor.
///
/// ## Field semantics
/// - `name`, `version`: informational, attached to the supervisor's log span
/// - `signals`: OS signals that trigger a graceful stop
/// - `grace`: deadline for `Service::stop` once shutdown begins (`0s` = none)
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Application name.
    pub name: String,

    /// Application version.
    pub version: String,

    /// Signals that trigger a graceful stop.
    ///
    /// A forceful kill is not representable: the process must stay killable
    /// unconditionally.
    pub signals: Vec<Signal>,

    /// How long services get to stop before their stop context is cancelled.
    ///
    /// The supervisor still waits for every `stop` to return; the deadline is
    /// a cooperative hint, like the lifecycle token itself.
    pub grace: Duration,
}

impl SupervisorConfig {
    /// Returns the stop deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → stop context cancelled `d` after shutdown begins
    #[inline]
    pub fn stop_deadline(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `name = ""`, `version = ""`
    /// - `signals = [Terminate, Quit, Interrupt]`
    /// - `grace = 0s` (no deadline)
    fn default() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            signals: Signal::DEFAULT.to_vec(),
            grace: Duration::ZERO,
        }
    }
}
