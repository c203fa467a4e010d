//! # Cross-platform OS signal handling.
//!
//! Provides [`Signal`], the set of catchable termination signals, and
//! [`SignalListener`], which registers a configured set up front and then
//! resolves when any of them arrives.
//!
//! ## Signals
//! **Unix platforms:** every [`Signal`] variant maps to its `SIGxxx` counterpart.
//!
//! **Other platforms:** only [`Signal::Interrupt`] is honoured, via
//! [`tokio::signal::ctrl_c`]; the other variants never fire.
//!
//! `SIGKILL` (and `SIGSTOP`) have no variant: they cannot be caught, and the
//! process has to remain killable unconditionally.

use std::fmt;
use std::io;

/// A catchable termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGINT` (Ctrl-C in a terminal).
    Interrupt,
    /// `SIGTERM` (default kill signal, used by systemd/Kubernetes).
    Terminate,
    /// `SIGQUIT`.
    Quit,
    /// `SIGHUP`.
    Hangup,
    /// `SIGUSR1`.
    User1,
    /// `SIGUSR2`.
    User2,
}

impl Signal {
    /// The default set: `SIGTERM`, `SIGQUIT`, `SIGINT`.
    pub const DEFAULT: [Signal; 3] = [Signal::Terminate, Signal::Quit, Signal::Interrupt];

    /// Conventional signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
            Signal::Hangup => "SIGHUP",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Quit => SignalKind::quit(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener for a fixed set of signals.
///
/// Handlers are installed by [`register`](Self::register), so signals that
/// arrive between registration and the first [`recv`](Self::recv) are not lost.
#[cfg(unix)]
pub struct SignalListener {
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl SignalListener {
    /// Installs handlers for `signals` (duplicates are ignored).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(signals: &[Signal]) -> io::Result<Self> {
        let mut streams: Vec<(Signal, tokio::signal::unix::Signal)> =
            Vec::with_capacity(signals.len());
        for &sig in signals {
            if streams.iter().any(|(s, _)| *s == sig) {
                continue;
            }
            streams.push((sig, tokio::signal::unix::signal(sig.kind())?));
        }
        Ok(Self { streams })
    }

    /// Waits for the next signal.
    ///
    /// Never resolves for an empty set. Returns `None` if the runtime's signal
    /// driver went away.
    pub async fn recv(&mut self) -> Option<Signal> {
        if self.streams.is_empty() {
            return futures::future::pending().await;
        }
        let waits = self.streams.iter_mut().map(|(sig, stream)| {
            let sig = *sig;
            Box::pin(async move { stream.recv().await.map(|()| sig) })
        });
        let (received, _, _) = futures::future::select_all(waits).await;
        received
    }
}

/// Listener for a fixed set of signals.
///
/// Only [`Signal::Interrupt`] is supported on this platform.
#[cfg(not(unix))]
pub struct SignalListener {
    interrupt: bool,
}

#[cfg(not(unix))]
impl SignalListener {
    /// Records whether Ctrl-C should be observed.
    pub fn register(signals: &[Signal]) -> io::Result<Self> {
        Ok(Self {
            interrupt: signals.contains(&Signal::Interrupt),
        })
    }

    /// Waits for Ctrl-C, or forever if it is not part of the set.
    pub async fn recv(&mut self) -> Option<Signal> {
        if !self.interrupt {
            return futures::future::pending().await;
        }
        tokio::signal::ctrl_c().await.ok().map(|()| Signal::Interrupt)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn names() {
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
        assert_eq!(Signal::User2.as_str(), "SIGUSR2");
    }

    #[tokio::test]
    async fn empty_set_never_fires() {
        let mut listener = SignalListener::register(&[]).expect("register");
        let res = tokio::time::timeout(Duration::from_millis(50), listener.recv()).await;
        assert!(res.is_err(), "empty listener must stay pending");
    }

    #[tokio::test]
    async fn duplicate_signals_register_once() {
        let listener = SignalListener::register(&[Signal::User1, Signal::User1])
            .expect("register");
        #[cfg(unix)]
        assert_eq!(listener.streams.len(), 1);
        let _ = listener;
    }
}
