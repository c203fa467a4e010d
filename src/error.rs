//! Error types used by the supervisor, the dispatcher and their collaborators.
//!
//! - [`ServiceError`]: errors returned by a [`Service`](crate::Service) start/stop.
//! - [`SinkError`]: errors returned by a [`Sink`](crate::Sink) exec/close.
//! - [`RuntimeError`]: the terminal outcome of [`Supervisor::run`](crate::Supervisor::run).
//! - [`LoggingError`]: failures while building the logging stack.
//!
//! Every enum provides `as_label` (stable snake_case label for logs).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which side of a service's lifecycle produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `Service::start`.
    Start,
    /// `Service::stop`.
    Stop,
    /// The supervisor's own signal watcher.
    Signal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Start => "start",
            Phase::Stop => "stop",
            Phase::Signal => "signal",
        })
    }
}

/// # Errors produced by a supervised service.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service failed.
    #[error("service failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// An I/O error, typically from binding or serving a socket.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The service observed cancellation and exited. Treated as a clean exit.
    #[error("context cancelled")]
    Canceled,
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ServiceError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use appvisor::ServiceError;
    ///
    /// assert_eq!(ServiceError::fail("boom").as_label(), "service_failed");
    /// assert_eq!(ServiceError::Canceled.as_label(), "service_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Io(_) => "service_io",
            ServiceError::Canceled => "service_canceled",
        }
    }

    /// `true` for a plain cancellation, which never counts as a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ServiceError::Canceled)
    }
}

/// # Errors produced by a dispatch sink.
///
/// These never leave the dispatcher: workers log them and move on.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// Delivery failed.
    #[error("sink failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Writing to the destination failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The payload could not be decoded or encoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SinkError {
    /// Shorthand for [`SinkError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        SinkError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Fail { .. } => "sink_failed",
            SinkError::Io(_) => "sink_io",
            SinkError::Json(_) => "sink_json",
        }
    }
}

/// # Errors produced by the supervisor runtime.
///
/// [`RuntimeError::Canceled`] (and a service returning
/// [`ServiceError::Canceled`]) are benign: they are never returned from
/// [`Supervisor::run`](crate::Supervisor::run).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A service's `start` or `stop` returned an error.
    #[error("service #{service} {phase} failed: {source}")]
    Service {
        /// Index of the service in the supervised set.
        service: usize,
        /// Which call failed.
        phase: Phase,
        /// The error returned by the service, unchanged.
        #[source]
        source: ServiceError,
    },

    /// A service's `start` or `stop` panicked.
    #[error("service #{service} {phase} panicked: {info}")]
    Panicked {
        /// Index of the service in the supervised set.
        service: usize,
        /// Which call panicked.
        phase: Phase,
        /// Rendered panic payload.
        info: String,
    },

    /// Installing the OS signal handlers failed.
    #[error("signal registration failed: {0}")]
    Signal(#[source] io::Error),

    /// The lifecycle context was cancelled.
    #[error("context cancelled")]
    Canceled,

    /// `run` was called on a supervisor that already ran.
    #[error("supervisor already started")]
    AlreadyStarted,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use appvisor::{Phase, RuntimeError, ServiceError};
    ///
    /// let err = RuntimeError::Service {
    ///     service: 0,
    ///     phase: Phase::Start,
    ///     source: ServiceError::fail("bind"),
    /// };
    /// assert_eq!(err.as_label(), "runtime_service_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Service { .. } => "runtime_service_failed",
            RuntimeError::Panicked { .. } => "runtime_service_panicked",
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::Canceled => "runtime_canceled",
            RuntimeError::AlreadyStarted => "runtime_already_started",
        }
    }

    /// `true` when the error is a plain cancellation and must not be surfaced.
    pub fn is_canceled(&self) -> bool {
        match self {
            RuntimeError::Canceled => true,
            RuntimeError::Service { source, .. } => source.is_canceled(),
            _ => false,
        }
    }
}

/// # Errors produced while building the logging stack.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoggingError {
    /// The configured level is not a valid level filter.
    #[error("invalid log level {level:?}")]
    Level {
        /// The rejected value.
        level: String,
    },

    /// A hook sink could not be created.
    #[error("hook sink: {0}")]
    Sink(#[from] SinkError),

    /// The log file appender could not be set up.
    #[error("log file {path:?}: {error}")]
    File {
        /// The configured log file path.
        path: PathBuf,
        /// The underlying error message.
        error: String,
    },

    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

impl LoggingError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoggingError::Level { .. } => "logging_level",
            LoggingError::Sink(_) => "logging_sink",
            LoggingError::File { .. } => "logging_file",
            LoggingError::AlreadyInitialized => "logging_already_initialized",
        }
    }
}
