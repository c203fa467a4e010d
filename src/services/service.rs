//! # Service capability.
//!
//! A [`Service`] is anything the [`Supervisor`](crate::Supervisor) can start and
//! stop: an HTTP listener, a queue consumer, a background scheduler. The common
//! handle type is [`ServiceRef`], an `Arc<dyn Service>` shared with the runtime.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Shared handle to a supervised service.
pub type ServiceRef = Arc<dyn Service>;

/// # Long-running unit with an explicit start/stop lifecycle.
///
/// The supervisor calls [`start`](Service::start) and, once shutdown begins,
/// [`stop`](Service::stop) concurrently on every service.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use appvisor::{Service, ServiceError};
///
/// #[derive(Default)]
/// struct Ticker {
///     stopped: AtomicBool,
/// }
///
/// #[async_trait]
/// impl Service for Ticker {
///     async fn start(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
///
///     async fn stop(&self, _ctx: CancellationToken) -> Result<(), ServiceError> {
///         self.stopped.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Runs the service until it is stopped or fails.
    ///
    /// `ctx` is the supervisor's lifecycle token; it is cancelled when shutdown
    /// begins. Returning `Err` (other than [`ServiceError::Canceled`]) stops the
    /// whole group and becomes the supervisor's result.
    async fn start(&self, ctx: CancellationToken) -> Result<(), ServiceError>;

    /// Requests a graceful stop.
    ///
    /// Called once, after the lifecycle token is cancelled. `ctx` is cancelled
    /// when the supervisor's grace deadline passes (never, if none is configured).
    async fn stop(&self, ctx: CancellationToken) -> Result<(), ServiceError>;
}
