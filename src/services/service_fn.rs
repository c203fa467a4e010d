//! # Closure-backed service (`ServiceFn`)
//!
//! [`ServiceFn`] wraps two closures `Fn(CancellationToken) -> Fut`, one for
//! `start` and one for `stop`, producing a fresh future per call. Shared state
//! between the two goes through an explicit `Arc<...>` captured by both.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use appvisor::{ServiceError, ServiceFn, ServiceRef};
//!
//! let svc: ServiceRef = ServiceFn::arc(
//!     |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Ok::<_, ServiceError>(())
//!     },
//!     |_ctx: CancellationToken| async { Ok::<_, ServiceError>(()) },
//! );
//! # let _ = svc;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::services::Service;

/// Closure-backed service implementation.
pub struct ServiceFn<S, T> {
    start: S,
    stop: T,
}

impl<S, T> ServiceFn<S, T> {
    /// Creates a new closure-backed service.
    ///
    /// Prefer [`ServiceFn::arc`] when you immediately need a [`ServiceRef`](crate::ServiceRef).
    pub fn new(start: S, stop: T) -> Self {
        Self { start, stop }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc(start: S, stop: T) -> Arc<Self> {
        Arc::new(Self::new(start, stop))
    }
}

#[async_trait]
impl<S, SFut, T, TFut> Service for ServiceFn<S, T>
where
    S: Fn(CancellationToken) -> SFut + Send + Sync + 'static,
    SFut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    T: Fn(CancellationToken) -> TFut + Send + Sync + 'static,
    TFut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    async fn start(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        (self.start)(ctx).await
    }

    async fn stop(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        (self.stop)(ctx).await
    }
}
