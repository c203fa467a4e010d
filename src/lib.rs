//! # appvisor
//!
//! **Appvisor** is the process skeleton of a long-running Tokio application:
//! it starts a fixed set of services, stops them together on the first
//! failure, an OS signal or an explicit request, and ships logs to slow sinks
//! without ever blocking the code that logs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Service    │   │   Service    │   │   Service    │
//!     │ (http, #0)   │   │ (grpc, #1)   │   │ (cron, #2)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - lifecycle token (CancellationToken, optional parent)           │
//! │  - SignalListener (SIGTERM / SIGQUIT / SIGINT by default)         │
//! │  - per service: starter task + stop watcher task                  │
//! │  - first real error wins, cancels everything                      │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ run() returns
//!                                ▼
//!                         LogGuard::flush()
//!                                │
//! ┌──────────────────────────────▼────────────────────────────────────┐
//! │  Dispatcher (one per log hook)                                    │
//! │  write() ──► [bounded queue] ──► workers ──► Sink::exec           │
//! │  full → drop + warn     closed → drop     flush → drain + close   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Shutdown sequence
//! ```text
//! signal / stop() / error / parent cancel
//!   └─► token.cancel()
//!         ├─► every service: stop(stop_ctx)      (grace deadline, if set)
//!         └─► run() waits for all starters and stop watchers
//! run() returns Ok | first RuntimeError
//!   └─► LogGuard::flush(): close queues → workers drain → Sink::close
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types / traits                        |
//! |-----------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Supervision** | Concurrent start, coordinated stop, first-error aggregation.  | [`Supervisor`], [`SupervisorBuilder`]     |
//! | **Services**    | Units with a start/stop lifecycle, as traits or closures.     | [`Service`], [`ServiceFn`], [`ServiceRef`]|
//! | **Dispatch**    | Non-blocking bounded hand-off to a slow sink.                 | [`Dispatcher`], [`Sink`], [`DispatchStats`]|
//! | **Logging**     | `tracing` subscriber with dispatched JSON hooks.              | [`logging::init`], [`logging::LogGuard`]  |
//! | **Errors**      | Typed errors with stable labels.                              | [`RuntimeError`], [`ServiceError`]        |
//! | **Configuration**| Plain structs, serde-loadable where it matters.              | [`SupervisorConfig`], [`DispatchConfig`]  |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use appvisor::{ServiceError, ServiceFn, ServiceRef, Supervisor, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         name: "hello".into(),
//!         version: "1.0.0".into(),
//!         signals: Vec::new(),
//!         grace: Duration::from_secs(5),
//!     };
//!
//!     let worker: ServiceRef = ServiceFn::arc(
//!         |ctx: CancellationToken| async move {
//!             ctx.cancelled().await;
//!             Ok::<_, ServiceError>(())
//!         },
//!         |_ctx: CancellationToken| async { Ok::<_, ServiceError>(()) },
//!     );
//!
//!     let sup = Supervisor::builder(cfg).with_service(worker).build();
//!     sup.stop();
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod dispatch;
mod error;
pub mod logging;
mod panic;
mod services;

// ---- Public re-exports ----

pub use core::{
    Signal, SignalListener, Supervisor, SupervisorBuilder, SupervisorConfig, SupervisorState,
};
pub use dispatch::{
    DIAGNOSTIC_TARGET, DispatchConfig, DispatchStats, DispatchWriter, Dispatcher, JsonLinesSink,
    Sink, SinkRef,
};
pub use error::{LoggingError, Phase, RuntimeError, ServiceError, SinkError};
pub use services::{Service, ServiceFn, ServiceRef};
