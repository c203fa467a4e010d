//! # The three kinds of task a supervisor run is made of.
//!
//! For every service the supervisor spawns a **starter** and a **stop watcher**;
//! for the whole run it spawns one **signal watcher**.
//!
//! ```text
//! starter:        start(ctx) ─────────────────────────────► Ok / Err(Service{Start})
//! stop watcher:   ctx.cancelled() ──► stop(stop_ctx) ─────► Ok / Err(Service{Stop})
//! signal watcher: select { ctx.cancelled() ──────────────► Err(Canceled)   (benign)
//!                          signal received ──► stop() ───► Ok }
//! ```
//!
//! ## Rules
//! - Service calls run inside the panic boundary; a panic becomes `RuntimeError::Panicked`
//! - Errors are returned unchanged, wrapped with the service index and phase
//! - Cancellation is cooperative: the runner never aborts a service future

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::lifecycle::Lifecycle;
use crate::core::shutdown::SignalListener;
use crate::error::{Phase, RuntimeError, ServiceError};
use crate::panic::catch_panic;
use crate::services::ServiceRef;

/// Runs `Service::start` for service `index`.
pub(super) async fn run_start(
    index: usize,
    service: ServiceRef,
    ctx: CancellationToken,
) -> Result<(), RuntimeError> {
    debug!(service = index, "service starting");
    let res = catch_panic(service.start(ctx)).await;
    let out = settle(index, Phase::Start, res);
    if out.is_ok() {
        debug!(service = index, "service start returned");
    }
    out
}

/// Waits for shutdown, then runs `Service::stop` for service `index`.
pub(super) async fn watch_stop(
    index: usize,
    service: ServiceRef,
    lifecycle: Arc<Lifecycle>,
    stop_ctx: CancellationToken,
) -> Result<(), RuntimeError> {
    lifecycle.token().cancelled().await;
    lifecycle.mark_stopping();

    debug!(service = index, "service stopping");
    let res = catch_panic(service.stop(stop_ctx)).await;
    let out = settle(index, Phase::Stop, res);
    if out.is_ok() {
        debug!(service = index, "service stopped");
    }
    out
}

/// Waits for a configured OS signal or for the lifecycle token.
///
/// A signal requests a supervisor-level stop and counts as a clean exit;
/// cancellation from any other source returns the benign [`RuntimeError::Canceled`].
pub(super) async fn watch_signals(
    mut listener: SignalListener,
    lifecycle: Arc<Lifecycle>,
) -> Result<(), RuntimeError> {
    let token = lifecycle.token().clone();
    tokio::select! {
        _ = token.cancelled() => Err(RuntimeError::Canceled),
        received = listener.recv() => match received {
            Some(sig) => {
                info!(signal = %sig, "shutdown signal received");
                lifecycle.stop();
                Ok(())
            }
            None => {
                warn!("signal driver closed; waiting for programmatic stop");
                token.cancelled().await;
                Err(RuntimeError::Canceled)
            }
        },
    }
}

/// Converts a (panic-guarded) service result into the runtime's error space.
fn settle(
    index: usize,
    phase: Phase,
    res: Result<Result<(), ServiceError>, String>,
) -> Result<(), RuntimeError> {
    match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(RuntimeError::Service {
            service: index,
            phase,
            source,
        }),
        Err(info) => Err(RuntimeError::Panicked {
            service: index,
            phase,
            info,
        }),
    }
}
