//! # Per-task error boundary.
//!
//! Every unit of work the runtime drives on behalf of user code (a service's
//! `start`/`stop`, a sink's `exec`/`close`) runs inside [`catch_panic`], which
//! turns a panic into a plain `Err(String)` at the task boundary instead of
//! tearing the task (and whatever awaits it) down.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if user code holds a `Mutex` guard while panicking.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

/// Polls `fut` to completion, converting a panic into `Err(info)`.
pub(crate) async fn catch_panic<F>(fut: F) -> Result<F::Output, String>
where
    F: Future,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| panic_info(&*payload))
}

/// Renders a panic payload (`&str` / `String`) as text.
pub(crate) fn panic_info(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
