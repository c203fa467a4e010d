//! # Example: Graceful shutdown with dispatched logs
//!
//! Two services run under one supervisor; logs go to the console and, through
//! a dispatcher, to a JSON-lines hook on stdout. The run ends on Ctrl-C /
//! SIGTERM, or after three seconds.
//!
//! Run with: `cargo run --example graceful`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use appvisor::logging::{self, HookConfig, LogConfig, LogFormat};
use appvisor::{
    JsonLinesSink, ServiceError, ServiceFn, ServiceRef, SinkRef, Supervisor, SupervisorConfig,
};

/// Ticks until cancelled; `stop` reports how many ticks happened.
fn ticker(name: &'static str, every: Duration) -> ServiceRef {
    let ticks = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&ticks);

    ServiceFn::arc(
        move |ctx: CancellationToken| {
            let ticks = Arc::clone(&ticks);
            async move {
                tracing::info!(service = name, "started");
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => return Ok::<_, ServiceError>(()),
                        _ = tokio::time::sleep(every) => {
                            let n = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                            tracing::info!(service = name, tick = n, "tick");
                        }
                    }
                }
            }
        },
        move |_ctx: CancellationToken| {
            let seen = Arc::clone(&seen);
            async move {
                tracing::info!(service = name, ticks = seen.load(Ordering::Relaxed), "stopped");
                Ok::<_, ServiceError>(())
            }
        },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_cfg = LogConfig {
        format: LogFormat::Compact,
        hooks: vec![HookConfig {
            enable: true,
            kind: "stdout".into(),
            max_thread: 1,
            extra: [("app".to_string(), "graceful".to_string())].into(),
            ..HookConfig::default()
        }],
        ..LogConfig::default()
    };
    let guard = logging::init(&log_cfg, |hook| match hook.kind.as_str() {
        "stdout" => Ok(Some(Arc::new(JsonLinesSink::stdout()) as SinkRef)),
        _ => Ok(None),
    })?;

    let cfg = SupervisorConfig {
        name: "graceful".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        grace: Duration::from_secs(5),
        ..SupervisorConfig::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_service(ticker("api", Duration::from_millis(400)))
        .with_service(ticker("jobs", Duration::from_millis(700)))
        .build();

    let token = sup.token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        token.cancel();
    });

    let result = sup.run().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, label = e.as_label(), "supervisor failed");
    }

    let hook = guard.dispatchers().first().cloned();
    guard.flush().await;
    if let Some(stats) = hook.map(|d| d.stats()) {
        println!(
            "hook: accepted={} delivered={} dropped={}",
            stats.accepted,
            stats.delivered,
            stats.dropped()
        );
    }

    result?;
    Ok(())
}
