//! # Supervisor: concurrent start, coordinated stop, first-error aggregation.
//!
//! The [`Supervisor`] owns one lifecycle [`CancellationToken`] and a fixed,
//! ordered set of [`Service`](crate::Service)s. [`Supervisor::run`] starts them
//! all at once and returns when every one of them has stopped.
//!
//! ## High-level architecture
//! ```text
//! run():
//!   SignalListener::register(cfg.signals)        (failure → RuntimeError::Signal)
//!
//!   service[0]  service[1]  ...  service[N-1]
//!       │           │                 │
//!       ├──► starter:      start(token)
//!       └──► stop watcher: token.cancelled() → stop(stop_ctx)
//!   signal watcher: signal → Supervisor::stop() | token.cancelled() → Canceled
//!
//! Join loop (JoinSet):
//!   Ok / benign (Canceled)  → ignored
//!   first real error        → token.cancel(), remembered
//!   later real errors       → logged
//!
//! Shutdown triggers (all converge on token.cancel()):
//!   OS signal ─┐
//!   stop()  ───┼──► token cancelled ──► every stop watcher calls stop(stop_ctx)
//!   error   ───┤                         (grace deadline cancels stop_ctx, if set)
//!   parent  ───┘
//! ```
//!
//! - A service whose `start` returns `Ok` does not end the run; the run ends
//!   once shutdown was requested and every `stop` has returned.
//! - A `stop` failing after cancellation still contributes its error.
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
//!         name: "demo".into(),
//!         signals: Vec::new(),
//!         ..SupervisorConfig::default()
//!     };
//!
//!     let ticker: ServiceRef = ServiceFn::arc(
//!         |ctx: CancellationToken| async move {
//!             ctx.cancelled().await;
//!             Ok::<_, ServiceError>(())
//!         },
//!         |_ctx: CancellationToken| async { Ok::<_, ServiceError>(()) },
//!     );
//!
//!     let sup = Supervisor::builder(cfg).with_service(ticker).build();
//!     let token = sup.token();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         token.cancel();
//!     });
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::lifecycle::{Lifecycle, SupervisorState};
use crate::core::runner;
use crate::core::shutdown::SignalListener;
use crate::error::{Phase, RuntimeError};
use crate::panic::panic_info;
use crate::services::ServiceRef;

/// Starts a set of services together and stops them together.
pub struct Supervisor {
    cfg: SupervisorConfig,
    services: Vec<ServiceRef>,
    lifecycle: Arc<Lifecycle>,
}

impl Supervisor {
    /// Creates a supervisor over `services`.
    ///
    /// The lifecycle token is derived from `parent` (cancelling the parent stops
    /// the supervisor; stopping the supervisor never cancels the parent), or is
    /// a fresh root token when `parent` is `None`.
    pub fn new(
        cfg: SupervisorConfig,
        services: Vec<ServiceRef>,
        parent: Option<CancellationToken>,
    ) -> Self {
        Self {
            lifecycle: Arc::new(Lifecycle::new(parent.as_ref())),
            cfg,
            services,
        }
    }

    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.cfg.version
    }

    /// Supervisor configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        self.lifecycle.state()
    }

    /// A clone of the lifecycle token.
    ///
    /// Cancelling it is equivalent to [`stop`](Self::stop).
    pub fn token(&self) -> CancellationToken {
        self.lifecycle.token().clone()
    }

    /// Requests shutdown.
    ///
    /// Idempotent, non-blocking and infallible. It does not wait for services
    /// to finish; that happens inside [`run`](Self::run).
    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    /// Starts every service and blocks until all of them have stopped.
    ///
    /// Returns the first error that is not a plain cancellation, or `Ok(())`.
    /// If the signal handlers cannot be installed, no service is started and
    /// [`RuntimeError::Signal`] is returned. A supervisor runs at most once;
    /// a second call returns [`RuntimeError::AlreadyStarted`].
    ///
    /// Dropping the returned future part-way aborts the service tasks,
    /// cancels the lifecycle token and leaves the supervisor `Stopped`.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        if !self.lifecycle.begin() {
            return Err(RuntimeError::AlreadyStarted);
        }
        let _finish = self.lifecycle.finish_on_drop();
        let span = info_span!(
            "supervisor",
            app = %self.cfg.name,
            app_version = %self.cfg.version,
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<(), RuntimeError> {
        let listener = SignalListener::register(&self.cfg.signals).map_err(|e| {
            error!(error = %e, "failed to install signal handlers");
            self.lifecycle.stop();
            RuntimeError::Signal(e)
        })?;

        info!(services = self.services.len(), "supervisor starting");

        let stop_ctx = CancellationToken::new();
        let _stop_guard = stop_ctx.clone().drop_guard();
        self.arm_grace(&stop_ctx);

        let mut set = JoinSet::new();
        let mut tasks = TaskIndex::new();
        self.spawn_services(&mut set, &mut tasks, &stop_ctx);
        let watcher = set.spawn(
            runner::watch_signals(listener, Arc::clone(&self.lifecycle)).in_current_span(),
        );
        tasks.insert(watcher.id(), (None, Phase::Signal));

        let res = self.join_all(&mut set, &tasks).await;
        match &res {
            Ok(()) => info!("supervisor stopped"),
            Err(e) => error!(error = %e, label = e.as_label(), "supervisor stopped with error"),
        }
        res
    }

    /// Spawns a starter and a stop watcher per service.
    fn spawn_services(
        &self,
        set: &mut JoinSet<Result<(), RuntimeError>>,
        tasks: &mut TaskIndex,
        stop_ctx: &CancellationToken,
    ) {
        for (index, service) in self.services.iter().enumerate() {
            let stopper = set.spawn(
                runner::watch_stop(
                    index,
                    Arc::clone(service),
                    Arc::clone(&self.lifecycle),
                    stop_ctx.clone(),
                )
                .in_current_span(),
            );
            tasks.insert(stopper.id(), (Some(index), Phase::Stop));

            let starter = set.spawn(
                runner::run_start(index, Arc::clone(service), self.token()).in_current_span(),
            );
            tasks.insert(starter.id(), (Some(index), Phase::Start));
        }
    }

    /// Cancels `stop_ctx` once the grace period has elapsed after shutdown began.
    ///
    /// The timer task exits early when `stop_ctx` is cancelled by `run` returning.
    fn arm_grace(&self, stop_ctx: &CancellationToken) {
        let Some(grace) = self.cfg.stop_deadline() else {
            return;
        };
        let token = self.token();
        let stop_ctx = stop_ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop_ctx.cancelled() => {}
                _ = async {
                    token.cancelled().await;
                    tokio::time::sleep(grace).await;
                } => {
                    info!(?grace, "grace period elapsed; cancelling stop context");
                    stop_ctx.cancel();
                }
            }
        });
    }

    /// Waits for every task; keeps the first non-benign error.
    async fn join_all(
        &self,
        set: &mut JoinSet<Result<(), RuntimeError>>,
        tasks: &TaskIndex,
    ) -> Result<(), RuntimeError> {
        let mut first: Option<RuntimeError> = None;

        while let Some(joined) = set.join_next().await {
            let Err(e) = joined_outcome(joined, tasks) else {
                continue;
            };
            if e.is_canceled() {
                continue;
            }

            self.lifecycle.stop();
            if first.is_none() {
                error!(error = %e, label = e.as_label(), "service failed; stopping all services");
                first = Some(e);
            } else {
                error!(error = %e, label = e.as_label(), "additional service failure");
            }
        }

        first.map_or(Ok(()), Err)
    }
}

/// Which service (`None` for the signal watcher) and phase each task runs.
type TaskIndex = HashMap<task::Id, (Option<usize>, Phase)>;

/// Maps a joined task to its outcome.
///
/// Service calls are panic-guarded inside the task, so a panicking
/// `JoinError` comes from the runner itself; it is reported against the
/// task's service and phase. An aborted task only happens while the runtime
/// shuts down and counts as cancellation.
fn joined_outcome(
    joined: Result<Result<(), RuntimeError>, JoinError>,
    tasks: &TaskIndex,
) -> Result<(), RuntimeError> {
    let err = match joined {
        Ok(res) => return res,
        Err(err) => err,
    };
    let owner = tasks.get(&err.id()).copied();
    if !err.is_panic() {
        error!(error = %err, "supervisor task aborted");
        return Err(RuntimeError::Canceled);
    }

    let info = panic_info(&*err.into_panic());
    match owner {
        Some((Some(service), phase)) => Err(RuntimeError::Panicked {
            service,
            phase,
            info,
        }),
        _ => Err(RuntimeError::Signal(io::Error::other(format!(
            "signal watcher panicked: {info}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{Phase, ServiceError};
    use crate::services::Service;

    #[derive(Default)]
    struct Probe {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: bool,
        panic_start: bool,
        fail_stop: bool,
        wait_stop_ctx: bool,
    }

    impl Probe {
        fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Service for Probe {
        async fn start(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.panic_start {
                panic!("probe start panic");
            }
            if self.fail_start {
                return Err(ServiceError::fail("probe start failed"));
            }
            ctx.cancelled().await;
            Err(ServiceError::Canceled)
        }

        async fn stop(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.wait_stop_ctx {
                ctx.cancelled().await;
            }
            if self.fail_stop {
                return Err(ServiceError::fail("probe stop failed"));
            }
            Ok(())
        }
    }

    fn quiet() -> SupervisorConfig {
        SupervisorConfig {
            name: "test".into(),
            version: "0.0.1".into(),
            signals: Vec::new(),
            ..SupervisorConfig::default()
        }
    }

    fn supervise(cfg: SupervisorConfig, probes: &[Arc<Probe>]) -> Arc<Supervisor> {
        let services = probes
            .iter()
            .map(|p| Arc::clone(p) as ServiceRef)
            .collect();
        Arc::new(Supervisor::new(cfg, services, None))
    }

    fn spawn_run(sup: &Arc<Supervisor>) -> tokio::task::JoinHandle<Result<(), RuntimeError>> {
        let sup = Arc::clone(sup);
        tokio::spawn(async move {
            tokio::time::timeout(Duration::from_secs(5), sup.run())
                .await
                .expect("supervisor hung")
        })
    }

    async fn settle_started(probes: &[Arc<Probe>]) {
        for _ in 0..200 {
            if probes.iter().all(|p| p.starts() == 1) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("services never started");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn programmatic_stop_is_clean() {
        let probes: Vec<Arc<Probe>> = (0..3).map(|_| Arc::new(Probe::default())).collect();
        let sup = supervise(quiet(), &probes);
        assert_eq!(sup.state(), SupervisorState::Idle);

        let run = spawn_run(&sup);
        settle_started(&probes).await;
        assert_eq!(sup.state(), SupervisorState::Running);

        sup.stop();
        sup.stop();
        run.await.expect("join").expect("clean shutdown");

        assert_eq!(sup.state(), SupervisorState::Stopped);
        for p in &probes {
            assert_eq!(p.starts(), 1);
            assert_eq!(p.stops(), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn start_failure_stops_every_service() {
        let probes = vec![
            Arc::new(Probe::default()),
            Arc::new(Probe {
                fail_start: true,
                ..Probe::default()
            }),
            Arc::new(Probe::default()),
        ];
        let sup = supervise(quiet(), &probes);

        let err = spawn_run(&sup).await.expect("join").unwrap_err();
        assert!(!err.is_canceled());
        assert!(matches!(
            err,
            RuntimeError::Service {
                service: 1,
                phase: Phase::Start,
                ..
            }
        ));
        for p in &probes {
            assert_eq!(p.stops(), 1, "every stop runs exactly once");
        }
        assert!(sup.token().is_cancelled());
    }

    #[tokio::test]
    async fn stop_failure_after_cancellation_is_reported() {
        let probes = vec![
            Arc::new(Probe {
                fail_stop: true,
                ..Probe::default()
            }),
            Arc::new(Probe::default()),
        ];
        let sup = supervise(quiet(), &probes);
        let run = spawn_run(&sup);
        settle_started(&probes).await;

        sup.stop();
        let err = run.await.expect("join").unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Service {
                service: 0,
                phase: Phase::Stop,
                ..
            }
        ));
        assert_eq!(probes[1].stops(), 1);
    }

    #[tokio::test]
    async fn panicking_service_is_contained() {
        let probes = vec![
            Arc::new(Probe {
                panic_start: true,
                ..Probe::default()
            }),
            Arc::new(Probe::default()),
        ];
        let sup = supervise(quiet(), &probes);

        let err = spawn_run(&sup).await.expect("join").unwrap_err();
        match err {
            RuntimeError::Panicked {
                service,
                phase,
                info,
            } => {
                assert_eq!(service, 0);
                assert_eq!(phase, Phase::Start);
                assert_eq!(info, "probe start panic");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(probes[1].stops(), 1);
    }

    #[tokio::test]
    async fn parent_cancellation_stops_the_group() {
        let parent = CancellationToken::new();
        let probe = Arc::new(Probe::default());
        let sup = Arc::new(
            Supervisor::builder(quiet())
                .with_service(Arc::clone(&probe) as ServiceRef)
                .with_parent(parent.clone())
                .build(),
        );
        let run = spawn_run(&sup);
        settle_started(std::slice::from_ref(&probe)).await;

        parent.cancel();
        run.await.expect("join").expect("cancellation is benign");
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn stop_before_run_still_stops_services() {
        let probe = Arc::new(Probe::default());
        let sup = supervise(quiet(), std::slice::from_ref(&probe));
        sup.stop();

        spawn_run(&sup).await.expect("join").expect("clean");
        assert_eq!(probe.stops(), 1);
        assert_eq!(sup.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn runs_at_most_once() {
        let sup = supervise(quiet(), &[]);
        sup.stop();
        sup.run().await.expect("first run");
        assert!(matches!(
            sup.run().await,
            Err(RuntimeError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn grace_deadline_cancels_stop_context() {
        let probe = Arc::new(Probe {
            wait_stop_ctx: true,
            ..Probe::default()
        });
        let cfg = SupervisorConfig {
            grace: Duration::from_millis(30),
            ..quiet()
        };
        let sup = supervise(cfg, std::slice::from_ref(&probe));
        let run = spawn_run(&sup);
        settle_started(std::slice::from_ref(&probe)).await;

        sup.stop();
        run.await.expect("join").expect("stop returns once the deadline fires");
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn dropping_run_finishes_the_lifecycle() {
        let probe = Arc::new(Probe::default());
        let sup = supervise(quiet(), std::slice::from_ref(&probe));
        let run = spawn_run(&sup);
        settle_started(std::slice::from_ref(&probe)).await;
        assert_eq!(sup.state(), SupervisorState::Running);

        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert!(sup.token().is_cancelled());
    }

    async fn explode(msg: &'static str) -> Result<(), RuntimeError> {
        panic!("{msg}")
    }

    #[tokio::test]
    async fn runner_panic_is_not_swallowed() {
        let joined = tokio::spawn(explode("runner exploded")).await;
        let id = joined.as_ref().unwrap_err().id();

        let mut tasks = TaskIndex::new();
        tasks.insert(id, (Some(2), Phase::Stop));
        match joined_outcome(joined, &tasks) {
            Err(RuntimeError::Panicked {
                service: 2,
                phase: Phase::Stop,
                info,
            }) => assert_eq!(info, "runner exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let joined = tokio::spawn(explode("watcher exploded")).await;
        let id = joined.as_ref().unwrap_err().id();
        tasks.insert(id, (None, Phase::Signal));
        let err = joined_outcome(joined, &tasks).unwrap_err();
        assert!(matches!(err, RuntimeError::Signal(_)));
        assert!(!err.is_canceled());
    }

    #[tokio::test]
    async fn aborted_task_counts_as_cancellation() {
        let handle = tokio::spawn(futures::future::pending::<Result<(), RuntimeError>>());
        handle.abort();
        let joined = handle.await;

        let err = joined_outcome(joined, &TaskIndex::new()).unwrap_err();
        assert!(err.is_canceled());
        assert!(joined_outcome(Ok(Ok(())), &TaskIndex::new()).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn os_signal_triggers_stop() {
        use crate::core::shutdown::Signal;

        let probe = Arc::new(Probe::default());
        let cfg = SupervisorConfig {
            signals: vec![Signal::User2],
            ..quiet()
        };
        let sup = supervise(cfg, std::slice::from_ref(&probe));
        let run = spawn_run(&sup);
        settle_started(std::slice::from_ref(&probe)).await;

        let sent = std::process::Command::new("kill")
            .args(["-USR2", &std::process::id().to_string()])
            .status();
        if !matches!(sent, Ok(status) if status.success()) {
            sup.stop();
        }

        run.await.expect("join").expect("signal stop is clean");
        assert_eq!(probe.stops(), 1);
    }
}
