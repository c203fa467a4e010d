//! # Logging bootstrap
//!
//! Builds the process' `tracing` subscriber from a [`LogConfig`]: one console
//! layer plus one JSON "hook" layer per enabled [`HookConfig`]. Every hook
//! writes into its own [`Dispatcher`], so a slow sink never stalls the code
//! that logs.
//!
//! ```text
//! info!(..) ──► Registry ─┬─► console layer (level, pretty | json | compact) ──► stdout
//!                         ├─► file layer (level, json) ──► non-blocking writer ──► rolling file
//!                         ├─► hook #0 (hook level, json) ──► Dispatcher ──► Sink
//!                         └─► hook #1 ...
//! ```
//!
//! Hook layers never see events with the dispatcher's diagnostic target
//! ([`DIAGNOSTIC_TARGET`](crate::DIAGNOSTIC_TARGET)), so overflow warnings
//! cannot loop back into a full queue.
//!
//! ## Teardown
//! [`init`] returns a [`LogGuard`]. Call [`LogGuard::flush`] once the
//! supervised services have stopped: it drains every hook queue, closes
//! the sinks and flushes the log file. Dropping the guard without flushing
//! loses queued hook records.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use appvisor::logging::{self, LogConfig};
//! use appvisor::{JsonLinesSink, SinkRef};
//!
//! # async fn demo() -> Result<(), appvisor::LoggingError> {
//! let cfg: LogConfig = LogConfig::default();
//! let guard = logging::init(&cfg, |_hook| {
//!     Ok(Some(Arc::new(JsonLinesSink::stdout()) as SinkRef))
//! })?;
//!
//! tracing::info!("service up");
//!
//! guard.flush().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use futures::future::join_all;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::dispatch::{DIAGNOSTIC_TARGET, DispatchConfig, Dispatcher, SinkRef};
use crate::error::{LoggingError, SinkError};

/// A type-erased layer over the [`Registry`].
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console output format. Ignored when [`LogConfig::debug`] is set (pretty).
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Single-line human readable.
    Compact,
    /// Multi-line human readable.
    Pretty,
}

/// Top-level logging configuration.
///
/// ## Field semantics
/// - `debug`: pretty console output regardless of `format`
/// - `level`: console level; must parse (`trace`..`error`, `off`, `warning`,
///   and `dpanic`/`panic`/`fatal` as `error`)
/// - `format`: console format when not in debug mode
/// - `file`: optional rolling JSON log file
/// - `hooks`: extra sinks, each behind its own dispatcher
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Development mode: pretty, colored console output.
    pub debug: bool,
    /// Level for the console and file layers.
    pub level: String,
    /// Console format outside debug mode.
    pub format: LogFormat,
    /// Rolling log file.
    pub file: FileConfig,
    /// Dispatched hooks, in order.
    pub hooks: Vec<HookConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: "info".into(),
            format: LogFormat::Json,
            file: FileConfig::default(),
            hooks: Vec::new(),
        }
    }
}

/// When the log file rolls over to a new one.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    /// A single file, never rotated.
    Never,
}

impl From<Rotation> for tracing_appender::rolling::Rotation {
    fn from(r: Rotation) -> Self {
        match r {
            Rotation::Minutely => Self::MINUTELY,
            Rotation::Hourly => Self::HOURLY,
            Rotation::Daily => Self::DAILY,
            Rotation::Never => Self::NEVER,
        }
    }
}

/// JSON log file written by a background thread.
///
/// `path` names the file: its parent is the log directory (created if
/// missing), its file name the prefix of every rotated file. Rotated files
/// are suffixed with their period, e.g. `app.log.2024-05-01` for daily.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Disabled by default.
    pub enable: bool,
    /// Log file path.
    pub path: PathBuf,
    /// Rotation period.
    pub rotation: Rotation,
    /// Rotated files kept on disk; `0` keeps all of them.
    pub max_backups: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enable: false,
            path: PathBuf::from("logs/app.log"),
            rotation: Rotation::Daily,
            max_backups: 0,
        }
    }
}

/// One hook: a sink fed by a dedicated [`Dispatcher`].
///
/// `kind` and `options` are opaque here; they are for the `make_sink`
/// callback to pick and configure the sink.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Disabled hooks are skipped without calling `make_sink`.
    pub enable: bool,
    /// Hook level; an unparsable value falls back to `info`.
    pub level: String,
    /// Sink kind, e.g. `"db"` or `"stdout"`.
    #[serde(alias = "type")]
    pub kind: String,
    /// Queue capacity (dispatcher `max_jobs`).
    pub max_buffer: usize,
    /// Worker count (dispatcher `max_workers`).
    pub max_thread: usize,
    /// Sink-specific settings.
    pub options: HashMap<String, String>,
    /// Static metadata merged into every record.
    pub extra: HashMap<String, String>,
}

impl HookConfig {
    /// Dispatcher settings for this hook.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_jobs: self.max_buffer,
            max_workers: self.max_thread,
            extra: self.extra.clone(),
        }
    }

    /// Parsed hook level, `info` when the configured value is invalid.
    pub fn level_filter(&self) -> LevelFilter {
        parse_level(&self.level).unwrap_or(LevelFilter::INFO)
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            enable: false,
            level: "info".into(),
            kind: String::new(),
            max_buffer: dispatch.max_jobs,
            max_thread: dispatch.max_workers,
            options: HashMap::new(),
            extra: HashMap::new(),
        }
    }
}

/// Owns the hook dispatchers and the file writer created by [`build`] / [`init`].
#[must_use = "call `flush().await` on shutdown or queued records are lost"]
pub struct LogGuard {
    dispatchers: Vec<Dispatcher>,
    file: Option<WorkerGuard>,
}

impl LogGuard {
    /// One dispatcher per installed hook, in configuration order.
    pub fn dispatchers(&self) -> &[Dispatcher] {
        &self.dispatchers
    }

    /// Drains every hook queue and closes the sinks, then flushes the log file.
    pub async fn flush(self) {
        let LogGuard { dispatchers, file } = self;
        join_all(dispatchers.iter().map(|d| d.flush())).await;
        // Blocks briefly until the file writer thread has written its backlog.
        drop(file);
    }
}

/// Builds the layers without installing them.
///
/// `make_sink` is called once per enabled hook: `Ok(None)` skips the hook,
/// an error aborts. Must be called from within a Tokio runtime when any hook
/// is installed.
///
/// # Errors
/// - [`LoggingError::Level`] if `cfg.level` does not parse;
/// - [`LoggingError::File`] if the log directory or file cannot be set up;
/// - [`LoggingError::Sink`] if `make_sink` fails.
pub fn build<F>(cfg: &LogConfig, mut make_sink: F) -> Result<(Vec<BoxedLayer>, LogGuard), LoggingError>
where
    F: FnMut(&HookConfig) -> Result<Option<SinkRef>, SinkError>,
{
    let level = parse_level(&cfg.level).ok_or_else(|| LoggingError::Level {
        level: cfg.level.clone(),
    })?;

    let mut layers = vec![console_layer(cfg, level)];
    let mut file = None;
    if cfg.file.enable {
        let (layer, guard) = file_layer(&cfg.file, level)?;
        layers.push(layer);
        file = Some(guard);
    }

    let mut dispatchers = Vec::new();

    for hook in cfg.hooks.iter().filter(|h| h.enable) {
        let Some(sink) = make_sink(hook)? else {
            continue;
        };
        let dispatcher = Dispatcher::new(sink, hook.dispatch_config());
        layers.push(hook_layer(&dispatcher, hook.level_filter()));
        dispatchers.push(dispatcher);
    }

    Ok((layers, LogGuard { dispatchers, file }))
}

/// [`build`] and install the result as the global default subscriber.
///
/// # Errors
/// As [`build`], plus [`LoggingError::AlreadyInitialized`] when a global
/// subscriber is already set.
pub fn init<F>(cfg: &LogConfig, make_sink: F) -> Result<LogGuard, LoggingError>
where
    F: FnMut(&HookConfig) -> Result<Option<SinkRef>, SinkError>,
{
    let (layers, guard) = build(cfg, make_sink)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;
    Ok(guard)
}

fn console_layer(cfg: &LogConfig, level: LevelFilter) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stdout).with_ansi(cfg.debug);
    let format = if cfg.debug { LogFormat::Pretty } else { cfg.format };
    match format {
        LogFormat::Pretty => layer.pretty().with_filter(level).boxed(),
        LogFormat::Compact => layer.compact().with_filter(level).boxed(),
        LogFormat::Json => layer.json().with_filter(level).boxed(),
    }
}

fn file_layer(cfg: &FileConfig, level: LevelFilter) -> Result<(BoxedLayer, WorkerGuard), LoggingError> {
    let fail = |error: String| LoggingError::File {
        path: cfg.path.clone(),
        error,
    };
    let prefix = cfg
        .path
        .file_name()
        .ok_or_else(|| fail("path has no file name".into()))?;
    let dir = cfg
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;

    let mut builder = RollingFileAppender::builder()
        .rotation(cfg.rotation.into())
        .filename_prefix(prefix.to_string_lossy());
    if cfg.max_backups > 0 {
        builder = builder.max_log_files(cfg.max_backups);
    }
    let appender = builder.build(dir).map_err(|e| fail(e.to_string()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(level)
        .boxed();
    Ok((layer, guard))
}

fn hook_layer(dispatcher: &Dispatcher, level: LevelFilter) -> BoxedLayer {
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(dispatcher.clone())
        .with_filter(filter_fn(move |meta| {
            *meta.level() <= level && meta.target() != DIAGNOSTIC_TARGET
        }))
        .boxed()
}

fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(LevelFilter::WARN),
        "dpanic" | "panic" | "fatal" => Some(LevelFilter::ERROR),
        other => LevelFilter::from_str(other).ok(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::dispatch::Sink;

    #[derive(Default)]
    struct Collect(Mutex<Vec<serde_json::Value>>);

    #[async_trait]
    impl Sink for Collect {
        async fn exec(&self, _: &HashMap<String, String>, payload: Bytes) -> Result<(), SinkError> {
            let v: serde_json::Value = serde_json::from_slice(payload.trim_ascii_end())?;
            self.0.lock().unwrap().push(v);
            Ok(())
        }

        async fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn hook(level: &str) -> HookConfig {
        HookConfig {
            enable: true,
            level: level.into(),
            ..HookConfig::default()
        }
    }

    #[test]
    fn parses_from_toml() {
        let cfg: LogConfig = toml::from_str(
            r#"
            level = "debug"
            format = "compact"

            [file]
            enable = true
            path = "/var/log/billing/app.log"
            rotation = "hourly"
            max_backups = 7

            [[hooks]]
            enable = true
            type = "db"
            level = "warn"
            max_thread = 4

            [hooks.extra]
            app = "billing"
            "#,
        )
        .expect("valid toml");

        assert!(!cfg.debug);
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(cfg.file.enable);
        assert_eq!(cfg.file.path, PathBuf::from("/var/log/billing/app.log"));
        assert_eq!(cfg.file.rotation, Rotation::Hourly);
        assert_eq!(cfg.file.max_backups, 7);
        let h = &cfg.hooks[0];
        assert_eq!(h.kind, "db");
        assert_eq!(h.max_buffer, 1024);
        assert_eq!(h.level_filter(), LevelFilter::WARN);

        let d = h.dispatch_config();
        assert_eq!(d.max_workers, 4);
        assert_eq!(d.extra.get("app").map(String::as_str), Some("billing"));
    }

    #[test]
    fn file_is_disabled_by_default() {
        let cfg: LogConfig = toml::from_str("level = \"warn\"").expect("valid toml");
        assert!(!cfg.file.enable);
        assert_eq!(cfg.file.rotation, Rotation::Daily);
        assert_eq!(cfg.file.max_backups, 0);
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level("INFO"), Some(LevelFilter::INFO));
        assert_eq!(parse_level("warning"), Some(LevelFilter::WARN));
        assert_eq!(parse_level("fatal"), Some(LevelFilter::ERROR));
        assert_eq!(parse_level("off"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("loud"), None);
        assert_eq!(hook("loud").level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let cfg = LogConfig {
            level: "loud".into(),
            ..LogConfig::default()
        };
        let Err(err) = build(&cfg, |_| Ok(None)) else {
            panic!("expected an error");
        };
        assert!(matches!(err, LoggingError::Level { ref level } if level == "loud"));
    }

    #[tokio::test]
    async fn sink_failure_aborts() {
        let cfg = LogConfig {
            hooks: vec![hook("info")],
            ..LogConfig::default()
        };
        let Err(err) = build(&cfg, |_| Err(SinkError::fail("no database"))) else {
            panic!("expected an error");
        };
        assert_eq!(err.as_label(), "logging_sink");
    }

    #[tokio::test]
    async fn disabled_and_skipped_hooks_get_no_dispatcher() {
        let mut disabled = hook("info");
        disabled.enable = false;
        let cfg = LogConfig {
            hooks: vec![disabled, hook("info"), hook("debug")],
            ..LogConfig::default()
        };

        let mut calls = 0;
        let (layers, guard) = build(&cfg, |h| {
            calls += 1;
            if h.level == "debug" {
                return Ok(None);
            }
            Ok(Some(Arc::new(Collect::default()) as SinkRef))
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(layers.len(), 2);
        assert_eq!(guard.dispatchers().len(), 1);
        guard.flush().await;
    }

    #[tokio::test]
    async fn hook_receives_json_records_at_its_level() {
        let sink = Arc::new(Collect::default());
        let mut h = hook("info");
        h.extra.insert("app".into(), "billing".into());
        let cfg = LogConfig {
            level: "error".into(),
            hooks: vec![h],
            ..LogConfig::default()
        };

        let (layers, guard) = build(&cfg, |_| Ok(Some(Arc::clone(&sink) as SinkRef))).unwrap();
        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user = "ada", "signed in");
            tracing::debug!("too verbose for the hook");
            tracing::warn!(target: DIAGNOSTIC_TARGET, "never fed back");
        });

        let dispatcher = guard.dispatchers()[0].clone();
        tokio::time::timeout(Duration::from_secs(5), guard.flush())
            .await
            .expect("flush hung");

        let records = sink.0.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "INFO");
        assert_eq!(records[0]["fields"]["message"], "signed in");
        assert_eq!(records[0]["fields"]["user"], "ada");
        assert_eq!(dispatcher.config().extra.get("app").map(String::as_str), Some("billing"));
        assert!(dispatcher.is_closed());
    }

    #[tokio::test]
    async fn file_layer_writes_json_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("app.log");
        let cfg = LogConfig {
            file: FileConfig {
                enable: true,
                path: path.clone(),
                rotation: Rotation::Never,
                max_backups: 0,
            },
            ..LogConfig::default()
        };

        let (layers, guard) = build(&cfg, |_| Ok(None)).unwrap();
        assert_eq!(layers.len(), 2);
        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(order = 7, "written to disk");
            tracing::debug!("below the file level");
        });
        guard.flush().await;

        let text = std::fs::read_to_string(&path).expect("log file exists");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["level"], "INFO");
        assert_eq!(v["fields"]["message"], "written to disk");
        assert_eq!(v["fields"]["order"], 7);
    }

    #[test]
    fn file_path_without_name_is_rejected() {
        let cfg = LogConfig {
            file: FileConfig {
                enable: true,
                path: PathBuf::new(),
                ..FileConfig::default()
            },
            ..LogConfig::default()
        };
        let Err(err) = build(&cfg, |_| Ok(None)) else {
            panic!("expected an error");
        };
        assert_eq!(err.as_label(), "logging_file");
    }

    #[tokio::test]
    async fn second_init_is_rejected() {
        let cfg = LogConfig::default();
        let first = init(&cfg, |_| Ok(None)).expect("first install");
        let Err(err) = init(&cfg, |_| Ok(None)) else {
            panic!("second install must fail");
        };
        assert!(matches!(err, LoggingError::AlreadyInitialized));
        first.flush().await;
    }
}
