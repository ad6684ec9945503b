//! Process-wide logging bootstrap.
//!
//! Logging is configured from an optional logging configuration file. A bad
//! or missing file never stops startup: the problem is reported on stderr and
//! the runtime default subscriber is installed instead.
use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use config::{Config, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{AppConfig, abspath, loader::format_for};

/// Keeps the non-blocking file writer flushing for the life of the process.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn default_level() -> String {
    "info".to_string()
}

/// Output format of the log lines.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Contents of a logging configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `maprelay=debug,tower_http=warn`.
    #[serde(default = "default_level")]
    pub level: String,
    pub format: LogFormat,
    /// Include span context in JSON output.
    pub include_spans: bool,
    /// Append to this file instead of stderr. `{here}` expands to the
    /// configuration base directory.
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            include_spans: false,
            file: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingConfigError {
    #[error("log configuration {} not found.", .0.display())]
    NotFound(PathBuf),

    #[error("unable to read log configuration {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("invalid log level '{level}': {source}")]
    InvalidLevel {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("unable to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What [`init_logging`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingSetup {
    /// Installed from the given logging configuration file.
    Configured(PathBuf),
    /// No usable logging configuration; the runtime default is active.
    RuntimeDefault,
    /// Another global subscriber was installed first and was left alone.
    AlreadyInitialized,
}

/// Initialize process-wide logging.
///
/// `log_conf` takes precedence over `app.log_conf`. Relative paths resolve
/// against `app.conf_base_dir`. Never fails: configuration problems are
/// printed to stderr as `ERROR: ...` and the runtime default is used.
pub fn init_logging(log_conf: Option<&Path>, app: &AppConfig) -> LoggingSetup {
    let base_dir = app.conf_base_dir.as_deref();
    let Some(path) = resolve_log_conf(log_conf, app) else {
        return install_runtime_default();
    };

    let installed = load_log_config(&path, base_dir).and_then(|cfg| install(&cfg, base_dir));
    match installed {
        Ok(true) => {
            tracing::info!(log_conf = %path.display(), "logging configured");
            LoggingSetup::Configured(path)
        }
        Ok(false) => LoggingSetup::AlreadyInitialized,
        Err(e) => {
            eprintln!("ERROR: {e}");
            install_runtime_default()
        }
    }
}

/// Pick the logging configuration file to use, if any.
pub fn resolve_log_conf(explicit: Option<&Path>, app: &AppConfig) -> Option<PathBuf> {
    explicit
        .or(app.log_conf.as_deref())
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| abspath(p, app.conf_base_dir.as_deref()))
}

/// Read and parse a logging configuration file.
pub fn load_log_config(
    path: &Path,
    base_dir: Option<&Path>,
) -> Result<LogConfig, LoggingConfigError> {
    if !path.is_file() {
        return Err(LoggingConfigError::NotFound(path.to_path_buf()));
    }

    let unreadable = |source| LoggingConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let mut log_config: LogConfig = Config::builder()
        .add_source(File::from(path).format(format_for(path)))
        .build()
        .and_then(Config::try_deserialize)
        .map_err(unreadable)?;

    if let (Some(file), Some(base)) = (log_config.file.as_mut(), base_dir) {
        *file = file.replace("{here}", &base.to_string_lossy());
    }
    Ok(log_config)
}

/// Install `cfg` as the global subscriber. Returns `Ok(false)` when a global
/// subscriber already exists.
fn install(cfg: &LogConfig, base_dir: Option<&Path>) -> Result<bool, LoggingConfigError> {
    let env_filter =
        EnvFilter::try_new(&cfg.level).map_err(|source| LoggingConfigError::InvalidLevel {
            level: cfg.level.clone(),
            source,
        })?;

    let (writer, guard) = match &cfg.file {
        Some(file) => {
            let path = abspath(Path::new(file), base_dir);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LoggingConfigError::LogFile { path, source })?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(cfg.file.is_none())
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match cfg.format {
        LogFormat::Json => fmt_layer
            .json()
            .with_current_span(cfg.include_spans)
            .with_span_list(cfg.include_spans)
            .boxed(),
        LogFormat::Pretty => fmt_layer.pretty().boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
    };

    if Registry::default()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .is_err()
    {
        return Ok(false);
    }

    if let Some(guard) = guard {
        let _ = FILE_GUARD.set(guard);
    }
    Ok(true)
}

/// Plain stderr logging filtered by `RUST_LOG`, warnings and above otherwise.
fn install_runtime_default() -> LoggingSetup {
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();
    match installed {
        Ok(()) => LoggingSetup::RuntimeDefault,
        Err(_) => LoggingSetup::AlreadyInitialized,
    }
}

/// Create a request-scoped tracing span
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        request.id = request_id,
        route = tracing::field::Empty,
        http.status_code = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}
