//! Logging initialization and configuration.

use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Output format selected by `logging.format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Anything other than `json` falls back to human-readable output.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Log file written under `logging.dir`.
pub const LOG_FILE_NAME: &str = "inventory-server.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log directory {dir}: {source}")]
    LogFile { dir: String, source: InitError },
    #[error(transparent)]
    Init(#[from] TryInitError),
}

/// Appends to `LOG_FILE_NAME` in `dir`, creating both if missing.
pub fn open_log_file(dir: &str) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(Path::new(dir))
        .map_err(|source| LoggingError::LogFile {
            dir: dir.to_string(),
            source,
        })
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level; an unparsable
/// level falls back to `info`. With `logging.dir` set, events are also
/// appended as JSON to a file there; the returned guard flushes it and
/// must live as long as the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match config.dir.as_deref().filter(|d| !d.is_empty()) {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(dir)?);
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match LogFormat::parse(&config.format) {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }
    Ok(guard)
}
