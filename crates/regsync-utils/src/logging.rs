//! # Logging Utilities
//!
//! Logging infrastructure for regsync using `tracing`.
//!
//! The core library only emits events: `warn!` when a kernel call fails or a
//! register changed behind the debugger's back, `debug!` for each protocol
//! step. This module decides where those events go.
//!
//! Console output goes to stderr so that command output on stdout stays
//! machine-readable. A log file can be added next to (or instead of) the
//! console.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use regsync_utils::init_logging;
//!
//! // Reads RUST_LOG, REGSYNC_LOG_FORMAT and REGSYNC_LOG_FILE
//! init_logging().expect("Failed to initialize logging");
//!
//! tracing::warn!("register 8 changed after the thread was halted");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=regsync_core=debug`)
//! - `REGSYNC_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `REGSYNC_LOG_FILE`: Optional path to a log file, appended to alongside the console

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "REGSYNC_LOG_FORMAT";

/// Environment variable naming an additional log file
pub const LOG_FILE_ENV: &str = "REGSYNC_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level (drift and kernel failures)
    Warn,
    /// Info level
    Info,
    /// Debug level (every fetch and store)
    Debug,
    /// Trace level
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Where and how to log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig
{
    /// Explicit level; `None` defers to `RUST_LOG`, then `warn`
    pub level: Option<LogLevel>,
    /// Output format for every sink
    pub format: LogFormat,
    /// Log file to append to
    pub file: Option<PathBuf>,
    /// Whether to log to stderr as well
    pub console: bool,
}

impl Default for LoggingConfig
{
    fn default() -> Self
    {
        Self {
            level: None,
            format: LogFormat::Pretty,
            file: None,
            console: true,
        }
    }
}

impl LoggingConfig
{
    /// Configuration from `REGSYNC_LOG_FORMAT` and `REGSYNC_LOG_FILE`
    ///
    /// ## Errors
    ///
    /// Returns `InvalidFormat` if `REGSYNC_LOG_FORMAT` is set to something unknown.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match env::var(LOG_FORMAT_ENV) {
            Ok(value) => value.parse()?,
            Err(_) => LogFormat::default(),
        };
        let file = env::var_os(LOG_FILE_ENV).map(PathBuf::from);

        Ok(Self {
            format,
            file,
            ..Self::default()
        })
    }

    /// The filter this configuration installs
    ///
    /// Priority: explicit level, then `RUST_LOG` (module filters allowed), then `warn`.
    fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            return EnvFilter::new(Level::from(level).to_string());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    }
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if an environment variable is invalid, the log file
/// can't be opened, or a global subscriber is already installed.
pub fn init_logging() -> Result<(), LoggingError>
{
    init_logging_with_config(&LoggingConfig::from_env()?)
}

/// Initialize logging with an explicit level and format, console only
///
/// ## Example
///
/// ```rust,no_run
/// use regsync_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// init_logging_with_level(LogLevel::Debug, LogFormat::Pretty).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    init_logging_with_config(&LoggingConfig {
        level: Some(level),
        format,
        ..LoggingConfig::default()
    })
}

/// Initialize logging from a [`LoggingConfig`]
///
/// The file writer runs on a background thread; its flush guard is leaked so
/// buffered events are written for the whole life of the process.
///
/// ## Errors
///
/// Returns an error if the log file's directory can't be created or a global
/// subscriber is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<(), LoggingError>
{
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console {
        layers.push(format_layer(config.format, io::stderr, true).with_filter(config.filter()).boxed());
    }

    if let Some(path) = &config.file {
        let (dir, name) = split_log_path(path)?;
        std::fs::create_dir_all(&dir)?;
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        std::mem::forget(guard);
        layers.push(format_layer(config.format, writer, false).with_filter(config.filter()).boxed());
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError>
{
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.display().to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Log file path has no file name
    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
