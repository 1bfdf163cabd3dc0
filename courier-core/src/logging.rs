//! Logging initialisation.
//!
//! Every component of the workspace logs through `tracing` with structured
//! fields. Applications that do not install their own subscriber can use
//! [`LogConfig`] to set one up with a non-blocking writer.
//!
//! # Examples
//!
//! ```no_run
//! use courier_core::logging::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LoggingError> {
//!     let _guard = LogConfig::new()
//!         .level(LogLevel::Debug)
//!         .format(LogFormat::Json)
//!         .output(LogOutput::RollingFile {
//!             directory: "logs".to_string(),
//!             prefix: "calls".to_string(),
//!             rotation: Rotation::Daily,
//!         })
//!         .init()?;
//!
//!     info!("Outbound calls are logged");
//!     Ok(())
//! }
//! ```

use std::io;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use tracing::{debug, error, info, trace, warn};

/// Logging initialisation error.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be opened.
    #[error("Failed to open log file: {0}")]
    Io(#[from] io::Error),

    /// The filter directive could not be parsed.
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter {
        /// Rejected directive.
        filter: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Request and response dumps
    Trace,
    /// Successful calls and retry attempts
    Debug,
    /// Breaker lifecycle
    Info,
    /// Failed calls, tripped breakers, exhausted retries
    Warn,
    /// Transport failures
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Directive used in filters
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured, machine-readable
    Json,
    /// Single-line human-readable
    Plain,
    /// Multi-line, for development
    Pretty,
    /// Minimal
    Compact,
}

/// Output destination for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Write to STDOUT
    Stdout,
    /// Write to STDERR
    Stderr,
    /// Append to a single file
    File(String),
    /// Write to rotating log files
    RollingFile {
        /// Directory holding the files.
        directory: String,
        /// File name prefix.
        prefix: String,
        /// Rotation period.
        rotation: Rotation,
    },
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Rotate every minute
    Minutely,
    /// Rotate every hour
    Hourly,
    /// Rotate daily
    Daily,
    /// Never rotate
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Logging configuration.
///
/// Defaults to compact output on STDERR at INFO level.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Output destination
    pub output: LogOutput,
    /// Include target (module path)
    pub targets: bool,
    /// Emit span close events with their duration
    pub spans: bool,
    /// Enable ANSI colors
    pub colors: bool,
    /// Filter directive, overrides `level` when set
    pub env_filter: Option<String>,
}

impl LogConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log level
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set output format
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set output destination
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Enable or disable targets
    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Enable or disable span close events
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set a filter directive such as `"courier_http=trace,hyper=warn"`
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter built from the explicit directive, `RUST_LOG`, or the level.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        match &self.env_filter {
            Some(directive) => {
                EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
                    filter: directive.clone(),
                    message: e.to_string(),
                })
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes pending records when dropped; keep it alive
    /// for the lifetime of the program.
    pub fn init(self) -> Result<WorkerGuard, LoggingError> {
        let filter = self.filter()?;
        let (writer, guard) = self.writer()?;
        let layer = self.layer(writer).with_filter(filter);

        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    fn writer(&self) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
        let pair = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => {
                let appender = tracing_appender::rolling::RollingFileAppender::new(
                    rotation.to_tracing_rotation(),
                    directory,
                    prefix,
                );
                tracing_appender::non_blocking(appender)
            }
        };
        Ok(pair)
    }

    fn layer(&self, writer: NonBlocking) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_span_list(self.spans)
                .with_target(self.targets)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Plain => fmt::layer()
                .with_writer(writer)
                .with_target(self.targets)
                .with_ansi(self.colors)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_target(self.targets)
                .with_ansi(self.colors)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_target(self.targets)
                .with_ansi(self.colors)
                .with_span_events(span_events)
                .boxed(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            targets: true,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}
