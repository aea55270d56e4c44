//! Logging configuration and utilities.
//!
//! Installs a `tracing-subscriber` registry and provides the helpers the
//! transport uses to log request and response bodies in debug mode.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{PostalError, PostalResult};

/// Longest response body logged, in bytes.
const MAX_LOGGED_BODY: usize = 1000;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// The minimum log level to capture
    pub level: LogLevel,
    /// The output format for log messages
    pub format: LogFormat,
    /// Whether to include the module target in log output
    pub include_target: bool,
    /// Whether to include file and line number in log output
    pub include_file_line: bool,
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace-level logging (most verbose)
    Trace,
    /// Debug-level logging
    Debug,
    /// Info-level logging
    Info,
    /// Warning-level logging
    Warn,
    /// Error-level logging (least verbose)
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for tracing::level_filters::LevelFilter {
    fn from(level: LogLevel) -> Self {
        Self::from_level(level.into())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (for development)
    Pretty,
    /// JSON format (for structured logging in production)
    Json,
    /// Compact format (for space-constrained environments)
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_target: true,
            include_file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a new logging configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level.
    ///
    /// # Examples
    ///
    /// ```
    /// use postal_client::observability::{LoggingConfig, LogLevel};
    ///
    /// let config = LoggingConfig::new().with_level(LogLevel::Debug);
    /// assert_eq!(config.level, LogLevel::Debug);
    /// ```
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether to include the module target.
    #[must_use]
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Sets whether to include file and line number.
    #[must_use]
    pub fn with_file_line(mut self, include: bool) -> Self {
        self.include_file_line = include;
        self
    }

    /// Initialize logging with this configuration.
    ///
    /// `RUST_LOG` directives are honoured on top of the configured level.
    ///
    /// ```no_run
    /// use postal_client::observability::{LoggingConfig, LogLevel};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// LoggingConfig::new().with_level(LogLevel::Debug).init()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Configuration`] if a global subscriber has
    /// already been installed.
    pub fn init(self) -> PostalResult<()> {
        let filter = EnvFilter::from_default_env().add_directive(
            tracing::level_filters::LevelFilter::from(self.level).into(),
        );
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(self.include_target)
                        .with_file(self.include_file_line)
                        .with_line_number(self.include_file_line),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(self.include_target))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init(),
        };

        result.map_err(|e| PostalError::configuration(format!("logging init failed: {}", e)))
    }
}

/// Log an outgoing request body.
pub fn log_request(method: &str, path: &str, body: Option<&str>) {
    tracing::debug!(
        method = method,
        path = path,
        body = body.unwrap_or("<empty>"),
        "Outgoing request"
    );
}

/// Log an incoming response, truncating long bodies.
pub fn log_response(status: u16, duration_ms: u64, body: Option<&str>) {
    tracing::debug!(
        status = status,
        duration_ms = duration_ms,
        body = body.map_or("<empty>", |b| truncate(b, MAX_LOGGED_BODY)),
        "Incoming response"
    );
}

/// Log an error with context.
pub fn log_error(error: &dyn std::error::Error, context: &str) {
    tracing::error!(error = %error, context = context, "Error occurred");
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
