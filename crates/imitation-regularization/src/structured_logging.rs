//! Structured logging support using the `tracing` crate.
//!
//! Regularizers emit `tracing` events whether or not this module is enabled:
//! lambda updates and regularized losses at `debug`, non-finite lambdas at
//! `warn`, and per-parameter weight adjustments at `trace`. This module
//! installs a subscriber that prints them.
//!
//! Only available with the `structured-logging` feature:
//!
//! ```toml
//! [dependencies]
//! imitation-regularization = { version = "0.1", features = ["structured-logging"] }
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use imitation_regularization::structured_logging::{LogFormat, LogLevel, TracingLogger};
//!
//! let _logger = TracingLogger::builder()
//!     .with_format(LogFormat::Json)
//!     .with_level(LogLevel::Debug)
//!     .build()
//!     .expect("Failed to initialize logger");
//!
//! tracing::info!(lambda = 0.5, "Regularizer attached");
//! ```

use crate::{TrainError, TrainResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (for development).
    Pretty,
    /// Compact format without colors.
    Compact,
    /// JSON format (for machine parsing and log aggregation).
    Json,
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Per-parameter weight adjustments and everything else.
    Trace,
    /// Lambda updates and regularized losses.
    Debug,
    /// Show info and higher (default).
    Info,
    /// Non-finite lambdas and other warnings.
    Warn,
    /// Show only errors.
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for structured logging.
#[derive(Debug, Clone)]
pub struct TracingLoggerBuilder {
    format: LogFormat,
    level: LogLevel,
    env_filter: Option<String>,
    with_targets: bool,
    with_file_location: bool,
}

impl Default for TracingLoggerBuilder {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: LogLevel::Info,
            env_filter: None,
            with_targets: true,
            with_file_location: false,
        }
    }
}

impl TracingLoggerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log level filter.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set a custom filter directive (overrides the level setting).
    ///
    /// ```
    /// # use imitation_regularization::structured_logging::TracingLoggerBuilder;
    /// let builder = TracingLoggerBuilder::new()
    ///     .with_env_filter("imitation_regularization=trace");
    /// ```
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Include target names (module paths) in logs.
    pub fn with_targets(mut self, enabled: bool) -> Self {
        self.with_targets = enabled;
        self
    }

    /// Include file locations (file:line) in logs.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.with_file_location = enabled;
        self
    }

    fn filter(&self) -> TrainResult<EnvFilter> {
        match &self.env_filter {
            Some(custom) => EnvFilter::try_new(custom)
                .map_err(|e| TrainError::LoggingError(format!("Invalid env filter: {}", e))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Build and install the global subscriber.
    ///
    /// Fails if a global subscriber is already installed.
    pub fn build(self) -> TrainResult<TracingLogger> {
        let filter = self.filter()?;
        let base = fmt::layer()
            .with_target(self.with_targets)
            .with_file(self.with_file_location)
            .with_line_number(self.with_file_location);
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match self.format {
            LogFormat::Pretty => registry.with(base.pretty()).try_init(),
            LogFormat::Compact => registry.with(base.with_ansi(false).compact()).try_init(),
            LogFormat::Json => registry.with(base.json()).try_init(),
        };
        installed
            .map_err(|e| TrainError::LoggingError(format!("Failed to initialize tracing: {}", e)))?;

        Ok(TracingLogger {
            format: self.format,
        })
    }
}

/// Handle for the installed `tracing` subscriber.
#[derive(Debug)]
pub struct TracingLogger {
    format: LogFormat,
}

impl TracingLogger {
    /// Create a new logger builder.
    pub fn builder() -> TracingLoggerBuilder {
        TracingLoggerBuilder::new()
    }

    /// Initialize with default settings (pretty format, info level).
    pub fn init() -> TrainResult<Self> {
        Self::builder().build()
    }

    /// Initialize for watching lambda adaptation (compact format, debug
    /// level for this crate only).
    pub fn init_regularization_debug() -> TrainResult<Self> {
        Self::builder()
            .with_format(LogFormat::Compact)
            .with_env_filter("warn,imitation_regularization=debug")
            .build()
    }

    /// Format of the installed subscriber.
    pub fn format(&self) -> LogFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let defaults = TracingLoggerBuilder::new();
        assert_eq!(
            (defaults.format, defaults.level, defaults.with_targets),
            (LogFormat::Pretty, LogLevel::Info, true)
        );

        let custom = TracingLogger::builder()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Trace)
            .with_targets(false)
            .with_file_location(true);
        assert_eq!(custom.format, LogFormat::Compact);
        assert_eq!(custom.level, LogLevel::Trace);
        assert!(!custom.with_targets && custom.with_file_location);
    }

    #[test]
    fn test_levels_are_valid_filters() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let directive = format!("imitation_regularization={}", level.as_str());
            let builder = TracingLoggerBuilder::new().with_env_filter(directive);
            assert!(builder.filter().is_ok(), "{:?}", level);
        }
    }

    #[test]
    fn test_invalid_env_filter() {
        let invalid =
            TracingLoggerBuilder::new().with_env_filter("imitation_regularization=notalevel");
        assert!(matches!(invalid.filter(), Err(TrainError::LoggingError(_))));
    }

    #[test]
    fn test_second_install_fails() {
        // Only one global subscriber can be installed per process.
        let installs = [
            TracingLogger::builder().with_level(LogLevel::Error).build(),
            TracingLogger::init(),
            TracingLogger::init_regularization_debug(),
        ];
        assert!(installs.iter().filter(|r| r.is_ok()).count() <= 1);
        assert!(installs
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(TrainError::LoggingError(_)))));

        if let Ok(logger) = &installs[1] {
            assert_eq!(logger.format(), LogFormat::Pretty);
        }
        if let Ok(logger) = &installs[2] {
            assert_eq!(logger.format(), LogFormat::Compact);
        }
    }
}
