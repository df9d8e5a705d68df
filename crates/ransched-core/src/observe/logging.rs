//! # Structured Logging
//!
//! Structured logging via the `tracing` ecosystem:
//!
//! - Output formats: JSON for collectors, pretty or compact for terminals
//! - Level filtering, overridable per module
//! - `RUST_LOG` takes precedence over the configured level
//!
//! The scheduler logs skip reasons and grants at `debug`, missing
//! measurements at `trace`, and real-time setup failures or cycle overruns
//! at `warn`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ransched_core::observe::{init_logging, LogConfig, LogFormat, LogLevel};
//!
//! let config = LogConfig {
//!     level: LogLevel::Debug,
//!     format: LogFormat::Json,
//!     ..Default::default()
//! };
//!
//! init_logging(&config);
//!
//! tracing::info!(bs_id = 1, "base station attached");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable)
    Json,
    /// Pretty format (human-readable, colored)
    #[default]
    Pretty,
    /// Compact format (one line per event)
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include source location (file:line)
    pub source_location: bool,
    pub thread_ids: bool,
    pub thread_names: bool,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Module filter, e.g. `ransched_core::mac=trace`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            source_location: false,
            thread_ids: false,
            thread_names: false,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Verbose, pretty, with thread names of the RT tasks.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            source_location: true,
            thread_names: true,
            span_events: true,
            ..Default::default()
        }
    }

    /// JSON at info level.
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            thread_names: true,
            ..Default::default()
        }
    }

    /// Errors only.
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match &self.filter {
            Some(custom) => EnvFilter::try_new(custom).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Initialize the global logging subscriber.
///
/// Call once at startup. Returns `false` when a subscriber was already set.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = config.env_filter();

    let span_events = if config.span_events {
        fmt::format::FmtSpan::FULL
    } else {
        fmt::format::FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_ids(config.thread_ids)
                    .with_thread_names(config.thread_names)
                    .with_span_events(span_events),
            );
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .pretty()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_ids(config.thread_ids)
                    .with_thread_names(config.thread_names)
                    .with_span_events(span_events),
            );
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .compact()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_ids(config.thread_ids)
                    .with_thread_names(config.thread_names)
                    .with_span_events(span_events),
            );
            tracing::subscriber::set_global_default(subscriber)
        }
    };

    result.is_ok()
}
