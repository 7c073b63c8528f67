//! Log sinks for request/response diagnostics.
//!
//! The [`RequestLogger`] writes through a [`LogSink`]. Sinks accept filters that
//! rewrite each message before it is emitted; the request logger registers the
//! timestamp/level formatter ([`format_log`]) once when it is created.

mod request_logger;

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

pub use request_logger::{PREVIEW_LIMIT, RequestLogger, censor, preview};

/// Verbosity levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Silly,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Silly => "silly",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Verbose => log::Level::Debug,
            LogLevel::Debug | LogLevel::Silly => log::Level::Trace,
        }
    }
}

/// `log` target used by [`LogCrateSink`].
pub const LOG_TARGET: &str = "smartsheet_http::requests";

/// Rewrites a message given its level name.
pub type LogFilter = fn(&str, &str) -> String;

/// Destination for diagnostic lines.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    /// Registers a filter applied to every subsequent message.
    fn add_filter(&mut self, filter: LogFilter);

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn verbose(&self, message: &str) {
        self.log(LogLevel::Verbose, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn silly(&self, message: &str) {
        self.log(LogLevel::Silly, message);
    }
}

/// Forwards to the `log` facade after applying registered filters.
#[derive(Debug, Default, Clone)]
pub struct LogCrateSink {
    filters: Vec<LogFilter>,
}

impl LogCrateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the registered filters in order.
    pub fn render(&self, level: LogLevel, message: &str) -> String {
        self.filters
            .iter()
            .fold(message.to_string(), |msg, filter| filter(level.as_str(), &msg))
    }
}

impl LogSink for LogCrateSink {
    fn log(&self, level: LogLevel, message: &str) {
        let target_level: log::Level = level.into();
        if log::log_enabled!(target: LOG_TARGET, target_level) {
            log::log!(target: LOG_TARGET, target_level, "{}", self.render(level, message));
        }
    }

    fn add_filter(&mut self, filter: LogFilter) {
        self.filters.push(filter);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: LogLevel, _message: &str) {}

    fn add_filter(&mut self, _filter: LogFilter) {}
}

/// Prefixes `message` with the current UTC time and the level tag.
pub fn format_log(level: &str, message: &str) -> String {
    format_log_at(Utc::now(), level, message)
}

/// `2024-01-01T00:00:00.000Z[   INFO] message`
pub fn format_log_at(timestamp: DateTime<Utc>, level: &str, message: &str) -> String {
    format!(
        "{}[{:>7}] {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        level.to_uppercase(),
        message
    )
}
