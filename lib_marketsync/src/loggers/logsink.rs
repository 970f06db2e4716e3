//! # Log Sink
//!
//! The single logging capability the engine depends on. Levels keep the numeric
//! scale of the local logger (0 = Silly ... 6 = Fatal) so extras, file records and
//! TTY coloring all agree on what a level means.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// # Log Level
///
/// Severity of a log entry, ordered from the most verbose to the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very fine-grained output that is rarely needed.
    Silly = 0,
    /// Execution-flow tracing.
    Trace = 1,
    /// Detailed internal information.
    Debug = 2,
    /// General progress.
    Info = 3,
    /// Unusual but recoverable events.
    Warn = 4,
    /// A failed operation.
    Error = 5,
    /// A failure that leaves a component unusable.
    Fatal = 6,
}

impl LogLevel {
    /// All levels, most verbose first.
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Silly,
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// The numeric value written into log records.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Every level at or above `self`.
    pub fn and_above(self) -> Vec<LogLevel> {
        Self::ALL.iter().copied().filter(|l| *l >= self).collect()
    }

    /// Maps onto the `log` crate scale. `Silly` folds into `Trace`, `Fatal` into `Error`.
    pub fn to_log_level(self) -> log::Level {
        match self {
            LogLevel::Silly | LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error | LogLevel::Fatal => log::Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Silly => "SILLY",
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silly" => Ok(LogLevel::Silly),
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// # Log Sink
///
/// A fire-and-forget logging capability. Implementations must swallow their own
/// I/O failures; callers never observe an error from logging.
pub trait LogSink: Send + Sync {
    /// Records one entry with optional structured extras.
    fn log(&self, level: LogLevel, message: &str, details: Option<Value>);

    /// Logs at `Debug`.
    fn debug(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Debug, message, details);
    }

    /// Logs at `Info`.
    fn info(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Info, message, details);
    }

    /// Logs at `Warn`.
    fn warn(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Warn, message, details);
    }

    /// Logs at `Error`.
    fn error(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Error, message, details);
    }

    /// Logs at `Fatal`.
    fn fatal(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Fatal, message, details);
    }
}

/// # Facade Logger
///
/// Forwards every entry to the `log` crate so whichever backend the process
/// installed (fern, env_logger, ...) receives engine output.
#[derive(Debug, Clone)]
pub struct FacadeLogger {
    target: String,
}

impl FacadeLogger {
    /// Creates a facade logger that tags entries with `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }
}

impl Default for FacadeLogger {
    fn default() -> Self {
        Self::new("marketsync")
    }
}

impl LogSink for FacadeLogger {
    fn log(&self, level: LogLevel, message: &str, details: Option<Value>) {
        match details {
            Some(extras) => log::log!(target: self.target.as_str(), level.to_log_level(), "{} {}", message, extras),
            None => log::log!(target: self.target.as_str(), level.to_log_level(), "{}", message),
        }
    }
}

/// One captured entry of a [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Structured extras, if any.
    pub details: Option<Value>,
}

/// # Memory Logger
///
/// Keeps every entry in memory. Handy for asserting on engine logs and for
/// embedding the engine where log output is collected by the host.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    /// Creates an empty capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every captured entry, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of captured entries whose message equals `message`.
    pub fn count(&self, message: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|e| e.message == message)
            .count()
    }
}

impl LogSink for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str, details: Option<Value>) {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(LogEntry {
                level,
                message: message.to_string(),
                details,
            });
    }
}
