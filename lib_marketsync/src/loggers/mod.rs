//! # Loggers Module
//!
//! The engine never talks to a concrete logging backend. Every component holds an
//! `Arc<dyn LogSink>` and emits `log(level, message, details)` calls that are
//! fire-and-forget: a sink must never fail or panic back into the caller.
//!
//! ## Contained Modules:
//! - **`logsink`**: the `LogSink` trait, the numeric `LogLevel` scale, the
//!   `FacadeLogger` bridge to the `log` crate and an in-memory capture sink.
//! - **`logrecord`**: the JSON line written for every file log entry.
//! - **`loggerlocal`**: colored TTY output plus rotated per-app log files.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Defines the data structure written for each file log entry.
pub mod logrecord;
/// Implements a local logger with support for TTY and file output.
pub mod loggerlocal;
/// The sink trait, levels and the simple sink implementations.
pub mod logsink;

pub use loggerlocal::{LoggerLocal, LoggerLocalOptions};
pub use logrecord::Logrecord;
pub use logsink::{FacadeLogger, LogEntry, LogLevel, LogSink, MemoryLogger};
