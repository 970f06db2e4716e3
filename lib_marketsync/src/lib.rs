//! # lib_marketsync
//!
//! Keeps a local, in-memory snapshot of a remote collection of market quotes in
//! step with a periodically polled REST source.
//!
//! Every folder is gated behind a cargo feature of the same name so downstream
//! binaries only pay for what they use. `full` (the default) enables them all.

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder
#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// JSON / JSON5 configuration with layered overrides.
#[cfg(feature = "configs")]
pub mod configs;
/// Error taxonomy, the normalizer and the consumer-facing error slot.
#[cfg(feature = "errors")]
pub mod errors;
/// Structured log sinks (local TTY/file logger and the `log` facade bridge).
#[cfg(feature = "loggers")]
pub mod loggers;
/// Quote and quote configuration models bound to the sync engine.
#[cfg(feature = "markets")]
pub mod markets;
/// The cancellable, race-safe poller.
#[cfg(feature = "realtime")]
pub mod realtime;
/// Remote fetch capability and the retrying HTTP client.
#[cfg(feature = "retrieve")]
pub mod retrieve;
/// Schema validation, mappers, the fetch pipeline, the reconciler and the orchestrator.
#[cfg(feature = "sync")]
pub mod sync;

// Re-export the types most callers reach for.
#[cfg(feature = "errors")]
pub use errors::{normalize, AppError, ErrorKind, Failure, NormalizedError};
#[cfg(feature = "loggers")]
pub use loggers::{FacadeLogger, LogLevel, LogSink, LoggerLocal};
#[cfg(feature = "markets")]
pub use markets::{Quote, QuoteConfig, QuoteStore};
#[cfg(feature = "realtime")]
pub use realtime::{poll, PollHandle, PollState, PollingOptions};
#[cfg(feature = "retrieve")]
pub use retrieve::{ApiClient, RemoteFetch};
#[cfg(feature = "sync")]
pub use sync::{Entity, KeyedCollection, MergeDiff, Reconciler, SyncOrchestrator};
