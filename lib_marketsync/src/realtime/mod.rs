//! # Realtime Module
//!
//! Time-driven machinery. For now that is the poller: a cancellable repeating task
//! that issues one fetch per tick, applies only the newest response, counts
//! consecutive failures and stops for good once they reach the configured bound.
//!
//! ## Contained Modules:
//! - **`poller`**: `PollHandle`, `PollingOptions`, `PollState` and the `poll` shorthand.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Epoch-guarded polling loop with a failure budget.
pub mod poller;

pub use poller::{poll, PollHandle, PollState, PollingOptions, DEFAULT_MAX_RETRIES};
