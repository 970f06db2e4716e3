//! # Errors Module
//!
//! Every failure the engine can meet (a refused connection, a non-2xx reply, a
//! payload that does not match its schema, a DTO that cannot be mapped, a plain
//! message, or something nobody anticipated) is first captured as a [`Failure`]
//! and then reduced by [`normalize`] to a single `{ message, cause }` shape.
//! Consumers only ever see [`NormalizedError`] or the [`AppError`] built from it.
//!
//! ## Contained Modules:
//! - **`taxonomy`**: the typed failure sources and the [`ErrorKind`] classification.
//! - **`normalize`**: the total, side-effect free normalizer.
//! - **`reporter`**: an explicitly constructed error reporter for diagnostics.
//! - **`local`**: the consumer-facing error slot with its loading flag.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The consumer-facing error slot.
pub mod local;
/// The normalizer.
pub mod normalize;
/// Diagnostics reporter.
pub mod reporter;
/// Failure sources and classification.
pub mod taxonomy;

pub use local::{AppError, Loading, LocalErrors};
pub use normalize::{normalize, NormalizedError, UNEXPECTED_ERROR, VALIDATION_LABEL};
pub use reporter::ErrorReporter;
pub use taxonomy::{
    panic_message, BoxError, ErrorKind, Failure, Issue, MappingError, SchemaError, TransportError,
};
