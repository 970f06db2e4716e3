//! # Error Normalizer
//!
//! Reduces any [`Failure`] to one message plus the original failure kept as the
//! cause. The function is total and pure: it never fails, never logs and returns
//! the same message for the same input.
//!
//! ## Classification order (first match wins):
//! 1. An embedded response payload with a `message` field: that message.
//! 2. A schema failure: the issue messages joined with `". "`, prefixed by
//!    [`VALIDATION_LABEL`].
//! 3. Any error object: its own message.
//! 4. A plain string: the string itself.
//! 5. Anything else: [`UNEXPECTED_ERROR`].

use std::fmt;
use std::sync::Arc;

use super::taxonomy::{ErrorKind, Failure, MappingError, SchemaError, TransportError};

/// Prefix for messages built from schema issues.
pub const VALIDATION_LABEL: &str = "Validation error: ";

/// Message used when a failure carries nothing readable.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// # Normalized Error
///
/// The single error shape consumers see. Cheap to clone; the cause is shared.
#[derive(Debug, Clone)]
pub struct NormalizedError {
    /// Human-readable message.
    pub message: String,
    /// The original failure, kept for diagnostics.
    pub cause: Arc<Failure>,
}

impl NormalizedError {
    /// Classification of the original failure.
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    /// The original failure.
    pub fn cause(&self) -> &Failure {
        &self.cause
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for NormalizedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Normalizes any failure. Already-normalized values pass through unchanged.
///
/// A boxed error that is really one of the typed failures is classified as that
/// type, so a boxed `TransportError` still surfaces its payload message.
pub fn normalize(failure: impl Into<Failure>) -> NormalizedError {
    let failure = unbox(failure.into());
    if let Failure::Normalized(already) = failure {
        return already;
    }

    let message = classify(&failure);
    NormalizedError {
        message,
        cause: Arc::new(failure),
    }
}

fn unbox(failure: Failure) -> Failure {
    let Failure::Other(boxed) = failure else {
        return failure;
    };
    let boxed = match boxed.downcast::<TransportError>() {
        Ok(e) => return Failure::Transport(*e),
        Err(boxed) => boxed,
    };
    let boxed = match boxed.downcast::<SchemaError>() {
        Ok(e) => return Failure::Schema(*e),
        Err(boxed) => boxed,
    };
    let boxed = match boxed.downcast::<MappingError>() {
        Ok(e) => return Failure::Mapping(*e),
        Err(boxed) => boxed,
    };
    match boxed.downcast::<NormalizedError>() {
        Ok(e) => Failure::Normalized(*e),
        Err(boxed) => Failure::Other(boxed),
    }
}

fn classify(failure: &Failure) -> String {
    if let Some(message) = failure.response_message() {
        return message.to_string();
    }

    match failure {
        Failure::Schema(schema) => format!("{}{}", VALIDATION_LABEL, schema.joined_messages()),
        Failure::Transport(e) => e.to_string(),
        Failure::Mapping(e) => e.to_string(),
        Failure::Other(e) => e.to_string(),
        Failure::Message(message) => message.clone(),
        Failure::Normalized(inner) => inner.message.clone(),
        Failure::Unknown(_) => UNEXPECTED_ERROR.to_string(),
    }
}
