//! # Failure Taxonomy
//!
//! Typed failure sources for each boundary of the engine, and the closed
//! [`Failure`] enum the normalizer accepts.

use serde_json::Value;
use std::any::Any;
use std::fmt;
use thiserror::Error;

use super::normalize::NormalizedError;

/// A boxed, thread-safe error, the currency of user supplied transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// # Error Kind
///
/// The coarse classification consumers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote could not be reached or did not produce a readable reply.
    Network,
    /// The remote replied with a non-success status.
    Api,
    /// The payload did not match its structural schema.
    Validation,
    /// A DTO failed validation or transformation.
    Mapping,
    /// Anything else.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Api => "API",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Mapping => "MAPPING",
            ErrorKind::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Errors raised by the remote fetch capability.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The base URL or endpoint could not be turned into an absolute URL.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("HTTP request failed for {endpoint}: {reason}")]
    Request {
        /// Endpoint that was requested.
        endpoint: String,
        /// Human readable cause from the transport.
        reason: String,
    },

    /// The server replied with a non-2xx status. `body` is the reply payload,
    /// parsed as JSON when possible and kept as a JSON string otherwise.
    #[error("HTTP request failed for {endpoint}: Status {status}")]
    Status {
        /// Endpoint that was requested.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Reply payload, if any.
        body: Option<Value>,
    },

    /// A 2xx reply whose body was not valid JSON.
    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode {
        /// Endpoint that was requested.
        endpoint: String,
        /// Decoder message.
        reason: String,
    },
}

impl TransportError {
    /// The human-readable `message` field of an embedded response payload, if the
    /// server sent one.
    pub fn response_message(&self) -> Option<&str> {
        match self {
            TransportError::Status { body: Some(body), .. } => body
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty()),
            _ => None,
        }
    }
}

/// One structural validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Where in the payload the problem is, e.g. `[3]`. Empty for the root.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl Issue {
    /// Creates an issue.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A structural validation failure carrying every issue found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.joined_messages())]
pub struct SchemaError {
    /// Issues in payload order.
    pub issues: Vec<Issue>,
}

impl SchemaError {
    /// Creates a schema failure from its issues.
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// The issue messages joined with `". "`.
    pub fn joined_messages(&self) -> String {
        self.issues
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    }
}

/// Failures raised at the mapper boundary. A mapper never lets anything else escape.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The validator rejected the DTO (or failed while checking it).
    #[error("Invalid {name} DTO: validation failed.")]
    Invalid {
        /// Mapper name.
        name: String,
    },

    /// The transform returned an error.
    #[error("Mapping failed: {source}")]
    Transform {
        /// The transform's own error.
        #[source]
        source: BoxError,
    },

    /// The transform panicked; `payload` is the panic message when one was available.
    #[error("An unknown error occurred during mapping.")]
    Unknown {
        /// Raw panic payload rendered as text.
        payload: String,
    },
}

/// # Failure
///
/// Every kind of failure the normalizer understands. Conversions exist from each
/// typed source, from plain strings and from boxed errors.
#[derive(Debug, Error)]
pub enum Failure {
    /// Remote fetch failures.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Structural validation failures.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Mapper failures.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Any other error object.
    #[error(transparent)]
    Other(#[from] BoxError),

    /// A bare message.
    #[error("{0}")]
    Message(String),

    /// A value that was already normalized; normalizing it again is a pass-through.
    #[error("{}", .0.message)]
    Normalized(NormalizedError),

    /// Something with no usable message at all, optionally with a raw value for diagnostics.
    #[error("unknown failure")]
    Unknown(Option<Value>),
}

impl Failure {
    /// The message of an embedded response payload, if this failure carries one.
    pub fn response_message(&self) -> Option<&str> {
        match self {
            Failure::Transport(e) => e.response_message(),
            _ => None,
        }
    }

    /// The coarse classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Failure::Transport(TransportError::Status { .. }) => ErrorKind::Api,
            Failure::Transport(_) => ErrorKind::Network,
            Failure::Schema(_) => ErrorKind::Validation,
            Failure::Mapping(_) => ErrorKind::Mapping,
            Failure::Normalized(inner) => inner.kind(),
            Failure::Other(_) | Failure::Message(_) | Failure::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::Message(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::Message(message.to_string())
    }
}

impl From<NormalizedError> for Failure {
    fn from(error: NormalizedError) -> Self {
        Failure::Normalized(error)
    }
}

/// Renders a caught panic payload as text. `panic!` payloads are `&str` or `String`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_message_requires_a_non_empty_message_field() {
        let with_message = TransportError::Status {
            endpoint: "market".into(),
            status: 503,
            body: Some(json!({"message": "Maintenance window"})),
        };
        assert_eq!(with_message.response_message(), Some("Maintenance window"));

        let empty = TransportError::Status {
            endpoint: "market".into(),
            status: 500,
            body: Some(json!({"message": ""})),
        };
        assert_eq!(empty.response_message(), None);

        let no_body = TransportError::Request {
            endpoint: "market".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(no_body.response_message(), None);
    }

    #[test]
    fn kinds_follow_the_failure_source() {
        let status = Failure::from(TransportError::Status {
            endpoint: "market".into(),
            status: 404,
            body: None,
        });
        assert_eq!(status.kind(), ErrorKind::Api);
        assert_eq!(
            Failure::from(TransportError::InvalidUrl("::".into())).kind(),
            ErrorKind::Network
        );
        assert_eq!(Failure::from(SchemaError::new(vec![])).kind(), ErrorKind::Validation);
        assert_eq!(
            Failure::from(MappingError::Invalid { name: "Quote".into() }).kind(),
            ErrorKind::Mapping
        );
        assert_eq!(Failure::from("boom").kind(), ErrorKind::Unknown);
    }
}
