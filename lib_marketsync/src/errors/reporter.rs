use serde_json::{json, Value};
use std::sync::Arc;

use super::normalize::NormalizedError;
use crate::loggers::LogSink;

/// # Error Reporter
///
/// Collects errors together with the context they occurred in. Constructed once by
/// the owner of a sync session and passed down; there is no process-wide instance.
#[derive(Clone)]
pub struct ErrorReporter {
    logger: Arc<dyn LogSink>,
}

impl ErrorReporter {
    /// Creates a reporter writing to `logger`.
    pub fn new(logger: Arc<dyn LogSink>) -> Self {
        Self { logger }
    }

    /// Logs `error` with its `context` at warn level.
    pub fn log_error(&self, error: &NormalizedError, context: Value) {
        self.logger.warn(
            "Global error logged",
            Some(json!({
                "error": error.message,
                "kind": error.kind().to_string(),
                "context": context,
            })),
        );
    }
}
