use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::normalize::{normalize, NormalizedError};
use super::taxonomy::{ErrorKind, Failure};

/// # App Error
///
/// What a consumer renders: a classification, a display message, the normalized
/// error behind it and when it was recorded.
#[derive(Debug, Clone)]
pub struct AppError {
    /// Classification of the underlying failure.
    pub kind: ErrorKind,
    /// Custom message when one was supplied, the normalized message otherwise.
    pub message: String,
    /// The normalized error.
    pub cause: NormalizedError,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
}

impl AppError {
    /// Builds an app error from any failure, optionally overriding the message.
    pub fn new(failure: impl Into<Failure>, custom_message: Option<&str>) -> Self {
        let cause = normalize(failure);
        let message = match custom_message {
            Some(custom) => custom.to_string(),
            None => cause.message.clone(),
        };
        Self {
            kind: cause.kind(),
            message,
            cause,
            timestamp: Utc::now(),
        }
    }
}

/// # Local Errors
///
/// A single error slot plus a loading flag, owned by whoever drives a fetch.
/// Interior mutability lets the slot be shared behind an `Arc`.
///
/// The flag counts concurrent loads: it stays raised until the last
/// [`Loading`] guard is dropped, whether its fetch finished or was cancelled.
#[derive(Debug, Default)]
pub struct LocalErrors {
    current: Mutex<Option<AppError>>,
    loading: AtomicUsize,
}

/// Keeps [`LocalErrors::is_loading`] raised while alive.
#[must_use = "loading ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Loading<'a>(&'a AtomicUsize);

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LocalErrors {
    /// An empty slot, not loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `failure`, replacing any previous error, and returns what was stored.
    pub fn set_error(&self, failure: impl Into<Failure>, custom_message: Option<&str>) -> AppError {
        let error = AppError::new(failure, custom_message);
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = Some(error.clone());
        error
    }

    /// Empties the slot.
    pub fn clear_error(&self) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// True while an error is recorded.
    pub fn has_error(&self) -> bool {
        self.current.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    /// A copy of the recorded error.
    pub fn current(&self) -> Option<AppError> {
        self.current.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// True while at least one load is running.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Raises the loading flag until the returned guard is dropped.
    pub fn begin_loading(&self) -> Loading<'_> {
        self.loading.fetch_add(1, Ordering::SeqCst);
        Loading(&self.loading)
    }

    /// Runs `operation` with the loading flag raised and the previous error cleared.
    ///
    /// On failure the error is recorded (with `custom_message` if given) and `None`
    /// is returned. The loading flag is lowered on every path, including when the
    /// returned future is dropped before it completes.
    pub async fn execute_with_error_handling<T, Fut>(
        &self,
        operation: Fut,
        custom_message: Option<&str>,
    ) -> Option<T>
    where
        Fut: Future<Output = Result<T, NormalizedError>>,
    {
        let loading = self.begin_loading();
        self.clear_error();

        let outcome = operation.await;
        drop(loading);

        match outcome {
            Ok(value) => Some(value),
            Err(error) => {
                self.set_error(error, custom_message);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::taxonomy::{Issue, SchemaError};

    #[test]
    fn custom_message_overrides_but_keeps_the_cause() {
        let errors = LocalErrors::new();
        let stored = errors.set_error(
            SchemaError::new(vec![Issue::new("[0]", "required")]),
            Some("Failed to fetch quote data"),
        );

        assert_eq!(stored.kind, ErrorKind::Validation);
        assert_eq!(stored.message, "Failed to fetch quote data");
        assert_eq!(stored.cause.message, "Validation error: required");
        assert!(errors.has_error());

        errors.clear_error();
        assert!(!errors.has_error());
        assert!(errors.current().is_none());
    }

    #[tokio::test]
    async fn execute_with_error_handling_records_failures_and_resets_loading() {
        let errors = LocalErrors::new();
        errors.set_error("stale", None);

        let ok = errors
            .execute_with_error_handling(async { Ok::<_, NormalizedError>(7) }, None)
            .await;
        assert_eq!(ok, Some(7));
        assert!(!errors.has_error());
        assert!(!errors.is_loading());

        let failed: Option<u8> = errors
            .execute_with_error_handling(async { Err(normalize("offline")) }, None)
            .await;
        assert_eq!(failed, None);
        assert_eq!(errors.current().map(|e| e.message), Some("offline".to_string()));
        assert!(!errors.is_loading());
    }

    #[test]
    fn overlapping_loads_keep_the_flag_raised() {
        let errors = LocalErrors::new();
        let first = errors.begin_loading();
        let second = errors.begin_loading();

        drop(first);
        assert!(errors.is_loading());
        drop(second);
        assert!(!errors.is_loading());
    }

    #[tokio::test]
    async fn cancelled_operation_lowers_the_flag() {
        let errors = LocalErrors::new();
        let pending = errors.execute_with_error_handling(
            std::future::pending::<Result<(), NormalizedError>>(),
            None,
        );

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(5), pending).await;

        assert!(timed_out.is_err());
        assert!(!errors.is_loading());
    }
}
