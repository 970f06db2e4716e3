//! # Validated Mapper
//!
//! Turns one wire DTO into one domain entity. A validator decides whether the
//! shape is acceptable, a transform produces the entity. Whatever goes wrong in
//! either step surfaces as a [`MappingError`] and nothing else; every failure is
//! logged before it is returned.

use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::errors::{panic_message, BoxError, MappingError};
use crate::loggers::LogSink;

type TransformFn<D, E> = Box<dyn Fn(D) -> Result<E, BoxError> + Send + Sync>;
type ValidatorFn<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;

/// A named DTO to entity mapper. Build one with [`make_mapper`].
pub struct Mapper<D, E> {
    name: String,
    transform: TransformFn<D, E>,
    is_valid: ValidatorFn<D>,
    logger: Arc<dyn LogSink>,
}

/// Builds a mapper.
///
/// A panicking validator is logged and counts as a rejection. A panicking
/// transform becomes [`MappingError::Unknown`].
pub fn make_mapper<D, E>(
    name: impl Into<String>,
    transform: impl Fn(D) -> Result<E, BoxError> + Send + Sync + 'static,
    is_valid: impl Fn(&D) -> bool + Send + Sync + 'static,
    logger: Arc<dyn LogSink>,
) -> Mapper<D, E> {
    Mapper {
        name: name.into(),
        transform: Box::new(transform),
        is_valid: Box::new(is_valid),
        logger,
    }
}

impl<D, E> Mapper<D, E> {
    /// The name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maps one DTO.
    pub fn map(&self, dto: D) -> Result<E, MappingError> {
        if !self.check(&dto) {
            return Err(self.fail(MappingError::Invalid {
                name: self.name.clone(),
            }));
        }

        match catch_unwind(AssertUnwindSafe(|| (self.transform)(dto))) {
            Ok(Ok(entity)) => Ok(entity),
            Ok(Err(source)) => Err(self.fail(MappingError::Transform { source })),
            Err(payload) => Err(self.fail(MappingError::Unknown {
                payload: panic_message(payload.as_ref()),
            })),
        }
    }

    fn check(&self, dto: &D) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.is_valid)(dto))) {
            Ok(valid) => valid,
            Err(payload) => {
                self.logger.error(
                    &format!("Validator for {} DTO failed", self.name),
                    Some(json!({ "panic": panic_message(payload.as_ref()) })),
                );
                false
            }
        }
    }

    fn fail(&self, error: MappingError) -> MappingError {
        let detail = match &error {
            MappingError::Unknown { payload } => json!({ "error": error.to_string(), "panic": payload }),
            _ => json!({ "error": error.to_string() }),
        };
        self.logger
            .error(&format!("Failed to map {} DTO", self.name), Some(detail));
        error
    }
}
