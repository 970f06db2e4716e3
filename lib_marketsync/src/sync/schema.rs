use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

use crate::errors::{Issue, SchemaError};

/// # Schema
///
/// Structural contract for a raw payload: either every item parses, or the
/// failure lists every issue found.
pub trait Schema: Send + Sync {
    /// The parsed item type.
    type Item;

    /// Parses `raw` into items.
    fn parse(&self, raw: Value) -> Result<Vec<Self::Item>, SchemaError>;
}

/// A JSON array whose elements deserialize into `T`.
pub struct ArraySchema<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> ArraySchema<T> {
    /// Creates the schema.
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T> Default for ArraySchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<T: DeserializeOwned> Schema for ArraySchema<T> {
    type Item = T;

    fn parse(&self, raw: Value) -> Result<Vec<T>, SchemaError> {
        let items = match raw {
            Value::Array(items) => items,
            other => {
                return Err(SchemaError::new(vec![Issue::new(
                    "",
                    format!("Expected array, received {}", json_type(&other)),
                )]))
            }
        };

        let mut parsed = Vec::with_capacity(items.len());
        let mut issues = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<T>(item) {
                Ok(value) => parsed.push(value),
                Err(e) => issues.push(Issue::new(format!("[{}]", index), e.to_string())),
            }
        }

        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(SchemaError::new(issues))
        }
    }
}
