//! # Fetch Pipeline
//!
//! One remote call, one structural check, one mapper pass. The batch either maps
//! completely or fails on the first problem, and every failure leaves here
//! already normalized.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::mapper::Mapper;
use super::schema::Schema;
use crate::errors::{normalize, NormalizedError};
use crate::loggers::LogSink;
use crate::retrieve::RemoteFetch;

/// Fetches `endpoint`, validates it against `schema` and maps every item in order.
pub async fn fetch_entities<S, E>(
    fetcher: &dyn RemoteFetch,
    endpoint: &str,
    schema: &S,
    mapper: &Mapper<S::Item, E>,
    logger: &dyn LogSink,
) -> Result<Vec<E>, NormalizedError>
where
    S: Schema + ?Sized,
{
    logger.debug("Fetching entities", Some(json!({ "endpoint": endpoint })));

    let raw = fetcher.fetch(endpoint).await.map_err(normalize)?;
    let items = schema.parse(raw).map_err(normalize)?;
    logger.debug(
        "Received entities",
        Some(json!({ "endpoint": endpoint, "count": items.len() })),
    );

    items
        .into_iter()
        .map(|item| mapper.map(item).map_err(normalize))
        .collect()
}

/// # Entity Source
///
/// Anything that can produce the full current snapshot of one entity type.
#[async_trait]
pub trait EntitySource<E>: Send + Sync {
    /// Fetches the full snapshot.
    async fn fetch_all(&self) -> Result<Vec<E>, NormalizedError>;
}

/// A [`fetch_entities`] call bound to one endpoint, schema and mapper.
pub struct PipelineSource<S: Schema, E> {
    fetcher: Arc<dyn RemoteFetch>,
    endpoint: String,
    schema: S,
    mapper: Mapper<S::Item, E>,
    logger: Arc<dyn LogSink>,
}

impl<S: Schema, E> PipelineSource<S, E> {
    /// Binds the pipeline pieces together.
    pub fn new(
        fetcher: Arc<dyn RemoteFetch>,
        endpoint: impl Into<String>,
        schema: S,
        mapper: Mapper<S::Item, E>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            schema,
            mapper,
            logger,
        }
    }

    /// The endpoint this source reads.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl<S, E> EntitySource<E> for PipelineSource<S, E>
where
    S: Schema,
    S::Item: 'static,
    E: Send + 'static,
{
    async fn fetch_all(&self) -> Result<Vec<E>, NormalizedError> {
        fetch_entities(
            self.fetcher.as_ref(),
            &self.endpoint,
            &self.schema,
            &self.mapper,
            self.logger.as_ref(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, Failure, TransportError};
    use crate::loggers::MemoryLogger;
    use crate::sync::{make_mapper, ArraySchema};
    use serde_json::Value;

    struct Canned(Result<Value, u16>);

    #[async_trait]
    impl RemoteFetch for Canned {
        async fn fetch(&self, endpoint: &str) -> Result<Value, TransportError> {
            match &self.0 {
                Ok(value) => Ok(value.clone()),
                Err(status) => Err(TransportError::Status {
                    endpoint: endpoint.to_string(),
                    status: *status,
                    body: Some(json!({"message": "Service unavailable"})),
                }),
            }
        }
    }

    fn source(reply: Result<Value, u16>) -> PipelineSource<ArraySchema<String>, String> {
        let logger: Arc<dyn LogSink> = Arc::new(MemoryLogger::new());
        PipelineSource::new(
            Arc::new(Canned(reply)),
            "market",
            ArraySchema::new(),
            make_mapper(
                "Symbol",
                |s: String| Ok(s.to_uppercase()),
                |s: &String| !s.is_empty(),
                logger.clone(),
            ),
            logger,
        )
    }

    #[tokio::test]
    async fn maps_every_item_in_order() {
        let symbols = source(Ok(json!(["btc", "eth"]))).fetch_all().await.unwrap();
        assert_eq!(symbols, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[tokio::test]
    async fn transport_failures_surface_normalized() {
        let err = source(Err(503)).fetch_all().await.unwrap_err();
        assert_eq!(err.message, "Service unavailable");
        assert_eq!(err.kind(), ErrorKind::Api);
    }

    #[tokio::test]
    async fn schema_failures_name_every_issue() {
        let err = source(Ok(json!(["btc", 1, 2]))).fetch_all().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message.starts_with("Validation error: "));
        assert!(matches!(err.cause(), Failure::Schema(s) if s.issues.len() == 2));
    }

    #[tokio::test]
    async fn first_mapping_failure_fails_the_batch() {
        let err = source(Ok(json!(["btc", "", ""]))).fetch_all().await.unwrap_err();
        assert_eq!(err.message, "Invalid Symbol DTO: validation failed.");
        assert_eq!(err.kind(), ErrorKind::Mapping);
    }
}
