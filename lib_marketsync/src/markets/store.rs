use std::sync::Arc;

use super::quote::{
    quote_config_mapper, quote_has_changed, quote_market_mapper, Quote, QuoteConfig,
    QuoteConfigDto, QuoteMarketDto,
};
use crate::errors::NormalizedError;
use crate::loggers::LogSink;
use crate::retrieve::RemoteFetch;
use crate::sync::{
    fetch_entities, ArraySchema, PipelineSource, Reconciler, SyncMessages, SyncOrchestrator,
    SyncSettings,
};

/// The quote store: live quotes keyed by base code plus currency configs keyed by code.
pub type QuoteStore = SyncOrchestrator<Quote, QuoteConfig>;

/// # Quote Store Options
///
/// Where the two feeds live and how often quotes are polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteStoreOptions {
    /// Endpoint of the live quotes.
    pub market_endpoint: String,
    /// Endpoint of the currency configuration.
    pub currency_endpoint: String,
    /// Polling interval in milliseconds.
    pub interval_ms: i64,
    /// Consecutive polling failures before polling stops.
    pub max_retries: u32,
}

impl Default for QuoteStoreOptions {
    fn default() -> Self {
        Self {
            market_endpoint: "market".to_string(),
            currency_endpoint: "currency".to_string(),
            interval_ms: 5_000,
            max_retries: 5,
        }
    }
}

fn quote_messages() -> SyncMessages {
    SyncMessages {
        initial_load: "Failed to fetch quote data".to_string(),
        polling: "Failed to update quote data".to_string(),
        references: "Failed to load quote configuration".to_string(),
    }
}

/// Fetches and maps the live quotes once.
pub async fn fetch_quote_market(
    fetcher: &dyn RemoteFetch,
    endpoint: &str,
    logger: Arc<dyn LogSink>,
) -> Result<Vec<Quote>, NormalizedError> {
    let mapper = quote_market_mapper(logger.clone());
    fetch_entities(
        fetcher,
        endpoint,
        &ArraySchema::<QuoteMarketDto>::new(),
        &mapper,
        logger.as_ref(),
    )
    .await
}

/// Fetches and maps the currency configuration once.
pub async fn fetch_quote_config(
    fetcher: &dyn RemoteFetch,
    endpoint: &str,
    logger: Arc<dyn LogSink>,
) -> Result<Vec<QuoteConfig>, NormalizedError> {
    let mapper = quote_config_mapper(logger.clone());
    fetch_entities(
        fetcher,
        endpoint,
        &ArraySchema::<QuoteConfigDto>::new(),
        &mapper,
        logger.as_ref(),
    )
    .await
}

/// Builds a quote store reading both feeds through `fetcher`.
pub fn quote_store(
    fetcher: Arc<dyn RemoteFetch>,
    options: QuoteStoreOptions,
    logger: Arc<dyn LogSink>,
) -> QuoteStore {
    let market = PipelineSource::new(
        fetcher.clone(),
        options.market_endpoint,
        ArraySchema::<QuoteMarketDto>::new(),
        quote_market_mapper(logger.clone()),
        logger.clone(),
    );
    let currency = PipelineSource::new(
        fetcher,
        options.currency_endpoint,
        ArraySchema::<QuoteConfigDto>::new(),
        quote_config_mapper(logger.clone()),
        logger.clone(),
    );

    SyncOrchestrator::new(
        Arc::new(market),
        Arc::new(currency),
        Reconciler::new(quote_has_changed),
        SyncSettings {
            interval_ms: options.interval_ms,
            max_retries: options.max_retries,
            messages: quote_messages(),
        },
        logger,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::loggers::MemoryLogger;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Feeds;

    #[async_trait]
    impl RemoteFetch for Feeds {
        async fn fetch(&self, endpoint: &str) -> Result<Value, TransportError> {
            match endpoint {
                "market" => Ok(json!([{
                    "pair": {"primary": "BTC", "secondary": "USD"},
                    "price": {
                        "last": "100",
                        "bestBid": "99",
                        "bestOffer": "101",
                        "change": {"direction": "Down", "percent": "0.5", "amount": "0.5"}
                    },
                    "volume": {"primary": "1", "secondary": "100"},
                    "priceHistory": []
                }])),
                "currency" => Ok(json!([{
                    "code": "BTC",
                    "sort_order": 1,
                    "ticker": "BTC",
                    "type": "Primary",
                    "decimals_places": 8,
                    "icon": "AAAA"
                }])),
                other => Err(TransportError::Status {
                    endpoint: other.to_string(),
                    status: 404,
                    body: Some(json!({"message": "Not found"})),
                }),
            }
        }
    }

    #[tokio::test]
    async fn bound_fetchers_read_their_endpoints() {
        let logger: Arc<dyn LogSink> = Arc::new(MemoryLogger::new());
        let quotes = fetch_quote_market(&Feeds, "market", logger.clone()).await.unwrap();
        assert_eq!(quotes[0].id, "BTC");

        let configs = fetch_quote_config(&Feeds, "currency", logger.clone()).await.unwrap();
        assert_eq!(configs[0].icon_url, "data:image/svg+xml;base64,AAAA");

        let err = fetch_quote_config(&Feeds, "nope", logger).await.unwrap_err();
        assert_eq!(err.message, "Not found");
    }

    #[tokio::test]
    async fn store_uses_quote_specific_messages() {
        let store = quote_store(
            Arc::new(Feeds),
            QuoteStoreOptions {
                market_endpoint: "market".to_string(),
                currency_endpoint: "missing".to_string(),
                ..QuoteStoreOptions::default()
            },
            Arc::new(MemoryLogger::new()),
        );

        store.initial_load().await;

        assert!(store.get("BTC").is_some());
        assert!(!store.has_error());
        assert_eq!(
            store.reference_error().map(|e| e.message),
            Some("Failed to load quote configuration".to_string())
        );
        assert_eq!(store.reference_error().map(|e| e.cause.message), Some("Not found".to_string()));
    }
}
