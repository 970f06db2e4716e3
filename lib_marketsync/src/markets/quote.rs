//! # Quote Models
//!
//! Wire shapes of the `market` and `currency` endpoints and the domain records
//! built from them. Prices and volumes stay decimal strings exactly as the feed
//! sends them; nothing here does arithmetic on them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::BoxError;
use crate::loggers::LogSink;
use crate::sync::{make_mapper, Entity, Mapper};

/// Prefix turning a base64 SVG payload into a data URL.
pub const ICON_DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// # Pair
///
/// The traded pair, e.g. `BTC` against `USD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    /// Base currency code.
    pub primary: String,
    /// Quote currency code.
    pub secondary: String,
}

/// Direction of the latest price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Price went up.
    Up,
    /// Price went down.
    Down,
}

/// Latest change of a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    /// Up or down.
    pub direction: Direction,
    /// Relative change, as sent.
    pub percent: String,
    /// Absolute change, as sent.
    pub amount: String,
}

/// Price block of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Last traded price.
    pub last: String,
    /// Best bid.
    pub best_bid: String,
    /// Best offer.
    pub best_offer: String,
    /// Latest change.
    pub change: PriceChange,
}

/// Traded volume in both currencies of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume in the base currency.
    pub primary: String,
    /// Volume in the quote currency.
    pub secondary: String,
}

/// One element of the `market` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMarketDto {
    /// Traded pair.
    pub pair: Pair,
    /// Prices.
    pub price: Price,
    /// Volumes.
    pub volume: Volume,
    /// Recent prices, oldest first.
    pub price_history: Vec<String>,
}

/// # Quote
///
/// A live quote, keyed by the pair's base currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Key; equals `pair.primary`.
    pub id: String,
    /// Traded pair.
    pub pair: Pair,
    /// Prices.
    pub price: Price,
    /// Volumes.
    pub volume: Volume,
    /// Recent prices, oldest first.
    pub price_history: Vec<String>,
}

impl Entity for Quote {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Whether a currency is a base or a quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteKind {
    /// Base currency.
    Primary,
    /// Quote currency.
    Secondary,
}

/// One element of the `currency` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteConfigDto {
    /// Currency code.
    pub code: String,
    /// Display position.
    pub sort_order: f64,
    /// Ticker symbol.
    pub ticker: String,
    /// Base or quote currency.
    #[serde(rename = "type")]
    pub kind: QuoteKind,
    /// Decimals to display.
    pub decimals_places: f64,
    /// Base64 encoded SVG icon.
    pub icon: String,
}

/// # Quote Config
///
/// Display configuration of one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteConfig {
    /// Currency code; the key.
    pub code: String,
    /// Display position.
    pub sort_order: i64,
    /// Ticker symbol.
    pub ticker: String,
    /// Base or quote currency.
    pub kind: QuoteKind,
    /// Decimals to display.
    pub decimals_places: u32,
    /// Icon as a `data:` URL.
    pub icon_url: String,
}

impl Entity for QuoteConfig {
    fn key(&self) -> &str {
        &self.code
    }
}

/// Default change detector: only a new last price replaces a stored quote.
pub fn quote_has_changed(old: &Quote, new: &Quote) -> bool {
    old.price.last != new.price.last
}

/// Mapper for `market` items. A DTO with an empty pair or volume field is rejected.
pub fn quote_market_mapper(logger: Arc<dyn LogSink>) -> Mapper<QuoteMarketDto, Quote> {
    make_mapper(
        "QuoteMarket",
        |dto: QuoteMarketDto| {
            Ok(Quote {
                id: dto.pair.primary.clone(),
                pair: dto.pair,
                price: dto.price,
                volume: dto.volume,
                price_history: dto.price_history,
            })
        },
        |dto: &QuoteMarketDto| {
            !dto.pair.primary.is_empty()
                && !dto.pair.secondary.is_empty()
                && !dto.volume.primary.is_empty()
                && !dto.volume.secondary.is_empty()
        },
        logger,
    )
}

/// Mapper for `currency` items. Every DTO is accepted; fractional or negative
/// counts fail the transform.
pub fn quote_config_mapper(logger: Arc<dyn LogSink>) -> Mapper<QuoteConfigDto, QuoteConfig> {
    make_mapper(
        "QuoteConfig",
        |dto: QuoteConfigDto| {
            let sort_order = whole(dto.sort_order, "sort_order")?;
            let decimals = whole(dto.decimals_places, "decimals_places")?;
            let decimals_places = u32::try_from(decimals)
                .map_err(|_| format!("decimals_places out of range: {}", decimals))?;
            Ok(QuoteConfig {
                code: dto.code,
                sort_order,
                ticker: dto.ticker,
                kind: dto.kind,
                decimals_places,
                icon_url: format!("{}{}", ICON_DATA_URL_PREFIX, dto.icon),
            })
        },
        |_| true,
        logger,
    )
}

fn whole(value: f64, field: &str) -> Result<i64, BoxError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(format!("{} must be a whole number, got {}", field, value).into());
    }
    // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
    if value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(format!("{} out of range: {}", field, value).into());
    }
    Ok(value as i64)
}
