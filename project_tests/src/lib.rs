//! # Test Fixtures
//!
//! Sample payloads shaped like the two quote feeds, shared by the integration tests.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use serde_json::{json, Value};

/// One `market` feed item.
pub fn market_item(primary: &str, last: &str) -> Value {
    json!({
        "pair": { "primary": primary, "secondary": "USD" },
        "price": {
            "last": last,
            "bestBid": last,
            "bestOffer": last,
            "change": { "direction": "Up", "percent": "0.1", "amount": "0.1" }
        },
        "volume": { "primary": "10", "secondary": "1000" },
        "priceHistory": [last]
    })
}

/// One `currency` feed item.
pub fn currency_item(code: &str, sort_order: i64) -> Value {
    json!({
        "code": code,
        "sort_order": sort_order,
        "ticker": code,
        "type": "Primary",
        "decimals_places": 2,
        "icon": "PHN2Zy8+"
    })
}
