//! # Markets Module
//!
//! Binds the generic sync engine to market quotes. A quote feed endpoint delivers
//! the live pairs that are polled and reconciled; a currency endpoint delivers the
//! per-code display configuration that is loaded once.
//!
//! ## Contained Modules:
//!
//! - **`quote`**: wire DTOs, domain models, their mappers and the change detector.
//! - **`store`**: the quote store (`SyncOrchestrator<Quote, QuoteConfig>`) and the
//!   two bound fetch functions.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Quote DTOs, domain models and mappers.
pub mod quote;
/// The quote store and its fetchers.
pub mod store;

pub use quote::{
    quote_config_mapper, quote_has_changed, quote_market_mapper, Direction, Quote, QuoteConfig,
    QuoteConfigDto, QuoteKind, QuoteMarketDto,
};
pub use store::{fetch_quote_config, fetch_quote_market, quote_store, QuoteStore, QuoteStoreOptions};
