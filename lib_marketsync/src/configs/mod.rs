//! # Configuration Modules
//!
//! Layered settings for a quote sync process. Each layer is a partial
//! [`SyncConfig`]; later layers override earlier ones field by field, and unset
//! fields fall back to built-in defaults when read.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Sync process settings, file loading and layering.
pub mod sync_config;

pub use sync_config::{ConfigError, SyncConfig};
