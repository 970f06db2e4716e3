//! # Data Retrieval Module
//!
//! The remote fetch capability the sync engine consumes, and the HTTP client that
//! provides it in production.
//!
//! ## Purpose:
//! The pipeline only needs "give me the JSON behind this endpoint". Keeping that
//! behind the [`RemoteFetch`] trait lets tests swap in scripted fakes, while
//! [`ApiClient`] carries the real concerns: URL joining, bearer authentication,
//! timeouts and retries with exponential backoff.
//!
//! ## Contained Modules:
//!
//! - **`remote`**: the `RemoteFetch` trait.
//! - **`ky_http`**: a generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, featuring automatic retries with exponential backoff.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
/// The fetch capability consumed by the pipeline.
pub mod remote;

pub use ky_http::{ApiClient, ApiResponse};
pub use remote::RemoteFetch;
