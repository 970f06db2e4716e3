//! # Sync Module
//!
//! Keeps a keyed, in-memory collection equal to the latest snapshot of a remote
//! source. Data moves leaf-first through these pieces:
//!
//! `RemoteFetch` -> [`Schema`] (structural check) -> [`Mapper`] (per item)
//! -> semantic validate (poller) -> [`Reconciler::merge`] -> [`MergeDiff`] broadcast.
//!
//! ## Contained Modules:
//! - **`schema`**: structural validation of the raw JSON array.
//! - **`mapper`**: validated DTO to entity mapping with a single error type.
//! - **`pipeline`**: fetch, validate and map, normalizing any failure.
//! - **`reconciler`**: the minimal-mutation merge and its diff.
//! - **`orchestrator`**: the consumer-facing lifecycle around all of the above.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Validated DTO mapping.
pub mod mapper;
/// Lifecycle composition of poller, pipeline and reconciler.
pub mod orchestrator;
/// The fetch, validate and map pipeline.
pub mod pipeline;
/// Keyed collection merge.
pub mod reconciler;
/// Structural payload validation.
pub mod schema;

pub use mapper::{make_mapper, Mapper};
pub use orchestrator::{SyncMessages, SyncOrchestrator, SyncSettings};
pub use pipeline::{fetch_entities, EntitySource, PipelineSource};
pub use reconciler::{ChangeDetector, Entity, KeyedCollection, MergeDiff, Reconciler};
pub use schema::{ArraySchema, Schema};
