//! # Sync Orchestrator
//!
//! The consumer-facing lifecycle around a primary entity source and a reference
//! source:
//!
//! - `initial_load()`: one fetch of the primary entities, merged, then one fetch of
//!   the reference data. Independent of polling.
//! - `start_polling()`: starts the poller, or restarts it when one exists.
//! - `stop_polling()` and `retry()`.
//!
//! The collection is owned here and only ever written by the reconciler. Every
//! non-empty merge is published as a [`MergeDiff`] on a broadcast channel.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::broadcast;

use super::pipeline::EntitySource;
use super::reconciler::{Entity, KeyedCollection, MergeDiff, Reconciler};
use crate::errors::{normalize, AppError, ErrorReporter, LocalErrors, NormalizedError};
use crate::loggers::LogSink;
use crate::realtime::{PollHandle, PollState, PollingOptions};

const DIFF_CHANNEL_CAPACITY: usize = 64;

/// Messages stored in the error slots instead of the raw normalized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMessages {
    /// Used when `initial_load` cannot fetch the primary entities.
    pub initial_load: String,
    /// Used when a polling tick fails.
    pub polling: String,
    /// Used when the reference data cannot be loaded.
    pub references: String,
}

impl Default for SyncMessages {
    fn default() -> Self {
        Self {
            initial_load: "Failed to fetch data".to_string(),
            polling: "Failed to update data".to_string(),
            references: "Failed to load reference data".to_string(),
        }
    }
}

/// Polling parameters and error messages for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Delay between polling ticks in milliseconds. Negative values mean zero.
    pub interval_ms: i64,
    /// Consecutive polling failures before polling gives up. Zero means the poller default.
    pub max_retries: u32,
    /// Error slot messages.
    pub messages: SyncMessages,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_retries: 5,
            messages: SyncMessages::default(),
        }
    }
}

type Poller<E> = PollHandle<Vec<E>, NormalizedError>;

struct Inner<E: Entity, R: Entity> {
    primary: Arc<dyn EntitySource<E>>,
    references: Arc<dyn EntitySource<R>>,
    reconciler: Reconciler<E>,
    collection: RwLock<KeyedCollection<E>>,
    reference_map: RwLock<HashMap<String, R>>,
    errors: LocalErrors,
    reference_errors: LocalErrors,
    fetch_in_flight: AtomicBool,
    poller: Mutex<Option<Poller<E>>>,
    settings: SyncSettings,
    diffs: broadcast::Sender<MergeDiff>,
    reporter: ErrorReporter,
    logger: Arc<dyn LogSink>,
}

/// Clears the in-flight flag however the guarded fetch ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<E: Entity, R: Entity> Inner<E, R> {
    fn apply(&self, fresh: Vec<E>) -> MergeDiff {
        let diff = {
            let mut collection = self.collection.write().unwrap_or_else(|p| p.into_inner());
            self.reconciler.merge(&mut collection, fresh)
        };

        if !diff.is_empty() {
            self.logger.debug(
                "Collection updated",
                Some(json!({
                    "added": diff.added.len(),
                    "updated": diff.updated.len(),
                    "removed": diff.removed.len(),
                })),
            );
            // No subscribers is fine.
            let _ = self.diffs.send(diff.clone());
        }
        diff
    }

    async fn poll_fetch(&self) -> Result<Vec<E>, NormalizedError> {
        if self.errors.has_error() {
            self.errors.clear_error();
        }
        let _loading = self.errors.begin_loading();
        self.primary.fetch_all().await
    }

    fn record_poll_error(&self, error: &NormalizedError) {
        self.errors
            .set_error(error.clone(), Some(self.settings.messages.polling.as_str()));
        self.reporter
            .log_error(error, json!({ "operation": "polling" }));
    }

    fn report_current(&self, slot: &LocalErrors, operation: &str) {
        if let Some(current) = slot.current() {
            self.reporter.log_error(
                &current.cause,
                json!({ "operation": operation, "message": current.message }),
            );
        }
    }

    fn poller(&self) -> Option<Poller<E>> {
        self.poller.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl<E: Entity, R: Entity> Drop for Inner<E, R> {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().unwrap_or_else(|p| p.into_inner()).take() {
            poller.stop();
        }
    }
}

/// # Sync Orchestrator
///
/// Cheap to clone; clones drive the same collection. Polling stops when the last
/// clone is dropped.
pub struct SyncOrchestrator<E: Entity, R: Entity> {
    inner: Arc<Inner<E, R>>,
}

impl<E: Entity, R: Entity> Clone for SyncOrchestrator<E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity, R: Entity> fmt::Debug for SyncOrchestrator<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("entities", &self.len())
            .field("settings", &self.inner.settings)
            .field("poll_state", &self.poll_state())
            .finish()
    }
}

impl<E: Entity, R: Entity> SyncOrchestrator<E, R> {
    /// Creates an orchestrator with an empty collection. Errors are reported
    /// through an [`ErrorReporter`] writing to `logger`.
    pub fn new(
        primary: Arc<dyn EntitySource<E>>,
        references: Arc<dyn EntitySource<R>>,
        reconciler: Reconciler<E>,
        settings: SyncSettings,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        let (diffs, _) = broadcast::channel(DIFF_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                primary,
                references,
                reconciler,
                collection: RwLock::new(KeyedCollection::new()),
                reference_map: RwLock::new(HashMap::new()),
                errors: LocalErrors::new(),
                reference_errors: LocalErrors::new(),
                fetch_in_flight: AtomicBool::new(false),
                poller: Mutex::new(None),
                settings,
                diffs,
                reporter: ErrorReporter::new(logger.clone()),
                logger,
            }),
        }
    }

    /// Fetches and merges the primary entities once, then loads the reference data.
    ///
    /// Returns at once if another initial load is still fetching. Failures are
    /// recorded in the error slots, never returned.
    pub async fn initial_load(&self) {
        let inner = &self.inner;
        {
            let Some(_in_flight) = InFlight::acquire(&inner.fetch_in_flight) else {
                inner.logger.debug("Initial load already in flight, skipping", None);
                return;
            };

            let fetched = inner
                .errors
                .execute_with_error_handling(
                    inner.primary.fetch_all(),
                    Some(inner.settings.messages.initial_load.as_str()),
                )
                .await;
            match fetched {
                Some(entities) => {
                    inner.apply(entities);
                }
                None => inner.report_current(&inner.errors, "initialLoad"),
            }
        }

        self.load_references().await;
    }

    /// Replaces the reference map with a fresh fetch. On failure the previous map stays.
    pub async fn load_references(&self) {
        let inner = &self.inner;
        let fetched = inner
            .reference_errors
            .execute_with_error_handling(
                inner.references.fetch_all(),
                Some(inner.settings.messages.references.as_str()),
            )
            .await;

        match fetched {
            Some(list) => {
                let map: HashMap<String, R> = list
                    .into_iter()
                    .map(|reference| (reference.key().to_string(), reference))
                    .collect();
                *inner.reference_map.write().unwrap_or_else(|p| p.into_inner()) = map;
            }
            None => inner.report_current(&inner.reference_errors, "loadReferences"),
        }
    }

    /// Starts polling. If a poller already exists it is restarted instead, so there
    /// is never more than one. Must be called inside a tokio runtime.
    pub fn start_polling(&self) {
        let mut slot = self.inner.poller.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(poller) = slot.as_ref() {
            poller.restart();
            return;
        }

        let fetch_ref = Arc::downgrade(&self.inner);
        let result_ref = fetch_ref.clone();
        let error_ref = fetch_ref.clone();

        let options = PollingOptions::new(self.inner.settings.interval_ms)
            .max_retries(self.inner.settings.max_retries)
            .on_error(move |error: &NormalizedError| {
                if let Some(inner) = error_ref.upgrade() {
                    inner.record_poll_error(error);
                }
            });

        let poller = PollHandle::new(
            move || {
                let inner = Weak::upgrade(&fetch_ref);
                async move {
                    match inner {
                        Some(inner) => inner.poll_fetch().await,
                        None => Err(normalize("Sync orchestrator was dropped")),
                    }
                }
            },
            move |entities: Vec<E>| {
                if let Some(inner) = result_ref.upgrade() {
                    inner.apply(entities);
                }
            },
            options,
            self.inner.logger.clone(),
        );
        poller.start();
        *slot = Some(poller);
    }

    /// Stops polling. A response already in flight is discarded.
    pub fn stop_polling(&self) {
        if let Some(poller) = self.inner.poller() {
            poller.stop();
        }
    }

    /// Clears the last error and (re)starts polling.
    pub fn retry(&self) {
        self.inner.errors.clear_error();
        self.start_polling();
    }

    /// A snapshot of the collection.
    pub fn collection(&self) -> KeyedCollection<E> {
        self.inner
            .collection
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The entity under `key`.
    pub fn get(&self, key: &str) -> Option<E> {
        self.inner
            .collection
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.inner
            .collection
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    /// True when the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of the reference data, keyed by each item's key.
    pub fn references(&self) -> HashMap<String, R> {
        self.inner
            .reference_map
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The reference item under `key`.
    pub fn reference(&self, key: &str) -> Option<R> {
        self.inner
            .reference_map
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    /// The last error from initial load or polling.
    pub fn last_error(&self) -> Option<AppError> {
        self.inner.errors.current()
    }

    /// The last error from loading the reference data.
    pub fn reference_error(&self) -> Option<AppError> {
        self.inner.reference_errors.current()
    }

    /// True while an initial load or polling error is recorded.
    pub fn has_error(&self) -> bool {
        self.inner.errors.has_error()
    }

    /// True while the primary entities are being fetched.
    pub fn is_loading(&self) -> bool {
        self.inner.errors.is_loading()
    }

    /// Receives the diff of every merge that changed something.
    pub fn subscribe(&self) -> broadcast::Receiver<MergeDiff> {
        self.inner.diffs.subscribe()
    }

    /// State of the poller, `None` before polling was first started.
    pub fn poll_state(&self) -> Option<PollState> {
        self.inner.poller().map(|p| p.state())
    }

    /// True when polling gave up after too many consecutive failures.
    pub fn is_circuit_open(&self) -> bool {
        self.inner
            .poller()
            .map(|p| p.is_circuit_open())
            .unwrap_or(false)
    }

    /// The settings this orchestrator was built with.
    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    /// Context snapshot for diagnostics.
    pub fn status(&self) -> Value {
        json!({
            "entities": self.len(),
            "references": self.inner.reference_map.read().unwrap_or_else(|p| p.into_inner()).len(),
            "loading": self.is_loading(),
            "error": self.last_error().map(|e| e.message),
            "referenceError": self.reference_error().map(|e| e.message),
            "polling": self.poll_state().map(|s| format!("{:?}", s)),
            "circuitOpen": self.is_circuit_open(),
        })
    }
}
