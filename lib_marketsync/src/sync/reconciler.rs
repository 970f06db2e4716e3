//! # Reconciler
//!
//! Makes a keyed collection equal to a fresh snapshot while touching as little as
//! possible. New keys are inserted, changed entries are overwritten in their
//! existing slot, unchanged entries are left alone and keys missing from the
//! snapshot are evicted. The merge reports what it did as a [`MergeDiff`] so
//! observers can react without diffing the collection themselves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A record the engine can key. Everything else about it is opaque.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The unique identifier of this record.
    fn key(&self) -> &str;
}

/// `has_changed(existing, fresh)`: whether `fresh` must replace `existing`.
pub type ChangeDetector<E> = Arc<dyn Fn(&E, &E) -> bool + Send + Sync>;

/// Mapping from key to entity. Only a [`Reconciler`] mutates it.
#[derive(Debug, Clone)]
pub struct KeyedCollection<E> {
    entries: HashMap<String, E>,
}

impl<E> Default for KeyedCollection<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E> KeyedCollection<E> {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry under `key`.
    pub fn get(&self, key: &str) -> Option<&E> {
        self.entries.get(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Key and entry pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &E)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// What one merge changed. Keys are listed in the order they were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeDiff {
    /// Keys inserted.
    pub added: Vec<String>,
    /// Keys whose entry was overwritten.
    pub updated: Vec<String>,
    /// Keys evicted.
    pub removed: Vec<String>,
}

impl MergeDiff {
    /// True when the merge touched nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// # Reconciler
///
/// Stateless apart from its change detector.
pub struct Reconciler<E> {
    has_changed: ChangeDetector<E>,
}

impl<E> Clone for Reconciler<E> {
    fn clone(&self) -> Self {
        Self {
            has_changed: Arc::clone(&self.has_changed),
        }
    }
}

impl<E: Entity> Reconciler<E> {
    /// Creates a reconciler using `has_changed` to decide updates.
    pub fn new(has_changed: impl Fn(&E, &E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            has_changed: Arc::new(has_changed),
        }
    }

    /// Merges `fresh` into `collection`. Afterwards the key sets are equal.
    ///
    /// Runs in O(|fresh| + |collection|). If `fresh` repeats a key the later
    /// entry is compared against the earlier one, as if it arrived in a second merge.
    pub fn merge(&self, collection: &mut KeyedCollection<E>, fresh: Vec<E>) -> MergeDiff {
        let mut diff = MergeDiff::default();
        let mut fresh_keys: HashSet<String> = HashSet::with_capacity(fresh.len());
        let mut touched: HashSet<String> = HashSet::new();

        for entity in fresh {
            let key = entity.key().to_string();
            match collection.entries.get_mut(&key) {
                None => {
                    collection.entries.insert(key.clone(), entity);
                    diff.added.push(key.clone());
                    touched.insert(key.clone());
                }
                Some(existing) => {
                    if (self.has_changed)(existing, &entity) {
                        *existing = entity;
                        if touched.insert(key.clone()) {
                            diff.updated.push(key.clone());
                        }
                    }
                }
            }
            fresh_keys.insert(key);
        }

        collection.entries.retain(|key, _| {
            let keep = fresh_keys.contains(key);
            if !keep {
                diff.removed.push(key.clone());
            }
            keep
        });

        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tick {
        id: String,
        price: u32,
        volume: u32,
    }

    impl Entity for Tick {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn tick(id: &str, price: u32, volume: u32) -> Tick {
        Tick {
            id: id.to_string(),
            price,
            volume,
        }
    }

    fn by_price() -> Reconciler<Tick> {
        Reconciler::new(|old: &Tick, new: &Tick| old.price != new.price)
    }

    #[test]
    fn inserts_updates_and_evicts() {
        let reconciler = by_price();
        let mut collection = KeyedCollection::new();
        reconciler.merge(&mut collection, vec![tick("BTC", 100, 1), tick("ETH", 10, 1)]);

        let diff = reconciler.merge(&mut collection, vec![tick("BTC", 101, 1), tick("SOL", 5, 1)]);

        assert_eq!(diff.added, vec!["SOL".to_string()]);
        assert_eq!(diff.updated, vec!["BTC".to_string()]);
        assert_eq!(diff.removed, vec!["ETH".to_string()]);
        assert_eq!(collection.get("BTC").map(|t| t.price), Some(101));
        let mut keys: Vec<&str> = collection.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["BTC", "SOL"]);
    }

    #[test]
    fn unchanged_entries_are_left_untouched() {
        let reconciler = by_price();
        let mut collection = KeyedCollection::new();
        reconciler.merge(&mut collection, vec![tick("BTC", 100, 1)]);

        // Same price, different volume: the detector says nothing changed.
        let diff = reconciler.merge(&mut collection, vec![tick("BTC", 100, 999)]);

        assert!(diff.is_empty());
        assert_eq!(collection.get("BTC").map(|t| t.volume), Some(1));
    }

    #[test]
    fn merging_the_same_snapshot_twice_is_idempotent() {
        let reconciler = by_price();
        let snapshot = vec![tick("A", 1, 1), tick("B", 2, 2), tick("C", 3, 3)];
        let mut collection = KeyedCollection::new();

        let first = reconciler.merge(&mut collection, snapshot.clone());
        assert_eq!(first.added.len(), 3);

        let second = reconciler.merge(&mut collection, snapshot);
        assert!(second.is_empty());
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn empty_snapshot_empties_the_collection() {
        let reconciler = by_price();
        let mut collection = KeyedCollection::new();
        reconciler.merge(&mut collection, vec![tick("A", 1, 1), tick("B", 2, 2)]);

        let diff = reconciler.merge(&mut collection, Vec::new());

        assert!(collection.is_empty());
        let mut removed = diff.removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn key_set_always_matches_the_snapshot() {
        let reconciler = by_price();
        let mut collection = KeyedCollection::new();
        let rounds: Vec<Vec<Tick>> = vec![
            vec![tick("A", 1, 0), tick("B", 1, 0)],
            vec![tick("B", 2, 0), tick("C", 1, 0), tick("D", 1, 0)],
            vec![tick("A", 9, 0)],
            vec![],
            vec![tick("E", 1, 0)],
        ];

        for round in rounds {
            let mut expected: Vec<String> = round.iter().map(|t| t.id.clone()).collect();
            reconciler.merge(&mut collection, round);
            let mut actual: Vec<String> = collection.keys().map(str::to_string).collect();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected);
        }
    }
}
