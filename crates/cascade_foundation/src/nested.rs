//! Two-level read-through map.
//!
//! A [`NestedMap`] layers a mutable overlay over a persistent parent map
//! without mutating or copying the parent. Deletions in the overlay are
//! recorded as tombstones so a removed key shadows its parent entry.

use std::collections::HashMap;
use std::hash::Hash;

use crate::collections::CMap;

/// Overlay-over-parent associative structure.
///
/// Reads check the overlay first (a tombstone reads as absent), then fall
/// through to the parent. Iteration merges both levels in one pass.
#[derive(Clone, Debug)]
pub struct NestedMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    overlay: HashMap<K, Option<V>>,
    parent: CMap<K, V>,
}

impl<K: Clone + Eq + Hash, V: Clone> NestedMap<K, V> {
    /// Creates a nested map over the given parent.
    #[must_use]
    pub fn over(parent: CMap<K, V>) -> Self {
        Self {
            overlay: HashMap::new(),
            parent,
        }
    }

    /// Gets a value, reading through the overlay into the parent.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.overlay.get(key) {
            Some(Some(v)) => Some(v),
            Some(None) => None, // tombstone
            None => self.parent.get(key),
        }
    }

    /// Returns true if the key is visible through this map.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Sets a key in the overlay, shadowing any parent entry.
    pub fn insert(&mut self, key: K, value: V) {
        self.overlay.insert(key, Some(value));
    }

    /// Removes a key, tombstoning it so the parent entry is hidden too.
    pub fn remove(&mut self, key: K) {
        self.overlay.insert(key, None);
    }

    /// Number of visible entries across both levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if no entry is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Iterates the merged view: overlay entries (minus tombstones), then
    /// parent entries not shadowed by the overlay.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let from_overlay = self
            .overlay
            .iter()
            .filter_map(|(k, slot)| slot.as_ref().map(|v| (k, v)));
        let from_parent = self
            .parent
            .iter()
            .filter(|(k, _)| !self.overlay.contains_key(k));
        from_overlay.chain(from_parent)
    }
}
