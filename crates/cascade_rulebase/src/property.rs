//! The merged property map a match resolves to.

use std::sync::Arc;

use cascade_foundation::{CMap, Value};

/// Ordered name-to-value mapping with the final merged property set.
///
/// Entries keep insertion order (merge order is rank order, so iteration is
/// deterministic). The map also records which context keys it updated, which
/// drives forward chaining, and the declare-mode flag it was computed under.
#[derive(Clone, Debug, Default)]
pub struct PropertyMap {
    entries: CMap<Arc<str>, Value>,
    order: Vec<Arc<str>>,
    context_keys_updated: Vec<Arc<str>>,
    declare: bool,
}

impl PropertyMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new(declare: bool) -> Self {
        Self {
            declare,
            ..Self::default()
        }
    }

    /// True if the map was merged in declare mode.
    #[must_use]
    pub const fn is_declare(&self) -> bool {
        self.declare
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if no property is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Gets a property value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&Arc::from(name))
    }

    /// Sets a property value directly (no merge policy applied).
    pub fn set(&mut self, name: Arc<str>, value: Value) {
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries = self.entries.insert(name, value);
    }

    /// Iterates (name, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|v| (name, v)))
    }

    /// The persistent entry map (shared-structure clone is O(1)); used as
    /// the parent level of read-through views.
    #[must_use]
    pub fn entries(&self) -> &CMap<Arc<str>, Value> {
        &self.entries
    }

    /// Records that a property named after a context key was updated.
    pub fn record_context_key(&mut self, key: Arc<str>) {
        if !self.context_keys_updated.contains(&key) {
            self.context_keys_updated.push(key);
        }
    }

    /// Context keys this map updated, in merge order.
    #[must_use]
    pub fn context_keys_updated(&self) -> &[Arc<str>] {
        &self.context_keys_updated
    }

    /// Re-instantiates every dynamic value so evaluation state is never
    /// shared between cached maps handed to independent readers.
    pub fn awaken(&mut self) {
        let names: Vec<Arc<str>> = self.order.clone();
        for name in names {
            if let Some(Value::Dynamic(d)) = self.entries.get(&name) {
                let fresh = Value::Dynamic(Arc::new((**d).clone()));
                self.entries = self.entries.insert(name, fresh);
            }
        }
    }
}
