//! Per-context-key indexes: value to matching-rule-id vectors with
//! value inheritance.
//!
//! Each distinct context key owns a [`KeyData`]: a small integer id (keys
//! are combined into 64-bit masks, so at most [`MAX_KEYS`] keys are
//! indexable), a map from value to [`ValueMatches`], an optional value
//! transform, and flags. Registration past the limit degrades gracefully:
//! the key is tracked but unindexed, which is an accepted (reported)
//! degradation, never a failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cascade_foundation::Value;

use crate::rule::RuleId;

/// Hard capacity for indexable keys: key ids occupy bits of a `u64` mask.
pub const MAX_KEYS: usize = 64;

/// Small integer identity of an indexable key (0..=63).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct KeyId(u8);

impl KeyId {
    /// Returns the raw index of this key.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The single-bit mask for this key.
    #[must_use]
    pub const fn mask(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0)
    }
}

/// The rule ids matching one (key, value) pair, plus the value-inheritance
/// link.
///
/// The id vector is kept sorted and deduplicated. `parent` links a value to
/// the value it inherits from (e.g. `Integer` to `Number`); matching a value
/// transitively matches everything its ancestors match. Parent vectors are
/// folded in monotonically: each entry remembers how much of its parent it
/// has already absorbed and unions only the growth.
#[derive(Clone, Debug, Default)]
pub struct ValueMatches {
    rules: Vec<RuleId>,
    parent: Option<Value>,
    parent_len_seen: usize,
    init_notified: bool,
}

impl ValueMatches {
    fn with_parent(parent: Option<Value>) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }

    /// The (sorted, unique) matching rule ids, before parent refresh.
    #[must_use]
    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }

    fn insert(&mut self, id: RuleId) {
        if let Err(pos) = self.rules.binary_search(&id) {
            self.rules.insert(pos, id);
        }
    }
}

/// Per-key index and metadata.
pub struct KeyData {
    name: Arc<str>,
    id: Option<KeyId>,
    values: HashMap<Value, ValueMatches>,
    transformer: Option<Box<dyn Fn(&Value) -> Value>>,
    is_property_scope: bool,
    internal: bool,
}

impl KeyData {
    fn new(name: Arc<str>, id: Option<KeyId>, internal: bool) -> Self {
        Self {
            name,
            id,
            values: HashMap::new(),
            transformer: None,
            is_property_scope: false,
            internal,
        }
    }

    /// The key name.
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The key's mask id, or `None` when the key registered past capacity
    /// and is unindexed.
    #[must_use]
    pub const fn id(&self) -> Option<KeyId> {
        self.id
    }

    /// The key's mask bit (0 when unindexed).
    #[must_use]
    pub fn mask(&self) -> u64 {
        self.id.map_or(0, KeyId::mask)
    }

    /// True if this key defines a property scope (field/class/action-like).
    #[must_use]
    pub const fn is_property_scope(&self) -> bool {
        self.is_property_scope
    }

    /// True if this key is engine-internal (shadow or scope key); internal
    /// keys never mirror properties back into the context.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.internal
    }

    pub(crate) fn set_property_scope(&mut self, flag: bool) {
        self.is_property_scope = flag;
    }

    pub(crate) fn set_transformer(&mut self, f: Box<dyn Fn(&Value) -> Value>) {
        self.transformer = Some(f);
    }

    /// Normalizes an asserted value: blank values become the canonical null
    /// marker, then any registered transform is applied.
    #[must_use]
    pub fn transform(&self, value: &Value) -> Value {
        let normalized = match value {
            Value::String(s) if s.is_empty() => Value::Nil,
            other => other.clone(),
        };
        match &self.transformer {
            Some(f) => f(&normalized),
            None => normalized,
        }
    }

    fn default_parent(value: &Value) -> Option<Value> {
        // Unqualified ("*") rules apply everywhere, so every new value
        // inherits from the wildcard entry unless the value is explicitly
        // false-like (or is the wildcard itself).
        if value.is_wildcard() || !value.is_truthy() {
            None
        } else {
            Some(Value::wildcard())
        }
    }

    /// Returns the entry for a value, creating it (with the default parent)
    /// if absent.
    pub fn entry_mut(&mut self, value: &Value) -> &mut ValueMatches {
        self.values
            .entry(value.clone())
            .or_insert_with(|| ValueMatches::with_parent(Self::default_parent(value)))
    }

    /// Inserts a rule id into the sorted vector for a value.
    pub fn add_entry(&mut self, value: &Value, id: RuleId) {
        self.entry_mut(value).insert(id);
    }

    /// Registers a value-inheritance link: `child` transitively matches
    /// everything `parent` matches.
    pub fn set_parent(&mut self, child: &Value, parent: &Value) {
        self.entry_mut(parent);
        let entry = self.entry_mut(child);
        entry.parent = Some(parent.clone());
        entry.parent_len_seen = 0;
    }

    /// Marks (key, value) first use; returns true exactly once per value.
    pub(crate) fn mark_first_use(&mut self, value: &Value) -> bool {
        let entry = self.entry_mut(value);
        if entry.init_notified {
            false
        } else {
            entry.init_notified = true;
            true
        }
    }

    /// The rule-id vector for a value, with the inheritance chain folded in.
    ///
    /// Parent merging is monotonic: only growth since the last check is
    /// unioned, walking the chain root-first so transitive inheritance
    /// propagates in one pass.
    pub fn lookup(&mut self, value: &Value) -> Vec<RuleId> {
        self.entry_mut(value);

        // Collect the ancestor chain, child first.
        let mut chain = vec![value.clone()];
        let mut seen = vec![value.clone()];
        let mut cursor = value.clone();
        while let Some(parent) = self.values.get(&cursor).and_then(|e| e.parent.clone()) {
            if seen.contains(&parent) {
                break; // defensive cycle guard; parents are caller-registered
            }
            self.entry_mut(&parent);
            seen.push(parent.clone());
            chain.push(parent.clone());
            cursor = parent;
        }

        // Fold root-first so each child absorbs an already-refreshed parent.
        for i in (0..chain.len().saturating_sub(1)).rev() {
            let parent_rules = self.values[&chain[i + 1]].rules.clone();
            let entry = self
                .values
                .get_mut(&chain[i])
                .expect("chain entries exist");
            if parent_rules.len() > entry.parent_len_seen {
                for id in &parent_rules {
                    entry.insert(*id);
                }
                entry.parent_len_seen = parent_rules.len();
            }
        }

        self.values[value].rules.clone()
    }

    /// Whether an asserted value satisfies a selector value for this key,
    /// honoring wildcard and inheritance semantics. Used by direct selector
    /// evaluation for partially indexed rules.
    pub fn value_satisfies(&self, asserted: &Value, selector_value: &Value) -> bool {
        if let Value::List(items) = asserted {
            return items.iter().any(|v| self.value_satisfies(v, selector_value));
        }
        if selector_value.is_wildcard() {
            return asserted.is_truthy();
        }
        if asserted == selector_value {
            return true;
        }
        // Walk the asserted value's ancestors.
        let mut cursor = asserted.clone();
        let mut hops = 0;
        while let Some(parent) = self.values.get(&cursor).and_then(|e| e.parent.clone()) {
            if &parent == selector_value {
                return true;
            }
            if parent.is_wildcard() || hops > MAX_KEYS {
                return false;
            }
            cursor = parent;
            hops += 1;
        }
        false
    }
}

impl fmt::Debug for KeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyData")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("values", &self.values.len())
            .field("is_property_scope", &self.is_property_scope)
            .finish()
    }
}

/// Registry of all keys, by name.
///
/// Key ids are handed out in registration order; registration past
/// [`MAX_KEYS`] returns the key unindexed and reports `true` in the
/// `overflowed` flag so the caller can surface a capacity warning.
#[derive(Default)]
pub struct KeyRegistry {
    by_name: HashMap<Arc<str>, usize>,
    data: Vec<KeyData>,
    next_id: usize,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered keys (indexed or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no key is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Looks up a key by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KeyData> {
        self.by_name.get(name).map(|&i| &self.data[i])
    }

    /// Looks up a key by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut KeyData> {
        self.by_name.get(name).map(|&i| &mut self.data[i])
    }

    /// Registers a key (idempotent). Returns the key and whether this
    /// registration overflowed the indexable-key capacity.
    pub fn register(&mut self, name: &str, internal: bool) -> (&mut KeyData, bool) {
        if let Some(&i) = self.by_name.get(name) {
            return (&mut self.data[i], false);
        }
        let name: Arc<str> = name.into();
        let (id, overflowed) = if self.next_id < MAX_KEYS {
            #[allow(clippy::cast_possible_truncation)]
            let id = KeyId(self.next_id as u8);
            self.next_id += 1;
            (Some(id), false)
        } else {
            (None, true)
        };
        let index = self.data.len();
        self.data.push(KeyData::new(name.clone(), id, internal));
        self.by_name.insert(name, index);
        (&mut self.data[index], overflowed)
    }

    /// Iterates all registered keys.
    pub fn iter(&self) -> impl Iterator<Item = &KeyData> {
        self.data.iter()
    }
}
