//! Incremental match computation.
//!
//! A [`MatchResult`] is one node in a singly linked chain: "the rules
//! matching after asserting these keys in this order". Nodes are immutable
//! and shared behind `Rc`; each caches its lazily resolved property map and
//! carries a generation stamp so stale nodes are rebuilt rather than
//! consulted.
//!
//! The per-node rule vector is an over-approximation refined by
//! [`MatchResult::filtered_matches`]: index joins only consult each rule's
//! single indexed selector, so the join keeps a rule present in one input
//! unless the *other* input has already matched a key the rule is indexed
//! on (had the rule truly matched that key, that pass would have included
//! it). This asymmetric keep/drop is load-bearing; the debug double-check
//! exists precisely to pin it against brute-force evaluation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::Value;

use crate::keydata::KeyRegistry;
use crate::property::PropertyMap;
use crate::rule::{Rule, RuleId};
use crate::selector::Selector;

/// How a node combines its assertion's rule vector with the previous node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Progressive narrowing (the normal assertion path).
    Filter,
    /// Set union (the `_o` override shadow chain, keeping masked values
    /// available as lower-priority fallbacks).
    Union,
}

/// One node of the shared partial-match tree.
pub struct MatchResult {
    key: Arc<str>,
    value: Value,
    join: JoinKind,
    prev: Option<Rc<MatchResult>>,
    rules: Vec<RuleId>,
    matched_mask: u64,
    checksum: u64,
    generation: u64,
    properties: RefCell<Option<Rc<PropertyMap>>>,
}

impl MatchResult {
    /// Builds a node from the (already looked-up) candidate vector for one
    /// assertion. `key_mask` is the asserted key's bit (0 if unindexed);
    /// `indexed_mask_of` reports each rule's indexed-key mask.
    pub(crate) fn new(
        key: Arc<str>,
        value: Value,
        key_mask: u64,
        join: JoinKind,
        prev: Option<Rc<MatchResult>>,
        candidates: Vec<RuleId>,
        indexed_mask_of: &dyn Fn(RuleId) -> u64,
        generation: u64,
    ) -> Self {
        let checksum = chain_checksum(prev.as_ref().map(|p| p.checksum), &key, &value);
        let (rules, matched_mask) = match (&prev, join) {
            (None, _) => (candidates, key_mask),
            (Some(p), JoinKind::Filter) => (
                filter_join(&p.rules, p.matched_mask, &candidates, key_mask, indexed_mask_of),
                p.matched_mask | key_mask,
            ),
            (Some(p), JoinKind::Union) => {
                (union_join(&p.rules, &candidates), p.matched_mask | key_mask)
            }
        };
        Self {
            key,
            value,
            join,
            prev,
            rules,
            matched_mask,
            checksum,
            generation,
            properties: RefCell::new(None),
        }
    }

    /// The asserted key of this node.
    #[must_use]
    pub fn key(&self) -> &Arc<str> {
        &self.key
    }

    /// The asserted (transformed) value of this node.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The previous node in the chain.
    #[must_use]
    pub fn prev(&self) -> Option<&Rc<MatchResult>> {
        self.prev.as_ref()
    }

    /// The join kind of this node.
    #[must_use]
    pub const fn join(&self) -> JoinKind {
        self.join
    }

    /// The (over-approximate) candidate rule ids after this assertion.
    #[must_use]
    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }

    /// Bitmask of key ids matched along this chain.
    #[must_use]
    pub const fn matched_mask(&self) -> u64 {
        self.matched_mask
    }

    /// Order-sensitive checksum of the assertion path, used as the fast
    /// cache key for match-to-properties lookups.
    #[must_use]
    pub const fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Rule-base generation this node was computed under.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cached_properties(&self) -> Option<Rc<PropertyMap>> {
        self.properties.borrow().clone()
    }

    pub(crate) fn cache_properties(&self, map: Rc<PropertyMap>) {
        *self.properties.borrow_mut() = Some(map);
    }

    /// The per-key values asserted along this chain, latest assertion wins.
    /// Union (shadow) nodes appear under their `_o` key.
    #[must_use]
    pub fn values_by_key(&self) -> HashMap<Arc<str>, Value> {
        let mut values = HashMap::new();
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            values
                .entry(node.key.clone())
                .or_insert_with(|| node.value.clone());
            cursor = node.prev.as_deref();
        }
        values
    }

    /// Refines the candidate vector into the exact matching rule set.
    ///
    /// A candidate whose every selector was indexed is accepted outright
    /// once the chain has matched every key it selects on: surviving the
    /// joins then proves the match. Partially indexed candidates get their
    /// full selector list evaluated directly against this chain's per-key
    /// values. Excluded outright: ids at or past `live_count` (mid-edit),
    /// disabled rules, rules selecting on a key the chain never asserted,
    /// and rules whose anti-mask collides with the chain's matched mask.
    #[must_use]
    pub fn filtered_matches(&self, rules: &[Rule], live_count: usize, keys: &KeyRegistry) -> Vec<RuleId> {
        let values = self.values_by_key();
        let mut out = Vec::new();
        for &id in &self.rules {
            if id == RuleId::NOOP || id.index() >= live_count {
                continue;
            }
            let rule = &rules[id.index()];
            if rule.disabled {
                continue;
            }
            if rule.key_matches_mask & !self.matched_mask != 0 {
                continue;
            }
            if rule.key_anti_mask & self.matched_mask != 0 {
                continue;
            }
            if !rule.direct_eval || rule_matches(rule, &values, keys) {
                out.push(id);
            }
        }
        out
    }
}

impl std::fmt::Debug for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchResult")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("join", &self.join)
            .field("rules", &self.rules.len())
            .field("matched_mask", &format_args!("{:#x}", self.matched_mask))
            .finish()
    }
}

/// Evaluates a rule's full selector list against a chain's per-key values.
pub(crate) fn rule_matches(
    rule: &Rule,
    values: &HashMap<Arc<str>, Value>,
    keys: &KeyRegistry,
) -> bool {
    rule.selectors
        .iter()
        .all(|s| selector_satisfied(s, values, keys))
}

fn selector_satisfied(
    selector: &Selector,
    values: &HashMap<Arc<str>, Value>,
    keys: &KeyRegistry,
) -> bool {
    let asserted = values.get(&selector.key);
    if selector.is_absence() {
        return asserted.is_none_or(|v| !v.is_truthy());
    }
    let Some(asserted) = asserted else {
        return false;
    };
    match keys.get(&selector.key) {
        Some(data) => data.value_satisfies(asserted, &selector.value),
        // Unregistered key: plain equality/wildcard (no inheritance).
        None => selector.value.is_wildcard() && asserted.is_truthy() || asserted == &selector.value,
    }
}

/// The asymmetric merge-join over two sorted id vectors.
///
/// Ids in both inputs are kept. An id present only in `prev` is kept unless
/// it is indexed on the newly asserted key (`new_mask`); an id present only
/// in the new vector is kept unless it is indexed on a key the chain has
/// already matched (`prev_mask`).
pub(crate) fn filter_join(
    prev: &[RuleId],
    prev_mask: u64,
    new: &[RuleId],
    new_mask: u64,
    indexed_mask_of: &dyn Fn(RuleId) -> u64,
) -> Vec<RuleId> {
    let mut out = Vec::with_capacity(prev.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    while i < prev.len() && j < new.len() {
        match prev[i].cmp(&new[j]) {
            std::cmp::Ordering::Equal => {
                out.push(prev[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                if indexed_mask_of(prev[i]) & new_mask == 0 {
                    out.push(prev[i]);
                }
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                if indexed_mask_of(new[j]) & prev_mask == 0 {
                    out.push(new[j]);
                }
                j += 1;
            }
        }
    }
    for &id in &prev[i..] {
        if indexed_mask_of(id) & new_mask == 0 {
            out.push(id);
        }
    }
    for &id in &new[j..] {
        if indexed_mask_of(id) & prev_mask == 0 {
            out.push(id);
        }
    }
    out
}

/// Sorted union of two id vectors.
pub(crate) fn union_join(a: &[RuleId], b: &[RuleId]) -> Vec<RuleId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Order-sensitive hash over every (key, value) assertion along the chain.
fn chain_checksum(prev: Option<u64>, key: &str, value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    if let Some(p) = prev {
        p.hash(&mut hasher);
    }
    key.len().hash(&mut hasher);
    key.hash(&mut hasher);
    value.hash(&mut hasher);
    hasher.finish()
}
