//! The per-session evaluation context.
//!
//! A [`Context`] is a stack of assignment frames bracketed by `push`/`pop`.
//! Each `set` extends the shared match chain incrementally: the fast path
//! replays a cached activation child verbatim, the slow path computes the
//! match, applies property-scope and forward-chaining consequences, and
//! caches the traversal for the next context that walks the same path.
//! `pop` unwinds assignments and restores prior state exactly.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::{
    CMap, DynamicValue, Error, NestedMap, PropertySource, Result, Value,
};
use cascade_rulebase::{MatchResult, PropertyMap, RuleBase, DECLARE_KEY, SCOPE_KEY};

use crate::activation::{ActivationId, AssignmentRecord, SharedActivations};

/// One entry on the context stack: the per-session half of an assignment.
///
/// The reusable half (key, transformed value, match chain) is mirrored into
/// [`AssignmentRecord`]s on the shared activation tree; what lives here is
/// the session bookkeeping: the value it masked, who masked it, and the
/// push depth (salience) it was asserted at.
#[derive(Clone, Debug)]
pub struct Assignment {
    key: Arc<str>,
    value: Value,
    transformed: Value,
    matched: Option<Rc<MatchResult>>,
    prev_value: Option<Value>,
    masked: bool,
    masked_by: Option<usize>,
    chained: bool,
    salience: usize,
}

impl Assignment {
    /// The asserted context key.
    #[must_use]
    pub fn key(&self) -> &Arc<str> {
        &self.key
    }

    /// The externally observable value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The value after normalization and any key transform.
    #[must_use]
    pub fn transformed(&self) -> &Value {
        &self.transformed
    }

    /// True if a later assignment of the same key masks this one.
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.masked
    }

    /// True if this assignment was forward-derived from a property.
    #[must_use]
    pub const fn is_chained(&self) -> bool {
        self.chained
    }

    /// The push depth this assignment was made at.
    #[must_use]
    pub const fn salience(&self) -> usize {
        self.salience
    }
}

/// State captured at `push` time so `pop` can restore it exactly.
struct FrameMark {
    entries_len: usize,
    matched: Option<Rc<MatchResult>>,
    activation: Option<ActivationId>,
    deferred_len: usize,
}

/// The per-session assignment stack.
pub struct Context {
    shared: Rc<SharedActivations>,
    base: Rc<RuleBase>,
    entries: Vec<Assignment>,
    frames: Vec<FrameMark>,
    values: HashMap<Arc<str>, Value>,
    current_match: Option<Rc<MatchResult>>,
    /// Current node in the shared replay tree; `None` once an override
    /// rebuild diverges this session's chain from any cached path.
    activation: Option<ActivationId>,
    deferred: Vec<(Arc<str>, Arc<DynamicValue>)>,
    pool: Vec<Assignment>,
}

impl SharedActivations {
    /// Creates a fresh context over this handle's rule base and replay tree.
    #[must_use]
    pub fn new_context(self: &Rc<Self>) -> Context {
        Context::new(self.clone())
    }
}

impl Context {
    fn new(shared: Rc<SharedActivations>) -> Self {
        let base = shared.rule_base().clone();
        let activation = base
            .config()
            .cache_activations
            .then_some(ActivationId::ROOT);
        Self {
            shared,
            base,
            entries: Vec::new(),
            frames: Vec::new(),
            values: HashMap::new(),
            current_match: None,
            activation,
            deferred: Vec::new(),
            pool: Vec::new(),
        }
    }

    /// The rule base this context evaluates against.
    #[must_use]
    pub fn rule_base(&self) -> &Rc<RuleBase> {
        &self.base
    }

    /// Current push depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The externally observable value of a context key, if asserted.
    #[must_use]
    pub fn value_for_key(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// A snapshot of the live value map.
    #[must_use]
    pub fn values(&self) -> HashMap<Arc<str>, Value> {
        self.values.clone()
    }

    /// Iterates the assignment stack, bottom first (masked entries included).
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.iter()
    }

    // =========================================================================
    // Stack discipline
    // =========================================================================

    /// Opens an assignment frame.
    pub fn push(&mut self) {
        self.frames.push(FrameMark {
            entries_len: self.entries.len(),
            matched: self.current_match.clone(),
            activation: self.activation,
            deferred_len: self.deferred.len(),
        });
    }

    /// Closes the current frame, restoring every key to its pre-frame value
    /// and unmasking entries whose masker was popped.
    ///
    /// # Errors
    /// Returns an error if no frame is open.
    pub fn pop(&mut self) -> Result<()> {
        let mark = self.frames.pop().ok_or_else(Error::empty_context_stack)?;

        while self.entries.len() > mark.entries_len {
            let mut entry = self.entries.pop().expect("length checked");
            match entry.prev_value.take() {
                Some(prev) => {
                    self.values.insert(entry.key.clone(), prev);
                }
                None => {
                    self.values.remove(&entry.key);
                }
            }
            entry.matched = None;
            self.pool.push(entry);
        }

        let mut unmasked_any = false;
        for entry in &mut self.entries {
            if entry.masked && entry.masked_by.is_some_and(|m| m >= mark.entries_len) {
                entry.masked = false;
                entry.masked_by = None;
                unmasked_any = true;
            }
        }
        if unmasked_any {
            // The chain was rebuilt when the mask was applied; rebuild again
            // now that the masker is gone.
            self.rebuild_chain();
        } else {
            self.current_match = mark.matched;
        }
        self.activation = mark.activation;
        self.deferred
            .truncate(self.deferred.len().min(mark.deferred_len));
        self.check_consistency();
        Ok(())
    }

    // =========================================================================
    // Assertion
    // =========================================================================

    /// Asserts `key = value` in the current frame.
    ///
    /// # Errors
    /// Returns an error if forward chaining exceeds the configured depth.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.assert_value(key.into(), value.into(), false)
    }

    fn assert_value(&mut self, key: Arc<str>, value: Value, chained: bool) -> Result<()> {
        let limit = self.base.config().max_chain_depth;
        if self.entries.len() >= limit {
            return Err(Error::chain_depth_exceeded(limit, &*key));
        }
        let transformed = self.base.transform_value(&key, &value);

        let replayed = self.try_replay(&key, &value, &transformed, chained);
        if !replayed {
            self.assert_computed(key, value, transformed, chained)?;
        }
        if !chained {
            self.apply_chaining()?;
        }
        self.check_consistency();
        Ok(())
    }

    /// Fast path: replay a cached traversal of this exact assertion.
    ///
    /// The replay tree is keyed by transformed values, so the caller's
    /// externally observable value (which may differ when a transform
    /// collapses distinct inputs) replaces the recorded one.
    fn try_replay(&mut self, key: &Arc<str>, value: &Value, transformed: &Value, chained: bool) -> bool {
        if !self.base.config().cache_activations {
            return false;
        }
        let Some(parent) = self.activation else {
            return false;
        };
        let child = self.shared.arena().borrow_mut().replayable_child(
            parent,
            key,
            transformed,
            chained,
            self.base.generation(),
        );
        let Some(child) = child else {
            return false;
        };

        let (records, parked) = {
            let arena = self.shared.arena().borrow();
            (arena.records(child).to_vec(), arena.deferred(child))
        };
        for (i, record) in records.into_iter().enumerate() {
            let external = if i == 0 { value.clone() } else { record.value };
            self.current_match = Some(record.matched.clone());
            self.push_entry(
                record.key,
                external,
                record.transformed,
                Some(record.matched),
                record.chained,
            );
        }
        for (k, d) in parked {
            self.park_local_deferred(k, d);
        }
        self.activation = Some(child);
        true
    }

    /// Slow path: compute the match for one assertion and cache the traversal.
    fn assert_computed(
        &mut self,
        key: Arc<str>,
        value: Value,
        transformed: Value,
        chained: bool,
    ) -> Result<()> {
        let limit = self.base.config().max_chain_depth;
        if self.entries.len() >= limit {
            return Err(Error::chain_depth_exceeded(limit, &*key));
        }
        match self.last_unmasked_index(&key) {
            // Re-asserting the current value is a no-op entry: the stack
            // stays symmetric for pop without touching the match chain.
            Some(i) if self.entries[i].transformed == transformed => {
                self.push_entry(key, value, transformed, self.current_match.clone(), chained);
                self.cache_last_entry(chained);
                Ok(())
            }
            Some(_) => {
                let first = self
                    .first_unmasked_index(&key)
                    .expect("an unmasked entry was found above");
                self.assert_override(first, key, value, transformed, chained)
            }
            None => {
                let matched =
                    self.base
                        .match_assert(&key, &transformed, self.current_match.clone());
                self.current_match = Some(matched.clone());
                self.push_entry(key, value, transformed, Some(matched), chained);
                self.cache_last_entry(chained);
                Ok(())
            }
        }
    }

    /// Overrides an earlier assignment of the same key: the key's earliest
    /// unmasked entry and everything above it are masked, the chain is
    /// rebuilt with masked entries folded in through the `_o` union shadow
    /// so their values stay available as lower-priority fallbacks, and the
    /// masked tail (minus the overridden key's own entries) is then
    /// re-applied beneath the incoming assertion.
    fn assert_override(
        &mut self,
        overridden: usize,
        key: Arc<str>,
        value: Value,
        transformed: Value,
        chained: bool,
    ) -> Result<()> {
        // The chain no longer corresponds to any cached path.
        self.activation = None;

        let mut newly_masked: Vec<usize> = Vec::new();
        for j in overridden..self.entries.len() {
            if !self.entries[j].masked {
                self.entries[j].masked = true;
                newly_masked.push(j);
            }
        }
        self.rebuild_chain();

        for &j in &newly_masked {
            if self.entries[j].key == key {
                continue; // replaced by the incoming assertion
            }
            let masker = self.entries.len();
            self.entries[j].masked_by = Some(masker);
            let (k, v, tv, ch) = {
                let e = &self.entries[j];
                (
                    e.key.clone(),
                    e.value.clone(),
                    e.transformed.clone(),
                    e.chained,
                )
            };
            self.assert_computed(k, v, tv, ch)?;
        }

        let masker = self.entries.len();
        for &j in &newly_masked {
            if self.entries[j].masked_by.is_none() {
                self.entries[j].masked_by = Some(masker);
            }
        }
        self.assert_computed(key, value, transformed, chained)
    }

    /// Re-folds the whole chain from the live stack: unmasked entries extend
    /// it with the normal filter join, masked entries with their `_o` shadow
    /// union.
    fn rebuild_chain(&mut self) {
        let base = self.base.clone();
        let mut chain: Option<Rc<MatchResult>> = None;
        for entry in &mut self.entries {
            chain = Some(if entry.masked {
                base.match_override(&entry.key, &entry.transformed, chain)
            } else {
                base.match_assert(&entry.key, &entry.transformed, chain)
            });
            entry.matched = chain.clone();
        }
        self.current_match = chain;
    }

    fn last_unmasked_index(&self, key: &Arc<str>) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|e| !e.masked && e.key == *key)
    }

    fn first_unmasked_index(&self, key: &Arc<str>) -> Option<usize> {
        self.entries.iter().position(|e| !e.masked && e.key == *key)
    }

    fn push_entry(
        &mut self,
        key: Arc<str>,
        value: Value,
        transformed: Value,
        matched: Option<Rc<MatchResult>>,
        chained: bool,
    ) {
        let prev_value = self.values.get(&key).cloned();
        self.values.insert(key.clone(), value.clone());
        let salience = self.frames.len();
        let entry = match self.pool.pop() {
            Some(mut recycled) => {
                recycled.key = key;
                recycled.value = value;
                recycled.transformed = transformed;
                recycled.matched = matched;
                recycled.prev_value = prev_value;
                recycled.masked = false;
                recycled.masked_by = None;
                recycled.chained = chained;
                recycled.salience = salience;
                recycled
            }
            None => Assignment {
                key,
                value,
                transformed,
                matched,
                prev_value,
                masked: false,
                masked_by: None,
                chained,
                salience,
            },
        };
        self.entries.push(entry);
    }

    /// Mirrors the just-pushed entry into the shared replay tree.
    fn cache_last_entry(&mut self, chained: bool) {
        if !self.base.config().cache_activations {
            return;
        }
        let Some(parent) = self.activation else {
            return;
        };
        let entry = self.entries.last().expect("entry just pushed");
        let Some(matched) = entry.matched.clone() else {
            return;
        };
        let record = AssignmentRecord {
            key: entry.key.clone(),
            value: entry.value.clone(),
            transformed: entry.transformed.clone(),
            matched,
            chained: entry.chained,
        };
        let child = self.shared.arena().borrow_mut().cache_child(
            parent,
            chained,
            vec![record],
            self.base.generation(),
        );
        self.activation = Some(child);
    }

    // =========================================================================
    // Forward chaining
    // =========================================================================

    /// Applies property mirrors: while the merged properties carry a new
    /// value for any registered context key, assert it as a chained
    /// assignment. Unresolvable dynamic values are parked on the activation
    /// and re-attempted on the next read.
    fn apply_chaining(&mut self) -> Result<()> {
        loop {
            let Some(map) = self.effective_properties() else {
                return Ok(());
            };
            // Declare-mode maps enumerate legal values; mirroring them back
            // would assert the enumeration itself.
            if map.is_declare() {
                return Ok(());
            }
            let mut progressed = false;
            let keys: Vec<Arc<str>> = map.context_keys_updated().to_vec();
            for key in keys {
                let Some(value) = map.get(&key).cloned() else {
                    continue;
                };
                let value = match &value {
                    Value::Dynamic(dynamic) => {
                        if dynamic.is_resolvable(self) {
                            dynamic.evaluate(self)
                        } else {
                            self.park_deferred(key.clone(), dynamic.clone());
                            continue;
                        }
                    }
                    other => other.clone(),
                };
                if self.should_chain(&key, &value) {
                    self.assert_value(key, value, true)?;
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    /// A property mirrors into the context when its key is genuinely new:
    /// nil values never chain, an explicit (non-chained) assignment is never
    /// overridden by a derived one, and an equal value is already current.
    fn should_chain(&self, key: &Arc<str>, value: &Value) -> bool {
        if value.is_nil() {
            return false;
        }
        let transformed = self.base.transform_value(key, value);
        match self.last_unmasked_index(key) {
            Some(i) => self.entries[i].chained && self.entries[i].transformed != transformed,
            None => true,
        }
    }

    fn park_deferred(&mut self, key: Arc<str>, dynamic: Arc<DynamicValue>) {
        if let Some(node) = self.activation {
            self.shared
                .arena()
                .borrow_mut()
                .push_deferred(node, key.clone(), dynamic.clone());
        }
        self.park_local_deferred(key, dynamic);
    }

    fn park_local_deferred(&mut self, key: Arc<str>, dynamic: Arc<DynamicValue>) {
        if !self
            .deferred
            .iter()
            .any(|(k, d)| *k == key && Arc::ptr_eq(d, &dynamic))
        {
            self.deferred.push((key, dynamic));
        }
    }

    /// Re-attempts parked dynamic assignments that have become resolvable.
    fn apply_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.deferred);
        let mut keep = Vec::new();
        for (key, dynamic) in pending {
            if dynamic.is_resolvable(self) {
                let value = dynamic.evaluate(self);
                if self.should_chain(&key, &value) {
                    if let Err(err) = self.assert_value(key, value, true) {
                        self.base.diagnostics().warn(format!(
                            "deferred assignment abandoned: {err}"
                        ));
                    }
                }
            } else {
                keep.push((key, dynamic));
            }
        }
        self.deferred.extend(keep);
    }

    // =========================================================================
    // Property reads
    // =========================================================================

    /// The most recently (non-chained) asserted property-scope key, which
    /// selects the active synthetic scope property set.
    fn active_scope(&self) -> Option<Arc<str>> {
        self.entries
            .iter()
            .rev()
            .find(|e| {
                !e.masked
                    && !e.chained
                    && e.transformed.is_truthy()
                    && self.base.is_property_scope(&e.key)
            })
            .map(|e| e.key.clone())
    }

    /// The current chain extended with the synthetic `_p` scope assertion.
    /// The extension is computed lazily and cached on the activation node;
    /// no real stack mutation happens per query.
    fn effective_match(&mut self) -> Option<Rc<MatchResult>> {
        let current = self.current_match.clone()?;
        let Some(scope) = self.active_scope() else {
            return Some(current);
        };
        let scope_value = Value::from(&*scope);
        if self.base.config().cache_activations {
            if let Some(node) = self.activation {
                let cached = self
                    .shared
                    .arena()
                    .borrow()
                    .scope_match(node, &scope, self.base.generation());
                if let Some(matched) = cached {
                    return Some(matched);
                }
                let matched = self.base.match_assert(SCOPE_KEY, &scope_value, Some(current));
                self.shared
                    .arena()
                    .borrow_mut()
                    .cache_scope_match(node, scope, matched.clone());
                return Some(matched);
            }
        }
        Some(self.base.match_assert(SCOPE_KEY, &scope_value, Some(current)))
    }

    fn effective_properties(&mut self) -> Option<Rc<PropertyMap>> {
        let matched = self.effective_match()?;
        Some(self.base.properties_for_match(&matched))
    }

    /// The merged value of one property, with dynamic values evaluated
    /// against this context.
    pub fn property_for_key(&mut self, name: &str) -> Option<Value> {
        self.apply_deferred();
        let raw = self.effective_properties()?.get(name).cloned()?;
        Some(self.resolve(&raw))
    }

    /// Truthiness of a property, or `default` when the property is absent.
    pub fn boolean_property_for_key(&mut self, name: &str, default: bool) -> bool {
        self.property_for_key(name)
            .map_or(default, |v| v.is_truthy())
    }

    /// The full merged property map for the current context state.
    ///
    /// The active scope's property set is applied as a read-through overlay
    /// over the unscoped map; dynamic values are evaluated on the way out.
    pub fn all_properties(&mut self) -> CMap<Arc<str>, Value> {
        self.apply_deferred();
        let Some(current) = self.current_match.clone() else {
            return CMap::new();
        };
        let base_map = self.base.properties_for_match(&current);
        let effective = self.effective_match().expect("current match exists");

        let mut view = NestedMap::over(base_map.entries().clone());
        if !Rc::ptr_eq(&effective, &current) {
            let scoped = self.base.properties_for_match(&effective);
            for (name, value) in scoped.iter() {
                if base_map.get(name) != Some(value) {
                    view.insert(name.clone(), value.clone());
                }
            }
        }

        let mut out = CMap::new();
        for (name, value) in view.iter() {
            out = out.insert(name.clone(), self.resolve(value));
        }
        out
    }

    /// The legal values declared for a key in the current context, resolved
    /// by asserting the reserved `declare` key in a scratch frame.
    ///
    /// # Errors
    /// Propagates assertion and stack errors from the scratch frame.
    pub fn legal_values_for_key(&mut self, key: &str) -> Result<Vec<Value>> {
        self.push();
        let asserted = self.set(DECLARE_KEY, Value::from(key));
        let values = match asserted {
            Ok(()) => self
                .property_for_key(key)
                .and_then(|v| v.as_list().map(|l| l.iter().cloned().collect()))
                .unwrap_or_default(),
            Err(err) => {
                self.pop()?;
                return Err(err);
            }
        };
        self.pop()?;
        Ok(values)
    }

    fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::Dynamic(dynamic) => dynamic.evaluate(self),
            other => other.clone(),
        }
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Debug-only invariant: every live value is backed by an unmasked stack
    /// entry, and every masked entry points at a later masker.
    #[cfg(debug_assertions)]
    fn check_consistency(&self) {
        for (key, value) in &self.values {
            let backing = self
                .entries
                .iter()
                .rev()
                .find(|e| !e.masked && e.key == *key);
            debug_assert!(
                backing.is_some_and(|e| e.value == *value),
                "live value {key}={value:?} has no unmasked stack entry"
            );
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if let Some(masker) = entry.masked_by {
                debug_assert!(entry.masked, "masked_by set on unmasked entry {idx}");
                debug_assert!(
                    masker > idx,
                    "entry {idx} claims to be masked by earlier entry {masker}"
                );
            }
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_consistency(&self) {}
}

impl PropertySource for Context {
    fn context_value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn property_value(&self, name: &str) -> Option<Value> {
        // Non-caching read used while evaluating dynamic values.
        let current = self.current_match.clone()?;
        let matched = match self.active_scope() {
            Some(scope) => self
                .base
                .match_assert(SCOPE_KEY, &Value::from(&*scope), Some(current)),
            None => current,
        };
        let raw = self.base.properties_for_match(&matched).get(name).cloned()?;
        Some(self.resolve(&raw))
    }
}
