//! The rule base: rule storage, indexing policy, and match/property caches.
//!
//! A [`RuleBase`] owns the flat rule array, the per-key indexes, the merge
//! policy registry, and the checksum-keyed property cache. It is an explicit
//! handle (`Rc<RuleBase>`) passed to every evaluation context, never ambient
//! global state, so independent rule bases can coexist in one process.
//!
//! The engine is single-threaded by design: interior `RefCell`s give the
//! shared handle fine-grained mutability, and every callback (first-use
//! observers, bracketed loaders) runs with no borrow held.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::{Diagnostics, Error, Result, Severity, Value};

use crate::keydata::{KeyData, KeyRegistry, MAX_KEYS};
use crate::matching::{rule_matches, JoinKind, MatchResult};
use crate::merge::{DeclareListMerger, PropertyManager, PropertyMerger};
use crate::property::PropertyMap;
use crate::rule::{Rule, RuleId};
use crate::selector::Selector;

/// Reserved key asserted to enter declare mode (`declare = <key name>`).
pub const DECLARE_KEY: &str = "declare";

/// Reserved synthetic key carrying the active property scope
/// (`_p = <scope key name>`).
pub const SCOPE_KEY: &str = "_p";

/// The shadow key an overridden assertion of `key` is re-filed under.
#[must_use]
pub fn shadow_key(key: &str) -> String {
    format!("{key}_o")
}

/// Observer notified the first time any value is asserted for a key.
///
/// Runs before the triggering lookup returns and may load additional rules
/// (e.g. reflect a host type into field rules) inside its own rule-set
/// bracket.
pub type KeyInitObserver = Rc<dyn Fn(&RuleBase, &str, &Value)>;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning and debugging switches for a rule base.
#[derive(Clone, Debug)]
pub struct RuleBaseConfig {
    /// Index only each rule's most selective selector (the rest are
    /// evaluated directly against surviving candidates). Disabling indexes
    /// every selector.
    pub partial_indexing: bool,
    /// Cache traversed assignment sequences for replay.
    pub cache_activations: bool,
    /// Double-check every filtered match against brute-force direct
    /// evaluation. Diagnostic only; never enable in production paths.
    pub debug_match_checks: bool,
    /// Hard bound on chained-assignment depth.
    pub max_chain_depth: usize,
}

impl Default for RuleBaseConfig {
    fn default() -> Self {
        Self {
            partial_indexing: true,
            cache_activations: true,
            debug_match_checks: false,
            max_chain_depth: 200,
        }
    }
}

impl RuleBaseConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to toggle partial indexing.
    #[must_use]
    pub fn with_partial_indexing(mut self, enabled: bool) -> Self {
        self.partial_indexing = enabled;
        self
    }

    /// Builder method to toggle activation caching.
    #[must_use]
    pub fn with_activation_caching(mut self, enabled: bool) -> Self {
        self.cache_activations = enabled;
        self
    }

    /// Builder method to toggle the brute-force match double-check.
    #[must_use]
    pub fn with_debug_match_checks(mut self, enabled: bool) -> Self {
        self.debug_match_checks = enabled;
        self
    }

    /// Builder method to set the chained-assignment depth bound.
    #[must_use]
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }
}

// =============================================================================
// Rule base
// =============================================================================

struct OpenRuleSet {
    start: usize,
    rank_offset: i32,
}

/// The rule base.
pub struct RuleBase {
    config: RuleBaseConfig,
    rules: RefCell<Vec<Rule>>,
    /// Ids at or past this count are mid-edit and excluded from matching.
    live_count: Cell<usize>,
    keys: RefCell<KeyRegistry>,
    observers: RefCell<HashMap<Arc<str>, Vec<KeyInitObserver>>>,
    manager: RefCell<PropertyManager>,
    /// Path-checksum keyed match-to-properties cache.
    property_cache: RefCell<HashMap<u64, Rc<PropertyMap>>>,
    generation: Cell<u64>,
    open_set: RefCell<Option<OpenRuleSet>>,
    diagnostics: Diagnostics,
}

impl Default for RuleBase {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBase {
    /// Creates a rule base with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuleBaseConfig::default())
    }

    /// Creates a rule base with the given configuration.
    #[must_use]
    pub fn with_config(config: RuleBaseConfig) -> Self {
        let base = Self {
            config,
            rules: RefCell::new(vec![Rule::noop()]),
            live_count: Cell::new(1),
            keys: RefCell::new(KeyRegistry::new()),
            observers: RefCell::new(HashMap::new()),
            manager: RefCell::new(PropertyManager::new()),
            property_cache: RefCell::new(HashMap::new()),
            generation: Cell::new(1),
            open_set: RefCell::new(None),
            diagnostics: Diagnostics::new(),
        };
        base.ensure_key(DECLARE_KEY, true);
        base.ensure_key(SCOPE_KEY, true);
        base
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RuleBaseConfig {
        &self.config
    }

    /// The diagnostics sink (capacity warnings, load reports).
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Current cache generation; bumped when a rule-set bracket closes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    fn bump_generation(&self) {
        self.generation.set(self.generation.get() + 1);
        self.property_cache.borrow_mut().clear();
    }

    // =========================================================================
    // Key registration
    // =========================================================================

    fn ensure_key(&self, name: &str, internal: bool) {
        let overflowed = {
            let mut keys = self.keys.borrow_mut();
            keys.register(name, internal).1
        };
        if overflowed {
            self.diagnostics.warn(format!(
                "context key capacity ({MAX_KEYS}) exceeded; key '{name}' is unindexed"
            ));
        }
    }

    /// Registers a context key (idempotent). Keys auto-register on first use;
    /// explicit registration exists so scope flags, transforms, and parents
    /// can be configured up front.
    pub fn register_key(&self, name: &str) {
        self.ensure_key(name, false);
    }

    /// Marks a key as defining a property scope (field/class/action-like).
    pub fn declare_property_scope(&self, name: &str) {
        self.ensure_key(name, false);
        let mut keys = self.keys.borrow_mut();
        if let Some(data) = keys.get_mut(name) {
            data.set_property_scope(true);
        }
    }

    /// True if the key defines a property scope.
    #[must_use]
    pub fn is_property_scope(&self, name: &str) -> bool {
        self.keys
            .borrow()
            .get(name)
            .is_some_and(KeyData::is_property_scope)
    }

    /// True if the key is a registered, non-internal context key; only such
    /// keys mirror properties back into the context.
    #[must_use]
    pub fn is_chaining_key(&self, name: &str) -> bool {
        self.keys
            .borrow()
            .get(name)
            .is_some_and(|d| !d.is_internal())
    }

    /// Registers a value transform applied to every assertion of the key.
    pub fn register_value_transformer(
        &self,
        name: &str,
        transform: Box<dyn Fn(&Value) -> Value>,
    ) {
        self.ensure_key(name, false);
        let mut keys = self.keys.borrow_mut();
        if let Some(data) = keys.get_mut(name) {
            data.set_transformer(transform);
        }
    }

    /// Registers a value-inheritance link for a key: asserting `child`
    /// transitively matches rules selecting `parent`.
    pub fn register_value_parent(&self, name: &str, child: &Value, parent: &Value) {
        self.ensure_key(name, false);
        let mut keys = self.keys.borrow_mut();
        if let Some(data) = keys.get_mut(name) {
            data.set_parent(child, parent);
        }
    }

    /// Registers an observer fired once per (key, value) first use.
    pub fn register_key_init_observer(&self, name: &str, observer: KeyInitObserver) {
        self.ensure_key(name, false);
        self.observers
            .borrow_mut()
            .entry(name.into())
            .or_default()
            .push(observer);
    }

    /// Registers the merge policy for a property name.
    pub fn register_merge_policy(&self, name: &str, merger: Rc<dyn PropertyMerger>) {
        self.manager.borrow_mut().register(name, merger);
    }

    /// Normalizes and transforms an asserted value for a key.
    #[must_use]
    pub fn transform_value(&self, name: &str, value: &Value) -> Value {
        self.ensure_key(name, false);
        self.keys
            .borrow()
            .get(name)
            .map_or_else(|| value.clone(), |d| d.transform(value))
    }

    /// Number of registered keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.borrow().len()
    }

    // =========================================================================
    // Rule-set lifecycle
    // =========================================================================

    /// Opens a rule-set bracket. `rank_offset` is added to the rank of every
    /// rule added inside, ordering whole rule sets relative to each other.
    ///
    /// # Errors
    /// Returns an error if a bracket is already open.
    pub fn begin_rule_set(&self, rank_offset: i32) -> Result<()> {
        let mut open = self.open_set.borrow_mut();
        if open.is_some() {
            return Err(Error::rule_set_already_open());
        }
        *open = Some(OpenRuleSet {
            start: self.rules.borrow().len(),
            rank_offset,
        });
        Ok(())
    }

    /// Closes the open bracket: added rules become live and the generation
    /// counter bumps so all caches lazily invalidate.
    ///
    /// # Errors
    /// Returns an error if no bracket is open.
    pub fn end_rule_set(&self) -> Result<()> {
        self.open_set
            .borrow_mut()
            .take()
            .ok_or_else(Error::rule_set_not_open)?;
        self.live_count.set(self.rules.borrow().len());
        self.bump_generation();
        Ok(())
    }

    /// Abandons the open bracket, disabling every rule it added, so a bad
    /// rule source cannot leave partially applied rules active. Returns the
    /// number of rules disabled.
    ///
    /// # Errors
    /// Returns an error if no bracket is open.
    pub fn abort_rule_set(&self) -> Result<usize> {
        let open = self
            .open_set
            .borrow_mut()
            .take()
            .ok_or_else(Error::rule_set_not_open)?;
        let disabled = {
            let mut rules = self.rules.borrow_mut();
            let mut disabled = 0;
            for rule in rules.iter_mut().skip(open.start) {
                if !rule.disabled {
                    rule.disabled = true;
                    disabled += 1;
                }
            }
            disabled
        };
        self.diagnostics.report(
            Severity::Error,
            format!("rule-set load aborted; {disabled} rule(s) disabled"),
        );
        Ok(disabled)
    }

    /// Runs a loader inside a bracket; on error the bracket is aborted (all
    /// added rules disabled) and the error propagated.
    ///
    /// # Errors
    /// Propagates bracket errors and any error from the loader.
    pub fn load_rule_set<F>(&self, rank_offset: i32, loader: F) -> Result<()>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        self.begin_rule_set(rank_offset)?;
        match loader(self) {
            Ok(()) => self.end_rule_set(),
            Err(err) => {
                let _ = self.abort_rule_set();
                Err(err)
            }
        }
    }

    // =========================================================================
    // Rule registration
    // =========================================================================

    /// Adds a rule to the open bracket and returns its id.
    ///
    /// Registration synthesizes a companion declare rule when the last
    /// selector is a declaration, rewrites overridden same-key selectors to
    /// their `_o` shadow key, attaches property-scope rules to the synthetic
    /// `_p` scope assertion, and indexes the most selective selector (all
    /// selectors when partial indexing is off).
    ///
    /// # Errors
    /// Returns an error if no rule-set bracket is open.
    pub fn add_rule(&self, rule: Rule) -> Result<RuleId> {
        let rank_offset = self
            .open_set
            .borrow()
            .as_ref()
            .map(|o| o.rank_offset)
            .ok_or_else(Error::rule_set_not_open)?;

        let mut rule = rule;
        rule.rank = rule.rank.saturating_add(rank_offset);

        // A trailing declaration selector also registers the declared value
        // as a first-class assertable item: a companion rule exposes it as a
        // declare-mode list entry.
        let decl = rule
            .selectors
            .last()
            .filter(|s| s.is_decl)
            .map(|s| (s.key.clone(), s.value.clone()));
        if let Some((decl_key, decl_value)) = decl {
            let mut companion_selectors =
                vec![Selector::new(DECLARE_KEY, Value::from(&*decl_key))];
            companion_selectors
                .extend(rule.selectors[..rule.selectors.len() - 1].iter().cloned());
            let companion = Rule::new(
                companion_selectors,
                vec![(
                    decl_key.clone(),
                    Value::List([decl_value].into_iter().collect()),
                )],
            )
            .with_rank(rule.rank)
            .with_line(rule.line);

            if !self.manager.borrow().has_policy(&decl_key) {
                self.register_merge_policy(&decl_key, Rc::new(DeclareListMerger));
            }
            let companion_id = self.register_rule(companion, false);
            rule.extras.push(companion_id);
        }

        Ok(self.register_rule(rule, true))
    }

    fn register_rule(&self, mut rule: Rule, scope_translation: bool) -> RuleId {
        // Same-key overrides earlier in the list shift to the shadow key:
        // a=1, b=x, a=2 behaves as a_o=1, b=x, a=2.
        let n = rule.selectors.len();
        for i in 0..n {
            let key = rule.selectors[i].key.clone();
            let overridden = rule.selectors[i + 1..].iter().any(|s| s.key == key);
            if overridden {
                let shadow: Arc<str> = shadow_key(&key).into();
                self.ensure_key(&shadow, true);
                rule.selectors[i].key = shadow;
            }
        }

        // Pre-register selector keys (reporting capacity overflow once).
        for selector in &rule.selectors {
            self.ensure_key(&selector.key, false);
        }

        // Attach the rule to its property scope: properties of a rule whose
        // selectors touch a scope key live in that scope's synthetic `_p`
        // property set, not in the base map.
        if scope_translation {
            let touches_declare = rule.selectors.iter().any(|s| &*s.key == DECLARE_KEY);
            let has_scope_selector = rule.selectors.iter().any(|s| &*s.key == SCOPE_KEY);
            if !touches_declare && !has_scope_selector {
                let scope = {
                    let keys = self.keys.borrow();
                    rule.selectors
                        .iter()
                        .rev()
                        .find(|s| {
                            !s.is_absence()
                                && keys.get(&s.key).is_some_and(KeyData::is_property_scope)
                        })
                        .map(|s| s.key.clone())
                };
                if let Some(scope) = scope {
                    rule.selectors
                        .push(Selector::new(SCOPE_KEY, Value::from(&*scope)));
                }
            }
        }

        let mut rules = self.rules.borrow_mut();
        let mut keys = self.keys.borrow_mut();
        #[allow(clippy::cast_possible_truncation)]
        let id = RuleId(rules.len() as u32);

        // Masks.
        for selector in &rule.selectors {
            let mask = keys.get(&selector.key).map_or(0, KeyData::mask);
            if selector.is_absence() {
                rule.key_anti_mask |= mask;
            } else {
                rule.key_matches_mask |= mask;
            }
        }

        // Pick the selectors to index.
        let positive: Vec<usize> = rule
            .selectors
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_absence())
            .map(|(i, _)| i)
            .collect();
        let to_index: Vec<usize> = if self.config.partial_indexing {
            positive
                .iter()
                .copied()
                .filter(|&i| keys.get(&rule.selectors[i].key).is_some_and(|d| d.id().is_some()))
                .max_by_key(|&i| {
                    let data = keys.get(&rule.selectors[i].key).expect("registered");
                    selectivity_rank(data, &rule.selectors[i].value)
                })
                .into_iter()
                .collect()
        } else {
            positive.clone()
        };

        for &i in &to_index {
            let selector = &rule.selectors[i];
            let Some(data) = keys.get_mut(&selector.key) else {
                continue;
            };
            if data.id().is_none() {
                continue; // capacity-degraded key: cannot occupy an index
            }
            match &selector.value {
                Value::List(items) => {
                    for item in items {
                        data.add_entry(item, id);
                    }
                }
                value => data.add_entry(value, id),
            }
            rule.key_indexed_mask |= data.mask();
        }

        let indexed_count = to_index
            .iter()
            .filter(|&&i| {
                keys.get(&rule.selectors[i].key).is_some_and(|d| d.id().is_some())
            })
            .count();
        let maskless_absence = rule
            .selectors
            .iter()
            .any(|s| s.is_absence() && keys.get(&s.key).is_some_and(|d| d.id().is_none()));
        rule.direct_eval = indexed_count < positive.len() || maskless_absence;

        if indexed_count == 0 && !positive.is_empty() {
            self.diagnostics.warn(format!(
                "rule at line {} could not be indexed on any key; it will not match",
                rule.line
            ));
        }

        rules.push(rule);
        id
    }

    /// Atomically replaces a rule in place, preserving its id space: the old
    /// slot becomes the permanent no-op, its companions are disabled, and
    /// the replacement is re-added under a fresh id. Used for live rule
    /// editing without breaking integer ids held elsewhere.
    ///
    /// # Errors
    /// Returns an error if the id is unknown or a rule-set bracket is open.
    pub fn update_edited_rule(&self, id: RuleId, replacement: Rule) -> Result<RuleId> {
        {
            let mut rules = self.rules.borrow_mut();
            if id == RuleId::NOOP || id.index() >= rules.len() {
                return Err(Error::internal(format!("cannot edit unknown rule {id:?}")));
            }
            let extras = std::mem::take(&mut rules[id.index()].extras);
            rules[id.index()] = Rule::noop();
            for extra in extras {
                if let Some(r) = rules.get_mut(extra.index()) {
                    r.disabled = true;
                }
            }
        }
        self.begin_rule_set(0)?;
        match self.add_rule(replacement) {
            Ok(new_id) => {
                self.end_rule_set()?;
                Ok(new_id)
            }
            Err(err) => {
                let _ = self.abort_rule_set();
                Err(err)
            }
        }
    }

    /// Disables a rule (a disabled rule is a permanent no-op, never removed).
    pub fn disable_rule(&self, id: RuleId) {
        let mut rules = self.rules.borrow_mut();
        if let Some(rule) = rules.get_mut(id.index()) {
            rule.disabled = true;
        }
        drop(rules);
        self.bump_generation();
    }

    /// Number of rules, including the no-op sentinel and disabled slots.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.borrow().len()
    }

    /// A snapshot of one rule, for inspection and tests.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<Rule> {
        self.rules.borrow().get(id.index()).cloned()
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Extends a match chain with one assertion (the normal filter join).
    ///
    /// First-use observers for (key, value) fire before the lookup so rules
    /// they synthesize participate in this very match.
    #[must_use]
    pub fn match_assert(
        &self,
        key: &str,
        value: &Value,
        prev: Option<Rc<MatchResult>>,
    ) -> Rc<MatchResult> {
        self.match_with(key, value, prev, JoinKind::Filter)
    }

    /// Extends a match chain with a masked (overridden) assertion, re-filed
    /// under the key's `_o` shadow so the earlier value stays available as a
    /// lower-priority fallback.
    #[must_use]
    pub fn match_override(
        &self,
        key: &str,
        value: &Value,
        prev: Option<Rc<MatchResult>>,
    ) -> Rc<MatchResult> {
        let shadow = shadow_key(key);
        self.ensure_key(&shadow, true);
        self.match_with(&shadow, value, prev, JoinKind::Union)
    }

    fn match_with(
        &self,
        key: &str,
        value: &Value,
        prev: Option<Rc<MatchResult>>,
        join: JoinKind,
    ) -> Rc<MatchResult> {
        self.ensure_key(key, false);
        self.notify_first_use(key, value);

        let (key_arc, key_mask, candidates) = {
            let mut keys = self.keys.borrow_mut();
            let data = keys.get_mut(key).expect("key registered above");
            let candidates = match value {
                // A list-valued assertion matches the union across elements.
                Value::List(items) => {
                    let mut merged: Vec<RuleId> = Vec::new();
                    for item in items {
                        merged = crate::matching::union_join(&merged, &data.lookup(item));
                    }
                    merged
                }
                v => data.lookup(v),
            };
            (data.name().clone(), data.mask(), candidates)
        };

        let rules = self.rules.borrow();
        let indexed_mask_of = |id: RuleId| rules.get(id.index()).map_or(0, |r| r.key_indexed_mask);
        let node = MatchResult::new(
            key_arc,
            value.clone(),
            key_mask,
            join,
            prev,
            candidates,
            &indexed_mask_of,
            self.generation.get(),
        );
        drop(rules);
        Rc::new(node)
    }

    fn notify_first_use(&self, key: &str, value: &Value) {
        let first = self
            .keys
            .borrow_mut()
            .get_mut(key)
            .is_some_and(|d| d.mark_first_use(value));
        if !first {
            return;
        }
        let observers: Vec<KeyInitObserver> = self
            .observers
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default();
        for observer in observers {
            observer(self, key, value);
        }
    }

    // =========================================================================
    // Property resolution
    // =========================================================================

    /// Resolves (and caches) the merged property map for a match.
    ///
    /// Cache hits are served from the node itself, then from the checksum
    /// keyed map. A stale (old-generation) node self-heals: its assertion
    /// chain is re-matched from scratch against the live rule base and the
    /// refreshed chain answers the query.
    #[must_use]
    pub fn properties_for_match(&self, matched: &Rc<MatchResult>) -> Rc<PropertyMap> {
        if matched.generation() != self.generation.get() {
            let refreshed = self.refresh_match(matched);
            return self.properties_for_match(&refreshed);
        }
        if let Some(map) = matched.cached_properties() {
            return map;
        }
        if let Some(map) = self.property_cache.borrow().get(&matched.checksum()) {
            matched.cache_properties(map.clone());
            return map.clone();
        }

        let map = Rc::new(self.compute_properties(matched));
        matched.cache_properties(map.clone());
        self.property_cache
            .borrow_mut()
            .insert(matched.checksum(), map.clone());
        map
    }

    /// Re-matches a stale chain bottom-up under the current generation.
    ///
    /// Keys are re-asserted exactly as stored, so `_o` shadow nodes keep
    /// their shadow key rather than being re-shadowed.
    fn refresh_match(&self, matched: &Rc<MatchResult>) -> Rc<MatchResult> {
        let mut nodes: Vec<Rc<MatchResult>> = Vec::new();
        let mut cursor = Some(matched.clone());
        while let Some(node) = cursor {
            cursor = node.prev().cloned();
            nodes.push(node);
        }
        let mut chain: Option<Rc<MatchResult>> = None;
        for node in nodes.iter().rev() {
            chain = Some(self.match_with(node.key(), node.value(), chain, node.join()));
        }
        chain.expect("a match chain has at least one node")
    }

    fn compute_properties(&self, matched: &MatchResult) -> PropertyMap {
        let rules = self.rules.borrow();
        let keys = self.keys.borrow();
        let live = self.live_count.get();

        let mut ids = matched.filtered_matches(&rules, live, &keys);
        if self.config.debug_match_checks {
            self.double_check_matches(matched, &ids, &rules, &keys, live);
        }
        // Stable sort keeps registration order among equal ranks.
        ids.sort_by(|a, b| rules[a.index()].rank.cmp(&rules[b.index()].rank));

        let declare = matched.values_by_key().contains_key(DECLARE_KEY);
        let manager = self.manager.borrow();
        let mut map = PropertyMap::new(declare);
        for id in ids {
            let rule = &rules[id.index()];
            for (name, value) in &rule.properties {
                let merged = manager.merge(name, map.get(name), value, declare);
                map.set(name.clone(), merged);
                if keys.get(name).is_some_and(|d| !d.is_internal()) {
                    map.record_context_key(name.clone());
                }
            }
        }
        map.awaken();
        map
    }

    /// Diagnostic cross-check: the filtered candidate refinement must agree
    /// with brute-force evaluation of every live rule.
    fn double_check_matches(
        &self,
        matched: &MatchResult,
        filtered: &[RuleId],
        rules: &[Rule],
        keys: &KeyRegistry,
        live: usize,
    ) {
        let values = matched.values_by_key();
        let mut brute = Vec::new();
        for (i, rule) in rules.iter().enumerate().take(live).skip(1) {
            if rule.disabled || rule.selectors.is_empty() {
                continue;
            }
            if rule.key_anti_mask & matched.matched_mask() != 0 {
                continue;
            }
            if rule_matches(rule, &values, keys) {
                #[allow(clippy::cast_possible_truncation)]
                brute.push(RuleId(i as u32));
            }
        }
        assert!(
            brute == filtered,
            "match divergence: filtered {filtered:?} != brute-force {brute:?} for {matched:?}"
        );
    }
}

fn selectivity_rank(data: &KeyData, value: &Value) -> u32 {
    // Discriminating, concrete values make the best index entries; scope
    // keys are the strongest discriminators of all.
    let value_rank = match value {
        Value::Nil => 0,
        v if v.is_wildcard() => 1,
        Value::Bool(_) => 2,
        _ => 4,
    };
    let scope_bonus = if data.is_property_scope() { 8 } else { 0 };
    value_rank + scope_bonus
}
