//! The shared replay tree of previously traversed assignment sequences.
//!
//! Every assertion a [`crate::Context`] performs extends a path through this
//! tree; the node reached caches the assignment records the first traversal
//! produced, so replaying the same sequence skips rule matching entirely.
//! Nodes live in an explicit arena addressed by `(parent, key, value,
//! chained)` and are generation-stamped: a stale node is lazily reset on the
//! next lookup rather than eagerly torn down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::{DynamicValue, Value};
use cascade_rulebase::{MatchResult, RuleBase};

/// Identity of one activation node within its arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ActivationId(u32);

impl ActivationId {
    /// The root node every context starts from.
    pub const ROOT: ActivationId = ActivationId(0);

    /// Returns the raw index of this node.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActivationId({})", self.0)
    }
}

/// The reusable half of an assignment, cached for O(1) replay.
///
/// Everything here is session-independent: the externally observable value,
/// its transformed form, and the match chain the assertion produced. The
/// per-session half (masking bookkeeping, salience) lives on
/// [`crate::Assignment`] and is stamped at apply time.
#[derive(Clone)]
pub struct AssignmentRecord {
    /// Asserted context key.
    pub key: Arc<str>,
    /// Externally observable value, as passed to `set`.
    pub value: Value,
    /// The value after normalization and any key transform.
    pub transformed: Value,
    /// The match chain after this assertion.
    pub matched: Rc<MatchResult>,
    /// True if the assertion was forward-derived from a property.
    pub chained: bool,
}

impl fmt::Debug for AssignmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.key, self.value)?;
        if self.chained {
            write!(f, " (chained)")?;
        }
        Ok(())
    }
}

type ChildKey = (Arc<str>, Value, bool);

struct ActivationNode {
    generation: u64,
    children: HashMap<ChildKey, ActivationId>,
    records: Vec<AssignmentRecord>,
    /// Forward assignments whose dynamic value was not yet resolvable when
    /// this node was first traversed; re-attempted on the next read.
    deferred: Vec<(Arc<str>, Arc<DynamicValue>)>,
    /// Cached `_p`-extended match per active scope key.
    scope_matches: HashMap<Arc<str>, Rc<MatchResult>>,
}

impl ActivationNode {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            children: HashMap::new(),
            records: Vec::new(),
            deferred: Vec::new(),
            scope_matches: HashMap::new(),
        }
    }

    fn reset(&mut self, generation: u64) {
        self.generation = generation;
        self.children.clear();
        self.records.clear();
        self.deferred.clear();
        self.scope_matches.clear();
    }
}

/// Arena of activation nodes.
///
/// Node 0 is the root (the empty assignment sequence). Nodes are never
/// removed; invalidation is by generation stamp, and a stale node is reset in
/// place the first time it is consulted after a rule-set change.
pub struct ActivationArena {
    nodes: Vec<ActivationNode>,
}

impl ActivationArena {
    /// Creates an arena holding only the root node.
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            nodes: vec![ActivationNode::new(generation)],
        }
    }

    /// Number of nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Looks up the cached child for one assertion, validating its
    /// generation. A stale child is reset in place and reported as absent so
    /// the caller repopulates it.
    pub fn replayable_child(
        &mut self,
        parent: ActivationId,
        key: &Arc<str>,
        value: &Value,
        chained: bool,
        generation: u64,
    ) -> Option<ActivationId> {
        let child_key = (key.clone(), value.clone(), chained);
        let child = *self.nodes[parent.index()].children.get(&child_key)?;
        let node = &mut self.nodes[child.index()];
        if node.generation != generation {
            node.reset(generation);
            return None;
        }
        if node.records.is_empty() {
            return None;
        }
        Some(child)
    }

    /// Returns (creating if needed) the child node for one assertion and
    /// stores the records its first traversal produced.
    pub fn cache_child(
        &mut self,
        parent: ActivationId,
        chained: bool,
        records: Vec<AssignmentRecord>,
        generation: u64,
    ) -> ActivationId {
        let first = records
            .first()
            .expect("an assignment produces at least its own record");
        let child_key = (first.key.clone(), first.value.clone(), chained);
        let child = match self.nodes[parent.index()].children.get(&child_key) {
            Some(&id) => id,
            None => {
                #[allow(clippy::cast_possible_truncation)]
                let id = ActivationId(self.nodes.len() as u32);
                self.nodes.push(ActivationNode::new(generation));
                self.nodes[parent.index()].children.insert(child_key, id);
                id
            }
        };
        let node = &mut self.nodes[child.index()];
        node.generation = generation;
        node.records = records;
        child
    }

    /// The records cached on a node.
    #[must_use]
    pub fn records(&self, id: ActivationId) -> &[AssignmentRecord] {
        &self.nodes[id.index()].records
    }

    /// Parks a deferred (unresolvable dynamic) forward assignment on a node.
    pub fn push_deferred(&mut self, id: ActivationId, key: Arc<str>, value: Arc<DynamicValue>) {
        let node = &mut self.nodes[id.index()];
        if !node
            .deferred
            .iter()
            .any(|(k, v)| *k == key && Arc::ptr_eq(v, &value))
        {
            node.deferred.push((key, value));
        }
    }

    /// The deferred assignments parked on a node.
    #[must_use]
    pub fn deferred(&self, id: ActivationId) -> Vec<(Arc<str>, Arc<DynamicValue>)> {
        self.nodes[id.index()].deferred.clone()
    }

    /// The cached scope-extended match for a node, if still current.
    #[must_use]
    pub fn scope_match(
        &self,
        id: ActivationId,
        scope: &Arc<str>,
        generation: u64,
    ) -> Option<Rc<MatchResult>> {
        self.nodes[id.index()]
            .scope_matches
            .get(scope)
            .filter(|m| m.generation() == generation)
            .cloned()
    }

    /// Caches the scope-extended match for a node.
    pub fn cache_scope_match(&mut self, id: ActivationId, scope: Arc<str>, matched: Rc<MatchResult>) {
        self.nodes[id.index()].scope_matches.insert(scope, matched);
    }
}

/// Process-wide handle owning the rule base and the activation tree.
///
/// All contexts created from one handle share both, so any context's first
/// traversal of an assignment path benefits every later traversal. The
/// handle is `Rc`-shared and single-threaded, like everything in the engine.
pub struct SharedActivations {
    base: Rc<RuleBase>,
    arena: RefCell<ActivationArena>,
}

impl SharedActivations {
    /// Creates a handle over a rule base.
    #[must_use]
    pub fn new(base: Rc<RuleBase>) -> Rc<Self> {
        let generation = base.generation();
        Rc::new(Self {
            base,
            arena: RefCell::new(ActivationArena::new(generation)),
        })
    }

    /// The shared rule base.
    #[must_use]
    pub fn rule_base(&self) -> &Rc<RuleBase> {
        &self.base
    }

    /// The shared replay arena.
    #[must_use]
    pub fn arena(&self) -> &RefCell<ActivationArena> {
        &self.arena
    }
}
