//! Per-property-name merge policies.
//!
//! Each property name may register a [`PropertyMerger`]; the registered
//! policy decides how a later rule's value folds into the accumulated value.
//! With no policy registered, maps merge recursively and everything else
//! overwrites. [`Value::Override`] bypasses the policy entirely for one
//! merge round.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::{CVec, DynamicValue, Value};

/// A merge policy for one property name.
pub trait PropertyMerger: fmt::Debug {
    /// Folds `incoming` into `existing` (the accumulated value so far).
    fn merge(&self, existing: Option<&Value>, incoming: &Value, declare: bool) -> Value;
}

/// Last value wins.
#[derive(Debug, Default)]
pub struct OverwriteMerger;

impl PropertyMerger for OverwriteMerger {
    fn merge(&self, _existing: Option<&Value>, incoming: &Value, _declare: bool) -> Value {
        incoming.clone()
    }
}

/// Order-preserving, deduplicated union.
#[derive(Debug, Default)]
pub struct ListMerger;

impl PropertyMerger for ListMerger {
    fn merge(&self, existing: Option<&Value>, incoming: &Value, _declare: bool) -> Value {
        merge_lists(existing, incoming)
    }
}

/// Overwrite normally; union when merging in declare mode.
#[derive(Debug, Default)]
pub struct DeclareListMerger;

impl PropertyMerger for DeclareListMerger {
    fn merge(&self, existing: Option<&Value>, incoming: &Value, declare: bool) -> Value {
        if declare {
            merge_lists(existing, incoming)
        } else {
            incoming.clone()
        }
    }
}

/// List union where members of the same trait group mutually exclude: the
/// incoming member evicts any accumulated member of its group.
#[derive(Debug, Default)]
pub struct TraitListMerger {
    groups: HashMap<Arc<str>, Arc<str>>,
}

impl TraitListMerger {
    /// Creates a trait merger with the given trait-to-group table. Traits
    /// absent from the table never exclude each other.
    #[must_use]
    pub fn new(groups: HashMap<Arc<str>, Arc<str>>) -> Self {
        Self { groups }
    }

    fn group_of(&self, value: &Value) -> Option<&Arc<str>> {
        value.as_str().and_then(|s| self.groups.get(s))
    }
}

impl PropertyMerger for TraitListMerger {
    fn merge(&self, existing: Option<&Value>, incoming: &Value, _declare: bool) -> Value {
        let Some(existing) = existing else {
            return incoming.clone();
        };
        if existing == incoming {
            return incoming.clone();
        }

        let incoming_items = as_items(incoming);
        let mut out: Vec<Value> = Vec::new();

        // Accumulated members survive unless an incoming member shares
        // their trait group.
        for item in as_items(existing) {
            let evicted = self.group_of(&item).is_some_and(|group| {
                incoming_items
                    .iter()
                    .any(|inc| self.group_of(inc) == Some(group))
            });
            if !evicted {
                out.push(item);
            }
        }
        for item in incoming_items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::List(out.into_iter().collect())
    }
}

/// Boolean AND with short-circuit on any resolved `false`; accumulates a
/// deferred chain while an operand is still dynamic.
#[derive(Debug, Default)]
pub struct AndMerger;

impl PropertyMerger for AndMerger {
    fn merge(&self, existing: Option<&Value>, incoming: &Value, _declare: bool) -> Value {
        let Some(existing) = existing else {
            return incoming.clone();
        };

        // A resolved false is permanent regardless of the other operand.
        let existing_false = !existing.is_dynamic() && !existing.is_truthy();
        let incoming_false = !incoming.is_dynamic() && !incoming.is_truthy();
        if existing_false || incoming_false {
            return Value::Bool(false);
        }

        if existing.is_dynamic() || incoming.is_dynamic() {
            let mut operands: Vec<Value> = Vec::new();
            push_and_operand(&mut operands, existing);
            push_and_operand(&mut operands, incoming);
            return Value::Dynamic(Arc::new(DynamicValue::DeferredAnd(
                operands.into_iter().collect(),
            )));
        }

        Value::Bool(true)
    }
}

fn push_and_operand(operands: &mut Vec<Value>, value: &Value) {
    match value {
        Value::Dynamic(d) => {
            if let DynamicValue::DeferredAnd(chain) = &**d {
                operands.extend(chain.iter().cloned());
            } else {
                operands.push(value.clone());
            }
        }
        other => operands.push(other.clone()),
    }
}

/// Validation short-circuit: the first error (a string message or `false`)
/// wins over anything merged later.
#[derive(Debug, Default)]
pub struct ValidMerger;

impl PropertyMerger for ValidMerger {
    fn merge(&self, existing: Option<&Value>, incoming: &Value, _declare: bool) -> Value {
        match existing {
            Some(v @ Value::String(_)) => v.clone(),
            Some(v @ Value::Bool(false)) => v.clone(),
            _ => incoming.clone(),
        }
    }
}

fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.iter().cloned().collect(),
        other => vec![other.clone()],
    }
}

fn merge_lists(existing: Option<&Value>, incoming: &Value) -> Value {
    let Some(existing) = existing else {
        return incoming.clone();
    };
    if existing == incoming {
        return incoming.clone();
    }
    let mut out: CVec<Value> = CVec::new();
    for item in as_items(existing).into_iter().chain(as_items(incoming)) {
        if !out.contains(&item) {
            out = out.push_back(item);
        }
    }
    Value::List(out)
}

/// Registry of per-property-name merge policies.
#[derive(Debug, Default)]
pub struct PropertyManager {
    policies: HashMap<Arc<str>, Rc<dyn PropertyMerger>>,
}

impl PropertyManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the merge policy for a property name.
    pub fn register(&mut self, name: impl Into<Arc<str>>, merger: Rc<dyn PropertyMerger>) {
        self.policies.insert(name.into(), merger);
    }

    /// True if a policy is registered for the name.
    #[must_use]
    pub fn has_policy(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Merges `incoming` into `existing` under the policy for `name`.
    ///
    /// An [`Value::Override`]-wrapped incoming value bypasses the policy and
    /// lands unwrapped, so later merges apply policy again.
    #[must_use]
    pub fn merge(
        &self,
        name: &str,
        existing: Option<&Value>,
        incoming: &Value,
        declare: bool,
    ) -> Value {
        if let Value::Override(inner) = incoming {
            return (**inner).clone();
        }
        match self.policies.get(name) {
            Some(policy) => policy.merge(existing, incoming, declare),
            None => default_merge(existing, incoming),
        }
    }
}

/// Default policy: maps merge recursively, everything else overwrites.
fn default_merge(existing: Option<&Value>, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Map(base)), Value::Map(update)) => {
            let mut merged = base.clone();
            for (k, v) in update.iter() {
                let folded = default_merge(base.get(k), v);
                merged = merged.insert(k.clone(), folded);
            }
            Value::Map(merged)
        }
        _ => incoming.clone(),
    }
}
