//! Tests for forward-derived assignments and property scopes.

use std::rc::Rc;
use std::sync::Arc;

use cascade_context::SharedActivations;
use cascade_foundation::{DynamicValue, FieldPath, Value};
use cascade_rulebase::{Rule, RuleBase, Selector};

fn props(pairs: &[(&str, Value)]) -> Vec<(Arc<str>, Value)> {
    pairs
        .iter()
        .map(|(n, v)| (Arc::from(*n), v.clone()))
        .collect()
}

fn shared_with(base: RuleBase) -> Rc<SharedActivations> {
    SharedActivations::new(Rc::new(base))
}

#[test]
fn derivation_cascades_through_multiple_hops() {
    let base = RuleBase::new();
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("operation", Value::from("view"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![Selector::new("operation", "view")],
            props(&[("layout", Value::from("Inspect"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![Selector::new("layout", "Inspect")],
            props(&[("toolbar", Value::Bool(false))]),
        ))?;
        Ok(())
    })
    .unwrap();
    let mut ctx = shared_with(base).new_context();

    ctx.set("class", "Invoice").unwrap();
    assert_eq!(ctx.value_for_key("operation"), Some(&Value::from("view")));
    assert_eq!(ctx.value_for_key("layout"), Some(&Value::from("Inspect")));
    assert_eq!(ctx.property_for_key("toolbar"), Some(Value::Bool(false)));
}

#[test]
fn derived_assignments_unwind_with_their_trigger() {
    let base = RuleBase::new();
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("layout", Value::from("Inspect"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![Selector::new("layout", Value::wildcard())],
            props(&[("framed", Value::Bool(true))]),
        ))?;
        Ok(())
    })
    .unwrap();
    let mut ctx = shared_with(base).new_context();

    ctx.push();
    ctx.set("class", "Invoice").unwrap();
    assert_eq!(ctx.value_for_key("layout"), Some(&Value::from("Inspect")));
    ctx.pop().unwrap();

    assert_eq!(ctx.value_for_key("layout"), None);
    assert_eq!(ctx.property_for_key("framed"), None);
}

#[test]
fn scope_properties_overlay_the_unscoped_base() {
    let base = RuleBase::new();
    base.declare_property_scope("class");
    base.declare_property_scope("field");
    base.load_rule_set(0, |b| {
        // Unscoped: no selector touches a scope key.
        b.add_rule(Rule::new(
            vec![Selector::new("operation", "edit")],
            props(&[("chrome", Value::from("slim"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("banner", Value::from("invoices"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::new("field", "amount"),
            ],
            props(&[("label", Value::from("Amount"))]),
        ))?;
        Ok(())
    })
    .unwrap();
    let mut ctx = shared_with(base).new_context();

    ctx.set("operation", "edit").unwrap();
    ctx.set("class", "Invoice").unwrap();

    // Class is the active scope: its set overlays the unscoped base.
    let all = ctx.all_properties();
    assert_eq!(all.get(&"chrome".into()), Some(&Value::from("slim")));
    assert_eq!(all.get(&"banner".into()), Some(&Value::from("invoices")));
    assert_eq!(all.get(&"label".into()), None);

    // Asserting the finer scope key swaps the active set; the unscoped base
    // still reads through.
    ctx.set("field", "amount").unwrap();
    let all = ctx.all_properties();
    assert_eq!(all.get(&"chrome".into()), Some(&Value::from("slim")));
    assert_eq!(all.get(&"label".into()), Some(&Value::from("Amount")));
    assert_eq!(all.get(&"banner".into()), None);
}

#[test]
fn latest_scope_key_wins() {
    let base = RuleBase::new();
    base.declare_property_scope("class");
    base.declare_property_scope("field");
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("tier", Value::from("class"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::new("field", "amount"),
            ],
            props(&[("tier", Value::from("field"))]),
        ))?;
        Ok(())
    })
    .unwrap();
    let mut ctx = shared_with(base).new_context();

    ctx.set("class", "Invoice").unwrap();
    assert_eq!(ctx.property_for_key("tier"), Some(Value::from("class")));

    // Asserting the finer scope key re-targets the scoped property set.
    ctx.set("field", "amount").unwrap();
    assert_eq!(ctx.property_for_key("tier"), Some(Value::from("field")));
}

#[test]
fn deferred_assignment_survives_replayed_paths() {
    let rules = |b: &RuleBase| -> cascade_foundation::Result<()> {
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[(
                "status",
                Value::from(DynamicValue::FieldPath(FieldPath::parse("object.status"))),
            )]),
        ))?;
        b.add_rule(Rule::new(
            vec![Selector::new("status", "open")],
            props(&[("closable", Value::Bool(true))]),
        ))?;
        Ok(())
    };
    let base = RuleBase::new();
    base.load_rule_set(0, rules).unwrap();
    let shared = shared_with(base);

    // First traversal parks the unresolvable forward assignment.
    let mut warmup = shared.new_context();
    warmup.set("class", "Invoice").unwrap();
    assert_eq!(warmup.value_for_key("status"), None);

    // A second context replays the same path and inherits the parked
    // assignment, which resolves once the root object arrives.
    let mut ctx = shared.new_context();
    ctx.set("class", "Invoice").unwrap();
    let object: cascade_foundation::CMap<Arc<str>, Value> =
        [(Arc::from("status"), Value::from("open"))].into_iter().collect();
    ctx.set("object", Value::Map(object)).unwrap();
    assert_eq!(ctx.property_for_key("closable"), Some(Value::Bool(true)));
}
