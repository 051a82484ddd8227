//! Tests for snapshot capture and out-of-band replay.

use std::rc::Rc;
use std::sync::Arc;

use cascade_context::SharedActivations;
use cascade_foundation::Value;
use cascade_rulebase::{Rule, RuleBase, Selector};

fn props(pairs: &[(&str, Value)]) -> Vec<(Arc<str>, Value)> {
    pairs
        .iter()
        .map(|(n, v)| (Arc::from(*n), v.clone()))
        .collect()
}

fn shared() -> Rc<SharedActivations> {
    let base = RuleBase::new();
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("layout", Value::from("Inspect"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::new("operation", "edit"),
            ],
            props(&[("editable", Value::Bool(true))]),
        ))?;
        Ok(())
    })
    .unwrap();
    SharedActivations::new(Rc::new(base))
}

#[test]
fn hydrated_context_answers_like_the_original() {
    let shared = shared();
    let mut original = shared.new_context();
    original.set("class", "Invoice").unwrap();
    original.push();
    original.set("operation", "edit").unwrap();

    let mut replayed = original.snapshot().hydrate(&shared).unwrap();
    assert_eq!(replayed.values(), original.values());
    assert_eq!(replayed.all_properties(), original.all_properties());

    // The replica unwinds along the recreated push boundary.
    replayed.pop().unwrap();
    assert_eq!(replayed.value_for_key("operation"), None);
    assert_eq!(replayed.value_for_key("class"), Some(&Value::from("Invoice")));
}

#[test]
fn snapshot_drops_masked_assignments() {
    let shared = shared();
    let mut ctx = shared.new_context();
    ctx.set("operation", "view").unwrap();
    ctx.set("operation", "edit").unwrap();

    // Only the winning assignment is captured.
    let snapshot = ctx.snapshot();
    assert_eq!(snapshot.len(), 1);

    let replayed = snapshot.hydrate(&shared).unwrap();
    assert_eq!(replayed.value_for_key("operation"), Some(&Value::from("edit")));
}

#[test]
fn snapshot_survives_rule_set_changes() {
    let shared = shared();
    let mut ctx = shared.new_context();
    ctx.set("class", "Invoice").unwrap();
    let snapshot = ctx.snapshot();

    shared
        .rule_base()
        .load_rule_set(100, |b| {
            b.add_rule(Rule::new(
                vec![Selector::new("class", "Invoice")],
                props(&[("layout", Value::from("Form"))]),
            ))?;
            Ok(())
        })
        .unwrap();

    // Rehydrating after the load evaluates under the new rules.
    let mut replayed = snapshot.hydrate(&shared).unwrap();
    assert_eq!(replayed.property_for_key("layout"), Some(Value::from("Form")));
}
