//! Tests for push/pop discipline and override masking.

use std::rc::Rc;
use std::sync::Arc;

use cascade_context::SharedActivations;
use cascade_foundation::Value;
use cascade_rulebase::{Rule, RuleBase, Selector};

use proptest::prelude::*;

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
            vec![Selector::new("class", Value::wildcard())],
            props(&[("labeled", Value::Bool(true))]),
        ))?;
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::new("operation", "edit"),
            ],
            props(&[("editable", Value::Bool(true))]),
        ))?;
        b.add_rule(Rule::new(
            vec![Selector::new("layout", "Inspect")],
            props(&[("columns", Value::Int(2))]),
        ))?;
        Ok(())
    })
    .unwrap();
    SharedActivations::new(Rc::new(base))
}

#[test]
fn nested_frames_restore_in_order() {
    let shared = shared();
    let mut ctx = shared.new_context();

    ctx.set("class", "Invoice").unwrap();
    let outer = ctx.values();

    ctx.push();
    ctx.set("operation", "edit").unwrap();
    let middle = ctx.values();

    ctx.push();
    ctx.set("operation", "view").unwrap();
    ctx.set("layout", "Inspect").unwrap();

    ctx.pop().unwrap();
    assert_eq!(ctx.values(), middle);
    assert_eq!(ctx.property_for_key("editable"), Some(Value::Bool(true)));

    ctx.pop().unwrap();
    assert_eq!(ctx.values(), outer);
    assert_eq!(ctx.property_for_key("editable"), None);
}

#[test]
fn override_within_frame_unwinds_with_it() {
    let shared = shared();
    let mut ctx = shared.new_context();

    ctx.set("class", "Invoice").unwrap();
    ctx.set("operation", "view").unwrap();
    ctx.set("layout", "Inspect").unwrap();
    let before = ctx.values();
    let properties_before = ctx.all_properties();

    ctx.push();
    // Overrides a key asserted below the frame, masking entries across the
    // boundary.
    ctx.set("operation", "edit").unwrap();
    assert_eq!(ctx.property_for_key("editable"), Some(Value::Bool(true)));

    ctx.pop().unwrap();
    assert_eq!(ctx.values(), before);
    assert_eq!(ctx.all_properties(), properties_before);
}

#[test]
fn repeated_override_cycles_are_stable() {
    let shared = shared();
    let mut ctx = shared.new_context();
    ctx.set("class", "Invoice").unwrap();

    for _ in 0..3 {
        ctx.push();
        ctx.set("class", "Payment").unwrap();
        assert_eq!(ctx.value_for_key("class"), Some(&Value::from("Payment")));
        ctx.pop().unwrap();
        assert_eq!(ctx.value_for_key("class"), Some(&Value::from("Invoice")));
    }
}

// =============================================================================
// Push/pop inverse law
// =============================================================================

fn key_for(index: u8) -> &'static str {
    ["class", "operation", "layout", "field"][index as usize % 4]
}

fn value_for(index: u8) -> Value {
    match index % 5 {
        0 => Value::from("Invoice"),
        1 => Value::from("edit"),
        2 => Value::from("Inspect"),
        3 => Value::Bool(true),
        _ => Value::Int(i64::from(index)),
    }
}

proptest! {
    /// For any assignment sequence inside a push/pop pair, the value map is
    /// bit-for-bit identical to the pre-push state afterwards.
    #[test]
    fn push_pop_is_an_exact_inverse(
        prefix in proptest::collection::vec((0u8..8, 0u8..10), 0..6),
        inner in proptest::collection::vec((0u8..8, 0u8..10), 0..10),
    ) {
        let shared = shared();
        let mut ctx = shared.new_context();
        for (k, v) in &prefix {
            ctx.set(key_for(*k), value_for(*v)).unwrap();
        }
        let values_before = ctx.values();
        let properties_before = ctx.all_properties();

        ctx.push();
        for (k, v) in &inner {
            ctx.set(key_for(*k), value_for(*v)).unwrap();
        }
        ctx.pop().unwrap();

        prop_assert_eq!(ctx.values(), values_before);
        prop_assert_eq!(ctx.all_properties(), properties_before);
    }
}
