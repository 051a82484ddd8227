//! End-to-end scenarios exercising matching, merging, and the context stack
//! together.

use std::rc::Rc;
use std::sync::Arc;

use cascade_context::SharedActivations;
use cascade_foundation::Value;
use cascade_rulebase::{AndMerger, Rule, RuleBase, Selector};

fn props(pairs: &[(&str, Value)]) -> Vec<(Arc<str>, Value)> {
    pairs
        .iter()
        .map(|(n, v)| (Arc::from(*n), v.clone()))
        .collect()
}

/// A field is visible by default; declaring the `hidden` trait on it flips
/// visibility through the AND merge, and popping the trait restores it.
#[test]
fn declared_trait_hides_field_until_popped() {
    let base = RuleBase::new();
    base.declare_property_scope("field");
    base.register_merge_policy("visible", Rc::new(AndMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("field", Value::wildcard())],
            props(&[("visible", Value::Bool(true))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![
                    Selector::new("field", Value::wildcard()),
                    Selector::decl("trait", "hidden"),
                ],
                props(&[("visible", Value::Bool(false))]),
            )
            .with_rank(10),
        )?;
        Ok(())
    })
    .unwrap();
    let shared = SharedActivations::new(Rc::new(base));
    let mut ctx = shared.new_context();

    ctx.set("field", "x").unwrap();
    assert!(ctx.boolean_property_for_key("visible", false));

    ctx.push();
    ctx.set("trait", "hidden").unwrap();
    assert!(!ctx.boolean_property_for_key("visible", true));

    ctx.pop().unwrap();
    assert!(ctx.boolean_property_for_key("visible", false));
}

/// Two rules indexed on different keys: asserting `layout` and `operation`
/// (but no `class`) must include the operation rule and exclude the class
/// rule, whose unmatched `class` requirement rules it out.
#[test]
fn unmatched_indexed_key_excludes_rule() {
    let base = RuleBase::new();
    base.declare_property_scope("class");
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Foo"),
                Selector::new("layout", "Inspect"),
            ],
            props(&[("from_class", Value::Bool(true))]),
        ))?;
        b.add_rule(Rule::new(
            vec![
                Selector::new("operation", "view"),
                Selector::new("layout", "Inspect"),
            ],
            props(&[("from_operation", Value::Bool(true))]),
        ))?;
        Ok(())
    })
    .unwrap();
    let shared = SharedActivations::new(Rc::new(base));
    let mut ctx = shared.new_context();

    ctx.set("layout", "Inspect").unwrap();
    ctx.set("operation", "view").unwrap();

    assert_eq!(ctx.property_for_key("from_operation"), Some(Value::Bool(true)));
    assert_eq!(ctx.property_for_key("from_class"), None);

    // With the class asserted too, both rules apply.
    ctx.set("class", "Foo").unwrap();
    assert_eq!(ctx.property_for_key("from_class"), Some(Value::Bool(true)));
    assert_eq!(ctx.property_for_key("from_operation"), Some(Value::Bool(true)));
}

/// A full session: class rules, field declarations, trait-driven visibility,
/// and legal-value enumeration working together.
#[test]
fn invoice_session_walkthrough() {
    let base = RuleBase::new();
    base.declare_property_scope("class");
    base.declare_property_scope("field");
    base.register_merge_policy("visible", Rc::new(AndMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("layout", Value::from("Inspect"))]),
        ))?;
        for field in ["amount", "vendor", "audit"] {
            b.add_rule(Rule::new(
                vec![
                    Selector::new("class", "Invoice"),
                    Selector::decl("field", field),
                ],
                props(&[("visible", Value::Bool(true))]),
            ))?;
        }
        b.add_rule(
            Rule::new(
                vec![
                    Selector::new("class", "Invoice"),
                    Selector::new("operation", "view"),
                    Selector::new("field", "audit"),
                ],
                props(&[("visible", Value::Bool(false))]),
            )
            .with_rank(50),
        )?;
        Ok(())
    })
    .unwrap();
    let shared = SharedActivations::new(Rc::new(base));
    let mut ctx = shared.new_context();

    ctx.set("class", "Invoice").unwrap();
    let fields = ctx.legal_values_for_key("field").unwrap();
    assert_eq!(
        fields,
        vec![
            Value::from("amount"),
            Value::from("vendor"),
            Value::from("audit")
        ]
    );

    ctx.set("operation", "view").unwrap();
    for field in ["amount", "vendor"] {
        ctx.push();
        ctx.set("field", field).unwrap();
        assert!(ctx.boolean_property_for_key("visible", false), "{field}");
        ctx.pop().unwrap();
    }

    ctx.push();
    ctx.set("field", "audit").unwrap();
    assert!(!ctx.boolean_property_for_key("visible", true));
    ctx.pop().unwrap();
}
