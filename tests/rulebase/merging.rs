//! Tests for property merge policies driven through a rule base.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::{DynamicValue, Expr, Value};
use cascade_rulebase::{
    AndMerger, ListMerger, Rule, RuleBase, Selector, TraitListMerger, ValidMerger,
};

fn props(pairs: &[(&str, Value)]) -> Vec<(Arc<str>, Value)> {
    pairs
        .iter()
        .map(|(n, v)| (Arc::from(*n), v.clone()))
        .collect()
}

fn list(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

#[test]
fn and_policy_short_circuits_across_rules() {
    let base = RuleBase::new();
    base.register_merge_policy("visible", Rc::new(AndMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("field", Value::wildcard())],
            props(&[("visible", Value::Bool(true))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![Selector::new("field", "secret")],
                props(&[("visible", Value::Bool(false))]),
            )
            .with_rank(10),
        )?;
        b.add_rule(
            Rule::new(
                vec![Selector::new("field", "secret")],
                props(&[("visible", Value::Bool(true))]),
            )
            .with_rank(20),
        )?;
        Ok(())
    })
    .unwrap();

    // The rank-10 false is permanent: the later true cannot revive it.
    let m = base.match_assert("field", &Value::from("secret"), None);
    assert_eq!(
        base.properties_for_match(&m).get("visible"),
        Some(&Value::Bool(false))
    );
}

#[test]
fn override_value_reverses_permanent_false() {
    let base = RuleBase::new();
    base.register_merge_policy("visible", Rc::new(AndMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("field", "secret")],
            props(&[("visible", Value::Bool(false))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![Selector::new("field", "secret")],
                props(&[(
                    "visible",
                    Value::Override(Arc::new(Value::Bool(true))),
                )]),
            )
            .with_rank(100),
        )?;
        Ok(())
    })
    .unwrap();

    let m = base.match_assert("field", &Value::from("secret"), None);
    assert_eq!(
        base.properties_for_match(&m).get("visible"),
        Some(&Value::Bool(true))
    );
}

#[test]
fn and_policy_defers_dynamic_operands() {
    let base = RuleBase::new();
    base.register_merge_policy("editable", Rc::new(AndMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("field", Value::wildcard())],
            props(&[("editable", Value::Bool(true))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![Selector::new("field", "amount")],
                props(&[(
                    "editable",
                    Value::from(DynamicValue::Expr(Expr::Eq(
                        Box::new(Expr::ContextKey("operation".into())),
                        Box::new(Expr::Literal(Value::from("edit"))),
                    ))),
                )]),
            )
            .with_rank(10),
        )?;
        Ok(())
    })
    .unwrap();

    let m = base.match_assert("field", &Value::from("amount"), None);
    let merged = base.properties_for_match(&m);
    // The merged value is a deferred chain, resolved at read time.
    assert!(merged.get("editable").is_some_and(Value::is_dynamic));
}

#[test]
fn valid_policy_keeps_first_error() {
    let base = RuleBase::new();
    base.register_merge_policy("valid", Rc::new(ValidMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("field", "amount")],
            props(&[("valid", Value::from("amount must be positive"))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![Selector::new("field", "amount")],
                props(&[("valid", Value::Bool(true))]),
            )
            .with_rank(50),
        )?;
        Ok(())
    })
    .unwrap();

    let m = base.match_assert("field", &Value::from("amount"), None);
    assert_eq!(
        base.properties_for_match(&m).get("valid"),
        Some(&Value::from("amount must be positive"))
    );
}

#[test]
fn list_policy_unions_across_rules() {
    let base = RuleBase::new();
    base.register_merge_policy("toolbar", Rc::new(ListMerger));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![Selector::new("class", Value::wildcard())],
            props(&[("toolbar", list(&["save"]))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![Selector::new("class", "Invoice")],
                props(&[("toolbar", list(&["approve", "save"]))]),
            )
            .with_rank(10),
        )?;
        Ok(())
    })
    .unwrap();

    let m = base.match_assert("class", &Value::from("Invoice"), None);
    assert_eq!(
        base.properties_for_match(&m).get("toolbar"),
        Some(&list(&["save", "approve"]))
    );
}

#[test]
fn trait_policy_keeps_one_member_per_group() {
    let groups: HashMap<Arc<str>, Arc<str>> = [
        (Arc::from("readonly"), Arc::from("editability")),
        (Arc::from("editable"), Arc::from("editability")),
        (Arc::from("bold"), Arc::from("emphasis")),
    ]
    .into_iter()
    .collect();

    let base = RuleBase::new();
    base.register_merge_policy("trait", Rc::new(TraitListMerger::new(groups)));
    base.load_rule_set(0, |b| {
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::decl("trait", "readonly"),
            ],
            props(&[("style", Value::from("muted"))]),
        ))?;
        b.add_rule(Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::decl("trait", "bold"),
            ],
            props(&[("style", Value::from("strong"))]),
        ))?;
        b.add_rule(
            Rule::new(
                vec![
                    Selector::new("class", "Invoice"),
                    Selector::decl("trait", "editable"),
                ],
                props(&[("style", Value::from("plain"))]),
            )
            .with_rank(10),
        )?;
        Ok(())
    })
    .unwrap();

    // Declare-mode enumeration folds the three companions; `editable` evicts
    // its group-mate `readonly`.
    let m = base.match_assert("class", &Value::from("Invoice"), None);
    let m = base.match_assert("declare", &Value::from("trait"), Some(m));
    let declared = base.properties_for_match(&m);
    assert_eq!(declared.get("trait"), Some(&list(&["bold", "editable"])));
}
