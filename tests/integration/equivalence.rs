//! Determinism and indexing-equivalence properties.

use std::rc::Rc;
use std::sync::Arc;

use cascade_context::{Context, SharedActivations};
use cascade_foundation::{CMap, Value};
use cascade_rulebase::{Rule, RuleBase, RuleBaseConfig, Selector};

fn props(pairs: &[(&str, Value)]) -> Vec<(Arc<str>, Value)> {
    pairs
        .iter()
        .map(|(n, v)| (Arc::from(*n), v.clone()))
        .collect()
}

fn catalogue() -> Vec<Rule> {
    vec![
        Rule::new(
            vec![Selector::new("class", "Invoice")],
            props(&[("layout", Value::from("Inspect"))]),
        ),
        Rule::new(
            vec![Selector::new("class", Value::wildcard())],
            props(&[("titled", Value::Bool(true))]),
        ),
        Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::new("operation", "edit"),
            ],
            props(&[("editable", Value::Bool(true))]),
        ),
        Rule::new(
            vec![
                Selector::new("operation", "view"),
                Selector::new("layout", "Inspect"),
            ],
            props(&[("toolbar", Value::Bool(false))]),
        ),
        Rule::new(
            vec![
                Selector::new("class", "Invoice"),
                Selector::new("field", "amount"),
            ],
            props(&[("label", Value::from("Amount"))]),
        ),
        Rule::new(
            vec![
                Selector::new("class", Value::wildcard()),
                Selector::new("operation", Value::Nil),
            ],
            props(&[("idle", Value::Bool(true))]),
        ),
    ]
}

fn shared_with(config: RuleBaseConfig) -> Rc<SharedActivations> {
    let base = RuleBase::with_config(config);
    base.declare_property_scope("class");
    base.declare_property_scope("field");
    base.load_rule_set(0, |b| {
        for rule in catalogue() {
            b.add_rule(rule)?;
        }
        Ok(())
    })
    .unwrap();
    SharedActivations::new(Rc::new(base))
}

/// Assertion runs covering plain chains, scope switches, and overrides.
fn runs() -> Vec<Vec<(&'static str, &'static str)>> {
    vec![
        vec![("class", "Invoice")],
        vec![("class", "Invoice"), ("operation", "edit")],
        vec![("operation", "view"), ("layout", "Inspect")],
        vec![("class", "Invoice"), ("field", "amount")],
        vec![("class", "Invoice"), ("operation", "view"), ("operation", "edit")],
        vec![("class", "Payment"), ("class", "Invoice"), ("operation", "edit")],
    ]
}

fn evaluate(ctx: &mut Context, run: &[(&'static str, &'static str)]) -> CMap<Arc<str>, Value> {
    for (key, value) in run {
        ctx.set(key, *value).unwrap();
    }
    ctx.all_properties()
}

#[test]
fn results_are_deterministic_and_cache_independent() {
    for run in runs() {
        // Two passes over one shared tree: the second replays cached paths.
        let cached = shared_with(RuleBaseConfig::default());
        let first = evaluate(&mut cached.new_context(), &run);
        let second = evaluate(&mut cached.new_context(), &run);
        assert_eq!(first, second, "replay diverged for {run:?}");

        // The same run with activation caching disabled.
        let uncached = shared_with(RuleBaseConfig::default().with_activation_caching(false));
        let plain = evaluate(&mut uncached.new_context(), &run);
        assert_eq!(first, plain, "caching changed results for {run:?}");
    }
}

#[test]
fn partial_and_full_indexing_agree() {
    for run in runs() {
        let mut maps = Vec::new();
        for partial in [true, false] {
            // The debug double-check pins every filtered match against
            // brute-force evaluation while these runs execute.
            let shared = shared_with(
                RuleBaseConfig::default()
                    .with_partial_indexing(partial)
                    .with_debug_match_checks(true),
            );
            maps.push(evaluate(&mut shared.new_context(), &run));
        }
        assert_eq!(maps[0], maps[1], "indexing modes diverged for {run:?}");
    }
}

#[test]
fn repeated_evaluation_of_one_context_is_stable() {
    let shared = shared_with(RuleBaseConfig::default());
    let mut ctx = shared.new_context();
    ctx.set("class", "Invoice").unwrap();
    ctx.set("operation", "edit").unwrap();

    let first = ctx.all_properties();
    for _ in 0..5 {
        assert_eq!(ctx.all_properties(), first);
    }
}
