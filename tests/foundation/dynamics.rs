//! Tests for dynamic value evaluation against a property source.

use std::collections::HashMap;
use std::sync::Arc;

use cascade_foundation::{DynamicValue, Expr, FieldPath, PropertySource, Value};

#[derive(Default)]
struct Source {
    context: HashMap<String, Value>,
    properties: HashMap<String, Value>,
}

impl PropertySource for Source {
    fn context_value(&self, key: &str) -> Option<Value> {
        self.context.get(key).cloned()
    }

    fn property_value(&self, name: &str) -> Option<Value> {
        self.properties.get(name).cloned()
    }
}

#[test]
fn expression_reads_context_and_properties() {
    let mut source = Source::default();
    source.context.insert("operation".into(), Value::from("edit"));
    source.properties.insert("visible".into(), Value::Bool(true));

    let expr = Expr::And(vec![
        Expr::Eq(
            Box::new(Expr::ContextKey("operation".into())),
            Box::new(Expr::Literal(Value::from("edit"))),
        ),
        Expr::Property("visible".into()),
    ]);
    assert_eq!(expr.evaluate(&source), Value::Bool(true));
}

#[test]
fn field_path_resolvability_follows_root_key() {
    let path = DynamicValue::FieldPath(FieldPath::parse("object.owner.name"));
    let mut source = Source::default();
    assert!(!path.is_resolvable(&source));

    let owner: cascade_foundation::CMap<Arc<str>, Value> =
        [(Arc::from("name"), Value::from("ada"))].into_iter().collect();
    let object: cascade_foundation::CMap<Arc<str>, Value> =
        [(Arc::from("owner"), Value::Map(owner))].into_iter().collect();
    source.context.insert("object".into(), Value::Map(object));

    assert!(path.is_resolvable(&source));
    assert_eq!(path.evaluate(&source), Value::from("ada"));
}

#[test]
fn deferred_and_resolves_once_operands_do() {
    let mut source = Source::default();
    let chain = DynamicValue::DeferredAnd(
        [
            Value::Bool(true),
            Value::Dynamic(Arc::new(DynamicValue::Expr(Expr::ContextKey(
                "approved".into(),
            )))),
        ]
        .into_iter()
        .collect(),
    );

    // Unasserted operand reads as nil, which is false-like.
    assert_eq!(chain.evaluate(&source), Value::Bool(false));

    source.context.insert("approved".into(), Value::Bool(true));
    assert_eq!(chain.evaluate(&source), Value::Bool(true));
}
