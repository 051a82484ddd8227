//! Dynamic property values, evaluated against a context at read time.
//!
//! Rule properties are usually literals, but a rule may declare a value that
//! depends on the context it is read in: a small expression over context
//! keys, a dotted field-path accessor, a localized string, or a deferred
//! boolean merge chain produced by the AND merge policy. These form a closed
//! set of kinds with a uniform [`DynamicValue::evaluate`] operation so merge
//! and chaining logic can match on them exhaustively.

use std::fmt;
use std::sync::Arc;

use crate::collections::CVec;
use crate::value::Value;

/// Narrow lookup interface a dynamic value is evaluated against.
///
/// Implemented by the evaluation context; kept minimal so dynamic values can
/// be exercised in isolation.
pub trait PropertySource {
    /// Current value of a context key, if asserted.
    fn context_value(&self, key: &str) -> Option<Value>;

    /// Current merged value of a property, if any rule produced one.
    fn property_value(&self, name: &str) -> Option<Value>;
}

/// A dynamic value: one of the closed set of evaluable property-value kinds.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum DynamicValue {
    /// An expression over context keys and properties.
    Expr(Expr),
    /// A dotted accessor into a context value, e.g. `object.address.city`.
    FieldPath(FieldPath),
    /// A localized string; evaluates to its default (localization itself is
    /// a presentation concern).
    Localized {
        /// Lookup key for the localization layer.
        key: Arc<str>,
        /// Fallback text, used directly by this engine.
        default: Arc<str>,
    },
    /// A deferred boolean-AND merge chain: operands accumulated by the AND
    /// merge policy when one side was not yet resolvable.
    DeferredAnd(CVec<Value>),
}

impl DynamicValue {
    /// Evaluates this dynamic value against a context.
    ///
    /// Evaluation never fails: unresolvable lookups produce `Nil`, which is
    /// false-like, so an unresolved AND operand reads as not-yet-true.
    #[must_use]
    pub fn evaluate(&self, source: &dyn PropertySource) -> Value {
        match self {
            Self::Expr(expr) => expr.evaluate(source),
            Self::FieldPath(path) => path.resolve(source).unwrap_or(Value::Nil),
            Self::Localized { default, .. } => Value::String(default.clone()),
            Self::DeferredAnd(operands) => {
                for operand in operands {
                    if !resolve_operand(operand, source).is_truthy() {
                        return Value::Bool(false);
                    }
                }
                Value::Bool(true)
            }
        }
    }

    /// Returns true if this value can be fully resolved against the context
    /// right now.
    ///
    /// A field path is unresolvable while its root key is unasserted; a
    /// deferred chain is resolvable only when every operand is. Chained
    /// assignments whose value is unresolvable are parked on the activation
    /// and re-attempted on the next read.
    #[must_use]
    pub fn is_resolvable(&self, source: &dyn PropertySource) -> bool {
        match self {
            Self::Expr(_) | Self::Localized { .. } => true,
            Self::FieldPath(path) => source.context_value(path.root()).is_some(),
            Self::DeferredAnd(operands) => operands.iter().all(|v| match v {
                Value::Dynamic(d) => d.is_resolvable(source),
                _ => true,
            }),
        }
    }
}

fn resolve_operand(value: &Value, source: &dyn PropertySource) -> Value {
    match value {
        Value::Dynamic(d) => d.evaluate(source),
        other => other.clone(),
    }
}

impl fmt::Debug for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(e) => write!(f, "${{{e:?}}}"),
            Self::FieldPath(p) => write!(f, "${p}"),
            Self::Localized { key, default } => write!(f, "@({key}, {default:?})"),
            Self::DeferredAnd(ops) => write!(f, "deferred-and{ops:?}"),
        }
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// A small expression AST over context keys and merged properties.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// The current value of a context key (`Nil` if unasserted).
    ContextKey(Arc<str>),
    /// The current merged value of a property (`Nil` if absent).
    ///
    /// Reading the property being computed is the caller's responsibility to
    /// avoid; the engine only feeds expressions already-merged maps.
    Property(Arc<str>),
    /// Logical negation of truthiness.
    Not(Box<Expr>),
    /// Value equality.
    Eq(Box<Expr>, Box<Expr>),
    /// Short-circuit conjunction.
    And(Vec<Expr>),
    /// Short-circuit disjunction.
    Or(Vec<Expr>),
}

impl Expr {
    /// Evaluates the expression against a context.
    #[must_use]
    pub fn evaluate(&self, source: &dyn PropertySource) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::ContextKey(key) => source.context_value(key).unwrap_or(Value::Nil),
            Self::Property(name) => source.property_value(name).unwrap_or(Value::Nil),
            Self::Not(inner) => Value::Bool(!inner.evaluate(source).is_truthy()),
            Self::Eq(a, b) => Value::Bool(a.evaluate(source) == b.evaluate(source)),
            Self::And(operands) => {
                for op in operands {
                    if !op.evaluate(source).is_truthy() {
                        return Value::Bool(false);
                    }
                }
                Value::Bool(true)
            }
            Self::Or(operands) => {
                for op in operands {
                    if op.evaluate(source).is_truthy() {
                        return Value::Bool(true);
                    }
                }
                Value::Bool(false)
            }
        }
    }
}

// =============================================================================
// Field paths
// =============================================================================

/// A dotted accessor into a context value.
///
/// The first segment names a context key; remaining segments index into
/// nested [`Value::Map`] values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Arc<str>>,
}

impl FieldPath {
    /// Parses a dotted path like `object.address.city`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('.').map(Into::into).collect(),
        }
    }

    /// The root segment (the context key the path starts from).
    #[must_use]
    pub fn root(&self) -> &str {
        self.segments.first().map_or("", |s| s)
    }

    /// Resolves the path against a context; `None` if the root key is
    /// unasserted or an intermediate segment is missing or not a map.
    #[must_use]
    pub fn resolve(&self, source: &dyn PropertySource) -> Option<Value> {
        let mut current = source.context_value(self.root())?;
        for segment in &self.segments[1..] {
            let next = current.as_map()?.get(segment)?.clone();
            current = next;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
