//! Typed ingestion descriptors for rule-source loaders.
//!
//! An external loader parses some serialized rule description into these
//! descriptors and feeds them to [`crate::RuleBase::add_rule`] inside one
//! `begin_rule_set`/`end_rule_set` bracket per logical source unit. The
//! descriptors are plain data (optionally `serde`-derived behind the `serde`
//! feature); conversion into [`Rule`] objects happens here so loaders never
//! touch engine value types directly.

use std::sync::Arc;

use cascade_foundation::{DynamicValue, Expr, FieldPath, Value};

use crate::rule::Rule;
use crate::selector::Selector;

/// A scalar literal in a rule source.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarDescriptor {
    /// Absence / the null marker.
    Nil,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal (`"*"` is the wildcard).
    String(String),
}

impl ScalarDescriptor {
    fn to_value(&self) -> Value {
        match self {
            Self::Nil => Value::Nil,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Int(*n),
            Self::Float(n) => Value::Float(*n),
            Self::String(s) => Value::from(s.as_str()),
        }
    }
}

/// An expression in a rule source, mirrored onto [`Expr`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprDescriptor {
    /// A literal operand.
    Literal(ScalarDescriptor),
    /// The current value of a context key.
    ContextKey(String),
    /// The current merged value of a property.
    Property(String),
    /// Logical negation.
    Not(Box<ExprDescriptor>),
    /// Value equality.
    Eq(Box<ExprDescriptor>, Box<ExprDescriptor>),
    /// Short-circuit conjunction.
    And(Vec<ExprDescriptor>),
    /// Short-circuit disjunction.
    Or(Vec<ExprDescriptor>),
}

impl ExprDescriptor {
    fn to_expr(&self) -> Expr {
        match self {
            Self::Literal(s) => Expr::Literal(s.to_value()),
            Self::ContextKey(key) => Expr::ContextKey(key.as_str().into()),
            Self::Property(name) => Expr::Property(name.as_str().into()),
            Self::Not(inner) => Expr::Not(Box::new(inner.to_expr())),
            Self::Eq(a, b) => Expr::Eq(Box::new(a.to_expr()), Box::new(b.to_expr())),
            Self::And(ops) => Expr::And(ops.iter().map(Self::to_expr).collect()),
            Self::Or(ops) => Expr::Or(ops.iter().map(Self::to_expr).collect()),
        }
    }
}

/// The tagged forms a property value can take in a rule source.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyDescriptor {
    /// A plain literal.
    Literal(ScalarDescriptor),
    /// A list of literals.
    List(Vec<ScalarDescriptor>),
    /// An expression evaluated against the context at read time.
    Expr(ExprDescriptor),
    /// A dotted field-path accessor into a context value.
    FieldPath(String),
    /// Forces the value to overwrite irrespective of the registered merge
    /// policy for its property.
    Override(Box<PropertyDescriptor>),
    /// A localized string with its lookup key and fallback text.
    Localized {
        /// Lookup key for the localization layer.
        key: String,
        /// Fallback text, used directly by the engine.
        default: String,
    },
}

impl PropertyDescriptor {
    /// Converts the descriptor into an engine value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(s) => s.to_value(),
            Self::List(items) => {
                Value::List(items.iter().map(ScalarDescriptor::to_value).collect())
            }
            Self::Expr(e) => Value::from(DynamicValue::Expr(e.to_expr())),
            Self::FieldPath(path) => {
                Value::from(DynamicValue::FieldPath(FieldPath::parse(path)))
            }
            Self::Override(inner) => Value::Override(Arc::new(inner.to_value())),
            Self::Localized { key, default } => Value::from(DynamicValue::Localized {
                key: key.as_str().into(),
                default: default.as_str().into(),
            }),
        }
    }
}

/// One (key, value, is_declaration) selector triple.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectorDescriptor {
    /// Context key the selector constrains.
    pub key: String,
    /// Value predicate (`Nil` for absence, `"*"` for wildcard).
    pub value: ScalarDescriptor,
    /// True if the selector declares its value as assertable.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_decl: bool,
}

impl SelectorDescriptor {
    /// A plain matching selector.
    #[must_use]
    pub fn new(key: impl Into<String>, value: ScalarDescriptor) -> Self {
        Self {
            key: key.into(),
            value,
            is_decl: false,
        }
    }

    /// A declaration selector.
    #[must_use]
    pub fn decl(key: impl Into<String>, value: ScalarDescriptor) -> Self {
        Self {
            key: key.into(),
            value,
            is_decl: true,
        }
    }

    fn to_selector(&self) -> Selector {
        let mut selector = Selector::new(self.key.as_str(), self.value.to_value());
        selector.is_decl = self.is_decl;
        selector
    }
}

/// One rule as produced by an external loader.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleDescriptor {
    /// Ordered selector triples.
    pub selectors: Vec<SelectorDescriptor>,
    /// Ordered (name, value) property mapping.
    pub properties: Vec<(String, PropertyDescriptor)>,
    /// Merge priority within the rule set; the set's rank offset is added at
    /// registration.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rank: i32,
    /// Line in the rule source, for diagnostics.
    #[cfg_attr(feature = "serde", serde(default))]
    pub line: u32,
}

impl RuleDescriptor {
    /// Converts the descriptor into a [`Rule`] ready for registration.
    #[must_use]
    pub fn to_rule(&self) -> Rule {
        Rule::new(
            self.selectors.iter().map(SelectorDescriptor::to_selector).collect(),
            self.properties
                .iter()
                .map(|(name, value)| (Arc::from(name.as_str()), value.to_value()))
                .collect(),
        )
        .with_rank(self.rank)
        .with_line(self.line)
    }
}
