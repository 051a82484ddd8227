//! Selectors: the (key, value) predicates a rule matches on.

use std::fmt;
use std::sync::Arc;

use cascade_foundation::Value;

/// One (key, value) predicate within a rule.
///
/// A selector with a [`Value::Nil`] value requires the key to be absent (or
/// false-like) in the context; it contributes to the rule's anti-mask rather
/// than its positive match mask. A selector whose value is the wildcard `"*"`
/// matches any truthy value of its key.
#[derive(Clone, PartialEq)]
pub struct Selector {
    /// Context key this selector constrains.
    pub key: Arc<str>,
    /// Value predicate (literal, wildcard, or `Nil` for absence).
    pub value: Value,
    /// True if this selector declares its value as a first-class assertable
    /// item rather than merely matching it.
    pub is_decl: bool,
}

impl Selector {
    /// Creates a plain matching selector.
    #[must_use]
    pub fn new(key: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_decl: false,
        }
    }

    /// Creates a declaration selector.
    #[must_use]
    pub fn decl(key: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_decl: true,
        }
    }

    /// True if this selector requires its key to be absent or false-like.
    #[must_use]
    pub fn is_absence(&self) -> bool {
        self.value.is_nil()
    }

    /// True if this selector matches any truthy value of its key.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.value.is_wildcard()
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.key, self.value)?;
        if self.is_decl {
            write!(f, "#decl")?;
        }
        Ok(())
    }
}
