//! Error types for the Cascade engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//!
//! Capacity overruns (the 65th context key) are deliberately NOT errors:
//! they degrade matching to unindexed and are reported through
//! [`crate::Diagnostics`] instead.

use std::fmt;

use thiserror::Error;

/// The main error type for Cascade operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an empty-context-stack error (pop without matching push).
    #[must_use]
    pub fn empty_context_stack() -> Self {
        Self::new(ErrorKind::EmptyContextStack)
    }

    /// Creates a chain-depth-exceeded error.
    #[must_use]
    pub fn chain_depth_exceeded(limit: usize, key: impl Into<String>) -> Self {
        Self::new(ErrorKind::ChainDepthExceeded {
            limit,
            key: key.into(),
        })
    }

    /// Creates a rule-set-already-open error.
    #[must_use]
    pub fn rule_set_already_open() -> Self {
        Self::new(ErrorKind::RuleSetAlreadyOpen)
    }

    /// Creates a rule-set-not-open error.
    #[must_use]
    pub fn rule_set_not_open() -> Self {
        Self::new(ErrorKind::RuleSetNotOpen)
    }

    /// Creates an activation-mismatch error.
    #[must_use]
    pub fn activation_mismatch(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ActivationMismatch(detail.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(detail.into()))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// `pop()` was called with no frame on the context stack.
    #[error("context stack is empty: pop without matching push")]
    EmptyContextStack,

    /// A cached activation could not be applied to the live stack state.
    #[error("activation mismatch: {0}")]
    ActivationMismatch(String),

    /// `begin_rule_set` while a rule set is already open.
    #[error("a rule set is already open")]
    RuleSetAlreadyOpen,

    /// `end_rule_set` (or rule registration) without an open rule set.
    #[error("no rule set is open")]
    RuleSetNotOpen,

    /// Forward chaining exceeded the configured assignment depth.
    #[error("chained assignment depth ({limit}) exceeded while asserting {key}")]
    ChainDepthExceeded {
        /// The configured limit.
        limit: usize,
        /// The key whose assertion tripped the guard.
        key: String,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule-source name or description.
    pub source: Option<String>,
    /// Line of the offending rule in its source.
    pub line: Option<u32>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the rule line.
    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
        }
        Ok(())
    }
}
