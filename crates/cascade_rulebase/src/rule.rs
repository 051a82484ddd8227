//! Rules: ordered selectors plus a property mapping and a rank.

use std::fmt;
use std::sync::Arc;

use cascade_foundation::Value;

use crate::selector::Selector;

/// Identifier of a rule: its position in the rule base's flat rule array.
///
/// Rules are never deleted, only disabled, so an id stays valid for the
/// lifetime of the rule base. Id 0 is a permanent no-op sentinel.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    /// The permanent no-op sentinel occupying slot 0.
    pub const NOOP: RuleId = RuleId(0);

    /// Returns the raw index of this rule.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleId({})", self.0)
    }
}

/// A rule: an ordered selector list, a property mapping, and a rank.
///
/// Lower ranks merge first, so later (higher-ranked) rules win overwrite
/// merges. Rules are mutated only to toggle `disabled`; everything else is
/// fixed at registration, including the three key bitmasks the matcher
/// consults.
#[derive(Clone)]
pub struct Rule {
    /// Ordered selector list.
    pub selectors: Vec<Selector>,
    /// Ordered property mapping (name, value).
    pub properties: Vec<(Arc<str>, Value)>,
    /// Merge priority; lower folds first.
    pub rank: i32,
    /// Line in the rule source, for diagnostics.
    pub line: u32,
    pub(crate) disabled: bool,
    /// Ids of companion rules synthesized at registration (decl rules).
    pub(crate) extras: Vec<RuleId>,
    /// True if some selector was not indexed, so candidates surviving the
    /// index joins still need direct selector evaluation.
    pub(crate) direct_eval: bool,
    /// Keys this rule positively selects on.
    pub(crate) key_matches_mask: u64,
    /// Keys whose index this rule occupies.
    pub(crate) key_indexed_mask: u64,
    /// Keys this rule requires to be absent.
    pub(crate) key_anti_mask: u64,
}

impl Rule {
    /// Creates a rule with rank 0.
    #[must_use]
    pub fn new(selectors: Vec<Selector>, properties: Vec<(Arc<str>, Value)>) -> Self {
        Self {
            selectors,
            properties,
            rank: 0,
            line: 0,
            disabled: false,
            extras: Vec::new(),
            direct_eval: false,
            key_matches_mask: 0,
            key_indexed_mask: 0,
            key_anti_mask: 0,
        }
    }

    /// Sets the rank.
    #[must_use]
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// Sets the source line.
    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// The permanent no-op occupying slot 0 and overwritten-rule slots.
    #[must_use]
    pub fn noop() -> Self {
        let mut rule = Self::new(Vec::new(), Vec::new());
        rule.disabled = true;
        rule
    }

    /// True if this rule has been disabled.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule(")?;
        for (i, s) in self.selectors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{s:?}")?;
        }
        write!(f, " -> {{")?;
        for (i, (name, value)) in self.properties.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value:?}")?;
        }
        write!(f, "}} rank {})", self.rank)
    }
}
