//! Rule storage, key indexing, incremental matching, and property merging
//! for Cascade.
//!
//! This crate provides:
//! - [`Rule`] / [`Selector`] - Declarative selector-to-property rules
//! - [`KeyData`] / [`KeyRegistry`] - Per-key value indexes with inheritance
//! - [`RuleBase`] - Rule array, indexing policy, and match/property caches
//! - [`MatchResult`] - Incremental match chain nodes
//! - [`PropertyMap`] / [`PropertyManager`] - Merged results and merge policies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod descriptor;
pub mod keydata;
pub mod matching;
pub mod merge;
pub mod property;
pub mod rule;
pub mod rulebase;
pub mod selector;

pub use descriptor::{
    ExprDescriptor, PropertyDescriptor, RuleDescriptor, ScalarDescriptor, SelectorDescriptor,
};
pub use keydata::{KeyData, KeyId, KeyRegistry, ValueMatches, MAX_KEYS};
pub use matching::{JoinKind, MatchResult};
pub use merge::{
    AndMerger, DeclareListMerger, ListMerger, OverwriteMerger, PropertyManager, PropertyMerger,
    TraitListMerger, ValidMerger,
};
pub use property::PropertyMap;
pub use rule::{Rule, RuleId};
pub use rulebase::{shadow_key, KeyInitObserver, RuleBase, RuleBaseConfig, DECLARE_KEY, SCOPE_KEY};
pub use selector::Selector;
