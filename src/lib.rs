//! Cascade - Context-sensitive rule-evaluation engine
//!
//! This crate re-exports all layers of the Cascade system for convenient
//! access. For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: cascade_context    — Evaluation contexts, activation replay tree, snapshots
//! Layer 1: cascade_rulebase   — Rules, key indexes, incremental matching, merge policies
//! Layer 0: cascade_foundation — Core types (Value, NestedMap, Error, Diagnostics)
//! ```
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use cascade::context::SharedActivations;
//! use cascade::foundation::Value;
//! use cascade::rulebase::{Rule, RuleBase, Selector};
//!
//! let base = RuleBase::new();
//! base.load_rule_set(0, |b| {
//!     b.add_rule(Rule::new(
//!         vec![Selector::new("class", "Invoice")],
//!         vec![(Arc::from("layout"), Value::from("Inspect"))],
//!     ))?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let shared = SharedActivations::new(Rc::new(base));
//! let mut context = shared.new_context();
//! context.set("class", "Invoice").unwrap();
//! assert_eq!(
//!     context.property_for_key("layout"),
//!     Some(Value::from("Inspect"))
//! );
//! ```

pub use cascade_context as context;
pub use cascade_foundation as foundation;
pub use cascade_rulebase as rulebase;
