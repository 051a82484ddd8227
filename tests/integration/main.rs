//! Cross-layer integration tests for Cascade
//!
//! End-to-end scenarios driving the rule base through evaluation contexts.

mod equivalence;
mod scenarios;
