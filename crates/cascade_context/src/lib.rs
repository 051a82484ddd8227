//! Stateful evaluation contexts and shared replay caches for Cascade.
//!
//! This crate provides:
//! - [`Context`] - The per-session assignment stack driving incremental matching
//! - [`SharedActivations`] - Process-wide handle owning the replay tree
//! - [`ActivationArena`] - Cached replay nodes for traversed assignment paths
//! - [`ContextSnapshot`] - Capture and replay of active assignments

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod activation;
pub mod context;
pub mod snapshot;

pub use activation::{ActivationArena, ActivationId, AssignmentRecord, SharedActivations};
pub use context::{Assignment, Context};
pub use snapshot::ContextSnapshot;
