//! Core types, values, and persistent collections for Cascade.
//!
//! This crate provides:
//! - [`Value`] - The core value type for rule properties and context assertions
//! - [`DynamicValue`] - Evaluable property-value kinds (expressions, field paths)
//! - [`NestedMap`] - Two-level read-through map with tombstones
//! - [`Error`] - Rich error types with context
//! - [`Diagnostics`] - Bounded buffer for non-fatal engine reports
//! - Persistent collections ([`CVec`], [`CMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod diag;
pub mod dynamic;
pub mod error;
pub mod nested;
pub mod value;

pub use collections::{CMap, CVec};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use dynamic::{DynamicValue, Expr, FieldPath, PropertySource};
pub use error::{Error, ErrorContext, ErrorKind};
pub use nested::NestedMap;
pub use value::Value;

/// Convenient result alias for Cascade operations.
pub type Result<T> = std::result::Result<T, Error>;
