//! Integration tests for Layer 0: Foundation
//!
//! Tests for values, dynamic values, and the read-through nested map.

mod dynamics;
