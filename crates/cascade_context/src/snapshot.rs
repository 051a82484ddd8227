//! Capture and replay of a context's active assignments.
//!
//! A snapshot records the active (non-chained, non-masked) assignments with
//! the push depth each was asserted at, so a long-lived derived context can
//! be reconstructed outside the original push/pop cycle: hydration replays
//! the assignments onto a fresh context, recreating push boundaries wherever
//! the recorded salience increases. Chained assignments are re-derived by
//! the replay itself.

use std::rc::Rc;
use std::sync::Arc;

use cascade_foundation::{Result, Value};

use crate::activation::SharedActivations;
use crate::context::Context;

/// One captured assignment.
#[derive(Clone, Debug)]
struct SnapshotEntry {
    key: Arc<str>,
    value: Value,
    salience: usize,
}

/// The active assignments of a context at capture time.
#[derive(Clone, Debug, Default)]
pub struct ContextSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl ContextSnapshot {
    /// Number of captured assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replays the captured assignments onto a fresh context from `shared`,
    /// recreating push boundaries wherever salience increases.
    ///
    /// # Errors
    /// Propagates assertion errors from the replayed `set` calls.
    pub fn hydrate(&self, shared: &Rc<SharedActivations>) -> Result<Context> {
        let mut context = shared.new_context();
        for entry in &self.entries {
            while context.depth() < entry.salience {
                context.push();
            }
            context.set(&entry.key, entry.value.clone())?;
        }
        Ok(context)
    }
}

impl Context {
    /// Captures the active (non-chained, non-masked) assignments with their
    /// salience.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            entries: self
                .assignments()
                .filter(|a| !a.is_masked() && !a.is_chained())
                .map(|a| SnapshotEntry {
                    key: a.key().clone(),
                    value: a.value().clone(),
                    salience: a.salience(),
                })
                .collect(),
        }
    }
}
