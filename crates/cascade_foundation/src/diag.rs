//! Bounded diagnostics buffer for non-fatal engine reports.
//!
//! The engine never fails on capacity degradation (key-index overflow) or on
//! recoverable load conditions; it reports them here instead. The buffer is
//! a fixed-size ring the embedder can drain; optionally each record is also
//! echoed to stderr.

use std::cell::RefCell;
use std::collections::VecDeque;

/// Severity of a diagnostic record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational report.
    Info,
    /// Degraded behavior the embedder should know about.
    Warning,
    /// A failure that was contained (e.g. an aborted rule-set load).
    Error,
}

/// One diagnostic record.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Record severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

/// Fixed-capacity diagnostics ring.
///
/// Interior-mutable so read paths (`&self`) can report; the engine is
/// single-threaded by design, so no locking is involved.
#[derive(Debug)]
pub struct Diagnostics {
    records: RefCell<VecDeque<Diagnostic>>,
    capacity: usize,
    echo_stderr: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Default number of retained records.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Creates a diagnostics buffer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RefCell::new(VecDeque::new()),
            capacity: Self::DEFAULT_CAPACITY,
            echo_stderr: false,
        }
    }

    /// Builder method to set the ring capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Builder method to echo records to stderr as they are reported.
    #[must_use]
    pub fn with_stderr_echo(mut self, echo: bool) -> Self {
        self.echo_stderr = echo;
        self
    }

    /// Records a diagnostic, evicting the oldest record when full.
    pub fn report(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        if self.echo_stderr {
            eprintln!("cascade: {severity:?}: {message}");
        }
        let mut records = self.records.borrow_mut();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(Diagnostic { severity, message });
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.report(Severity::Warning, message);
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Returns true if no records are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Removes and returns all retained records, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Diagnostic> {
        self.records.borrow_mut().drain(..).collect()
    }

    /// Snapshot of retained records at or above the given severity.
    #[must_use]
    pub fn at_least(&self, severity: Severity) -> Vec<Diagnostic> {
        self.records
            .borrow()
            .iter()
            .filter(|d| d.severity >= severity)
            .cloned()
            .collect()
    }
}
