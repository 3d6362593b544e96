//! Collector for accumulating diagnostics during a parse.
//!
//! In non-strict mode every syntax error is recorded here and parsing
//! continues; the parser exposes the collected list afterwards.

use crate::error::Diagnostic;

/// A collector for accumulating diagnostics during a parse.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    ///
    /// Errors increment the error count; warnings are only recorded.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Number of error diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// All diagnostics emitted so far, in order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drop everything collected so far.
    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
    }
}
