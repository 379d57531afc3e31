//! Build diagnostics collected alongside resolution.
//!
//! Warnings (collision renames, deprecated fields) never abort the build;
//! errors recorded here are fatal to one node but not to its siblings, e.g.
//! a malformed sub-package root. Truly fatal conditions propagate as
//! [`crate::Error`] instead.

use std::sync::Mutex;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single diagnostic, tagged with the resource that produced it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub resource: String,
    pub message: String,
}

/// Shared diagnostic sink for one compilation session.
///
/// Interior mutability so concurrently resolving branches can report without
/// threading a collector through every call.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, resource: impl Into<String>, message: impl Into<String>) {
        let resource = resource.into();
        let message = message.into();
        tracing::warn!(resource = %resource, "{message}");
        self.entries.lock().unwrap().push(Diagnostic {
            severity: Severity::Warning,
            resource,
            message,
        });
    }

    pub fn error(&self, resource: impl Into<String>, message: impl Into<String>) {
        let resource = resource.into();
        let message = message.into();
        tracing::error!(resource = %resource, "{message}");
        self.entries.lock().unwrap().push(Diagnostic {
            severity: Severity::Error,
            resource,
            message,
        });
    }

    /// Drain all collected diagnostics, leaving the sink empty.
    #[must_use]
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries.lock().unwrap())
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_drains() {
        let diags = Diagnostics::new();
        diags.warn("/app.mini", "renamed output path");
        diags.error("/pkg.json", "bad root");

        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.error_count(), 1);

        let taken = diags.take();
        assert_eq!(taken.len(), 2);
        assert!(diags.take().is_empty());
    }
}
