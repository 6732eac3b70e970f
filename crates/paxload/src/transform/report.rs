//! Change and issue tracking for the transform chain.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::EtlError;

/// Summary of everything the transform chain did to one record set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformReport {
    /// Number of rows dropped.
    pub rows_dropped: usize,

    /// Number of columns added.
    pub columns_added: usize,

    /// Applied changes, in order.
    pub changes: Vec<TransformChange>,

    /// Non-fatal problems, in order.
    pub issues: Vec<TransformIssue>,
}

/// A single applied change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformChange {
    /// Step that made the change.
    pub step: String,

    /// Column affected.
    pub column: String,

    /// Number of values changed.
    pub values_changed: usize,

    /// Description of the change.
    pub description: String,
}

/// A non-fatal problem found while transforming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformIssue {
    /// Step that hit the problem.
    pub step: String,

    /// Column involved, empty when the issue covers several columns.
    pub column: String,

    /// Error label, see [`EtlError::kind`].
    pub kind: String,

    pub message: String,
}

impl TransformReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied change.
    pub fn add_change(
        &mut self,
        step: &str,
        column: &str,
        values_changed: usize,
        description: impl Into<String>,
    ) {
        self.changes.push(TransformChange {
            step: step.to_string(),
            column: column.to_string(),
            values_changed,
            description: description.into(),
        });
    }

    /// Record that a step added a column.
    pub fn add_column(&mut self, step: &str, column: &str, description: impl Into<String>) {
        self.columns_added += 1;
        self.add_change(step, column, 0, description);
    }

    /// Record and log a non-fatal error.
    ///
    /// Identity problems are logged as errors since they make the source
    /// unloadable; everything else is a warning.
    pub fn add_issue(&mut self, step: &str, column: &str, err: &EtlError) {
        match err {
            EtlError::KeyDerivation { .. } => error!(step, column, "{}", err),
            _ => warn!(step, column, "{}", err),
        }

        self.issues.push(TransformIssue {
            step: step.to_string(),
            column: column.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues of one error kind.
    pub fn issues_of(&self, kind: &str) -> impl Iterator<Item = &TransformIssue> {
        let kind = kind.to_string();
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Whether a step changed or added the named column.
    pub fn touched(&self, column: &str) -> bool {
        self.changes.iter().any(|c| c.column == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_records_kind() {
        let mut report = TransformReport::new();
        let err = EtlError::Coercion {
            column: "DepartureDate".into(),
            target: "datetime".into(),
            message: "bad value 'tomorrow'".into(),
        };
        report.add_issue("coerce", "DepartureDate", &err);

        assert!(report.has_issues());
        assert_eq!(report.issues_of("coercion").count(), 1);
        assert_eq!(report.issues[0].column, "DepartureDate");
    }

    #[test]
    fn test_add_column_counts() {
        let mut report = TransformReport::new();
        report.add_column("canonicalize", "TimeToModify", "Elapsed time");
        assert_eq!(report.columns_added, 1);
        assert!(report.touched("TimeToModify"));
    }
}
