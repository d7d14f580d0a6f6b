//! Row-level validation outcomes.
//!
//! A [`RowIssue`] never aborts a load: the offending row is excluded from
//! aggregation and reported back through a [`RowDiagnostic`].

use schemars::JsonSchema;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIssue {
    #[error("unparseable date: {value:?}")]
    InvalidDate { value: String },
    #[error("non-numeric {column}: {value:?}")]
    NonNumeric { column: String, value: String },
    #[error("negative {column}: {value}")]
    NegativeValue { column: String, value: f64 },
    #[error("malformed record: {message}")]
    Malformed { message: String },
}

/// A skipped row: 1-based data row index (the header is not counted) and the
/// reason it was excluded.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct RowDiagnostic {
    pub row: usize,
    pub issue: RowIssue,
}

impl RowDiagnostic {
    pub fn new(row: usize, issue: RowIssue) -> Self {
        Self { row, issue }
    }
}

/// Counts of skipped rows per issue kind, for a compact summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
pub struct DiagnosticsSummary {
    pub total: usize,
    pub invalid_date: usize,
    pub non_numeric: usize,
    pub negative_value: usize,
    pub malformed: usize,
}

impl DiagnosticsSummary {
    pub fn from_diagnostics(diagnostics: &[RowDiagnostic]) -> Self {
        let mut summary = Self {
            total: diagnostics.len(),
            ..Self::default()
        };
        for d in diagnostics {
            match d.issue {
                RowIssue::InvalidDate { .. } => summary.invalid_date += 1,
                RowIssue::NonNumeric { .. } => summary.non_numeric += 1,
                RowIssue::NegativeValue { .. } => summary.negative_value += 1,
                RowIssue::Malformed { .. } => summary.malformed += 1,
            }
        }
        summary
    }
}
