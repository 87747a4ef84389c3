//! Per-check result records.

use crate::{RowSet, ScdResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every check the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckKind {
    #[serde(rename = "Datatype & Constraint Check")]
    MetadataContract,
    #[serde(rename = "Expected Datatype & Constraint Check")]
    ExpectedMetadata,
    #[serde(rename = "Version_Begin_Date Check")]
    VersionBegin,
    #[serde(rename = "Single Current Record per Business Key")]
    SingleCurrent,
    #[serde(rename = "Version_End_Date & Is_Current Consistency")]
    EndDateConsistency,
    #[serde(rename = "Historical Version Dates Check")]
    HistoricalOrdering,
    #[serde(rename = "Overlapping Versions Check")]
    Overlap,
    #[serde(rename = "Data Completeness Check")]
    Completeness,
    #[serde(rename = "Data SCD Check")]
    ScdCompleteness,
    #[serde(rename = "Deleted Records vs Source Check")]
    DeletedVsSource,
    #[serde(rename = "Deleted Records vs Target Check")]
    DeletedVsTarget,
    #[serde(rename = "Re-added Records Check")]
    ReaddedRecords,
    #[serde(rename = "Row Count Check")]
    RowCount,
    #[serde(rename = "Business Key Null Check")]
    BusinessKeyNulls,
    #[serde(rename = "Duplicate Check")]
    DuplicateKeys,
    #[serde(rename = "Target View Column Check")]
    ForbiddenViewColumns,
}

impl CheckKind {
    /// Report label for the check.
    pub fn label(self) -> &'static str {
        match self {
            CheckKind::MetadataContract => "Datatype & Constraint Check",
            CheckKind::ExpectedMetadata => "Expected Datatype & Constraint Check",
            CheckKind::VersionBegin => "Version_Begin_Date Check",
            CheckKind::SingleCurrent => "Single Current Record per Business Key",
            CheckKind::EndDateConsistency => "Version_End_Date & Is_Current Consistency",
            CheckKind::HistoricalOrdering => "Historical Version Dates Check",
            CheckKind::Overlap => "Overlapping Versions Check",
            CheckKind::Completeness => "Data Completeness Check",
            CheckKind::ScdCompleteness => "Data SCD Check",
            CheckKind::DeletedVsSource => "Deleted Records vs Source Check",
            CheckKind::DeletedVsTarget => "Deleted Records vs Target Check",
            CheckKind::ReaddedRecords => "Re-added Records Check",
            CheckKind::RowCount => "Row Count Check",
            CheckKind::BusinessKeyNulls => "Business Key Null Check",
            CheckKind::DuplicateKeys => "Duplicate Check",
            CheckKind::ForbiddenViewColumns => "Target View Column Check",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
}

impl CheckStatus {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        }
    }
}

/// The uniform result row handed to the reporting collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    #[serde(rename = "Database")]
    pub database: String,
    #[serde(rename = "Table_name")]
    pub table: String,
    #[serde(rename = "Check_name")]
    pub check: CheckKind,
    #[serde(rename = "Issue_Count")]
    pub issue_count: usize,
    #[serde(rename = "IsCheckPassed")]
    pub status: CheckStatus,
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "Details", default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RowSet>,
}

impl CheckReport {
    /// Build a report whose issue count is the number of offending rows.
    pub fn from_offending(
        database: impl Into<String>,
        table: impl Into<String>,
        check: CheckKind,
        offending: RowSet,
    ) -> Self {
        let issue_count = offending.len();
        Self {
            database: database.into(),
            table: table.into(),
            check,
            issue_count,
            status: CheckStatus::from_passed(issue_count == 0),
            message: None,
            details: Some(offending),
        }
    }

    /// Build a report from an explicit count, without row detail.
    pub fn from_count(
        database: impl Into<String>,
        table: impl Into<String>,
        check: CheckKind,
        issue_count: usize,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            check,
            issue_count,
            status: CheckStatus::from_passed(issue_count == 0),
            message: None,
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    /// One-line summary used in aggregate failures.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "[{}] {} on {}: {} issue(s)",
            self.database, self.check, self.table, self.issue_count
        );
        if let Some(message) = &self.message {
            line.push_str(" - ");
            line.push_str(message);
        }
        line
    }

    /// Raise the aggregate failure for a finished check.
    pub fn ensure_passed(&self) -> ScdResult<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(ValidationError::ChecksFailed {
                failures: vec![self.summary()],
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellValue, ScdError};

    #[test]
    fn test_from_offending_counts_rows() {
        let rows = RowSet::new(["BusinessKey"])
            .with_row(vec!["A".into()])
            .with_row(vec!["B".into()]);
        let report = CheckReport::from_offending("DW", "DimCustomer", CheckKind::SingleCurrent, rows);
        assert_eq!(report.issue_count, 2);
        assert!(!report.passed());
    }

    #[test]
    fn test_empty_offending_passes() {
        let report =
            CheckReport::from_offending("DW", "Dim", CheckKind::Overlap, RowSet::new(["x"]));
        assert!(report.passed());
        assert!(report.ensure_passed().is_ok());
    }

    #[test]
    fn test_ensure_passed_raises_aggregate() {
        let report = CheckReport::from_count("SRC", "Customer", CheckKind::Completeness, 3);
        let err = report.ensure_passed().unwrap_err();
        match err {
            ScdError::Validation(ValidationError::ChecksFailed { failures }) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("Data Completeness Check"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_serializes_reporting_field_names() {
        let rows = RowSet::new(["BusinessKey"]).with_row(vec![CellValue::text("A")]);
        let report = CheckReport::from_offending("DW", "Dim", CheckKind::VersionBegin, rows);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["Database"], "DW");
        assert_eq!(json["Table_name"], "Dim");
        assert_eq!(json["Check_name"], "Version_Begin_Date Check");
        assert_eq!(json["Issue_Count"], 1);
        assert_eq!(json["IsCheckPassed"], "FAIL");
        assert_eq!(json["Details"]["rows"][0][0], "A");
    }
}
