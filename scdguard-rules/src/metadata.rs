//! Column metadata comparison.

use crate::business_key::same_table;
use crate::normalize::{normalize_constraints, ConstraintOrigin, NormalizedConstraintSet};
use scdguard_core::{
    CellValue, CheckKind, CheckReport, CheckStatus, ColumnMetadata, ColumnSpec, ConstraintMode,
    RowSet, ScdResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message for a configured column the database does not have.
pub const MISSING_IN_DATABASE: &str = "column missing in database";

/// Detail columns of a metadata report.
pub const METADATA_DETAIL_COLUMNS: [&str; 8] = [
    "Column",
    "Presence",
    "Left_DataType",
    "Right_DataType",
    "Left_Constraint",
    "Right_Constraint",
    "Status",
    "Message",
];

/// Where a column exists across the two compared sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnPresence {
    MissingInTarget,
    ExtraInTarget,
    Common,
}

impl ColumnPresence {
    pub fn label(self) -> &'static str {
        match self {
            ColumnPresence::MissingInTarget => "Missing in target",
            ColumnPresence::ExtraInTarget => "Extra in target",
            ColumnPresence::Common => "Common",
        }
    }
}

/// Per-column comparison outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnComparison {
    pub column: String,
    pub presence: ColumnPresence,
    pub left_type: Option<String>,
    pub right_type: Option<String>,
    pub left_constraint: Option<String>,
    pub right_constraint: Option<String>,
    pub type_match: bool,
    pub constraint_match: bool,
    pub status: CheckStatus,
    pub message: Option<String>,
}

impl ColumnComparison {
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::text(&self.column),
            CellValue::text(self.presence.label()),
            self.left_type.clone().into(),
            self.right_type.clone().into(),
            self.left_constraint.clone().into(),
            self.right_constraint.clone().into(),
            CellValue::text(if self.passed() { "PASS" } else { "FAIL" }),
            self.message.clone().into(),
        ]
    }
}

/// Compares column metadata between two sides.
#[derive(Debug, Clone)]
pub struct MetadataDiffer {
    mode: ConstraintMode,
    left_label: String,
    right_label: String,
}

impl MetadataDiffer {
    /// Create a differ; labels name the two sides in messages.
    pub fn new(
        mode: ConstraintMode,
        left_label: impl Into<String>,
        right_label: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            left_label: left_label.into(),
            right_label: right_label.into(),
        }
    }

    /// Classify every column in the union of both sides.
    ///
    /// Left-side columns come first in left order, then right-only columns
    /// in right order.
    pub fn diff(&self, left: &[ColumnMetadata], right: &[ColumnMetadata]) -> Vec<ColumnComparison> {
        let right_by_name: HashMap<&str, &ColumnMetadata> =
            right.iter().map(|c| (c.column.as_str(), c)).collect();
        let left_names: std::collections::HashSet<&str> =
            left.iter().map(|c| c.column.as_str()).collect();

        let mut results: Vec<ColumnComparison> = left
            .iter()
            .map(|l| match right_by_name.get(l.column.as_str()) {
                Some(r) => self.compare_common(l, r),
                None => self.one_sided(l, ColumnPresence::MissingInTarget),
            })
            .collect();
        results.extend(
            right
                .iter()
                .filter(|r| !left_names.contains(r.column.as_str()))
                .map(|r| self.one_sided(r, ColumnPresence::ExtraInTarget)),
        );
        results
    }

    /// Compare configured expectations for `table` against observed metadata.
    pub fn compare_expected(
        &self,
        table: &str,
        specs: &[ColumnSpec],
        observed: &[ColumnMetadata],
    ) -> Vec<ColumnComparison> {
        specs
            .iter()
            .filter(|spec| same_table(&spec.table_name, table))
            .map(|spec| {
                let expected_type = spec
                    .expected_data_type
                    .as_deref()
                    .map(|t| t.trim().to_uppercase());
                let expected = normalize_constraints(
                    spec.expected_constraints.as_deref(),
                    ConstraintOrigin::Declared,
                );
                let column = spec.column_name.trim();
                match observed.iter().find(|c| c.column == column) {
                    None => ColumnComparison {
                        column: column.to_string(),
                        presence: ColumnPresence::MissingInTarget,
                        left_type: expected_type,
                        right_type: None,
                        left_constraint: Some(expected.to_string()),
                        right_constraint: None,
                        type_match: false,
                        constraint_match: false,
                        status: CheckStatus::Fail,
                        message: Some(MISSING_IN_DATABASE.to_string()),
                    },
                    Some(db) => {
                        let observed_set = observed_constraints(db);
                        let type_match = expected_type
                            .as_deref()
                            .is_some_and(|t| t.eq_ignore_ascii_case(db.data_type.trim()));
                        self.finish(
                            column,
                            expected_type,
                            Some(db.data_type.to_uppercase()),
                            type_match,
                            expected.to_string(),
                            observed_set.to_string(),
                            expected == observed_set,
                        )
                    }
                }
            })
            .collect()
    }

    /// Fold comparisons into one report; failing columns become details.
    pub fn report(
        database: &str,
        table: &str,
        check: CheckKind,
        comparisons: &[ColumnComparison],
    ) -> ScdResult<CheckReport> {
        let mut offending = RowSet::new(METADATA_DETAIL_COLUMNS);
        for comparison in comparisons.iter().filter(|c| !c.passed()) {
            offending.push(table, comparison.to_row())?;
        }
        let report = CheckReport::from_offending(database, table, check, offending);
        tracing::info!(
            database = %database,
            table = %table,
            check = %check,
            columns = comparisons.len(),
            issues = report.issue_count,
            "Metadata comparison finished"
        );
        Ok(report)
    }

    fn compare_common(&self, left: &ColumnMetadata, right: &ColumnMetadata) -> ColumnComparison {
        let type_match = left.data_type.trim().eq_ignore_ascii_case(right.data_type.trim());
        let (left_constraint, right_constraint, constraint_match) = match self.mode {
            ConstraintMode::NullableOnly => {
                let l = left.nullability_token();
                let r = right.nullability_token();
                (l.to_string(), r.to_string(), l == r)
            }
            ConstraintMode::Normalized => {
                let l = observed_constraints(left);
                let r = observed_constraints(right);
                let matched = l == r;
                (l.to_string(), r.to_string(), matched)
            }
        };
        self.finish(
            &left.column,
            Some(left.data_type.clone()),
            Some(right.data_type.clone()),
            type_match,
            left_constraint,
            right_constraint,
            constraint_match,
        )
    }

    fn one_sided(&self, column: &ColumnMetadata, presence: ColumnPresence) -> ColumnComparison {
        let (left, right, message) = match presence {
            ColumnPresence::ExtraInTarget => (
                None,
                Some(column),
                format!("present in {} only", self.right_label),
            ),
            _ => (
                Some(column),
                None,
                format!("present in {} only", self.left_label),
            ),
        };
        ColumnComparison {
            column: column.column.clone(),
            presence,
            left_type: left.map(|c| c.data_type.clone()),
            right_type: right.map(|c| c.data_type.clone()),
            left_constraint: left.map(|c| observed_constraints(c).to_string()),
            right_constraint: right.map(|c| observed_constraints(c).to_string()),
            type_match: false,
            constraint_match: false,
            status: CheckStatus::Fail,
            message: Some(message),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        column: &str,
        left_type: Option<String>,
        right_type: Option<String>,
        type_match: bool,
        left_constraint: String,
        right_constraint: String,
        constraint_match: bool,
    ) -> ColumnComparison {
        let mut problems = Vec::new();
        if !type_match {
            problems.push(format!(
                "Datatype mismatch: {} vs {}",
                left_type.as_deref().unwrap_or("N/A"),
                right_type.as_deref().unwrap_or("N/A")
            ));
        }
        if !constraint_match {
            problems.push(format!(
                "Constraint mismatch: {} vs {}",
                left_constraint, right_constraint
            ));
        }
        ColumnComparison {
            column: column.to_string(),
            presence: ColumnPresence::Common,
            left_type,
            right_type,
            left_constraint: Some(left_constraint),
            right_constraint: Some(right_constraint),
            type_match,
            constraint_match,
            status: CheckStatus::from_passed(problems.is_empty()),
            message: (!problems.is_empty()).then(|| problems.join("; ")),
        }
    }
}

/// Constraint set of an observed column: its constraint definition when the
/// catalog has one, else its nullability.
fn observed_constraints(column: &ColumnMetadata) -> NormalizedConstraintSet {
    let raw = column
        .constraint_def
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| column.nullability_token());
    normalize_constraints(Some(raw), ConstraintOrigin::Observed)
}
