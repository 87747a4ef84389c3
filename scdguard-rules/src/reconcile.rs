//! Cross-environment row reconciliation.

use scdguard_core::{
    parse_current_flag, CellValue, CheckKind, CheckReport, RowSet, SafeIdent, ScdError, ScdResult,
    ValidationConfig, ValidationError,
};
use scdguard_storage::{Database, SnapshotReader};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The shared column projection of one mapped table pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPair {
    pub left_table: String,
    pub right_table: String,
    pub common_columns: Vec<String>,
}

impl ReconciliationPair {
    /// Quoted, comma-joined projection list: `[id], [name]`.
    pub fn projection(&self) -> ScdResult<String> {
        let quoted = self
            .common_columns
            .iter()
            .map(|c| SafeIdent::parse(c).map(|ident| ident.quoted()))
            .collect::<ScdResult<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }
}

/// Which sides of an SCD comparison are reduced to current rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentFilter {
    /// Only the downstream side (Source → Stage)
    RightOnly,
    /// Both sides (Stage → Target)
    BothSides,
}

/// Intersect two schemas, keeping left order and dropping `excluded`.
///
/// Name matching is case-sensitive; exclusion is not. An empty result is
/// an error, never a silent skip.
pub fn common_columns(
    left_table: &str,
    left: &[String],
    right_table: &str,
    right: &[String],
    excluded: &[String],
) -> ScdResult<ReconciliationPair> {
    let right: HashSet<&str> = right.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let common: Vec<String> = left
        .iter()
        .filter(|c| right.contains(c.as_str()))
        .filter(|c| !excluded.iter().any(|e| e.eq_ignore_ascii_case(c)))
        .filter(|c| seen.insert(c.as_str()))
        .cloned()
        .collect();

    if common.is_empty() {
        return Err(ValidationError::NoCommonColumns {
            left_table: left_table.to_string(),
            right_table: right_table.to_string(),
        }
        .into());
    }
    Ok(ReconciliationPair {
        left_table: left_table.to_string(),
        right_table: right_table.to_string(),
        common_columns: common,
    })
}

/// Distinct left rows, projected on the pair's columns, absent on the right.
///
/// Set difference with `EXCEPT` semantics: left minus right only, NULL
/// matches NULL, and duplicates collapse.
pub fn completeness(pair: &ReconciliationPair, left: &RowSet, right: &RowSet) -> ScdResult<RowSet> {
    let left_idx = left.require_columns(&pair.left_table, &pair.common_columns)?;
    let right_idx = right.require_columns(&pair.right_table, &pair.common_columns)?;

    let right_rows: HashSet<Vec<&CellValue>> = right
        .iter()
        .map(|row| right_idx.iter().map(|&i| &row[i]).collect())
        .collect();

    let mut emitted = HashSet::new();
    let mut missing = RowSet::new(pair.common_columns.iter().cloned());
    for row in left.iter() {
        let projected: Vec<&CellValue> = left_idx.iter().map(|&i| &row[i]).collect();
        if !right_rows.contains(&projected) && emitted.insert(projected.clone()) {
            missing.push(&pair.left_table, projected.into_iter().cloned().collect())?;
        }
    }
    Ok(missing)
}

/// `completeness` restricted to current rows on one or both sides.
pub fn scd_completeness(
    pair: &ReconciliationPair,
    left: &RowSet,
    right: &RowSet,
    is_current_column: &str,
    filter: CurrentFilter,
) -> ScdResult<RowSet> {
    let current_only = |table: &str, rows: &RowSet| -> ScdResult<RowSet> {
        let idx = rows.require_column(table, is_current_column)?;
        Ok(rows.filter_rows(|row| parse_current_flag(&row[idx]).is_current()))
    };

    let right = current_only(&pair.right_table, right)?;
    match filter {
        CurrentFilter::RightOnly => completeness(pair, left, &right),
        CurrentFilter::BothSides => {
            let left = current_only(&pair.left_table, left)?;
            completeness(pair, &left, &right)
        }
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Fetches both sides of a pair and reports missing rows.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ValidationConfig,
}

impl Reconciler {
    pub fn new(config: ValidationConfig) -> ScdResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Plain completeness over every shared column.
    pub fn completeness_report<L, R>(
        &self,
        left: &SnapshotReader<'_, L>,
        left_table: &str,
        right: &SnapshotReader<'_, R>,
        right_table: &str,
    ) -> ScdResult<CheckReport>
    where
        L: Database + ?Sized,
        R: Database + ?Sized,
    {
        self.run(left, left_table, right, right_table, CheckKind::Completeness, None)
    }

    /// Current-row completeness over shared non-housekeeping columns.
    pub fn scd_completeness_report<L, R>(
        &self,
        left: &SnapshotReader<'_, L>,
        left_table: &str,
        right: &SnapshotReader<'_, R>,
        right_table: &str,
        filter: CurrentFilter,
    ) -> ScdResult<CheckReport>
    where
        L: Database + ?Sized,
        R: Database + ?Sized,
    {
        self.run(
            left,
            left_table,
            right,
            right_table,
            CheckKind::ScdCompleteness,
            Some(filter),
        )
    }

    fn run<L, R>(
        &self,
        left: &SnapshotReader<'_, L>,
        left_table: &str,
        right: &SnapshotReader<'_, R>,
        right_table: &str,
        check: CheckKind,
        filter: Option<CurrentFilter>,
    ) -> ScdResult<CheckReport>
    where
        L: Database + ?Sized,
        R: Database + ?Sized,
    {
        let excluded: &[String] = match filter {
            Some(_) => &self.config.housekeeping_columns,
            None => &[],
        };
        let pair = match common_columns(
            left_table,
            &left.column_names(left_table)?,
            right_table,
            &right.column_names(right_table)?,
            excluded,
        ) {
            Ok(pair) => pair,
            Err(err @ ScdError::Validation(ValidationError::NoCommonColumns { .. })) => {
                tracing::warn!(
                    left_table = %left_table,
                    right_table = %right_table,
                    "No common columns to reconcile"
                );
                return Ok(
                    CheckReport::from_count(left.database_name(), left_table, check, 1)
                        .with_message(err.to_string()),
                );
            }
            Err(err) => return Err(err),
        };

        let left_rows = left.scan(left_table)?;
        let right_rows = right.scan(right_table)?;
        let missing = match filter {
            Some(filter) => scd_completeness(
                &pair,
                &left_rows,
                &right_rows,
                &self.config.scd_columns.is_current,
                filter,
            )?,
            None => completeness(&pair, &left_rows, &right_rows)?,
        };

        let report = CheckReport::from_offending(left.database_name(), left_table, check, missing)
            .with_message(format!(
                "compared {} against {}.{} on {}",
                left_table,
                right.database_name(),
                right_table,
                pair.projection()?
            ));
        tracing::info!(
            database = %report.database,
            table = %report.table,
            check = %check,
            issues = report.issue_count,
            "Reconciliation finished"
        );
        Ok(report)
    }
}
