//! Deleted and re-added record validation.

use crate::business_key::KeyColumns;
use crate::TableSnapshot;
use chrono::NaiveDate;
use scdguard_core::{
    parse_current_flag, BusinessKey, CellValue, CheckKind, CheckReport, CurrentFlag,
    DeletionRecord, RowSet, ScdResult, Timestamp, ValidationConfig,
};
use std::collections::{HashMap, HashSet};

/// Failure message of the deleted-vs-source check.
pub const STILL_UPSTREAM: &str = "deleted record still present upstream";

/// Detail columns of the deleted-vs-target check.
pub const DELETED_TARGET_COLUMNS: [&str; 6] = [
    "BusinessKey",
    "DeletedAt",
    "Version_Begin_Date",
    "Version_End_Date",
    "Is_Current",
    "Reason",
];

/// Detail columns of the re-added records check.
pub const READDED_COLUMNS: [&str; 4] = [
    "BusinessKey",
    "Version_Begin_Date",
    "Version_End_Date",
    "Is_Current",
];

/// A target version reduced to what lifecycle checks read.
#[derive(Debug, Clone)]
struct TargetVersion {
    begin: Option<Timestamp>,
    end: Option<Timestamp>,
    flag: CurrentFlag,
    raw_flag: CellValue,
}

/// Correlates a deletion ledger with source and target.
#[derive(Debug, Clone)]
pub struct LifecycleValidator {
    config: ValidationConfig,
}

impl LifecycleValidator {
    pub fn new(config: ValidationConfig) -> ScdResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Ledger entries whose key still has a source row.
    pub fn deleted_vs_source(
        &self,
        ledger: &TableSnapshot<'_>,
        source: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        let ledger_key = KeyColumns::bind(ledger.table, ledger.rows, key)?;
        let source_keys = key_values(source, key)?;

        let positions: Vec<usize> = ledger
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                ledger_key
                    .value(row)
                    .is_some_and(|k| source_keys.contains(&k))
            })
            .map(|(i, _)| i)
            .collect();

        let mut report = CheckReport::from_offending(
            source.database,
            source.table,
            CheckKind::DeletedVsSource,
            ledger.rows.select_rows(&positions),
        );
        if !report.passed() {
            report = report.with_message(STILL_UPSTREAM);
        }
        log_finished(&report);
        Ok(report)
    }

    /// Ledger entries whose latest target version is not closed at the
    /// deletion timestamp.
    ///
    /// Keys with no target row are not failures.
    pub fn deleted_vs_target(
        &self,
        ledger: &TableSnapshot<'_>,
        target: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        let deletions = self.deletions(ledger, key)?;
        let versions = self.target_versions(target, key)?;

        let mut offending = RowSet::new(DELETED_TARGET_COLUMNS);
        for deletion in &deletions {
            let Some(key_value) = deletion.business_key_value.as_deref() else {
                continue;
            };
            let Some(close_out) = versions
                .get(key_value)
                .and_then(|v| v.iter().max_by_key(|(row, version)| (version.begin, *row)))
                .map(|(_, version)| version)
            else {
                continue;
            };

            let reason = if close_out.flag.is_current() {
                Some("still current in target")
            } else if close_out.end != deletion.deleted_at {
                Some("end date does not match deletion timestamp")
            } else {
                None
            };
            if let Some(reason) = reason {
                offending.push(
                    target.table,
                    vec![
                        CellValue::text(key_value),
                        deletion.deleted_at.into(),
                        close_out.begin.into(),
                        close_out.end.into(),
                        close_out.raw_flag.clone(),
                        CellValue::text(reason),
                    ],
                )?;
            }
        }

        let report = CheckReport::from_offending(
            target.database,
            target.table,
            CheckKind::DeletedVsTarget,
            offending,
        );
        log_finished(&report);
        Ok(report)
    }

    /// Current target versions of re-added keys that were not given a fresh
    /// version on `run_date`.
    ///
    /// A key is re-added when it is in the ledger, the source, and the
    /// target. A version offends when it is current, its begin date is not
    /// `run_date`, and its end date is not the re-add sentinel.
    pub fn readded_records(
        &self,
        ledger: &TableSnapshot<'_>,
        source: &TableSnapshot<'_>,
        target: &TableSnapshot<'_>,
        key: &BusinessKey,
        run_date: NaiveDate,
    ) -> ScdResult<CheckReport> {
        let deleted = key_values(ledger, key)?;
        let upstream = key_values(source, key)?;
        let versions = self.target_versions(target, key)?;
        let sentinel = self.config.readd_open_sentinel.date();

        let mut readded: Vec<&str> = deleted
            .iter()
            .filter(|k| upstream.contains(*k))
            .map(String::as_str)
            .collect();
        readded.sort_unstable();

        let mut offending = RowSet::new(READDED_COLUMNS);
        for key_value in readded {
            let Some(rows) = versions.get(key_value) else {
                continue;
            };
            for (_, version) in rows {
                let stale = version.flag.is_current()
                    && version.begin.is_some_and(|b| b.date() != run_date)
                    && version.end.is_some_and(|e| e.date() != sentinel);
                if stale {
                    offending.push(
                        target.table,
                        vec![
                            CellValue::text(key_value),
                            version.begin.into(),
                            version.end.into(),
                            version.raw_flag.clone(),
                        ],
                    )?;
                }
            }
        }

        let report = CheckReport::from_offending(
            target.database,
            target.table,
            CheckKind::ReaddedRecords,
            offending,
        );
        log_finished(&report);
        Ok(report)
    }

    fn deletions(&self, ledger: &TableSnapshot<'_>, key: &BusinessKey) -> ScdResult<Vec<DeletionRecord>> {
        let key_columns = KeyColumns::bind(ledger.table, ledger.rows, key)?;
        let deleted_idx = ledger
            .rows
            .require_column(ledger.table, &self.config.deleted_at_column)?;
        let deleted_at = ledger.rows.timestamps(ledger.table, deleted_idx)?;
        Ok(ledger
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| DeletionRecord {
                business_key_value: key_columns.value(row),
                deleted_at: deleted_at[i],
                row: i,
            })
            .collect())
    }

    fn target_versions(
        &self,
        target: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<HashMap<String, Vec<(usize, TargetVersion)>>> {
        let names = &self.config.scd_columns;
        let rows = target.rows;
        let key_columns = KeyColumns::bind(target.table, rows, key)?;
        let begin_idx = rows.require_column(target.table, &names.version_begin)?;
        let end_idx = rows.require_column(target.table, &names.version_end)?;
        let current_idx = rows.require_column(target.table, &names.is_current)?;
        let begins = rows.timestamps(target.table, begin_idx)?;
        let ends = rows.timestamps(target.table, end_idx)?;

        let mut versions: HashMap<String, Vec<(usize, TargetVersion)>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            let Some(key_value) = key_columns.value(row) else {
                continue;
            };
            versions.entry(key_value).or_default().push((
                i,
                TargetVersion {
                    begin: begins[i],
                    end: ends[i],
                    flag: parse_current_flag(&row[current_idx]),
                    raw_flag: row[current_idx].clone(),
                },
            ));
        }
        Ok(versions)
    }
}

/// Non-NULL rendered key values of a table.
fn key_values(snapshot: &TableSnapshot<'_>, key: &BusinessKey) -> ScdResult<HashSet<String>> {
    let key_columns = KeyColumns::bind(snapshot.table, snapshot.rows, key)?;
    Ok(snapshot
        .rows
        .iter()
        .filter_map(|row| key_columns.value(row))
        .collect())
}

fn log_finished(report: &CheckReport) {
    tracing::info!(
        database = %report.database,
        table = %report.table,
        check = %report.check,
        issues = report.issue_count,
        passed = report.passed(),
        "Lifecycle check finished"
    );
}
