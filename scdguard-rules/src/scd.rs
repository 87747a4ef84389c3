//! SCD Type 2 invariant checks.
//!
//! Rows are grouped by rendered business key and checked against five
//! invariants, each reported on its own:
//!
//! - a version cannot begin after it was loaded
//! - at most one current version per key
//! - every version, current or historical, carries a stored end date
//! - historical versions have strictly positive duration
//! - versions of one key never overlap

use crate::business_key::KeyColumns;
use crate::TableSnapshot;
use scdguard_core::{
    parse_current_flag, BusinessKey, CellValue, CheckKind, CheckReport, ConfigError, CurrentFlag,
    RowSet, ScdResult, Timestamp, ValidationConfig, VersionInterval, VersionRecord,
};
use std::collections::BTreeMap;

/// Detail columns of the single-current finding.
pub const SINGLE_CURRENT_COLUMNS: [&str; 2] = ["BusinessKey", "CurrentRecordCount"];

/// Detail columns of an overlap finding.
pub const OVERLAP_COLUMNS: [&str; 5] = ["BusinessKey", "Begin_A", "End_A", "Begin_B", "End_B"];

/// True when two intervals of the same key overlap.
///
/// Boundary-touching intervals do not overlap, and two intervals opened on
/// the same instant are not counted against each other.
pub fn intervals_overlap(a: &VersionInterval, b: &VersionInterval) -> bool {
    a.begin < b.end && b.begin < a.end && a.begin != b.begin
}

// ============================================================================
// VERSION SCAN
// ============================================================================

/// One SCD timestamp column, parsed once per scan.
///
/// A parse failure is kept here and raised only by the checks that read
/// the column.
#[derive(Debug)]
struct DateColumn {
    index: Option<usize>,
    parsed: ScdResult<Vec<Option<Timestamp>>>,
}

impl DateColumn {
    fn read(snapshot: &TableSnapshot<'_>, name: &str) -> Self {
        let rows = snapshot.rows;
        let index = rows.column_index(name);
        let parsed = match index {
            Some(idx) => rows.timestamps(snapshot.table, idx),
            None => Ok(vec![None; rows.len()]),
        };
        Self { index, parsed }
    }

    fn value(&self, row: usize) -> Option<Timestamp> {
        self.parsed.as_ref().ok().and_then(|values| values[row])
    }
}

/// The SCD columns of a scan.
#[derive(Debug)]
struct ScdColumns {
    begin: DateColumn,
    end: DateColumn,
    current: Option<usize>,
    load: DateColumn,
}

/// One table scan materialized as version records.
///
/// Missing or unreadable SCD columns are tolerated here and reported by
/// each check that needs them.
struct VersionScan<'a> {
    snapshot: &'a TableSnapshot<'a>,
    config: &'a ValidationConfig,
    columns: ScdColumns,
    records: Vec<VersionRecord>,
}

impl<'a> VersionScan<'a> {
    fn new(
        snapshot: &'a TableSnapshot<'a>,
        key: &BusinessKey,
        config: &'a ValidationConfig,
    ) -> ScdResult<Self> {
        let rows = snapshot.rows;
        let names = &config.scd_columns;
        let key_columns = KeyColumns::bind(snapshot.table, rows, key)?;
        let columns = ScdColumns {
            begin: DateColumn::read(snapshot, &names.version_begin),
            end: DateColumn::read(snapshot, &names.version_end),
            current: rows.column_index(&names.is_current),
            load: DateColumn::read(snapshot, &names.load_timestamp),
        };

        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| VersionRecord {
                business_key_value: key_columns.value(row),
                version_begin: columns.begin.value(i),
                version_end: columns.end.value(i),
                is_current: columns
                    .current
                    .map_or(CurrentFlag::Unknown, |idx| parse_current_flag(&row[idx])),
                load_timestamp: columns.load.value(i),
                row: i,
            })
            .collect();

        Ok(Self {
            snapshot,
            config,
            columns,
            records,
        })
    }

    fn need(&self, idx: Option<usize>, name: &str) -> ScdResult<()> {
        match idx {
            Some(_) => Ok(()),
            None => Err(ConfigError::MissingColumn {
                table: self.snapshot.table.to_string(),
                column: name.to_string(),
            }
            .into()),
        }
    }

    fn need_dates(&self, column: &DateColumn, name: &str) -> ScdResult<()> {
        self.need(column.index, name)?;
        column.parsed.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    fn report(&self, check: CheckKind, offending: RowSet) -> CheckReport {
        let report =
            CheckReport::from_offending(self.snapshot.database, self.snapshot.table, check, offending);
        tracing::info!(
            database = %report.database,
            table = %report.table,
            check = %check,
            issues = report.issue_count,
            passed = report.passed(),
            "SCD check finished"
        );
        report
    }

    fn offending_rows<F>(&self, check: CheckKind, mut offends: F) -> CheckReport
    where
        F: FnMut(&VersionRecord) -> bool,
    {
        let positions: Vec<usize> = self
            .records
            .iter()
            .filter(|r| offends(r))
            .map(|r| r.row)
            .collect();
        self.report(check, self.snapshot.rows.select_rows(&positions))
    }

    fn version_begin(&self) -> ScdResult<CheckReport> {
        let names = &self.config.scd_columns;
        self.need_dates(&self.columns.begin, &names.version_begin)?;
        self.need_dates(&self.columns.load, &names.load_timestamp)?;
        Ok(self.offending_rows(CheckKind::VersionBegin, |r| match r.version_begin {
            None => true,
            Some(begin) => r.load_timestamp.is_some_and(|load| begin > load),
        }))
    }

    fn single_current(&self) -> ScdResult<CheckReport> {
        self.need(self.columns.current, &self.config.scd_columns.is_current)?;

        let mut counts: BTreeMap<Option<&str>, i64> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.is_current.is_current()) {
            *counts.entry(record.business_key_value.as_deref()).or_default() += 1;
        }

        let mut offending = RowSet::new(SINGLE_CURRENT_COLUMNS);
        for (key, count) in counts.into_iter().filter(|(_, count)| *count > 1) {
            offending.push(
                self.snapshot.table,
                vec![CellValue::from(key.map(str::to_string)), CellValue::Int(count)],
            )?;
        }
        Ok(self.report(CheckKind::SingleCurrent, offending))
    }

    fn end_date_consistency(&self) -> ScdResult<CheckReport> {
        let names = &self.config.scd_columns;
        self.need(self.columns.current, &names.is_current)?;
        self.need_dates(&self.columns.end, &names.version_end)?;
        Ok(self.offending_rows(CheckKind::EndDateConsistency, |r| {
            let flagged = matches!(r.is_current, CurrentFlag::Current | CurrentFlag::Historical);
            flagged && r.version_end.is_none()
        }))
    }

    fn historical_ordering(&self) -> ScdResult<CheckReport> {
        let names = &self.config.scd_columns;
        self.need(self.columns.current, &names.is_current)?;
        self.need_dates(&self.columns.begin, &names.version_begin)?;
        self.need_dates(&self.columns.end, &names.version_end)?;
        Ok(self.offending_rows(CheckKind::HistoricalOrdering, |r| {
            match (r.is_current, r.version_begin, r.version_end) {
                (CurrentFlag::Historical, Some(begin), Some(end)) => begin >= end,
                _ => false,
            }
        }))
    }

    fn overlaps(&self) -> ScdResult<CheckReport> {
        let names = &self.config.scd_columns;
        self.need_dates(&self.columns.begin, &names.version_begin)?;
        self.need_dates(&self.columns.end, &names.version_end)?;

        let open_end = self.config.open_end_sentinel;
        let mut groups: BTreeMap<&str, Vec<VersionInterval>> = BTreeMap::new();
        for record in &self.records {
            let Some(key) = record.business_key_value.as_deref() else {
                continue;
            };
            if let Some(interval) = VersionInterval::from_record(record, open_end) {
                groups.entry(key).or_default().push(interval);
            }
        }

        let mut offending = RowSet::new(OVERLAP_COLUMNS);
        for (key, mut intervals) in groups {
            intervals.sort_by_key(|i| (i.begin, i.end));
            for (i, a) in intervals.iter().enumerate() {
                for b in &intervals[i + 1..] {
                    if intervals_overlap(a, b) {
                        offending.push(
                            self.snapshot.table,
                            vec![
                                CellValue::text(key),
                                a.begin.into(),
                                a.end.into(),
                                b.begin.into(),
                                b.end.into(),
                            ],
                        )?;
                    }
                }
            }
        }
        Ok(self.report(CheckKind::Overlap, offending))
    }
}

// ============================================================================
// CHECKER
// ============================================================================

/// Evaluates SCD invariants over table scans.
#[derive(Debug, Clone)]
pub struct ScdChecker {
    config: ValidationConfig,
}

impl ScdChecker {
    /// Create a checker; the configuration is validated once here.
    pub fn new(config: ValidationConfig) -> ScdResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run all five checks over one scan.
    ///
    /// Each check succeeds or fails on its own; a scan that cannot be read
    /// at all fails every check with the same error.
    pub fn check_all(
        &self,
        snapshot: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> Vec<(CheckKind, ScdResult<CheckReport>)> {
        const KINDS: [CheckKind; 5] = [
            CheckKind::VersionBegin,
            CheckKind::SingleCurrent,
            CheckKind::EndDateConsistency,
            CheckKind::HistoricalOrdering,
            CheckKind::Overlap,
        ];
        match VersionScan::new(snapshot, key, &self.config) {
            Ok(scan) => vec![
                (CheckKind::VersionBegin, scan.version_begin()),
                (CheckKind::SingleCurrent, scan.single_current()),
                (CheckKind::EndDateConsistency, scan.end_date_consistency()),
                (CheckKind::HistoricalOrdering, scan.historical_ordering()),
                (CheckKind::Overlap, scan.overlaps()),
            ],
            Err(err) => KINDS.iter().map(|&kind| (kind, Err(err.clone()))).collect(),
        }
    }

    /// Rows whose begin date is NULL or later than their load timestamp.
    pub fn check_version_begin(
        &self,
        snapshot: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        VersionScan::new(snapshot, key, &self.config)?.version_begin()
    }

    /// Keys with more than one current row.
    pub fn check_single_current(
        &self,
        snapshot: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        VersionScan::new(snapshot, key, &self.config)?.single_current()
    }

    /// Current or historical rows with a NULL stored end date.
    pub fn check_end_date_consistency(
        &self,
        snapshot: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        VersionScan::new(snapshot, key, &self.config)?.end_date_consistency()
    }

    /// Historical rows whose begin is not strictly before their end.
    pub fn check_historical_ordering(
        &self,
        snapshot: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        VersionScan::new(snapshot, key, &self.config)?.historical_ordering()
    }

    /// Overlapping version pairs, one finding per pair.
    pub fn check_overlaps(
        &self,
        snapshot: &TableSnapshot<'_>,
        key: &BusinessKey,
    ) -> ScdResult<CheckReport> {
        VersionScan::new(snapshot, key, &self.config)?.overlaps()
    }
}
