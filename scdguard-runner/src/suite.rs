//! Error-isolated suite orchestration.
//!
//! A suite walks every table mapping and runs the selected check families
//! against the Source, Stage and Target environments. Each check runs to
//! completion on its own: a configuration or data-access fault is logged,
//! recorded as a [`CheckFault`], and the next check still runs.

use chrono::NaiveDate;
use scdguard_core::{
    BusinessKey, CheckKind, CheckReport, ColumnSpec, DataAccessError, RowSet, ScdError, ScdResult,
    TableMapping, ValidationConfig, ValidationError,
};
use scdguard_rules::business_key::same_table;
use scdguard_rules::{
    profile, BusinessKeyResolver, ColumnPresence, CurrentFilter, LifecycleValidator,
    MetadataDiffer, Reconciler, ScdChecker, TableSnapshot,
};
use scdguard_storage::{Database, SnapshotReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The five checks of the SCD family, in run order.
const SCD_CHECKS: [CheckKind; 5] = [
    CheckKind::VersionBegin,
    CheckKind::SingleCurrent,
    CheckKind::EndDateConsistency,
    CheckKind::HistoricalOrdering,
    CheckKind::Overlap,
];

const LIFECYCLE_CHECKS: [CheckKind; 3] = [
    CheckKind::DeletedVsSource,
    CheckKind::DeletedVsTarget,
    CheckKind::ReaddedRecords,
];

type Reader<'a> = SnapshotReader<'a, dyn Database + 'a>;

// ============================================================================
// CHECK FAMILIES
// ============================================================================

/// A group of checks selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFamily {
    /// Source vs Stage and Source vs Target column contracts
    Metadata,
    /// Configured column specs vs Target catalog
    ExpectedMetadata,
    RowCount,
    Completeness,
    ScdCompleteness,
    /// The five SCD invariants over the Target scan
    Scd,
    /// Deleted-vs-source, deleted-vs-target, re-added records
    Lifecycle,
    /// Business-key nulls, Source duplicate keys and forbidden view columns
    Profile,
}

impl CheckFamily {
    pub const ALL: [CheckFamily; 8] = [
        CheckFamily::Metadata,
        CheckFamily::ExpectedMetadata,
        CheckFamily::RowCount,
        CheckFamily::Completeness,
        CheckFamily::ScdCompleteness,
        CheckFamily::Scd,
        CheckFamily::Lifecycle,
        CheckFamily::Profile,
    ];

    pub fn all() -> Vec<Self> {
        Self::ALL.to_vec()
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckFamily::Metadata => "metadata",
            CheckFamily::ExpectedMetadata => "expected_metadata",
            CheckFamily::RowCount => "row_count",
            CheckFamily::Completeness => "completeness",
            CheckFamily::ScdCompleteness => "scd_completeness",
            CheckFamily::Scd => "scd",
            CheckFamily::Lifecycle => "lifecycle",
            CheckFamily::Profile => "profile",
        }
    }
}

impl fmt::Display for CheckFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// The result of one check before it is recorded.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub table: String,
    pub check: CheckKind,
    pub result: ScdResult<CheckReport>,
}

impl CheckOutcome {
    pub fn new(table: impl Into<String>, check: CheckKind, result: ScdResult<CheckReport>) -> Self {
        Self {
            table: table.into(),
            check,
            result,
        }
    }
}

/// A check that aborted on a configuration or data-access fault.
#[derive(Debug, Clone, Serialize)]
pub struct CheckFault {
    #[serde(rename = "Table_name")]
    pub table: String,
    #[serde(rename = "Check_name")]
    pub check: CheckKind,
    #[serde(rename = "Error")]
    pub message: String,
    #[serde(skip)]
    pub error: ScdError,
}

/// Everything one suite run produced, in run order.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub reports: Vec<CheckReport>,
    pub errors: Vec<CheckFault>,
}

impl SuiteReport {
    pub fn new(run_date: NaiveDate) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            run_date,
            reports: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Keep a finished report, or log and keep a fault.
    pub fn record(&mut self, outcome: CheckOutcome) {
        match outcome.result {
            Ok(report) => self.reports.push(report),
            Err(error) => {
                tracing::error!(
                    run_id = %self.run_id,
                    table = %outcome.table,
                    check = %outcome.check,
                    error = %error,
                    "Check aborted"
                );
                self.errors.push(CheckFault {
                    table: outcome.table,
                    check: outcome.check,
                    message: error.to_string(),
                    error,
                });
            }
        }
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.reports.iter().all(CheckReport::passed)
    }

    /// One line per failing report and per fault.
    pub fn failures(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter(|r| !r.passed())
            .map(CheckReport::summary)
            .chain(
                self.errors
                    .iter()
                    .map(|e| format!("{} on {} aborted: {}", e.check, e.table, e.message)),
            )
            .collect()
    }

    /// Raise one aggregate error if anything failed.
    pub fn ensure_passed(&self) -> ScdResult<()> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ChecksFailed { failures }.into())
        }
    }
}

// ============================================================================
// SUITE
// ============================================================================

/// The three environments a suite reads.
#[derive(Clone, Copy)]
pub struct Environments<'a> {
    pub source: &'a dyn Database,
    pub stage: &'a dyn Database,
    pub target: &'a dyn Database,
}

/// Runs check families over table mappings.
pub struct ValidationSuite<'a> {
    envs: Environments<'a>,
    specs: &'a [ColumnSpec],
    config: ValidationConfig,
    run_date: NaiveDate,
    scd: ScdChecker,
    reconciler: Reconciler,
    lifecycle: LifecycleValidator,
}

impl<'a> ValidationSuite<'a> {
    /// Build a suite; the configuration is validated once here.
    pub fn new(
        envs: Environments<'a>,
        specs: &'a [ColumnSpec],
        config: ValidationConfig,
        run_date: NaiveDate,
    ) -> ScdResult<Self> {
        config.validate()?;
        Ok(Self {
            envs,
            specs,
            scd: ScdChecker::new(config.clone())?,
            reconciler: Reconciler::new(config.clone())?,
            lifecycle: LifecycleValidator::new(config.clone())?,
            config,
            run_date,
        })
    }

    /// Run every family for every mapping.
    ///
    /// Never fails: faults are recorded in the report.
    pub fn run(&self, mappings: &[TableMapping], families: &[CheckFamily]) -> SuiteReport {
        let mut report = SuiteReport::new(self.run_date);
        tracing::info!(
            run_id = %report.run_id,
            mappings = mappings.len(),
            families = families.len(),
            "Validation suite started"
        );
        for mapping in mappings {
            for &family in families {
                for outcome in self.run_family(mapping, family) {
                    report.record(outcome);
                }
            }
        }
        tracing::info!(
            run_id = %report.run_id,
            checks = report.reports.len(),
            failures = report.reports.iter().filter(|r| !r.passed()).count(),
            errors = report.errors.len(),
            "Validation suite finished"
        );
        report
    }

    /// Run one family for one mapping.
    ///
    /// Returns no outcomes when the family does not apply to the mapping
    /// (no business key, no deletion ledger, no target view).
    pub fn run_family(&self, mapping: &TableMapping, family: CheckFamily) -> Vec<CheckOutcome> {
        match family {
            CheckFamily::Metadata => self.metadata(mapping),
            CheckFamily::ExpectedMetadata => self.expected_metadata(mapping),
            CheckFamily::RowCount => vec![CheckOutcome::new(
                &mapping.source_table,
                CheckKind::RowCount,
                profile::row_counts(mapping, &self.source(), &self.stage(), &self.target()),
            )],
            CheckFamily::Completeness => self.completeness(mapping),
            CheckFamily::ScdCompleteness => self.scd_completeness(mapping),
            CheckFamily::Scd => self.scd(mapping),
            CheckFamily::Lifecycle => self.lifecycle(mapping),
            CheckFamily::Profile => self.profile(mapping),
        }
    }

    fn source(&self) -> Reader<'a> {
        SnapshotReader::new(self.envs.source)
    }

    fn stage(&self) -> Reader<'a> {
        SnapshotReader::new(self.envs.stage)
    }

    fn target(&self) -> Reader<'a> {
        SnapshotReader::new(self.envs.target)
    }

    /// Key of the target table, else of the source table.
    fn business_key(&self, mapping: &TableMapping, family: CheckFamily) -> Option<BusinessKey> {
        let resolver = BusinessKeyResolver::new(self.specs);
        match resolver
            .require(&mapping.target_table)
            .or_else(|_| resolver.require(&mapping.source_table))
        {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(
                    table = %mapping.target_table,
                    family = %family,
                    error = %err,
                    "Skipping checks that need a business key"
                );
                None
            }
        }
    }

    // === Metadata ===

    fn metadata(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let source = self.source();
        let mut outcomes = Vec::new();
        if let Some(stage_table) = mapping.stage() {
            outcomes.push(self.cross_environment(
                &source,
                &mapping.source_table,
                &self.stage(),
                stage_table,
            ));
        }
        outcomes.push(self.cross_environment(
            &source,
            &mapping.source_table,
            &self.target(),
            &mapping.target_table,
        ));
        outcomes
    }

    fn cross_environment(
        &self,
        left: &Reader<'a>,
        left_table: &str,
        right: &Reader<'a>,
        right_table: &str,
    ) -> CheckOutcome {
        let table = format!("{} vs {}", left_table, right_table);
        let result = self.contract_report(left, left_table, right, right_table, &table);
        CheckOutcome::new(table, CheckKind::MetadataContract, result)
    }

    /// Columns the downstream side adds (SCD columns) are not findings.
    fn contract_report(
        &self,
        left: &Reader<'a>,
        left_table: &str,
        right: &Reader<'a>,
        right_table: &str,
        label: &str,
    ) -> ScdResult<CheckReport> {
        let differ = MetadataDiffer::new(
            self.config.constraint_mode,
            left.database_name(),
            right.database_name(),
        );
        let comparisons: Vec<_> = differ
            .diff(&left.columns(left_table)?, &right.columns(right_table)?)
            .into_iter()
            .filter(|c| c.presence != ColumnPresence::ExtraInTarget)
            .collect();
        let database = format!("{} vs {}", left.database_name(), right.database_name());
        MetadataDiffer::report(&database, label, CheckKind::MetadataContract, &comparisons)
    }

    fn expected_metadata(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let table = &mapping.target_table;
        if !self.specs.iter().any(|s| same_table(&s.table_name, table)) {
            tracing::warn!(table = %table, "No column specs configured; skipping expected metadata");
            return Vec::new();
        }
        let target = self.target();
        let result = target.columns(table).and_then(|observed| {
            let differ =
                MetadataDiffer::new(self.config.constraint_mode, "configuration", target.database_name());
            let comparisons = differ.compare_expected(table, self.specs, &observed);
            MetadataDiffer::report(
                target.database_name(),
                table,
                CheckKind::ExpectedMetadata,
                &comparisons,
            )
        });
        vec![CheckOutcome::new(table, CheckKind::ExpectedMetadata, result)]
    }

    // === Reconciliation ===

    /// Source → Stage then Stage → Target; Source → Target when there is
    /// no stage.
    fn completeness(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let (source, target) = (self.source(), self.target());
        let Some(stage_table) = mapping.stage() else {
            let result = self.reconciler.completeness_report(
                &source,
                &mapping.source_table,
                &target,
                &mapping.target_table,
            );
            return vec![CheckOutcome::new(
                &mapping.source_table,
                CheckKind::Completeness,
                result,
            )];
        };

        let stage = self.stage();
        let upstream =
            self.reconciler
                .completeness_report(&source, &mapping.source_table, &stage, stage_table);
        let downstream =
            self.reconciler
                .completeness_report(&stage, stage_table, &target, &mapping.target_table);
        vec![
            CheckOutcome::new(&mapping.source_table, CheckKind::Completeness, upstream),
            CheckOutcome::new(stage_table, CheckKind::Completeness, downstream),
        ]
    }

    /// Source → Stage (current Stage rows) then Stage → Target (current
    /// rows on both sides); Source → Target when there is no stage.
    fn scd_completeness(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let source = self.source();
        let target = self.target();
        match mapping.stage() {
            Some(stage_table) => {
                let stage = self.stage();
                vec![
                    CheckOutcome::new(
                        &mapping.source_table,
                        CheckKind::ScdCompleteness,
                        self.reconciler.scd_completeness_report(
                            &source,
                            &mapping.source_table,
                            &stage,
                            stage_table,
                            CurrentFilter::RightOnly,
                        ),
                    ),
                    CheckOutcome::new(
                        stage_table,
                        CheckKind::ScdCompleteness,
                        self.reconciler.scd_completeness_report(
                            &stage,
                            stage_table,
                            &target,
                            &mapping.target_table,
                            CurrentFilter::BothSides,
                        ),
                    ),
                ]
            }
            None => vec![CheckOutcome::new(
                &mapping.source_table,
                CheckKind::ScdCompleteness,
                self.reconciler.scd_completeness_report(
                    &source,
                    &mapping.source_table,
                    &target,
                    &mapping.target_table,
                    CurrentFilter::RightOnly,
                ),
            )],
        }
    }

    // === SCD invariants ===

    fn scd(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let Some(key) = self.business_key(mapping, CheckFamily::Scd) else {
            return Vec::new();
        };
        let target = self.target();
        let table = &mapping.target_table;
        match target.scan(table) {
            Ok(rows) => {
                let snapshot = TableSnapshot::new(target.database_name(), table, &rows);
                self.scd
                    .check_all(&snapshot, &key)
                    .into_iter()
                    .map(|(check, result)| CheckOutcome::new(table, check, result))
                    .collect()
            }
            Err(err) => SCD_CHECKS
                .iter()
                .map(|&check| CheckOutcome::new(table, check, Err(err.clone())))
                .collect(),
        }
    }

    // === Lifecycle ===

    fn lifecycle(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let Some(ledger_table) = mapping.deleted() else {
            tracing::warn!(
                table = %mapping.target_table,
                "No deleted table configured; skipping lifecycle checks"
            );
            return Vec::new();
        };
        let Some(key) = self.business_key(mapping, CheckFamily::Lifecycle) else {
            return Vec::new();
        };

        let source = self.source();
        let target = self.target();
        let scans = target.scan(ledger_table).and_then(|ledger| {
            Ok((
                ledger,
                source.scan(&mapping.source_table)?,
                target.scan(&mapping.target_table)?,
            ))
        });
        let (ledger_rows, source_rows, target_rows) = match scans {
            Ok(scans) => scans,
            Err(err) => {
                return LIFECYCLE_CHECKS
                    .iter()
                    .map(|&check| CheckOutcome::new(ledger_table, check, Err(err.clone())))
                    .collect();
            }
        };

        let ledger = TableSnapshot::new(target.database_name(), ledger_table, &ledger_rows);
        let upstream =
            TableSnapshot::new(source.database_name(), &mapping.source_table, &source_rows);
        let downstream =
            TableSnapshot::new(target.database_name(), &mapping.target_table, &target_rows);

        vec![
            CheckOutcome::new(
                &mapping.source_table,
                CheckKind::DeletedVsSource,
                self.lifecycle.deleted_vs_source(&ledger, &upstream, &key),
            ),
            CheckOutcome::new(
                &mapping.target_table,
                CheckKind::DeletedVsTarget,
                self.lifecycle.deleted_vs_target(&ledger, &downstream, &key),
            ),
            CheckOutcome::new(
                &mapping.target_table,
                CheckKind::ReaddedRecords,
                self.lifecycle
                    .readded_records(&ledger, &upstream, &downstream, &key, self.run_date),
            ),
        ]
    }

    // === Profile ===

    fn profile(&self, mapping: &TableMapping) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();
        if let Some(key) = self.business_key(mapping, CheckFamily::Profile) {
            let (source, target) = (self.source(), self.target());
            let nulls = (CheckKind::BusinessKeyNulls, profile::business_key_nulls as KeyedCheck);
            outcomes.push(keyed_profile(&source, &mapping.source_table, &key, nulls));
            outcomes.push(keyed_profile(&target, &mapping.target_table, &key, nulls));
            outcomes.push(keyed_profile(
                &source,
                &mapping.source_table,
                &key,
                (CheckKind::DuplicateKeys, profile::duplicate_keys as KeyedCheck),
            ));
        }
        if let Some(view) = mapping.view() {
            let target = self.target();
            let result = target.column_names(view).and_then(|columns| {
                if columns.is_empty() {
                    return Err(DataAccessError::UnknownTable {
                        database: target.database_name().to_string(),
                        table: view.to_string(),
                    }
                    .into());
                }
                profile::forbidden_view_columns(target.database_name(), view, &columns, &self.config)
            });
            outcomes.push(CheckOutcome::new(view, CheckKind::ForbiddenViewColumns, result));
        }
        outcomes
    }
}

type KeyedCheck = fn(&TableSnapshot<'_>, &BusinessKey) -> ScdResult<CheckReport>;

fn keyed_profile(
    reader: &Reader<'_>,
    table: &str,
    key: &BusinessKey,
    (check, run): (CheckKind, KeyedCheck),
) -> CheckOutcome {
    let result = reader
        .scan(table)
        .and_then(|rows: RowSet| run(&TableSnapshot::new(reader.database_name(), table, &rows), key));
    CheckOutcome::new(table, check, result)
}
