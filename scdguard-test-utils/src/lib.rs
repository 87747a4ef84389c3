//! SCDGUARD Test Utilities
//!
//! Shared test infrastructure for the SCDGUARD workspace:
//! - Proptest generators for cells, timestamps, intervals and constraints
//! - Fixtures for a small three-environment warehouse
//! - Assertions for reports and error variants

// Re-export the in-memory database from its source crate
pub use scdguard_storage::{Database, InMemoryDatabase, SnapshotReader};

// Re-export core types for convenience
pub use scdguard_core::{
    BusinessKey, CellValue, CheckKind, CheckReport, CheckStatus, ColumnMetadata, ColumnSpec,
    ConfigError, DataAccessError, RowSet, ScdError, ScdResult, TableMapping, Timestamp,
    ValidationConfig, ValidationError, VersionInterval,
};

use chrono::{Duration, NaiveDate};

/// Midnight of a calendar day.
///
/// Panics on an invalid date; only for tests.
pub fn ts(year: i32, month: u32, day: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| panic!("invalid test date {year}-{month}-{day}"))
}

/// Midnight `days` after 2020-01-01.
pub fn day(days: i64) -> Timestamp {
    ts(2020, 1, 1) + Duration::days(days)
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for SCDGUARD values.

    use super::*;
    use proptest::prelude::*;

    /// A midnight timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..3650).prop_map(day)
    }

    /// A version interval with strictly positive duration.
    pub fn arb_interval() -> impl Strategy<Value = VersionInterval> {
        (0i64..3000, 1i64..400)
            .prop_map(|(start, len)| VersionInterval::new(day(start), day(start + len)))
    }

    /// Any cell value the in-memory database can hold.
    pub fn arb_cell() -> impl Strategy<Value = CellValue> {
        prop_oneof![
            Just(CellValue::Null),
            any::<bool>().prop_map(CellValue::Bool),
            any::<i64>().prop_map(CellValue::Int),
            arb_timestamp().prop_map(CellValue::Timestamp),
            "[a-zA-Z0-9 ]{0,12}".prop_map(CellValue::Text),
        ]
    }

    /// A spelling of the current-row flag.
    pub fn arb_current_flag_literal() -> impl Strategy<Value = CellValue> {
        prop_oneof![
            Just(CellValue::text("1")),
            Just(CellValue::text("TRUE")),
            Just(CellValue::text("True")),
            Just(CellValue::text("true")),
            Just(CellValue::Int(1)),
            Just(CellValue::Bool(true)),
        ]
    }

    /// A raw constraint string as a column spec or catalog might write it.
    pub fn arb_constraint_string() -> impl Strategy<Value = Option<String>> {
        let token = prop_oneof![
            Just("NULL"),
            Just("not null"),
            Just("PRIMARY KEY"),
            Just("Composite Key"),
            Just("UNIQUE"),
            Just("nan"),
            Just(""),
        ];
        prop::option::of(
            prop::collection::vec(token, 0..4).prop_map(|tokens| tokens.join(", ")),
        )
    }

    /// A schema-safe identifier, optionally schema-qualified.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        ("[A-Za-z_][A-Za-z0-9_]{0,20}", prop::option::of("[A-Za-z_][A-Za-z0-9_]{0,10}")).prop_map(
            |(name, schema)| match schema {
                Some(schema) => format!("{schema}.{name}"),
                None => name,
            },
        )
    }

    /// A dimension table holding one clean version chain per key.
    ///
    /// Every key's versions are contiguous, closed, and the last one is
    /// current with the open-end sentinel.
    pub fn arb_version_chains() -> impl Strategy<Value = RowSet> {
        prop::collection::vec(prop::collection::vec(1i64..90, 1..5), 1..6).prop_map(|keys| {
            let mut rows = fixtures::dimension_table();
            for (k, lengths) in keys.iter().enumerate() {
                let mut start = 0;
                for (i, len) in lengths.iter().enumerate() {
                    let last = i + 1 == lengths.len();
                    let end = if last { ts(9999, 12, 31) } else { day(start + len) };
                    rows.rows.push(fixtures::version_row(
                        CellValue::Int(k as i64),
                        "name",
                        day(start),
                        Some(end),
                        last,
                        day(start),
                    ));
                    start += len;
                }
            }
            rows
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built configurations and environments.

    use super::*;

    /// Columns of the `DimCustomer` fixture table.
    pub const DIMENSION_COLUMNS: [&str; 6] = [
        "CustomerID",
        "Name",
        "Version_Begin_Date",
        "Version_End_Date",
        "Is_Current",
        "Load_Timestamp",
    ];

    pub fn default_config() -> ValidationConfig {
        ValidationConfig::warehouse_defaults()
            .unwrap_or_else(|e| panic!("warehouse defaults must be valid: {e}"))
    }

    /// `CustomerID` is the single business key of `DimCustomer`.
    pub fn customer_key() -> BusinessKey {
        BusinessKey::new("DimCustomer", vec!["CustomerID".to_string()])
    }

    /// Column specs for `DimCustomer`.
    pub fn customer_specs() -> Vec<ColumnSpec> {
        vec![
            spec("DimCustomer", "CustomerID", "Y", "int", "PRIMARY KEY"),
            spec("DimCustomer", "Name", "N", "nvarchar", "NULL"),
            spec("DimCustomer", "City", "", "nvarchar", "NULL"),
        ]
    }

    pub fn spec(
        table: &str,
        column: &str,
        business_key: &str,
        data_type: &str,
        constraints: &str,
    ) -> ColumnSpec {
        ColumnSpec {
            table_name: table.to_string(),
            column_name: column.to_string(),
            business_key_flag: business_key.to_string(),
            expected_data_type: Some(data_type.to_string()),
            expected_constraints: Some(constraints.to_string()),
        }
    }

    /// `Customer` → `Customer` → `DimCustomer` with ledger and view.
    pub fn customer_mapping() -> TableMapping {
        TableMapping {
            source_table: "Customer".to_string(),
            stage_table: Some("Customer".to_string()),
            target_table: "DimCustomer".to_string(),
            deleted_table: Some("Customer_Deleted".to_string()),
            target_view: Some("vw_DimCustomer".to_string()),
        }
    }

    /// Empty `DimCustomer` row set.
    pub fn dimension_table() -> RowSet {
        RowSet::new(DIMENSION_COLUMNS)
    }

    /// One `DimCustomer` row.
    pub fn version_row(
        key: CellValue,
        name: &str,
        begin: Timestamp,
        end: Option<Timestamp>,
        current: bool,
        load: Timestamp,
    ) -> Vec<CellValue> {
        vec![
            key,
            CellValue::text(name),
            CellValue::Timestamp(begin),
            end.into(),
            CellValue::text(if current { "1" } else { "0" }),
            CellValue::Timestamp(load),
        ]
    }

    /// Three customers present in Source, Stage, and Target.
    ///
    /// Stage and Target carry `Is_Current`; Target also holds the deletion
    /// ledger `Customer_Deleted` and the view `vw_DimCustomer`.
    ///
    /// Every check family passes against this warehouse.
    pub struct Warehouse {
        pub source: InMemoryDatabase,
        pub stage: InMemoryDatabase,
        pub target: InMemoryDatabase,
    }

    impl Warehouse {
        pub fn clean() -> Self {
            let source = InMemoryDatabase::new("SOURCE_DB");
            let stage = InMemoryDatabase::new("STAGE_DB");
            let target = InMemoryDatabase::new("TARGET_DB");

            let customers = [(1, "Alice", "Paris"), (2, "Bob", "Rome"), (3, "Cara", "Oslo")];
            let mut upstream = RowSet::new(["CustomerID", "Name", "City"]);
            for (id, name, city) in customers {
                upstream
                    .rows
                    .push(vec![CellValue::Int(id), CellValue::text(name), CellValue::text(city)]);
            }
            let upstream_columns = || {
                vec![
                    ColumnMetadata::new("Customer", "CustomerID", "int", false)
                        .with_constraint("PRIMARY KEY"),
                    ColumnMetadata::new("Customer", "Name", "nvarchar", true),
                    ColumnMetadata::new("Customer", "City", "nvarchar", true),
                ]
            };
            source
                .insert_table("Customer", upstream_columns(), upstream.clone())
                .unwrap_or_else(|e| panic!("source fixture: {e}"));

            let mut staged = RowSet::new(["CustomerID", "Name", "City", "Is_Current"]);
            for mut row in upstream.rows {
                row.push(CellValue::text("1"));
                staged.rows.push(row);
            }
            let mut stage_columns = upstream_columns();
            stage_columns.push(ColumnMetadata::new("Customer", "Is_Current", "bit", false));
            stage
                .insert_table("Customer", stage_columns, staged)
                .unwrap_or_else(|e| panic!("stage fixture: {e}"));

            let mut dim = RowSet::new([
                "CustomerID",
                "Name",
                "City",
                "Version_Begin_Date",
                "Version_End_Date",
                "Is_Current",
                "Load_Timestamp",
            ]);
            for (id, name, city) in customers {
                dim.rows.push(vec![
                    CellValue::Int(id),
                    CellValue::text(name),
                    CellValue::text(city),
                    CellValue::Timestamp(ts(2024, 1, 1)),
                    CellValue::Timestamp(ts(9999, 12, 31)),
                    CellValue::text("1"),
                    CellValue::Timestamp(ts(2024, 1, 1)),
                ]);
            }
            let dim_columns = vec![
                ColumnMetadata::new("DimCustomer", "CustomerID", "int", false)
                    .with_constraint("PRIMARY KEY"),
                ColumnMetadata::new("DimCustomer", "Name", "nvarchar", true),
                ColumnMetadata::new("DimCustomer", "City", "nvarchar", true),
                ColumnMetadata::new("DimCustomer", "Version_Begin_Date", "datetime", false),
                ColumnMetadata::new("DimCustomer", "Version_End_Date", "datetime", false),
                ColumnMetadata::new("DimCustomer", "Is_Current", "bit", false),
                ColumnMetadata::new("DimCustomer", "Load_Timestamp", "datetime", false),
            ];
            target
                .insert_table("DimCustomer", dim_columns, dim)
                .unwrap_or_else(|e| panic!("target fixture: {e}"));

            let ledger = RowSet::new(["CustomerID", "Name", "CreatedDTM"]).with_row(vec![
                CellValue::Int(4),
                CellValue::text("Dan"),
                CellValue::Timestamp(ts(2024, 3, 1)),
            ]);
            target
                .insert_rows("Customer_Deleted", ledger)
                .unwrap_or_else(|e| panic!("ledger fixture: {e}"));

            let view = RowSet::new(["CustomerID", "Name", "City"]);
            target
                .insert_rows("vw_DimCustomer", view)
                .unwrap_or_else(|e| panic!("view fixture: {e}"));

            Self {
                source,
                stage,
                target,
            }
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for SCDGUARD results and reports.

    use super::*;

    /// Assert that a result is Ok.
    pub fn assert_ok<T: std::fmt::Debug>(result: &ScdResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    }

    /// Assert that a result is Err.
    pub fn assert_err<T: std::fmt::Debug>(result: &ScdResult<T>) {
        assert!(result.is_err(), "Expected Err, got {:?}", result);
    }

    /// Assert that a result is a configuration error.
    pub fn assert_config_error<T: std::fmt::Debug>(result: &ScdResult<T>) {
        match result {
            Err(ScdError::Config(_)) => {}
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    /// Assert that a result names a missing column.
    pub fn assert_missing_column<T: std::fmt::Debug>(result: &ScdResult<T>, column: &str) {
        match result {
            Err(ScdError::Config(ConfigError::MissingColumn { column: c, .. })) => {
                assert_eq!(c, column, "Missing column mismatch");
            }
            other => panic!("Expected MissingColumn({column}), got {:?}", other),
        }
    }

    /// Assert that a result is a data-access error.
    pub fn assert_data_access_error<T: std::fmt::Debug>(result: &ScdResult<T>) {
        match result {
            Err(ScdError::DataAccess(_)) => {}
            other => panic!("Expected DataAccessError, got {:?}", other),
        }
    }

    /// Assert that a result is the aggregate checks-failed error.
    pub fn assert_checks_failed<T: std::fmt::Debug>(result: &ScdResult<T>) -> Vec<String> {
        match result {
            Err(ScdError::Validation(ValidationError::ChecksFailed { failures })) => {
                failures.clone()
            }
            other => panic!("Expected ChecksFailed, got {:?}", other),
        }
    }

    /// Assert that a report passed with no details.
    pub fn assert_passed(report: &CheckReport) {
        assert!(
            report.passed(),
            "Expected {} to pass, got {}",
            report.check,
            report.summary()
        );
        assert_eq!(report.issue_count, 0);
    }

    /// Assert that a report failed with exactly `issues` findings.
    pub fn assert_failed_with(report: &CheckReport, issues: usize) {
        assert_eq!(
            report.status,
            CheckStatus::Fail,
            "Expected {} to fail, got {}",
            report.check,
            report.summary()
        );
        assert_eq!(
            report.issue_count, issues,
            "Issue count mismatch for {}",
            report.check
        );
    }

    /// Assert that a report belongs to the given check.
    pub fn assert_check(report: &CheckReport, check: CheckKind) {
        assert_eq!(report.check, check, "Check kind mismatch");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_config_is_valid() {
        assertions::assert_ok(&fixtures::default_config().validate());
    }

    #[test]
    fn test_clean_warehouse_tables() {
        let warehouse = fixtures::Warehouse::clean();
        let source = SnapshotReader::new(&warehouse.source);
        let target = SnapshotReader::new(&warehouse.target);
        assert_eq!(source.count("Customer").unwrap(), 3);
        assert_eq!(target.count("DimCustomer").unwrap(), 3);
        assert_eq!(target.count("Customer_Deleted").unwrap(), 1);
        assert_eq!(target.column_names("vw_DimCustomer").unwrap().len(), 3);
    }

    #[test]
    fn test_customer_specs_mark_single_key() {
        let keys: Vec<_> = fixtures::customer_specs()
            .into_iter()
            .filter(ColumnSpec::is_business_key)
            .map(|s| s.column_name)
            .collect();
        assert_eq!(keys, vec!["CustomerID".to_string()]);
    }

    #[test]
    fn test_assertion_missing_column() {
        let result: ScdResult<()> = Err(ConfigError::MissingColumn {
            table: "DimCustomer".to_string(),
            column: "Is_Current".to_string(),
        }
        .into());
        assertions::assert_config_error(&result);
        assertions::assert_missing_column(&result, "Is_Current");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_intervals_are_positive(interval in generators::arb_interval()) {
            prop_assert!(interval.begin < interval.end);
        }

        #[test]
        fn prop_generated_identifiers_are_safe(name in generators::arb_identifier()) {
            prop_assert!(scdguard_core::SafeIdent::parse(&name).is_ok());
        }

        #[test]
        fn prop_version_chains_have_rows(rows in generators::arb_version_chains()) {
            prop_assert!(!rows.is_empty());
            prop_assert!(rows.iter().all(|r| r.len() == fixtures::DIMENSION_COLUMNS.len()));
        }
    }
}
