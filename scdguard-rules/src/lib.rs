//! SCDGUARD Rules - Validation Engine
//!
//! Pure checks over row sets and column metadata fetched by a
//! [`scdguard_storage::Database`]. Every check yields a
//! [`scdguard_core::CheckReport`]; an invariant violation is data, not an
//! error. Errors are reserved for configuration and data-access faults.

pub mod business_key;
pub mod lifecycle;
pub mod metadata;
pub mod normalize;
pub mod profile;
pub mod reconcile;
pub mod scd;

pub use business_key::{build_key_expression, render_key_value, BusinessKeyResolver, KeyColumns};
pub use lifecycle::LifecycleValidator;
pub use metadata::{ColumnComparison, ColumnPresence, MetadataDiffer};
pub use normalize::{normalize_constraints, ConstraintOrigin, NormalizedConstraintSet};
pub use reconcile::{
    common_columns, completeness, scd_completeness, CurrentFilter, ReconciliationPair, Reconciler,
};
pub use scd::{intervals_overlap, ScdChecker};

use scdguard_core::RowSet;

/// One scanned table, labelled with where it came from.
#[derive(Debug, Clone, Copy)]
pub struct TableSnapshot<'a> {
    pub database: &'a str,
    pub table: &'a str,
    pub rows: &'a RowSet,
}

impl<'a> TableSnapshot<'a> {
    pub fn new(database: &'a str, table: &'a str, rows: &'a RowSet) -> Self {
        Self {
            database,
            table,
            rows,
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;
    use scdguard_core::{BusinessKey, CellValue, ValidationConfig, VersionInterval};

    fn day(offset: i64) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t + Duration::days(offset))
            .unwrap()
    }

    fn interval() -> impl Strategy<Value = VersionInterval> {
        (0i64..400, 1i64..200).prop_map(|(start, len)| VersionInterval::new(day(start), day(start + len)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Overlap is symmetric.
        #[test]
        fn prop_overlap_symmetric(a in interval(), b in interval()) {
            prop_assert_eq!(intervals_overlap(&a, &b), intervals_overlap(&b, &a));
        }

        /// Disjoint chains of versions never overlap.
        #[test]
        fn prop_chained_versions_pass(lengths in prop::collection::vec(1i64..60, 1..8)) {
            let mut rows = RowSet::new(["Id", "Version_Begin_Date", "Version_End_Date", "Is_Current"]);
            let mut start = 0;
            for (i, len) in lengths.iter().enumerate() {
                let last = i + 1 == lengths.len();
                rows.push("Dim", vec![
                    CellValue::text("K"),
                    CellValue::Timestamp(day(start)),
                    CellValue::Timestamp(day(start + len)),
                    CellValue::text(if last { "1" } else { "0" }),
                ]).unwrap();
                start += len;
            }
            let checker = ScdChecker::new(ValidationConfig::warehouse_defaults().unwrap()).unwrap();
            let key = BusinessKey::new("Dim", vec!["Id".to_string()]);
            let snapshot = TableSnapshot::new("DW", "Dim", &rows);
            prop_assert!(checker.check_overlaps(&snapshot, &key).unwrap().passed());
            prop_assert!(checker.check_single_current(&snapshot, &key).unwrap().passed());
            prop_assert!(checker.check_historical_ordering(&snapshot, &key).unwrap().passed());
        }
    }
}
