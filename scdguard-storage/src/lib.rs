//! SCDGUARD Storage - Database Collaborator Seam
//!
//! Defines how the rule engine reaches an environment (Source, Stage,
//! Target): a minimal query trait, the one module allowed to build SQL
//! text, typed snapshot reads, and an in-memory implementation for tests
//! and offline runs.

pub mod memory;
pub mod snapshot;
pub mod sql;

pub use memory::{DatabaseFixture, FixtureColumn, InMemoryDatabase, TableFixture};
pub use snapshot::SnapshotReader;
pub use sql::{QueryKind, SqlQuery, METADATA_COLUMNS, ROW_COUNT_COLUMN};

use scdguard_core::{RowSet, ScdResult};

// ============================================================================
// DATABASE TRAIT
// ============================================================================

/// One environment's database connection.
///
/// Implementations own their connection; a check never shares one with
/// another check running at the same time.
pub trait Database: Send + Sync {
    /// Environment label used in every report row.
    fn database_name(&self) -> &str;

    /// Run a query and return its rows in order.
    ///
    /// Failures are returned as `DataAccessError`; no retry happens here.
    fn execute_query(&self, query: &SqlQuery) -> ScdResult<RowSet>;
}

impl<D: Database + ?Sized> Database for &D {
    fn database_name(&self) -> &str {
        (**self).database_name()
    }

    fn execute_query(&self, query: &SqlQuery) -> ScdResult<RowSet> {
        (**self).execute_query(query)
    }
}

impl<D: Database + ?Sized> Database for std::sync::Arc<D> {
    fn database_name(&self) -> &str {
        (**self).database_name()
    }

    fn execute_query(&self, query: &SqlQuery) -> ScdResult<RowSet> {
        (**self).execute_query(query)
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use scdguard_core::CellValue;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The count query agrees with the number of scanned rows.
        #[test]
        fn prop_count_matches_scan(values in prop::collection::vec(any::<i64>(), 0..50)) {
            let db = InMemoryDatabase::new("PROP");
            let mut rows = RowSet::new(["v"]);
            for v in &values {
                rows.push("t", vec![CellValue::Int(*v)]).unwrap();
            }
            db.insert_rows("t", rows).unwrap();

            let reader = SnapshotReader::new(&db);
            prop_assert_eq!(reader.count("t").unwrap(), values.len() as u64);
            prop_assert_eq!(reader.scan("t").unwrap().len(), values.len());
        }
    }
}
