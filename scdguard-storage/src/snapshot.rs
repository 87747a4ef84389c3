//! Typed reads over a [`Database`].

use crate::sql::{SqlQuery, ROW_COUNT_COLUMN};
use crate::Database;
use scdguard_core::{CellValue, ColumnMetadata, DataAccessError, RowSet, ScdResult};

/// Turns raw query results into model types for one environment.
pub struct SnapshotReader<'a, D: Database + ?Sized> {
    db: &'a D,
}

impl<'a, D: Database + ?Sized> SnapshotReader<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self { db }
    }

    pub fn database_name(&self) -> &str {
        self.db.database_name()
    }

    /// Catalog metadata for every column of `table`, in ordinal order.
    ///
    /// An unknown table yields an empty list, as the catalog query does.
    pub fn columns(&self, table: &str) -> ScdResult<Vec<ColumnMetadata>> {
        let query = SqlQuery::column_metadata(table)?;
        let rows = self.db.execute_query(&query)?;

        let table_idx = rows.require_column(table, "TABLE_NAME")?;
        let column_idx = rows.require_column(table, "COLUMN_NAME")?;
        let type_idx = rows.require_column(table, "DATA_TYPE")?;
        let nullable_idx = rows.require_column(table, "IS_NULLABLE")?;
        let constraint_idx = rows.column_index("CONSTRAINT_DEF");

        rows.iter()
            .map(|row| -> ScdResult<ColumnMetadata> {
                let text = |idx: usize, what: &str| {
                    row[idx].render().ok_or_else(|| DataAccessError::MalformedRow {
                        table: table.to_string(),
                        reason: format!("NULL {} in catalog row", what),
                    })
                };
                Ok(ColumnMetadata {
                    table: text(table_idx, "table name")?,
                    column: text(column_idx, "column name")?,
                    data_type: text(type_idx, "data type")?,
                    is_nullable: parse_nullable(&row[nullable_idx]),
                    constraint_def: constraint_idx
                        .and_then(|idx| row[idx].render())
                        .filter(|s| !s.trim().is_empty()),
                })
            })
            .collect()
    }

    /// Column names of `table`, in ordinal order.
    pub fn column_names(&self, table: &str) -> ScdResult<Vec<String>> {
        Ok(self
            .columns(table)?
            .into_iter()
            .map(|c| c.column)
            .collect())
    }

    /// Every row of `table`.
    pub fn scan(&self, table: &str) -> ScdResult<RowSet> {
        let query = SqlQuery::table_scan(table)?;
        self.db.execute_query(&query)
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> ScdResult<u64> {
        let query = SqlQuery::row_count(table)?;
        let rows = self.db.execute_query(&query)?;
        let idx = rows.require_column(table, ROW_COUNT_COLUMN)?;
        let count = rows.iter().next().and_then(|row| row[idx].as_count());
        count.ok_or_else(|| {
            DataAccessError::MalformedRow {
                table: table.to_string(),
                reason: "row count query returned no count".to_string(),
            }
            .into()
        })
    }
}

fn parse_nullable(value: &CellValue) -> bool {
    match value {
        CellValue::Bool(b) => *b,
        CellValue::Int(i) => *i != 0,
        CellValue::Text(s) => matches!(
            s.trim().to_ascii_uppercase().as_str(),
            "YES" | "Y" | "1" | "TRUE"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryDatabase;

    fn db() -> InMemoryDatabase {
        let db = InMemoryDatabase::new("STAGE");
        db.insert_table(
            "stg.Customer",
            vec![
                ColumnMetadata::new("Customer", "CustomerID", "int", false)
                    .with_constraint("PRIMARY KEY"),
                ColumnMetadata::new("Customer", "Name", "nvarchar", true),
            ],
            RowSet::new(["CustomerID", "Name"])
                .with_row(vec![CellValue::Int(1), "ann".into()])
                .with_row(vec![CellValue::Int(2), CellValue::Null]),
        )
        .unwrap();
        db
    }

    #[test]
    fn test_columns_reads_catalog() {
        let db = db();
        let reader = SnapshotReader::new(&db);
        let columns = reader.columns("stg.Customer").unwrap();
        assert_eq!(columns.len(), 2);
        assert!(!columns[0].is_nullable);
        assert_eq!(columns[0].constraint_def.as_deref(), Some("PRIMARY KEY"));
        assert!(columns[1].is_nullable);
        assert_eq!(columns[1].constraint_def, None);
    }

    #[test]
    fn test_column_names_in_order() {
        let db = db();
        let names = SnapshotReader::new(&db).column_names("stg.Customer").unwrap();
        assert_eq!(names, vec!["CustomerID", "Name"]);
    }

    #[test]
    fn test_scan_and_count_agree() {
        let db = db();
        let reader = SnapshotReader::new(&db);
        assert_eq!(reader.scan("stg.Customer").unwrap().len(), 2);
        assert_eq!(reader.count("stg.Customer").unwrap(), 2);
        assert_eq!(reader.database_name(), "STAGE");
    }

    #[test]
    fn test_count_of_empty_table_is_zero() {
        let db = InMemoryDatabase::new("TARGET");
        db.insert_rows("Empty", RowSet::new(["id"])).unwrap();
        assert_eq!(SnapshotReader::new(&db).count("Empty").unwrap(), 0);
    }

    #[test]
    fn test_count_without_a_row_is_malformed() {
        struct NoRows;
        impl Database for NoRows {
            fn database_name(&self) -> &str {
                "BROKEN"
            }
            fn execute_query(&self, _query: &SqlQuery) -> ScdResult<RowSet> {
                Ok(RowSet::new([ROW_COUNT_COLUMN]))
            }
        }
        let err = SnapshotReader::new(&NoRows).count("Customer").unwrap_err();
        assert!(matches!(
            err,
            scdguard_core::ScdError::DataAccess(DataAccessError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_nullable_literals() {
        assert!(parse_nullable(&CellValue::text("YES")));
        assert!(!parse_nullable(&CellValue::text("NO")));
        assert!(!parse_nullable(&CellValue::Null));
    }
}
