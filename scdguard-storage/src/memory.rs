//! In-memory database snapshots.

use crate::sql::{QueryKind, SqlQuery, METADATA_COLUMNS, ROW_COUNT_COLUMN};
use crate::Database;
use scdguard_core::{
    CellValue, ColumnMetadata, ConfigError, DataAccessError, RowSet, SafeIdent, ScdError,
    ScdResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// FIXTURES
// ============================================================================

/// One environment's tables as a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseFixture {
    pub database: String,
    #[serde(default)]
    pub tables: Vec<TableFixture>,
}

/// One table of a fixture: catalog metadata plus rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableFixture {
    pub name: String,
    pub columns: Vec<FixtureColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureColumn {
    pub name: String,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub constraint: Option<String>,
}

fn default_data_type() -> String {
    "nvarchar".to_string()
}

fn default_nullable() -> bool {
    true
}

// ============================================================================
// IN-MEMORY DATABASE
// ============================================================================

#[derive(Debug, Clone)]
struct StoredTable {
    columns: Vec<ColumnMetadata>,
    rows: RowSet,
}

/// An environment held entirely in memory.
///
/// Table lookup is case-insensitive, and an unqualified name matches a
/// schema-qualified table with the same base name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    name: String,
    tables: Arc<RwLock<HashMap<String, StoredTable>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryDatabase {
    /// Create an empty database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a database from a parsed fixture.
    pub fn from_fixture(fixture: DatabaseFixture) -> ScdResult<Self> {
        let db = Self::new(fixture.database);
        for table in fixture.tables {
            let base = SafeIdent::parse(&table.name)?;
            let columns = table
                .columns
                .iter()
                .map(|c| ColumnMetadata {
                    table: base.unqualified().to_string(),
                    column: c.name.clone(),
                    data_type: c.data_type.clone(),
                    is_nullable: c.nullable,
                    constraint_def: c.constraint.clone(),
                })
                .collect::<Vec<_>>();
            let mut rows = RowSet::new(table.columns.iter().map(|c| c.name.clone()));
            for row in table.rows {
                rows.push(&table.name, row)?;
            }
            db.insert_table(&table.name, columns, rows)?;
        }
        Ok(db)
    }

    /// Build a database from fixture JSON text.
    pub fn from_json(json: &str) -> ScdResult<Self> {
        let fixture: DatabaseFixture =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidValue {
                field: "fixture".to_string(),
                value: json.chars().take(40).collect(),
                reason: e.to_string(),
            })?;
        Self::from_fixture(fixture)
    }

    /// Insert or replace a table.
    ///
    /// The row set's columns must match the metadata columns in order.
    pub fn insert_table(
        &self,
        name: &str,
        columns: Vec<ColumnMetadata>,
        rows: RowSet,
    ) -> ScdResult<()> {
        let ident = SafeIdent::parse(name)?;
        let names_match = columns.len() == rows.columns.len()
            && columns
                .iter()
                .zip(&rows.columns)
                .all(|(meta, col)| meta.column.eq_ignore_ascii_case(col));
        if !names_match {
            return Err(DataAccessError::MalformedRow {
                table: name.to_string(),
                reason: "row set columns do not match column metadata".to_string(),
            }
            .into());
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(DataAccessError::MalformedRow {
                table: name.to_string(),
                reason: format!("expected {} values, got {}", columns.len(), bad.len()),
            }
            .into());
        }

        let mut tables = self.tables.write().map_err(|_| self.poisoned(name))?;
        tables.insert(key(ident.as_str()), StoredTable { columns, rows });
        Ok(())
    }

    /// Insert a table whose columns are all nullable `nvarchar`.
    pub fn insert_rows(&self, name: &str, rows: RowSet) -> ScdResult<()> {
        let ident = SafeIdent::parse(name)?;
        let columns = rows
            .columns
            .iter()
            .map(|c| ColumnMetadata::new(ident.unqualified(), c.clone(), "nvarchar", true))
            .collect();
        self.insert_table(name, columns, rows)
    }

    /// Make every query against `table` fail with `reason`.
    pub fn fail_queries_on(&self, table: &str, reason: impl Into<String>) -> ScdResult<()> {
        let ident = SafeIdent::parse(table)?;
        let mut failures = self.failures.write().map_err(|_| self.poisoned(table))?;
        failures.insert(key(ident.as_str()), reason.into());
        Ok(())
    }

    /// Names of stored tables, lowercased.
    pub fn table_names(&self) -> ScdResult<Vec<String>> {
        let tables = self.tables.read().map_err(|_| self.poisoned("*"))?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn find(&self, table: &SafeIdent) -> ScdResult<Option<StoredTable>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| self.poisoned(table.as_str()))?;
        if let Some(found) = tables.get(&key(table.as_str())) {
            return Ok(Some(found.clone()));
        }
        if table.as_str().contains('.') {
            return Ok(None);
        }
        let wanted = key(table.as_str());
        Ok(tables
            .iter()
            .find(|(name, _)| name.rsplit('.').next() == Some(wanted.as_str()))
            .map(|(_, stored)| stored.clone()))
    }

    fn injected_failure(&self, query: &SqlQuery) -> ScdResult<()> {
        let table = query.kind().table();
        let failures = self
            .failures
            .read()
            .map_err(|_| self.poisoned(table.as_str()))?;
        let reason = failures
            .get(&key(table.as_str()))
            .or_else(|| failures.get(&key(table.unqualified())));
        match reason {
            Some(reason) => Err(DataAccessError::QueryFailed {
                database: self.name.clone(),
                query: query.text().to_string(),
                reason: reason.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn unknown(&self, table: &SafeIdent) -> ScdError {
        DataAccessError::UnknownTable {
            database: self.name.clone(),
            table: table.to_string(),
        }
        .into()
    }

    fn poisoned(&self, table: &str) -> ScdError {
        DataAccessError::QueryFailed {
            database: self.name.clone(),
            query: table.to_string(),
            reason: "snapshot lock poisoned".to_string(),
        }
        .into()
    }
}

impl Database for InMemoryDatabase {
    fn database_name(&self) -> &str {
        &self.name
    }

    fn execute_query(&self, query: &SqlQuery) -> ScdResult<RowSet> {
        tracing::debug!(database = %self.name, query = %query, "executing query");
        self.injected_failure(query)?;

        match query.kind() {
            QueryKind::ColumnMetadata { table } => {
                let mut result = RowSet::new(METADATA_COLUMNS);
                if let Some(stored) = self.find(table)? {
                    for column in stored.columns {
                        let nullable = if column.is_nullable { "YES" } else { "NO" };
                        result.push(
                            table.as_str(),
                            vec![
                                CellValue::Text(column.table),
                                CellValue::Text(column.column),
                                CellValue::Text(column.data_type),
                                CellValue::text(nullable),
                                column.constraint_def.into(),
                            ],
                        )?;
                    }
                }
                Ok(result)
            }
            QueryKind::TableScan { table } => self
                .find(table)?
                .map(|stored| stored.rows)
                .ok_or_else(|| self.unknown(table)),
            QueryKind::RowCount { table } => {
                let stored = self.find(table)?.ok_or_else(|| self.unknown(table))?;
                let count = i64::try_from(stored.rows.len()).unwrap_or(i64::MAX);
                Ok(RowSet::new([ROW_COUNT_COLUMN]).with_row(vec![CellValue::Int(count)]))
            }
        }
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "database": "SOURCE_DB",
        "tables": [
            {
                "name": "src.Customer",
                "columns": [
                    {"name": "CustomerID", "data_type": "int", "nullable": false},
                    {"name": "Name"}
                ],
                "rows": [[1, "ann"], [2, null]]
            }
        ]
    }"#;

    #[test]
    fn test_from_json_loads_tables() {
        let db = InMemoryDatabase::from_json(FIXTURE).unwrap();
        assert_eq!(db.database_name(), "SOURCE_DB");
        let rows = db
            .execute_query(&SqlQuery::table_scan("src.Customer").unwrap())
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.rows[1][1].is_null());
    }

    #[test]
    fn test_lookup_ignores_case_and_schema() {
        let db = InMemoryDatabase::from_json(FIXTURE).unwrap();
        assert!(db
            .execute_query(&SqlQuery::table_scan("SRC.CUSTOMER").unwrap())
            .is_ok());
        assert!(db
            .execute_query(&SqlQuery::table_scan("Customer").unwrap())
            .is_ok());
        assert!(db
            .execute_query(&SqlQuery::table_scan("other.Customer").unwrap())
            .is_err());
    }

    #[test]
    fn test_fixture_with_bad_arity_rejected() {
        let json = r#"{"database": "X", "tables": [
            {"name": "t", "columns": [{"name": "a"}], "rows": [[1, 2]]}
        ]}"#;
        let err = InMemoryDatabase::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            ScdError::DataAccess(DataAccessError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_unknown_fixture_field_rejected() {
        let json = r#"{"database": "X", "schema": "dbo"}"#;
        assert!(matches!(
            InMemoryDatabase::from_json(json).unwrap_err(),
            ScdError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_table_scan_fails_but_metadata_is_empty() {
        let db = InMemoryDatabase::new("DW");
        let scan = db.execute_query(&SqlQuery::table_scan("Missing").unwrap());
        assert!(matches!(
            scan.unwrap_err(),
            ScdError::DataAccess(DataAccessError::UnknownTable { .. })
        ));
        let meta = db
            .execute_query(&SqlQuery::column_metadata("Missing").unwrap())
            .unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn test_injected_failure_carries_query() {
        let db = InMemoryDatabase::from_json(FIXTURE).unwrap();
        db.fail_queries_on("src.Customer", "connection reset").unwrap();
        let err = db
            .execute_query(&SqlQuery::row_count("src.Customer").unwrap())
            .unwrap_err();
        match err {
            ScdError::DataAccess(DataAccessError::QueryFailed { query, reason, .. }) => {
                assert!(query.contains("COUNT(*)"));
                assert_eq!(reason, "connection reset");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_insert_rejects_mismatched_columns() {
        let db = InMemoryDatabase::new("DW");
        let err = db
            .insert_table(
                "Dim",
                vec![ColumnMetadata::new("Dim", "a", "int", true)],
                RowSet::new(["b"]),
            )
            .unwrap_err();
        assert!(matches!(err, ScdError::DataAccess(_)));
    }

    #[test]
    fn test_insert_rows_defaults_metadata() {
        let db = InMemoryDatabase::new("DW");
        db.insert_rows("dw.Dim", RowSet::new(["a", "b"])).unwrap();
        let meta = db
            .execute_query(&SqlQuery::column_metadata("dw.Dim").unwrap())
            .unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.rows[0][3], CellValue::text("YES"));
        assert_eq!(db.table_names().unwrap(), vec!["dw.dim"]);
    }
}
