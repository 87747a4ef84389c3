//! The trusted query boundary.
//!
//! Every statement sent to a database collaborator is built here, from
//! identifiers that already passed [`SafeIdent::parse`]. No other module
//! formats SQL text.

use scdguard_core::{SafeIdent, ScdResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names of a metadata query result.
pub const METADATA_COLUMNS: [&str; 5] = [
    "TABLE_NAME",
    "COLUMN_NAME",
    "DATA_TYPE",
    "IS_NULLABLE",
    "CONSTRAINT_DEF",
];

/// Column name of a row-count query result.
pub const ROW_COUNT_COLUMN: &str = "ROW_COUNT";

/// What a query asks for, independent of its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Catalog description of every column of a table
    ColumnMetadata { table: SafeIdent },
    /// Every row of a table
    TableScan { table: SafeIdent },
    /// Number of rows in a table
    RowCount { table: SafeIdent },
}

impl QueryKind {
    pub fn table(&self) -> &SafeIdent {
        match self {
            QueryKind::ColumnMetadata { table }
            | QueryKind::TableScan { table }
            | QueryKind::RowCount { table } => table,
        }
    }
}

/// A query built from allow-listed identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlQuery {
    kind: QueryKind,
    text: String,
}

impl SqlQuery {
    /// Catalog query returning [`METADATA_COLUMNS`] in ordinal order.
    pub fn column_metadata(table: &str) -> ScdResult<Self> {
        let table = SafeIdent::parse(table)?;
        let schema_filter = match table.as_str().split_once('.') {
            Some((schema, _)) => format!(" AND c.TABLE_SCHEMA = '{}'", schema),
            None => String::new(),
        };
        let text = format!(
            "SELECT c.TABLE_NAME, c.COLUMN_NAME, c.DATA_TYPE, c.IS_NULLABLE, \
             STRING_AGG(tc.CONSTRAINT_TYPE, ', ') AS CONSTRAINT_DEF \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             LEFT JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
             ON k.TABLE_SCHEMA = c.TABLE_SCHEMA AND k.TABLE_NAME = c.TABLE_NAME \
             AND k.COLUMN_NAME = c.COLUMN_NAME \
             LEFT JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             ON tc.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
             WHERE c.TABLE_NAME = '{}'{} \
             GROUP BY c.TABLE_NAME, c.COLUMN_NAME, c.DATA_TYPE, c.IS_NULLABLE, c.ORDINAL_POSITION \
             ORDER BY c.ORDINAL_POSITION",
            table.unqualified(),
            schema_filter
        );
        Ok(Self {
            kind: QueryKind::ColumnMetadata { table },
            text,
        })
    }

    /// Full scan of a table.
    pub fn table_scan(table: &str) -> ScdResult<Self> {
        let table = SafeIdent::parse(table)?;
        let text = format!("SELECT * FROM {}", table.quoted());
        Ok(Self {
            kind: QueryKind::TableScan { table },
            text,
        })
    }

    /// Row count of a table, returned under [`ROW_COUNT_COLUMN`].
    pub fn row_count(table: &str) -> ScdResult<Self> {
        let table = SafeIdent::parse(table)?;
        let text = format!(
            "SELECT COUNT(*) AS {} FROM {}",
            ROW_COUNT_COLUMN,
            table.quoted()
        );
        Ok(Self {
            kind: QueryKind::RowCount { table },
            text,
        })
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scdguard_core::{ConfigError, ScdError};

    #[test]
    fn test_table_scan_quotes_each_part() {
        let query = SqlQuery::table_scan("dbo.DimCustomer").unwrap();
        assert_eq!(query.text(), "SELECT * FROM [dbo].[DimCustomer]");
        assert_eq!(query.kind().table().as_str(), "dbo.DimCustomer");
    }

    #[test]
    fn test_row_count_text() {
        let query = SqlQuery::row_count("Customer").unwrap();
        assert_eq!(query.text(), "SELECT COUNT(*) AS ROW_COUNT FROM [Customer]");
    }

    #[test]
    fn test_metadata_filters_schema_when_qualified() {
        let query = SqlQuery::column_metadata("stg.Customer").unwrap();
        assert!(query.text().contains("c.TABLE_NAME = 'Customer'"));
        assert!(query.text().contains("c.TABLE_SCHEMA = 'stg'"));

        let bare = SqlQuery::column_metadata("Customer").unwrap();
        assert!(!bare.text().contains("TABLE_SCHEMA = '"));
    }

    #[test]
    fn test_unsafe_table_never_reaches_text() {
        let err = SqlQuery::table_scan("Customer; DROP TABLE x").unwrap_err();
        assert!(matches!(
            err,
            ScdError::Config(ConfigError::UnsafeIdentifier { .. })
        ));
        assert!(SqlQuery::column_metadata("x' OR '1'='1").is_err());
    }
}
