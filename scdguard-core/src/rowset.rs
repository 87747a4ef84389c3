//! Ordered, column-named row sets.

use crate::{CellValue, ConfigError, DataAccessError, ScdResult};
use serde::{Deserialize, Serialize};

/// A fetched result set: named columns and ordered rows.
///
/// Used both for raw table scans and for the offending-row detail attached
/// to check reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    /// Create an empty row set with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, rejecting rows whose arity does not match the columns.
    pub fn push(&mut self, table: &str, row: Vec<CellValue>) -> ScdResult<()> {
        if row.len() != self.columns.len() {
            return Err(DataAccessError::MalformedRow {
                table: table.to_string(),
                reason: format!(
                    "expected {} values, got {}",
                    self.columns.len(),
                    row.len()
                ),
            }
            .into());
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builder-style append for rows already known to fit.
    pub fn with_row(mut self, row: Vec<CellValue>) -> Self {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<CellValue>> {
        self.rows.iter()
    }

    /// Case-insensitive column lookup, the way SQL Server resolves names.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Like `column_index`, but a missing column is a configuration error.
    pub fn require_column(&self, table: &str, name: &str) -> ScdResult<usize> {
        self.column_index(name).ok_or_else(|| {
            ConfigError::MissingColumn {
                table: table.to_string(),
                column: name.to_string(),
            }
            .into()
        })
    }

    /// Resolve several columns at once, in order.
    pub fn require_columns(&self, table: &str, names: &[String]) -> ScdResult<Vec<usize>> {
        names
            .iter()
            .map(|name| self.require_column(table, name))
            .collect()
    }

    /// Project every row onto the given column indices.
    pub fn project(&self, indices: &[usize]) -> RowSet {
        RowSet {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Keep only the rows matching the predicate.
    pub fn filter_rows<F>(&self, mut keep: F) -> RowSet
    where
        F: FnMut(&[CellValue]) -> bool,
    {
        RowSet {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Keep only the rows at the given positions, in the given order.
    pub fn select_rows(&self, positions: &[usize]) -> RowSet {
        RowSet {
            columns: self.columns.clone(),
            rows: positions.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Read one cell by row position and column index.
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        &self.rows[row][column]
    }

    /// Read a column as timestamps, failing on a non-date cell.
    pub fn timestamps(
        &self,
        table: &str,
        column: usize,
    ) -> ScdResult<Vec<Option<crate::Timestamp>>> {
        self.rows
            .iter()
            .map(|row| {
                row[column].as_timestamp().map_err(|reason| {
                    DataAccessError::MalformedValue {
                        table: table.to_string(),
                        column: self.columns[column].clone(),
                        reason,
                    }
                    .into()
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScdError;

    fn people() -> RowSet {
        RowSet::new(["id", "Name", "age"])
            .with_row(vec![CellValue::Int(1), "ann".into(), CellValue::Int(30)])
            .with_row(vec![CellValue::Int(2), "bob".into(), CellValue::Null])
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let rows = people();
        assert_eq!(rows.column_index("NAME"), Some(1));
        assert_eq!(rows.column_index("missing"), None);
    }

    #[test]
    fn test_require_column_is_config_error() {
        let err = people().require_column("people", "email").unwrap_err();
        assert!(matches!(err, ScdError::Config(ConfigError::MissingColumn { .. })));
    }

    #[test]
    fn test_push_rejects_wrong_arity() {
        let mut rows = people();
        let err = rows.push("people", vec![CellValue::Int(3)]).unwrap_err();
        assert!(matches!(
            err,
            ScdError::DataAccess(DataAccessError::MalformedRow { .. })
        ));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_project_keeps_order() {
        let projected = people().project(&[2, 0]);
        assert_eq!(projected.columns, vec!["age", "id"]);
        assert_eq!(projected.rows[0], vec![CellValue::Int(30), CellValue::Int(1)]);
    }

    #[test]
    fn test_filter_rows() {
        let adults = people().filter_rows(|r| !r[2].is_null());
        assert_eq!(adults.len(), 1);
    }

    #[test]
    fn test_timestamps_reports_malformed_cell() {
        let rows = RowSet::new(["d"])
            .with_row(vec!["2024-01-01".into()])
            .with_row(vec!["soon".into()]);
        let err = rows.timestamps("t", 0).unwrap_err();
        assert!(matches!(
            err,
            ScdError::DataAccess(DataAccessError::MalformedValue { .. })
        ));
    }
}
