//! Business key resolution and rendering.

use scdguard_core::{BusinessKey, CellValue, ColumnSpec, ConfigError, RowSet, SafeIdent, ScdResult};

/// Width of the string cast applied to each composite-key component.
pub const KEY_COMPONENT_WIDTH: usize = 100;

/// Separator between composite-key components.
pub const KEY_SEPARATOR: &str = "_";

/// Resolves ordered business-key columns from the column specification.
pub struct BusinessKeyResolver<'a> {
    specs: &'a [ColumnSpec],
}

impl<'a> BusinessKeyResolver<'a> {
    pub fn new(specs: &'a [ColumnSpec]) -> Self {
        Self { specs }
    }

    /// Business-key columns of `table`, in specification order.
    ///
    /// Table names match case-insensitively, and a schema-qualified name
    /// matches a bare one with the same base name.
    pub fn resolve(&self, table: &str) -> Vec<String> {
        self.specs
            .iter()
            .filter(|spec| spec.is_business_key() && same_table(&spec.table_name, table))
            .map(|spec| spec.column_name.trim().to_string())
            .collect()
    }

    /// Like `resolve`, but an empty key is a configuration error.
    pub fn require(&self, table: &str) -> ScdResult<BusinessKey> {
        let columns = self.resolve(table);
        if columns.is_empty() {
            return Err(ConfigError::MissingBusinessKey {
                table: table.to_string(),
            }
            .into());
        }
        Ok(BusinessKey::new(table, columns))
    }
}

/// Compare table names ignoring case and, when either side is bare, schema.
pub fn same_table(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let either_bare = !a.contains('.') || !b.contains('.');
    either_bare && base_name(a).eq_ignore_ascii_case(base_name(b))
}

fn base_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Build the scalar SQL expression for a business key.
///
/// One column is returned verbatim. Several columns are cast to
/// `NVARCHAR(100)` and joined with `'_'` in the given order.
pub fn build_key_expression(columns: &[String]) -> ScdResult<String> {
    let idents = columns
        .iter()
        .map(|c| SafeIdent::parse(c))
        .collect::<ScdResult<Vec<_>>>()?;
    match idents.as_slice() {
        [] => Err(ConfigError::MissingBusinessKey {
            table: String::new(),
        }
        .into()),
        [single] => Ok(single.as_str().to_string()),
        many => Ok(many
            .iter()
            .map(|ident| format!("CAST({} AS NVARCHAR({}))", ident.quoted(), KEY_COMPONENT_WIDTH))
            .collect::<Vec<_>>()
            .join(&format!(" + '{}' + ", KEY_SEPARATOR))),
    }
}

/// Business-key column positions within one row set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumns {
    indices: Vec<usize>,
}

impl KeyColumns {
    /// Locate every key column in `rows`.
    pub fn bind(table: &str, rows: &RowSet, key: &BusinessKey) -> ScdResult<Self> {
        if key.is_empty() {
            return Err(ConfigError::MissingBusinessKey {
                table: table.to_string(),
            }
            .into());
        }
        Ok(Self {
            indices: rows.require_columns(table, &key.columns)?,
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Rendered key value of one row.
    pub fn value(&self, row: &[CellValue]) -> Option<String> {
        render_key_value(self.indices.iter().map(|&i| &row[i]))
    }
}

/// Render a key from its component cells.
///
/// Matches the SQL expression: a single component is its text; several are
/// truncated to the component width and joined. Any NULL component makes
/// the whole key NULL.
pub fn render_key_value<'c>(cells: impl ExactSizeIterator<Item = &'c CellValue>) -> Option<String> {
    if cells.len() == 1 {
        return cells.into_iter().next().and_then(CellValue::render);
    }
    let parts = cells
        .map(|cell| {
            cell.render()
                .map(|text| text.chars().take(KEY_COMPONENT_WIDTH).collect::<String>())
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(KEY_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scdguard_core::ScdError;

    fn spec(table: &str, column: &str, flag: &str) -> ColumnSpec {
        ColumnSpec {
            table_name: table.to_string(),
            column_name: column.to_string(),
            business_key_flag: flag.to_string(),
            expected_data_type: None,
            expected_constraints: None,
        }
    }

    fn specs() -> Vec<ColumnSpec> {
        vec![
            spec("Orders", "Region", "Y"),
            spec("Orders", "Amount", "N"),
            spec("orders", "OrderNo", "y"),
            spec("Customer", "CustomerID", "Y"),
        ]
    }

    #[test]
    fn test_resolve_keeps_specification_order() {
        let specs = specs();
        let resolver = BusinessKeyResolver::new(&specs);
        assert_eq!(resolver.resolve("ORDERS"), vec!["Region", "OrderNo"]);
        assert_eq!(resolver.resolve("dw.Orders"), vec!["Region", "OrderNo"]);
        assert!(resolver.resolve("Missing").is_empty());
    }

    #[test]
    fn test_require_without_key_is_config_error() {
        let specs = specs();
        let err = BusinessKeyResolver::new(&specs).require("Product").unwrap_err();
        assert!(matches!(
            err,
            ScdError::Config(ConfigError::MissingBusinessKey { .. })
        ));
    }

    #[test]
    fn test_same_table_schema_rules() {
        assert!(same_table("dbo.Customer", "Customer"));
        assert!(same_table("DBO.customer", "dbo.Customer"));
        assert!(!same_table("src.Customer", "stg.Customer"));
    }

    #[test]
    fn test_single_key_expression_is_verbatim() {
        assert_eq!(
            build_key_expression(&["CustomerID".to_string()]).unwrap(),
            "CustomerID"
        );
    }

    #[test]
    fn test_composite_key_expression_keeps_order() {
        let expr = build_key_expression(&["Region".to_string(), "OrderNo".to_string()]).unwrap();
        assert_eq!(
            expr,
            "CAST([Region] AS NVARCHAR(100)) + '_' + CAST([OrderNo] AS NVARCHAR(100))"
        );
        let reversed =
            build_key_expression(&["OrderNo".to_string(), "Region".to_string()]).unwrap();
        assert_ne!(expr, reversed);
    }

    #[test]
    fn test_key_expression_rejects_unsafe_column() {
        assert!(build_key_expression(&["a; DROP".to_string()]).is_err());
        assert!(build_key_expression(&[]).is_err());
    }

    #[test]
    fn test_render_composite_value() {
        let cells = [CellValue::text("EU"), CellValue::Int(42)];
        assert_eq!(render_key_value(cells.iter()).as_deref(), Some("EU_42"));
    }

    #[test]
    fn test_render_null_component_is_null() {
        let cells = [CellValue::text("EU"), CellValue::Null];
        assert_eq!(render_key_value(cells.iter()), None);
        assert_eq!(render_key_value([CellValue::Null].iter()), None);
    }

    #[test]
    fn test_render_truncates_components() {
        let long = "x".repeat(150);
        let cells = [CellValue::text(long.clone()), CellValue::text("b")];
        let rendered = render_key_value(cells.iter()).unwrap();
        assert_eq!(rendered.len(), KEY_COMPONENT_WIDTH + 2);

        // A single key column is not cast, so it is not truncated.
        let single = [CellValue::text(long.clone())];
        assert_eq!(render_key_value(single.iter()), Some(long));
    }

    #[test]
    fn test_key_columns_bind_and_value() {
        let rows = RowSet::new(["region", "orderno", "amount"])
            .with_row(vec!["EU".into(), CellValue::Int(7), CellValue::Int(10)]);
        let key = BusinessKey::new("Orders", vec!["Region".to_string(), "OrderNo".to_string()]);
        let bound = KeyColumns::bind("Orders", &rows, &key).unwrap();
        assert_eq!(bound.indices(), &[0, 1]);
        assert_eq!(bound.value(&rows.rows[0]).as_deref(), Some("EU_7"));
    }
}
