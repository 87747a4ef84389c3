//! Table-level profile checks: row counts, key nulls, duplicate keys and
//! view exposure.

use crate::business_key::{render_key_value, KeyColumns};
use crate::TableSnapshot;
use scdguard_core::{
    BusinessKey, CellValue, CheckKind, CheckReport, RowSet, ScdResult, TableMapping,
    ValidationConfig,
};
use scdguard_storage::{Database, SnapshotReader};
use std::collections::HashMap;

/// Detail columns of a row-count mismatch.
pub const ROW_COUNT_COLUMNS: [&str; 6] = [
    "Source_Table",
    "Source_Count",
    "Stage_Table",
    "Stage_Count",
    "Target_Table",
    "Target_Count",
];

/// Detail columns of a duplicate-key finding.
pub const DUPLICATE_KEY_COLUMNS: [&str; 2] = ["BusinessKey", "DuplicateCount"];

/// Compare row counts across Source, Stage and Target.
///
/// A mapping without a stage table compares Source and Target only.
pub fn row_counts<S, G, T>(
    mapping: &TableMapping,
    source: &SnapshotReader<'_, S>,
    stage: &SnapshotReader<'_, G>,
    target: &SnapshotReader<'_, T>,
) -> ScdResult<CheckReport>
where
    S: Database + ?Sized,
    G: Database + ?Sized,
    T: Database + ?Sized,
{
    let source_count = source.count(&mapping.source_table)?;
    let stage_count = match mapping.stage() {
        Some(stage_table) => Some(stage.count(stage_table)?),
        None => None,
    };
    let target_count = target.count(&mapping.target_table)?;

    let matched =
        source_count == target_count && stage_count.map_or(true, |count| count == source_count);

    let as_cell = |count: u64| CellValue::Int(i64::try_from(count).unwrap_or(i64::MAX));
    let mut offending = RowSet::new(ROW_COUNT_COLUMNS);
    if !matched {
        offending.push(
            &mapping.source_table,
            vec![
                CellValue::text(&mapping.source_table),
                as_cell(source_count),
                CellValue::text(mapping.stage().unwrap_or("N/A")),
                stage_count.map(as_cell).unwrap_or_else(|| CellValue::text("N/A")),
                CellValue::text(&mapping.target_table),
                as_cell(target_count),
            ],
        )?;
    }

    let summary = match (mapping.stage(), stage_count) {
        (Some(stage_table), Some(count)) => format!(
            "{}({}) -> {}({}) -> {}({})",
            mapping.source_table, source_count, stage_table, count, mapping.target_table, target_count
        ),
        _ => format!(
            "{}({}) -> {}({}) (stage skipped)",
            mapping.source_table, source_count, mapping.target_table, target_count
        ),
    };
    if matched {
        tracing::info!(summary = %summary, "Row counts match");
    } else {
        tracing::warn!(summary = %summary, "Row counts differ");
    }

    Ok(CheckReport::from_offending(
        source.database_name(),
        &mapping.source_table,
        CheckKind::RowCount,
        offending,
    )
    .with_message(summary))
}

/// Rows with a NULL in any business-key column.
pub fn business_key_nulls(snapshot: &TableSnapshot<'_>, key: &BusinessKey) -> ScdResult<CheckReport> {
    let key_columns = KeyColumns::bind(snapshot.table, snapshot.rows, key)?;
    let positions: Vec<usize> = snapshot
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| key_columns.indices().iter().any(|&i| row[i].is_null()))
        .map(|(i, _)| i)
        .collect();

    let report = CheckReport::from_offending(
        snapshot.database,
        snapshot.table,
        CheckKind::BusinessKeyNulls,
        snapshot.rows.select_rows(&positions),
    );
    tracing::info!(
        database = %report.database,
        table = %report.table,
        key = %key.columns.join(", "),
        issues = report.issue_count,
        "Business key null check finished"
    );
    Ok(report)
}

/// Business keys held by more than one row.
///
/// Rows group the way `GROUP BY` over the key columns groups them, so NULL
/// components match each other. No version flag is consulted: a source
/// table keeps one row per key. Groups are reported in first-seen order.
pub fn duplicate_keys(snapshot: &TableSnapshot<'_>, key: &BusinessKey) -> ScdResult<CheckReport> {
    let key_columns = KeyColumns::bind(snapshot.table, snapshot.rows, key)?;
    let mut groups: Vec<(Vec<&CellValue>, i64)> = Vec::new();
    let mut seen: HashMap<Vec<&CellValue>, usize> = HashMap::new();
    for row in snapshot.rows.iter() {
        let cells: Vec<&CellValue> = key_columns.indices().iter().map(|&i| &row[i]).collect();
        match seen.get(&cells) {
            Some(&at) => groups[at].1 += 1,
            None => {
                seen.insert(cells.clone(), groups.len());
                groups.push((cells, 1));
            }
        }
    }

    let mut offending = RowSet::new(DUPLICATE_KEY_COLUMNS);
    for (cells, count) in groups.into_iter().filter(|(_, count)| *count > 1) {
        let rendered = render_key_value(cells.into_iter())
            .map(CellValue::Text)
            .unwrap_or(CellValue::Null);
        offending.push(snapshot.table, vec![rendered, CellValue::Int(count)])?;
    }

    let report = CheckReport::from_offending(
        snapshot.database,
        snapshot.table,
        CheckKind::DuplicateKeys,
        offending,
    );
    tracing::info!(
        database = %report.database,
        table = %report.table,
        key = %key.columns.join(", "),
        issues = report.issue_count,
        "Duplicate key check finished"
    );
    Ok(report)
}

/// Housekeeping columns a target view exposes but must not.
pub fn forbidden_view_columns(
    database: &str,
    view: &str,
    columns: &[String],
    config: &ValidationConfig,
) -> ScdResult<CheckReport> {
    let mut offending = RowSet::new(["Column"]);
    for column in columns.iter().filter(|c| {
        config
            .forbidden_view_columns
            .iter()
            .any(|f| f.eq_ignore_ascii_case(c.trim()))
    }) {
        offending.push(view, vec![CellValue::text(column)])?;
    }

    let report =
        CheckReport::from_offending(database, view, CheckKind::ForbiddenViewColumns, offending);
    if !report.passed() {
        tracing::warn!(
            database = %database,
            view = %view,
            issues = report.issue_count,
            "Target view exposes housekeeping columns"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scdguard_storage::InMemoryDatabase;

    fn table_with_rows(db: &InMemoryDatabase, name: &str, n: i64) {
        let mut rows = RowSet::new(["id"]);
        for i in 0..n {
            rows.push(name, vec![CellValue::Int(i)]).unwrap();
        }
        db.insert_rows(name, rows).unwrap();
    }

    #[test]
    fn test_row_counts_match_across_three_layers() {
        let (src, stg, dw) = (
            InMemoryDatabase::new("SOURCE_DB"),
            InMemoryDatabase::new("STAGE_DB"),
            InMemoryDatabase::new("TARGET_DB"),
        );
        table_with_rows(&src, "Customer", 3);
        table_with_rows(&stg, "Customer", 3);
        table_with_rows(&dw, "DimCustomer", 3);
        let mut mapping = TableMapping::new("Customer", "DimCustomer");
        mapping.stage_table = Some("Customer".to_string());

        let report = row_counts(
            &mapping,
            &SnapshotReader::new(&src),
            &SnapshotReader::new(&stg),
            &SnapshotReader::new(&dw),
        )
        .unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_row_counts_stage_mismatch_and_bypass() {
        let (src, stg, dw) = (
            InMemoryDatabase::new("SOURCE_DB"),
            InMemoryDatabase::new("STAGE_DB"),
            InMemoryDatabase::new("TARGET_DB"),
        );
        table_with_rows(&src, "Customer", 3);
        table_with_rows(&stg, "Customer", 2);
        table_with_rows(&dw, "DimCustomer", 3);
        let mut mapping = TableMapping::new("Customer", "DimCustomer");
        mapping.stage_table = Some("Customer".to_string());

        let report = row_counts(
            &mapping,
            &SnapshotReader::new(&src),
            &SnapshotReader::new(&stg),
            &SnapshotReader::new(&dw),
        )
        .unwrap();
        assert!(!report.passed());
        assert_eq!(report.details.unwrap().rows[0][3], CellValue::Int(2));

        mapping.stage_table = Some("  ".to_string());
        let bypassed = row_counts(
            &mapping,
            &SnapshotReader::new(&src),
            &SnapshotReader::new(&stg),
            &SnapshotReader::new(&dw),
        )
        .unwrap();
        assert!(bypassed.passed());
        assert!(bypassed.message.unwrap().contains("stage skipped"));
    }

    #[test]
    fn test_business_key_nulls() {
        let rows = RowSet::new(["Region", "No", "Name"])
            .with_row(vec![CellValue::text("EU"), CellValue::Int(1), CellValue::Null])
            .with_row(vec![CellValue::text("EU"), CellValue::Null, CellValue::text("x")]);
        let key = BusinessKey::new("Orders", vec!["Region".to_string(), "No".to_string()]);
        let report =
            business_key_nulls(&TableSnapshot::new("SOURCE_DB", "Orders", &rows), &key).unwrap();
        assert_eq!(report.issue_count, 1);
    }

    #[test]
    fn test_duplicate_keys_counts_each_group_once() {
        let rows = RowSet::new(["CustomerID", "Name"])
            .with_row(vec![CellValue::Int(1), CellValue::text("Ann")])
            .with_row(vec![CellValue::Int(2), CellValue::text("Bob")])
            .with_row(vec![CellValue::Int(1), CellValue::text("Ann B.")])
            .with_row(vec![CellValue::Int(1), CellValue::text("Ann C.")]);
        let key = BusinessKey::new("Customer", vec!["CustomerID".to_string()]);
        let report =
            duplicate_keys(&TableSnapshot::new("SOURCE_DB", "Customer", &rows), &key).unwrap();

        assert_eq!(report.check, CheckKind::DuplicateKeys);
        assert_eq!(report.issue_count, 1);
        let details = report.details.unwrap();
        assert_eq!(details.columns, vec!["BusinessKey", "DuplicateCount"]);
        assert_eq!(details.rows[0], vec![CellValue::text("1"), CellValue::Int(3)]);
    }

    #[test]
    fn test_duplicate_keys_groups_composite_nulls_together() {
        let rows = RowSet::new(["Region", "No"])
            .with_row(vec![CellValue::text("EU"), CellValue::Null])
            .with_row(vec![CellValue::text("EU"), CellValue::Null])
            .with_row(vec![CellValue::text("EU"), CellValue::Int(1)])
            .with_row(vec![CellValue::text("US"), CellValue::Int(1)]);
        let key = BusinessKey::new("Orders", vec!["Region".to_string(), "No".to_string()]);
        let report =
            duplicate_keys(&TableSnapshot::new("SOURCE_DB", "Orders", &rows), &key).unwrap();

        assert_eq!(report.issue_count, 1);
        let details = report.details.unwrap();
        assert_eq!(details.rows[0], vec![CellValue::Null, CellValue::Int(2)]);
    }

    #[test]
    fn test_duplicate_keys_unique_source_passes() {
        let rows = RowSet::new(["CustomerID"])
            .with_row(vec![CellValue::Int(1)])
            .with_row(vec![CellValue::Int(2)]);
        let key = BusinessKey::new("Customer", vec!["CustomerID".to_string()]);
        let report =
            duplicate_keys(&TableSnapshot::new("SOURCE_DB", "Customer", &rows), &key).unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_forbidden_view_columns() {
        let config = ValidationConfig::warehouse_defaults().unwrap();
        let columns = vec![
            "CustomerID".to_string(),
            "is_current".to_string(),
            "Version_End_Date".to_string(),
        ];
        let report = forbidden_view_columns("TARGET_DB", "vw_Customer", &columns, &config).unwrap();
        assert_eq!(report.issue_count, 2);

        let clean = forbidden_view_columns(
            "TARGET_DB",
            "vw_Customer",
            &["CustomerID".to_string()],
            &config,
        )
        .unwrap();
        assert!(clean.passed());
    }
}
