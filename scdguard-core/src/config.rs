//! Configuration types

use crate::{parse_timestamp, ConfigError, ScdError, ScdResult, Timestamp};
use serde::{Deserialize, Serialize};

/// Names of the SCD housekeeping columns in versioned tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScdColumnNames {
    pub version_begin: String,
    pub version_end: String,
    pub is_current: String,
    pub load_timestamp: String,
}

/// How column constraints are compared between two environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMode {
    /// Compare only the `NULL` / `NOT NULL` token
    NullableOnly,
    /// Compare full normalized constraint sets
    Normalized,
}

/// Settings shared by every checker in a run.
///
/// Built once and handed to each checker at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub scd_columns: ScdColumnNames,
    /// Columns left out of cross-environment SCD comparisons
    pub housekeeping_columns: Vec<String>,
    /// Stand-in end for open versions during overlap analysis
    pub open_end_sentinel: Timestamp,
    /// End date a freshly re-added version must carry
    pub readd_open_sentinel: Timestamp,
    /// Deletion timestamp column of the deletion ledger
    pub deleted_at_column: String,
    /// Columns a target view must not expose
    pub forbidden_view_columns: Vec<String>,
    pub constraint_mode: ConstraintMode,
}

impl ValidationConfig {
    /// Conventional warehouse column names and sentinels.
    pub fn warehouse_defaults() -> ScdResult<Self> {
        Ok(Self {
            scd_columns: ScdColumnNames {
                version_begin: "Version_Begin_Date".to_string(),
                version_end: "Version_End_Date".to_string(),
                is_current: "Is_Current".to_string(),
                load_timestamp: "Load_Timestamp".to_string(),
            },
            housekeeping_columns: vec!["Load_Timestamp".to_string()],
            open_end_sentinel: sentinel("open_end_sentinel", "9999-12-31")?,
            readd_open_sentinel: sentinel("readd_open_sentinel", "3000-12-31")?,
            deleted_at_column: "CreatedDTM".to_string(),
            forbidden_view_columns: vec![
                "Is_Current".to_string(),
                "Version_Begin_Date".to_string(),
                "Version_End_Date".to_string(),
                "Load_Timestamp".to_string(),
            ],
            constraint_mode: ConstraintMode::Normalized,
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ScdResult<()> {
        let names = [
            ("scd_columns.version_begin", &self.scd_columns.version_begin),
            ("scd_columns.version_end", &self.scd_columns.version_end),
            ("scd_columns.is_current", &self.scd_columns.is_current),
            ("scd_columns.load_timestamp", &self.scd_columns.load_timestamp),
            ("deleted_at_column", &self.deleted_at_column),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(invalid(field, value, "column name must not be blank"));
            }
        }

        for (field, list) in [
            ("housekeeping_columns", &self.housekeeping_columns),
            ("forbidden_view_columns", &self.forbidden_view_columns),
        ] {
            if let Some(blank) = list.iter().find(|c| c.trim().is_empty()) {
                return Err(invalid(field, blank, "entries must not be blank"));
            }
        }

        if self.open_end_sentinel <= self.readd_open_sentinel {
            return Err(invalid(
                "open_end_sentinel",
                &self.open_end_sentinel.to_string(),
                "open_end_sentinel must be later than readd_open_sentinel",
            ));
        }

        Ok(())
    }

    /// True when `column` is a housekeeping column (case-insensitive).
    pub fn is_housekeeping(&self, column: &str) -> bool {
        self.housekeeping_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
    }
}

fn sentinel(field: &str, raw: &str) -> ScdResult<Timestamp> {
    parse_timestamp(raw).map_err(|reason| invalid(field, raw, &reason))
}

fn invalid(field: &str, value: &str, reason: &str) -> ScdError {
    ScdError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

// ============================================================================
// CONFIGURATION TABLES
// ============================================================================

/// One row of the column specification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub table_name: String,
    pub column_name: String,
    /// `"Y"` marks a business-key column
    #[serde(default)]
    pub business_key_flag: String,
    #[serde(default)]
    pub expected_data_type: Option<String>,
    #[serde(default)]
    pub expected_constraints: Option<String>,
}

impl ColumnSpec {
    pub fn is_business_key(&self) -> bool {
        self.business_key_flag.trim().eq_ignore_ascii_case("Y")
    }
}

/// One Source → Stage → Target mapping row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub source_table: String,
    #[serde(default)]
    pub stage_table: Option<String>,
    pub target_table: String,
    #[serde(default)]
    pub deleted_table: Option<String>,
    #[serde(default)]
    pub target_view: Option<String>,
}

impl TableMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_table: source.into(),
            stage_table: None,
            target_table: target.into(),
            deleted_table: None,
            target_view: None,
        }
    }

    /// Stage table, with a blank entry treated as absent.
    pub fn stage(&self) -> Option<&str> {
        non_blank(&self.stage_table)
    }

    /// Deletion ledger table, with a blank entry treated as absent.
    pub fn deleted(&self) -> Option<&str> {
        non_blank(&self.deleted_table)
    }

    /// Target view, with a blank entry treated as absent.
    pub fn view(&self) -> Option<&str> {
        non_blank(&self.target_view)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warehouse_defaults_are_valid() {
        let config = ValidationConfig::warehouse_defaults().unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.deleted_at_column, "CreatedDTM");
        assert_eq!(config.open_end_sentinel.to_string(), "9999-12-31 00:00:00");
    }

    #[test]
    fn test_blank_column_name_rejected() {
        let mut config = ValidationConfig::warehouse_defaults().unwrap();
        config.scd_columns.is_current = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ScdError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "scd_columns.is_current"
        ));
    }

    #[test]
    fn test_blank_housekeeping_entry_rejected() {
        let mut config = ValidationConfig::warehouse_defaults().unwrap();
        config.housekeeping_columns.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sentinel_order_enforced() {
        let mut config = ValidationConfig::warehouse_defaults().unwrap();
        config.open_end_sentinel = config.readd_open_sentinel;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_housekeeping_match_ignores_case() {
        let config = ValidationConfig::warehouse_defaults().unwrap();
        assert!(config.is_housekeeping("load_timestamp"));
        assert!(!config.is_housekeeping("Name"));
    }

    #[test]
    fn test_business_key_flag() {
        let spec = ColumnSpec {
            table_name: "Customer".to_string(),
            column_name: "CustomerID".to_string(),
            business_key_flag: "Y".to_string(),
            expected_data_type: None,
            expected_constraints: None,
        };
        assert!(spec.is_business_key());
        let other = ColumnSpec {
            business_key_flag: "N".to_string(),
            ..spec
        };
        assert!(!other.is_business_key());
    }

    #[test]
    fn test_blank_stage_is_absent() {
        let mut mapping = TableMapping::new("src.Customer", "dw.DimCustomer");
        mapping.stage_table = Some("   ".to_string());
        assert_eq!(mapping.stage(), None);
        mapping.stage_table = Some("stg.Customer".to_string());
        assert_eq!(mapping.stage(), Some("stg.Customer"));
    }
}
