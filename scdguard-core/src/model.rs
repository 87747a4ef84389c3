//! Entity types read from environment snapshots.

use crate::{CurrentFlag, Timestamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// METADATA
// ============================================================================

/// One column of one table as the database reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub table: String,
    pub column: String,
    pub data_type: String,
    pub is_nullable: bool,
    /// Constraint definition text, when the catalog exposes one
    #[serde(default)]
    pub constraint_def: Option<String>,
}

impl ColumnMetadata {
    /// Create a column description without a constraint definition.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
        is_nullable: bool,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            data_type: data_type.into(),
            is_nullable,
            constraint_def: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint_def = Some(constraint.into());
        self
    }

    /// `"NULL"` or `"NOT NULL"` derived from the nullability flag.
    pub fn nullability_token(&self) -> &'static str {
        if self.is_nullable {
            "NULL"
        } else {
            "NOT NULL"
        }
    }
}

// ============================================================================
// BUSINESS KEYS
// ============================================================================

/// Ordered business-key columns of one table.
///
/// Column order is the configuration order and is never re-sorted; the
/// rendered key value depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessKey {
    pub table: String,
    pub columns: Vec<String>,
}

impl BusinessKey {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// VERSIONS
// ============================================================================

/// One stored version of a business-keyed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Rendered business-key value; `None` when any key component is NULL
    pub business_key_value: Option<String>,
    pub version_begin: Option<Timestamp>,
    pub version_end: Option<Timestamp>,
    pub is_current: CurrentFlag,
    pub load_timestamp: Option<Timestamp>,
    /// Position of the originating row in its scan
    pub row: usize,
}

/// A version's validity window with the open end filled in.
///
/// Used for overlap arithmetic only; a NULL stored end is still reported by
/// the consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionInterval {
    pub begin: Timestamp,
    pub end: Timestamp,
}

impl VersionInterval {
    pub fn new(begin: Timestamp, end: Timestamp) -> Self {
        Self { begin, end }
    }

    /// Derive an interval from a record; `None` when the begin is unknown.
    pub fn from_record(record: &VersionRecord, open_end: Timestamp) -> Option<Self> {
        record.version_begin.map(|begin| Self {
            begin,
            end: record.version_end.unwrap_or(open_end),
        })
    }
}

// ============================================================================
// DELETIONS
// ============================================================================

/// One entry of a deletion ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub business_key_value: Option<String>,
    pub deleted_at: Option<Timestamp>,
    pub row: usize,
}
