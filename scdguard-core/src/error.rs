//! Error types for scdguard operations

use thiserror::Error;

/// Configuration errors.
///
/// Always fatal to the single check that needs the missing piece, never to
/// the whole run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No business key configured for table {table}")]
    MissingBusinessKey { table: String },

    #[error("Required column {column} not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Missing configuration section: {section}")]
    MissingSection { section: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Identifier rejected by allow-list: {identifier:?}")]
    UnsafeIdentifier { identifier: String },
}

/// Database collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataAccessError {
    #[error("Query failed on {database}: {reason} (query: {query})")]
    QueryFailed {
        database: String,
        query: String,
        reason: String,
    },

    #[error("Table {table} not found in {database}")]
    UnknownTable { database: String, table: String },

    #[error("Malformed row in {table}: {reason}")]
    MalformedRow { table: String, reason: String },

    #[error("Malformed value in {table}.{column}: {reason}")]
    MalformedValue {
        table: String,
        column: String,
        reason: String,
    },
}

/// Validation errors.
///
/// A single invariant violation is never an error; it is recorded in a
/// `CheckReport`. These variants are raised once, in aggregate, after the
/// report for a check (or a suite) is complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No common columns between {left_table} and {right_table}")]
    NoCommonColumns {
        left_table: String,
        right_table: String,
    },

    #[error("{} check(s) failed:\n{}", failures.len(), failures.join("\n"))]
    ChecksFailed { failures: Vec<String> },
}

/// Master error type for all scdguard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScdError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias for scdguard operations.
pub type ScdResult<T> = Result<T, ScdError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_business_key_display() {
        let err = ConfigError::MissingBusinessKey {
            table: "dim_customer".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("No business key"));
        assert!(msg.contains("dim_customer"));
    }

    #[test]
    fn test_query_failed_display_carries_context() {
        let err = DataAccessError::QueryFailed {
            database: "STAGE_DB".to_string(),
            query: "SELECT 1".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("STAGE_DB"));
        assert!(msg.contains("SELECT 1"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_checks_failed_lists_every_failure() {
        let err = ValidationError::ChecksFailed {
            failures: vec!["a failed".to_string(), "b failed".to_string()],
        };
        let msg = format!("{}", err);
        assert!(msg.starts_with("2 check(s) failed"));
        assert!(msg.contains("a failed"));
        assert!(msg.contains("b failed"));
    }

    #[test]
    fn test_scd_error_from_variants() {
        let config = ScdError::from(ConfigError::MissingSection {
            section: "mappings".to_string(),
        });
        assert!(matches!(config, ScdError::Config(_)));

        let data = ScdError::from(DataAccessError::UnknownTable {
            database: "SRC".to_string(),
            table: "t".to_string(),
        });
        assert!(matches!(data, ScdError::DataAccess(_)));

        let validation = ScdError::from(ValidationError::NoCommonColumns {
            left_table: "a".to_string(),
            right_table: "b".to_string(),
        });
        assert!(matches!(validation, ScdError::Validation(_)));
    }
}
