//! SCDGUARD Core - Entity Types
//!
//! Pure data structures for validating SCD Type 2 pipelines. All other
//! crates depend on this. No check logic lives here.

pub mod config;
pub mod error;
pub mod ident;
pub mod model;
pub mod report;
pub mod rowset;
pub mod value;

pub use config::{ColumnSpec, ConstraintMode, ScdColumnNames, TableMapping, ValidationConfig};
pub use error::{ConfigError, DataAccessError, ScdError, ScdResult, ValidationError};
pub use ident::SafeIdent;
pub use model::{BusinessKey, ColumnMetadata, DeletionRecord, VersionInterval, VersionRecord};
pub use report::{CheckKind, CheckReport, CheckStatus};
pub use rowset::RowSet;
pub use value::{parse_current_flag, parse_timestamp, CellValue, CurrentFlag, Timestamp};
