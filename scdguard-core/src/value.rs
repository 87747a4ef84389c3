//! Cell values as returned by the database collaborator.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Warehouse timestamps carry no zone; they are compared as stored.
pub type Timestamp = NaiveDateTime;

/// Text formats accepted when a date column comes back as a string.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// A single cell of a fetched row.
///
/// Equality and hashing follow SQL set semantics (`EXCEPT`, `GROUP BY`):
/// NULL equals NULL and floats compare by bit pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(Timestamp),
    Text(String),
}

impl CellValue {
    /// Convenience constructor for text cells.
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render the cell as the text a `CAST(... AS NVARCHAR)` would produce.
    /// NULL stays NULL.
    pub fn render(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }

    /// Interpret the cell as a timestamp.
    ///
    /// Date-only text resolves to midnight. Returns `Err` with a reason when
    /// the cell holds something that is not a date at all.
    pub fn as_timestamp(&self) -> Result<Option<Timestamp>, String> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::Timestamp(ts) => Ok(Some(*ts)),
            CellValue::Text(s) => parse_timestamp(s).map(Some),
            other => Err(format!("expected a timestamp, found {}", other)),
        }
    }

    /// Interpret the cell as a non-negative count.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            CellValue::Int(i) if *i >= 0 => Some(*i as u64),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn float_key(f: f64) -> u64 {
        // -0.0 and 0.0 are the same value in SQL; all NaNs collapse to one.
        if f == 0.0 {
            0.0f64.to_bits()
        } else if f.is_nan() {
            f64::NAN.to_bits()
        } else {
            f.to_bits()
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => {
                Self::float_key(*a) == Self::float_key(*b)
            }
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a == b,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Null => {}
            CellValue::Bool(b) => b.hash(state),
            CellValue::Int(i) => i.hash(state),
            CellValue::Float(f) => Self::float_key(*f).hash(state),
            CellValue::Timestamp(ts) => ts.hash(state),
            CellValue::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "NULL"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<Timestamp> for CellValue {
    fn from(value: Timestamp) -> Self {
        CellValue::Timestamp(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

/// Parse a timestamp from its textual form.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    let value = raw.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::default()))
        .map_err(|_| format!("unrecognized timestamp {:?}", raw))
}

// ============================================================================
// CURRENT-VERSION FLAG
// ============================================================================

/// Interpretation of an `is_current` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrentFlag {
    /// The active version of its business key
    Current,
    /// A closed, historical version
    Historical,
    /// NULL or a literal outside the accepted sets
    Unknown,
}

impl CurrentFlag {
    pub fn is_current(self) -> bool {
        self == CurrentFlag::Current
    }

    pub fn is_historical(self) -> bool {
        self == CurrentFlag::Historical
    }
}

/// Literals that mark a row as current.
const CURRENT_LITERALS: &[&str] = &["1", "TRUE", "True", "true"];

/// Literals that mark a row as historical.
const HISTORICAL_LITERALS: &[&str] = &["0", "FALSE", "False", "false"];

/// The one place the `is_current` literal sets are interpreted.
///
/// Matching is exact: `"tRUE"` or `" 1"` are `Unknown`.
pub fn parse_current_flag(value: &CellValue) -> CurrentFlag {
    match value {
        CellValue::Bool(true) | CellValue::Int(1) => CurrentFlag::Current,
        CellValue::Bool(false) | CellValue::Int(0) => CurrentFlag::Historical,
        CellValue::Text(s) if CURRENT_LITERALS.contains(&s.as_str()) => CurrentFlag::Current,
        CellValue::Text(s) if HISTORICAL_LITERALS.contains(&s.as_str()) => {
            CurrentFlag::Historical
        }
        _ => CurrentFlag::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_current_literals() {
        for lit in ["1", "TRUE", "True", "true"] {
            assert_eq!(parse_current_flag(&CellValue::text(lit)), CurrentFlag::Current);
        }
        assert_eq!(parse_current_flag(&CellValue::Int(1)), CurrentFlag::Current);
        assert_eq!(parse_current_flag(&CellValue::Bool(true)), CurrentFlag::Current);
    }

    #[test]
    fn test_historical_literals() {
        for lit in ["0", "FALSE", "False", "false"] {
            assert_eq!(parse_current_flag(&CellValue::text(lit)), CurrentFlag::Historical);
        }
        assert_eq!(parse_current_flag(&CellValue::Int(0)), CurrentFlag::Historical);
    }

    #[test]
    fn test_unknown_flag_values() {
        assert_eq!(parse_current_flag(&CellValue::Null), CurrentFlag::Unknown);
        assert_eq!(parse_current_flag(&CellValue::text("tRUE")), CurrentFlag::Unknown);
        assert_eq!(parse_current_flag(&CellValue::text("Y")), CurrentFlag::Unknown);
        assert_eq!(parse_current_flag(&CellValue::Int(2)), CurrentFlag::Unknown);
    }

    #[test]
    fn test_timestamp_from_date_only_text() {
        let ts = CellValue::text("2024-06-01").as_timestamp().unwrap().unwrap();
        assert_eq!(ts.to_string(), "2024-06-01 00:00:00");
    }

    #[test]
    fn test_timestamp_from_datetime_text() {
        let ts = CellValue::text("2024-06-01 13:45:10.250")
            .as_timestamp()
            .unwrap()
            .unwrap();
        assert_eq!(ts.format("%H:%M:%S%.3f").to_string(), "13:45:10.250");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!(CellValue::text("not a date").as_timestamp().is_err());
        assert!(CellValue::Int(20240101).as_timestamp().is_err());
        assert_eq!(CellValue::Null.as_timestamp(), Ok(None));
    }

    #[test]
    fn test_null_equals_null_in_sets() {
        let mut set = HashSet::new();
        set.insert(vec![CellValue::Null, CellValue::Int(1)]);
        assert!(set.contains(&vec![CellValue::Null, CellValue::Int(1)]));
    }

    #[test]
    fn test_float_zero_signs_are_equal() {
        assert_eq!(CellValue::Float(0.0), CellValue::Float(-0.0));
        assert_ne!(CellValue::Float(1.0), CellValue::Int(1));
    }

    #[test]
    fn test_render_bool_as_bit() {
        assert_eq!(CellValue::Bool(true).render().as_deref(), Some("1"));
        assert_eq!(CellValue::Null.render(), None);
    }

    #[test]
    fn test_untagged_json_roundtrip_shapes() {
        let cells: Vec<CellValue> =
            serde_json::from_str(r#"[null, true, 7, 1.5, "2024-01-01T00:00:00", "abc"]"#).unwrap();
        assert!(cells[0].is_null());
        assert_eq!(cells[1], CellValue::Bool(true));
        assert_eq!(cells[2], CellValue::Int(7));
        assert_eq!(cells[3], CellValue::Float(1.5));
        assert!(matches!(cells[4], CellValue::Timestamp(_)));
        assert_eq!(cells[5], CellValue::text("abc"));
    }
}
