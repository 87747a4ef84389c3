//! Constraint text normalization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Marker for a column with no comparable constraint.
pub const NULL_MARKER: &str = "NULL";

/// Qualifier describing a multi-column relationship; never compared.
pub const COMPOSITE_KEY: &str = "COMPOSITE KEY";

/// Where a constraint description came from. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOrigin {
    /// Declared in the column specification
    Declared,
    /// Reported by the database catalog
    Observed,
}

impl fmt::Display for ConstraintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOrigin::Declared => write!(f, "configuration"),
            ConstraintOrigin::Observed => write!(f, "database"),
        }
    }
}

/// Uppercase constraint tokens. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedConstraintSet(BTreeSet<String>);

impl NormalizedConstraintSet {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.tokens().collect();
        write!(f, "{}", joined.join(", "))
    }
}

/// Canonicalize a raw constraint description.
///
/// Splits on commas, trims and uppercases each token, and drops empties.
/// `COMPOSITE KEY` is removed with a warning. An empty result becomes
/// `{"NULL"}`.
pub fn normalize_constraints(raw: Option<&str>, origin: ConstraintOrigin) -> NormalizedConstraintSet {
    let mut tokens: BTreeSet<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|token| token.trim().to_uppercase())
        .filter(|token| !token.is_empty() && token != "NAN")
        .collect();

    if tokens.remove(COMPOSITE_KEY) {
        tracing::warn!(
            origin = %origin,
            raw = raw.unwrap_or_default(),
            "Ignoring COMPOSITE KEY qualifier; it cannot be compared per column"
        );
    }

    if tokens.is_empty() {
        tokens.insert(NULL_MARKER.to_string());
    }
    NormalizedConstraintSet(tokens)
}
