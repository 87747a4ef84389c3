//! Allow-listed SQL identifiers.

use crate::{ConfigError, ScdResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bare names, optionally schema-qualified (`dbo.DimCustomer`).
static SAFE_IDENT: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_ ]{0,127}(\.[A-Za-z_][A-Za-z0-9_ ]{0,127})?$"));

/// A table or column name that passed the identifier allow-list.
///
/// This is the only type the SQL boundary accepts for names, so an
/// unchecked configuration string can never reach query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SafeIdent(String);

impl SafeIdent {
    /// Validate a raw identifier against the allow-list.
    pub fn parse(raw: &str) -> ScdResult<Self> {
        let trimmed = raw.trim();
        let allowed = match SAFE_IDENT.as_ref() {
            Ok(re) => re.is_match(trimmed) && !trimmed.ends_with(' '),
            Err(_) => false,
        };
        if !allowed {
            return Err(ConfigError::UnsafeIdentifier {
                identifier: raw.to_string(),
            }
            .into());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bracket-quoted form, one bracket pair per dotted part: `[dbo].[Dim]`.
    pub fn quoted(&self) -> String {
        self.0
            .split('.')
            .map(|part| format!("[{}]", part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Name with any schema prefix removed.
    pub fn unqualified(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for SafeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SafeIdent {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SafeIdent::parse(&value).map_err(|_| ConfigError::UnsafeIdentifier { identifier: value })
    }
}

impl From<SafeIdent> for String {
    fn from(value: SafeIdent) -> Self {
        value.0
    }
}

impl AsRef<str> for SafeIdent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_plain_and_qualified_names() {
        assert_eq!(SafeIdent::parse("DimCustomer").unwrap().quoted(), "[DimCustomer]");
        assert_eq!(
            SafeIdent::parse("dbo.Dim_Customer").unwrap().quoted(),
            "[dbo].[Dim_Customer]"
        );
        assert_eq!(SafeIdent::parse("Order Date").unwrap().quoted(), "[Order Date]");
    }

    #[test]
    fn test_rejects_injection_shapes() {
        for raw in [
            "",
            "x; DROP TABLE y",
            "name]--",
            "a'b",
            "1abc",
            "a.b.c",
            "[dbo]",
        ] {
            assert!(SafeIdent::parse(raw).is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_unqualified() {
        assert_eq!(SafeIdent::parse("dbo.Dim").unwrap().unqualified(), "Dim");
        assert_eq!(SafeIdent::parse("Dim").unwrap().unqualified(), "Dim");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<SafeIdent, _> = serde_json::from_str("\"Customer_ID\"");
        assert!(ok.is_ok());
        let bad: Result<SafeIdent, _> = serde_json::from_str("\"a;b\"");
        assert!(bad.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Anything accepted quotes cleanly: no bracket or quote survives.
        #[test]
        fn prop_accepted_idents_have_no_delimiters(raw in ".{0,40}") {
            if let Ok(ident) = SafeIdent::parse(&raw) {
                prop_assert!(!ident.as_str().contains(['[', ']', '\'', ';', '-']));
            }
        }
    }
}
