//! Fuzz test for the constraint normalizer
//!
//! Feeds arbitrary strings through `normalize_constraints` and checks the
//! set invariants: never empty, uppercase, trimmed, no composite-key token.
//!
//! Run with: cargo +nightly fuzz run constraint_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use scdguard_rules::{normalize_constraints, ConstraintOrigin, NormalizedConstraintSet};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let set: NormalizedConstraintSet =
            normalize_constraints(Some(input), ConstraintOrigin::Declared);

        assert!(!set.is_empty(), "normalized set must never be empty");
        assert!(!set.contains("COMPOSITE KEY"));
        for token in set.tokens() {
            assert!(!token.is_empty());
            assert_eq!(token, token.trim());
            assert_eq!(token, token.to_uppercase());
        }

        // Normalizing is idempotent over the rendered set
        let rendered = set.to_string();
        let again = normalize_constraints(Some(&rendered), ConstraintOrigin::Observed);
        assert_eq!(set, again);
    }
});
