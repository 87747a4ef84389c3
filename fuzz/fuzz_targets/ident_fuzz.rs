//! Fuzz test for identifier validation and SQL construction
//!
//! Any identifier that passes `SafeIdent::parse` must yield query text
//! free of statement separators, comments, and stray quotes.
//!
//! Run with: cargo +nightly fuzz run ident_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use scdguard_core::SafeIdent;
use scdguard_storage::SqlQuery;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(ident) = SafeIdent::parse(input) else {
        assert!(SqlQuery::table_scan(input).is_err());
        return;
    };

    let quoted = ident.quoted();
    assert!(quoted.starts_with('[') && quoted.ends_with(']'));

    for query in [
        SqlQuery::table_scan(input),
        SqlQuery::row_count(input),
        SqlQuery::column_metadata(input),
    ] {
        let query = query.expect("safe identifier builds every query");
        let text = query.text();
        assert!(!text.contains(';'));
        assert!(!text.contains("--"));
        assert!(!text.contains("/*"));
    }
});
