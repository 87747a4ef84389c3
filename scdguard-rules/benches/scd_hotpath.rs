use criterion::{criterion_group, criterion_main, Criterion};
use scdguard_core::{CellValue, RowSet, ValidationConfig};
use scdguard_rules::{normalize_constraints, ConstraintOrigin, ScdChecker, TableSnapshot};
use scdguard_test_utils::{day, fixtures, ts};
use std::hint::black_box;

/// `keys` customers with `versions` contiguous versions each.
fn bench_dimension(keys: i64, versions: i64) -> RowSet {
    let mut rows = fixtures::dimension_table();
    for key in 0..keys {
        for v in 0..versions {
            let last = v + 1 == versions;
            let end = if last { ts(9999, 12, 31) } else { day((v + 1) * 30) };
            rows.rows.push(fixtures::version_row(
                CellValue::Int(key),
                "customer",
                day(v * 30),
                Some(end),
                last,
                day(v * 30),
            ));
        }
    }
    rows
}

fn bench_scd_checks(c: &mut Criterion) {
    let config = ValidationConfig::warehouse_defaults().expect("warehouse defaults");
    let checker = ScdChecker::new(config).expect("build checker");
    let key = fixtures::customer_key();
    let rows = bench_dimension(2_000, 5);

    c.bench_function("scd/check_all_10k_rows", |b| {
        b.iter(|| {
            let snapshot = TableSnapshot::new("TARGET_DB", "DimCustomer", black_box(&rows));
            let results = checker.check_all(&snapshot, &key);
            black_box(results.len());
        });
    });

    let wide = bench_dimension(20, 200);
    c.bench_function("scd/overlaps_wide_groups", |b| {
        b.iter(|| {
            let snapshot = TableSnapshot::new("TARGET_DB", "DimCustomer", black_box(&wide));
            let report = checker.check_overlaps(&snapshot, &key).expect("overlap check");
            black_box(report.issue_count);
        });
    });
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize/constraints", |b| {
        b.iter(|| {
            let set = normalize_constraints(
                black_box(Some("Composite Key, not null, PRIMARY KEY, , nan")),
                ConstraintOrigin::Observed,
            );
            black_box(set.len());
        });
    });
}

criterion_group!(benches, bench_scd_checks, bench_normalize);
criterion_main!(benches);
