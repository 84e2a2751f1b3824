//! Bulk insert benchmarks
//!
//! Benchmarks for appender-based inserts:
//! - Rows per call at several table sizes
//! - Effect of the flush batch size

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use duck_plus::{Database, InsertOptions, Row, Value};

/// Rows shaped like the `events` table
#[allow(clippy::cast_precision_loss)]
fn create_rows(num_rows: i64) -> Vec<Row> {
    (0..num_rows)
        .map(|i| {
            Row::from([
                ("id".to_string(), Value::Integer(i)),
                ("category".to_string(), Value::Text(format!("category_{}", i % 10))),
                ("value".to_string(), Value::Real(i as f64 * 1.5)),
            ])
        })
        .collect()
}

fn events_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.execute_batch("CREATE TABLE events (id BIGINT, category VARCHAR, value DOUBLE)")
        .unwrap();
    db
}

/// Benchmark inserting a whole vector of rows
fn bench_insert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_rows");
    group.sample_size(20);

    for size in [1_000, 10_000, 100_000].iter() {
        let rows = create_rows(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let db = events_db();
                black_box(db.insert_rows("events", &rows).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark the flush interval
fn bench_batch_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_batch_size");
    group.sample_size(20);
    let rows = create_rows(50_000);

    for batch in [100, 1_000, 10_000].iter() {
        let options = InsertOptions::new().batch_size(*batch);
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, _| {
            b.iter(|| {
                let db = events_db();
                black_box(db.insert_rows_with("events", &rows, &options).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert_rows, bench_batch_size);
criterion_main!(benches);
