//! Criterion benchmarks for the SQL front end and the chunked store.
//!
//! Run with: `cargo bench --bench sql_bench`

use chunkdb::sql::rows_to_sql_rows;
use chunkdb::{parse, parse_expression, ColumnSchema, EvalContext, ExprEvaluator, Row, Storage, StorageConfig, TableSchema};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

const QUERY: &str = "SELECT c.name, COUNT(o.id) AS orders, SUM(o.total) \
    FROM customers c LEFT JOIN orders o ON o.customer_id = c.id \
    WHERE c.created_at >= '2024-01-01' AND c.status IN ('active', 'trial') \
    GROUP BY c.name HAVING COUNT(o.id) > 2 ORDER BY 3 DESC LIMIT 10";

fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            json!({"id": i, "name": format!("user-{}", i), "score": (i % 97) as f64 * 1.5})
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_join_query", |b| {
        b.iter(|| parse(black_box(QUERY)).unwrap());
    });
}

fn bench_filter(c: &mut Criterion) {
    let data = rows_to_sql_rows(&rows(10_000), Some("t"));
    let predicate = parse_expression("t.score > 50 AND name LIKE 'user-1%'").unwrap();
    let evaluator = ExprEvaluator::new();

    c.bench_function("filter_10k_rows", |b| {
        b.iter(|| {
            data.iter()
                .filter(|row| evaluator.eval_predicate(&predicate, &EvalContext::new(row)).unwrap())
                .count()
        });
    });
}

fn bench_insert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_rows");
    group.sample_size(10);

    for size in [1_000, 10_000, 25_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let data = rows(size);
            b.iter(|| {
                let dir = tempfile::TempDir::new().unwrap();
                let storage = Storage::open(StorageConfig::for_testing(dir.path())).unwrap();
                storage.create_database("bench").unwrap();
                storage
                    .create_table("bench", "t", TableSchema::new(vec![ColumnSchema::new("id", "INT")]))
                    .unwrap();
                storage.insert_rows("bench", "t", black_box(data.clone())).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_filter, bench_insert_rows);
criterion_main!(benches);
