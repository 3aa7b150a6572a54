//! Range extraction benchmarks.
//!
//! Compares the three traversal paths (ordered index walk, full scan
//! behind an exact-match index, full scan with no index) and the
//! point lookup, each followed by an undo so the table is reused.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shardshift_core::migration::{MigrationConfig, MigrationManager};
use shardshift_core::storage::{
    ColumnDef, IndexDef, PersistentTable, Row, Schema, StorageConfig, StorageEngine,
};
use shardshift_proto::{ScalarType, Value};

fn setup(indexes: Vec<IndexDef>, rows: i32) -> (MigrationManager, PersistentTable) {
    let engine = Arc::new(StorageEngine::open(StorageConfig::temporary()).unwrap());
    let schema = Schema::new(
        vec![
            ColumnDef::new("ol_o_id", ScalarType::Int64),
            ColumnDef::new("ol_w_id", ScalarType::Int32),
            ColumnDef::new("ol_dist_info", ScalarType::String).with_max_length(24),
        ],
        1,
    );
    let table = engine.create_table("order_line", schema, indexes).unwrap();
    for k in 0..rows {
        let row = Row::new(vec![
            Value::Int64(i64::from(k)),
            Value::Int32(k),
            Value::String(format!("dist-info-{:012}", k)),
        ]);
        table.insert(&row).unwrap();
    }
    let manager = MigrationManager::new(engine, MigrationConfig::default());
    (manager, table)
}

fn regimes() -> [(&'static str, Vec<IndexDef>); 3] {
    [
        ("ordered", vec![IndexDef::ordered("w_tree", 1).unique()]),
        ("exact_match", vec![IndexDef::exact_match("w_hash", 1).unique()]),
        ("none", vec![]),
    ]
}

fn bench_extract_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract/range");

    for size in [1_000, 10_000] {
        for (name, indexes) in regimes() {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                let (mut manager, table) = setup(indexes.clone(), size);
                let min = Value::Int32(size / 2);
                let max = Value::Int32(size / 2 + 100);

                b.iter(|| {
                    let pending = manager.extract_range(&table, &min, &max, 1).unwrap();
                    black_box(pending.staged().len());
                    manager.undo_extract_delete(1).unwrap();
                });
            });
        }
    }

    group.finish();
}

fn bench_extract_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract/point");

    for (name, indexes) in regimes().into_iter().take(2) {
        group.bench_function(name, |b| {
            let (mut manager, table) = setup(indexes.clone(), 10_000);
            let key = Value::Int32(4_242);

            b.iter(|| {
                let pending = manager.extract_range(&table, &key, &key, 1).unwrap();
                black_box(pending.staged().len());
                manager.undo_extract_delete(1).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract_range, bench_extract_point);
criterion_main!(benches);
