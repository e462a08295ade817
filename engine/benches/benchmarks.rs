//! Performance benchmarks for converge-engine

use converge_engine::{
    get_actions, get_actions_with, structural_eq, Cloud, CloudSchema, FieldOptions, MemoryStore,
    ReservedNames, SyncOptions,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

fn bench_get_actions(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_actions");

    for size in [10, 100, 1000, 10000].iter() {
        // Half the names overlap, a quarter are new, a quarter are stale
        let mut local = names("Class", size * 3 / 4);
        let mut remote = names("Class", *size);
        remote.drain(..size / 4);
        local.extend(names("_Internal", size / 10));

        group.bench_with_input(BenchmarkId::new("classes", size), size, |b, _| {
            b.iter(|| {
                get_actions(
                    black_box(local.iter().map(String::as_str)),
                    black_box(remote.iter().map(String::as_str)),
                )
            })
        });

        group.bench_with_input(BenchmarkId::new("fields", size), size, |b, _| {
            b.iter(|| {
                get_actions_with(
                    black_box(local.iter().map(String::as_str)),
                    black_box(remote.iter().map(String::as_str)),
                    &ReservedNames::FIELDS,
                )
            })
        });
    }

    group.finish();
}

fn bench_structural_eq(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_eq");

    let compound = json!({"title": 1, "author": -1, "createdAt": 1});
    let reordered = json!({"createdAt": 1.0, "author": -1, "title": 1});
    group.bench_function("compound_index", |b| {
        b.iter(|| structural_eq(black_box(&compound), black_box(&reordered)))
    });

    let nested: serde_json::Value = (0..100)
        .map(|i| json!({"field": format!("f{i}"), "weights": [i, i + 1, i + 2]}))
        .collect();
    let copy = nested.clone();
    group.bench_function("nested_array", |b| {
        b.iter(|| structural_eq(black_box(&nested), black_box(&copy)))
    });

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for classes in [10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::new("create_classes", classes),
            classes,
            |b, &classes| {
                b.iter(|| {
                    let cloud = Cloud::new();
                    for i in 0..classes {
                        cloud.register_schema(
                            CloudSchema::new(format!("Class{i}"))
                                .add_string("name", FieldOptions::required())
                                .add_number("count", FieldOptions::optional()),
                        );
                    }
                    let store = MemoryStore::new();
                    rt.block_on(cloud.run_migrations(&store, SyncOptions::sync()))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get_actions,
    bench_structural_eq,
    bench_reconcile
);
criterion_main!(benches);
