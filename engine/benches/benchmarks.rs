//! Performance benchmarks for tether-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use tether_engine::{
    classify, CacheRepository, Entity, MemoryBackend, Namespace, Query, Response, SyncOperation,
    SyncQueue,
};
use tokio::runtime::Runtime;

fn book(i: usize) -> Entity {
    Entity::from_value(json!({
        "_id": format!("book_{i}"),
        "title": format!("Title {i}"),
        "pages": (i * 37) % 900,
        "meta": { "genre": if i % 3 == 0 { "scifi" } else { "classic" } },
    }))
    .unwrap()
}

fn bench_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");

    group.bench_function("classify_named", |b| {
        b.iter(|| classify(black_box(Some("InvalidCredentials")), black_box(401)))
    });

    group.bench_function("classify_status_only", |b| {
        b.iter(|| classify(black_box(None), black_box(404)))
    });

    group.bench_function("response_error", |b| {
        let response = Response::new(
            500,
            Some(json!({ "name": "ServerError", "description": "boom", "debug": "trace" })),
        );
        b.iter(|| black_box(&response).error())
    });

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for size in [100, 1000, 10000] {
        let entities: Vec<Entity> = (0..size).map(book).collect();
        let query = Query::new()
            .equal_to("meta.genre", json!("scifi"))
            .condition("pages", "$gte", json!(300))
            .descending("pages")
            .limit(50);

        group.bench_with_input(BenchmarkId::new("apply", size), &entities, |b, entities| {
            b.iter(|| query.apply(black_box(entities.clone())))
        });
    }

    group.bench_function("to_query_string", |b| {
        let query = Query::new()
            .equal_to("title", json!("Dune"))
            .descending("pages")
            .limit(10)
            .skip(5);
        b.iter(|| black_box(&query).to_query_string())
    });

    group.finish();
}

fn bench_queue(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("queue");

    group.bench_function("enqueue_distinct", |b| {
        let queue = SyncQueue::new(Arc::new(MemoryBackend::new()));
        let ns = Namespace::new("Books").unwrap();
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            rt.block_on(queue.enqueue(&ns, &format!("book_{}", id % 500), SyncOperation::Upsert))
        })
    });

    group.bench_function("enqueue_coalescing", |b| {
        let queue = SyncQueue::new(Arc::new(MemoryBackend::new()));
        let ns = Namespace::new("Books").unwrap();
        b.iter(|| rt.block_on(queue.enqueue(&ns, black_box("book_1"), SyncOperation::Upsert)))
    });

    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cache");

    let cache = CacheRepository::new(Arc::new(MemoryBackend::new()));
    let ns = Namespace::new("Books").unwrap();
    let entities: Vec<Entity> = (0..1000).map(book).collect();
    rt.block_on(cache.upsert_many(&ns, &entities)).unwrap();

    group.bench_function("get", |b| {
        b.iter(|| rt.block_on(cache.get(&ns, black_box("book_500"))))
    });

    group.bench_function("find_with_query", |b| {
        let query = Query::new().condition("pages", "$lt", json!(100));
        b.iter(|| rt.block_on(cache.find(&ns, Some(black_box(&query)))))
    });

    group.finish();
}

criterion_group!(benches, bench_classifier, bench_query, bench_queue, bench_cache);
criterion_main!(benches);
