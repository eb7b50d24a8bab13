//! Benchmarks for the graph algorithms.
//!
//! Benchmark targets:
//! - Entity metrics: <5ms for 5000 entities
//! - Importance layer with repair: <20ms for 5000 entities
//! - Neighborhood (depth 2, 50 nodes): <1ms
//! - Connected components: <5ms for 5000 entities
//!
//! Graphs are synthetic: a fixed number of hubs, each with a ring of leaves,
//! plus sparse cross links between rings.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use kgview::models::graph::{Community, Entity, RawEntity, Relationship};
use kgview::services::{
    ImportanceOptions, analyze_connectivity, calculate_entity_metrics, find_neighborhood,
    select_important_entities,
};

const HUBS: usize = 20;

fn synthetic_graph(size: usize) -> (Vec<RawEntity>, Vec<Relationship>) {
    let entities: Vec<RawEntity> = (0..size).map(|i| RawEntity::named(format!("E{i}"))).collect();
    let mut relationships = Vec::with_capacity(size * 2);
    let mut row = 0i64;
    let mut link = |from: usize, to: usize, relationships: &mut Vec<Relationship>| {
        relationships.push(Relationship::new(row, format!("E{from}"), format!("E{to}")));
        row += 1;
    };

    for i in HUBS..size {
        let hub = i % HUBS;
        link(hub, i, &mut relationships);
        if i + HUBS < size {
            link(i, i + HUBS, &mut relationships);
        }
        if i % 97 == 0 {
            link(i, (i * 31) % size, &mut relationships);
        }
    }
    (entities, relationships)
}

fn metrics(raw: &[RawEntity], relationships: &[Relationship]) -> Vec<Entity> {
    calculate_entity_metrics(raw, relationships, &[] as &[Community])
}

// ============================================================================
// Metric Benchmarks
// ============================================================================

fn bench_entity_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_metrics");
    for size in [500, 5000] {
        let (raw, rels) = synthetic_graph(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| metrics(black_box(&raw), black_box(&rels)));
        });
    }
    group.finish();
}

// ============================================================================
// Query Benchmarks
// ============================================================================

fn bench_importance_layer(c: &mut Criterion) {
    let mut group = c.benchmark_group("importance_layer");
    for size in [500, 5000] {
        let (raw, rels) = synthetic_graph(size);
        let entities = metrics(&raw, &rels);
        for include in [false, true] {
            let options = ImportanceOptions::with_max_nodes(200).with_connectivity(include);
            let id = BenchmarkId::new(if include { "repair" } else { "rank_only" }, size);
            group.bench_with_input(id, &options, |b, options| {
                b.iter(|| select_important_entities(black_box(&entities), &rels, options));
            });
        }
    }
    group.finish();
}

fn bench_neighborhood(c: &mut Criterion) {
    let (raw, rels) = synthetic_graph(5000);
    let entities = metrics(&raw, &rels);

    let mut group = c.benchmark_group("neighborhood");
    for depth in [1, 2, 3] {
        group.bench_with_input(BenchmarkId::new("hub", depth), &depth, |b, &depth| {
            b.iter(|| find_neighborhood(black_box("E0"), &entities, &rels, depth, 50));
        });
    }
    group.bench_function("miss", |b| {
        b.iter(|| find_neighborhood(black_box("no such entity"), &entities, &rels, 2, 50));
    });
    group.finish();
}

fn bench_connectivity(c: &mut Criterion) {
    let mut group = c.benchmark_group("connectivity");
    for size in [500, 5000] {
        let (raw, rels) = synthetic_graph(size);
        let entities = metrics(&raw, &rels);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| analyze_connectivity(black_box(&entities), &rels));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_entity_metrics,
    bench_importance_layer,
    bench_neighborhood,
    bench_connectivity
);
criterion_main!(benches);
