//! # Graph Benchmarks
//!
//! Performance benchmarks for trellis-core graph operations.
//!
//! Run with: `cargo bench -p trellis-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use trellis_core::{GraphConfig, GraphService, MemoryStore};

/// Create a graph with N nodes and a relation between consecutive nodes.
fn create_chain_graph(size: usize) -> GraphService<MemoryStore> {
    let graph = GraphService::new(MemoryStore::new(), GraphConfig::default());
    for i in 0..size {
        graph.add_node(&format!("n{i}"), "v").expect("add node");
        if i > 0 {
            graph
                .add_relation(&format!("n{}", i - 1), &format!("n{i}"), "next", "v", false)
                .expect("relate");
        }
    }
    graph
}

/// Create a graph with one hub related to N spokes.
fn create_star_graph(size: usize) -> GraphService<MemoryStore> {
    let graph = GraphService::new(MemoryStore::new(), GraphConfig::default());
    graph.add_node(&"hub".to_string(), "hub").expect("add node");
    for i in 0..size {
        let spoke = format!("s{i}");
        graph.add_node(&spoke, "v").expect("add node");
        graph
            .add_relation(&"hub".to_string(), &spoke, "spoke", "v", true)
            .expect("relate");
    }
    graph
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_node_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_insertion");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let graph: GraphService<MemoryStore> =
                    GraphService::new(MemoryStore::new(), GraphConfig::default());
                for i in 0..size {
                    let _ = graph.add_node(&format!("n{i}"), "v");
                }
                black_box(graph)
            });
        });
    }

    group.finish();
}

fn bench_relation_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("relation_insertion");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_chain_graph(size)));
        });
    }

    group.finish();
}

fn bench_outgoing(c: &mut Criterion) {
    let mut group = c.benchmark_group("outgoing_relations");

    for size in [100, 1000].iter() {
        let graph = create_star_graph(*size);
        let hub = "hub".to_string();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.outgoing_relations(&hub)));
        });
    }

    group.finish();
}

fn bench_incoming(c: &mut Criterion) {
    let mut group = c.benchmark_group("incoming_relations");

    for size in [100, 1000].iter() {
        let graph = create_chain_graph(*size);
        let target = format!("n{}", size / 2);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.incoming_relations(&target)));
        });
    }

    group.finish();
}

fn bench_are_related(c: &mut Criterion) {
    let mut group = c.benchmark_group("are_related");

    for size in [100, 1000].iter() {
        let graph = create_star_graph(*size);
        let hub = "hub".to_string();
        let spoke = format!("s{}", size / 2);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.are_related(&spoke, &hub)));
        });
    }

    group.finish();
}

fn bench_remove_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_node_cascade");

    for size in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || create_star_graph(size),
                |graph| black_box(graph.remove_node(&"hub".to_string())),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_check_consistency(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_consistency");

    for size in [100, 1000].iter() {
        let graph = create_chain_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.check_consistency()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_node_insertion,
    bench_relation_insertion,
    bench_outgoing,
    bench_incoming,
    bench_are_related,
    bench_remove_node,
    bench_check_consistency,
);

criterion_main!(benches);
