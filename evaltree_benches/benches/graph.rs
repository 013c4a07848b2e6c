// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use evaltree_graph::{DependencyGraph, EvaluationOrder, TraversalScratch};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn below(&mut self, upper_exclusive: u32) -> u32 {
        if upper_exclusive == 0 {
            return 0;
        }
        self.next_u32() % upper_exclusive
    }
}

/// A random DAG where every key only reads keys with smaller numbers.
fn build_dag(n: u32, edges_per_node: u32, seed: u64) -> DependencyGraph<u32> {
    let mut graph = DependencyGraph::new();
    let mut rng = Lcg::new(seed);
    graph.add_node(0);
    for from in 1..n {
        for _ in 0..edges_per_node.min(from) {
            let to = rng.below(from);
            graph.add_dependency(from, to);
        }
    }
    graph
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaltree_graph");
    group.sample_size(50);

    for &(n, edges_per_node) in &[
        (256_u32, 1_u32),
        (256_u32, 4_u32),
        (4_096_u32, 1_u32),
        (4_096_u32, 4_u32),
    ] {
        let graph = build_dag(n, edges_per_node, 0xE7A1_0000_0000_0001);

        group.bench_function(format!("order(n={n},e={edges_per_node})"), |b| {
            b.iter(|| black_box(EvaluationOrder::compute(&graph)));
        });

        let order = EvaluationOrder::compute(&graph);
        group.bench_function(
            format!("affected_from_root(n={n},e={edges_per_node})"),
            |b| {
                let mut scratch = TraversalScratch::new();
                b.iter(|| black_box(order.affected(&graph, [0], &mut scratch)));
            },
        );

        group.bench_function(
            format!("affected_from_leaf(n={n},e={edges_per_node})"),
            |b| {
                let mut scratch = TraversalScratch::new();
                b.iter(|| black_box(order.affected(&graph, [n - 1], &mut scratch)));
            },
        );

        group.bench_function(
            format!("replace_dependencies(n={n},e={edges_per_node})"),
            |b| {
                b.iter_batched(
                    || graph.clone(),
                    |mut graph| {
                        for from in (1..n).step_by(7) {
                            graph.replace_dependencies(from, [from - 1]);
                        }
                        black_box(graph);
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_graph);
criterion_main!(benches);
