// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use evaltree::{ChangeBatch, Entity, EntityConfig, EntityKind, EntityRecord, Evaluator};
use serde_json::json;

/// `n` widgets where each one reads the one before it, plus `n` that read
/// nothing.
fn build_tree(n: usize) -> Vec<EntityRecord> {
    let mut records = Vec::with_capacity(2 * n + 1);
    records.push(EntityRecord::new(
        EntityConfig::new("Input0", EntityKind::WIDGET),
        Entity::from_json(json!({ "value": 1, "meta": { "label": "root" } })),
    ));
    for i in 1..=n {
        let previous = if i == 1 {
            "Input0.value".to_owned()
        } else {
            format!("Chain{}.value", i - 1)
        };
        records.push(EntityRecord::new(
            EntityConfig::new(format!("Chain{i}"), EntityKind::WIDGET).with_dynamic_path("value"),
            Entity::from_json(json!({ "value": format!("{{{{{previous} + 1}}}}") })),
        ));
        records.push(EntityRecord::new(
            EntityConfig::new(format!("Static{i}"), EntityKind::WIDGET),
            Entity::from_json(json!({ "value": i, "label": format!("static {i}") })),
        ));
    }
    records
}

fn loaded(n: usize) -> Evaluator {
    let mut evaluator = Evaluator::default();
    evaluator
        .load(build_tree(n))
        .expect("bench trees are well formed");
    evaluator
}

fn bench_evaluator(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaltree");
    group.sample_size(30);

    for &n in &[64_usize, 512] {
        group.bench_function(format!("load(n={n})"), |b| {
            b.iter_batched(
                || build_tree(n),
                |records| {
                    let mut evaluator = Evaluator::default();
                    black_box(evaluator.load(records).expect("well formed"));
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("set_chain_root(n={n})"), |b| {
            let mut evaluator = loaded(n);
            let mut value = 0_i64;
            b.iter(|| {
                value += 1;
                let batch = ChangeBatch::new().set_value("Input0.value", json!(value));
                black_box(evaluator.apply(batch).expect("known path"));
            });
        });

        group.bench_function(format!("set_isolated_leaf(n={n})"), |b| {
            let mut evaluator = loaded(n);
            let mut value = 0_i64;
            b.iter(|| {
                value += 1;
                let batch = ChangeBatch::new().set_value("Static1.value", json!(value));
                black_box(evaluator.apply(batch).expect("known path"));
            });
        });

        group.bench_function(format!("upsert_middle_entity(n={n})"), |b| {
            let mut evaluator = loaded(n);
            let middle = n / 2;
            let config = EntityConfig::new(format!("Chain{middle}"), EntityKind::WIDGET)
                .with_dynamic_path("value");
            let entity = Entity::from_json(json!({ "value": "{{Input0.value * 2}}" }));
            b.iter(|| {
                let batch = ChangeBatch::new().upsert_entity(config.clone(), entity.clone());
                black_box(evaluator.apply(batch).expect("valid entity"));
            });
        });

        group.bench_function(format!("evaluate_all(n={n})"), |b| {
            let mut evaluator = loaded(n);
            b.iter(|| black_box(evaluator.evaluate_all()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluator);
criterion_main!(benches);
