// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Evaluation throughput benchmarks
//!
//! Run with: cargo bench -p dialogeval-evals --bench evaluate_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dialogeval_core::{Dialogue, RoleSpec, Seed};
use dialogeval_evals::metrics::{moving_average_ttr, RougeLMetric};
use dialogeval_evals::QualityEvaluator;
use std::sync::Arc;
use tokio::runtime::Runtime;

const VOCAB: [&str; 16] = [
    "order", "refund", "charge", "payment", "account", "card", "duplicate", "receipt", "provider",
    "customer", "agent", "please", "thanks", "today", "confirm", "balance",
];

fn generate_dialogue(id: usize, turns: usize, words_per_turn: usize) -> Dialogue {
    let pairs = (0..turns).map(|t| {
        let role = if t % 2 == 0 { "customer" } else { "agent" };
        let content = (0..words_per_turn)
            .map(|w| VOCAB[(id * 7 + t * 13 + w * 3) % VOCAB.len()])
            .collect::<Vec<_>>()
            .join(" ");
        (role, content)
    });
    Dialogue::from_pairs(format!("dlg-{id}"), pairs)
}

fn seed() -> Seed {
    Seed::new(
        "seed-bench",
        "customer_support",
        vec![RoleSpec::new("customer", ""), RoleSpec::new("agent", "")],
        "Refund the duplicate charge on the customer order",
    )
    .with_expected_flow(["greet", "look up the order", "refund the duplicate charge"])
    .with_context("The payment provider charged the card twice")
}

fn bench_single_evaluation(c: &mut Criterion) {
    let evaluator = QualityEvaluator::new();
    let seed = seed();
    let mut group = c.benchmark_group("evaluate");

    for turns in [4, 16, 64].iter() {
        let dialogue = generate_dialogue(1, *turns, 24);
        group.throughput(Throughput::Elements(*turns as u64));
        group.bench_with_input(BenchmarkId::from_parameter(turns), &dialogue, |b, dialogue| {
            b.iter(|| evaluator.evaluate(black_box(dialogue), black_box(&seed)).unwrap());
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let evaluator = Arc::new(QualityEvaluator::new());
    let dialogues: Vec<Dialogue> = (0..64).map(|i| generate_dialogue(i, 12, 20)).collect();
    let seeds = vec![seed(); dialogues.len()];

    let mut group = c.benchmark_group("batch_64");
    group.throughput(Throughput::Elements(dialogues.len() as u64));
    group.bench_function("sequential", |b| {
        b.iter(|| evaluator.evaluate_batch(black_box(&dialogues), black_box(&seeds)).unwrap());
    });
    group.bench_function("parallel", |b| {
        b.iter(|| {
            rt.block_on(
                Arc::clone(&evaluator).evaluate_batch_parallel(dialogues.clone(), seeds.clone()),
            )
            .unwrap()
        });
    });
    group.finish();
}

fn bench_primitives(c: &mut Criterion) {
    let rouge = RougeLMetric::new();
    let reference = generate_dialogue(3, 1, 200).content_text();
    let hypothesis = generate_dialogue(4, 1, 200).content_text();
    c.bench_function("rouge_l_200x200", |b| {
        b.iter(|| rouge.rouge_l(black_box(&reference), black_box(&hypothesis)))
    });

    let tokens: Vec<String> = hypothesis.split_whitespace().map(String::from).collect();
    c.bench_function("mattr_200", |b| {
        b.iter(|| moving_average_ttr(black_box(&tokens), 50))
    });
}

criterion_group!(benches, bench_single_evaluation, bench_batch, bench_primitives);
criterion_main!(benches);
