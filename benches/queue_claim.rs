//! Claim hot-path micro-benchmark: submit N tasks, then drain the queue
//! one claim at a time.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use ensemble::adapters::memory::InMemoryCoordinationStore;
use ensemble::domain::models::{Task, TaskEnvelope, TaskKind, TaskPriority, TASK_BODY_TTL_MS};
use ensemble::domain::ports::CoordinationStore;

fn bench_claim(c: &mut Criterion) {
    let runtime = Runtime::new().expect("runtime");

    c.bench_function("claim_from_queue_of_1000", |b| {
        b.iter_batched(
            || {
                let store = Arc::new(InMemoryCoordinationStore::new());
                runtime.block_on(async {
                    for i in 0..1_000u32 {
                        let priority = match i % 4 {
                            0 => TaskPriority::Low,
                            1 => TaskPriority::Medium,
                            2 => TaskPriority::High,
                            _ => TaskPriority::Urgent,
                        };
                        let task = Task::new(TaskKind::CodeGeneration, format!("task {i}"))
                            .expect("valid task")
                            .with_priority(priority);
                        let envelope = TaskEnvelope::new(task);
                        store
                            .submit(&envelope, TASK_BODY_TTL_MS, envelope.priority_score(), "bench")
                            .await
                            .expect("submit");
                    }
                });
                store
            },
            |store| {
                runtime.block_on(async {
                    while store
                        .claim_next("bench-node", 300_000)
                        .await
                        .expect("claim")
                        .is_some()
                    {}
                });
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_claim);
criterion_main!(benches);
