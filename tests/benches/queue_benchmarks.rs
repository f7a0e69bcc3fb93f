//! # Transaction Queue Benchmarks
//!
//! | Path | Operation | Target |
//! |------|-----------|--------|
//! | Admission | `enqueue()` onto a busy slot | < 10µs per tx |
//! | Completion | `on_transaction_finished()` + next dispatch | < 10µs per tx |
//! | Idle check | `IdleSupervisor::evaluate()` | < 1µs |

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pw_01_transaction_queue::ports::testing::{FakeBackend, MockTimeSource};
use pw_01_transaction_queue::{
    IdleSupervisor, NoOpNotifier, QueueConfig, Transaction, TransactionQueue,
};
use shared_types::{CallerIdentity, ExecutionOutcome, SessionId, TransactionRequest};

fn queue() -> (Arc<TransactionQueue>, Arc<FakeBackend>, Arc<MockTimeSource>) {
    let backend = Arc::new(FakeBackend::new());
    let time = Arc::new(MockTimeSource::new(1_000_000));
    let queue = Arc::new(TransactionQueue::new(
        QueueConfig::default(),
        backend.clone(),
        Arc::new(NoOpNotifier),
        time.clone(),
    ));
    (queue, backend, time)
}

fn transaction(n: usize) -> Transaction {
    let caller = CallerIdentity::new(1000, SessionId::new(format!(":1.{}", n % 8)));
    Transaction::new(caller, TransactionRequest::UpdateCache, 1_000_000)
}

fn bench_admit_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pw-01-transaction-queue");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("enqueue", size), &size, |b, &size| {
            b.iter_with_setup(
                || (queue(), (0..size).map(transaction).collect::<Vec<_>>()),
                |((queue, _, _), txs)| {
                    for tx in txs {
                        black_box(queue.enqueue(tx));
                    }
                },
            )
        });

        group.bench_with_input(BenchmarkId::new("drain", size), &size, |b, &size| {
            b.iter_with_setup(
                || {
                    let (queue, backend, time) = queue();
                    for tx in (0..size).map(transaction) {
                        queue.enqueue(tx);
                    }
                    (queue, backend, time)
                },
                |(queue, _, _)| {
                    while let Some(id) = queue.running() {
                        black_box(
                            queue
                                .on_transaction_finished(id, ExecutionOutcome::Succeeded)
                                .ok(),
                        );
                    }
                },
            )
        });
    }

    group.finish();
}

fn bench_idle_evaluate(c: &mut Criterion) {
    let (queue, backend, time) = queue();
    let supervisor = IdleSupervisor::new(queue, backend, time, 30_000);

    c.bench_function("idle_evaluate", |b| b.iter(|| black_box(supervisor.evaluate())));
}

criterion_group!(benches, bench_admit_and_drain, bench_idle_evaluate);
criterion_main!(benches);
