//! Benchmarks for executor overhead.
//!
//! Measures the full lifecycle around a no-op read capability: policy,
//! confirmation gate, validation, audit emission, and the idempotency
//! store on the cached and uncached paths.

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use warden_engine::{
    ActionEnvelope, CapabilityDescriptor, CapabilityRegistry, Executor, Invocation,
    MemoryIdempotencyStore, RiskLevel, TracingAuditSink,
};

fn executor() -> Executor<()> {
    let mut registry: CapabilityRegistry<()> = CapabilityRegistry::new();
    let noop = CapabilityDescriptor::new("bench.noop", |args, _ctx| async move { Ok(args) })
        .with_risk_level(RiskLevel::Read)
        .with_validator_fn(Ok);
    registry.register(noop).unwrap();

    Executor::new(Arc::new(registry))
        .with_audit_sink(Arc::new(TracingAuditSink))
        .with_idempotency_store(Arc::new(MemoryIdempotencyStore::new(100_000)))
}

fn bench_execute(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let context = Arc::new(());

    let mut group = c.benchmark_group("executor");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    // Full lifecycle, no idempotency key.
    let exec = executor();
    group.bench_function("noop_uncached", |b| {
        b.iter(|| {
            let envelope = ActionEnvelope::new("bench.noop", json!({"n": 1}));
            runtime.block_on(exec.execute(Invocation::new(envelope, Arc::clone(&context))))
        });
    });

    // Same key every time: everything after the first call is a replay.
    let exec = executor();
    group.bench_function("noop_replay", |b| {
        b.iter(|| {
            let envelope =
                ActionEnvelope::new("bench.noop", json!({"n": 1})).with_idempotency_key("hot");
            runtime.block_on(exec.execute(Invocation::new(envelope, Arc::clone(&context))))
        });
    });

    // Fresh key every time: lock, miss, execute, store.
    let exec = executor();
    group.bench_function("noop_fresh_keys", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            idx += 1;
            let envelope = ActionEnvelope::new("bench.noop", json!({"n": idx}))
                .with_idempotency_key(format!("key-{}", idx));
            runtime.block_on(exec.execute(Invocation::new(envelope, Arc::clone(&context))))
        });
    });

    // Unknown action: the cheapest exit.
    let exec = executor();
    group.bench_function("unknown_action", |b| {
        b.iter(|| {
            let envelope = ActionEnvelope::new("bench.missing", json!({}));
            runtime.block_on(exec.execute(Invocation::new(envelope, Arc::clone(&context))))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_execute);
criterion_main!(benches);
