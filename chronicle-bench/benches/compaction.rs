//! Chronicle Benchmark Suite
//!
//! Hot-path targets:
//!   retention_rank_1000 ............. < 1ms
//!   digest_compile_1000 ............. < 1ms
//!   context_assemble_budget_1000 .... < 2ms
//!   save_summarized_1000 ............ < 10ms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chronicle_bench::session_with_memories;
use chronicle_core::config::ChronicleConfig;
use chronicle_core::context;
use chronicle_core::digest;
use chronicle_core::estimate::estimate_size;
use chronicle_core::retention;
use chronicle_core::tiering;
use chronicle_core::Chronicle;

/// Benchmark: ranking and retention over growing memory logs.
fn bench_retention(c: &mut Criterion) {
    let mut group = c.benchmark_group("retention_rank");
    for size in [100, 1_000, 10_000] {
        let session = session_with_memories(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &session, |b, s| {
            b.iter(|| black_box(retention::retain(black_box(s.memories.as_slice()), 50)));
        });
    }
    group.finish();
}

/// Benchmark: digest compilation from a 1000-memory session.
fn bench_digest(c: &mut Criterion) {
    let config = ChronicleConfig::default();
    let session = session_with_memories(1_000);
    let arena = session.memories.as_slice();
    let view = retention::retain(arena, config.retention.max_memories);

    c.bench_function("digest_compile_1000", |b| {
        b.iter(|| black_box(digest::compile(&session.progression, view.records(arena), &config.digest)));
    });
}

/// Benchmark: size estimation plus encoding in both tiers.
fn bench_encode(c: &mut Criterion) {
    let config = ChronicleConfig::default();
    let session = session_with_memories(1_000);
    let estimate = estimate_size(&session, &config.estimate, &config.retention);

    c.bench_function("estimate_size_1000", |b| {
        b.iter(|| black_box(estimate_size(black_box(&session), &config.estimate, &config.retention)));
    });
    c.bench_function("encode_summarized_1000", |b| {
        b.iter(|| black_box(tiering::encode(&session, "bench", &estimate, &config)));
    });

    let mut full = estimate.clone();
    full.should_summarize = false;
    c.bench_function("encode_full_compressed_1000", |b| {
        b.iter(|| black_box(tiering::encode(&session, "bench", &full, &config)));
    });
}

/// Benchmark: context assembly under a tight and a default budget.
fn bench_context(c: &mut Criterion) {
    let config = ChronicleConfig::default();
    let session = session_with_memories(1_000);
    for budget in [100, 1_000] {
        c.bench_function(&format!("context_assemble_budget_{budget}"), |b| {
            b.iter(|| black_box(context::assemble(&session, black_box(budget), &config.context)));
        });
    }
}

/// Benchmark: a full save through the engine, eviction included.
fn bench_save(c: &mut Criterion) {
    let chronicle = Chronicle::in_memory(ChronicleConfig::default());
    let session = session_with_memories(1_000);
    c.bench_function("save_summarized_1000", |b| {
        b.iter(|| black_box(chronicle.save(&session, "bench")));
    });
}

criterion_group!(
    benches,
    bench_retention,
    bench_digest,
    bench_encode,
    bench_context,
    bench_save,
);
criterion_main!(benches);
