//! Performance Benchmarks for the Census Ledger
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use census::fhe::{DecryptionGateway, DecryptionOracle, PlainBackend};
use census::ledger::{CallContext, CensusAnswers, CensusContract, Identity};

type Ledger = CensusContract<PlainBackend, Arc<DecryptionGateway<PlainBackend>>>;

const BATCH_SIZES: [usize; 4] = [10, 100, 1_000, 10_000];

fn populated(records: usize) -> (Ledger, Arc<DecryptionGateway<PlainBackend>>, Vec<u64>) {
    let admin = Identity::from_label("admin");
    let alice = Identity::from_label("alice");
    let gateway = Arc::new(DecryptionGateway::generate(PlainBackend::new()));
    let mut ledger = CensusContract::new(admin, PlainBackend::new(), gateway.clone());
    ledger.authorize(&CallContext::at(admin, 0), alice).unwrap();

    let ids = (0..records as u64)
        .map(|i| {
            let fields = CensusAnswers {
                age: i % 90,
                birth_year: 2024 - i % 90,
                occupation: i % 4,
                location: i % 3,
                family_size: 1 + i % 6,
            }
            .encrypt(&PlainBackend::new())
            .unwrap();
            ledger.submit(&CallContext::at(alice, 0), fields).unwrap()
        })
        .collect();

    (ledger, gateway, ids)
}

// =============================================================================
// RECORD STORE BENCHMARKS
// =============================================================================

fn bench_submit(c: &mut Criterion) {
    let (mut ledger, _, _) = populated(0);
    let alice = Identity::from_label("alice");
    let fields = CensusAnswers {
        age: 30,
        birth_year: 1994,
        occupation: 1,
        location: 2,
        family_size: 3,
    }
    .encrypt(&PlainBackend::new())
    .unwrap();

    c.bench_function("submit", |b| {
        b.iter(|| {
            ledger
                .submit(&CallContext::at(alice, 0), fields.clone())
                .unwrap()
        })
    });
}

// =============================================================================
// ANALYSIS BENCHMARKS
// =============================================================================

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let alice = Identity::from_label("alice");

    for size in BATCH_SIZES {
        let (mut ledger, _, ids) = populated(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| ledger.analyze(&CallContext::at(alice, 0), ids).unwrap())
        });
    }

    group.finish();
}

fn bench_age_distribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("age_distribution");

    for size in BATCH_SIZES {
        let (ledger, _, ids) = populated(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| ledger.age_distribution(ids).unwrap())
        });
    }

    group.finish();
}

fn bench_family_connections(c: &mut Criterion) {
    let mut group = c.benchmark_group("family_connections");

    for size in BATCH_SIZES {
        let (ledger, _, ids) = populated(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| ledger.family_connections(ids).unwrap())
        });
    }

    group.finish();
}

// =============================================================================
// DECRYPTION BENCHMARKS
// =============================================================================

fn bench_request_and_reveal(c: &mut Criterion) {
    let (mut ledger, gateway, ids) = populated(100);
    let alice = Identity::from_label("alice");

    c.bench_function("request_fulfill_reveal", |b| {
        b.iter(|| {
            // Never delivered, so the analysis stays unrevealed between iterations
            let analysis_id = ledger.analyze(&CallContext::at(alice, 0), &ids).unwrap();
            let request_id = ledger.request_decryption(analysis_id).unwrap();
            let response = gateway.fulfill_next().unwrap().unwrap();
            let valid = ledger
                .oracle()
                .verify_proof(request_id, &response.payload, &response.proof);
            assert!(valid);
        })
    });
}

fn bench_state_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_root");

    for size in [10usize, 100, 1_000] {
        let (ledger, _, _) = populated(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &ledger, |b, ledger| {
            b.iter(|| ledger.state_root().unwrap())
        });
    }

    group.finish();
}

criterion_group!(records, bench_submit);

criterion_group!(
    analysis,
    bench_analyze,
    bench_age_distribution,
    bench_family_connections,
);

criterion_group!(decryption, bench_request_and_reveal, bench_state_root);

criterion_main!(records, analysis, decryption);
