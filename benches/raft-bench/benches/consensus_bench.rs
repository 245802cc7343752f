//! Raft consensus benchmarks.
//!
//! Measures:
//! - Election from a cold start to a leader
//! - Propose -> commit cycle in fault-tolerant mode
//! - Lightweight propose -> apply cycle
//! - Failure detector ticks and quorum evaluation at growing peer counts
//! - Cluster sizes: 3, 5, 9

use {
    criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput},
    rand::Rng,
    raft_fault_bench::helpers::BenchCluster,
    raft_fault_consensus::{
        count_acks, evaluate, FailureConfig, HeartbeatDetector, NodeId, RaftMode,
    },
    std::hint::black_box,
};

const CLUSTER_SIZES: [u64; 3] = [3, 5, 9];

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_cold_election(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/cold_election");
    for &n in &CLUSTER_SIZES {
        group.bench_with_input(BenchmarkId::new("nodes", n), &n, |b, &n| {
            b.iter(|| {
                let mut cluster = BenchCluster::new(n, RaftMode::FaultTolerant);
                black_box(cluster.elect())
            });
        });
    }
    group.finish();
}

fn bench_propose_commit_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/propose_commit_cycle");
    for &n in &CLUSTER_SIZES {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("nodes", n), &n, |b, &n| {
            b.iter(|| {
                let mut cluster = BenchCluster::new(n, RaftMode::FaultTolerant);
                let leader = cluster.elect();
                for value in 0..100 {
                    cluster.propose(leader, value);
                }
                black_box(cluster.engines[leader].state().commit_index)
            });
        });
    }
    group.finish();
}

fn bench_lightweight_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/lightweight_cycle");
    for &n in &CLUSTER_SIZES {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("nodes", n), &n, |b, &n| {
            b.iter(|| {
                let mut cluster = BenchCluster::new(n, RaftMode::Lightweight);
                let leader = cluster.elect();
                for value in 0..100 {
                    cluster.propose(leader, value);
                }
                black_box(cluster.engines[0].committed_value("seq").cloned())
            });
        });
    }
    group.finish();
}

fn bench_detector_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("failure_detector/tick");
    for &peers in &[8u64, 64, 512] {
        group.throughput(Throughput::Elements(peers));
        group.bench_with_input(BenchmarkId::new("peers", peers), &peers, |b, &peers| {
            let mut rng = rand::rng();
            let mut detector = HeartbeatDetector::new(
                NodeId(0),
                FailureConfig::default(),
                (1..=peers).map(NodeId),
                0,
            );
            let mut now = 0u64;
            b.iter(|| {
                now += 10;
                let peer = NodeId(rng.random_range(1..=peers));
                detector.record_contact(peer, now);
                black_box(detector.tick(now))
            });
        });
    }
    group.finish();
}

fn bench_quorum_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("quorum/evaluate");
    for &peers in &[8u64, 64, 512] {
        group.bench_with_input(BenchmarkId::new("peers", peers), &peers, |b, &peers| {
            let detector = HeartbeatDetector::new(
                NodeId(0),
                FailureConfig::default(),
                (1..=peers).map(NodeId),
                0,
            );
            let acks: Vec<NodeId> = (0..=peers).step_by(2).map(NodeId).collect();
            b.iter(|| {
                let active = detector.active_set();
                black_box(evaluate(count_acks(&acks, &active), &active))
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cold_election,
    bench_propose_commit_cycle,
    bench_lightweight_cycle,
    bench_detector_tick,
    bench_quorum_evaluation,
);
criterion_main!(benches);
