//! Tree reduction across input lengths and executors.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use syclrt::{tree_reduce, Platform, Queue, RuntimeConfig};
use syclrt_tracing::{init_global_tracing, TracingConfig};

fn benchmark_tree_reduce(c: &mut Criterion) {
    let _ = init_global_tracing(&TracingConfig::from_env());
    let mut group = c.benchmark_group("tree_reduce");
    group.sample_size(20);
    let mut rng = rand::thread_rng();

    for device in Platform::host(&RuntimeConfig::default()).devices() {
        let queue = Queue::builder(device.clone()).build().expect("queue");

        for size in [256usize, 1024, 4096, 16384].iter() {
            let values: Vec<i64> = (0..*size).map(|_| rng.gen_range(10..150)).collect();
            group.throughput(Throughput::Elements(*size as u64));

            group.bench_with_input(BenchmarkId::new(device.name(), size), &values, |b, values| {
                b.iter(|| tree_reduce(&queue, black_box(values), 100, |a, b| a + b).expect("reduce"));
            });
        }
    }

    group.finish();
}

fn benchmark_sequential_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_fold");
    let mut rng = rand::thread_rng();

    for size in [256usize, 1024, 4096, 16384].iter() {
        let values: Vec<i64> = (0..*size).map(|_| rng.gen_range(10..150)).collect();
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| black_box(values).iter().fold(100i64, |a, &b| a + b));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_tree_reduce, benchmark_sequential_fold);
criterion_main!(benches);
