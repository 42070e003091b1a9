//! Benchmark: collection cost per watched object
//!
//! Measures how long a forced collection takes to sweep a registry and
//! deliver notifications, as the number of watched objects grows.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use reclaim::{collect, FinalizationRegistry};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Node {
    value: i64,
}

fn counting_registry() -> (FinalizationRegistry, Arc<AtomicUsize>) {
    let delivered = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&delivered);
    let registry = FinalizationRegistry::new(
        move |_key| {
            count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        },
        |_error| {},
    );
    (registry, delivered)
}

fn bench_collect_reclaimed(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_reclaimed");
    for objects in [100_i64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(objects), &objects, |b, &n| {
            let (registry, delivered) = counting_registry();
            b.iter(|| {
                let nodes: Vec<Arc<Node>> = (0..n).map(|value| Arc::new(Node { value })).collect();
                for node in &nodes {
                    registry.register(node, "node");
                }
                black_box(nodes.iter().map(|n| n.value).sum::<i64>());
                drop(nodes);
                black_box(collect());
            });
            black_box(delivered.load(Ordering::Relaxed));
        });
    }
    group.finish();
}

fn bench_collect_live(c: &mut Criterion) {
    let (registry, _delivered) = counting_registry();
    let nodes: Vec<Arc<Node>> = (0..10_000).map(|value| Arc::new(Node { value })).collect();
    for node in &nodes {
        registry.register(node, "live");
    }

    c.bench_function("collect_10000_live_objects", |b| {
        b.iter(|| black_box(collect()));
    });

    black_box(&nodes);
}

fn bench_register_unregister(c: &mut Criterion) {
    let (registry, _delivered) = counting_registry();
    c.bench_function("register_unregister_1000", |b| {
        let node = Arc::new(Node { value: 0 });
        b.iter(|| {
            for _ in 0..1000 {
                registry.register(&node, "churn");
            }
            black_box(registry.unregister("churn"));
        });
    });
}

criterion_group!(
    name = collect_cost;
    config = Criterion::default()
        .sample_size(30)
        .warm_up_time(Duration::from_millis(200))
        .measurement_time(Duration::from_secs(2));
    targets =
        bench_collect_reclaimed,
        bench_collect_live,
        bench_register_unregister,
);

criterion_main!(collect_cost);
