// Counter-layer micro-benchmarks. Requires the `bench_internal`
// feature, which exposes the token layer for benches only.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shared_rc::{Count, StrongCount, WeakCount};
use std::time::Duration;

fn bench_strong_get_put(c: &mut Criterion) {
    c.bench_function("counter::strong_get_put", |b| {
        let ctr = StrongCount::new();
        let held = ctr.get(); // keep the count positive across iterations
        b.iter(|| {
            let t = ctr.get();
            black_box(ctr.value());
            ctr.put(t);
        });
        ctr.put(held);
    });
}

fn bench_weak_get_put(c: &mut Criterion) {
    c.bench_function("counter::weak_get_put", |b| {
        let ctr = WeakCount::new();
        let held = ctr.get();
        b.iter(|| {
            let t = ctr.get();
            black_box(ctr.value());
            ctr.put(t);
        });
        ctr.put(held);
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_strong_get_put, bench_weak_get_put
}
criterion_main!(benches);
