use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use shared_rc::{Shared, Weak};
use std::time::Duration;

fn bench_fused_new(c: &mut Criterion) {
    c.bench_function("shared_fused_new_drop", |b| {
        b.iter(|| {
            let s = Shared::new(black_box(42u64));
            black_box(&s);
            drop(s);
        })
    });
}

fn bench_box_adopt(c: &mut Criterion) {
    c.bench_function("shared_from_box_drop", |b| {
        b.iter_batched(
            || Box::new(42u64),
            |boxed| {
                let s = Shared::from_box(boxed);
                black_box(&s);
                drop(s);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_clone_drop(c: &mut Criterion) {
    c.bench_function("shared_clone_drop", |b| {
        let s = Shared::new(1u64);
        b.iter(|| {
            let x = s.clone();
            black_box(&x);
            drop(x);
        })
    });
}

fn bench_upgrade_hit(c: &mut Criterion) {
    c.bench_function("weak_upgrade_hit", |b| {
        let s = Shared::new(1u64);
        let w = Shared::downgrade(&s);
        b.iter(|| {
            let up = w.upgrade();
            black_box(&up);
            drop(up);
        })
    });
}

fn bench_upgrade_miss(c: &mut Criterion) {
    c.bench_function("weak_upgrade_miss", |b| {
        let w: Weak<u64> = {
            let s = Shared::new(1u64);
            Shared::downgrade(&s)
        };
        b.iter(|| {
            black_box(w.upgrade().is_none());
        })
    });
}

fn bench_downgrade_drop(c: &mut Criterion) {
    c.bench_function("shared_downgrade_drop", |b| {
        let s = Shared::new(1u64);
        b.iter(|| {
            let w = Shared::downgrade(&s);
            black_box(&w);
            drop(w);
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_fused_new, bench_box_adopt, bench_clone_drop,
        bench_upgrade_hit, bench_upgrade_miss, bench_downgrade_drop
}
criterion_main!(benches);
