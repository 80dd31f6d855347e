use corerun::Executor;
use criterion::{Criterion, criterion_group, criterion_main};

const PINGS: usize = 10_000;

fn ping_single_threaded(c: &mut Criterion) {
    let exec = Executor::new(1, 1);

    c.bench_function("ping_10k_single_threaded", |b| {
        b.iter(|| {
            exec.block_on(|| async {
                for _ in 0..PINGS {
                    corerun::yield_now().await;
                }
            });
        });
    });
}

fn ping_pong_single_threaded(c: &mut Criterion) {
    let exec = Executor::new(1, 1);

    c.bench_function("ping_pong_10k_single_threaded", |b| {
        b.iter(|| {
            exec.block_on(|| async {
                let h1 = corerun::spawn(async {
                    for _ in 0..PINGS {
                        corerun::yield_now().await;
                    }
                });
                let h2 = corerun::spawn(async {
                    for _ in 0..PINGS {
                        corerun::yield_now().await;
                    }
                });
                h1.await.unwrap();
                h2.await.unwrap();
            });
        });
    });
}

fn ping_pong_multi_threaded(c: &mut Criterion) {
    let exec = Executor::new(4, 1);

    c.bench_function("ping_pong_10k_multi_threaded", |b| {
        b.iter(|| {
            exec.block_on(|| async {
                let h1 = corerun::spawn(async {
                    for _ in 0..PINGS {
                        corerun::yield_now().await;
                    }
                });
                let h2 = corerun::spawn(async {
                    for _ in 0..PINGS {
                        corerun::yield_now().await;
                    }
                });
                h1.await.unwrap();
                h2.await.unwrap();
            });
        });
    });
}

criterion_group!(
    ping_pong,
    ping_single_threaded,
    ping_pong_single_threaded,
    ping_pong_multi_threaded,
);
criterion_main!(ping_pong);
