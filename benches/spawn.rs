use std::hint::black_box;

use corerun::Executor;
use criterion::{Criterion, criterion_group, criterion_main};

async fn work() -> usize {
    let val = 1 + 1;
    corerun::yield_now().await;
    black_box(val)
}

fn single_threaded_spawn(c: &mut Criterion) {
    let exec = Executor::new(1, 1);

    c.bench_function("single_threaded_spawn", |b| {
        b.iter(|| {
            exec.block_on(|| async {
                let h = corerun::spawn(work());
                assert_eq!(h.await.unwrap(), 2);
            });
        });
    });
}

fn single_threaded_spawn10(c: &mut Criterion) {
    let exec = Executor::new(1, 1);

    c.bench_function("single_threaded_spawn10", |b| {
        b.iter(|| {
            exec.block_on(|| async {
                let mut handles = Vec::with_capacity(10);
                for _ in 0..10 {
                    handles.push(corerun::spawn(work()));
                }
                for handle in handles {
                    assert_eq!(handle.await.unwrap(), 2);
                }
            });
        });
    });
}

fn multi_threaded_spawn10(c: &mut Criterion) {
    let exec = Executor::new(4, 1);

    c.bench_function("multi_threaded_spawn10", |b| {
        b.iter(|| {
            exec.block_on(|| async {
                let mut handles = Vec::with_capacity(10);
                for _ in 0..10 {
                    handles.push(corerun::spawn(work()));
                }
                for handle in handles {
                    assert_eq!(handle.await.unwrap(), 2);
                }
            });
        });
    });
}

criterion_group!(
    spawn,
    single_threaded_spawn,
    single_threaded_spawn10,
    multi_threaded_spawn10,
);
criterion_main!(spawn);
