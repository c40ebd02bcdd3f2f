use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use replaybus::{TaskFn, WorkerPool};
use tokio::runtime::Runtime;

const JOBS: usize = 256;

/// Отправляет `JOBS` задач и ждёт их выполнения. При заполненной очереди
/// уступает планировщику и повторяет.
fn bench_submit_and_wait(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("pool_submit_and_wait");
    group.throughput(Throughput::Elements(JOBS as u64));

    for workers in [1usize, 4, 16] {
        let pool = rt.block_on(async {
            let pool = WorkerPool::new(workers, 64).unwrap();
            let mut results = pool.take_results().unwrap();
            tokio::spawn(async move { while results.recv().await.is_some() {} });
            pool.start();
            pool
        });

        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.to_async(&rt).iter(|| async {
                for n in 0..JOBS {
                    let mut task = TaskFn::new(move || async move { Ok::<_, anyhow::Error>(n * n) });
                    loop {
                        match pool.submit_job(task) {
                            Ok(id) => {
                                black_box(id);
                                break;
                            }
                            Err(rejected) => {
                                task = rejected.into_task();
                                tokio::task::yield_now().await;
                            }
                        }
                    }
                }
                pool.wait().await;
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_submit_and_wait);
criterion_main!(benches);
