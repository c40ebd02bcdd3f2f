use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use replaybus::{JobResult, SubmitError, Task, TaskError, WorkerPool};
use rstest::rstest;
use tokio::{sync::mpsc, time::timeout};

/// Возводит число в квадрат; кратные 7 считаются ошибкой.
struct SquareTask(u64);

#[async_trait]
impl Task for SquareTask {
    type Output = u64;

    async fn execute(&self) -> anyhow::Result<u64> {
        tokio::time::sleep(Duration::from_millis(self.0 % 5)).await;
        if self.0 % 7 == 0 {
            anyhow::bail!("{} is a multiple of seven", self.0);
        }
        Ok(self.0 * self.0)
    }
}

fn spawn_collector(
    mut results: mpsc::Receiver<JobResult<u64>>
) -> tokio::task::JoinHandle<Vec<JobResult<u64>>> {
    tokio::spawn(async move {
        let mut all = Vec::new();
        while let Some(result) = results.recv().await {
            all.push(result);
        }
        all
    })
}

/// Тест проверяет базовый сценарий: два воркера, очередь на пять задач,
/// квадраты 1..5 в любом порядке завершения.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_squares_scenario() {
    let pool = WorkerPool::new(2, 5).unwrap();
    let mut results = pool.take_results().unwrap();
    pool.start();

    for n in 1..=5 {
        pool.submit_job(SquareTask(n)).unwrap();
    }
    timeout(Duration::from_secs(2), pool.wait())
        .await
        .expect("pool did not finish");

    let mut squares = HashSet::new();
    for _ in 0..5 {
        let result = results.recv().await.unwrap();
        squares.insert(result.output.unwrap());
    }
    assert_eq!(squares, HashSet::from([1, 4, 9, 16, 25]));
    assert!(results.try_recv().is_err());
}

/// Тест проверяет, что после `wait` у каждой принятой задачи ровно один
/// результат, при разных размерах пула и очереди.
#[rstest]
#[case(1, 1)]
#[case(2, 5)]
#[case(4, 16)]
#[case(8, 3)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_accepted_job_has_one_result(
    #[case] workers: usize,
    #[case] queue: usize,
) {
    let pool = WorkerPool::new(workers, queue).unwrap();
    let collector = spawn_collector(pool.take_results().unwrap());
    pool.start();

    let mut accepted = HashSet::new();
    let mut rejected = 0;
    for n in 1..=100 {
        match pool.submit_job(SquareTask(n)) {
            Ok(id) => {
                accepted.insert(id);
            }
            Err(r) => {
                assert!(matches!(r.reason(), SubmitError::QueueFull { .. }));
                rejected += 1;
                tokio::task::yield_now().await;
            }
        }
    }
    timeout(Duration::from_secs(5), pool.wait())
        .await
        .expect("pool did not finish");

    pool.shutdown();
    pool.join().await;
    let results = collector.await.unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.job_id).collect();
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate results");
    assert_eq!(unique, accepted);

    let failures = results
        .iter()
        .filter(|r| matches!(r.output, Err(TaskError::Failed(_))))
        .count();
    let stats = pool.stats();
    assert_eq!(stats.failed as usize, failures);
    assert_eq!(stats.rejected, rejected);
    assert_eq!(stats.submitted as usize, accepted.len());
}

/// Тест проверяет, что закрытый пул сразу отклоняет задачи.
#[tokio::test]
async fn test_submit_after_shutdown_is_rejected() {
    let pool = WorkerPool::new(1, 4).unwrap();
    pool.start();
    pool.shutdown();

    let rejected = pool.submit_job(SquareTask(3)).unwrap_err();
    assert_eq!(rejected.reason(), SubmitError::Closed);
    assert_eq!(rejected.into_task().0, 3);
    timeout(Duration::from_secs(1), pool.join())
        .await
        .expect("workers did not stop");
}
