use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use replaybus_error::{PoolError, SubmitError, TaskError};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex, Notify},
    task::JoinSet,
};
use tracing::{debug, trace, warn};

use super::{Job, JobId, JobResult, Task};

/// Параметры пула: число воркеров и ёмкость очередей задач/результатов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

/// Отказ в приёме задачи. Возвращает задачу обратно, чтобы вызывающий
/// мог повторить попытку или отбросить её.
pub struct Rejected<T> {
    reason: SubmitError,
    task: T,
}

/// Счётчики пула.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

/// Снимок счётчиков пула.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub outstanding: usize,
}

/// Пул фиксированного размера, разбирающий ограниченную очередь задач.
///
/// - `submit_job` никогда не блокируется: при заполненной очереди задача
///   сразу возвращается с [`SubmitError::QueueFull`];
/// - каждый воркер ждёт следующую задачу, выполняет её, публикует
///   [`JobResult`] и уменьшает счётчик незавершённой работы;
/// - `shutdown` закрывает приём, уже поставленные задачи дорабатываются.
///
/// Приём задач и остановка взаимно исключены одной блокировкой, поэтому
/// задача не может попасть в очередь после `shutdown`.
///
/// Очередь результатов имеет ту же ёмкость, что и очередь задач. Воркер
/// ждёт свободного места в ней, так что забравший приёмник через
/// [`take_results`](Self::take_results) должен его вычитывать. Приёмник
/// нужно забрать до [`start`](Self::start): иначе `start` его отбрасывает,
/// и результаты молча теряются.
///
/// Удаление пула прерывает его воркеры.
pub struct WorkerPool<T: Task> {
    config: PoolConfig,
    admission: Mutex<Admission<T>>,
    queue: Arc<AsyncMutex<mpsc::Receiver<Job<T>>>>,
    results_tx: Mutex<Option<mpsc::Sender<JobResult<T::Output>>>>,
    results_rx: Mutex<Option<mpsc::Receiver<JobResult<T::Output>>>>,
    outstanding: Arc<Outstanding>,
    started: AtomicBool,
    workers: Mutex<JoinSet<()>>,
    metrics: Arc<PoolMetrics>,
}

/// Сторона приёма задач. `sender == None` означает, что пул остановлен.
struct Admission<T> {
    sender: Option<mpsc::Sender<Job<T>>>,
    last_job_id: u64,
}

/// Счётчик незавершённой работы с сигналом "счётчик дошёл до нуля".
#[derive(Debug, Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl PoolConfig {
    pub fn new(
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            workers,
            queue_capacity,
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "workers must be greater than zero".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "queue_capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl<T> Rejected<T> {
    fn new(
        reason: SubmitError,
        task: T,
    ) -> Self {
        Self { reason, task }
    }

    pub fn reason(&self) -> SubmitError {
        self.reason
    }

    pub fn into_task(self) -> T {
        self.task
    }

    pub fn into_parts(self) -> (SubmitError, T) {
        (self.reason, self.task)
    }
}

impl PoolMetrics {
    pub fn snapshot(
        &self,
        outstanding: usize,
    ) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            outstanding,
        }
    }
}

impl Outstanding {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Регистрируемся до проверки, чтобы не пропустить notify_waiters.
            notified.as_mut().enable();
            if self.get() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl<T: Task> WorkerPool<T> {
    /// Создаёт пул из `workers` воркеров с очередями ёмкости
    /// `queue_capacity`. Воркеры не запускаются до вызова [`start`](Self::start).
    pub fn new(
        workers: usize,
        queue_capacity: usize,
    ) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig::new(workers, queue_capacity))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(config.queue_capacity);

        Ok(Self {
            config,
            admission: Mutex::new(Admission {
                sender: Some(job_tx),
                last_job_id: 0,
            }),
            queue: Arc::new(AsyncMutex::new(job_rx)),
            results_tx: Mutex::new(Some(result_tx)),
            results_rx: Mutex::new(Some(result_rx)),
            outstanding: Arc::new(Outstanding::default()),
            started: AtomicBool::new(false),
            workers: Mutex::new(JoinSet::new()),
            metrics: Arc::new(PoolMetrics::default()),
        })
    }

    /// Запускает воркеры. Должен вызываться внутри рантайма Tokio.
    ///
    /// Если приёмник результатов никто не забрал, он отбрасывается: иначе
    /// воркеры упёрлись бы в заполненную очередь результатов.
    ///
    /// Повторный вызов ничего не делает и возвращает `false`.
    pub fn start(&self) -> bool {
        if self.started.swap(true, Ordering::AcqRel) {
            return false;
        }
        let Some(results) = self.results_tx.lock().take() else {
            return false;
        };
        if self.results_rx.lock().take().is_some() {
            trace!("no result consumer attached, results will be discarded");
        }

        let mut workers = self.workers.lock();
        for worker_id in 1..=self.config.workers {
            workers.spawn(run_worker(
                worker_id,
                self.queue.clone(),
                results.clone(),
                self.outstanding.clone(),
                self.metrics.clone(),
            ));
        }

        debug!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "worker pool started"
        );
        true
    }

    /// Неблокирующая постановка задачи в очередь.
    ///
    /// При успехе увеличивает счётчик незавершённой работы и возвращает
    /// идентификатор задачи.
    pub fn submit_job(
        &self,
        task: T,
    ) -> Result<JobId, Rejected<T>> {
        let mut admission = self.admission.lock();
        let Some(sender) = admission.sender.as_ref() else {
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Rejected::new(SubmitError::Closed, task));
        };

        let id = JobId::new(admission.last_job_id + 1);
        // Увеличиваем до отправки: воркер может завершить задачу раньше,
        // чем мы вернёмся из try_send.
        self.outstanding.increment();

        match sender.try_send(Job::new(id, task)) {
            Ok(()) => {
                admission.last_job_id = id.value();
                self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
                trace!(job_id = %id, "job submitted");
                Ok(id)
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.outstanding.decrement();
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                Err(Rejected::new(
                    SubmitError::QueueFull {
                        capacity: self.config.queue_capacity,
                    },
                    job.task,
                ))
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.outstanding.decrement();
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                Err(Rejected::new(SubmitError::Closed, job.task))
            }
        }
    }

    /// Ждёт, пока счётчик незавершённой работы не станет нулевым.
    ///
    /// Если воркеры не запущены, а в очереди есть задачи, ожидание не
    /// завершится.
    pub async fn wait(&self) {
        self.outstanding.wait_idle().await;
    }

    /// Закрывает приём задач. Уже поставленные задачи будут выполнены,
    /// после чего воркеры завершатся.
    ///
    /// Возвращает `false`, если пул уже был остановлен.
    pub fn shutdown(&self) -> bool {
        let closed = self.admission.lock().sender.take().is_some();
        if closed {
            debug!(
                outstanding = self.outstanding.get(),
                "worker pool shutting down"
            );
        }
        closed
    }

    /// Ждёт завершения всех воркеров. Имеет смысл после [`shutdown`](Self::shutdown).
    pub async fn join(&self) {
        let mut workers = std::mem::take(&mut *self.workers.lock());
        while let Some(res) = workers.join_next().await {
            if let Err(err) = res {
                warn!(error = %err, "worker task terminated abnormally");
            }
        }
    }

    /// Забирает приёмник результатов. Доступен один раз и только до
    /// [`start`](Self::start).
    pub fn take_results(&self) -> Option<mpsc::Receiver<JobResult<T::Output>>> {
        self.results_rx.lock().take()
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Текущее значение счётчика незавершённой работы.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.admission.lock().sender.is_none()
    }

    pub fn stats(&self) -> PoolStats {
        self.metrics.snapshot(self.outstanding.get())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Воркер
////////////////////////////////////////////////////////////////////////////////

async fn run_worker<T: Task>(
    worker_id: usize,
    queue: Arc<AsyncMutex<mpsc::Receiver<Job<T>>>>,
    results: mpsc::Sender<JobResult<T::Output>>,
    outstanding: Arc<Outstanding>,
    metrics: Arc<PoolMetrics>,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };
        // Очередь закрыта и пуста.
        let Some(mut job) = next else {
            break;
        };

        job.attempts += 1;
        let job_id = job.id;
        let attempts = job.attempts;

        trace!(worker_id, job_id = %job_id, "job started");
        let output = execute(job.task).await;

        match &output {
            Ok(_) => {
                metrics.completed.fetch_add(1, Ordering::Relaxed);
                trace!(worker_id, job_id = %job_id, "job completed");
            }
            Err(err) => {
                metrics.failed.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id, job_id = %job_id, error = %err, "job failed");
            }
        }

        let result = JobResult {
            job_id,
            worker_id,
            attempts,
            output,
        };
        if results.send(result).await.is_err() {
            trace!(worker_id, job_id = %job_id, "result receiver dropped");
        }
        outstanding.decrement();
    }

    debug!(worker_id, "worker stopped");
}

/// Выполняет задачу в отдельной задаче рантайма, чтобы паника не убила
/// воркер.
async fn execute<T: Task>(task: T) -> Result<T::Output, TaskError> {
    match tokio::spawn(async move { task.execute().await }).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(TaskError::Failed(err)),
        Err(err) if err.is_panic() => Err(TaskError::Panicked(panic_message(err.into_panic()))),
        Err(_) => Err(TaskError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 50,
        }
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "job rejected: {}", self.reason)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

impl<T: Task> fmt::Debug for WorkerPool<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .field("shut_down", &self.is_shut_down())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
