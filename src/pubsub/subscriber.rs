use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use replaybus_error::{BrokerError, PoolError};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use super::{delivery_channel, Broker, DeliveryReceiver, DeliverySender, Message, SubscriberId};
use crate::pool::{JobResult, PoolConfig, PoolStats, Task, WorkerPool};

/// Обработчик доставленных сообщений.
///
/// Ошибки обработчик обрабатывает сам: пути для их возврата нет.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        message: Message,
    );
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(
        &self,
        message: Message,
    ) {
        (self)(message).await
    }
}

/// Параметры подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Ёмкость канала доставки.
    pub channel_capacity: usize,
    /// Собственный пул, выполняющий обработчик.
    pub pool: PoolConfig,
}

/// Состояние подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriberState {
    /// Создан, канал ещё никто не читает.
    Created,
    /// Цикл чтения канала запущен.
    Listening,
    /// Канал закрыт, пул остановлен и все принятые задачи выполнены.
    Closed,
}

/// Снимок счётчиков подписчика.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    /// Прочитано из канала доставки.
    pub received: u64,
    /// Принято пулом.
    pub submitted: u64,
    /// Отклонено пулом (очередь заполнена), сообщение потеряно.
    pub rejected: u64,
    /// Обработчик завершился.
    pub processed: u64,
    /// Обработчик запаниковал.
    pub failed: u64,
}

/// Подписчик с собственным пулом воркеров.
///
/// Каждое доставленное сообщение превращается в задачу пула, так что
/// медленный обработчик не задерживает ни брокер, ни других подписчиков.
/// Порядок выполнения обработчиков не обязан совпадать с порядком
/// доставки.
///
/// Жизненный цикл: `Created` → (`subscribe_to`) → `Listening` → (отписка
/// от всех тем закрывает канал) → `Closed`.
pub struct Subscriber {
    id: SubscriberId,
    config: SubscriberConfig,
    handler: Arc<dyn MessageHandler>,
    pool: Arc<WorkerPool<HandlerTask>>,
    /// Сильный `Sender`, пока канал не передан брокеру.
    handoff: Mutex<Option<DeliverySender>>,
    sender: mpsc::WeakSender<Message>,
    inbox: Mutex<Option<DeliveryReceiver>>,
    state: Arc<watch::Sender<SubscriberState>>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    submitted: AtomicU64,
    rejected: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Вызов обработчика для одного сообщения.
struct HandlerTask {
    message: Message,
    handler: Arc<dyn MessageHandler>,
}

#[async_trait]
impl Task for HandlerTask {
    type Output = ();

    async fn execute(&self) -> anyhow::Result<()> {
        self.handler.handle(self.message.clone()).await;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriberConfig {
    pub fn new(
        channel_capacity: usize,
        pool: PoolConfig,
    ) -> Self {
        Self {
            channel_capacity,
            pool,
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.channel_capacity == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "channel_capacity must be greater than zero".to_string(),
            });
        }
        self.pool.validate()
    }
}

impl Subscriber {
    /// Подписчик с каналом на 10 сообщений и пулом из 5 воркеров с
    /// очередью на 50 задач.
    pub fn new(
        id: impl Into<SubscriberId>,
        handler: impl MessageHandler,
    ) -> Result<Self, PoolError> {
        Self::with_config(id, handler, SubscriberConfig::default())
    }

    pub fn with_config(
        id: impl Into<SubscriberId>,
        handler: impl MessageHandler,
        config: SubscriberConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let pool = WorkerPool::with_config(config.pool)?;
        let (tx, rx) = delivery_channel(config.channel_capacity);
        let (state, _) = watch::channel(SubscriberState::Created);

        Ok(Self {
            id: id.into(),
            config,
            handler: Arc::new(handler),
            pool: Arc::new(pool),
            sender: tx.downgrade(),
            handoff: Mutex::new(Some(tx)),
            inbox: Mutex::new(Some(rx)),
            state: Arc::new(state),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Подписывает канал доставки на `topic` и начинает его читать.
    ///
    /// Можно вызывать для нескольких тем: канал закроется, когда брокер
    /// отпишет его отовсюду. Должен вызываться внутри рантайма Tokio.
    pub fn subscribe_to(
        &self,
        broker: &Broker,
        topic: &str,
    ) -> Result<(), BrokerError> {
        let sender = self
            .sender
            .upgrade()
            .ok_or_else(|| BrokerError::SubscriberClosed {
                subscriber: self.id.to_string(),
            })?;
        broker.subscribe(topic, self.id.clone(), sender)?;

        // Теперь живыми `Sender` владеет только брокер.
        self.handoff.lock().take();
        self.listen();
        Ok(())
    }

    /// Запускает пул и цикл чтения канала. Повторные вызовы ничего не
    /// делают.
    fn listen(&self) {
        let Some(inbox) = self.inbox.lock().take() else {
            return;
        };

        self.state.send_replace(SubscriberState::Listening);
        // Приёмник результатов забирается до запуска пула.
        let collector = self
            .pool
            .take_results()
            .map(|results| tokio::spawn(collect(self.id.clone(), results, self.counters.clone())));
        self.pool.start();

        tokio::spawn(drain(
            self.id.clone(),
            inbox,
            self.handler.clone(),
            self.pool.clone(),
            collector,
            self.state.clone(),
            self.counters.clone(),
        ));
        info!(subscriber = %self.id, "subscriber listening");
    }

    pub fn state(&self) -> SubscriberState {
        *self.state.borrow()
    }

    /// Подписка на изменения состояния.
    pub fn watch_state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Ждёт перехода в [`SubscriberState::Closed`].
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        // Отправитель живёт не меньше `self`, ошибки здесь быть не может.
        let _ = rx.wait_for(|s| *s == SubscriberState::Closed).await;
    }

    /// Ждёт, пока пул не выполнит все принятые задачи.
    pub async fn wait_idle(&self) {
        self.pool.wait().await;
    }

    pub fn stats(&self) -> SubscriberStats {
        let c = &self.counters;
        SubscriberStats {
            received: c.received.load(Ordering::Relaxed),
            submitted: c.submitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Фоновые задачи
////////////////////////////////////////////////////////////////////////////////

/// Читает канал доставки и отдаёт каждое сообщение в пул. После закрытия
/// канала останавливает пул, дожидается его и переводит подписчика в
/// `Closed`.
async fn drain(
    id: SubscriberId,
    mut inbox: DeliveryReceiver,
    handler: Arc<dyn MessageHandler>,
    pool: Arc<WorkerPool<HandlerTask>>,
    collector: Option<JoinHandle<()>>,
    state: Arc<watch::Sender<SubscriberState>>,
    counters: Arc<Counters>,
) {
    while let Some(message) = inbox.recv().await {
        counters.received.fetch_add(1, Ordering::Relaxed);

        let task = HandlerTask {
            message,
            handler: handler.clone(),
        };
        match pool.submit_job(task) {
            Ok(job_id) => {
                counters.submitted.fetch_add(1, Ordering::Relaxed);
                trace!(subscriber = %id, job_id = %job_id, "message queued");
            }
            Err(rejected) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                let (reason, task) = rejected.into_parts();
                warn!(
                    subscriber = %id,
                    topic = task.message.topic(),
                    offset = task.message.offset(),
                    reason = %reason,
                    "handler job rejected, message dropped"
                );
            }
        }
    }

    debug!(subscriber = %id, "delivery channel closed");
    pool.shutdown();
    pool.join().await;
    if let Some(collector) = collector {
        if let Err(err) = collector.await {
            warn!(subscriber = %id, error = %err, "result collector terminated abnormally");
        }
    }

    state.send_replace(SubscriberState::Closed);
    info!(subscriber = %id, "subscriber closed");
}

/// Учитывает результаты обработчика. Завершается, когда все воркеры пула
/// вышли.
async fn collect(
    id: SubscriberId,
    mut results: mpsc::Receiver<JobResult<()>>,
    counters: Arc<Counters>,
) {
    while let Some(result) = results.recv().await {
        match result.output {
            Ok(()) => {
                counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(subscriber = %id, job_id = %result.job_id, error = %err, "handler failed");
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 10,
            pool: PoolConfig::default(),
        }
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Listening => "listening",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
