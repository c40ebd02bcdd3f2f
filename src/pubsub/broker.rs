use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use dashmap::{mapref::entry::Entry, DashMap};
use replaybus_error::BrokerError;
use tracing::{debug, info};

use super::{
    DeliverySender, InMemoryLog, LogFactory, Message, Offset, PublishReceipt, ReplayReceipt,
    SubscriberId, Topic, TopicStats,
};

type TopicKey = Arc<str>;

/// Внутрипроцессный брокер тем с воспроизводимым журналом.
///
/// Реестр тем (`DashMap`) используется только для поиска темы; всё
/// остальное выполняется под блокировкой самой темы, так что операции над
/// разными темами друг другу не мешают.
///
/// Доставка push-модели: `publish` кладёт копию в канал каждой подписки
/// без ожидания, а при заполненном канале копия теряется. Сообщение
/// считается опубликованным с момента записи в журнал.
pub struct Broker {
    topics: DashMap<TopicKey, Arc<Topic>>,
    log_factory: LogFactory,
    metrics: BrokerMetrics,
}

/// Счётчики брокера.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    pub topics_created: AtomicU64,
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped: AtomicU64,
    pub replayed: AtomicU64,
    pub replay_dropped: AtomicU64,
}

/// Снимок [`BrokerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub topics_created: u64,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub replayed: u64,
    pub replay_dropped: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Broker {
    /// Брокер с журналами [`InMemoryLog`].
    pub fn new() -> Self {
        Self::with_log_factory(InMemoryLog::factory())
    }

    /// Брокер, создающий журнал каждой новой темы через `factory`.
    ///
    /// Фабрика вызывается без блокировок брокера и может к нему обращаться.
    pub fn with_log_factory(factory: LogFactory) -> Self {
        Self {
            topics: DashMap::new(),
            log_factory: factory,
            metrics: BrokerMetrics::default(),
        }
    }

    /// Создаёт пустую тему. Имя темы уникально.
    pub fn create_topic(
        &self,
        name: &str,
    ) -> Result<(), BrokerError> {
        if self.topics.contains_key(name) {
            return Err(BrokerError::duplicate_topic(name));
        }
        // Фабрика вызывается вне блокировки шарда реестра.
        let log = (self.log_factory)(name);

        match self.topics.entry(Arc::from(name)) {
            Entry::Occupied(_) => Err(BrokerError::duplicate_topic(name)),
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(Arc::new(Topic::new(key, log)));
                self.metrics.topics_created.fetch_add(1, Ordering::Relaxed);
                info!(topic = name, "topic created");
                Ok(())
            }
        }
    }

    /// Регистрирует канал доставки `sender` под идентификатором `id`.
    ///
    /// Повторная регистрация того же `id` добавляет ещё один канал.
    pub fn subscribe(
        &self,
        topic: &str,
        id: impl Into<SubscriberId>,
        sender: DeliverySender,
    ) -> Result<(), BrokerError> {
        let id = id.into();
        let topic = self.topic(topic)?;
        debug!(topic = topic.name(), subscriber = %id, "subscribed");
        topic.subscribe(id, sender);
        Ok(())
    }

    /// Удаляет самую раннюю подписку `id` в теме.
    ///
    /// Брокер отбрасывает свой `Sender`; если других отправителей у канала
    /// нет, канал закрывается и цикл чтения подписчика завершается.
    pub fn unsubscribe(
        &self,
        topic: &str,
        id: &str,
    ) -> Result<(), BrokerError> {
        let subscription = self.topic(topic)?.unsubscribe(id)?;
        drop(subscription);
        debug!(topic, subscriber = id, "unsubscribed");
        Ok(())
    }

    /// Дописывает сообщение в журнал темы и рассылает копии подписчикам.
    ///
    /// Никогда не ждёт медленных подписчиков. Ошибкой считается только
    /// неизвестная тема.
    pub fn publish(
        &self,
        topic: &str,
        data: impl Into<Bytes>,
    ) -> Result<PublishReceipt, BrokerError> {
        let receipt = self.topic(topic)?.publish(data.into());

        self.metrics.published.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .delivered
            .fetch_add(receipt.delivered as u64, Ordering::Relaxed);
        self.metrics
            .dropped
            .fetch_add(receipt.dropped as u64, Ordering::Relaxed);
        Ok(receipt)
    }

    /// Повторно отправляет подписчику `id` все сообщения начиная с `offset`.
    ///
    /// Используется первая подписка с этим идентификатором. Смещение за
    /// концом журнала ничего не отправляет.
    pub fn reset_offset(
        &self,
        topic: &str,
        id: &str,
        offset: Offset,
    ) -> Result<ReplayReceipt, BrokerError> {
        let receipt = self.topic(topic)?.reset_offset(id, offset)?;

        self.metrics
            .replayed
            .fetch_add(receipt.delivered as u64, Ordering::Relaxed);
        self.metrics
            .replay_dropped
            .fetch_add(receipt.dropped as u64, Ordering::Relaxed);
        debug!(
            topic,
            subscriber = id,
            from = offset,
            delivered = receipt.delivered,
            "offset reset"
        );
        Ok(receipt)
    }

    /// Сообщения темы со смещением `>= offset` по возрастанию.
    pub fn replay_from(
        &self,
        topic: &str,
        offset: Offset,
    ) -> Result<Vec<Message>, BrokerError> {
        Ok(self.topic(topic)?.replay_from(offset))
    }

    pub fn has_topic(
        &self,
        name: &str,
    ) -> bool {
        self.topics.contains_key(name)
    }

    /// Имена всех тем в алфавитном порядке.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().to_string()).collect();
        names.sort_unstable();
        names
    }

    pub fn topic_stats(
        &self,
        name: &str,
    ) -> Result<TopicStats, BrokerError> {
        Ok(self.topic(name)?.stats())
    }

    pub fn subscription_count(
        &self,
        topic: &str,
    ) -> Result<usize, BrokerError> {
        Ok(self.topic(topic)?.subscription_count())
    }

    pub fn metrics(&self) -> &BrokerMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> BrokerStats {
        self.metrics.snapshot()
    }

    /// Находит тему, не удерживая блокировку реестра дольше поиска.
    fn topic(
        &self,
        name: &str,
    ) -> Result<Arc<Topic>, BrokerError> {
        self.topics
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BrokerError::topic_not_found(name))
    }
}

impl BrokerMetrics {
    pub fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            topics_created: self.topics_created.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            replay_dropped: self.replay_dropped.load(Ordering::Relaxed),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Broker")
            .field("topics", &self.topics.len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
