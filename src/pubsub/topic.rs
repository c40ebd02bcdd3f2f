use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use replaybus_error::BrokerError;
use tracing::{trace, warn};

use super::{Delivery, DeliverySender, Message, MessageLog, Offset, SubscriberId, Subscription};

/// Итог публикации одного сообщения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Смещение, назначенное сообщению.
    pub offset: Offset,
    /// Сколько подписок получили копию.
    pub delivered: usize,
    /// Сколько копий потеряно (канал заполнен или закрыт).
    pub dropped: usize,
}

/// Итог воспроизведения журнала в канал подписчика.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReceipt {
    pub delivered: usize,
    pub dropped: usize,
}

/// Снимок состояния темы.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub name: String,
    /// Смещение, которое получит следующее сообщение.
    pub next_offset: Offset,
    /// Сколько сообщений хранит журнал.
    pub retained: usize,
    pub subscriptions: usize,
}

/// Тема: журнал сообщений и реестр подписок под одной блокировкой.
///
/// Публикация берёт блокировку на запись, дописывает журнал и рассылает
/// копии неблокирующим `try_send`, не отпуская её. Поэтому порядок
/// доставки каждому подписчику совпадает с порядком смещений даже при
/// конкурентных публикациях.
#[derive(Debug)]
pub struct Topic {
    name: Arc<str>,
    state: RwLock<TopicState>,
}

#[derive(Debug)]
struct TopicState {
    log: Box<dyn MessageLog>,
    next_offset: Offset,
    subscriptions: Vec<Subscription>,
}

impl Topic {
    pub(crate) fn new(
        name: Arc<str>,
        log: Box<dyn MessageLog>,
    ) -> Self {
        Self {
            name,
            state: RwLock::new(TopicState {
                log,
                next_offset: 0,
                subscriptions: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn subscribe(
        &self,
        id: SubscriberId,
        sender: DeliverySender,
    ) {
        let mut state = self.state.write();
        state.subscriptions.push(Subscription::new(id, sender));
    }

    /// Удаляет самую раннюю подписку с данным идентификатором.
    ///
    /// Вместе с подпиской отбрасывается принадлежащий брокеру `Sender`.
    pub(crate) fn unsubscribe(
        &self,
        id: &str,
    ) -> Result<Subscription, BrokerError> {
        let mut state = self.state.write();
        let pos = state
            .subscriptions
            .iter()
            .position(|s| s.id.as_str() == id)
            .ok_or_else(|| BrokerError::subscriber_not_found(&*self.name, id))?;
        Ok(state.subscriptions.remove(pos))
    }

    pub(crate) fn publish(
        &self,
        data: Bytes,
    ) -> PublishReceipt {
        let mut state = self.state.write();

        let offset = state.next_offset;
        state.next_offset += 1;
        let message = Message::new(self.name.clone(), data, offset);
        state.log.append(message.clone());

        let mut receipt = PublishReceipt {
            offset,
            delivered: 0,
            dropped: 0,
        };
        for sub in &state.subscriptions {
            match sub.try_deliver(message.clone()) {
                Delivery::Sent => receipt.delivered += 1,
                outcome => {
                    receipt.dropped += 1;
                    warn!(
                        topic = %self.name,
                        subscriber = %sub.id,
                        offset,
                        closed = outcome == Delivery::Closed,
                        "subscriber channel unavailable, message dropped"
                    );
                }
            }
        }

        trace!(
            topic = %self.name,
            offset,
            delivered = receipt.delivered,
            dropped = receipt.dropped,
            "message published"
        );
        receipt
    }

    pub(crate) fn replay_from(
        &self,
        offset: Offset,
    ) -> Vec<Message> {
        self.state.read().log.read_from(offset).cloned().collect()
    }

    /// Воспроизводит журнал с `offset` в первую подписку `id` по тем же
    /// правилам, что и публикация: без ожидания, с потерей при заполненном
    /// канале.
    pub(crate) fn reset_offset(
        &self,
        id: &str,
        offset: Offset,
    ) -> Result<ReplayReceipt, BrokerError> {
        let state = self.state.read();
        let sub = state
            .subscriptions
            .iter()
            .find(|s| s.id.as_str() == id)
            .ok_or_else(|| BrokerError::subscriber_not_found(&*self.name, id))?;

        let mut receipt = ReplayReceipt::default();
        for message in state.log.read_from(offset) {
            match sub.try_deliver(message.clone()) {
                Delivery::Sent => receipt.delivered += 1,
                _ => receipt.dropped += 1,
            }
        }

        if receipt.dropped > 0 {
            warn!(
                topic = %self.name,
                subscriber = id,
                from = offset,
                dropped = receipt.dropped,
                "replay dropped messages on a full channel"
            );
        }
        Ok(receipt)
    }

    pub fn subscription_count(&self) -> usize {
        self.state.read().subscriptions.len()
    }

    pub fn next_offset(&self) -> Offset {
        self.state.read().next_offset
    }

    pub fn stats(&self) -> TopicStats {
        let state = self.state.read();
        TopicStats {
            name: self.name.to_string(),
            next_offset: state.next_offset,
            retained: state.log.len(),
            subscriptions: state.subscriptions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{delivery_channel, InMemoryLog};

    fn topic() -> Topic {
        Topic::new(Arc::from("t1"), Box::new(InMemoryLog::new()))
    }

    /// Тест проверяет, что n-е сообщение получает смещение n-1.
    #[test]
    fn test_offsets_start_at_zero_and_increase() {
        let t = topic();
        for expected in 0..5 {
            let receipt = t.publish(Bytes::from_static(b"x"));
            assert_eq!(receipt.offset, expected);
            assert_eq!(receipt.delivered, 0);
        }
        assert_eq!(t.next_offset(), 5);
        assert_eq!(t.stats().retained, 5);
    }

    #[test]
    fn test_replay_beyond_end_is_empty() {
        let t = topic();
        t.publish(Bytes::from_static(b"a"));
        assert!(t.replay_from(1).is_empty());
        assert!(t.replay_from(100).is_empty());
        assert_eq!(t.replay_from(0).len(), 1);
    }

    /// Тест проверяет, что отписка удаляет самую раннюю из дублирующихся
    /// подписок и закрывает её канал.
    #[tokio::test]
    async fn test_unsubscribe_removes_oldest_duplicate() {
        let t = topic();
        let (tx1, mut rx1) = delivery_channel(4);
        let (tx2, mut rx2) = delivery_channel(4);
        t.subscribe("dup".into(), tx1);
        t.subscribe("dup".into(), tx2);
        assert_eq!(t.subscription_count(), 2);

        drop(t.unsubscribe("dup").unwrap());
        assert_eq!(t.subscription_count(), 1);
        assert!(rx1.recv().await.is_none());

        t.publish(Bytes::from_static(b"after"));
        assert_eq!(rx2.recv().await.unwrap().offset(), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_subscriber() {
        let t = topic();
        let err = t.unsubscribe("ghost").unwrap_err();
        assert_eq!(err, BrokerError::subscriber_not_found("t1", "ghost"));
    }

    /// Тест проверяет, что сообщения в закрытый канал считаются потерянными.
    #[test]
    fn test_publish_into_closed_channel_counts_as_drop() {
        let t = topic();
        let (tx, rx) = delivery_channel(4);
        t.subscribe("gone".into(), tx);
        drop(rx);

        let receipt = t.publish(Bytes::from_static(b"x"));
        assert_eq!(receipt.delivered, 0);
        assert_eq!(receipt.dropped, 1);
    }

    /// Тест проверяет, что воспроизведение идёт в первую подписку с данным
    /// идентификатором и подчиняется ёмкости канала.
    #[test]
    fn test_reset_offset_targets_first_registration() {
        let t = topic();
        for _ in 0..3 {
            t.publish(Bytes::from_static(b"m"));
        }
        let (tx1, mut rx1) = delivery_channel(2);
        let (tx2, mut rx2) = delivery_channel(8);
        t.subscribe("s".into(), tx1);
        t.subscribe("s".into(), tx2);

        let receipt = t.reset_offset("s", 0).unwrap();
        assert_eq!(receipt, ReplayReceipt { delivered: 2, dropped: 1 });
        assert_eq!(rx1.try_recv().unwrap().offset(), 0);
        assert_eq!(rx1.try_recv().unwrap().offset(), 1);
        assert!(rx2.try_recv().is_err());
    }
}
