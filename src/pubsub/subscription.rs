use std::{borrow::Borrow, fmt, sync::Arc};

use tokio::sync::mpsc;

use super::Message;

/// Отправляющая сторона канала доставки. Её держит брокер.
pub type DeliverySender = mpsc::Sender<Message>;

/// Принимающая сторона канала доставки. Её держит подписчик.
pub type DeliveryReceiver = mpsc::Receiver<Message>;

/// Создаёт ограниченный канал доставки на `capacity` сообщений.
///
/// Паникует при `capacity == 0`, как и [`mpsc::channel`].
pub fn delivery_channel(capacity: usize) -> (DeliverySender, DeliveryReceiver) {
    mpsc::channel(capacity)
}

/// Идентификатор подписчика.
///
/// Брокер не требует уникальности: под одним идентификатором может быть
/// зарегистрировано несколько каналов.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Arc<str>);

/// Запись реестра подписок темы.
///
/// Брокер знает только идентификатор и канал; обработчик сообщений ему
/// недоступен.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub(crate) id: SubscriberId,
    pub(crate) sender: DeliverySender,
}

/// Исход неблокирующей отправки в канал подписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    /// Буфер канала заполнен.
    Full,
    /// Приёмник отброшен.
    Closed,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriberId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        sender: DeliverySender,
    ) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Свободные слоты в канале доставки.
    pub fn free_capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Пытается положить копию сообщения в канал, никогда не ожидая.
    pub(crate) fn try_deliver(
        &self,
        message: Message,
    ) -> Delivery {
        match self.sender.try_send(message) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for SubscriberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubscriberId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Arc<str>> for SubscriberId {
    fn from(value: Arc<str>) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SubscriberId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SubscriberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_id_conversions() {
        let a = SubscriberId::from("sub1");
        let b = SubscriberId::from(String::from("sub1"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "sub1");
        assert_eq!(a.to_string(), "sub1");
    }

    /// Тест проверяет все три исхода неблокирующей доставки.
    #[tokio::test]
    async fn test_try_deliver_outcomes() {
        let (tx, mut rx) = delivery_channel(1);
        let sub = Subscription::new("s".into(), tx);

        assert_eq!(sub.try_deliver(Message::new("t", "a", 0)), Delivery::Sent);
        assert_eq!(sub.free_capacity(), 0);
        assert_eq!(sub.try_deliver(Message::new("t", "b", 1)), Delivery::Full);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.offset(), 0);

        drop(rx);
        assert!(sub.is_closed());
        assert_eq!(sub.try_deliver(Message::new("t", "c", 2)), Delivery::Closed);
    }
}
