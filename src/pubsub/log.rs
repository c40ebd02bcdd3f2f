//! Журнал сообщений темы.
//!
//! Журнал только дописывается и по умолчанию никогда не усекается, что и
//! делает возможным воспроизведение с любого смещения. Политики
//! хранения/компакции здесь нет: своя реализация [`MessageLog`],
//! подключённая через [`Broker::with_log_factory`](super::Broker::with_log_factory),
//! является точкой расширения.

use std::{fmt, sync::Arc};

use super::{Message, Offset};

/// Хранилище сообщений одной темы.
///
/// Все методы вызываются под блокировкой своей темы.
pub trait MessageLog: Send + Sync + fmt::Debug {
    /// Добавляет сообщение. Смещения приходят строго возрастающими.
    fn append(
        &mut self,
        message: Message,
    );

    /// Сохранённые сообщения со смещением `>= offset` по возрастанию.
    fn read_from(
        &self,
        offset: Offset,
    ) -> Box<dyn Iterator<Item = &Message> + '_>;

    /// Количество сохранённых сообщений.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Фабрика журналов: вызывается один раз при создании темы.
pub type LogFactory = Arc<dyn Fn(&str) -> Box<dyn MessageLog> + Send + Sync>;

/// Неограниченный журнал в памяти.
#[derive(Debug, Default)]
pub struct InMemoryLog {
    messages: Vec<Message>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Фабрика по умолчанию для [`Broker`](super::Broker).
    pub fn factory() -> LogFactory {
        Arc::new(|_topic: &str| Box::new(InMemoryLog::new()) as Box<dyn MessageLog>)
    }
}

impl MessageLog for InMemoryLog {
    fn append(
        &mut self,
        message: Message,
    ) {
        debug_assert!(self
            .messages
            .last()
            .is_none_or(|last| last.offset() < message.offset()));
        self.messages.push(message);
    }

    fn read_from(
        &self,
        offset: Offset,
    ) -> Box<dyn Iterator<Item = &Message> + '_> {
        let start = self.messages.partition_point(|m| m.offset() < offset);
        Box::new(self.messages[start..].iter())
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}
