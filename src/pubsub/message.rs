use std::sync::Arc;

use bytes::Bytes;

/// Позиция сообщения в журнале темы, начиная с нуля.
pub type Offset = u64;

/// Опубликованное сообщение.
///
/// Неизменяемо после создания: смещение назначается темой в момент
/// добавления в журнал. Клонирование дешёвое (имя темы и полезная
/// нагрузка разделяются по счётчику ссылок).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: Arc<str>,
    data: Bytes,
    offset: Offset,
}

impl Message {
    pub fn new(
        topic: impl Into<Arc<str>>,
        data: impl Into<Bytes>,
        offset: Offset,
    ) -> Self {
        Self {
            topic: topic.into(),
            data: data.into(),
            offset,
        }
    }

    /// Имя темы, в которую опубликовано сообщение.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Полезная нагрузка как UTF-8 строка, если она валидна.
    pub fn data_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}
