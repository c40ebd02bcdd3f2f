use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Структурные ошибки брокера.
///
/// Возвращаются синхронно и обрабатываются непосредственным вызывающим
/// кодом. Потеря копии сообщения из-за переполненного канала ошибкой не
/// является и сюда не попадает.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Операция над неизвестной темой.
    #[error("topic not found: {topic}")]
    TopicNotFound { topic: String },

    /// Попытка создать тему с уже занятым именем.
    #[error("topic already exists: {topic}")]
    DuplicateTopic { topic: String },

    /// В теме нет подписки с указанным идентификатором.
    #[error("subscriber {subscriber} not found in topic {topic}")]
    SubscriberNotFound { topic: String, subscriber: String },

    /// Канал доставки подписчика уже закрыт, подписаться повторно нельзя.
    #[error("subscriber {subscriber} is closed")]
    SubscriberClosed { subscriber: String },
}

impl BrokerError {
    pub fn topic_not_found(topic: impl Into<String>) -> Self {
        Self::TopicNotFound {
            topic: topic.into(),
        }
    }

    pub fn duplicate_topic(topic: impl Into<String>) -> Self {
        Self::DuplicateTopic {
            topic: topic.into(),
        }
    }

    pub fn subscriber_not_found(
        topic: impl Into<String>,
        subscriber: impl Into<String>,
    ) -> Self {
        Self::SubscriberNotFound {
            topic: topic.into(),
            subscriber: subscriber.into(),
        }
    }
}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::TopicNotFound { .. } | Self::SubscriberNotFound { .. } => StatusCode::NotFound,
            Self::DuplicateTopic { .. } => StatusCode::AlreadyExists,
            Self::SubscriberClosed { .. } => StatusCode::Closed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "broker".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::TopicNotFound { topic }
            | Self::DuplicateTopic { topic }
            | Self::SubscriberNotFound { topic, .. } => {
                tags.push(("topic", topic.clone()));
            }
            Self::SubscriberClosed { subscriber } => {
                tags.push(("subscriber", subscriber.clone()));
            }
        }

        tags
    }
}
