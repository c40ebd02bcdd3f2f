use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Причина отказа в приёме задачи пулом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Очередь задач заполнена; решение о повторе за вызывающим.
    #[error("job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Пул остановлен, новые задачи не принимаются.
    #[error("worker pool is shut down")]
    Closed,
}

/// Ошибки конфигурации пула.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Ошибка выполнения задачи.
///
/// Никогда не возвращается синхронно: доставляется внутри результата
/// задачи через очередь результатов.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Задача завершилась с ошибкой.
    #[error("task failed: {0}")]
    Failed(#[source] anyhow::Error),

    /// Задача запаниковала во время выполнения.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Выполнение было прервано рантаймом.
    #[error("task cancelled")]
    Cancelled,
}

impl ErrorExt for SubmitError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::QueueFull { .. } => StatusCode::QueueFull,
            Self::Closed => StatusCode::Closed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for PoolError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidArgs
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for TaskError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Failed(_) => StatusCode::TaskFailed,
            Self::Panicked(_) => StatusCode::TaskPanicked,
            Self::Cancelled => StatusCode::TaskCancelled,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Failed(err) => format!("task failed: {err}"),
            Self::Panicked(_) => "task panicked".to_string(),
            Self::Cancelled => "task cancelled".to_string(),
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err)
    }
}
