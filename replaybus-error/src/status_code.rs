use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Коды статуса для категоризации ошибок брокера и пула.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки адресации (темы, подписчики)
/// - 4xxx: Ограничения ёмкости (backpressure)
/// - 6xxx: Жизненный цикл каналов и пулов
/// - 9xxx: Ошибки выполнения задач
///
/// `num_enum::TryFromPrimitive` даёт реализацию `TryFrom<u32>`,
/// опционально `serde_repr` сериализует код как число (feature = "serde").
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Адресация ===
    NotFound = 2000,
    AlreadyExists = 2001,

    // === 4xxx: Ёмкость ===
    QueueFull = 4000,

    // === 6xxx: Жизненный цикл ===
    Closed = 6001,

    // === 9xxx: Выполнение задач ===
    TaskFailed = 9000,
    TaskPanicked = 9001,
    TaskCancelled = 9002,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Возвращает `true`, если операцию имеет смысл повторить позже.
    ///
    /// Переполненная очередь освобождается по мере работы воркеров,
    /// остальные коды повтором не лечатся.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull)
    }

    /// Ошибка вызывающей стороны: неизвестная тема, дубликат и т.п.
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=2999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Ошибка выполнения пользовательской задачи (диапазон 9xxx).
    pub fn is_task_error(&self) -> bool {
        (9000..=9999).contains(&self.code())
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists => LogLevel::Debug,
            Self::InvalidArgs => LogLevel::Info,
            Self::QueueFull | Self::Closed | Self::TaskFailed | Self::TaskCancelled => {
                LogLevel::Warn
            }
            Self::Internal | Self::TaskPanicked => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
