use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    logging::LoggingConfig,
    pool::PoolConfig,
    pubsub::SubscriberConfig,
};

/// Префикс переменных окружения.
pub const ENV_PREFIX: &str = "REPLAYBUS";

/// Настройки процесса.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub subscriber: SubscriberSettings,
    pub logging: LoggingConfig,
}

/// Параметры подписчиков по умолчанию.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberSettings {
    pub channel_capacity: usize,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Settings {
    /// Значения по умолчанию, переопределённые окружением.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Как [`load`](Self::load), но сначала читает обязательный файл
    /// (формат определяется по расширению).
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = SubscriberSettings::default();
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("subscriber.channel_capacity", defaults.channel_capacity as u64)?
            .set_default("subscriber.workers", defaults.workers as u64)?
            .set_default("subscriber.queue_capacity", defaults.queue_capacity as u64)?
            .set_default("logging.level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // REPLAYBUS__SUBSCRIBER__CHANNEL_CAPACITY=32 -> subscriber.channel_capacity
        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}

impl SubscriberSettings {
    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig::new(
            self.channel_capacity,
            PoolConfig::new(self.workers, self.queue_capacity),
        )
    }
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        let config = SubscriberConfig::default();
        Self {
            channel_capacity: config.channel_capacity,
            workers: config.pool.workers,
            queue_capacity: config.pool.queue_capacity,
        }
    }
}

impl From<SubscriberSettings> for SubscriberConfig {
    fn from(value: SubscriberSettings) -> Self {
        value.subscriber_config()
    }
}
