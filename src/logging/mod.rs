//! Логирование на `tracing`.
//!
//! [`init_logging`] собирает глобальный subscriber: фильтр `EnvFilter`,
//! консольный слой в формате compact/pretty/json и, по желанию, файловый
//! слой с ежедневной ротацией через `tracing-appender`.

pub mod config;
mod filters;
mod formatter;
pub mod handle;

use std::fs;

use anyhow::Context;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::{FileSinkConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;

/// Устанавливает глобальный subscriber. Повторный вызов в том же процессе
/// завершается ошибкой.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<LoggingHandle> {
    let filter = filters::build_filter(&config);
    let mut layers = vec![formatter::console_layer(&config)];

    let (file_guard, log_dir) = if config.file.enabled {
        let dir = &config.file.directory;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;

        let appender = rolling::daily(dir, &config.file.file_prefix);
        let (writer, guard) = non_blocking(appender);
        layers.push(formatter::file_layer(&config, writer));
        (Some(guard), Some(dir.clone()))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("global tracing subscriber already installed")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("REPLAYBUS_GIT_COMMIT"),
        built = env!("REPLAYBUS_BUILD_TIME"),
        level = %config.build_filter_directive(),
        format = ?config.format,
        file_sink = config.file.enabled,
        "logging initialized"
    );

    Ok(LoggingHandle::new(file_guard, log_dir))
}
