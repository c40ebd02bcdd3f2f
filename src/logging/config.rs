use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень или директива `EnvFilter` (`"info"`, `"replaybus=debug,warn"`).
    /// Переменная `RUST_LOG` имеет приоритет.
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub file: FileSinkConfig,
}

/// Запись в файл с ежедневной ротацией.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Префикс имени файла; к нему дописывается дата.
    pub file_prefix: String,
}

impl LoggingConfig {
    /// Директива фильтра, собранная из настроек.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            "info".to_string()
        } else {
            level.to_string()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            ansi: true,
            with_target: true,
            with_thread_ids: false,
            file: FileSinkConfig::default(),
        }
    }
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("logs"),
            file_prefix: "replaybus.log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_level_falls_back_to_info() {
        let cfg = LoggingConfig {
            level: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "info");
    }

    #[test]
    fn test_defaults() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(!cfg.file.enabled);
        assert_eq!(cfg.build_filter_directive(), "info");
    }
}
