//! Настройки процесса: значения по умолчанию, необязательный файл и
//! переменные окружения `REPLAYBUS__*`.

pub mod settings;

pub use settings::*;
