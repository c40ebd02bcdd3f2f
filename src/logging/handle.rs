use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;

/// Владеет ресурсами логирования, которые должны жить до конца процесса.
///
/// Файловый sink пишет через фоновый поток; удаление handle дописывает
/// буфер и останавливает этот поток.
#[derive(Debug)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingHandle {
    pub(crate) fn new(
        file_guard: Option<WorkerGuard>,
        log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            file_guard,
            log_dir,
        }
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Каталог файлового sink'а, если он включён.
    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.log_dir.as_ref()
    }

    /// Явное завершение: сбрасывает буфер файлового sink'а.
    pub fn shutdown(mut self) {
        tracing::info!(file_sink = self.has_file_sink(), "logging shutdown");
        drop(self.file_guard.take());
    }
}
