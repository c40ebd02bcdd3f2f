use tracing_subscriber::EnvFilter;

use super::LoggingConfig;

/// Фильтр событий: `RUST_LOG`, если задана, иначе директива из настроек.
///
/// Некорректная директива в настройках не роняет процесс: фильтр
/// откатывается на `info`.
pub(crate) fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("invalid log filter directive '{directive}': {err}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}
