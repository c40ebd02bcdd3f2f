use std::io;

use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    registry::LookupSpan,
    Layer,
};

use super::{LogFormat, LoggingConfig};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Консольный слой в выбранном формате.
pub(crate) fn console_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt_layer(
        config,
        config.format,
        config.ansi,
        io::stdout as fn() -> io::Stdout,
    )
}

/// Файловый слой: всегда JSON и без ANSI-последовательностей.
pub(crate) fn file_layer<S>(
    config: &LoggingConfig,
    writer: NonBlocking,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt_layer(config, LogFormat::Json, false, writer)
}

/// Стирает конкретный тип формата (json/pretty/compact) за `Box<dyn Layer>`.
fn fmt_layer<S, W>(
    config: &LoggingConfig,
    format: LogFormat,
    with_ansi: bool,
    writer: W,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(with_ansi)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids);

    match format {
        LogFormat::Json => Box::new(layer.json().with_current_span(true)),
        LogFormat::Pretty => Box::new(layer.pretty().with_span_events(FmtSpan::CLOSE)),
        LogFormat::Compact => Box::new(layer.compact()),
    }
}
