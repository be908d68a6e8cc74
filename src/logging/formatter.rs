use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use super::{LogFormat, LoggingConfig};

/// Строит fmt-слой по конфигурации.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_formatter_from_config<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(config.with_target)
        .with_thread_names(config.with_thread_names)
        .with_line_number(config.with_line_numbers);

    match config.format {
        // ANSI-коды в JSON не нужны
        LogFormat::Json => Box::new(layer.with_ansi(false).json().with_current_span(true)),
        LogFormat::Pretty => Box::new(layer.with_ansi(config.with_ansi).pretty()),
        LogFormat::Compact => Box::new(layer.with_ansi(config.with_ansi).compact()),
    }
}
