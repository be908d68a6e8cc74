//! Логирование на базе `tracing-subscriber`.
//!
//! Библиотека только порождает события `tracing`; подписчик устанавливает
//! приложение, обычно через [`init_logging`].

pub mod config;
mod filters;
mod formatter;

use std::io::{self, Stdout};

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use self::config::{LogFormat, LoggingConfig, LOG_FORMAT_ENV, LOG_LEVEL_ENV};

/// Ошибки настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    #[error("invalid log level '{level}'")]
    InvalidLevel { level: String },

    #[error("invalid log format '{format}', expected compact, pretty or json")]
    InvalidFormat { format: String },

    #[error("invalid filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("global subscriber already installed: {reason}")]
    AlreadyInitialized { reason: String },
}

/// Устанавливает глобальный подписчик `tracing` по конфигурации.
///
/// Перед установкой применяет переменные окружения
/// (`TOPICBUS_LOG_LEVEL`, `TOPICBUS_LOG_FORMAT`); `RUST_LOG` имеет приоритет
/// над уровнем из конфигурации. Повторный вызов возвращает
/// [`LoggingError::AlreadyInitialized`].
pub fn init_logging(mut config: LoggingConfig) -> Result<(), LoggingError> {
    config.apply_env_overrides();
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config)?;
    let writer: fn() -> Stdout = io::stdout;
    let fmt_layer = formatter::build_formatter_from_config(&config, writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized {
            reason: e.to_string(),
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_format = %config.format,
        "Logging system initialized"
    );
    Ok(())
}
