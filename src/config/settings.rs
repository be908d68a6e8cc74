use std::path::Path;

use ::config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use topicbus_error::ConfigError;

/// Верхняя граница размера пула рабочих потоков.
pub const MAX_THREAD_COUNT: usize = 1024;

/// Префикс переменных окружения (`TOPICBUS_THREAD_COUNT` и т.д.).
const ENV_PREFIX: &str = "TOPICBUS";

/// Конфигурация брокера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Число рабочих потоков (0 = по числу логических CPU)
    pub thread_count: usize,
    /// Ёмкость очереди (0 = без ограничения)
    pub max_queue_size: usize,
    /// Сохранять последние сообщения каждого топика
    pub retain_messages: bool,
    /// Сколько сообщений хранить на топик (0 = без ограничения)
    pub max_retained_messages: usize,
    /// Строгая проверка шаблонов и топиков публикации
    pub strict_topic_matching: bool,
}

impl BrokerConfig {
    /// Загружает конфигурацию: значения по умолчанию, поверх них переменные
    /// окружения `TOPICBUS_*`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(Self::environment())
            .build()
            .and_then(Config::try_deserialize)
            .map_err(load_error)
    }

    /// Как [`BrokerConfig::load`], но сначала читает файл (TOML/JSON/YAML по
    /// расширению). Переменные окружения имеют приоритет над файлом.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()
            .and_then(Config::try_deserialize)
            .map_err(load_error)
    }

    /// Конфигурация по умолчанию с заданным числом потоков.
    pub fn with_thread_count(thread_count: usize) -> Self {
        Self {
            thread_count,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count > MAX_THREAD_COUNT {
            return Err(ConfigError::Invalid {
                field: "thread_count",
                reason: format!(
                    "{} exceeds the maximum of {MAX_THREAD_COUNT}",
                    self.thread_count
                ),
            });
        }
        Ok(())
    }

    /// Фактическое число рабочих потоков, не меньше одного.
    pub fn effective_thread_count(&self) -> usize {
        match self.thread_count {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Self::default();
        Config::builder()
            .set_default("thread_count", defaults.thread_count as i64)
            .and_then(|b| b.set_default("max_queue_size", defaults.max_queue_size as i64))
            .and_then(|b| b.set_default("retain_messages", defaults.retain_messages))
            .and_then(|b| {
                b.set_default(
                    "max_retained_messages",
                    defaults.max_retained_messages as i64,
                )
            })
            .and_then(|b| b.set_default("strict_topic_matching", defaults.strict_topic_matching))
            .map_err(load_error)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX).try_parsing(true)
    }
}

fn load_error(err: ::config::ConfigError) -> ConfigError {
    ConfigError::Load {
        reason: err.to_string(),
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            thread_count: 0,
            max_queue_size: 10_000,
            retain_messages: true,
            max_retained_messages: 100,
            strict_topic_matching: false,
        }
    }
}
