use std::{env, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use super::LoggingError;

/// Переменная окружения с уровнем логирования.
pub const LOG_LEVEL_ENV: &str = "TOPICBUS_LOG_LEVEL";
/// Переменная окружения с форматом вывода.
pub const LOG_FORMAT_ENV: &str = "TOPICBUS_LOG_FORMAT";

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Одна строка на событие
    #[default]
    Compact,
    /// Многострочный, для разработки
    Pretty,
    /// Один JSON-объект на строку
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn`, `error` или `off`
    pub level: String,
    pub format: LogFormat,
    /// Дополнительные директивы `EnvFilter`, например `topicbus::pubsub=trace`
    pub directives: Vec<String>,
    pub with_target: bool,
    /// Имена потоков, полезно для `topicbus-worker-N`
    pub with_thread_names: bool,
    pub with_line_numbers: bool,
    pub with_ansi: bool,
}

impl LoggingConfig {
    /// Переопределяет уровень и формат из `TOPICBUS_LOG_LEVEL` и
    /// `TOPICBUS_LOG_FORMAT`. Некорректный формат игнорируется.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.level = level.trim().to_lowercase();
            }
        }
        if let Ok(format) = env::var(LOG_FORMAT_ENV) {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring {LOG_FORMAT_ENV}: {e}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        LevelFilter::from_str(&self.level).map_err(|_| LoggingError::InvalidLevel {
            level: self.level.clone(),
        })?;
        Ok(())
    }

    /// Собирает директиву для `EnvFilter`: базовый уровень и дополнительные
    /// директивы через запятую.
    pub fn build_filter_directive(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            directives: Vec::new(),
            with_target: true,
            with_thread_names: true,
            with_line_numbers: false,
            with_ansi: true,
        }
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }

    #[test]
    fn test_validate_level() {
        let mut cfg = LoggingConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.level = "off".to_string();
        assert!(cfg.validate().is_ok());

        cfg.level = "loud".to_string();
        assert_eq!(
            cfg.validate(),
            Err(LoggingError::InvalidLevel {
                level: "loud".to_string()
            })
        );
    }

    #[test]
    fn test_filter_directive() {
        let cfg = LoggingConfig {
            level: "warn".to_string(),
            directives: vec!["topicbus::pubsub=trace".to_string()],
            ..Default::default()
        };
        assert_eq!(cfg.build_filter_directive(), "warn,topicbus::pubsub=trace");
    }

    /// Тест проверяет, что переменные окружения переопределяют конфигурацию.
    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var(LOG_LEVEL_ENV, "DEBUG");
        env::set_var(LOG_FORMAT_ENV, "json");

        let mut cfg = LoggingConfig::default();
        cfg.apply_env_overrides();

        env::remove_var(LOG_LEVEL_ENV);
        env::remove_var(LOG_FORMAT_ENV);

        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_bad_env_format_is_ignored() {
        env::set_var(LOG_FORMAT_ENV, "yaml");
        let mut cfg = LoggingConfig::default();
        cfg.apply_env_overrides();
        env::remove_var(LOG_FORMAT_ENV);

        assert_eq!(cfg.format, LogFormat::Compact);
    }
}
