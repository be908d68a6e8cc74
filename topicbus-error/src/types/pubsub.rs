use std::any::Any;

use thiserror::Error;

use crate::{ConfigError, ErrorExt, StatusCode};

/// Ошибки разбора шаблона подписки.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Пустой шаблон
    #[error("topic pattern cannot be empty")]
    Empty,

    /// `#` стоит не в последнем сегменте
    #[error("invalid pattern '{pattern}': '#' must be the last segment")]
    MisplacedMultiLevel { pattern: String },

    /// Wildcard смешан с обычным текстом внутри сегмента
    #[error("invalid pattern '{pattern}': wildcard in segment '{segment}' must stand alone")]
    MixedWildcard { pattern: String, segment: String },
}

/// Ошибки публикации сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Брокер остановлен
    #[error("broker is not running")]
    NotRunning,

    /// Очередь заполнена, сообщение отброшено
    #[error("queue is full ({capacity} messages), dropped message for '{topic}'")]
    QueueFull { topic: String, capacity: usize },

    /// Некорректный топик публикации (строгий режим)
    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    /// Топик вызова не совпадает с топиком сообщения (строгий режим)
    #[error("topic mismatch: published to '{expected}' but message carries '{actual}'")]
    TopicMismatch { expected: String, actual: String },
}

/// Ошибки подписки.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    /// Брокер остановлен
    #[error("broker is not running")]
    NotRunning,

    /// Некорректный шаблон
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

/// Ошибки жизненного цикла брокера.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Повторный запуск работающего брокера
    #[error("broker is already running")]
    AlreadyRunning,

    /// Конфигурация не прошла проверку
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// ОС отказала в создании рабочего потока
    #[error("failed to spawn worker {index}: {reason}")]
    WorkerSpawn { index: usize, reason: String },
}

impl ErrorExt for PatternError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidPattern
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotRunning => StatusCode::NotRunning,
            Self::QueueFull { .. } => StatusCode::QueueFull,
            Self::InvalidTopic { .. } => StatusCode::InvalidTopic,
            Self::TopicMismatch { .. } => StatusCode::TopicMismatch,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotRunning => StatusCode::NotRunning,
            Self::InvalidPattern(_) => StatusCode::InvalidPattern,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyRunning => StatusCode::AlreadyRunning,
            Self::InvalidConfig(_) => StatusCode::InvalidConfig,
            Self::WorkerSpawn { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
