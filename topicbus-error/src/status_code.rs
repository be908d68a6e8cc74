use std::fmt;

#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса ошибок брокера.
///
/// # Диапазоны:
/// - 1xxx: Общие ошибки (внутренние, конфигурация)
/// - 2xxx: Ошибки данных (тип нагрузки)
/// - 4xxx: Ограничения (переполнение очереди)
/// - 5xxx: Кодеки
/// - 9xxx: Pub/Sub (состояние брокера, шаблоны, топики)
///
/// Код определяет уровень, с которым отказ операции попадает в лог
/// ([`StatusCode::log_level`]).
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 1xxx: Общие ошибки ===
    Internal = 1003,
    InvalidConfig = 1006,

    // === 2xxx: Ошибки данных ===
    WrongType = 2002,

    // === 4xxx: Ограничения ===
    QueueFull = 4000,

    // === 5xxx: Кодеки ===
    SerializationFailed = 5000,
    DeserializationFailed = 5001,
    Unsupported = 5002,

    // === 9xxx: Pub/Sub ===
    NotRunning = 9000,
    AlreadyRunning = 9001,
    InvalidPattern = 9002,
    InvalidTopic = 9003,
    TopicMismatch = 9004,
}

/// Уровень, с которым ошибка пишется в лог.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Рекомендуемый уровень логирования для данного кода.
    ///
    /// Ожидаемые отказы (брокер остановлен или уже запущен) идут в `Debug`,
    /// ошибки вызывающей стороны в `Info`, потеря сообщений в `Warn`.
    pub fn log_level(self) -> LogLevel {
        match self {
            Self::NotRunning | Self::AlreadyRunning => LogLevel::Debug,
            Self::InvalidConfig
            | Self::WrongType
            | Self::InvalidPattern
            | Self::InvalidTopic
            | Self::Unsupported => LogLevel::Info,
            Self::QueueFull
            | Self::TopicMismatch
            | Self::SerializationFailed
            | Self::DeserializationFailed => LogLevel::Warn,
            Self::Internal => LogLevel::Error,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
