use std::{error::Error, fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, StatusCode};

/// Ошибка верхнего уровня: исходная ошибка брокера и цепочка пояснений,
/// добавленных по пути наверх.
///
/// Код статуса всегда берётся у исходной ошибки, пояснения его не меняют.
#[derive(Clone)]
pub struct StackError {
    source: Arc<dyn ErrorExt>,
    contexts: Vec<ErrorContext>,
}

/// Одно пояснение и место в коде, где оно добавлено.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: &'static Location<'static>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            source: Arc::new(err),
            contexts: Vec::new(),
        }
    }

    /// Добавляет пояснение; место вызова запоминается.
    #[track_caller]
    pub fn context(
        mut self,
        message: impl Into<String>,
    ) -> Self {
        self.contexts.push(ErrorContext {
            message: message.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.source.status_code()
    }

    /// Пояснения в порядке добавления (от самого внутреннего).
    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }

    /// Исходная ошибка, если она имеет тип `T`.
    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.source.as_any().downcast_ref::<T>()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "{} [{}]", self.source, self.status_code())?;
        for ctx in self.contexts.iter().rev() {
            writeln!(
                f,
                "  while {} at {}:{}",
                ctx.message,
                ctx.location.file(),
                ctx.location.line()
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        // внешнее пояснение первым: "starting broker: loading config: <ошибка>"
        for ctx in self.contexts.iter().rev() {
            write!(f, "{}: ", ctx.message)?;
        }
        write!(f, "{}", self.source)
    }
}

impl Error for StackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(err: E) -> Self {
        StackError::new(err)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
