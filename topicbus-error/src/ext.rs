use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий интерфейс ошибок брокера (object-safe).
///
/// Даёт код статуса, по которому выбирается уровень логирования, и доступ к
/// конкретному типу после упаковки в [`StackError`](crate::StackError).
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус ошибки. По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Ошибка как [`Any`] для downcast к конкретному типу.
    fn as_any(&self) -> &dyn Any;
}
