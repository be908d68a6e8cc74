use crate::StackError;

/// Результат операций, собирающих ошибки разных подсистем.
pub type BusResult<T> = Result<T, StackError>;

/// Расширение `Result`: превращает ошибку в [`StackError`] и добавляет к ней
/// пояснение.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> BusResult<T>
    where
        C: Into<String>;

    /// То же, что [`ResultExt::context`], но пояснение строится только при
    /// ошибке.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> BusResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> BusResult<T>
    where
        C: Into<String>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(ctx)),
        }
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> BusResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(f())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{BrokerError, StatusCode};

    #[test]
    fn test_context_records_call_site() {
        let result: Result<(), BrokerError> = Err(BrokerError::AlreadyRunning);
        let line = line!() + 1;
        let err = result.context("starting broker").unwrap_err();

        assert_eq!(err.status_code(), StatusCode::AlreadyRunning);
        assert_eq!(err.contexts()[0].message, "starting broker");
        assert_eq!(err.contexts()[0].location.line(), line);
        assert!(err.contexts()[0].location.file().ends_with("context.rs"));
    }

    #[test]
    fn test_with_context_is_lazy() {
        let calls = Cell::new(0);
        let build = || {
            calls.set(calls.get() + 1);
            "expensive context".to_string()
        };

        let ok: Result<u8, BrokerError> = Ok(1);
        assert_eq!(ok.with_context(build).unwrap(), 1);
        assert_eq!(calls.get(), 0);

        let failed: Result<u8, BrokerError> = Err(BrokerError::AlreadyRunning);
        let err = failed.with_context(build).unwrap_err();
        assert_eq!(calls.get(), 1);
        assert_eq!(err.contexts()[0].message, "expensive context");
    }
}
