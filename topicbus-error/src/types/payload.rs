use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки типизированного чтения полезной нагрузки.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Запрошен тип, отличный от фактического
    #[error("payload type mismatch: expected {expected}, found {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// JSON-нагрузка не декодируется в запрошенный тип
    #[error("failed to decode payload: {reason}")]
    Decode { reason: String },
}

/// Ошибки кодеков сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializerError {
    #[error("{codec} serialization failed: {reason}")]
    Serialize { codec: &'static str, reason: String },

    #[error("{codec} deserialization failed: {reason}")]
    Deserialize { codec: &'static str, reason: String },

    /// Кодек не умеет представлять данный вид нагрузки
    #[error("{codec} codec does not support {kind} payloads")]
    Unsupported {
        codec: &'static str,
        kind: &'static str,
    },
}

impl ErrorExt for PayloadError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::WrongType { .. } => StatusCode::WrongType,
            Self::Decode { .. } => StatusCode::DeserializationFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for SerializerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Serialize { .. } => StatusCode::SerializationFailed,
            Self::Deserialize { .. } => StatusCode::DeserializationFailed,
            Self::Unsupported { .. } => StatusCode::Unsupported,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_type_display() {
        let err = PayloadError::WrongType {
            expected: "text",
            actual: "bytes",
        };
        assert_eq!(err.status_code(), StatusCode::WrongType);
        assert_eq!(
            err.to_string(),
            "payload type mismatch: expected text, found bytes"
        );
    }

    #[test]
    fn test_serializer_error_names_codec() {
        let err = SerializerError::Unsupported {
            codec: "raw",
            kind: "json",
        };
        assert_eq!(err.status_code(), StatusCode::Unsupported);
        assert_eq!(err.to_string(), "raw codec does not support json payloads");
    }
}
