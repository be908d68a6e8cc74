//! Кодеки полезной нагрузки.
//!
//! Брокер не зависит от конкретного формата: сообщения передаются внутри
//! процесса как есть, а кодек нужен только при выходе нагрузки за его
//! пределы ([`Message::serialize`](super::Message::serialize)).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use topicbus_error::SerializerError;

use super::MessagePayload;

/// Подключаемый кодек полезной нагрузки (object-safe).
pub trait MessageSerializer: Send + Sync {
    /// Короткое имя кодека для логов и ошибок.
    fn name(&self) -> &'static str;

    fn serialize(
        &self,
        payload: &MessagePayload,
    ) -> Result<Vec<u8>, SerializerError>;

    fn deserialize(
        &self,
        data: &[u8],
    ) -> Result<MessagePayload, SerializerError>;
}

/// JSON через `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

/// Компактный двоичный формат через `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

/// MessagePack через `rmp-serde`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackSerializer;

/// Без конверта: байты пишутся как есть, текст - как UTF-8.
///
/// При чтении непустые данные, являющиеся корректным UTF-8, становятся
/// `Text`, остальные - `Bytes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSerializer;

/// Представление нагрузки для форматов без `deserialize_any` (bincode):
/// JSON хранится строкой.
#[derive(Serialize, Deserialize)]
enum Envelope {
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Json(String),
}

////////////////////////////////////////////////////////////////////////////////
// Вспомогательные функции
////////////////////////////////////////////////////////////////////////////////

impl Envelope {
    fn from_payload(
        payload: &MessagePayload,
        codec: &'static str,
    ) -> Result<Self, SerializerError> {
        Ok(match payload {
            MessagePayload::Empty => Self::Empty,
            MessagePayload::Bytes(b) => Self::Bytes(b.to_vec()),
            MessagePayload::Text(s) => Self::Text(s.clone()),
            MessagePayload::Json(v) => {
                Self::Json(
                    serde_json::to_string(v).map_err(|e| SerializerError::Serialize {
                        codec,
                        reason: e.to_string(),
                    })?,
                )
            }
        })
    }

    fn into_payload(
        self,
        codec: &'static str,
    ) -> Result<MessagePayload, SerializerError> {
        Ok(match self {
            Self::Empty => MessagePayload::Empty,
            Self::Bytes(b) => MessagePayload::Bytes(Bytes::from(b)),
            Self::Text(s) => MessagePayload::Text(s),
            Self::Json(s) => MessagePayload::Json(serde_json::from_str(&s).map_err(|e| {
                SerializerError::Deserialize {
                    codec,
                    reason: e.to_string(),
                }
            })?),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации кодеков
////////////////////////////////////////////////////////////////////////////////

impl MessageSerializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(
        &self,
        payload: &MessagePayload,
    ) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(payload).map_err(|e| SerializerError::Serialize {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn deserialize(
        &self,
        data: &[u8],
    ) -> Result<MessagePayload, SerializerError> {
        serde_json::from_slice(data).map_err(|e| SerializerError::Deserialize {
            codec: self.name(),
            reason: e.to_string(),
        })
    }
}

impl MessageSerializer for BincodeSerializer {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn serialize(
        &self,
        payload: &MessagePayload,
    ) -> Result<Vec<u8>, SerializerError> {
        let envelope = Envelope::from_payload(payload, self.name())?;
        bincode::serialize(&envelope).map_err(|e| SerializerError::Serialize {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn deserialize(
        &self,
        data: &[u8],
    ) -> Result<MessagePayload, SerializerError> {
        let envelope: Envelope =
            bincode::deserialize(data).map_err(|e| SerializerError::Deserialize {
                codec: self.name(),
                reason: e.to_string(),
            })?;
        envelope.into_payload(self.name())
    }
}

impl MessageSerializer for MessagePackSerializer {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn serialize(
        &self,
        payload: &MessagePayload,
    ) -> Result<Vec<u8>, SerializerError> {
        let envelope = Envelope::from_payload(payload, self.name())?;
        rmp_serde::to_vec(&envelope).map_err(|e| SerializerError::Serialize {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn deserialize(
        &self,
        data: &[u8],
    ) -> Result<MessagePayload, SerializerError> {
        let envelope: Envelope =
            rmp_serde::from_slice(data).map_err(|e| SerializerError::Deserialize {
                codec: self.name(),
                reason: e.to_string(),
            })?;
        envelope.into_payload(self.name())
    }
}

impl MessageSerializer for RawSerializer {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn serialize(
        &self,
        payload: &MessagePayload,
    ) -> Result<Vec<u8>, SerializerError> {
        match payload {
            MessagePayload::Empty => Ok(Vec::new()),
            MessagePayload::Bytes(b) => Ok(b.to_vec()),
            MessagePayload::Text(s) => Ok(s.as_bytes().to_vec()),
            MessagePayload::Json(_) => Err(SerializerError::Unsupported {
                codec: self.name(),
                kind: payload.kind(),
            }),
        }
    }

    fn deserialize(
        &self,
        data: &[u8],
    ) -> Result<MessagePayload, SerializerError> {
        if data.is_empty() {
            return Ok(MessagePayload::Empty);
        }
        Ok(match std::str::from_utf8(data) {
            Ok(text) => MessagePayload::Text(text.to_string()),
            Err(_) => MessagePayload::Bytes(Bytes::copy_from_slice(data)),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn samples() -> Vec<MessagePayload> {
        vec![
            MessagePayload::Empty,
            MessagePayload::Bytes(Bytes::from_static(&[0, 159, 146, 150])),
            MessagePayload::Text("Temperature: 21°C".to_string()),
            MessagePayload::Json(json!({"id": 7, "tags": ["a", "b"], "ok": true})),
        ]
    }

    /// Тест проверяет, что все кодеки с конвертом сохраняют вариант и
    /// содержимое нагрузки.
    #[test]
    fn test_enveloped_codecs_preserve_payload() {
        let codecs: [&dyn MessageSerializer; 3] =
            [&JsonSerializer, &BincodeSerializer, &MessagePackSerializer];

        for codec in codecs {
            for payload in samples() {
                let data = codec.serialize(&payload).unwrap();
                let back = codec.deserialize(&data).unwrap();
                assert_eq!(back, payload, "codec {}", codec.name());
            }
        }
    }

    #[test]
    fn test_raw_text_and_bytes() {
        let codec = RawSerializer;
        assert_eq!(
            codec.serialize(&MessagePayload::Text("hi".into())).unwrap(),
            b"hi".to_vec()
        );
        assert_eq!(
            codec.deserialize(b"hi").unwrap(),
            MessagePayload::Text("hi".into())
        );
        assert_eq!(
            codec.deserialize(&[0xff, 0xfe]).unwrap(),
            MessagePayload::Bytes(Bytes::from_static(&[0xff, 0xfe]))
        );
        assert_eq!(codec.deserialize(&[]).unwrap(), MessagePayload::Empty);
    }

    #[test]
    fn test_raw_rejects_json() {
        let err = RawSerializer
            .serialize(&MessagePayload::Json(json!(1)))
            .unwrap_err();
        assert_eq!(
            err,
            SerializerError::Unsupported {
                codec: "raw",
                kind: "json"
            }
        );
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let err = JsonSerializer.deserialize(b"{not json").unwrap_err();
        assert!(matches!(
            err,
            SerializerError::Deserialize { codec: "json", .. }
        ));
        assert!(BincodeSerializer.deserialize(&[9, 9, 9, 9]).is_err());
    }
}
