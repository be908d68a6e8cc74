use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use topicbus_error::{PayloadError, SerializerError};
use uuid::Uuid;

use super::MessageSerializer;

/// Приоритет сообщения.
///
/// Переносится вместе с сообщением; очередь брокера остаётся FIFO и не
/// учитывает приоритет при вытеснении.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Полезная нагрузка сообщения - закрытый набор вариантов.
///
/// Чтение не того варианта возвращает [`PayloadError::WrongType`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum MessagePayload {
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

/// Сообщение: топик, метаданные и полезная нагрузка.
///
/// После публикации разделяется между потоками как `Arc<Message>` и больше
/// не изменяется.
#[derive(Debug, Clone)]
pub struct Message {
    id: String,
    topic: Arc<str>,
    timestamp: DateTime<Utc>,
    priority: Priority,
    headers: HashMap<String, String>,
    payload: MessagePayload,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl MessagePayload {
    /// Название варианта (для сообщений об ошибках и логов).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_bytes(&self) -> Result<&Bytes, PayloadError> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(other.wrong_type("bytes")),
        }
    }

    pub fn as_text(&self) -> Result<&str, PayloadError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(other.wrong_type("text")),
        }
    }

    pub fn as_json(&self) -> Result<&serde_json::Value, PayloadError> {
        match self {
            Self::Json(v) => Ok(v),
            other => Err(other.wrong_type("json")),
        }
    }

    /// Декодирует JSON-нагрузку в произвольный тип.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        let value = self.as_json()?;
        T::deserialize(value).map_err(|e| PayloadError::Decode {
            reason: e.to_string(),
        })
    }

    /// Сериализует значение в JSON-нагрузку.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| PayloadError::Decode {
                reason: e.to_string(),
            })
    }

    fn wrong_type(
        &self,
        expected: &'static str,
    ) -> PayloadError {
        PayloadError::WrongType {
            expected,
            actual: self.kind(),
        }
    }
}

impl Message {
    /// Создаёт сообщение с приоритетом `Normal`, случайным id (UUID v4) и
    /// текущим временем.
    pub fn new(
        topic: impl Into<Arc<str>>,
        payload: impl Into<MessagePayload>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            topic: topic.into(),
            timestamp: Utc::now(),
            priority: Priority::Normal,
            headers: HashMap::new(),
            payload: payload.into(),
        }
    }

    pub fn with_priority(
        mut self,
        priority: Priority,
    ) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(
        &mut self,
        priority: Priority,
    ) {
        self.priority = priority;
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    pub fn set_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn header(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Значение заголовка или `default`, если заголовка нет.
    pub fn header_or(
        &self,
        key: &str,
        default: &str,
    ) -> String {
        self.header(key).unwrap_or(default).to_string()
    }

    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    pub fn set_payload(
        &mut self,
        payload: impl Into<MessagePayload>,
    ) {
        self.payload = payload.into();
    }

    pub fn as_bytes(&self) -> Result<&Bytes, PayloadError> {
        self.payload.as_bytes()
    }

    pub fn as_text(&self) -> Result<&str, PayloadError> {
        self.payload.as_text()
    }

    pub fn as_json(&self) -> Result<&serde_json::Value, PayloadError> {
        self.payload.as_json()
    }

    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        self.payload.decode_json()
    }

    /// Кодирует полезную нагрузку выбранным кодеком.
    pub fn serialize(
        &self,
        serializer: &dyn MessageSerializer,
    ) -> Result<Vec<u8>, SerializerError> {
        serializer.serialize(&self.payload)
    }

    /// Собирает новое сообщение для `topic` из закодированной нагрузки.
    ///
    /// Метаданные (id, время, приоритет) создаются заново.
    pub fn deserialize(
        topic: impl Into<Arc<str>>,
        data: &[u8],
        serializer: &dyn MessageSerializer,
    ) -> Result<Self, SerializerError> {
        let payload = serializer.deserialize(data)?;
        Ok(Self::new(topic, payload))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl From<Bytes> for MessagePayload {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for MessagePayload {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<String> for MessagePayload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for MessagePayload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<serde_json::Value> for MessagePayload {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<()> for MessagePayload {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}
