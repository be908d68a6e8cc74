//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессная шина сообщений: издатели публикуют сообщения в
//! иерархические топики, подписчики регистрируют шаблоны и получают
//! подходящие сообщения через обработчик в рабочих потоках брокера.
//!
//! - `broker`: очередь, пул рабочих потоков, реестр подписок, доставка.
//! - `global`: общий для процесса брокер с `initialize`/`shutdown`.
//! - `message`: сообщение, приоритет и типизированная нагрузка.
//! - `retained`: реестр топиков и сохранённых сообщений.
//! - `serializer`: кодеки нагрузки (JSON, bincode, MessagePack, raw).
//! - `stats`: снимок статистики брокера.
//! - `subscription`: подписка, её параметры и результат доставки.
//! - `topic`: фильтры топиков (точный и по шаблону с `+`/`#`).

pub mod broker;
pub mod global;
pub mod message;
pub mod retained;
pub mod serializer;
pub mod stats;
pub mod subscription;
pub mod topic;

// Публичный экспорт всех типов из вложенных модулей, чтобы упростить доступ
// к ним из внешнего кода.
pub use broker::*;
pub use message::*;
pub use retained::*;
pub use serializer::*;
pub use stats::*;
pub use subscription::*;
pub use topic::*;
