pub mod config;
pub mod payload;
pub mod pubsub;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы упростить
// доступ к ним из внешнего кода.
pub use config::*;
pub use payload::*;
pub use pubsub::*;
