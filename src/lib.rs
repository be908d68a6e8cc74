/// Broker configuration loading.
pub mod config;
/// Logging setup (tracing-subscriber, env filter, formats).
pub mod logging;
/// Pub/Sub: Broker, Subscription, Message, topic filters.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use self::config::BrokerConfig;
/// Logging setup.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
/// Pub/Sub API.
pub use pubsub::{
    global, Broker, BrokerStats, DeliveryResult, Message, MessagePayload, MessageSerializer,
    Priority, Subscription, SubscriptionId, SubscriptionOptions, TopicFilter,
};
/// Error types.
pub use topicbus_error::{
    BrokerError, BusResult, ConfigError, PatternError, PayloadError, PublishError, ResultExt,
    SerializerError, StackError, StatusCode, SubscribeError,
};
