mod settings;

pub use settings::{BrokerConfig, MAX_THREAD_COUNT};
