use std::fmt;

use serde::Serialize;

/// Снимок состояния брокера.
///
/// Каждое поле читается отдельно, поэтому снимок в целом не атомарен.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    pub topic_count: usize,
    pub subscription_count: usize,
    pub published_messages: usize,
    pub delivered_messages: usize,
    pub queued_messages: usize,
    pub worker_threads: usize,
    /// Публикации, отброшенные из-за переполненной очереди
    pub dropped_messages: usize,
    /// Доставки, закончившиеся `Error` или `Timeout`
    pub failed_deliveries: usize,
}

impl fmt::Display for BrokerStats {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "topics={} subscriptions={} published={} delivered={} queued={} workers={} dropped={} failed={}",
            self.topic_count,
            self.subscription_count,
            self.published_messages,
            self.delivered_messages,
            self.queued_messages,
            self.worker_threads,
            self.dropped_messages,
            self.failed_deliveries,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let stats = BrokerStats::default();
        assert_eq!(stats.published_messages, 0);
        assert_eq!(stats.worker_threads, 0);
    }

    #[test]
    fn test_serializes_to_json() {
        let stats = BrokerStats {
            topic_count: 2,
            published_messages: 5,
            ..Default::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["topic_count"], 2);
        assert_eq!(json["published_messages"], 5);
        assert!(stats.to_string().contains("published=5"));
    }
}
