use std::{collections::VecDeque, sync::Arc};

use dashmap::DashMap;

use super::{Message, TopicFilter};

/// Сведения об одном топике.
#[derive(Debug, Default)]
pub struct TopicEntry {
    /// Сколько сообщений было опубликовано в топик
    published: u64,
    /// Последние сообщения топика, от старых к новым
    retained: VecDeque<Arc<Message>>,
}

/// Реестр топиков и сохранённых сообщений.
///
/// Публикация учитывает топик, а сохраняет сообщение рабочий поток после
/// того, как выбрал получателей. Повтор для новой подписки поэтому видит
/// только сообщения, разосланные без её участия.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    entries: DashMap<Arc<str>, TopicEntry>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl TopicEntry {
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Учитывает публикацию в топик.
    pub fn record_publish(
        &self,
        topic: &str,
    ) {
        let mut entry = self.entries.entry(Arc::from(topic)).or_default();
        entry.published += 1;
    }

    /// Сохраняет уже разосланное сообщение.
    ///
    /// Сообщения топика держатся упорядоченными по времени создания, даже если
    /// рабочие потоки рассылают их не по порядку. `limit == 0` означает
    /// отсутствие лимита, иначе вытесняются самые старые. Для неизвестного
    /// топика (реестр очищен остановкой) ничего не делает.
    pub fn retain(
        &self,
        message: &Arc<Message>,
        limit: usize,
    ) {
        let Some(mut entry) = self.entries.get_mut(message.topic()) else {
            return;
        };

        let retained = &mut entry.retained;
        let at = retained
            .iter()
            .rposition(|m| m.timestamp() <= message.timestamp())
            .map_or(0, |i| i + 1);
        retained.insert(at, Arc::clone(message));
        if limit > 0 {
            while retained.len() > limit {
                retained.pop_front();
            }
        }
    }

    /// Все известные топики в лексикографическом порядке.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.entries.iter().map(|e| e.key().to_string()).collect();
        topics.sort_unstable();
        topics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Число публикаций в топик (0 для неизвестного).
    pub fn published(
        &self,
        topic: &str,
    ) -> u64 {
        self.entries.get(topic).map(|e| e.published).unwrap_or(0)
    }

    /// Сохранённые сообщения одного топика, от старых к новым.
    pub fn retained(
        &self,
        topic: &str,
    ) -> Vec<Arc<Message>> {
        self.entries
            .get(topic)
            .map(|e| e.retained.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Сохранённые сообщения всех топиков, подходящих под фильтр.
    ///
    /// Результат упорядочен по времени создания сообщений.
    pub fn retained_matching(
        &self,
        filter: &TopicFilter,
    ) -> Vec<Arc<Message>> {
        let mut found: Vec<Arc<Message>> = self
            .entries
            .iter()
            .filter(|e| filter.matches(e.key()))
            .flat_map(|e| e.retained.iter().cloned().collect::<Vec<_>>())
            .collect();
        // стабильная сортировка сохраняет порядок внутри одного топика
        found.sort_by_key(|m| m.timestamp());
        found
    }

    /// Удаляет сохранённые сообщения, оставляя сами топики и их счётчики.
    pub fn clear_retained(&self) {
        for mut entry in self.entries.iter_mut() {
            entry.retained.clear();
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    fn msg(
        topic: &str,
        text: &str,
    ) -> Arc<Message> {
        Arc::new(Message::new(topic, text))
    }

    fn publish(
        reg: &TopicRegistry,
        message: &Arc<Message>,
        limit: usize,
    ) {
        reg.record_publish(message.topic());
        reg.retain(message, limit);
    }

    #[test]
    fn test_record_counts_and_sorts_topics() {
        let reg = TopicRegistry::new();
        reg.record_publish("b/x");
        reg.record_publish("a/y");
        reg.record_publish("b/x");

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.topics(), vec!["a/y".to_string(), "b/x".to_string()]);
        assert_eq!(reg.published("b/x"), 2);
        assert_eq!(reg.published("missing"), 0);
        assert!(reg.retained("b/x").is_empty());
    }

    /// Тест проверяет вытеснение самых старых сообщений при лимите.
    #[test]
    fn test_retention_limit_evicts_oldest() {
        let reg = TopicRegistry::new();
        for i in 0..5 {
            publish(&reg, &msg("t", &i.to_string()), 3);
        }

        let kept: Vec<String> = reg
            .retained("t")
            .iter()
            .map(|m| m.as_text().unwrap().to_string())
            .collect();
        assert_eq!(kept, vec!["2", "3", "4"]);
    }

    /// Тест проверяет, что сообщения, разосланные не по порядку, хранятся по
    /// времени создания.
    #[test]
    fn test_retain_keeps_creation_order() {
        let reg = TopicRegistry::new();
        let older = msg("t", "older");
        thread::sleep(Duration::from_millis(2));
        let newer = msg("t", "newer");

        reg.record_publish("t");
        reg.record_publish("t");
        reg.retain(&newer, 0);
        reg.retain(&older, 0);

        let kept: Vec<String> = reg
            .retained("t")
            .iter()
            .map(|m| m.as_text().unwrap().to_string())
            .collect();
        assert_eq!(kept, vec!["older", "newer"]);
    }

    #[test]
    fn test_retain_ignores_unknown_topic() {
        let reg = TopicRegistry::new();
        reg.retain(&msg("ghost", "x"), 10);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let reg = TopicRegistry::new();
        for i in 0..250 {
            publish(&reg, &msg("t", &i.to_string()), 0);
        }
        assert_eq!(reg.retained("t").len(), 250);
    }

    #[test]
    fn test_retained_matching_uses_filter() {
        let reg = TopicRegistry::new();
        publish(&reg, &msg("sensors/temp", "t"), 10);
        publish(&reg, &msg("sensors/hum", "h"), 10);
        publish(&reg, &msg("alerts/disk", "d"), 10);

        let filter = TopicFilter::new("sensors/+").unwrap();
        let found = reg.retained_matching(&filter);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m.topic().starts_with("sensors/")));
    }

    #[test]
    fn test_clear_retained_keeps_topics() {
        let reg = TopicRegistry::new();
        publish(&reg, &msg("t", "1"), 10);
        reg.clear_retained();

        assert_eq!(reg.len(), 1);
        assert!(reg.retained("t").is_empty());

        reg.clear();
        assert!(reg.is_empty());
    }
}
