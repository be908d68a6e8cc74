use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use topicbus_error::PatternError;
use tracing::{error, warn};

use super::{Message, TopicFilter};

/// Счётчик для выдачи уникальных в пределах процесса ID подписок.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(0);

/// Обработчик входящих сообщений.
///
/// Вызывается синхронно в рабочем потоке брокера.
pub type MessageCallback = Arc<dyn Fn(Arc<Message>) + Send + Sync + 'static>;

/// Уникальный ID подписки. Выдаётся монотонно.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Параметры подписки.
///
/// # Поля
/// * `max_messages` - лимит доставок (0 = без лимита).
/// * `auto_acknowledge` - подтверждать сообщение после успешного вызова.
/// * `receive_existing_messages` - при подписке получить сохранённые
///   сообщения подходящих топиков.
/// * `timeout_ms` - порог длительности обработчика (0 = без порога).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub max_messages: usize,
    pub auto_acknowledge: bool,
    pub receive_existing_messages: bool,
    pub timeout_ms: u64,
}

/// Итог одной попытки доставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Обработчик отработал
    Success,
    /// Топик не подходит под фильтр
    Filtered,
    /// Подписка отменена или лимит исчерпан
    Rejected,
    /// Обработчик отработал дольше `timeout_ms`
    Timeout,
    /// Обработчик запаниковал
    Error,
}

/// Подписка: фильтр топиков, обработчик и параметры.
///
/// Живёт независимо от брокера: `cancel` только снимает флаг активности и не
/// ждёт доставок, которые уже идут.
pub struct Subscription {
    id: SubscriptionId,
    filter: TopicFilter,
    callback: MessageCallback,
    options: SubscriptionOptions,
    /// Изменяется только путём доставки
    delivered: AtomicUsize,
    acknowledged: AtomicUsize,
    /// Изменяется только `cancel`
    active: AtomicBool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Subscription {
    /// Создаёт подписку с нестрогой проверкой шаблона.
    ///
    /// Ошибка возможна только при некорректном шаблоне.
    pub fn create<F>(
        pattern: &str,
        callback: F,
        options: SubscriptionOptions,
    ) -> Result<Self, PatternError>
    where
        F: Fn(Arc<Message>) + Send + Sync + 'static,
    {
        Ok(Self::with_filter(
            TopicFilter::new(pattern)?,
            Arc::new(callback),
            options,
        ))
    }

    /// Создаёт подписку из готового фильтра.
    pub fn with_filter(
        filter: TopicFilter,
        callback: MessageCallback,
        options: SubscriptionOptions,
    ) -> Self {
        Self {
            id: SubscriptionId::next(),
            filter,
            callback,
            options,
            delivered: AtomicUsize::new(0),
            acknowledged: AtomicUsize::new(0),
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    pub fn pattern(&self) -> &str {
        self.filter.pattern()
    }

    pub fn options(&self) -> &SubscriptionOptions {
        &self.options
    }

    #[inline]
    pub fn matches(
        &self,
        topic: &str,
    ) -> bool {
        self.filter.matches(topic)
    }

    /// Доставляет сообщение обработчику.
    ///
    /// Счётчик доставок увеличивается до вызова обработчика, поэтому попытка,
    /// закончившаяся паникой, тоже учитывается.
    pub fn deliver(
        &self,
        message: &Arc<Message>,
    ) -> DeliveryResult {
        if !self.is_active() {
            return DeliveryResult::Rejected;
        }

        if !self.matches(message.topic()) {
            return DeliveryResult::Filtered;
        }

        if !self.reserve_slot() {
            return DeliveryResult::Rejected;
        }

        let started = Instant::now();
        let callback = &self.callback;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(Arc::clone(message))));
        let elapsed = started.elapsed();

        if let Err(cause) = outcome {
            error!(
                subscription = %self.id,
                topic = message.topic(),
                message_id = message.id(),
                panic = panic_message(&cause),
                "Subscriber callback panicked"
            );
            return DeliveryResult::Error;
        }

        if self.options.auto_acknowledge {
            self.acknowledge(message.id());
        }

        if self.options.timeout_ms > 0 && elapsed > Duration::from_millis(self.options.timeout_ms) {
            warn!(
                subscription = %self.id,
                topic = message.topic(),
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.options.timeout_ms,
                "Subscriber callback exceeded its timeout"
            );
            return DeliveryResult::Timeout;
        }

        DeliveryResult::Success
    }

    /// Подтверждает обработку сообщения.
    ///
    /// Сейчас только ведёт счётчик подтверждений.
    pub fn acknowledge(
        &self,
        _message_id: &str,
    ) -> bool {
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Отменяет подписку. Повторный вызов ничего не делает.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Сколько раз вызывался обработчик (включая упавшие вызовы).
    pub fn message_count(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn acknowledged_count(&self) -> usize {
        self.acknowledged.load(Ordering::Relaxed)
    }

    /// Атомарно занимает место под доставку с учётом `max_messages`.
    fn reserve_slot(&self) -> bool {
        let limit = self.options.max_messages;
        if limit == 0 {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        self.delivered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }
}

fn panic_message(cause: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            max_messages: 0,
            auto_acknowledge: true,
            receive_existing_messages: false,
            timeout_ms: 0,
        }
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern())
            .field("options", &self.options)
            .field("delivered", &self.message_count())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, thread};

    use super::*;

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(Arc<Message>) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |msg: Arc<Message>| {
            sink.lock().unwrap().push(msg.topic().to_string())
        })
    }

    fn msg(topic: &str) -> Arc<Message> {
        Arc::new(Message::new(topic, "x"))
    }

    /// Тест проверяет, что ID подписок уникальны и растут.
    #[test]
    fn test_ids_are_monotonic() {
        let a = Subscription::create("a", |_| {}, SubscriptionOptions::default()).unwrap();
        let b = Subscription::create("a", |_| {}, SubscriptionOptions::default()).unwrap();
        assert!(b.id() > a.id());
        assert!(a.id().to_string().starts_with("sub_"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = Subscription::create("", |_| {}, SubscriptionOptions::default()).unwrap_err();
        assert_eq!(err, PatternError::Empty);
    }

    #[test]
    fn test_deliver_success_invokes_callback() {
        let (seen, cb) = collector();
        let sub = Subscription::create("sensors/#", cb, SubscriptionOptions::default()).unwrap();

        assert_eq!(sub.deliver(&msg("sensors/temp")), DeliveryResult::Success);
        assert_eq!(sub.message_count(), 1);
        assert_eq!(sub.acknowledged_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["sensors/temp".to_string()]);
    }

    #[test]
    fn test_deliver_filtered_on_mismatch() {
        let (seen, cb) = collector();
        let sub = Subscription::create("sensors/+", cb, SubscriptionOptions::default()).unwrap();

        assert_eq!(sub.deliver(&msg("alerts/disk")), DeliveryResult::Filtered);
        assert_eq!(sub.message_count(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    /// Тест проверяет, что отменённая подписка отклоняет доставку, а отмена
    /// идемпотентна.
    #[test]
    fn test_cancel_rejects_and_is_idempotent() {
        let (seen, cb) = collector();
        let sub = Subscription::create("a", cb, SubscriptionOptions::default()).unwrap();

        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());
        assert_eq!(sub.deliver(&msg("a")), DeliveryResult::Rejected);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_max_messages_limit() {
        let options = SubscriptionOptions {
            max_messages: 2,
            ..Default::default()
        };
        let sub = Subscription::create("a", |_| {}, options).unwrap();

        assert_eq!(sub.deliver(&msg("a")), DeliveryResult::Success);
        assert_eq!(sub.deliver(&msg("a")), DeliveryResult::Success);
        assert_eq!(sub.deliver(&msg("a")), DeliveryResult::Rejected);
        assert_eq!(sub.message_count(), 2);
    }

    /// Тест проверяет, что паника обработчика превращается в `Error`, а
    /// счётчик всё равно увеличивается.
    #[test]
    fn test_panicking_callback_is_isolated() {
        let sub = Subscription::create(
            "boom",
            |_| panic!("subscriber failure"),
            SubscriptionOptions::default(),
        )
        .unwrap();

        assert_eq!(sub.deliver(&msg("boom")), DeliveryResult::Error);
        assert_eq!(sub.message_count(), 1);
        assert_eq!(sub.acknowledged_count(), 0);
        assert!(sub.is_active());
    }

    #[test]
    fn test_no_auto_ack() {
        let options = SubscriptionOptions {
            auto_acknowledge: false,
            ..Default::default()
        };
        let sub = Subscription::create("a", |_| {}, options).unwrap();

        assert_eq!(sub.deliver(&msg("a")), DeliveryResult::Success);
        assert_eq!(sub.acknowledged_count(), 0);
        assert!(sub.acknowledge("manual"));
        assert_eq!(sub.acknowledged_count(), 1);
    }

    #[test]
    fn test_slow_callback_reports_timeout() {
        let options = SubscriptionOptions {
            timeout_ms: 5,
            ..Default::default()
        };
        let sub = Subscription::create(
            "slow",
            |_| thread::sleep(Duration::from_millis(40)),
            options,
        )
        .unwrap();

        assert_eq!(sub.deliver(&msg("slow")), DeliveryResult::Timeout);
        assert_eq!(sub.message_count(), 1);
    }

    /// Тест проверяет, что лимит не превышается при конкурентной доставке.
    #[test]
    fn test_limit_holds_under_concurrency() {
        let options = SubscriptionOptions {
            max_messages: 10,
            ..Default::default()
        };
        let sub = Arc::new(Subscription::create("c", |_| {}, options).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sub = Arc::clone(&sub);
                thread::spawn(move || {
                    (0..10)
                        .filter(|_| sub.deliver(&msg("c")) == DeliveryResult::Success)
                        .count()
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
        assert_eq!(sub.message_count(), 10);
    }
}
