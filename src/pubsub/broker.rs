use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex, RwLock};
use topicbus_error::{BrokerError, ErrorExt, LogLevel, PublishError, SubscribeError};
use tracing::{debug, error, info, trace, warn};

use super::{
    BrokerStats, DeliveryResult, Message, Subscription, SubscriptionId, SubscriptionOptions,
    TopicFilter, TopicRegistry,
};
use crate::config::BrokerConfig;

/// Префикс имён рабочих потоков.
const WORKER_NAME_PREFIX: &str = "topicbus-worker";

/// Брокер Pub/Sub сообщений.
///
/// Поддерживает:
/// - Ограниченную FIFO-очередь с отбрасыванием при переполнении
/// - Пул рабочих потоков ОС, разбирающих очередь
/// - Точные подписки и подписки по шаблонам (`+`, `#`)
/// - Сохранение последних сообщений каждого топика
/// - Статистику публикаций и доставок
///
/// Брокер можно останавливать и запускать заново. При уничтожении работающий
/// брокер останавливается.
pub struct Broker {
    /// Состояние, разделяемое с рабочими потоками
    shared: Arc<Shared>,
    /// Хэндлы рабочих потоков; мьютекс сериализует запуск и остановку
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Общая часть брокера: рабочие потоки владеют ею через `Arc` и никогда не
/// заимствуют сам [`Broker`].
struct Shared {
    /// Ожидающие сообщения, FIFO
    queue: Mutex<VecDeque<Arc<Message>>>,
    /// Сигнал "очередь не пуста или идёт остановка"
    available: Condvar,
    /// Меняется только под блокировкой очереди
    running: AtomicBool,
    /// Номер запуска; рабочий поток прошлого запуска, увидев чужой номер,
    /// завершается. Меняется только под блокировкой очереди
    generation: AtomicU64,
    /// Упорядочены по ID, то есть по времени создания
    subscriptions: RwLock<BTreeMap<SubscriptionId, Arc<Subscription>>>,
    topics: TopicRegistry,
    config: RwLock<BrokerConfig>,
    published: AtomicUsize,
    delivered: AtomicUsize,
    dropped: AtomicUsize,
    failed: AtomicUsize,
    worker_count: AtomicUsize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Broker {
    /// Создаёт остановленный брокер с конфигурацией по умолчанию.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                subscriptions: RwLock::new(BTreeMap::new()),
                topics: TopicRegistry::new(),
                config: RwLock::new(BrokerConfig::default()),
                published: AtomicUsize::new(0),
                delivered: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                worker_count: AtomicUsize::new(0),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Создаёт и сразу запускает брокер.
    pub fn start(config: BrokerConfig) -> Result<Self, BrokerError> {
        let broker = Self::new();
        broker.try_initialize(config)?;
        Ok(broker)
    }

    /// Запускает брокер. Возвращает `false`, если брокер уже работает или
    /// конфигурация некорректна.
    pub fn initialize(
        &self,
        config: BrokerConfig,
    ) -> bool {
        match self.try_initialize(config) {
            Ok(()) => true,
            Err(e) => {
                log_rejection("initialize", &e);
                false
            }
        }
    }

    /// Запускает брокер и пул рабочих потоков.
    ///
    /// `thread_count == 0` означает число логических CPU. Из нескольких
    /// одновременных вызовов успешен не более чем один.
    pub fn try_initialize(
        &self,
        config: BrokerConfig,
    ) -> Result<(), BrokerError> {
        let mut workers = self.workers.lock();
        if self.shared.running.load(Ordering::Acquire) {
            return Err(BrokerError::AlreadyRunning);
        }
        config.validate()?;

        let thread_count = config.effective_thread_count();
        let queue_capacity = config.max_queue_size;
        *self.shared.config.write() = config;

        let generation = {
            let _queue = self.shared.queue.lock();
            self.shared.running.store(true, Ordering::Release);
            self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        for index in 0..thread_count {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("{WORKER_NAME_PREFIX}-{index}"))
                .spawn(move || shared.worker_loop(index, generation));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(worker = index, error = %e, "Failed to spawn worker thread");
                    self.shared.stop_workers(&mut workers);
                    return Err(BrokerError::WorkerSpawn {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.shared
            .worker_count
            .store(thread_count, Ordering::Relaxed);
        info!(
            workers = thread_count,
            queue_capacity,
            generation,
            "Broker started"
        );
        Ok(())
    }

    /// Останавливает брокер.
    ///
    /// Рабочие потоки дорабатывают уже поставленные в очередь сообщения и
    /// завершаются; затем подписки и топики очищаются. Повторный вызов ничего
    /// не делает. Нельзя вызывать из обработчика подписки.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock();
        if !self.shared.running.load(Ordering::Acquire) && workers.is_empty() {
            return;
        }

        self.shared.stop_workers(&mut workers);

        let cancelled = {
            let mut subscriptions = self.shared.subscriptions.write();
            for sub in subscriptions.values() {
                sub.cancel();
            }
            let n = subscriptions.len();
            subscriptions.clear();
            n
        };
        self.shared.topics.clear();
        let leftover = {
            let mut queue = self.shared.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        self.shared.worker_count.store(0, Ordering::Relaxed);

        info!(
            subscriptions = cancelled,
            discarded = leftover,
            "Broker stopped"
        );
    }

    /// Публикует сообщение. Возвращает `false`, если сообщение не принято.
    pub fn publish(
        &self,
        topic: &str,
        message: Message,
    ) -> bool {
        match self.try_publish(topic, message) {
            Ok(()) => true,
            Err(e) => {
                log_rejection("publish", &e);
                false
            }
        }
    }

    /// Ставит сообщение в очередь и будит один рабочий поток.
    ///
    /// Маршрутизация идёт по топику самого сообщения. В строгом режиме `topic`
    /// обязан быть корректным и совпадать с ним.
    pub fn try_publish(
        &self,
        topic: &str,
        message: Message,
    ) -> Result<(), PublishError> {
        if !self.is_running() {
            return Err(PublishError::NotRunning);
        }

        let (strict, capacity) = {
            let config = self.shared.config.read();
            (config.strict_topic_matching, config.max_queue_size)
        };

        if strict {
            validate_publish_topic(topic)?;
            if topic != message.topic() {
                return Err(PublishError::TopicMismatch {
                    expected: topic.to_string(),
                    actual: message.topic().to_string(),
                });
            }
        } else if topic != message.topic() {
            warn!(
                topic,
                message_topic = message.topic(),
                "Publish topic differs from message topic, routing by message topic"
            );
        }

        let message = Arc::new(message);
        {
            let mut queue = self.shared.queue.lock();
            // остановка меняет флаг под этой же блокировкой, поэтому учтённая
            // здесь публикация не переживёт очистку реестров в `shutdown`
            if !self.shared.running.load(Ordering::Acquire) {
                return Err(PublishError::NotRunning);
            }
            if capacity > 0 && queue.len() >= capacity {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(PublishError::QueueFull {
                    topic: message.topic().to_string(),
                    capacity,
                });
            }
            queue.push_back(Arc::clone(&message));
            self.shared.topics.record_publish(message.topic());
            self.shared.published.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.available.notify_one();

        trace!(topic = message.topic(), id = message.id(), "Message queued");
        Ok(())
    }

    /// Регистрирует подписку.
    ///
    /// С `receive_existing_messages` сохранённые сообщения подходящих топиков
    /// доставляются сразу, в вызывающем потоке, от старых к новым.
    pub fn subscribe<F>(
        &self,
        pattern: &str,
        callback: F,
        options: SubscriptionOptions,
    ) -> Result<Arc<Subscription>, SubscribeError>
    where
        F: Fn(Arc<Message>) + Send + Sync + 'static,
    {
        if !self.is_running() {
            return Err(SubscribeError::NotRunning);
        }

        let (strict, retain) = {
            let config = self.shared.config.read();
            (config.strict_topic_matching, config.retain_messages)
        };

        let filter = TopicFilter::with_strictness(pattern, strict)?;
        let subscription = Arc::new(Subscription::with_filter(
            filter,
            Arc::new(callback),
            options,
        ));
        let replay = retain && subscription.options().receive_existing_messages;

        // Снимок сохранённых сообщений берётся под той же блокировкой, что и
        // вставка: рабочие потоки сохраняют сообщение, удерживая реестр на
        // чтение, так что в снимок попадают ровно те сообщения, которые были
        // разосланы без новой подписки.
        let existing = {
            let mut subscriptions = self.shared.subscriptions.write();
            subscriptions.insert(subscription.id(), Arc::clone(&subscription));
            if replay {
                self.shared.topics.retained_matching(subscription.filter())
            } else {
                Vec::new()
            }
        };

        debug!(
            subscription = %subscription.id(),
            pattern = subscription.pattern(),
            replay = existing.len(),
            "Subscription registered"
        );

        for message in &existing {
            self.shared.record_delivery(subscription.deliver(message));
        }

        Ok(subscription)
    }

    /// Удаляет подписку. `false`, если брокер её не знает.
    ///
    /// Доставки, уже начатые рабочими потоками, не прерываются.
    pub fn unsubscribe(
        &self,
        subscription: &Subscription,
    ) -> bool {
        let removed = self
            .shared
            .subscriptions
            .write()
            .remove(&subscription.id());

        match removed {
            Some(sub) => {
                sub.cancel();
                debug!(subscription = %sub.id(), "Subscription removed");
                true
            }
            None => false,
        }
    }

    /// Снимок статистики.
    pub fn stats(&self) -> BrokerStats {
        let shared = &self.shared;
        BrokerStats {
            topic_count: shared.topics.len(),
            subscription_count: shared.subscriptions.read().len(),
            published_messages: shared.published.load(Ordering::Relaxed),
            delivered_messages: shared.delivered.load(Ordering::Relaxed),
            queued_messages: shared.queue.lock().len(),
            worker_threads: shared.worker_count.load(Ordering::Relaxed),
            dropped_messages: shared.dropped.load(Ordering::Relaxed),
            failed_deliveries: shared.failed.load(Ordering::Relaxed),
        }
    }

    /// То же, что [`Broker::stats`].
    pub fn get_stats(&self) -> BrokerStats {
        self.stats()
    }

    /// Известные топики в лексикографическом порядке.
    pub fn topics(&self) -> Vec<String> {
        self.shared.topics.topics()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Текущая (последняя применённая) конфигурация.
    pub fn config(&self) -> BrokerConfig {
        self.shared.config.read().clone()
    }

    pub fn clear_retained_messages(&self) {
        self.shared.topics.clear_retained();
    }

    /// Сохранённые сообщения топика, от старых к новым.
    pub fn retained_messages(
        &self,
        topic: &str,
    ) -> Vec<Arc<Message>> {
        self.shared.topics.retained(topic)
    }
}

impl Shared {
    /// Цикл рабочего потока: ждёт сообщения, доставляет, повторяет.
    ///
    /// Завершается, когда брокер остановлен и очередь пуста.
    fn worker_loop(
        &self,
        index: usize,
        generation: u64,
    ) {
        debug!(worker = index, generation, "Worker started");

        while let Some(message) = self.next_message(generation) {
            self.dispatch(&message);
        }

        debug!(worker = index, generation, "Worker stopped");
    }

    /// Блокирует поток до появления сообщения или остановки.
    ///
    /// Поток чужого запуска (брокер остановлен из его обработчика и запущен
    /// заново) получает `None` и не трогает очередь.
    fn next_message(
        &self,
        generation: u64,
    ) -> Option<Arc<Message>> {
        let mut queue = self.queue.lock();
        loop {
            if self.generation.load(Ordering::Acquire) != generation {
                // сигнал мог предназначаться потоку текущего запуска
                self.available.notify_one();
                return None;
            }
            if let Some(message) = queue.pop_front() {
                return Some(message);
            }
            if !self.running.load(Ordering::Acquire) {
                return None;
            }
            self.available.wait(&mut queue);
        }
    }

    /// Доставляет сообщение всем подходящим активным подпискам в порядке их
    /// создания. Блокировка реестра на время вызовов не удерживается.
    ///
    /// Сообщение сохраняется для повтора, пока реестр ещё удерживается на
    /// чтение (см. [`Broker::subscribe`]).
    fn dispatch(
        &self,
        message: &Arc<Message>,
    ) {
        let (retain, limit) = {
            let config = self.config.read();
            (config.retain_messages, config.max_retained_messages)
        };

        let targets: Vec<Arc<Subscription>> = {
            let subscriptions = self.subscriptions.read();
            let targets: Vec<_> = subscriptions
                .values()
                .filter(|sub| sub.is_active() && sub.matches(message.topic()))
                .cloned()
                .collect();
            if retain {
                self.topics.retain(message, limit);
            }
            targets
        };

        trace!(
            topic = message.topic(),
            id = message.id(),
            subscribers = targets.len(),
            "Dispatching message"
        );

        for sub in targets {
            self.record_delivery(sub.deliver(message));
        }
    }

    fn record_delivery(
        &self,
        result: DeliveryResult,
    ) {
        match result {
            DeliveryResult::Success => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryResult::Error | DeliveryResult::Timeout => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryResult::Filtered | DeliveryResult::Rejected => {}
        }
    }

    /// Снимает флаг работы, будит и дожидается все рабочие потоки.
    fn stop_workers(
        &self,
        workers: &mut Vec<JoinHandle<()>>,
    ) {
        {
            let _queue = self.queue.lock();
            self.running.store(false, Ordering::Release);
        }
        self.available.notify_all();

        let current = thread::current().id();
        for handle in workers.drain(..) {
            if handle.thread().id() == current {
                warn!("Broker stopped from its own worker thread, skipping join");
                continue;
            }
            let name = handle.thread().name().unwrap_or(WORKER_NAME_PREFIX).to_string();
            if handle.join().is_err() {
                error!(worker = %name, "Worker thread panicked");
            }
        }
    }
}

/// Пишет отказ операции в лог с уровнем, который задаёт код ошибки.
fn log_rejection<E: ErrorExt>(
    operation: &'static str,
    err: &E,
) {
    let code = err.status_code();
    match code.log_level() {
        LogLevel::Debug => debug!(operation, %code, error = %err, "Operation rejected"),
        LogLevel::Info => info!(operation, %code, error = %err, "Operation rejected"),
        LogLevel::Warn => warn!(operation, %code, error = %err, "Operation rejected"),
        LogLevel::Error => error!(operation, %code, error = %err, "Operation rejected"),
    }
}

/// Проверка топика публикации в строгом режиме.
fn validate_publish_topic(topic: &str) -> Result<(), PublishError> {
    if topic.is_empty() {
        return Err(PublishError::InvalidTopic {
            topic: String::new(),
            reason: "topic cannot be empty".to_string(),
        });
    }
    if TopicFilter::has_wildcards(topic) {
        return Err(PublishError::InvalidTopic {
            topic: topic.to_string(),
            reason: "wildcards are not allowed in published topics".to_string(),
        });
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
