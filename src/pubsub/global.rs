//! Общий для процесса брокер.
//!
//! Создаётся лениво при первом обращении и никогда не уничтожается, поэтому
//! перед выходом из процесса нужно явно вызвать [`shutdown`], чтобы
//! дождаться завершения рабочих потоков.

use once_cell::sync::Lazy;
use topicbus_error::{BusResult, ResultExt};

use super::Broker;
use crate::config::BrokerConfig;

static GLOBAL_BROKER: Lazy<Broker> = Lazy::new(Broker::new);

/// Запускает общий брокер с конфигурацией по умолчанию и `thread_count`
/// рабочими потоками (0 = по числу CPU).
pub fn initialize(thread_count: usize) -> bool {
    GLOBAL_BROKER.initialize(BrokerConfig::with_thread_count(thread_count))
}

/// Запускает общий брокер с полной конфигурацией.
pub fn initialize_with(config: BrokerConfig) -> bool {
    GLOBAL_BROKER.initialize(config)
}

/// Запускает общий брокер с конфигурацией из переменных окружения
/// `TOPICBUS_*`.
pub fn initialize_from_env() -> BusResult<()> {
    let config = BrokerConfig::load().context("loading broker configuration")?;
    let workers = config.effective_thread_count();
    GLOBAL_BROKER
        .try_initialize(config)
        .with_context(|| format!("starting global broker with {workers} workers"))
}

pub fn shutdown() {
    GLOBAL_BROKER.shutdown();
}

pub fn broker() -> &'static Broker {
    &GLOBAL_BROKER
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    use serial_test::serial;
    use topicbus_error::{BrokerError, StatusCode};

    use super::*;
    use crate::pubsub::{Message, SubscriptionOptions};

    #[test]
    #[serial]
    fn test_global_lifecycle() {
        assert!(initialize(2));
        assert!(!initialize(2));
        assert!(broker().is_running());
        assert_eq!(broker().stats().worker_threads, 2);

        shutdown();
        assert!(!broker().is_running());
        shutdown();
    }

    /// Тест проверяет доставку через общий брокер и его перезапуск.
    #[test]
    #[serial]
    fn test_global_publish_and_restart() {
        for _ in 0..2 {
            assert!(initialize(1));

            let hits = Arc::new(AtomicUsize::new(0));
            let h = Arc::clone(&hits);
            broker()
                .subscribe(
                    "global/+",
                    move |_| {
                        h.fetch_add(1, Ordering::SeqCst);
                    },
                    SubscriptionOptions::default(),
                )
                .unwrap();

            assert!(broker().publish("global/a", Message::new("global/a", "x")));

            let deadline = Instant::now() + Duration::from_secs(5);
            while hits.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            assert_eq!(hits.load(Ordering::SeqCst), 1);

            shutdown();
            assert_eq!(broker().stats().subscription_count, 0);
        }
    }

    /// Тест проверяет, что ошибка запуска несёт код и контекст.
    #[test]
    #[serial]
    fn test_initialize_from_env_reports_context() {
        std::env::remove_var("TOPICBUS_THREAD_COUNT");
        initialize_from_env().unwrap();

        let err = initialize_from_env().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::AlreadyRunning);
        assert_eq!(err.contexts().len(), 1);
        assert!(err.contexts()[0].message.starts_with("starting global broker with"));
        assert_eq!(
            err.downcast_ref::<BrokerError>(),
            Some(&BrokerError::AlreadyRunning)
        );

        shutdown();
    }
}
