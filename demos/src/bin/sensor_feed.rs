use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use topicbus::{
    global, init_logging, BrokerError, LoggingConfig, Message, MessagePayload, Priority,
    SubscriptionOptions,
};
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct Reading {
    room: String,
    celsius: f64,
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default()).context("logging setup failed")?;

    // TOPICBUS_THREAD_COUNT и другие переменные окружения переопределяют умолчания
    if let Err(e) = global::initialize_from_env() {
        // уже запущенный брокер годится, остальные ошибки фатальны
        if e.downcast_ref::<BrokerError>() != Some(&BrokerError::AlreadyRunning) {
            return Err(e.into());
        }
        warn!(error = %e, "Global broker already running, reusing it");
    }
    let broker = global::broker();

    // все показания датчиков
    let total = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&total);
    broker.subscribe(
        "sensors/#",
        move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
        SubscriptionOptions::default(),
    )?;

    // только температура, с разбором JSON
    broker.subscribe(
        "sensors/+/temperature",
        |msg| match msg.decode_json::<Reading>() {
            Ok(r) if r.celsius > 30.0 => warn!(room = %r.room, celsius = r.celsius, "Too hot"),
            Ok(r) => info!(room = %r.room, celsius = r.celsius, "Temperature"),
            Err(e) => warn!(error = %e, "Unexpected payload"),
        },
        SubscriptionOptions::default(),
    )?;

    // алерты: не больше трёх
    broker.subscribe(
        "alerts/+",
        |msg| {
            info!(
                topic = msg.topic(),
                priority = ?msg.priority(),
                text = msg.as_text().unwrap_or("<binary>"),
                "Alert"
            )
        },
        SubscriptionOptions {
            max_messages: 3,
            ..Default::default()
        },
    )?;

    for (i, room) in ["kitchen", "garage", "attic"].iter().cycle().take(12).enumerate() {
        let topic = format!("sensors/{room}/temperature");
        let reading = Reading {
            room: room.to_string(),
            celsius: 18.0 + (i as f64) * 1.5,
        };
        let payload = MessagePayload::json(&reading)?;
        broker.publish(&topic, Message::new(topic.as_str(), payload));

        let humidity = format!("sensors/{room}/humidity");
        broker.publish(&humidity, Message::new(humidity.as_str(), format!("{}%", 40 + i)));
    }

    for disk in ["sda", "sdb", "sdc", "sdd", "sde"] {
        let topic = format!("alerts/{disk}");
        let msg = Message::new(topic.as_str(), "disk almost full").with_priority(Priority::High);
        broker.publish(&topic, msg);
    }

    thread::sleep(Duration::from_millis(200));
    let stats = broker.stats();
    info!(%stats, sensor_messages = total.load(Ordering::Relaxed), "Done");

    global::shutdown();
    Ok(())
}
