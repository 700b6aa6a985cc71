use std::sync::Arc;

use tracing::info;

use busbar::broker::Consumer;
use busbar::config::load_config;
use busbar::utils::logging;
use busbar::{Broker, Producer};

/// Small end-to-end demo: two topics, a handful of consumers, two
/// producers, then a graceful drain.
#[tokio::main]
async fn main() {
    let settings = load_config().expect("Failed to load configuration");
    logging::init(&settings.log.level);

    let capacity = settings.broker.default_topic_capacity;
    let inbox_capacity = settings.broker.default_inbox_capacity;
    let shutdown_timeout = settings.broker.shutdown_timeout();

    let broker = Arc::new(Broker::new(settings.broker));
    broker
        .create_topic("orders", capacity)
        .expect("create orders topic");
    broker
        .create_topic("payments", capacity)
        .expect("create payments topic");

    let consumers: Vec<Consumer> = (1..=3)
        .map(|n| {
            let name = format!("consumer-{n}");
            let id = name.clone();
            Consumer::new(
                name,
                inbox_capacity,
                Box::new(move |msg| {
                    let json = serde_json::to_string(msg)?;
                    info!(consumer = %id, message = %json, "received");
                    Ok(())
                }),
            )
        })
        .collect();

    for consumer in &consumers {
        broker.subscribe("orders", consumer).expect("subscribe orders");
    }
    broker
        .subscribe("payments", &consumers[0])
        .expect("subscribe payments");

    broker.start();

    let producer_1 = Producer::new("producer-1", Arc::clone(&broker));
    let producer_2 = Producer::new("producer-2", Arc::clone(&broker));

    for n in 1..=3 {
        producer_1
            .publish("orders", format!("order #{n}"))
            .await
            .expect("publish order");
    }
    producer_2
        .publish("payments", "payment #1")
        .await
        .expect("publish payment");

    let drained = broker.shutdown(shutdown_timeout).await;
    info!(drained, "demo finished");
}
