use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broker::consumer::{Consumer, ConsumerId};
use crate::broker::event::{BrokerEvent, EventSender};
use crate::broker::topic::{PublishAck, SubscriptionId, Topic};
use crate::config::BrokerSettings;
use crate::utils::error::BrokerError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The broker: registry of topics, registry of the consumers subscribed
/// through it, and owner of every dispatch and processing loop.
///
/// There is no implicit global instance. A broker is constructed
/// explicitly, shared as `Arc<Broker>` with producers and consumers, and
/// torn down with [`Broker::shutdown`], after which every operation fails
/// with [`BrokerError::BrokerClosed`].
pub struct Broker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    consumers: Mutex<HashMap<ConsumerId, Consumer>>,
    dispatch_handles: Mutex<Vec<JoinHandle<()>>>,
    settings: BrokerSettings,
    events: EventSender,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            consumers: Mutex::new(HashMap::new()),
            dispatch_handles: Mutex::new(Vec::new()),
            settings,
            events: EventSender::new(EVENT_CHANNEL_CAPACITY),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Subscribes to the observability hook: per-consumer delivery
    /// failures, discarded inboxes and handler errors are reported here
    /// rather than propagated to producers.
    pub fn events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    /// Creates a topic, idempotently by name: if the topic already exists
    /// it is returned as-is and `capacity` is ignored. Messages published
    /// before `start` are queued and dispatched once the loop spins up.
    pub fn create_topic(&self, name: &str, capacity: usize) -> Result<Arc<Topic>, BrokerError> {
        self.ensure_open()?;
        let mut topics = self.topics.write().unwrap();
        if let Some(existing) = topics.get(name) {
            return Ok(Arc::clone(existing));
        }
        let topic = Arc::new(Topic::new(
            name,
            capacity,
            self.settings.publish_timeout(),
            self.settings.delivery_timeout(),
            self.events.clone(),
        ));
        topics.insert(name.to_string(), Arc::clone(&topic));
        info!(topic = name, capacity, "topic created");
        drop(topics);

        if self.started.load(Ordering::SeqCst) {
            if let Some(handle) = topic.spawn_dispatch() {
                self.dispatch_handles.lock().unwrap().push(handle);
            }
        }
        Ok(topic)
    }

    pub fn get_topic(&self, name: &str) -> Result<Arc<Topic>, BrokerError> {
        self.ensure_open()?;
        self.topics
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))
    }

    /// Publishes a payload to the named topic. Queuing guarantee only:
    /// a successful ack means the message is in the topic's queue, not
    /// that any subscriber has seen it yet.
    pub async fn publish(
        &self,
        topic_name: &str,
        payload: impl Into<String>,
        producer_id: impl Into<String>,
    ) -> Result<PublishAck, BrokerError> {
        let topic = self.get_topic(topic_name)?;
        topic.publish(payload, producer_id).await
    }

    /// Wires the consumer's inbox into the named topic and registers the
    /// consumer so shutdown can stop it. The subscription covers every
    /// message dequeued for dispatch after this call returns.
    pub fn subscribe(
        &self,
        topic_name: &str,
        consumer: &Consumer,
    ) -> Result<SubscriptionId, BrokerError> {
        let topic = self.get_topic(topic_name)?;
        let subscription_id = topic.subscribe(consumer.id().to_string(), consumer.inbox_sender())?;
        consumer.note_subscribed(topic_name);
        self.consumers
            .lock()
            .unwrap()
            .entry(consumer.id().to_string())
            .or_insert_with(|| consumer.clone());
        if self.started.load(Ordering::SeqCst) {
            consumer.spawn(self.events.clone());
        }
        Ok(subscription_id)
    }

    pub fn unsubscribe(&self, topic_name: &str, consumer_id: &str) -> Result<(), BrokerError> {
        let topic = self.get_topic(topic_name)?;
        topic.unsubscribe(consumer_id)?;
        if let Some(consumer) = self.consumers.lock().unwrap().get(consumer_id) {
            consumer.note_unsubscribed(topic_name);
        }
        Ok(())
    }

    /// Spins up the dispatch loop of every registered topic and the
    /// processing loop of every registered consumer. Topics and consumers
    /// added later are spun up as they arrive.
    pub fn start(&self) {
        if self.closed.load(Ordering::SeqCst) || self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let topics: Vec<Arc<Topic>> = self.topics.read().unwrap().values().cloned().collect();
        let mut handles = self.dispatch_handles.lock().unwrap();
        for topic in topics {
            if let Some(handle) = topic.spawn_dispatch() {
                handles.push(handle);
            }
        }
        drop(handles);
        let consumers: Vec<Consumer> = self.consumers.lock().unwrap().values().cloned().collect();
        for consumer in consumers {
            consumer.spawn(self.events.clone());
        }
        info!("broker started");
    }

    /// Graceful teardown: stop accepting publishes, drain every topic's
    /// backlog, then stop every consumer with drain. Anything still
    /// running when `timeout` is spent gets aborted. Returns whether the
    /// whole drain completed inside the budget.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return true;
        }
        info!(timeout_ms = timeout.as_millis() as u64, "broker shutting down");
        let deadline = Instant::now() + timeout;
        let mut drained = true;

        // A broker that was never started still owes its queued backlog a
        // drain: spin up any dispatch or processing loop that never ran.
        let topics: Vec<Arc<Topic>> = self.topics.read().unwrap().values().cloned().collect();
        {
            let mut handles = self.dispatch_handles.lock().unwrap();
            for topic in &topics {
                if let Some(handle) = topic.spawn_dispatch() {
                    handles.push(handle);
                }
            }
        }
        for consumer in self.consumers.lock().unwrap().values() {
            consumer.spawn(self.events.clone());
        }

        // 1. Reject new publishes; dispatch loops finish their backlog and
        // exit once the queue reports end-of-stream.
        for topic in &topics {
            topic.begin_drain();
        }
        let handles = std::mem::take(&mut *self.dispatch_handles.lock().unwrap());
        for mut handle in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                handle.abort();
                drained = false;
            }
        }

        // 2. Stop consumers, letting them drain their inboxes.
        let consumers: Vec<Consumer> = self.consumers.lock().unwrap().values().cloned().collect();
        for consumer in &consumers {
            consumer.request_stop(true);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        let all_stopped = futures::future::join_all(consumers.iter().map(|c| c.wait()));
        if tokio::time::timeout(remaining, all_stopped).await.is_err() {
            for consumer in &consumers {
                consumer.abort();
            }
            drained = false;
        }

        if drained {
            info!("broker shut down, fully drained");
        } else {
            warn!("broker shut down, drain incomplete");
        }
        drained
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrokerError::BrokerClosed)
        } else {
            Ok(())
        }
    }
}
