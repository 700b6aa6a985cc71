use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::consumer::ConsumerId;
use crate::broker::event::{BrokerEvent, EventSender};
use crate::broker::inbox::{DeliveryError, InboxSender};
use crate::broker::message::Message;
use crate::utils::error::BrokerError;

pub type SubscriptionId = Uuid;

/// Lifecycle of a topic. Draining begins at broker shutdown: publishes are
/// rejected while the dispatch loop finishes the queued backlog, then the
/// topic reports `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TopicState {
    Created = 0,
    Active = 1,
    Draining = 2,
    Closed = 3,
}

impl TopicState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TopicState::Created,
            1 => TopicState::Active,
            2 => TopicState::Draining,
            _ => TopicState::Closed,
        }
    }
}

/// Returned from a successful publish. Acknowledges that the message was
/// queued on the topic, not that it has been delivered to anyone.
#[derive(Debug, Clone)]
pub struct PublishAck {
    pub message_id: Uuid,
    pub topic: Arc<str>,
}

#[derive(Debug)]
struct SubscriberSlot {
    subscription_id: SubscriptionId,
    inbox: InboxSender,
    /// Messages skipped for this subscriber because its inbox stayed full
    /// past the delivery timeout.
    dropped: u64,
}

/// A named broadcast channel: a bounded FIFO publish queue plus the current
/// subscriber set, drained by one dispatch loop task per topic.
///
/// The queue and the subscriber map are the only shared state. No lock is
/// held across an `.await`, and nothing here locks another topic, so topics
/// scale independently of each other.
#[derive(Debug)]
pub struct Topic {
    name: Arc<str>,
    capacity: usize,
    /// Publish half of the queue. Taken (dropped) when draining begins so
    /// the dispatch loop observes end-of-queue after the backlog.
    publish_tx: Mutex<Option<mpsc::Sender<Message>>>,
    /// Receive half, handed to the dispatch loop when it is spawned.
    publish_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    subscribers: Mutex<HashMap<ConsumerId, SubscriberSlot>>,
    state: AtomicU8,
    publish_timeout: Duration,
    delivery_timeout: Duration,
    events: EventSender,
}

impl Topic {
    pub(crate) fn new(
        name: &str,
        capacity: usize,
        publish_timeout: Duration,
        delivery_timeout: Duration,
        events: EventSender,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name: Arc::from(name),
            capacity,
            publish_tx: Mutex::new(Some(tx)),
            publish_rx: Mutex::new(Some(rx)),
            subscribers: Mutex::new(HashMap::new()),
            state: AtomicU8::new(TopicState::Created as u8),
            publish_timeout,
            delivery_timeout,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounded queue size this topic was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> TopicState {
        TopicState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// How many messages have been skipped for the given subscriber due to
    /// delivery timeouts. `None` if it is not subscribed.
    pub fn dropped_for(&self, consumer_id: &str) -> Option<u64> {
        self.subscribers
            .lock()
            .unwrap()
            .get(consumer_id)
            .map(|slot| slot.dropped)
    }

    /// Enqueues a new message. Waits at most the configured publish timeout
    /// when the queue is full, then fails with `QueueFull`; fails with
    /// `TopicClosed` once the topic has begun draining. Success means the
    /// message is queued, not that it has been delivered.
    pub async fn publish(
        &self,
        payload: impl Into<String>,
        producer_id: impl Into<String>,
    ) -> Result<PublishAck, BrokerError> {
        let tx = match &*self.publish_tx.lock().unwrap() {
            Some(tx) => tx.clone(),
            None => return Err(BrokerError::TopicClosed(self.name.to_string())),
        };

        let msg = Message::new(self.name.clone(), payload, producer_id);
        let ack = PublishAck {
            message_id: msg.id,
            topic: self.name.clone(),
        };
        match tx.send_timeout(msg, self.publish_timeout).await {
            Ok(()) => Ok(ack),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(BrokerError::QueueFull(self.name.to_string()))
            }
            Err(SendTimeoutError::Closed(_)) => {
                Err(BrokerError::TopicClosed(self.name.to_string()))
            }
        }
    }

    /// Adds a subscriber. Effective for every message dequeued after this
    /// call returns. Subscribing the same consumer again replaces its slot
    /// and returns a fresh subscription id.
    pub fn subscribe(
        &self,
        consumer_id: ConsumerId,
        inbox: InboxSender,
    ) -> Result<SubscriptionId, BrokerError> {
        if self.state() >= TopicState::Draining {
            return Err(BrokerError::TopicClosed(self.name.to_string()));
        }
        let subscription_id = Uuid::new_v4();
        self.subscribers.lock().unwrap().insert(
            consumer_id.clone(),
            SubscriberSlot {
                subscription_id,
                inbox,
                dropped: 0,
            },
        );
        debug!(topic = %self.name, consumer = %consumer_id, "subscribed");
        Ok(subscription_id)
    }

    /// Removes a subscriber. Effective for every message dequeued after
    /// this call returns; messages already copied into the consumer's
    /// inbox stay there.
    pub fn unsubscribe(&self, consumer_id: &str) -> Result<(), BrokerError> {
        match self.subscribers.lock().unwrap().remove(consumer_id) {
            Some(slot) => {
                debug!(
                    topic = %self.name,
                    consumer = %consumer_id,
                    subscription = %slot.subscription_id,
                    "unsubscribed"
                );
                Ok(())
            }
            None => Err(BrokerError::NotSubscribed {
                topic: self.name.to_string(),
                consumer_id: consumer_id.to_string(),
            }),
        }
    }

    /// Spawns this topic's dispatch loop. Called once by the broker; a
    /// second call finds the receiver gone and does nothing.
    pub(crate) fn spawn_dispatch(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let rx = self.publish_rx.lock().unwrap().take()?;
        self.state
            .fetch_max(TopicState::Active as u8, Ordering::SeqCst);
        info!(topic = %self.name, capacity = self.capacity, "dispatch loop started");
        let topic = Arc::clone(self);
        Some(tokio::spawn(async move {
            topic.dispatch_loop(rx).await;
        }))
    }

    /// Rejects further publishes and lets the dispatch loop finish the
    /// queued backlog. Dropping the publish sender is what wakes a blocked
    /// `recv` once the queue empties, so no waiter has to time out.
    pub(crate) fn begin_drain(&self) {
        self.publish_tx.lock().unwrap().take();
        let prev = self
            .state
            .fetch_max(TopicState::Draining as u8, Ordering::SeqCst);
        if TopicState::from_u8(prev) < TopicState::Draining {
            info!(topic = %self.name, "draining");
        }
    }

    /// Drains the publish queue one message at a time, fanning each out to
    /// the subscriber set snapshotted at dequeue time. Ends when the queue
    /// is empty and the publish side has been closed.
    async fn dispatch_loop(self: Arc<Self>, mut rx: mpsc::Receiver<Message>) {
        while let Some(msg) = rx.recv().await {
            self.fan_out(msg).await;
        }
        self.state.store(TopicState::Closed as u8, Ordering::SeqCst);
        info!(topic = %self.name, "topic closed");
    }

    /// Delivers one message to every subscriber in the snapshot. Each
    /// attempt is independent: a full inbox costs at most the delivery
    /// timeout and the message is skipped for that subscriber only, a
    /// closed inbox drops the subscription.
    async fn fan_out(&self, msg: Message) {
        let snapshot: Vec<(ConsumerId, InboxSender)> = {
            let subs = self.subscribers.lock().unwrap();
            subs.iter()
                .map(|(id, slot)| (id.clone(), slot.inbox.clone()))
                .collect()
        };

        for (consumer_id, inbox) in snapshot {
            match inbox.deliver(msg.clone(), self.delivery_timeout).await {
                Ok(()) => {}
                Err(DeliveryError::Timeout(m)) => {
                    warn!(
                        topic = %self.name,
                        consumer = %consumer_id,
                        message_id = %m.id,
                        "inbox full, delivery timed out; message skipped for this subscriber"
                    );
                    if let Some(slot) = self.subscribers.lock().unwrap().get_mut(&consumer_id) {
                        slot.dropped += 1;
                    }
                    self.events.emit(BrokerEvent::DeliveryTimeout {
                        topic: self.name.clone(),
                        consumer_id,
                        message_id: m.id,
                    });
                }
                Err(DeliveryError::Closed(_)) => {
                    self.subscribers.lock().unwrap().remove(&consumer_id);
                    debug!(
                        topic = %self.name,
                        consumer = %consumer_id,
                        "inbox closed, subscription removed"
                    );
                    self.events.emit(BrokerEvent::SubscriberDropped {
                        topic: self.name.clone(),
                        consumer_id,
                    });
                }
            }
        }
    }
}
