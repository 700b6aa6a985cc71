use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::broker::consumer::ConsumerId;

/// Observability events for failures that belong to a single consumer.
///
/// Delivery problems are isolated per subscriber and must never propagate
/// back to the producer, so they are reported out-of-band on a broadcast
/// channel instead ([`crate::broker::Broker::events`]). Emission is
/// best-effort: with no listener attached the event is dropped.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A subscriber's inbox stayed full for the whole per-subscriber
    /// delivery timeout; the message was skipped for that subscriber only.
    DeliveryTimeout {
        topic: Arc<str>,
        consumer_id: ConsumerId,
        message_id: Uuid,
    },
    /// A subscriber's inbox was closed (its consumer is gone); the
    /// subscription has been removed from the topic.
    SubscriberDropped {
        topic: Arc<str>,
        consumer_id: ConsumerId,
    },
    /// A consumer was stopped without draining and threw away the
    /// messages still buffered in its inbox.
    MessagesDiscarded { consumer_id: ConsumerId, count: usize },
    /// A consumer's handler returned an error or panicked; the processing
    /// loop keeps going.
    HandlerFailed {
        consumer_id: ConsumerId,
        message_id: Uuid,
    },
}

/// Best-effort sender half of the event hook, shared by every topic
/// dispatch loop and consumer loop of one broker.
#[derive(Debug, Clone)]
pub struct EventSender(broadcast::Sender<BrokerEvent>);

impl EventSender {
    pub(crate) fn new(capacity: usize) -> Self {
        Self(broadcast::channel(capacity).0)
    }

    /// Emits an event, silently dropping it when nobody is listening.
    pub(crate) fn emit(&self, event: BrokerEvent) {
        let _ = self.0.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BrokerEvent> {
        self.0.subscribe()
    }
}
