use thiserror::Error;

/// Errors returned synchronously from broker operations.
///
/// These are the caller-fault failures: a producer publishing to a missing
/// or closed topic, backpressure on a full publish queue, or any call made
/// after the broker has shut down. Failures that belong to a single
/// consumer (a delivery timeout into its inbox, messages discarded on a
/// non-draining stop) are never surfaced here; they are reported through
/// [`crate::broker::BrokerEvent`] so one slow subscriber cannot leak its
/// problems back to producers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The named topic has not been created on this broker.
    #[error("topic `{0}` not found")]
    TopicNotFound(String),

    /// The topic's publish queue stayed full for the whole publish timeout.
    #[error("publish queue for topic `{0}` is full")]
    QueueFull(String),

    /// The topic has begun its shutdown drain and no longer accepts publishes.
    #[error("topic `{0}` is closed")]
    TopicClosed(String),

    /// An unsubscribe was requested for a consumer that is not subscribed.
    #[error("consumer `{consumer_id}` is not subscribed to topic `{topic}`")]
    NotSubscribed { topic: String, consumer_id: String },

    /// The broker has been shut down; every operation now fails with this.
    #[error("broker has been shut down")]
    BrokerClosed,
}
