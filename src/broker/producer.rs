use std::sync::Arc;

use crate::broker::engine::Broker;
use crate::broker::topic::PublishAck;
use crate::utils::error::BrokerError;

/// A stateless publishing client bound to one broker.
///
/// Thin by design: it stamps its id onto each message and delegates to
/// [`Broker::publish`]. It never retries: backpressure (`QueueFull`) and
/// lifecycle errors come back to the caller, who owns the retry policy.
#[derive(Clone)]
pub struct Producer {
    id: String,
    broker: Arc<Broker>,
}

impl Producer {
    pub fn new(id: impl Into<String>, broker: Arc<Broker>) -> Self {
        Self {
            id: id.into(),
            broker,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn publish(
        &self,
        topic_name: &str,
        payload: impl Into<String>,
    ) -> Result<PublishAck, BrokerError> {
        self.broker
            .publish(topic_name, payload, self.id.clone())
            .await
    }
}
