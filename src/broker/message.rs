use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A published message travelling through the broker.
///
/// A message is immutable once constructed: the dispatch loop clones it
/// into every subscriber inbox and nothing mutates it afterwards, so it is
/// safe to share across the topic and consumer tasks. The topic name is an
/// `Arc<str>` because every clone of the message carries it.
///
/// # Fields
///
/// - `id` - Unique id assigned at creation (UUID v4).
/// - `topic` - The name of the topic this message belongs to.
/// - `payload` - The actual message content, usually a JSON-encoded string.
/// - `producer_id` - Id of the producer that published the message.
/// - `timestamp` - UTC time at which the message was created.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: Arc<str>,
    pub payload: String,
    pub producer_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new message, assigning its id and timestamp.
    pub fn new(
        topic: Arc<str>,
        payload: impl Into<String>,
        producer_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            payload: payload.into(),
            producer_id: producer_id.into(),
            timestamp: Utc::now(),
        }
    }
}
