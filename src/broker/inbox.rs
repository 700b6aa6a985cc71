use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::broker::message::Message;

/// A bounded per-consumer buffer decoupling dispatch speed from handler speed.
///
/// Each consumer owns exactly one inbox. The topic dispatch loop holds a
/// cloned [`InboxSender`] per subscription and pushes into it with a short
/// timeout, so one consumer that stops draining its inbox can never stall
/// delivery to the other subscribers. The receiver half is taken by the
/// consumer's processing loop when it starts.
#[derive(Debug)]
pub struct Inbox {
    sender: InboxSender,
    receiver: mpsc::Receiver<Message>,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            sender: InboxSender(tx),
            receiver: rx,
        }
    }

    /// A handle the dispatch side uses to push messages into this inbox.
    pub fn sender(&self) -> InboxSender {
        self.sender.clone()
    }

    /// Hands the receiving half to the consumer's processing loop.
    pub(crate) fn into_receiver(self) -> mpsc::Receiver<Message> {
        self.receiver
    }
}

/// Delivery half of an [`Inbox`], held by topic subscriber slots.
#[derive(Debug, Clone)]
pub struct InboxSender(mpsc::Sender<Message>);

/// Why a single delivery attempt failed. Carries the undelivered message
/// back so the dispatcher can report its id.
#[derive(Debug)]
pub enum DeliveryError {
    /// The inbox stayed full for the whole delivery timeout.
    Timeout(Message),
    /// The inbox receiver is gone; the consumer has stopped.
    Closed(Message),
}

impl InboxSender {
    /// Pushes one message, waiting at most `timeout` for a free slot.
    pub async fn deliver(&self, msg: Message, timeout: Duration) -> Result<(), DeliveryError> {
        self.0
            .send_timeout(msg, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(m) => DeliveryError::Timeout(m),
                SendTimeoutError::Closed(m) => DeliveryError::Closed(m),
            })
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}
