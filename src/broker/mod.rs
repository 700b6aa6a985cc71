pub mod consumer;
pub mod engine;
pub mod event;
pub mod inbox;
pub mod message;
pub mod producer;
pub mod topic;

pub use consumer::{Consumer, ConsumerId, ConsumerState, Handler};
pub use engine::Broker;
pub use event::BrokerEvent;
pub use message::Message;
pub use producer::Producer;
pub use topic::{PublishAck, SubscriptionId, Topic, TopicState};
