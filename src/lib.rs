//! # Busbar
//!
//! `busbar` is an in-process publish/subscribe message broker. Producers
//! publish payloads to named topics; every subscribed consumer receives
//! every message, fanned out by one dispatch loop per topic through
//! per-consumer bounded inboxes.
//!
//! Guarantees and policies:
//!
//! - Strict FIFO dispatch per topic (no ordering across topics).
//! - A message goes to exactly the consumers subscribed at the moment it
//!   is dequeued for dispatch.
//! - Publish is backpressured: a full topic queue fails the call with
//!   `QueueFull` after a bounded wait, never blocking indefinitely.
//! - One stalled consumer costs the dispatcher at most the per-subscriber
//!   delivery timeout; it cannot delay the other subscribers further.
//! - Shutdown drains queued messages before closing topics, then stops
//!   consumers, and reports whether the drain completed in budget.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: topics, consumers, producers and the [`broker::Broker`]
//!   registry that owns their lifecycles.
//! - `config`: handles loading and managing broker configuration.
//! - `utils`: shared utilities, namely the error taxonomy and logging setup.

pub mod broker;
pub mod config;
pub mod utils;

pub use broker::{Broker, BrokerEvent, Consumer, Message, Producer};
pub use utils::BrokerError;
