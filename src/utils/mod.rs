//! Shared utilities: the broker error taxonomy and tracing setup.

pub mod error;
pub mod logging;

pub use error::BrokerError;
