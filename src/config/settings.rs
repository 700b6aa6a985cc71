use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes the broker tuning knobs and the logging setup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Broker tuning: default queue sizes and every bounded-wait timeout.
///
/// All timeouts are in milliseconds. `publish_timeout_ms` bounds how long a
/// publish may wait on a full topic queue, `delivery_timeout_ms` bounds
/// each per-subscriber inbox push during fan-out, and
/// `shutdown_timeout_ms` is the total graceful-drain budget.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub default_topic_capacity: usize,
    pub default_inbox_capacity: usize,
    pub publish_timeout_ms: u64,
    pub delivery_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

impl BrokerSettings {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

/// Partial broker settings.
///
/// Used for broker configuration from external sources with optional values.
#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub default_topic_capacity: Option<usize>,
    pub default_inbox_capacity: Option<usize>,
    pub publish_timeout_ms: Option<u64>,
    pub delivery_timeout_ms: Option<u64>,
    pub shutdown_timeout_ms: Option<u64>,
}

/// Partial logging settings.
#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            default_topic_capacity: 128,
            default_inbox_capacity: 64,
            publish_timeout_ms: 1000,
            delivery_timeout_ms: 100,
            shutdown_timeout_ms: 5000,
        }
    }
}
