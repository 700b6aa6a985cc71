mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the broker and logging configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("__").try_parsing(true));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        broker: BrokerSettings {
            default_topic_capacity: partial
                .broker
                .as_ref()
                .and_then(|b| b.default_topic_capacity)
                .unwrap_or(default.broker.default_topic_capacity),
            default_inbox_capacity: partial
                .broker
                .as_ref()
                .and_then(|b| b.default_inbox_capacity)
                .unwrap_or(default.broker.default_inbox_capacity),
            publish_timeout_ms: partial
                .broker
                .as_ref()
                .and_then(|b| b.publish_timeout_ms)
                .unwrap_or(default.broker.publish_timeout_ms),
            delivery_timeout_ms: partial
                .broker
                .as_ref()
                .and_then(|b| b.delivery_timeout_ms)
                .unwrap_or(default.broker.delivery_timeout_ms),
            shutdown_timeout_ms: partial
                .broker
                .as_ref()
                .and_then(|b| b.shutdown_timeout_ms)
                .unwrap_or(default.broker.shutdown_timeout_ms),
        },
        log: LogSettings {
            level: partial
                .log
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    })
}

#[cfg(test)]
mod tests;
