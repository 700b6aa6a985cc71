use serial_test::serial;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.default_topic_capacity, 128);
    assert_eq!(settings.broker.default_inbox_capacity, 64);
    assert_eq!(settings.broker.publish_timeout_ms, 1000);
    assert_eq!(settings.broker.delivery_timeout_ms, 100);
    assert_eq!(settings.broker.shutdown_timeout_ms, 5000);
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_timeout_helpers() {
    let settings = Settings::default();
    assert_eq!(settings.broker.publish_timeout().as_millis(), 1000);
    assert_eq!(settings.broker.delivery_timeout().as_millis(), 100);
    assert_eq!(settings.broker.shutdown_timeout().as_millis(), 5000);
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("BROKER__PUBLISH_TIMEOUT_MS", Some("250")),
            ("LOG__LEVEL", Some("debug")),
        ],
        || {
            let settings = load_config().expect("load_config failed");
            assert_eq!(settings.broker.publish_timeout_ms, 250);
            assert_eq!(settings.log.level, "debug");
            // Untouched keys keep their defaults
            assert_eq!(settings.broker.default_inbox_capacity, 64);
        },
    );
}

#[test]
#[serial]
fn test_missing_sources_fall_back_to_defaults() {
    temp_env::with_vars_unset(["BROKER__PUBLISH_TIMEOUT_MS", "LOG__LEVEL"], || {
        let settings = load_config().expect("load_config failed");
        assert_eq!(settings.broker.publish_timeout_ms, 1000);
        assert_eq!(settings.log.level, "info");
    });
}
