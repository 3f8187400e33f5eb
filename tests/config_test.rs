use std::time::Duration;

use daily_reminder_bot::config::Config;
use daily_reminder_bot::error::AppError;
use serial_test::serial;

const KEYS: [&str; 8] = [
    "TELEGRAM_TOKEN",
    "QWEATHER_API_KEY",
    "TIMEZONE",
    "WARNING_POLL_INTERVAL",
    "OPENAI_ENABLED",
    "OPENAI_API_KEY",
    "FEATURE_WARNING_MONITOR",
    "FEATURE_CALENDAR",
];

fn reset_env() {
    for key in KEYS {
        // SAFETY: env tests are serialized.
        unsafe { std::env::remove_var(key) };
    }
}

fn set(key: &str, value: &str) {
    // SAFETY: env tests are serialized.
    unsafe { std::env::set_var(key, value) };
}

#[test]
#[serial]
fn test_config_from_environment() {
    reset_env();
    set("TELEGRAM_TOKEN", "123:abc");
    set("QWEATHER_API_KEY", "qw-key");
    set("TIMEZONE", "Europe/Berlin");
    set("WARNING_POLL_INTERVAL", "300");
    set("OPENAI_ENABLED", "true");
    set("OPENAI_API_KEY", "sk-test");
    set("FEATURE_CALENDAR", "false");

    let config = Config::new().unwrap();
    assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
    assert_eq!(config.warning_poll_interval, Duration::from_secs(300));
    assert_eq!(config.telegram.token, "123:abc");
    assert_eq!(config.qweather.api_key, "qw-key");
    assert!(config.openai.enabled);
    assert_eq!(config.openai.api_key, "sk-test");
    assert!(config.features.warning_monitor);
    assert!(!config.features.calendar);

    reset_env();
}

#[test]
#[serial]
fn test_config_missing_token() {
    reset_env();
    set("QWEATHER_API_KEY", "qw-key");

    let err = Config::new().unwrap_err();
    assert!(matches!(err, AppError::MissingConfig { key } if key == "TELEGRAM_TOKEN"));

    reset_env();
}

#[test]
#[serial]
fn test_config_rejects_bad_boolean() {
    reset_env();
    set("TELEGRAM_TOKEN", "123:abc");
    set("QWEATHER_API_KEY", "qw-key");
    set("FEATURE_WARNING_MONITOR", "sometimes");

    let err = Config::new().unwrap_err();
    assert!(matches!(err, AppError::ConfigurationError { .. }));

    reset_env();
}
