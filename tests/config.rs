use ledwatch_core::config::{ConfigError, MonitorConfig};
use std::time::Duration;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = MonitorConfig::load(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, MonitorConfig::default());
}

#[test]
fn loads_legacy_json_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "version": "1.3",
            "baudrate": 115200,
            "sleepTime": 0.2,
            "flashWaitTime": 2,
            "modules": 6,
            "dataGroups": 2,
            "receiver_cards": 12,
            "sender_cards": 1
        }"#,
    )
    .unwrap();

    let config = MonitorConfig::load(&path).unwrap();
    assert_eq!(config.version, "1.3");
    assert_eq!(config.serial_settings().unwrap().settle_time, Duration::from_millis(200));
    let poll = config.poll_settings().unwrap();
    assert_eq!(poll.flash_wait, Duration::from_secs(2));
    assert_eq!((poll.modules, poll.data_groups), (6, 2));
    assert_eq!(config.expectations().receiver_cards, Some(12));
}

#[test]
fn toml_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledwatch.toml");
    std::fs::write(&path, "modules = 8\n\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config = MonitorConfig::load(&path).unwrap();
    assert_eq!(config.modules, 8);
    assert_eq!(config.log_options().level, "debug");
}

#[test]
fn save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = MonitorConfig::default();
    config.devices = Some(3);
    config.broker.address = "127.0.0.1:9999".to_string();
    config.save(&path).unwrap();

    assert_eq!(MonitorConfig::load(&path).unwrap(), config);
}

#[test]
fn rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    std::fs::write(&path, r#"{"sleepTime": -0.5}"#).unwrap();
    assert!(matches!(MonitorConfig::load(&path), Err(ConfigError::Invalid(_))));

    std::fs::write(&path, r#"{"sleepTime": "#).unwrap();
    assert!(matches!(MonitorConfig::load(&path), Err(ConfigError::Json(_))));

    let toml_path = dir.path().join("config.toml");
    std::fs::write(&toml_path, "modules = [").unwrap();
    assert!(matches!(MonitorConfig::load(&toml_path), Err(ConfigError::Toml(_))));
}
