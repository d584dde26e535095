//! Monitor settings

use crate::core::arbitration::{BrokerConfig, DEFAULT_ADDRESS};
use crate::core::logger::LogOptions;
use crate::core::topology::Expectations;
use crate::core::transport::SerialSettings;
use crate::core::walker::PollSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML
    #[error("Invalid TOML config: {0}")]
    Toml(String),

    /// Well-formed but unusable value
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Toml(e.to_string())
    }
}

/// Poller configuration, `config.json` compatible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Free-form version string
    pub version: String,
    /// Serial baud rate
    pub baudrate: u32,
    /// Seconds between a write and the read
    #[serde(rename = "sleepTime")]
    pub sleep_time: f64,
    /// Seconds between the module flash trigger and the read-back
    #[serde(rename = "flashWaitTime")]
    pub flash_wait_time: f64,
    /// Modules behind each receiver
    pub modules: usize,
    /// Data groups per module
    #[serde(rename = "dataGroups")]
    pub data_groups: usize,
    /// Expected receiver count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_cards: Option<usize>,
    /// Expected sender count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_cards: Option<usize>,
    /// Expected device count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<usize>,
    /// Broker section
    pub broker: BrokerSection,
    /// Logging section
    pub logging: LoggingSection,
}

/// Broker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    /// Listen / connect address
    pub address: String,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter
    pub level: String,
    /// Log file directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            baudrate: 115_200,
            sleep_time: 0.3,
            flash_wait_time: 1.0,
            modules: 4,
            data_groups: 4,
            receiver_cards: None,
            sender_cards: None,
            devices: None,
            broker: BrokerSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        ))
    };
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(value).map_err(|_| invalid())
}

impl MonitorConfig {
    /// Parse JSON
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, TOML when it ends in `.toml`, JSON otherwise
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = if is_toml(path) {
            Self::from_toml(&text)?
        } else {
            Self::from_json(&text)?
        };
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write `path` in the format its extension names
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        seconds("sleepTime", self.sleep_time)?;
        seconds("flashWaitTime", self.flash_wait_time)?;
        if self.baudrate == 0 {
            return Err(ConfigError::Invalid("baudrate must be positive".to_string()));
        }
        Ok(())
    }

    /// Serial line settings
    pub fn serial_settings(&self) -> Result<SerialSettings, ConfigError> {
        let settle_time = seconds("sleepTime", self.sleep_time)?;
        Ok(SerialSettings::new(self.baudrate).settle_time(settle_time))
    }

    /// Walker settings
    pub fn poll_settings(&self) -> Result<PollSettings, ConfigError> {
        Ok(PollSettings {
            flash_wait: seconds("flashWaitTime", self.flash_wait_time)?,
            modules: self.modules,
            data_groups: self.data_groups,
        })
    }

    /// Expected counts for the topology check
    pub fn expectations(&self) -> Expectations {
        Expectations {
            devices: self.devices,
            receiver_cards: self.receiver_cards,
        }
    }

    /// Broker settings
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            address: self.broker.address.clone(),
        }
    }

    /// Logging options
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.logging.level.clone(),
            directory: self.logging.directory.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = MonitorConfig::default();
        assert_eq!(c.baudrate, 115_200);
        assert_eq!(c.serial_settings().unwrap().settle_time, Duration::from_millis(300));
        assert_eq!(c.poll_settings().unwrap().flash_wait, Duration::from_secs(1));
        assert_eq!(c.broker.address, "127.0.0.1:8888");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let c = MonitorConfig::from_json(r#"{"sleepTime": 0.5, "dataGroups": 8, "devices": 2}"#)
            .unwrap();
        assert_eq!(c.sleep_time, 0.5);
        assert_eq!(c.data_groups, 8);
        assert_eq!(c.modules, 4);
        assert_eq!(c.expectations().devices, Some(2));
        assert_eq!(c.expectations().receiver_cards, None);
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = MonitorConfig::from_json(r#"{"flashWaitTime": -1.0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_oversized_delay_rejected() {
        let err = MonitorConfig::from_json(r#"{"sleepTime": 1e30}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("sleepTime")));

        let mut config = MonitorConfig::default();
        config.flash_wait_time = f64::MAX;
        assert!(matches!(config.poll_settings(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml() {
        let c = MonitorConfig::from_toml(
            "baudrate = 57600\nsleepTime = 0.1\n\n[broker]\naddress = \"127.0.0.1:9000\"\n",
        )
        .unwrap();
        assert_eq!(c.baudrate, 57_600);
        assert_eq!(c.broker_config().address, "127.0.0.1:9000");
    }
}
