//! Configuration module
//!
//! Loads the poller settings from `config.json` (or a `.toml` file) and maps
//! them onto the serial, walker, broker and logging settings.

mod settings;

pub use settings::{BrokerSection, ConfigError, LoggingSection, MonitorConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ledwatch", "ledwatch")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.json"))
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}
