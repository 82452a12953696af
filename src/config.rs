//! Application configuration loading.
//!
//! Settings live in a TOML file under the platform config directory. A
//! commented default is written on first run; a missing or unreadable file
//! degrades to defaults with a warning instead of preventing startup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use color_eyre::eyre::{eyre, Result};
use tracing::{info, warn};

use crate::monitor::MonitorSettings;
use crate::mqtt::MqttConfig;

/// Top-level configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    /// Minimum seconds between repeated alerts for the same source.
    pub alert_min_interval_secs: u64,
    /// Superset variant when true; monitor-only (no door status handling,
    /// no control publishing) when false.
    pub door_control: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            alert_min_interval_secs: 60,
            door_control: true,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dcwatch").join("config.toml"))
    }

    /// Write a default configuration file if none exists yet.
    pub fn ensure_default_config() -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(eyre!("no config directory available on this platform"));
        };
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(&Self::default())?;
        fs::write(&path, rendered)?;
        info!(path = %path.display(), "wrote default configuration");
        Ok(())
    }

    /// Load the configuration, falling back to defaults on any failure.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("no config directory available, using defaults");
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "invalid config, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read config, using defaults");
                Self::default()
            }
        }
    }

    /// Broker config with the topic set narrowed to the enabled features.
    pub fn effective_mqtt(&self) -> MqttConfig {
        let mut mqtt = self.mqtt.clone();
        if !self.door_control {
            mqtt.topics.retain(|topic| !topic.ends_with("/status"));
        }
        mqtt
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            door_control: self.door_control,
            alert_min_interval: chrono::Duration::seconds(self.alert_min_interval_secs as i64),
        }
    }
}
