#![cfg(feature = "config")]
//! Host configuration loading.
//!
//! Line settings can be read from a JSON file: a default baud rate and
//! timeout, plus optional per-address overrides. Every field has a default,
//! so a partial file or no file at all both work.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::SerialSettings;

/// Host line configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Baud rate used for every address without an override.
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// Transaction timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-address overrides.
    #[serde(default)]
    pub addresses: Vec<AddressConfig>,
}

/// Override of the line settings for a single address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressConfig {
    pub address: u8,
    #[serde(default)]
    pub baudrate: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_baudrate() -> u32 {
    115_200
}

fn default_timeout_ms() -> u64 {
    250
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            baudrate: default_baudrate(),
            timeout_ms: default_timeout_ms(),
            addresses: Vec::new(),
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// File not found
    FileNotFound(String),
    /// JSON parsing error
    ParseError(String),
    /// IO error
    IoError(String),
    /// A value is out of range
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl HostConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, or use defaults if it can not be read.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path.as_ref()) {
            Ok(config) => config,
            Err(_) => Self::default(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.addresses {
            if entry.address > 31 {
                return Err(ConfigError::InvalidValue(format!(
                    "address {} is out of range (0 to 31)",
                    entry.address
                )));
            }
        }
        Ok(())
    }

    /// Settings used for addresses without an override.
    pub fn default_settings(&self) -> SerialSettings {
        SerialSettings {
            baudrate: self.baudrate,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    /// Resolve the settings for one address.
    pub fn settings_for(&self, address: u8) -> SerialSettings {
        let mut settings = self.default_settings();
        for entry in &self.addresses {
            if entry.address == address {
                if let Some(baudrate) = entry.baudrate {
                    settings.baudrate = baudrate;
                }
                if let Some(timeout_ms) = entry.timeout_ms {
                    settings.timeout = Duration::from_millis(timeout_ms);
                }
            }
        }
        settings
    }

    /// The full per-address settings table.
    pub fn settings_table(&self) -> [SerialSettings; 32] {
        let mut table = [self.default_settings(); 32];
        for (address, slot) in table.iter_mut().enumerate() {
            *slot = self.settings_for(address as u8);
        }
        table
    }
}
