//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sensortag_core::{ConnectionConfig, DEFAULT_NAME_FILTER};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cli::{ConfigKey, DeviceArgs, OutputFormat};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default device name filter
    #[serde(default)]
    pub device: Option<String>,

    /// Default output format
    #[serde(default)]
    pub format: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Discovery window in seconds
    #[serde(default)]
    pub scan_timeout: Option<u64>,

    /// Service resolution timeout in seconds; 0 waits forever
    #[serde(default)]
    pub resolution_timeout: Option<u64>,

    /// Interval between resolution polls in milliseconds
    #[serde(default)]
    pub poll_interval: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensortag")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`. Unreadable or malformed files are logged and
    /// replaced by the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Current value of `key`, rendered for display.
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Device => self.device.clone(),
            ConfigKey::Format => self.format.clone(),
            ConfigKey::ScanTimeout => self.scan_timeout.map(|v| v.to_string()),
            ConfigKey::ResolutionTimeout => self.resolution_timeout.map(|v| v.to_string()),
            ConfigKey::PollInterval => self.poll_interval.map(|v| v.to_string()),
            ConfigKey::NoColor => Some(self.no_color.to_string()),
        }
    }

    /// Parse and store `value` under `key`.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        match key {
            ConfigKey::Device => self.device = Some(value.to_string()),
            ConfigKey::Format => {
                let format = parse_format(value)?;
                self.format = Some(format.as_str().to_string());
            }
            ConfigKey::ScanTimeout => self.scan_timeout = Some(parse_number(value, key)?),
            ConfigKey::ResolutionTimeout => {
                self.resolution_timeout = Some(parse_number(value, key)?)
            }
            ConfigKey::PollInterval => self.poll_interval = Some(parse_number(value, key)?),
            ConfigKey::NoColor => self.no_color = parse_bool(value)?,
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Device => self.device = None,
            ConfigKey::Format => self.format = None,
            ConfigKey::ScanTimeout => self.scan_timeout = None,
            ConfigKey::ResolutionTimeout => self.resolution_timeout = None,
            ConfigKey::PollInterval => self.poll_interval = None,
            ConfigKey::NoColor => self.no_color = false,
        }
    }
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    match value.to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => bail!("Invalid format '{}'. Valid values: text, json", value),
    }
}

fn parse_number(value: &str, key: ConfigKey) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("'{}' is not a valid number for {:?}", value, key))
}

/// Parse boolean argument with flexible input
fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            value
        ),
    }
}

/// Resolve the device filter from arg, env var, or config, falling back to
/// the name every CC2650 advertises.
pub fn resolve_device(device: Option<&str>, config: &Config) -> String {
    device
        .map(str::to_string)
        .or_else(|| config.device.clone())
        .unwrap_or_else(|| DEFAULT_NAME_FILTER.to_string())
}

/// Resolve output format: `--json` wins, then `--format`, then config.
pub fn resolve_format(json: bool, format: Option<OutputFormat>, config: &Config) -> OutputFormat {
    if json {
        return OutputFormat::Json;
    }
    format
        .or_else(|| {
            config.format.as_deref().and_then(|f| match parse_format(f) {
                Ok(format) => Some(format),
                Err(e) => {
                    warn!("Ignoring configured format: {}", e);
                    None
                }
            })
        })
        .unwrap_or_default()
}

/// Build the connection settings, letting command flags override the config
/// file.
pub fn connection_config(
    config: &Config,
    scan_timeout: Option<u64>,
    resolution_timeout: Option<u64>,
) -> Result<ConnectionConfig> {
    let mut conn = ConnectionConfig::default();
    if let Some(secs) = scan_timeout.or(config.scan_timeout) {
        conn = conn.discovery_window(Duration::from_secs(secs));
    }
    match resolution_timeout.or(config.resolution_timeout) {
        Some(0) => conn = conn.unbounded_resolution(),
        Some(secs) => conn = conn.resolution_timeout(Duration::from_secs(secs)),
        None => {}
    }
    if let Some(ms) = config.poll_interval {
        conn = conn.resolve_poll_interval(Duration::from_millis(ms));
    }
    conn.validate().context("Invalid connection settings")?;
    Ok(conn)
}

/// Connection settings for a command that targets one device.
pub fn device_connection_config(args: &DeviceArgs, config: &Config) -> Result<ConnectionConfig> {
    connection_config(config, args.scan_timeout, args.timeout)
}
