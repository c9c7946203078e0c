//! Daemon configuration (YAML)
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration that discovers cameras on every interface.

use crate::camera::VendorKind;
use crate::policy::PolicyThresholds;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Control surface listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Periodic camera discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between discovery sweeps
    #[serde(default = "default_discovery_interval")]
    pub interval_secs: u64,
    /// Regex matched against local interface names
    #[serde(default = "default_interface_pattern")]
    pub interface_pattern: String,
    /// Vendors searched for on each sweep
    #[serde(default = "default_vendors")]
    pub vendors: Vec<VendorKind>,
    /// How long to collect SSDP answers per search
    #[serde(default = "default_ssdp_timeout")]
    pub ssdp_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_discovery_interval() -> u64 {
    10
}

fn default_interface_pattern() -> String {
    ".*".to_string()
}

fn default_vendors() -> Vec<VendorKind> {
    VendorKind::ALL.to_vec()
}

fn default_ssdp_timeout() -> u64 {
    2000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_discovery_interval(),
            interface_pattern: default_interface_pattern(),
            vendors: default_vendors(),
            ssdp_timeout_ms: default_ssdp_timeout(),
        }
    }
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn ssdp_timeout(&self) -> Duration {
        Duration::from_millis(self.ssdp_timeout_ms)
    }

    pub fn interface_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.interface_pattern).map_err(|e| {
            ConfigError::ValidationError(format!(
                "invalid interface_pattern '{}': {}",
                self.interface_pattern, e
            ))
        })
    }
}

/// Per-camera supervision timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Poll interval while connected
    #[serde(default = "default_tick")]
    pub tick_ms: u64,
    /// Wait before reconnecting after any failure
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
    /// Upper bound for any single camera call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_tick() -> u64 {
    1000
}

fn default_backoff() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    5000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick(),
            backoff_ms: default_backoff(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Decision policy thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_restart_margin")]
    pub restart_margin_secs: u64,
    #[serde(default = "default_rollover_jump")]
    pub rollover_jump_secs: u64,
}

fn default_restart_margin() -> u64 {
    10
}

fn default_rollover_jump() -> u64 {
    60
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            restart_margin_secs: default_restart_margin(),
            rollover_jump_secs: default_rollover_jump(),
        }
    }
}

impl PolicyConfig {
    pub fn thresholds(&self) -> PolicyThresholds {
        PolicyThresholds {
            restart_margin: Duration::from_secs(self.restart_margin_secs),
            rollover_jump: Duration::from_secs(self.rollover_jump_secs),
        }
    }
}

/// A camera supervised without waiting for discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticCamera {
    /// IP for Lumix, device-description URL for Sony
    pub address: String,
    pub vendor: VendorKind,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub cameras: Vec<StaticCamera>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("discovery.interval_secs", self.discovery.interval_secs),
            ("discovery.ssdp_timeout_ms", self.discovery.ssdp_timeout_ms),
            ("supervisor.tick_ms", self.supervisor.tick_ms),
            ("supervisor.backoff_ms", self.supervisor.backoff_ms),
            (
                "supervisor.request_timeout_ms",
                self.supervisor.request_timeout_ms,
            ),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        self.discovery.interface_regex()?;

        if let Some(camera) = self.cameras.iter().find(|c| c.address.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "static {} camera has an empty address",
                camera.vendor
            )));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
