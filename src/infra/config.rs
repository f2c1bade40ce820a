//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the hosted database-and-auth service
    pub url: String,
    /// Anonymous API key sent with every request
    pub api_key: String,
    /// Live feed poll interval (REST backend)
    #[serde(default = "default_feed_poll_interval_ms")]
    pub feed_poll_interval_ms: u64,
    /// HTTP request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_feed_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Grace period before a free-tier spot becomes visible to others
    #[serde(default = "default_release_delay_ms")]
    pub release_delay_ms: u64,
    /// Default map filter radius
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
    /// One-shot geolocation timeout
    #[serde(default = "default_geolocation_timeout_ms")]
    pub geolocation_timeout_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            release_delay_ms: default_release_delay_ms(),
            default_radius_km: default_radius_km(),
            geolocation_timeout_ms: default_geolocation_timeout_ms(),
        }
    }
}

fn default_release_delay_ms() -> u64 {
    60_000
}

fn default_radius_km() -> f64 {
    1.0
}

fn default_geolocation_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Fixed device position reported by the static geolocator
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { latitude: default_latitude(), longitude: default_longitude() }
    }
}

fn default_latitude() -> f64 {
    51.505
}

fn default_longitude() -> f64 {
    -0.09
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    backend_url: String,
    backend_api_key: String,
    feed_poll_interval_ms: u64,
    request_timeout_ms: u64,
    release_delay_ms: u64,
    default_radius_km: f64,
    geolocation_timeout_ms: u64,
    device_latitude: f64,
    device_longitude: f64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            backend_api_key: String::new(),
            feed_poll_interval_ms: 2000,
            request_timeout_ms: 5000,
            release_delay_ms: 60_000,
            default_radius_km: 1.0,
            geolocation_timeout_ms: 10_000,
            device_latitude: 51.505,
            device_longitude: -0.09,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        // Default to dev.toml
        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            backend_url: toml_config.backend.url,
            backend_api_key: toml_config.backend.api_key,
            feed_poll_interval_ms: toml_config.backend.feed_poll_interval_ms,
            request_timeout_ms: toml_config.backend.request_timeout_ms,
            release_delay_ms: toml_config.policy.release_delay_ms,
            default_radius_km: toml_config.policy.default_radius_km,
            geolocation_timeout_ms: toml_config.policy.geolocation_timeout_ms,
            device_latitude: toml_config.device.latitude,
            device_longitude: toml_config.device.longitude,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load configuration - resolves the path, then tries the TOML file
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    // Getters for all config fields
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn backend_api_key(&self) -> &str {
        &self.backend_api_key
    }

    pub fn feed_poll_interval_ms(&self) -> u64 {
        self.feed_poll_interval_ms
    }

    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    pub fn release_delay_ms(&self) -> u64 {
        self.release_delay_ms
    }

    pub fn default_radius_km(&self) -> f64 {
        self.default_radius_km
    }

    pub fn geolocation_timeout_ms(&self) -> u64 {
        self.geolocation_timeout_ms
    }

    pub fn device_latitude(&self) -> f64 {
        self.device_latitude
    }

    pub fn device_longitude(&self) -> f64 {
        self.device_longitude
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the release delay
    #[cfg(test)]
    pub fn with_release_delay_ms(mut self, ms: u64) -> Self {
        self.release_delay_ms = ms;
        self
    }

    /// Builder method for tests to set the default radius
    #[cfg(test)]
    pub fn with_default_radius_km(mut self, km: f64) -> Self {
        self.default_radius_km = km;
        self
    }
}
