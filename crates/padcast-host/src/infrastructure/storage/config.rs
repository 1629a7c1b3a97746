//! TOML-based configuration persistence for the host application.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\PadCast\config.toml`
//! - Linux:    `~/.config/padcast/config.toml`
//! - macOS:    `~/Library/Application Support/PadCast/config.toml`
//!
//! Every field carries a `#[serde(default = ...)]` so the app works on first
//! run (before a config file exists) and when upgrading from an older file
//! that is missing newer fields.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::admission::SecurityConfig;
use crate::application::router::{HostMode, RouterConfig};
use crate::infrastructure::net::HostConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field value does not validate (bad address, unknown mode).
    #[error("invalid config value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub security: SecuritySection,
}

/// Host bind and mode settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// IP address to bind the UDP socket to.  `"0.0.0.0"` binds all
    /// interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// `"single-owner"` or `"multi-slot"`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Admission-control settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecuritySection {
    /// Sustained packets/second allowed per client identifier.
    #[serde(default = "default_client_rate")]
    pub client_rate: f64,
    /// Burst capacity of the per-client bucket.
    #[serde(default = "default_client_burst")]
    pub client_burst: f64,
    /// Sustained packets/second allowed per source IP.
    #[serde(default = "default_ip_rate")]
    pub ip_rate: f64,
    /// Maximum distinct clients tracked per source IP.
    #[serde(default = "default_max_clients_per_ip")]
    pub max_clients_per_ip: usize,
    /// Violations before a client is auto-blocked.
    #[serde(default = "default_auto_block_threshold")]
    pub auto_block_threshold: u32,
    /// Block duration in seconds.
    #[serde(default = "default_block_seconds")]
    pub block_seconds: u64,
    /// Oldest acceptable origin timestamp, in seconds before now.
    #[serde(default = "default_max_timestamp_age_seconds")]
    pub max_timestamp_age_seconds: f64,
    /// Furthest-future acceptable origin timestamp, in seconds after now.
    #[serde(default = "default_max_timestamp_future_seconds")]
    pub max_timestamp_future_seconds: f64,
    /// When set, only whitelisted source IPs are admitted.
    #[serde(default)]
    pub enable_whitelist: bool,
    /// Whitelisted source IPs, consulted when `enable_whitelist` is set.
    #[serde(default)]
    pub whitelist: Vec<String>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7777
}
fn default_mode() -> String {
    "multi-slot".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_client_rate() -> f64 {
    120.0
}
fn default_client_burst() -> f64 {
    20.0
}
fn default_ip_rate() -> f64 {
    200.0
}
fn default_max_clients_per_ip() -> usize {
    3
}
fn default_auto_block_threshold() -> u32 {
    5
}
fn default_block_seconds() -> u64 {
    300
}
fn default_max_timestamp_age_seconds() -> f64 {
    5.0
}
fn default_max_timestamp_future_seconds() -> f64 {
    1.0
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            mode: default_mode(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            client_rate: default_client_rate(),
            client_burst: default_client_burst(),
            ip_rate: default_ip_rate(),
            max_clients_per_ip: default_max_clients_per_ip(),
            auto_block_threshold: default_auto_block_threshold(),
            block_seconds: default_block_seconds(),
            max_timestamp_age_seconds: default_max_timestamp_age_seconds(),
            max_timestamp_future_seconds: default_max_timestamp_future_seconds(),
            enable_whitelist: false,
            whitelist: Vec::new(),
        }
    }
}

// ── Conversion into typed runtime configs ─────────────────────────────────────

impl AppConfig {
    /// Builds the typed host configuration from the `[host]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparsable bind address or an
    /// unknown mode string.
    pub fn host_config(&self) -> Result<HostConfig, ConfigError> {
        let bind_address: IpAddr =
            self.host
                .bind_address
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    field: "host.bind_address",
                    value: self.host.bind_address.clone(),
                })?;

        let mode = match self.host.mode.as_str() {
            "single-owner" => HostMode::SingleOwner,
            "multi-slot" => HostMode::MultiSlot,
            other => {
                return Err(ConfigError::Invalid {
                    field: "host.mode",
                    value: other.to_string(),
                })
            }
        };

        Ok(HostConfig {
            bind_address,
            port: self.host.port,
            router: RouterConfig::for_mode(mode),
            ..HostConfig::default()
        })
    }

    /// Builds the typed security configuration from the `[security]`
    /// section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparsable whitelist entry.
    pub fn security_config(&self) -> Result<SecurityConfig, ConfigError> {
        let mut whitelist = HashSet::new();
        for entry in &self.security.whitelist {
            let ip: IpAddr = entry.parse().map_err(|_| ConfigError::Invalid {
                field: "security.whitelist",
                value: entry.clone(),
            })?;
            whitelist.insert(ip);
        }

        Ok(SecurityConfig {
            client_rate: self.security.client_rate,
            client_burst: self.security.client_burst,
            ip_rate: self.security.ip_rate,
            max_clients_per_ip: self.security.max_clients_per_ip,
            auto_block_threshold: self.security.auto_block_threshold,
            block_duration: Duration::from_secs(self.security.block_seconds),
            max_timestamp_age: Duration::from_secs_f64(self.security.max_timestamp_age_seconds),
            max_timestamp_future: Duration::from_secs_f64(
                self.security.max_timestamp_future_seconds,
            ),
            enable_whitelist: self.security.enable_whitelist,
            whitelist,
            ..SecurityConfig::default()
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from disk, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PadCast"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("padcast"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PadCast")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
