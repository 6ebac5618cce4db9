#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for pkgup
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/pkgup/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;

pub use constants as fixed_paths;

use pkgup_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    /// Data root holding the packages, blobs, meta and sources directories
    pub root: Option<PathBuf>,
}

/// Activation monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Capacity of the monitor inbox; a full inbox blocks notifiers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum number of blob fetches in flight
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

/// Source polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Default check window in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Default number of checks allowed per window
    #[serde(default = "default_check_limit")]
    pub check_limit: u64,
    /// Directory-backed sources registered at startup, in priority order
    #[serde(default)]
    pub directories: Vec<DirectorySourceConfig>,
}

/// A directory-backed source declared in the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectorySourceConfig {
    pub id: String,
    pub path: PathBuf,
    pub check_interval: Option<u64>,
    pub check_limit: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            fetch_concurrency: 4,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            check_interval: 60,
            check_limit: 10,
            directories: Vec::new(),
        }
    }
}

// Default value functions for serde
fn default_queue_capacity() -> usize {
    5
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_check_interval() -> u64 {
    60
}

fn default_check_limit() -> u64 {
    10
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("pkgup").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or holds values that fail validation.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: &Option<PathBuf>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // PKGUP_ROOT
        if let Ok(root) = std::env::var("PKGUP_ROOT") {
            if root.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "PKGUP_ROOT".to_string(),
                    value: root,
                }
                .into());
            }
            self.general.root = Some(PathBuf::from(root));
        }

        // PKGUP_QUEUE_CAPACITY
        if let Ok(capacity) = std::env::var("PKGUP_QUEUE_CAPACITY") {
            self.monitor.queue_capacity = parse_env("PKGUP_QUEUE_CAPACITY", capacity)?;
        }

        // PKGUP_FETCH_CONCURRENCY
        if let Ok(concurrency) = std::env::var("PKGUP_FETCH_CONCURRENCY") {
            self.monitor.fetch_concurrency = parse_env("PKGUP_FETCH_CONCURRENCY", concurrency)?;
        }

        // PKGUP_CHECK_INTERVAL
        if let Ok(interval) = std::env::var("PKGUP_CHECK_INTERVAL") {
            self.sources.check_interval = parse_env("PKGUP_CHECK_INTERVAL", interval)?;
        }

        // PKGUP_CHECK_LIMIT
        if let Ok(limit) = std::env::var("PKGUP_CHECK_LIMIT") {
            self.sources.check_limit = parse_env("PKGUP_CHECK_LIMIT", limit)?;
        }

        self.validate()
    }

    /// Reject values the daemon cannot run with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for zero capacities or limits.
    pub fn validate(&self) -> Result<(), Error> {
        let checks = [
            ("monitor.queue_capacity", self.monitor.queue_capacity as u64),
            (
                "monitor.fetch_concurrency",
                self.monitor.fetch_concurrency as u64,
            ),
            ("sources.check_interval", self.sources.check_interval),
            ("sources.check_limit", self.sources.check_limit),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Get the data root (with default)
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.general
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::DEFAULT_ROOT))
    }

    /// Directory holding `<name>/<version>` records of installed packages
    #[must_use]
    pub fn packages_path(&self) -> PathBuf {
        self.root().join(fixed_paths::PACKAGES_DIR)
    }

    /// Directory holding blob content by merkle root
    #[must_use]
    pub fn blobs_path(&self) -> PathBuf {
        self.root().join(fixed_paths::BLOBS_DIR)
    }

    /// Directory holding admitted package metadata
    #[must_use]
    pub fn meta_path(&self) -> PathBuf {
        self.root().join(fixed_paths::META_DIR)
    }

    /// Directory holding persisted source configs
    #[must_use]
    pub fn sources_path(&self) -> PathBuf {
        self.root().join(fixed_paths::SOURCES_DIR)
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: String) -> Result<T, Error> {
    value.parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()
    })
}
