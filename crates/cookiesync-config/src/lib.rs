//! Configuration management for cookiesync
//!
//! This crate provides the typed configuration for the sync tool, loaded from
//! a TOML or YAML file layered with `COOKIESYNC_*` environment variable
//! overrides, plus the first-run bootstrap that writes a commented default
//! config file into the user's config directory.
//!
//! # Examples
//!
//! ```rust
//! use cookiesync_config::{Config, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .add_source_file("cookiesync.toml")
//!     .add_env_prefix("COOKIESYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Merge strategy: {}", config.sync.merge_strategy);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use cookiesync_types::{BackupInterval, MergeStrategy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for cookiesync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Firefox profile selection
    pub profile: ProfileConfig,
    /// WebDAV remote store
    pub webdav: WebdavConfig,
    /// Synchronization behaviour
    pub sync: SyncConfig,
    /// Local backup snapshots
    pub backup: BackupConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Firefox profile selection
///
/// With neither field set the default profile from `profiles.ini` is used.
/// Setting both is a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Select the profile by its name in `profiles.ini`
    #[serde(default)]
    pub name: Option<String>,
    /// Select the profile by its filesystem path
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// WebDAV remote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebdavConfig {
    /// Base URL of the WebDAV server
    pub url: String,
    /// Basic-auth username
    pub username: String,
    /// Basic-auth password
    pub password: String,
    /// Directory under the base URL holding the synchronized state
    pub directory: String,
}

impl Default for WebdavConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            directory: "/cookie-exceptions".to_string(),
        }
    }
}

/// Synchronization behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Abort when an empty side would overwrite a previously non-empty state
    pub panic: bool,
    /// Strategy applied to conflicting records
    pub merge_strategy: MergeStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            panic: true,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

/// Local backup snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Whether interval-gated backups are taken before sync runs
    pub enabled: bool,
    /// Minimum time between two backups
    pub interval: BackupInterval,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: BackupInterval::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
