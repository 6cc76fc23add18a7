//! Configuration loading and first-run bootstrap
//!
//! The loader resolves the per-user config directory, writes a commented
//! default config file on first run, and exposes the state paths (anchor
//! snapshot, backups) that the synchronization core persists into.

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Contents written to a fresh config file on first run
const DEFAULT_CONFIG: &str = r#"# cookiesync configuration

[profile]
# Select a Firefox profile by name or by path. With neither set, the
# default profile from profiles.ini is used.
# name = "default-release"
# path = "/home/user/.mozilla/firefox/abcd1234.default-release"

[webdav]
url = ""
username = ""
password = ""
directory = "/cookie-exceptions"

[sync]
# Abort when an empty local or remote state would overwrite a previously
# non-empty one (lost profile, failed fetch).
panic = true
# One of: use_local, use_newest, use_remote, do_nothing
merge_strategy = "use_newest"

[backup]
enabled = true
# Minimum time between local backups: <count><unit>, unit s/m/h/d
interval = "1d"

[logging]
level = "info"
"#;

/// Loader for the per-user configuration and state directories
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at the platform config directory
    pub fn new() -> ConfigResult<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| ConfigError::other("Could not determine the user config directory"))?;
        Ok(Self {
            config_dir: base.join("cookiesync"),
        })
    }

    /// Create a loader rooted at an explicit directory (used by tests)
    pub fn with_config_dir<P: Into<PathBuf>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// The directory holding config file, anchor snapshot and backups
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the config file
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path of the persisted base snapshot (the reconciliation anchor)
    pub fn state_path(&self) -> PathBuf {
        self.config_dir.join("state.json")
    }

    /// Directory holding timestamped backup snapshots
    pub fn backup_dir(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    /// Write a commented default config file if none exists yet
    pub fn ensure_default_config(&self) -> ConfigResult<PathBuf> {
        let path = self.config_path();
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)
                .map_err(|e| ConfigError::io(&self.config_dir, e))?;
        }
        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG).map_err(|e| ConfigError::io(&path, e))?;
            info!("Wrote default configuration to {}", path.display());
        }
        Ok(path)
    }

    /// Load the configuration, bootstrapping the default file first
    ///
    /// An explicit `path` skips the bootstrap and must exist.
    pub fn load(&self, path: Option<&Path>) -> ConfigResult<Config> {
        let config_path = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::io(
                        explicit,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
                    ));
                }
                explicit.to_path_buf()
            }
            None => self.ensure_default_config()?,
        };

        ConfigBuilder::new()
            .add_source_file(&config_path)
            .add_env_prefix("COOKIESYNC")
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_writes_default_config_once() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_config_dir(temp.path().join("cookiesync"));

        let path = loader.ensure_default_config().unwrap();
        assert!(path.exists());

        let original = fs::read_to_string(&path).unwrap();
        assert!(original.contains("merge_strategy"));

        // A second bootstrap must not clobber user edits
        fs::write(&path, "[sync]\npanic = false\n").unwrap();
        loader.ensure_default_config().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[sync]\npanic = false\n");
    }

    #[test]
    fn test_default_config_parses() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_config_dir(temp.path().join("cookiesync"));

        let config = loader.load(None).unwrap();
        assert!(config.sync.panic);
        assert!(config.backup.enabled);
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_config_dir(temp.path());

        let result = loader.load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_state_paths_live_under_config_dir() {
        let loader = ConfigLoader::with_config_dir("/tmp/cookiesync-test");
        assert_eq!(
            loader.state_path(),
            PathBuf::from("/tmp/cookiesync-test/state.json")
        );
        assert_eq!(
            loader.backup_dir(),
            PathBuf::from("/tmp/cookiesync-test/backups")
        );
    }
}
