//! Configuration builder for flexible configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

/// Configuration builder layering defaults, files and environment overrides
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add a configuration file source, format detected from the extension
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add a configuration file source with explicit format
    pub fn add_source_file_with_format<P: AsRef<Path>>(
        mut self,
        path: P,
        format: FileFormat,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // Defaults form the base layer so partial config files work
        let defaults_value = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix).separator(&self.env_separator),
                    );
                }
            }
        }

        let config = self.inner.build()?;
        let result: Config = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }

    /// Validate the configuration
    fn validate(config: &Config) -> ConfigResult<()> {
        if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if config.profile.name.is_some() && config.profile.path.is_some() {
            return Err(ConfigError::validation(
                "Set either profile.name or profile.path, not both",
            ));
        }

        if !config.webdav.url.is_empty()
            && !config.webdav.url.starts_with("http://")
            && !config.webdav.url.starts_with("https://")
        {
            return Err(ConfigError::invalid_value(
                "webdav.url",
                "must be an http:// or https:// URL",
            ));
        }

        if !config.webdav.directory.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "webdav.directory",
                "must be an absolute path below the WebDAV base URL",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookiesync_types::MergeStrategy;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert!(config.sync.panic);
        assert_eq!(config.sync.merge_strategy, MergeStrategy::UseNewest);
        assert!(config.backup.enabled);
        assert_eq!(config.webdav.directory, "/cookie-exceptions");
    }

    #[test]
    fn test_builder_toml_file() {
        let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
[webdav]
url = "https://dav.example.org/remote.php/webdav"
username = "alice"
password = "secret"

[sync]
panic = false
merge_strategy = "use_local"

[backup]
interval = "12h"
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert!(!config.sync.panic);
        assert_eq!(config.sync.merge_strategy, MergeStrategy::UseLocal);
        assert_eq!(config.webdav.username, "alice");
        assert_eq!(config.backup.interval.to_string(), "12h");
        // Untouched sections keep their defaults
        assert!(config.backup.enabled);
    }

    #[test]
    fn test_builder_yaml_file() {
        let mut temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
sync:
  merge_strategy: do_nothing
logging:
  level: debug
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.sync.merge_strategy, MergeStrategy::DoNothing);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_builder_validation() {
        let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
[logging]
level = "loud"
"#
        )
        .unwrap();

        let result = ConfigBuilder::new()
            .add_source_file(temp_file.path())
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Log level must be one of"));
    }

    #[test]
    fn test_builder_rejects_relative_remote_directory() {
        let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
[webdav]
directory = "cookie-exceptions"
"#
        )
        .unwrap();

        let result = ConfigBuilder::new()
            .add_source_file(temp_file.path())
            .build();

        assert!(result.is_err());
    }
}
