//! Configuration Loader
//!
//! Handles loading configuration and applying environment overrides with proper precedence.

use crate::host::{validate_strategy_name, HostConfig, InvokeConfig, LimitsConfig, MarshalConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// File name searched for by [`ConfigLoader::load_from_directory`]
pub const CONFIG_FILE_NAME: &str = "rulehost.toml";

/// Configuration loader
///
/// Loads configuration and merges it with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Host config (./rulehost.toml) - overrides defaults
/// 3. Environment variables (RULEHOST_*) - overrides host config
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip RULEHOST_* environment overrides
    ignore_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host configuration with overrides applied
    pub host: HostConfig,

    /// Directory where rulehost.toml was found
    pub root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Create a loader that ignores environment variables
    pub fn without_env() -> Self {
        Self { ignore_env: true }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find rulehost.toml. A missing file is not
    /// an error: the defaults are used and `root` is `None`.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (root, host) = self.find_host_config(start_dir)?;
        let host = self.apply_env_overrides(host)?;

        Ok(Config { host, root })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let host = HostConfig::load_from_file(config_path)?;
        let host = self.apply_env_overrides(host)?;

        Ok(Config {
            host,
            root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find host configuration by walking up directory tree
    fn find_host_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, HostConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let host = HostConfig::load_from_file(&config_path)?;
                return Ok((Some(current), host));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, HostConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides to host config
    ///
    /// Recognized variables: RULEHOST_STRATEGY, RULEHOST_MAX_OPERATIONS,
    /// RULEHOST_TIMEOUT_MS, RULEHOST_MAX_DEPTH
    fn apply_env_overrides(&self, mut config: HostConfig) -> ConfigResult<HostConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(strategy) = env::var("RULEHOST_STRATEGY") {
            validate_strategy_name("RULEHOST_STRATEGY", &strategy)?;
            config
                .invoke
                .get_or_insert_with(InvokeConfig::default)
                .default_strategy = Some(strategy);
        }

        if let Some(max_operations) = parse_env_number::<u64>("RULEHOST_MAX_OPERATIONS")? {
            config
                .limits
                .get_or_insert_with(LimitsConfig::default)
                .max_operations = Some(max_operations);
        }

        if let Some(timeout_ms) = parse_env_number::<u64>("RULEHOST_TIMEOUT_MS")? {
            config.limits.get_or_insert_with(LimitsConfig::default).timeout_ms = Some(timeout_ms);
        }

        if let Some(max_depth) = parse_env_number::<usize>("RULEHOST_MAX_DEPTH")? {
            config.marshal.get_or_insert_with(MarshalConfig::default).max_depth = Some(max_depth);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str) -> ConfigResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("expected a non-negative integer, got '{}'", raw),
            }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Get the directory the configuration was loaded from
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Check if a rulehost.toml was found
    pub fn is_file_backed(&self) -> bool {
        self.root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_load_host_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[limits]
max_operations = 10
"#,
        );

        let config = ConfigLoader::without_env()
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.host.max_operations(), 10);
        assert!(config.is_file_backed());
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[invoke]
default_strategy = "direct-call"
"#,
        );

        let sub_dir = temp_dir.path().join("rules");
        fs::create_dir(&sub_dir).unwrap();

        let config = ConfigLoader::without_env()
            .load_from_directory(&sub_dir)
            .unwrap();

        assert_eq!(config.host.default_strategy(), "direct-call");
        assert_eq!(config.root(), Some(temp_dir.path()));
    }

    #[test]
    fn test_no_host_config() {
        let temp_dir = TempDir::new().unwrap();

        let config = ConfigLoader::without_env()
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert!(!config.is_file_backed());
        assert_eq!(config.host, HostConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_override_strategy() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[invoke]
default_strategy = "inject-and-run"
"#,
        );

        env::set_var("RULEHOST_STRATEGY", "direct-call");
        let result = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("RULEHOST_STRATEGY");

        assert_eq!(result.unwrap().host.default_strategy(), "direct-call");
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_number() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("RULEHOST_MAX_OPERATIONS", "lots");
        let result = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("RULEHOST_MAX_OPERATIONS");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
