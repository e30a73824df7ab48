//! Rule host configuration
//!
//! Provides configuration management for rule execution hosts:
//! - Host configuration (rulehost.toml)
//! - Validation of script limits and invocation defaults
//! - Environment variable overrides
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Host config (./rulehost.toml, searched upwards from the start directory)
//! 3. Environment variables (RULEHOST_*)
//!
//! # Example
//!
//! ```no_run
//! use rulehost_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("default strategy: {}", config.host.default_strategy());
//! ```

pub mod host;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use host::{
    HostConfig, InvokeConfig, LimitsConfig, MarshalConfig, ScriptConfig, STRATEGY_DIRECT_CALL,
    STRATEGY_INJECT_AND_RUN,
};
pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
