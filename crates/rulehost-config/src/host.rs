//! Host Configuration (rulehost.toml)
//!
//! Handles the host-level configuration stored in `rulehost.toml`. Every section
//! and every key is optional; accessors fall back to the built-in defaults.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Strategy name selecting global injection followed by statement execution
pub const STRATEGY_INJECT_AND_RUN: &str = "inject-and-run";

/// Strategy name selecting a direct function call
pub const STRATEGY_DIRECT_CALL: &str = "direct-call";

const DEFAULT_MAX_OPERATIONS: u64 = 1_000_000;
const DEFAULT_MAX_CALL_LEVELS: usize = 64;
const DEFAULT_MAX_EXPR_DEPTH: usize = 64;
const DEFAULT_MAX_FUNCTION_EXPR_DEPTH: usize = 32;
const DEFAULT_MAX_STRING_SIZE: usize = 1_000_000;
const DEFAULT_MAX_MAP_SIZE: usize = 100_000;
const DEFAULT_MAX_DEPTH: usize = 64;

/// Host configuration from rulehost.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Script language behavior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptConfig>,

    /// Resource limits applied to every compile and invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsConfig>,

    /// Value marshaling settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marshal: Option<MarshalConfig>,

    /// Invocation defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoke: Option<InvokeConfig>,
}

/// Script language behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    /// Reject references to undeclared variables at compile time (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_variables: Option<bool>,

    /// Fail when a script reads a record field that does not exist (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_properties: Option<bool>,
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of operations per run (0 = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_operations: Option<u64>,

    /// Maximum call stack depth
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_call_levels: Option<usize>,

    /// Maximum expression nesting depth at global level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_expr_depth: Option<usize>,

    /// Maximum expression nesting depth inside functions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_function_expr_depth: Option<usize>,

    /// Maximum length of any string value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_string_size: Option<usize>,

    /// Maximum number of fields in any record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_map_size: Option<usize>,

    /// Wall-clock limit for a single run, in milliseconds (unset = none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Value marshaling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct MarshalConfig {
    /// Maximum record nesting depth accepted in either direction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Invocation defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct InvokeConfig {
    /// Strategy used when the caller does not pick one ("inject-and-run" or "direct-call")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_strategy: Option<String>,
}

impl HostConfig {
    /// Load host configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the host configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(invoke) = &self.invoke {
            if let Some(strategy) = &invoke.default_strategy {
                validate_strategy_name("invoke.default_strategy", strategy)?;
            }
        }

        if let Some(limits) = &self.limits {
            validate_non_zero("limits.max_call_levels", limits.max_call_levels)?;
            validate_non_zero("limits.max_expr_depth", limits.max_expr_depth)?;
            validate_non_zero(
                "limits.max_function_expr_depth",
                limits.max_function_expr_depth,
            )?;
            if limits.timeout_ms == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "limits.timeout_ms".to_string(),
                    reason: "must be greater than zero; omit the key to disable".to_string(),
                });
            }
        }

        if let Some(marshal) = &self.marshal {
            validate_non_zero("marshal.max_depth", marshal.max_depth)?;
        }

        Ok(())
    }

    pub fn strict_variables(&self) -> bool {
        self.script
            .as_ref()
            .and_then(|s| s.strict_variables)
            .unwrap_or(true)
    }

    pub fn strict_properties(&self) -> bool {
        self.script
            .as_ref()
            .and_then(|s| s.strict_properties)
            .unwrap_or(false)
    }

    pub fn max_operations(&self) -> u64 {
        self.limits
            .as_ref()
            .and_then(|l| l.max_operations)
            .unwrap_or(DEFAULT_MAX_OPERATIONS)
    }

    pub fn max_call_levels(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|l| l.max_call_levels)
            .unwrap_or(DEFAULT_MAX_CALL_LEVELS)
    }

    pub fn max_expr_depth(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|l| l.max_expr_depth)
            .unwrap_or(DEFAULT_MAX_EXPR_DEPTH)
    }

    pub fn max_function_expr_depth(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|l| l.max_function_expr_depth)
            .unwrap_or(DEFAULT_MAX_FUNCTION_EXPR_DEPTH)
    }

    pub fn max_string_size(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|l| l.max_string_size)
            .unwrap_or(DEFAULT_MAX_STRING_SIZE)
    }

    pub fn max_map_size(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|l| l.max_map_size)
            .unwrap_or(DEFAULT_MAX_MAP_SIZE)
    }

    /// Wall-clock limit for a single run, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.limits
            .as_ref()
            .and_then(|l| l.timeout_ms)
            .map(Duration::from_millis)
    }

    pub fn max_depth(&self) -> usize {
        self.marshal
            .as_ref()
            .and_then(|m| m.max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH)
    }

    /// Configured default strategy name (defaults to "inject-and-run")
    pub fn default_strategy(&self) -> &str {
        self.invoke
            .as_ref()
            .and_then(|i| i.default_strategy.as_deref())
            .unwrap_or(STRATEGY_INJECT_AND_RUN)
    }
}

/// Validate a strategy name
pub(crate) fn validate_strategy_name(field: &str, value: &str) -> ConfigResult<()> {
    if !matches!(value, STRATEGY_INJECT_AND_RUN | STRATEGY_DIRECT_CALL) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "must be '{}' or '{}', got '{}'",
                STRATEGY_INJECT_AND_RUN, STRATEGY_DIRECT_CALL, value
            ),
        });
    }
    Ok(())
}

fn validate_non_zero(field: &str, value: Option<usize>) -> ConfigResult<()> {
    if value == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
