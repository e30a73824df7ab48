//! Rule execution host
//!
//! Provides the [`RuleHost`] façade: compile named rule functions once into a
//! persistent environment, then invoke them many times with either
//! invocation strategy.
//!
//! # Examples
//!
//! ```
//! use rulehost_runtime::{HostValue, RuleHost, Strategy};
//!
//! let mut host = RuleHost::new();
//! host.compile("settle", "this.paid = -this.amount;").unwrap();
//!
//! let mut payment: HostValue = [("amount", HostValue::from(345.45))].into_iter().collect();
//! host.invoke("settle", &mut payment, Strategy::DirectCall).unwrap();
//!
//! assert_eq!(payment.get("paid"), Some(&HostValue::Float(-345.45)));
//! ```

use crate::backend::{RhaiBackend, ScriptBackend};
use crate::environment::ScriptEnvironment;
use crate::error::{CompileError, HostResult, InvokeError};
use crate::invoke::{direct_call, inject_and_run, Strategy};
use crate::registry::{FunctionRegistry, ScriptFunction};
use crate::value::HostValue;
use rulehost_config::{ConfigLoader, HostConfig};
use std::path::Path;

/// Compiles rule functions into one environment and invokes them
///
/// Every invocation gets a fresh call id, which keeps Inject-and-Run
/// bindings from colliding. A host is single-threaded; run one per worker.
pub struct RuleHost<B: ScriptBackend = RhaiBackend> {
    environment: ScriptEnvironment<B>,
    registry: FunctionRegistry,
    default_strategy: Strategy,
    next_call_id: u64,
}

impl RuleHost<RhaiBackend> {
    /// Create a host with built-in defaults
    pub fn new() -> Self {
        Self::with_environment(ScriptEnvironment::new())
    }

    /// Create a host from a validated configuration
    pub fn from_config(config: &HostConfig) -> HostResult<Self> {
        config.validate()?;
        let mut host = Self::with_environment(ScriptEnvironment::from_config(config));
        host.default_strategy = config.default_strategy().parse()?;
        Ok(host)
    }

    /// Find `rulehost.toml` at or above `dir`, apply `RULEHOST_*` overrides,
    /// and build a host from the result
    ///
    /// A missing file is not an error: the defaults (plus overrides) apply.
    pub fn from_directory(dir: &Path) -> HostResult<Self> {
        let config = ConfigLoader::new().load_from_directory(dir)?;
        Self::from_config(&config.host)
    }
}

impl Default for RuleHost<RhaiBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ScriptBackend> RuleHost<B> {
    /// Build a host around an existing environment
    pub fn with_environment(environment: ScriptEnvironment<B>) -> Self {
        Self {
            environment,
            registry: FunctionRegistry::new(),
            default_strategy: Strategy::default(),
            next_call_id: 0,
        }
    }

    /// Compile a rule that transforms its subject (`this`)
    ///
    /// Recompiling a name replaces the previous definition.
    pub fn compile(&mut self, name: &str, body: &str) -> Result<&ScriptFunction, CompileError> {
        self.registry.compile(&mut self.environment, name, &[], body)
    }

    /// Compile a function taking positional parameters
    ///
    /// # Examples
    ///
    /// ```
    /// use rulehost_runtime::{HostValue, RuleHost, Strategy};
    ///
    /// let mut host = RuleHost::new();
    /// host.compile_with_params("divide", &["field"], "field / 1000").unwrap();
    ///
    /// let result = host
    ///     .call("divide", &[HostValue::Integer(84_000)], Strategy::InjectAndRun)
    ///     .unwrap();
    /// assert_eq!(result, HostValue::Integer(84));
    /// ```
    pub fn compile_with_params(
        &mut self,
        name: &str,
        params: &[&str],
        body: &str,
    ) -> Result<&ScriptFunction, CompileError> {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        self.registry
            .compile(&mut self.environment, name, &params, body)
    }

    /// Invoke rule `name` on `subject`
    ///
    /// Changes the script makes to `this` are written back into `subject`
    /// under both strategies. This also holds when the script fails part way:
    /// whatever it changed before the error stays changed.
    pub fn invoke(
        &mut self,
        name: &str,
        subject: &mut HostValue,
        strategy: Strategy,
    ) -> Result<HostValue, InvokeError> {
        self.dispatch(name, Some(subject), &[], strategy)
    }

    /// Invoke rule `name` on `subject` with extra positional arguments
    pub fn invoke_with_args(
        &mut self,
        name: &str,
        subject: &mut HostValue,
        args: &[HostValue],
        strategy: Strategy,
    ) -> Result<HostValue, InvokeError> {
        self.dispatch(name, Some(subject), args, strategy)
    }

    /// Invoke rule `name` on `subject` with the configured default strategy
    pub fn invoke_default(
        &mut self,
        name: &str,
        subject: &mut HostValue,
    ) -> Result<HostValue, InvokeError> {
        let strategy = self.default_strategy;
        self.dispatch(name, Some(subject), &[], strategy)
    }

    /// Call function `name` with positional arguments and no subject
    pub fn call(
        &mut self,
        name: &str,
        args: &[HostValue],
        strategy: Strategy,
    ) -> Result<HostValue, InvokeError> {
        self.dispatch(name, None, args, strategy)
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(rule = %name, strategy = %strategy, call_id = self.next_call_id)
    )]
    fn dispatch(
        &mut self,
        name: &str,
        subject: Option<&mut HostValue>,
        args: &[HostValue],
        strategy: Strategy,
    ) -> Result<HostValue, InvokeError> {
        let call_id = self.next_call_id;
        self.next_call_id += 1;

        let function = self
            .registry
            .get(name)
            .ok_or_else(|| InvokeError::UndefinedFunction {
                name: name.to_string(),
            })?;

        let result = match strategy {
            Strategy::InjectAndRun => {
                inject_and_run(&mut self.environment, call_id, function, subject, args)
            }
            Strategy::DirectCall => direct_call(&mut self.environment, function, subject, args),
        };

        if let Err(err) = &result {
            tracing::debug!(error = %err, "invocation failed");
        }
        result
    }

    pub fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    pub fn set_default_strategy(&mut self, strategy: Strategy) {
        self.default_strategy = strategy;
    }

    pub fn environment(&self) -> &ScriptEnvironment<B> {
        &self.environment
    }

    /// Mutable access for ad hoc globals and statements
    pub fn environment_mut(&mut self) -> &mut ScriptEnvironment<B> {
        &mut self.environment
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invoke_unknown_function() {
        let mut host = RuleHost::new();
        let mut subject = HostValue::Integer(1);

        let err = host
            .invoke("missing", &mut subject, Strategy::InjectAndRun)
            .unwrap_err();
        assert_eq!(
            err,
            InvokeError::UndefinedFunction {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_call_ids_increase() {
        let mut host = RuleHost::new();
        host.compile("id", "this").unwrap();

        let mut subject = HostValue::Integer(1);
        host.invoke("id", &mut subject, Strategy::InjectAndRun)
            .unwrap();
        host.invoke("id", &mut subject, Strategy::DirectCall)
            .unwrap();
        assert_eq!(host.next_call_id, 2);
    }

    #[test]
    fn test_invoke_default_uses_configured_strategy() {
        let config = HostConfig {
            invoke: Some(rulehost_config::InvokeConfig {
                default_strategy: Some("direct-call".to_string()),
            }),
            ..Default::default()
        };
        let mut host = RuleHost::from_config(&config).unwrap();
        assert_eq!(host.default_strategy(), Strategy::DirectCall);

        host.compile("double", "this * 2").unwrap();
        let mut subject = HostValue::Integer(21);
        assert_eq!(
            host.invoke_default("double", &mut subject).unwrap(),
            HostValue::Integer(42)
        );
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = HostConfig {
            invoke: Some(rulehost_config::InvokeConfig {
                default_strategy: Some("eval".to_string()),
            }),
            ..Default::default()
        };
        assert!(RuleHost::from_config(&config).is_err());
    }

    #[test]
    fn test_invoke_with_args() {
        let mut host = RuleHost::new();
        host.compile_with_params("charge", &["fee"], "this.total = this.amount + fee;")
            .unwrap();

        let mut order: HostValue = [("amount", HostValue::from(10))].into_iter().collect();
        let result = host
            .invoke_with_args(
                "charge",
                &mut order,
                &[HostValue::Integer(3)],
                Strategy::InjectAndRun,
            )
            .unwrap();

        assert_eq!(result, HostValue::Unit);
        assert_eq!(order.get("total"), Some(&HostValue::Integer(13)));
    }
}
