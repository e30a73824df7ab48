//! Persistent script environment
//!
//! A [`ScriptEnvironment`] owns one interpreter instance: its compiled
//! functions and its global bindings survive across `run` calls until the
//! environment is dropped. Values cross into and out of it through the
//! environment's [`Marshaler`].
//!
//! # Examples
//!
//! ```
//! use rulehost_runtime::{HostValue, ScriptEnvironment};
//!
//! let mut env = ScriptEnvironment::new();
//! env.set_global("limit", 100).unwrap();
//!
//! // State persists between statements
//! env.run("let doubled = limit * 2;").unwrap();
//! assert_eq!(env.run("doubled").unwrap(), HostValue::Integer(200));
//! ```

use crate::api::conversion::{Marshaler, UnsupportedType};
use crate::backend::{RhaiBackend, ScriptBackend};
use crate::error::InvokeError;
use crate::value::HostValue;
use rulehost_config::HostConfig;

/// Global namespace plus compiled-function store of one interpreter
///
/// Not `Send`: a worker that needs an environment constructs and owns it.
pub struct ScriptEnvironment<B: ScriptBackend = RhaiBackend> {
    backend: B,
    marshaler: Marshaler,
}

impl ScriptEnvironment<RhaiBackend> {
    /// Create an environment with default limits
    pub fn new() -> Self {
        Self::with_backend(RhaiBackend::new(), Marshaler::default())
    }

    /// Create an environment whose engine limits and marshaling depth come
    /// from `config`
    pub fn from_config(config: &HostConfig) -> Self {
        Self::with_backend(
            RhaiBackend::from_config(config),
            Marshaler::new(config.max_depth()),
        )
    }
}

impl Default for ScriptEnvironment<RhaiBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ScriptBackend> ScriptEnvironment<B> {
    /// Wrap an arbitrary backend
    pub fn with_backend(backend: B, marshaler: Marshaler) -> Self {
        Self { backend, marshaler }
    }

    /// Bind `name` to `value` in the global namespace, replacing any
    /// previous binding
    pub fn set_global(
        &mut self,
        name: &str,
        value: impl Into<HostValue>,
    ) -> Result<(), UnsupportedType> {
        let value = self.marshaler.to_script(&value.into())?;
        self.backend.set_global(name, value);
        Ok(())
    }

    /// Read a global back as a host value
    ///
    /// `Ok(None)` when nothing is bound under `name`; an error when the bound
    /// value has no host counterpart (an array, say).
    pub fn get_global(&self, name: &str) -> Result<Option<HostValue>, UnsupportedType> {
        self.backend
            .get_global(name)
            .map(|value| self.marshaler.from_script(&value))
            .transpose()
    }

    /// Execute one statement or expression against the global namespace
    ///
    /// Side effects, including `let` bindings, persist. Returns the value of
    /// the statement, or `HostValue::Unit` when it has none.
    pub fn run(&mut self, statement: &str) -> Result<HostValue, InvokeError> {
        tracing::trace!(statement, "running statement");
        let value = self.backend.run(statement)?;
        Ok(self.marshaler.from_script(&value)?)
    }

    pub fn remove_global(&mut self, name: &str) -> bool {
        self.backend.remove_global(name)
    }

    /// Names of all bound globals, sorted
    pub fn globals(&self) -> Vec<String> {
        self.backend.global_names()
    }

    pub fn clear_globals(&mut self) {
        self.backend.clear_globals();
    }

    pub fn marshaler(&self) -> &Marshaler {
        &self.marshaler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
