//! Compiled rule functions
//!
//! The [`FunctionRegistry`] remembers what was compiled into an environment
//! under which name, so invocations can check arity without touching the
//! interpreter and identical recompiles can be skipped entirely.

use crate::backend::ScriptBackend;
use crate::environment::ScriptEnvironment;
use crate::error::CompileError;
use std::collections::HashMap;

/// A function compiled into a script environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFunction {
    name: String,
    params: Vec<String>,
    body: String,
    revision: u64,
}

impl ScriptFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional parameter names, empty for rules that only take a subject
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Starts at 1 and increases with every redefinition of this name
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn is_same_source(&self, params: &[String], body: &str) -> bool {
        self.params == params && self.body == body
    }
}

/// Name-to-function index for one environment
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, ScriptFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `body` as function `name` into `env`
    ///
    /// Compiling a name that already exists replaces it. Compiling the same
    /// parameters and body again returns the existing function without
    /// involving the interpreter. On error the previous definition (if any)
    /// stays in place.
    pub fn compile<B: ScriptBackend>(
        &mut self,
        env: &mut ScriptEnvironment<B>,
        name: &str,
        params: &[String],
        body: &str,
    ) -> Result<&ScriptFunction, CompileError> {
        validate_identifier(name)?;
        for (i, param) in params.iter().enumerate() {
            validate_identifier(param)?;
            if params[..i].contains(param) {
                return Err(CompileError::DuplicateParameter {
                    function: name.to_string(),
                    param: param.clone(),
                });
            }
        }

        let previous_revision = match self.functions.get(name) {
            Some(existing) if existing.is_same_source(params, body) => {
                tracing::trace!(name, "function unchanged, skipping compile");
                return Ok(&self.functions[name]);
            }
            Some(existing) => existing.revision,
            None => 0,
        };

        env.backend_mut().compile_function(name, params, body)?;

        let revision = previous_revision + 1;
        tracing::debug!(name, arity = params.len(), revision, "compiled function");

        let function = ScriptFunction {
            name: name.to_string(),
            params: params.to_vec(),
            body: body.to_string(),
            revision,
        };
        self.functions.insert(name.to_string(), function);
        Ok(&self.functions[name])
    }

    pub fn get(&self, name: &str) -> Option<&ScriptFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Compiled function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn validate_identifier(name: &str) -> Result<(), CompileError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(CompileError::InvalidName {
            name: name.to_string(),
        })
    }
}
