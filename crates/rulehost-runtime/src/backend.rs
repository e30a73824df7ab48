//! Interpreter backend seam
//!
//! The rule host never talks to the interpreter directly. Everything goes
//! through [`ScriptBackend`]: compile a named function once, call it with an
//! optional `this` subject, run a statement against the global namespace, and
//! manage global bindings. [`RhaiBackend`] is the production implementation.

use crate::engine::build_engine;
use crate::error::{CompileError, InvokeError};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, ParseError, Scope, AST};
use rulehost_config::HostConfig;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Capabilities the rule host needs from an embedded interpreter
///
/// Implementations are single-threaded: every operation that touches the
/// namespace takes `&mut self`, and callers serialize access.
pub trait ScriptBackend {
    /// Compile `fn name(params) { body }` into the namespace, replacing any
    /// previous function of the same name.
    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &str,
    ) -> Result<(), CompileError>;

    /// Call a compiled function. When `this` is given it is bound by
    /// reference: changes the function makes to `this` are left in place.
    fn call_function(
        &mut self,
        name: &str,
        this: Option<&mut Dynamic>,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, InvokeError>;

    /// Execute one statement against the persistent global namespace.
    fn run(&mut self, statement: &str) -> Result<Dynamic, InvokeError>;

    /// Bind (or rebind) a global variable.
    fn set_global(&mut self, name: &str, value: Dynamic);

    fn get_global(&self, name: &str) -> Option<Dynamic>;

    /// Remove every binding of `name`; returns whether one existed.
    fn remove_global(&mut self, name: &str) -> bool;

    /// Names of all bound globals, sorted and deduplicated.
    fn global_names(&self) -> Vec<String>;

    fn clear_globals(&mut self);
}

/// [`ScriptBackend`] backed by a Rhai engine
///
/// Compiled functions accumulate in one function-only AST that is reused for
/// every call and merged in front of every statement passed to `run`; the
/// global namespace is a Rhai [`Scope`].
pub struct RhaiBackend {
    engine: Engine,
    scope: Scope<'static>,
    functions: AST,
    timeout: Option<Duration>,
    deadline: Rc<Cell<Option<Instant>>>,
}

impl RhaiBackend {
    pub fn new() -> Self {
        Self::from_config(&HostConfig::default())
    }

    pub fn from_config(config: &HostConfig) -> Self {
        let mut engine = build_engine(config);
        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));

        let progress_deadline = Rc::clone(&deadline);
        engine.on_progress(move |_| match progress_deadline.get() {
            Some(deadline) if Instant::now() > deadline => Some(Dynamic::UNIT),
            _ => None,
        });

        Self {
            engine,
            scope: Scope::new(),
            functions: AST::empty(),
            timeout: config.timeout(),
            deadline,
        }
    }

    /// Number of functions currently defined in the namespace
    pub fn function_count(&self) -> usize {
        self.functions.iter_functions().count()
    }

    fn arm_deadline(&self) {
        self.deadline
            .set(self.timeout.map(|timeout| Instant::now() + timeout));
    }

    /// Map an evaluation failure to the error reported to callers
    ///
    /// Faults raised inside a compiled function report the line within that
    /// function's body, so a rule fails identically whether it was reached
    /// through `call_function` or through a `run` statement.
    fn eval_error(&self, err: &EvalAltResult, in_function: bool) -> InvokeError {
        let (root, nested) = innermost(err);
        match root {
            EvalAltResult::ErrorTerminated(..) => InvokeError::Timeout {
                ms: self.timeout.map_or(0, |t| t.as_millis() as u64),
            },
            EvalAltResult::ErrorTooManyOperations(..)
            | EvalAltResult::ErrorStackOverflow(..)
            | EvalAltResult::ErrorDataTooLarge(..) => InvokeError::LimitExceeded {
                message: root.to_string(),
            },
            _ => {
                let position = root.position();
                let message = root.to_string();
                let message = message
                    .strip_suffix(&format!(" ({})", position))
                    .map(str::to_string)
                    .unwrap_or(message);
                let line = if in_function || nested {
                    position.line().map(body_line)
                } else {
                    position.line()
                };
                InvokeError::Runtime { message, line }
            }
        }
    }
}

impl Default for RhaiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBackend for RhaiBackend {
    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &str,
    ) -> Result<(), CompileError> {
        let source = function_source(name, params, body);
        let ast = self
            .engine
            .compile(&source)
            .map_err(|err| syntax_error(name, &err))?;

        let defined: Vec<(String, usize)> = ast
            .iter_functions()
            .map(|f| (f.name.to_string(), f.params.len()))
            .collect();
        match defined.as_slice() {
            [(defined_name, arity)] if defined_name == name && *arity == params.len() => {}
            _ => {
                return Err(CompileError::Malformed {
                    function: name.to_string(),
                    reason: format!(
                        "body must not close the function or define others (found {} definition(s))",
                        defined.len()
                    ),
                })
            }
        }

        // Last definition wins, whatever its arity
        self.functions
            .retain_functions(|_, _, fn_name, _| fn_name != name);
        self.functions.combine(ast.clone_functions_only());
        Ok(())
    }

    fn call_function(
        &mut self,
        name: &str,
        this: Option<&mut Dynamic>,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, InvokeError> {
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let options = match this {
            Some(this) => options.bind_this_ptr(this),
            None => options,
        };

        self.arm_deadline();
        self.engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut self.scope,
                &self.functions,
                name,
                args,
            )
            .map_err(|err| self.eval_error(&err, true))
    }

    fn run(&mut self, statement: &str) -> Result<Dynamic, InvokeError> {
        let statement_ast = self
            .engine
            .compile_with_scope(&self.scope, statement)
            .map_err(|err| InvokeError::Statement {
                message: err.0.to_string(),
                line: err.1.line(),
            })?;
        let program = self.functions.merge(&statement_ast);

        self.arm_deadline();
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &program)
            .map_err(|err| self.eval_error(&err, false))
    }

    fn set_global(&mut self, name: &str, value: Dynamic) {
        if self.scope.is_constant(name) == Some(false) {
            self.scope.set_value(name, value);
        } else {
            // New name, or shadowing a script constant
            self.scope.push_dynamic(name.to_string(), value);
        }
    }

    fn get_global(&self, name: &str) -> Option<Dynamic> {
        self.scope.get_value::<Dynamic>(name)
    }

    fn remove_global(&mut self, name: &str) -> bool {
        if !self.scope.contains(name) {
            return false;
        }

        let mut kept = Scope::new();
        for (binding, is_constant, value) in self.scope.iter_raw() {
            if binding == name {
                continue;
            }
            if is_constant {
                kept.push_constant_dynamic(binding.to_string(), value.clone());
            } else {
                kept.push_dynamic(binding.to_string(), value.clone());
            }
        }
        self.scope = kept;
        true
    }

    fn global_names(&self) -> Vec<String> {
        self.scope
            .iter_raw()
            .map(|(name, _, _)| name.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn clear_globals(&mut self) {
        self.scope.clear();
    }
}

/// Body lines start on line 2 of the generated source.
fn function_source(name: &str, params: &[String], body: &str) -> String {
    format!("fn {}({}) {{\n{}\n}}", name, params.join(", "), body)
}

fn syntax_error(function: &str, err: &ParseError) -> CompileError {
    CompileError::Syntax {
        function: function.to_string(),
        message: err.0.to_string(),
        line: err.1.line().map(body_line),
    }
}

/// Line within the body for a line of the generated function source
fn body_line(source_line: usize) -> usize {
    source_line.saturating_sub(1).max(1)
}

/// The error that started a chain of call wrappers, and whether any
/// function call wrapper was unwrapped to reach it
fn innermost(err: &EvalAltResult) -> (&EvalAltResult, bool) {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => (innermost(inner).0, true),
        EvalAltResult::ErrorInModule(_, inner, _) => innermost(inner),
        _ => (err, false),
    }
}
