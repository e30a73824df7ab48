//! Error types for compiling and invoking rules

use crate::api::conversion::UnsupportedType;
use rulehost_config::ConfigError;
use thiserror::Error;

/// A function body (or name) the interpreter refused to compile
///
/// Fatal only to the `compile` call that produced it; the environment stays
/// usable for every other name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Function or parameter name is not a plain identifier
    #[error("Invalid name '{name}': expected an identifier")]
    InvalidName { name: String },

    /// A parameter name appears more than once
    #[error("Duplicate parameter '{param}' in function '{function}'")]
    DuplicateParameter { function: String, param: String },

    /// The body is not valid in the expression language
    #[error("Syntax error in function '{function}'{}: {message}", line_suffix(.line))]
    Syntax {
        function: String,
        message: String,
        /// Line within the body, when known
        line: Option<usize>,
    },

    /// The body parsed but does not define exactly the requested function
    #[error("Malformed body for function '{function}': {reason}")]
    Malformed { function: String, reason: String },
}

/// A failure while running a statement or invoking a function
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// No function with this name has been compiled
    #[error("Unknown rule function: {name}")]
    UndefinedFunction { name: String },

    /// Positional argument count does not match the compiled signature
    #[error("Function '{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A statement passed to `run` did not parse
    #[error("Invalid statement{}: {message}", line_suffix(.line))]
    Statement { message: String, line: Option<usize> },

    /// The script raised a runtime fault
    #[error("Runtime error{}: {message}", line_suffix(.line))]
    Runtime { message: String, line: Option<usize> },

    /// An operation, depth or size limit was hit
    #[error("Limit exceeded: {message}")]
    LimitExceeded { message: String },

    /// The run took longer than the configured timeout
    #[error("Script timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// An argument or result could not cross the marshaling boundary
    #[error(transparent)]
    Unsupported(#[from] UnsupportedType),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" at line {}", line),
        None => String::new(),
    }
}

/// Unified error for callers composing configuration, compilation and invocation
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedType),

    #[error("Unknown invocation strategy '{0}'")]
    UnknownStrategy(String),
}

/// Result type for host operations that may fail in more than one layer
pub type HostResult<T> = Result<T, HostError>;
