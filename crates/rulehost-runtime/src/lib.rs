//! Rule host runtime
//!
//! Embeds a Rhai interpreter as a rule execution host. Named transformation
//! functions are compiled once into a persistent environment and invoked many
//! times, either by injecting their arguments as globals and running a call
//! statement or by calling them directly. The value a rule transforms (its
//! subject) is bound as `this`, and the rule's changes to it are visible to
//! the caller afterwards.

/// Rule host runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod api;
pub mod backend;
pub mod engine;
pub mod environment;
pub mod error;
pub mod invoke;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use api::{Marshaler, RuleHost, UnsupportedType};
pub use backend::{RhaiBackend, ScriptBackend};
pub use engine::SCRIPT_LOG_TARGET;
pub use environment::ScriptEnvironment;
pub use error::{CompileError, HostError, HostResult, InvokeError};
pub use invoke::Strategy;
pub use registry::{FunctionRegistry, ScriptFunction};
pub use value::{ConversionError, HostValue, Record};
