//! Invocation strategies
//!
//! Two ways to run a compiled rule against a subject:
//!
//! - [`Strategy::InjectAndRun`] binds the marshaled subject and arguments to
//!   fresh globals named `_rulehost_<name>_<call id>` and runs the statement
//!   `_rulehost_<name>_<id>.<name>(<args>)`. Ids already taken by a global
//!   are skipped, and the bindings are released afterwards.
//! - [`Strategy::DirectCall`] calls the function by name with the subject
//!   bound as `this`, without touching the global namespace.
//!
//! Both leave the script's changes to the subject in the caller's value, on
//! success and on failure alike, and both produce the same result for the
//! same body and input.

use crate::backend::ScriptBackend;
use crate::environment::ScriptEnvironment;
use crate::error::{HostError, InvokeError};
use crate::registry::ScriptFunction;
use crate::value::HostValue;
use rhai::Dynamic;
use rulehost_config::{STRATEGY_DIRECT_CALL, STRATEGY_INJECT_AND_RUN};
use std::fmt;
use std::str::FromStr;

/// How a rule function is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Bind arguments as globals, then run a call statement
    #[default]
    InjectAndRun,
    /// Call the function by name
    DirectCall,
}

impl Strategy {
    /// Name used in configuration files and environment variables
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::InjectAndRun => STRATEGY_INJECT_AND_RUN,
            Strategy::DirectCall => STRATEGY_DIRECT_CALL,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STRATEGY_INJECT_AND_RUN => Ok(Strategy::InjectAndRun),
            STRATEGY_DIRECT_CALL => Ok(Strategy::DirectCall),
            other => Err(HostError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Reject calls whose positional argument count differs from the signature
fn check_arity(function: &ScriptFunction, found: usize) -> Result<(), InvokeError> {
    if function.arity() != found {
        return Err(InvokeError::ArityMismatch {
            name: function.name().to_string(),
            expected: function.arity(),
            found,
        });
    }
    Ok(())
}

fn marshal_args<B: ScriptBackend>(
    env: &ScriptEnvironment<B>,
    args: &[HostValue],
) -> Result<Vec<Dynamic>, InvokeError> {
    args.iter()
        .map(|arg| env.marshaler().to_script(arg).map_err(InvokeError::from))
        .collect()
}

/// Pick the error to report when both the call and the subject write-back
/// may have failed; the script's own failure comes first.
fn settle(
    outcome: Result<HostValue, InvokeError>,
    write_back: Result<(), InvokeError>,
) -> Result<HostValue, InvokeError> {
    let value = outcome?;
    write_back?;
    Ok(value)
}

/// Prefix of the globals Inject-and-Run binds for the duration of one call
pub const BINDING_PREFIX: &str = "_rulehost_";

/// Global names holding one call's subject and positional arguments
struct CallBindings {
    subject: String,
    args: Vec<String>,
}

impl CallBindings {
    /// First set of names at or after `call_id` that no existing global uses
    fn reserve<B: ScriptBackend>(
        env: &ScriptEnvironment<B>,
        name: &str,
        call_id: u64,
        arity: usize,
    ) -> Self {
        let mut id = call_id;
        loop {
            let subject = format!("{}{}_{}", BINDING_PREFIX, name, id);
            let args: Vec<String> = (0..arity).map(|i| format!("{}_{}", subject, i)).collect();

            let taken = std::iter::once(&subject)
                .chain(&args)
                .any(|binding| env.backend().get_global(binding).is_some());
            if !taken {
                return Self { subject, args };
            }
            id = id.wrapping_add(1);
        }
    }

    fn release<B: ScriptBackend>(&self, env: &mut ScriptEnvironment<B>) {
        env.backend_mut().remove_global(&self.subject);
        for binding in &self.args {
            env.backend_mut().remove_global(binding);
        }
    }
}

pub(crate) fn inject_and_run<B: ScriptBackend>(
    env: &mut ScriptEnvironment<B>,
    call_id: u64,
    function: &ScriptFunction,
    subject: Option<&mut HostValue>,
    args: &[HostValue],
) -> Result<HostValue, InvokeError> {
    check_arity(function, args.len())?;

    let name = function.name();

    // Marshal everything before binding anything
    let script_subject = subject
        .as_deref()
        .map(|value| env.marshaler().to_script(value))
        .transpose()?;
    let script_args = marshal_args(env, args)?;

    let bindings = CallBindings::reserve(env, name, call_id, args.len());
    let call = format!("{}({})", name, bindings.args.join(", "));
    let statement = match script_subject {
        Some(value) => {
            env.backend_mut().set_global(&bindings.subject, value);
            format!("{}.{}", bindings.subject, call)
        }
        None => call,
    };
    for (binding, value) in bindings.args.iter().zip(script_args) {
        env.backend_mut().set_global(binding, value);
    }

    tracing::trace!(%statement, "injected call");
    let outcome = env.run(&statement);

    let write_back = match subject {
        Some(subject) => read_back(env, &bindings.subject, subject),
        None => Ok(()),
    };
    bindings.release(env);

    settle(outcome, write_back)
}

fn read_back<B: ScriptBackend>(
    env: &ScriptEnvironment<B>,
    binding: &str,
    subject: &mut HostValue,
) -> Result<(), InvokeError> {
    if let Some(value) = env.get_global(binding)? {
        *subject = value;
    }
    Ok(())
}

pub(crate) fn direct_call<B: ScriptBackend>(
    env: &mut ScriptEnvironment<B>,
    function: &ScriptFunction,
    subject: Option<&mut HostValue>,
    args: &[HostValue],
) -> Result<HostValue, InvokeError> {
    check_arity(function, args.len())?;

    let mut script_subject = subject
        .as_deref()
        .map(|value| env.marshaler().to_script(value))
        .transpose()?;
    let script_args = marshal_args(env, args)?;

    let outcome = env
        .backend_mut()
        .call_function(function.name(), script_subject.as_mut(), script_args)
        .and_then(|value| {
            env.marshaler()
                .from_script(&value)
                .map_err(InvokeError::from)
        });

    let write_back = match (subject, script_subject) {
        (Some(subject), Some(value)) => env
            .marshaler()
            .from_script(&value)
            .map(|value| *subject = value)
            .map_err(InvokeError::from),
        _ => Ok(()),
    };

    settle(outcome, write_back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FunctionRegistry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn compiled(
        env: &mut ScriptEnvironment,
        name: &str,
        params: &[&str],
        body: &str,
    ) -> ScriptFunction {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        FunctionRegistry::new()
            .compile(env, name, &params, body)
            .unwrap()
            .clone()
    }

    #[rstest]
    #[case("inject-and-run", Strategy::InjectAndRun)]
    #[case("direct-call", Strategy::DirectCall)]
    fn test_strategy_names(#[case] name: &str, #[case] strategy: Strategy) {
        assert_eq!(name.parse::<Strategy>().unwrap(), strategy);
        assert_eq!(strategy.to_string(), name);
    }

    #[test]
    fn test_unknown_strategy_name() {
        let err = "eval".parse::<Strategy>().unwrap_err();
        assert!(matches!(err, HostError::UnknownStrategy(ref name) if name == "eval"));
    }

    #[test]
    fn test_inject_and_run_mutates_subject() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "mark", &[], "this.seen = true; 1");

        let mut subject: HostValue = [("id", HostValue::from(7))].into_iter().collect();
        let result = inject_and_run(&mut env, 1, &function, Some(&mut subject), &[]).unwrap();

        assert_eq!(result, HostValue::Integer(1));
        assert_eq!(subject.get("seen"), Some(&HostValue::Boolean(true)));
    }

    #[test]
    fn test_inject_and_run_releases_bindings() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "scale", &["factor"], "this * factor");

        let mut subject = HostValue::Integer(6);
        let result = inject_and_run(
            &mut env,
            3,
            &function,
            Some(&mut subject),
            &[HostValue::Integer(7)],
        )
        .unwrap();

        assert_eq!(result, HostValue::Integer(42));
        assert!(env.globals().is_empty());
    }

    #[test]
    fn test_inject_and_run_releases_bindings_on_error() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "fail", &[], "throw \"nope\";");

        let mut subject = HostValue::Integer(1);
        assert!(inject_and_run(&mut env, 9, &function, Some(&mut subject), &[]).is_err());
        assert!(env.globals().is_empty());
    }

    #[test]
    fn test_inject_and_run_skips_taken_binding_names() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "scale", &["factor"], "this * factor");
        env.set_global("_rulehost_scale_5", "mine").unwrap();
        env.set_global("_rulehost_scale_6_0", "also mine").unwrap();

        let mut subject = HostValue::Integer(2);
        let result = inject_and_run(
            &mut env,
            5,
            &function,
            Some(&mut subject),
            &[HostValue::Integer(21)],
        )
        .unwrap();

        assert_eq!(result, HostValue::Integer(42));
        assert_eq!(
            env.get_global("_rulehost_scale_5").unwrap(),
            Some(HostValue::from("mine"))
        );
        assert_eq!(
            env.get_global("_rulehost_scale_6_0").unwrap(),
            Some(HostValue::from("also mine"))
        );
        assert_eq!(env.globals(), vec!["_rulehost_scale_5", "_rulehost_scale_6_0"]);
    }

    #[test]
    fn test_direct_call_replaces_subject() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "swap", &[], "this = \"replaced\"; 0");

        let mut subject = HostValue::from("original");
        direct_call(&mut env, &function, Some(&mut subject), &[]).unwrap();
        assert_eq!(subject, HostValue::from("replaced"));
    }

    #[test]
    fn test_direct_call_without_subject() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "add", &["a", "b"], "a + b");

        let result = direct_call(
            &mut env,
            &function,
            None,
            &[HostValue::Integer(40), HostValue::Integer(2)],
        )
        .unwrap();
        assert_eq!(result, HostValue::Integer(42));
    }

    #[rstest]
    #[case(Strategy::InjectAndRun)]
    #[case(Strategy::DirectCall)]
    fn test_arity_mismatch(#[case] strategy: Strategy) {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "pair", &["a", "b"], "a + b");
        let args = [HostValue::Integer(1)];

        let err = match strategy {
            Strategy::InjectAndRun => inject_and_run(&mut env, 1, &function, None, &args),
            Strategy::DirectCall => direct_call(&mut env, &function, None, &args),
        }
        .unwrap_err();

        assert_eq!(
            err,
            InvokeError::ArityMismatch {
                name: "pair".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_unsupported_subject_write_back() {
        let mut env = ScriptEnvironment::new();
        let function = compiled(&mut env, "listify", &[], "this = [1, 2]; 0");

        let mut subject = HostValue::Integer(5);
        let err = direct_call(&mut env, &function, Some(&mut subject), &[]).unwrap_err();

        assert!(matches!(err, InvokeError::Unsupported(_)));
        assert_eq!(subject, HostValue::Integer(5));
    }
}
