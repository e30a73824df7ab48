//! Shared test utilities for rule host integration tests

#![allow(dead_code)]

use rhai::Dynamic;
use rulehost_runtime::{
    CompileError, HostValue, InvokeError, Marshaler, Record, RhaiBackend, RuleHost,
    ScriptBackend, ScriptEnvironment,
};
use std::cell::Cell;
use std::rc::Rc;

/// Rhai backend that counts how often the compile path is entered
pub struct CountingBackend {
    inner: RhaiBackend,
    compiles: Rc<Cell<usize>>,
}

impl CountingBackend {
    /// Returns the backend and a handle that reads its compile count
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let compiles = Rc::new(Cell::new(0));
        let backend = Self {
            inner: RhaiBackend::new(),
            compiles: Rc::clone(&compiles),
        };
        (backend, compiles)
    }
}

impl ScriptBackend for CountingBackend {
    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &str,
    ) -> Result<(), CompileError> {
        self.compiles.set(self.compiles.get() + 1);
        self.inner.compile_function(name, params, body)
    }

    fn call_function(
        &mut self,
        name: &str,
        this: Option<&mut Dynamic>,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic, InvokeError> {
        self.inner.call_function(name, this, args)
    }

    fn run(&mut self, statement: &str) -> Result<Dynamic, InvokeError> {
        self.inner.run(statement)
    }

    fn set_global(&mut self, name: &str, value: Dynamic) {
        self.inner.set_global(name, value)
    }

    fn get_global(&self, name: &str) -> Option<Dynamic> {
        self.inner.get_global(name)
    }

    fn remove_global(&mut self, name: &str) -> bool {
        self.inner.remove_global(name)
    }

    fn global_names(&self) -> Vec<String> {
        self.inner.global_names()
    }

    fn clear_globals(&mut self) {
        self.inner.clear_globals()
    }
}

/// Host over a counting backend, plus its compile counter
pub fn counting_host() -> (RuleHost<CountingBackend>, Rc<Cell<usize>>) {
    let (backend, compiles) = CountingBackend::new();
    let env = ScriptEnvironment::with_backend(backend, Marshaler::default());
    (RuleHost::with_environment(env), compiles)
}

/// The payment record used across mutation tests
pub fn payment(amount: f64, credit: bool) -> HostValue {
    let mut record = Record::new();
    record.insert("amount".to_string(), amount.into());
    record.insert("credit".to_string(), credit.into());
    HostValue::Record(record)
}

/// Body that settles a payment and stamps a status message
pub const SETTLE_BODY: &str = r#"
if this.credit {
    this.paid = -this.amount;
} else {
    this.paid = this.amount;
}
this.status = "You're my favorite deputy.";
"#;

/// Body mapping well-known numbers to names
pub const LOOKUP_BODY: &str = r#"
switch this {
    42 => "answer",
    81 => "monk",
    17 => "r",
    2 => "kids",
    _ => "whatever"
}
"#;
