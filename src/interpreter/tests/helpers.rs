//! Test helpers for interpreter tests
//!
//! Common utilities for evaluating scripts synchronously and capturing the
//! outcome or the interceptor event stream.

use crate::interpreter::interceptor::recorder;
use crate::interpreter::{Bindings, Context, Environment, Evaluation, EvaluationConfig, Exception, Source, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Evaluates `source` against `context` and returns whichever continuation fired
///
/// Panics if neither continuation fired before `evaluate` returned, or if a
/// continuation fired more than once.
pub fn run_in(context: &Context, source: impl Into<Source>, bindings: Option<Bindings>) -> Result<Value, Exception> {
    let source = source.into();
    let slot = Rc::new(RefCell::new(None));
    let calls = Rc::new(Cell::new(0));
    let (ok, err) = (slot.clone(), slot.clone());
    let (ok_calls, err_calls) = (calls.clone(), calls.clone());

    context.evaluate(
        source.clone(),
        Some(Box::new(move |value| {
            ok_calls.set(ok_calls.get() + 1);
            *ok.borrow_mut() = Some(Ok(value));
        })),
        Some(Box::new(move |exception| {
            err_calls.set(err_calls.get() + 1);
            *err.borrow_mut() = Some(Err(exception));
        })),
        bindings,
        None,
    );

    assert_eq!(calls.get(), 1, "Expected exactly one continuation call for {:?}", source);
    let outcome = slot.borrow_mut().take();
    outcome.expect("continuation fired")
}

/// Evaluates `source` in a fresh context
pub fn run(source: &str) -> Result<Value, Exception> {
    run_in(&Context::default(), source, None)
}

/// Evaluates `source` with extra raw bindings
pub fn run_with(source: &str, values: HashMap<String, Value>) -> Result<Value, Exception> {
    run_in(&Context::default(), source, Some(values.into()))
}

/// Evaluates `source`, expecting success
pub fn eval_ok(source: &str) -> Value {
    match run(source) {
        Ok(value) => value,
        Err(exception) => panic!("Expected success for {:?}, got {}", source, exception),
    }
}

/// Evaluates `source`, expecting failure
pub fn eval_err(source: &str) -> Exception {
    match run(source) {
        Ok(value) => panic!("Expected failure for {:?}, got {:?}", source, value),
        Err(exception) => exception,
    }
}

/// Evaluates `source` in `env` while recording every interceptor event
pub fn record(source: &str, env: Environment) -> (Result<Value, Exception>, Vec<Evaluation>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let config = EvaluationConfig::new().with_interceptor(recorder(log.clone()));
    let context = Context::new(env, config);
    let outcome = run_in(&context, source, None);
    let events = log.borrow().clone();
    (outcome, events)
}

/// `label:phase` strings for compact event assertions
pub fn describe(events: &[Evaluation]) -> Vec<String> {
    events
        .iter()
        .map(|event| format!("{}:{:?}", event.label(), event.phase))
        .collect()
}

/// Reads a property of an object value
pub fn prop(value: &Value, key: &str) -> Value {
    crate::interpreter::operators::get_property(value, key).expect("readable value")
}
