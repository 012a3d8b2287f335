//! Tests for conditionals, throw, try/catch/finally and stray control signals

use super::helpers::{eval_err, eval_ok, prop, run_in};
use crate::interpreter::{Context, Environment, EvaluationConfig, FunctionRef, HostError, Signal, Value};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_if_else() {
    assert_eq!(eval_ok("let r; if (1 < 2) { r = 'a'; } else { r = 'b'; } r"), Value::from("a"));
    assert_eq!(eval_ok("let r = 0; if (0) r = 1; else if (1) r = 2; r"), Value::from(2));
    assert!(matches!(eval_ok("if (false) { 1 }"), Value::Undefined));
}

#[test]
fn test_throw_reaches_error_continuation() {
    let exception = eval_err("throw 1;");
    assert_eq!(exception.value(), Some(Value::from(1)));
    assert!(matches!(exception.signal, Signal::Throw(_)));
}

#[test]
fn test_catch_binds_thrown_value() {
    assert_eq!(eval_ok("try { throw 41; } catch (e) { e + 1 }"), Value::from(42));
    assert_eq!(eval_ok("try { throw { code: 7 }; } catch ({ code }) { code }"), Value::from(7));
    assert_eq!(eval_ok("try { throw 1; } catch { 'swallowed' }"), Value::from("swallowed"));
}

#[test]
fn test_catch_receives_runtime_errors_as_objects() {
    let value = eval_ok("try { missing; } catch (e) { e }");
    assert_eq!(prop(&value, "name"), Value::from("ReferenceError"));

    let value = eval_ok("try { null.x; } catch (e) { e.name }");
    assert_eq!(value, Value::from("TypeError"));
}

#[test]
fn test_finally_runs_after_success_and_keeps_try_value() {
    assert_eq!(
        eval_ok("let log = []; let r = (function () { try { log[0] = 'try'; return 1; } finally { log[1] = 'finally'; } })(); log.length + r"),
        Value::from(3)
    );
    assert_eq!(eval_ok("try { 'block' } finally { 'finally' }"), Value::from("block"));
}

#[test]
fn test_finally_runs_after_throw() {
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let mark = FunctionRef::native("mark", move |_, _| {
        flag.set(true);
        Ok(Value::Undefined)
    });
    let context = Context::new(
        Environment::root([("mark", Value::Function(mark))]),
        EvaluationConfig::new(),
    );

    let outcome = run_in(&context, "try { throw 'boom'; } finally { mark(); }", None);
    assert!(ran.get());
    assert_eq!(outcome.unwrap_err().value(), Some(Value::from("boom")));
}

#[test]
fn test_catch_outcome_wins_over_finally_value() {
    assert_eq!(
        eval_ok("try { throw 1; } catch (e) { 'caught' } finally { 'finally' }"),
        Value::from("caught")
    );
}

#[test]
fn test_failure_in_finally_replaces_outcome() {
    let exception = eval_err("try { 1 } finally { throw 'late'; }");
    assert_eq!(exception.value(), Some(Value::from("late")));
}

#[test]
fn test_host_errors_are_catchable() {
    let fail = FunctionRef::native("fail", |_, _| Err(HostError::new("disk full")));
    let context = Context::new(
        Environment::root([("fail", Value::Function(fail))]),
        EvaluationConfig::new(),
    );
    let value = run_in(&context, "try { fail(); } catch (e) { e.message }", None).unwrap();
    assert_eq!(value, Value::from("disk full"));

    let outcome = run_in(&context, "fail()", None);
    assert!(matches!(outcome, Err(e) if matches!(e.signal, Signal::Host(_))));
}

#[test]
fn test_host_error_with_value_surfaces_as_that_value() {
    let fail = FunctionRef::native("fail", |_, _| Err(HostError::with_value(Value::from(13))));
    let context = Context::new(
        Environment::root([("fail", Value::Function(fail))]),
        EvaluationConfig::new(),
    );
    let value = run_in(&context, "try { fail(); } catch (e) { e }", None).unwrap();
    assert_eq!(value, Value::from(13));
}

#[test]
fn test_stray_break_is_an_error() {
    let exception = eval_err("break;");
    assert!(matches!(exception.signal, Signal::Break(None)));
    assert_eq!(exception.to_string().split(" (at").next(), Some("Illegal break statement"));
}

#[test]
fn test_stray_continue_is_an_error() {
    assert!(matches!(eval_err("continue;").signal, Signal::Continue(None)));
}

#[test]
fn test_aborted_evaluation_is_not_catchable() {
    let config = EvaluationConfig::new().with_interceptor(crate::interpreter::interceptor::step_budget(5));
    let context = Context::new(Environment::new(), config);
    let outcome = run_in(&context, "try { 1 + 2 + 3 + 4 } catch (e) { 'caught' }", None);
    assert!(matches!(outcome, Err(e) if matches!(e.signal, Signal::Aborted(_))));
}

#[test]
fn test_break_does_not_escape_a_function_body() {
    let exception = eval_err("var i = 0; while (i < 3) { i = i + 1; (function () { break; })(); } i");
    match exception.signal {
        Signal::TypeError(message) => assert_eq!(message, "Illegal break statement"),
        other => panic!("Expected TypeError, got {:?}", other),
    }

    let value = eval_ok(
        "let n = 0; while (n < 3) { n++; try { (() => { continue; })(); } catch (e) { } } n",
    );
    assert_eq!(value, Value::from(3));
}
