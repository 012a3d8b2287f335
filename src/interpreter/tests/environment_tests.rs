//! Tests for lexical scoping, references and environment reuse

use super::helpers::{eval_err, eval_ok, run_in};
use crate::interpreter::{parse, Bindings, Context, Environment, EvaluationConfig, Signal, Value};
use maplit::hashmap;

#[test]
fn test_inner_block_binding_is_invisible_outside() {
    let exception = eval_err("{ let x = 1; } x");
    assert!(matches!(exception.signal, Signal::ReferenceError(ref name) if name == "x"));
}

#[test]
fn test_outer_binding_is_visible_inside() {
    assert_eq!(eval_ok("let x = 1; { x + 1 }"), Value::from(2));
}

#[test]
fn test_var_is_block_scoped() {
    let exception = eval_err("{ var y = 1; } y");
    assert!(matches!(exception.signal, Signal::ReferenceError(_)));
}

#[test]
fn test_shadowing_does_not_touch_outer_binding() {
    assert_eq!(eval_ok("let x = 1; { let x = 2; } x"), Value::from(1));
    assert_eq!(eval_ok("let x = 1; { x = 2; } x"), Value::from(2));
}

#[test]
fn test_assignment_to_undeclared_name_creates_nothing() {
    let env = Environment::new();
    let context = Context::new(env.clone(), EvaluationConfig::new());
    let outcome = run_in(&context, "ghost = 1", None);

    assert!(matches!(outcome, Err(e) if matches!(e.signal, Signal::ReferenceError(ref n) if n == "ghost")));
    assert!(env.get("ghost").is_none());
}

#[test]
fn test_error_location_is_innermost_node() {
    let exception = eval_err("1 +\n  missing");
    let location = exception.location.expect("location attached");
    assert_eq!(location.type_name(), "Identifier");
    assert_eq!(location.loc.map(|loc| loc.start.line), Some(2));
}

#[test]
fn test_parsed_node_is_reusable_across_environments() {
    let program = parse("x = x * 2; x").unwrap();
    let before = serde_json::to_value(&*program).unwrap();

    let first = Environment::root([("x", Value::from(2))]);
    let second = Environment::root([("x", Value::from(10))]);
    let context = Context::default();

    let a = run_in(&context, program.clone(), Some(Bindings::Environment(first.clone()))).unwrap();
    let b = run_in(&context, program.clone(), Some(Bindings::Environment(second.clone()))).unwrap();

    assert_eq!(a, Value::from(4));
    assert_eq!(b, Value::from(20));
    assert_eq!(first.get("x"), Some(Value::from(4)));
    assert_eq!(second.get("x"), Some(Value::from(20)));
    assert_eq!(serde_json::to_value(&*program).unwrap(), before);
}

#[test]
fn test_context_environment_persists_between_evaluations() {
    let context = Context::default();
    run_in(&context, "let counter = 1", None).unwrap();
    run_in(&context, "counter += 1", None).unwrap();
    assert_eq!(run_in(&context, "counter", None).unwrap(), Value::from(2));
}

#[test]
fn test_raw_bindings_do_not_leak() {
    let context = Context::default();
    let value = run_in(
        &context,
        "let inner = seed + 1; inner",
        Some(hashmap! { "seed".to_string() => Value::from(1) }.into()),
    )
    .unwrap();
    assert_eq!(value, Value::from(2));
    assert!(context.environment().get("inner").is_none());
    assert!(context.environment().get("seed").is_none());
}

#[test]
fn test_references_follow_reads_when_enabled() {
    let env = Environment::root([("a", Value::from(1))]);
    let context = Context::new(env.clone(), EvaluationConfig::new().with_references(true));
    let first = env.reference("a").unwrap();

    assert_eq!(run_in(&context, "a = a + 1; a", None).unwrap(), Value::from(2));
    let second = env.reference("a").unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.value(), Some(Value::from(2)));
}

#[test]
fn test_tags_survive_reassignment() {
    let env = Environment::root([("a", Value::from(1))]);
    env.set_tag("a", "origin", Value::from("host")).unwrap();
    let context = Context::new(env.clone(), EvaluationConfig::new());

    run_in(&context, "a = 2", None).unwrap();
    assert_eq!(env.get_tag("a", "origin"), Some(Value::from("host")));
    env.delete_tag("a", "origin");
    assert!(env.get_tag("a", "origin").is_none());
}
