//! Tests for while, for-in and for-of loops

use super::helpers::{eval_err, eval_ok};
use crate::interpreter::{Signal, Value};

#[test]
fn test_while_simple_loop() {
    assert_eq!(eval_ok("let i = 0; while (i < 3) { i = i + 1; } i"), Value::from(3));
}

#[test]
fn test_while_zero_iterations() {
    assert_eq!(eval_ok("let i = 5; while (false) { i = 0; } i"), Value::from(5));
}

#[test]
fn test_loop_value_is_undefined() {
    assert!(matches!(eval_ok("let i = 0; while (i < 2) { i++; }"), Value::Undefined));
}

#[test]
fn test_while_with_break() {
    assert_eq!(
        eval_ok("let i = 0; while (true) { if (i >= 5) { break; } i = i + 1; } i"),
        Value::from(5)
    );
}

#[test]
fn test_while_with_continue() {
    assert_eq!(
        eval_ok("let i = 0; let sum = 0; while (i < 5) { i = i + 1; if (i == 3) { continue; } sum = sum + i; } sum"),
        Value::from(12)
    );
}

#[test]
fn test_nested_break_only_exits_inner_loop() {
    let source = r#"
        let outer = 0;
        let total = 0;
        while (outer < 3) {
            outer++;
            let inner = 0;
            while (true) {
                inner++;
                if (inner > 2) { break; }
                total++;
            }
        }
        total
    "#;
    assert_eq!(eval_ok(source), Value::from(6));
}

#[test]
fn test_many_iterations_do_not_overflow_the_stack() {
    assert_eq!(
        eval_ok("let i = 0; while (i < 2000) { i++; } i"),
        Value::from(2000)
    );
}

#[test]
fn test_for_in_visits_keys_in_insertion_order() {
    assert_eq!(
        eval_ok("let o = { b: 1, a: 2 }; let keys = ''; for (let k in o) { keys = keys + k; } keys"),
        Value::from("ba")
    );
    assert_eq!(
        eval_ok("let idx = ''; for (let i in ['x', 'y']) { idx = idx + i; } idx"),
        Value::from("01")
    );
}

#[test]
fn test_for_in_assigns_existing_binding() {
    assert_eq!(eval_ok("let k; for (k in { only: 1 }) {} k"), Value::from("only"));
}

#[test]
fn test_for_of_over_array() {
    assert_eq!(
        eval_ok("let sum = 0; for (const n of [1, 2, 3]) { sum += n; } sum"),
        Value::from(6)
    );
}

#[test]
fn test_for_of_closures_capture_their_iteration() {
    let source = r#"
        let fns = [];
        for (let i of [1, 2, 3]) {
            fns[fns.length] = () => i;
        }
        fns[0]() + fns[1]() * 10 + fns[2]() * 100
    "#;
    assert_eq!(eval_ok(source), Value::from(321));
}

#[test]
fn test_for_of_destructuring() {
    assert_eq!(
        eval_ok("let out = 0; for (const { v } of [{ v: 2 }, { v: 5 }]) { out += v; } out"),
        Value::from(7)
    );
}

#[test]
fn test_for_of_over_non_array_is_not_implemented() {
    let exception = eval_err("for (let c of 'abc') {}");
    assert!(matches!(exception.signal, Signal::NotImplemented { .. }));
}

#[test]
fn test_three_clause_for_is_not_implemented() {
    let exception = eval_err("for (let i = 0; i < 3; i++) {}");
    match exception.signal {
        Signal::NotImplemented { node_type, .. } => assert_eq!(node_type, "ForStatement"),
        other => panic!("Expected NotImplemented, got {:?}", other),
    }
}
