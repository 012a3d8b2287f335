//! Tests for class declarations

use super::helpers::{eval_err, eval_ok, prop};
use crate::interpreter::{Signal, Value};

#[test]
fn test_class_constructor_initializes_instance() {
    let value = eval_ok("class Point { constructor(x, y) { this.x = x; this.y = y; } } new Point(1, 2)");
    assert_eq!(prop(&value, "x"), Value::from(1));
    assert_eq!(prop(&value, "y"), Value::from(2));
}

#[test]
fn test_class_value_is_constructor() {
    let value = eval_ok("class Empty {}");
    assert!(matches!(value, Value::Function(_)));
    assert_eq!(prop(&value, "name"), Value::from("Empty"));
}

#[test]
fn test_class_without_constructor() {
    assert_eq!(eval_ok("class Empty {} new Empty() instanceof Empty"), Value::from(true));
}

#[test]
fn test_subclass_instances_are_superclass_instances() {
    let source = r#"
        class Animal {}
        class Dog extends Animal {
            constructor(name) { this.name = name; }
        }
        const d = new Dog('rex');
        (d instanceof Dog) + ',' + (d instanceof Animal) + ',' + d.name
    "#;
    assert_eq!(eval_ok(source), Value::from("true,true,rex"));
}

#[test]
fn test_prototype_members_are_inherited() {
    let source = r#"
        class Base {}
        Base.prototype.greet = function () { return 'hi ' + this.who; };
        class Child extends Base { constructor() { this.who = 'child'; } }
        new Child().greet()
    "#;
    assert_eq!(eval_ok(source), Value::from("hi child"));
}

#[test]
fn test_extending_a_non_function_is_type_error() {
    let exception = eval_err("const notAClass = 1; class X extends notAClass {}");
    assert!(matches!(exception.signal, Signal::TypeError(_)));
}

#[test]
fn test_class_methods_are_not_implemented() {
    let exception = eval_err("class A { method() {} }");
    match exception.signal {
        Signal::NotImplemented { node_type, .. } => assert_eq!(node_type, "MethodDefinition"),
        other => panic!("Expected NotImplemented, got {:?}", other),
    }
}

#[test]
fn test_class_binding_is_block_scoped() {
    assert!(matches!(eval_err("{ class Inner {} } Inner").signal, Signal::ReferenceError(_)));
}
