//! Tests for literals, operators and program completion values

use super::helpers::{eval_err, eval_ok, prop, run_with};
use crate::interpreter::{Signal, Value};
use maplit::hashmap;

#[test]
fn test_number_literal() {
    assert_eq!(eval_ok("2"), Value::from(2));
}

#[test]
fn test_empty_program_is_undefined() {
    assert!(matches!(eval_ok(""), Value::Undefined));
    assert!(matches!(eval_ok(";"), Value::Undefined));
}

#[test]
fn test_program_value_is_last_statement() {
    assert_eq!(eval_ok("1; 'two'; 3 * 3"), Value::from(9));
    assert!(matches!(eval_ok("let a = 1"), Value::Undefined));
}

#[test]
fn test_literals() {
    assert_eq!(eval_ok("'single'"), Value::from("single"));
    assert_eq!(eval_ok("\"a\\tb\""), Value::from("a\tb"));
    assert_eq!(eval_ok("0x1F"), Value::from(31));
    assert_eq!(eval_ok("true"), Value::from(true));
    assert!(matches!(eval_ok("null"), Value::Null));
    assert!(matches!(eval_ok("undefined"), Value::Undefined));
    assert!(eval_ok("NaN").to_number().is_nan());
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(eval_ok("1 + 2 * 3"), Value::from(7));
    assert_eq!(eval_ok("(1 + 2) * 3"), Value::from(9));
    assert_eq!(eval_ok("2 ** 3 ** 2"), Value::from(512));
    assert_eq!(eval_ok("10 - 4 - 3"), Value::from(3));
    assert_eq!(eval_ok("7 % 4"), Value::from(3));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval_ok("'a' + 1 + 2"), Value::from("a12"));
    assert_eq!(eval_ok("1 + 2 + 'a'"), Value::from("3a"));
}

#[test]
fn test_equality() {
    assert_eq!(eval_ok("1 === 1"), Value::from(true));
    assert_eq!(eval_ok("'1' == 1"), Value::from(true));
    assert_eq!(eval_ok("'1' === 1"), Value::from(false));
    assert_eq!(eval_ok("null == undefined"), Value::from(true));
    assert_eq!(eval_ok("null !== undefined"), Value::from(true));
}

#[test]
fn test_logical_short_circuit() {
    assert_eq!(eval_ok("0 || 'fallback'"), Value::from("fallback"));
    assert_eq!(eval_ok("1 && 2"), Value::from(2));
    assert_eq!(eval_ok("null ?? 3"), Value::from(3));
    assert_eq!(eval_ok("0 ?? 3"), Value::from(0));
    // The right side would throw if it were evaluated
    assert_eq!(eval_ok("false && missing"), Value::from(false));
}

#[test]
fn test_unary_operators() {
    assert_eq!(eval_ok("-(3)"), Value::from(-3));
    assert_eq!(eval_ok("!0"), Value::from(true));
    assert_eq!(eval_ok("~5"), Value::from(-6));
    assert_eq!(eval_ok("typeof 'x'"), Value::from("string"));
    assert_eq!(eval_ok("typeof notDeclared"), Value::from("undefined"));
    assert!(matches!(eval_ok("void 1"), Value::Undefined));
}

#[test]
fn test_bitwise_and_shift() {
    assert_eq!(eval_ok("6 & 3"), Value::from(2));
    assert_eq!(eval_ok("6 | 3"), Value::from(7));
    assert_eq!(eval_ok("6 ^ 3"), Value::from(5));
    assert_eq!(eval_ok("1 << 4"), Value::from(16));
    assert_eq!(eval_ok("-16 >> 2"), Value::from(-4));
}

#[test]
fn test_conditional_expression() {
    assert_eq!(eval_ok("1 < 2 ? 'yes' : 'no'"), Value::from("yes"));
    assert_eq!(eval_ok("1 > 2 ? 'yes' : 'no'"), Value::from("no"));
}

#[test]
fn test_sequence_expression() {
    assert_eq!(eval_ok("let a = 0; (a = 1, a + 1)"), Value::from(2));
}

#[test]
fn test_template_literal() {
    assert_eq!(eval_ok("let n = 2; `n=${n}, next=${n + 1}!`"), Value::from("n=2, next=3!"));
    assert_eq!(eval_ok("`plain`"), Value::from("plain"));
}

#[test]
fn test_object_literal() {
    let value = eval_ok("let k = 'dyn'; ({ a: 1, 'b': 2, [k]: 3, k })");
    assert_eq!(prop(&value, "a"), Value::from(1));
    assert_eq!(prop(&value, "b"), Value::from(2));
    assert_eq!(prop(&value, "dyn"), Value::from(3));
    assert_eq!(prop(&value, "k"), Value::from("dyn"));
    assert_eq!(
        value.as_object().map(|o| o.keys()),
        Some(vec!["a".to_string(), "b".to_string(), "dyn".to_string(), "k".to_string()])
    );
}

#[test]
fn test_array_literal_with_holes() {
    let value = eval_ok("[1, , 3]");
    assert_eq!(prop(&value, "length"), Value::from(3));
    assert!(matches!(prop(&value, "1"), Value::Undefined));
    assert_eq!(prop(&value, "2"), Value::from(3));
}

#[test]
fn test_member_access() {
    assert_eq!(eval_ok("let o = { a: { b: [10, 20] } }; o.a.b[1]"), Value::from(20));
    assert_eq!(eval_ok("'hello'.length"), Value::from(5));
    assert_eq!(eval_ok("'hello'[1]"), Value::from("e"));
    assert!(matches!(eval_ok("({}).missing"), Value::Undefined));
}

#[test]
fn test_member_access_on_null_is_type_error() {
    let exception = eval_err("let o = null; o.x");
    assert!(matches!(exception.signal, Signal::TypeError(_)));
}

#[test]
fn test_computed_assignment_mutates_container() {
    let container = Value::object(Vec::<(String, Value)>::new());
    let result = run_with(
        "container[\"b\"] = 2",
        hashmap! { "container".to_string() => container.clone() },
    )
    .unwrap();
    assert_eq!(result, Value::from(2));
    assert_eq!(prop(&container, "b"), Value::from(2));
}

#[test]
fn test_compound_and_update_assignment() {
    assert_eq!(eval_ok("let x = 5; x += 2; x *= 3; x"), Value::from(21));
    assert_eq!(eval_ok("let x = 1; x++"), Value::from(1));
    assert_eq!(eval_ok("let x = 1; ++x"), Value::from(2));
    assert_eq!(eval_ok("let o = { n: 1 }; o.n--; o.n"), Value::from(0));
}

#[test]
fn test_array_length_assignment() {
    assert_eq!(eval_ok("let a = [1, 2, 3]; a.length = 1; a.length"), Value::from(1));
    assert_eq!(eval_ok("let a = []; a[2] = 'x'; a.length"), Value::from(3));
}

#[test]
fn test_delete_and_in() {
    assert_eq!(eval_ok("let o = { a: 1 }; delete o.a; 'a' in o"), Value::from(false));
    assert_eq!(eval_ok("'length' in [1]"), Value::from(true));
}

#[test]
fn test_regex_literal_is_not_implemented() {
    let node = r#"{"type":"Program","body":[{"type":"ExpressionStatement","expression":
        {"type":"Literal","value":null,"regex":{"pattern":"a","flags":"g"}}}]}"#;
    let node: crate::interpreter::Node = serde_json::from_str(node).unwrap();
    let context = crate::interpreter::Context::default();
    let outcome = super::helpers::run_in(&context, node, None);
    assert!(matches!(outcome, Err(e) if matches!(e.signal, Signal::NotImplemented { .. })));
}

#[test]
fn test_large_numbers_stringify_exactly() {
    assert_eq!(eval_ok("'' + 1e20"), Value::from("100000000000000000000"));
    assert_eq!(eval_ok("'' + (-9223372036854775808 * 4)"), Value::from("-36893488147419103000"));
    assert_eq!(eval_ok("'' + 1e21"), Value::from("1e+21"));
    assert_eq!(eval_ok("`${2 ** 53}`"), Value::from("9007199254740992"));
}

#[test]
fn test_array_length_and_index_writes_are_bounded() {
    let exception = eval_err("var a = []; a.length = 1e18; 1");
    match exception.signal {
        Signal::TypeError(message) => assert_eq!(message, "Invalid array length"),
        other => panic!("Expected TypeError, got {:?}", other),
    }
    assert!(matches!(eval_err("var a = []; a[4000000000] = 1;").signal, Signal::TypeError(_)));
    assert_eq!(
        eval_ok("var a = []; try { a.length = 1e18; } catch (e) { a[2] = 'ok'; } a.length"),
        Value::from(3)
    );
}

#[test]
fn test_cyclic_arrays_stringify_without_recursing() {
    assert_eq!(eval_ok("var a = []; a[0] = a; '' + a"), Value::from(""));
    assert_eq!(eval_ok("var a = [1, 2]; a[2] = a; `${a}`"), Value::from("1,2,"));
    assert!(matches!(eval_ok("var a = [1]; a[1] = a; +a"), Value::Number(n) if n.is_nan()));
}
