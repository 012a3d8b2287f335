//! Parser tests - verify parsing and AST structure
//!
//! These tests only check tree shape and locations; evaluation is covered by
//! the interpreter tests.

use crate::interpreter::parser::{parse, parse_function, ParseCache};
use crate::interpreter::types::ast::{
    AssignmentOperator, BinaryOperator, LiteralValue, LogicalOperator, MethodKind, VariableKind,
};
use crate::interpreter::types::{Node, NodeKind};
use std::rc::Rc;

fn statements(source: &str) -> Vec<Rc<Node>> {
    let program = parse(source).expect("Should parse");
    match &program.kind {
        NodeKind::Program { body } => body.clone(),
        other => panic!("Expected Program, got {:?}", other),
    }
}

fn expression(source: &str) -> Rc<Node> {
    let body = statements(source);
    match &body[0].kind {
        NodeKind::ExpressionStatement { expression } => expression.clone(),
        other => panic!("Expected ExpressionStatement, got {:?}", other),
    }
}

/* ===================== Literals ===================== */

#[test]
fn test_parse_number_literals() {
    for (source, expected) in [("42", 42.0), ("3.5", 3.5), ("0x1F", 31.0), ("1e3", 1000.0), (".5", 0.5)] {
        match &expression(source).kind {
            NodeKind::Literal {
                value: Some(LiteralValue::Number(n)),
                raw,
                ..
            } => {
                assert_eq!(*n, expected);
                assert_eq!(raw.as_deref(), Some(source));
            }
            other => panic!("Expected number literal for {}, got {:?}", source, other),
        }
    }
}

#[test]
fn test_parse_string_escapes() {
    match &expression(r#""a\tbA\x42\"""#).kind {
        NodeKind::Literal {
            value: Some(LiteralValue::String(s)),
            ..
        } => assert_eq!(s, "a\tbAB\""),
        other => panic!("Expected string literal, got {:?}", other),
    }
    match &expression("'it\\'s'").kind {
        NodeKind::Literal {
            value: Some(LiteralValue::String(s)),
            ..
        } => assert_eq!(s, "it's"),
        other => panic!("Expected string literal, got {:?}", other),
    }
}

#[test]
fn test_parse_keyword_literals() {
    assert!(matches!(
        expression("null").kind,
        NodeKind::Literal { value: None, .. }
    ));
    assert!(matches!(
        expression("true").kind,
        NodeKind::Literal {
            value: Some(LiteralValue::Boolean(true)),
            ..
        }
    ));
    // Keyword prefixes are ordinary identifiers
    assert!(matches!(
        &expression("nullish").kind,
        NodeKind::Identifier { name } if name == "nullish"
    ));
}

#[test]
fn test_parse_template_literal() {
    let NodeKind::TemplateLiteral { quasis, expressions } = &expression("`a${x}b${y}`").kind else {
        panic!("Expected TemplateLiteral");
    };
    assert_eq!(quasis.len(), 3);
    assert_eq!(expressions.len(), 2);
    assert!(matches!(
        &quasis[2].kind,
        NodeKind::TemplateElement { tail: true, .. }
    ));
    assert!(matches!(
        &quasis[0].kind,
        NodeKind::TemplateElement { value, tail: false } if value.cooked.as_deref() == Some("a")
    ));
}

#[test]
fn test_parse_array_holes() {
    let NodeKind::ArrayExpression { elements } = &expression("[1, , 3,]").kind else {
        panic!("Expected ArrayExpression");
    };
    assert_eq!(elements.len(), 3);
    assert!(elements[0].is_some());
    assert!(elements[1].is_none());
    assert!(elements[2].is_some());
}

#[test]
fn test_parse_object_literal() {
    let NodeKind::ObjectExpression { properties } =
        &expression("({a: 1, 'b': 2, [c]: 3, d, e() { return 1; }})").kind
    else {
        panic!("Expected ObjectExpression");
    };
    assert_eq!(properties.len(), 5);

    let flags: Vec<(bool, bool, bool)> = properties
        .iter()
        .map(|property| match &property.kind {
            NodeKind::Property {
                computed,
                shorthand,
                method,
                ..
            } => (*computed, *shorthand, *method),
            other => panic!("Expected Property, got {:?}", other),
        })
        .collect();
    assert_eq!(
        flags,
        vec![
            (false, false, false),
            (false, false, false),
            (true, false, false),
            (false, true, false),
            (false, false, true),
        ]
    );
}

/* ===================== Operators ===================== */

#[test]
fn test_parse_precedence() {
    let NodeKind::BinaryExpression { operator, right, .. } = &expression("1 + 2 * 3").kind else {
        panic!("Expected BinaryExpression");
    };
    assert_eq!(*operator, BinaryOperator::Add);
    assert!(matches!(
        &right.kind,
        NodeKind::BinaryExpression {
            operator: BinaryOperator::Mul,
            ..
        }
    ));
}

#[test]
fn test_parse_left_associative_chain() {
    let NodeKind::BinaryExpression { left, .. } = &expression("a - b - c").kind else {
        panic!("Expected BinaryExpression");
    };
    assert!(matches!(
        &left.kind,
        NodeKind::BinaryExpression {
            operator: BinaryOperator::Sub,
            ..
        }
    ));
}

#[test]
fn test_parse_exponent_is_right_associative() {
    let NodeKind::BinaryExpression { operator, right, .. } = &expression("2 ** 3 ** 2").kind else {
        panic!("Expected BinaryExpression");
    };
    assert_eq!(*operator, BinaryOperator::Exp);
    assert!(matches!(
        &right.kind,
        NodeKind::BinaryExpression {
            operator: BinaryOperator::Exp,
            ..
        }
    ));
}

#[test]
fn test_parse_logical_and_nullish() {
    assert!(matches!(
        expression("a ?? b").kind,
        NodeKind::LogicalExpression {
            operator: LogicalOperator::Nullish,
            ..
        }
    ));
    let NodeKind::LogicalExpression { operator, right, .. } = &expression("a || b && c").kind else {
        panic!("Expected LogicalExpression");
    };
    assert_eq!(*operator, LogicalOperator::Or);
    assert!(matches!(
        &right.kind,
        NodeKind::LogicalExpression {
            operator: LogicalOperator::And,
            ..
        }
    ));
}

#[test]
fn test_parse_shift_versus_relational() {
    assert!(matches!(
        expression("a << b").kind,
        NodeKind::BinaryExpression {
            operator: BinaryOperator::Shl,
            ..
        }
    ));
    assert!(matches!(
        expression("a <= b").kind,
        NodeKind::BinaryExpression {
            operator: BinaryOperator::LtEq,
            ..
        }
    ));
    assert!(matches!(
        expression("'a' in b").kind,
        NodeKind::BinaryExpression {
            operator: BinaryOperator::In,
            ..
        }
    ));
}

#[test]
fn test_parse_compound_assignment() {
    let NodeKind::AssignmentExpression { operator, left, .. } = &expression("a.b >>>= 2").kind else {
        panic!("Expected AssignmentExpression");
    };
    assert_eq!(*operator, AssignmentOperator::UShrAssign);
    assert!(matches!(left.kind, NodeKind::MemberExpression { .. }));
}

#[test]
fn test_parse_update_and_unary() {
    assert!(matches!(
        expression("x++").kind,
        NodeKind::UpdateExpression { prefix: false, .. }
    ));
    assert!(matches!(
        expression("--x").kind,
        NodeKind::UpdateExpression { prefix: true, .. }
    ));
    let NodeKind::UnaryExpression { argument, .. } = &expression("typeof -x").kind else {
        panic!("Expected UnaryExpression");
    };
    assert!(matches!(argument.kind, NodeKind::UnaryExpression { .. }));
}

#[test]
fn test_invalid_assignment_target_is_rejected() {
    let error = parse("1 = 2").unwrap_err();
    assert!(error.description.contains("Invalid assignment target"));
    assert!(parse("f()++").is_err());
}

/* ===================== Members & Calls ===================== */

#[test]
fn test_parse_member_chain() {
    let NodeKind::CallExpression { callee, arguments } = &expression("a.b[c](1, 2)").kind else {
        panic!("Expected CallExpression");
    };
    assert_eq!(arguments.len(), 2);
    let NodeKind::MemberExpression { object, computed, .. } = &callee.kind else {
        panic!("Expected MemberExpression");
    };
    assert!(*computed);
    assert!(matches!(
        object.kind,
        NodeKind::MemberExpression { computed: false, .. }
    ));
}

#[test]
fn test_parse_new_expression() {
    let NodeKind::MemberExpression { object, .. } = &expression("new a.B(1).c").kind else {
        panic!("Expected MemberExpression");
    };
    let NodeKind::NewExpression { callee, arguments } = &object.kind else {
        panic!("Expected NewExpression");
    };
    assert_eq!(arguments.len(), 1);
    assert!(matches!(callee.kind, NodeKind::MemberExpression { .. }));
}

#[test]
fn test_parse_reserved_word_as_property_name() {
    let NodeKind::MemberExpression { property, .. } = &expression("promise.catch").kind else {
        panic!("Expected MemberExpression");
    };
    assert_eq!(property.identifier_name(), Some("catch"));
}

/* ===================== Functions ===================== */

#[test]
fn test_parse_arrow_functions() {
    let NodeKind::ArrowFunctionExpression {
        params,
        expression: is_expression,
        ..
    } = &expression("(a, b = 1) => a + b").kind
    else {
        panic!("Expected ArrowFunctionExpression");
    };
    assert_eq!(params.len(), 2);
    assert!(*is_expression);
    assert!(matches!(params[1].kind, NodeKind::AssignmentPattern { .. }));

    assert!(matches!(
        expression("x => { return x; }").kind,
        NodeKind::ArrowFunctionExpression {
            expression: false,
            ..
        }
    ));
}

#[test]
fn test_parse_async_function_declaration() {
    let body = statements("async function load() {}");
    assert!(matches!(
        body[0].kind,
        NodeKind::FunctionDeclaration { is_async: true, .. }
    ));
    // `async` alone is an identifier
    assert!(matches!(
        &expression("async(1)").kind,
        NodeKind::CallExpression { .. }
    ));
}

#[test]
fn test_parse_function_source() {
    let function = parse_function("function add(a, b) { return a + b; }").expect("Should parse");
    let NodeKind::FunctionExpression { id, params, .. } = &function.kind else {
        panic!("Expected FunctionExpression, got {:?}", function.kind);
    };
    assert_eq!(id.as_ref().and_then(|id| id.identifier_name()), Some("add"));
    assert_eq!(params.len(), 2);

    assert!(parse_function("1 + 2").is_err());
}

#[test]
fn test_parse_class_declaration() {
    let body = statements("class B extends A { constructor(x) { this.x = x; } static make() {} }");
    let NodeKind::ClassDeclaration {
        id,
        super_class,
        body,
    } = &body[0].kind
    else {
        panic!("Expected ClassDeclaration");
    };
    assert_eq!(id.as_ref().and_then(|id| id.identifier_name()), Some("B"));
    assert!(super_class.is_some());

    let NodeKind::ClassBody { body: members } = &body.kind else {
        panic!("Expected ClassBody");
    };
    let kinds: Vec<(MethodKind, bool)> = members
        .iter()
        .map(|member| match &member.kind {
            NodeKind::MethodDefinition { kind, is_static, .. } => (*kind, *is_static),
            other => panic!("Expected MethodDefinition, got {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![(MethodKind::Constructor, false), (MethodKind::Method, true)]
    );
}

/* ===================== Statements ===================== */

#[test]
fn test_parse_variable_declaration_with_pattern() {
    let body = statements("const {a, b: c = 2} = obj, d;");
    let NodeKind::VariableDeclaration { declarations, kind } = &body[0].kind else {
        panic!("Expected VariableDeclaration");
    };
    assert_eq!(*kind, VariableKind::Const);
    assert_eq!(declarations.len(), 2);

    let NodeKind::VariableDeclarator { id, init } = &declarations[0].kind else {
        panic!("Expected VariableDeclarator");
    };
    assert!(init.is_some());
    let NodeKind::ObjectPattern { properties } = &id.kind else {
        panic!("Expected ObjectPattern");
    };
    assert!(matches!(
        &properties[0].kind,
        NodeKind::Property { shorthand: true, .. }
    ));
    assert!(matches!(
        &properties[1].kind,
        NodeKind::Property { value, .. } if matches!(value.kind, NodeKind::AssignmentPattern { .. })
    ));
}

#[test]
fn test_parse_loops() {
    let body = statements(
        "for (const k in o) {} for (x of xs) {} for (let i = 0; i < 3; i++) {} while (true) break;",
    );
    assert!(matches!(
        &body[0].kind,
        NodeKind::ForInStatement { left, .. } if matches!(left.kind, NodeKind::VariableDeclaration { .. })
    ));
    assert!(matches!(
        &body[1].kind,
        NodeKind::ForOfStatement { left, .. } if matches!(left.kind, NodeKind::Identifier { .. })
    ));
    assert!(matches!(
        &body[2].kind,
        NodeKind::ForStatement {
            init: Some(_),
            test: Some(_),
            update: Some(_),
            ..
        }
    ));
    assert!(matches!(
        &body[3].kind,
        NodeKind::WhileStatement { body, .. } if matches!(body.kind, NodeKind::BreakStatement { label: None })
    ));
}

#[test]
fn test_parse_try_statement() {
    let body = statements("try { a(); } catch (e) { b(); } finally { c(); }");
    assert!(matches!(
        &body[0].kind,
        NodeKind::TryStatement {
            handler: Some(_),
            finalizer: Some(_),
            ..
        }
    ));

    let body = statements("try {} catch { }");
    let NodeKind::TryStatement {
        handler: Some(handler),
        ..
    } = &body[0].kind
    else {
        panic!("Expected TryStatement with handler");
    };
    assert!(matches!(
        handler.kind,
        NodeKind::CatchClause { param: None, .. }
    ));

    assert!(parse("try {}").is_err());
}

#[test]
fn test_parse_if_else_chain() {
    let body = statements("if (a) b(); else if (c) d(); else e();");
    let NodeKind::IfStatement {
        alternate: Some(alternate),
        ..
    } = &body[0].kind
    else {
        panic!("Expected IfStatement with alternate");
    };
    assert!(matches!(
        alternate.kind,
        NodeKind::IfStatement {
            alternate: Some(_),
            ..
        }
    ));
}

#[test]
fn test_parse_comments_and_missing_semicolons() {
    let body = statements("// leading\nlet a = 1 /* inline */\nlet b = 2\n");
    assert_eq!(body.len(), 2);
}

/* ===================== Locations & Errors ===================== */

#[test]
fn test_nodes_carry_locations() {
    let body = statements("let a = 1;\n  foo(a);");
    let loc = body[1].loc.expect("Statement should have a location");
    assert_eq!(loc.start.line, 2);
    assert_eq!(loc.start.column, 2);

    let NodeKind::ExpressionStatement { expression } = &body[1].kind else {
        panic!("Expected ExpressionStatement");
    };
    let NodeKind::CallExpression { arguments, .. } = &expression.kind else {
        panic!("Expected CallExpression");
    };
    let argument = arguments[0].loc.expect("Argument should have a location");
    assert_eq!((argument.start.line, argument.start.column), (2, 6));
}

#[test]
fn test_parse_error_reports_position() {
    let error = parse("let a = 1;\nlet = ;").unwrap_err();
    assert_eq!(error.line, 2);
    assert!(!error.description.is_empty());
    assert!(error.to_string().starts_with("SyntaxError"));
}

#[test]
fn test_parse_cache_reuses_trees() {
    let cache = ParseCache::new();
    let first = cache.parse("1 + 1").unwrap();
    let second = cache.parse("1 + 1").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    assert!(cache.parse("1 +").is_err());
    assert_eq!(cache.len(), 1);
}
