//! Expression handlers
//!
//! Expressions evaluate their operands left-to-right through their [`Frame`] and
//! continue with the produced value. Operator semantics live in
//! [`operators`](super::operators); this module only sequences evaluation.

use super::closure::{call_function, create_function};
use super::continuation::{Continuation, ErrorContinuation, SharedContinuation};
use super::dispatch::{evaluate_elements, Frame};
use super::environment::Environment;
use super::operators::{self, get_property, set_property};
use super::types::ast::{
    AssignmentOperator, BinaryOperator, LiteralValue, LogicalOperator, PropertyKind, UnaryOperator,
    UpdateOperator,
};
use super::types::values::format_number;
use super::types::{Exception, Node, NodeKind, ObjectRef, Signal, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Continuation receiving a member access target and its property key
type MemberContinuation = Box<dyn FnOnce(Value, String)>;

/* ===================== Names & Literals ===================== */

/// Names that resolve even when no scope binds them
fn global_constant(name: &str) -> Option<Value> {
    match name {
        "undefined" => Some(Value::Undefined),
        "NaN" => Some(Value::Number(f64::NAN)),
        "Infinity" => Some(Value::Number(f64::INFINITY)),
        _ => None,
    }
}

/// Evaluate Identifier
pub fn identifier(frame: Frame, name: &str, c: Continuation, cerr: ErrorContinuation) {
    match frame.env.get(name) {
        Some(value) => {
            if frame.config.use_references {
                match frame.env.reference(name) {
                    Ok(reference) => trace!(name, id = %reference.id, "reference"),
                    Err(signal) => return cerr(signal.into()),
                }
            }
            c(value)
        }
        None => match global_constant(name) {
            Some(value) => c(value),
            None => cerr(Signal::ReferenceError(name.to_string()).into()),
        },
    }
}

/// Evaluate Literal
pub fn literal(value: Option<&LiteralValue>, is_regex: bool, c: Continuation, cerr: ErrorContinuation) {
    if is_regex {
        return cerr(Signal::not_implemented("Literal", "regular expression literals").into());
    }
    match value {
        None => c(Value::Null),
        Some(LiteralValue::Boolean(b)) => c(Value::Boolean(*b)),
        Some(LiteralValue::Number(n)) => c(Value::Number(*n)),
        Some(LiteralValue::String(s)) => c(Value::String(s.clone())),
        Some(LiteralValue::Unsupported(raw)) => {
            cerr(Signal::not_implemented("Literal", format!("literal value {}", raw)).into())
        }
    }
}

/// Property name of a non-computed key (`a`, `"a"` or `1`)
pub(crate) fn static_key(key: &Node) -> Option<String> {
    match &key.kind {
        NodeKind::Identifier { name } => Some(name.clone()),
        NodeKind::Literal {
            value: Some(LiteralValue::String(s)),
            ..
        } => Some(s.clone()),
        NodeKind::Literal {
            value: Some(LiteralValue::Number(n)),
            ..
        } => Some(format_number(*n)),
        _ => None,
    }
}

/// Readable name of a callee for error messages
fn callee_name(node: &Node) -> String {
    match &node.kind {
        NodeKind::Identifier { name } => name.clone(),
        NodeKind::MemberExpression {
            object,
            property,
            computed: false,
        } => format!(
            "{}.{}",
            callee_name(object),
            property.identifier_name().unwrap_or("<property>")
        ),
        NodeKind::ThisExpression => "this".to_string(),
        _ => "expression".to_string(),
    }
}

/* ===================== Literals of Structure ===================== */

/// Evaluate ArrayExpression; holes become `undefined`
pub fn array_expression(frame: Frame, elements: &[Option<Rc<Node>>], c: Continuation, cerr: ErrorContinuation) {
    let elements = elements.to_vec();
    frame.visit_with(
        "elements",
        |c, cerr| {
            evaluate_elements(
                elements,
                &frame.env,
                &frame.config,
                Box::new(move |values| c(Value::array(values))),
                cerr,
            )
        },
        c,
        cerr,
    )
}

/// Evaluate ObjectExpression
pub fn object_expression(frame: Frame, properties: &[Rc<Node>], c: Continuation, cerr: ErrorContinuation) {
    let object = ObjectRef::new();
    let properties = Rc::new(properties.to_vec());
    frame.visit_with(
        "properties",
        |c, cerr| {
            let result = object.clone();
            define_properties(
                frame.clone(),
                object,
                properties,
                0,
                Box::new(move || c(Value::Object(result))),
                SharedContinuation::new(cerr),
            )
        },
        c,
        cerr,
    )
}

fn define_properties(
    frame: Frame,
    object: ObjectRef,
    properties: Rc<Vec<Rc<Node>>>,
    index: usize,
    done: Box<dyn FnOnce()>,
    cerr: SharedContinuation<Exception>,
) {
    let Some(property) = properties.get(index).cloned() else {
        return done();
    };
    let (next, next_object) = (frame.clone(), object.clone());
    let on_error = cerr.boxed();
    frame.evaluate_with(
        &property,
        |c, cerr| property_entry(&frame, &property, &object, c, cerr),
        Box::new(move |_| define_properties(next, next_object, properties, index + 1, done, cerr)),
        on_error,
    )
}

/// Evaluates one `key: value` entry into `object`; yields the value
fn property_entry(frame: &Frame, property: &Rc<Node>, object: &ObjectRef, c: Continuation, cerr: ErrorContinuation) {
    let NodeKind::Property {
        key,
        value,
        kind,
        computed,
        ..
    } = &property.kind
    else {
        return cerr(Signal::not_implemented(property.type_name(), "spread in object literals").into());
    };
    if *kind != PropertyKind::Init {
        return cerr(Signal::not_implemented("Property", "getters and setters").into());
    }

    let frame = Frame::new(property.clone(), frame.env.clone(), frame.config.clone());
    let cerr = SharedContinuation::new(cerr);
    let define = {
        let (frame, value, object, cerr) = (frame.clone(), value.clone(), object.clone(), cerr.clone());
        move |key: Value| {
            let key = key.to_property_key();
            frame.visit(
                "value",
                &value,
                Box::new(move |value| {
                    object.set(key, value.clone());
                    c(value)
                }),
                cerr.boxed(),
            )
        }
    };

    if *computed {
        return frame.visit("key", key, Box::new(define), cerr.boxed());
    }
    match static_key(key) {
        Some(name) => define(Value::String(name)),
        None => cerr.call(Exception::at(
            Signal::not_implemented(key.type_name(), "unsupported property key"),
            key,
        )),
    }
}

/// Evaluate FunctionExpression / ArrowFunctionExpression
pub fn function_expression(frame: Frame, c: Continuation, cerr: ErrorContinuation) {
    match create_function(&frame.node, &frame.env) {
        Ok(function) => c(Value::Function(function)),
        Err(signal) => cerr(signal.into()),
    }
}

/* ===================== Member Access ===================== */

/// Evaluates the `object` and `property` slots of a member access
///
/// A static key is reported as a node event for the key identifier whose exit
/// value is the key string.
fn member_parts(
    frame: &Frame,
    object: &Rc<Node>,
    property: &Rc<Node>,
    computed: bool,
    c: MemberContinuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (next, property, on_error) = (frame.clone(), property.clone(), cerr.clone());
    frame.visit(
        "object",
        object,
        Box::new(move |target| {
            let object = target.clone();
            member_key(
                &next,
                &object,
                &property,
                computed,
                Box::new(move |key| c(target, key.to_property_key())),
                on_error.boxed(),
            )
        }),
        cerr.boxed(),
    )
}

/// Produces the property key of a member access
///
/// A static name is not evaluated, but its node events still fire; the name's
/// exit event reports the value currently stored under it.
fn member_key(
    frame: &Frame,
    target: &Value,
    property: &Rc<Node>,
    computed: bool,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    if computed {
        return frame.visit("property", property, c, cerr);
    }
    let Some(name) = property.identifier_name().map(str::to_string) else {
        return cerr(Exception::at(
            Signal::not_implemented(property.type_name(), "unsupported member key"),
            property,
        ));
    };
    let current = get_property(target, &name).unwrap_or_default();
    frame.visit_with(
        "property",
        |c, cerr| {
            frame.evaluate_with(
                property,
                |c, _| c(current),
                Box::new(move |_| c(Value::String(name))),
                cerr,
            )
        },
        c,
        cerr,
    )
}

/// Evaluate MemberExpression
pub fn member_expression(
    frame: Frame,
    object: &Rc<Node>,
    property: &Rc<Node>,
    computed: bool,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let on_error = cerr.clone();
    member_parts(
        &frame,
        object,
        property,
        computed,
        Box::new(move |target, key| match get_property(&target, &key) {
            Ok(value) => c(value),
            Err(signal) => on_error.call(signal.into()),
        }),
        cerr.boxed(),
    )
}

/* ===================== Calls ===================== */

/// Evaluates the callee slot; member callees also yield their object as `this`
fn evaluate_callee(frame: &Frame, callee: &Rc<Node>, c: Box<dyn FnOnce(Value, Value)>, cerr: ErrorContinuation) {
    let NodeKind::MemberExpression {
        object,
        property,
        computed,
    } = &callee.kind
    else {
        return frame.visit(
            "callee",
            callee,
            Box::new(move |function| c(Value::Undefined, function)),
            cerr,
        );
    };

    let this = Rc::new(RefCell::new(Value::Undefined));
    let slot = this.clone();
    frame.visit_with(
        "callee",
        |c, cerr| {
            frame.evaluate_with(
                callee,
                |c, cerr| {
                    let member = Frame::new(callee.clone(), frame.env.clone(), frame.config.clone());
                    let cerr = SharedContinuation::new(cerr);
                    let on_error = cerr.clone();
                    member_parts(
                        &member,
                        object,
                        property,
                        *computed,
                        Box::new(move |target, key| match get_property(&target, &key) {
                            Ok(function) => {
                                slot.replace(target);
                                c(function)
                            }
                            Err(signal) => on_error.call(signal.into()),
                        }),
                        cerr.boxed(),
                    )
                },
                c,
                cerr,
            )
        },
        Box::new(move |function| c(this.take(), function)),
        cerr,
    )
}

/// Evaluate CallExpression
pub fn call_expression(
    frame: Frame,
    callee: &Rc<Node>,
    arguments: &[Rc<Node>],
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (next, arguments, callee_node, on_error) =
        (frame.clone(), arguments.to_vec(), callee.clone(), cerr.clone());
    evaluate_callee(
        &frame,
        callee,
        Box::new(move |this, function| {
            let (config, failed) = (next.config.clone(), on_error.clone());
            next.visit_all(
                "arguments",
                &arguments,
                Box::new(move |args| match function {
                    Value::Function(function) => call_function(&function, this, args, &config, c, failed.boxed()),
                    _ => failed.call(
                        Signal::TypeError(format!("{} is not a function", callee_name(&callee_node))).into(),
                    ),
                }),
                on_error.boxed(),
            )
        }),
        cerr.boxed(),
    )
}

/// Evaluate NewExpression
///
/// The instance inherits from the constructor's `prototype`; an object returned
/// by the constructor replaces it.
pub fn new_expression(
    frame: Frame,
    callee: &Rc<Node>,
    arguments: &[Rc<Node>],
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (next, arguments, callee_node, on_error) =
        (frame.clone(), arguments.to_vec(), callee.clone(), cerr.clone());
    frame.visit(
        "callee",
        callee,
        Box::new(move |constructor| {
            let constructor = match constructor {
                Value::Function(function) if !function.as_closure().is_some_and(|closure| closure.is_arrow) => function,
                _ => {
                    return on_error.call(
                        Signal::TypeError(format!("{} is not a constructor", callee_name(&callee_node))).into(),
                    )
                }
            };
            let (config, failed) = (next.config.clone(), on_error.clone());
            next.visit_all(
                "arguments",
                &arguments,
                Box::new(move |args| {
                    let instance = ObjectRef::with_prototype(Some(constructor.prototype_object()));
                    call_function(
                        &constructor,
                        Value::Object(instance.clone()),
                        args,
                        &config,
                        Box::new(move |result| match result {
                            Value::Object(_) | Value::Array(_) | Value::Function(_) => c(result),
                            _ => c(Value::Object(instance)),
                        }),
                        failed.boxed(),
                    )
                }),
                on_error.boxed(),
            )
        }),
        cerr.boxed(),
    )
}

/* ===================== Assignment ===================== */

/// Evaluate AssignmentExpression: right side first, then the target
pub fn assignment_expression(
    frame: Frame,
    operator: AssignmentOperator,
    left: &Rc<Node>,
    right: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (next, left, on_error) = (frame.clone(), left.clone(), cerr.clone());
    frame.visit(
        "right",
        right,
        Box::new(move |value| {
            next.visit_with(
                "left",
                |c, cerr| assign_target(&next, &left, operator, value, c, cerr),
                c,
                on_error.boxed(),
            )
        }),
        cerr.boxed(),
    )
}

fn assign_target(
    frame: &Frame,
    target: &Rc<Node>,
    operator: AssignmentOperator,
    value: Value,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    match &target.kind {
        NodeKind::Identifier { name } => frame.evaluate_with(
            target,
            |c, cerr| match assign_identifier(&frame.env, name, operator, value) {
                Ok(value) => c(value),
                Err(signal) => cerr(signal.into()),
            },
            c,
            cerr,
        ),
        NodeKind::MemberExpression {
            object,
            property,
            computed,
        } => {
            let cerr = SharedContinuation::new(cerr);
            let on_error = cerr.clone();
            member_parts(
                frame,
                object,
                property,
                *computed,
                Box::new(move |object, key| match assign_member(&object, &key, operator, value) {
                    Ok(value) => c(value),
                    Err(signal) => on_error.call(signal.into()),
                }),
                cerr.boxed(),
            )
        }
        _ => cerr(Exception::at(
            Signal::not_implemented(
                target.type_name(),
                format!("assignment to {} is not supported", target.type_name()),
            ),
            target,
        )),
    }
}

fn assign_identifier(
    env: &Environment,
    name: &str,
    operator: AssignmentOperator,
    value: Value,
) -> Result<Value, Signal> {
    let value = match operator.binary() {
        None => value,
        Some(binary) => operators::binary(binary, &env.lookup(name)?, &value)?,
    };
    env.assign(name, value.clone())?;
    Ok(value)
}

fn assign_member(object: &Value, key: &str, operator: AssignmentOperator, value: Value) -> Result<Value, Signal> {
    let value = match operator.binary() {
        None => value,
        Some(binary) => operators::binary(binary, &get_property(object, key)?, &value)?,
    };
    set_property(object, key, value.clone())?;
    Ok(value)
}

/// Evaluate UpdateExpression (`++`/`--`, prefix and postfix)
pub fn update_expression(
    frame: Frame,
    operator: UpdateOperator,
    argument: &Rc<Node>,
    prefix: bool,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let delta = match operator {
        UpdateOperator::Increment => 1.0,
        UpdateOperator::Decrement => -1.0,
    };
    let step = move |old: Value| {
        let old = old.to_number();
        let new = old + delta;
        (Value::Number(new), Value::Number(if prefix { new } else { old }))
    };

    frame.visit_with(
        "argument",
        |c, cerr| match &argument.kind {
            NodeKind::Identifier { name } => frame.evaluate_with(
                argument,
                |c, cerr| {
                    let updated = frame.env.lookup(name).and_then(|old| {
                        let (new, result) = step(old);
                        frame.env.assign(name, new)?;
                        Ok(result)
                    });
                    match updated {
                        Ok(result) => c(result),
                        Err(signal) => cerr(signal.into()),
                    }
                },
                c,
                cerr,
            ),
            NodeKind::MemberExpression {
                object,
                property,
                computed,
            } => {
                let cerr = SharedContinuation::new(cerr);
                let on_error = cerr.clone();
                member_parts(
                    &frame,
                    object,
                    property,
                    *computed,
                    Box::new(move |object, key| {
                        let updated = get_property(&object, &key).and_then(|old| {
                            let (new, result) = step(old);
                            set_property(&object, &key, new)?;
                            Ok(result)
                        });
                        match updated {
                            Ok(result) => c(result),
                            Err(signal) => on_error.call(signal.into()),
                        }
                    }),
                    cerr.boxed(),
                )
            }
            _ => cerr(Exception::at(
                Signal::not_implemented(argument.type_name(), "invalid update target"),
                argument,
            )),
        },
        c,
        cerr,
    )
}

/* ===================== Operators ===================== */

/// Evaluate UnaryExpression
///
/// `typeof` of an unbound name is `"undefined"`; `delete` removes a property.
pub fn unary_expression(
    frame: Frame,
    operator: UnaryOperator,
    argument: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    if operator == UnaryOperator::TypeOf {
        if let Some(name) = argument.identifier_name() {
            if frame.env.get(name).is_none() && global_constant(name).is_none() {
                return c(Value::string("undefined"));
            }
        }
    }

    if operator == UnaryOperator::Delete {
        if let NodeKind::MemberExpression {
            object,
            property,
            computed,
        } = &argument.kind
        {
            return frame.visit_with(
                "argument",
                |c, cerr| {
                    let cerr = SharedContinuation::new(cerr);
                    let on_error = cerr.clone();
                    member_parts(
                        &frame,
                        object,
                        property,
                        *computed,
                        Box::new(move |object, key| match operators::delete_property(&object, &key) {
                            Ok(deleted) => c(Value::Boolean(deleted)),
                            Err(signal) => on_error.call(signal.into()),
                        }),
                        cerr.boxed(),
                    )
                },
                c,
                cerr,
            );
        }
    }

    frame.visit(
        "argument",
        argument,
        Box::new(move |value| c(operators::unary(operator, &value))),
        cerr,
    )
}

/// Evaluate BinaryExpression
pub fn binary_expression(
    frame: Frame,
    operator: BinaryOperator,
    left: &Rc<Node>,
    right: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (next, right, on_error) = (frame.clone(), right.clone(), cerr.clone());
    frame.visit(
        "left",
        left,
        Box::new(move |lhs| {
            let failed = on_error.clone();
            next.visit(
                "right",
                &right,
                Box::new(move |rhs| match operators::binary(operator, &lhs, &rhs) {
                    Ok(value) => c(value),
                    Err(signal) => failed.call(signal.into()),
                }),
                on_error.boxed(),
            )
        }),
        cerr.boxed(),
    )
}

/// Evaluate LogicalExpression; the right operand is skipped when the left decides
pub fn logical_expression(
    frame: Frame,
    operator: LogicalOperator,
    left: &Rc<Node>,
    right: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (next, right, on_error) = (frame.clone(), right.clone(), cerr.clone());
    frame.visit(
        "left",
        left,
        Box::new(move |lhs| {
            let decided = match operator {
                LogicalOperator::And => !lhs.is_truthy(),
                LogicalOperator::Or => lhs.is_truthy(),
                LogicalOperator::Nullish => !lhs.is_nullish(),
            };
            if decided {
                c(lhs)
            } else {
                next.visit("right", &right, c, on_error.boxed())
            }
        }),
        cerr.boxed(),
    )
}

/// Evaluate SequenceExpression; yields the last value
pub fn sequence_expression(frame: Frame, expressions: &[Rc<Node>], c: Continuation, cerr: ErrorContinuation) {
    frame.visit_all(
        "expressions",
        expressions,
        Box::new(move |mut values| c(values.pop().unwrap_or_default())),
        cerr,
    )
}

/// Evaluate TemplateLiteral: cooked strands interleaved with stringified values
pub fn template_literal(
    frame: Frame,
    quasis: &[Rc<Node>],
    expressions: &[Rc<Node>],
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let strands: Vec<String> = quasis
        .iter()
        .map(|quasi| match &quasi.kind {
            NodeKind::TemplateElement { value, .. } => value.cooked.clone().unwrap_or_else(|| value.raw.clone()),
            _ => String::new(),
        })
        .collect();
    frame.visit_all(
        "expressions",
        expressions,
        Box::new(move |values| {
            let mut text = String::new();
            for (index, strand) in strands.iter().enumerate() {
                text.push_str(strand);
                if let Some(value) = values.get(index) {
                    text.push_str(&value.to_string());
                }
            }
            c(Value::String(text))
        }),
        cerr,
    )
}
