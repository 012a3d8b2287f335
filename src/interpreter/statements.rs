//! Statement handlers
//!
//! Each statement type has its own handler. Handlers evaluate the children they
//! need left-to-right through their [`Frame`], then either continue or forward a
//! signal. Loops absorb unlabeled `Break`/`Continue`, try statements absorb the
//! catchable signals, and everything else passes signals through untouched.

use super::closure::create_function;
use super::continuation::{Continuation, ErrorContinuation, SharedContinuation};
use super::dispatch::Frame;
use super::expressions::static_key;
use super::operators::{enumerable_keys, get_property};
use super::types::ast::MethodKind;
use super::types::{Exception, FunctionRef, Node, NodeKind, Signal, Value};
use std::rc::Rc;
use tracing::debug;

/* ===================== Program & Blocks ===================== */

/// Execute Program: runs in the given environment, no new scope
pub fn program(frame: Frame, body: &[Rc<Node>], c: Continuation, cerr: ErrorContinuation) {
    if let Err(exception) = hoist_declarations(body, &frame) {
        return cerr(exception);
    }
    frame.visit_all(
        "body",
        body,
        Box::new(move |mut values| c(values.pop().unwrap_or_default())),
        cerr,
    )
}

/// Execute BlockStatement in a fresh child scope
pub fn block_statement(frame: Frame, body: &[Rc<Node>], c: Continuation, cerr: ErrorContinuation) {
    let frame = frame.with_env(frame.env.child());
    program(frame, body, c, cerr)
}

/// Binds every function declaration of a block before any statement runs
fn hoist_declarations(body: &[Rc<Node>], frame: &Frame) -> Result<(), Exception> {
    for statement in body {
        let NodeKind::FunctionDeclaration { id: Some(id), .. } = &statement.kind else {
            continue;
        };
        let Some(name) = id.identifier_name() else {
            continue;
        };
        let function = create_function(statement, &frame.env).map_err(|s| Exception::at(s, statement))?;
        frame.env.declare(name, Value::Function(function));
    }
    Ok(())
}

/// Execute FunctionDeclaration
///
/// The binding already happened during hoisting; this yields the hoisted
/// function when it belongs to this node, and a fresh one otherwise.
pub fn function_declaration(frame: Frame, c: Continuation, cerr: ErrorContinuation) {
    if let NodeKind::FunctionDeclaration { id: Some(id), .. } = &frame.node.kind {
        let hoisted = id.identifier_name().and_then(|name| frame.env.get_own(name));
        if let Some(Value::Function(function)) = hoisted {
            if function
                .as_closure()
                .is_some_and(|closure| Rc::ptr_eq(&closure.node, &frame.node))
            {
                return c(Value::Function(function));
            }
        }
    }
    match create_function(&frame.node, &frame.env) {
        Ok(function) => c(Value::Function(function)),
        Err(signal) => cerr(signal.into()),
    }
}

pub fn expression_statement(frame: Frame, expression: &Rc<Node>, c: Continuation, cerr: ErrorContinuation) {
    frame.visit("expression", expression, c, cerr)
}

pub fn debugger_statement(frame: Frame, c: Continuation) {
    debug!(
        line = frame.node.loc.map(|loc| loc.start.line),
        "debugger statement reached"
    );
    c(Value::Undefined)
}

/* ===================== Declarations ===================== */

/// Execute VariableDeclaration; yields `undefined`
///
/// `var`, `let` and `const` all bind in the current scope.
pub fn variable_declaration(frame: Frame, declarations: &[Rc<Node>], c: Continuation, cerr: ErrorContinuation) {
    frame.visit_all(
        "declarations",
        declarations,
        Box::new(move |_| c(Value::Undefined)),
        cerr,
    )
}

pub fn variable_declarator(
    frame: Frame,
    id: &Rc<Node>,
    init: Option<&Rc<Node>>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let bind = {
        let (frame, id, cerr) = (frame.clone(), id.clone(), cerr.clone());
        move |value: Value| {
            bind_pattern(
                &frame,
                &id,
                value,
                Box::new(move |_| c(Value::Undefined)),
                cerr.boxed(),
            )
        }
    };
    match init {
        Some(init) => frame.visit("init", init, Box::new(bind), cerr.boxed()),
        None => bind(Value::Undefined),
    }
}

/// Declares the names of `target` in the frame's environment
///
/// Supports identifiers, object patterns (nested) and defaults. A default
/// is evaluated only when the incoming value is `undefined`.
pub fn bind_pattern(frame: &Frame, target: &Rc<Node>, value: Value, c: Continuation, cerr: ErrorContinuation) {
    match &target.kind {
        NodeKind::Identifier { name } => {
            frame.env.declare(name.clone(), value.clone());
            c(value)
        }
        NodeKind::AssignmentPattern { left, right } => {
            if !matches!(value, Value::Undefined) {
                return bind_pattern(frame, left, value, c, cerr);
            }
            let cerr = SharedContinuation::new(cerr);
            let (next, left, on_error) = (frame.clone(), left.clone(), cerr.clone());
            frame.dispatch(
                right,
                Box::new(move |default| bind_pattern(&next, &left, default, c, on_error.boxed())),
                cerr.boxed(),
            )
        }
        NodeKind::ObjectPattern { .. } => {
            if value.is_nullish() {
                let signal = Signal::TypeError(format!("Cannot destructure '{}' as it is {}.", value, value));
                return cerr(Exception::at(signal, target));
            }
            bind_properties(
                frame.clone(),
                target.clone(),
                0,
                value,
                c,
                SharedContinuation::new(cerr),
            )
        }
        _ => cerr(Exception::at(
            Signal::not_implemented(target.type_name(), "unsupported binding target"),
            target,
        )),
    }
}

fn bind_properties(
    frame: Frame,
    pattern: Rc<Node>,
    index: usize,
    source: Value,
    c: Continuation,
    cerr: SharedContinuation<Exception>,
) {
    let property = match &pattern.kind {
        NodeKind::ObjectPattern { properties } => properties.get(index).cloned(),
        _ => None,
    };
    let Some(property) = property else {
        return c(source);
    };
    let NodeKind::Property {
        key,
        value: target,
        computed,
        ..
    } = &property.kind
    else {
        let signal = Signal::not_implemented(property.type_name(), "only plain properties are supported in object patterns");
        return cerr.call(Exception::at(signal, &property));
    };

    let name = match static_key(key) {
        Some(name) if !*computed => name,
        _ => {
            let signal = Signal::not_implemented(
                key.type_name(),
                format!("property key of '{}' type is not supported in patterns", key.type_name()),
            );
            return cerr.call(Exception::at(signal, key));
        }
    };
    let item = match get_property(&source, &name) {
        Ok(item) => item,
        Err(signal) => return cerr.call(Exception::at(signal, &property)),
    };

    let target = target.clone();
    let next = frame.clone();
    let on_error = cerr.boxed();
    bind_pattern(
        &frame,
        &target,
        item,
        Box::new(move |_| bind_properties(next, pattern, index + 1, source, c, cerr)),
        on_error,
    )
}

/// Standalone default: evaluates the default and declares the target
pub fn assignment_pattern(frame: Frame, left: &Rc<Node>, right: &Rc<Node>, c: Continuation, cerr: ErrorContinuation) {
    let Some(name) = left.identifier_name().map(str::to_string) else {
        let signal = Signal::not_implemented(
            left.type_name(),
            format!("{} is not supported as a default target", left.type_name()),
        );
        return cerr(Exception::at(signal, left));
    };
    let env = frame.env.clone();
    frame.visit(
        "right",
        right,
        Box::new(move |value| {
            env.declare(name, value.clone());
            c(value)
        }),
        cerr,
    )
}

/* ===================== Conditionals ===================== */

/// Execute IfStatement (also serves ConditionalExpression)
///
/// The test is evaluated once; a falsy test without alternate yields `undefined`.
pub fn if_statement(
    frame: Frame,
    test: &Rc<Node>,
    consequent: &Rc<Node>,
    alternate: Option<&Rc<Node>>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let cerr = SharedContinuation::new(cerr);
    let (branch, consequent, alternate, on_error) =
        (frame.clone(), consequent.clone(), alternate.cloned(), cerr.clone());
    frame.visit(
        "test",
        test,
        Box::new(move |test| {
            if test.is_truthy() {
                branch.visit("consequent", &consequent, c, on_error.boxed())
            } else if let Some(alternate) = alternate {
                branch.visit("alternate", &alternate, c, on_error.boxed())
            } else {
                c(Value::Undefined)
            }
        }),
        cerr.boxed(),
    )
}

/* ===================== Loops ===================== */

/// Execute WhileStatement
pub fn while_statement(frame: Frame, test: &Rc<Node>, body: &Rc<Node>, c: Continuation, cerr: ErrorContinuation) {
    while_iteration(
        frame,
        test.clone(),
        body.clone(),
        SharedContinuation::new(c),
        SharedContinuation::new(cerr),
    )
}

fn while_iteration(
    frame: Frame,
    test: Rc<Node>,
    body: Rc<Node>,
    done: SharedContinuation<Value>,
    cerr: SharedContinuation<Exception>,
) {
    let on_error = cerr.boxed();
    let next = frame.clone();
    frame.visit(
        "test",
        &test.clone(),
        Box::new(move |value| {
            if !value.is_truthy() {
                return done.call(Value::Undefined);
            }
            let again = {
                let (frame, test, body, done, cerr) =
                    (next.clone(), test.clone(), body.clone(), done.clone(), cerr.clone());
                SharedContinuation::new(
                    Box::new(move |()| while_iteration(frame, test, body, done, cerr)) as Box<dyn FnOnce(())>
                )
            };
            loop_body(&next, &body, again, done, cerr)
        }),
        on_error,
    )
}

/// Runs one loop body; `Break` ends the loop, `Continue` and success start the next round
fn loop_body(
    frame: &Frame,
    body: &Rc<Node>,
    next: SharedContinuation<()>,
    done: SharedContinuation<Value>,
    cerr: SharedContinuation<Exception>,
) {
    let proceed = next.clone();
    frame.visit(
        "body",
        body,
        Box::new(move |_| proceed.call(())),
        Box::new(move |exception: Exception| {
            if matches!(exception.signal, Signal::Break(None)) {
                done.call(Value::Undefined)
            } else if matches!(exception.signal, Signal::Continue(None)) {
                next.call(())
            } else {
                cerr.call(exception)
            }
        }),
    )
}

/// Left-hand side of a for-in/for-of loop
enum LoopTarget {
    /// `for (x in ...)`: assigns an existing binding
    Assign(String),
    /// `for (let x of ...)`: declares in a fresh scope per iteration
    Declare(Rc<Node>),
}

fn loop_target(left: &Rc<Node>) -> Result<LoopTarget, Signal> {
    match &left.kind {
        NodeKind::Identifier { name } => Ok(LoopTarget::Assign(name.clone())),
        NodeKind::VariableDeclaration { declarations, .. } => match declarations.as_slice() {
            [declarator] => match &declarator.kind {
                NodeKind::VariableDeclarator { id, init: None } => Ok(LoopTarget::Declare(id.clone())),
                _ => Err(Signal::not_implemented(
                    declarator.type_name(),
                    "loop variable initializers are not supported",
                )),
            },
            _ => Err(Signal::not_implemented(
                left.type_name(),
                "loops declare exactly one variable",
            )),
        },
        _ => Err(Signal::not_implemented(
            left.type_name(),
            format!("left-hand side of type {} in loops is not supported", left.type_name()),
        )),
    }
}

fn bind_loop_target(
    frame: &Frame,
    target: &LoopTarget,
    value: Value,
    then: Box<dyn FnOnce(Frame)>,
    cerr: ErrorContinuation,
) {
    match target {
        LoopTarget::Assign(name) => match frame.env.assign(name, value) {
            Ok(()) => then(frame.clone()),
            Err(signal) => cerr(Exception::at(signal, &frame.node)),
        },
        LoopTarget::Declare(pattern) => {
            let scope = frame.with_env(frame.env.child());
            let body_scope = scope.clone();
            bind_pattern(&scope, pattern, value, Box::new(move |_| then(body_scope)), cerr)
        }
    }
}

fn iterate(
    frame: Frame,
    target: Rc<LoopTarget>,
    body: Rc<Node>,
    items: Rc<Vec<Value>>,
    index: usize,
    done: SharedContinuation<Value>,
    cerr: SharedContinuation<Exception>,
) {
    let Some(item) = items.get(index).cloned() else {
        return done.call(Value::Undefined);
    };
    let next = {
        let (frame, target, body, items, done, cerr) = (
            frame.clone(),
            target.clone(),
            body.clone(),
            items.clone(),
            done.clone(),
            cerr.clone(),
        );
        SharedContinuation::new(Box::new(move |()| {
            iterate(frame, target, body, items, index + 1, done, cerr)
        }) as Box<dyn FnOnce(())>)
    };
    let on_error = cerr.boxed();
    bind_loop_target(
        &frame,
        &target,
        item,
        Box::new(move |scope| loop_body(&scope, &body, next, done, cerr)),
        on_error,
    )
}

/// Execute ForInStatement over own keys of objects, indices of arrays and strings
pub fn for_in_statement(
    frame: Frame,
    left: &Rc<Node>,
    right: &Rc<Node>,
    body: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let target = match loop_target(left) {
        Ok(target) => Rc::new(target),
        Err(signal) => return cerr(Exception::at(signal, left)),
    };
    let cerr = SharedContinuation::new(cerr);
    let (next, body, on_error) = (frame.clone(), body.clone(), cerr.clone());
    frame.visit(
        "right",
        right,
        Box::new(move |collection| {
            let keys: Vec<Value> = enumerable_keys(&collection).into_iter().map(Value::String).collect();
            iterate(next, target, body, Rc::new(keys), 0, SharedContinuation::new(c), on_error)
        }),
        cerr.boxed(),
    )
}

/// Execute ForOfStatement over a snapshot of an array
pub fn for_of_statement(
    frame: Frame,
    left: &Rc<Node>,
    right: &Rc<Node>,
    body: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let target = match loop_target(left) {
        Ok(target) => Rc::new(target),
        Err(signal) => return cerr(Exception::at(signal, left)),
    };
    let cerr = SharedContinuation::new(cerr);
    let (next, body, right_node, on_error) = (frame.clone(), body.clone(), right.clone(), cerr.clone());
    frame.visit(
        "right",
        right,
        Box::new(move |collection| match collection {
            Value::Array(items) => iterate(
                next,
                target,
                body,
                Rc::new(items.to_vec()),
                0,
                SharedContinuation::new(c),
                on_error,
            ),
            _ => on_error.call(Exception::at(
                Signal::not_implemented("ForOfStatement", "only arrays can be iterated with for-of"),
                &right_node,
            )),
        }),
        cerr.boxed(),
    )
}

/* ===================== Completions ===================== */

/// Execute ReturnStatement: hands the value to the function boundary
pub fn return_statement(frame: Frame, argument: Option<&Rc<Node>>, cerr: ErrorContinuation) {
    match argument {
        None => cerr(Signal::Return(Value::Undefined).into()),
        Some(argument) => {
            let cerr = SharedContinuation::new(cerr);
            let signal = cerr.clone();
            frame.visit(
                "argument",
                argument,
                Box::new(move |value| signal.call(Signal::Return(value).into())),
                cerr.boxed(),
            )
        }
    }
}

pub fn throw_statement(frame: Frame, argument: &Rc<Node>, cerr: ErrorContinuation) {
    let cerr = SharedContinuation::new(cerr);
    let signal = cerr.clone();
    frame.visit(
        "argument",
        argument,
        Box::new(move |value| signal.call(Signal::Throw(value).into())),
        cerr.boxed(),
    )
}

/* ===================== Try / Catch ===================== */

/// Execute TryStatement
///
/// Catchable failures of the block run the handler in a scope whose exception
/// slot holds the caught value. The finalizer runs on every path; its own
/// failure replaces the outcome, otherwise the block/handler outcome is kept.
pub fn try_statement(
    frame: Frame,
    block: &Rc<Node>,
    handler: Option<&Rc<Node>>,
    finalizer: Option<&Rc<Node>>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let finish: SharedContinuation<Result<Value, Exception>> = {
        let (frame, finalizer) = (frame.clone(), finalizer.cloned());
        SharedContinuation::new(Box::new(move |outcome: Result<Value, Exception>| match finalizer {
            None => match outcome {
                Ok(value) => c(value),
                Err(exception) => cerr(exception),
            },
            Some(finalizer) => {
                let fail = SharedContinuation::new(cerr);
                let forward = fail.clone();
                frame.visit(
                    "finalizer",
                    &finalizer,
                    Box::new(move |_| match outcome {
                        Ok(value) => c(value),
                        Err(exception) => forward.call(exception),
                    }),
                    fail.boxed(),
                )
            }
        }))
    };

    let (on_success, on_failure) = (finish.clone(), finish);
    let (catch_frame, handler) = (frame.clone(), handler.cloned());
    frame.visit(
        "block",
        block,
        Box::new(move |value| on_success.call(Ok(value))),
        Box::new(move |exception: Exception| match (handler, exception.value()) {
            (Some(handler), Some(caught)) => {
                debug!(%exception, "exception caught");
                let scope = catch_frame.with_env(catch_frame.env.with_exception(caught));
                let (ok, err) = (on_failure.clone(), on_failure);
                scope.visit(
                    "handler",
                    &handler,
                    Box::new(move |value| ok.call(Ok(value))),
                    Box::new(move |exception| err.call(Err(exception))),
                )
            }
            _ => on_failure.call(Err(exception)),
        }),
    )
}

/// Execute CatchClause: binds the caught value in a fresh scope
pub fn catch_clause(
    frame: Frame,
    param: Option<&Rc<Node>>,
    body: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let caught = frame.env.exception().unwrap_or_default();
    let scope = frame.with_env(frame.env.child());
    match param {
        None => scope.visit("body", body, c, cerr),
        Some(param) => {
            let cerr = SharedContinuation::new(cerr);
            let (body_scope, body, on_error) = (scope.clone(), body.clone(), cerr.clone());
            bind_pattern(
                &scope,
                param,
                caught,
                Box::new(move |_| body_scope.visit("body", &body, c, on_error.boxed())),
                cerr.boxed(),
            )
        }
    }
}

/* ===================== Classes ===================== */

/// Execute ClassDeclaration (constructor-only, optional single superclass)
pub fn class_declaration(
    frame: Frame,
    id: Option<&Rc<Node>>,
    super_class: Option<&Rc<Node>>,
    body: &Rc<Node>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let Some(name) = id.and_then(|id| id.identifier_name()).map(str::to_string) else {
        return cerr(Signal::not_implemented("ClassDeclaration", "anonymous classes are not supported").into());
    };
    let cerr = SharedContinuation::new(cerr);

    let with_superclass = {
        let (frame, body, cerr) = (frame.clone(), body.clone(), cerr.clone());
        move |superclass: Option<FunctionRef>| {
            let (scope, on_error) = (frame.clone(), cerr.clone());
            frame.visit(
                "body",
                &body,
                Box::new(move |constructors| match build_class(&scope, &name, superclass, constructors) {
                    Ok(class) => {
                        scope.env.declare(name, class.clone());
                        c(class)
                    }
                    Err(signal) => on_error.call(signal.into()),
                }),
                cerr.boxed(),
            )
        }
    };

    match super_class {
        None => with_superclass(None),
        Some(super_class) => {
            let on_error = cerr.clone();
            frame.visit(
                "superClass",
                super_class,
                Box::new(move |value| match value {
                    Value::Function(superclass) => with_superclass(Some(superclass)),
                    other => on_error.call(
                        Signal::TypeError(format!("Class extends value {} is not a constructor", other)).into(),
                    ),
                }),
                cerr.boxed(),
            )
        }
    }
}

/// Picks the constructor and wires `prototype` to the superclass prototype
fn build_class(
    frame: &Frame,
    name: &str,
    superclass: Option<FunctionRef>,
    constructors: Value,
) -> Result<Value, Signal> {
    let constructors = constructors.as_array().map(|items| items.to_vec()).unwrap_or_default();
    let constructor = match constructors.as_slice() {
        [] => create_function(&empty_constructor(&frame.node), &frame.env)?,
        [Value::Function(constructor)] => constructor.clone(),
        [_] => return Err(Signal::TypeError("class constructor is not a function".to_string())),
        _ => return Err(Signal::TypeError("A class may only have one constructor".to_string())),
    };

    let prototype = constructor.prototype_object();
    if let Some(superclass) = superclass {
        prototype.set_prototype(Some(superclass.prototype_object()));
    }
    constructor.properties().set("name", Value::string(name));
    Ok(Value::Function(constructor))
}

fn empty_constructor(class: &Rc<Node>) -> Rc<Node> {
    let body = Rc::new(Node::new(NodeKind::BlockStatement { body: Vec::new() }));
    Rc::new(Node {
        kind: NodeKind::FunctionExpression {
            id: None,
            params: Vec::new(),
            body,
            generator: false,
            is_async: false,
        },
        loc: class.loc,
    })
}

/// Evaluates class members; yields the array of constructors
pub fn class_body(frame: Frame, body: &[Rc<Node>], c: Continuation, cerr: ErrorContinuation) {
    frame.visit_all("body", body, Box::new(move |values| c(Value::array(values))), cerr)
}

pub fn method_definition(frame: Frame, value: &Rc<Node>, kind: MethodKind, c: Continuation, cerr: ErrorContinuation) {
    if kind != MethodKind::Constructor {
        return cerr(Signal::not_implemented("MethodDefinition", "class methods other than the constructor").into());
    }
    frame.visit("value", value, c, cerr)
}
