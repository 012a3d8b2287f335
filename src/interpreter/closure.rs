//! Function values
//!
//! A [`Closure`] pairs a function node with the environment it was defined in.
//! Materializing one never evaluates its body; invoking it layers a call scope
//! on the captured environment and re-enters dispatch for the body.

use super::continuation::{Continuation, ErrorContinuation, SharedContinuation};
use super::dispatch::Frame;
use super::environment::Environment;
use super::interceptor::EvaluationConfig;
use super::statements::bind_pattern;
use super::types::values::FunctionKind;
use super::types::{Exception, FunctionRef, Node, NodeKind, Signal, Value};
use std::rc::Rc;
use tracing::debug;

/// Function value materialized from a function node
pub struct Closure {
    /// Defining node (declaration, expression or arrow)
    pub node: Rc<Node>,
    pub params: Vec<Rc<Node>>,
    pub body: Rc<Node>,
    /// Captured defining environment, shared read-write
    pub environment: Environment,
    pub name: Option<String>,
    /// Arrow functions have no own `this` and cannot be constructed
    pub is_arrow: bool,
    /// Arrow function with an expression body
    pub is_expression: bool,
}

/// Materializes the function defined by `node`, capturing `env`
///
/// A named function expression sees its own name through a scope between
/// itself and `env`.
pub fn create_function(node: &Rc<Node>, env: &Environment) -> Result<FunctionRef, Signal> {
    let (id, params, body, is_arrow, generator, is_async) = match &node.kind {
        NodeKind::FunctionDeclaration {
            id,
            params,
            body,
            generator,
            is_async,
        }
        | NodeKind::FunctionExpression {
            id,
            params,
            body,
            generator,
            is_async,
        } => (id.as_ref(), params, body, false, *generator, *is_async),
        NodeKind::ArrowFunctionExpression {
            params, body, is_async, ..
        } => (None, params, body, true, false, *is_async),
        _ => {
            return Err(Signal::TypeError(format!(
                "{} does not define a function",
                node.type_name()
            )))
        }
    };
    if generator {
        return Err(Signal::not_implemented(node.type_name(), "generator functions"));
    }
    if is_async {
        return Err(Signal::not_implemented(node.type_name(), "async functions"));
    }

    let name = id.and_then(|id| id.identifier_name()).map(str::to_string);
    let self_binding = matches!(node.kind, NodeKind::FunctionExpression { .. }) && name.is_some();
    let environment = if self_binding { env.child() } else { env.clone() };
    let is_expression = is_arrow && !matches!(body.kind, NodeKind::BlockStatement { .. });

    let function = FunctionRef::new(FunctionKind::Closure(Closure {
        node: node.clone(),
        params: params.clone(),
        body: body.clone(),
        environment: environment.clone(),
        name: name.clone(),
        is_arrow,
        is_expression,
    }));
    if let (true, Some(name)) = (self_binding, name) {
        environment.declare(name, Value::Function(function.clone()));
    }
    Ok(function)
}

/// Invokes any function value: closures re-enter dispatch, host functions are
/// called directly and their failures surface as `Host` signals
pub fn call_function(
    function: &FunctionRef,
    this: Value,
    args: Vec<Value>,
    config: &Rc<EvaluationConfig>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    match function.kind() {
        FunctionKind::Closure(closure) => call_closure(closure, this, args, config, c, cerr),
        FunctionKind::Native { name, call } => {
            let call = call.clone();
            match call(&this, &args) {
                Ok(value) => c(value),
                Err(error) => {
                    debug!(function = %name, %error, "host function failed");
                    cerr(Signal::Host(error).into())
                }
            }
        }
        FunctionKind::Deferred { call, .. } => {
            let call = call.clone();
            call(this, args, c, cerr)
        }
    }
}

fn call_closure(
    closure: &Closure,
    this: Value,
    args: Vec<Value>,
    config: &Rc<EvaluationConfig>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    let scope = closure.environment.child();
    if !closure.is_arrow {
        scope.declare("this", this);
    }
    let frame = Frame::new(closure.node.clone(), scope, config.clone());
    let cerr = SharedContinuation::new(cerr);

    let run = {
        let (frame, body, is_expression, cerr) =
            (frame.clone(), closure.body.clone(), closure.is_expression, cerr.clone());
        Box::new(move || run_body(frame, body, is_expression, c, cerr))
    };
    bind_params(frame, Rc::new(closure.params.clone()), Rc::new(args), 0, run, cerr)
}

/// Binds parameters left-to-right; missing arguments are `undefined`
fn bind_params(
    frame: Frame,
    params: Rc<Vec<Rc<Node>>>,
    args: Rc<Vec<Value>>,
    index: usize,
    then: Box<dyn FnOnce()>,
    cerr: SharedContinuation<Exception>,
) {
    let Some(param) = params.get(index).cloned() else {
        return then();
    };
    let value = args.get(index).cloned().unwrap_or_default();
    let next = frame.clone();
    let on_error = cerr.boxed();
    bind_pattern(
        &frame,
        &param,
        value,
        Box::new(move |_| bind_params(next, params, args, index + 1, then, cerr)),
        on_error,
    )
}

/// Function body boundary: `Return` becomes the call's value
fn run_body(frame: Frame, body: Rc<Node>, is_expression: bool, c: Continuation, cerr: SharedContinuation<Exception>) {
    if is_expression {
        return frame.dispatch(&body, c, cerr.boxed());
    }
    let done = SharedContinuation::new(c);
    let returned = done.clone();
    frame.dispatch(
        &body,
        Box::new(move |_| done.call(Value::Undefined)),
        Box::new(move |exception: Exception| match exception.signal {
            Signal::Return(value) => returned.call(value),
            // Loops in the caller must not see the callee's break/continue
            signal @ (Signal::Break(_) | Signal::Continue(_)) => cerr.call(Exception {
                signal: Signal::TypeError(signal.to_string()),
                location: exception.location,
            }),
            signal => cerr.call(Exception {
                signal,
                location: exception.location,
            }),
        }),
    )
}
