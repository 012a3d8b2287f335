//! Node evaluator dispatch
//!
//! [`dispatch`] is the single entry point for evaluating a node. It brackets the
//! handler with interceptor events, attaches the node to any failure that leaves
//! it, and routes to exactly one handler per node variant. The match in
//! [`handle`] is exhaustive over [`NodeKind`], so adding a node type without a
//! handler is a build error.
//!
//! Handlers descend into children through [`Frame`], which carries the node being
//! evaluated together with its environment and config.

use super::continuation::{Continuation, ErrorContinuation, SharedContinuation, ValuesContinuation};
use super::environment::Environment;
use super::expressions;
use super::interceptor::EvaluationConfig;
use super::stack::ensure_sufficient_stack;
use super::statements;
use super::types::{Exception, Node, NodeKind, Signal, Value};
use std::rc::Rc;
use tracing::debug;

/* ===================== Dispatch ===================== */

/// Evaluates `node` in `env`; exactly one of `c`/`cerr` fires, exactly once
pub fn dispatch(
    node: &Rc<Node>,
    env: &Environment,
    config: &Rc<EvaluationConfig>,
    c: Continuation,
    cerr: ErrorContinuation,
) {
    ensure_sufficient_stack(|| {
        let frame = Frame::new(node.clone(), env.clone(), config.clone());
        bracket(node, None, env, config, move |c, cerr| handle(frame, c, cerr), c, cerr)
    })
}

/// Emits an enter/exit pair around `work`
///
/// `property` is `None` for node events and the slot name for property events.
/// Failures leaving a node event get that node attached as their location
/// unless an inner node already claimed them.
fn bracket(
    node: &Rc<Node>,
    property: Option<&'static str>,
    env: &Environment,
    config: &Rc<EvaluationConfig>,
    work: impl FnOnce(Continuation, ErrorContinuation),
    c: Continuation,
    cerr: ErrorContinuation,
) {
    if let Err(reason) = config.enter(node, property, env) {
        debug!(node = node.type_name(), %reason, "evaluation aborted by interceptor");
        let exception = Exception::at(Signal::Aborted(reason), node);
        config.exit(node, property, env, Err(&exception));
        cerr(exception);
        return;
    }

    let on_success: Continuation = {
        let (node, env, config) = (node.clone(), env.clone(), config.clone());
        Box::new(move |value| {
            ensure_sufficient_stack(move || {
                config.exit(&node, property, &env, Ok(&value));
                c(value)
            })
        })
    };
    let on_error: ErrorContinuation = {
        let (node, env, config) = (node.clone(), env.clone(), config.clone());
        Box::new(move |exception: Exception| {
            ensure_sufficient_stack(move || {
                let exception = match property {
                    None => exception.located(&node),
                    Some(_) => exception,
                };
                config.exit(&node, property, &env, Err(&exception));
                cerr(exception)
            })
        })
    };

    work(on_success, on_error)
}

/* ===================== Sequences ===================== */

/// Evaluates siblings strictly left-to-right sharing one error continuation
///
/// The first failure short-circuits the remaining siblings. On success the
/// values arrive in source order.
pub fn evaluate_array(
    nodes: &[Rc<Node>],
    env: &Environment,
    config: &Rc<EvaluationConfig>,
    c: ValuesContinuation,
    cerr: ErrorContinuation,
) {
    let elements: Vec<Option<Rc<Node>>> = nodes.iter().cloned().map(Some).collect();
    evaluate_elements(elements, env, config, c, cerr)
}

/// Like [`evaluate_array`], holes (`None`) produce `undefined` without evaluation
pub(crate) fn evaluate_elements(
    elements: Vec<Option<Rc<Node>>>,
    env: &Environment,
    config: &Rc<EvaluationConfig>,
    c: ValuesContinuation,
    cerr: ErrorContinuation,
) {
    let values = Vec::with_capacity(elements.len());
    next_element(
        Rc::new(elements),
        0,
        values,
        env.clone(),
        config.clone(),
        c,
        SharedContinuation::new(cerr),
    )
}

fn next_element(
    elements: Rc<Vec<Option<Rc<Node>>>>,
    index: usize,
    mut values: Vec<Value>,
    env: Environment,
    config: Rc<EvaluationConfig>,
    c: ValuesContinuation,
    cerr: SharedContinuation<Exception>,
) {
    let Some(element) = elements.get(index).cloned() else {
        return c(values);
    };
    match element {
        None => {
            values.push(Value::Undefined);
            next_element(elements, index + 1, values, env, config, c, cerr)
        }
        Some(node) => {
            let on_error = cerr.boxed();
            let (next_env, next_config) = (env.clone(), config.clone());
            dispatch(
                &node,
                &env,
                &config,
                Box::new(move |value| {
                    values.push(value);
                    next_element(elements, index + 1, values, next_env, next_config, c, cerr)
                }),
                on_error,
            )
        }
    }
}

/* ===================== Frame ===================== */

/// Node under evaluation plus the environment and config it runs with
#[derive(Clone)]
pub struct Frame {
    pub node: Rc<Node>,
    pub env: Environment,
    pub config: Rc<EvaluationConfig>,
}

impl Frame {
    pub fn new(node: Rc<Node>, env: Environment, config: Rc<EvaluationConfig>) -> Self {
        Frame { node, env, config }
    }

    /// Same node and config, different environment
    pub fn with_env(&self, env: Environment) -> Self {
        Frame {
            node: self.node.clone(),
            env,
            config: self.config.clone(),
        }
    }

    /// Evaluates `child` with node events only
    pub fn dispatch(&self, child: &Rc<Node>, c: Continuation, cerr: ErrorContinuation) {
        dispatch(child, &self.env, &self.config, c, cerr)
    }

    /// Evaluates `child` inside the property pair for slot `key`
    pub fn visit(&self, key: &'static str, child: &Rc<Node>, c: Continuation, cerr: ErrorContinuation) {
        self.visit_with(key, |c, cerr| self.dispatch(child, c, cerr), c, cerr)
    }

    /// Runs custom work inside the property pair for slot `key`
    pub fn visit_with(
        &self,
        key: &'static str,
        work: impl FnOnce(Continuation, ErrorContinuation),
        c: Continuation,
        cerr: ErrorContinuation,
    ) {
        bracket(&self.node, Some(key), &self.env, &self.config, work, c, cerr)
    }

    /// Evaluates a whole array slot under a single property pair
    pub fn visit_all(&self, key: &'static str, children: &[Rc<Node>], c: ValuesContinuation, cerr: ErrorContinuation) {
        self.visit_with(
            key,
            |c, cerr| {
                evaluate_array(
                    children,
                    &self.env,
                    &self.config,
                    Box::new(move |values| c(Value::array(values))),
                    cerr,
                )
            },
            Box::new(move |value| match value {
                Value::Array(items) => c(items.to_vec()),
                _ => c(Vec::new()),
            }),
            cerr,
        )
    }

    /// Emits node events for `node` around custom work instead of its handler
    ///
    /// Used where a node is consumed rather than evaluated, such as the name of a
    /// static member access.
    pub fn evaluate_with(
        &self,
        node: &Rc<Node>,
        work: impl FnOnce(Continuation, ErrorContinuation),
        c: Continuation,
        cerr: ErrorContinuation,
    ) {
        bracket(node, None, &self.env, &self.config, work, c, cerr)
    }
}

/* ===================== Handler Table ===================== */

fn handle(frame: Frame, c: Continuation, cerr: ErrorContinuation) {
    let node = frame.node.clone();
    match &node.kind {
        /* ----- statements ----- */
        NodeKind::Program { body } => statements::program(frame, body, c, cerr),
        NodeKind::BlockStatement { body } => statements::block_statement(frame, body, c, cerr),
        NodeKind::ExpressionStatement { expression } => {
            statements::expression_statement(frame, expression, c, cerr)
        }
        NodeKind::EmptyStatement => c(Value::Undefined),
        NodeKind::DebuggerStatement => statements::debugger_statement(frame, c),
        NodeKind::VariableDeclaration { declarations, .. } => {
            statements::variable_declaration(frame, declarations, c, cerr)
        }
        NodeKind::VariableDeclarator { id, init } => {
            statements::variable_declarator(frame, id, init.as_ref(), c, cerr)
        }
        NodeKind::IfStatement {
            test,
            consequent,
            alternate,
        } => statements::if_statement(frame, test, consequent, alternate.as_ref(), c, cerr),
        NodeKind::WhileStatement { test, body } => statements::while_statement(frame, test, body, c, cerr),
        NodeKind::ForStatement { .. } => cerr(
            Signal::not_implemented(node.type_name(), "three-clause for loops are not supported").into(),
        ),
        NodeKind::ForInStatement { left, right, body } => {
            statements::for_in_statement(frame, left, right, body, c, cerr)
        }
        NodeKind::ForOfStatement { left, right, body } => {
            statements::for_of_statement(frame, left, right, body, c, cerr)
        }
        NodeKind::FunctionDeclaration { .. } => statements::function_declaration(frame, c, cerr),
        NodeKind::ReturnStatement { argument } => {
            statements::return_statement(frame, argument.as_ref(), cerr)
        }
        NodeKind::ThrowStatement { argument } => statements::throw_statement(frame, argument, cerr),
        NodeKind::TryStatement {
            block,
            handler,
            finalizer,
        } => statements::try_statement(frame, block, handler.as_ref(), finalizer.as_ref(), c, cerr),
        NodeKind::CatchClause { param, body } => {
            statements::catch_clause(frame, param.as_ref(), body, c, cerr)
        }
        NodeKind::BreakStatement { label } => match label {
            Some(_) => cerr(Signal::not_implemented(node.type_name(), "labeled break").into()),
            None => cerr(Signal::Break(None).into()),
        },
        NodeKind::ContinueStatement { label } => match label {
            Some(_) => cerr(Signal::not_implemented(node.type_name(), "labeled continue").into()),
            None => cerr(Signal::Continue(None).into()),
        },
        NodeKind::ClassDeclaration { id, super_class, body } => {
            statements::class_declaration(frame, id.as_ref(), super_class.as_ref(), body, c, cerr)
        }
        NodeKind::ClassBody { body } => statements::class_body(frame, body, c, cerr),
        NodeKind::MethodDefinition { value, kind, .. } => {
            statements::method_definition(frame, value, *kind, c, cerr)
        }

        /* ----- expressions ----- */
        NodeKind::Identifier { name } => expressions::identifier(frame, name, c, cerr),
        NodeKind::Literal { value, regex, .. } => {
            expressions::literal(value.as_ref(), regex.is_some(), c, cerr)
        }
        NodeKind::ThisExpression => c(frame.env.get("this").unwrap_or_default()),
        NodeKind::ArrayExpression { elements } => expressions::array_expression(frame, elements, c, cerr),
        NodeKind::ObjectExpression { properties } => {
            expressions::object_expression(frame, properties, c, cerr)
        }
        NodeKind::Property { .. } => cerr(
            Signal::not_implemented(node.type_name(), "property outside of an object literal or pattern")
                .into(),
        ),
        NodeKind::FunctionExpression { .. } | NodeKind::ArrowFunctionExpression { .. } => {
            expressions::function_expression(frame, c, cerr)
        }
        NodeKind::MemberExpression {
            object,
            property,
            computed,
        } => expressions::member_expression(frame, object, property, *computed, c, cerr),
        NodeKind::CallExpression { callee, arguments } => {
            expressions::call_expression(frame, callee, arguments, c, cerr)
        }
        NodeKind::NewExpression { callee, arguments } => {
            expressions::new_expression(frame, callee, arguments, c, cerr)
        }
        NodeKind::AssignmentExpression {
            operator,
            left,
            right,
        } => expressions::assignment_expression(frame, *operator, left, right, c, cerr),
        NodeKind::UpdateExpression {
            operator,
            argument,
            prefix,
        } => expressions::update_expression(frame, *operator, argument, *prefix, c, cerr),
        NodeKind::UnaryExpression { operator, argument, .. } => {
            expressions::unary_expression(frame, *operator, argument, c, cerr)
        }
        NodeKind::BinaryExpression {
            operator,
            left,
            right,
        } => expressions::binary_expression(frame, *operator, left, right, c, cerr),
        NodeKind::LogicalExpression {
            operator,
            left,
            right,
        } => expressions::logical_expression(frame, *operator, left, right, c, cerr),
        NodeKind::ConditionalExpression {
            test,
            consequent,
            alternate,
        } => statements::if_statement(frame, test, consequent, Some(alternate), c, cerr),
        NodeKind::SequenceExpression { expressions } => {
            expressions::sequence_expression(frame, expressions, c, cerr)
        }
        NodeKind::TemplateLiteral { quasis, expressions } => {
            expressions::template_literal(frame, quasis, expressions, c, cerr)
        }
        NodeKind::TemplateElement { value, .. } => {
            c(Value::string(value.cooked.clone().unwrap_or_else(|| value.raw.clone())))
        }

        /* ----- patterns ----- */
        NodeKind::ObjectPattern { .. } => cerr(
            Signal::not_implemented(node.type_name(), "patterns are only evaluated as binding targets").into(),
        ),
        NodeKind::AssignmentPattern { left, right } => {
            statements::assignment_pattern(frame, left, right, c, cerr)
        }
    }
}
