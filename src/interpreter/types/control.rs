//! Control flow signals
//!
//! Return/throw/break/continue never unwind the native stack. They travel as
//! [`Signal`] payloads through the ordinary error-continuation path, and each
//! handler either forwards them or absorbs them at its own boundary (function
//! body for `Return`, loops for `Break`/`Continue`, try statements for the
//! catchable kinds).

use super::ast::Node;
use super::values::Value;
use crate::interpreter::parser::ParseError;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/* ===================== Host Errors ===================== */

/// Failure raised by a host-provided function
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
    /// Value handed to a `catch` clause; defaults to an error object
    pub value: Option<Value>,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        HostError {
            message: message.into(),
            value: None,
        }
    }

    /// Host error that surfaces in script as exactly `value`
    pub fn with_value(value: Value) -> Self {
        HostError {
            message: value.to_string(),
            value: Some(value),
        }
    }
}

/* ===================== Signals ===================== */

/// Abnormal completion of a node evaluation
#[derive(Debug, Clone, Error)]
pub enum Signal {
    /// Language-level `throw`
    #[error("Uncaught {}", describe_thrown(.0))]
    Throw(Value),

    /// `return` travelling to its function boundary
    #[error("Illegal return statement")]
    Return(Value),

    #[error("Illegal break statement")]
    Break(Option<String>),

    #[error("Illegal continue statement")]
    Continue(Option<String>),

    /// Unbound name read, or assignment to an undeclared name
    #[error("ReferenceError: \"{0}\" is not defined")]
    ReferenceError(String),

    /// Operation applied to a value of the wrong kind
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Recognized construct the interpreter deliberately does not support
    #[error("{node_type} is not implemented: {message}")]
    NotImplemented { node_type: String, message: String },

    #[error("Host error: {0}")]
    Host(HostError),

    #[error(transparent)]
    Parse(ParseError),

    /// Evaluation stopped by an interceptor
    #[error("Evaluation aborted: {0}")]
    Aborted(String),
}

fn describe_thrown(value: &Value) -> String {
    match value {
        Value::Object(object) => match (object.get("name"), object.get("message")) {
            (Some(name), Some(message)) => format!("{}: {}", name, message),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}

impl Signal {
    pub fn not_implemented(node_type: &str, message: impl Into<String>) -> Self {
        Signal::NotImplemented {
            node_type: node_type.to_string(),
            message: message.into(),
        }
    }

    /// Internal control signals that must never escape their owning boundary
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Signal::Return(_) | Signal::Break(_) | Signal::Continue(_)
        )
    }

    /// Value a `catch` clause binds, `None` when the signal is not catchable
    pub fn caught_value(&self) -> Option<Value> {
        match self {
            Signal::Throw(value) => Some(value.clone()),
            Signal::Host(error) => Some(
                error
                    .value
                    .clone()
                    .unwrap_or_else(|| Value::error_object("Error", error.message.clone())),
            ),
            Signal::ReferenceError(name) => Some(Value::error_object(
                "ReferenceError",
                format!("\"{}\" is not defined", name),
            )),
            Signal::TypeError(message) => Some(Value::error_object("TypeError", message.clone())),
            Signal::Return(_)
            | Signal::Break(_)
            | Signal::Continue(_)
            | Signal::NotImplemented { .. }
            | Signal::Parse(_)
            | Signal::Aborted(_) => None,
        }
    }
}

/* ===================== Exceptions ===================== */

/// Signal attached to the node it originated from
#[derive(Debug, Clone)]
pub struct Exception {
    pub signal: Signal,
    pub location: Option<Rc<Node>>,
}

impl Exception {
    pub fn new(signal: Signal) -> Self {
        Exception {
            signal,
            location: None,
        }
    }

    pub fn at(signal: Signal, node: &Rc<Node>) -> Self {
        Exception {
            signal,
            location: Some(node.clone()),
        }
    }

    /// Attaches `node` unless an inner node already claimed this exception
    pub fn located(mut self, node: &Rc<Node>) -> Self {
        if self.location.is_none() {
            self.location = Some(node.clone());
        }
        self
    }

    /// Thrown value for `throw`, `None` for every other signal
    pub fn thrown_value(&self) -> Option<&Value> {
        match &self.signal {
            Signal::Throw(value) => Some(value),
            _ => None,
        }
    }

    /// Value the exception surfaces as in script (`catch` binding)
    pub fn value(&self) -> Option<Value> {
        self.signal.caught_value()
    }
}

impl From<Signal> for Exception {
    fn from(signal: Signal) -> Self {
        Exception::new(signal)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signal)?;
        if let Some(node) = &self.location {
            match &node.loc {
                Some(loc) => write!(
                    f,
                    " (at {} {}:{})",
                    node.type_name(),
                    loc.start.line,
                    loc.start.column
                )?,
                None => write!(f, " (at {})", node.type_name())?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.signal)
    }
}
