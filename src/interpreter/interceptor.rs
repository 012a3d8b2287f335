//! Interceptor hook and per-evaluation configuration
//!
//! The interceptor observes every evaluation step: each node evaluation is
//! bracketed by an `Enter` and an `Exit` event, and each child slot a handler
//! descends into (`body`, `left`, `right`, ...) is bracketed by a property-keyed
//! pair. Events nest depth-first, left-to-right, so a recorder can rebuild the
//! full evaluation tree from the stream alone.
//!
//! An interceptor that returns `Err` on an `Enter` event aborts that node; the
//! abort travels outward through the error continuation as
//! [`Signal::Aborted`](crate::interpreter::types::Signal::Aborted). Errors
//! returned on `Exit` events are ignored.

use crate::interpreter::environment::Environment;
use crate::interpreter::types::{Exception, Node, Value};
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{error, trace};

/* ===================== Events ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
}

/// One interceptor event
#[derive(Clone)]
pub struct Evaluation {
    /// Node being evaluated; the parent node for property events
    pub node: Rc<Node>,
    /// Child slot name for property events, `None` for node events
    pub property: Option<&'static str>,
    /// Produced value, populated on successful exit
    pub value: Option<Value>,
    /// Failure, populated on failed exit
    pub error: Option<Exception>,
    pub environment: Environment,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
}

impl Evaluation {
    pub fn enter(node: &Rc<Node>, property: Option<&'static str>, environment: &Environment) -> Self {
        Evaluation {
            node: node.clone(),
            property,
            value: None,
            error: None,
            environment: environment.clone(),
            phase: Phase::Enter,
            timestamp: Utc::now(),
        }
    }

    pub fn exit(
        node: &Rc<Node>,
        property: Option<&'static str>,
        environment: &Environment,
        outcome: Result<&Value, &Exception>,
    ) -> Self {
        let (value, error) = match outcome {
            Ok(value) => (Some(value.clone()), None),
            Err(exception) => (None, Some(exception.clone())),
        };
        Evaluation {
            node: node.clone(),
            property,
            value,
            error,
            environment: environment.clone(),
            phase: Phase::Exit,
            timestamp: Utc::now(),
        }
    }

    /// Node type for node events, slot name for property events
    pub fn label(&self) -> &str {
        self.property.unwrap_or_else(|| self.node.type_name())
    }
}

impl fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluation")
            .field("label", &self.label())
            .field("phase", &self.phase)
            .field("value", &self.value)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

/* ===================== Interceptors ===================== */

/// Observer invoked for every event; `Err` on enter aborts the node
pub type Interceptor = Rc<dyn Fn(&Evaluation) -> Result<(), String>>;

/// Fallback sink for failures nobody else handles
pub type ErrorHandler = Rc<dyn Fn(&Exception)>;

/// Aborts evaluation once more than `limit` nodes have been entered
pub fn step_budget(limit: usize) -> Interceptor {
    let steps = Cell::new(0usize);
    Rc::new(move |evaluation: &Evaluation| {
        if evaluation.phase != Phase::Enter || evaluation.property.is_some() {
            return Ok(());
        }
        let taken = steps.get() + 1;
        steps.set(taken);
        if taken > limit {
            Err(format!("step budget of {} exceeded", limit))
        } else {
            Ok(())
        }
    })
}

/// Logs every event at TRACE level
pub fn tracing_interceptor() -> Interceptor {
    Rc::new(|evaluation: &Evaluation| {
        match evaluation.phase {
            Phase::Enter => trace!(label = evaluation.label(), "enter"),
            Phase::Exit => match (&evaluation.value, &evaluation.error) {
                (_, Some(error)) => trace!(label = evaluation.label(), %error, "exit"),
                (Some(value), _) => trace!(label = evaluation.label(), %value, "exit"),
                _ => trace!(label = evaluation.label(), "exit"),
            },
        }
        Ok(())
    })
}

/// Records every event into a shared log
pub fn recorder(log: Rc<RefCell<Vec<Evaluation>>>) -> Interceptor {
    Rc::new(move |evaluation: &Evaluation| {
        log.borrow_mut().push(evaluation.clone());
        Ok(())
    })
}

/// Runs each interceptor in order; the first error wins
pub fn combine(interceptors: Vec<Interceptor>) -> Interceptor {
    Rc::new(move |evaluation: &Evaluation| {
        for interceptor in &interceptors {
            interceptor(evaluation)?;
        }
        Ok(())
    })
}

/* ===================== Evaluation Config ===================== */

/// Options threaded unchanged through one evaluation call tree
#[derive(Clone)]
pub struct EvaluationConfig {
    pub interceptor: Option<Interceptor>,
    /// Receives failures when the caller supplied no error continuation
    pub on_error: ErrorHandler,
    /// Register a stable reference for every identifier read
    pub use_references: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            interceptor: None,
            on_error: Rc::new(log_error),
            use_references: false,
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        EvaluationConfig::default()
    }

    pub fn with_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn with_on_error(mut self, on_error: impl Fn(&Exception) + 'static) -> Self {
        self.on_error = Rc::new(on_error);
        self
    }

    pub fn with_references(mut self, use_references: bool) -> Self {
        self.use_references = use_references;
        self
    }

    /// Delivers an enter event; `Err` carries the abort reason
    pub(crate) fn enter(
        &self,
        node: &Rc<Node>,
        property: Option<&'static str>,
        environment: &Environment,
    ) -> Result<(), String> {
        match &self.interceptor {
            Some(interceptor) => interceptor(&Evaluation::enter(node, property, environment)),
            None => Ok(()),
        }
    }

    pub(crate) fn exit(
        &self,
        node: &Rc<Node>,
        property: Option<&'static str>,
        environment: &Environment,
        outcome: Result<&Value, &Exception>,
    ) {
        if let Some(interceptor) = &self.interceptor {
            let _ = interceptor(&Evaluation::exit(node, property, environment, outcome));
        }
    }
}

impl fmt::Debug for EvaluationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationConfig")
            .field("interceptor", &self.interceptor.is_some())
            .field("use_references", &self.use_references)
            .finish()
    }
}

/// Default `on_error`: report through the tracing pipeline
pub fn log_error(exception: &Exception) {
    error!(%exception, "evaluation failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::NodeKind;

    fn literal() -> Rc<Node> {
        Rc::new(Node::new(NodeKind::EmptyStatement))
    }

    #[test]
    fn test_step_budget_counts_node_enters_only() {
        let budget = step_budget(2);
        let node = literal();
        let env = Environment::new();

        let property = Evaluation::enter(&node, Some("body"), &env);
        let enter = Evaluation::enter(&node, None, &env);
        let exit = Evaluation::exit(&node, None, &env, Ok(&Value::Undefined));

        assert!(budget(&property).is_ok());
        assert!(budget(&enter).is_ok());
        assert!(budget(&exit).is_ok());
        assert!(budget(&enter).is_ok());
        assert!(budget(&enter).is_err());
    }

    #[test]
    fn test_combine_stops_at_first_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let combined = combine(vec![step_budget(0), recorder(log.clone())]);
        let node = literal();

        let result = combined(&Evaluation::enter(&node, None, &Environment::new()));
        assert!(result.is_err());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_event_label() {
        let node = literal();
        let env = Environment::new();
        assert_eq!(Evaluation::enter(&node, None, &env).label(), "EmptyStatement");
        assert_eq!(Evaluation::enter(&node, Some("body"), &env).label(), "body");
    }
}
