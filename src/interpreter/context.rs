//! Evaluation context
//!
//! A [`Context`] bundles a default environment, a default config and optional
//! default continuations. [`Context::evaluate`] normalizes any source (text,
//! tree or function source) into a node and an environment and hands it to
//! dispatch. It never panics and never returns an error synchronously; every
//! outcome arrives through a continuation.

use super::closure::call_function;
use super::continuation::{Continuation, ErrorContinuation, SharedContinuation};
use super::dispatch::dispatch;
use super::environment::Environment;
use super::interceptor::EvaluationConfig;
use super::parser::{self, ParseCache, ParseError};
use super::remote::ReferenceRegistry;
use super::types::{Exception, FunctionRef, Node, NodeKind, Signal, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/* ===================== Sources & Bindings ===================== */

/// What to evaluate
#[derive(Debug, Clone)]
pub enum Source {
    /// Script text, parsed before evaluation
    Text(String),
    /// Already-built tree
    Node(Rc<Node>),
    /// Source text of a function; evaluates to the function value
    Function(String),
    /// Source text of a function whose body is evaluated directly
    FunctionBody(String),
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::Text(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source::Text(text)
    }
}

impl From<Rc<Node>> for Source {
    fn from(node: Rc<Node>) -> Self {
        Source::Node(node)
    }
}

impl From<Node> for Source {
    fn from(node: Node) -> Self {
        Source::Node(Rc::new(node))
    }
}

/// Extra bindings for one evaluation
#[derive(Debug, Clone)]
pub enum Bindings {
    /// Raw name/value mapping, promoted to a scope
    Values(HashMap<String, Value>),
    /// Ready-made environment, used as-is
    Environment(Environment),
}

impl From<HashMap<String, Value>> for Bindings {
    fn from(values: HashMap<String, Value>) -> Self {
        Bindings::Values(values)
    }
}

impl From<Environment> for Bindings {
    fn from(environment: Environment) -> Self {
        Bindings::Environment(environment)
    }
}

/* ===================== Context ===================== */

type Callback = Rc<dyn Fn(Value)>;
type ErrorCallback = Rc<dyn Fn(Exception)>;

pub struct Context {
    environment: Environment,
    config: Rc<EvaluationConfig>,
    c: Option<Callback>,
    cerr: Option<ErrorCallback>,
    registry: ReferenceRegistry,
    cache: Option<ParseCache>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Environment::new(), EvaluationConfig::default())
    }
}

impl Context {
    pub fn new(environment: Environment, config: EvaluationConfig) -> Self {
        Context {
            environment,
            config: Rc::new(config),
            c: None,
            cerr: None,
            registry: ReferenceRegistry::new(),
            cache: None,
        }
    }

    /// Default continuations used when a call supplies none
    pub fn with_continuations(
        mut self,
        c: impl Fn(Value) + 'static,
        cerr: impl Fn(Exception) + 'static,
    ) -> Self {
        self.c = Some(Rc::new(c));
        self.cerr = Some(Rc::new(cerr));
        self
    }

    /// Memoize parsed text sources
    pub fn with_parse_cache(mut self) -> Self {
        self.cache = Some(ParseCache::new());
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn config(&self) -> &Rc<EvaluationConfig> {
        &self.config
    }

    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    pub fn parse_cache(&self) -> Option<&ParseCache> {
        self.cache.as_ref()
    }

    /// Evaluates `source`; the outcome is delivered to `c` or `cerr`
    ///
    /// Missing continuations fall back to the context defaults; a missing error
    /// continuation without a default goes to the config's `on_error`. Extra
    /// raw bindings are layered on the context environment, an environment is
    /// used as given. A `return` at program level is reported as success.
    pub fn evaluate(
        &self,
        source: impl Into<Source>,
        c: Option<Continuation>,
        cerr: Option<ErrorContinuation>,
        environment: Option<Bindings>,
        config: Option<EvaluationConfig>,
    ) {
        let config = config.map(Rc::new).unwrap_or_else(|| self.config.clone());
        let c = self.success_continuation(c);
        let cerr = self.error_continuation(cerr, &config);
        let env = self.scope(environment);

        let node = match self.resolve(source.into()) {
            Ok(node) => node,
            Err(error) => {
                warn!(line = error.line, column = error.column, %error, "source failed to parse");
                return cerr(Signal::Parse(error).into());
            }
        };
        debug!(node = node.type_name(), depth = env.depth(), "evaluating");

        let done = SharedContinuation::new(c);
        let returned = done.clone();
        dispatch(
            &node,
            &env,
            &config,
            done.boxed(),
            Box::new(move |exception: Exception| match exception.signal {
                Signal::Return(value) => returned.call(value),
                signal => cerr(Exception {
                    signal,
                    location: exception.location,
                }),
            }),
        )
    }

    /// Evaluates the body of a function given as source text
    pub fn evaluate_function_body(
        &self,
        source: &str,
        c: Option<Continuation>,
        cerr: Option<ErrorContinuation>,
        environment: Option<Bindings>,
    ) {
        self.evaluate(Source::FunctionBody(source.to_string()), c, cerr, environment, None)
    }

    /// Awaits the outcome of [`Context::evaluate`]
    ///
    /// Resolves once either continuation fires. If both are dropped without
    /// firing (an abandoned deferred host call) the result is `Aborted`.
    pub async fn evaluate_async(
        &self,
        source: impl Into<Source>,
        environment: Option<Bindings>,
    ) -> Result<Value, Exception> {
        let (sender, receiver) = oneshot::channel();
        let sender = Rc::new(RefCell::new(Some(sender)));
        let on_error = sender.clone();

        self.evaluate(
            source,
            Some(Box::new(move |value| {
                if let Some(sender) = sender.borrow_mut().take() {
                    let _ = sender.send(Ok(value));
                }
            })),
            Some(Box::new(move |exception| {
                if let Some(sender) = on_error.borrow_mut().take() {
                    let _ = sender.send(Err(exception));
                }
            })),
            environment,
            None,
        );

        receiver.await.unwrap_or_else(|_| {
            Err(Signal::Aborted("evaluation dropped its continuations".to_string()).into())
        })
    }

    /// Function-body counterpart of [`Context::evaluate_async`]
    pub async fn evaluate_function_body_async(
        &self,
        source: &str,
        environment: Option<Bindings>,
    ) -> Result<Value, Exception> {
        self.evaluate_async(Source::FunctionBody(source.to_string()), environment)
            .await
    }

    /// Invokes a function value from host code with this context's config
    pub fn call(
        &self,
        function: &FunctionRef,
        this: Value,
        args: Vec<Value>,
        c: Continuation,
        cerr: ErrorContinuation,
    ) {
        call_function(function, this, args, &self.config, c, cerr)
    }

    fn success_continuation(&self, c: Option<Continuation>) -> Continuation {
        match (c, &self.c) {
            (Some(c), _) => c,
            (None, Some(default)) => {
                let default = default.clone();
                Box::new(move |value| default(value))
            }
            (None, None) => Box::new(|_| {}),
        }
    }

    fn error_continuation(
        &self,
        cerr: Option<ErrorContinuation>,
        config: &Rc<EvaluationConfig>,
    ) -> ErrorContinuation {
        match (cerr, &self.cerr) {
            (Some(cerr), _) => cerr,
            (None, Some(default)) => {
                let default = default.clone();
                Box::new(move |exception| default(exception))
            }
            (None, None) => {
                let on_error = config.on_error.clone();
                Box::new(move |exception| on_error(&exception))
            }
        }
    }

    fn scope(&self, environment: Option<Bindings>) -> Environment {
        match environment {
            None => self.environment.clone(),
            Some(Bindings::Values(values)) => self.environment.child_with(values),
            Some(Bindings::Environment(environment)) => environment,
        }
    }

    /// Normalizes a source into the node to dispatch
    fn resolve(&self, source: Source) -> Result<Rc<Node>, ParseError> {
        match source {
            Source::Node(node) => Ok(node),
            Source::Text(text) => match &self.cache {
                Some(cache) => cache.parse(&text),
                None => parser::parse(&text),
            },
            Source::Function(text) => parser::parse_function(&text),
            Source::FunctionBody(text) => {
                let function = parser::parse_function(&text)?;
                match &function.kind {
                    NodeKind::FunctionExpression { body, .. }
                    | NodeKind::ArrowFunctionExpression { body, .. } => Ok(body.clone()),
                    _ => Ok(function.clone()),
                }
            }
        }
    }
}

/// One-off evaluation without a long-lived context
///
/// Raw bindings become a parentless scope; an environment is used as given.
pub fn metaes_eval(
    source: impl Into<Source>,
    c: Option<Continuation>,
    cerr: Option<ErrorContinuation>,
    environment: Option<Bindings>,
    config: Option<EvaluationConfig>,
) {
    let environment = match environment {
        Some(Bindings::Values(values)) => Environment::root(values),
        Some(Bindings::Environment(environment)) => environment,
        None => Environment::new(),
    };
    Context::new(environment, config.unwrap_or_default()).evaluate(source, c, cerr, None, None)
}
