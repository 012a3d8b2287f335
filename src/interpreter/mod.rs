//! Metacircular interpreter
//!
//! Evaluates ESTree trees in continuation-passing style. Every handler receives
//! a success continuation and an error continuation; non-local control flow
//! (`return`, `break`, `continue`, `throw`) travels through the error channel
//! as a [`Signal`] and is absorbed by the construct it targets. Interceptors
//! observe every node and property evaluation on the way in and out.
//!
//! ```ignore
//! use metaes_core::interpreter::{Context, stdlib};
//!
//! let context = Context::new(stdlib::global_environment(), Default::default());
//! context.evaluate(
//!     "Math.max(1, 2)",
//!     Some(Box::new(|value| println!("{}", value))),
//!     None,
//!     None,
//!     None,
//! );
//! ```

pub mod closure;
pub mod context;
pub mod continuation;
pub mod dispatch;
pub mod environment;
pub mod expressions;
pub mod interceptor;
pub mod operators;
pub mod parser;
pub mod remote;
pub mod stack;
pub mod statements;
pub mod stdlib;
pub mod types;

#[cfg(test)]
mod tests;

pub use context::{metaes_eval, Bindings, Context, Source};
pub use continuation::{Continuation, ErrorContinuation, SharedContinuation};
pub use environment::{Environment, Reference};
pub use interceptor::{Evaluation, EvaluationConfig, Interceptor, Phase};
pub use parser::{parse, parse_function, ParseCache, ParseError};
pub use remote::{Message, MessageSource, ReferenceRegistry, RemoteError, SerializedEnvironment};
pub use types::{Exception, FunctionRef, HostError, Node, NodeKind, ObjectRef, Signal, Value};
