//! Remote evaluation message protocol
//!
//! A [`Message`] carries source (script text or an ESTree tree) together with a
//! serialized scope chain. Plain data travels by value as JSON. Functions,
//! objects with a prototype and cyclic structures travel as reference tokens
//! `{"ref": "<uuid>"}` registered in the sending context's
//! [`ReferenceRegistry`], so a token that comes back to its origin resolves to
//! the very same handle.
//!
//! The transport is not part of this module: [`request`] builds the outgoing
//! message, [`respond`] evaluates it on the peer and produces the reply, and
//! [`deliver`] runs the reply back on the origin, where it calls the original
//! continuation.

use super::context::{Bindings, Context, Source};
use super::continuation::{Continuation, ErrorContinuation, SharedContinuation};
use super::environment::Environment;
use super::types::{Exception, FunctionRef, Node, Signal, Value};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/* ===================== Messages ===================== */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageSource {
    Text(String),
    Node(Rc<Node>),
}

impl From<&str> for MessageSource {
    fn from(text: &str) -> Self {
        MessageSource::Text(text.to_string())
    }
}

impl From<MessageSource> for Source {
    fn from(source: MessageSource) -> Self {
        match source {
            MessageSource::Text(text) => Source::Text(text),
            MessageSource::Node(node) => Source::Node(node),
        }
    }
}

/// One scope of a serialized chain; `prev` is the parent scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedEnvironment {
    #[serde(default)]
    pub values: Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<Box<SerializedEnvironment>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub source: MessageSource,
    #[serde(default)]
    pub env: SerializedEnvironment,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/* ===================== Reference Registry ===================== */

#[derive(Default)]
struct Registry {
    values: HashMap<Uuid, Value>,
    ids: HashMap<usize, Uuid>,
}

/// Handles that left this side by reference, keyed by token id
///
/// Registered values are kept alive for the registry's lifetime.
#[derive(Clone, Default)]
pub struct ReferenceRegistry(Rc<RefCell<Registry>>);

impl ReferenceRegistry {
    pub fn new() -> Self {
        ReferenceRegistry::default()
    }

    /// Token id for `value`, stable per handle
    pub fn token_for(&self, value: &Value) -> Uuid {
        let addr = handle_addr(value);
        let mut registry = self.0.borrow_mut();
        if let Some(id) = addr.and_then(|addr| registry.ids.get(&addr)) {
            return *id;
        }
        let id = Uuid::new_v4();
        registry.values.insert(id, value.clone());
        if let Some(addr) = addr {
            registry.ids.insert(addr, id);
        }
        trace!(%id, "registered reference");
        id
    }

    pub fn resolve(&self, id: &Uuid) -> Option<Value> {
        self.0.borrow().values.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().values.is_empty()
    }

    pub fn clear(&self) {
        let mut registry = self.0.borrow_mut();
        registry.values.clear();
        registry.ids.clear();
    }

    fn token(&self, value: &Value) -> JsonValue {
        json!({ "ref": self.token_for(value).to_string() })
    }
}

impl fmt::Debug for ReferenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRegistry")
            .field("len", &self.len())
            .finish()
    }
}

fn handle_addr(value: &Value) -> Option<usize> {
    match value {
        Value::Object(object) => Some(object.addr()),
        Value::Array(items) => Some(items.addr()),
        Value::Function(function) => Some(function.addr()),
        _ => None,
    }
}

/* ===================== Value Encoding ===================== */

/// Encodes a value as JSON, handing out reference tokens where needed
///
/// `undefined` and non-finite numbers have no JSON form and encode as `null`.
pub fn encode_value(registry: &ReferenceRegistry, value: &Value) -> JsonValue {
    encode(registry, value, &mut Vec::new())
}

fn encode(registry: &ReferenceRegistry, value: &Value, path: &mut Vec<usize>) -> JsonValue {
    match value {
        Value::Undefined | Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
            JsonValue::from(*n as i64)
        }
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Function(_) => registry.token(value),
        Value::Array(items) => {
            if path.contains(&items.addr()) {
                return registry.token(value);
            }
            path.push(items.addr());
            let encoded = items
                .to_vec()
                .iter()
                .map(|item| encode(registry, item, path))
                .collect();
            path.pop();
            JsonValue::Array(encoded)
        }
        Value::Object(object) => {
            if object.prototype().is_some() || path.contains(&object.addr()) {
                return registry.token(value);
            }
            path.push(object.addr());
            let encoded = object
                .entries()
                .into_iter()
                .map(|(key, item)| (key, encode(registry, &item, path)))
                .collect();
            path.pop();
            JsonValue::Object(encoded)
        }
    }
}

/// Decodes JSON into a value
///
/// Tokens issued by this registry resolve to the original handle. Foreign
/// tokens stay plain `{ref}` objects and encode back to the same token.
pub fn decode_value(registry: &ReferenceRegistry, json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::array(
            items
                .iter()
                .map(|item| decode_value(registry, item))
                .collect(),
        ),
        JsonValue::Object(map) => {
            if let Some(value) = reference_id(map).and_then(|id| registry.resolve(&id)) {
                return value;
            }
            Value::object(
                map.iter()
                    .map(|(key, item)| (key.clone(), decode_value(registry, item))),
            )
        }
    }
}

fn reference_id(map: &Map<String, JsonValue>) -> Option<Uuid> {
    if map.len() != 1 {
        return None;
    }
    map.get("ref")?.as_str().and_then(|id| Uuid::parse_str(id).ok())
}

/* ===================== Environments ===================== */

/// Serializes `environment` and its parents up to the context environment
pub fn environment_to_message(context: &Context, environment: &Environment) -> SerializedEnvironment {
    if environment.ptr_eq(context.environment()) {
        return SerializedEnvironment::default();
    }
    let values = environment
        .own_values()
        .into_iter()
        .map(|(name, value)| (name, encode_value(context.registry(), &value)))
        .collect();
    let prev = environment
        .parent()
        .filter(|parent| !parent.ptr_eq(context.environment()))
        .map(|parent| Box::new(environment_to_message(context, &parent)));
    SerializedEnvironment { values, prev }
}

/// Rebuilds a serialized chain whose outermost scope sits on the context environment
pub fn environment_from_message(context: &Context, serialized: &SerializedEnvironment) -> Environment {
    let parent = match &serialized.prev {
        Some(prev) => environment_from_message(context, prev),
        None => context.environment().clone(),
    };
    parent.child_with(
        serialized
            .values
            .iter()
            .map(|(name, value)| (name.clone(), decode_value(context.registry(), value))),
    )
}

/// Validates incoming JSON and turns it into a [`Message`]
pub fn assert_message(json: &JsonValue) -> Result<Message, RemoteError> {
    let object = json
        .as_object()
        .ok_or_else(|| RemoteError::InvalidMessage("message must be an object".to_string()))?;
    match object.get("source") {
        Some(JsonValue::String(_)) => {}
        Some(JsonValue::Object(node)) if node.get("type").is_some_and(JsonValue::is_string) => {}
        Some(_) => {
            return Err(RemoteError::InvalidMessage(
                "`source` must be script text or an ESTree node".to_string(),
            ))
        }
        None => return Err(RemoteError::InvalidMessage("missing `source`".to_string())),
    }
    if object.get("env").is_some_and(|env| !env.is_object()) {
        return Err(RemoteError::InvalidMessage("`env` must be an object".to_string()));
    }
    Ok(serde_json::from_value(json.clone())?)
}

/* ===================== Round Trip ===================== */

/// Builds an outgoing message whose scope exposes `c` and `cerr` to the peer
///
/// Both travel as reference tokens; when the peer's reply is delivered back
/// here they resolve to host functions that resume the given continuations.
pub fn request(
    context: &Context,
    source: impl Into<MessageSource>,
    bindings: HashMap<String, Value>,
    c: Continuation,
    cerr: ErrorContinuation,
) -> Message {
    let done = SharedContinuation::new(c);
    let failed = SharedContinuation::new(cerr);
    let resume = FunctionRef::native("c", move |_, args| {
        done.call(args.first().cloned().unwrap_or_default());
        Ok(Value::Undefined)
    });
    let reject = FunctionRef::native("cerr", move |_, args| {
        let value = args.first().cloned().unwrap_or_default();
        failed.call(Signal::Throw(value).into());
        Ok(Value::Undefined)
    });

    let scope = context.environment().child_with(bindings);
    scope.declare("c", Value::Function(resume));
    scope.declare("cerr", Value::Function(reject));

    Message {
        source: source.into(),
        env: environment_to_message(context, &scope),
    }
}

/// Evaluates `message` on this side and hands the reply to `reply`
///
/// The reply source is `c(result)` on success and `cerr(error)` on failure,
/// with `result`/`error` merged into the message's own serialized scope.
pub fn respond(context: &Context, message: Message, reply: impl FnOnce(Message) + 'static) {
    debug!(
        source = match &message.source {
            MessageSource::Text(_) => "text",
            MessageSource::Node(_) => "node",
        },
        "responding to remote message"
    );
    let environment = environment_from_message(context, &message.env);
    let reply = SharedContinuation::new(Box::new(reply) as Box<dyn FnOnce(Message)>);
    let original = Rc::new(message.env);

    let on_success: Continuation = {
        let (registry, original, reply) = (context.registry().clone(), original.clone(), reply.clone());
        Box::new(move |value: Value| {
            let mut env = (*original).clone();
            env.values.insert("result".to_string(), encode_value(&registry, &value));
            reply.call(Message {
                source: MessageSource::Text("c(result)".to_string()),
                env,
            })
        })
    };
    let on_error: ErrorContinuation = {
        let registry = context.registry().clone();
        Box::new(move |exception: Exception| {
            warn!(%exception, "remote evaluation failed");
            let error = exception
                .value()
                .unwrap_or_else(|| Value::error_object("Error", exception.to_string()));
            let mut env = (*original).clone();
            env.values.insert("error".to_string(), encode_value(&registry, &error));
            reply.call(Message {
                source: MessageSource::Text("cerr(error)".to_string()),
                env,
            })
        })
    };

    context.evaluate(
        message.source,
        Some(on_success),
        Some(on_error),
        Some(Bindings::Environment(environment)),
        None,
    )
}

/// Runs a reply produced by [`respond`] on the side that sent the request
pub fn deliver(context: &Context, message: Message) {
    let environment = environment_from_message(context, &message.env);
    debug!(depth = environment.depth(), "delivering remote reply");
    context.evaluate(
        message.source,
        None,
        None,
        Some(Bindings::Environment(environment)),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interceptor::EvaluationConfig;
    use crate::interpreter::types::ObjectRef;

    #[test]
    fn test_plain_data_travels_by_value() {
        let registry = ReferenceRegistry::new();
        let value = Value::object([
            ("n", Value::from(1)),
            ("items", Value::array(vec![Value::from("a"), Value::Null])),
        ]);
        let json = encode_value(&registry, &value);

        assert_eq!(json, json!({ "n": 1, "items": ["a", null] }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_functions_round_trip_by_identity() {
        let registry = ReferenceRegistry::new();
        let function = FunctionRef::native("f", |_, _| Ok(Value::Undefined));
        let json = encode_value(&registry, &Value::Function(function.clone()));

        assert_eq!(json, encode_value(&registry, &Value::Function(function.clone())));
        match decode_value(&registry, &json) {
            Value::Function(decoded) => assert!(decoded.ptr_eq(&function)),
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_cycles_become_references() {
        let registry = ReferenceRegistry::new();
        let object = ObjectRef::new();
        object.set("self", Value::Object(object.clone()));

        let json = encode_value(&registry, &Value::Object(object.clone()));
        let token = &json["self"];
        assert!(token["ref"].is_string());

        match decode_value(&registry, token) {
            Value::Object(decoded) => assert!(decoded.ptr_eq(&object)),
            other => panic!("Expected object, got {:?}", other),
        }
        object.clear();
    }

    #[test]
    fn test_foreign_tokens_survive_reencoding() {
        let registry = ReferenceRegistry::new();
        let token = json!({ "ref": Uuid::new_v4().to_string() });
        let decoded = decode_value(&registry, &token);
        assert_eq!(encode_value(&registry, &decoded), token);
    }

    #[test]
    fn test_environment_serialization_stops_at_context() {
        let context = Context::new(
            Environment::root([("hidden", Value::from(0))]),
            EvaluationConfig::new(),
        );
        let outer = context.environment().child_with([("a", Value::from(1))]);
        let inner = outer.child_with([("b", Value::from(2))]);

        let serialized = environment_to_message(&context, &inner);
        assert_eq!(serialized.values["b"], json!(2));
        let prev = serialized.prev.as_ref().expect("parent scope");
        assert_eq!(prev.values["a"], json!(1));
        assert!(prev.prev.is_none());

        let rebuilt = environment_from_message(&context, &serialized);
        assert_eq!(rebuilt.get("b"), Some(Value::from(2)));
        assert_eq!(rebuilt.get("a"), Some(Value::from(1)));
        assert_eq!(rebuilt.get("hidden"), Some(Value::from(0)));
    }

    #[test]
    fn test_assert_message() {
        assert!(assert_message(&json!({ "source": "1 + 1" })).is_ok());
        assert!(assert_message(&json!({
            "source": { "type": "Literal", "value": 1 },
            "env": { "values": { "a": 1 } }
        }))
        .is_ok());

        assert!(matches!(
            assert_message(&json!([1])),
            Err(RemoteError::InvalidMessage(_))
        ));
        assert!(matches!(
            assert_message(&json!({ "source": 1 })),
            Err(RemoteError::InvalidMessage(_))
        ));
        assert!(matches!(
            assert_message(&json!({ "source": "x", "env": [] })),
            Err(RemoteError::InvalidMessage(_))
        ));
        assert!(matches!(
            assert_message(&json!({ "source": { "type": "Bogus" } })),
            Err(RemoteError::Json(_))
        ));
    }
}
