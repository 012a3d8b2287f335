//! Runtime value types
//!
//! Values form a closed set. Primitives are held inline; objects, arrays and
//! functions are shared handles whose identity is pointer identity, so mutation
//! through one handle is visible through every other.

use super::super::closure::Closure;
use super::super::continuation::{Continuation, ErrorContinuation};
use super::control::HostError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/* ===================== Value ===================== */

/// Runtime value type
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(ObjectRef),
    Array(ArrayRef),
    Function(FunctionRef),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, Value)>) -> Self {
        let object = ObjectRef::new();
        for (key, value) in properties {
            object.set(key, value);
        }
        Value::Object(object)
    }

    /// Error-like object `{name, message}` used when a non-throw failure is caught
    pub fn error_object(name: &str, message: impl Into<String>) -> Self {
        Value::object([
            ("name", Value::string(name)),
            ("message", Value::string(message)),
        ])
    }

    /// ECMAScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Function(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) | Value::Array(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// ECMAScript ToNumber (strings are trimmed; empty string is 0)
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else if let Some(hex) = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    i64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN)
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            // Arrays convert through their joined string form
            Value::Array(_) => Value::String(self.to_string()).to_number(),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// ToInt32 used by the bitwise operators
    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        (n.trunc() as i64 & 0xFFFF_FFFF) as u32 as i32
    }

    /// Property key form of a value
    pub fn to_property_key(&self) -> String {
        self.to_string()
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Strict equality (`===`): primitives by value, handles by identity
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Loose equality (`==`) restricted to the primitive coercions
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Boolean(_), _)
            | (_, Value::Boolean(_)) => {
                if self.is_handle() || other.is_handle() {
                    self.strict_equals(other)
                } else {
                    self.to_number() == other.to_number()
                }
            }
            _ => self.strict_equals(other),
        }
    }

    fn is_handle(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_) | Value::Function(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

/// Number formatting that matches ECMAScript for the common cases
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == n.trunc() && n.abs() < MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else if n.abs() >= 1e21 {
        let text = format!("{:e}", n);
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
            _ => text,
        }
    } else {
        format!("{}", n)
    }
}

/// 2^53, the bound below which every integer is exact in an f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Joins array elements with `,`, rendering revisited arrays as empty
fn join_array(items: &ArrayRef, seen: &mut Vec<usize>) -> String {
    if seen.contains(&items.addr()) {
        return String::new();
    }
    seen.push(items.addr());
    let parts: Vec<String> = items
        .to_vec()
        .iter()
        .map(|item| match item {
            Value::Undefined | Value::Null => String::new(),
            Value::Array(nested) => join_array(nested, seen),
            other => other.to_string(),
        })
        .collect();
    seen.pop();
    parts.join(",")
}

/// ToString
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Array(items) => f.write_str(&join_array(items, &mut Vec::new())),
            Value::Function(func) => match func.name() {
                Some(name) => write!(f, "function {}() {{ [code] }}", name),
                None => f.write_str("function () { [code] }"),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Number(n) => write!(f, "Number({})", format_number(*n)),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Object(o) => {
                let object = o.0.try_borrow();
                match object {
                    Ok(object) => f
                        .debug_map()
                        .entries(object.properties.iter().map(|(k, v)| (k, v)))
                        .finish(),
                    Err(_) => f.write_str("Object(<borrowed>)"),
                }
            }
            Value::Array(a) => match a.0.try_borrow() {
                Ok(items) => f.debug_list().entries(items.iter()).finish(),
                Err(_) => f.write_str("Array(<borrowed>)"),
            },
            Value::Function(func) => write!(f, "Function({})", func.name().unwrap_or("anonymous")),
        }
    }
}

/* ===================== Objects ===================== */

/// Plain object: ordered own properties plus an optional prototype link
#[derive(Default)]
pub struct JsObject {
    pub properties: Vec<(String, Value)>,
    pub prototype: Option<ObjectRef>,
}

/// Shared handle to a plain object
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<JsObject>>);

impl ObjectRef {
    pub fn new() -> Self {
        ObjectRef::default()
    }

    pub fn with_prototype(prototype: Option<ObjectRef>) -> Self {
        ObjectRef(Rc::new(RefCell::new(JsObject {
            properties: Vec::new(),
            prototype,
        })))
    }

    /// Own property lookup
    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.0
            .borrow()
            .properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Property lookup along the prototype chain
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            if let Some(value) = object.get_own(key) {
                return Some(value);
            }
            current = object.prototype();
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut object = self.0.borrow_mut();
        match object.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => object.properties.push((key, value)),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.borrow().properties.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut object = self.0.borrow_mut();
        let before = object.properties.len();
        object.properties.retain(|(k, _)| k != key);
        object.properties.len() != before
    }

    /// Own enumerable keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.borrow().properties.clone()
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.borrow().prototype.clone()
    }

    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        self.0.borrow_mut().prototype = prototype;
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address used as an identity key
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Drops every property; used to break reference cycles on teardown
    pub fn clear(&self) {
        let mut object = self.0.borrow_mut();
        object.properties.clear();
        object.prototype = None;
    }
}

/* ===================== Arrays ===================== */

/// Shared handle to an array
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        ArrayRef(Rc::new(RefCell::new(items)))
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Writes an element, padding holes with `undefined`
    pub fn set(&self, index: usize, value: Value) {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    /// Snapshot of the current elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

/// Parses a canonical array index (`"0"`, `"12"`, never `"01"` or `"-1"`)
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/* ===================== Functions ===================== */

/// Synchronous host function: `(this, args) -> value`
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, HostError>;

/// Deferred host function: receives the continuations and may resume later
pub type DeferredFn = dyn Fn(Value, Vec<Value>, Continuation, ErrorContinuation);

/// Callable payload
pub enum FunctionKind {
    /// Function value materialized from a function node
    Closure(Closure),
    /// Host-provided function answering synchronously
    Native { name: String, call: Rc<NativeFn> },
    /// Host-provided function that suspends evaluation until it resumes a continuation
    Deferred { name: String, call: Rc<DeferredFn> },
}

pub struct FunctionObject {
    pub kind: FunctionKind,
    /// Own properties (`prototype` and anything user code attaches)
    pub properties: ObjectRef,
}

/// Shared handle to a function
#[derive(Clone)]
pub struct FunctionRef(Rc<FunctionObject>);

impl FunctionRef {
    pub fn new(kind: FunctionKind) -> Self {
        FunctionRef(Rc::new(FunctionObject {
            kind,
            properties: ObjectRef::new(),
        }))
    }

    /// Wraps a synchronous host function
    pub fn native<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, HostError> + 'static,
    {
        FunctionRef::new(FunctionKind::Native {
            name: name.into(),
            call: Rc::new(call),
        })
    }

    /// Wraps a host function that answers through the continuations it receives
    pub fn deferred<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(Value, Vec<Value>, Continuation, ErrorContinuation) + 'static,
    {
        FunctionRef::new(FunctionKind::Deferred {
            name: name.into(),
            call: Rc::new(call),
        })
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.0.kind
    }

    pub fn properties(&self) -> &ObjectRef {
        &self.0.properties
    }

    pub fn name(&self) -> Option<&str> {
        match &self.0.kind {
            FunctionKind::Closure(closure) => closure.name.as_deref(),
            FunctionKind::Native { name, .. } | FunctionKind::Deferred { name, .. } => Some(name),
        }
    }

    /// Host functions are the values the remote protocol ships by reference
    pub fn is_native(&self) -> bool {
        !matches!(self.0.kind, FunctionKind::Closure(_))
    }

    pub fn as_closure(&self) -> Option<&Closure> {
        match &self.0.kind {
            FunctionKind::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    /// The `prototype` object used by `new`, created on first use
    pub fn prototype_object(&self) -> ObjectRef {
        match self.0.properties.get_own("prototype") {
            Some(Value::Object(prototype)) => prototype,
            _ => {
                let prototype = ObjectRef::new();
                prototype.set("constructor", Value::Function(self.clone()));
                self.0.properties.set("prototype", Value::Object(prototype.clone()));
                prototype
            }
        }
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}
