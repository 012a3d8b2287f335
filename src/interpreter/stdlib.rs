//! Host globals
//!
//! Optional globals a host can install into a root environment before
//! evaluating scripts: `Math`, `console`, `JSON`, `Object.keys` and
//! `Array.isArray`. Nothing here is installed implicitly.

use super::environment::Environment;
use super::operators::enumerable_keys;
use super::remote::{decode_value, encode_value, ReferenceRegistry};
use super::types::{FunctionRef, HostError, Value};
use tracing::{info, warn};

/* ===================== Environment Injection ===================== */

/// Declares every host global in `env`
pub fn install(env: &Environment) {
    env.declare("Math", math());
    env.declare("console", console());
    env.declare("JSON", json());
    env.declare(
        "Object",
        Value::object([("keys", native("keys", object_keys))]),
    );
    env.declare(
        "Array",
        Value::object([("isArray", native("isArray", |_, args| {
            Ok(Value::Boolean(matches!(args.first(), Some(Value::Array(_)))))
        }))]),
    );
}

/// Root environment with every host global installed
pub fn global_environment() -> Environment {
    let env = Environment::new();
    install(&env);
    env
}

fn native<F>(name: &str, call: F) -> Value
where
    F: Fn(&Value, &[Value]) -> Result<Value, HostError> + 'static,
{
    Value::Function(FunctionRef::native(name, call))
}

fn number_arg(args: &[Value], index: usize) -> f64 {
    args.get(index).map(Value::to_number).unwrap_or(f64::NAN)
}

/* ===================== Math ===================== */

fn math() -> Value {
    Value::object([
        ("PI", Value::Number(std::f64::consts::PI)),
        ("floor", native("floor", |_, args| Ok(number_arg(args, 0).floor().into()))),
        ("ceil", native("ceil", |_, args| Ok(number_arg(args, 0).ceil().into()))),
        ("abs", native("abs", |_, args| Ok(number_arg(args, 0).abs().into()))),
        ("round", native("round", |_, args| Ok(round(number_arg(args, 0)).into()))),
        ("sqrt", native("sqrt", |_, args| Ok(number_arg(args, 0).sqrt().into()))),
        ("max", native("max", |_, args| Ok(fold(args, f64::NEG_INFINITY, f64::max).into()))),
        ("min", native("min", |_, args| Ok(fold(args, f64::INFINITY, f64::min).into()))),
    ])
}

/// Rounds half-way cases towards positive infinity
fn round(n: f64) -> f64 {
    if n.is_finite() {
        (n + 0.5).floor()
    } else {
        n
    }
}

fn fold(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

/* ===================== Console ===================== */

fn console() -> Value {
    Value::object([
        ("log", native("log", |_, args| {
            info!(target: "console", "{}", join(args));
            Ok(Value::Undefined)
        })),
        ("warn", native("warn", |_, args| {
            warn!(target: "console", "{}", join(args));
            Ok(Value::Undefined)
        })),
    ])
}

fn join(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/* ===================== JSON ===================== */

fn json() -> Value {
    Value::object([
        ("stringify", native("stringify", |_, args| {
            let registry = ReferenceRegistry::new();
            let value = args.first().cloned().unwrap_or_default();
            if matches!(value, Value::Undefined | Value::Function(_)) {
                return Ok(Value::Undefined);
            }
            let encoded = encode_value(&registry, &value);
            if !registry.is_empty() {
                return Err(HostError::new(
                    "TypeError: Converting circular structure or class instance to JSON",
                ));
            }
            Ok(Value::String(encoded.to_string()))
        })),
        ("parse", native("parse", |_, args| {
            let text = args.first().map(Value::to_string).unwrap_or_default();
            serde_json::from_str(&text)
                .map(|json| decode_value(&ReferenceRegistry::new(), &json))
                .map_err(|e| HostError::new(format!("SyntaxError: {}", e)))
        })),
    ])
}

/* ===================== Object ===================== */

fn object_keys(_: &Value, args: &[Value]) -> Result<Value, HostError> {
    match args.first() {
        Some(value) if !value.is_nullish() => Ok(Value::array(
            enumerable_keys(value).into_iter().map(Value::String).collect(),
        )),
        _ => Err(HostError::new(
            "TypeError: Cannot convert undefined or null to object",
        )),
    }
}
