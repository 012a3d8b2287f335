//! Operator and property-access semantics
//!
//! Pure functions over [`Value`]; no evaluation happens here. Failures are
//! returned as signals and the calling handler forwards them through its error
//! continuation.

use super::types::ast::{BinaryOperator, UnaryOperator};
use super::types::values::array_index;
use super::types::{Signal, Value};
use std::cmp::Ordering;

/* ===================== Unary ===================== */

pub fn unary(operator: UnaryOperator, value: &Value) -> Value {
    match operator {
        UnaryOperator::Neg => Value::Number(-value.to_number()),
        UnaryOperator::Plus => Value::Number(value.to_number()),
        UnaryOperator::Not => Value::Boolean(!value.is_truthy()),
        UnaryOperator::BitNot => Value::Number(!value.to_int32() as f64),
        UnaryOperator::TypeOf => Value::string(value.type_of()),
        UnaryOperator::Void => Value::Undefined,
        // Deleting a non-reference is a no-op that reports success
        UnaryOperator::Delete => Value::Boolean(true),
    }
}

/* ===================== Binary ===================== */

pub fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Signal> {
    let value = match operator {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Exp => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOperator::Eq => Value::Boolean(left.loose_equals(right)),
        BinaryOperator::NotEq => Value::Boolean(!left.loose_equals(right)),
        BinaryOperator::StrictEq => Value::Boolean(left.strict_equals(right)),
        BinaryOperator::StrictNotEq => Value::Boolean(!left.strict_equals(right)),
        BinaryOperator::Lt => Value::Boolean(compare(left, right) == Some(Ordering::Less)),
        BinaryOperator::LtEq => Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::Gt => Value::Boolean(compare(left, right) == Some(Ordering::Greater)),
        BinaryOperator::GtEq => Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOperator::BitAnd => Value::Number((left.to_int32() & right.to_int32()) as f64),
        BinaryOperator::BitOr => Value::Number((left.to_int32() | right.to_int32()) as f64),
        BinaryOperator::BitXor => Value::Number((left.to_int32() ^ right.to_int32()) as f64),
        BinaryOperator::Shl => Value::Number(left.to_int32().wrapping_shl(shift_count(right)) as f64),
        BinaryOperator::Shr => Value::Number(left.to_int32().wrapping_shr(shift_count(right)) as f64),
        BinaryOperator::UShr => {
            Value::Number((left.to_int32() as u32).wrapping_shr(shift_count(right)) as f64)
        }
        BinaryOperator::In => Value::Boolean(has_property(right, &left.to_property_key())?),
        BinaryOperator::InstanceOf => Value::Boolean(instance_of(left, right)?),
    };
    Ok(value)
}

/// `+`: string concatenation when either side is a string or a handle
fn add(left: &Value, right: &Value) -> Value {
    let concatenates = |value: &Value| {
        matches!(
            value,
            Value::String(_) | Value::Object(_) | Value::Array(_) | Value::Function(_)
        )
    };
    if concatenates(left) || concatenates(right) {
        Value::String(format!("{}{}", left, right))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

/// Relational comparison: strings compare lexicographically, all else numerically
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn shift_count(value: &Value) -> u32 {
    (value.to_int32() as u32) & 0x1f
}

fn instance_of(value: &Value, constructor: &Value) -> Result<bool, Signal> {
    let Value::Function(constructor) = constructor else {
        return Err(Signal::TypeError(
            "Right-hand side of 'instanceof' is not callable".to_string(),
        ));
    };
    let Value::Object(object) = value else {
        return Ok(false);
    };
    let prototype = constructor.prototype_object();
    let mut current = object.prototype();
    while let Some(candidate) = current {
        if candidate.ptr_eq(&prototype) {
            return Ok(true);
        }
        current = candidate.prototype();
    }
    Ok(false)
}

/* ===================== Properties ===================== */

/// Property read; missing properties are `undefined`
pub fn get_property(target: &Value, key: &str) -> Result<Value, Signal> {
    let value = match target {
        Value::Undefined | Value::Null => {
            return Err(Signal::TypeError(format!(
                "Cannot read properties of {} (reading '{}')",
                target, key
            )))
        }
        Value::Object(object) => object.get(key),
        Value::Array(items) => match key {
            "length" => Some(Value::Number(items.len() as f64)),
            _ => array_index(key).and_then(|index| items.get(index)),
        },
        Value::String(s) => match key {
            "length" => Some(Value::Number(s.chars().count() as f64)),
            _ => array_index(key)
                .and_then(|index| s.chars().nth(index))
                .map(|ch| Value::String(ch.to_string())),
        },
        Value::Function(function) => match key {
            "prototype" => Some(Value::Object(function.prototype_object())),
            "name" => function
                .properties()
                .get_own("name")
                .or_else(|| Some(Value::string(function.name().unwrap_or_default()))),
            _ => function.properties().get(key),
        },
        Value::Boolean(_) | Value::Number(_) => None,
    };
    Ok(value.unwrap_or_default())
}

/// Property write; writes to other primitives are silently dropped
pub fn set_property(target: &Value, key: &str, value: Value) -> Result<(), Signal> {
    match target {
        Value::Undefined | Value::Null => Err(Signal::TypeError(format!(
            "Cannot set properties of {} (setting '{}')",
            target, key
        ))),
        Value::Object(object) => {
            object.set(key, value);
            Ok(())
        }
        Value::Array(items) => {
            if let Some(index) = array_index(key) {
                if index >= items.len() {
                    checked_array_length(index as f64 + 1.0)?;
                }
                items.set(index, value);
                return Ok(());
            }
            if key == "length" {
                let length = checked_array_length(value.to_number())?;
                items.borrow_mut().resize(length, Value::Undefined);
                return Ok(());
            }
            Err(Signal::TypeError(format!(
                "Cannot set named property '{}' on an array",
                key
            )))
        }
        Value::Function(function) => {
            function.properties().set(key, value);
            Ok(())
        }
        Value::Boolean(_) | Value::Number(_) | Value::String(_) => Ok(()),
    }
}

/// Largest length an array may grow to; elements are stored densely
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

fn checked_array_length(length: f64) -> Result<usize, Signal> {
    if length < 0.0 || length.fract() != 0.0 || !length.is_finite() || length > u32::MAX as f64 {
        return Err(Signal::TypeError("Invalid array length".to_string()));
    }
    if length > MAX_ARRAY_LENGTH as f64 {
        return Err(Signal::TypeError(format!(
            "Array length {} exceeds the supported maximum of {}",
            length, MAX_ARRAY_LENGTH
        )));
    }
    Ok(length as usize)
}

pub fn delete_property(target: &Value, key: &str) -> Result<bool, Signal> {
    match target {
        Value::Undefined | Value::Null => Err(Signal::TypeError(format!(
            "Cannot convert {} to object (deleting '{}')",
            target, key
        ))),
        Value::Object(object) => {
            object.remove(key);
            Ok(true)
        }
        Value::Array(items) => {
            if let Some(index) = array_index(key) {
                if index < items.len() {
                    items.set(index, Value::Undefined);
                }
            }
            Ok(true)
        }
        Value::Function(function) => {
            function.properties().remove(key);
            Ok(true)
        }
        Value::Boolean(_) | Value::Number(_) | Value::String(_) => Ok(true),
    }
}

/// `key in target`
pub fn has_property(target: &Value, key: &str) -> Result<bool, Signal> {
    match target {
        Value::Object(object) => Ok(object.has(key)),
        Value::Array(items) => Ok(key == "length" || array_index(key).is_some_and(|index| index < items.len())),
        Value::Function(function) => {
            Ok(matches!(key, "prototype" | "name") || function.properties().has(key))
        }
        _ => Err(Signal::TypeError(format!(
            "Cannot use 'in' operator to search for '{}' in {}",
            key, target
        ))),
    }
}

/// Keys visited by `for-in`: own keys of objects, indices of arrays and strings
pub fn enumerable_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object.keys(),
        Value::Array(items) => (0..items.len()).map(|index| index.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|index| index.to_string()).collect(),
        Value::Function(function) => function.properties().keys(),
        Value::Undefined | Value::Null | Value::Boolean(_) | Value::Number(_) => Vec::new(),
    }
}
