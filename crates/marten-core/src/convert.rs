//! Value coercion between the supported primitive types.
//!
//! `coerce` implements the platform-general conversion rule used when a
//! supplied argument's runtime type differs from a declared type, with one
//! deliberate override: text converts to `true` only when present and
//! non-empty. The general rule would treat any non-error text as truthy.

use crate::error::{DispatchError, DispatchResult};
use crate::value::{DataType, Value};

/// Convert `value` to declared type `ty`.
///
/// `Variant` accepts anything unchanged. `Null` is passed through for
/// `Object` (a null object reference). A conversion without a defined rule
/// is `InvalidArgument`.
pub fn coerce(value: &Value, ty: DataType) -> DispatchResult<Value> {
    if ty == DataType::Variant {
        return Ok(value.clone());
    }
    if value.data_type() == Some(ty) {
        return Ok(value.clone());
    }

    match ty {
        DataType::Bool => Ok(Value::Bool(to_bool(value)?)),
        DataType::Int => Ok(Value::Int(to_int(value)?)),
        DataType::Double => Ok(Value::Double(to_double(value)?)),
        DataType::Text => Ok(Value::Text(Some(to_text(value)?.into()))),
        DataType::Object => match value {
            // Null stands for a null object reference.
            Value::Null => Ok(Value::Null),
            _ => Err(DispatchError::InvalidArgument),
        },
        DataType::Variant | DataType::Unknown => Err(DispatchError::InvalidArgument),
    }
}

/// Boolean conversion. Text is `true` only when present and non-empty.
pub fn to_bool(value: &Value) -> DispatchResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(n) => Ok(*n != 0),
        Value::Double(n) => Ok(*n != 0.0),
        Value::Text(s) => Ok(s.as_deref().is_some_and(|s| !s.is_empty())),
        Value::Empty | Value::Null => Ok(false),
        Value::Object(_) => Err(DispatchError::InvalidArgument),
    }
}

/// Integer conversion. Floats round half-to-even; out-of-range fails.
pub fn to_int(value: &Value) -> DispatchResult<i32> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
        Value::Double(n) => double_to_int(*n),
        Value::Text(Some(s)) => {
            let t = s.trim();
            if let Ok(n) = t.parse::<i32>() {
                Ok(n)
            } else if let Ok(f) = t.parse::<f64>() {
                double_to_int(f)
            } else {
                Err(DispatchError::InvalidArgument)
            }
        }
        Value::Empty => Ok(0),
        Value::Text(None) | Value::Null | Value::Object(_) => Err(DispatchError::InvalidArgument),
    }
}

/// Float conversion.
pub fn to_double(value: &Value) -> DispatchResult<f64> {
    match value {
        Value::Double(n) => Ok(*n),
        Value::Int(n) => Ok(*n as f64),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Text(Some(s)) => {
            s.trim().parse::<f64>().map_err(|_| DispatchError::InvalidArgument)
        }
        Value::Empty => Ok(0.0),
        Value::Text(None) | Value::Null | Value::Object(_) => Err(DispatchError::InvalidArgument),
    }
}

/// Text conversion.
pub fn to_text(value: &Value) -> DispatchResult<String> {
    match value {
        Value::Text(Some(s)) => Ok(s.to_string()),
        Value::Text(None) | Value::Empty => Ok(String::new()),
        Value::Int(n) => {
            let mut buf = itoa::Buffer::new();
            Ok(buf.format(*n).to_owned())
        }
        Value::Double(n) => {
            let mut buf = ryu::Buffer::new();
            Ok(buf.format(*n).to_owned())
        }
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
        Value::Null | Value::Object(_) => Err(DispatchError::InvalidArgument),
    }
}

fn double_to_int(n: f64) -> DispatchResult<i32> {
    if !n.is_finite() {
        return Err(DispatchError::InvalidArgument);
    }
    let rounded = n.round_ties_even();
    if rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return Err(DispatchError::InvalidArgument);
    }
    Ok(rounded as i32)
}
