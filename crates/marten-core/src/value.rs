//! Loosely-typed values exchanged between hosts and native objects.

use std::rc::Rc;
use std::sync::Arc;

use crate::host::ObjectRef;

/// A dispatch value.
///
/// Text carries `Option<Arc<str>>`: `None` is *absent* text, distinct from
/// `Some("")` (present but empty). The distinction survives cloning and must
/// never be collapsed by a copy; coercion to `Bool` is the one place the two
/// behave identically (both are `false`).
#[derive(Clone, Default)]
pub enum Value {
    /// No value (unset slot, missing argument, void result).
    #[default]
    Empty,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit float.
    Double(f64),
    /// Text, possibly absent.
    Text(Option<Arc<str>>),
    /// Reference to a dispatchable object.
    Object(ObjectRef),
}

/// Declared type of a reflected property, parameter or return value.
///
/// `Variant` accepts any value without conversion. `Unknown` marks a declared
/// type outside the supported set; members using one fall back to the
/// reflection provider's generic invocation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    /// Boolean.
    Bool,
    /// 32-bit integer.
    Int,
    /// 64-bit float.
    Double,
    /// Text.
    Text,
    /// Object reference.
    Object,
    /// Any value, passed through without conversion.
    Variant,
    /// Declared type outside the supported set.
    Unknown,
}

impl DataType {
    /// Whether a parameter of this type is eligible for the fast native path.
    pub fn fast_path_eligible(self) -> bool {
        !matches!(self, DataType::Variant | DataType::Unknown)
    }
}

impl Value {
    /// Present text value.
    pub fn text(s: impl Into<Arc<str>>) -> Value {
        Value::Text(Some(s.into()))
    }

    /// Absent text value (present-but-empty is `Value::text("")`).
    pub fn absent_text() -> Value {
        Value::Text(None)
    }

    /// Object reference value.
    pub fn object(obj: ObjectRef) -> Value {
        Value::Object(obj)
    }

    /// Runtime type of this value, if it maps to a declared type.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int),
            Value::Double(_) => Some(DataType::Double),
            Value::Text(_) => Some(DataType::Text),
            Value::Object(_) => Some(DataType::Object),
            Value::Empty | Value::Null => None,
        }
    }

    /// Whether this is `Empty`.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Object reference, if this value holds one.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Present text, if this value holds some.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(Some(s)) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => f.write_str("Empty"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            // Objects print their identity, consistent with equality.
            Value::Object(obj) => {
                f.debug_tuple("Object").field(&Rc::as_ptr(obj).cast::<()>()).finish()
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            // Object equality is reference identity.
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Constant value usable as a declared parameter default.
///
/// The subset of [`Value`] with no object references, so it can live inside
/// the cross-thread descriptor cache. Defaults are substituted verbatim into
/// a call, never coerced.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    /// No value.
    Empty,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit float.
    Double(f64),
    /// Text, possibly absent.
    Text(Option<Arc<str>>),
}

impl ConstValue {
    /// Materialize the default as a runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            ConstValue::Empty => Value::Empty,
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(n) => Value::Int(*n),
            ConstValue::Double(n) => Value::Double(*n),
            ConstValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_preserves_absent_text() {
        let absent = Value::absent_text();
        let empty = Value::text("");
        assert_eq!(absent.clone(), absent);
        assert_eq!(empty.clone(), empty);
        assert_ne!(absent, empty);
    }

    #[test]
    fn data_type_of_values() {
        assert_eq!(Value::Int(3).data_type(), Some(DataType::Int));
        assert_eq!(Value::absent_text().data_type(), Some(DataType::Text));
        assert_eq!(Value::Empty.data_type(), None);
        assert_eq!(Value::Null.data_type(), None);
    }

    #[test]
    fn debug_output_is_stable() {
        assert_eq!(format!("{:?}", Value::Empty), "Empty");
        assert_eq!(format!("{:?}", Value::Int(3)), "Int(3)");
        assert_eq!(format!("{:?}", Value::text("x")), "Text(Some(\"x\"))");
        assert_eq!(format!("{:?}", Value::absent_text()), "Text(None)");
    }

    #[test]
    fn const_default_materializes_verbatim() {
        let d = ConstValue::Int(9);
        assert_eq!(d.to_value(), Value::Int(9));
        assert_eq!(ConstValue::Text(None).to_value(), Value::absent_text());
    }
}
