//! Marshaling between dispatch parameter blocks and native entry points.
//!
//! Builtin members declared with fast-path-eligible shapes are invoked
//! directly through their typed entry point; everything else falls back to
//! the reflection provider. Marshaling borrows arguments that already match
//! the declared type and materializes coerced temporaries for the rest.

use std::borrow::Cow;

use smallvec::SmallVec;
use tracing::trace;

use marten_core::{
    DispParams, DispatchError, DispatchResult, InvokeKind, ObjectRef, Value, coerce,
};

use crate::class::CompatMode;
use crate::descriptor::MemberInfo;
use crate::reflect::{MAX_ARGS, ReflectionProvider};

const EMPTY: Value = Value::Empty;

/// Marshaled argument list handed to native method entry points, in
/// declaration order.
pub struct CallArgs<'a> {
    args: SmallVec<[Cow<'a, Value>; MAX_ARGS]>,
}

impl<'a> CallArgs<'a> {
    pub(crate) fn new() -> CallArgs<'a> {
        CallArgs { args: SmallVec::new() }
    }

    /// Argument list over already-marshaled values; test and hook helper.
    pub fn from_values(values: &'a [Value]) -> CallArgs<'a> {
        CallArgs { args: values.iter().map(Cow::Borrowed).collect() }
    }

    pub(crate) fn push(&mut self, value: Cow<'a, Value>) {
        self.args.push(value);
    }

    /// Argument at declaration position `i`, `Empty` past the end.
    pub fn arg(&self, i: usize) -> &Value {
        self.args.get(i).map_or(&EMPTY, |v| v.as_ref())
    }

    /// Number of marshaled arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether no arguments were marshaled.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Call a builtin method through its native entry point.
///
/// Surplus positional arguments are ignored; a missing argument is filled
/// from the parameter's declared default, passed verbatim without coercion.
pub(crate) fn invoke_method(
    this: &ObjectRef,
    member: &MemberInfo,
    params: &DispParams,
) -> DispatchResult<Value> {
    let entry = member.call.ok_or(DispatchError::NotFound)?;
    let argc = params.positional_count();
    if argc + member.default_count() < member.params.len() {
        return Err(DispatchError::InvalidArgument);
    }

    let mut marshaled = CallArgs::new();
    for (i, param) in member.params.iter().enumerate() {
        if i >= argc {
            let default = param.default.as_ref().ok_or(DispatchError::InvalidArgument)?;
            marshaled.push(Cow::Owned(default.to_value()));
            continue;
        }
        let supplied = params.positional(i).ok_or(DispatchError::InvalidArgument)?;
        if let Some(cap) = param.capability {
            marshaled.push(Cow::Owned(requery_capability(supplied, cap)?));
        } else if supplied.data_type() == Some(param.ty) || param.ty == marten_core::DataType::Variant {
            marshaled.push(Cow::Borrowed(supplied));
        } else {
            marshaled.push(Cow::Owned(coerce(supplied, param.ty)?));
        }
    }
    entry(this, &marshaled)
}

/// Replace an object argument with the facet the callee declared, via the
/// receiver object's own capability query. `Null` passes through as a null
/// reference.
fn requery_capability(supplied: &Value, cap: marten_core::CapabilityId) -> DispatchResult<Value> {
    match supplied {
        Value::Null => Ok(Value::Null),
        Value::Object(obj) => match obj.query_capability(cap) {
            Some(facet) => Ok(Value::Object(facet)),
            None => Err(DispatchError::InvalidArgument),
        },
        _ => Err(DispatchError::InvalidArgument),
    }
}

/// Read a builtin property through its native getter.
pub(crate) fn invoke_getter(
    this: &ObjectRef,
    member: &MemberInfo,
    params: &DispParams,
) -> DispatchResult<Value> {
    if params.positional_count() != 0 {
        trace!(name = %member.name, "ignoring arguments on property read");
    }
    let entry = member.get.ok_or(DispatchError::NotFound)?;
    entry(this)
}

/// Write a builtin property through its native setter.
///
/// A getter-only property accepts and discards the write under `Standard`
/// mode; older modes report it unsupported.
pub(crate) fn invoke_setter(
    this: &ObjectRef,
    member: &MemberInfo,
    params: &DispParams,
    mode: CompatMode,
) -> DispatchResult<Value> {
    let supplied = params.put_value().ok_or(DispatchError::InvalidArgument)?;
    let Some(entry) = member.put else {
        if member.get.is_some() && mode == CompatMode::Standard {
            trace!(name = %member.name, "discarding write to read-only property");
            return Ok(Value::Empty);
        }
        return Err(DispatchError::Unsupported("property has no setter"));
    };
    let value = match member.prop_ty {
        Some(ty) if supplied.data_type() != Some(ty) && ty != marten_core::DataType::Variant => {
            Cow::Owned(coerce(supplied, ty)?)
        }
        _ => Cow::Borrowed(supplied),
    };
    entry(this, value.as_ref())?;
    Ok(Value::Empty)
}

/// Route a member through the reflection provider.
///
/// For calls, surplus positional arguments are trimmed to the declared
/// arity and named-argument ids are dropped before handing off.
pub(crate) fn invoke_generic(
    provider: &dyn ReflectionProvider,
    this: &ObjectRef,
    member: &MemberInfo,
    op: InvokeKind,
    params: &DispParams,
) -> DispatchResult<Value> {
    if matches!(op, InvokeKind::Call | InvokeKind::CallOrGet) {
        let surplus = params.positional_count().saturating_sub(member.params.len());
        if surplus > 0 || !params.named.is_empty() {
            // positional arguments sit reversed, surplus ones at the front
            let trimmed = DispParams {
                args: params.args[params.named.len() + surplus..].to_vec(),
                named: Vec::new(),
            };
            return provider.invoke_generic(this, member.iface, member.id, op, &trimmed);
        }
    }
    provider.invoke_generic(this, member.iface, member.id, op, params)
}
