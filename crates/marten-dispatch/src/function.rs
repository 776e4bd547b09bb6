//! Function value wrappers.
//!
//! Reading a builtin method as a value yields a [`FunctionWrapper`]: a
//! dispatchable object of the reserved `Function` class that remembers the
//! declaring descriptor, the member and a weak link to the owning object.
//! Invoking the wrapper's default value calls the method on the owner;
//! `apply` and `call` rebind the receiver explicitly.

use std::any::Any;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use marten_core::{
    DispParams, DispatchError, DispatchHost, DispatchResult, InvokeKind, MemberId, ObjectRef,
    ResolveFlags, Value, coerce,
};

use crate::call;
use crate::class::{ClassDef, ClassHooks, CompatMode};
use crate::descriptor::{ClassDescriptor, DispatchRegistry, MemberInfo};
use crate::dispatch::Dispatch;
use crate::reflect::ClassId;

const APPLY_ID: MemberId = MemberId(marten_core::CUSTOM_BASE);
const CALL_ID: MemberId = MemberId(marten_core::CUSTOM_BASE + 1);

struct FunctionHooks;

static FUNCTION_HOOKS: FunctionHooks = FunctionHooks;

/// The reserved class every function wrapper dispatches as.
pub static FUNCTION_CLASS: ClassDef = ClassDef {
    id: ClassId::FUNCTION,
    name: "Function",
    interfaces: &[],
    hooks: Some(&FUNCTION_HOOKS),
};

fn wrapper_of(this: &ObjectRef) -> DispatchResult<&FunctionWrapper> {
    this.as_any().downcast_ref::<FunctionWrapper>().ok_or(DispatchError::InvalidArgument)
}

impl ClassHooks for FunctionHooks {
    fn value(
        &self,
        this: &ObjectRef,
        op: InvokeKind,
        params: &DispParams,
    ) -> Option<DispatchResult<Value>> {
        Some(match op {
            InvokeKind::Call | InvokeKind::CallOrGet => wrapper_of(this).and_then(|wrapper| {
                let owner = wrapper.owner()?;
                wrapper.invoke_wrapped(&owner, params)
            }),
            InvokeKind::Get => wrapper_of(this)
                .and_then(FunctionWrapper::name)
                .map(|name| Value::text(function_text(&name))),
            _ => Err(DispatchError::Unsupported("function value operation")),
        })
    }

    fn resolve_name(&self, name: &str, flags: ResolveFlags) -> Option<MemberId> {
        let matches = |prop: &str| {
            if flags.case_insensitive { name.eq_ignore_ascii_case(prop) } else { name == prop }
        };
        if matches("apply") {
            Some(APPLY_ID)
        } else if matches("call") {
            Some(CALL_ID)
        } else {
            None
        }
    }

    fn invoke_custom(
        &self,
        this: &ObjectRef,
        id: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        if id != APPLY_ID && id != CALL_ID {
            return Err(DispatchError::NotFound);
        }
        if !matches!(op, InvokeKind::Call | InvokeKind::CallOrGet) {
            return Err(DispatchError::Unsupported("function property is call-only"));
        }
        let wrapper = wrapper_of(this)?;
        if id == APPLY_ID { wrapper.apply(params) } else { wrapper.call(params) }
    }
}

/// The synthesized source text of a native function.
fn function_text(name: &str) -> String {
    format!("\nfunction {name}() {{\n    [native code]\n}}\n")
}

/// A builtin method reified as a standalone dispatchable value.
pub struct FunctionWrapper {
    dispatch: Dispatch,
    owner: Weak<dyn DispatchHost>,
    desc: Arc<ClassDescriptor>,
    member: MemberId,
}

impl FunctionWrapper {
    pub(crate) fn new(
        registry: &Arc<DispatchRegistry>,
        mode: CompatMode,
        owner: Weak<dyn DispatchHost>,
        desc: Arc<ClassDescriptor>,
        member: MemberId,
    ) -> Rc<FunctionWrapper> {
        Rc::new_cyclic(|weak: &Weak<FunctionWrapper>| {
            let dispatch = Dispatch::new(registry, &FUNCTION_CLASS, mode);
            let weak_host: Weak<dyn DispatchHost> = weak.clone();
            dispatch.bind_owner(weak_host);
            FunctionWrapper { dispatch, owner, desc, member }
        })
    }

    fn member_info(&self) -> DispatchResult<&MemberInfo> {
        self.desc.by_id(self.member).ok_or(DispatchError::NotFound)
    }

    /// The wrapped method's declared name.
    pub fn name(&self) -> DispatchResult<Arc<str>> {
        self.member_info().map(|m| m.name.clone())
    }

    /// The owning object, when still alive.
    pub fn owner(&self) -> DispatchResult<ObjectRef> {
        self.owner.upgrade().ok_or(DispatchError::ReleasedOwner)
    }

    fn invoke_wrapped(&self, receiver: &ObjectRef, params: &DispParams) -> DispatchResult<Value> {
        let member = self.member_info()?;
        if member.generic {
            call::invoke_generic(
                self.dispatch.registry().provider().as_ref(),
                receiver,
                member,
                InvokeKind::Call,
                params,
            )
        } else {
            call::invoke_method(receiver, member, params)
        }
    }

    /// `call(receiver, ...args)`: invoke on an explicit receiver with the
    /// remaining arguments.
    fn call(&self, params: &DispParams) -> DispatchResult<Value> {
        if !params.named.is_empty() {
            return Err(DispatchError::InvalidArgument);
        }
        let receiver = explicit_receiver(params)?;
        // drop the receiver; remaining args keep their reverse order
        let rest = DispParams {
            args: params.args[..params.args.len() - 1].to_vec(),
            named: Vec::new(),
        };
        self.invoke_wrapped(&receiver, &rest)
    }

    /// `apply(receiver, list?)`: expand an array-like object into
    /// positional arguments via its `length` member and decimal indices.
    fn apply(&self, params: &DispParams) -> DispatchResult<Value> {
        if !params.named.is_empty() {
            return Err(DispatchError::InvalidArgument);
        }
        let receiver = explicit_receiver(params)?;
        let mut expanded = Vec::new();
        if params.positional_count() >= 2 {
            let list = match params.positional(1) {
                Some(Value::Object(obj)) => obj.clone(),
                _ => return Err(DispatchError::InvalidArgument),
            };
            let length = array_like_length(&list)?;
            expanded.reserve(length);
            let mut buf = itoa::Buffer::new();
            for i in 0..length {
                match list.resolve_member_id(buf.format(i), ResolveFlags::default()) {
                    // a hole in the list is an omitted argument
                    Err(DispatchError::NotFound) => expanded.push(Value::Empty),
                    Err(_) => return Err(DispatchError::InvalidArgument),
                    Ok(id) => {
                        expanded.push(list.invoke(&list, id, InvokeKind::Get, &DispParams::empty())?)
                    }
                }
            }
        }
        self.invoke_wrapped(&receiver, &DispParams::call(expanded))
    }
}

/// First positional argument of `apply`/`call`, required to be a live
/// object reference.
fn explicit_receiver(params: &DispParams) -> DispatchResult<ObjectRef> {
    match params.positional(0) {
        Some(Value::Object(obj)) => Ok(obj.clone()),
        _ => Err(DispatchError::InvalidArgument),
    }
}

fn array_like_length(list: &ObjectRef) -> DispatchResult<usize> {
    let id = list
        .resolve_member_id("length", ResolveFlags::default())
        .map_err(|_| DispatchError::InvalidArgument)?;
    let value = list.invoke(list, id, InvokeKind::Get, &DispParams::empty())?;
    let length = match value {
        Value::Int(n) => n,
        other => match coerce(&other, marten_core::DataType::Int) {
            Ok(Value::Int(n)) => n,
            _ => return Err(DispatchError::InvalidArgument),
        },
    };
    usize::try_from(length).map_err(|_| DispatchError::InvalidArgument)
}

impl DispatchHost for FunctionWrapper {
    fn resolve_member_id(&self, name: &str, flags: ResolveFlags) -> DispatchResult<MemberId> {
        self.dispatch.resolve_member_id(name, flags)
    }

    fn invoke(
        &self,
        this: &ObjectRef,
        id: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        self.dispatch.invoke(this, id, op, params)
    }

    fn next_member(&self, last: Option<MemberId>) -> DispatchResult<Option<MemberId>> {
        self.dispatch.next_member(last)
    }

    fn member_name(&self, id: MemberId) -> DispatchResult<Arc<str>> {
        self.dispatch.member_name(id)
    }

    fn delete_member(&self, id: MemberId) -> DispatchResult<bool> {
        self.dispatch.delete_member(id)
    }

    fn member_flags(&self, id: MemberId) -> DispatchResult<marten_core::MemberFlags> {
        self.dispatch.member_flags(id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_text_shape() {
        assert_eq!(function_text("item"), "\nfunction item() {\n    [native code]\n}\n");
    }

    #[test]
    fn apply_and_call_resolve_with_case_rules() {
        let hooks = FunctionHooks;
        assert_eq!(hooks.resolve_name("apply", ResolveFlags::default()), Some(APPLY_ID));
        assert_eq!(hooks.resolve_name("call", ResolveFlags::default()), Some(CALL_ID));
        assert_eq!(hooks.resolve_name("Apply", ResolveFlags::default()), None);
        let insensitive = ResolveFlags { case_insensitive: true, ..ResolveFlags::default() };
        assert_eq!(hooks.resolve_name("Apply", insensitive), Some(APPLY_ID));
        assert_eq!(hooks.resolve_name("bind", insensitive), None);
    }

    #[test]
    fn explicit_receiver_must_be_an_object() {
        assert!(matches!(
            explicit_receiver(&DispParams::call([Value::Int(1)])),
            Err(DispatchError::InvalidArgument)
        ));
        assert!(matches!(
            explicit_receiver(&DispParams::empty()),
            Err(DispatchError::InvalidArgument)
        ));
    }
}
