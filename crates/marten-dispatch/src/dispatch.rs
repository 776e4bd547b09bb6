//! The dispatch engine object embedded by host types.
//!
//! A [`Dispatch`] carries everything one instance needs: a handle to the
//! registry, the class definition, the lazily resolved descriptor, the
//! dynamic property store, the weak backreference to the owning object and
//! an optional proxy delegate. Host types embed one and delegate the
//! [`DispatchHost`] trait to it (see [`crate::impl_dispatch_host`]).

use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::trace;

use marten_core::{
    DispParams, DispatchError, DispatchHost, DispatchResult, ID_THIS, ID_VALUE, InvokeKind,
    MemberFlags, MemberId, MemberRange, ObjectRef, ResolveFlags, Value,
};

use crate::call;
use crate::class::{ClassDef, CompatMode};
use crate::descriptor::{ClassDescriptor, DispatchRegistry, MemberInfo};
use crate::dynamic::{DynamicData, WrapperSlot};
use crate::function::FunctionWrapper;

enum ModeSource {
    Fixed(CompatMode),
    /// Sampled when the descriptor is first needed; instances created
    /// before their environment settles on a mode use this.
    Deferred(Box<dyn Fn() -> CompatMode>),
}

/// Per-instance dispatch state.
pub struct Dispatch {
    registry: Arc<DispatchRegistry>,
    class: &'static ClassDef,
    mode_source: ModeSource,
    descriptor: OnceCell<Arc<ClassDescriptor>>,
    owner: RefCell<Option<Weak<dyn DispatchHost>>>,
    dynamic: RefCell<Option<Box<DynamicData>>>,
    proxy: RefCell<Option<ObjectRef>>,
}

impl Dispatch {
    /// Engine state for an instance of `class` under a fixed mode.
    pub fn new(registry: &Arc<DispatchRegistry>, class: &'static ClassDef, mode: CompatMode) -> Dispatch {
        Dispatch::with_mode_source(registry, class, ModeSource::Fixed(mode))
    }

    /// Engine state whose mode is sampled lazily, on first descriptor use.
    pub fn new_deferred(
        registry: &Arc<DispatchRegistry>,
        class: &'static ClassDef,
        mode_source: Box<dyn Fn() -> CompatMode>,
    ) -> Dispatch {
        Dispatch::with_mode_source(registry, class, ModeSource::Deferred(mode_source))
    }

    fn with_mode_source(
        registry: &Arc<DispatchRegistry>,
        class: &'static ClassDef,
        mode_source: ModeSource,
    ) -> Dispatch {
        Dispatch {
            registry: registry.clone(),
            class,
            mode_source,
            descriptor: OnceCell::new(),
            owner: RefCell::new(None),
            dynamic: RefCell::new(None),
            proxy: RefCell::new(None),
        }
    }

    /// Record the owning object. Called once, typically from
    /// `Rc::new_cyclic` while the owner is constructed.
    pub fn bind_owner(&self, owner: Weak<dyn DispatchHost>) {
        *self.owner.borrow_mut() = Some(owner);
    }

    /// The owning object, or [`DispatchError::ReleasedOwner`] when it was
    /// never bound or already dropped.
    pub fn owner(&self) -> DispatchResult<ObjectRef> {
        self.owner
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(DispatchError::ReleasedOwner)
    }

    fn owner_or(&self, this: &ObjectRef) -> Weak<dyn DispatchHost> {
        match self.owner.borrow().as_ref() {
            Some(weak) => weak.clone(),
            None => Rc::downgrade(this),
        }
    }

    /// Install (or clear) a proxy delegate. While present, every operation
    /// forwards to it verbatim.
    pub fn set_proxy(&self, delegate: Option<ObjectRef>) {
        *self.proxy.borrow_mut() = delegate;
    }

    fn proxy(&self) -> Option<ObjectRef> {
        self.proxy.borrow().clone()
    }

    /// The class this instance dispatches as.
    pub fn class(&self) -> &'static ClassDef {
        self.class
    }

    /// The registry this instance resolves through.
    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    /// Effective compatibility mode.
    pub fn mode(&self) -> CompatMode {
        if let Some(desc) = self.descriptor.get() {
            return desc.mode();
        }
        match &self.mode_source {
            ModeSource::Fixed(mode) => *mode,
            ModeSource::Deferred(sample) => sample(),
        }
    }

    fn descriptor(&self) -> DispatchResult<Arc<ClassDescriptor>> {
        if let Some(desc) = self.descriptor.get() {
            return Ok(desc.clone());
        }
        let built = self.registry.descriptor(self.class, self.mode())?;
        let _ = self.descriptor.set(built.clone());
        Ok(built)
    }

    /// Descriptive text of the instance: `"[object Name]"` in `Standard`
    /// mode, the anonymous `"[object]"` in earlier modes.
    pub fn display_string(&self) -> String {
        if self.mode() == CompatMode::Standard {
            format!("[object {}]", self.class.name)
        } else {
            "[object]".to_owned()
        }
    }

    /// Create the dynamic store on first need, running the class populate
    /// hook once.
    fn prepare_dynamic(&self) {
        let fresh = {
            let mut dynamic = self.dynamic.borrow_mut();
            if dynamic.is_none() {
                *dynamic = Some(Box::new(DynamicData::default()));
                true
            } else {
                false
            }
        };
        if fresh {
            if let Some(hooks) = self.class.hooks() {
                hooks.populate_dynamic(self);
            }
        }
    }

    /// Map a member name to its id.
    pub fn resolve_member_id(&self, name: &str, flags: ResolveFlags) -> DispatchResult<MemberId> {
        if let Some(proxy) = self.proxy() {
            return proxy.resolve_member_id(name, flags);
        }
        let desc = self.descriptor()?;
        if let Some(member) = desc.by_name(name, flags.case_insensitive) {
            return Ok(member.id);
        }
        if let Some(hooks) = self.class.hooks() {
            if let Some(id) = hooks.resolve_name(name, flags) {
                return Ok(id);
            }
        }
        self.prepare_dynamic();
        let mut dynamic = self.dynamic.borrow_mut();
        let data = dynamic.as_mut().ok_or(DispatchError::NotFound)?;
        if flags.ensure {
            let slot = data.ensure(name, flags.case_insensitive)?;
            Ok(MemberId::dynamic(slot))
        } else {
            data.find_live(name, flags.case_insensitive)
                .map(MemberId::dynamic)
                .ok_or(DispatchError::NotFound)
        }
    }

    /// Perform `op` on member `id`, with `this` as the receiver.
    pub fn invoke(
        &self,
        this: &ObjectRef,
        id: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        if let Some(proxy) = self.proxy() {
            return proxy.invoke(this, id, op, params);
        }
        trace!(class = self.class.name, id = %id, ?op, "invoke");
        match id.range() {
            MemberRange::Custom => match self.class.hooks() {
                Some(hooks) => hooks.invoke_custom(this, id, op, params),
                None => Err(DispatchError::NotFound),
            },
            MemberRange::Dynamic => self.invoke_dynamic(this, id, op, params),
            MemberRange::Builtin => self.invoke_builtin(this, id, op, params),
        }
    }

    fn invoke_dynamic(
        &self,
        this: &ObjectRef,
        id: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        let slot = id.dynamic_slot().ok_or(DispatchError::NotFound)?;
        match op {
            InvokeKind::Put => {
                let value = params.put_value().ok_or(DispatchError::InvalidArgument)?.clone();
                let mut dynamic = self.dynamic.borrow_mut();
                let prop = dynamic
                    .as_mut()
                    .and_then(|d| d.prop_mut(slot))
                    .ok_or(DispatchError::NotFound)?;
                trace!(name = &*prop.name, "dynamic put");
                prop.value = value;
                prop.deleted = false;
                Ok(Value::Empty)
            }
            InvokeKind::Get => {
                let dynamic = self.dynamic.borrow();
                let prop = dynamic
                    .as_deref()
                    .and_then(|d| d.prop(slot))
                    .ok_or(DispatchError::NotFound)?;
                if prop.deleted {
                    return Err(DispatchError::NotFound);
                }
                Ok(prop.value.clone())
            }
            InvokeKind::Call | InvokeKind::CallOrGet => {
                let value = {
                    let dynamic = self.dynamic.borrow();
                    dynamic
                        .as_deref()
                        .and_then(|d| d.prop(slot))
                        .map(|p| p.value.clone())
                        .ok_or(DispatchError::NotFound)?
                };
                match value.as_object() {
                    Some(target) => invoke_value_call(this, target, op, params),
                    None => Err(DispatchError::Unsupported("dynamic value is not callable")),
                }
            }
            InvokeKind::Construct => {
                Err(DispatchError::Unsupported("dynamic member is not constructible"))
            }
        }
    }

    fn invoke_builtin(
        &self,
        this: &ObjectRef,
        id: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        let desc = self.descriptor()?;
        if op == InvokeKind::Construct {
            if id == ID_VALUE {
                if let Some(hooks) = self.class.hooks() {
                    if let Some(result) = hooks.value(this, op, params) {
                        return result;
                    }
                }
            }
            return Err(DispatchError::Unsupported("construct is not supported"));
        }
        let Some(member) = desc.by_id(id) else {
            if id == ID_VALUE {
                return self.invoke_value(this, op, params);
            }
            return Err(DispatchError::NotFound);
        };
        if let Some(hook) = member.hook {
            if let Some(result) = hook(this, op, params) {
                return result;
            }
        }
        if member.is_method() {
            self.invoke_method_member(this, &desc, member, op, params)
        } else {
            self.invoke_prop_member(this, member, op, params)
        }
    }

    /// The reserved default-value member when the class declares no member
    /// under that id.
    fn invoke_value(
        &self,
        this: &ObjectRef,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        if let Some(hooks) = self.class.hooks() {
            if let Some(result) = hooks.value(this, op, params) {
                return result;
            }
        }
        match op {
            InvokeKind::Get => Ok(Value::text(self.display_string())),
            _ => Err(DispatchError::Unsupported("default value operation")),
        }
    }

    fn invoke_method_member(
        &self,
        this: &ObjectRef,
        desc: &Arc<ClassDescriptor>,
        member: &MemberInfo,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        match op {
            InvokeKind::Call | InvokeKind::CallOrGet => {
                // A reassigned slot redirects the call to the stored value.
                let redirected = {
                    let dynamic = self.dynamic.borrow();
                    dynamic
                        .as_deref()
                        .and_then(|d| d.wrapper_slot(member.wrapper_slot?))
                        .filter(|slot| slot.is_reassigned())
                        .map(|slot| slot.value.clone())
                };
                if let Some(value) = redirected {
                    return match value.as_object() {
                        Some(target) => invoke_value_call(this, target, op, params),
                        None => Err(DispatchError::Unsupported("stored method value is not callable")),
                    };
                }
                if member.generic {
                    call::invoke_generic(self.registry.provider().as_ref(), this, member, op, params)
                } else {
                    call::invoke_method(this, member, params)
                }
            }
            InvokeKind::Get => {
                if member.id == ID_VALUE {
                    return Ok(Value::text(self.display_string()));
                }
                self.with_wrapper_slot(this, desc, member, |slot| slot.value.clone())
            }
            InvokeKind::Put => {
                let value = params.put_value().ok_or(DispatchError::InvalidArgument)?.clone();
                trace!(name = %member.name, "method reassignment");
                self.with_wrapper_slot(this, desc, member, |slot| slot.value = value)?;
                Ok(Value::Empty)
            }
            InvokeKind::Construct => Err(DispatchError::Unsupported("construct is not supported")),
        }
    }

    fn invoke_prop_member(
        &self,
        this: &ObjectRef,
        member: &MemberInfo,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        if member.generic {
            return call::invoke_generic(self.registry.provider().as_ref(), this, member, op, params);
        }
        match op {
            InvokeKind::Get => call::invoke_getter(this, member, params),
            InvokeKind::Put => call::invoke_setter(this, member, params, self.mode()),
            InvokeKind::Call | InvokeKind::CallOrGet => {
                let value = call::invoke_getter(this, member, &DispParams::empty())?;
                if op == InvokeKind::CallOrGet && params.positional_count() == 0 {
                    return Ok(value);
                }
                match value.as_object() {
                    Some(target) => invoke_value_call(this, target, op, params),
                    None => Err(DispatchError::Unsupported("property value is not callable")),
                }
            }
            InvokeKind::Construct => Err(DispatchError::Unsupported("construct is not supported")),
        }
    }

    /// Run `f` over the member's wrapper slot, creating the wrapper on
    /// first access.
    fn with_wrapper_slot<R>(
        &self,
        this: &ObjectRef,
        desc: &Arc<ClassDescriptor>,
        member: &MemberInfo,
        f: impl FnOnce(&mut WrapperSlot) -> R,
    ) -> DispatchResult<R> {
        let index = member.wrapper_slot.ok_or(DispatchError::NotFound)?;
        self.prepare_dynamic();
        let mut dynamic = self.dynamic.borrow_mut();
        let data = dynamic.as_mut().ok_or(DispatchError::NotFound)?;
        let slot = data.wrapper_slot_mut(index, desc.wrapper_count());
        let entry = slot.get_or_insert_with(|| {
            trace!(name = %member.name, "creating function wrapper");
            let wrapper = FunctionWrapper::new(
                &self.registry,
                self.mode(),
                self.owner_or(this),
                desc.clone(),
                member.id,
            );
            WrapperSlot::new(wrapper)
        });
        Ok(f(entry))
    }

    /// Enumerate member ids: builtins ascending (methods excluded), then
    /// live dynamic slots in creation order.
    pub fn next_member(&self, last: Option<MemberId>) -> DispatchResult<Option<MemberId>> {
        if let Some(proxy) = self.proxy() {
            return proxy.next_member(last);
        }
        let dynamic_start = match last {
            Some(id) if id.range() == MemberRange::Dynamic => {
                id.dynamic_slot().ok_or(DispatchError::NotFound)? + 1
            }
            Some(id) if id.range() == MemberRange::Custom => return Ok(None),
            builtin_last => {
                let desc = self.descriptor()?;
                if let Some(next) = desc.next_enumerable(builtin_last)? {
                    return Ok(Some(next));
                }
                0
            }
        };
        self.prepare_dynamic();
        let dynamic = self.dynamic.borrow();
        Ok(dynamic.as_deref().and_then(|d| d.next_live(dynamic_start)))
    }

    /// Name of a builtin or dynamic member.
    pub fn member_name(&self, id: MemberId) -> DispatchResult<Arc<str>> {
        if let Some(proxy) = self.proxy() {
            return proxy.member_name(id);
        }
        match id.range() {
            MemberRange::Builtin => {
                let desc = self.descriptor()?;
                desc.by_id(id).map(|m| m.name.clone()).ok_or(DispatchError::NotFound)
            }
            MemberRange::Dynamic => {
                let slot = id.dynamic_slot().ok_or(DispatchError::NotFound)?;
                let dynamic = self.dynamic.borrow();
                dynamic
                    .as_deref()
                    .and_then(|d| d.prop(slot))
                    .map(|p| Arc::from(&*p.name))
                    .ok_or(DispatchError::NotFound)
            }
            MemberRange::Custom => Err(DispatchError::NotFound),
        }
    }

    /// Delete a member. Dynamic members tombstone; a reassigned builtin
    /// method is restored to its original wrapper; a builtin property is
    /// written `Empty`, falling back to clearing a same-named dynamic text
    /// slot when the write fails.
    pub fn delete_member(&self, id: MemberId) -> DispatchResult<bool> {
        if let Some(proxy) = self.proxy() {
            return proxy.delete_member(id);
        }
        if self.mode() == CompatMode::Quirks {
            return Err(DispatchError::Unsupported("member deletion in quirks mode"));
        }
        match id.range() {
            MemberRange::Dynamic => {
                let slot = id.dynamic_slot().ok_or(DispatchError::NotFound)?;
                let mut dynamic = self.dynamic.borrow_mut();
                Ok(dynamic.as_mut().is_some_and(|d| d.delete(slot)))
            }
            MemberRange::Custom => Err(DispatchError::Unsupported("custom members cannot be deleted")),
            MemberRange::Builtin => {
                let desc = self.descriptor()?;
                let member = desc.by_id(id).ok_or(DispatchError::NotFound)?;
                if let Some(index) = member.wrapper_slot {
                    let mut dynamic = self.dynamic.borrow_mut();
                    return Ok(dynamic
                        .as_mut()
                        .and_then(|d| d.wrapper_slot_existing(index))
                        .is_some_and(WrapperSlot::restore));
                }
                let owner = self.owner()?;
                match call::invoke_setter(&owner, member, &DispParams::put(Value::Empty), self.mode()) {
                    Ok(_) => Ok(true),
                    Err(_) => {
                        let mut dynamic = self.dynamic.borrow_mut();
                        let Some(data) = dynamic.as_mut() else { return Ok(false) };
                        let Some(slot) = data.find_live(&member.name, false) else {
                            return Ok(false);
                        };
                        match data.prop_mut(slot) {
                            Some(prop) if matches!(prop.value, Value::Text(_)) => {
                                prop.value = Value::Empty;
                                Ok(true)
                            }
                            _ => Ok(false),
                        }
                    }
                }
            }
        }
    }

    /// Attribute record for a member.
    pub fn member_flags(&self, id: MemberId) -> DispatchResult<MemberFlags> {
        if let Some(proxy) = self.proxy() {
            return proxy.member_flags(id);
        }
        match id.range() {
            MemberRange::Dynamic => {
                let slot = id.dynamic_slot().ok_or(DispatchError::NotFound)?;
                let dynamic = self.dynamic.borrow();
                if dynamic.as_deref().and_then(|d| d.prop(slot)).is_none() {
                    return Err(DispatchError::NotFound);
                }
                Ok(MemberFlags {
                    writable: true,
                    enumerable: true,
                    configurable: true,
                    is_method: false,
                    arity: 0,
                })
            }
            MemberRange::Custom => Ok(MemberFlags { writable: true, ..MemberFlags::default() }),
            MemberRange::Builtin => {
                let desc = self.descriptor()?;
                let member = desc.by_id(id).ok_or(DispatchError::NotFound)?;
                if let Some(index) = member.wrapper_slot {
                    let reassigned = {
                        let dynamic = self.dynamic.borrow();
                        dynamic
                            .as_deref()
                            .and_then(|d| d.wrapper_slot(index))
                            .is_some_and(WrapperSlot::is_reassigned)
                    };
                    return Ok(if reassigned {
                        MemberFlags { writable: true, configurable: true, ..MemberFlags::default() }
                    } else {
                        MemberFlags {
                            writable: true,
                            configurable: true,
                            is_method: true,
                            arity: member.arity(),
                            ..MemberFlags::default()
                        }
                    });
                }
                Ok(MemberFlags {
                    writable: member.put.is_some(),
                    enumerable: true,
                    configurable: true,
                    ..MemberFlags::default()
                })
            }
        }
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("class", &self.class.name)
            .field("mode", &self.mode())
            .finish()
    }
}

/// Invoke `target` as a function value with `receiver` rebound as the
/// implicit-receiver named argument.
pub(crate) fn invoke_value_call(
    receiver: &ObjectRef,
    target: &ObjectRef,
    op: InvokeKind,
    params: &DispParams,
) -> DispatchResult<Value> {
    if !params.named.is_empty() {
        return Err(DispatchError::Unsupported("named arguments in a rebound call"));
    }
    let mut args = Vec::with_capacity(params.args.len() + 1);
    args.push(Value::Object(receiver.clone()));
    args.extend(params.args.iter().cloned());
    let rebound = DispParams { args, named: vec![ID_THIS] };
    target.invoke(target, ID_VALUE, op, &rebound)
}
