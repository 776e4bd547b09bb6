//! Shared test fixtures: a `Counter` class with reflected members and a
//! bare `Thing` class for dynamic-property scenarios.
#![allow(dead_code)]

use std::any::Any;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use marten_dispatch::{
    CallArgs, CapabilityId, ClassDef, ClassId, CompatMode, ConstValue, DataType, DeclKind,
    DispParams, Dispatch, DispatchError, DispatchHost, DispatchRegistry, DispatchResult,
    InterfaceId, InvokeKind, MemberDecl, MemberFlags, MemberId, ObjectRef, ParamDecl,
    ReflectionProvider, ResolveFlags, Value, impl_dispatch_host,
};

pub const IFACE_COUNTER: InterfaceId = InterfaceId(1);

pub const ID_COUNT: MemberId = MemberId(10);
pub const ID_INCREMENT: MemberId = MemberId(11);
pub const ID_ADD: MemberId = MemberId(12);
pub const ID_LABEL: MemberId = MemberId(13);
pub const ID_DESCRIBE: MemberId = MemberId(14);
pub const ID_ATTACH: MemberId = MemberId(15);

pub const CAP_SINK: CapabilityId = CapabilityId(7);

pub const IFACE_GADGET: InterfaceId = InterfaceId(2);

pub const ID_KIND: MemberId = MemberId(20);
pub const ID_PING: MemberId = MemberId(21);
pub const ID_HIDDEN: MemberId = MemberId(22);

pub static COUNTER_CLASS: ClassDef = ClassDef {
    id: ClassId(1),
    name: "Counter",
    interfaces: &[IFACE_COUNTER],
    hooks: None,
};

pub static THING_CLASS: ClassDef =
    ClassDef { id: ClassId(2), name: "Thing", interfaces: &[], hooks: None };

pub struct TestProvider;

impl ReflectionProvider for TestProvider {
    fn interface_members(&self, iface: InterfaceId) -> DispatchResult<Vec<MemberDecl>> {
        if iface == IFACE_GADGET {
            return Ok(vec![
                MemberDecl::getter(ID_KIND, "kind", DataType::Text, gadget_get_kind),
                MemberDecl::method(ID_PING, "ping", vec![], Some(DataType::Int), gadget_ping),
                MemberDecl::getter(ID_HIDDEN, "hidden", DataType::Int, gadget_get_hidden),
            ]);
        }
        if iface != IFACE_COUNTER {
            return Err(DispatchError::NotFound);
        }
        Ok(vec![
            MemberDecl::getter(ID_COUNT, "value", DataType::Int, counter_get_value),
            MemberDecl::setter(ID_COUNT, "value", DataType::Int, counter_set_value),
            MemberDecl::getter(ID_LABEL, "label", DataType::Text, counter_get_label),
            MemberDecl::method(ID_INCREMENT, "increment", vec![], Some(DataType::Int), counter_increment),
            MemberDecl::method(
                ID_ADD,
                "add",
                vec![
                    ParamDecl::required(DataType::Int),
                    ParamDecl::with_default(DataType::Int, ConstValue::Int(0)),
                    ParamDecl::with_default(DataType::Int, ConstValue::Int(9)),
                ],
                Some(DataType::Int),
                counter_add,
            ),
            // no fast-path entry, routed through invoke_generic
            MemberDecl {
                id: ID_DESCRIBE,
                name: "describe".into(),
                kind: DeclKind::Method {
                    params: vec![ParamDecl::required(DataType::Int)],
                    ret: Some(DataType::Text),
                    entry: None,
                    optional_params: false,
                },
            },
            MemberDecl::method(
                ID_ATTACH,
                "attach",
                vec![ParamDecl::capability(CAP_SINK)],
                Some(DataType::Int),
                counter_attach,
            ),
        ])
    }

    fn invoke_generic(
        &self,
        this: &ObjectRef,
        iface: InterfaceId,
        member: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value> {
        if iface == IFACE_COUNTER && member == ID_DESCRIBE {
            return match op {
                InvokeKind::Call | InvokeKind::CallOrGet => {
                    let count = counter_of(this)?.count.get();
                    Ok(Value::text(format!("Counter({count})/{}", params.positional_count())))
                }
                _ => Err(DispatchError::Unsupported("describe is call-only")),
            };
        }
        Err(DispatchError::Native("unexpected generic member".into()))
    }
}

pub struct Counter {
    pub dispatch: Dispatch,
    pub count: Cell<i32>,
}

impl_dispatch_host!(Counter, dispatch);

pub struct Thing {
    pub dispatch: Dispatch,
}

impl_dispatch_host!(Thing, dispatch);

fn counter_of(this: &ObjectRef) -> DispatchResult<&Counter> {
    this.as_any().downcast_ref().ok_or(DispatchError::InvalidArgument)
}

fn counter_get_value(this: &ObjectRef) -> DispatchResult<Value> {
    Ok(Value::Int(counter_of(this)?.count.get()))
}

fn counter_set_value(this: &ObjectRef, value: &Value) -> DispatchResult<()> {
    match value {
        Value::Int(n) => {
            counter_of(this)?.count.set(*n);
            Ok(())
        }
        _ => Err(DispatchError::InvalidArgument),
    }
}

fn counter_get_label(_this: &ObjectRef) -> DispatchResult<Value> {
    Ok(Value::text("counter"))
}

fn counter_increment(this: &ObjectRef, _args: &CallArgs<'_>) -> DispatchResult<Value> {
    let counter = counter_of(this)?;
    counter.count.set(counter.count.get() + 1);
    Ok(Value::Int(counter.count.get()))
}

fn counter_add(this: &ObjectRef, args: &CallArgs<'_>) -> DispatchResult<Value> {
    let _ = counter_of(this)?;
    let mut sum = 0;
    for i in 0..3 {
        sum += match args.arg(i) {
            Value::Int(n) => *n,
            _ => return Err(DispatchError::InvalidArgument),
        };
    }
    Ok(Value::Int(sum))
}

fn counter_attach(this: &ObjectRef, args: &CallArgs<'_>) -> DispatchResult<Value> {
    let _ = counter_of(this)?;
    match args.arg(0) {
        Value::Null => Ok(Value::Int(-1)),
        Value::Object(facet) => {
            let sink: &Sink =
                facet.as_any().downcast_ref().ok_or(DispatchError::InvalidArgument)?;
            sink.taps.set(sink.taps.get() + 1);
            Ok(Value::Int(sink.taps.get()))
        }
        _ => Err(DispatchError::InvalidArgument),
    }
}

fn gadget_get_kind(_this: &ObjectRef) -> DispatchResult<Value> {
    Ok(Value::text("plain"))
}

fn gadget_ping(_this: &ObjectRef, _args: &CallArgs<'_>) -> DispatchResult<Value> {
    Ok(Value::Int(7))
}

fn gadget_get_hidden(_this: &ObjectRef) -> DispatchResult<Value> {
    Ok(Value::Int(9))
}

/// Facet handed out by [`Outlet::query_capability`] for [`CAP_SINK`].
pub struct Sink {
    pub taps: Cell<i32>,
}

impl DispatchHost for Sink {
    fn resolve_member_id(&self, _name: &str, _flags: ResolveFlags) -> DispatchResult<MemberId> {
        Err(DispatchError::NotFound)
    }
    fn invoke(
        &self,
        _this: &ObjectRef,
        _id: MemberId,
        _op: InvokeKind,
        _params: &DispParams,
    ) -> DispatchResult<Value> {
        Err(DispatchError::NotFound)
    }
    fn next_member(&self, _last: Option<MemberId>) -> DispatchResult<Option<MemberId>> {
        Ok(None)
    }
    fn member_name(&self, _id: MemberId) -> DispatchResult<Arc<str>> {
        Err(DispatchError::NotFound)
    }
    fn delete_member(&self, _id: MemberId) -> DispatchResult<bool> {
        Ok(false)
    }
    fn member_flags(&self, _id: MemberId) -> DispatchResult<MemberFlags> {
        Err(DispatchError::NotFound)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Host that exposes its [`Sink`] through a capability query.
pub struct Outlet {
    pub sink: Rc<Sink>,
}

impl DispatchHost for Outlet {
    fn resolve_member_id(&self, _name: &str, _flags: ResolveFlags) -> DispatchResult<MemberId> {
        Err(DispatchError::NotFound)
    }
    fn invoke(
        &self,
        _this: &ObjectRef,
        _id: MemberId,
        _op: InvokeKind,
        _params: &DispParams,
    ) -> DispatchResult<Value> {
        Err(DispatchError::NotFound)
    }
    fn next_member(&self, _last: Option<MemberId>) -> DispatchResult<Option<MemberId>> {
        Ok(None)
    }
    fn member_name(&self, _id: MemberId) -> DispatchResult<Arc<str>> {
        Err(DispatchError::NotFound)
    }
    fn delete_member(&self, _id: MemberId) -> DispatchResult<bool> {
        Ok(false)
    }
    fn member_flags(&self, _id: MemberId) -> DispatchResult<MemberFlags> {
        Err(DispatchError::NotFound)
    }
    fn query_capability(&self, cap: CapabilityId) -> Option<ObjectRef> {
        if cap == CAP_SINK {
            let facet: ObjectRef = self.sink.clone();
            Some(facet)
        } else {
            None
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn registry() -> Arc<DispatchRegistry> {
    DispatchRegistry::new(Arc::new(TestProvider))
}

pub fn counter(registry: &Arc<DispatchRegistry>, mode: CompatMode) -> Rc<Counter> {
    Rc::new_cyclic(|weak: &Weak<Counter>| {
        let dispatch = Dispatch::new(registry, &COUNTER_CLASS, mode);
        let weak_host: Weak<dyn DispatchHost> = weak.clone();
        dispatch.bind_owner(weak_host);
        Counter { dispatch, count: Cell::new(0) }
    })
}

pub fn thing(registry: &Arc<DispatchRegistry>, mode: CompatMode) -> Rc<Thing> {
    Rc::new_cyclic(|weak: &Weak<Thing>| {
        let dispatch = Dispatch::new(registry, &THING_CLASS, mode);
        let weak_host: Weak<dyn DispatchHost> = weak.clone();
        dispatch.bind_owner(weak_host);
        Thing { dispatch }
    })
}

/// Resolve `name` case-sensitively and read it.
pub fn get(obj: &ObjectRef, name: &str) -> DispatchResult<Value> {
    let id = obj.resolve_member_id(name, ResolveFlags::default())?;
    obj.invoke(obj, id, InvokeKind::Get, &DispParams::empty())
}

/// Resolve `name` (creating it when absent) and assign it.
pub fn put(obj: &ObjectRef, name: &str, value: Value) -> DispatchResult<()> {
    let id = obj.resolve_member_id(name, ResolveFlags::ensure())?;
    obj.invoke(obj, id, InvokeKind::Put, &DispParams::put(value))?;
    Ok(())
}

/// Resolve `name` and call it with positional arguments.
pub fn call(obj: &ObjectRef, name: &str, args: Vec<Value>) -> DispatchResult<Value> {
    let id = obj.resolve_member_id(name, ResolveFlags::default())?;
    obj.invoke(obj, id, InvokeKind::Call, &DispParams::call(args))
}
