//! Class hook coverage: injected interfaces, per-member overrides, the
//! value hook and dynamic-store seeding.

mod common;

use std::rc::{Rc, Weak};

use common::*;
use marten_dispatch::{
    ClassDef, ClassHooks, ClassId, CompatMode, DescriptorBuilder, DispParams, Dispatch,
    DispatchError, DispatchHost, DispatchResult, ID_VALUE, InvokeKind, MemberHookDecl, ObjectRef,
    ResolveFlags, Value, impl_dispatch_host,
};

struct GadgetHooks;

impl ClassHooks for GadgetHooks {
    fn init_members(
        &self,
        builder: &mut DescriptorBuilder,
        _mode: CompatMode,
    ) -> DispatchResult<()> {
        builder.add_interface(
            IFACE_GADGET,
            &[
                MemberHookDecl { id: ID_KIND, invoke: Some(kind_hook) },
                MemberHookDecl { id: ID_HIDDEN, invoke: None },
            ],
        )
    }

    fn value(
        &self,
        _this: &ObjectRef,
        op: InvokeKind,
        _params: &DispParams,
    ) -> Option<DispatchResult<Value>> {
        matches!(op, InvokeKind::Construct).then(|| Ok(Value::text("made by Gadget")))
    }

    fn populate_dynamic(&self, dispatch: &Dispatch) {
        if let Ok(id) = dispatch.resolve_member_id("seeded", ResolveFlags::ensure()) {
            if let Ok(owner) = dispatch.owner() {
                let _ =
                    dispatch.invoke(&owner, id, InvokeKind::Put, &DispParams::put(Value::Int(1)));
            }
        }
    }
}

fn kind_hook(
    _this: &ObjectRef,
    op: InvokeKind,
    _params: &DispParams,
) -> Option<DispatchResult<Value>> {
    matches!(op, InvokeKind::Get).then(|| Ok(Value::text("hooked")))
}

static GADGET_HOOKS: GadgetHooks = GadgetHooks;

static GADGET_CLASS: ClassDef =
    ClassDef { id: ClassId(3), name: "Gadget", interfaces: &[], hooks: Some(&GADGET_HOOKS) };

struct Gadget {
    dispatch: Dispatch,
}

impl_dispatch_host!(Gadget, dispatch);

fn gadget() -> ObjectRef {
    let gadget = Rc::new_cyclic(|weak: &Weak<Gadget>| {
        let dispatch = Dispatch::new(&registry(), &GADGET_CLASS, CompatMode::Standard);
        let weak_host: Weak<dyn DispatchHost> = weak.clone();
        dispatch.bind_owner(weak_host);
        Gadget { dispatch }
    });
    gadget
}

#[test]
fn hook_table_overrides_and_suppresses_members() {
    let g = gadget();
    // the per-member hook is consulted first and its answer is final
    assert_eq!(get(&g, "kind").unwrap(), Value::text("hooked"));
    // members without a hook go through the normal entry point
    assert_eq!(call(&g, "ping", vec![]).unwrap(), Value::Int(7));
    // a hook entry without an override drops the member entirely
    assert_eq!(get(&g, "hidden"), Err(DispatchError::NotFound));
}

#[test]
fn declined_hook_operations_fall_through() {
    let g = gadget();
    // the hook only answers Get; a call of a plain property still fails
    // in the standard way rather than through the hook
    let id = g.resolve_member_id("kind", ResolveFlags::default()).unwrap();
    assert_eq!(id, ID_KIND);
    assert_eq!(
        g.invoke(&g, id, InvokeKind::CallOrGet, &DispParams::empty()).unwrap(),
        Value::text("plain")
    );
}

#[test]
fn value_hook_handles_construct_and_defers_display() {
    let g = gadget();
    let made = g.invoke(&g, ID_VALUE, InvokeKind::Construct, &DispParams::empty()).unwrap();
    assert_eq!(made, Value::text("made by Gadget"));
    // the hook declines Get, leaving the default display string
    let shown = g.invoke(&g, ID_VALUE, InvokeKind::Get, &DispParams::empty()).unwrap();
    assert_eq!(shown, Value::text("[object Gadget]"));
}

#[test]
fn populate_hook_seeds_the_dynamic_store() {
    let g = gadget();
    assert_eq!(get(&g, "seeded").unwrap(), Value::Int(1));
    // a seeded member behaves like any other dynamic property
    put(&g, "seeded", Value::Int(2)).unwrap();
    assert_eq!(get(&g, "seeded").unwrap(), Value::Int(2));
}
