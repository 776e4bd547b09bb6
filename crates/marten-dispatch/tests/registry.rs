//! Descriptor cache behavior: cross-thread sharing and deferred mode
//! resolution.

mod common;

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use common::*;
use marten_dispatch::{
    CompatMode, DispParams, Dispatch, DispatchHost, ID_VALUE, InvokeKind, ObjectRef, Value,
    impl_dispatch_host,
};

#[test]
fn concurrent_lookups_share_one_descriptor() {
    let registry = registry();
    let descriptors: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                scope.spawn(move || registry.descriptor(&COUNTER_CLASS, CompatMode::Standard).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for desc in &descriptors[1..] {
        assert!(Arc::ptr_eq(&descriptors[0], desc));
    }
}

#[test]
fn modes_build_distinct_descriptors() {
    let registry = registry();
    let standard = registry.descriptor(&COUNTER_CLASS, CompatMode::Standard).unwrap();
    let legacy = registry.descriptor(&COUNTER_CLASS, CompatMode::Legacy).unwrap();
    assert!(!Arc::ptr_eq(&standard, &legacy));
    assert_eq!(standard.members().len(), legacy.members().len());
}

#[test]
fn instances_share_the_cached_descriptor() {
    let registry = registry();
    let a: ObjectRef = counter(&registry, CompatMode::Standard);
    let b: ObjectRef = counter(&registry, CompatMode::Standard);
    // both instances resolve against the same table
    let id = a.resolve_member_id("value", Default::default()).unwrap();
    assert_eq!(b.resolve_member_id("value", Default::default()).unwrap(), id);
}

struct Lazy {
    dispatch: Dispatch,
}

impl_dispatch_host!(Lazy, dispatch);

#[test]
fn deferred_mode_is_sampled_on_first_use_and_sticks() {
    let registry = registry();
    let mode = Rc::new(Cell::new(CompatMode::Legacy));
    let sampled = mode.clone();
    let lazy: ObjectRef = Rc::new_cyclic(|weak: &Weak<Lazy>| {
        let dispatch = Dispatch::new_deferred(
            &registry,
            &THING_CLASS,
            Box::new(move || sampled.get()),
        );
        let weak_host: Weak<dyn DispatchHost> = weak.clone();
        dispatch.bind_owner(weak_host);
        Lazy { dispatch }
    });

    // first descriptor use samples Legacy
    let value = lazy.invoke(&lazy, ID_VALUE, InvokeKind::Get, &DispParams::empty()).unwrap();
    assert_eq!(value, Value::text("[object]"));

    // later mode changes no longer affect this instance
    mode.set(CompatMode::Standard);
    let value = lazy.invoke(&lazy, ID_VALUE, InvokeKind::Get, &DispParams::empty()).unwrap();
    assert_eq!(value, Value::text("[object]"));
}
