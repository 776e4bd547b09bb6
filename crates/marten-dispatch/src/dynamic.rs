//! Per-instance dynamic property storage.
//!
//! Dynamic properties live in creation order and keep their slot (and thus
//! their member id) for the lifetime of the instance. Deletion leaves a
//! tombstone behind so a later re-creation of the same name revives the
//! original id. The same arena carries the lazily built method wrapper
//! slots of the instance.

use std::rc::Rc;

use tracing::trace;

use marten_core::{DYNAMIC_BASE, DYNAMIC_MAX, DispatchError, DispatchResult, MemberId, Value};

use crate::function::FunctionWrapper;

/// Largest number of dynamic slots one instance can hold.
const MAX_SLOTS: usize = (DYNAMIC_MAX - DYNAMIC_BASE) as usize + 1;

/// One dynamic property slot.
pub(crate) struct DynamicProp {
    pub name: Box<str>,
    pub value: Value,
    pub deleted: bool,
}

/// Per-instance cache slot of one builtin method.
///
/// `value` is what the member currently exposes; it starts as the wrapper
/// object itself and assignment replaces it (method reassignment).
pub(crate) struct WrapperSlot {
    pub wrapper: Rc<FunctionWrapper>,
    pub value: Value,
}

impl WrapperSlot {
    pub fn new(wrapper: Rc<FunctionWrapper>) -> WrapperSlot {
        let value = Value::Object(wrapper.clone());
        WrapperSlot { wrapper, value }
    }

    /// Whether assignment replaced the original wrapper.
    pub fn is_reassigned(&self) -> bool {
        match &self.value {
            Value::Object(obj) => {
                !std::ptr::eq(Rc::as_ptr(obj).cast::<()>(), Rc::as_ptr(&self.wrapper).cast::<()>())
            }
            _ => true,
        }
    }

    /// Put the original wrapper back. Returns whether anything changed.
    pub fn restore(&mut self) -> bool {
        if !self.is_reassigned() {
            return false;
        }
        self.value = Value::Object(self.wrapper.clone());
        true
    }
}

/// Lazily allocated dynamic state of one instance.
#[derive(Default)]
pub(crate) struct DynamicData {
    props: Vec<DynamicProp>,
    wrappers: Vec<Option<WrapperSlot>>,
}

impl DynamicData {
    /// Position of `name` among all slots, tombstones included.
    pub fn find(&self, name: &str, case_insensitive: bool) -> Option<usize> {
        self.props.iter().position(|p| {
            if case_insensitive { p.name.eq_ignore_ascii_case(name) } else { *p.name == *name }
        })
    }

    /// Slot holding a live property named `name`.
    pub fn find_live(&self, name: &str, case_insensitive: bool) -> Option<usize> {
        self.find(name, case_insensitive).filter(|&slot| !self.props[slot].deleted)
    }

    /// Slot of `name`, reviving a tombstone or appending a fresh slot.
    pub fn ensure(&mut self, name: &str, case_insensitive: bool) -> DispatchResult<usize> {
        if let Some(slot) = self.find(name, case_insensitive) {
            let prop = &mut self.props[slot];
            if prop.deleted {
                trace!(name, slot, "reviving tombstoned dynamic property");
                prop.deleted = false;
                prop.value = Value::Empty;
            }
            return Ok(slot);
        }
        if self.props.len() == MAX_SLOTS {
            return Err(DispatchError::OutOfMemory);
        }
        if self.props.is_empty() {
            self.props.reserve(4);
        }
        let slot = self.props.len();
        trace!(name, slot, "adding dynamic property");
        self.props.push(DynamicProp { name: name.into(), value: Value::Empty, deleted: false });
        Ok(slot)
    }

    pub fn prop(&self, slot: usize) -> Option<&DynamicProp> {
        self.props.get(slot)
    }

    pub fn prop_mut(&mut self, slot: usize) -> Option<&mut DynamicProp> {
        self.props.get_mut(slot)
    }

    /// Id of the first live slot at or after `start`.
    pub fn next_live(&self, start: usize) -> Option<MemberId> {
        self.props[start.min(self.props.len())..]
            .iter()
            .zip(start..)
            .find(|(p, _)| !p.deleted)
            .map(|(_, slot)| MemberId::dynamic(slot))
    }

    pub fn slot_count(&self) -> usize {
        self.props.len()
    }

    /// Tombstone a slot. Returns whether a live property was removed.
    pub fn delete(&mut self, slot: usize) -> bool {
        match self.props.get_mut(slot) {
            Some(prop) if !prop.deleted => {
                prop.deleted = true;
                prop.value = Value::Empty;
                true
            }
            _ => false,
        }
    }

    /// Wrapper slot accessor, growing the arena to `count` slots on first use.
    pub fn wrapper_slot_mut(&mut self, slot: usize, count: usize) -> &mut Option<WrapperSlot> {
        if self.wrappers.len() < count {
            self.wrappers.resize_with(count, || None);
        }
        &mut self.wrappers[slot]
    }

    /// Wrapper slot accessor that never grows the arena.
    pub fn wrapper_slot(&self, slot: usize) -> Option<&WrapperSlot> {
        self.wrappers.get(slot).and_then(Option::as_ref)
    }

    /// Mutable access to an already created wrapper slot.
    pub fn wrapper_slot_existing(&mut self, slot: usize) -> Option<&mut WrapperSlot> {
        self.wrappers.get_mut(slot).and_then(Option::as_mut)
    }
}
