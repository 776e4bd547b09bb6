//! The host-facing dispatch contract.
//!
//! [`DispatchHost`] is the trait every dispatchable object exposes: resolve a
//! member name to an id, invoke a member by id, enumerate, inspect and delete
//! members. A proxy delegate implements the same trait; an instance carrying
//! one forwards every operation to it verbatim.
//!
//! Instances are single-logical-owner: values hold `Rc` object references and
//! the engine performs no locking around instance state. The descriptor cache
//! is the only cross-thread structure.

use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::DispatchResult;
use crate::ids::{CapabilityId, ID_PUT, MemberId};
use crate::value::Value;

/// Shared reference to a dispatchable object.
pub type ObjectRef = Rc<dyn DispatchHost>;

/// The operation requested from [`DispatchHost::invoke`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    /// Read a property or obtain a method as a value.
    Get,
    /// Write a property.
    Put,
    /// Call a method.
    Call,
    /// Call, or read when the member turns out to be a plain value.
    CallOrGet,
    /// Construct via the reserved default-value member.
    Construct,
}

/// Name resolution options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveFlags {
    /// Match names ignoring ASCII case.
    pub case_insensitive: bool,
    /// Create a dynamic member (or revive a tombstoned one) when absent.
    pub ensure: bool,
}

impl ResolveFlags {
    /// Case-sensitive resolution that creates the member when absent.
    pub fn ensure() -> ResolveFlags {
        ResolveFlags { case_insensitive: false, ensure: true }
    }
}

/// Per-member attribute record reported by [`DispatchHost::member_flags`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemberFlags {
    /// The member accepts `Put`.
    pub writable: bool,
    /// The member is visited by enumeration.
    pub enumerable: bool,
    /// The member can be deleted or reassigned.
    pub configurable: bool,
    /// The member is a method.
    pub is_method: bool,
    /// Declared parameter count for methods, 0 otherwise.
    pub arity: usize,
}

/// Argument block for an invocation.
///
/// Positional arguments are stored in *reverse* declaration order: the last
/// element of `args` is the first declared parameter, matching the host
/// calling convention. Named arguments, when present, occupy the first
/// `named.len()` elements of `args`, with `named[i]` naming `args[i]`.
#[derive(Clone, Debug, Default)]
pub struct DispParams {
    /// Arguments, reverse positional order, named ones first.
    pub args: Vec<Value>,
    /// Ids naming the leading elements of `args`.
    pub named: Vec<MemberId>,
}

impl DispParams {
    /// No arguments.
    pub fn empty() -> DispParams {
        DispParams::default()
    }

    /// Positional call arguments given in declaration order.
    pub fn call(args_in_order: impl IntoIterator<Item = Value>) -> DispParams {
        let mut args: Vec<Value> = args_in_order.into_iter().collect();
        args.reverse();
        DispParams { args, named: Vec::new() }
    }

    /// A property assignment: one positional value, tagged with [`ID_PUT`].
    pub fn put(value: Value) -> DispParams {
        DispParams { args: vec![value], named: vec![ID_PUT] }
    }

    /// Number of positional (unnamed) arguments.
    pub fn positional_count(&self) -> usize {
        self.args.len() - self.named.len()
    }

    /// Positional argument `i` in declaration order, if supplied.
    pub fn positional(&self, i: usize) -> Option<&Value> {
        if i < self.positional_count() {
            Some(&self.args[self.args.len() - 1 - i])
        } else {
            None
        }
    }

    /// Whether the argument shape is a well-formed property assignment:
    /// exactly one positional value and at most an [`ID_PUT`] qualifier.
    pub fn is_put_shape(&self) -> bool {
        match self.named.as_slice() {
            [] => self.args.len() == 1,
            [id] => *id == ID_PUT && self.args.len() == 1,
            _ => false,
        }
    }

    /// The assigned value of a property-assignment shape.
    ///
    /// An [`ID_PUT`]-tagged value still counts as the single assignment
    /// argument; it is not hidden by the named qualifier.
    pub fn put_value(&self) -> Option<&Value> {
        if self.is_put_shape() { self.args.first() } else { None }
    }
}

/// The contract implemented by every dispatchable object.
///
/// Types embedding the engine implement this by delegation; externally
/// supplied proxy delegates implement it directly.
pub trait DispatchHost {
    /// Map a member name to its id.
    ///
    /// With [`ResolveFlags::ensure`], an unknown name allocates (or revives)
    /// a dynamic member and returns its stable id.
    fn resolve_member_id(&self, name: &str, flags: ResolveFlags) -> DispatchResult<MemberId>;

    /// Perform `op` on member `id`. `this` is the receiver, normally the
    /// object itself; function wrappers rebind it.
    fn invoke(
        &self,
        this: &ObjectRef,
        id: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value>;

    /// Enumerate member ids. `None` restarts; `Ok(None)` is the end.
    fn next_member(&self, last: Option<MemberId>) -> DispatchResult<Option<MemberId>>;

    /// Name of a builtin or dynamic member, case preserved.
    fn member_name(&self, id: MemberId) -> DispatchResult<Arc<str>>;

    /// Delete a member. Returns whether anything was removed or reset.
    fn delete_member(&self, id: MemberId) -> DispatchResult<bool>;

    /// Attribute record for a member.
    fn member_flags(&self, id: MemberId) -> DispatchResult<MemberFlags>;

    /// Query a native capability of this object.
    fn query_capability(&self, _cap: CapabilityId) -> Option<ObjectRef> {
        None
    }

    /// Downcast access for native entry points.
    fn as_any(&self) -> &dyn Any;
}
