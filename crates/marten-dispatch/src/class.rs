//! Class definitions and the hook surface classes customize dispatch with.

use marten_core::{DispParams, DispatchResult, InvokeKind, MemberId, ObjectRef, ResolveFlags, Value};

use crate::descriptor::DescriptorBuilder;
use crate::dispatch::Dispatch;
use crate::reflect::{ClassId, InterfaceId};

/// Compatibility mode selecting among alternate reflected descriptors for
/// the same class, and a handful of behavior switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompatMode {
    /// Oldest behavior: member deletion unsupported, anonymous display string.
    Quirks,
    /// Deletion supported; writes to read-only properties fail loudly.
    Legacy,
    /// Current behavior: named display string, silent writes to read-only
    /// properties.
    #[default]
    Standard,
}

/// Per-member override hook.
///
/// Consulted before the engine's own handling of a builtin member.
/// `None` declines and lets the standard handling proceed; `Some` is final.
pub type MemberHook =
    fn(this: &ObjectRef, op: InvokeKind, params: &DispParams) -> Option<DispatchResult<Value>>;

/// Hook-table entry applied to one declared member during descriptor build.
#[derive(Clone, Copy, Debug)]
pub struct MemberHookDecl {
    /// The member the entry applies to.
    pub id: MemberId,
    /// Override hook; `None` suppresses the member entirely.
    pub invoke: Option<MemberHook>,
}

/// Class-supplied customization points.
///
/// Every method has a declining default, so classes implement only what
/// they need. Hook objects are `'static` and shared; instance state reaches
/// them through the passed receiver.
pub trait ClassHooks: Sync {
    /// Inject member declarations before the class interfaces are processed,
    /// optionally attaching per-member hook tables.
    fn init_members(&self, _builder: &mut DescriptorBuilder, _mode: CompatMode) -> DispatchResult<()> {
        Ok(())
    }

    /// Handle the reserved default-value member ([`marten_core::ID_VALUE`]).
    /// `None` defers to the engine's default (a `Get` yields the display
    /// string; `Construct` becomes unsupported).
    fn value(
        &self,
        _this: &ObjectRef,
        _op: InvokeKind,
        _params: &DispParams,
    ) -> Option<DispatchResult<Value>> {
        None
    }

    /// Resolve a name the reflected table does not know. Consulted before
    /// the dynamic store.
    fn resolve_name(&self, _name: &str, _flags: ResolveFlags) -> Option<MemberId> {
        None
    }

    /// Handle an operation on the class-custom id range.
    fn invoke_custom(
        &self,
        _this: &ObjectRef,
        _id: MemberId,
        _op: InvokeKind,
        _params: &DispParams,
    ) -> DispatchResult<Value> {
        Err(marten_core::DispatchError::NotFound)
    }

    /// Seed the dynamic property store when it is first created.
    fn populate_dynamic(&self, _dispatch: &Dispatch) {}
}

/// Static description of a dispatchable class.
///
/// One `ClassDef` exists per class, with `'static` lifetime; descriptors
/// built from it are cached per compatibility mode.
pub struct ClassDef {
    /// Unique class id ([`ClassId::FUNCTION`] is reserved).
    pub id: ClassId,
    /// Class name, used in the display string.
    pub name: &'static str,
    /// Source interfaces contributing members, in precedence order.
    pub interfaces: &'static [InterfaceId],
    /// Customization hooks.
    pub hooks: Option<&'static dyn ClassHooks>,
}

impl ClassDef {
    pub(crate) fn hooks(&self) -> Option<&'static dyn ClassHooks> {
        self.hooks
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .finish()
    }
}
