//! Reflected member declarations and the provider that supplies them.
//!
//! A [`ReflectionProvider`] is the external source of class metadata: asked
//! once per source interface at descriptor build time, and again at runtime
//! for members that fall off the fast native path.

use std::sync::Arc;

use marten_core::{
    CapabilityId, ConstValue, DataType, DispParams, DispatchResult, InvokeKind, MemberId,
    ObjectRef, Value,
};

use crate::call::CallArgs;

/// Maximum declared parameter count for fast-path members.
pub const MAX_ARGS: usize = 16;

/// Identifier of a source interface a class declares members through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceId(pub u32);

/// Identifier of a registered class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Reserved for the engine's built-in function wrapper class.
    pub const FUNCTION: ClassId = ClassId(0);
}

/// Typed entry point of a native method. Receives the receiver object and
/// the marshalled arguments in declaration order; returns the call result
/// (`Value::Empty` for void).
pub type NativeMethod = fn(&ObjectRef, &CallArgs<'_>) -> DispatchResult<Value>;

/// Typed entry point of a native property getter.
pub type NativeGetter = fn(&ObjectRef) -> DispatchResult<Value>;

/// Typed entry point of a native property setter.
pub type NativeSetter = fn(&ObjectRef, &Value) -> DispatchResult<()>;

/// One declared method parameter.
#[derive(Clone, Debug)]
pub struct ParamDecl {
    /// Declared type.
    pub ty: DataType,
    /// Default substituted verbatim when the argument is omitted.
    pub default: Option<ConstValue>,
    /// Capability the engine re-queries object arguments for.
    pub capability: Option<CapabilityId>,
}

impl ParamDecl {
    /// Plain required parameter.
    pub fn required(ty: DataType) -> ParamDecl {
        ParamDecl { ty, default: None, capability: None }
    }

    /// Parameter with a declared default.
    pub fn with_default(ty: DataType, default: ConstValue) -> ParamDecl {
        ParamDecl { ty, default: Some(default), capability: None }
    }

    /// Object parameter constrained to a capability.
    pub fn capability(cap: CapabilityId) -> ParamDecl {
        ParamDecl { ty: DataType::Object, default: None, capability: Some(cap) }
    }
}

/// What a member declaration describes.
#[derive(Clone, Debug)]
pub enum DeclKind {
    /// A callable method.
    Method {
        /// Declared parameters, left to right.
        params: Vec<ParamDecl>,
        /// Declared return type, `None` for void.
        ret: Option<DataType>,
        /// Fast-path entry point, when one exists.
        entry: Option<NativeMethod>,
        /// The declaration carries optional or unbounded parameters.
        optional_params: bool,
    },
    /// A property getter.
    Getter {
        /// Declared property type.
        ty: DataType,
        /// Fast-path entry point, when one exists.
        entry: Option<NativeGetter>,
    },
    /// A property setter.
    Setter {
        /// Declared property type.
        ty: DataType,
        /// Fast-path entry point, when one exists.
        entry: Option<NativeSetter>,
    },
}

/// One member declaration returned by a provider.
#[derive(Clone, Debug)]
pub struct MemberDecl {
    /// Member id.
    pub id: MemberId,
    /// Member name.
    pub name: Arc<str>,
    /// Declaration payload.
    pub kind: DeclKind,
}

impl MemberDecl {
    /// Method declaration with a fast-path entry point.
    pub fn method(
        id: MemberId,
        name: &str,
        params: Vec<ParamDecl>,
        ret: Option<DataType>,
        entry: NativeMethod,
    ) -> MemberDecl {
        MemberDecl {
            id,
            name: name.into(),
            kind: DeclKind::Method { params, ret, entry: Some(entry), optional_params: false },
        }
    }

    /// Getter declaration with a fast-path entry point.
    pub fn getter(id: MemberId, name: &str, ty: DataType, entry: NativeGetter) -> MemberDecl {
        MemberDecl { id, name: name.into(), kind: DeclKind::Getter { ty, entry: Some(entry) } }
    }

    /// Setter declaration with a fast-path entry point.
    pub fn setter(id: MemberId, name: &str, ty: DataType, entry: NativeSetter) -> MemberDecl {
        MemberDecl { id, name: name.into(), kind: DeclKind::Setter { ty, entry: Some(entry) } }
    }
}

/// External source of reflected member metadata.
///
/// Consulted at descriptor build time for declarations, and at runtime to
/// invoke members whose declared shapes fall outside the fast native path.
pub trait ReflectionProvider: Send + Sync {
    /// Ordered member declarations of one source interface.
    fn interface_members(&self, iface: InterfaceId) -> DispatchResult<Vec<MemberDecl>>;

    /// Invoke a member through the provider's own mechanism.
    ///
    /// Used for members registered generic. Arguments arrive with surplus
    /// positions already trimmed to the declared arity.
    fn invoke_generic(
        &self,
        this: &ObjectRef,
        iface: InterfaceId,
        member: MemberId,
        op: InvokeKind,
        params: &DispParams,
    ) -> DispatchResult<Value>;
}
