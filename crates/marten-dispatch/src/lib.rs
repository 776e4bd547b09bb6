//! # Marten Dispatch
//!
//! The dynamic dispatch engine: reflected member tables, per-instance
//! dynamic properties and the invocation paths connecting them.
//!
//! ## Design Principles
//!
//! - **Build once, read everywhere**: class descriptors are immutable and
//!   cached per (class, compatibility mode) across threads
//! - **Stable ids**: a member name maps to the same id for the lifetime of
//!   an instance, deletions included
//! - **Native fast path**: declared methods and properties call typed entry
//!   points; everything else routes through the reflection provider
//! - **Single-owner instances**: per-instance state is `!Send` by
//!   construction; the descriptor cache is the only shared structure

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod call;
pub mod class;
pub mod descriptor;
pub mod dispatch;
mod dynamic;
pub mod function;
pub mod reflect;

pub use call::CallArgs;
pub use class::{ClassDef, ClassHooks, CompatMode, MemberHook, MemberHookDecl};
pub use descriptor::{ClassDescriptor, DescriptorBuilder, DispatchRegistry, MemberInfo};
pub use dispatch::Dispatch;
pub use function::{FUNCTION_CLASS, FunctionWrapper};
pub use reflect::{
    ClassId, DeclKind, InterfaceId, MAX_ARGS, MemberDecl, NativeGetter, NativeMethod, NativeSetter,
    ParamDecl, ReflectionProvider,
};

pub use marten_core::{
    CapabilityId, ConstValue, DataType, DispParams, DispatchError, DispatchHost, DispatchResult,
    ID_PUT, ID_THIS, ID_VALUE, InvokeKind, MemberFlags, MemberId, MemberRange, ObjectRef,
    ResolveFlags, Value,
};

/// Delegate the [`DispatchHost`] trait to an embedded [`Dispatch`] field.
///
/// Host types with extra trait methods (such as
/// [`DispatchHost::query_capability`]) implement the trait by hand instead.
#[macro_export]
macro_rules! impl_dispatch_host {
    ($ty:ty, $field:ident) => {
        impl $crate::DispatchHost for $ty {
            fn resolve_member_id(
                &self,
                name: &str,
                flags: $crate::ResolveFlags,
            ) -> $crate::DispatchResult<$crate::MemberId> {
                self.$field.resolve_member_id(name, flags)
            }

            fn invoke(
                &self,
                this: &$crate::ObjectRef,
                id: $crate::MemberId,
                op: $crate::InvokeKind,
                params: &$crate::DispParams,
            ) -> $crate::DispatchResult<$crate::Value> {
                self.$field.invoke(this, id, op, params)
            }

            fn next_member(
                &self,
                last: Option<$crate::MemberId>,
            ) -> $crate::DispatchResult<Option<$crate::MemberId>> {
                self.$field.next_member(last)
            }

            fn member_name(
                &self,
                id: $crate::MemberId,
            ) -> $crate::DispatchResult<::std::sync::Arc<str>> {
                self.$field.member_name(id)
            }

            fn delete_member(&self, id: $crate::MemberId) -> $crate::DispatchResult<bool> {
                self.$field.delete_member(id)
            }

            fn member_flags(
                &self,
                id: $crate::MemberId,
            ) -> $crate::DispatchResult<$crate::MemberFlags> {
                self.$field.member_flags(id)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}
