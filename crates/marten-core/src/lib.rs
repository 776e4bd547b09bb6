//! # Marten Core
//!
//! The dispatch contract shared by hosts, native objects and the engine in
//! `marten-dispatch`.
//!
//! ## Design Principles
//!
//! - **Stable ids**: every member is addressed by an integer id partitioned
//!   into disjoint builtin/custom/dynamic ranges
//! - **Loose values, strict calls**: hosts pass [`Value`]s; declared native
//!   signatures drive coercion at the call boundary
//! - **Single-owner instances**: object references are `Rc`-based and not
//!   `Send`; only reflected class metadata crosses threads

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod host;
pub mod ids;
pub mod value;

pub use convert::coerce;
pub use error::{DispatchError, DispatchResult};
pub use host::{DispParams, DispatchHost, InvokeKind, MemberFlags, ObjectRef, ResolveFlags};
pub use ids::{
    CUSTOM_BASE, CUSTOM_MAX, CapabilityId, DYNAMIC_BASE, DYNAMIC_MAX, ID_PUT, ID_THIS, ID_VALUE,
    MemberId, MemberRange,
};
pub use value::{ConstValue, DataType, Value};
