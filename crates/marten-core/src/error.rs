//! Dispatch error types.

use thiserror::Error;

/// Errors returned by dispatch operations.
///
/// All failures are returned values; the engine never retries and never
/// swallows an error. `Native` carries a failure propagated verbatim from a
/// native entry point or the reflection provider.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Unknown member name or id.
    #[error("member not found")]
    NotFound,

    /// Wrong argument count or shape for the operation.
    #[error("invalid argument")]
    InvalidArgument,

    /// A growth step exhausted its id space or allocation budget.
    #[error("out of memory")]
    OutOfMemory,

    /// The operation kind is not valid for this member kind.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Failure propagated from a native call or the reflection provider.
    #[error("native call failed: {0}")]
    Native(String),

    /// Call through a function wrapper whose owning instance is gone.
    #[error("owner object released")]
    ReleasedOwner,
}

/// Result alias used throughout the dispatch engine.
pub type DispatchResult<T> = Result<T, DispatchError>;
