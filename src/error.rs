//! Crate-wide error type.
//!
//! Every mutating operation validates its preconditions and returns an
//! error *before* touching container state; there are no partially
//! applied mutations. Absence is not an error: lookups return `Option`
//! and `remove`-family operations are idempotent.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A required argument was missing or a configuration combination
    /// makes no sense (e.g. `keep_sorted` without a comparator).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A bounded container (or caller-supplied storage) is at capacity.
    #[error("no space left in container")]
    NoSpace,

    /// The key already exists in the bucket/table the insert targeted.
    #[error("duplicate key")]
    DuplicateKey,

    /// An order-dependent operation was requested on a container
    /// configured without a comparator.
    #[error("no comparator configured")]
    NoComparator,

    /// A splice-family operation received an empty operand.
    #[error("empty operand")]
    EmptyOperand,

    /// A defensive structural check failed. This indicates a bug in the
    /// container, not in the caller; surfaced rather than ignored.
    #[error("structural invariant violated: {0}")]
    StructuralInvariant(&'static str),

    /// A timed wait expired before the condition was signalled.
    #[error("timed out")]
    Timeout,
}
