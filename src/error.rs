//! AllocError — the allocator's error taxonomy.

use std::fmt;

/// Kinds of failure the allocator can report. Pool exhaustion is
/// deliberately not one of them — see [`crate::FixedPoolAllocator::try_alloc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// `size == 0`, `alignment == 0`, or `alignment` not a power of two.
    InvalidArgument(&'static str),
    /// The OS refused the initial memory mapping.
    ResourceAcquisitionFailed(String),
    /// `free` was called with a null pointer or a pointer whose header
    /// sentinel did not match.
    InvalidOperation(&'static str),
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            AllocError::ResourceAcquisitionFailed(reason) => {
                write!(f, "failed to acquire region from the OS: {reason}")
            }
            AllocError::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for AllocError {}

pub type Result<T> = std::result::Result<T, AllocError>;
