//! A user-space allocator that maps a single fixed-size region from the
//! host OS once and sub-allocates variable-size, alignment-constrained
//! blocks out of it for the rest of its life.
//!
//! The engineering lives in three collaborating internal pieces: a region
//! manager owning the page-mapped span, a free-list engine (an
//! address-ordered intrusive list threaded through the free bytes
//! themselves), and an allocation engine driving first-fit search,
//! splitting and coalescing on top of both. See [`FixedPoolAllocator`] for
//! the public entry point, and [`global`] for an optional `GlobalAlloc`
//! adapter.

mod allocator;
mod error;
mod free_list;
pub mod global;
mod log;
mod region;
mod sys;

pub use allocator::FixedPoolAllocator;
pub use error::{AllocError, Result};
pub use log::{LogLevel, level, set_level};
