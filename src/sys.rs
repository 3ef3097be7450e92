//! The OS-facing edge: page size query and anonymous mapping/unmapping.
//!
//! Treated as an opaque collaborator, not redesigned here — everything
//! above this module only ever sees `page::map`/`page::unmap`/`page::size`.
//! Backed by `mmap`/`munmap`/`sysconf`, so this crate targets unix hosts.

#[cfg(not(unix))]
compile_error!("regionalloc maps memory via mmap/munmap and currently supports unix targets only");

pub mod page;
