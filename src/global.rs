//! Optional `GlobalAlloc` adapter over a [`FixedPoolAllocator`].
//!
//! The core allocator is deliberately single-owner and not `Sync` — sharing
//! it across threads (which `GlobalAlloc` requires) goes through an
//! explicit `Mutex`, per the design note that prescribes wrapping an
//! instance in a mutex for multi-threaded use.

use std::alloc::{GlobalAlloc, Layout};
use std::ptr;
use std::sync::Mutex;

use crate::allocator::FixedPoolAllocator;

/// Wraps a [`FixedPoolAllocator`] behind a mutex so it can be installed as
/// a process's `#[global_allocator]`.
pub struct GlobalRegionAllocator {
    inner: Mutex<FixedPoolAllocator>,
}

impl GlobalRegionAllocator {
    pub fn new(allocator: FixedPoolAllocator) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }
}

unsafe impl GlobalAlloc for GlobalRegionAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .try_alloc(layout.size(), layout.align())
            .unwrap_or(ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // A bad pointer here is a caller bug; GlobalAlloc::dealloc has no
        // way to report failure, so the error is swallowed deliberately.
        let _ = guard.free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .realloc(ptr, layout.size(), new_size, layout.align())
            .unwrap_or(ptr::null_mut())
    }
}
