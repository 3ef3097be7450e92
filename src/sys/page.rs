//! mmap/munmap wrappers for page-level allocation.

use std::io;
use std::sync::OnceLock;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// The OS page size, queried once via `sysconf(_SC_PAGESIZE)` and cached.
pub fn size() -> usize {
    *PAGE_SIZE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize })
}

/// Map `len` bytes of anonymous, private, read/write memory.
///
/// Returns the mapping's base address, or `Err` with the OS's reason if
/// `mmap` reports `MAP_FAILED`.
pub fn map(len: usize) -> io::Result<*mut u8> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ptr as *mut u8)
    }
}

/// Unmap a region previously returned by [`map`].
///
/// # Safety
/// `base` must have been returned by `map` with the same `len`, and must
/// not be accessed by anyone after this call returns.
pub unsafe fn unmap(base: *mut u8, len: usize) -> io::Result<()> {
    let rc = unsafe { libc::munmap(base as *mut libc::c_void, len) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
