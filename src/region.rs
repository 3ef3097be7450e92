//! The region manager: owns the page-mapped byte span for the allocator's
//! entire lifetime. Acquired once in `Region::new`, released once in `Drop`.

use crate::error::AllocError;
use crate::log::log_warn;
use crate::sys::page;

/// A single page-mapped span of anonymous memory, owned for the lifetime
/// of the value. Not `Clone`; ordinary Rust move transfers ownership, and
/// `Drop` unmaps exactly once regardless of how many times the value was
/// moved before that.
pub(crate) struct Region {
    base: *mut u8,
    region_size: usize,
}

impl Region {
    /// Round `requested` up to a whole number of OS pages and map that many
    /// bytes as anonymous, private, read/write memory.
    ///
    /// A `requested` of zero still maps one page, rather than leaving the
    /// construction unspecified.
    pub(crate) fn new(requested: usize) -> Result<Self, AllocError> {
        let page_size = page::size();
        let region_size = if requested == 0 {
            page_size
        } else {
            requested.div_ceil(page_size) * page_size
        };

        let base = page::map(region_size)
            .map_err(|e| AllocError::ResourceAcquisitionFailed(e.to_string()))?;

        Ok(Self { base, region_size })
    }

    pub(crate) fn base(&self) -> *mut u8 {
        self.base
    }

    pub(crate) fn region_size(&self) -> usize {
        self.region_size
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // The process is tearing this allocator down; an unmap failure here
        // is not actionable, so it is logged rather than raised (see the
        // crate's error-handling design).
        if let Err(e) = unsafe { page::unmap(self.base, self.region_size) } {
            log_warn!("failed to unmap region of {} bytes: {}", self.region_size, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_page_multiple() {
        let page_size = page::size();
        let region = Region::new(page_size + 1).unwrap();
        assert_eq!(region.region_size(), page_size * 2);
    }

    #[test]
    fn exact_multiple_is_unchanged() {
        let page_size = page::size();
        let region = Region::new(page_size * 3).unwrap();
        assert_eq!(region.region_size(), page_size * 3);
    }

    #[test]
    fn zero_request_maps_one_page() {
        let page_size = page::size();
        let region = Region::new(0).unwrap();
        assert_eq!(region.region_size(), page_size);
    }

    #[test]
    fn base_is_writable_for_the_whole_region() {
        let region = Region::new(1).unwrap();
        unsafe {
            region.base().write(0x42);
            region.base().add(region.region_size() - 1).write(0x43);
            assert_eq!(region.base().read(), 0x42);
        }
    }
}
