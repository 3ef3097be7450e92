//! The allocation engine: first-fit search, split-or-consume, the
//! header/shim-byte layout that lets `free` recover bookkeeping from a
//! bare user pointer, and the public [`FixedPoolAllocator`] type tying the
//! region manager and free-list engine together.

use std::mem::size_of;
use std::ptr;

use crate::error::AllocError;
use crate::free_list::{FreeList, FreeNode};
use crate::log::log_debug;
use crate::region::Region;

const SENTINEL: u32 = 0xDEAD_BEEF;

/// Header written at the start of every allocated span. Occupies the same
/// byte footprint reserved for [`FreeNode`] — see [`RESERVED_PREFIX`].
#[repr(C)]
struct Header {
    magic: u32,
    size: usize,
}

/// The prefix every block — free or allocated — reserves at its start, so
/// an allocated block can always be reinterpreted as a free node when it is
/// freed. Using `max()` rather than assuming the two records are the same
/// size keeps the two layouts free to diverge later.
const RESERVED_PREFIX: usize = {
    let header = size_of::<Header>();
    let node = size_of::<FreeNode>();
    if header > node { header } else { node }
};

/// The shim byte stores the padding count in a single `u8`, so alignment
/// requests above this bound would overflow it and corrupt `free`'s
/// header-address recovery. See the spec's "Alignment shim" design note.
const MAX_ALIGNMENT: usize = 256;

fn align_up(addr: usize, alignment: usize) -> usize {
    (addr + alignment - 1) & !(alignment - 1)
}

/// A user-space allocator that maps one fixed-size region from the OS at
/// construction and thereafter services `alloc`/`free` entirely out of it.
///
/// Single-owner and not internally synchronized: the raw pointers this type
/// holds already make it neither [`Send`] nor [`Sync`] by auto-trait
/// inference, so sharing one across threads is a compile error rather than
/// only a documented contract. Wrap it in a `Mutex` (see
/// [`crate::global::GlobalRegionAllocator`]) for multi-threaded use.
pub struct FixedPoolAllocator {
    region: Region,
    free_list: FreeList,
}

impl FixedPoolAllocator {
    /// Map a region of at least `requested_bytes`, rounded up to a whole
    /// number of OS pages, and seed the free list with one block covering
    /// it.
    pub fn new(requested_bytes: usize) -> Result<Self, AllocError> {
        let region = Region::new(requested_bytes)?;
        let mut free_list = FreeList::new();
        let node_size = region.region_size() - size_of::<FreeNode>();
        unsafe {
            free_list.seed(region.base(), node_size);
        }
        log_debug!(
            "mapped region of {} bytes ({} bytes usable)",
            region.region_size(),
            node_size
        );
        Ok(Self { region, free_list })
    }

    /// The page-rounded region size this allocator maps.
    pub fn region_size(&self) -> usize {
        self.region.region_size()
    }

    /// Allocate `size` bytes aligned to `alignment` (which must be a power
    /// of two). Returns a null pointer — not an error — if the pool cannot
    /// currently satisfy the request.
    pub fn try_alloc(&mut self, size: usize, alignment: usize) -> Result<*mut u8, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidArgument("size must be positive"));
        }
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(AllocError::InvalidArgument(
                "alignment must be a power of two",
            ));
        }
        if alignment > MAX_ALIGNMENT {
            return Err(AllocError::InvalidArgument(
                "alignment must not exceed 256: the shim byte cannot record more padding than that",
            ));
        }

        let req_space = match size
            .checked_add(RESERVED_PREFIX)
            .and_then(|v| v.checked_add(alignment))
            .and_then(|v| v.checked_add(1))
        {
            Some(v) => v,
            None => return Ok(ptr::null_mut()),
        };

        let curr = match self.free_list.find_first_fit(req_space) {
            Some(curr) => curr,
            None => {
                log_debug!("pool exhausted for size={size} alignment={alignment}");
                return Ok(ptr::null_mut());
            }
        };

        let curr_addr = curr as *mut u8;
        let curr_size = unsafe { (*curr).size };

        // A residual smaller than RESERVED_PREFIX can't hold a FreeNode
        // record; donate that slack to the allocation and consume the
        // whole block instead of carving an unwritable sliver.
        let residual_size = curr_size - req_space;
        let block_size = if residual_size >= RESERVED_PREFIX {
            let residual_addr = unsafe { curr_addr.add(req_space) };
            unsafe {
                self.free_list
                    .replace_in_place(curr, residual_addr, residual_size);
            }
            req_space
        } else {
            self.free_list.unlink(curr);
            curr_size
        };

        unsafe {
            (curr_addr as *mut Header).write(Header {
                magic: SENTINEL,
                size: block_size - RESERVED_PREFIX,
            });
        }

        // Byte just past the header, then reserve the shim byte.
        let shim_reserved = unsafe { curr_addr.add(RESERVED_PREFIX).add(1) };
        let aligned = align_up(shim_reserved as usize, alignment) as *mut u8;
        let skipped = aligned as usize - shim_reserved as usize;
        debug_assert!(skipped < alignment);
        unsafe {
            aligned.sub(1).write(skipped as u8);
        }

        log_debug!("allocated {size} bytes (alignment {alignment}) at {aligned:p}");
        Ok(aligned)
    }

    /// Allocate `size` bytes at the default alignment of 8.
    pub fn alloc(&mut self, size: usize) -> Result<*mut u8, AllocError> {
        self.try_alloc(size, 8)
    }

    /// Free memory previously returned by [`Self::alloc`] or
    /// [`Self::try_alloc`].
    ///
    /// # Safety caveat
    /// If `ptr` does not actually point inside this allocator's region,
    /// this reads whatever bytes sit at `ptr - 1` and at the computed
    /// header offset. A sentinel mismatch is reported as
    /// [`AllocError::InvalidOperation`], but matching by coincidence is
    /// possible and pointers into unmapped memory will crash the process —
    /// the magic check is a best-effort sanity screen, not a guarantee.
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        if ptr.is_null() {
            return Err(AllocError::InvalidOperation("cannot free null"));
        }

        let skipped = unsafe { *ptr.sub(1) } as usize;
        let header_addr = unsafe { ptr.sub(1 + skipped + RESERVED_PREFIX) };
        let header = header_addr as *const Header;

        if unsafe { (*header).magic } != SENTINEL {
            return Err(AllocError::InvalidOperation("bad magic"));
        }

        let block_size = unsafe { (*header).size } + RESERVED_PREFIX;
        unsafe {
            self.free_list.insert(header_addr, block_size);
            self.free_list.merge_adjacent();
        }
        log_debug!("freed block of {block_size} bytes at {header_addr:p}");
        Ok(())
    }

    /// Resize an allocation: allocate `new_size` bytes, copy the shared
    /// prefix, free the old block. `old_size` must be the size originally
    /// passed to `alloc`/`try_alloc` for `ptr`.
    pub fn realloc(
        &mut self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        alignment: usize,
    ) -> Result<*mut u8, AllocError> {
        if new_size == 0 {
            self.free(ptr)?;
            return Ok(ptr::null_mut());
        }
        // `old_size == 0` means there is nothing to copy from or free —
        // treat this as a plain allocation, matching the teacher's realloc.
        if old_size == 0 {
            return self.try_alloc(new_size, alignment);
        }

        let new_ptr = self.try_alloc(new_size, alignment)?;
        if new_ptr.is_null() {
            return Ok(ptr::null_mut());
        }

        let copy_len = old_size.min(new_size);
        unsafe {
            ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
        }
        self.free(ptr)?;
        Ok(new_ptr)
    }

    #[cfg(test)]
    fn free_list_spans(&self) -> Vec<(usize, usize)> {
        self.free_list.spans()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_size() -> usize {
        crate::sys::page::size()
    }

    // ── Boundary scenarios (assuming 4096-byte pages, per the spec) ────────

    #[test]
    fn s1_exact_page_construction() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        assert_eq!(a.region_size(), page);
        // Bookkeeping overhead consumes some bytes, so a full-page request
        // cannot be satisfied.
        assert!(a.alloc(page).unwrap().is_null());
    }

    #[test]
    fn s2_non_multiple_construction_rounds_up() {
        let page = page_size();
        let a = FixedPoolAllocator::new(page * 3 + 1).unwrap();
        assert_eq!(a.region_size(), page * 4);
    }

    #[test]
    fn s3_aligned_allocation_sweep() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        for align in [8usize, 16, 32, 64, 128] {
            let p = a.try_alloc(100, align).unwrap();
            assert!(!p.is_null());
            assert_eq!(p as usize % align, 0);
            a.free(p).unwrap();
            assert_eq!(a.free_list_spans().len(), 1);
        }
    }

    #[test]
    fn s4_invalid_inputs() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        assert!(matches!(
            a.alloc(0),
            Err(AllocError::InvalidArgument(_))
        ));
        assert!(matches!(
            a.try_alloc(1024, 0),
            Err(AllocError::InvalidArgument(_))
        ));
        assert!(matches!(
            a.try_alloc(1024, 7),
            Err(AllocError::InvalidArgument(_))
        ));
        assert!(matches!(
            a.try_alloc(1024, 512),
            Err(AllocError::InvalidArgument(_))
        ));
        assert!(matches!(
            a.free(ptr::null_mut()),
            Err(AllocError::InvalidOperation(_))
        ));
    }

    #[test]
    fn alignment_at_the_256_bound_is_accepted() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let p = a.try_alloc(64, 256).unwrap();
        assert!(!p.is_null());
        assert_eq!(p as usize % 256, 0);
        a.free(p).unwrap();
    }

    #[test]
    fn s5_stray_pointer_is_rejected() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let mut buf = [0u8; 256];
        let stray = unsafe { buf.as_mut_ptr().add(255) };
        assert!(matches!(
            a.free(stray),
            Err(AllocError::InvalidOperation(_))
        ));
    }

    #[test]
    fn s6_interleaved_alloc_free_preserves_pool() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let initial_spans = a.free_list_spans();
        assert_eq!(initial_spans.len(), 1);
        let initial_size = initial_spans[0].1;

        let ptrs: Vec<*mut u8> = (0..5).map(|_| a.alloc(101).unwrap()).collect();
        for p in &ptrs {
            assert!(!p.is_null());
        }
        for p in ptrs {
            a.free(p).unwrap();
        }

        let final_spans = a.free_list_spans();
        assert_eq!(final_spans.len(), 1);
        assert_eq!(final_spans[0].1, initial_size);
    }

    // ── Quantified invariants ───────────────────────────────────────────────

    #[test]
    fn invariant_alignment_holds_across_many_sizes() {
        let page = page_size() * 4;
        let mut a = FixedPoolAllocator::new(page).unwrap();
        for align in [8usize, 16, 32, 64, 256] {
            for size in [1usize, 7, 63, 500] {
                let p = a.try_alloc(size, align).unwrap();
                if !p.is_null() {
                    assert_eq!(p as usize % align, 0);
                    a.free(p).unwrap();
                }
            }
        }
    }

    #[test]
    fn invariant_free_list_address_order_and_non_adjacency() {
        let page = page_size() * 2;
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let ptrs: Vec<*mut u8> = (0..8).filter_map(|_| {
            let p = a.alloc(64).unwrap();
            if p.is_null() { None } else { Some(p) }
        }).collect();

        // Free every other allocation to create a fragmented list.
        for (i, p) in ptrs.iter().enumerate() {
            if i % 2 == 0 {
                a.free(*p).unwrap();
            }
        }

        let spans = a.free_list_spans();
        for pair in spans.windows(2) {
            let (addr_a, size_a) = pair[0];
            let (addr_b, _) = pair[1];
            assert!(addr_a < addr_b, "free list must be address-ordered");
            assert_ne!(addr_a + size_a, addr_b, "adjacent free spans must be merged");
        }
    }

    #[test]
    fn invariant_round_trip_any_free_order() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let initial = a.free_list_spans();
        assert_eq!(initial.len(), 1);
        let initial_size = initial[0].1;

        let mut ptrs: Vec<*mut u8> = (0..4).map(|_| a.alloc(64).unwrap()).collect();
        // Free in reverse order.
        ptrs.reverse();
        for p in ptrs {
            a.free(p).unwrap();
        }

        let spans = a.free_list_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].1, initial_size);
    }

    #[test]
    fn invariant_region_containment() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let base = a.region.base() as usize;
        let end = base + a.region_size();

        let p = a.alloc(64).unwrap();
        assert!(!p.is_null());
        let p_addr = p as usize;
        assert!(p_addr >= base && p_addr + 64 <= end);
        a.free(p).unwrap();
    }

    #[test]
    fn exhaustion_returns_null_not_error() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        // Drain the pool with large-ish allocations until it refuses.
        let mut outstanding = Vec::new();
        loop {
            let p = a.alloc(256).unwrap();
            if p.is_null() {
                break;
            }
            outstanding.push(p);
        }
        assert!(!outstanding.is_empty());
        for p in outstanding {
            a.free(p).unwrap();
        }
    }

    #[test]
    fn realloc_preserves_contents_and_shrinks_or_grows() {
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let p = a.alloc(32).unwrap();
        assert!(!p.is_null());
        unsafe {
            for i in 0..32u8 {
                p.add(i as usize).write(i);
            }
        }
        let grown = a.realloc(p, 32, 64, 8).unwrap();
        assert!(!grown.is_null());
        unsafe {
            for i in 0..32u8 {
                assert_eq!(grown.add(i as usize).read(), i);
            }
        }
        a.free(grown).unwrap();
    }

    #[test]
    fn realloc_with_zero_old_size_is_a_plain_alloc() {
        // There is nothing to copy from or free when old_size == 0; realloc
        // must behave like alloc rather than freeing the (possibly null)
        // incoming pointer.
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let p = a.realloc(ptr::null_mut(), 0, 64, 8).unwrap();
        assert!(!p.is_null());
        assert_eq!(p as usize % 8, 0);
        a.free(p).unwrap();
    }

    #[test]
    fn split_then_merge_ordering_is_preserved() {
        // Allocating and freeing a single small block out of a larger free
        // span must not create spurious adjacency with any other node: the
        // residual goes back into the exact slot the parent occupied.
        let page = page_size() * 2;
        let mut a = FixedPoolAllocator::new(page).unwrap();
        let p1 = a.alloc(64).unwrap();
        let p2 = a.alloc(64).unwrap();
        assert!(!p1.is_null() && !p2.is_null());
        a.free(p1).unwrap();
        let spans = a.free_list_spans();
        // Freeing p1 alone must not merge with the remainder tail unless
        // physically adjacent; at minimum the list stays address-ordered.
        for pair in spans.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        a.free(p2).unwrap();
        assert_eq!(a.free_list_spans().len(), 1);
    }

    #[test]
    fn sub_threshold_residual_consumes_whole_block_without_corrupting_neighbor() {
        // alloc(100, 8) carves a 125-byte block (req_space = 100 + 16 + 8 + 1);
        // freeing it and then alloc(95, 8) (req_space = 120) would leave a
        // 5-byte residual, too small to hold a FreeNode record. The engine
        // must consume the whole block rather than splitting, so the live
        // neighbor carved right after it is never touched.
        let page = page_size();
        let mut a = FixedPoolAllocator::new(page).unwrap();

        let p1 = a.try_alloc(100, 8).unwrap();
        assert!(!p1.is_null());
        let p2 = a.try_alloc(64, 8).unwrap();
        assert!(!p2.is_null());

        unsafe {
            for i in 0..64u8 {
                p2.add(i as usize).write(0xAA ^ i);
            }
        }

        a.free(p1).unwrap();
        let p3 = a.try_alloc(95, 8).unwrap();
        assert!(!p3.is_null());

        unsafe {
            for i in 0..64u8 {
                assert_eq!(p2.add(i as usize).read(), 0xAA ^ i);
            }
        }
        a.free(p2).unwrap();
        a.free(p3).unwrap();
    }
}
