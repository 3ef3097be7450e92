//! The free-list engine: an address-ordered singly-linked list threaded
//! through the free bytes themselves. No auxiliary storage.

use std::ptr;

/// A record embedded at the start of every free span.
///
/// `size` is the total size of the span, including this record. `next` is
/// the next free node by address order, or null. Occupies the same byte
/// footprint reserved for [`crate::allocator::Header`] — see
/// `RESERVED_PREFIX` in `allocator.rs`.
#[repr(C)]
pub(crate) struct FreeNode {
    pub size: usize,
    pub next: *mut FreeNode,
}

impl FreeNode {
    /// Write a fresh node at `addr`.
    ///
    /// # Safety
    /// `addr` must be valid for writes of `size_of::<FreeNode>()` bytes and
    /// not aliased by any live reference.
    pub(crate) unsafe fn write_at(addr: *mut u8, size: usize, next: *mut FreeNode) {
        unsafe {
            (addr as *mut FreeNode).write(FreeNode { size, next });
        }
    }
}

/// Address-ordered free list. `head` is null when the list is empty.
pub(crate) struct FreeList {
    head: *mut FreeNode,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    /// Seed the list with a single node covering the whole region.
    ///
    /// # Safety
    /// `addr` must be valid for writes of `size_of::<FreeNode>()` bytes.
    pub(crate) unsafe fn seed(&mut self, addr: *mut u8, size: usize) {
        unsafe {
            FreeNode::write_at(addr, size, ptr::null_mut());
        }
        self.head = addr as *mut FreeNode;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    pub(crate) fn head(&self) -> *mut FreeNode {
        self.head
    }

    /// Walk the list, first-fit: the first node whose `size >= req_space`.
    /// Returns the node pointer and the pointer to wherever its `next`
    /// link (or `self.head`) is stored, so the caller can unlink/replace it
    /// in place.
    pub(crate) fn find_first_fit(&mut self, req_space: usize) -> Option<*mut FreeNode> {
        let mut curr = self.head;
        while !curr.is_null() {
            let size = unsafe { (*curr).size };
            if size >= req_space {
                return Some(curr);
            }
            curr = unsafe { (*curr).next };
        }
        None
    }

    /// Unlink `target` from the list. `target` must currently be in the list.
    pub(crate) fn unlink(&mut self, target: *mut FreeNode) {
        if self.head == target {
            self.head = unsafe { (*target).next };
            return;
        }
        let mut prev = self.head;
        while !prev.is_null() {
            let next = unsafe { (*prev).next };
            if next == target {
                unsafe {
                    (*prev).next = (*target).next;
                }
                return;
            }
            prev = next;
        }
    }

    /// Replace `target`'s in-list slot with a node written at `new_addr`
    /// with `new_size`, preserving `target`'s successor. Used by the
    /// allocation engine's split path: the residual free block goes back
    /// into exactly the slot the parent occupied, so this can never create
    /// adjacency with a node outside that slot.
    ///
    /// # Safety
    /// `new_addr` must be valid for writes of `size_of::<FreeNode>()` bytes.
    pub(crate) unsafe fn replace_in_place(
        &mut self,
        target: *mut FreeNode,
        new_addr: *mut u8,
        new_size: usize,
    ) {
        let next = unsafe { (*target).next };
        unsafe {
            FreeNode::write_at(new_addr, new_size, next);
        }
        let new_node = new_addr as *mut FreeNode;
        if self.head == target {
            self.head = new_node;
            return;
        }
        let mut prev = self.head;
        while !prev.is_null() {
            if unsafe { (*prev).next } == target {
                unsafe {
                    (*prev).next = new_node;
                }
                return;
            }
            prev = unsafe { (*prev).next };
        }
    }

    /// Insert `block` (address + size) preserving address order.
    ///
    /// Walks the list carrying a previous pointer; at the first existing
    /// node `curr` whose start address is `>= block.address + block.size`,
    /// splices `block` in before `curr`. Appends at the tail if the walk
    /// reaches the end.
    ///
    /// # Safety
    /// `block_addr` must be valid for writes of `size_of::<FreeNode>()`
    /// bytes, and the bytes in `[block_addr, block_addr + block_size)` must
    /// not overlap any existing free span.
    pub(crate) unsafe fn insert(&mut self, block_addr: *mut u8, block_size: usize) {
        let block_end = unsafe { block_addr.add(block_size) };

        let mut prev: *mut FreeNode = ptr::null_mut();
        let mut curr = self.head;
        while !curr.is_null() {
            if (curr as *mut u8) >= block_end {
                break;
            }
            prev = curr;
            curr = unsafe { (*curr).next };
        }

        unsafe {
            FreeNode::write_at(block_addr, block_size, curr);
        }
        let new_node = block_addr as *mut FreeNode;
        if prev.is_null() {
            self.head = new_node;
        } else {
            unsafe {
                (*prev).next = new_node;
            }
        }
    }

    /// Single left-to-right pass: for each node `c`, while
    /// `c.address + c.size == c.next.address`, absorb `c.next` into `c`.
    /// An empty list is a no-op.
    pub(crate) fn merge_adjacent(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() {
            loop {
                let next = unsafe { (*curr).next };
                if next.is_null() {
                    break;
                }
                let curr_end = unsafe { (curr as *mut u8).add((*curr).size) };
                if curr_end == next as *mut u8 {
                    let absorbed_size = unsafe { (*next).size };
                    let next_next = unsafe { (*next).next };
                    unsafe {
                        (*curr).size += absorbed_size;
                        (*curr).next = next_next;
                    }
                } else {
                    break;
                }
            }
            curr = unsafe { (*curr).next };
        }
    }

    /// Enumerate `(address, size)` for every node, in list order. Used by
    /// property tests to check the address-ordered / non-adjacent
    /// invariants and to confirm a round trip collapses back to one node.
    #[cfg(test)]
    pub(crate) fn spans(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut curr = self.head;
        while !curr.is_null() {
            out.push((curr as usize, unsafe { (*curr).size }));
            curr = unsafe { (*curr).next };
        }
        out
    }
}
