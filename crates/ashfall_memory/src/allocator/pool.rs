//! # Fixed-Block Pool Allocator
//!
//! Fixed-size block strategy for objects that are frequently allocated and
//! freed - particles, packets, transient game objects.
//!
//! One slab is allocated up front and divided into equally-sized blocks;
//! a free list of block indices makes allocate and release O(1) with zero
//! further heap traffic.
//!
//! ## Safety Note
//!
//! This module requires unsafe code to hand out raw blocks from the
//! pre-allocated slab. All unsafe blocks are documented.

#![allow(unsafe_code)]

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc;

use parking_lot::Mutex;

use super::{dangling_block, Allocator};
use crate::error::{MemoryError, MemoryResult};

/// Free-list bookkeeping, guarded as one unit.
struct PoolState {
    /// Indices of available blocks.
    free_list: Vec<usize>,
    /// Number of blocks currently handed out.
    allocated_count: usize,
}

/// A pool of fixed-size blocks carved from one pre-allocated slab.
///
/// Requests larger than the block size, or with stricter alignment than the
/// pool was built with, are rejected with [`MemoryError::InvalidLayout`];
/// running out of blocks is [`MemoryError::PoolExhausted`].
///
/// # Example
///
/// ```rust,ignore
/// // 10,000 blocks sized for a network packet.
/// let pool = FixedPoolAllocator::new(1500, 8, 10_000);
///
/// let layout = Layout::from_size_align(1200, 8)?;
/// let block = pool.allocate(layout)?;
/// // ...
/// unsafe { pool.deallocate(block, layout) };
/// ```
pub struct FixedPoolAllocator {
    /// Start of the backing slab.
    base: NonNull<u8>,
    /// Layout the slab was allocated with (needed to free it).
    slab_layout: Layout,
    /// Distance between consecutive blocks (block size padded to alignment).
    stride: usize,
    /// Alignment every block satisfies.
    block_align: usize,
    /// Total block count.
    capacity: usize,
    /// Free list and counters.
    state: Mutex<PoolState>,
}

// SAFETY: the slab is uniquely owned by this pool; all free-list mutation is
// behind the mutex, and distinct live blocks never overlap.
unsafe impl Send for FixedPoolAllocator {}
// SAFETY: see Send impl above.
unsafe impl Sync for FixedPoolAllocator {}

impl FixedPoolAllocator {
    /// Creates a new pool of `capacity` blocks of `block_size` bytes at
    /// `block_align` alignment.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `block_size` is zero or `block_align` is not
    /// a power of two, and aborts via the standard allocation-error hook if
    /// the slab cannot be allocated.
    #[must_use]
    pub fn new(block_size: usize, block_align: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(block_size > 0, "Block size must be greater than zero");
        assert!(
            block_align.is_power_of_two(),
            "Block alignment must be a power of two"
        );

        let block_layout = Layout::from_size_align(block_size, block_align)
            .expect("block size overflows a valid layout")
            .pad_to_align();
        let stride = block_layout.size();
        let slab_size = stride
            .checked_mul(capacity)
            .expect("pool capacity overflows a valid layout");
        let slab_layout = Layout::from_size_align(slab_size, block_align)
            .expect("pool slab overflows a valid layout");

        // SAFETY: slab_layout has non-zero size (both factors checked above).
        let raw = unsafe { alloc::alloc(slab_layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(slab_layout);
        };

        // Pre-fill the free list with all indices, last block popped first.
        let free_list: Vec<usize> = (0..capacity).rev().collect();

        Self {
            base,
            slab_layout,
            stride,
            block_align,
            capacity,
            state: Mutex::new(PoolState {
                free_list,
                allocated_count: 0,
            }),
        }
    }

    /// Returns the total block count.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of blocks currently handed out.
    #[inline]
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.state.lock().allocated_count
    }

    /// Returns the number of free blocks.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity - self.allocated_count()
    }
}

impl Allocator for FixedPoolAllocator {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(dangling_block(layout.align()));
        }
        if layout.size() > self.stride || layout.align() > self.block_align {
            return Err(MemoryError::InvalidLayout {
                size: layout.size(),
                align: layout.align(),
            });
        }

        let mut state = self.state.lock();
        let index = state
            .free_list
            .pop()
            .ok_or(MemoryError::PoolExhausted {
                capacity: self.capacity,
            })?;
        state.allocated_count += 1;

        // SAFETY: index < capacity, so index * stride stays inside the slab
        // owned by this pool.
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(index * self.stride)) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        let offset = (ptr.as_ptr() as usize).wrapping_sub(self.base.as_ptr() as usize);
        debug_assert!(
            offset < self.stride * self.capacity && offset % self.stride == 0,
            "block released to a pool that did not produce it"
        );

        let mut state = self.state.lock();
        debug_assert!(state.allocated_count > 0, "pool release with nothing allocated");
        state.free_list.push(offset / self.stride);
        state.allocated_count -= 1;
    }

    fn name(&self) -> &'static str {
        "fixed_pool"
    }
}

impl Drop for FixedPoolAllocator {
    fn drop(&mut self) {
        // SAFETY: base was allocated in new() with slab_layout and is freed
        // exactly once, here.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.slab_layout) };
    }
}
