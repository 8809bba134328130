//! # Arena Allocator
//!
//! A bump strategy for allocations that are freed all at once.
//!
//! The region is allocated once up front; each request just bumps an
//! offset. Individual release is a no-op - memory comes back only when the
//! whole arena is reset. Perfect for per-frame or per-load scratch memory.
//!
//! ## Safety Note
//!
//! This module requires unsafe code to hand out raw blocks from the
//! pre-allocated region. All unsafe blocks are documented.

#![allow(unsafe_code)]

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc;

use parking_lot::Mutex;

use super::{dangling_block, Allocator};
use crate::error::{MemoryError, MemoryResult};

/// Region alignment. Cache-line aligned so any block alignment up to 64
/// falls out of offset arithmetic alone.
const REGION_ALIGN: usize = 64;

/// A thread-safe bump allocator over one pre-allocated region.
///
/// Allocation is an offset bump under a short lock. [`Allocator::deallocate`]
/// is a no-op; call [`ArenaAllocator::reset`] to recycle the whole region.
///
/// # Example
///
/// ```rust,ignore
/// let arena = ArenaAllocator::new(1024 * 1024); // 1MB scratch
///
/// let _scope = ScopedAllocator::install(&arena);
/// // ... frame work allocates through the facade ...
/// drop(_scope);
/// arena.reset();
/// ```
pub struct ArenaAllocator {
    /// Start of the backing region.
    base: NonNull<u8>,
    /// Layout the region was allocated with (needed to free it).
    region_layout: Layout,
    /// Total capacity in bytes.
    capacity: usize,
    /// Current bump offset.
    offset: Mutex<usize>,
}

// SAFETY: the region is uniquely owned by this arena and all mutation of the
// bump offset goes through the mutex; handing out disjoint sub-blocks to
// multiple threads is exactly the contract of the allocator trait.
unsafe impl Send for ArenaAllocator {}
// SAFETY: see Send impl above.
unsafe impl Sync for ArenaAllocator {}

impl ArenaAllocator {
    /// Creates a new arena with the specified capacity in bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, and aborts via the standard
    /// allocation-error hook if the region itself cannot be allocated.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let region_layout = Layout::from_size_align(capacity, REGION_ALIGN)
            .expect("arena capacity overflows a valid layout");

        // SAFETY: region_layout has non-zero size (capacity checked above).
        let raw = unsafe { alloc::alloc(region_layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(region_layout);
        };

        Self {
            base,
            region_layout,
            capacity,
            offset: Mutex::new(0),
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        *self.offset.lock()
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used()
    }

    /// Resets the arena, invalidating all previous allocations.
    ///
    /// This is a **zero-cost** operation - no memory is freed or
    /// reallocated. Previous blocks become invalid and must not be used.
    #[inline]
    pub fn reset(&self) {
        *self.offset.lock() = 0;
    }

    /// Whether `ptr` points into this arena's region.
    fn contains(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        let base = self.base.as_ptr() as usize;
        addr >= base && addr < base + self.capacity
    }
}

impl Allocator for ArenaAllocator {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(dangling_block(layout.align()));
        }

        let mut offset = self.offset.lock();

        let base_addr = self.base.as_ptr() as usize;
        let aligned_addr = (base_addr + *offset)
            .checked_add(layout.align() - 1)
            .ok_or(MemoryError::InvalidLayout {
                size: layout.size(),
                align: layout.align(),
            })?
            & !(layout.align() - 1);
        let aligned_offset = aligned_addr - base_addr;
        let new_offset =
            aligned_offset
                .checked_add(layout.size())
                .ok_or(MemoryError::InvalidLayout {
                    size: layout.size(),
                    align: layout.align(),
                })?;

        if new_offset > self.capacity {
            return Err(MemoryError::ArenaExhausted {
                requested: layout.size(),
                available: self.capacity - *offset,
            });
        }

        *offset = new_offset;

        // SAFETY: aligned_offset + size <= capacity, so the block lies
        // entirely inside the region owned by this arena.
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(aligned_offset)) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // Individual release is a no-op; memory returns on reset().
        debug_assert!(
            layout.size() == 0 || self.contains(ptr),
            "block released to an arena that did not produce it"
        );
    }

    fn name(&self) -> &'static str {
        "arena"
    }
}

impl Drop for ArenaAllocator {
    fn drop(&mut self) {
        // SAFETY: base was allocated in new() with region_layout and is
        // freed exactly once, here.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.region_layout) };
    }
}
