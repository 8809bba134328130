//! # System Allocator
//!
//! The default strategy: a stateless wrapper over the platform allocator.
//!
//! This is the implementation every caller gets before anything else is
//! registered, and the one guaranteed to exist for the entire process
//! lifetime. The platform primitive honors `Layout` alignment natively, so
//! no over-allocate-and-offset bookkeeping is needed here.
//!
//! ## Safety Note
//!
//! This module is the boundary to raw platform memory; all unsafe blocks
//! delegate to `std::alloc` under its documented contract.

#![allow(unsafe_code)]

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc;

use super::{dangling_block, Allocator};
use crate::error::{MemoryError, MemoryResult};

/// Stateless wrapper over the platform's raw allocation primitive.
///
/// Thread-safe by construction: it holds no state and the platform
/// allocator is itself thread-safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(dangling_block(layout.align()));
        }

        // SAFETY: layout has non-zero size, checked above.
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw).ok_or(MemoryError::AllocationFailed {
            size: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: caller guarantees ptr was produced by this allocator with
        // this layout; zero-size (dangling) blocks were filtered above.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> MemoryResult<NonNull<u8>> {
        if old_layout.size() == 0 {
            let new_layout = Layout::from_size_align(new_size, old_layout.align()).map_err(|_| {
                MemoryError::InvalidLayout {
                    size: new_size,
                    align: old_layout.align(),
                }
            })?;
            return self.allocate(new_layout);
        }
        if new_size == 0 {
            // SAFETY: caller guarantees ptr/old_layout came from this
            // instance; the shrink-to-zero releases the block exactly once.
            unsafe { self.deallocate(ptr, old_layout) };
            return Ok(dangling_block(old_layout.align()));
        }

        // SAFETY: caller guarantees ptr/old_layout came from this instance;
        // realloc preserves the original alignment for the grown block.
        let raw = unsafe { alloc::realloc(ptr.as_ptr(), old_layout, new_size) };
        NonNull::new(raw).ok_or(MemoryError::AllocationFailed {
            size: new_size,
            align: old_layout.align(),
        })
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
