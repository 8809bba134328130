//! # Tracking Allocator
//!
//! Delegating strategy that counts live blocks and bytes.
//!
//! Used by diagnostics code to answer "did this subsystem leak?" - install
//! it over a scope, run the subsystem, and assert the live counts return to
//! zero. The counters are relaxed atomics; the single `fetch_add` per call
//! adds negligible overhead to the wrapped strategy.

#![allow(unsafe_code)]

use core::alloc::Layout;
use core::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Allocator;
use crate::error::MemoryResult;

/// Strategy wrapper that records allocation traffic through an inner
/// allocator.
///
/// All bookkeeping lives in atomics adjacent to the wrapper, so the
/// wrapped strategy's thread-safety story is unchanged.
pub struct TrackingAllocator {
    inner: &'static dyn Allocator,
    live_blocks: AtomicUsize,
    live_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
}

impl TrackingAllocator {
    /// Creates a tracker that delegates to `inner`.
    #[must_use]
    pub const fn new(inner: &'static dyn Allocator) -> Self {
        Self {
            inner,
            live_blocks: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            total_allocations: AtomicUsize::new(0),
        }
    }

    /// Number of blocks allocated but not yet released.
    #[inline]
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.load(Ordering::Acquire)
    }

    /// Bytes allocated but not yet released.
    #[inline]
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }

    /// Cumulative count of successful allocations.
    #[inline]
    #[must_use]
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.load(Ordering::Acquire)
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>> {
        let ptr = self.inner.allocate(layout)?;
        self.live_blocks.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(layout.size(), Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        debug_assert!(
            self.live_blocks.load(Ordering::Relaxed) > 0,
            "deallocate with no outstanding tracked blocks"
        );
        self.live_blocks.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(layout.size(), Ordering::Relaxed);
        // SAFETY: caller's pairing guarantees are forwarded unchanged to the
        // inner allocator that actually produced the block.
        unsafe { self.inner.deallocate(ptr, layout) };
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> MemoryResult<NonNull<u8>> {
        // SAFETY: caller's pairing guarantees are forwarded unchanged.
        let new_ptr = unsafe { self.inner.reallocate(ptr, old_layout, new_size) }?;
        self.live_bytes.fetch_sub(old_layout.size(), Ordering::Relaxed);
        self.live_bytes.fetch_add(new_size, Ordering::Relaxed);
        Ok(new_ptr)
    }

    fn name(&self) -> &'static str {
        "tracking"
    }
}
