//! # Allocation Strategies
//!
//! The capability contract every allocation strategy conforms to, plus the
//! strategies the engine ships with.
//!
//! ## Design Philosophy
//!
//! The facade knows nothing about concrete strategies. Anything that
//! implements [`Allocator`] can be installed as the process-wide active
//! strategy; the system allocator is merely the one that is always there.
//!
//! ## Safety Note
//!
//! The contract hands out raw blocks, so `deallocate`/`reallocate` are
//! unsafe functions with the usual pairing requirements.

#![allow(unsafe_code)]

mod arena;
mod pool;
mod system;
mod tracking;

pub use arena::ArenaAllocator;
pub use pool::FixedPoolAllocator;
pub use system::SystemAllocator;
pub use tracking::TrackingAllocator;

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::{MemoryError, MemoryResult};

/// Capability contract for an allocation strategy.
///
/// Every implementation installed into the facade is called concurrently
/// from arbitrarily many threads with no serialization around individual
/// calls, hence the `Send + Sync` supertrait. The facade only serializes
/// the *identity* of the active strategy, never the calls themselves.
///
/// ## Caller Contract
///
/// A block must be released against the allocator instance that produced
/// it, with the same layout. Releasing a foreign block or double-releasing
/// is undefined; implementations detect it where cheap (debug builds) but
/// are not required to.
pub trait Allocator: Send + Sync {
    /// Acquires a block of at least `layout.size()` bytes aligned to
    /// `layout.align()`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::AllocationFailed`] (or a strategy-specific
    /// exhaustion variant) when the underlying source cannot satisfy the
    /// request.
    fn allocate(&self, layout: Layout) -> MemoryResult<NonNull<u8>>;

    /// Releases a block previously acquired from this allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` or `reallocate` on this
    /// same instance with this same `layout`, and must not be used or
    /// released again afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Resizes a block, preserving the first `min(old, new)` bytes.
    ///
    /// The default implementation allocates a new block, copies, and
    /// releases the old one. Strategies that can resize in place should
    /// override it.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this instance with `old_layout`.
    /// On success the old block is gone; only the returned pointer is valid.
    ///
    /// # Errors
    ///
    /// Same failure semantics as [`Allocator::allocate`]; the original
    /// block remains valid when an error is returned.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> MemoryResult<NonNull<u8>> {
        let new_layout = Layout::from_size_align(new_size, old_layout.align()).map_err(|_| {
            MemoryError::InvalidLayout {
                size: new_size,
                align: old_layout.align(),
            }
        })?;

        let new_ptr = self.allocate(new_layout)?;
        let preserved = old_layout.size().min(new_size);
        if preserved > 0 {
            // SAFETY: both blocks are live, at least `preserved` bytes long,
            // and come from distinct allocations so they cannot overlap.
            unsafe {
                core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), preserved);
            }
        }
        // SAFETY: caller guarantees ptr/old_layout pair came from this
        // instance; the block is released exactly once, here.
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }

    /// Diagnostics label for this strategy.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Returns the canonical zero-size block for an alignment.
///
/// Follows the standard library convention: zero-size requests succeed with
/// a well-aligned dangling pointer and their release is a no-op.
pub(crate) fn dangling_block(align: usize) -> NonNull<u8> {
    // SAFETY: Layout guarantees alignment is a non-zero power of two, so the
    // address is never null.
    unsafe { NonNull::new_unchecked(align as *mut u8) }
}
