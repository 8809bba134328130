//! # Allocation Facade
//!
//! Process-wide router for all engine allocation traffic.
//!
//! ## Safety Note
//!
//! This module requires unsafe code for the lock-free active-strategy slot.
//! All unsafe blocks are carefully reviewed and documented.
//!
//! ## Architecture
//!
//! ```text
//!   subsystem A ──┐
//!   subsystem B ──┼──▶ allocate/deallocate ──▶ ┌──────────────────┐
//!   subsystem C ──┘        (acquire load)      │  ACTIVE slot     │
//!                                              │  AtomicPtr       │──▶ &'static dyn Allocator
//!   register_allocator ───▶ swap (AcqRel) ───▶ │  null = default  │
//!                                              └──────────────────┘
//!                                                       │ fallback
//!                                                       ▼
//!                                              SYSTEM (process-static)
//! ```
//!
//! ## Concurrency
//!
//! The slot is the only shared mutable state here and it is a single
//! atomic. Swaps are one `swap(AcqRel)`: the exchange is the linearization
//! point, so concurrent registrations serialize into a total order and each
//! caller's returned "previous" value is unique. The acquire on the hot
//! path pairs with the release half of the swap, so a thread that observes
//! a newly-installed strategy also observes that strategy fully
//! initialized.
//!
//! ## Caller Contract
//!
//! In-flight calls capture "the active allocator at the moment of the
//! call"; they are not serialized against swaps. A block allocated under
//! strategy X must be released against X - never across a scope boundary
//! that changed the active strategy. The facade makes the *identity* slot
//! race-free; block/strategy pairing is the caller's discipline.

#![allow(unsafe_code)]

use core::alloc::Layout;
use core::ptr::NonNull;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::allocator::{Allocator, SystemAllocator};
use crate::error::{MemoryError, MemoryResult};

/// The always-available default strategy. Static storage: constructed
/// before any caller can reach the facade, never destroyed, immune to
/// teardown ordering.
static SYSTEM: SystemAllocator = SystemAllocator;

/// The active-strategy slot. Null means "the default".
///
/// A `&dyn` is two words and cannot live in one atomic, so the slot holds a
/// thin pointer to a leaked [`ActiveSlot`] cell instead. A swapped-out cell
/// is intentionally retained for the process lifetime: a concurrent reader
/// may have loaded it and not yet dereferenced it, and retention is what
/// makes "the slot is never stale" unconditional. Registration is cold, so
/// the retained cells are bounded by registration count at two words each.
static ACTIVE: AtomicPtr<ActiveSlot> = AtomicPtr::new(ptr::null_mut());

/// One registration record: the fat reference the thin slot pointer erases.
struct ActiveSlot {
    allocator: &'static dyn Allocator,
}

/// Resolves a slot pointer to the strategy it designates.
#[inline]
fn resolve(slot: *mut ActiveSlot) -> &'static dyn Allocator {
    if slot.is_null() {
        &SYSTEM
    } else {
        // SAFETY: every non-null slot pointer was leaked by install_slot and
        // is never freed, so it is valid for the process lifetime.
        unsafe { (*slot).allocator }
    }
}

/// Leaks a registration cell and swaps it in, returning the previous slot.
fn install_slot(allocator: &'static dyn Allocator) -> *mut ActiveSlot {
    let cell = Box::into_raw(Box::new(ActiveSlot { allocator }));
    ACTIVE.swap(cell, Ordering::AcqRel)
}

/// Validates a raw `(size, align)` request into a layout.
#[inline]
fn layout_for(size: usize, align: usize) -> MemoryResult<Layout> {
    if !align.is_power_of_two() {
        return Err(MemoryError::InvalidAlignment { alignment: align });
    }
    Layout::from_size_align(size, align)
        .map_err(|_| MemoryError::InvalidLayout { size, align })
}

/// Acquires a block of at least `size` bytes aligned to `align` from the
/// active strategy.
///
/// One atomic load plus one indirect call; never blocks, never logs.
///
/// # Errors
///
/// [`MemoryError::InvalidAlignment`] if `align` is not a power of two
/// (caller bug, surfaced immediately); otherwise whatever the active
/// strategy returns, propagated unchanged.
pub fn allocate(size: usize, align: usize) -> MemoryResult<NonNull<u8>> {
    let layout = layout_for(size, align)?;
    current_allocator().allocate(layout)
}

/// Releases a block through the active strategy.
///
/// # Safety
///
/// `ptr` must have been returned by [`allocate`] (or [`reallocate`]) with
/// this exact `size`/`align`, **while the same strategy was active** - the
/// facade routes to whichever strategy is active now and cannot detect a
/// mismatch. See the module-level caller contract.
pub unsafe fn deallocate(ptr: NonNull<u8>, size: usize, align: usize) {
    debug_assert!(
        align.is_power_of_two(),
        "deallocate with non-power-of-two alignment {align}"
    );
    let Ok(layout) = Layout::from_size_align(size, align) else {
        return;
    };
    // SAFETY: pairing requirements are the caller's, forwarded unchanged.
    unsafe { current_allocator().deallocate(ptr, layout) };
}

/// Resizes a block through the active strategy, preserving the first
/// `min(size, new_size)` bytes.
///
/// # Safety
///
/// Same pairing requirements as [`deallocate`]; on success only the
/// returned pointer is valid.
///
/// # Errors
///
/// Same failure semantics as [`allocate`]; the original block remains
/// valid when an error is returned.
pub unsafe fn reallocate(
    ptr: NonNull<u8>,
    size: usize,
    align: usize,
    new_size: usize,
) -> MemoryResult<NonNull<u8>> {
    let old_layout = layout_for(size, align)?;
    // SAFETY: pairing requirements are the caller's, forwarded unchanged.
    unsafe { current_allocator().reallocate(ptr, old_layout, new_size) }
}

/// Atomically installs `allocator` as the active strategy and returns
/// whatever was active immediately before.
///
/// Never blocks and never fails. The facade takes no ownership: the caller
/// keeps the allocator alive (the `'static` bound makes that structural).
/// Re-registering the already-active strategy is a legal no-op that returns
/// the same strategy as "previous".
pub fn register_allocator(allocator: &'static dyn Allocator) -> &'static dyn Allocator {
    let previous = resolve(install_slot(allocator));
    tracing::debug!(
        "allocator registered: {} (was {})",
        allocator.name(),
        previous.name()
    );
    previous
}

/// Returns the currently active strategy, for diagnostics.
#[inline]
#[must_use]
pub fn current_allocator() -> &'static dyn Allocator {
    resolve(ACTIVE.load(Ordering::Acquire))
}

/// Returns the always-available default strategy.
#[inline]
#[must_use]
pub fn default_allocator() -> &'static dyn Allocator {
    &SYSTEM
}

/// Scoped strategy override.
///
/// Installs a strategy on construction and restores the previous one when
/// dropped - on every exit path, including unwinding. This is the primary
/// way to redirect allocation for a bounded region of code ("run this
/// subsystem's init under a tracking strategy").
///
/// Blocks allocated inside the scope must be released inside it; see the
/// module-level caller contract.
///
/// # Example
///
/// ```rust,ignore
/// static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);
///
/// let _scope = ScopedAllocator::install(&TRACKER);
/// audio::init()?; // allocates through TRACKER
/// // previous strategy restored here, even if init failed
/// ```
#[must_use = "dropping the guard immediately restores the previous allocator"]
pub struct ScopedAllocator {
    /// Slot to reinstall on drop.
    previous: *mut ActiveSlot,
}

impl ScopedAllocator {
    /// Installs `allocator` and remembers the previously active strategy.
    pub fn install(allocator: &'static dyn Allocator) -> Self {
        let previous = install_slot(allocator);
        tracing::debug!("allocator override installed: {}", allocator.name());
        Self { previous }
    }
}

impl Drop for ScopedAllocator {
    fn drop(&mut self) {
        // The cell this guard installed stays retained (see ACTIVE docs);
        // only the previous slot pointer is put back.
        let _installed = ACTIVE.swap(self.previous, Ordering::AcqRel);
        tracing::trace!("allocator override restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::TrackingAllocator;
    use parking_lot::Mutex;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    /// The slot is process-wide; tests that touch it serialize here.
    static SLOT_LOCK: Mutex<()> = Mutex::new(());

    fn same(a: &dyn Allocator, b: &dyn Allocator) -> bool {
        ptr::eq(
            (a as *const dyn Allocator).cast::<u8>(),
            (b as *const dyn Allocator).cast::<u8>(),
        )
    }

    /// Puts the default strategy back regardless of what earlier tests did.
    fn normalize() {
        let _ = register_allocator(default_allocator());
    }

    #[test]
    fn test_allocate_roundtrip_default() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        for (size, align) in [(1, 1), (64, 8), (100, 16), (4096, 64)] {
            let ptr = allocate(size, align).unwrap();
            assert_eq!(ptr.as_ptr() as usize % align, 0);
            unsafe { deallocate(ptr, size, align) };
        }
    }

    #[test]
    fn test_invalid_alignment_rejected() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        assert_eq!(
            allocate(64, 3).unwrap_err(),
            MemoryError::InvalidAlignment { alignment: 3 }
        );
        assert_eq!(
            allocate(64, 0).unwrap_err(),
            MemoryError::InvalidAlignment { alignment: 0 }
        );
    }

    #[test]
    fn test_register_sequence_is_consistent() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static FIRST: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);
        static SECOND: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        let before = current_allocator();
        let previous = register_allocator(&FIRST);
        assert!(same(previous, before));
        assert!(same(current_allocator(), &FIRST));

        let previous = register_allocator(&SECOND);
        assert!(same(previous, &FIRST));
        assert!(same(current_allocator(), &SECOND));

        let previous = register_allocator(default_allocator());
        assert!(same(previous, &SECOND));
    }

    #[test]
    fn test_register_same_instance_is_noop() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        let _ = register_allocator(&TRACKER);
        let previous = register_allocator(&TRACKER);
        assert!(same(previous, &TRACKER));
        assert!(same(current_allocator(), &TRACKER));

        normalize();
    }

    #[test]
    fn test_scoped_override_restores() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        let before = current_allocator();
        {
            let _scope = ScopedAllocator::install(&TRACKER);
            assert!(same(current_allocator(), &TRACKER));
        }
        assert!(same(current_allocator(), before));
    }

    #[test]
    fn test_scoped_override_restores_on_error_path() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        fn failing_subsystem_init() -> MemoryResult<()> {
            let _scope = ScopedAllocator::install(&TRACKER);
            // Propagated failure exits the scope early.
            Err(MemoryError::PoolExhausted { capacity: 0 })
        }

        let before = current_allocator();
        assert!(failing_subsystem_init().is_err());
        assert!(same(current_allocator(), before));
    }

    #[test]
    fn test_scoped_override_restores_on_unwind() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        let before = current_allocator();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _scope = ScopedAllocator::install(&TRACKER);
            panic!("subsystem init blew up");
        }));
        assert!(result.is_err());
        assert!(same(current_allocator(), before));
    }

    #[test]
    fn test_concurrent_allocate_deallocate() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);
        const THREADS: usize = 8;
        const PAIRS: usize = 200;

        let _scope = ScopedAllocator::install(&TRACKER);
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                std::thread::spawn(|| {
                    for i in 0..PAIRS {
                        let size = 16 + (i % 7) * 8;
                        let ptr = allocate(size, 8).unwrap();
                        unsafe { deallocate(ptr, size, 8) };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every allocate matched by exactly one deallocate.
        assert_eq!(TRACKER.live_blocks(), 0);
        assert_eq!(TRACKER.live_bytes(), 0);
        assert_eq!(TRACKER.total_allocations(), THREADS * PAIRS);
    }

    #[test]
    fn test_handoff_routes_to_new_allocator() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let worker = std::thread::spawn(move || {
            // The channel recv establishes happens-before with the swap.
            ready_rx.recv().unwrap();
            let ptr = allocate(64, 8).unwrap();
            unsafe { deallocate(ptr, 64, 8) };
            done_tx.send(()).unwrap();
        });

        let _ = register_allocator(&TRACKER);
        ready_tx.send(()).unwrap();
        done_rx.recv().unwrap();
        worker.join().unwrap();

        // The worker's traffic must have routed to the new strategy.
        assert_eq!(TRACKER.total_allocations(), 1);
        assert_eq!(TRACKER.live_blocks(), 0);

        normalize();
    }

    #[test]
    fn test_tracking_swap_scenario() {
        let _lock = SLOT_LOCK.lock();
        normalize();

        static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);

        // Default D is active; installing tracker T returns D.
        let previous = register_allocator(&TRACKER);
        assert!(same(previous, default_allocator()));

        // Traffic routes to T, which records one outstanding block.
        let block = allocate(64, 8).unwrap();
        assert_eq!(TRACKER.live_blocks(), 1);
        assert_eq!(TRACKER.live_bytes(), 64);

        // Swapping D back returns T.
        let previous = register_allocator(default_allocator());
        assert!(same(previous, &TRACKER));

        // The caller kept the correct target: release against T, not the
        // facade (which now routes to D).
        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe { TRACKER.deallocate(block, layout) };
        assert_eq!(TRACKER.live_blocks(), 0);
    }
}
