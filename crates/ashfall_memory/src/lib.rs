//! # ASHFALL Memory
//!
//! The engine's pluggable allocation facade. Every dynamic-memory request
//! made by an engine subsystem funnels through [`facade`], which routes it
//! to whichever [`Allocator`] strategy is currently active and can swap
//! that strategy atomically at runtime without touching call sites.
//!
//! ## Architecture Rules
//!
//! 1. **Hot path is one atomic load + one indirect call** - No locks, no
//!    logging, no bookkeeping in the routing layer
//! 2. **The default allocator always exists** - A process-static system
//!    allocator backs the facade before, during, and after any strategy swap
//! 3. **Strategies own their own synchronization** - The facade only makes
//!    the *identity* of the active strategy race-free
//!
//! ## Example
//!
//! ```rust,ignore
//! use ashfall_memory::{facade, ScopedAllocator, TrackingAllocator, SystemAllocator};
//!
//! static TRACKER: TrackingAllocator = TrackingAllocator::new(&SystemAllocator);
//!
//! // Run a subsystem's init under a tracking strategy, then restore.
//! {
//!     let _scope = ScopedAllocator::install(&TRACKER);
//!     subsystem::init()?;
//! }
//! assert_eq!(TRACKER.live_blocks(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod allocator;
pub mod error;
pub mod facade;

pub use allocator::{
    Allocator, ArenaAllocator, FixedPoolAllocator, SystemAllocator, TrackingAllocator,
};
pub use error::{MemoryError, MemoryResult};
pub use facade::ScopedAllocator;
