//! # Memory Error Types
//!
//! All errors that can occur in the memory subsystem.
//!
//! Contract violations that risk memory corruption (double release, foreign
//! blocks, non-power-of-two alignment on release) are **not** error values -
//! they are programming errors and surface as debug assertions instead.

use thiserror::Error;

/// Result alias for memory subsystem operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur in the memory subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The active strategy could not satisfy an allocation request.
    #[error("allocation failed: {size} bytes with alignment {align}")]
    AllocationFailed {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// Alignment was not a power of two. This is a caller bug, surfaced
    /// immediately and never retried.
    #[error("invalid alignment: {alignment} is not a power of two")]
    InvalidAlignment {
        /// The offending alignment value.
        alignment: usize,
    },

    /// The request shape cannot be represented or satisfied by the targeted
    /// allocator (size overflow, or a block/alignment a fixed-shape strategy
    /// does not support).
    #[error("invalid layout: {size} bytes with alignment {align}")]
    InvalidLayout {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// An arena strategy ran out of region space.
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    ArenaExhausted {
        /// Bytes the caller asked for.
        requested: usize,
        /// Bytes left in the region.
        available: usize,
    },

    /// A pool strategy has no free blocks left.
    #[error("pool exhausted: all {capacity} blocks in use")]
    PoolExhausted {
        /// Total block count of the pool.
        capacity: usize,
    },
}
