//! # Allocation Facade Benchmark
//!
//! ARCHITECT'S REQUIREMENTS:
//! - Facade dispatch = one atomic load + one indirect call
//! - No measurable regression vs direct system allocation
//!
//! Run with: `cargo bench --package ashfall_memory`

// Benchmarks don't need docs and may exercise raw blocks directly
#![allow(missing_docs)]
#![allow(unsafe_code)]

use core::alloc::Layout;

use ashfall_memory::{facade, Allocator, FixedPoolAllocator, SystemAllocator};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Block size used across dispatch benchmarks.
const BLOCK_SIZE: usize = 64;

/// Benchmark: allocate/release against the system strategy directly.
fn bench_direct_system(c: &mut Criterion) {
    let layout = Layout::from_size_align(BLOCK_SIZE, 8).unwrap();
    c.bench_function("system_alloc_free_64", |b| {
        b.iter(|| {
            let ptr = SystemAllocator.allocate(black_box(layout)).unwrap();
            unsafe { SystemAllocator.deallocate(ptr, layout) };
        });
    });
}

/// Benchmark: the same traffic routed through the facade.
fn bench_facade_dispatch(c: &mut Criterion) {
    c.bench_function("facade_alloc_free_64", |b| {
        b.iter(|| {
            let ptr = facade::allocate(black_box(BLOCK_SIZE), 8).unwrap();
            unsafe { facade::deallocate(ptr, BLOCK_SIZE, 8) };
        });
    });
}

/// Benchmark: the read-only active-strategy probe.
fn bench_current_probe(c: &mut Criterion) {
    c.bench_function("current_allocator_probe", |b| {
        b.iter(|| black_box(facade::current_allocator().name()));
    });
}

/// Benchmark: fixed-block pool as an installed strategy shape.
fn bench_pool_strategy(c: &mut Criterion) {
    let pool = FixedPoolAllocator::new(BLOCK_SIZE, 8, 1024);
    let layout = Layout::from_size_align(BLOCK_SIZE, 8).unwrap();
    c.bench_function("pool_alloc_free_64", |b| {
        b.iter(|| {
            let ptr = pool.allocate(black_box(layout)).unwrap();
            unsafe { pool.deallocate(ptr, layout) };
        });
    });
}

criterion_group!(
    benches,
    bench_direct_system,
    bench_facade_dispatch,
    bench_current_probe,
    bench_pool_strategy
);
criterion_main!(benches);
