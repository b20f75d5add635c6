use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rvos_kernel::config::PAGE_SIZE;
use rvos_kernel::{Heap, PagePool};
use std::alloc::{alloc_zeroed, Layout};
use std::hint::black_box;

/// Page pool over a leaked region of `pages` pages
fn pool(pages: usize) -> &'static mut PagePool {
    let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
    let start = unsafe { alloc_zeroed(layout) } as usize;
    let pool = Box::leak(Box::new(PagePool::new()));
    unsafe { pool.add_region(start, pages * PAGE_SIZE) };
    pool
}

/// Allocate then release one block on a warm heap
fn bench_allocate_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_release");

    for size in [16usize, 100, 512].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut heap = Heap::new(pool(4096));
            // warm up so the hot path never requests pages
            let warm = heap.allocate(size).unwrap().unwrap();
            unsafe { heap.release(warm) };

            b.iter(|| {
                let block = heap.allocate(black_box(size)).unwrap().unwrap();
                unsafe { heap.release(black_box(block)) };
            });
        });
    }

    group.finish();
}

/// Walk a fragmented free list: every other block of a long run is free
fn bench_fragmented_first_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_first_fit");

    for blocks in [16usize, 128, 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(blocks), blocks, |b, &blocks| {
            let mut heap = Heap::new(pool(4096));
            let mut kept = Vec::with_capacity(blocks / 2);
            let held: Vec<_> = (0..blocks).map(|_| heap.allocate(32).unwrap().unwrap()).collect();
            for (i, block) in held.into_iter().enumerate() {
                if i % 2 == 0 {
                    unsafe { heap.release(block) };
                } else {
                    kept.push(block);
                }
            }

            // 64 bytes fits none of the 32-byte holes
            b.iter(|| {
                let block = heap.allocate(black_box(64)).unwrap().unwrap();
                unsafe { heap.release(block) };
            });
            black_box(kept);
        });
    }

    group.finish();
}

criterion_group!(benches, bench_allocate_release, bench_fragmented_first_fit);
criterion_main!(benches);
