//! Kernel heap allocator
//!
//! First-fit allocator over a singly-linked, address-ordered free list of
//! in-band chunk headers. Memory comes from a [`PageProvider`] in whole pages
//! and is never given back.
//!
//! # Design
//! - Requests are rounded up to `HEAP_ALIGN` (one machine word)
//! - A found chunk is split when the remainder can hold a header plus one
//!   alignment unit; otherwise it is handed out whole
//! - On a miss the heap requests `ceil((size + HEADER_SIZE) / page_size)`
//!   pages, feeds them through the release path and retries once
//! - Release inserts by address, then merges with the successor, then with
//!   the predecessor, so three adjacent chunks collapse in one call
//!
//! # Invariants
//! - The free list is sorted by ascending address
//! - No two free chunks overlap or touch (touching chunks are merged)

use core::alloc::{GlobalAlloc, Layout};
use core::marker::PhantomData;
use core::ptr::{null_mut, NonNull};

use spin::{Mutex, MutexGuard};
use thiserror::Error;

use super::block::{align_up, Allocation, BlockHeader, HEADER_SIZE, HEAP_ALIGN};
use super::PageProvider;

/// Heap errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The page provider cannot supply enough memory for the request
    #[error("out of memory (requested {requested} bytes)")]
    OutOfMemory { requested: usize },
}

pub type Result<T> = core::result::Result<T, HeapError>;

/// Heap counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Successful allocations
    pub allocations: usize,
    /// Chunks released
    pub releases: usize,
    /// Calls made to the page provider
    pub page_requests: usize,
    /// Pages received from the page provider
    pub pages_acquired: usize,
    /// Allocations that failed with `OutOfMemory`
    pub failures: usize,
}

impl HeapStats {
    const fn new() -> Self {
        Self {
            allocations: 0,
            releases: 0,
            page_requests: 0,
            pages_acquired: 0,
            failures: 0,
        }
    }
}

/// A free chunk as seen from outside the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Header address
    pub addr: usize,
    /// Usable bytes after the header
    pub size: usize,
}

impl FreeBlock {
    /// First address past the chunk
    pub fn end(&self) -> usize {
        self.addr + HEADER_SIZE + self.size
    }
}

/// Iterator over the free list, in list (= address) order
pub struct FreeBlocks<'a> {
    cursor: Option<NonNull<BlockHeader>>,
    _heap: PhantomData<&'a ()>,
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        let block = self.cursor?;
        // SAFETY: the heap is borrowed for 'a, so the list cannot change under us
        let header = unsafe { block.as_ref() };
        self.cursor = header.next;
        Some(FreeBlock {
            addr: BlockHeader::addr(block),
            size: header.size,
        })
    }
}

/// First-fit heap over a page provider
pub struct Heap<P: PageProvider> {
    /// Lowest-addressed free chunk
    free_list: Option<NonNull<BlockHeader>>,

    /// Where new memory comes from
    pages: P,

    stats: HeapStats,
}

// SAFETY: the heap exclusively owns every chunk reachable from `free_list`
unsafe impl<P: PageProvider + Send> Send for Heap<P> {}

impl<P: PageProvider> Heap<P> {
    /// Create an empty heap; the first allocation pulls pages from `pages`
    pub const fn new(pages: P) -> Self {
        Self {
            free_list: None,
            pages,
            stats: HeapStats::new(),
        }
    }

    /// Allocate at least `size` bytes
    ///
    /// Returns `Ok(None)` for `size == 0`. The data address is
    /// `HEAP_ALIGN`-aligned.
    pub fn allocate(&mut self, size: usize) -> Result<Option<Allocation>> {
        if size == 0 {
            return Ok(None);
        }

        let Some(aligned) = align_up(size, HEAP_ALIGN) else {
            return Err(self.out_of_memory(size));
        };

        let block = match self.take_first_fit(aligned) {
            Some(block) => block,
            None => {
                if self.refill(aligned).is_err() {
                    return Err(self.out_of_memory(size));
                }
                match self.take_first_fit(aligned) {
                    Some(block) => block,
                    None => return Err(self.out_of_memory(size)),
                }
            }
        };

        self.stats.allocations += 1;
        // SAFETY: take_first_fit returns a live chunk detached from the list
        let allocation = unsafe { Allocation::from_block(block) };
        kheap_trace!("alloc {} -> {:#x} ({} usable)", size, allocation.addr(), allocation.capacity());
        Ok(Some(allocation))
    }

    /// Return an allocation to the free list
    ///
    /// The chunk is spliced in by address and merged with free neighbours.
    ///
    /// # Safety
    /// `allocation` must have been handed out by this heap. A chunk from
    /// another heap would join this free list while its owner still tracks
    /// the memory around it.
    pub unsafe fn release(&mut self, allocation: Allocation) {
        let block = allocation.block();
        kheap_trace!("release {:#x} ({} usable)", allocation.addr(), allocation.capacity());
        self.stats.releases += 1;
        self.insert(block);
    }

    /// Return a raw data pointer to the free list; null is a no-op
    ///
    /// # Safety
    /// A non-null `ptr` must have been returned by this heap and not released
    /// since. Releasing twice corrupts the free list.
    pub unsafe fn release_ptr(&mut self, ptr: *mut u8) {
        if let Some(allocation) = Allocation::from_raw(ptr) {
            self.release(allocation);
        }
    }

    /// Detach the first chunk that can hold `aligned` bytes, splitting it
    /// when the remainder is big enough to be a chunk of its own
    fn take_first_fit(&mut self, aligned: usize) -> Option<NonNull<BlockHeader>> {
        let mut prev: Option<NonNull<BlockHeader>> = None;
        let mut cursor = self.free_list;

        while let Some(mut block) = cursor {
            // SAFETY: every list entry is a live header owned by the heap
            let header = unsafe { block.as_mut() };

            if header.size >= aligned {
                let successor = if header.size >= aligned + HEADER_SIZE + HEAP_ALIGN {
                    let tail_addr = BlockHeader::addr(block) + HEADER_SIZE + aligned;
                    let tail_size = header.size - aligned - HEADER_SIZE;
                    // SAFETY: the tail lies inside this chunk's data area
                    let mut tail = unsafe { BlockHeader::write(tail_addr, tail_size) };
                    unsafe { tail.as_mut().next = header.next };
                    header.size = aligned;
                    Some(tail)
                } else {
                    header.next
                };

                header.next = None;
                self.link_after(prev, successor);
                return Some(block);
            }

            prev = cursor;
            cursor = header.next;
        }

        None
    }

    /// Pull enough pages for an `aligned`-byte request into the free list
    fn refill(&mut self, aligned: usize) -> Result<()> {
        let page_size = self.pages.page_size();
        let oom = HeapError::OutOfMemory { requested: aligned };

        let count = aligned
            .checked_add(HEADER_SIZE)
            .ok_or(oom)?
            .div_ceil(page_size);
        let bytes = count.checked_mul(page_size).ok_or(oom)?;

        self.stats.page_requests += 1;
        let pages = self.pages.request_pages(count).ok_or(oom)?;
        self.stats.pages_acquired += count;

        kheap_trace!("grew by {} pages at {:#x} for a {}-byte request", count, pages.as_ptr() as usize, aligned);

        // SAFETY: the provider hands out page-aligned, unused memory of `bytes` bytes
        unsafe {
            let block = BlockHeader::write(pages.as_ptr() as usize, bytes - HEADER_SIZE);
            self.insert(block);
        }
        Ok(())
    }

    /// Splice `block` into the free list by address and coalesce
    ///
    /// # Safety
    /// `block` must be a live header that is not already on the list.
    unsafe fn insert(&mut self, mut block: NonNull<BlockHeader>) {
        let mut prev: Option<NonNull<BlockHeader>> = None;
        let mut cursor = self.free_list;

        while let Some(curr) = cursor {
            if BlockHeader::addr(curr) >= BlockHeader::addr(block) {
                break;
            }
            prev = cursor;
            cursor = curr.as_ref().next;
        }

        block.as_mut().next = cursor;
        self.link_after(prev, Some(block));

        // Merge with the successor first, so the predecessor can absorb both
        if let Some(next) = cursor {
            if BlockHeader::end(block) == BlockHeader::addr(next) {
                let (next_size, next_next) = {
                    let next = next.as_ref();
                    (next.size, next.next)
                };
                let header = block.as_mut();
                header.size += HEADER_SIZE + next_size;
                header.next = next_next;
            }
        }

        if let Some(mut prev) = prev {
            if BlockHeader::end(prev) == BlockHeader::addr(block) {
                let (size, next) = {
                    let header = block.as_ref();
                    (header.size, header.next)
                };
                let prev = prev.as_mut();
                prev.size += HEADER_SIZE + size;
                prev.next = next;
            }
        }
    }

    /// Point `prev` (or the list head) at `next`
    fn link_after(&mut self, prev: Option<NonNull<BlockHeader>>, next: Option<NonNull<BlockHeader>>) {
        match prev {
            // SAFETY: `prev` is a live list entry
            Some(mut prev) => unsafe { prev.as_mut().next = next },
            None => self.free_list = next,
        }
    }

    /// Count a failed request; reporting it is up to the caller
    fn out_of_memory(&mut self, requested: usize) -> HeapError {
        self.stats.failures += 1;
        HeapError::OutOfMemory { requested }
    }

    /// Free chunks in address order
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            cursor: self.free_list,
            _heap: PhantomData,
        }
    }

    /// Usable bytes across all free chunks
    pub fn free_bytes(&self) -> usize {
        self.free_blocks().map(|block| block.size).sum()
    }

    /// Number of free chunks
    pub fn free_block_count(&self) -> usize {
        self.free_blocks().count()
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// The page provider backing this heap
    pub fn page_provider(&self) -> &P {
        &self.pages
    }

    /// Mutable access to the page provider, e.g. to add regions during boot
    pub fn page_provider_mut(&mut self) -> &mut P {
        &mut self.pages
    }
}

/// Heap behind a spin lock, usable as `#[global_allocator]`
///
/// Layouts aligned beyond `HEAP_ALIGN` are refused with a null pointer.
/// Failures are logged only after the lock is released, so a `log` sink may
/// allocate from this heap. With `debug-heap`, trace records are emitted
/// while the lock is held.
pub struct LockedHeap<P: PageProvider>(Mutex<Heap<P>>);

impl<P: PageProvider> LockedHeap<P> {
    pub const fn new(pages: P) -> Self {
        Self(Mutex::new(Heap::new(pages)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Heap<P>> {
        self.0.lock()
    }

    /// Lock the heap unless someone already holds it
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Heap<P>>> {
        self.0.try_lock()
    }
}

unsafe impl<P: PageProvider + Send> GlobalAlloc for LockedHeap<P> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > HEAP_ALIGN {
            log::error!(
                target: "heap",
                "unsupported alignment {} (heap aligns to {})",
                layout.align(),
                HEAP_ALIGN
            );
            return null_mut();
        }

        let result = {
            let mut heap = self.0.lock();
            heap.allocate(layout.size()).map_err(|err| (err, heap.free_bytes()))
        };

        match result {
            Ok(Some(allocation)) => allocation.into_raw(),
            Ok(None) => null_mut(),
            Err((err, free)) => {
                log::error!(target: "heap", "{} ({} bytes free)", err, free);
                null_mut()
            }
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.0.lock().release_ptr(ptr);
    }
}
