//! Memory management subsystem
//!
//! - `page_pool`: bitmap page allocator over a physical region
//! - `block`: in-band chunk headers and the `Allocation` handle
//! - `heap`: first-fit heap with splitting and address-ordered coalescing
//!
//! The heap never talks to hardware. It asks a [`PageProvider`] for runs of
//! contiguous pages and keeps them forever; pages are absorbed into the free
//! list and never handed back.

use core::ptr::NonNull;

pub mod block;
pub mod heap;
pub mod page_pool;

pub use block::{align_up, Allocation, HEADER_SIZE, HEAP_ALIGN};
pub use heap::{FreeBlock, FreeBlocks, Heap, HeapError, HeapStats, LockedHeap};
pub use page_pool::PagePool;

/// Source of fixed-size, physically contiguous pages
///
/// Implemented by [`PagePool`] on hardware and by test doubles on the host.
pub trait PageProvider {
    /// Size of one page in bytes (a power of two)
    fn page_size(&self) -> usize;

    /// Hand out `count` contiguous pages
    ///
    /// Returns `None` when the provider cannot satisfy the request. The
    /// returned address is page-aligned and the pages are never returned.
    fn request_pages(&mut self, count: usize) -> Option<NonNull<u8>>;
}

impl<P: PageProvider + ?Sized> PageProvider for &mut P {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn request_pages(&mut self, count: usize) -> Option<NonNull<u8>> {
        (**self).request_pages(count)
    }
}
