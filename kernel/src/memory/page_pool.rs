//! Page pool
//!
//! Bitmap page allocator over one physical memory region. This is the page
//! provider the kernel heap grows from.
//!
//! # Design
//! - One bit per page, 1 = allocated, 0 = free
//! - Page numbers are relative to the page-aligned region base
//! - First-fit search for runs of contiguous pages, O(n)
//! - Pages outside the region start out allocated, so they are never handed out
//! - Pages are never returned: the heap absorbs them for good

use core::ptr::NonNull;

use crate::config::{MAX_PAGES, PAGE_SIZE};
use crate::memory::{align_up, PageProvider};

/// Bitmap page allocator
pub struct PagePool {
    /// Allocation bitmap (1 = allocated, 0 = free)
    bitmap: [u64; MAX_PAGES / 64],

    /// Address of page 0
    base: usize,

    /// Bytes per page
    page_size: usize,

    /// Number of pages the pool spans
    total_pages: usize,

    /// Number of pages still free
    free_pages: usize,
}

impl PagePool {
    /// Create an empty pool with the configured `PAGE_SIZE`
    pub const fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    /// Create an empty pool with a custom page size
    ///
    /// # Panics
    /// If `page_size` is not a power of two. In a `const` context this is a
    /// compile error.
    pub const fn with_page_size(page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        Self {
            bitmap: [!0; MAX_PAGES / 64],
            base: 0,
            page_size,
            total_pages: 0,
            free_pages: 0,
        }
    }

    /// Hand a memory region to the pool
    ///
    /// The start is rounded up to a page boundary and a trailing partial page
    /// is ignored. The first call fixes the pool base; later regions must lie
    /// above it. Pages beyond `MAX_PAGES` are not tracked.
    ///
    /// # Arguments
    /// * `start` - First byte of the region
    /// * `size` - Region length in bytes
    ///
    /// # Safety
    /// The region must be valid, unused memory that outlives the pool.
    pub unsafe fn add_region(&mut self, start: usize, size: usize) {
        let Some(first) = align_up(start, self.page_size) else {
            return;
        };
        let Some(end) = start.checked_add(size) else {
            return;
        };
        if end <= first {
            return;
        }

        if self.total_pages == 0 && self.free_pages == 0 {
            self.base = first;
        }
        if first < self.base {
            log::warn!(target: "pages", "region {:#x} below pool base {:#x} ignored", first, self.base);
            return;
        }

        let start_page = (first - self.base) / self.page_size;
        let end_page = (start_page + (end - first) / self.page_size).min(MAX_PAGES);

        for page in start_page..end_page {
            if !self.is_free(page) {
                self.mark_free(page);
                self.free_pages += 1;
            }
        }
        self.total_pages = self.total_pages.max(end_page);

        log::debug!(
            target: "pages",
            "region {:#x}..{:#x}: {} pages of {} bytes, {} free",
            first,
            end,
            end_page.saturating_sub(start_page),
            self.page_size,
            self.free_pages
        );
    }

    /// Mark a region as allocated (kernel image, boot data, ...)
    pub fn reserve_region(&mut self, start: usize, size: usize) {
        if start < self.base || size == 0 {
            return;
        }
        let start_page = (start - self.base) / self.page_size;
        let end_page = (start - self.base)
            .saturating_add(size)
            .div_ceil(self.page_size)
            .min(self.total_pages);

        for page in start_page..end_page {
            if self.is_free(page) {
                self.mark_allocated(page);
                self.free_pages -= 1;
            }
        }
    }

    /// Allocate `count` contiguous pages
    ///
    /// Returns the address of the first page, or `None` when no free run is
    /// long enough or `count` is zero.
    pub fn alloc_pages(&mut self, count: usize) -> Option<NonNull<u8>> {
        if count == 0 || count > self.free_pages {
            return None;
        }

        let first = self.find_run(count)?;
        for page in first..first + count {
            self.mark_allocated(page);
        }
        self.free_pages -= count;

        NonNull::new((self.base + first * self.page_size) as *mut u8)
    }

    /// First page of the lowest run of `count` free pages
    fn find_run(&self, count: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;

        for page in 0..self.total_pages {
            if self.is_free(page) {
                if run_len == 0 {
                    run_start = page;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
        }

        None
    }

    /// Check if a page is free
    #[inline]
    fn is_free(&self, page: usize) -> bool {
        (self.bitmap[page / 64] & (1u64 << (page % 64))) == 0
    }

    /// Mark a page as allocated
    #[inline]
    fn mark_allocated(&mut self, page: usize) {
        self.bitmap[page / 64] |= 1u64 << (page % 64);
    }

    /// Mark a page as free
    #[inline]
    fn mark_free(&mut self, page: usize) {
        self.bitmap[page / 64] &= !(1u64 << (page % 64));
    }

    /// Address of page 0
    pub fn base(&self) -> usize {
        self.base
    }

    /// Get the number of free pages
    pub fn free_pages(&self) -> usize {
        self.free_pages
    }

    /// Get the number of pages the pool spans
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }
}

impl Default for PagePool {
    fn default() -> Self {
        Self::new()
    }
}

impl PageProvider for PagePool {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn request_pages(&mut self, count: usize) -> Option<NonNull<u8>> {
        self.alloc_pages(count)
    }
}
