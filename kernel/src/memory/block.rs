//! Heap chunk headers
//!
//! Every chunk, free or in use, starts with a [`BlockHeader`]. The data area
//! follows immediately. All pointer arithmetic between a header and its data
//! area lives in this module; the rest of the heap only sees
//! `NonNull<BlockHeader>` and [`Allocation`].

use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use static_assertions::const_assert_eq;

/// In-band chunk header
#[repr(C)]
#[derive(Debug)]
pub(crate) struct BlockHeader {
    /// Usable bytes after the header
    pub(crate) size: usize,
    /// Next free chunk (by address); unused while the chunk is allocated
    pub(crate) next: Option<NonNull<BlockHeader>>,
}

/// Bytes taken by one chunk header
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Alignment of every chunk and every returned data pointer
///
/// One machine word: 4 bytes on RV32, 8 bytes on 64-bit targets.
pub const HEAP_ALIGN: usize = align_of::<BlockHeader>();

const_assert_eq!(HEADER_SIZE, 2 * size_of::<usize>());
const_assert_eq!(HEADER_SIZE % HEAP_ALIGN, 0);

/// Round `value` up to a multiple of `align` (a power of two)
///
/// Returns `None` on overflow.
#[inline]
pub fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

impl BlockHeader {
    /// Write a detached header at `addr`
    ///
    /// # Safety
    /// `addr` must be `HEAP_ALIGN`-aligned and valid for writes of
    /// `HEADER_SIZE + size` bytes.
    #[inline]
    pub(crate) unsafe fn write(addr: usize, size: usize) -> NonNull<BlockHeader> {
        let block = addr as *mut BlockHeader;
        block.write(BlockHeader { size, next: None });
        NonNull::new_unchecked(block)
    }

    /// Address of the header
    #[inline]
    pub(crate) fn addr(block: NonNull<BlockHeader>) -> usize {
        block.as_ptr() as usize
    }

    /// First address past the chunk's data area
    ///
    /// # Safety
    /// `block` must point to a live header.
    #[inline]
    pub(crate) unsafe fn end(block: NonNull<BlockHeader>) -> usize {
        Self::addr(block) + HEADER_SIZE + block.as_ref().size
    }
}

/// Handle to an allocated chunk
///
/// Pairs the data address handed to the caller with the knowledge that a
/// header sits immediately before it. Consumed by `Heap::release`, so the
/// same handle cannot be released twice. The handle does not remember which
/// heap issued it; returning it to that heap is the caller's obligation.
#[derive(Debug)]
pub struct Allocation {
    data: NonNull<u8>,
    _header: PhantomData<*mut BlockHeader>,
}

impl Allocation {
    /// Handle for the data area of `block`
    ///
    /// # Safety
    /// `block` must point to a live, detached header.
    #[inline]
    pub(crate) unsafe fn from_block(block: NonNull<BlockHeader>) -> Self {
        let data = (block.as_ptr() as *mut u8).add(HEADER_SIZE);
        Self {
            data: NonNull::new_unchecked(data),
            _header: PhantomData,
        }
    }

    /// Header of this chunk
    #[inline]
    pub(crate) fn block(&self) -> NonNull<BlockHeader> {
        // SAFETY: every Allocation is built from a header HEADER_SIZE bytes below `data`
        unsafe { NonNull::new_unchecked(self.data.as_ptr().sub(HEADER_SIZE) as *mut BlockHeader) }
    }

    /// Data pointer
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.data.as_ptr()
    }

    /// Data address
    #[inline]
    pub fn addr(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Usable bytes in the chunk (at least the requested size)
    #[inline]
    pub fn capacity(&self) -> usize {
        // SAFETY: the header of an outstanding allocation is never freed or moved
        unsafe { self.block().as_ref().size }
    }

    /// Give up the handle, returning the raw data pointer
    #[inline]
    pub fn into_raw(self) -> *mut u8 {
        self.data.as_ptr()
    }

    /// Rebuild a handle from a pointer produced by [`Allocation::into_raw`]
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// A non-null `ptr` must come from `into_raw` on a handle of a heap that
    /// has not released it since.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(|data| Self {
            data,
            _header: PhantomData,
        })
    }
}
