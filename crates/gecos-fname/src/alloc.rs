//! Raw buffer allocation.
//!
//! `xalloc` never asks for fewer than one byte, and reports a failed
//! allocation without aborting: the caller gets `None` and must check it.
//! `try_xalloc` does that check and turns `None` into an error.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use tracing::trace;

use crate::error::{FnameError, FnameResult};
use crate::trace::{FormatObserver, TraceEvent};

/// Backend that hands out raw byte blocks.
pub trait RawAllocator {
    /// Allocate `size` bytes. `None` means the allocation failed.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate(size)` on this allocator
    /// and must not have been released already.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// `malloc`/`free` from the C library.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc has no preconditions; a null return maps to None.
        NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _size: usize) {
        // SAFETY: the caller guarantees ptr came from malloc above.
        unsafe { libc::free(ptr.as_ptr().cast()) }
    }
}

/// Allocator that always fails. Used to exercise the out-of-memory path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingAllocator;

impl RawAllocator for FailingAllocator {
    fn allocate(&self, _size: usize) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn release(&self, _ptr: NonNull<u8>, _size: usize) {}
}

/// A zero-filled block owned by the caller, freed on drop.
pub struct RawBlock<'a, A: RawAllocator + ?Sized = SystemAllocator> {
    ptr: NonNull<u8>,
    len: usize,
    allocator: &'a A,
}

impl<A: RawAllocator + ?Sized> RawBlock<'_, A> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<A: RawAllocator + ?Sized> Deref for RawBlock<'_, A> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr points to len initialized bytes owned by this block.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<A: RawAllocator + ?Sized> DerefMut for RawBlock<'_, A> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<A: RawAllocator + ?Sized> AsRef<[u8]> for RawBlock<'_, A> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl<A: RawAllocator + ?Sized> AsMut<[u8]> for RawBlock<'_, A> {
    fn as_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl<A: RawAllocator + ?Sized> Drop for RawBlock<'_, A> {
    fn drop(&mut self) {
        // SAFETY: ptr/len are exactly what allocate returned, released once.
        unsafe { self.allocator.release(self.ptr, self.len) }
    }
}

impl<A: RawAllocator + ?Sized> fmt::Debug for RawBlock<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBlock").field("len", &self.len).finish()
    }
}

/// Size actually requested for `size_request`: never below one byte.
///
/// Requests that do not fit in `usize` saturate, which no allocator can
/// satisfy.
pub fn effective_size(size_request: i64) -> usize {
    if size_request <= 0 {
        return 1;
    }
    usize::try_from(size_request).unwrap_or(usize::MAX)
}

/// Allocate a buffer of `size_request` bytes.
///
/// Non-positive requests allocate one byte. On failure the out-of-memory
/// diagnostic is emitted and `None` is returned.
pub fn xalloc<'a, A: RawAllocator + ?Sized>(
    allocator: &'a A,
    size_request: i64,
    observer: &mut dyn FormatObserver,
) -> Option<RawBlock<'a, A>> {
    let size = effective_size(size_request);
    trace!(size_request, size, "xalloc");

    let Some(ptr) = allocator.allocate(size) else {
        observer.event(TraceEvent::AllocFailed { requested: size });
        return None;
    };

    // SAFETY: the allocator returned a block of at least `size` bytes.
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, size) };

    Some(RawBlock {
        ptr,
        len: size,
        allocator,
    })
}

/// [`xalloc`] with the null check done: failure becomes an error.
pub fn try_xalloc<'a, A: RawAllocator + ?Sized>(
    allocator: &'a A,
    size_request: i64,
    observer: &mut dyn FormatObserver,
) -> FnameResult<RawBlock<'a, A>> {
    xalloc(allocator, size_request, observer).ok_or(FnameError::AllocationFailure {
        requested: effective_size(size_request),
    })
}
