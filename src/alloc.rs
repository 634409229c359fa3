//! Allocator capability consumed by every container in the crate.
//!
//! Containers never talk to `std::alloc` directly; they go through a
//! [`RawAllocator`] they own (or borrow, via the blanket `&A` impl). The
//! trait moves raw bytes in and out, sized by a
//! `Layout` that the caller must hand back unchanged on deallocation.

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

/// Reasons a fallible reservation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The requested element count does not fit in `isize::MAX` bytes.
    #[error("capacity overflow")]
    CapacityOverflow,
    /// The allocator returned no memory for a valid layout.
    #[error("allocator could not provide {size} bytes (align {align})")]
    Exhausted { size: usize, align: usize },
}

impl AllocError {
    pub(crate) fn exhausted(layout: Layout) -> Self {
        AllocError::Exhausted {
            size: layout.size(),
            align: layout.align(),
        }
    }
}

/// Raw byte allocation by layout.
///
/// # Safety
/// Implementations must return storage valid for `layout.size()` bytes at
/// `layout.align()` until the matching `deallocate` call. Callers never
/// request zero-sized layouts.
pub unsafe trait RawAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same `layout`.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

unsafe impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}

/// The process allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

unsafe impl RawAllocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or_else(|| AllocError::exhausted(layout))
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }
}

/// Forwards to [`Global`] and records what passed through it.
///
/// Single-threaded bookkeeping; share it between containers by reference.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    live_bytes: Cell<usize>,
}

impl CountingAllocator {
    pub const fn new() -> Self {
        Self {
            allocations: Cell::new(0),
            deallocations: Cell::new(0),
            live_bytes: Cell::new(0),
        }
    }

    /// Number of successful `allocate` calls.
    pub fn n_allocations(&self) -> usize {
        self.allocations.get()
    }

    pub fn n_deallocations(&self) -> usize {
        self.deallocations.get()
    }

    /// Bytes handed out and not yet returned.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }
}

unsafe impl RawAllocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = Global.allocate(layout)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + layout.size());
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.set(self.deallocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - layout.size());
        Global.deallocate(ptr, layout)
    }
}

/// Resolve a failed reservation on an infallible path.
///
/// Overflow is a caller bug and panics; exhaustion goes to the process-wide
/// allocation error handler, which aborts by default.
#[track_caller]
pub(crate) fn infallible<T>(res: Result<T, AllocError>) -> T {
    match res {
        Ok(v) => v,
        Err(AllocError::CapacityOverflow) => panic!("capacity overflow"),
        Err(AllocError::Exhausted { size, align }) => {
            let layout = Layout::from_size_align(size, align)
                .unwrap_or_else(|_| Layout::new::<u8>());
            std::alloc::handle_alloc_error(layout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: counters track allocate/deallocate pairs and live bytes.
    #[test]
    fn counting_allocator_tracks_pairs() {
        let a = CountingAllocator::new();
        let layout = Layout::from_size_align(24, 8).unwrap();
        let p = a.allocate(layout).unwrap();
        assert_eq!(a.n_allocations(), 1);
        assert_eq!(a.live_bytes(), 24);
        unsafe { a.deallocate(p, layout) };
        assert_eq!(a.n_deallocations(), 1);
        assert_eq!(a.live_bytes(), 0);
    }

    /// Invariant: a borrowed allocator forwards to the same counters.
    #[test]
    fn borrowed_allocator_forwards() {
        let a = CountingAllocator::new();
        let r = &a;
        let layout = Layout::new::<u64>();
        let p = r.allocate(layout).unwrap();
        unsafe { r.deallocate(p, layout) };
        assert_eq!(a.n_allocations(), 1);
        assert_eq!(a.n_deallocations(), 1);
    }

    #[test]
    fn alloc_error_messages() {
        assert_eq!(AllocError::CapacityOverflow.to_string(), "capacity overflow");
        let e = AllocError::exhausted(Layout::from_size_align(64, 16).unwrap());
        assert_eq!(
            e.to_string(),
            "allocator could not provide 64 bytes (align 16)"
        );
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn infallible_panics_on_overflow() {
        infallible::<()>(Err(AllocError::CapacityOverflow));
    }
}
