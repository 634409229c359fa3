//! Owned, uninitialised element storage.
//!
//! `RawBuf<T>` is the one place in the crate that does pointer arithmetic.
//! It knows its capacity but not how many slots are live; the owning
//! container tracks that and passes it back in. It does not hold its
//! allocator either: every method that touches memory takes `&A`, and the
//! owner must call [`RawBuf::release_in`] before dropping it.

use crate::alloc::{AllocError, RawAllocator};
use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem;
use core::ops::Range;
use core::ptr::{self, NonNull};

pub(crate) struct RawBuf<T> {
    ptr: NonNull<T>,
    cap: usize,
    _owns: PhantomData<T>,
}

unsafe impl<T: Send> Send for RawBuf<T> {}
unsafe impl<T: Sync> Sync for RawBuf<T> {}

impl<T> RawBuf<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Empty buffer; never allocates. Zero-sized types get unbounded capacity.
    pub(crate) const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: if Self::IS_ZST { usize::MAX } else { 0 },
            _owns: PhantomData,
        }
    }

    pub(crate) fn with_capacity_in<A: RawAllocator>(
        cap: usize,
        alloc: &A,
    ) -> Result<Self, AllocError> {
        let mut buf = Self::new();
        if cap > buf.cap {
            buf.ptr = Self::allocate(cap, alloc)?;
            buf.cap = cap;
        }
        Ok(buf)
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    fn layout(cap: usize) -> Result<Layout, AllocError> {
        Layout::array::<T>(cap).map_err(|_| AllocError::CapacityOverflow)
    }

    fn allocate<A: RawAllocator>(cap: usize, alloc: &A) -> Result<NonNull<T>, AllocError> {
        let layout = Self::layout(cap)?;
        Ok(alloc.allocate(layout)?.cast())
    }

    /// Construct `value` in slot `index`.
    ///
    /// # Safety
    /// `index < capacity()` and the slot must not hold a live value.
    #[inline]
    pub(crate) unsafe fn write(&mut self, index: usize, value: T) {
        debug_assert!(index < self.cap);
        ptr::write(self.as_mut_ptr().add(index), value)
    }

    /// Move the value out of slot `index`, leaving it logically uninitialised.
    ///
    /// # Safety
    /// The slot must hold a live value.
    #[inline]
    pub(crate) unsafe fn read(&self, index: usize) -> T {
        debug_assert!(index < self.cap);
        ptr::read(self.as_ptr().add(index))
    }

    /// # Safety
    /// The first `len` slots must be live.
    #[inline]
    pub(crate) unsafe fn slice(&self, len: usize) -> &[T] {
        debug_assert!(len <= self.cap);
        core::slice::from_raw_parts(self.as_ptr(), len)
    }

    /// # Safety
    /// The first `len` slots must be live.
    #[inline]
    pub(crate) unsafe fn slice_mut(&mut self, len: usize) -> &mut [T] {
        debug_assert!(len <= self.cap);
        core::slice::from_raw_parts_mut(self.as_mut_ptr(), len)
    }

    /// Drop the values in `range` in place.
    ///
    /// # Safety
    /// Every slot in `range` must be live; afterwards none are.
    pub(crate) unsafe fn destroy_range(&mut self, range: Range<usize>) {
        debug_assert!(range.start <= range.end && range.end <= self.cap);
        let start = self.as_mut_ptr().add(range.start);
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(start, range.len()));
    }

    /// Bitwise move of `count` slots from `src` to `dst`; ranges may overlap.
    ///
    /// # Safety
    /// Both ranges must be in bounds. Ownership moves with the bits: the
    /// source slots not covered by the destination become uninitialised.
    #[inline]
    pub(crate) unsafe fn shift(&mut self, src: usize, dst: usize, count: usize) {
        debug_assert!(src + count <= self.cap && dst + count <= self.cap);
        let base = self.as_mut_ptr();
        ptr::copy(base.add(src), base.add(dst), count)
    }

    /// Move the first `live` values into a fresh allocation of `new_cap`
    /// slots and free the old one.
    ///
    /// # Safety
    /// The first `live` slots must be live and `live <= new_cap`.
    pub(crate) unsafe fn grow_in<A: RawAllocator>(
        &mut self,
        new_cap: usize,
        live: usize,
        alloc: &A,
    ) -> Result<(), AllocError> {
        debug_assert!(live <= new_cap);
        if new_cap <= self.cap {
            return Ok(());
        }
        let new_ptr = Self::allocate(new_cap, alloc)?;
        ptr::copy_nonoverlapping(self.as_ptr(), new_ptr.as_ptr(), live);
        self.release_in(alloc);
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    /// Move the first `live` values into an allocation of exactly `new_cap`
    /// slots, or release the buffer when `new_cap` is zero.
    ///
    /// # Safety
    /// The first `live` slots must be live and `live <= new_cap`.
    pub(crate) unsafe fn shrink_in<A: RawAllocator>(
        &mut self,
        new_cap: usize,
        live: usize,
        alloc: &A,
    ) -> Result<(), AllocError> {
        debug_assert!(live <= new_cap);
        if Self::IS_ZST || new_cap >= self.cap {
            return Ok(());
        }
        if new_cap == 0 {
            self.release_in(alloc);
            return Ok(());
        }
        let new_ptr = Self::allocate(new_cap, alloc)?;
        ptr::copy_nonoverlapping(self.as_ptr(), new_ptr.as_ptr(), live);
        self.release_in(alloc);
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    /// Return the allocation to `alloc` without dropping any values.
    ///
    /// # Safety
    /// `alloc` must be the allocator this buffer was filled from, and no
    /// slot may still hold a value that needs dropping.
    pub(crate) unsafe fn release_in<A: RawAllocator>(&mut self, alloc: &A) {
        if !Self::IS_ZST && self.cap != 0 {
            // Layout was valid when allocated.
            if let Ok(layout) = Self::layout(self.cap) {
                alloc.deallocate(self.ptr.cast(), layout);
            }
        }
        *self = Self::new();
    }
}

impl RawBuf<u8> {
    /// Byte buffer with every slot initialised to zero.
    pub(crate) fn zeroed_in<A: RawAllocator>(cap: usize, alloc: &A) -> Result<Self, AllocError> {
        let mut buf = Self::with_capacity_in(cap, alloc)?;
        unsafe { ptr::write_bytes(buf.as_mut_ptr(), 0, buf.cap) };
        Ok(buf)
    }
}
