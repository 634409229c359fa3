//! Vector: growable contiguous sequence over a [`RawAllocator`].
//!
//! Growth triggered by push/insert reserves `(new_len * 3) / 2` slots, so
//! total copy work over `n` appends stays O(n). An explicit `reserve(n)`
//! allocates exactly `n`. `BucketMap` keeps its bucket table in one of
//! these.

use crate::alloc::{infallible, AllocError, Global, RawAllocator};
use crate::raw_buf::RawBuf;
use core::fmt;
use core::ops::{Deref, DerefMut, Range};

pub struct Vector<T, A: RawAllocator = Global> {
    buf: RawBuf<T>,
    len: usize,
    alloc: A,
}

impl<T> Vector<T> {
    pub const fn new() -> Self {
        Self {
            buf: RawBuf::new(),
            len: 0,
            alloc: Global,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self::with_capacity_in(cap, Global)
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Amortized target capacity for a container that must hold `needed` slots.
#[inline]
pub(crate) fn grown_capacity(needed: usize) -> usize {
    (needed.saturating_mul(3) / 2).max(needed)
}

impl<T, A: RawAllocator> Vector<T, A> {
    pub fn new_in(alloc: A) -> Self {
        Self {
            buf: RawBuf::new(),
            len: 0,
            alloc,
        }
    }

    pub fn with_capacity_in(cap: usize, alloc: A) -> Self {
        let buf = infallible(RawBuf::with_capacity_in(cap, &alloc));
        Self { buf, len: 0, alloc }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        unsafe { self.buf.slice(self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { self.buf.slice_mut(self.len) }
    }

    /// Ensure room for `cap` elements in total. Never shrinks.
    pub fn reserve(&mut self, cap: usize) {
        infallible(self.try_reserve(cap))
    }

    pub fn try_reserve(&mut self, cap: usize) -> Result<(), AllocError> {
        if cap <= self.buf.capacity() {
            return Ok(());
        }
        tracing::trace!(old = self.buf.capacity(), new = cap, "vector reallocating");
        unsafe { self.buf.grow_in(cap, self.len, &self.alloc) }
    }

    /// Drop spare capacity; an empty vector gives its buffer back.
    pub fn shrink_to_fit(&mut self) {
        if self.buf.capacity() == self.len {
            return;
        }
        tracing::trace!(old = self.buf.capacity(), new = self.len, "vector shrinking");
        infallible(unsafe { self.buf.shrink_in(self.len, self.len, &self.alloc) })
    }

    #[inline]
    fn grow_for(&mut self, needed: usize) {
        if needed > self.buf.capacity() {
            self.reserve(grown_capacity(needed));
        }
    }

    pub fn push(&mut self, value: T) {
        self.grow_for(self.len + 1);
        unsafe { self.buf.write(self.len, value) };
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(unsafe { self.buf.read(self.len) })
    }

    /// Insert `value` before position `at`.
    ///
    /// Panics if `at > len`.
    pub fn insert(&mut self, at: usize, value: T) {
        assert!(at <= self.len, "insert index {at} out of bounds (len {})", self.len);
        self.grow_for(self.len + 1);
        unsafe {
            self.buf.shift(at, at + 1, self.len - at);
            self.buf.write(at, value);
        }
        self.len += 1;
    }

    /// Remove and return the element at `at`, shifting the tail left.
    pub fn remove(&mut self, at: usize) -> T {
        assert!(at < self.len, "remove index {at} out of bounds (len {})", self.len);
        unsafe {
            let value = self.buf.read(at);
            self.buf.shift(at + 1, at, self.len - at - 1);
            self.len -= 1;
            value
        }
    }

    /// Drop the elements in `range` and close the gap.
    pub fn erase(&mut self, range: Range<usize>) {
        let Range { start, end } = range;
        assert!(
            start <= end && end <= self.len,
            "erase range {start}..{end} out of bounds (len {})",
            self.len
        );
        if start == end {
            return;
        }
        let old_len = self.len;
        // A panicking destructor leaks the tail instead of double-dropping it.
        self.len = start;
        unsafe {
            self.buf.destroy_range(start..end);
            self.buf.shift(end, start, old_len - end);
        }
        self.len = old_len - (end - start);
    }

    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let old_len = self.len;
        self.len = len;
        unsafe { self.buf.destroy_range(len..old_len) };
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Exchange contents, capacity and allocator with `other`.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other)
    }
}

impl<T: Clone, A: RawAllocator> Vector<T, A> {
    /// Insert clones of `items` before position `at`.
    pub fn insert_slice(&mut self, at: usize, items: &[T]) {
        assert!(at <= self.len, "insert index {at} out of bounds (len {})", self.len);
        let n = items.len();
        self.grow_for(self.len + n);
        let old_len = self.len;
        self.len = at;
        unsafe {
            self.buf.shift(at, at + n, old_len - at);
            for (i, item) in items.iter().enumerate() {
                self.buf.write(at + i, item.clone());
            }
        }
        self.len = old_len + n;
    }

    /// Insert clones of `self[src]` before position `at`.
    ///
    /// The result equals inserting a detached copy of those elements.
    pub fn insert_from_within(&mut self, at: usize, src: Range<usize>) {
        assert!(at <= self.len, "insert index {at} out of bounds (len {})", self.len);
        assert!(src.start <= src.end && src.end <= self.len, "source range out of bounds");
        let n = src.len();
        self.grow_for(self.len + n);
        let old_len = self.len;
        self.len = at;
        unsafe {
            self.buf.shift(at, at + n, old_len - at);
            for (i, j) in src.enumerate() {
                // Sources at or past `at` moved right by `n`.
                let from = if j < at { j } else { j + n };
                let value = (*self.buf.as_ptr().add(from)).clone();
                self.buf.write(at + i, value);
            }
        }
        self.len = old_len + n;
    }

    pub fn extend_from_slice(&mut self, items: &[T]) {
        self.insert_slice(self.len, items)
    }

    /// Grow with clones of `value` or truncate to `len`.
    pub fn resize(&mut self, len: usize, value: T) {
        if len <= self.len {
            self.truncate(len);
            return;
        }
        self.reserve(len);
        while self.len < len {
            unsafe { self.buf.write(self.len, value.clone()) };
            self.len += 1;
        }
    }
}

impl<T, A: RawAllocator> Drop for Vector<T, A> {
    fn drop(&mut self) {
        unsafe {
            self.buf.destroy_range(0..self.len);
            self.buf.release_in(&self.alloc);
        }
    }
}

impl<T, A: RawAllocator> Deref for Vector<T, A> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: RawAllocator> DerefMut for Vector<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Clone, A: RawAllocator + Clone> Clone for Vector<T, A> {
    fn clone(&self) -> Self {
        let mut v = Self::with_capacity_in(self.len, self.alloc.clone());
        v.extend_from_slice(self);
        v
    }
}

impl<T: fmt::Debug, A: RawAllocator> fmt::Debug for Vector<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, A: RawAllocator, B: RawAllocator> PartialEq<Vector<T, B>> for Vector<T, A> {
    fn eq(&self, other: &Vector<T, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: RawAllocator> Eq for Vector<T, A> {}

impl<T: PartialEq, A: RawAllocator> PartialEq<[T]> for Vector<T, A> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T, A: RawAllocator> Extend<T> for Vector<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len.saturating_add(lower));
        for v in iter {
            self.push(v);
        }
    }
}

impl<T> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v = Vector::new();
        v.extend(iter);
        v
    }
}

impl<'a, T, A: RawAllocator> IntoIterator for &'a Vector<T, A> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: RawAllocator> IntoIterator for &'a mut Vector<T, A> {
    type Item = &'a mut T;
    type IntoIter = core::slice::IterMut<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAllocator;
    use std::rc::Rc;

    /// Invariant: a fresh vector does not allocate.
    #[test]
    fn new_is_unallocated() {
        let a = CountingAllocator::new();
        let v: Vector<u32, _> = Vector::new_in(&a);
        assert_eq!(v.capacity(), 0);
        assert!(v.is_empty());
        drop(v);
        assert_eq!(a.n_allocations(), 0);
    }

    /// Invariant: push growth follows the 1.5x rule from the needed length.
    #[test]
    fn push_growth_is_one_and_a_half() {
        let mut v = Vector::new();
        v.push(1u8);
        assert_eq!(v.capacity(), 1);
        v.push(2);
        assert_eq!(v.capacity(), 3);
        v.push(3);
        v.push(4);
        assert_eq!(v.capacity(), 6);
        assert_eq!(v.as_slice(), &[1, 2, 3, 4]);
    }

    /// Invariant: the number of reallocations over n pushes is logarithmic.
    #[test]
    fn push_is_amortized() {
        let a = CountingAllocator::new();
        let mut v = Vector::new_in(&a);
        for i in 0..10_000u32 {
            v.push(i);
        }
        assert!(a.n_allocations() < 30, "allocations: {}", a.n_allocations());
        drop(v);
        assert_eq!(a.live_bytes(), 0);
    }

    /// Invariant: explicit reserve is exact and never shrinks.
    #[test]
    fn reserve_is_exact_and_monotonic() {
        let mut v: Vector<u64> = Vector::new();
        v.reserve(10);
        assert_eq!(v.capacity(), 10);
        v.reserve(4);
        assert_eq!(v.capacity(), 10);
        assert!(matches!(
            v.try_reserve(usize::MAX),
            Err(AllocError::CapacityOverflow)
        ));
        assert_eq!(v.capacity(), 10);
    }

    #[test]
    fn insert_remove_and_erase() {
        let mut v: Vector<i32> = [1, 2, 5].into_iter().collect();
        v.insert(2, 4);
        v.insert(2, 3);
        v.insert(0, 0);
        assert_eq!(v.as_slice(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(v.remove(0), 0);
        v.erase(1..3);
        assert_eq!(v.as_slice(), &[1, 4, 5]);
        v.erase(1..1);
        assert_eq!(v.len(), 3);
        v.insert_slice(1, &[2, 3]);
        assert_eq!(v.as_slice(), &[1, 2, 3, 4, 5]);
    }

    /// Invariant: inserting a range of the vector's own elements equals
    /// inserting a detached copy, whichever side of `at` the range sits.
    #[test]
    fn insert_from_within_matches_detached_copy() {
        let base: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        for at in 0..=base.len() {
            for start in 0..base.len() {
                for end in start..=base.len() {
                    let mut v: Vector<String> = base.iter().cloned().collect();
                    v.insert_from_within(at, start..end);
                    let mut expected = base.clone();
                    let copy: Vec<String> = base[start..end].to_vec();
                    expected.splice(at..at, copy);
                    assert_eq!(v.as_slice(), expected.as_slice(), "at={at} src={start}..{end}");
                }
            }
        }
    }

    /// Invariant: pushing a clone of an element already in the vector is safe
    /// even when it triggers reallocation.
    #[test]
    fn push_clone_of_own_element() {
        let mut v: Vector<String> = Vector::with_capacity(1);
        v.push("x".to_string());
        v.push(v[0].clone());
        assert_eq!(v.as_slice(), &["x".to_string(), "x".to_string()]);
    }

    /// Invariant: every live element is dropped exactly once.
    #[test]
    fn drops_are_balanced() {
        let token = Rc::new(());
        {
            let mut v = Vector::new();
            for _ in 0..8 {
                v.push(token.clone());
            }
            v.erase(2..5);
            v.truncate(3);
            let _ = v.pop();
            assert_eq!(Rc::strong_count(&token), 3);
            v.resize(5, token.clone());
            assert_eq!(Rc::strong_count(&token), 6);
        }
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn swap_and_clone() {
        let mut a: Vector<u8> = b"abc".iter().copied().collect();
        let mut b: Vector<u8> = Vector::new();
        a.swap(&mut b);
        assert!(a.is_empty());
        assert_eq!(b.as_slice(), b"abc");
        let c = b.clone();
        assert_eq!(c, b);
        assert_eq!(format!("{:?}", c), "[97, 98, 99]");
    }

    #[test]
    fn zero_sized_elements() {
        let mut v = Vector::new();
        for _ in 0..100 {
            v.push(());
        }
        assert_eq!(v.len(), 100);
        v.erase(10..90);
        assert_eq!(v.len(), 20);
    }

    /// Invariant: shrink_to_fit keeps the contents and an emptied vector
    /// returns all of its memory.
    #[test]
    fn shrink_to_fit_releases_spare_capacity() {
        let a = CountingAllocator::new();
        let mut v = Vector::with_capacity_in(32, &a);
        v.extend_from_slice(&[1u16, 2, 3]);
        v.shrink_to_fit();
        assert_eq!(v.capacity(), 3);
        assert_eq!(v.as_slice(), &[1, 2, 3]);
        v.clear();
        v.shrink_to_fit();
        assert_eq!(v.capacity(), 0);
        assert_eq!(a.live_bytes(), 0);
        v.push(4);
        assert_eq!(v.as_slice(), &[4]);
    }
}
