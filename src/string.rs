//! SmallString: zero-terminated byte string with inline storage.
//!
//! Up to [`INLINE_CAPACITY`] bytes live inside the struct. Anything larger
//! is promoted to a heap buffer obtained from the string's allocator, and
//! the string stays on the heap from then on (clearing or shrinking the
//! content keeps the allocation). Both modes keep the same invariant: the
//! storage holds `len()` live bytes followed by one zero byte, so
//! [`SmallString::as_bytes_with_nul`] is always valid.
//!
//! Appends and inserts that overflow grow to `(new_len * 3) / 2`; `reserve`
//! and `assign` allocate exactly what they are asked for.

use crate::alloc::{infallible, AllocError, Global, RawAllocator};
use crate::raw_buf::RawBuf;
use crate::vector::grown_capacity;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Add, AddAssign, Deref, Range};

/// Bytes a string can hold before it needs a heap buffer.
pub const INLINE_CAPACITY: usize = 15;

const INLINE_BUF: usize = INLINE_CAPACITY + 1;

enum Repr {
    Inline { buf: [u8; INLINE_BUF], len: u8 },
    // Every byte of `buf` is initialised (zeroed on allocation).
    // Capacity is `buf.capacity() - 1`; the last slot is for the terminator.
    Heap { buf: RawBuf<u8>, len: usize },
}

impl Repr {
    const EMPTY: Repr = Repr::Inline {
        buf: [0; INLINE_BUF],
        len: 0,
    };

    #[inline]
    fn len(&self) -> usize {
        match self {
            Repr::Inline { len, .. } => *len as usize,
            Repr::Heap { len, .. } => *len,
        }
    }

    /// Whole storage, terminator slot included.
    #[inline]
    fn storage(&self) -> &[u8] {
        match self {
            Repr::Inline { buf, .. } => &buf[..],
            Repr::Heap { buf, .. } => unsafe { buf.slice(buf.capacity()) },
        }
    }

    #[inline]
    fn storage_mut(&mut self) -> &mut [u8] {
        match self {
            Repr::Inline { buf, .. } => &mut buf[..],
            Repr::Heap { buf, .. } => {
                let cap = buf.capacity();
                unsafe { buf.slice_mut(cap) }
            }
        }
    }

    /// Set the length and write the terminator after it.
    #[inline]
    fn set_len(&mut self, n: usize) {
        self.storage_mut()[n] = 0;
        match self {
            Repr::Inline { len, .. } => {
                debug_assert!(n <= INLINE_CAPACITY);
                *len = n as u8;
            }
            Repr::Heap { len, .. } => *len = n,
        }
    }
}

pub struct SmallString<A: RawAllocator = Global> {
    repr: Repr,
    alloc: A,
}

impl SmallString {
    pub const fn new() -> Self {
        Self {
            repr: Repr::EMPTY,
            alloc: Global,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self::with_capacity_in(cap, Global)
    }
}

impl Default for SmallString {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: RawAllocator> SmallString<A> {
    pub fn new_in(alloc: A) -> Self {
        Self {
            repr: Repr::EMPTY,
            alloc,
        }
    }

    pub fn with_capacity_in(cap: usize, alloc: A) -> Self {
        let mut s = Self::new_in(alloc);
        s.reserve(cap);
        s
    }

    /// A string holding a copy of `bytes`, with capacity exactly `bytes.len()`
    /// once past the inline limit.
    pub fn from_bytes_in(bytes: &[u8], alloc: A) -> Self {
        let mut s = Self::new_in(alloc);
        s.assign(bytes);
        s
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.repr.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Inline { .. } => INLINE_CAPACITY,
            Repr::Heap { buf, .. } => buf.capacity() - 1,
        }
    }

    /// True while the content lives in the inline buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.repr, Repr::Inline { .. })
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.repr.storage()[..self.len()]
    }

    /// The content followed by its zero terminator.
    #[inline]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.repr.storage()[..self.len() + 1]
    }

    /// Mutable view of the live bytes; the terminator is not reachable.
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.repr.storage_mut()[..len]
    }

    pub fn to_str(&self) -> Result<&str, core::str::Utf8Error> {
        core::str::from_utf8(self.as_bytes())
    }

    /// Ensure room for `cap` bytes plus terminator. Never shrinks.
    pub fn reserve(&mut self, cap: usize) {
        infallible(self.try_reserve(cap))
    }

    pub fn try_reserve(&mut self, cap: usize) -> Result<(), AllocError> {
        let old_cap = self.capacity();
        if cap <= old_cap {
            return Ok(());
        }
        let total = cap.checked_add(1).ok_or(AllocError::CapacityOverflow)?;
        let mut fresh = RawBuf::zeroed_in(total, &self.alloc)?;
        let len = self.len();
        // Content plus terminator.
        unsafe { fresh.slice_mut(total)[..=len].copy_from_slice(&self.repr.storage()[..=len]) };
        let promoted = self.is_inline();
        if let Repr::Heap { buf, .. } = &mut self.repr {
            unsafe { buf.release_in(&self.alloc) };
        }
        self.repr = Repr::Heap { buf: fresh, len };
        tracing::trace!(from = old_cap, to = cap, promoted, "small string reallocating");
        Ok(())
    }

    #[inline]
    fn grow_for(&mut self, needed: usize) {
        if needed > self.capacity() {
            self.reserve(grown_capacity(needed));
        }
    }

    /// Replace the content with `bytes`.
    pub fn assign(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.repr.storage_mut()[..bytes.len()].copy_from_slice(bytes);
        self.repr.set_len(bytes.len());
    }

    pub fn append(&mut self, bytes: &[u8]) {
        let len = self.len();
        let new_len = len + bytes.len();
        self.grow_for(new_len);
        self.repr.storage_mut()[len..new_len].copy_from_slice(bytes);
        self.repr.set_len(new_len);
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.append(&[byte])
    }

    pub fn push_str(&mut self, s: &str) {
        self.append(s.as_bytes())
    }

    /// Insert `bytes` before position `at`.
    ///
    /// Panics if `at > len()`.
    pub fn insert(&mut self, at: usize, bytes: &[u8]) {
        let len = self.len();
        assert!(at <= len, "insert index {at} out of bounds (len {len})");
        let n = bytes.len();
        self.grow_for(len + n);
        let storage = self.repr.storage_mut();
        storage.copy_within(at..len, at + n);
        storage[at..at + n].copy_from_slice(bytes);
        self.repr.set_len(len + n);
    }

    /// Insert a copy of `self[src]` before position `at`.
    ///
    /// The tail moves first, then the source bytes are read from wherever
    /// they ended up, so the result equals inserting a detached copy.
    pub fn insert_from_within(&mut self, at: usize, src: Range<usize>) {
        let len = self.len();
        assert!(at <= len, "insert index {at} out of bounds (len {len})");
        assert!(
            src.start <= src.end && src.end <= len,
            "source range {}..{} out of bounds (len {len})",
            src.start,
            src.end
        );
        let n = src.len();
        self.grow_for(len + n);
        let storage = self.repr.storage_mut();
        storage.copy_within(at..len, at + n);
        // Part of the source before `at` did not move.
        let head = src.start..src.end.min(at).max(src.start);
        let head_len = head.len();
        storage.copy_within(head, at);
        // Part at or past `at` now sits `n` bytes further right.
        let tail_start = src.start.max(at);
        if tail_start < src.end {
            storage.copy_within(tail_start + n..src.end + n, at + head_len);
        }
        self.repr.set_len(len + n);
    }

    /// Remove the bytes in `range`, shifting the remainder left.
    pub fn erase(&mut self, range: Range<usize>) {
        let len = self.len();
        let Range { start, end } = range;
        assert!(
            start <= end && end <= len,
            "erase range {start}..{end} out of bounds (len {len})"
        );
        if start == end {
            return;
        }
        self.repr.storage_mut().copy_within(end..len, start);
        self.repr.set_len(len - (end - start));
    }

    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.repr.set_len(len);
        }
    }

    /// Empty the string; capacity and storage mode are kept.
    pub fn clear(&mut self) {
        self.repr.set_len(0);
    }

    /// Grow with `fill` bytes or truncate to `len`.
    pub fn resize(&mut self, len: usize, fill: u8) {
        let old = self.len();
        if len <= old {
            self.truncate(len);
            return;
        }
        self.reserve(len);
        self.repr.storage_mut()[old..len].fill(fill);
        self.repr.set_len(len);
    }

    /// Exchange representations. Heap buffers change owner; nothing is
    /// allocated or copied beyond the struct itself.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other)
    }
}

impl<A: RawAllocator> Drop for SmallString<A> {
    fn drop(&mut self) {
        if let Repr::Heap { buf, .. } = &mut self.repr {
            unsafe { buf.release_in(&self.alloc) };
        }
    }
}

impl<A: RawAllocator + Clone> Clone for SmallString<A> {
    fn clone(&self) -> Self {
        Self::from_bytes_in(self.as_bytes(), self.alloc.clone())
    }
}

impl<A: RawAllocator> Deref for SmallString<A> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: RawAllocator> AsRef<[u8]> for SmallString<A> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: RawAllocator> Borrow<[u8]> for SmallString<A> {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<&str> for SmallString {
    fn from(s: &str) -> Self {
        Self::from_bytes_in(s.as_bytes(), Global)
    }
}

impl From<&[u8]> for SmallString {
    fn from(b: &[u8]) -> Self {
        Self::from_bytes_in(b, Global)
    }
}

impl<A: RawAllocator> fmt::Debug for SmallString<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&String::from_utf8_lossy(self.as_bytes()), f)
    }
}

impl<A: RawAllocator> fmt::Write for SmallString<A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl<A: RawAllocator> Hash for SmallString<A> {
    // Same as `[u8]` so `Borrow<[u8]>` lookups agree.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}

impl<A: RawAllocator, B: RawAllocator> PartialEq<SmallString<B>> for SmallString<A> {
    fn eq(&self, other: &SmallString<B>) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<A: RawAllocator> Eq for SmallString<A> {}

impl<A: RawAllocator, B: RawAllocator> PartialOrd<SmallString<B>> for SmallString<A> {
    fn partial_cmp(&self, other: &SmallString<B>) -> Option<Ordering> {
        Some(self.as_bytes().cmp(other.as_bytes()))
    }
}

impl<A: RawAllocator> Ord for SmallString<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

macro_rules! impl_cmp_bytes {
    ($($rhs:ty, |$o:ident| $bytes:expr;)*) => {$(
        impl<A: RawAllocator> PartialEq<$rhs> for SmallString<A> {
            fn eq(&self, $o: &$rhs) -> bool {
                self.as_bytes() == $bytes
            }
        }

        impl<A: RawAllocator> PartialEq<SmallString<A>> for $rhs {
            fn eq(&self, other: &SmallString<A>) -> bool {
                other == self
            }
        }

        impl<A: RawAllocator> PartialOrd<$rhs> for SmallString<A> {
            fn partial_cmp(&self, $o: &$rhs) -> Option<Ordering> {
                Some(self.as_bytes().cmp($bytes))
            }
        }

        impl<A: RawAllocator> PartialOrd<SmallString<A>> for $rhs {
            fn partial_cmp(&self, other: &SmallString<A>) -> Option<Ordering> {
                other.partial_cmp(self).map(Ordering::reverse)
            }
        }
    )*};
}

impl_cmp_bytes! {
    str, |o| o.as_bytes();
    &str, |o| o.as_bytes();
    [u8], |o| o;
    &[u8], |o| *o;
}

impl<A: RawAllocator> AddAssign<&str> for SmallString<A> {
    fn add_assign(&mut self, rhs: &str) {
        self.push_str(rhs)
    }
}

impl<A: RawAllocator> AddAssign<&[u8]> for SmallString<A> {
    fn add_assign(&mut self, rhs: &[u8]) {
        self.append(rhs)
    }
}

impl<A: RawAllocator> AddAssign<u8> for SmallString<A> {
    fn add_assign(&mut self, rhs: u8) {
        self.push(rhs)
    }
}

impl<A: RawAllocator, B: RawAllocator> AddAssign<&SmallString<B>> for SmallString<A> {
    fn add_assign(&mut self, rhs: &SmallString<B>) {
        self.append(rhs.as_bytes())
    }
}

impl<A: RawAllocator> Add<&str> for SmallString<A> {
    type Output = SmallString<A>;
    fn add(mut self, rhs: &str) -> Self::Output {
        self.push_str(rhs);
        self
    }
}

impl<A: RawAllocator, B: RawAllocator> Add<&SmallString<B>> for SmallString<A> {
    type Output = SmallString<A>;
    fn add(mut self, rhs: &SmallString<B>) -> Self::Output {
        self.append(rhs.as_bytes());
        self
    }
}

impl<A: RawAllocator, B: RawAllocator> Add<SmallString<B>> for SmallString<A> {
    type Output = SmallString<A>;
    fn add(mut self, rhs: SmallString<B>) -> Self::Output {
        self.append(rhs.as_bytes());
        self
    }
}

impl<A: RawAllocator> Add<SmallString<A>> for &str {
    type Output = SmallString<A>;
    fn add(self, mut rhs: SmallString<A>) -> Self::Output {
        rhs.insert(0, self.as_bytes());
        rhs
    }
}

impl<A: RawAllocator> Extend<u8> for SmallString<A> {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        for b in iter {
            self.push(b);
        }
    }
}

impl<'a, A: RawAllocator> Extend<&'a u8> for SmallString<A> {
    fn extend<I: IntoIterator<Item = &'a u8>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied())
    }
}

impl FromIterator<u8> for SmallString {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut s = SmallString::new();
        s.extend(iter);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAllocator;
    use core::fmt::Write;

    fn assert_terminated<A: RawAllocator>(s: &SmallString<A>) {
        let with_nul = s.as_bytes_with_nul();
        assert_eq!(with_nul.len(), s.len() + 1);
        assert_eq!(with_nul[s.len()], 0);
    }

    /// Invariant: a new string is inline, empty, and terminated.
    #[test]
    fn empty_string_is_inline() {
        let s = SmallString::new();
        assert!(s.is_empty());
        assert!(s.is_inline());
        assert_eq!(s.capacity(), 15);
        assert_eq!(s.as_bytes_with_nul(), b"\0");
        assert_eq!(s, "");
    }

    /// Invariant: content up to the inline capacity never allocates.
    #[test]
    fn short_strings_stay_inline() {
        let a = CountingAllocator::new();
        let s = SmallString::from_bytes_in(b"exactly 15 char", &a);
        assert_eq!(s.len(), 15);
        assert_eq!(s.capacity(), 15);
        assert!(s.is_inline());
        assert_terminated(&s);
        assert_eq!(a.n_allocations(), 0);
    }

    /// Invariant: constructing from a long slice reserves exactly its length.
    #[test]
    fn long_construction_is_exact() {
        let origin = "very long string larger than large string limit";
        let s = SmallString::from(origin);
        assert_eq!(s.len(), origin.len());
        assert_eq!(s.capacity(), origin.len());
        assert!(!s.is_inline());
        assert_eq!(s, origin);
        assert_terminated(&s);
    }

    /// Invariant: assigning short content after long keeps the heap buffer.
    #[test]
    fn assign_keeps_capacity() {
        let mut s = SmallString::new();
        s.assign(b"short");
        assert_eq!(s.capacity(), 15);
        let long = b"long long long long long long long long long long long long";
        s.assign(long);
        assert_eq!(s.capacity(), long.len());
        s.assign(b"short");
        assert_eq!(s, "short");
        assert_eq!(s.capacity(), long.len());
        assert!(!s.is_inline());
        assert_terminated(&s);
    }

    /// Invariant: reserve is a no-op at or below capacity and exact above it.
    #[test]
    fn reserve_behaviour() {
        let mut s = SmallString::new();
        s.reserve(0);
        assert_eq!(s.capacity(), 15);
        s.reserve(10);
        s.assign(b"short");
        s.reserve(15);
        assert_eq!(s.capacity(), 15);
        assert!(s.is_inline());
        s.reserve(100);
        assert_eq!(s.capacity(), 100);
        assert_eq!(s, "short");
        s.reserve(101);
        assert_eq!(s.capacity(), 101);
        assert_eq!(s, "short");
        s.reserve(50);
        assert_eq!(s.capacity(), 101);
        assert!(matches!(
            s.try_reserve(usize::MAX),
            Err(AllocError::CapacityOverflow)
        ));
    }

    #[test]
    fn resize_fills_and_truncates() {
        let mut s = SmallString::new();
        s.resize(1, b' ');
        assert_eq!(s, " ");
        s.resize(16, b'+');
        assert_eq!(s, " +++++++++++++++");
        s.clear();
        s.resize(16, b'@');
        assert_eq!(s, "@@@@@@@@@@@@@@@@");
        s.resize(12, b'-');
        assert_eq!(s, "@@@@@@@@@@@@");
        assert_terminated(&s);
    }

    #[test]
    fn append_and_operators() {
        let mut s = SmallString::new();
        s += "hello";
        s += b' ';
        s += "world";
        assert_eq!(s, "hello world");
        s += " and this is a very long string";
        assert_eq!(s, "hello world and this is a very long string");

        assert_eq!(SmallString::from("hello") + SmallString::from(" world"), "hello world");
        assert_eq!(SmallString::from("hello") + " world", "hello world");
        assert_eq!(SmallString::from("hello") + " " + "world", "hello world");
        assert_eq!("hello" + SmallString::from(" ") + "world", "hello world");
    }

    #[test]
    fn insert_positions() {
        let mut s = SmallString::from("world");
        s.insert(s.len(), b"!");
        assert_eq!(s, "world!");
        s.insert(0, b"hello");
        assert_eq!(s, "helloworld!");
        s.insert(5, b" ");
        assert_eq!(s, "hello world!");
        s.insert(s.len() - 1, b", prepend a huge string to check");
        assert_eq!(s, "hello world, prepend a huge string to check!");
        assert_terminated(&s);
    }

    #[test]
    fn erase_ranges() {
        let mut s = SmallString::from("hello");
        s.erase(0..s.len());
        assert!(s.is_empty());
        s.assign(b"hello");
        s.erase(4..5);
        assert_eq!(s, "hell");
        s.erase(2..2);
        assert_eq!(s, "hell");
        s.assign(b"hello world and this is a very long string");
        s.erase(0..4);
        assert_eq!(s, "o world and this is a very long string");
        s.erase(0..s.len());
        assert!(s.is_empty());
        assert!(!s.is_inline());
        assert_terminated(&s);
    }

    /// Invariant: inserting a range of the string's own bytes equals
    /// inserting a detached copy, wherever the range sits relative to `at`.
    #[test]
    fn insert_from_within_matches_detached_copy() {
        for base in ["abcdefgh", "abcdefghijklmnopqrstuvwxyz"] {
            let len = base.len();
            for at in 0..=len {
                for start in 0..len {
                    for end in start..=len {
                        let mut aliased = SmallString::from(base);
                        aliased.insert_from_within(at, start..end);

                        let mut detached = SmallString::from(base);
                        let copy = base.as_bytes()[start..end].to_vec();
                        detached.insert(at, &copy);

                        assert_eq!(aliased, detached, "at={at} src={start}..{end}");
                        assert_terminated(&aliased);
                    }
                }
            }
        }
    }

    /// Invariant: swap exchanges every combination of inline and heap.
    #[test]
    fn swap_all_modes() {
        let mut ss1 = SmallString::from("short");
        let mut ss2 = SmallString::from("another");
        let mut sl1 = SmallString::from("long string for testing purposes");
        let mut sl2 = SmallString::from("another long string for testing purposes");

        ss1.swap(&mut ss2);
        assert_eq!(ss1, "another");
        assert_eq!(ss2, "short");

        sl1.swap(&mut sl2);
        assert_eq!(sl1, "another long string for testing purposes");
        assert_eq!(sl2, "long string for testing purposes");

        ss1.swap(&mut sl2);
        assert_eq!(ss1, "long string for testing purposes");
        assert_eq!(sl2, "another");
        assert!(sl2.is_inline());
        assert!(!ss1.is_inline());

        sl1.swap(&mut ss2);
        assert_eq!(sl1, "short");
        assert_eq!(ss2, "another long string for testing purposes");
    }

    /// Invariant: swapping never calls the allocator.
    #[test]
    fn swap_does_not_allocate() {
        let a = CountingAllocator::new();
        let mut x = SmallString::from_bytes_in(b"inline", &a);
        let mut y = SmallString::from_bytes_in(b"a heap allocated string value", &a);
        let before = (a.n_allocations(), a.n_deallocations());
        x.swap(&mut y);
        assert_eq!((a.n_allocations(), a.n_deallocations()), before);
        drop(x);
        drop(y);
        assert_eq!(a.live_bytes(), 0);
    }

    #[test]
    fn comparisons_are_lexicographic() {
        let s = SmallString::from("hello");
        assert!(s == SmallString::from("hello"));
        assert!("hello" == s);
        assert!(s != "hello world");
        assert!(!(s < "hello"));
        assert!(s < "helloo");
        assert!(s < "hello0");
        assert!(s > "he1");
        assert!(s > "hell");
        assert!(s > "aaaaaaaa");
        assert!(s < "zzzzzzzz");
        assert!(s > "hella");
        assert!(s < "hellz");
        assert!(s <= "hello");
        assert!(s >= "hello");
        assert_eq!(s.cmp(&SmallString::from("help")), Ordering::Less);
        assert!(s == b"hello"[..]);
    }

    #[test]
    fn debug_and_write() {
        let mut s = SmallString::new();
        write!(s, "{}-{}", 12, "ab").unwrap();
        assert_eq!(s, "12-ab");
        assert_eq!(format!("{:?}", s), "\"12-ab\"");
        assert_eq!(s.to_str(), Ok("12-ab"));
    }

    #[test]
    fn clone_is_independent() {
        let a = SmallString::from("a string long enough to need the heap");
        let mut b = a.clone();
        b.erase(0..2);
        assert_eq!(a, "a string long enough to need the heap");
        assert_eq!(b, "string long enough to need the heap");
        assert_eq!(b.capacity(), a.len());
    }
}
