//! tiny-collections: allocator-aware containers with small footprints.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a growable array, a small-buffer string, and a hash map whose
//!   entries form one bucket-ordered list, all drawing memory from a
//!   caller-chosen allocator.
//! - Layers:
//!   - `RawAllocator` (in `alloc`): the allocation capability. `Global`
//!     forwards to the process allocator; `CountingAllocator` tallies
//!     calls and live bytes for tests.
//!   - `RawBuf<T>`: an owned, uninitialised buffer. Every `unsafe` block
//!     that touches element memory lives here.
//!   - `Vector<T, A>`: contiguous sequence on top of `RawBuf`. Growth is
//!     1.5x amortised; `reserve` is exact.
//!   - `SmallString<A>`: up to 15 bytes inline, heap beyond that. Always
//!     zero-terminated.
//!   - `NodeArena<T, A>` (in `arena`): generational slots in a `Vector`
//!     with a free list. Its mutable chain walk is the only other `unsafe`.
//!   - `BucketMap<K, V, S, A>`: nodes in a `NodeArena` linked into a
//!     single list ordered by bucket; a `Vector` of bucket heads indexes
//!     into that list. Both come from the map's allocator.
//!
//! Constraints
//! - Single-threaded map: `!Send`/`!Sync` through its reentrancy guard.
//! - Containers never call `std::alloc` directly; the allocator parameter
//!   is used for all buffer, node and bucket-table memory. `clear()`
//!   returns a map's node storage to its allocator.
//! - Infallible growth paths panic on capacity overflow and abort through
//!   `handle_alloc_error` on exhaustion; `try_reserve` reports both.
//!
//! Bucket list invariants
//! - The table holds `nbuckets + 1` slots; the last is always empty.
//! - Slot `i` points at the first node whose bucket is `>= i`, or is empty
//!   when no such node exists. Bucket `i`'s entries are the nodes from
//!   slot `i` up to (not including) slot `i + 1`.
//! - Each node stores its hash; rehash and erase never call `K: Hash`.
//!
//! Reentrancy policy
//! - Map methods only run user code through `K: Eq`/`K: Hash` (and the
//!   value constructor in `insert_with`, which runs before linking). A
//!   debug-only guard panics if that code reenters the same map.
//!   Removed keys and values are dropped after the structure is
//!   consistent again.
//!
//! Notes and non-goals
//! - No thread safety, no iterator invalidation tracking beyond
//!   generational handles, no `no_std` build.

pub mod alloc;
mod arena;
pub mod bucket_map;
mod bucket_map_proptest;
pub mod hash;
mod raw_buf;
mod reentrancy;
pub mod string;
mod string_proptest;
pub mod vector;

// Public surface
pub use alloc::{AllocError, CountingAllocator, Global, RawAllocator};
pub use bucket_map::{
    BucketMap, Handle, Insert, Iter, IterMut, BUCKET_GROWTH, DEFAULT_BUCKETS, MAX_LOAD_FACTOR,
};
pub use hash::{sdbm, BuildSdbmHasher, SdbmHasher};
pub use string::{SmallString, INLINE_CAPACITY};
pub use vector::Vector;
