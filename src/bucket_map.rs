//! BucketMap: hash map over one bucket-ordered linked list.
//!
//! Every entry is a node in a single doubly linked list, sorted by bucket
//! index; nodes of the same bucket sit next to each other. The bucket table
//! has `nbuckets + 1` slots and slot `i` holds the first node whose bucket is
//! `>= i`, so bucket `b` is the run from `buckets[b]` up to (not including)
//! `buckets[b + 1]`, and the last slot is always `None`. Iteration starts at
//! `buckets[0]` and follows `next`.
//!
//! Nodes live in a generational arena drawn from the map's allocator and
//! link to each other by arena keys, so a `Handle` to an erased entry never
//! resolves to a later one. `clear` hands the node storage back.
//! Each node stores the hash computed when it was inserted; erase and rehash
//! re-bucket from that value without calling `K: Hash` again.

use crate::alloc::{Global, RawAllocator};
use crate::arena::{ChainMut, NodeArena, NodeKey};
use crate::hash::BuildSdbmHasher;
use crate::reentrancy::ReentrancyGuard;
use crate::vector::Vector;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;

/// Bucket count of a map built with `new()`.
pub const DEFAULT_BUCKETS: usize = 8;
/// Entries per bucket tolerated before a rehash.
pub const MAX_LOAD_FACTOR: usize = 4;
/// Factor applied to the bucket count on rehash.
pub const BUCKET_GROWTH: usize = 8;

/// Stable reference to one entry; see [`BucketMap::find`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(NodeKey);

impl Handle {
    pub fn key<'a, K, V, S, A: RawAllocator>(&self, map: &'a BucketMap<K, V, S, A>) -> Option<&'a K> {
        map.handle_key(*self)
    }

    pub fn value<'a, K, V, S, A: RawAllocator>(&self, map: &'a BucketMap<K, V, S, A>) -> Option<&'a V> {
        map.handle_value(*self)
    }

    pub fn value_mut<'a, K, V, S, A: RawAllocator>(
        &self,
        map: &'a mut BucketMap<K, V, S, A>,
    ) -> Option<&'a mut V> {
        map.handle_value_mut(*self)
    }
}

/// Outcome of an insert. Duplicate keys are not an error: the existing
/// entry is reported and left untouched.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Insert {
    Inserted(Handle),
    Occupied(Handle),
}

impl Insert {
    pub fn handle(&self) -> Handle {
        match *self {
            Insert::Inserted(h) | Insert::Occupied(h) => h,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Insert::Inserted(_))
    }
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    hash: u64,
    next: Option<NodeKey>,
    prev: Option<NodeKey>,
}

type Nodes<K, V, A> = NodeArena<Node<K, V>, A>;

#[inline]
fn bucket_index(hash: u64, nbuckets: usize) -> usize {
    (hash as usize) & (nbuckets - 1)
}

/// Thread `key` into the list at the end of its bucket's run and point
/// every bucket slot that was borrowing the following run at it.
fn link<K, V, A: RawAllocator>(nodes: &mut Nodes<K, V, A>, buckets: &mut [Option<NodeKey>], key: NodeKey) {
    let nbuckets = buckets.len() - 1;
    let mut b = bucket_index(nodes[key].hash, nbuckets);

    let succ = buckets[b + 1];
    nodes[key].next = succ;
    match succ {
        Some(s) => {
            let prev = nodes[s].prev;
            nodes[key].prev = prev;
            nodes[s].prev = Some(key);
            if let Some(p) = prev {
                nodes[p].next = Some(key);
            }
        }
        None => {
            // Nothing at or past b+1: append after the list tail, which is
            // reached from the nearest non-empty bucket at or below b.
            let mut head = b;
            while head > 0 && buckets[head].is_none() {
                head -= 1;
            }
            let mut tail = buckets[head];
            while let Some(n) = tail.and_then(|t| nodes[t].next) {
                tail = Some(n);
            }
            nodes[key].prev = tail;
            if let Some(t) = tail {
                nodes[t].next = Some(key);
            }
        }
    }

    // Bucket 0 is included.
    while buckets[b] == succ {
        buckets[b] = Some(key);
        if b == 0 {
            break;
        }
        b -= 1;
    }
}

/// Inverse of [`link`]: hand the node's bucket slots to its successor and
/// splice it out of the list. The node stays in the arena.
fn unlink<K, V, A: RawAllocator>(nodes: &mut Nodes<K, V, A>, buckets: &mut [Option<NodeKey>], key: NodeKey) {
    let nbuckets = buckets.len() - 1;
    let (hash, next, prev) = {
        let n = &nodes[key];
        (n.hash, n.next, n.prev)
    };

    let mut b = bucket_index(hash, nbuckets);
    while buckets[b] == Some(key) {
        buckets[b] = next;
        if b == 0 {
            break;
        }
        b -= 1;
    }

    if let Some(p) = prev {
        nodes[p].next = next;
    }
    if let Some(n) = next {
        nodes[n].prev = prev;
    }
}

pub struct BucketMap<K, V, S = BuildSdbmHasher, A: RawAllocator = Global> {
    hasher: S,
    nodes: Nodes<K, V, A>,
    buckets: Vector<Option<NodeKey>, A>,
    initial_buckets: usize,
    reentrancy: ReentrancyGuard,
}

impl<K, V> BucketMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Map with at least `nbuckets` buckets (rounded up to a power of two).
    pub fn with_buckets(nbuckets: usize) -> Self {
        Self::with_buckets_and_hasher_in(nbuckets, BuildSdbmHasher, Global)
    }
}

impl<K, V> Default for BucketMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> BucketMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_buckets_and_hasher_in(DEFAULT_BUCKETS, hasher, Global)
    }
}

/// Iterator over entries in bucket order.
pub struct Iter<'a, K, V, A: RawAllocator = Global> {
    nodes: &'a Nodes<K, V, A>,
    cur: Option<NodeKey>,
    remaining: usize,
}

impl<'a, K, V, A: RawAllocator> Iterator for Iter<'a, K, V, A> {
    type Item = (Handle, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur?;
        let node = &self.nodes[k];
        self.cur = node.next;
        self.remaining -= 1;
        Some((Handle(k), &node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, A: RawAllocator> ExactSizeIterator for Iter<'_, K, V, A> {}

/// Iterator over entries in bucket order with mutable values.
pub struct IterMut<'a, K, V> {
    chain: ChainMut<'a, Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Handle, &'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (k, node) = self.chain.next()?;
        self.remaining -= 1;
        Some((Handle(k), &node.key, &mut node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V, S, A: RawAllocator> BucketMap<K, V, S, A> {
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of logical buckets (the table holds one more slot).
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len() - 1
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// First entry in iteration order.
    pub fn begin(&self) -> Option<Handle> {
        self.buckets[0].map(Handle)
    }

    /// Entry after `h` in iteration order; `None` at the end or for a stale handle.
    pub fn next_handle(&self, h: Handle) -> Option<Handle> {
        self.nodes.get(h.0)?.next.map(Handle)
    }

    /// Bucket currently holding `h`.
    pub fn bucket_of(&self, h: Handle) -> Option<usize> {
        let node = self.nodes.get(h.0)?;
        Some(bucket_index(node.hash, self.bucket_count()))
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&K> {
        self.nodes.get(h.0).map(|n| &n.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.nodes.get(h.0).map(|n| &n.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.nodes.get_mut(h.0).map(|n| &mut n.value)
    }

    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter {
            nodes: &self.nodes,
            cur: self.buckets[0],
            remaining: self.nodes.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(_, k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, _, v)| v)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let remaining = self.nodes.len();
        // SAFETY: the list from `buckets[0]` is acyclic and links every
        // live node exactly once (see `assert_invariants`).
        let chain = unsafe { self.nodes.chain_mut(self.buckets[0], |n| n.next) };
        IterMut { chain, remaining }
    }

    /// Visit every entry in bucket order with mutable access to the value.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        for (_, k, v) in self.iter_mut() {
            f(k, v);
        }
    }

    /// Remove the entry behind `h`. Stale handles return `None`.
    pub fn erase(&mut self, h: Handle) -> Option<(K, V)> {
        let node = {
            let _g = self.reentrancy.enter();
            if !self.nodes.contains_key(h.0) {
                return None;
            }
            unlink(&mut self.nodes, &mut self.buckets, h.0);
            self.nodes.remove(h.0)?
        };
        self.reset_if_empty();
        // Structure is consistent again; dropping K/V may re-enter.
        Some((node.key, node.value))
    }

    /// Keep only the entries for which `keep` returns true, in bucket order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut cur = self.buckets[0];
        while let Some(k) = cur {
            let node = &mut self.nodes[k];
            cur = node.next;
            if !keep(&node.key, &mut node.value) {
                unlink(&mut self.nodes, &mut self.buckets, k);
                self.nodes.remove(k);
            }
        }
        self.reset_if_empty();
    }

    /// Destroy every entry, return the node storage to the allocator and
    /// shrink the table back to its initial bucket count.
    pub fn clear(&mut self) {
        let len = self.nodes.len();
        let slots = self.nodes.slot_capacity();
        self.reset_table(self.initial_buckets);
        self.nodes.release();
        tracing::trace!(len, slots, buckets = self.initial_buckets, "bucket map cleared");
    }

    /// Exchange entries, tables and hashers with `other`.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other)
    }

    fn reset_table(&mut self, nbuckets: usize) {
        self.buckets.clear();
        self.buckets.resize(nbuckets + 1, None);
    }

    // An emptied map goes back to its initial bucket count. The table and
    // node slots keep their allocations, so this never allocates.
    fn reset_if_empty(&mut self) {
        if self.nodes.is_empty() && self.bucket_count() != self.initial_buckets {
            self.reset_table(self.initial_buckets);
        }
    }

    /// Re-bucket every node into a table of `nbuckets` buckets.
    fn rehash(&mut self, nbuckets: usize) {
        let from = self.bucket_count();
        let mut root = self.buckets[0];
        self.reset_table(nbuckets);
        while let Some(k) = root {
            let node = &mut self.nodes[k];
            root = node.next;
            node.next = None;
            node.prev = None;
            link(&mut self.nodes, &mut self.buckets, k);
        }
        tracing::debug!(from, to = nbuckets, len = self.nodes.len(), "bucket map rehashed");
    }

    /// Panic unless every bucket slot points at the first node whose bucket
    /// is at or past it and the list is consistently linked in bucket order.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let nbuckets = self.bucket_count();
        assert!(nbuckets.is_power_of_two(), "bucket count {nbuckets} is not a power of two");
        assert_eq!(self.buckets[nbuckets], None, "end sentinel must be empty");

        let mut order: Vec<(NodeKey, usize)> = Vec::with_capacity(self.nodes.len());
        let mut prev: Option<NodeKey> = None;
        let mut cur = self.buckets[0];
        while let Some(k) = cur {
            let node = self.nodes.get(k).expect("list links to a live node");
            assert_eq!(node.prev, prev, "prev link out of sync");
            let b = bucket_index(node.hash, nbuckets);
            if let Some(&(_, last)) = order.last() {
                assert!(last <= b, "list not ordered by bucket: {last} before {b}");
            }
            order.push((k, b));
            prev = Some(k);
            cur = node.next;
        }
        assert_eq!(order.len(), self.nodes.len(), "list does not cover every node");

        for i in 0..=nbuckets {
            let expected = order.iter().find(|&&(_, b)| b >= i).map(|&(k, _)| k);
            assert_eq!(self.buckets[i], expected, "bucket slot {i} is stale");
        }
    }
}

impl<K, V, S, A> BucketMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAllocator + Clone,
{
    /// Map whose bucket table and nodes are both drawn from `alloc`.
    pub fn with_buckets_and_hasher_in(nbuckets: usize, hasher: S, alloc: A) -> Self {
        let nbuckets = nbuckets.max(1).next_power_of_two();
        let nodes = NodeArena::new_in(alloc.clone());
        let mut buckets = Vector::new_in(alloc);
        buckets.resize(nbuckets + 1, None);
        Self {
            hasher,
            nodes,
            buckets,
            initial_buckets: nbuckets,
            reentrancy: ReentrancyGuard::new(),
        }
    }
}

impl<K, V, S, A> BucketMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAllocator,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Scan bucket `hash`'s run for `q`. Callers hold the reentrancy guard.
    fn find_hashed<Q>(&self, hash: u64, q: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let b = bucket_index(hash, self.bucket_count());
        let end = self.buckets[b + 1];
        let mut cur = self.buckets[b];
        while let Some(k) = cur {
            if cur == end {
                break;
            }
            let node = &self.nodes[k];
            if node.hash == hash && node.key.borrow() == q {
                return Some(k);
            }
            cur = node.next;
        }
        None
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.find_hashed(hash, q).map(Handle)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.handle_value(h)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.handle_value_mut(h)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.nodes.get(h.0).map(|n| (&n.key, &n.value))
    }

    /// Insert `key -> value` unless `key` is already present, in which case
    /// the existing entry is returned untouched and `value` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Insert {
        self.insert_with(key, || value)
    }

    /// Like [`insert`](Self::insert) but only builds the value when inserting.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> Insert
    where
        F: FnOnce() -> V,
    {
        let k = {
            let _g = self.reentrancy.enter();
            let hash = self.make_hash(&key);
            if let Some(existing) = self.find_hashed(hash, &key) {
                return Insert::Occupied(Handle(existing));
            }
            let node = Node {
                key,
                value: make(),
                hash,
                next: None,
                prev: None,
            };
            let k = self.nodes.insert(node);
            link(&mut self.nodes, &mut self.buckets, k);
            k
        };

        let nbuckets = self.bucket_count();
        if self.nodes.len() + 1 > MAX_LOAD_FACTOR * nbuckets {
            self.rehash(nbuckets * BUCKET_GROWTH);
        }
        Insert::Inserted(Handle(k))
    }

    /// Value for `key`, inserting the result of `make` first if absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let h = self.insert_with(key, make).handle();
        &mut self.nodes[h.0].value
    }

    /// Value for `key`, inserting `V::default()` first if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Find and erase `q`, returning the owned entry.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.erase(h)
    }
}

impl<K, V, S, A> Clone for BucketMap<K, V, S, A>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: RawAllocator + Clone,
{
    /// Same bucket count and iteration order; nodes are re-linked from their
    /// stored hashes.
    fn clone(&self) -> Self {
        let mut buckets = Vector::new_in(self.buckets.allocator().clone());
        buckets.resize(self.buckets.len(), None);
        let alloc = self.buckets.allocator().clone();
        let mut nodes = NodeArena::with_capacity_in(self.nodes.len(), alloc);
        let mut cur = self.buckets[0];
        while let Some(k) = cur {
            let src = &self.nodes[k];
            let copy = nodes.insert(Node {
                key: src.key.clone(),
                value: src.value.clone(),
                hash: src.hash,
                next: None,
                prev: None,
            });
            link(&mut nodes, &mut buckets, copy);
            cur = src.next;
        }
        Self {
            hasher: self.hasher.clone(),
            nodes,
            buckets,
            initial_buckets: self.initial_buckets,
            reentrancy: ReentrancyGuard::new(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, A: RawAllocator> fmt::Debug for BucketMap<K, V, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, k, v)| (k, v)))
            .finish()
    }
}

impl<K, Q, V, S, A> Index<&Q> for BucketMap<K, V, S, A>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
    A: RawAllocator,
{
    type Output = V;

    /// Panics if `key` is absent.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not present in BucketMap")
    }
}

impl<K, V, S, A> Extend<(K, V)> for BucketMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAllocator,
{
    /// Keys already present keep their current value.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for BucketMap<K, V>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = BucketMap::new();
        m.extend(iter);
        m
    }
}

impl<'a, K, V, S, A: RawAllocator> IntoIterator for &'a BucketMap<K, V, S, A> {
    type Item = (Handle, &'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
