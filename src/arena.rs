//! Generational slot arena backing `BucketMap` nodes.
//!
//! Slots live in a [`Vector`] drawn from the map's allocator and are
//! recycled through a free list. Every slot carries a version that is odd
//! while occupied and even while vacant; a key stores the version its slot
//! had when the value went in, so a key to a removed value never resolves
//! to a later occupant of the same slot.
//!
//! [`NodeArena::release`] drops every value and returns the storage. The
//! arena keeps a version floor across releases, so keys minted before a
//! release stay dead afterwards even though the slots start over.

use crate::alloc::RawAllocator;
use crate::vector::Vector;
use core::marker::PhantomData;
use core::num::NonZeroU32;
use core::ops::{Index, IndexMut};

/// Slot index plus the (odd) version it was occupied under.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeKey {
    idx: u32,
    version: NonZeroU32,
}

enum SlotState<T> {
    Occupied(T),
    Vacant { next_free: Option<u32> },
}

struct Slot<T> {
    version: u32,
    state: SlotState<T>,
}

pub(crate) struct NodeArena<T, A: RawAllocator> {
    slots: Vector<Slot<T>, A>,
    free_head: Option<u32>,
    len: usize,
    // Even; fresh slots start here.
    version_floor: u32,
}

impl<T, A: RawAllocator> NodeArena<T, A> {
    pub(crate) fn new_in(alloc: A) -> Self {
        Self {
            slots: Vector::new_in(alloc),
            free_head: None,
            len: 0,
            version_floor: 0,
        }
    }

    pub(crate) fn with_capacity_in(cap: usize, alloc: A) -> Self {
        let mut arena = Self::new_in(alloc);
        arena.slots.reserve(cap);
        arena
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots currently allocated, occupied or not.
    pub(crate) fn slot_capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub(crate) fn insert(&mut self, value: T) -> NodeKey {
        let idx = match self.free_head {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                self.free_head = match slot.state {
                    SlotState::Vacant { next_free } => next_free,
                    SlotState::Occupied(_) => unreachable!("free list points at an occupied slot"),
                };
                slot.version = slot.version.wrapping_add(1);
                slot.state = SlotState::Occupied(value);
                idx
            }
            None => {
                let idx = match u32::try_from(self.slots.len()) {
                    Ok(idx) if idx < u32::MAX => idx,
                    _ => panic!("capacity overflow"),
                };
                self.slots.push(Slot {
                    version: self.version_floor | 1,
                    state: SlotState::Occupied(value),
                });
                idx
            }
        };
        self.len += 1;
        let version = self.slots[idx as usize].version;
        NodeKey {
            idx,
            version: odd_version(version),
        }
    }

    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<T> {
        let slot = self.slots.get_mut(key.idx as usize)?;
        if slot.version != key.version.get() || !matches!(slot.state, SlotState::Occupied(_)) {
            return None;
        }
        let vacant = SlotState::Vacant {
            next_free: self.free_head,
        };
        let value = match core::mem::replace(&mut slot.state, vacant) {
            SlotState::Occupied(v) => v,
            SlotState::Vacant { .. } => return None,
        };
        slot.version = slot.version.wrapping_add(1);
        self.free_head = Some(key.idx);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub(crate) fn get(&self, key: NodeKey) -> Option<&T> {
        match self.slots.get(key.idx as usize) {
            Some(Slot {
                version,
                state: SlotState::Occupied(v),
            }) if *version == key.version.get() => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut T> {
        match self.slots.get_mut(key.idx as usize) {
            Some(Slot {
                version,
                state: SlotState::Occupied(v),
            }) if *version == key.version.get() => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Drop every value and hand the slot storage back to the allocator.
    pub(crate) fn release(&mut self) {
        let highest = self.slots.iter().map(|s| s.version).max();
        if let Some(v) = highest {
            // Next even value above every version handed out so far.
            self.version_floor = self.version_floor.max((v | 1).wrapping_add(1));
        }
        self.free_head = None;
        self.len = 0;
        self.slots.clear();
        self.slots.shrink_to_fit();
    }

    /// Mutable walk along a chain of keys.
    ///
    /// # Safety
    /// Following `next` from `start` must visit each live key at most once.
    /// Stale keys end the walk.
    pub(crate) unsafe fn chain_mut(
        &mut self,
        start: Option<NodeKey>,
        next: fn(&T) -> Option<NodeKey>,
    ) -> ChainMut<'_, T> {
        ChainMut {
            base: self.slots.as_mut_slice().as_mut_ptr(),
            nslots: self.slots.len(),
            cur: start,
            next,
            _borrow: PhantomData,
        }
    }
}

#[inline]
fn odd_version(v: u32) -> NonZeroU32 {
    debug_assert!(v & 1 == 1);
    NonZeroU32::new(v | 1).unwrap_or(NonZeroU32::MIN)
}

impl<T, A: RawAllocator> Index<NodeKey> for NodeArena<T, A> {
    type Output = T;

    /// Panics on a stale key; callers index with keys taken from live links.
    fn index(&self, key: NodeKey) -> &T {
        match self.get(key) {
            Some(v) => v,
            None => panic!("stale node key {key:?}"),
        }
    }
}

impl<T, A: RawAllocator> IndexMut<NodeKey> for NodeArena<T, A> {
    fn index_mut(&mut self, key: NodeKey) -> &mut T {
        match self.get_mut(key) {
            Some(v) => v,
            None => panic!("stale node key {key:?}"),
        }
    }
}

pub(crate) struct ChainMut<'a, T> {
    base: *mut Slot<T>,
    nslots: usize,
    cur: Option<NodeKey>,
    next: fn(&T) -> Option<NodeKey>,
    _borrow: PhantomData<&'a mut T>,
}

impl<'a, T> Iterator for ChainMut<'a, T> {
    type Item = (NodeKey, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cur.take()?;
        let idx = key.idx as usize;
        if idx >= self.nslots {
            return None;
        }
        // SAFETY: `idx` is in bounds of the slots borrowed for 'a, and the
        // `chain_mut` contract guarantees no slot is yielded twice.
        let slot: &'a mut Slot<T> = unsafe { &mut *self.base.add(idx) };
        if slot.version != key.version.get() {
            return None;
        }
        match &mut slot.state {
            SlotState::Occupied(value) => {
                self.cur = (self.next)(value);
                Some((key, value))
            }
            SlotState::Vacant { .. } => None,
        }
    }
}
