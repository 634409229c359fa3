//! Debug-only reentrancy guard for `BucketMap`.
//!
//! While a map method runs it may call back into user code through
//! `K: Eq` or `K: Hash`. If that code reaches the same map again, the
//! bucket table and node links can be observed mid-update. In debug builds
//! the second entry panics; in release builds the guard is a zero-sized
//! no-op.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct ReentrancyGuard {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // !Send + !Sync in every build profile.
    _single_thread: PhantomData<*mut ()>,
}

impl ReentrancyGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Mark the owner busy until the returned scope is dropped.
    #[inline]
    pub(crate) fn enter(&self) -> Scope<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrancy detected: BucketMap entered from its own Eq/Hash callback"
            );
            Scope { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            Scope { _owner: PhantomData }
        }
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Scope<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ReentrancyGuard,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ()>,
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}
