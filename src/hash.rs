//! Default hash function: sdbm over the bytes fed to the hasher.
//!
//! Any `BuildHasher` works with `BucketMap`; this one is cheap, has no
//! random state, and is deterministic across runs, which makes bucket
//! placement reproducible.
//!
//! The hasher sees whatever `Hash` feeds it. Byte slices and
//! `SmallString` go through the standard slice impl, which writes the
//! length as a native-endian `usize` before the bytes, so
//! `hash_one(key)` is sdbm over `len ++ bytes`, not over the bytes alone.
//! `SmallString` keeps that prefix so it hashes like the `[u8]` it
//! borrows as. (`str` instead appends a `0xff` byte.) Call [`sdbm`]
//! directly for the unprefixed value.

use core::hash::{BuildHasher, Hasher};

#[derive(Debug, Clone, Copy, Default)]
pub struct SdbmHasher {
    state: u64,
}

impl SdbmHasher {
    pub const fn new() -> Self {
        Self { state: 0 }
    }
}

impl Hasher for SdbmHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut h = self.state;
        for &b in bytes {
            h = (b as u64)
                .wrapping_add(h << 6)
                .wrapping_add(h << 16)
                .wrapping_sub(h);
        }
        self.state = h;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSdbmHasher;

impl BuildHasher for BuildSdbmHasher {
    type Hasher = SdbmHasher;

    #[inline]
    fn build_hasher(&self) -> SdbmHasher {
        SdbmHasher::new()
    }
}

/// sdbm of a byte span with no length prefix.
pub fn sdbm(bytes: &[u8]) -> u64 {
    let mut h = SdbmHasher::new();
    h.write(bytes);
    h.finish()
}
