#![cfg(test)]

// Property tests for BucketMap kept inside the crate so they can use the
// internal invariant check without extra feature gates.

use crate::bucket_map::{BucketMap, Handle, Insert};
use core::hash::{BuildHasher, Hasher};
use hashbrown::HashMap;
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

// Pool-indexed operations so shrinking moves towards earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    InsertWith(usize, i32),
    GetOrDefault(usize, i32),
    Erase(usize),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<String>, Vec<Op>)> {
    let pool = proptest::collection::vec("[a-z]{0,4}", 1..=48);
    (0usize..5, pool).prop_flat_map(|(shift, pool)| {
        let idx = 0..pool.len();
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::InsertWith(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::GetOrDefault(i, d)),
            2 => idx.clone().prop_map(Op::Erase),
            1 => idx.clone().prop_map(Op::Remove),
            1 => idx.clone().prop_map(Op::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(Op::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => Just(Op::Iterate),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..200)
            .prop_map(move |ops| (1usize << shift, pool.clone(), ops))
    })
}

// Drives `sut` and a hashbrown model through the same operations.
// Invariants checked after every step:
// - bucket slot i holds the first list node with bucket >= i; the list is
//   doubly linked, bucket-ordered and covers every node;
// - find/contains/get agree with the model; duplicates report Occupied;
// - iteration yields each live key once; erased handles never resolve;
// - len parity with the model.
fn run<S>(sut: &mut BucketMap<String, i32, S>, pool: &[String], ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();
    let calls = Rc::new(Cell::new(0));

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = pool[i].clone();
                match sut.insert(k.clone(), v) {
                    Insert::Inserted(h) => {
                        prop_assert!(!model.contains_key(&k));
                        model.insert(k.clone(), v);
                        live.insert(k, h);
                    }
                    Insert::Occupied(h) => {
                        prop_assert_eq!(live.get(&k), Some(&h));
                        prop_assert_eq!(sut.get(&k), model.get(&k));
                    }
                }
            }
            Op::InsertWith(i, v) => {
                let k = pool[i].clone();
                let before = calls.get();
                let counter = calls.clone();
                let res = sut.insert_with(k.clone(), move || {
                    counter.set(counter.get() + 1);
                    v
                });
                if res.is_inserted() {
                    prop_assert_eq!(calls.get(), before + 1);
                    model.insert(k.clone(), v);
                    live.insert(k, res.handle());
                } else {
                    prop_assert_eq!(calls.get(), before, "constructor ran on duplicate");
                    prop_assert!(model.contains_key(&k));
                }
            }
            Op::GetOrDefault(i, d) => {
                let k = pool[i].clone();
                let v = sut.get_or_insert_default(k.clone());
                *v = v.wrapping_add(d);
                let mv = model.entry(k.clone()).or_default();
                *mv = mv.wrapping_add(d);
                if !live.contains_key(&k) {
                    live.insert(k.clone(), sut.find(&k).expect("just inserted"));
                }
            }
            Op::Erase(i) => {
                let k = &pool[i];
                if let Some(h) = live.remove(k) {
                    let (kk, vv) = sut.erase(h).expect("live handle erases");
                    prop_assert_eq!(&kk, k);
                    prop_assert_eq!(Some(vv), model.remove(k));
                    stale.push(h);
                } else {
                    prop_assert!(sut.find(k).is_none());
                }
            }
            Op::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove(k.as_str()).map(|(_, v)| v);
                prop_assert_eq!(removed, model.remove(k));
                if let Some(h) = live.remove(k) {
                    stale.push(h);
                }
            }
            Op::Find(i) => {
                let k = &pool[i];
                let found = sut.find(k);
                prop_assert_eq!(found, live.get(k).copied());
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            Op::Contains(s) => {
                prop_assert_eq!(sut.contains_key(s.as_str()), model.contains_key(&s));
            }
            Op::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    let v = h.value_mut(sut).expect("live handle resolves");
                    *v = v.wrapping_add(d);
                    let mv = model.get_mut(k).expect("model has live key");
                    *mv = mv.wrapping_add(d);
                }
            }
            Op::Iterate => {
                let keys: Vec<String> = sut.keys().cloned().collect();
                let unique: BTreeSet<String> = keys.iter().cloned().collect();
                prop_assert_eq!(keys.len(), unique.len(), "iteration repeated a key");
                let expected: BTreeSet<String> = model.keys().cloned().collect();
                prop_assert_eq!(unique, expected);
                let ordered: Vec<Handle> = sut.iter().map(|(h, _, _)| h).collect();
                let mutable: Vec<Handle> = sut.iter_mut().map(|(h, _, _)| h).collect();
                prop_assert_eq!(ordered, mutable, "iter_mut left bucket order");
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain().map(|(_, h)| h));
            }
        }

        sut.assert_invariants();
        for &h in &stale {
            prop_assert!(h.value(sut).is_none(), "stale handle resolved");
        }
        prop_assert_eq!(sut.len(), model.len());
    }

    // Final content matches the model entry for entry.
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k.as_str()), Some(v));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((nbuckets, pool, ops) in arb_scenario()) {
        let mut sut = BucketMap::with_buckets(nbuckets);
        run(&mut sut, &pool, ops)?;
    }
}

// Every key in bucket 0: one long run, exercising in-bucket erase and the
// head-of-bucket propagation on every operation.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((nbuckets, pool, ops) in arb_scenario()) {
        let mut sut = BucketMap::with_buckets_and_hasher_in(nbuckets, ConstBuildHasher, crate::Global);
        run(&mut sut, &pool, ops)?;
    }
}

// Property: a rehash triggered by one insert keeps every (key, value) pair.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_rehash_preserves_pairs(keys in proptest::collection::btree_set(any::<u32>(), 1..120)) {
        let mut m: BucketMap<u32, u64> = BucketMap::with_buckets(1);
        let mut before: Vec<(u32, u64)> = Vec::new();
        for k in keys {
            let nbuckets = m.bucket_count();
            before = m.iter().map(|(_, k, v)| (*k, *v)).collect();
            before.push((k, u64::from(k) * 3));
            m.insert(k, u64::from(k) * 3);
            if m.bucket_count() != nbuckets {
                let mut after: Vec<(u32, u64)> = m.iter().map(|(_, k, v)| (*k, *v)).collect();
                before.sort_unstable();
                after.sort_unstable();
                prop_assert_eq!(&before, &after);
            }
            m.assert_invariants();
        }
        prop_assert!(!before.is_empty());
    }
}
