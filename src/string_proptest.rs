#![cfg(test)]

// Property tests for SmallString against a plain Vec<u8> model.

use crate::alloc::CountingAllocator;
use crate::string::{SmallString, INLINE_CAPACITY};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Append(Vec<u8>),
    Push(u8),
    // Positions are taken modulo the current length so they stay valid.
    Insert(usize, Vec<u8>),
    InsertFromWithin(usize, usize, usize),
    Erase(usize, usize),
    Assign(Vec<u8>),
    Resize(usize, u8),
    Truncate(usize),
    Reserve(usize),
    Clear,
}

fn bytes() -> impl Strategy<Value = Vec<u8>> {
    // Nonzero bytes so the terminator check is unambiguous.
    proptest::collection::vec(1u8..=255, 0..24)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => bytes().prop_map(Op::Append),
        2 => (1u8..=255).prop_map(Op::Push),
        3 => (any::<usize>(), bytes()).prop_map(|(at, b)| Op::Insert(at, b)),
        2 => (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(at, a, b)| Op::InsertFromWithin(at, a, b)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Erase(a, b)),
        1 => bytes().prop_map(Op::Assign),
        1 => (0usize..48, 1u8..=255).prop_map(|(n, f)| Op::Resize(n, f)),
        1 => (0usize..48).prop_map(Op::Truncate),
        1 => (0usize..64).prop_map(Op::Reserve),
        1 => Just(Op::Clear),
    ]
}

fn span(len: usize, a: usize, b: usize) -> core::ops::Range<usize> {
    let (a, b) = (a % (len + 1), b % (len + 1));
    a.min(b)..a.max(b)
}

// Invariants checked after every step:
// - content equals the model and is followed by a zero byte;
// - capacity >= len; inline strings report exactly INLINE_CAPACITY;
// - once promoted to the heap, a string never returns to inline storage;
// - capacity never decreases.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_vec_model(ops in proptest::collection::vec(arb_op(), 1..64)) {
        let alloc = CountingAllocator::new();
        let mut s = SmallString::new_in(&alloc);
        let mut model: Vec<u8> = Vec::new();
        let mut was_heap = false;
        let mut last_cap = s.capacity();

        for op in ops {
            match op {
                Op::Append(b) => {
                    s.append(&b);
                    model.extend_from_slice(&b);
                }
                Op::Push(b) => {
                    s.push(b);
                    model.push(b);
                }
                Op::Insert(at, b) => {
                    let at = at % (model.len() + 1);
                    s.insert(at, &b);
                    model.splice(at..at, b);
                }
                Op::InsertFromWithin(at, a, b) => {
                    let at = at % (model.len() + 1);
                    let src = span(model.len(), a, b);
                    let copy = model[src.clone()].to_vec();
                    s.insert_from_within(at, src);
                    model.splice(at..at, copy);
                }
                Op::Erase(a, b) => {
                    let r = span(model.len(), a, b);
                    s.erase(r.clone());
                    model.drain(r);
                }
                Op::Assign(b) => {
                    s.assign(&b);
                    model = b;
                }
                Op::Resize(n, f) => {
                    s.resize(n, f);
                    model.resize(n, f);
                }
                Op::Truncate(n) => {
                    s.truncate(n);
                    model.truncate(n);
                }
                Op::Reserve(n) => {
                    s.reserve(n);
                    prop_assert!(s.capacity() >= n);
                }
                Op::Clear => {
                    s.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(s.as_bytes(), &model[..]);
            prop_assert_eq!(s.as_bytes_with_nul().last(), Some(&0u8));
            prop_assert_eq!(s.len(), model.len());
            prop_assert!(s.capacity() >= s.len());
            if s.is_inline() {
                prop_assert!(!was_heap, "heap string returned to inline storage");
                prop_assert_eq!(s.capacity(), INLINE_CAPACITY);
            } else {
                was_heap = true;
            }
            prop_assert!(s.capacity() >= last_cap, "capacity shrank");
            last_cap = s.capacity();
        }

        drop(s);
        prop_assert_eq!(alloc.live_bytes(), 0);
        prop_assert_eq!(alloc.n_allocations(), alloc.n_deallocations());
    }
}

// Property: cloning yields an equal, independent string in the same mode.
proptest! {
    #[test]
    fn prop_clone_is_independent(content in bytes(), extra in bytes()) {
        let s = SmallString::from_bytes_in(&content, crate::Global);
        let mut c = s.clone();
        prop_assert_eq!(&c, &s);
        prop_assert_eq!(c.is_inline(), s.is_inline());
        c.append(&extra);
        prop_assert_eq!(s.as_bytes(), &content[..]);
    }
}
