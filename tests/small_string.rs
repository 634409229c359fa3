// SmallString integration suite.
//
// Invariants asserted:
// - Inline: content up to INLINE_CAPACITY bytes never touches the
//   allocator.
// - Promotion: crossing the inline limit allocates once and the string
//   stays on the heap from then on.
// - Termination: as_bytes_with_nul always ends in exactly one extra zero.
// - Balance: every allocation is returned when the string drops.
use std::fmt::Write as _;
use tiny_collections::{CountingAllocator, SmallString, INLINE_CAPACITY};

// Test: short content stays inline, long append promotes exactly once.
#[test]
fn hello_then_fifty_bytes() {
    let alloc = CountingAllocator::new();
    {
        let mut s = SmallString::new_in(&alloc);
        s.assign(b"hello");
        assert_eq!(alloc.n_allocations(), 0);
        assert!(s.is_inline());
        assert_eq!(s.capacity(), INLINE_CAPACITY);

        s.append(&[b'x'; 50]);
        assert_eq!(alloc.n_allocations(), 1);
        assert!(!s.is_inline());
        assert!(s.capacity() >= 55);
        assert_eq!(s.len(), 55);
        assert_eq!(&s[..5], b"hello");
        assert!(s[5..].iter().all(|&b| b == b'x'));
        assert_eq!(s.as_bytes_with_nul().len(), 56);
        assert_eq!(s.as_bytes_with_nul()[55], 0);
    }
    assert_eq!(alloc.live_bytes(), 0);
    assert_eq!(alloc.n_deallocations(), 1);
}

// Test: assign then erase everything.
// Verifies: the result compares equal to the empty string in both modes.
#[test]
fn assign_then_erase_all_is_empty() {
    for content in ["short", "a string that is well past the inline limit"] {
        let mut s = SmallString::new();
        s.assign(content.as_bytes());
        let cap = s.capacity();
        s.erase(0..s.len());
        assert_eq!(s, "");
        assert!(s.is_empty());
        assert_eq!(s.capacity(), cap);
        assert_eq!(s.as_bytes_with_nul(), b"\0");
    }
}

// Test: byte-at-a-time appends.
// Verifies: reallocation count grows logarithmically, not linearly.
#[test]
fn appends_are_amortized() {
    let alloc = CountingAllocator::new();
    let mut s = SmallString::new_in(&alloc);
    for i in 0..1000u32 {
        s.push(b'a' + (i % 26) as u8);
    }
    assert_eq!(s.len(), 1000);
    assert!(alloc.n_allocations() < 20, "{} allocations", alloc.n_allocations());
    assert_eq!(alloc.n_allocations() - alloc.n_deallocations(), 1);
}

// Test: text-facing glue.
// Verifies: fmt::Write, to_str, Display-free Debug, operators.
#[test]
fn text_glue() {
    let mut s = SmallString::new();
    write!(s, "{}-{}", "id", 42).expect("write to string");
    assert_eq!(s.to_str(), Ok("id-42"));
    assert_eq!(format!("{s:?}"), "\"id-42\"");

    let t = s.clone() + "/suffix";
    assert_eq!(t, "id-42/suffix");
    let u = "prefix/" + t;
    assert_eq!(u, "prefix/id-42/suffix");
    assert!(u > SmallString::from("prefix/"));
    assert!("a" < SmallString::from("b"));

    let collected: SmallString = b"bytes".iter().copied().collect();
    assert_eq!(collected, &b"bytes"[..]);
}

// Test: reserve and resize edges.
// Verifies: reserve below capacity is a no-op; resize fills and truncates.
#[test]
fn reserve_and_resize() {
    let mut s = SmallString::from("abc");
    s.reserve(4);
    assert!(s.is_inline());
    s.reserve(100);
    assert_eq!(s.capacity(), 100);
    s.resize(6, b'!');
    assert_eq!(s, "abc!!!");
    s.resize(2, b'?');
    assert_eq!(s, "ab");
    assert_eq!(s.capacity(), 100);
    assert!(s.try_reserve(usize::MAX).is_err());
}
