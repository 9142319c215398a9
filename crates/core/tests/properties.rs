//! Property- and table-driven coverage that doesn't fit naturally inside a
//! single module's unit tests: round-trip laws that must hold for every
//! `Word`/`Byte` value (spec §8 "Round-trip / idempotence laws"), and
//! tabular sweeps over small, enumerable configuration spaces (the bimodal
//! counter's full transition table, and the cache's shape-validation
//! boundaries).

use proptest::prelude::*;
use rstest::rstest;

use specsim_core::bpu::bimodal_update;
use specsim_core::common::{Byte, Word};
use specsim_core::memory::cache::Cache;
use specsim_core::memory::policies::ReplacementPolicyWrapper;

proptest! {
    /// A word survives a little-endian byte round trip unchanged, for every
    /// possible 16-bit value (spec §4.4 word read/write are built from two
    /// byte accesses; this is the identity that makes that decomposition
    /// sound).
    #[test]
    fn word_le_byte_round_trip(raw: u16) {
        let word = Word::new(raw);
        prop_assert_eq!(Word::from_le_bytes(word.to_le_bytes()), word);
    }

    /// Truncating a word to its low byte and zero-extending back never
    /// produces a value outside `0..=0xFF`, and is idempotent: truncating
    /// twice is the same as truncating once.
    #[test]
    fn byte_truncate_is_idempotent(raw: u16) {
        let word = Word::new(raw);
        let once = Byte::truncate(word);
        let twice = Byte::truncate(once.zero_extend());
        prop_assert_eq!(once, twice);
    }

    /// Wrapping addition never panics and is commutative, for any two words
    /// (the engine relies on this to never observe an overflow panic from
    /// address or ALU arithmetic).
    #[test]
    fn wrapping_add_is_commutative(a: u16, b: u16) {
        let (a, b) = (Word::new(a), Word::new(b));
        prop_assert_eq!(a.wrapping_add(b), b.wrapping_add(a));
    }

    /// `signed` is a bijection on the bit pattern: converting to the signed
    /// view and back via the same bits never changes the underlying value.
    #[test]
    fn signed_view_preserves_bits(raw: u16) {
        let word = Word::new(raw);
        prop_assert_eq!(Word::new(word.signed() as u16), word);
    }
}

/// The bimodal counter's full transition table (spec §4.3), exhaustively:
/// every `(state, taken)` pair maps to exactly the value the spec's Design
/// Notes pin down.
#[rstest]
#[case(0, true, 1)]
#[case(1, true, 3)]
#[case(2, true, 3)]
#[case(3, true, 3)]
#[case(0, false, 0)]
#[case(1, false, 0)]
#[case(2, false, 0)]
#[case(3, false, 2)]
fn bimodal_transition_table(#[case] state: u8, #[case] taken: bool, #[case] expected: u8) {
    assert_eq!(bimodal_update(state, taken), expected);
}

/// Cache shapes that must fail construction: zero or non-power-of-two
/// `sets`/`line_size`, zero `ways`, or an address decomposition that leaves
/// no room for a tag.
#[rstest]
#[case(0, 1, 2, "zero sets")]
#[case(3, 1, 2, "sets not a power of two")]
#[case(4, 0, 2, "zero ways")]
#[case(4, 1, 3, "line_size not a power of two")]
#[case(1, 1, 65_536, "line_size alone consumes every bit, no room for tag or index")]
fn invalid_cache_shapes_are_rejected(#[case] sets: usize, #[case] ways: usize, #[case] line_size: usize, #[case] why: &str) {
    let policy = ReplacementPolicyWrapper::rr(sets.max(1), ways.max(1));
    assert!(Cache::new(sets, ways, line_size, policy).is_err(), "expected rejection: {why}");
}

/// Cache shapes that must succeed, spanning the smallest legal configuration
/// up to one with the maximum index width this 16-bit address space allows.
#[rstest]
#[case(1, 1, 1)]
#[case(4, 2, 4)]
#[case(256, 4, 16)]
fn valid_cache_shapes_construct(#[case] sets: usize, #[case] ways: usize, #[case] line_size: usize) {
    let policy = ReplacementPolicyWrapper::lru(sets, ways);
    assert!(Cache::new(sets, ways, line_size, policy).is_ok());
}
