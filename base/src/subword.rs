//! Convenience utilities for splitting 36-bit words into halves and
//! bit fields, and for joining them together again.
//!
//! Bits are numbered the way the machine's documentation numbers
//! them: bit 0 is the most significant bit of the word and bit 35 the
//! least significant.  Within a halfword, bit 18 of the word is bit 0
//! of the right half.
use std::ops::Shl;

use crate::word::{Unsigned18Bit, Unsigned36Bit};

/// Split a 36-bit word into two 18-bit values.
pub fn split_halves(w: Unsigned36Bit) -> (Unsigned18Bit, Unsigned18Bit) {
    (left_half(w), right_half(w))
}

/// Join two 18-bit values into a 36-bit word.
pub fn join_halves(left: Unsigned18Bit, right: Unsigned18Bit) -> Unsigned36Bit {
    Unsigned36Bit::from(left).shl(18) | Unsigned36Bit::from(right)
}

/// Extract the right (less-significant) halfword from a full word.
pub fn right_half(word: Unsigned36Bit) -> Unsigned18Bit {
    word.low_halfword()
}

/// Extract the left (more-significant) halfword from a full word.
pub fn left_half(word: Unsigned36Bit) -> Unsigned18Bit {
    word.high_halfword()
}

/// The mask for word bit `n`.
pub const fn bit(n: u32) -> u64 {
    1 << (35 - n)
}

/// The mask for bit `n` of a halfword (numbered 0 to 17).
pub const fn halfword_bit(n: u32) -> u32 {
    1 << (17 - n)
}

const fn field_mask(first: u32, last: u32) -> u64 {
    (1 << (last - first + 1)) - 1
}

/// Extract bits `first..=last` of `word` as a right-justified value.
pub fn field(word: Unsigned36Bit, first: u32, last: u32) -> u64 {
    debug_assert!(first <= last && last <= 35);
    (word.bits() >> (35 - last)) & field_mask(first, last)
}

/// Return `word` with bits `first..=last` replaced by `value`.  Bits
/// of `value` which do not fit in the field are discarded.
pub fn with_field(word: Unsigned36Bit, first: u32, last: u32, value: u64) -> Unsigned36Bit {
    debug_assert!(first <= last && last <= 35);
    let shift = 35 - last;
    let mask = field_mask(first, last) << shift;
    let bits = (word.bits() & !mask) | ((value << shift) & mask);
    // Every bit we set lies inside the mask, which lies inside bit 35.
    Unsigned36Bit::ZERO.bitor(bits)
}
