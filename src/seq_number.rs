use std::fmt::{Display, Formatter};
use crate::safe_converter::SafeCast;

/// A segment sequence number. Sequence numbers wrap around at 2^32, so they are compared by
///  interpreting their difference as a signed 32-bit number: `a` is 'before' `b` iff
///  `b - a` (with wrap-around) is in `1..2^31`.
///
/// NB: This is why there is no `Ord` implementation - the relation is not transitive across
///      the whole number range, only inside a window that is smaller than 2^31.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SeqNumber(u32);

impl Display for SeqNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SeqNumber {
    pub const ZERO: SeqNumber = SeqNumber(0);

    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> SeqNumber {
        self.plus(1)
    }

    pub fn plus(&self, offset: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(offset))
    }

    pub fn minus(&self, offset: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_sub(offset))
    }

    /// the distance from `other` to `self` with wrap-around semantics, i.e. the number of
    ///  increments it takes to get from `other` to `self`
    pub fn distance_from(&self, other: SeqNumber) -> u32 {
        self.0.wrapping_sub(other.0)
    }

    /// signed wrap-around difference `self - other`
    pub fn signed_diff(&self, other: SeqNumber) -> i32 {
        self.distance_from(other) as i32
    }

    pub fn is_before(&self, other: SeqNumber) -> bool {
        self.signed_diff(other) < 0
    }

    /// the number of increments from `base` to `self`, or `None` if `self` is before `base`
    pub fn offset_from(&self, base: SeqNumber) -> Option<u32> {
        if self.is_before(base) {
            None
        }
        else {
            Some(self.distance_from(base))
        }
    }

    /// the slot index of this sequence number in a ring buffer of the given capacity
    pub fn slot(&self, capacity: u32) -> usize {
        (self.0 % capacity).safe_cast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple(1, 2, true)]
    #[case::equal(5, 5, false)]
    #[case::reverse(2, 1, false)]
    #[case::wrap(u32::MAX, 0, true)]
    #[case::wrap_reverse(0, u32::MAX, false)]
    #[case::wrap_far(0xFFFF_FFF0, 0x10, true)]
    #[case::half_range(0, 0x7FFF_FFFF, true)]
    #[case::beyond_half_range(0, 0x8000_0001, false)]
    fn test_is_before(#[case] a: u32, #[case] b: u32, #[case] expected: bool) {
        assert_eq!(SeqNumber::from_raw(a).is_before(SeqNumber::from_raw(b)), expected);
    }

    #[rstest]
    #[case::simple(7, 5, 2)]
    #[case::zero(5, 5, 0)]
    #[case::wrap(3, u32::MAX, 4)]
    #[case::negative(5, 7, u32::MAX - 1)]
    fn test_distance_from(#[case] a: u32, #[case] b: u32, #[case] expected: u32) {
        assert_eq!(SeqNumber::from_raw(a).distance_from(SeqNumber::from_raw(b)), expected);
    }

    #[rstest]
    #[case::same(5, 5, Some(0))]
    #[case::ahead(7, 5, Some(2))]
    #[case::behind(5, 7, None)]
    #[case::ahead_across_wrap(2, u32::MAX, Some(3))]
    #[case::behind_across_wrap(u32::MAX, 2, None)]
    fn test_offset_from(#[case] seq: u32, #[case] base: u32, #[case] expected: Option<u32>) {
        assert_eq!(SeqNumber::from_raw(seq).offset_from(SeqNumber::from_raw(base)), expected);
    }

    #[rstest]
    #[case::simple(5, 1, 6)]
    #[case::wrap(u32::MAX, 2, 1)]
    fn test_plus(#[case] a: u32, #[case] offset: u32, #[case] expected: u32) {
        assert_eq!(SeqNumber::from_raw(a).plus(offset), SeqNumber::from_raw(expected));
        assert_eq!(SeqNumber::from_raw(expected).minus(offset), SeqNumber::from_raw(a));
    }

    #[rstest]
    #[case::small(3, 256, 3)]
    #[case::wrapped(259, 256, 3)]
    #[case::max(u32::MAX, 256, 255)]
    fn test_slot(#[case] seq: u32, #[case] capacity: u32, #[case] expected: usize) {
        assert_eq!(SeqNumber::from_raw(seq).slot(capacity), expected);
    }
}
