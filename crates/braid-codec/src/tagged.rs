// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tagged enumeration encoding.
//!
//! An enumeration crosses the wire as the zero-based position of its value
//! in a closed, ordered variant list. Reader and writer must agree on that
//! ordering; reordering variants between versions is a format break, and
//! the decode side enforces its own bounds — an out-of-range ordinal is a
//! format error, never a clamp or a default.

/// A closed, ordered enumeration transmissible by ordinal.
///
/// `VARIANTS` fixes the wire ordering. Append-only evolution is safe for
/// writers; anything else breaks old streams.
pub trait TaggedEnum: Copy + PartialEq + Sized + 'static {
    /// All variants in wire order.
    const VARIANTS: &'static [Self];

    /// Zero-based wire ordinal of this value, if it is listed.
    #[must_use]
    fn ordinal(self) -> Option<u32> {
        Self::VARIANTS
            .iter()
            .position(|variant| *variant == self)
            .and_then(|index| u32::try_from(index).ok())
    }

    /// Variant at a wire ordinal, if in range.
    #[must_use]
    fn from_ordinal(ordinal: u32) -> Option<Self> {
        let index = usize::try_from(ordinal).ok()?;
        Self::VARIANTS.get(index).copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tone {
        Low,
        Mid,
        High,
    }

    impl TaggedEnum for Tone {
        const VARIANTS: &'static [Self] = &[Self::Low, Self::Mid, Self::High];
    }

    // ── 1. ordinals follow declaration order ────────────────────────────

    #[test]
    fn ordinals_follow_variant_order() {
        assert_eq!(Tone::Low.ordinal(), Some(0));
        assert_eq!(Tone::Mid.ordinal(), Some(1));
        assert_eq!(Tone::High.ordinal(), Some(2));
    }

    // ── 2. from_ordinal bounds-checks ───────────────────────────────────

    #[test]
    fn from_ordinal_bounds_checks() {
        assert_eq!(Tone::from_ordinal(1), Some(Tone::Mid));
        assert_eq!(Tone::from_ordinal(3), None);
        assert_eq!(Tone::from_ordinal(u32::MAX), None);
    }
}
