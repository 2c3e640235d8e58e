//! Small helpers over `BitVec` shared by the liveness tables.

use std::fmt;

use bit_vec::BitVec;

/// Indices of the set bits in `bits`, ascending.
pub(crate) fn set_bits(bits: &BitVec) -> impl Iterator<Item = usize> + '_ {
    bits.iter()
        .enumerate()
        .filter_map(|(index, set)| set.then_some(index))
}

/// `true` if bit `index` is set. Out-of-range bits read as unset.
#[inline]
pub(crate) fn test(bits: &BitVec, index: usize) -> bool {
    bits.get(index).unwrap_or(false)
}

/// A zeroed vector of `len` bits.
#[inline]
pub(crate) fn zeroed(len: usize) -> BitVec {
    BitVec::from_elem(len, false)
}

/// Renders a bit vector as the set of its set indices, e.g. `{0, 2}`.
pub struct BitsDisplay<'a>(pub &'a BitVec);

impl fmt::Display for BitsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, bit) in set_bits(self.0).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{bit}")?;
        }
        f.write_str("}")
    }
}
