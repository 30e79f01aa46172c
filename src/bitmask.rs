use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not, Shl, Shr};

/// Set of board cells packed into a u64. Bit `i` is row `i / 8`, column `i % 8`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct BitMask(pub u64);

impl BitMask {
    pub const EMPTY: BitMask = BitMask(0);
    pub const FULL: BitMask = BitMask(u64::MAX);

    pub fn from_index(index: u8) -> Self {
        return BitMask(1u64 << index);
    }

    pub fn bits(self) -> u64 {
        return self.0;
    }

    pub fn is_empty(self) -> bool {
        return self.0 == 0;
    }

    pub fn contains(self, index: u8) -> bool {
        return index < 64 && (self.0 >> index) & 1 == 1;
    }

    pub fn count_set_bits(self) -> u32 {
        return self.0.count_ones();
    }

    /// Removes the lowest set bit and returns its index.
    /// Must not be called on an empty mask.
    pub fn take_lowest_set_index(&mut self) -> u8 {
        debug_assert!(!self.is_empty());
        let index = self.0.trailing_zeros() as u8;
        self.0 &= self.0.wrapping_sub(1);
        return index;
    }

    /// Removes the highest set bit and returns its index.
    /// Must not be called on an empty mask.
    pub fn take_highest_set_index(&mut self) -> u8 {
        debug_assert!(!self.is_empty());
        let index = 63 - self.0.leading_zeros() as u8;
        self.0 &= !(1u64 << index);
        return index;
    }

    /// Ascending iterator over the set indices.
    pub fn iter(self) -> Indices {
        return Indices(self);
    }
}

pub struct Indices(BitMask);

impl Iterator for Indices {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.0.is_empty() {
            return None;
        }
        return Some(self.0.take_lowest_set_index());
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_set_bits() as usize;
        (n, Some(n))
    }
}

impl From<u64> for BitMask {
    fn from(bits: u64) -> Self {
        BitMask(bits)
    }
}

impl From<BitMask> for u64 {
    fn from(mask: BitMask) -> u64 {
        mask.0
    }
}

impl BitOr for BitMask {
    type Output = BitMask;
    fn bitor(self, rhs: BitMask) -> BitMask {
        BitMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for BitMask {
    fn bitor_assign(&mut self, rhs: BitMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for BitMask {
    type Output = BitMask;
    fn bitand(self, rhs: BitMask) -> BitMask {
        BitMask(self.0 & rhs.0)
    }
}

impl BitAndAssign for BitMask {
    fn bitand_assign(&mut self, rhs: BitMask) {
        self.0 &= rhs.0;
    }
}

impl BitXor for BitMask {
    type Output = BitMask;
    fn bitxor(self, rhs: BitMask) -> BitMask {
        BitMask(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for BitMask {
    fn bitxor_assign(&mut self, rhs: BitMask) {
        self.0 ^= rhs.0;
    }
}

impl Not for BitMask {
    type Output = BitMask;
    fn not(self) -> BitMask {
        BitMask(!self.0)
    }
}

// Plain shifts; edge wraparound is the caller's business.
impl Shl<u32> for BitMask {
    type Output = BitMask;
    fn shl(self, rhs: u32) -> BitMask {
        BitMask(self.0 << rhs)
    }
}

impl Shr<u32> for BitMask {
    type Output = BitMask;
    fn shr(self, rhs: u32) -> BitMask {
        BitMask(self.0 >> rhs)
    }
}

impl fmt::Display for BitMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in (0..8).rev() {
            for col in 0..8 {
                write!(f, "{}", (self.0 >> (row * 8 + col)) & 1)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
