//! Attribute usage sets

use super::attribute::{Attribute, NUM_GENERICS};

/// Bitset over attribute word indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VaryingState {
    mask: [u64; 4],
}

impl VaryingState {
    /// Every attribute set
    pub fn all() -> Self {
        Self { mask: [u64::MAX; 4] }
    }

    pub fn set(&mut self, attr: Attribute, value: bool) {
        let (word, bit) = (usize::from(attr.0) / 64, attr.0 % 64);
        if value {
            self.mask[word] |= 1 << bit;
        } else {
            self.mask[word] &= !(1 << bit);
        }
    }

    pub fn get(&self, attr: Attribute) -> bool {
        let (word, bit) = (usize::from(attr.0) / 64, attr.0 % 64);
        self.mask[word] & (1 << bit) != 0
    }

    /// Any component of the vec4 containing `attr`
    pub fn any_component(&self, attr: Attribute) -> bool {
        let base = attr.0 & !3;
        (0..4).any(|i| self.get(Attribute(base + i)))
    }

    /// Any component of generic `index`
    pub fn generic(&self, index: usize) -> bool {
        self.any_component(Attribute::generic(index, 0))
    }

    pub fn any_generic(&self) -> bool {
        (0..NUM_GENERICS).any(|i| self.generic(i))
    }

    pub fn union(&mut self, other: &VaryingState) {
        for (lhs, rhs) in self.mask.iter_mut().zip(other.mask.iter()) {
            *lhs |= rhs;
        }
    }
}
