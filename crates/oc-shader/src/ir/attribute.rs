//! Guest attribute addressing
//!
//! Attributes are addressed by 32-bit word index the way the guest ISA does:
//! four consecutive words form one vec4 attribute.

use std::fmt;

/// Number of generic varyings
pub const NUM_GENERICS: usize = 32;

/// Attribute word index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attribute(pub u16);

impl Attribute {
    pub const PRIMITIVE_ID: Attribute = Attribute(24);
    pub const LAYER: Attribute = Attribute(25);
    pub const VIEWPORT_INDEX: Attribute = Attribute(26);
    pub const POINT_SIZE: Attribute = Attribute(27);
    pub const POSITION_X: Attribute = Attribute(28);
    pub const POSITION_Y: Attribute = Attribute(29);
    pub const POSITION_Z: Attribute = Attribute(30);
    pub const POSITION_W: Attribute = Attribute(31);
    pub const GENERIC0_X: Attribute = Attribute(32);
    pub const INSTANCE_ID: Attribute = Attribute(190);
    pub const VERTEX_ID: Attribute = Attribute(191);
    pub const FRONT_FACE: Attribute = Attribute(255);

    /// Component `element` (0..4) of generic varying `index`
    pub const fn generic(index: usize, element: usize) -> Attribute {
        Attribute(Self::GENERIC0_X.0 + (index * 4 + element) as u16)
    }

    pub fn is_generic(self) -> bool {
        let end = Self::GENERIC0_X.0 + (NUM_GENERICS * 4) as u16;
        (Self::GENERIC0_X.0..end).contains(&self.0)
    }

    pub fn is_position(self) -> bool {
        (Self::POSITION_X.0..=Self::POSITION_W.0).contains(&self.0)
    }

    /// Generic varying this attribute belongs to
    pub fn generic_index(self) -> Option<usize> {
        self.is_generic()
            .then(|| usize::from(self.0 - Self::GENERIC0_X.0) / 4)
    }

    /// Component within its vec4
    pub fn element(self) -> usize {
        usize::from(self.0 % 4)
    }

    /// Swizzle letter of the component
    pub fn swizzle(self) -> char {
        ['x', 'y', 'z', 'w'][self.element()]
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.generic_index() {
            return write!(f, "Generic{}{}", index, self.swizzle().to_ascii_uppercase());
        }
        if self.is_position() {
            return write!(f, "Position{}", self.swizzle().to_ascii_uppercase());
        }
        write!(f, "Attribute({})", self.0)
    }
}
