//! IR value types

use std::fmt;

/// Type of an IR value or instruction result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Argument whose type is decided by the instruction (phi sources, coordinates)
    Opaque,
    Attribute,
    U1,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
    U32x2,
    U32x3,
    U32x4,
    F16x2,
    F32x2,
    F32x3,
    F32x4,
}

impl Type {
    /// Whether an argument of type `other` may be passed where `self` is expected
    pub fn accepts(self, other: Type) -> bool {
        self == Type::Opaque || self == other
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
