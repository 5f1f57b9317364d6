//! IR values: immediates and instruction references

use super::attribute::Attribute;
use super::ty::Type;
use std::fmt;

/// Index of an instruction in a program's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// Index of a basic block in a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Instruction argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Void,
    Inst(InstId),
    U1(bool),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Attribute(Attribute),
}

impl Value {
    pub fn is_immediate(&self) -> bool {
        !matches!(self, Value::Inst(_))
    }

    /// Type of an immediate; `None` for instruction references
    pub fn immediate_type(&self) -> Option<Type> {
        match self {
            Value::Void => Some(Type::Void),
            Value::Inst(_) => None,
            Value::U1(_) => Some(Type::U1),
            Value::U32(_) => Some(Type::U32),
            Value::U64(_) => Some(Type::U64),
            Value::F32(_) => Some(Type::F32),
            Value::F64(_) => Some(Type::F64),
            Value::Attribute(_) => Some(Type::Attribute),
        }
    }

    pub fn inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u1(&self) -> Option<bool> {
        match self {
            Value::U1(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<Attribute> {
        match self {
            Value::Attribute(attr) => Some(*attr),
            _ => None,
        }
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Inst(id) => write!(f, "%{}", id.0),
            Value::U1(v) => write!(f, "#{}", v),
            Value::U32(v) => write!(f, "#{}", v),
            Value::U64(v) => write!(f, "#{}ul", v),
            Value::F32(v) => write!(f, "#{:?}", v),
            Value::F64(v) => write!(f, "#{:?}d", v),
            Value::Attribute(attr) => write!(f, "{}", attr),
        }
    }
}
