//! Runtime values.

use crate::ty::ValueType;
use std::fmt;

/// A value held in a local, global, or operand-stack slot.
///
/// Booleans live in `I32` slots as 0 or 1, matching their binary
/// representation; the static distinction only exists on [`Node`]s.
///
/// [`Node`]: crate::node::Node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F64(f64),
}

impl Value {
    /// The runtime type tag. Booleans report `I32`.
    pub fn ty(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F64(_) => ValueType::F64,
        }
    }

    /// The zero value used to initialize a slot of the given type.
    /// Returns `None` for `Void`.
    pub fn zero(ty: ValueType) -> Option<Value> {
        match ty {
            ValueType::I32 | ValueType::Bool => Some(Self::I32(0)),
            ValueType::I64 => Some(Self::I64(0)),
            ValueType::F64 => Some(Self::F64(0.0)),
            ValueType::Void => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::I32(v as i32)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}
