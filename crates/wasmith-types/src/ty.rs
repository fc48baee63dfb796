//! Canonical value types and structural function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of value kinds a node can produce.
///
/// `Bool` shares the 32-bit integer representation at runtime and in the
/// binary format but is kept distinct statically so relational results and
/// conditions are not confused with arithmetic integers. `Void` is the type
/// of statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F64,
    Bool,
    Void,
}

impl ValueType {
    /// Two's-complement integer types (excludes `Bool`).
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F64)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F64)
    }

    /// Anything that can occupy a local, global, or stack slot.
    pub fn is_concrete(self) -> bool {
        self != Self::Void
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F64 => write!(f, "f64"),
            Self::Bool => write!(f, "bool"),
            Self::Void => write!(f, "void"),
        }
    }
}

/// A structural function signature: ordered parameter types plus a result.
///
/// Signatures are compared structurally and interned by index within a
/// module, so identical signatures share one type-section entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncType {
    pub params: Vec<ValueType>,
    pub result: ValueType,
}

impl FuncType {
    pub fn new(result: ValueType, params: &[ValueType]) -> Self {
        Self {
            params: params.to_vec(),
            result,
        }
    }

    pub fn matches(&self, result: ValueType, params: &[ValueType]) -> bool {
        self.result == result && self.params == params
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_type_structural_equality() {
        let a = FuncType::new(ValueType::I32, &[ValueType::I32, ValueType::F64]);
        let b = FuncType::new(ValueType::I32, &[ValueType::I32, ValueType::F64]);
        let c = FuncType::new(ValueType::Void, &[ValueType::I32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.matches(ValueType::I32, &[ValueType::I32, ValueType::F64]));
        assert!(!a.matches(ValueType::I32, &[ValueType::I32]));
    }

    #[test]
    fn display() {
        let t = FuncType::new(ValueType::Void, &[ValueType::I64]);
        assert_eq!(t.to_string(), "(i64) -> void");
        assert_eq!(ValueType::Bool.to_string(), "bool");
    }
}
