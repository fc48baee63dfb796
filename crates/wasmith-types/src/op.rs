//! Operators, their legality tables, and the shared numeric semantics.
//!
//! The `apply_*` functions are the single definition of operator behavior:
//! two's-complement wrapping integers, IEEE 754 doubles, and the trap rules
//! of the binary format (divide by zero, `MIN / -1`, float-to-int of NaN or
//! out-of-range values). Both the tree-walking evaluator and the bytecode
//! interpreter delegate here, so the two paths cannot silently diverge.

use crate::ty::ValueType;
use crate::value::Value;
use thiserror::Error;

/// Which type category an operator admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSupport {
    IntOnly,
    FloatOnly,
    All,
}

// ── Operator enumerations ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
    Min,
    Max,
    Copysign,
}

impl BinaryOp {
    pub fn support(self) -> TypeSupport {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::DivS => TypeSupport::All,
            Self::Min | Self::Max | Self::Copysign => TypeSupport::FloatOnly,
            _ => TypeSupport::IntOnly,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::DivS => "/",
            Self::DivU => "/u",
            Self::RemS => "%",
            Self::RemU => "%u",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::ShrS => ">>",
            Self::ShrU => ">>u",
            Self::Rotl => "rotl",
            Self::Rotr => "rotr",
            Self::Min => "min",
            Self::Max => "max",
            Self::Copysign => "copysign",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
    Clz,
    Ctz,
    Popcnt,
    Neg,
    Not,
    ToI32,
    ToI64,
    ToF64,
}

impl UnaryOp {
    pub fn support(self) -> TypeSupport {
        match self {
            Self::Abs | Self::Ceil | Self::Floor | Self::Trunc | Self::Nearest | Self::Sqrt => {
                TypeSupport::FloatOnly
            }
            Self::Clz | Self::Ctz | Self::Popcnt | Self::Not => TypeSupport::IntOnly,
            Self::Neg | Self::ToI32 | Self::ToI64 | Self::ToF64 => TypeSupport::All,
        }
    }

    /// Conversions produce a type other than their operand's.
    pub fn deviant_result(self) -> Option<ValueType> {
        match self {
            Self::ToI32 => Some(ValueType::I32),
            Self::ToI64 => Some(ValueType::I64),
            Self::ToF64 => Some(ValueType::F64),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Trunc => "trunc",
            Self::Nearest => "nearest",
            Self::Sqrt => "sqrt",
            Self::Clz => "clz",
            Self::Ctz => "ctz",
            Self::Popcnt => "popcnt",
            Self::Neg => "neg",
            Self::Not => "not",
            Self::ToI32 => "to_i32",
            Self::ToI64 => "to_i64",
            Self::ToF64 => "to_f64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl RelOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

// ── Legality ─────────────────────────────────────────────────────────────────

impl ValueType {
    /// Whether a binary operator may be constructed over operands of this type.
    pub fn supports_binary(self, op: BinaryOp) -> bool {
        match self {
            Self::Void => false,
            Self::Bool => matches!(op, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor),
            Self::I32 | Self::I64 => op.support() != TypeSupport::FloatOnly,
            Self::F64 => op.support() != TypeSupport::IntOnly,
        }
    }

    pub fn supports_unary(self, op: UnaryOp) -> bool {
        match self {
            Self::Void => false,
            Self::Bool => matches!(
                op,
                UnaryOp::Not | UnaryOp::ToI32 | UnaryOp::ToI64 | UnaryOp::ToF64
            ),
            Self::I32 | Self::I64 => op.support() != TypeSupport::FloatOnly,
            Self::F64 => op.support() != TypeSupport::IntOnly,
        }
    }

    pub fn supports_relational(self, op: RelOp) -> bool {
        match self {
            Self::Void => false,
            Self::Bool => matches!(op, RelOp::Eq | RelOp::Ne),
            _ => true,
        }
    }
}

// ── Shared semantics ─────────────────────────────────────────────────────────

/// Faults a pure numeric operation can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumericTrap {
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("operand kind does not match the operator")]
    OperandKind,
}

/// Apply a binary operator to two values of the same runtime kind.
pub fn apply_binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, NumericTrap> {
    use BinaryOp::*;
    use Value::*;
    match (a, b) {
        (I32(a), I32(b)) => Ok(I32(match op {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            DivS => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                if a == i32::MIN && b == -1 {
                    return Err(NumericTrap::IntegerOverflow);
                }
                a.wrapping_div(b)
            }
            DivU => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                ((a as u32) / (b as u32)) as i32
            }
            RemS => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                a.wrapping_rem(b)
            }
            RemU => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                ((a as u32) % (b as u32)) as i32
            }
            And => a & b,
            Or => a | b,
            Xor => a ^ b,
            Shl => a.wrapping_shl(b as u32),
            ShrS => a.wrapping_shr(b as u32),
            ShrU => ((a as u32).wrapping_shr(b as u32)) as i32,
            Rotl => a.rotate_left(b as u32 & 31),
            Rotr => a.rotate_right(b as u32 & 31),
            Min | Max | Copysign => return Err(NumericTrap::OperandKind),
        })),
        (I64(a), I64(b)) => Ok(I64(match op {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            DivS => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                if a == i64::MIN && b == -1 {
                    return Err(NumericTrap::IntegerOverflow);
                }
                a.wrapping_div(b)
            }
            DivU => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                ((a as u64) / (b as u64)) as i64
            }
            RemS => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                a.wrapping_rem(b)
            }
            RemU => {
                if b == 0 {
                    return Err(NumericTrap::DivideByZero);
                }
                ((a as u64) % (b as u64)) as i64
            }
            And => a & b,
            Or => a | b,
            Xor => a ^ b,
            Shl => a.wrapping_shl(b as u32),
            ShrS => a.wrapping_shr(b as u32),
            ShrU => ((a as u64).wrapping_shr(b as u32)) as i64,
            Rotl => a.rotate_left(b as u32 & 63),
            Rotr => a.rotate_right(b as u32 & 63),
            Min | Max | Copysign => return Err(NumericTrap::OperandKind),
        })),
        (F64(a), F64(b)) => Ok(F64(match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            DivS => a / b,
            Min => a.min(b),
            Max => a.max(b),
            Copysign => a.copysign(b),
            _ => return Err(NumericTrap::OperandKind),
        })),
        _ => Err(NumericTrap::OperandKind),
    }
}

/// Apply a unary operator.
///
/// `operand_ty` is the operand's *static* type: `Not` is logical negation on
/// `Bool` slots and bitwise complement on integers, and conversions pick
/// their behavior from the source type.
pub fn apply_unary(op: UnaryOp, operand_ty: ValueType, v: Value) -> Result<Value, NumericTrap> {
    use UnaryOp::*;
    use Value::*;
    match op {
        Abs | Ceil | Floor | Trunc | Nearest | Sqrt => {
            let F64(x) = v else {
                return Err(NumericTrap::OperandKind);
            };
            Ok(F64(match op {
                Abs => x.abs(),
                Ceil => x.ceil(),
                Floor => x.floor(),
                Trunc => x.trunc(),
                Nearest => x.round_ties_even(),
                Sqrt => x.sqrt(),
                _ => unreachable!(),
            }))
        }
        Clz => match v {
            I32(x) => Ok(I32(x.leading_zeros() as i32)),
            I64(x) => Ok(I64(x.leading_zeros() as i64)),
            _ => Err(NumericTrap::OperandKind),
        },
        Ctz => match v {
            I32(x) => Ok(I32(x.trailing_zeros() as i32)),
            I64(x) => Ok(I64(x.trailing_zeros() as i64)),
            _ => Err(NumericTrap::OperandKind),
        },
        Popcnt => match v {
            I32(x) => Ok(I32(x.count_ones() as i32)),
            I64(x) => Ok(I64(x.count_ones() as i64)),
            _ => Err(NumericTrap::OperandKind),
        },
        Neg => match v {
            I32(x) => Ok(I32(0i32.wrapping_sub(x))),
            I64(x) => Ok(I64(0i64.wrapping_sub(x))),
            F64(x) => Ok(F64(-x)),
        },
        Not => match (operand_ty, v) {
            (ValueType::Bool, I32(x)) => Ok(I32((x == 0) as i32)),
            (_, I32(x)) => Ok(I32(!x)),
            (_, I64(x)) => Ok(I64(!x)),
            _ => Err(NumericTrap::OperandKind),
        },
        ToI32 => match v {
            I32(x) => Ok(I32(x)),
            I64(x) => Ok(I32(x as i32)),
            F64(x) => {
                if x.is_nan() || x <= -2147483649.0 || x >= 2147483648.0 {
                    Err(NumericTrap::InvalidConversion)
                } else {
                    Ok(I32(x.trunc() as i32))
                }
            }
        },
        ToI64 => match v {
            I32(x) => Ok(I64(x as i64)),
            I64(x) => Ok(I64(x)),
            F64(x) => {
                if x.is_nan() || x < -9_223_372_036_854_775_808.0 || x >= 9_223_372_036_854_775_808.0
                {
                    Err(NumericTrap::InvalidConversion)
                } else {
                    Ok(I64(x.trunc() as i64))
                }
            }
        },
        ToF64 => match v {
            I32(x) => Ok(F64(x as f64)),
            I64(x) => Ok(F64(x as f64)),
            F64(x) => Ok(F64(x)),
        },
    }
}

/// Apply a relational operator; the result is always a boolean `I32(0|1)`.
/// Integer comparisons are signed.
pub fn apply_rel(op: RelOp, a: Value, b: Value) -> Result<Value, NumericTrap> {
    use RelOp::*;
    use Value::*;
    let r = match (a, b) {
        (I32(a), I32(b)) => match op {
            Eq => a == b,
            Ne => a != b,
            Lt => a < b,
            Gt => a > b,
            Le => a <= b,
            Ge => a >= b,
        },
        (I64(a), I64(b)) => match op {
            Eq => a == b,
            Ne => a != b,
            Lt => a < b,
            Gt => a > b,
            Le => a <= b,
            Ge => a >= b,
        },
        (F64(a), F64(b)) => match op {
            Eq => a == b,
            Ne => a != b,
            Lt => a < b,
            Gt => a > b,
            Le => a <= b,
            Ge => a >= b,
        },
        _ => return Err(NumericTrap::OperandKind),
    };
    Ok(I32(r as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_and_traps() {
        assert_eq!(
            apply_binary(BinaryOp::Add, Value::I32(i32::MAX), Value::I32(1)),
            Ok(Value::I32(i32::MIN))
        );
        assert_eq!(
            apply_binary(BinaryOp::DivS, Value::I32(1), Value::I32(0)),
            Err(NumericTrap::DivideByZero)
        );
        assert_eq!(
            apply_binary(BinaryOp::DivS, Value::I32(i32::MIN), Value::I32(-1)),
            Err(NumericTrap::IntegerOverflow)
        );
        // MIN % -1 does not trap; it is zero.
        assert_eq!(
            apply_binary(BinaryOp::RemS, Value::I32(i32::MIN), Value::I32(-1)),
            Ok(Value::I32(0))
        );
    }

    #[test]
    fn shift_counts_are_masked() {
        assert_eq!(
            apply_binary(BinaryOp::Shl, Value::I32(1), Value::I32(33)),
            Ok(Value::I32(2))
        );
        assert_eq!(
            apply_binary(BinaryOp::ShrU, Value::I32(-1), Value::I32(28)),
            Ok(Value::I32(0xF))
        );
    }

    #[test]
    fn not_depends_on_static_type() {
        assert_eq!(
            apply_unary(UnaryOp::Not, ValueType::Bool, Value::I32(1)),
            Ok(Value::I32(0))
        );
        assert_eq!(
            apply_unary(UnaryOp::Not, ValueType::I32, Value::I32(0)),
            Ok(Value::I32(-1))
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(
            apply_unary(UnaryOp::ToI32, ValueType::I64, Value::I64(0x1_0000_0001)),
            Ok(Value::I32(1))
        );
        assert_eq!(
            apply_unary(UnaryOp::ToI32, ValueType::F64, Value::F64(-3.7)),
            Ok(Value::I32(-3))
        );
        assert_eq!(
            apply_unary(UnaryOp::ToI32, ValueType::F64, Value::F64(f64::NAN)),
            Err(NumericTrap::InvalidConversion)
        );
        assert_eq!(
            apply_unary(UnaryOp::ToI32, ValueType::F64, Value::F64(3e10)),
            Err(NumericTrap::InvalidConversion)
        );
        assert_eq!(
            apply_unary(UnaryOp::ToF64, ValueType::I32, Value::I32(7)),
            Ok(Value::F64(7.0))
        );
    }

    #[test]
    fn legality_table() {
        assert!(ValueType::I32.supports_binary(BinaryOp::Rotl));
        assert!(!ValueType::F64.supports_binary(BinaryOp::RemS));
        assert!(ValueType::F64.supports_binary(BinaryOp::Min));
        assert!(!ValueType::I32.supports_binary(BinaryOp::Min));
        assert!(ValueType::Bool.supports_binary(BinaryOp::And));
        assert!(!ValueType::Bool.supports_binary(BinaryOp::Add));
        assert!(ValueType::F64.supports_unary(UnaryOp::Sqrt));
        assert!(!ValueType::I32.supports_unary(UnaryOp::Sqrt));
        assert!(ValueType::Bool.supports_relational(RelOp::Eq));
        assert!(!ValueType::Bool.supports_relational(RelOp::Lt));
        assert!(!ValueType::Void.supports_relational(RelOp::Eq));
    }

    #[test]
    fn relational_is_signed() {
        assert_eq!(
            apply_rel(RelOp::Lt, Value::I32(-1), Value::I32(1)),
            Ok(Value::I32(1))
        );
        assert_eq!(
            apply_rel(RelOp::Gt, Value::F64(2.5), Value::F64(2.0)),
            Ok(Value::I32(1))
        );
    }
}
