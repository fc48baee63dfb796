//! Construction-time errors.
//!
//! Everything here is reported synchronously to the builder caller, never
//! deferred to encoding or execution. The enum derives `Serialize` /
//! `Deserialize` so hosts can render structured diagnostics.

use crate::ty::ValueType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum BuildError {
    // ── Operator construction ────────────────────────────────────────────
    #[error("operand type mismatch: left is {left}, right is {right}")]
    OperandMismatch { left: ValueType, right: ValueType },

    #[error("operator '{op}' is not supported for type {ty}")]
    UnsupportedOperator { op: String, ty: ValueType },

    #[error("a function cannot be used as a constant value")]
    FunctionConstant,

    // ── Calls ────────────────────────────────────────────────────────────
    #[error("call expects {expected} arguments, got {found}")]
    WrongArgCount { expected: usize, found: usize },

    #[error("argument {index} has type {found}, expected {expected}")]
    ArgTypeMismatch {
        index: usize,
        expected: ValueType,
        found: ValueType,
    },

    // ── Statements and control ───────────────────────────────────────────
    #[error("condition must be bool, got {0}")]
    ConditionNotBool(ValueType),

    #[error("statement leaves a {0} on the stack; wrap the expression in drop")]
    NonVoidStatement(ValueType),

    #[error("cannot drop a void expression")]
    DropVoid,

    #[error("loop counter and bounds must be i32")]
    LoopTypeMismatch,

    #[error("return value has type {found}, function returns {expected}")]
    ReturnTypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    // ── Slot access ──────────────────────────────────────────────────────
    #[error("value of type {found} cannot be assigned to a {expected} slot")]
    SlotTypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("global {0} is immutable")]
    ImmutableGlobal(u32),

    #[error("memory address must be i32, got {0}")]
    AddressType(ValueType),

    // ── Builder ordering ─────────────────────────────────────────────────
    #[error("parameters must be declared before locals and statements")]
    ParamAfterLocal,

    #[error("locals must be declared before statements")]
    LocalAfterStatement,

    #[error("imports must be declared before definitions of the same kind")]
    ImportAfterDefinition,

    // ── Module shape ─────────────────────────────────────────────────────
    #[error("a module may declare at most one memory")]
    MultipleMemories,

    #[error("a module may declare at most one table")]
    MultipleTables,

    #[error("duplicate export name: {0}")]
    DuplicateExport(String),

    #[error("start function already declared")]
    DuplicateStart,

    #[error("start function must take no parameters and return nothing")]
    StartSignature,

    #[error("no memory declared for data segment")]
    DataWithoutMemory,

    #[error("no table declared for element segment")]
    ElementWithoutTable,

    #[error("segment offset expression must be i32, got {0}")]
    OffsetType(ValueType),

    #[error("global initializer must produce a value")]
    VoidGlobal,

    #[error("export target {0} is not declared")]
    ExportTargetMissing(String),

    #[error("parameter and local slots cannot be void")]
    VoidLocal,

    #[error("implementation signature does not match the forward declaration")]
    SignatureMismatch,

    #[error("function {0} is a forward declaration and was never implemented")]
    UnimplementedFunction(u32),

    #[error("function {0} already has a body")]
    AlreadyImplemented(u32),

    // ── Structural rewriting ─────────────────────────────────────────────
    #[error("reconstruct expects {expected} children, got {found}")]
    ChildCount { expected: usize, found: usize },
}
