//! Runtime error types: everything that can fault at instantiation or
//! during execution.

use thiserror::Error;
use wasmith_types::NumericTrap;

/// Execution fault. Traps abort the current invocation; the instance
/// itself stays usable.
#[derive(Debug, PartialEq, Error)]
pub enum Trap {
    /// Divide by zero, `MIN / -1`, or an invalid float-to-int conversion.
    #[error(transparent)]
    Numeric(#[from] NumericTrap),

    /// `unreachable` executed, including falling off the end of a function
    /// that must produce a value.
    #[error("unreachable executed")]
    Unreachable,

    #[error("out-of-bounds memory access at address {addr} (width {width})")]
    MemoryOutOfBounds { addr: u32, width: u32 },

    #[error("active data segment does not fit in memory")]
    DataOutOfBounds,

    #[error("element segment does not fit in table")]
    ElementOutOfBounds,

    #[error("table slot {0} out of bounds")]
    TableOutOfBounds(i32),

    #[error("table slot {0} is uninitialized")]
    UninitializedElement(i32),

    #[error("indirect call signature mismatch")]
    IndirectSignatureMismatch,

    #[error("call stack exhausted")]
    StackOverflow,

    // ── Linking ──────────────────────────────────────────────────────────
    #[error("missing import {module}.{field}")]
    MissingImport { module: String, field: String },

    #[error("import {module}.{field} has the wrong kind or type")]
    ImportMismatch { module: String, field: String },

    // ── Invocation surface ───────────────────────────────────────────────
    #[error("no export named {0}")]
    UnknownExport(String),

    #[error("export {0} is not a function")]
    NotCallable(String),

    #[error("export {0} is not a global")]
    NotAGlobal(String),

    #[error("expected {expected} arguments, got {found}")]
    ArgCount { expected: usize, found: usize },

    #[error("argument {index} has the wrong type")]
    ArgType { index: usize },

    /// Fault raised by a host function.
    #[error("host function fault: {0}")]
    Host(String),

    /// An internal consistency check failed.
    #[error("internal runtime error: {0}")]
    Internal(String),
}

/// Result alias for runtime operations.
pub type RunResult<T> = Result<T, Trap>;
