//! Shared types for the wasmith authoring library.
//!
//! This crate defines the canonical value types, the immutable typed node
//! tree that programs are assembled from, the operator legality tables, and
//! the single definition of numeric semantics that both execution paths
//! (tree walking and bytecode interpretation) delegate to.

pub mod error;
pub mod node;
pub mod op;
pub mod ty;
pub mod value;

pub use error::BuildError;
pub use node::{FuncRef, GlobalRef, LoadOp, LocalRef, Node, StoreOp, TableRef};
pub use op::{apply_binary, apply_rel, apply_unary, BinaryOp, NumericTrap, RelOp, TypeSupport, UnaryOp};
pub use ty::{FuncType, ValueType};
pub use value::Value;

/// Result type used throughout node and module construction.
pub type Result<T> = std::result::Result<T, BuildError>;
