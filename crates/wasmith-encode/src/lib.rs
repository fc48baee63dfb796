//! Canonical binary encoder.
//!
//! Turns a frozen [`wasmith_module::Module`] into WebAssembly binary bytes
//! with a fixed, deterministic layout: sections in a fixed order, every
//! empty section omitted, integers in LEB128. The same module always
//! produces the same bytes. Output is checked with `wasmparser` before it
//! is handed back, so an encoder bug surfaces as an [`EncodeError`] rather
//! than a malformed artifact.
//!
//! The instruction-stream entry point [`encode_instrs`] is shared with the
//! runtime crate, which executes the encoded form directly.

pub mod emit;
pub mod opcode;
pub mod writer;

pub use emit::{encode_instrs, encode_module};
pub use writer::{ByteReader, ByteWriter};

use thiserror::Error;

/// Errors that can occur while encoding a module.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// An internal consistency check failed.
    #[error("internal encoder error: {0}")]
    Internal(String),

    /// The emitted bytes failed `wasmparser` validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),
}

/// Encoder result type alias.
pub type EncodeResult<T> = Result<T, EncodeError>;
