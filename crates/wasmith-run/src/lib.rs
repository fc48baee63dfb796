//! Instantiation and execution of frozen modules.
//!
//! # Architecture
//!
//! [`Instance::instantiate`] links a [`wasmith_module::Module`] against
//! host [`Imports`] and runs module initialization: globals, memory and
//! active data, table and elements, then the start function.
//!
//! Execution is deliberately doubled:
//! - [`Instance::invoke`] interprets the canonical encoded instruction
//!   stream (produced once per function at instantiation)
//! - [`Instance::invoke_direct`] walks the node tree
//!
//! Both delegate every numeric operation to the shared semantics in
//! [`wasmith_types`], so a divergence between the encoder and the tree is
//! observable as the two paths disagreeing.

pub mod error;
pub mod instance;

mod eval;
mod interp;

pub use error::{RunResult, Trap};
pub use instance::{Extern, HostFunc, Imports, Instance, PAGE_SIZE};
