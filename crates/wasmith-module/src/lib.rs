//! Module staging and freezing.
//!
//! Authoring happens in two phases with two distinct types: a mutable
//! [`ModuleBuilder`] with append-only lists and ordering checks, and the
//! immutable [`Module`] it freezes into. A frozen module has no mutation
//! surface at all; it can only be encoded or instantiated.

pub mod builder;
pub mod module;

pub use builder::{FuncBuilder, MemoryRef, ModuleBuilder};
pub use module::{
    DataSegment, ElementSegment, Export, FuncBody, FuncDecl, GlobalDecl, Limits, MemoryDecl,
    Module, TableDecl,
};
