//! The staging builder.
//!
//! [`ModuleBuilder`] accumulates declarations with every ordering rule of
//! the binary format enforced at the call site: imports of a kind before
//! definitions of that kind, at most one memory and one table, export names
//! unique, the start function declared once with an empty signature.
//! Functions are authored through a scoped [`FuncBuilder`] closure that
//! enforces the parameter → local → statement declaration order. Recursive
//! and mutually recursive functions go through [`ModuleBuilder::forward_decl`]
//! and [`ModuleBuilder::implement`].
//!
//! References ([`LocalRef`], [`GlobalRef`], [`FuncRef`], [`TableRef`],
//! [`MemoryRef`]) are only ever minted here, after the declaration they name
//! exists, so trees cannot point at undeclared or future slots.

use std::collections::BTreeMap;

use wasmith_types::{
    BuildError, FuncRef, FuncType, GlobalRef, LocalRef, Node, Result, TableRef, ValueType,
};

use crate::module::{
    DataSegment, ElementSegment, Export, FuncBody, FuncDecl, GlobalDecl, Limits, MemoryDecl,
    Module, TableDecl,
};

/// Handle to the module's single memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRef {
    pub limits: Limits,
}

/// Parameter lists arriving as slices get the same void check as
/// [`FuncBuilder::param`].
fn check_params(params: &[ValueType]) -> Result<()> {
    if params.iter().any(|p| !p.is_concrete()) {
        return Err(BuildError::VoidLocal);
    }
    Ok(())
}

// ── Function staging ─────────────────────────────────────────────────────────

enum FuncEntry {
    Import {
        module: String,
        field: String,
        type_index: u32,
    },
    /// Forward declaration awaiting a body.
    Pending {
        type_index: u32,
    },
    Defined(FuncBody),
}

/// Scoped builder for one function body. Obtained through
/// [`ModuleBuilder::func`] or [`ModuleBuilder::implement`]; the declaration
/// order is parameters, then locals, then statements, and each phase is
/// sealed once the next begins.
pub struct FuncBuilder<'m> {
    module: &'m mut ModuleBuilder,
    result: ValueType,
    variables: Vec<ValueType>,
    param_count: usize,
    statements: Vec<Node>,
}

impl<'m> FuncBuilder<'m> {
    fn new(module: &'m mut ModuleBuilder, result: ValueType) -> Self {
        FuncBuilder {
            module,
            result,
            variables: Vec::new(),
            param_count: 0,
            statements: Vec::new(),
        }
    }

    /// Declare the next parameter. Must precede every local and statement.
    pub fn param(&mut self, ty: ValueType) -> Result<LocalRef> {
        if self.param_count != self.variables.len() || !self.statements.is_empty() {
            return Err(BuildError::ParamAfterLocal);
        }
        if !ty.is_concrete() {
            return Err(BuildError::VoidLocal);
        }
        let index = self.variables.len() as u32;
        self.variables.push(ty);
        self.param_count += 1;
        Ok(LocalRef { index, ty })
    }

    /// Declare a local slot, zero-initialized on entry. Must precede every
    /// statement.
    pub fn local(&mut self, ty: ValueType) -> Result<LocalRef> {
        if !self.statements.is_empty() {
            return Err(BuildError::LocalAfterStatement);
        }
        if !ty.is_concrete() {
            return Err(BuildError::VoidLocal);
        }
        let index = self.variables.len() as u32;
        self.variables.push(ty);
        Ok(LocalRef { index, ty })
    }

    /// Append a statement. The node must be void-typed.
    pub fn push(&mut self, stmt: Node) -> Result<()> {
        let ty = stmt.result_type();
        if ty != ValueType::Void {
            return Err(BuildError::NonVoidStatement(ty));
        }
        self.statements.push(stmt);
        Ok(())
    }

    /// Append `return value`, checked against the declared result type.
    pub fn ret(&mut self, value: Node) -> Result<()> {
        let found = value.result_type();
        if found != self.result {
            return Err(BuildError::ReturnTypeMismatch {
                expected: self.result,
                found,
            });
        }
        self.statements.push(Node::return_(Some(value)));
        Ok(())
    }

    /// Append a bare `return`; only legal in a void function.
    pub fn ret_void(&mut self) -> Result<()> {
        if self.result != ValueType::Void {
            return Err(BuildError::ReturnTypeMismatch {
                expected: self.result,
                found: ValueType::Void,
            });
        }
        self.statements.push(Node::return_(None));
        Ok(())
    }

    /// Build an indirect-call expression. The signature is interned in the
    /// module's type list so the binary-format type index exists when the
    /// tree is later encoded.
    pub fn call_indirect(
        &mut self,
        table: TableRef,
        result: ValueType,
        params: &[ValueType],
        index: Node,
        args: Vec<Node>,
    ) -> Result<Node> {
        check_params(params)?;
        let ty = FuncType::new(result, params);
        self.module.intern_type(ty.clone());
        Node::call_indirect(table, ty, index, args)
    }

    pub fn result_type(&self) -> ValueType {
        self.result
    }

    fn finish(self) -> (FuncType, Vec<ValueType>, Vec<Node>) {
        let params = self.variables[..self.param_count].to_vec();
        let locals = self.variables[self.param_count..].to_vec();
        let ty = FuncType::new(self.result, &params);
        (ty, locals, self.statements)
    }
}

// ── Module staging ───────────────────────────────────────────────────────────

/// Append-only module under construction. Freeze with [`build`].
///
/// [`build`]: ModuleBuilder::build
#[derive(Default)]
pub struct ModuleBuilder {
    types: Vec<FuncType>,
    funcs: Vec<FuncEntry>,
    has_local_func: bool,
    table: Option<TableDecl>,
    memory: Option<MemoryDecl>,
    globals: Vec<GlobalDecl>,
    has_local_global: bool,
    exports: BTreeMap<String, Export>,
    start: Option<u32>,
    elements: Vec<ElementSegment>,
    data: Vec<DataSegment>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural deduplication into the type list; returns the index.
    fn intern_type(&mut self, ty: FuncType) -> u32 {
        match self.types.iter().position(|t| *t == ty) {
            Some(i) => i as u32,
            None => {
                self.types.push(ty);
                (self.types.len() - 1) as u32
            }
        }
    }

    fn run_body<F>(&mut self, result: ValueType, f: F) -> Result<(FuncType, Vec<ValueType>, Vec<Node>)>
    where
        F: FnOnce(&mut FuncBuilder<'_>) -> Result<()>,
    {
        let mut fb = FuncBuilder::new(self, result);
        f(&mut fb)?;
        Ok(fb.finish())
    }

    // ── Functions ────────────────────────────────────────────────────────

    /// Import a function. Like every import, must precede local definitions
    /// of the same kind so the index spaces line up with the binary format.
    pub fn import_func(
        &mut self,
        module: &str,
        field: &str,
        result: ValueType,
        params: &[ValueType],
    ) -> Result<FuncRef> {
        if self.has_local_func {
            return Err(BuildError::ImportAfterDefinition);
        }
        check_params(params)?;
        let ty = FuncType::new(result, params);
        let type_index = self.intern_type(ty.clone());
        let index = self.funcs.len() as u32;
        self.funcs.push(FuncEntry::Import {
            module: module.to_string(),
            field: field.to_string(),
            type_index,
        });
        Ok(FuncRef { index, ty })
    }

    /// Define a function. The closure declares parameters, locals, and
    /// statements in that order on the provided builder.
    pub fn func<F>(&mut self, result: ValueType, f: F) -> Result<FuncRef>
    where
        F: FnOnce(&mut FuncBuilder<'_>) -> Result<()>,
    {
        let (ty, locals, body) = self.run_body(result, f)?;
        let type_index = self.intern_type(ty.clone());
        let index = self.funcs.len() as u32;
        self.funcs.push(FuncEntry::Defined(FuncBody {
            type_index,
            locals,
            body,
        }));
        self.has_local_func = true;
        Ok(FuncRef { index, ty })
    }

    /// Reserve an index and signature for a function whose body comes later,
    /// enabling recursion and mutual recursion. [`build`] fails if any
    /// declaration is left without a body.
    ///
    /// [`build`]: ModuleBuilder::build
    pub fn forward_decl(&mut self, result: ValueType, params: &[ValueType]) -> Result<FuncRef> {
        check_params(params)?;
        let ty = FuncType::new(result, params);
        let type_index = self.intern_type(ty.clone());
        let index = self.funcs.len() as u32;
        self.funcs.push(FuncEntry::Pending { type_index });
        self.has_local_func = true;
        Ok(FuncRef { index, ty })
    }

    /// Supply the body for a forward declaration. The closure re-declares
    /// the parameters; the resulting signature must match the declared one.
    pub fn implement<F>(&mut self, func: &FuncRef, f: F) -> Result<()>
    where
        F: FnOnce(&mut FuncBuilder<'_>) -> Result<()>,
    {
        let declared_type_index = match &self.funcs[func.index as usize] {
            FuncEntry::Pending { type_index } => *type_index,
            FuncEntry::Import { .. } | FuncEntry::Defined(_) => {
                return Err(BuildError::AlreadyImplemented(func.index));
            }
        };
        let (ty, locals, body) = self.run_body(func.ty.result, f)?;
        if self.types[declared_type_index as usize] != ty {
            return Err(BuildError::SignatureMismatch);
        }
        self.funcs[func.index as usize] = FuncEntry::Defined(FuncBody {
            type_index: declared_type_index,
            locals,
            body,
        });
        Ok(())
    }

    // ── Table and memory ─────────────────────────────────────────────────

    pub fn table(&mut self, min: u32, max: Option<u32>) -> Result<TableRef> {
        if self.table.is_some() {
            return Err(BuildError::MultipleTables);
        }
        self.table = Some(TableDecl::Local {
            limits: Limits { min, max },
        });
        Ok(TableRef { index: 0 })
    }

    pub fn import_table(
        &mut self,
        module: &str,
        field: &str,
        min: u32,
        max: Option<u32>,
    ) -> Result<TableRef> {
        if self.table.is_some() {
            return Err(BuildError::MultipleTables);
        }
        self.table = Some(TableDecl::Import {
            module: module.to_string(),
            field: field.to_string(),
            limits: Limits { min, max },
        });
        Ok(TableRef { index: 0 })
    }

    pub fn memory(&mut self, min: u32, max: Option<u32>) -> Result<MemoryRef> {
        if self.memory.is_some() {
            return Err(BuildError::MultipleMemories);
        }
        let limits = Limits { min, max };
        self.memory = Some(MemoryDecl::Local { limits });
        Ok(MemoryRef { limits })
    }

    pub fn import_memory(
        &mut self,
        module: &str,
        field: &str,
        min: u32,
        max: Option<u32>,
    ) -> Result<MemoryRef> {
        if self.memory.is_some() {
            return Err(BuildError::MultipleMemories);
        }
        let limits = Limits { min, max };
        self.memory = Some(MemoryDecl::Import {
            module: module.to_string(),
            field: field.to_string(),
            limits,
        });
        Ok(MemoryRef { limits })
    }

    // ── Globals ──────────────────────────────────────────────────────────

    /// Define a global; its type is taken from the initializer expression.
    pub fn global(&mut self, mutable: bool, init: Node) -> Result<GlobalRef> {
        let ty = init.result_type();
        if !ty.is_concrete() {
            return Err(BuildError::VoidGlobal);
        }
        let index = self.globals.len() as u32;
        self.globals.push(GlobalDecl::Local { ty, mutable, init });
        self.has_local_global = true;
        Ok(GlobalRef { index, ty, mutable })
    }

    pub fn import_global(
        &mut self,
        module: &str,
        field: &str,
        ty: ValueType,
        mutable: bool,
    ) -> Result<GlobalRef> {
        if self.has_local_global {
            return Err(BuildError::ImportAfterDefinition);
        }
        if !ty.is_concrete() {
            return Err(BuildError::VoidGlobal);
        }
        let index = self.globals.len() as u32;
        self.globals.push(GlobalDecl::Import {
            module: module.to_string(),
            field: field.to_string(),
            ty,
            mutable,
        });
        Ok(GlobalRef { index, ty, mutable })
    }

    // ── Exports ──────────────────────────────────────────────────────────

    fn insert_export(&mut self, name: &str, export: Export) -> Result<()> {
        if self.exports.contains_key(name) {
            return Err(BuildError::DuplicateExport(name.to_string()));
        }
        self.exports.insert(name.to_string(), export);
        Ok(())
    }

    pub fn export_func(&mut self, name: &str, func: &FuncRef) -> Result<()> {
        self.insert_export(name, Export::Func(func.index))
    }

    pub fn export_global(&mut self, name: &str, global: GlobalRef) -> Result<()> {
        self.insert_export(name, Export::Global(global.index))
    }

    pub fn export_memory(&mut self, name: &str) -> Result<()> {
        if self.memory.is_none() {
            return Err(BuildError::ExportTargetMissing("memory".to_string()));
        }
        self.insert_export(name, Export::Memory)
    }

    pub fn export_table(&mut self, name: &str) -> Result<()> {
        if self.table.is_none() {
            return Err(BuildError::ExportTargetMissing("table".to_string()));
        }
        self.insert_export(name, Export::Table)
    }

    // ── Start, segments ──────────────────────────────────────────────────

    /// Nominate the start function, run once at instantiation. Must take no
    /// parameters and return nothing, and may be declared only once.
    pub fn start(&mut self, func: &FuncRef) -> Result<()> {
        if self.start.is_some() {
            return Err(BuildError::DuplicateStart);
        }
        if !func.ty.params.is_empty() || func.ty.result != ValueType::Void {
            return Err(BuildError::StartSignature);
        }
        self.start = Some(func.index);
        Ok(())
    }

    /// Add an active data segment, copied into memory at instantiation at
    /// the i32 offset.
    pub fn active_data(&mut self, offset: Node, bytes: &[u8]) -> Result<()> {
        if self.memory.is_none() {
            return Err(BuildError::DataWithoutMemory);
        }
        let ty = offset.result_type();
        if ty != ValueType::I32 {
            return Err(BuildError::OffsetType(ty));
        }
        self.data.push(DataSegment {
            offset: Some(offset),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    /// Add a passive data segment; returns its index.
    pub fn passive_data(&mut self, bytes: &[u8]) -> Result<u32> {
        if self.memory.is_none() {
            return Err(BuildError::DataWithoutMemory);
        }
        let index = self.data.len() as u32;
        self.data.push(DataSegment {
            offset: None,
            bytes: bytes.to_vec(),
        });
        Ok(index)
    }

    /// Add an active element segment filling table slots with functions,
    /// starting at the i32 offset.
    pub fn elem(&mut self, _table: TableRef, offset: Node, funcs: &[FuncRef]) -> Result<()> {
        if self.table.is_none() {
            return Err(BuildError::ElementWithoutTable);
        }
        let ty = offset.result_type();
        if ty != ValueType::I32 {
            return Err(BuildError::OffsetType(ty));
        }
        self.elements.push(ElementSegment {
            offset,
            funcs: funcs.iter().map(|f| f.index).collect(),
        });
        Ok(())
    }

    // ── Freezing ─────────────────────────────────────────────────────────

    /// Freeze into an immutable [`Module`]. Fails if any forward
    /// declaration never received a body.
    pub fn build(self) -> Result<Module> {
        let mut funcs = Vec::with_capacity(self.funcs.len());
        for (index, entry) in self.funcs.into_iter().enumerate() {
            funcs.push(match entry {
                FuncEntry::Import {
                    module,
                    field,
                    type_index,
                } => FuncDecl::Import {
                    module,
                    field,
                    type_index,
                },
                FuncEntry::Defined(body) => FuncDecl::Local(body),
                FuncEntry::Pending { .. } => {
                    return Err(BuildError::UnimplementedFunction(index as u32));
                }
            });
        }
        Ok(Module {
            types: self.types,
            funcs,
            table: self.table,
            memory: self.memory,
            globals: self.globals,
            exports: self.exports,
            start: self.start,
            elements: self.elements,
            data: self.data,
        })
    }
}
