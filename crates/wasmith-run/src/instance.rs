//! Instantiation and the live instance.
//!
//! [`Instance::instantiate`] links a frozen module against a set of host
//! [`Imports`] and brings it to its initial state in module order: imports
//! are bound, global initializers run top to bottom, memory is allocated
//! and active data segments copied, the table is filled from element
//! segments, and finally the start function runs once.
//!
//! Exported functions can then be driven through two independent paths:
//! [`Instance::invoke`] executes the encoded instruction stream with an
//! operand-stack interpreter, while [`Instance::invoke_direct`] walks the
//! node tree. Both delegate numeric behavior to the same `apply_*`
//! functions, so results agree bit for bit.

use std::collections::HashMap;

use wasmith_module::{Export, FuncDecl, GlobalDecl, Module};
use wasmith_types::{FuncType, LoadOp, StoreOp, Value, ValueType};

use crate::error::{RunResult, Trap};

/// Bytes per linear-memory page.
pub const PAGE_SIZE: u32 = 65536;

/// Hard cap on addressable pages (the full 32-bit space).
const ABSOLUTE_MAX_PAGES: u32 = 65536;

/// Recursion limit across both execution paths. Both executors recurse on
/// the native stack, several frames per guest call, so the limit must trip
/// well before a default thread stack runs out.
pub(crate) const MAX_CALL_DEPTH: usize = 64;

/// A host-provided function. Receives the argument values and returns the
/// result, `None` for void.
pub type HostFunc = Box<dyn Fn(&[Value]) -> RunResult<Option<Value>>>;

/// One importable entity.
pub enum Extern {
    Func(HostFunc),
    Global(Value),
    /// Initial memory contents; extended with zeroes up to the imported
    /// minimum and rounded up to a whole page.
    Memory(Vec<u8>),
    Table,
}

/// The import namespace handed to [`Instance::instantiate`], keyed by
/// `(module, field)`.
#[derive(Default)]
pub struct Imports {
    entries: HashMap<(String, String), Extern>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn func<F>(mut self, module: &str, field: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> RunResult<Option<Value>> + 'static,
    {
        self.insert(module, field, Extern::Func(Box::new(f)));
        self
    }

    pub fn global(mut self, module: &str, field: &str, value: Value) -> Self {
        self.insert(module, field, Extern::Global(value));
        self
    }

    pub fn memory(mut self, module: &str, field: &str, bytes: Vec<u8>) -> Self {
        self.insert(module, field, Extern::Memory(bytes));
        self
    }

    pub fn table(mut self, module: &str, field: &str) -> Self {
        self.insert(module, field, Extern::Table);
        self
    }

    fn insert(&mut self, module: &str, field: &str, ext: Extern) {
        self.entries
            .insert((module.to_string(), field.to_string()), ext);
    }

    fn take(&mut self, module: &str, field: &str) -> RunResult<Extern> {
        self.entries
            .remove(&(module.to_string(), field.to_string()))
            .ok_or_else(|| Trap::MissingImport {
                module: module.to_string(),
                field: field.to_string(),
            })
    }
}

fn mismatch(module: &str, field: &str) -> Trap {
    Trap::ImportMismatch {
        module: module.to_string(),
        field: field.to_string(),
    }
}

/// Runtime representation of a static type; `Bool` lives in an i32.
pub(crate) fn repr(ty: ValueType) -> ValueType {
    match ty {
        ValueType::Bool => ValueType::I32,
        other => other,
    }
}

pub(crate) fn zero_value(ty: ValueType) -> RunResult<Value> {
    Value::zero(ty).ok_or_else(|| Trap::Internal("void slot has no value".into()))
}

/// One function activation: parameter and local slots.
pub(crate) struct Frame {
    pub locals: Vec<Value>,
}

impl Frame {
    pub(crate) fn empty() -> Self {
        Frame { locals: Vec::new() }
    }
}

/// The mutable half of an instance.
pub(crate) struct InstanceState {
    pub globals: Vec<Value>,
    pub memory: Vec<u8>,
    pub memory_max_pages: u32,
    pub table: Vec<Option<u32>>,
    pub depth: usize,
}

/// Borrowed execution context: the immutable module and code next to the
/// mutable state, so calls can recurse while instruction streams stay
/// borrowed.
pub(crate) struct Machine<'a, 'm> {
    pub module: &'m Module,
    pub bodies: &'a [Option<Vec<u8>>],
    pub hosts: &'a HashMap<u32, HostFunc>,
    pub state: &'a mut InstanceState,
}

impl<'a, 'm> Machine<'a, 'm> {
    pub(crate) fn enter_call(&mut self) -> RunResult<()> {
        self.state.depth += 1;
        if self.state.depth > MAX_CALL_DEPTH {
            self.state.depth -= 1;
            return Err(Trap::StackOverflow);
        }
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.state.depth -= 1;
    }

    // ── Memory ───────────────────────────────────────────────────────────

    fn mem_range(&self, addr: i32, width: u32) -> RunResult<usize> {
        let addr = addr as u32;
        let end = u64::from(addr) + u64::from(width);
        if end > self.state.memory.len() as u64 {
            return Err(Trap::MemoryOutOfBounds { addr, width });
        }
        Ok(addr as usize)
    }

    pub(crate) fn mem_load(&self, op: LoadOp, addr: i32) -> RunResult<Value> {
        let at = self.mem_range(addr, op.width())?;
        let mem = &self.state.memory;
        Ok(match op {
            LoadOp::I32 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&mem[at..at + 4]);
                Value::I32(i32::from_le_bytes(raw))
            }
            LoadOp::I64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&mem[at..at + 8]);
                Value::I64(i64::from_le_bytes(raw))
            }
            LoadOp::F64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&mem[at..at + 8]);
                Value::F64(f64::from_le_bytes(raw))
            }
            LoadOp::I32U8 => Value::I32(i32::from(mem[at])),
        })
    }

    pub(crate) fn mem_store(&mut self, op: StoreOp, addr: i32, value: Value) -> RunResult<()> {
        let at = self.mem_range(addr, op.width())?;
        let mem = &mut self.state.memory;
        match (op, value) {
            (StoreOp::I32, Value::I32(v)) => mem[at..at + 4].copy_from_slice(&v.to_le_bytes()),
            (StoreOp::I64, Value::I64(v)) => mem[at..at + 8].copy_from_slice(&v.to_le_bytes()),
            (StoreOp::F64, Value::F64(v)) => mem[at..at + 8].copy_from_slice(&v.to_le_bytes()),
            (StoreOp::I32U8, Value::I32(v)) => mem[at] = v as u8,
            _ => return Err(Trap::Internal("store operand kind mismatch".into())),
        }
        Ok(())
    }

    pub(crate) fn mem_size_pages(&self) -> i32 {
        (self.state.memory.len() as u32 / PAGE_SIZE) as i32
    }

    /// Grow memory by `delta` pages; returns the old size, or -1 when the
    /// request exceeds the declared maximum.
    pub(crate) fn mem_grow(&mut self, delta: i32) -> i32 {
        let old = self.mem_size_pages();
        if delta < 0 {
            return -1;
        }
        let Some(new) = (old as u32).checked_add(delta as u32) else {
            return -1;
        };
        if new > self.state.memory_max_pages {
            return -1;
        }
        self.state
            .memory
            .resize(new as usize * PAGE_SIZE as usize, 0);
        old
    }

    // ── Table ────────────────────────────────────────────────────────────

    /// Resolve a table slot to a function index, checking the target's
    /// signature structurally.
    pub(crate) fn table_target(&self, slot: i32, expected: &FuncType) -> RunResult<u32> {
        let entry = *self
            .state
            .table
            .get(slot as u32 as usize)
            .ok_or(Trap::TableOutOfBounds(slot))?;
        let func = entry.ok_or(Trap::UninitializedElement(slot))?;
        if self.module.func_type(func) != expected {
            return Err(Trap::IndirectSignatureMismatch);
        }
        Ok(func)
    }

    /// Call an imported host function.
    pub(crate) fn call_host(&mut self, index: u32, args: &[Value]) -> RunResult<Option<Value>> {
        let host = self
            .hosts
            .get(&index)
            .ok_or_else(|| Trap::Internal(format!("no host binding for import {index}")))?;
        host(args)
    }
}

// ── The instance ─────────────────────────────────────────────────────────────

/// A linked, initialized module ready for invocation. Borrows the frozen
/// module; all mutable state (globals, memory, table) lives here.
pub struct Instance<'m> {
    module: &'m Module,
    /// Encoded instruction stream per function index; `None` for imports.
    bodies: Vec<Option<Vec<u8>>>,
    hosts: HashMap<u32, HostFunc>,
    state: InstanceState,
}

impl<'m> Instance<'m> {
    /// Link `module` against `imports` and run initialization, including
    /// the start function.
    pub fn instantiate(module: &'m Module, mut imports: Imports) -> RunResult<Instance<'m>> {
        // Bind function imports.
        let mut hosts = HashMap::new();
        for (index, func) in module.funcs.iter().enumerate() {
            if let FuncDecl::Import {
                module: m, field, ..
            } = func
            {
                match imports.take(m, field)? {
                    Extern::Func(f) => {
                        hosts.insert(index as u32, f);
                    }
                    _ => return Err(mismatch(m, field)),
                }
            }
        }

        // Memory: imported contents or zeroed local allocation.
        let mut memory = Vec::new();
        let mut memory_max_pages = 0;
        if let Some(decl) = &module.memory {
            let limits = decl.limits();
            memory_max_pages = limits.max.unwrap_or(ABSOLUTE_MAX_PAGES);
            let min_bytes = limits.min as usize * PAGE_SIZE as usize;
            if let wasmith_module::MemoryDecl::Import {
                module: m, field, ..
            } = decl
            {
                match imports.take(m, field)? {
                    Extern::Memory(bytes) => memory = bytes,
                    _ => return Err(mismatch(m, field)),
                }
                let pages = (memory.len() as u32).div_ceil(PAGE_SIZE);
                memory.resize(pages as usize * PAGE_SIZE as usize, 0);
            }
            if memory.len() < min_bytes {
                memory.resize(min_bytes, 0);
            }
        }

        // Table: one funcref table, slots empty until elements fill them.
        let mut table = Vec::new();
        if let Some(decl) = &module.table {
            if let wasmith_module::TableDecl::Import {
                module: m, field, ..
            } = decl
            {
                match imports.take(m, field)? {
                    Extern::Table => {}
                    _ => return Err(mismatch(m, field)),
                }
            }
            table = vec![None; decl.limits().min as usize];
        }

        let mut state = InstanceState {
            globals: Vec::with_capacity(module.globals.len()),
            memory,
            memory_max_pages,
            table,
            depth: 0,
        };

        // Globals: imported values checked by representation, local
        // initializers evaluated in declaration order.
        {
            let mut machine = Machine {
                module,
                bodies: &[],
                hosts: &hosts,
                state: &mut state,
            };
            for global in &module.globals {
                let value = match global {
                    GlobalDecl::Import {
                        module: m,
                        field,
                        ty,
                        ..
                    } => match imports.take(m, field)? {
                        Extern::Global(v) if v.ty() == repr(*ty) => v,
                        _ => return Err(mismatch(m, field)),
                    },
                    GlobalDecl::Local { init, .. } => {
                        machine.eval_expr(&mut Frame::empty(), init)?
                    }
                };
                machine.state.globals.push(value);
            }

            // Active data segments, bounds-checked against the initial size.
            for segment in &module.data {
                let Some(offset) = &segment.offset else {
                    continue;
                };
                let at = match machine.eval_expr(&mut Frame::empty(), offset)? {
                    Value::I32(v) => v as u32 as usize,
                    _ => return Err(Trap::Internal("data offset is not i32".into())),
                };
                let end = at
                    .checked_add(segment.bytes.len())
                    .ok_or(Trap::DataOutOfBounds)?;
                if end > machine.state.memory.len() {
                    return Err(Trap::DataOutOfBounds);
                }
                machine.state.memory[at..end].copy_from_slice(&segment.bytes);
            }

            // Element segments.
            for segment in &module.elements {
                let at = match machine.eval_expr(&mut Frame::empty(), &segment.offset)? {
                    Value::I32(v) => v as u32 as usize,
                    _ => return Err(Trap::Internal("element offset is not i32".into())),
                };
                let end = at
                    .checked_add(segment.funcs.len())
                    .ok_or(Trap::ElementOutOfBounds)?;
                if end > machine.state.table.len() {
                    return Err(Trap::ElementOutOfBounds);
                }
                for (slot, &func) in segment.funcs.iter().enumerate() {
                    machine.state.table[at + slot] = Some(func);
                }
            }
        }

        // Encode every local body once; invocations execute these streams.
        let mut bodies = Vec::with_capacity(module.funcs.len());
        for func in &module.funcs {
            bodies.push(match func {
                FuncDecl::Import { .. } => None,
                FuncDecl::Local(body) => Some(
                    wasmith_encode::encode_instrs(module, &body.body)
                        .map_err(|e| Trap::Internal(e.to_string()))?,
                ),
            });
        }

        let mut instance = Instance {
            module,
            bodies,
            hosts,
            state,
        };

        // Start runs once, after all other initialization.
        if let Some(start) = module.start {
            instance.machine().call_function(start, Vec::new())?;
        }
        Ok(instance)
    }

    fn machine(&mut self) -> Machine<'_, 'm> {
        Machine {
            module: self.module,
            bodies: &self.bodies,
            hosts: &self.hosts,
            state: &mut self.state,
        }
    }

    fn resolve_func(&self, name: &str) -> RunResult<u32> {
        match self.module.export(name) {
            Some(Export::Func(index)) => Ok(index),
            Some(_) => Err(Trap::NotCallable(name.to_string())),
            None => Err(Trap::UnknownExport(name.to_string())),
        }
    }

    fn check_args(&self, index: u32, args: &[Value]) -> RunResult<()> {
        let ty = self.module.func_type(index);
        if args.len() != ty.params.len() {
            return Err(Trap::ArgCount {
                expected: ty.params.len(),
                found: args.len(),
            });
        }
        for (i, (arg, &param)) in args.iter().zip(ty.params.iter()).enumerate() {
            if arg.ty() != repr(param) {
                return Err(Trap::ArgType { index: i });
            }
        }
        Ok(())
    }

    /// Call an exported function through the bytecode interpreter.
    pub fn invoke(&mut self, name: &str, args: Vec<Value>) -> RunResult<Option<Value>> {
        let index = self.resolve_func(name)?;
        self.check_args(index, &args)?;
        self.machine().call_function(index, args)
    }

    /// Call an exported function by walking the node tree. Semantically
    /// identical to [`invoke`]; exists so the two paths can check each
    /// other.
    ///
    /// [`invoke`]: Instance::invoke
    pub fn invoke_direct(&mut self, name: &str, args: Vec<Value>) -> RunResult<Option<Value>> {
        let index = self.resolve_func(name)?;
        self.check_args(index, &args)?;
        self.machine().call_direct(index, args)
    }

    /// Read an exported global.
    pub fn global_value(&self, name: &str) -> RunResult<Value> {
        match self.module.export(name) {
            Some(Export::Global(index)) => Ok(self.state.globals[index as usize]),
            Some(_) => Err(Trap::NotAGlobal(name.to_string())),
            None => Err(Trap::UnknownExport(name.to_string())),
        }
    }

    /// Linear memory contents.
    pub fn memory(&self) -> &[u8] {
        &self.state.memory
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }
}
