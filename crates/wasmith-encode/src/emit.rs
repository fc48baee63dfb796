//! Section assembly and instruction lowering.
//!
//! Sections are emitted in the fixed id order 1, 2, 3, 4, 5, 6, 7, 12, 10,
//! 11 with empty sections omitted entirely, so the byte layout of a given
//! module is canonical. Start and element declarations are instantiation
//! concerns and have no section here.
//!
//! Lowering notes for constructs without a direct opcode:
//! - integer `neg` becomes `const 0; operand; sub`
//! - integer `not` becomes `operand; const -1; xor`; boolean `not` is `eqz`
//! - identity conversions emit nothing
//! - a counted loop becomes a `block`/`loop` pair with the exit test at the
//!   top, re-evaluating the bound every iteration

use wasmith_module::{Export, FuncBody, FuncDecl, GlobalDecl, Limits, MemoryDecl, Module, TableDecl};
use wasmith_types::{BinaryOp, LoadOp, Node, RelOp, StoreOp, UnaryOp, ValueType};

use crate::opcode::*;
use crate::writer::ByteWriter;
use crate::{EncodeError, EncodeResult};

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Encode a frozen module into WebAssembly binary bytes.
///
/// The output is validated with `wasmparser` before being returned; a
/// failure there means the emitted bytes are wrong, not the module.
pub fn encode_module(module: &Module) -> EncodeResult<Vec<u8>> {
    let mut out = ByteWriter::new();
    out.bytes(&MAGIC);
    out.bytes(&VERSION);

    emit_type_section(&mut out, module);
    emit_import_section(&mut out, module);
    emit_function_section(&mut out, module);
    emit_table_section(&mut out, module);
    emit_memory_section(&mut out, module);
    emit_global_section(&mut out, module)?;
    emit_export_section(&mut out, module);
    emit_data_count_section(&mut out, module);
    emit_code_section(&mut out, module)?;
    emit_data_section(&mut out, module)?;

    let bytes = out.into_bytes();
    wasmparser::validate(&bytes)
        .map_err(|e| EncodeError::ValidationFailed(e.to_string()))?;
    Ok(bytes)
}

/// Encode a statement sequence as a raw instruction stream, with nested
/// constructs delimited by `end` but no top-level terminator. The runtime
/// executes this form directly.
pub fn encode_instrs(module: &Module, stmts: &[Node]) -> EncodeResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    for stmt in stmts {
        encode_node(&mut w, module, stmt)?;
    }
    Ok(w.into_bytes())
}

// ══════════════════════════════════════════════════════════════════════════════
// Sections
// ══════════════════════════════════════════════════════════════════════════════

/// Append a section body under its id with a size prefix.
fn section(out: &mut ByteWriter, id: u8, body: ByteWriter) {
    out.byte(id);
    out.u32(body.len() as u32);
    out.bytes(body.as_slice());
}

fn valtype_tag(ty: ValueType) -> u8 {
    match ty {
        ValueType::I32 | ValueType::Bool => TYPE_I32,
        ValueType::I64 => TYPE_I64,
        ValueType::F64 => TYPE_F64,
        // Void slots are rejected by every builder entry point.
        ValueType::Void => unreachable!("void has no value representation"),
    }
}

fn write_limits(w: &mut ByteWriter, limits: Limits) {
    match limits.max {
        Some(max) => {
            w.byte(0x01);
            w.u32(limits.min);
            w.u32(max);
        }
        None => {
            w.byte(0x00);
            w.u32(limits.min);
        }
    }
}

fn emit_type_section(out: &mut ByteWriter, module: &Module) {
    if module.types.is_empty() {
        return;
    }
    let mut w = ByteWriter::new();
    w.u32(module.types.len() as u32);
    for ty in &module.types {
        w.byte(TYPE_FUNC);
        w.u32(ty.params.len() as u32);
        for &p in &ty.params {
            w.byte(valtype_tag(p));
        }
        if ty.result == ValueType::Void {
            w.u32(0);
        } else {
            w.u32(1);
            w.byte(valtype_tag(ty.result));
        }
    }
    section(out, SEC_TYPE, w);
}

fn emit_import_section(out: &mut ByteWriter, module: &Module) {
    let mut w = ByteWriter::new();
    let mut count = 0u32;

    for func in &module.funcs {
        if let FuncDecl::Import {
            module: m,
            field,
            type_index,
        } = func
        {
            w.name(m);
            w.name(field);
            w.byte(KIND_FUNC);
            w.u32(*type_index);
            count += 1;
        }
    }
    if let Some(TableDecl::Import {
        module: m,
        field,
        limits,
    }) = &module.table
    {
        w.name(m);
        w.name(field);
        w.byte(KIND_TABLE);
        w.byte(TYPE_FUNCREF);
        write_limits(&mut w, *limits);
        count += 1;
    }
    if let Some(MemoryDecl::Import {
        module: m,
        field,
        limits,
    }) = &module.memory
    {
        w.name(m);
        w.name(field);
        w.byte(KIND_MEMORY);
        write_limits(&mut w, *limits);
        count += 1;
    }
    for global in &module.globals {
        if let GlobalDecl::Import {
            module: m,
            field,
            ty,
            mutable,
        } = global
        {
            w.name(m);
            w.name(field);
            w.byte(KIND_GLOBAL);
            w.byte(valtype_tag(*ty));
            w.byte(u8::from(*mutable));
            count += 1;
        }
    }

    if count == 0 {
        return;
    }
    let mut body = ByteWriter::new();
    body.u32(count);
    body.bytes(w.as_slice());
    section(out, SEC_IMPORT, body);
}

fn emit_function_section(out: &mut ByteWriter, module: &Module) {
    let local_count = module.local_funcs().count();
    if local_count == 0 {
        return;
    }
    let mut w = ByteWriter::new();
    w.u32(local_count as u32);
    for (_, body) in module.local_funcs() {
        w.u32(body.type_index);
    }
    section(out, SEC_FUNCTION, w);
}

fn emit_table_section(out: &mut ByteWriter, module: &Module) {
    if let Some(TableDecl::Local { limits }) = &module.table {
        let mut w = ByteWriter::new();
        w.u32(1);
        w.byte(TYPE_FUNCREF);
        write_limits(&mut w, *limits);
        section(out, SEC_TABLE, w);
    }
}

fn emit_memory_section(out: &mut ByteWriter, module: &Module) {
    if let Some(MemoryDecl::Local { limits }) = &module.memory {
        let mut w = ByteWriter::new();
        w.u32(1);
        write_limits(&mut w, *limits);
        section(out, SEC_MEMORY, w);
    }
}

fn emit_global_section(out: &mut ByteWriter, module: &Module) -> EncodeResult<()> {
    let locals: Vec<_> = module
        .globals
        .iter()
        .filter_map(|g| match g {
            GlobalDecl::Local { ty, mutable, init } => Some((*ty, *mutable, init)),
            GlobalDecl::Import { .. } => None,
        })
        .collect();
    if locals.is_empty() {
        return Ok(());
    }
    let mut w = ByteWriter::new();
    w.u32(locals.len() as u32);
    for (ty, mutable, init) in locals {
        w.byte(valtype_tag(ty));
        w.byte(u8::from(mutable));
        encode_node(&mut w, module, init)?;
        w.byte(OP_END);
    }
    section(out, SEC_GLOBAL, w);
    Ok(())
}

fn emit_export_section(out: &mut ByteWriter, module: &Module) {
    if module.exports.is_empty() {
        return;
    }
    let mut w = ByteWriter::new();
    w.u32(module.exports.len() as u32);
    // BTreeMap iteration is name-ordered, keeping the layout canonical.
    for (name, export) in &module.exports {
        w.name(name);
        match export {
            Export::Func(index) => {
                w.byte(KIND_FUNC);
                w.u32(*index);
            }
            Export::Table => {
                w.byte(KIND_TABLE);
                w.u32(0);
            }
            Export::Memory => {
                w.byte(KIND_MEMORY);
                w.u32(0);
            }
            Export::Global(index) => {
                w.byte(KIND_GLOBAL);
                w.u32(*index);
            }
        }
    }
    section(out, SEC_EXPORT, w);
}

fn emit_data_count_section(out: &mut ByteWriter, module: &Module) {
    if module.data.is_empty() {
        return;
    }
    let mut w = ByteWriter::new();
    w.u32(module.data.len() as u32);
    section(out, SEC_DATA_COUNT, w);
}

fn emit_code_section(out: &mut ByteWriter, module: &Module) -> EncodeResult<()> {
    let local_count = module.local_funcs().count();
    if local_count == 0 {
        return Ok(());
    }
    let mut w = ByteWriter::new();
    w.u32(local_count as u32);
    for (index, body) in module.local_funcs() {
        let result = module.func_type(index).result;
        let encoded = encode_func_body(module, body, result)?;
        w.u32(encoded.len() as u32);
        w.bytes(&encoded);
    }
    section(out, SEC_CODE, w);
    Ok(())
}

fn encode_func_body(
    module: &Module,
    body: &FuncBody,
    result: ValueType,
) -> EncodeResult<Vec<u8>> {
    let mut w = ByteWriter::new();

    // Locals as (count, type) runs.
    let mut groups: Vec<(u32, u8)> = Vec::new();
    for &local in &body.locals {
        let tag = valtype_tag(local);
        match groups.last_mut() {
            Some((count, t)) if *t == tag => *count += 1,
            _ => groups.push((1, tag)),
        }
    }
    w.u32(groups.len() as u32);
    for (count, tag) in groups {
        w.u32(count);
        w.byte(tag);
    }

    for stmt in &body.body {
        encode_node(&mut w, module, stmt)?;
    }
    // Statements are all void; a non-void function produces its result only
    // through `return`, so the fall-through path must be marked dead for the
    // type checker.
    if result != ValueType::Void {
        w.byte(OP_UNREACHABLE);
    }
    w.byte(OP_END);
    Ok(w.into_bytes())
}

fn emit_data_section(out: &mut ByteWriter, module: &Module) -> EncodeResult<()> {
    if module.data.is_empty() {
        return Ok(());
    }
    let mut w = ByteWriter::new();
    w.u32(module.data.len() as u32);
    for segment in &module.data {
        match &segment.offset {
            Some(offset) => {
                w.u32(0);
                encode_node(&mut w, module, offset)?;
                w.byte(OP_END);
            }
            None => w.u32(1),
        }
        w.u32(segment.bytes.len() as u32);
        w.bytes(&segment.bytes);
    }
    section(out, SEC_DATA, w);
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Instructions
// ══════════════════════════════════════════════════════════════════════════════

fn internal(msg: impl Into<String>) -> EncodeError {
    EncodeError::Internal(msg.into())
}

fn binary_opcode(op: BinaryOp, ty: ValueType) -> EncodeResult<u8> {
    use BinaryOp::*;
    let code = match ty {
        ValueType::I32 | ValueType::Bool => match op {
            Add => OP_I32_ADD,
            Sub => OP_I32_SUB,
            Mul => OP_I32_MUL,
            DivS => OP_I32_DIV_S,
            DivU => OP_I32_DIV_U,
            RemS => OP_I32_REM_S,
            RemU => OP_I32_REM_U,
            And => OP_I32_AND,
            Or => OP_I32_OR,
            Xor => OP_I32_XOR,
            Shl => OP_I32_SHL,
            ShrS => OP_I32_SHR_S,
            ShrU => OP_I32_SHR_U,
            Rotl => OP_I32_ROTL,
            Rotr => OP_I32_ROTR,
            Min | Max | Copysign => {
                return Err(internal(format!("{} on integer operands", op.symbol())))
            }
        },
        ValueType::I64 => match op {
            Add => OP_I64_ADD,
            Sub => OP_I64_SUB,
            Mul => OP_I64_MUL,
            DivS => OP_I64_DIV_S,
            DivU => OP_I64_DIV_U,
            RemS => OP_I64_REM_S,
            RemU => OP_I64_REM_U,
            And => OP_I64_AND,
            Or => OP_I64_OR,
            Xor => OP_I64_XOR,
            Shl => OP_I64_SHL,
            ShrS => OP_I64_SHR_S,
            ShrU => OP_I64_SHR_U,
            Rotl => OP_I64_ROTL,
            Rotr => OP_I64_ROTR,
            Min | Max | Copysign => {
                return Err(internal(format!("{} on integer operands", op.symbol())))
            }
        },
        ValueType::F64 => match op {
            Add => OP_F64_ADD,
            Sub => OP_F64_SUB,
            Mul => OP_F64_MUL,
            DivS => OP_F64_DIV,
            Min => OP_F64_MIN,
            Max => OP_F64_MAX,
            Copysign => OP_F64_COPYSIGN,
            _ => return Err(internal(format!("{} on float operands", op.symbol()))),
        },
        ValueType::Void => return Err(internal("binary operator on void")),
    };
    Ok(code)
}

fn rel_opcode(op: RelOp, ty: ValueType) -> EncodeResult<u8> {
    use RelOp::*;
    let code = match ty {
        ValueType::I32 | ValueType::Bool => match op {
            Eq => OP_I32_EQ,
            Ne => OP_I32_NE,
            Lt => OP_I32_LT_S,
            Gt => OP_I32_GT_S,
            Le => OP_I32_LE_S,
            Ge => OP_I32_GE_S,
        },
        ValueType::I64 => match op {
            Eq => OP_I64_EQ,
            Ne => OP_I64_NE,
            Lt => OP_I64_LT_S,
            Gt => OP_I64_GT_S,
            Le => OP_I64_LE_S,
            Ge => OP_I64_GE_S,
        },
        ValueType::F64 => match op {
            Eq => OP_F64_EQ,
            Ne => OP_F64_NE,
            Lt => OP_F64_LT,
            Gt => OP_F64_GT,
            Le => OP_F64_LE,
            Ge => OP_F64_GE,
        },
        ValueType::Void => return Err(internal("comparison on void")),
    };
    Ok(code)
}

fn load_opcode(op: LoadOp) -> (u8, u32) {
    match op {
        LoadOp::I32 => (OP_I32_LOAD, 2),
        LoadOp::I64 => (OP_I64_LOAD, 3),
        LoadOp::F64 => (OP_F64_LOAD, 3),
        LoadOp::I32U8 => (OP_I32_LOAD8_U, 0),
    }
}

fn store_opcode(op: StoreOp) -> (u8, u32) {
    match op {
        StoreOp::I32 => (OP_I32_STORE, 2),
        StoreOp::I64 => (OP_I64_STORE, 3),
        StoreOp::F64 => (OP_F64_STORE, 3),
        StoreOp::I32U8 => (OP_I32_STORE8, 0),
    }
}

fn encode_unary(
    w: &mut ByteWriter,
    module: &Module,
    op: UnaryOp,
    operand: &Node,
) -> EncodeResult<()> {
    use UnaryOp::*;
    let ty = operand.result_type();
    match (op, ty) {
        // No dedicated integer negate opcode.
        (Neg, ValueType::I32) => {
            w.byte(OP_I32_CONST);
            w.s32(0);
            encode_node(w, module, operand)?;
            w.byte(OP_I32_SUB);
        }
        (Neg, ValueType::I64) => {
            w.byte(OP_I64_CONST);
            w.s64(0);
            encode_node(w, module, operand)?;
            w.byte(OP_I64_SUB);
        }
        (Neg, ValueType::F64) => {
            encode_node(w, module, operand)?;
            w.byte(OP_F64_NEG);
        }
        (Not, ValueType::Bool) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I32_EQZ);
        }
        (Not, ValueType::I32) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I32_CONST);
            w.s32(-1);
            w.byte(OP_I32_XOR);
        }
        (Not, ValueType::I64) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I64_CONST);
            w.s64(-1);
            w.byte(OP_I64_XOR);
        }
        // Identity conversions vanish; bool is already an i32.
        (ToI32, ValueType::I32 | ValueType::Bool)
        | (ToI64, ValueType::I64)
        | (ToF64, ValueType::F64) => {
            encode_node(w, module, operand)?;
        }
        (ToI32, ValueType::I64) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I32_WRAP_I64);
        }
        (ToI32, ValueType::F64) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I32_TRUNC_F64_S);
        }
        (ToI64, ValueType::I32 | ValueType::Bool) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I64_EXTEND_I32_S);
        }
        (ToI64, ValueType::F64) => {
            encode_node(w, module, operand)?;
            w.byte(OP_I64_TRUNC_F64_S);
        }
        (ToF64, ValueType::I32 | ValueType::Bool) => {
            encode_node(w, module, operand)?;
            w.byte(OP_F64_CONVERT_I32_S);
        }
        (ToF64, ValueType::I64) => {
            encode_node(w, module, operand)?;
            w.byte(OP_F64_CONVERT_I64_S);
        }
        (Abs | Ceil | Floor | Trunc | Nearest | Sqrt, ValueType::F64) => {
            encode_node(w, module, operand)?;
            w.byte(match op {
                Abs => OP_F64_ABS,
                Ceil => OP_F64_CEIL,
                Floor => OP_F64_FLOOR,
                Trunc => OP_F64_TRUNC,
                Nearest => OP_F64_NEAREST,
                Sqrt => OP_F64_SQRT,
                _ => unreachable!(),
            });
        }
        (Clz | Ctz | Popcnt, ValueType::I32) => {
            encode_node(w, module, operand)?;
            w.byte(match op {
                Clz => OP_I32_CLZ,
                Ctz => OP_I32_CTZ,
                Popcnt => OP_I32_POPCNT,
                _ => unreachable!(),
            });
        }
        (Clz | Ctz | Popcnt, ValueType::I64) => {
            encode_node(w, module, operand)?;
            w.byte(match op {
                Clz => OP_I64_CLZ,
                Ctz => OP_I64_CTZ,
                Popcnt => OP_I64_POPCNT,
                _ => unreachable!(),
            });
        }
        _ => {
            return Err(internal(format!("{} on {} operand", op.symbol(), ty)));
        }
    }
    Ok(())
}

fn encode_node(w: &mut ByteWriter, module: &Module, node: &Node) -> EncodeResult<()> {
    match node {
        Node::ConstI32(v) => {
            w.byte(OP_I32_CONST);
            w.s32(*v);
        }
        Node::ConstI64(v) => {
            w.byte(OP_I64_CONST);
            w.s64(*v);
        }
        Node::ConstF64(v) => {
            w.byte(OP_F64_CONST);
            w.f64(*v);
        }
        Node::ConstBool(v) => {
            w.byte(OP_I32_CONST);
            w.s32(i32::from(*v));
        }
        Node::Binary { op, lhs, rhs } => {
            encode_node(w, module, lhs)?;
            encode_node(w, module, rhs)?;
            w.byte(binary_opcode(*op, lhs.result_type())?);
        }
        Node::Unary { op, operand } => encode_unary(w, module, *op, operand)?,
        Node::Relational { op, lhs, rhs } => {
            encode_node(w, module, lhs)?;
            encode_node(w, module, rhs)?;
            w.byte(rel_opcode(*op, lhs.result_type())?);
        }
        Node::LocalGet(local) => {
            w.byte(OP_LOCAL_GET);
            w.u32(local.index);
        }
        Node::LocalSet { local, value } => {
            encode_node(w, module, value)?;
            w.byte(OP_LOCAL_SET);
            w.u32(local.index);
        }
        Node::GlobalGet(global) => {
            w.byte(OP_GLOBAL_GET);
            w.u32(global.index);
        }
        Node::GlobalSet { global, value } => {
            encode_node(w, module, value)?;
            w.byte(OP_GLOBAL_SET);
            w.u32(global.index);
        }
        Node::Call { func, args } => {
            for arg in args {
                encode_node(w, module, arg)?;
            }
            w.byte(OP_CALL);
            w.u32(func.index);
        }
        Node::CallIndirect {
            ty, index, args, ..
        } => {
            for arg in args {
                encode_node(w, module, arg)?;
            }
            encode_node(w, module, index)?;
            let type_index = module
                .type_index_of(ty)
                .ok_or_else(|| internal(format!("signature {ty} was never interned")))?;
            w.byte(OP_CALL_INDIRECT);
            w.u32(type_index);
            w.byte(0x00);
        }
        Node::Block(stmts) => {
            w.byte(OP_BLOCK);
            w.byte(BLOCKTYPE_VOID);
            for stmt in stmts {
                encode_node(w, module, stmt)?;
            }
            w.byte(OP_END);
        }
        Node::If {
            condition,
            then_branch,
            else_branch,
        } => {
            encode_node(w, module, condition)?;
            w.byte(OP_IF);
            w.byte(BLOCKTYPE_VOID);
            for stmt in then_branch {
                encode_node(w, module, stmt)?;
            }
            if !else_branch.is_empty() {
                w.byte(OP_ELSE);
                for stmt in else_branch {
                    encode_node(w, module, stmt)?;
                }
            }
            w.byte(OP_END);
        }
        Node::For {
            counter,
            start,
            end,
            body,
        } => {
            encode_node(w, module, start)?;
            w.byte(OP_LOCAL_SET);
            w.u32(counter.index);
            w.byte(OP_BLOCK);
            w.byte(BLOCKTYPE_VOID);
            w.byte(OP_LOOP);
            w.byte(BLOCKTYPE_VOID);
            // Exit test at the top; the bound is re-evaluated each pass.
            w.byte(OP_LOCAL_GET);
            w.u32(counter.index);
            encode_node(w, module, end)?;
            w.byte(OP_I32_GE_S);
            w.byte(OP_BR_IF);
            w.u32(1);
            for stmt in body {
                encode_node(w, module, stmt)?;
            }
            w.byte(OP_LOCAL_GET);
            w.u32(counter.index);
            w.byte(OP_I32_CONST);
            w.s32(1);
            w.byte(OP_I32_ADD);
            w.byte(OP_LOCAL_SET);
            w.u32(counter.index);
            w.byte(OP_BR);
            w.u32(0);
            w.byte(OP_END);
            w.byte(OP_END);
        }
        Node::Return(value) => {
            if let Some(value) = value {
                encode_node(w, module, value)?;
            }
            w.byte(OP_RETURN);
        }
        Node::Drop(value) => {
            encode_node(w, module, value)?;
            w.byte(OP_DROP);
        }
        Node::Load { op, addr } => {
            encode_node(w, module, addr)?;
            let (code, align) = load_opcode(*op);
            w.byte(code);
            w.u32(align);
            w.u32(0);
        }
        Node::Store { op, addr, value } => {
            encode_node(w, module, addr)?;
            encode_node(w, module, value)?;
            let (code, align) = store_opcode(*op);
            w.byte(code);
            w.u32(align);
            w.u32(0);
        }
        Node::MemorySize => {
            w.byte(OP_MEMORY_SIZE);
            w.byte(0x00);
        }
        Node::MemoryGrow(delta) => {
            encode_node(w, module, delta)?;
            w.byte(OP_MEMORY_GROW);
            w.byte(0x00);
        }
    }
    Ok(())
}
