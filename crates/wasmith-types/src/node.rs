//! The immutable typed expression/statement tree.
//!
//! A [`Node`] is a closed sum over every operator, control construct, and
//! accessor the library can express, so encoder and interpreter dispatch
//! stay exhaustive. All construction goes through checked constructors that
//! validate operand types against the operator legality tables; a bad tree
//! is unrepresentable rather than detected later.
//!
//! Slot references ([`LocalRef`], [`GlobalRef`], [`FuncRef`], [`TableRef`])
//! carry a validated index plus the static type and are minted by the module
//! builder, never from raw integers, so out-of-range and forward references
//! cannot be constructed.

use crate::error::BuildError;
use crate::op::{BinaryOp, RelOp, UnaryOp};
use crate::ty::{FuncType, ValueType};
use std::fmt;

// ── Slot references ──────────────────────────────────────────────────────────

/// A parameter or local variable slot within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRef {
    pub index: u32,
    pub ty: ValueType,
}

/// A global slot, imported or locally defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRef {
    pub index: u32,
    pub ty: ValueType,
    pub mutable: bool,
}

/// A function, imported, forward-declared, or defined.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncRef {
    pub index: u32,
    pub ty: FuncType,
}

/// A table (the module may have at most one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef {
    pub index: u32,
}

// ── Memory access shapes ─────────────────────────────────────────────────────

/// Load flavors. `I32U8` is the unsigned 8-bit load widened to i32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    I32,
    I64,
    F64,
    I32U8,
}

impl LoadOp {
    pub fn result_type(self) -> ValueType {
        match self {
            Self::I32 | Self::I32U8 => ValueType::I32,
            Self::I64 => ValueType::I64,
            Self::F64 => ValueType::F64,
        }
    }

    /// Access width in bytes.
    pub fn width(self) -> u32 {
        match self {
            Self::I32U8 => 1,
            Self::I32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }
}

impl fmt::Display for LoadOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32.load"),
            Self::I64 => write!(f, "i64.load"),
            Self::F64 => write!(f, "f64.load"),
            Self::I32U8 => write!(f, "i32.load8_u"),
        }
    }
}

/// Store flavors. `I32U8` truncates an i32 to its low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    I32,
    I64,
    F64,
    I32U8,
}

impl StoreOp {
    pub fn value_type(self) -> ValueType {
        match self {
            Self::I32 | Self::I32U8 => ValueType::I32,
            Self::I64 => ValueType::I64,
            Self::F64 => ValueType::F64,
        }
    }

    pub fn width(self) -> u32 {
        match self {
            Self::I32U8 => 1,
            Self::I32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32.store"),
            Self::I64 => write!(f, "i64.store"),
            Self::F64 => write!(f, "f64.store"),
            Self::I32U8 => write!(f, "i32.store8"),
        }
    }
}

// ── The tree ─────────────────────────────────────────────────────────────────

/// One immutable element of the program tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    ConstI32(i32),
    ConstI64(i64),
    ConstF64(f64),
    ConstBool(bool),
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Relational {
        op: RelOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    LocalGet(LocalRef),
    LocalSet {
        local: LocalRef,
        value: Box<Node>,
    },
    GlobalGet(GlobalRef),
    GlobalSet {
        global: GlobalRef,
        value: Box<Node>,
    },
    Call {
        func: FuncRef,
        args: Vec<Node>,
    },
    CallIndirect {
        table: TableRef,
        ty: FuncType,
        index: Box<Node>,
        args: Vec<Node>,
    },
    Block(Vec<Node>),
    If {
        condition: Box<Node>,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    /// Counted loop: runs `counter` from `start` while `counter < end`,
    /// re-evaluating the bound each iteration, stepping by one.
    For {
        counter: LocalRef,
        start: Box<Node>,
        end: Box<Node>,
        body: Vec<Node>,
    },
    Return(Option<Box<Node>>),
    Drop(Box<Node>),
    Load {
        op: LoadOp,
        addr: Box<Node>,
    },
    Store {
        op: StoreOp,
        addr: Box<Node>,
        value: Box<Node>,
    },
    MemorySize,
    MemoryGrow(Box<Node>),
}

impl Node {
    // ── Constants ────────────────────────────────────────────────────────

    pub fn i32(v: i32) -> Node {
        Node::ConstI32(v)
    }

    pub fn i64(v: i64) -> Node {
        Node::ConstI64(v)
    }

    pub fn f64(v: f64) -> Node {
        Node::ConstF64(v)
    }

    pub fn bool(v: bool) -> Node {
        Node::ConstBool(v)
    }

    // ── Checked constructors ─────────────────────────────────────────────

    /// Construct a binary operator node. Both operands must share one type,
    /// and the operator must support it.
    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Result<Node, BuildError> {
        let (lt, rt) = (lhs.result_type(), rhs.result_type());
        if lt != rt {
            return Err(BuildError::OperandMismatch { left: lt, right: rt });
        }
        if !lt.supports_binary(op) {
            return Err(BuildError::UnsupportedOperator {
                op: op.symbol().to_string(),
                ty: lt,
            });
        }
        Ok(Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Result<Node, BuildError> {
        let ty = operand.result_type();
        if !ty.supports_unary(op) {
            return Err(BuildError::UnsupportedOperator {
                op: op.symbol().to_string(),
                ty,
            });
        }
        Ok(Node::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn relational(op: RelOp, lhs: Node, rhs: Node) -> Result<Node, BuildError> {
        let (lt, rt) = (lhs.result_type(), rhs.result_type());
        if lt != rt {
            return Err(BuildError::OperandMismatch { left: lt, right: rt });
        }
        if !lt.supports_relational(op) {
            return Err(BuildError::UnsupportedOperator {
                op: op.symbol().to_string(),
                ty: lt,
            });
        }
        Ok(Node::Relational {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Direct call. Arity and per-argument types are checked against the
    /// callee signature here, not at invocation time.
    pub fn call(func: &FuncRef, args: Vec<Node>) -> Result<Node, BuildError> {
        check_args(&func.ty, &args)?;
        Ok(Node::Call {
            func: func.clone(),
            args,
        })
    }

    /// Indirect call through a table slot selected by an i32 index.
    pub fn call_indirect(
        table: TableRef,
        ty: FuncType,
        index: Node,
        args: Vec<Node>,
    ) -> Result<Node, BuildError> {
        if index.result_type() != ValueType::I32 {
            return Err(BuildError::AddressType(index.result_type()));
        }
        check_args(&ty, &args)?;
        Ok(Node::CallIndirect {
            table,
            ty,
            index: Box::new(index),
            args,
        })
    }

    /// A statement sequence. Every statement must be void-typed.
    pub fn block(stmts: Vec<Node>) -> Result<Node, BuildError> {
        check_stmts(&stmts)?;
        Ok(Node::Block(stmts))
    }

    pub fn if_stmt(condition: Node, then_branch: Vec<Node>) -> Result<Node, BuildError> {
        Self::if_else(condition, then_branch, Vec::new())
    }

    pub fn if_else(
        condition: Node,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    ) -> Result<Node, BuildError> {
        if condition.result_type() != ValueType::Bool {
            return Err(BuildError::ConditionNotBool(condition.result_type()));
        }
        check_stmts(&then_branch)?;
        check_stmts(&else_branch)?;
        Ok(Node::If {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        })
    }

    pub fn for_range(
        counter: LocalRef,
        start: Node,
        end: Node,
        body: Vec<Node>,
    ) -> Result<Node, BuildError> {
        if counter.ty != ValueType::I32
            || start.result_type() != ValueType::I32
            || end.result_type() != ValueType::I32
        {
            return Err(BuildError::LoopTypeMismatch);
        }
        check_stmts(&body)?;
        Ok(Node::For {
            counter,
            start: Box::new(start),
            end: Box::new(end),
            body,
        })
    }

    /// Early return. The value type is checked against the function result
    /// by the function builder that accepts this statement.
    pub fn return_(value: Option<Node>) -> Node {
        Node::Return(value.map(Box::new))
    }

    pub fn drop(value: Node) -> Result<Node, BuildError> {
        if value.result_type() == ValueType::Void {
            return Err(BuildError::DropVoid);
        }
        Ok(Node::Drop(Box::new(value)))
    }

    pub fn local_get(local: LocalRef) -> Node {
        Node::LocalGet(local)
    }

    pub fn local_set(local: LocalRef, value: Node) -> Result<Node, BuildError> {
        if value.result_type() != local.ty {
            return Err(BuildError::SlotTypeMismatch {
                expected: local.ty,
                found: value.result_type(),
            });
        }
        Ok(Node::LocalSet {
            local,
            value: Box::new(value),
        })
    }

    pub fn global_get(global: GlobalRef) -> Node {
        Node::GlobalGet(global)
    }

    pub fn global_set(global: GlobalRef, value: Node) -> Result<Node, BuildError> {
        if !global.mutable {
            return Err(BuildError::ImmutableGlobal(global.index));
        }
        if value.result_type() != global.ty {
            return Err(BuildError::SlotTypeMismatch {
                expected: global.ty,
                found: value.result_type(),
            });
        }
        Ok(Node::GlobalSet {
            global,
            value: Box::new(value),
        })
    }

    pub fn load(op: LoadOp, addr: Node) -> Result<Node, BuildError> {
        if addr.result_type() != ValueType::I32 {
            return Err(BuildError::AddressType(addr.result_type()));
        }
        Ok(Node::Load {
            op,
            addr: Box::new(addr),
        })
    }

    pub fn store(op: StoreOp, addr: Node, value: Node) -> Result<Node, BuildError> {
        if addr.result_type() != ValueType::I32 {
            return Err(BuildError::AddressType(addr.result_type()));
        }
        if value.result_type() != op.value_type() {
            return Err(BuildError::SlotTypeMismatch {
                expected: op.value_type(),
                found: value.result_type(),
            });
        }
        Ok(Node::Store {
            op,
            addr: Box::new(addr),
            value: Box::new(value),
        })
    }

    /// Current memory size in 64 KiB pages.
    pub fn memory_size() -> Node {
        Node::MemorySize
    }

    /// Grow memory by `delta` pages; yields the old size, or -1 on failure.
    pub fn memory_grow(delta: Node) -> Result<Node, BuildError> {
        if delta.result_type() != ValueType::I32 {
            return Err(BuildError::AddressType(delta.result_type()));
        }
        Ok(Node::MemoryGrow(Box::new(delta)))
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// The type of value this node leaves behind (`Void` for statements).
    pub fn result_type(&self) -> ValueType {
        match self {
            Node::ConstI32(_) => ValueType::I32,
            Node::ConstI64(_) => ValueType::I64,
            Node::ConstF64(_) => ValueType::F64,
            Node::ConstBool(_) => ValueType::Bool,
            Node::Binary { lhs, .. } => lhs.result_type(),
            Node::Unary { op, operand } => op
                .deviant_result()
                .unwrap_or_else(|| operand.result_type()),
            Node::Relational { .. } => ValueType::Bool,
            Node::LocalGet(local) => local.ty,
            Node::GlobalGet(global) => global.ty,
            Node::Call { func, .. } => func.ty.result,
            Node::CallIndirect { ty, .. } => ty.result,
            Node::Load { op, .. } => op.result_type(),
            Node::MemorySize | Node::MemoryGrow(_) => ValueType::I32,
            Node::LocalSet { .. }
            | Node::GlobalSet { .. }
            | Node::Block(_)
            | Node::If { .. }
            | Node::For { .. }
            | Node::Return(_)
            | Node::Drop(_)
            | Node::Store { .. } => ValueType::Void,
        }
    }

    /// Ordered child nodes; empty for leaves.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::ConstI32(_)
            | Node::ConstI64(_)
            | Node::ConstF64(_)
            | Node::ConstBool(_)
            | Node::LocalGet(_)
            | Node::GlobalGet(_)
            | Node::MemorySize => Vec::new(),
            Node::Binary { lhs, rhs, .. } | Node::Relational { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            Node::Unary { operand, .. } => vec![operand],
            Node::LocalSet { value, .. } | Node::GlobalSet { value, .. } => vec![value],
            Node::Call { args, .. } => args.iter().collect(),
            Node::CallIndirect { index, args, .. } => {
                let mut out: Vec<&Node> = args.iter().collect();
                out.push(index);
                out
            }
            Node::Block(stmts) => stmts.iter().collect(),
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![condition.as_ref()];
                out.extend(then_branch.iter());
                out.extend(else_branch.iter());
                out
            }
            Node::For {
                start, end, body, ..
            } => {
                let mut out = vec![start.as_ref(), end.as_ref()];
                out.extend(body.iter());
                out
            }
            Node::Return(value) => value.iter().map(|v| v.as_ref()).collect(),
            Node::Drop(value) | Node::MemoryGrow(value) => vec![value],
            Node::Load { addr, .. } => vec![addr],
            Node::Store { addr, value, .. } => vec![addr, value],
        }
    }

    /// Rebuild this node with replacement children, re-running every
    /// construction check. Enables tree rewriting without field-copying.
    pub fn reconstruct(&self, new_children: Vec<Node>) -> Result<Node, BuildError> {
        let expected = self.children().len();
        if new_children.len() != expected {
            return Err(BuildError::ChildCount {
                expected,
                found: new_children.len(),
            });
        }
        let mut it = new_children.into_iter();
        fn next(it: &mut std::vec::IntoIter<Node>) -> Node {
            it.next().expect("child count verified above")
        }
        match self {
            Node::ConstI32(_)
            | Node::ConstI64(_)
            | Node::ConstF64(_)
            | Node::ConstBool(_)
            | Node::LocalGet(_)
            | Node::GlobalGet(_)
            | Node::MemorySize => Ok(self.clone()),
            Node::Binary { op, .. } => {
                let (l, r) = (next(&mut it), next(&mut it));
                Node::binary(*op, l, r)
            }
            Node::Unary { op, .. } => Node::unary(*op, next(&mut it)),
            Node::Relational { op, .. } => {
                let (l, r) = (next(&mut it), next(&mut it));
                Node::relational(*op, l, r)
            }
            Node::LocalSet { local, .. } => Node::local_set(*local, next(&mut it)),
            Node::GlobalSet { global, .. } => Node::global_set(*global, next(&mut it)),
            Node::Call { func, args } => {
                let new_args = (0..args.len()).map(|_| next(&mut it)).collect();
                Node::call(func, new_args)
            }
            Node::CallIndirect {
                table, ty, args, ..
            } => {
                let new_args: Vec<Node> = (0..args.len()).map(|_| next(&mut it)).collect();
                let index = next(&mut it);
                Node::call_indirect(*table, ty.clone(), index, new_args)
            }
            Node::Block(_) => Node::block(it.collect()),
            Node::If {
                then_branch,
                else_branch,
                ..
            } => {
                let condition = next(&mut it);
                let then_new: Vec<Node> = (0..then_branch.len()).map(|_| next(&mut it)).collect();
                let else_new: Vec<Node> = (0..else_branch.len()).map(|_| next(&mut it)).collect();
                Node::if_else(condition, then_new, else_new)
            }
            Node::For { counter, .. } => {
                let (start, end) = (next(&mut it), next(&mut it));
                Node::for_range(*counter, start, end, it.collect())
            }
            Node::Return(_) => Ok(Node::return_(it.next())),
            Node::Drop(_) => Node::drop(next(&mut it)),
            Node::Load { op, .. } => Node::load(*op, next(&mut it)),
            Node::Store { op, .. } => {
                let (addr, value) = (next(&mut it), next(&mut it));
                Node::store(*op, addr, value)
            }
            Node::MemoryGrow(_) => Node::memory_grow(next(&mut it)),
        }
    }

    // ── Combinators ──────────────────────────────────────────────────────
    // Sugar over the checked constructors, mirroring an infix surface.

    pub fn add(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::DivS, self, rhs)
    }

    pub fn div_u(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::DivU, self, rhs)
    }

    pub fn rem(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::RemS, self, rhs)
    }

    pub fn rem_u(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::RemU, self, rhs)
    }

    pub fn and(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::And, self, rhs)
    }

    pub fn or(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::Or, self, rhs)
    }

    pub fn xor(self, rhs: Node) -> Result<Node, BuildError> {
        Node::binary(BinaryOp::Xor, self, rhs)
    }

    pub fn eq(self, rhs: Node) -> Result<Node, BuildError> {
        Node::relational(RelOp::Eq, self, rhs)
    }

    pub fn ne(self, rhs: Node) -> Result<Node, BuildError> {
        Node::relational(RelOp::Ne, self, rhs)
    }

    pub fn lt(self, rhs: Node) -> Result<Node, BuildError> {
        Node::relational(RelOp::Lt, self, rhs)
    }

    pub fn gt(self, rhs: Node) -> Result<Node, BuildError> {
        Node::relational(RelOp::Gt, self, rhs)
    }

    pub fn le(self, rhs: Node) -> Result<Node, BuildError> {
        Node::relational(RelOp::Le, self, rhs)
    }

    pub fn ge(self, rhs: Node) -> Result<Node, BuildError> {
        Node::relational(RelOp::Ge, self, rhs)
    }

    pub fn neg(self) -> Result<Node, BuildError> {
        Node::unary(UnaryOp::Neg, self)
    }

    pub fn not(self) -> Result<Node, BuildError> {
        Node::unary(UnaryOp::Not, self)
    }

    pub fn to_i32(self) -> Result<Node, BuildError> {
        Node::unary(UnaryOp::ToI32, self)
    }

    pub fn to_i64(self) -> Result<Node, BuildError> {
        Node::unary(UnaryOp::ToI64, self)
    }

    pub fn to_f64(self) -> Result<Node, BuildError> {
        Node::unary(UnaryOp::ToF64, self)
    }
}

fn check_args(ty: &FuncType, args: &[Node]) -> Result<(), BuildError> {
    if args.len() != ty.params.len() {
        return Err(BuildError::WrongArgCount {
            expected: ty.params.len(),
            found: args.len(),
        });
    }
    for (index, (arg, &expected)) in args.iter().zip(ty.params.iter()).enumerate() {
        let found = arg.result_type();
        if found != expected {
            return Err(BuildError::ArgTypeMismatch {
                index,
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn check_stmts(stmts: &[Node]) -> Result<(), BuildError> {
    for stmt in stmts {
        let ty = stmt.result_type();
        if ty != ValueType::Void {
            return Err(BuildError::NonVoidStatement(ty));
        }
    }
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────────────

impl Node {
    fn fmt_stmts(
        f: &mut fmt::Formatter<'_>,
        stmts: &[Node],
        depth: usize,
    ) -> fmt::Result {
        for stmt in stmts {
            writeln!(f)?;
            write!(f, "{}", "  ".repeat(depth))?;
            stmt.fmt_at(f, depth)?;
        }
        Ok(())
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Node::ConstI32(v) => write!(f, "{v}"),
            Node::ConstI64(v) => write!(f, "{v}"),
            Node::ConstF64(v) => write!(f, "{v}"),
            Node::ConstBool(v) => write!(f, "{v}"),
            Node::Binary { op, lhs, rhs } => match op {
                BinaryOp::Min | BinaryOp::Max | BinaryOp::Copysign | BinaryOp::Rotl
                | BinaryOp::Rotr => {
                    write!(f, "{}(", op.symbol())?;
                    lhs.fmt_at(f, depth)?;
                    write!(f, ", ")?;
                    rhs.fmt_at(f, depth)?;
                    write!(f, ")")
                }
                _ => {
                    write!(f, "(")?;
                    lhs.fmt_at(f, depth)?;
                    write!(f, " {} ", op.symbol())?;
                    rhs.fmt_at(f, depth)?;
                    write!(f, ")")
                }
            },
            Node::Unary { op, operand } => {
                write!(f, "{}(", op.symbol())?;
                operand.fmt_at(f, depth)?;
                write!(f, ")")
            }
            Node::Relational { op, lhs, rhs } => {
                write!(f, "(")?;
                lhs.fmt_at(f, depth)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_at(f, depth)?;
                write!(f, ")")
            }
            Node::LocalGet(local) => write!(f, "local{}", local.index),
            Node::LocalSet { local, value } => {
                write!(f, "local{} = ", local.index)?;
                value.fmt_at(f, depth)
            }
            Node::GlobalGet(global) => write!(f, "global{}", global.index),
            Node::GlobalSet { global, value } => {
                write!(f, "global{} = ", global.index)?;
                value.fmt_at(f, depth)
            }
            Node::Call { func, args } => {
                write!(f, "func{}(", func.index)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_at(f, depth)?;
                }
                write!(f, ")")
            }
            Node::CallIndirect {
                table, index, args, ..
            } => {
                write!(f, "table{}[", table.index)?;
                index.fmt_at(f, depth)?;
                write!(f, "](")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_at(f, depth)?;
                }
                write!(f, ")")
            }
            Node::Block(stmts) => {
                write!(f, "{{")?;
                Self::fmt_stmts(f, stmts, depth + 1)?;
                write!(f, "\n{}}}", "  ".repeat(depth))
            }
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ")?;
                condition.fmt_at(f, depth)?;
                write!(f, " {{")?;
                Self::fmt_stmts(f, then_branch, depth + 1)?;
                write!(f, "\n{}}}", "  ".repeat(depth))?;
                if !else_branch.is_empty() {
                    write!(f, " else {{")?;
                    Self::fmt_stmts(f, else_branch, depth + 1)?;
                    write!(f, "\n{}}}", "  ".repeat(depth))?;
                }
                Ok(())
            }
            Node::For {
                counter,
                start,
                end,
                body,
            } => {
                write!(f, "for local{} in ", counter.index)?;
                start.fmt_at(f, depth)?;
                write!(f, "..")?;
                end.fmt_at(f, depth)?;
                write!(f, " {{")?;
                Self::fmt_stmts(f, body, depth + 1)?;
                write!(f, "\n{}}}", "  ".repeat(depth))
            }
            Node::Return(value) => match value {
                Some(v) => {
                    write!(f, "return ")?;
                    v.fmt_at(f, depth)
                }
                None => write!(f, "return"),
            },
            Node::Drop(value) => {
                write!(f, "drop(")?;
                value.fmt_at(f, depth)?;
                write!(f, ")")
            }
            Node::Load { op, addr } => {
                write!(f, "{op}(")?;
                addr.fmt_at(f, depth)?;
                write!(f, ")")
            }
            Node::Store { op, addr, value } => {
                write!(f, "{op}(")?;
                addr.fmt_at(f, depth)?;
                write!(f, ", ")?;
                value.fmt_at(f, depth)?;
                write!(f, ")")
            }
            Node::MemorySize => write!(f, "memory.size"),
            Node::MemoryGrow(delta) => {
                write!(f, "memory.grow(")?;
                delta.fmt_at(f, depth)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
