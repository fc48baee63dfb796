//! Tree-walking execution path.
//!
//! Walks the node tree of a function body directly, with no intermediate
//! form. Numeric behavior comes from the shared `apply_*` functions, so
//! this path and the bytecode interpreter cannot drift apart. Loop
//! semantics mirror the encoded form: the counter lives in its local slot
//! and the bound is re-evaluated every iteration.

use wasmith_module::FuncDecl;
use wasmith_types::{apply_binary, apply_rel, apply_unary, Node, Value, ValueType};

use crate::error::{RunResult, Trap};
use crate::instance::{zero_value, Frame, Machine};

/// Statement outcome: continue with the next statement or unwind with the
/// function's return value.
pub(crate) enum Flow {
    Next,
    Return(Option<Value>),
}

impl<'a, 'm> Machine<'a, 'm> {
    pub(crate) fn call_direct(&mut self, index: u32, args: Vec<Value>) -> RunResult<Option<Value>> {
        self.enter_call()?;
        let result = self.run_direct(index, args);
        self.exit_call();
        result
    }

    fn run_direct(&mut self, index: u32, args: Vec<Value>) -> RunResult<Option<Value>> {
        let module = self.module;
        let body = match &module.funcs[index as usize] {
            FuncDecl::Import { .. } => return self.call_host(index, &args),
            FuncDecl::Local(body) => body,
        };
        let mut frame = Frame { locals: args };
        for &ty in &body.locals {
            frame.locals.push(zero_value(ty)?);
        }
        for stmt in &body.body {
            if let Flow::Return(value) = self.exec_stmt(&mut frame, stmt)? {
                return Ok(value);
            }
        }
        // Falling off the end of a function that owes a value is the same
        // fault as executing `unreachable`.
        if module.func_type(index).result == ValueType::Void {
            Ok(None)
        } else {
            Err(Trap::Unreachable)
        }
    }

    fn exec_block(&mut self, frame: &mut Frame, stmts: &[Node]) -> RunResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec_stmt(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &Node) -> RunResult<Flow> {
        match stmt {
            Node::LocalSet { local, value } => {
                frame.locals[local.index as usize] = self.eval_expr(frame, value)?;
                Ok(Flow::Next)
            }
            Node::GlobalSet { global, value } => {
                let value = self.eval_expr(frame, value)?;
                self.state.globals[global.index as usize] = value;
                Ok(Flow::Next)
            }
            Node::Block(stmts) => self.exec_block(frame, stmts),
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_i32(frame, condition)? != 0 {
                    self.exec_block(frame, then_branch)
                } else {
                    self.exec_block(frame, else_branch)
                }
            }
            Node::For {
                counter,
                start,
                end,
                body,
            } => {
                let slot = counter.index as usize;
                let start = self.eval_i32(frame, start)?;
                frame.locals[slot] = Value::I32(start);
                loop {
                    let Value::I32(current) = frame.locals[slot] else {
                        return Err(Trap::Internal("loop counter slot is not i32".into()));
                    };
                    if current >= self.eval_i32(frame, end)? {
                        break;
                    }
                    if let Flow::Return(value) = self.exec_block(frame, body)? {
                        return Ok(Flow::Return(value));
                    }
                    // The body may write the counter; step from the slot.
                    let Value::I32(current) = frame.locals[slot] else {
                        return Err(Trap::Internal("loop counter slot is not i32".into()));
                    };
                    frame.locals[slot] = Value::I32(current.wrapping_add(1));
                }
                Ok(Flow::Next)
            }
            Node::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.eval_expr(frame, value)?),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            Node::Drop(value) => {
                self.eval_expr(frame, value)?;
                Ok(Flow::Next)
            }
            Node::Store { op, addr, value } => {
                let addr = self.eval_i32(frame, addr)?;
                let value = self.eval_expr(frame, value)?;
                self.mem_store(*op, addr, value)?;
                Ok(Flow::Next)
            }
            // Void calls are statements.
            Node::Call { .. } | Node::CallIndirect { .. } => {
                self.eval_call(frame, stmt)?;
                Ok(Flow::Next)
            }
            _ => Err(Trap::Internal("non-void node in statement position".into())),
        }
    }

    pub(crate) fn eval_expr(&mut self, frame: &mut Frame, node: &Node) -> RunResult<Value> {
        match node {
            Node::ConstI32(v) => Ok(Value::I32(*v)),
            Node::ConstI64(v) => Ok(Value::I64(*v)),
            Node::ConstF64(v) => Ok(Value::F64(*v)),
            Node::ConstBool(v) => Ok(Value::I32(i32::from(*v))),
            Node::Binary { op, lhs, rhs } => {
                let l = self.eval_expr(frame, lhs)?;
                let r = self.eval_expr(frame, rhs)?;
                Ok(apply_binary(*op, l, r)?)
            }
            Node::Unary { op, operand } => {
                let ty = operand.result_type();
                let v = self.eval_expr(frame, operand)?;
                Ok(apply_unary(*op, ty, v)?)
            }
            Node::Relational { op, lhs, rhs } => {
                let l = self.eval_expr(frame, lhs)?;
                let r = self.eval_expr(frame, rhs)?;
                Ok(apply_rel(*op, l, r)?)
            }
            Node::LocalGet(local) => Ok(frame.locals[local.index as usize]),
            Node::GlobalGet(global) => Ok(self.state.globals[global.index as usize]),
            Node::Call { .. } | Node::CallIndirect { .. } => self
                .eval_call(frame, node)?
                .ok_or_else(|| Trap::Internal("void call in expression position".into())),
            Node::Load { op, addr } => {
                let addr = self.eval_i32(frame, addr)?;
                self.mem_load(*op, addr)
            }
            Node::MemorySize => Ok(Value::I32(self.mem_size_pages())),
            Node::MemoryGrow(delta) => {
                let delta = self.eval_i32(frame, delta)?;
                Ok(Value::I32(self.mem_grow(delta)))
            }
            _ => Err(Trap::Internal("statement in expression position".into())),
        }
    }

    /// Shared by statement and expression positions; returns the callee's
    /// result, `None` for void.
    fn eval_call(&mut self, frame: &mut Frame, node: &Node) -> RunResult<Option<Value>> {
        match node {
            Node::Call { func, args } => {
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(self.eval_expr(frame, arg)?);
                }
                self.call_direct(func.index, argv)
            }
            Node::CallIndirect {
                ty, index, args, ..
            } => {
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(self.eval_expr(frame, arg)?);
                }
                let slot = self.eval_i32(frame, index)?;
                let target = self.table_target(slot, ty)?;
                self.call_direct(target, argv)
            }
            _ => Err(Trap::Internal("not a call node".into())),
        }
    }

    fn eval_i32(&mut self, frame: &mut Frame, node: &Node) -> RunResult<i32> {
        match self.eval_expr(frame, node)? {
            Value::I32(v) => Ok(v),
            other => Err(Trap::Internal(format!("expected i32, got {other}"))),
        }
    }
}
