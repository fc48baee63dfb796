//! Bytecode interpreter execution path.
//!
//! Executes the encoded instruction streams produced at instantiation. The
//! interpreter is a structured-control-flow walker over the byte stream: a
//! recursive `exec_seq` runs one sequence up to its `end`/`else`, and
//! returns how it finished so the enclosing construct can act on branches.
//! Branch payloads count labels outward, exactly as in the binary format.

use wasmith_encode::opcode::*;
use wasmith_encode::ByteReader;
use wasmith_module::FuncDecl;
use wasmith_types::{
    apply_binary, apply_rel, apply_unary, BinaryOp, LoadOp, RelOp, StoreOp, UnaryOp, Value,
    ValueType,
};

use crate::error::{RunResult, Trap};
use crate::instance::{zero_value, Frame, Machine};

/// How a sequence finished.
enum Seq {
    /// Fell through its `end` (or the end of the function stream).
    End,
    /// Stopped at an `else` at this nesting level.
    Else,
    /// A branch is unwinding; the payload counts labels still to cross.
    Branch(u32),
    /// `return` is unwinding all the way out.
    Return,
}

impl<'a, 'm> Machine<'a, 'm> {
    pub(crate) fn call_function(&mut self, index: u32, args: Vec<Value>) -> RunResult<Option<Value>> {
        self.enter_call()?;
        let result = self.run_function(index, args);
        self.exit_call();
        result
    }

    fn run_function(&mut self, index: u32, args: Vec<Value>) -> RunResult<Option<Value>> {
        let module = self.module;
        let bodies = self.bodies;
        let Some(code) = bodies[index as usize].as_deref() else {
            return self.call_host(index, &args);
        };
        let FuncDecl::Local(body) = &module.funcs[index as usize] else {
            return Err(Trap::Internal("encoded body for an import".into()));
        };
        let mut frame = Frame { locals: args };
        for &ty in &body.locals {
            frame.locals.push(zero_value(ty)?);
        }
        let mut stack: Vec<Value> = Vec::new();
        let mut r = ByteReader::new(code);
        let seq = self.exec_seq(&mut r, &mut frame, &mut stack)?;
        let result = module.func_type(index).result;
        match seq {
            Seq::Return if result == ValueType::Void => Ok(None),
            Seq::Return => Ok(Some(pop(&mut stack)?)),
            Seq::End if result == ValueType::Void => Ok(None),
            Seq::End => Err(Trap::Unreachable),
            Seq::Else | Seq::Branch(_) => {
                Err(Trap::Internal("unbalanced control flow".into()))
            }
        }
    }

    fn exec_seq(
        &mut self,
        r: &mut ByteReader<'_>,
        frame: &mut Frame,
        stack: &mut Vec<Value>,
    ) -> RunResult<Seq> {
        let module = self.module;
        loop {
            if r.done() {
                return Ok(Seq::End);
            }
            let op = r.byte();
            match op {
                OP_UNREACHABLE => return Err(Trap::Unreachable),
                OP_END => return Ok(Seq::End),
                OP_ELSE => return Ok(Seq::Else),

                OP_BLOCK => {
                    r.byte(); // block type
                    match self.exec_seq(r, frame, stack)? {
                        Seq::End => {}
                        // A branch to this label exits past our end.
                        Seq::Branch(0) => {
                            skip_seq(r);
                        }
                        Seq::Branch(depth) => {
                            skip_seq(r);
                            return Ok(Seq::Branch(depth - 1));
                        }
                        Seq::Return => return Ok(Seq::Return),
                        Seq::Else => {
                            return Err(Trap::Internal("else outside if".into()));
                        }
                    }
                }
                OP_LOOP => {
                    r.byte(); // block type
                    let body_start = r.pos();
                    loop {
                        match self.exec_seq(r, frame, stack)? {
                            Seq::End => break,
                            // A branch to a loop label restarts the body.
                            Seq::Branch(0) => r.jump(body_start),
                            Seq::Branch(depth) => {
                                skip_seq(r);
                                return Ok(Seq::Branch(depth - 1));
                            }
                            Seq::Return => return Ok(Seq::Return),
                            Seq::Else => {
                                return Err(Trap::Internal("else outside if".into()));
                            }
                        }
                    }
                }
                OP_IF => {
                    r.byte(); // block type
                    let taken = pop_i32(stack)? != 0;
                    if taken {
                        match self.exec_seq(r, frame, stack)? {
                            Seq::End => {}
                            // Stopped at else: the untaken arm is skipped.
                            Seq::Else | Seq::Branch(0) => {
                                skip_seq(r);
                            }
                            Seq::Branch(depth) => {
                                skip_seq(r);
                                return Ok(Seq::Branch(depth - 1));
                            }
                            Seq::Return => return Ok(Seq::Return),
                        }
                    } else if skip_to_else(r) {
                        match self.exec_seq(r, frame, stack)? {
                            Seq::End => {}
                            Seq::Branch(0) => {
                                skip_seq(r);
                            }
                            Seq::Branch(depth) => {
                                skip_seq(r);
                                return Ok(Seq::Branch(depth - 1));
                            }
                            Seq::Return => return Ok(Seq::Return),
                            Seq::Else => {
                                return Err(Trap::Internal("double else".into()));
                            }
                        }
                    }
                }
                OP_BR => return Ok(Seq::Branch(r.u32())),
                OP_BR_IF => {
                    let depth = r.u32();
                    if pop_i32(stack)? != 0 {
                        return Ok(Seq::Branch(depth));
                    }
                }
                OP_RETURN => return Ok(Seq::Return),

                OP_CALL => {
                    let index = r.u32();
                    let argc = module.func_type(index).params.len();
                    let args = split_args(stack, argc)?;
                    if let Some(value) = self.call_function(index, args)? {
                        stack.push(value);
                    }
                }
                OP_CALL_INDIRECT => {
                    let type_index = r.u32();
                    r.byte(); // table index, always zero
                    let expected = &module.types[type_index as usize];
                    let slot = pop_i32(stack)?;
                    let target = self.table_target(slot, expected)?;
                    let args = split_args(stack, expected.params.len())?;
                    if let Some(value) = self.call_function(target, args)? {
                        stack.push(value);
                    }
                }
                OP_DROP => {
                    pop(stack)?;
                }

                OP_LOCAL_GET => {
                    let index = r.u32();
                    stack.push(frame.locals[index as usize]);
                }
                OP_LOCAL_SET => {
                    let index = r.u32();
                    frame.locals[index as usize] = pop(stack)?;
                }
                OP_GLOBAL_GET => {
                    let index = r.u32();
                    stack.push(self.state.globals[index as usize]);
                }
                OP_GLOBAL_SET => {
                    let index = r.u32();
                    self.state.globals[index as usize] = pop(stack)?;
                }

                OP_I32_CONST => stack.push(Value::I32(r.s32())),
                OP_I64_CONST => stack.push(Value::I64(r.s64())),
                OP_F64_CONST => stack.push(Value::F64(r.f64())),

                OP_I32_EQZ => {
                    let v = pop_i32(stack)?;
                    stack.push(Value::I32(i32::from(v == 0)));
                }

                OP_I32_LOAD | OP_I64_LOAD | OP_F64_LOAD | OP_I32_LOAD8_U => {
                    let _align = r.u32();
                    let offset = r.u32();
                    let addr = pop_i32(stack)?.wrapping_add(offset as i32);
                    let load = match op {
                        OP_I32_LOAD => LoadOp::I32,
                        OP_I64_LOAD => LoadOp::I64,
                        OP_F64_LOAD => LoadOp::F64,
                        _ => LoadOp::I32U8,
                    };
                    stack.push(self.mem_load(load, addr)?);
                }
                OP_I32_STORE | OP_I64_STORE | OP_F64_STORE | OP_I32_STORE8 => {
                    let _align = r.u32();
                    let offset = r.u32();
                    let value = pop(stack)?;
                    let addr = pop_i32(stack)?.wrapping_add(offset as i32);
                    let store = match op {
                        OP_I32_STORE => StoreOp::I32,
                        OP_I64_STORE => StoreOp::I64,
                        OP_F64_STORE => StoreOp::F64,
                        _ => StoreOp::I32U8,
                    };
                    self.mem_store(store, addr, value)?;
                }
                OP_MEMORY_SIZE => {
                    r.byte();
                    stack.push(Value::I32(self.mem_size_pages()));
                }
                OP_MEMORY_GROW => {
                    r.byte();
                    let delta = pop_i32(stack)?;
                    stack.push(Value::I32(self.mem_grow(delta)));
                }

                _ => {
                    if let Some(bop) = binary_op(op) {
                        let b = pop(stack)?;
                        let a = pop(stack)?;
                        stack.push(apply_binary(bop, a, b)?);
                    } else if let Some(rop) = rel_op(op) {
                        let b = pop(stack)?;
                        let a = pop(stack)?;
                        stack.push(apply_rel(rop, a, b)?);
                    } else if let Some(uop) = unary_op(op) {
                        let v = pop(stack)?;
                        stack.push(apply_unary(uop, v.ty(), v)?);
                    } else {
                        return Err(Trap::Internal(format!("unknown opcode 0x{op:02X}")));
                    }
                }
            }
        }
    }
}

// ── Stack helpers ────────────────────────────────────────────────────────────

fn pop(stack: &mut Vec<Value>) -> RunResult<Value> {
    stack
        .pop()
        .ok_or_else(|| Trap::Internal("operand stack underflow".into()))
}

fn pop_i32(stack: &mut Vec<Value>) -> RunResult<i32> {
    match pop(stack)? {
        Value::I32(v) => Ok(v),
        other => Err(Trap::Internal(format!("expected i32, got {other}"))),
    }
}

fn split_args(stack: &mut Vec<Value>, argc: usize) -> RunResult<Vec<Value>> {
    if stack.len() < argc {
        return Err(Trap::Internal("operand stack underflow".into()));
    }
    Ok(stack.split_off(stack.len() - argc))
}

// ── Stream skipping ──────────────────────────────────────────────────────────

/// Skip the rest of the current sequence, past its matching `end`.
fn skip_seq(r: &mut ByteReader<'_>) {
    skip_until(r, false);
}

/// Skip the taken-test-failed arm of an `if`. Returns true when the cursor
/// stopped just after an `else`, false when the construct had none.
fn skip_to_else(r: &mut ByteReader<'_>) -> bool {
    skip_until(r, true)
}

fn skip_until(r: &mut ByteReader<'_>, stop_at_else: bool) -> bool {
    let mut depth = 0u32;
    loop {
        let op = r.byte();
        match op {
            OP_BLOCK | OP_LOOP | OP_IF => {
                r.byte();
                depth += 1;
            }
            OP_END => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            OP_ELSE => {
                if depth == 0 && stop_at_else {
                    return true;
                }
            }
            OP_BR | OP_BR_IF | OP_CALL | OP_LOCAL_GET | OP_LOCAL_SET | OP_GLOBAL_GET
            | OP_GLOBAL_SET => {
                r.u32();
            }
            OP_CALL_INDIRECT => {
                r.u32();
                r.byte();
            }
            OP_I32_LOAD | OP_I64_LOAD | OP_F64_LOAD | OP_I32_LOAD8_U | OP_I32_STORE
            | OP_I64_STORE | OP_F64_STORE | OP_I32_STORE8 => {
                r.u32();
                r.u32();
            }
            OP_MEMORY_SIZE | OP_MEMORY_GROW => {
                r.byte();
            }
            OP_I32_CONST => {
                r.s32();
            }
            OP_I64_CONST => {
                r.s64();
            }
            OP_F64_CONST => {
                r.f64();
            }
            _ => {}
        }
    }
}

// ── Opcode tables ────────────────────────────────────────────────────────────
// Width dispatch happens through the value kinds; one table entry covers
// the i32 and i64 forms of an operator.

fn binary_op(op: u8) -> Option<BinaryOp> {
    use BinaryOp::*;
    Some(match op {
        OP_I32_ADD | OP_I64_ADD | OP_F64_ADD => Add,
        OP_I32_SUB | OP_I64_SUB | OP_F64_SUB => Sub,
        OP_I32_MUL | OP_I64_MUL | OP_F64_MUL => Mul,
        OP_I32_DIV_S | OP_I64_DIV_S | OP_F64_DIV => DivS,
        OP_I32_DIV_U | OP_I64_DIV_U => DivU,
        OP_I32_REM_S | OP_I64_REM_S => RemS,
        OP_I32_REM_U | OP_I64_REM_U => RemU,
        OP_I32_AND | OP_I64_AND => And,
        OP_I32_OR | OP_I64_OR => Or,
        OP_I32_XOR | OP_I64_XOR => Xor,
        OP_I32_SHL | OP_I64_SHL => Shl,
        OP_I32_SHR_S | OP_I64_SHR_S => ShrS,
        OP_I32_SHR_U | OP_I64_SHR_U => ShrU,
        OP_I32_ROTL | OP_I64_ROTL => Rotl,
        OP_I32_ROTR | OP_I64_ROTR => Rotr,
        OP_F64_MIN => Min,
        OP_F64_MAX => Max,
        OP_F64_COPYSIGN => Copysign,
        _ => return None,
    })
}

fn rel_op(op: u8) -> Option<RelOp> {
    use RelOp::*;
    Some(match op {
        OP_I32_EQ | OP_I64_EQ | OP_F64_EQ => Eq,
        OP_I32_NE | OP_I64_NE | OP_F64_NE => Ne,
        OP_I32_LT_S | OP_I64_LT_S | OP_F64_LT => Lt,
        OP_I32_GT_S | OP_I64_GT_S | OP_F64_GT => Gt,
        OP_I32_LE_S | OP_I64_LE_S | OP_F64_LE => Le,
        OP_I32_GE_S | OP_I64_GE_S | OP_F64_GE => Ge,
        _ => return None,
    })
}

fn unary_op(op: u8) -> Option<UnaryOp> {
    use UnaryOp::*;
    Some(match op {
        OP_I32_CLZ | OP_I64_CLZ => Clz,
        OP_I32_CTZ | OP_I64_CTZ => Ctz,
        OP_I32_POPCNT | OP_I64_POPCNT => Popcnt,
        OP_F64_ABS => Abs,
        OP_F64_NEG => Neg,
        OP_F64_CEIL => Ceil,
        OP_F64_FLOOR => Floor,
        OP_F64_TRUNC => Trunc,
        OP_F64_NEAREST => Nearest,
        OP_F64_SQRT => Sqrt,
        OP_I32_WRAP_I64 | OP_I32_TRUNC_F64_S => ToI32,
        OP_I64_EXTEND_I32_S | OP_I64_TRUNC_F64_S => ToI64,
        OP_F64_CONVERT_I32_S | OP_F64_CONVERT_I64_S => ToF64,
        _ => return None,
    })
}
