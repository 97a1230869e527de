//! The instruction set of the stack machine.
//!
//! Operations are a closed sum; variants that exist per number type carry
//! the type as payload. Opcodes are assigned by position in the
//! authoritative ordered list held by [`InstructionSet`]: the first entry
//! gets opcode 1, so opcode 0 is always invalid. Everything that needs an
//! opcode looks instructions up by value, never by a hard-coded integer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::number::NumberType;

/// A single machine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// Push the immediate onto the stack as a value of the given width.
    LoadConst(NumberType),
    /// Discard the immediate number of bytes from the stack.
    Pop,
    /// Reserve the immediate number of bytes on the stack.
    Alloc,
    /// Pop an address, copy the immediate number of bytes from it onto the
    /// stack top.
    Loada,
    /// Pop an address, pop the immediate number of bytes and write them
    /// there.
    Store,
    /// Push `frame_pointer - immediate` as an address.
    Loadr,
    /// Pop a uint32 status code and stop execution.
    Halt,
    /// Unconditional jump to the immediate program address.
    Jump,
    /// Pop one byte; jump to the immediate address if it is zero.
    Jumpz,
    /// Pop a jump target, save the frame registers, enter the function.
    /// The immediate is added to the saved stack pointer so the callee's
    /// return unwinds past the arguments.
    Call,
    /// Bound the frame: `extreme_pointer = frame_pointer - immediate`.
    Enter,
    /// Restore the four frame registers saved by `call`.
    Return,
    /// Pop a value as the first type, push it as the second.
    Cast(NumberType, NumberType),
    Add(NumberType),
    Sub(NumberType),
    Mul(NumberType),
    Div(NumberType),
    Mod(NumberType),
    And(NumberType),
    Or(NumberType),
    Xor(NumberType),
    Eq(NumberType),
    Gt(NumberType),
    Ge(NumberType),
    Lt(NumberType),
    Le(NumberType),
    /// Pop a byte; push 1 if it was zero, 0 otherwise.
    Not,
}

impl Op {
    /// The type of the immediate argument, if the operation takes one.
    pub fn immediate_type(&self) -> Option<NumberType> {
        match self {
            Op::LoadConst(ty) => Some(*ty),
            Op::Pop
            | Op::Alloc
            | Op::Loada
            | Op::Store
            | Op::Loadr
            | Op::Jump
            | Op::Jumpz
            | Op::Call
            | Op::Enter => Some(NumberType::Uint16),
            _ => None,
        }
    }

    /// Encoded size in bytes: one opcode byte plus the immediate.
    pub fn encoded_size(&self) -> usize {
        1 + self.immediate_type().map_or(0, |ty| ty.size_in_bytes())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::LoadConst(ty) => write!(f, "loadc<{}>", ty),
            Op::Pop => write!(f, "pop"),
            Op::Alloc => write!(f, "alloc"),
            Op::Loada => write!(f, "loada"),
            Op::Store => write!(f, "store"),
            Op::Loadr => write!(f, "loadr"),
            Op::Halt => write!(f, "halt"),
            Op::Jump => write!(f, "jump"),
            Op::Jumpz => write!(f, "jumpz"),
            Op::Call => write!(f, "call"),
            Op::Enter => write!(f, "enter"),
            Op::Return => write!(f, "return"),
            Op::Cast(from, to) => write!(f, "cast<{},{}>", from, to),
            Op::Add(ty) => write!(f, "add<{}>", ty),
            Op::Sub(ty) => write!(f, "sub<{}>", ty),
            Op::Mul(ty) => write!(f, "mul<{}>", ty),
            Op::Div(ty) => write!(f, "div<{}>", ty),
            Op::Mod(ty) => write!(f, "mod<{}>", ty),
            Op::And(ty) => write!(f, "and<{}>", ty),
            Op::Or(ty) => write!(f, "or<{}>", ty),
            Op::Xor(ty) => write!(f, "xor<{}>", ty),
            Op::Eq(ty) => write!(f, "eq<{}>", ty),
            Op::Gt(ty) => write!(f, "gt<{}>", ty),
            Op::Ge(ty) => write!(f, "ge<{}>", ty),
            Op::Lt(ty) => write!(f, "lt<{}>", ty),
            Op::Le(ty) => write!(f, "le<{}>", ty),
            Op::Not => write!(f, "not"),
        }
    }
}

/// The authoritative, ordered instruction list and its opcode index.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    ops: Vec<Op>,
    opcodes: HashMap<Op, u8>,
}

impl InstructionSet {
    pub fn new() -> Self {
        let mut ops = Vec::new();

        for ty in NumberType::ALL {
            ops.push(Op::LoadConst(ty));
        }
        ops.extend([
            Op::Pop,
            Op::Alloc,
            Op::Loada,
            Op::Store,
            Op::Loadr,
            Op::Halt,
            Op::Jump,
            Op::Jumpz,
            Op::Call,
            Op::Enter,
            Op::Return,
        ]);
        for from in NumberType::ALL {
            for to in NumberType::ALL {
                ops.push(Op::Cast(from, to));
            }
        }
        for make in [Op::Add, Op::Sub, Op::Mul, Op::Div, Op::Mod] {
            for ty in NumberType::ALL {
                ops.push(make(ty));
            }
        }
        for make in [Op::And, Op::Or, Op::Xor] {
            for ty in NumberType::INTEGERS {
                ops.push(make(ty));
            }
        }
        for make in [Op::Eq, Op::Gt, Op::Ge, Op::Lt, Op::Le] {
            for ty in NumberType::ALL {
                ops.push(make(ty));
            }
        }
        ops.push(Op::Not);

        debug_assert!(ops.len() <= u8::MAX as usize);
        let opcodes = ops
            .iter()
            .enumerate()
            .map(|(index, op)| (*op, (index + 1) as u8))
            .collect();

        Self { ops, opcodes }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Opcode of an operation, looked up by value.
    pub fn opcode_of(&self, op: Op) -> Option<u8> {
        self.opcodes.get(&op).copied()
    }

    /// Operation for an opcode byte; opcode 0 is invalid.
    pub fn by_opcode(&self, opcode: u8) -> Option<Op> {
        if opcode == 0 {
            return None;
        }
        self.ops.get(opcode as usize - 1).copied()
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}
