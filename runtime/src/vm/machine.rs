//! The virtual machine: registers, stack discipline, execution loop.

use crate::isa::{InstructionSet, Op};
use crate::memory::{Memory, MAX_MEMORY_SIZE};
use crate::number::{Interpretation, Number, NumberType};
use crate::utils::chunk_width;
use crate::vm::{VmConfig, VmError, VmResult};

/// Width of addresses on the stack: program and memory offsets are 16-bit.
const ADDRESS_TYPE: NumberType = NumberType::Uint16;

/// Observer invoked before each dispatched instruction.
///
/// Hook for embedders that want to record execution, e.g. a rollback or
/// time-travel debugger. The default machine records nothing.
pub trait StepRecorder {
    fn record_step(&mut self, program_counter: usize, op: Op, immediate: Option<Number>);
}

/// The machine that executes an encoded program.
///
/// `program` is a read-only byte image of bytecode; `memory` holds the
/// stack (growing from the high end toward zero) and the reserved heap
/// space. All state lives for a single `run` call.
pub struct Vm {
    instruction_set: InstructionSet,
    program: Memory,
    memory: Memory,
    program_counter: usize,
    stack_pointer: usize,
    frame_pointer: usize,
    extreme_pointer: usize,
    trace_enabled: bool,
    recorder: Option<Box<dyn StepRecorder>>,
}

impl Vm {
    pub fn new(program: Vec<u8>, config: VmConfig) -> VmResult<Self> {
        if program.len() > MAX_MEMORY_SIZE {
            return Err(VmError::ProgramTooLarge(program.len()));
        }
        let memory = Memory::new(config.memory_size)?;
        let size = memory.size();
        Ok(Self {
            instruction_set: InstructionSet::new(),
            program: Memory::from_bytes(program)?,
            memory,
            program_counter: 0,
            stack_pointer: size,
            frame_pointer: size,
            extreme_pointer: size,
            trace_enabled: config.trace_enabled,
            recorder: None,
        })
    }

    pub fn set_step_recorder(&mut self, recorder: Box<dyn StepRecorder>) {
        self.recorder = Some(recorder);
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer
    }

    pub fn frame_pointer(&self) -> usize {
        self.frame_pointer
    }

    pub fn extreme_pointer(&self) -> usize {
        self.extreme_pointer
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Read the value at the top of the stack without moving it.
    pub fn peek_stack(&self, ty: NumberType) -> VmResult<Number> {
        Ok(self.memory.read(self.stack_pointer, ty)?)
    }

    /// Pop a value: read at the stack pointer, then move it up.
    pub fn pop_stack(&mut self, ty: NumberType) -> VmResult<Number> {
        let value = self.memory.read(self.stack_pointer, ty)?;
        self.stack_pointer += ty.size_in_bytes();
        Ok(value)
    }

    /// Push a value: move the stack pointer down, then write.
    pub fn push_stack(&mut self, ty: NumberType, value: Number) -> VmResult<()> {
        let size = ty.size_in_bytes();
        let new_top = self.stack_pointer.checked_sub(size).ok_or_else(|| VmError::Segfault {
            address: 0,
            reason: format!("stack overflow pushing {} bytes", size),
        })?;
        self.memory.write(new_top, ty, value)?;
        self.stack_pointer = new_top;
        Ok(())
    }

    /// Run until the program halts or faults.
    pub fn run(&mut self) -> VmResult<u32> {
        loop {
            if let Some(status) = self.step()? {
                return Ok(status);
            }
        }
    }

    /// Decode and execute one instruction. Returns the halt status when
    /// the program terminates.
    pub fn step(&mut self) -> VmResult<Option<u32>> {
        let at = self.program_counter;
        let opcode = self
            .program
            .read(at, NumberType::Uint8)
            .map_err(|_| VmError::Segfault {
                address: at,
                reason: "program counter outside the code segment".to_string(),
            })?
            .to_u64() as u8;
        self.program_counter += 1;

        let op = self
            .instruction_set
            .by_opcode(opcode)
            .ok_or_else(|| VmError::Segfault {
                address: at,
                reason: format!("undefined opcode {}", opcode),
            })?;

        let immediate = match op.immediate_type() {
            Some(ty) => {
                let value = self
                    .program
                    .read(self.program_counter, ty)
                    .map_err(|_| VmError::Segfault {
                        address: self.program_counter,
                        reason: "immediate argument outside the code segment".to_string(),
                    })?;
                self.program_counter += ty.size_in_bytes();
                Some(value)
            }
            None => None,
        };

        if self.trace_enabled {
            match immediate {
                Some(value) => println!("{:04x}  {} {}", at, op, value),
                None => println!("{:04x}  {}", at, op),
            }
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record_step(at, op, immediate);
        }

        self.execute(op, immediate, at)
    }

    fn execute(&mut self, op: Op, immediate: Option<Number>, at: usize) -> VmResult<Option<u32>> {
        // Immediates were decoded against the op's declared type, so the
        // unsigned reading below is always present for ops that take one.
        let imm = immediate.map(|value| value.to_u64() as usize).unwrap_or(0);

        match op {
            Op::LoadConst(ty) => {
                // Decoded immediate is already a value of `ty`.
                self.push_stack(ty, immediate.unwrap_or(Number::Unsigned(0)))?;
            }

            Op::Pop => {
                let new_top = self.stack_pointer + imm;
                if new_top > self.memory.size() {
                    return Err(VmError::Segfault {
                        address: self.stack_pointer,
                        reason: format!("pop of {} bytes past the stack base", imm),
                    });
                }
                self.stack_pointer = new_top;
            }

            Op::Alloc => {
                self.stack_pointer =
                    self.stack_pointer.checked_sub(imm).ok_or_else(|| VmError::Segfault {
                        address: 0,
                        reason: format!("stack overflow allocating {} bytes", imm),
                    })?;
            }

            Op::Loada => {
                let address = self.pop_address()?;
                let new_top =
                    self.stack_pointer.checked_sub(imm).ok_or_else(|| VmError::Segfault {
                        address: 0,
                        reason: format!("stack overflow loading {} bytes", imm),
                    })?;
                self.copy_bytes(address, new_top, imm)?;
                self.stack_pointer = new_top;
            }

            Op::Store => {
                let address = self.pop_address()?;
                self.copy_bytes(self.stack_pointer, address, imm)?;
                self.stack_pointer += imm;
            }

            Op::Loadr => {
                let address = (self.frame_pointer as u64).wrapping_sub(imm as u64);
                self.push_stack(ADDRESS_TYPE, Number::Unsigned(address))?;
            }

            Op::Halt => {
                let status = self.pop_stack(NumberType::Uint32)?.to_u64() as u32;
                return Ok(Some(status));
            }

            Op::Jump => {
                self.program_counter = imm;
            }

            Op::Jumpz => {
                let condition = self.pop_stack(NumberType::Uint8)?;
                if condition.is_zero() {
                    self.program_counter = imm;
                }
            }

            Op::Call => {
                let target = self.pop_address()?;
                let caller_stack = self.stack_pointer + imm;
                self.push_stack(ADDRESS_TYPE, Number::Unsigned(self.extreme_pointer as u64))?;
                self.push_stack(ADDRESS_TYPE, Number::Unsigned(self.frame_pointer as u64))?;
                self.push_stack(ADDRESS_TYPE, Number::Unsigned(caller_stack as u64))?;
                self.push_stack(ADDRESS_TYPE, Number::Unsigned(self.program_counter as u64))?;
                self.frame_pointer = self.stack_pointer;
                self.program_counter = target;
            }

            Op::Enter => {
                self.extreme_pointer = self.frame_pointer.wrapping_sub(imm);
            }

            Op::Return => {
                let slot = ADDRESS_TYPE.size_in_bytes();
                let saved_pc = self.memory.read(self.frame_pointer, ADDRESS_TYPE)?;
                let saved_sp = self.memory.read(self.frame_pointer + slot, ADDRESS_TYPE)?;
                let saved_fp = self.memory.read(self.frame_pointer + 2 * slot, ADDRESS_TYPE)?;
                let saved_ep = self.memory.read(self.frame_pointer + 3 * slot, ADDRESS_TYPE)?;
                self.program_counter = saved_pc.to_u64() as usize;
                self.stack_pointer = saved_sp.to_u64() as usize;
                self.frame_pointer = saved_fp.to_u64() as usize;
                self.extreme_pointer = saved_ep.to_u64() as usize;
            }

            Op::Cast(from, to) => {
                let value = self.pop_stack(from)?;
                self.push_stack(to, value.cast_to(to))?;
            }

            Op::Add(ty) | Op::Sub(ty) | Op::Mul(ty) | Op::Div(ty) | Op::Mod(ty) => {
                let right = self.pop_stack(ty)?;
                let left = self.pop_stack(ty)?;
                let result = self.arithmetic(op, ty, left, right, at)?;
                self.push_stack(ty, result)?;
            }

            Op::And(ty) | Op::Or(ty) | Op::Xor(ty) => {
                let right = self.pop_stack(ty)?.to_u64();
                let left = self.pop_stack(ty)?.to_u64();
                let bits = match op {
                    Op::And(_) => left & right,
                    Op::Or(_) => left | right,
                    _ => left ^ right,
                };
                self.push_stack(ty, Number::Unsigned(bits))?;
            }

            Op::Eq(ty) | Op::Gt(ty) | Op::Ge(ty) | Op::Lt(ty) | Op::Le(ty) => {
                let right = self.pop_stack(ty)?;
                let left = self.pop_stack(ty)?;
                let result = Self::compare(op, ty, left, right);
                self.push_stack(NumberType::Uint8, Number::Unsigned(result as u64))?;
            }

            Op::Not => {
                let value = self.pop_stack(NumberType::Uint8)?;
                let result = if value.is_zero() { 1 } else { 0 };
                self.push_stack(NumberType::Uint8, Number::Unsigned(result))?;
            }
        }

        Ok(None)
    }

    fn pop_address(&mut self) -> VmResult<usize> {
        Ok(self.pop_stack(ADDRESS_TYPE)?.to_u64() as usize)
    }

    /// Copy `length` bytes between memory regions, widest chunks first.
    fn copy_bytes(&mut self, from: usize, to: usize, length: usize) -> VmResult<()> {
        let mut offset = 0;
        while offset < length {
            let chunk = chunk_width(length - offset);
            let value = self.memory.read(from + offset, chunk)?;
            self.memory.write(to + offset, chunk, value)?;
            offset += chunk.size_in_bytes();
        }
        Ok(())
    }

    fn arithmetic(
        &self,
        op: Op,
        ty: NumberType,
        left: Number,
        right: Number,
        at: usize,
    ) -> VmResult<Number> {
        match ty.interpretation() {
            Interpretation::Unsigned => {
                let (l, r) = (left.to_u64() & ty.bitmask(), right.to_u64() & ty.bitmask());
                let value = match op {
                    Op::Add(_) => l.wrapping_add(r),
                    Op::Sub(_) => l.wrapping_sub(r),
                    Op::Mul(_) => l.wrapping_mul(r),
                    Op::Div(_) | Op::Mod(_) => {
                        if r == 0 {
                            return Err(VmError::DivisionByZero { address: at });
                        }
                        if matches!(op, Op::Div(_)) { l / r } else { l % r }
                    }
                    _ => unreachable!("non-arithmetic op"),
                };
                Ok(Number::Unsigned(value))
            }
            Interpretation::Signed => {
                let (l, r) = (left.to_i64(), right.to_i64());
                let value = match op {
                    Op::Add(_) => l.wrapping_add(r),
                    Op::Sub(_) => l.wrapping_sub(r),
                    Op::Mul(_) => l.wrapping_mul(r),
                    Op::Div(_) | Op::Mod(_) => {
                        if r == 0 {
                            return Err(VmError::DivisionByZero { address: at });
                        }
                        if matches!(op, Op::Div(_)) { l.wrapping_div(r) } else { l.wrapping_rem(r) }
                    }
                    _ => unreachable!("non-arithmetic op"),
                };
                Ok(Number::Signed(value))
            }
            Interpretation::Float => {
                let (l, r) = (left.to_f64(), right.to_f64());
                let value = match op {
                    Op::Add(_) => l + r,
                    Op::Sub(_) => l - r,
                    Op::Mul(_) => l * r,
                    Op::Div(_) => l / r,
                    Op::Mod(_) => l % r,
                    _ => unreachable!("non-arithmetic op"),
                };
                Ok(Number::Float(value))
            }
        }
    }

    fn compare(op: Op, ty: NumberType, left: Number, right: Number) -> bool {
        match ty.interpretation() {
            Interpretation::Unsigned => {
                let (l, r) = (left.to_u64() & ty.bitmask(), right.to_u64() & ty.bitmask());
                match op {
                    Op::Eq(_) => l == r,
                    Op::Gt(_) => l > r,
                    Op::Ge(_) => l >= r,
                    Op::Lt(_) => l < r,
                    _ => l <= r,
                }
            }
            Interpretation::Signed => {
                let (l, r) = (left.to_i64(), right.to_i64());
                match op {
                    Op::Eq(_) => l == r,
                    Op::Gt(_) => l > r,
                    Op::Ge(_) => l >= r,
                    Op::Lt(_) => l < r,
                    _ => l <= r,
                }
            }
            Interpretation::Float => {
                let (l, r) = (left.to_f64(), right.to_f64());
                match op {
                    Op::Eq(_) => l == r,
                    Op::Gt(_) => l > r,
                    Op::Ge(_) => l >= r,
                    Op::Lt(_) => l < r,
                    _ => l <= r,
                }
            }
        }
    }
}
