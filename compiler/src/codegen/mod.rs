//! Lowering from the AST to bytecode.
//!
//! The generator walks each definition once, appending instruction
//! invocations whose immediates may still reference AST nodes (call and
//! goto targets) or generator-internal labels (joins of `if`, ternary,
//! and short-circuit lowering). A single fixup pass computes every
//! invocation's byte address and collapses the pending immediates, then
//! the encoder writes `[opcode][immediate]` big-endian through the
//! shared memory buffer.

use std::collections::HashMap;
use thiserror::Error;

use crumb::{
    Interpretation, InstructionSet, Memory, MemoryError, Number, NumberType, Op,
};

use crate::ast::{
    DefId, Definition, ExpressionKind, ExprId, InfixOp, PostfixOp, PrefixOp, Program,
    StatementKind, StmtId,
};

/// Size of the saved-register header of a call frame: four 16-bit slots.
const FRAME_HEADER: u64 = 8;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("code generation for {construct} is not supported")]
    Unsupported { construct: String },

    #[error("encoded program of {0} bytes exceeds the maximum of {max}", max = crumb::MAX_MEMORY_SIZE)]
    ProgramTooLarge(usize),

    #[error("unresolved reference to {what}")]
    UnresolvedReference { what: String },

    #[error("instruction {0} is not in the instruction set")]
    UnknownInstruction(String),

    #[error(transparent)]
    Encode(#[from] MemoryError),
}

/// Generator-internal jump target with no AST anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

/// Immediate argument of an instruction invocation before fixup.
#[derive(Debug, Clone)]
pub enum Immediate {
    /// Already concrete.
    Value(Number),
    /// The start address of a function's code.
    Function(DefId),
    /// The start address of a statement's code.
    Statement(StmtId),
    /// A generator-internal label.
    Label(LabelId),
}

/// One emitted instruction plus its (possibly pending) immediate.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub op: Op,
    pub immediate: Option<Immediate>,
}

/// Where a variable lives at run time.
#[derive(Debug, Clone, Copy)]
enum VarLocation {
    /// Absolute address at the bottom of the stack.
    Global(u64),
    /// `frame_pointer - offset`.
    Local(u64),
    /// `frame_pointer + FRAME_HEADER + offset`.
    Param(u64),
}

#[derive(Debug, Clone)]
struct FrameInfo {
    return_type: DefId,
    /// Offset of the caller-reserved return slot above the frame pointer.
    return_slot_offset: u64,
}

/// Generate the encoded byte image for a parsed program.
pub fn generate(program: &Program, memory_size: usize) -> Result<Vec<u8>, CodegenError> {
    CodeGenerator::new(program, memory_size).run()
}

pub struct CodeGenerator<'a> {
    program: &'a Program,
    memory_size: usize,
    instruction_set: InstructionSet,
    invocations: Vec<Invocation>,
    function_starts: HashMap<DefId, usize>,
    statement_starts: HashMap<StmtId, usize>,
    label_positions: HashMap<LabelId, usize>,
    next_label: u32,
    locations: HashMap<DefId, VarLocation>,
    frame: Option<FrameInfo>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(program: &'a Program, memory_size: usize) -> Self {
        Self {
            program,
            memory_size,
            instruction_set: InstructionSet::new(),
            invocations: Vec::new(),
            function_starts: HashMap::new(),
            statement_starts: HashMap::new(),
            label_positions: HashMap::new(),
            next_label: 0,
            locations: HashMap::new(),
            frame: None,
        }
    }

    pub fn run(mut self) -> Result<Vec<u8>, CodegenError> {
        let mut global_vars = Vec::new();
        let mut functions = Vec::new();
        for (_, def) in &self.program.ast.scope(self.program.globals).entries {
            match self.program.ast.def(*def) {
                Definition::Variable { .. } => global_vars.push(*def),
                Definition::Function { .. } => functions.push(*def),
                Definition::Type(_) => {}
            }
        }

        // Global addresses first, contiguously at the bottom of the stack.
        let mut cursor = self.memory_size as u64;
        for def in &global_vars {
            let size = self.variable_size(*def)? as u64;
            cursor -= size;
            self.locations.insert(*def, VarLocation::Global(cursor));
        }

        for def in &global_vars {
            self.emit_global(*def)?;
        }

        // Bootstrap: reserve main's return slot, call it, halt on the result.
        let main = self
            .program
            .ast
            .look_up(self.program.globals, "main")
            .map_err(|_| CodegenError::UnresolvedReference {
                what: "'main'".to_string(),
            })?;
        self.emit_value(Op::Alloc, 4);
        self.emit(
            Op::LoadConst(NumberType::Uint16),
            Some(Immediate::Function(main)),
        );
        self.emit_value(Op::Call, 0);
        self.emit(Op::Halt, None);

        for def in &functions {
            self.emit_function(*def)?;
        }

        self.fixup_and_encode()
    }

    // ----- emission plumbing -----

    fn emit(&mut self, op: Op, immediate: Option<Immediate>) {
        self.invocations.push(Invocation { op, immediate });
    }

    fn emit_value(&mut self, op: Op, value: u64) {
        self.emit(op, Some(Immediate::Value(Number::Unsigned(value))));
    }

    fn new_label(&mut self) -> LabelId {
        self.next_label += 1;
        LabelId(self.next_label - 1)
    }

    fn bind_label(&mut self, label: LabelId) {
        self.label_positions.insert(label, self.invocations.len());
    }

    fn unsupported(&self, construct: &str) -> CodegenError {
        CodegenError::Unsupported {
            construct: construct.to_string(),
        }
    }

    /// A value of the given type holding a small constant.
    fn typed_number(ty: NumberType, value: i64) -> Number {
        match ty.interpretation() {
            Interpretation::Unsigned => Number::Unsigned(value as u64),
            Interpretation::Signed => Number::Signed(value),
            Interpretation::Float => Number::Float(value as f64),
        }
    }

    fn variable_size(&self, def: DefId) -> Result<usize, CodegenError> {
        match self.program.ast.def(def) {
            Definition::Variable { ty, .. } => Ok(self.program.ast.type_size(*ty)),
            _ => Err(CodegenError::UnresolvedReference {
                what: "variable definition".to_string(),
            }),
        }
    }

    fn number_type_of(&self, ty: DefId) -> Result<NumberType, CodegenError> {
        self.program
            .ast
            .basic_number_type(ty)
            .ok_or_else(|| self.unsupported("values of non-basic types"))
    }

    // ----- globals and functions -----

    /// `alloc` keeps the stack pointer below the global region; an
    /// initializer additionally stores through the absolute address.
    fn emit_global(&mut self, def: DefId) -> Result<(), CodegenError> {
        let (ty, initializer) = match self.program.ast.def(def) {
            Definition::Variable { ty, initializer, .. } => (*ty, *initializer),
            _ => return Ok(()),
        };
        let size = self.program.ast.type_size(ty) as u64;
        self.emit_value(Op::Alloc, size);
        if let Some(initializer) = initializer {
            let target = self.number_type_of(ty)?;
            self.emit_expression_as(initializer, target)?;
            let address = match self.locations.get(&def) {
                Some(VarLocation::Global(address)) => *address,
                _ => {
                    return Err(CodegenError::UnresolvedReference {
                        what: "global address".to_string(),
                    })
                }
            };
            self.emit(
                Op::LoadConst(NumberType::Uint16),
                Some(Immediate::Value(Number::Unsigned(address))),
            );
            self.emit_value(Op::Store, size);
        }
        Ok(())
    }

    fn emit_function(&mut self, def: DefId) -> Result<(), CodegenError> {
        let (return_type, parameters, body) = match self.program.ast.def(def) {
            Definition::Function {
                return_type,
                parameters,
                body,
                ..
            } => (*return_type, *parameters, *body),
            _ => return Ok(()),
        };
        let body = body.ok_or_else(|| CodegenError::UnresolvedReference {
            what: "function body".to_string(),
        })?;

        self.function_starts.insert(def, self.invocations.len());

        // Parameters sit above the frame header; the caller pushed them
        // left to right, so the first parameter is the highest.
        let params: Vec<DefId> = self
            .program
            .ast
            .scope(parameters)
            .entries
            .iter()
            .map(|(_, def)| *def)
            .collect();
        let mut args_size = 0u64;
        let sizes: Vec<u64> = params
            .iter()
            .map(|p| self.variable_size(*p).map(|s| s as u64))
            .collect::<Result<_, _>>()?;
        for size in &sizes {
            args_size += size;
        }
        let mut prefix = 0u64;
        for (param, size) in params.iter().zip(&sizes) {
            prefix += size;
            self.locations.insert(*param, VarLocation::Param(args_size - prefix));
        }

        // Locals grow downward from the frame pointer, in declaration
        // order across the whole function.
        let mut locals_size = 0u64;
        self.assign_locals(body, &mut locals_size)?;

        self.frame = Some(FrameInfo {
            return_type,
            return_slot_offset: FRAME_HEADER + args_size,
        });
        self.emit_value(Op::Enter, locals_size);
        self.emit_value(Op::Alloc, locals_size);
        self.emit_statement(body)?;
        if !matches!(self.invocations.last().map(|i| i.op), Some(Op::Return)) {
            self.emit(Op::Return, None);
        }
        self.frame = None;
        Ok(())
    }

    fn assign_locals(&mut self, stmt: StmtId, offset: &mut u64) -> Result<(), CodegenError> {
        if let StatementKind::Compound { scope, .. } = &self.program.ast.stmt(stmt).kind {
            let locals: Vec<DefId> = self
                .program
                .ast
                .scope(*scope)
                .entries
                .iter()
                .map(|(_, def)| *def)
                .collect();
            for def in locals {
                let size = self.variable_size(def)? as u64;
                *offset += size;
                self.locations.insert(def, VarLocation::Local(*offset));
            }
        }
        for child in self.program.ast.statement_children(stmt) {
            self.assign_locals(child, offset)?;
        }
        Ok(())
    }

    // ----- statements -----

    fn emit_statement(&mut self, stmt: StmtId) -> Result<(), CodegenError> {
        self.statement_starts.insert(stmt, self.invocations.len());
        let kind = self.program.ast.stmt(stmt).kind.clone();
        match kind {
            StatementKind::Compound { body, .. } => {
                for child in body {
                    self.emit_statement(child)?;
                }
            }

            StatementKind::Expression { expression: None } => {}

            StatementKind::Expression {
                expression: Some(expression),
            } => {
                let size = self.emit_expression(expression)?;
                if size > 0 {
                    self.emit_value(Op::Pop, size as u64);
                }
            }

            StatementKind::Return { value } => {
                if let Some(value) = value {
                    let frame = self.frame.clone().ok_or_else(|| {
                        CodegenError::UnresolvedReference {
                            what: "enclosing frame".to_string(),
                        }
                    })?;
                    let target = self.number_type_of(frame.return_type)?;
                    self.emit_expression_as(value, target)?;
                    self.emit_frame_offset_address(frame.return_slot_offset);
                    self.emit_value(Op::Store, target.size_in_bytes() as u64);
                }
                self.emit(Op::Return, None);
            }

            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.emit_condition(condition)?;
                let end = self.new_label();
                match else_branch {
                    Some(else_branch) => {
                        let otherwise = self.new_label();
                        self.emit(Op::Jumpz, Some(Immediate::Label(otherwise)));
                        self.emit_statement(then_branch)?;
                        self.emit(Op::Jump, Some(Immediate::Label(end)));
                        self.bind_label(otherwise);
                        self.emit_statement(else_branch)?;
                    }
                    None => {
                        self.emit(Op::Jumpz, Some(Immediate::Label(end)));
                        self.emit_statement(then_branch)?;
                    }
                }
                self.bind_label(end);
            }

            StatementKind::Goto { target, label } => {
                let target = target.ok_or_else(|| CodegenError::UnresolvedReference {
                    what: format!("goto target '{}'", label),
                })?;
                self.emit(Op::Jump, Some(Immediate::Statement(target)));
            }

            StatementKind::Switch { .. } => {
                return Err(self.unsupported("switch statement"));
            }
        }
        Ok(())
    }

    // ----- expressions -----

    /// Generate an expression; its value is left on the stack. Returns
    /// the number of bytes it occupies.
    fn emit_expression(&mut self, expr: ExprId) -> Result<usize, CodegenError> {
        let node = self.program.ast.expr(expr).clone();
        match node.kind {
            ExpressionKind::NumberLiteral(value) => {
                let ty = self.number_type_of(node.ty)?;
                self.emit(Op::LoadConst(ty), Some(Immediate::Value(value)));
                Ok(ty.size_in_bytes())
            }

            ExpressionKind::Variable(def) => match self.program.ast.def(def) {
                Definition::Variable { ty, .. } => {
                    let ty = self.number_type_of(*ty)?;
                    self.emit_variable_address(def)?;
                    self.emit_value(Op::Loada, ty.size_in_bytes() as u64);
                    Ok(ty.size_in_bytes())
                }
                _ => Err(self.unsupported("a function used as a value")),
            },

            ExpressionKind::Assignment { target, value } => {
                let def = self.variable_of(target)?;
                let ty = self.number_type_of(node.ty)?;
                self.emit_expression_as(value, ty)?;
                self.emit_variable_address(def)?;
                self.emit_value(Op::Store, ty.size_in_bytes() as u64);
                // The stored value is the assignment's value; read it back.
                self.emit_variable_address(def)?;
                self.emit_value(Op::Loada, ty.size_in_bytes() as u64);
                Ok(ty.size_in_bytes())
            }

            ExpressionKind::Prefix { op, operand } => match op {
                PrefixOp::Plus => self.emit_expression(operand),
                PrefixOp::Minus => {
                    let ty = self.number_type_of(node.ty)?;
                    self.emit(
                        Op::LoadConst(ty),
                        Some(Immediate::Value(Self::typed_number(ty, 0))),
                    );
                    self.emit_expression_as(operand, ty)?;
                    self.emit(Op::Sub(ty), None);
                    Ok(ty.size_in_bytes())
                }
                PrefixOp::Not => {
                    let operand_ty = self.number_type_of(self.program.ast.expr(operand).ty)?;
                    self.emit_expression(operand)?;
                    self.emit(
                        Op::LoadConst(operand_ty),
                        Some(Immediate::Value(Self::typed_number(operand_ty, 0))),
                    );
                    self.emit(Op::Eq(operand_ty), None);
                    Ok(1)
                }
                PrefixOp::BitNot => {
                    let ty = self.number_type_of(node.ty)?;
                    self.emit_expression(operand)?;
                    self.emit(
                        Op::LoadConst(ty),
                        Some(Immediate::Value(Number::Unsigned(ty.bitmask()))),
                    );
                    self.emit(Op::Xor(ty), None);
                    Ok(ty.size_in_bytes())
                }
                PrefixOp::Increment => self.emit_increment(operand, 1, true),
                PrefixOp::Decrement => self.emit_increment(operand, -1, true),
                PrefixOp::Dereference | PrefixOp::AddressOf => {
                    Err(self.unsupported("pointer operations"))
                }
            },

            ExpressionKind::Postfix { op, operand } => match op {
                PostfixOp::Increment => self.emit_increment(operand, 1, false),
                PostfixOp::Decrement => self.emit_increment(operand, -1, false),
            },

            ExpressionKind::Infix { op, left, right } => {
                self.emit_infix(op, left, right, node.ty)
            }

            ExpressionKind::Ternary {
                condition,
                then_value,
                else_value,
            } => {
                let ty = self.number_type_of(node.ty)?;
                let otherwise = self.new_label();
                let end = self.new_label();
                self.emit_condition(condition)?;
                self.emit(Op::Jumpz, Some(Immediate::Label(otherwise)));
                self.emit_expression_as(then_value, ty)?;
                self.emit(Op::Jump, Some(Immediate::Label(end)));
                self.bind_label(otherwise);
                self.emit_expression_as(else_value, ty)?;
                self.bind_label(end);
                Ok(ty.size_in_bytes())
            }

            ExpressionKind::Call {
                function,
                arguments,
            } => self.emit_call(function, &arguments),

            ExpressionKind::Cast { operand } => {
                let to = self.number_type_of(node.ty)?;
                let from = self.number_type_of(self.program.ast.expr(operand).ty)?;
                self.emit_expression(operand)?;
                if from != to {
                    self.emit(Op::Cast(from, to), None);
                }
                Ok(to.size_in_bytes())
            }

            ExpressionKind::Subscript { .. } => Err(self.unsupported("array subscription")),
        }
    }

    /// Generate an expression and convert the result to `target`.
    fn emit_expression_as(
        &mut self,
        expr: ExprId,
        target: NumberType,
    ) -> Result<usize, CodegenError> {
        let from = self.number_type_of(self.program.ast.expr(expr).ty)?;
        self.emit_expression(expr)?;
        if from != target {
            self.emit(Op::Cast(from, target), None);
        }
        Ok(target.size_in_bytes())
    }

    /// Leave a one-byte truthiness value for `jumpz`: byte-wide values
    /// go through as they are, wider ones compare against zero.
    fn emit_condition(&mut self, expr: ExprId) -> Result<(), CodegenError> {
        let ty = self.number_type_of(self.program.ast.expr(expr).ty)?;
        self.emit_expression(expr)?;
        if ty.size_in_bytes() > 1 {
            self.emit(
                Op::LoadConst(ty),
                Some(Immediate::Value(Self::typed_number(ty, 0))),
            );
            self.emit(Op::Eq(ty), None);
            self.emit(Op::Not, None);
        }
        Ok(())
    }

    /// Leave a normalized `{0,1}` byte for value positions.
    fn emit_bool(&mut self, expr: ExprId) -> Result<(), CodegenError> {
        let ty = self.number_type_of(self.program.ast.expr(expr).ty)?;
        self.emit_expression(expr)?;
        if ty.size_in_bytes() > 1 {
            self.emit(
                Op::LoadConst(ty),
                Some(Immediate::Value(Self::typed_number(ty, 0))),
            );
            self.emit(Op::Eq(ty), None);
            self.emit(Op::Not, None);
        } else {
            self.emit(Op::Not, None);
            self.emit(Op::Not, None);
        }
        Ok(())
    }

    fn emit_infix(
        &mut self,
        op: InfixOp,
        left: ExprId,
        right: ExprId,
        result_ty: DefId,
    ) -> Result<usize, CodegenError> {
        match op {
            InfixOp::Add | InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod => {
                let ty = self.number_type_of(result_ty)?;
                self.emit_expression_as(left, ty)?;
                self.emit_expression_as(right, ty)?;
                let instruction = match op {
                    InfixOp::Add => Op::Add(ty),
                    InfixOp::Sub => Op::Sub(ty),
                    InfixOp::Mul => Op::Mul(ty),
                    InfixOp::Div => Op::Div(ty),
                    _ => Op::Mod(ty),
                };
                self.emit(instruction, None);
                Ok(ty.size_in_bytes())
            }

            InfixOp::BitAnd | InfixOp::BitXor | InfixOp::BitOr => {
                let ty = self.number_type_of(result_ty)?;
                self.emit_expression_as(left, ty)?;
                self.emit_expression_as(right, ty)?;
                let instruction = match op {
                    InfixOp::BitAnd => Op::And(ty),
                    InfixOp::BitXor => Op::Xor(ty),
                    _ => Op::Or(ty),
                };
                self.emit(instruction, None);
                Ok(ty.size_in_bytes())
            }

            InfixOp::Shl | InfixOp::Shr => Err(self.unsupported("shift operations")),

            InfixOp::Lt | InfixOp::Le | InfixOp::Gt | InfixOp::Ge | InfixOp::Eq => {
                let ty = self.comparison_type(left, right)?;
                self.emit_expression_as(left, ty)?;
                self.emit_expression_as(right, ty)?;
                let instruction = match op {
                    InfixOp::Lt => Op::Lt(ty),
                    InfixOp::Le => Op::Le(ty),
                    InfixOp::Gt => Op::Gt(ty),
                    InfixOp::Ge => Op::Ge(ty),
                    _ => Op::Eq(ty),
                };
                self.emit(instruction, None);
                Ok(1)
            }

            InfixOp::Ne => {
                let ty = self.comparison_type(left, right)?;
                self.emit_expression_as(left, ty)?;
                self.emit_expression_as(right, ty)?;
                self.emit(Op::Eq(ty), None);
                self.emit(Op::Not, None);
                Ok(1)
            }

            InfixOp::LogicalAnd => {
                let otherwise = self.new_label();
                let end = self.new_label();
                self.emit_condition(left)?;
                self.emit(Op::Jumpz, Some(Immediate::Label(otherwise)));
                self.emit_bool(right)?;
                self.emit(Op::Jump, Some(Immediate::Label(end)));
                self.bind_label(otherwise);
                self.emit(
                    Op::LoadConst(NumberType::Uint8),
                    Some(Immediate::Value(Number::Unsigned(0))),
                );
                self.bind_label(end);
                Ok(1)
            }

            InfixOp::LogicalOr => {
                let try_right = self.new_label();
                let end = self.new_label();
                self.emit_condition(left)?;
                self.emit(Op::Jumpz, Some(Immediate::Label(try_right)));
                self.emit(
                    Op::LoadConst(NumberType::Uint8),
                    Some(Immediate::Value(Number::Unsigned(1))),
                );
                self.emit(Op::Jump, Some(Immediate::Label(end)));
                self.bind_label(try_right);
                self.emit_bool(right)?;
                self.bind_label(end);
                Ok(1)
            }
        }
    }

    /// The common machine type two comparison operands meet at.
    fn comparison_type(&self, left: ExprId, right: ExprId) -> Result<NumberType, CodegenError> {
        let a = self.number_type_of(self.program.ast.expr(left).ty)?;
        let b = self.number_type_of(self.program.ast.expr(right).ty)?;
        if a == b {
            return Ok(a);
        }
        if a.interpretation() == b.interpretation() {
            // Converting narrows, so the narrower side is the target.
            if a.size_in_bytes() >= b.size_in_bytes() {
                return Ok(b);
            }
            return Ok(a);
        }
        Ok(a)
    }

    fn emit_increment(
        &mut self,
        operand: ExprId,
        delta: i64,
        prefix: bool,
    ) -> Result<usize, CodegenError> {
        let def = self.variable_of(operand)?;
        let ty = self.number_type_of(self.program.ast.expr(operand).ty)?;
        let size = ty.size_in_bytes() as u64;
        let one = Self::typed_number(ty, 1);
        let instruction = if delta >= 0 { Op::Add(ty) } else { Op::Sub(ty) };

        if !prefix {
            // The old value stays on the stack as the expression's value.
            self.emit_variable_address(def)?;
            self.emit_value(Op::Loada, size);
        }
        self.emit_variable_address(def)?;
        self.emit_value(Op::Loada, size);
        self.emit(Op::LoadConst(ty), Some(Immediate::Value(one)));
        self.emit(instruction, None);
        self.emit_variable_address(def)?;
        self.emit_value(Op::Store, size);
        if prefix {
            self.emit_variable_address(def)?;
            self.emit_value(Op::Loada, size);
        }
        Ok(ty.size_in_bytes())
    }

    fn emit_call(&mut self, function: DefId, arguments: &[ExprId]) -> Result<usize, CodegenError> {
        let (return_type, parameters) = match self.program.ast.def(function) {
            Definition::Function {
                return_type,
                parameters,
                ..
            } => (*return_type, *parameters),
            _ => {
                return Err(CodegenError::UnresolvedReference {
                    what: "called function".to_string(),
                })
            }
        };

        let return_size = if return_type == self.program.void_type() {
            0
        } else {
            self.number_type_of(return_type)?.size_in_bytes()
        };
        if return_size > 0 {
            self.emit_value(Op::Alloc, return_size as u64);
        }

        let params: Vec<DefId> = self
            .program
            .ast
            .scope(parameters)
            .entries
            .iter()
            .map(|(_, def)| *def)
            .collect();
        let mut args_size = 0u64;
        for (argument, param) in arguments.iter().zip(&params) {
            let param_ty = match self.program.ast.def(*param) {
                Definition::Variable { ty, .. } => *ty,
                _ => {
                    return Err(CodegenError::UnresolvedReference {
                        what: "parameter definition".to_string(),
                    })
                }
            };
            let ty = self.number_type_of(param_ty)?;
            self.emit_expression_as(*argument, ty)?;
            args_size += ty.size_in_bytes() as u64;
        }

        self.emit(
            Op::LoadConst(NumberType::Uint16),
            Some(Immediate::Function(function)),
        );
        self.emit_value(Op::Call, args_size);
        Ok(return_size)
    }

    // ----- addresses -----

    fn variable_of(&self, expr: ExprId) -> Result<DefId, CodegenError> {
        match self.program.ast.expr(expr).kind {
            ExpressionKind::Variable(def) => Ok(def),
            _ => Err(CodegenError::UnresolvedReference {
                what: "assignable variable".to_string(),
            }),
        }
    }

    /// Push `frame_pointer + offset` (parameters and the return slot sit
    /// above the frame header, out of `loadr`'s reach).
    fn emit_frame_offset_address(&mut self, offset: u64) {
        self.emit_value(Op::Loadr, 0);
        self.emit(
            Op::LoadConst(NumberType::Uint16),
            Some(Immediate::Value(Number::Unsigned(offset))),
        );
        self.emit(Op::Add(NumberType::Uint16), None);
    }

    fn emit_variable_address(&mut self, def: DefId) -> Result<(), CodegenError> {
        match self.locations.get(&def).copied() {
            Some(VarLocation::Global(address)) => {
                self.emit(
                    Op::LoadConst(NumberType::Uint16),
                    Some(Immediate::Value(Number::Unsigned(address))),
                );
                Ok(())
            }
            Some(VarLocation::Local(offset)) => {
                self.emit_value(Op::Loadr, offset);
                Ok(())
            }
            Some(VarLocation::Param(offset)) => {
                self.emit_frame_offset_address(FRAME_HEADER + offset);
                Ok(())
            }
            None => Err(CodegenError::UnresolvedReference {
                what: "variable address".to_string(),
            }),
        }
    }

    // ----- fixup and encoding -----

    /// Compute every invocation's byte address, collapse pending
    /// immediates, and write the image through the memory accessor.
    fn fixup_and_encode(self) -> Result<Vec<u8>, CodegenError> {
        let mut addresses = Vec::with_capacity(self.invocations.len() + 1);
        let mut cursor = 0usize;
        for invocation in &self.invocations {
            addresses.push(cursor);
            cursor += invocation.op.encoded_size();
        }
        // Sentinel so labels bound after the last invocation resolve to
        // the end of the image.
        addresses.push(cursor);
        let total = cursor;

        let mut image = Memory::new(total).map_err(|_| CodegenError::ProgramTooLarge(total))?;
        for (index, invocation) in self.invocations.iter().enumerate() {
            let at = addresses[index];
            let opcode = self
                .instruction_set
                .opcode_of(invocation.op)
                .ok_or_else(|| CodegenError::UnknownInstruction(invocation.op.to_string()))?;
            image.write(at, NumberType::Uint8, Number::Unsigned(opcode as u64))?;

            let Some(ty) = invocation.op.immediate_type() else {
                continue;
            };
            let value = match &invocation.immediate {
                Some(Immediate::Value(value)) => *value,
                Some(Immediate::Function(def)) => {
                    let position = self.function_starts.get(def).ok_or_else(|| {
                        CodegenError::UnresolvedReference {
                            what: "function address".to_string(),
                        }
                    })?;
                    Number::Unsigned(addresses[*position] as u64)
                }
                Some(Immediate::Statement(stmt)) => {
                    let position = self.statement_starts.get(stmt).ok_or_else(|| {
                        CodegenError::UnresolvedReference {
                            what: "statement address".to_string(),
                        }
                    })?;
                    Number::Unsigned(addresses[*position] as u64)
                }
                Some(Immediate::Label(label)) => {
                    let position = self.label_positions.get(label).ok_or_else(|| {
                        CodegenError::UnresolvedReference {
                            what: "jump label".to_string(),
                        }
                    })?;
                    Number::Unsigned(addresses[*position] as u64)
                }
                None => {
                    return Err(CodegenError::UnresolvedReference {
                        what: "missing immediate".to_string(),
                    })
                }
            };
            image.write(at + 1, ty, value)?;
        }

        Ok(image.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn image(source: &str) -> Vec<u8> {
        let program = parser::parse(source).expect("program should parse");
        generate(&program, crumb::MAX_MEMORY_SIZE).expect("program should lower")
    }

    #[test]
    fn test_minimal_program_encodes() {
        let bytes = image("int main() { return 0; }");
        assert!(!bytes.is_empty());
        // Bootstrap starts with `alloc 4` for main's return slot.
        let set = InstructionSet::new();
        assert_eq!(bytes[0], set.opcode_of(Op::Alloc).unwrap());
        assert_eq!(&bytes[1..3], &[0, 4]);
    }

    #[test]
    fn test_bootstrap_calls_then_halts() {
        let bytes = image("int main() { return 0; }");
        let set = InstructionSet::new();
        // alloc(3) loadc<u16>(3) call(3) halt(1)
        assert_eq!(bytes[3], set.opcode_of(Op::LoadConst(NumberType::Uint16)).unwrap());
        let main_address = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        assert_eq!(bytes[6], set.opcode_of(Op::Call).unwrap());
        assert_eq!(bytes[9], set.opcode_of(Op::Halt).unwrap());
        // main starts right after the bootstrap with `enter`.
        assert_eq!(main_address, 10);
        assert_eq!(bytes[10], set.opcode_of(Op::Enter).unwrap());
    }

    #[test]
    fn test_globals_reserve_space_before_bootstrap() {
        let bytes = image("int x = 5; int main() { return 0; }");
        let set = InstructionSet::new();
        // alloc 4 for x, then its initializer.
        assert_eq!(bytes[0], set.opcode_of(Op::Alloc).unwrap());
        assert_eq!(&bytes[1..3], &[0, 4]);
        assert_eq!(bytes[3], set.opcode_of(Op::LoadConst(NumberType::Sint32)).unwrap());
    }

    #[test]
    fn test_switch_lowering_is_unsupported() {
        let program =
            parser::parse("int main() { switch (1) { default: ; } return 0; }").unwrap();
        match generate(&program, crumb::MAX_MEMORY_SIZE) {
            Err(CodegenError::Unsupported { construct }) => {
                assert!(construct.contains("switch"));
            }
            other => panic!("expected Unsupported, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_shift_lowering_is_unsupported() {
        let program = parser::parse("int main() { return 1 << 2; }").unwrap();
        match generate(&program, crumb::MAX_MEMORY_SIZE) {
            Err(CodegenError::Unsupported { construct }) => {
                assert!(construct.contains("shift"));
            }
            other => panic!("expected Unsupported, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_goto_jump_targets_resolve() {
        // The encoded image contains a jump whose target is inside the
        // program, not a placeholder.
        let bytes = image("int main() { goto done; done: return 0; }");
        let set = InstructionSet::new();
        let jump = set.opcode_of(Op::Jump).unwrap();
        let position = bytes.iter().position(|b| *b == jump).expect("jump emitted");
        let target = u16::from_be_bytes([bytes[position + 1], bytes[position + 2]]) as usize;
        assert!(target < bytes.len());
    }
}
