//! Pratt expression parsing.
//!
//! `parse_expression` dispatches on a prefix parselet for the current
//! token, then folds in infix parselets while their precedence binds
//! strictly tighter than the caller's. Precedence levels follow C;
//! right-associative parselets recurse one level lower.

use crumb::{Interpretation, Number, NumberType};

use crate::ast::{
    Definition, ExpressionKind, ExpressionNode, ExprId, InfixOp, PostfixOp, PrefixOp,
};
use crate::lexer::{TokenKind, TokenValue};
use crate::parser::{ParseError, Parser};

const PREC_SUFFIX: u8 = 15;
const PREC_PREFIX: u8 = 14;
const PREC_MUL: u8 = 12;
const PREC_ADD: u8 = 11;
const PREC_SHIFT: u8 = 10;
const PREC_RELATIONAL: u8 = 9;
const PREC_EQUALITY: u8 = 8;
const PREC_BIT_AND: u8 = 7;
const PREC_BIT_XOR: u8 = 6;
const PREC_BIT_OR: u8 = 5;
const PREC_LOGICAL_AND: u8 = 4;
const PREC_LOGICAL_OR: u8 = 3;
const PREC_ASSIGN: u8 = 2;

enum InfixParselet {
    Binary { op: InfixOp },
    Assign { op: Option<InfixOp> },
    Ternary,
    Call,
    Subscript,
    Postfix(PostfixOp),
}

struct InfixInfo {
    precedence: u8,
    parselet: InfixParselet,
}

fn infix_info(kind: TokenKind) -> Option<InfixInfo> {
    let info = |precedence, parselet| Some(InfixInfo { precedence, parselet });
    let binary = |precedence, op| info(precedence, InfixParselet::Binary { op });
    let assign = |op| info(PREC_ASSIGN, InfixParselet::Assign { op });
    match kind {
        TokenKind::LParen => info(PREC_SUFFIX, InfixParselet::Call),
        TokenKind::LBracket => info(PREC_SUFFIX, InfixParselet::Subscript),
        TokenKind::Increment => info(PREC_SUFFIX, InfixParselet::Postfix(PostfixOp::Increment)),
        TokenKind::Decrement => info(PREC_SUFFIX, InfixParselet::Postfix(PostfixOp::Decrement)),

        TokenKind::Star => binary(PREC_MUL, InfixOp::Mul),
        TokenKind::Slash => binary(PREC_MUL, InfixOp::Div),
        TokenKind::Percent => binary(PREC_MUL, InfixOp::Mod),
        TokenKind::Plus => binary(PREC_ADD, InfixOp::Add),
        TokenKind::Minus => binary(PREC_ADD, InfixOp::Sub),
        TokenKind::Shl => binary(PREC_SHIFT, InfixOp::Shl),
        TokenKind::Shr => binary(PREC_SHIFT, InfixOp::Shr),
        TokenKind::Lt => binary(PREC_RELATIONAL, InfixOp::Lt),
        TokenKind::Le => binary(PREC_RELATIONAL, InfixOp::Le),
        TokenKind::Gt => binary(PREC_RELATIONAL, InfixOp::Gt),
        TokenKind::Ge => binary(PREC_RELATIONAL, InfixOp::Ge),
        TokenKind::EqEq => binary(PREC_EQUALITY, InfixOp::Eq),
        TokenKind::Ne => binary(PREC_EQUALITY, InfixOp::Ne),
        TokenKind::Amp => binary(PREC_BIT_AND, InfixOp::BitAnd),
        TokenKind::Caret => binary(PREC_BIT_XOR, InfixOp::BitXor),
        TokenKind::Pipe => binary(PREC_BIT_OR, InfixOp::BitOr),
        TokenKind::AndAnd => binary(PREC_LOGICAL_AND, InfixOp::LogicalAnd),
        TokenKind::OrOr => binary(PREC_LOGICAL_OR, InfixOp::LogicalOr),

        TokenKind::Question => info(PREC_ASSIGN, InfixParselet::Ternary),
        TokenKind::Assign => assign(None),
        TokenKind::PlusAssign => assign(Some(InfixOp::Add)),
        TokenKind::MinusAssign => assign(Some(InfixOp::Sub)),
        TokenKind::StarAssign => assign(Some(InfixOp::Mul)),
        TokenKind::SlashAssign => assign(Some(InfixOp::Div)),
        TokenKind::PercentAssign => assign(Some(InfixOp::Mod)),
        TokenKind::ShlAssign => assign(Some(InfixOp::Shl)),
        TokenKind::ShrAssign => assign(Some(InfixOp::Shr)),
        TokenKind::AmpAssign => assign(Some(InfixOp::BitAnd)),
        TokenKind::CaretAssign => assign(Some(InfixOp::BitXor)),
        TokenKind::PipeAssign => assign(Some(InfixOp::BitOr)),

        _ => None,
    }
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_expression(&mut self, min_precedence: u8) -> Result<ExprId, ParseError> {
        let mut left = self.parse_prefix()?;
        loop {
            let kind = self.tokens.current()?.kind;
            let Some(info) = infix_info(kind) else { break };
            if info.precedence <= min_precedence {
                break;
            }
            left = self.parse_infix(left, info)?;
        }
        Ok(left)
    }

    fn add_expr(&mut self, kind: ExpressionKind, ty: crate::ast::DefId) -> ExprId {
        self.program.ast.add_expr(ExpressionNode { kind, ty })
    }

    // ----- prefix parselets -----

    fn parse_prefix(&mut self) -> Result<ExprId, ParseError> {
        let current = self.tokens.current()?;
        match current.kind {
            TokenKind::IntLiteral | TokenKind::FloatLiteral | TokenKind::CharLiteral => {
                self.parse_literal()
            }
            TokenKind::Identifier => self.parse_name(),
            TokenKind::Plus => self.parse_prefix_operator(PrefixOp::Plus),
            TokenKind::Minus => self.parse_prefix_operator(PrefixOp::Minus),
            TokenKind::Bang => self.parse_prefix_operator(PrefixOp::Not),
            TokenKind::Tilde => self.parse_prefix_operator(PrefixOp::BitNot),
            TokenKind::Increment => self.parse_prefix_operator(PrefixOp::Increment),
            TokenKind::Decrement => self.parse_prefix_operator(PrefixOp::Decrement),
            TokenKind::Star => self.parse_prefix_operator(PrefixOp::Dereference),
            TokenKind::Amp => self.parse_prefix_operator(PrefixOp::AddressOf),
            TokenKind::Sizeof => self.parse_sizeof(),
            TokenKind::LParen => self.parse_group_or_cast(),
            _ => Err(ParseError::ExpectedExpression {
                found: current.kind,
                offset: current.span.start,
            }),
        }
    }

    /// Literal token into a number-literal expression carrying the
    /// decoded value and the type mapped from its number type.
    fn parse_literal(&mut self) -> Result<ExprId, ParseError> {
        let token = self.tokens.move_next()?;
        let (number, ty) = match token.value {
            TokenValue::Integer { value, ty } => match ty.interpretation() {
                Interpretation::Unsigned => (Number::Unsigned(value), ty),
                _ => (Number::Signed(value as i64), ty),
            },
            TokenValue::Float { value, ty } => (Number::Float(value), ty),
            TokenValue::Char(code) => (Number::Unsigned(code as u64), NumberType::Uint8),
            _ => {
                return Err(ParseError::ExpectedExpression {
                    found: token.kind,
                    offset: token.span.start,
                })
            }
        };
        let ty = self.program.basic_type(ty);
        Ok(self.add_expr(ExpressionKind::NumberLiteral(number), ty))
    }

    fn parse_name(&mut self) -> Result<ExprId, ParseError> {
        let token = self.tokens.move_next()?;
        let def = self.program.ast.look_up(self.scope(), token.text())?;
        let ty = match self.program.ast.def(def) {
            Definition::Variable { ty, .. } => *ty,
            // A function designator; only meaningful under a call.
            Definition::Function { return_type, .. } => *return_type,
            Definition::Type(_) => {
                return Err(
                    self.violation(format!("'{}' is a type, not a value", token.text()))
                )
            }
        };
        Ok(self.add_expr(ExpressionKind::Variable(def), ty))
    }

    fn parse_prefix_operator(&mut self, op: PrefixOp) -> Result<ExprId, ParseError> {
        self.tokens.move_next()?;
        let operand = self.parse_expression(PREC_PREFIX - 1)?;
        let operand_ty = self.program.ast.expr(operand).ty;
        let ty = match op {
            PrefixOp::Plus | PrefixOp::Minus => {
                self.require_basic(operand)?;
                operand_ty
            }
            PrefixOp::Not => {
                self.require_basic(operand)?;
                self.program.basic_type(NumberType::Uint8)
            }
            PrefixOp::BitNot => {
                let number = self.require_basic(operand)?;
                if !number.is_integer() {
                    return Err(self.violation("'~' needs an integer operand"));
                }
                operand_ty
            }
            PrefixOp::Increment | PrefixOp::Decrement => {
                self.require_lvalue(operand)?;
                self.require_basic(operand)?;
                operand_ty
            }
            PrefixOp::Dereference | PrefixOp::AddressOf => {
                let node = self.add_expr(ExpressionKind::Prefix { op, operand }, operand_ty);
                let _ = node;
                return Err(self.violation("pointer operations are not supported"));
            }
        };
        Ok(self.add_expr(ExpressionKind::Prefix { op, operand }, ty))
    }

    /// `sizeof expr` folds to an `int` literal; the operand's type is
    /// already resolved by the time it parses.
    fn parse_sizeof(&mut self) -> Result<ExprId, ParseError> {
        self.tokens.move_next()?;
        let operand = self.parse_expression(PREC_PREFIX - 1)?;
        let size = self.program.ast.type_size(self.program.ast.expr(operand).ty);
        let ty = self.program.basic_type(NumberType::Sint32);
        Ok(self.add_expr(ExpressionKind::NumberLiteral(Number::Signed(size as i64)), ty))
    }

    /// `(` opens either a parenthesized group or a C cast, decided by a
    /// type-specifier lookahead.
    fn parse_group_or_cast(&mut self) -> Result<ExprId, ParseError> {
        self.tokens.move_next()?;
        if self.is_type_start()? {
            let ty = self.parse_type()?;
            self.tokens.consume(TokenKind::RParen)?;
            let operand = self.parse_expression(PREC_PREFIX - 1)?;
            let operand_ty = self.program.ast.expr(operand).ty;
            if self.program.ast.basic_number_type(ty).is_none()
                || self.program.ast.basic_number_type(operand_ty).is_none()
            {
                return Err(self.violation("casts are defined between basic types only"));
            }
            Ok(self.add_expr(ExpressionKind::Cast { operand }, ty))
        } else {
            let inner = self.parse_expression(0)?;
            self.tokens.consume(TokenKind::RParen)?;
            Ok(inner)
        }
    }

    // ----- infix parselets -----

    fn parse_infix(&mut self, left: ExprId, info: InfixInfo) -> Result<ExprId, ParseError> {
        match info.parselet {
            InfixParselet::Binary { op } => {
                self.tokens.move_next()?;
                let right = self.parse_expression(info.precedence)?;
                self.type_infix(op, left, right)
            }
            InfixParselet::Assign { op } => {
                self.tokens.move_next()?;
                let value = self.parse_expression(info.precedence - 1)?;
                let target_ty = self.program.ast.expr(left).ty;
                let def = self.require_lvalue(left)?;
                // Compound assignment desugars over a fresh read of the
                // target; plain variables make the re-read safe.
                let value = match op {
                    None => value,
                    Some(op) => {
                        let read = self.add_expr(ExpressionKind::Variable(def), target_ty);
                        self.type_infix(op, read, value)?
                    }
                };
                let value_ty = self.program.ast.expr(value).ty;
                if !self.program.ast.can_be_converted_to(value_ty, target_ty) {
                    return Err(self.violation("assigned value has an incompatible type"));
                }
                Ok(self.add_expr(ExpressionKind::Assignment { target: left, value }, target_ty))
            }
            InfixParselet::Ternary => {
                self.tokens.move_next()?;
                self.require_basic(left)?;
                let then_value = self.parse_expression(PREC_ASSIGN - 1)?;
                self.tokens.consume(TokenKind::Colon)?;
                let else_value = self.parse_expression(PREC_ASSIGN - 1)?;
                let ty = self.common_type(then_value, else_value)?;
                Ok(self.add_expr(
                    ExpressionKind::Ternary {
                        condition: left,
                        then_value,
                        else_value,
                    },
                    ty,
                ))
            }
            InfixParselet::Call => self.parse_call(left),
            InfixParselet::Subscript => {
                self.tokens.move_next()?;
                let index = self.parse_expression(0)?;
                self.tokens.consume(TokenKind::RBracket)?;
                let base_ty = self.program.ast.expr(left).ty;
                let node = self.add_expr(ExpressionKind::Subscript { base: left, index }, base_ty);
                let _ = node;
                Err(self.violation("array subscription is not supported"))
            }
            InfixParselet::Postfix(op) => {
                self.tokens.move_next()?;
                self.require_lvalue(left)?;
                self.require_basic(left)?;
                let ty = self.program.ast.expr(left).ty;
                Ok(self.add_expr(ExpressionKind::Postfix { op, operand: left }, ty))
            }
        }
    }

    fn parse_call(&mut self, callee: ExprId) -> Result<ExprId, ParseError> {
        self.tokens.move_next()?;
        let function = match self.program.ast.expr(callee).kind {
            ExpressionKind::Variable(def)
                if matches!(self.program.ast.def(def), Definition::Function { .. }) =>
            {
                def
            }
            _ => return Err(self.violation("call target is not a function")),
        };

        let mut arguments = Vec::new();
        if !self.tokens.check_current(TokenKind::RParen)? {
            loop {
                arguments.push(self.parse_expression(PREC_ASSIGN - 1)?);
                if self.tokens.consume_if_matches(TokenKind::Comma)?.is_none() {
                    break;
                }
            }
        }
        self.tokens.consume(TokenKind::RParen)?;

        let (return_type, parameters) = match self.program.ast.def(function) {
            Definition::Function {
                return_type,
                parameters,
                ..
            } => (*return_type, *parameters),
            _ => return Err(self.violation("call target is not a function")),
        };
        let params: Vec<_> = self
            .program
            .ast
            .scope(parameters)
            .entries
            .iter()
            .map(|(_, def)| *def)
            .collect();
        if params.len() != arguments.len() {
            return Err(self.violation(format!(
                "call passes {} arguments but the function takes {}",
                arguments.len(),
                params.len()
            )));
        }
        for (argument, param) in arguments.iter().zip(&params) {
            let param_ty = match self.program.ast.def(*param) {
                Definition::Variable { ty, .. } => *ty,
                _ => continue,
            };
            let argument_ty = self.program.ast.expr(*argument).ty;
            if !self.program.ast.can_be_converted_to(argument_ty, param_ty) {
                return Err(self.violation("argument has an incompatible type"));
            }
        }

        Ok(self.add_expr(ExpressionKind::Call { function, arguments }, return_type))
    }

    // ----- typing helpers -----

    /// The operand's basic machine type, or a violation.
    pub(crate) fn require_basic(&mut self, expr: ExprId) -> Result<NumberType, ParseError> {
        let ty = self.program.ast.expr(expr).ty;
        self.program
            .ast
            .basic_number_type(ty)
            .ok_or_else(|| self.violation("expected a value of a basic type"))
    }

    /// The variable definition behind an assignable expression.
    fn require_lvalue(&mut self, expr: ExprId) -> Result<crate::ast::DefId, ParseError> {
        match self.program.ast.expr(expr).kind {
            ExpressionKind::Variable(def) => match self.program.ast.def(def) {
                Definition::Variable { is_const: false, .. } => Ok(def),
                Definition::Variable { is_const: true, .. } => {
                    Err(self.violation("assignment to a constant"))
                }
                _ => Err(self.violation("expected a variable")),
            },
            _ => Err(self.violation("expression is not assignable")),
        }
    }

    /// Unify two operand types through one-way implicit conversion.
    fn common_type(&mut self, a: ExprId, b: ExprId) -> Result<crate::ast::DefId, ParseError> {
        let ta = self.program.ast.expr(a).ty;
        let tb = self.program.ast.expr(b).ty;
        if ta == tb {
            Ok(ta)
        } else if self.program.ast.can_be_converted_to(ta, tb) {
            Ok(tb)
        } else if self.program.ast.can_be_converted_to(tb, ta) {
            Ok(ta)
        } else {
            Err(self.violation("incompatible operand types"))
        }
    }

    /// Build a typed infix node, validating operands per operator class.
    fn type_infix(&mut self, op: InfixOp, left: ExprId, right: ExprId) -> Result<ExprId, ParseError> {
        let ty = match op {
            InfixOp::Add | InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod => {
                self.require_basic(left)?;
                self.require_basic(right)?;
                self.common_type(left, right)?
            }
            InfixOp::Shl | InfixOp::Shr => {
                if !self.require_basic(left)?.is_integer()
                    || !self.require_basic(right)?.is_integer()
                {
                    return Err(self.violation("shift operands must be integers"));
                }
                self.program.ast.expr(left).ty
            }
            InfixOp::BitAnd | InfixOp::BitXor | InfixOp::BitOr => {
                if !self.require_basic(left)?.is_integer()
                    || !self.require_basic(right)?.is_integer()
                {
                    return Err(self.violation("bitwise operands must be integers"));
                }
                self.common_type(left, right)?
            }
            InfixOp::Lt
            | InfixOp::Le
            | InfixOp::Gt
            | InfixOp::Ge
            | InfixOp::Eq
            | InfixOp::Ne => {
                self.require_basic(left)?;
                self.require_basic(right)?;
                self.common_type(left, right)?;
                self.program.basic_type(NumberType::Uint8)
            }
            InfixOp::LogicalAnd | InfixOp::LogicalOr => {
                self.require_basic(left)?;
                self.require_basic(right)?;
                self.program.basic_type(NumberType::Uint8)
            }
        };
        Ok(self.add_expr(ExpressionKind::Infix { op, left, right }, ty))
    }
}
