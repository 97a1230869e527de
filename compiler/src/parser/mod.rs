//! Recursive-descent parser for declarations and statements.
//!
//! The parser owns one mutable cursor, the scope stack; every method
//! that pushes a scope pops it before returning. Expressions are parsed
//! by the Pratt layer in `expr`.

mod expr;

use thiserror::Error;

use crumb::{Interpretation, NumberType};

use crate::ast::{
    Definition, Label, Program, ScopeError, ScopeId, StatementKind, StatementNode, StmtId,
    VariableType,
};
use crate::lexer::{LexError, Token, TokenKind, TokenStream};

/// Pointer size in bytes handed to the parser by default.
pub const DEFAULT_POINTER_SIZE: u16 = 4;

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("language violation at offset {offset}: {message}")]
    LanguageViolation { message: String, offset: usize },

    #[error("'{construct}' is not implemented in this dialect (offset {offset})")]
    Unimplemented { construct: String, offset: usize },

    #[error("expected an expression but found {found} at offset {offset}")]
    ExpectedExpression { found: TokenKind, offset: usize },
}

/// Parse a whole source file into a program with the default pointer size.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    parse_with(source, DEFAULT_POINTER_SIZE)
}

pub fn parse_with(source: &str, pointer_size: u16) -> Result<Program, ParseError> {
    Parser::new(source, pointer_size).run()
}

pub struct Parser<'a> {
    tokens: TokenStream<'a>,
    program: Program,
    scope_stack: Vec<ScopeId>,
    pointer_size: u16,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, pointer_size: u16) -> Self {
        let program = Program::new();
        let globals = program.globals;
        Self {
            tokens: TokenStream::new(source),
            program,
            scope_stack: vec![globals],
            pointer_size,
        }
    }

    pub fn run(mut self) -> Result<Program, ParseError> {
        while !self.tokens.check_current(TokenKind::EndOfFile)? {
            self.parse_top_level()?;
        }
        self.validate_main()?;
        Ok(self.program)
    }

    fn scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("the namespace is always on the stack")
    }

    fn violation(&mut self, message: impl Into<String>) -> ParseError {
        let offset = self
            .tokens
            .current()
            .map(|token| token.span.start)
            .unwrap_or(0);
        ParseError::LanguageViolation {
            message: message.into(),
            offset,
        }
    }

    fn unimplemented(&self, token: &Token) -> ParseError {
        ParseError::Unimplemented {
            construct: token.text().to_string(),
            offset: token.span.start,
        }
    }

    fn add_statement(&mut self, kind: StatementKind) -> StmtId {
        self.program.ast.add_stmt(StatementNode {
            kind,
            labels: Vec::new(),
            parent: None,
        })
    }

    // ----- namespace level -----

    fn parse_top_level(&mut self) -> Result<(), ParseError> {
        let current = self.tokens.current()?;
        match current.kind {
            TokenKind::Struct
            | TokenKind::Typedef
            | TokenKind::Union
            | TokenKind::Enum
            | TokenKind::Static
            | TokenKind::Extern
            | TokenKind::Auto
            | TokenKind::Register
            | TokenKind::Volatile
            | TokenKind::Signed => Err(self.unimplemented(&current)),
            _ => {
                let is_const = self.tokens.consume_if_matches(TokenKind::Const)?.is_some();
                let ty = self.parse_type()?;
                let name = self.tokens.consume(TokenKind::Identifier)?;
                if self.tokens.check_current(TokenKind::LParen)? {
                    self.parse_function(ty, &name)
                } else {
                    self.parse_global_variable(is_const, ty, &name)
                }
            }
        }
    }

    fn parse_function(
        &mut self,
        return_type: crate::ast::DefId,
        name: &Token,
    ) -> Result<(), ParseError> {
        let enclosing = self.scope();
        let parameters = self.program.ast.add_scope(Some(enclosing));
        let def = self.program.ast.add_def(Definition::Function {
            name: name.text().to_string(),
            return_type,
            parameters,
            body: None,
        });
        self.program.ast.scope_mut(parameters).owner = Some(def);
        // Defined before the body parses so recursive calls resolve.
        self.program.ast.define(enclosing, name.text(), def)?;

        self.tokens.consume(TokenKind::LParen)?;
        if !self.tokens.check_current(TokenKind::RParen)? {
            loop {
                let is_const = self.tokens.consume_if_matches(TokenKind::Const)?.is_some();
                let ty = self.parse_type()?;
                if matches!(self.program.ast.as_variable_type(ty), Some(VariableType::Void)) {
                    return Err(self.violation("parameter of type 'void'"));
                }
                let param_name = self.tokens.consume(TokenKind::Identifier)?;
                let param = self.program.ast.add_def(Definition::Variable {
                    name: param_name.text().to_string(),
                    is_const,
                    ty,
                    initializer: None,
                });
                self.program.ast.define(parameters, param_name.text(), param)?;
                if self.tokens.consume_if_matches(TokenKind::Comma)?.is_none() {
                    break;
                }
            }
        }
        self.tokens.consume(TokenKind::RParen)?;

        self.scope_stack.push(parameters);
        let body = self.parse_compound();
        self.scope_stack.pop();
        let body = body?;

        match self.program.ast.def_mut(def) {
            Definition::Function { body: slot, .. } => *slot = Some(body),
            _ => {}
        }

        self.resolve_gotos(body)?;
        self.validate_labels(body)?;
        Ok(())
    }

    fn parse_global_variable(
        &mut self,
        is_const: bool,
        ty: crate::ast::DefId,
        name: &Token,
    ) -> Result<(), ParseError> {
        if matches!(self.program.ast.as_variable_type(ty), Some(VariableType::Void)) {
            return Err(self.violation(format!("variable '{}' of type 'void'", name.text())));
        }
        let initializer = if self.tokens.consume_if_matches(TokenKind::Assign)?.is_some() {
            let value = self.parse_expression(0)?;
            let value_ty = self.program.ast.expr(value).ty;
            if !self.program.ast.can_be_converted_to(value_ty, ty) {
                return Err(self.violation(format!(
                    "initializer for '{}' has an incompatible type",
                    name.text()
                )));
            }
            Some(value)
        } else {
            None
        };
        self.tokens.consume(TokenKind::Semicolon)?;

        let scope = self.scope();
        let def = self.program.ast.add_def(Definition::Variable {
            name: name.text().to_string(),
            is_const,
            ty,
            initializer,
        });
        self.program.ast.define(scope, name.text(), def)?;
        Ok(())
    }

    // ----- types -----

    /// True when the current token can open a type specifier: `const`,
    /// `long`, `short`, `unsigned`, or a name resolving to a type.
    fn is_type_start(&mut self) -> Result<bool, ParseError> {
        let current = self.tokens.current()?;
        let starts = match current.kind {
            TokenKind::Const | TokenKind::Long | TokenKind::Short | TokenKind::Unsigned => true,
            TokenKind::Identifier
            | TokenKind::Char
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Void => match self.program.ast.look_up(self.scope(), current.text()) {
                Ok(def) => matches!(self.program.ast.def(def), Definition::Type(_)),
                Err(_) => false,
            },
            _ => false,
        };
        Ok(starts)
    }

    /// A name resolving to a type in the current scope, optionally under
    /// an `unsigned` specifier, followed by any number of `*` wrappers.
    pub(crate) fn parse_type(&mut self) -> Result<crate::ast::DefId, ParseError> {
        let mut ty = if self.tokens.consume_if_matches(TokenKind::Unsigned)?.is_some() {
            let current = self.tokens.current()?;
            let names_base = match current.kind {
                TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Void => true,
                TokenKind::Identifier => {
                    match self.program.ast.look_up(self.scope(), current.text()) {
                        Ok(def) => matches!(self.program.ast.def(def), Definition::Type(_)),
                        Err(_) => false,
                    }
                }
                _ => false,
            };
            let base = if names_base {
                let token = self.tokens.move_next()?;
                let def = self.program.ast.look_up(self.scope(), token.text())?;
                match self.program.ast.basic_number_type(def) {
                    Some(number) if number.is_integer() => NumberType::from_parts(
                        Interpretation::Unsigned,
                        number.size_in_bytes(),
                    )
                    .ok_or_else(|| ScopeError::UndefinedName {
                        name: token.text().to_string(),
                    })?,
                    _ => {
                        return Err(self.violation(format!(
                            "'unsigned' cannot be applied to '{}'",
                            token.text()
                        )))
                    }
                }
            } else {
                // Plain `unsigned` means `unsigned int`.
                NumberType::Uint32
            };
            self.program.basic_type(base)
        } else {
            let current = self.tokens.current()?;
            match current.kind {
                TokenKind::Identifier
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Void => {
                    let def = self.program.ast.look_up(self.scope(), current.text())?;
                    if !matches!(self.program.ast.def(def), Definition::Type(_)) {
                        return Err(
                            self.violation(format!("'{}' is not a type", current.text()))
                        );
                    }
                    self.tokens.move_next()?;
                    def
                }
                _ => return Err(self.violation("expected a type specifier")),
            }
        };

        while self.tokens.consume_if_matches(TokenKind::Star)?.is_some() {
            ty = self.program.ast.add_def(Definition::Type(VariableType::Pointer {
                target: ty,
                size_in_bytes: self.pointer_size,
            }));
        }
        Ok(ty)
    }

    // ----- statements -----

    fn parse_compound(&mut self) -> Result<StmtId, ParseError> {
        self.tokens.consume(TokenKind::LBrace)?;
        let scope = self.program.ast.add_scope(Some(self.scope()));
        let stmt = self.add_statement(StatementKind::Compound {
            scope,
            body: Vec::new(),
            synthetic: false,
        });
        self.scope_stack.push(scope);
        let result = self.parse_compound_body(stmt);
        self.scope_stack.pop();
        result?;
        Ok(stmt)
    }

    fn parse_compound_body(&mut self, stmt: StmtId) -> Result<(), ParseError> {
        loop {
            if self.tokens.check_current(TokenKind::RBrace)? {
                break;
            }
            if self.tokens.check_current(TokenKind::EndOfFile)? {
                self.tokens.consume(TokenKind::RBrace)?;
            }
            let child = self.parse_statement()?;
            self.program.ast.stmt_mut(child).parent = Some(stmt);
            if let StatementKind::Compound { body, .. } = &mut self.program.ast.stmt_mut(stmt).kind
            {
                body.push(child);
            }
        }
        self.tokens.consume(TokenKind::RBrace)?;
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<StmtId, ParseError> {
        let labels = self.parse_labels()?;
        let current = self.tokens.current()?;
        let stmt = match current.kind {
            TokenKind::LBrace => self.parse_compound()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Goto => self.parse_goto()?,
            TokenKind::While
            | TokenKind::For
            | TokenKind::Do
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Struct
            | TokenKind::Typedef
            | TokenKind::Union
            | TokenKind::Enum
            | TokenKind::Static
            | TokenKind::Extern
            | TokenKind::Auto
            | TokenKind::Register
            | TokenKind::Volatile
            | TokenKind::Signed => return Err(self.unimplemented(&current)),
            TokenKind::Semicolon => {
                self.tokens.move_next()?;
                self.add_statement(StatementKind::Expression { expression: None })
            }
            _ if self.is_type_start()? => self.parse_local_declaration()?,
            _ => {
                let expression = self.parse_expression(0)?;
                self.tokens.consume(TokenKind::Semicolon)?;
                self.add_statement(StatementKind::Expression {
                    expression: Some(expression),
                })
            }
        };
        if !labels.is_empty() {
            self.program.ast.stmt_mut(stmt).labels = labels;
        }
        Ok(stmt)
    }

    /// Greedily read `case <expr> :`, `default :`, and `name :` labels.
    fn parse_labels(&mut self) -> Result<Vec<Label>, ParseError> {
        let mut labels = Vec::new();
        loop {
            let current = self.tokens.current()?;
            match current.kind {
                TokenKind::Case => {
                    self.tokens.move_next()?;
                    let value = self.parse_expression(0)?;
                    self.tokens.consume(TokenKind::Colon)?;
                    labels.push(Label::Case(value));
                }
                TokenKind::Default => {
                    self.tokens.move_next()?;
                    self.tokens.consume(TokenKind::Colon)?;
                    labels.push(Label::Default);
                }
                TokenKind::Identifier if self.tokens.check_next(TokenKind::Colon)? => {
                    let token = self.tokens.move_next()?;
                    self.tokens.consume(TokenKind::Colon)?;
                    labels.push(Label::Goto(token.text().to_string()));
                }
                _ => break,
            }
        }
        Ok(labels)
    }

    fn parse_return(&mut self) -> Result<StmtId, ParseError> {
        self.tokens.consume(TokenKind::Return)?;
        let value = if self.tokens.check_current(TokenKind::Semicolon)? {
            None
        } else {
            Some(self.parse_expression(0)?)
        };
        self.tokens.consume(TokenKind::Semicolon)?;

        let function = self
            .program
            .ast
            .enclosing_function(self.scope())
            .ok_or_else(|| ParseError::LanguageViolation {
                message: "'return' outside of a function".to_string(),
                offset: 0,
            })?;
        let return_type = match self.program.ast.def(function) {
            Definition::Function { return_type, .. } => *return_type,
            _ => self.program.void_type(),
        };
        match value {
            Some(expression) => {
                let ty = self.program.ast.expr(expression).ty;
                if !self.program.ast.can_be_converted_to(ty, return_type) {
                    return Err(self.violation(
                        "return value cannot be converted to the function's return type",
                    ));
                }
            }
            None => {
                if return_type != self.program.void_type() {
                    return Err(self.violation("non-void function returns without a value"));
                }
            }
        }
        Ok(self.add_statement(StatementKind::Return { value }))
    }

    fn parse_if(&mut self) -> Result<StmtId, ParseError> {
        self.tokens.consume(TokenKind::If)?;
        self.tokens.consume(TokenKind::LParen)?;
        let condition = self.parse_expression(0)?;
        self.require_basic(condition)?;
        self.tokens.consume(TokenKind::RParen)?;

        let then_branch = self.parse_controlled_body()?;
        let else_branch = if self.tokens.consume_if_matches(TokenKind::Else)?.is_some() {
            Some(self.parse_controlled_body()?)
        } else {
            None
        };

        let stmt = self.add_statement(StatementKind::If {
            condition,
            then_branch,
            else_branch,
        });
        self.program.ast.stmt_mut(then_branch).parent = Some(stmt);
        if let Some(else_branch) = else_branch {
            self.program.ast.stmt_mut(else_branch).parent = Some(stmt);
        }
        Ok(stmt)
    }

    fn parse_switch(&mut self) -> Result<StmtId, ParseError> {
        self.tokens.consume(TokenKind::Switch)?;
        self.tokens.consume(TokenKind::LParen)?;
        let value = self.parse_expression(0)?;
        self.require_basic(value)?;
        self.tokens.consume(TokenKind::RParen)?;

        let body = self.parse_controlled_body()?;
        let stmt = self.add_statement(StatementKind::Switch { value, body });
        self.program.ast.stmt_mut(body).parent = Some(stmt);
        Ok(stmt)
    }

    fn parse_goto(&mut self) -> Result<StmtId, ParseError> {
        self.tokens.consume(TokenKind::Goto)?;
        let label = self.tokens.consume(TokenKind::Identifier)?;
        self.tokens.consume(TokenKind::Semicolon)?;
        Ok(self.add_statement(StatementKind::Goto {
            label: label.text().to_string(),
            target: None,
        }))
    }

    /// Body of a control construct; single statements get a synthetic
    /// compound (and scope) around them.
    fn parse_controlled_body(&mut self) -> Result<StmtId, ParseError> {
        if self.tokens.check_current(TokenKind::LBrace)? {
            return self.parse_compound();
        }
        let scope = self.program.ast.add_scope(Some(self.scope()));
        self.scope_stack.push(scope);
        let inner = self.parse_statement();
        self.scope_stack.pop();
        let inner = inner?;
        let stmt = self.add_statement(StatementKind::Compound {
            scope,
            body: vec![inner],
            synthetic: true,
        });
        self.program.ast.stmt_mut(inner).parent = Some(stmt);
        Ok(stmt)
    }

    fn parse_local_declaration(&mut self) -> Result<StmtId, ParseError> {
        let is_const = self.tokens.consume_if_matches(TokenKind::Const)?.is_some();
        let ty = self.parse_type()?;
        if matches!(self.program.ast.as_variable_type(ty), Some(VariableType::Void)) {
            return Err(self.violation("variable of type 'void'"));
        }
        let name = self.tokens.consume(TokenKind::Identifier)?;
        let def = self.program.ast.add_def(Definition::Variable {
            name: name.text().to_string(),
            is_const,
            ty,
            initializer: None,
        });
        let scope = self.scope();
        self.program.ast.define(scope, name.text(), def)?;

        // An initializer lowers into an assignment expression statement.
        let stmt = if self.tokens.consume_if_matches(TokenKind::Assign)?.is_some() {
            let value = self.parse_expression(0)?;
            let value_ty = self.program.ast.expr(value).ty;
            if !self.program.ast.can_be_converted_to(value_ty, ty) {
                return Err(self.violation(format!(
                    "initializer for '{}' has an incompatible type",
                    name.text()
                )));
            }
            let target = self.program.ast.add_expr(crate::ast::ExpressionNode {
                kind: crate::ast::ExpressionKind::Variable(def),
                ty,
            });
            let assignment = self.program.ast.add_expr(crate::ast::ExpressionNode {
                kind: crate::ast::ExpressionKind::Assignment { target, value },
                ty,
            });
            self.add_statement(StatementKind::Expression {
                expression: Some(assignment),
            })
        } else {
            self.add_statement(StatementKind::Expression { expression: None })
        };
        self.tokens.consume(TokenKind::Semicolon)?;
        Ok(stmt)
    }

    // ----- post-body fixups and validation -----

    /// Bind every goto in a function body to its labeled statement and
    /// check goto-label uniqueness across the function.
    fn resolve_gotos(&mut self, body: StmtId) -> Result<(), ParseError> {
        let mut targets: Vec<(String, StmtId)> = Vec::new();
        for stmt in self.program.ast.labeled_statements(body) {
            let labels = self.program.ast.stmt(stmt).labels.clone();
            for label in labels {
                if let Label::Goto(name) = label {
                    if targets.iter().any(|(existing, _)| *existing == name) {
                        return Err(self.violation(format!("duplicate label '{}'", name)));
                    }
                    targets.push((name, stmt));
                }
            }
        }

        for stmt in self.program.ast.recursive_statements(body) {
            let label = match &self.program.ast.stmt(stmt).kind {
                StatementKind::Goto { label, .. } => Some(label.clone()),
                _ => None,
            };
            let Some(label) = label else { continue };
            let target = targets
                .iter()
                .find(|(name, _)| *name == label)
                .map(|(_, target)| *target);
            let Some(target) = target else {
                return Err(self.violation(format!("goto target '{}' is not defined", label)));
            };
            if let StatementKind::Goto { target: slot, .. } =
                &mut self.program.ast.stmt_mut(stmt).kind
            {
                *slot = Some(target);
            }
        }
        Ok(())
    }

    /// `case`/`default` labels must sit inside a switch, and a case's
    /// value type must match the governing switch value's type.
    fn validate_labels(&mut self, body: StmtId) -> Result<(), ParseError> {
        for stmt in self.program.ast.labeled_statements(body) {
            let labels = self.program.ast.stmt(stmt).labels.clone();
            for label in labels {
                let case_value = match label {
                    Label::Goto(_) => continue,
                    Label::Default => None,
                    Label::Case(value) => Some(value),
                };
                let governing = self
                    .program
                    .ast
                    .statement_ancestors(stmt)
                    .into_iter()
                    .find_map(|ancestor| match self.program.ast.stmt(ancestor).kind {
                        StatementKind::Switch { value, .. } => Some(value),
                        _ => None,
                    });
                let Some(switch_value) = governing else {
                    return Err(
                        self.violation("'case' or 'default' label outside of a switch")
                    );
                };
                if let Some(case_value) = case_value {
                    let case_ty = self.program.ast.expr(case_value).ty;
                    let switch_ty = self.program.ast.expr(switch_value).ty;
                    let matches = match (
                        self.program.ast.basic_number_type(case_ty),
                        self.program.ast.basic_number_type(switch_ty),
                    ) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    };
                    if !matches {
                        return Err(self.violation(
                            "case label type does not match the switch value type",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// A function named `main` must exist, return `int`, and take no
    /// parameters.
    fn validate_main(&mut self) -> Result<(), ParseError> {
        let main = match self.program.ast.look_up(self.program.globals, "main") {
            Ok(def) => def,
            Err(_) => return Err(self.violation("program has no 'main' function")),
        };
        match self.program.ast.def(main) {
            Definition::Function {
                return_type,
                parameters,
                ..
            } => {
                let returns_int =
                    self.program.ast.basic_number_type(*return_type) == Some(NumberType::Sint32);
                let parameters = *parameters;
                if !returns_int {
                    return Err(self.violation("'main' must return 'int'"));
                }
                if !self.program.ast.scope(parameters).entries.is_empty() {
                    return Err(self.violation("'main' must not take parameters"));
                }
                Ok(())
            }
            _ => Err(self.violation("'main' is not a function")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExpressionKind, InfixOp};
    use crumb::Number;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("program should parse")
    }

    fn function_body(program: &Program, name: &str) -> StmtId {
        let def = program.ast.look_up(program.globals, name).unwrap();
        match program.ast.def(def) {
            Definition::Function { body, .. } => body.expect("function has a body"),
            _ => panic!("'{}' is not a function", name),
        }
    }

    fn body_statements(program: &Program, name: &str) -> Vec<StmtId> {
        match &program.ast.stmt(function_body(program, name)).kind {
            StatementKind::Compound { body, .. } => body.clone(),
            _ => panic!("function body is not a compound"),
        }
    }

    #[test]
    fn test_minimal_program_parses() {
        parse_ok("int main() { return 0; }");
    }

    #[test]
    fn test_global_variable_with_initializer() {
        let program = parse_ok("int x = 5; int main() { return 0; }");
        let def = program.ast.look_up(program.globals, "x").unwrap();
        match program.ast.def(def) {
            Definition::Variable { ty, initializer, .. } => {
                assert_eq!(program.ast.basic_number_type(*ty), Some(NumberType::Sint32));
                let init = initializer.expect("x has an initializer");
                match &program.ast.expr(init).kind {
                    ExpressionKind::NumberLiteral(Number::Signed(5)) => {}
                    other => panic!("expected literal 5, got {:?}", other),
                }
            }
            other => panic!("expected a variable, got {:?}", other),
        }
    }

    #[test]
    fn test_goto_forward_reference_is_bound() {
        let program = parse_ok("void f() { goto a; a: return; } int main() { return 0; }");
        let stmts = body_statements(&program, "f");
        assert_eq!(stmts.len(), 2);
        match &program.ast.stmt(stmts[0]).kind {
            StatementKind::Goto { target, .. } => assert_eq!(*target, Some(stmts[1])),
            other => panic!("expected goto, got {:?}", other),
        }
        assert!(!program.ast.stmt(stmts[1]).labels.is_empty());
    }

    #[test]
    fn test_duplicate_goto_label_is_a_violation() {
        match parse("void f() { a: ; a: ; } int main() { return 0; }") {
            Err(ParseError::LanguageViolation { message, .. }) => {
                assert!(message.contains("duplicate label"), "{}", message);
            }
            other => panic!("expected a violation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unresolved_goto_is_a_violation() {
        match parse("void f() { goto nowhere; } int main() { return 0; }") {
            Err(ParseError::LanguageViolation { message, .. }) => {
                assert!(message.contains("nowhere"), "{}", message);
            }
            other => panic!("expected a violation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_case_outside_switch_is_a_violation() {
        match parse("void f() { case 1: ; } int main() { return 0; }") {
            Err(ParseError::LanguageViolation { message, .. }) => {
                assert!(message.contains("switch"), "{}", message);
            }
            other => panic!("expected a violation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_case_inside_switch_parses() {
        parse_ok("int main() { switch (1) { case 1: ; default: ; } return 0; }");
    }

    #[test]
    fn test_case_type_must_match_switch_value() {
        match parse("int main() { switch (1) { case 1.5: ; } return 0; }") {
            Err(ParseError::LanguageViolation { message, .. }) => {
                assert!(message.contains("case label type"), "{}", message);
            }
            other => panic!("expected a violation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_main_is_a_violation() {
        match parse("int f() { return 0; }") {
            Err(ParseError::LanguageViolation { message, .. }) => {
                assert!(message.contains("main"), "{}", message);
            }
            other => panic!("expected a violation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_main_signature_is_validated() {
        assert!(parse("void main() { }").is_err());
        assert!(parse("int main(int x) { return 0; }").is_err());
    }

    #[test]
    fn test_narrowing_conversion_is_implicit_widening_is_not() {
        // Same family, source width >= destination width.
        parse_ok("int main() { short s = 5; return 0; }");
        assert!(parse("int main() { long l = 5; return 0; }").is_err());
        assert!(parse("int main() { float f = 5; return 0; }").is_err());
    }

    #[test]
    fn test_const_assignment_is_a_violation() {
        assert!(parse("int main() { const int x = 1; x = 2; return 0; }").is_err());
    }

    #[test]
    fn test_undefined_name() {
        match parse("int main() { return y; }") {
            Err(ParseError::Scope(ScopeError::UndefinedName { name })) => assert_eq!(name, "y"),
            other => panic!("expected UndefinedName, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_name_collision() {
        match parse("int x; int x; int main() { return 0; }") {
            Err(ParseError::Scope(ScopeError::NameCollision { name })) => assert_eq!(name, "x"),
            other => panic!("expected NameCollision, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unimplemented_constructs() {
        for source in [
            "struct s { int x; };",
            "typedef int t;",
            "union u { int x; };",
            "int main() { while (1) ; }",
            "int main() { for (;;) ; }",
            "int main() { break; }",
        ] {
            match parse(source) {
                Err(ParseError::Unimplemented { .. }) => {}
                other => panic!("expected Unimplemented for {:?}, got {:?}", source, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        let program = parse_ok("int main() { return 2 + 3 * 4; }");
        let stmts = body_statements(&program, "main");
        let value = match &program.ast.stmt(stmts[0]).kind {
            StatementKind::Return { value } => value.unwrap(),
            other => panic!("expected return, got {:?}", other),
        };
        match &program.ast.expr(value).kind {
            ExpressionKind::Infix { op: InfixOp::Add, right, .. } => {
                match &program.ast.expr(*right).kind {
                    ExpressionKind::Infix { op: InfixOp::Mul, .. } => {}
                    other => panic!("expected multiplication on the right, got {:?}", other),
                }
            }
            other => panic!("expected addition at the top, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let program = parse_ok("int main() { int a; int b; a = b = 1; return 0; }");
        let stmts = body_statements(&program, "main");
        let value = match &program.ast.stmt(stmts[2]).kind {
            StatementKind::Expression { expression } => expression.unwrap(),
            other => panic!("expected expression statement, got {:?}", other),
        };
        match &program.ast.expr(value).kind {
            ExpressionKind::Assignment { value: inner, .. } => {
                match &program.ast.expr(*inner).kind {
                    ExpressionKind::Assignment { .. } => {}
                    other => panic!("expected nested assignment, got {:?}", other),
                }
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_unsigned_type_specifier() {
        let program = parse_ok("unsigned x = 1u; unsigned char c; int main() { return 0; }");
        let x = program.ast.look_up(program.globals, "x").unwrap();
        match program.ast.def(x) {
            Definition::Variable { ty, .. } => {
                assert_eq!(program.ast.basic_number_type(*ty), Some(NumberType::Uint32));
            }
            other => panic!("expected a variable, got {:?}", other),
        }
        let c = program.ast.look_up(program.globals, "c").unwrap();
        match program.ast.def(c) {
            Definition::Variable { ty, .. } => {
                assert_eq!(program.ast.basic_number_type(*ty), Some(NumberType::Uint8));
            }
            other => panic!("expected a variable, got {:?}", other),
        }
    }

    #[test]
    fn test_pointer_declaration_parses_but_dereference_does_not() {
        parse_ok("int main() { int* p; return 0; }");
        assert!(parse("int main() { int x; int* p; *p = 1; return 0; }").is_err());
        assert!(parse("int main() { int x; int* p; p = &x; return 0; }").is_err());
    }

    #[test]
    fn test_synthetic_compound_wraps_single_statement_bodies() {
        let program = parse_ok("int main() { if (1) return 1; return 0; }");
        let stmts = body_statements(&program, "main");
        match &program.ast.stmt(stmts[0]).kind {
            StatementKind::If { then_branch, .. } => match &program.ast.stmt(*then_branch).kind {
                StatementKind::Compound { synthetic: true, body, .. } => assert_eq!(body.len(), 1),
                other => panic!("expected synthetic compound, got {:?}", other),
            },
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_return_type_checking_in_void_function() {
        parse_ok("void f() { return; } int main() { return 0; }");
        assert!(parse("void f() { return 1; } int main() { return 0; }").is_err());
        assert!(parse("int f() { return; } int main() { return 0; }").is_err());
    }

    #[test]
    fn test_function_scope_resolution_for_parameters() {
        parse_ok("int twice(int n) { return n + n; } int main() { return twice(21); }");
    }

    #[test]
    fn test_call_arity_and_types_are_checked() {
        assert!(parse("int f(int a) { return a; } int main() { return f(); }").is_err());
        assert!(parse("int f(int a) { return a; } int main() { return f(1, 2); }").is_err());
        assert!(parse("int f(int a) { return a; } int main() { return f(1.5); }").is_err());
    }
}
