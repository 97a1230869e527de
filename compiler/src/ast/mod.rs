//! The abstract syntax tree and its lexical scopes.
//!
//! All nodes live in one owning arena and reference each other through
//! integer handles, so parent links, goto targets, and the code
//! generator's address fixups are flat index operations. After parsing
//! completes the tree is only read.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crumb::{Number, NumberType};

macro_rules! handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(DefId);
handle!(StmtId);
handle!(ExprId);
handle!(ScopeId);

#[derive(Error, Debug, Clone)]
pub enum ScopeError {
    #[error("'{name}' is already defined in this scope")]
    NameCollision { name: String },

    #[error("'{name}' is not defined")]
    UndefinedName { name: String },
}

/// A type a variable can have.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableType {
    /// A C scalar type mapped one-to-one to a machine number type.
    Basic(NumberType),
    Void,
    /// Reserved: pointers parse but cannot be dereferenced.
    Pointer { target: DefId, size_in_bytes: u16 },
}

#[derive(Debug, Clone)]
pub enum Definition {
    Type(VariableType),
    Variable {
        name: String,
        is_const: bool,
        ty: DefId,
        initializer: Option<ExprId>,
    },
    Function {
        name: String,
        return_type: DefId,
        parameters: ScopeId,
        body: Option<StmtId>,
    },
}

/// Ordered identifier-to-definition mapping with a parent link.
#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub entries: Vec<(String, DefId)>,
    /// The function whose frame this scope belongs to, set on parameter
    /// scopes so `return` can find its enclosing function.
    pub owner: Option<DefId>,
}

/// A label attached in front of a statement.
#[derive(Debug, Clone)]
pub enum Label {
    Case(ExprId),
    Default,
    Goto(String),
}

#[derive(Debug, Clone)]
pub struct StatementNode {
    pub kind: StatementKind,
    pub labels: Vec<Label>,
    pub parent: Option<StmtId>,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Compound {
        scope: ScopeId,
        body: Vec<StmtId>,
        /// True when the block was inserted around the single-statement
        /// body of a control construct.
        synthetic: bool,
    },
    If {
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    Switch {
        value: ExprId,
        body: StmtId,
    },
    Return {
        value: Option<ExprId>,
    },
    Goto {
        label: String,
        /// Bound by the fixup pass after the function body is parsed.
        target: Option<StmtId>,
    },
    Expression {
        expression: Option<ExprId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Increment,
    Decrement,
    Dereference,
    AddressOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
}

/// An expression node; `ty` is the resolved value type.
#[derive(Debug, Clone)]
pub struct ExpressionNode {
    pub kind: ExpressionKind,
    pub ty: DefId,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    NumberLiteral(Number),
    Variable(DefId),
    Assignment { target: ExprId, value: ExprId },
    Prefix { op: PrefixOp, operand: ExprId },
    Postfix { op: PostfixOp, operand: ExprId },
    Infix { op: InfixOp, left: ExprId, right: ExprId },
    Ternary { condition: ExprId, then_value: ExprId, else_value: ExprId },
    Call { function: DefId, arguments: Vec<ExprId> },
    Subscript { base: ExprId, index: ExprId },
    Cast { operand: ExprId },
}

/// Owning arena for every node of a parsed program.
#[derive(Debug, Default)]
pub struct Ast {
    defs: Vec<Definition>,
    stmts: Vec<StatementNode>,
    exprs: Vec<ExpressionNode>,
    scopes: Vec<Scope>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_def(&mut self, def: Definition) -> DefId {
        self.defs.push(def);
        DefId(self.defs.len() as u32 - 1)
    }

    pub fn def(&self, id: DefId) -> &Definition {
        &self.defs[id.index()]
    }

    pub fn def_mut(&mut self, id: DefId) -> &mut Definition {
        &mut self.defs[id.index()]
    }

    pub fn add_stmt(&mut self, stmt: StatementNode) -> StmtId {
        self.stmts.push(stmt);
        StmtId(self.stmts.len() as u32 - 1)
    }

    pub fn stmt(&self, id: StmtId) -> &StatementNode {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StatementNode {
        &mut self.stmts[id.index()]
    }

    pub fn add_expr(&mut self, expr: ExpressionNode) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn expr(&self, id: ExprId) -> &ExpressionNode {
        &self.exprs[id.index()]
    }

    pub fn add_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            entries: Vec::new(),
            owner: None,
        });
        ScopeId(self.scopes.len() as u32 - 1)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Add a definition under a name; names are unique per scope.
    pub fn define(&mut self, scope: ScopeId, name: &str, def: DefId) -> Result<(), ScopeError> {
        if self.scopes[scope.index()].entries.iter().any(|(n, _)| n == name) {
            return Err(ScopeError::NameCollision {
                name: name.to_string(),
            });
        }
        self.scopes[scope.index()].entries.push((name.to_string(), def));
        Ok(())
    }

    /// Resolve a name, walking parent scopes up to the namespace.
    pub fn look_up(&self, scope: ScopeId, name: &str) -> Result<DefId, ScopeError> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.index()];
            if let Some((_, def)) = scope.entries.iter().find(|(n, _)| n == name) {
                return Ok(*def);
            }
            cursor = scope.parent;
        }
        Err(ScopeError::UndefinedName {
            name: name.to_string(),
        })
    }

    /// The function owning the frame this scope lives in, if any.
    pub fn enclosing_function(&self, scope: ScopeId) -> Option<DefId> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.index()];
            if let Some(owner) = scope.owner {
                return Some(owner);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn as_variable_type(&self, def: DefId) -> Option<&VariableType> {
        match self.def(def) {
            Definition::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// The machine number type behind a basic type definition.
    pub fn basic_number_type(&self, def: DefId) -> Option<NumberType> {
        match self.as_variable_type(def)? {
            VariableType::Basic(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn type_size(&self, def: DefId) -> usize {
        match self.as_variable_type(def) {
            Some(VariableType::Basic(ty)) => ty.size_in_bytes(),
            Some(VariableType::Void) | None => 0,
            Some(VariableType::Pointer { size_in_bytes, .. }) => *size_in_bytes as usize,
        }
    }

    /// Implicit conversion: both sides basic, same number-type family,
    /// source at least as wide as the destination. Nothing else converts.
    pub fn can_be_converted_to(&self, from: DefId, to: DefId) -> bool {
        if from == to {
            return true;
        }
        match (self.basic_number_type(from), self.basic_number_type(to)) {
            (Some(source), Some(dest)) => {
                source.interpretation() == dest.interpretation()
                    && source.size_in_bytes() >= dest.size_in_bytes()
            }
            _ => false,
        }
    }

    /// Direct child statements of a statement.
    pub fn statement_children(&self, id: StmtId) -> Vec<StmtId> {
        match &self.stmt(id).kind {
            StatementKind::Compound { body, .. } => body.clone(),
            StatementKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                let mut children = vec![*then_branch];
                children.extend(else_branch);
                children
            }
            StatementKind::Switch { body, .. } => vec![*body],
            _ => Vec::new(),
        }
    }

    /// All statements in a subtree, root first.
    pub fn recursive_statements(&self, root: StmtId) -> Vec<StmtId> {
        let mut result = Vec::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            result.push(id);
            pending.extend(self.statement_children(id));
        }
        result
    }

    /// Statements in a subtree that carry at least one label.
    pub fn labeled_statements(&self, root: StmtId) -> Vec<StmtId> {
        self.recursive_statements(root)
            .into_iter()
            .filter(|id| !self.stmt(*id).labels.is_empty())
            .collect()
    }

    /// Parent chain of a statement, nearest first.
    pub fn statement_ancestors(&self, id: StmtId) -> Vec<StmtId> {
        let mut result = Vec::new();
        let mut cursor = self.stmt(id).parent;
        while let Some(parent) = cursor {
            result.push(parent);
            cursor = self.stmt(parent).parent;
        }
        result
    }
}

/// A parsed program: the arena plus its global scope (the namespace).
#[derive(Debug)]
pub struct Program {
    pub ast: Ast,
    pub globals: ScopeId,
    interned_basics: Vec<(NumberType, DefId)>,
    void_type: DefId,
}

/// The builtin type names always present in the namespace.
pub const BUILTIN_TYPES: &[(&str, NumberType)] = &[
    ("char", NumberType::Uint8),
    ("short", NumberType::Sint16),
    ("int", NumberType::Sint32),
    ("long", NumberType::Sint64),
    ("float", NumberType::Fp32),
    ("double", NumberType::Fp64),
];

impl Program {
    pub fn new() -> Self {
        let mut ast = Ast::new();
        let globals = ast.add_scope(None);
        let mut interned_basics = Vec::new();

        for (name, ty) in BUILTIN_TYPES {
            let def = ast.add_def(Definition::Type(VariableType::Basic(*ty)));
            ast.define(globals, name, def)
                .expect("builtin names are distinct");
            interned_basics.push((*ty, def));
        }
        let void_type = ast.add_def(Definition::Type(VariableType::Void));
        ast.define(globals, "void", void_type)
            .expect("builtin names are distinct");

        Self {
            ast,
            globals,
            interned_basics,
            void_type,
        }
    }

    /// The interned type definition for a machine number type. Types
    /// without a builtin name (the unsigned widths) are added to the
    /// arena on first use, without a namespace entry.
    pub fn basic_type(&mut self, ty: NumberType) -> DefId {
        if let Some((_, def)) = self.interned_basics.iter().find(|(t, _)| *t == ty) {
            return *def;
        }
        let def = self.ast.add_def(Definition::Type(VariableType::Basic(ty)));
        self.interned_basics.push((ty, def));
        def
    }

    pub fn void_type(&self) -> DefId {
        self.void_type
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
