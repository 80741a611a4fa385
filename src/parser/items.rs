//! Syntax tree produced by the front-end.
//!
//! Only what the engine needs is modelled precisely: declarations keep their specifier and
//! declarator text so generated code can re-declare them, and every node carries a [`Span`]
//! usable with the [`Rewriter`](super::rewriter::Rewriter).

use std::ops::Range;

/// Byte range plus the 1-based lines it starts and ends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            end_line: self.end_line.max(other.end_line),
        }
    }
}

#[derive(Debug)]
pub struct TranslationUnit {
    pub items: Vec<Item>,
}

impl TranslationUnit {
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(f) => Some(f),
            Item::Declaration(_) => None,
        })
    }

    pub fn declarations(&self) -> impl Iterator<Item = &VarDecl> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Item::Declaration(decls) => Some(decls),
                Item::Function(_) => None,
            })
            .flatten()
    }
}

#[derive(Debug)]
pub enum Item {
    Function(Function),
    Declaration(Vec<VarDecl>),
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    /// Specifier text of the return type, storage class removed.
    pub return_type: String,
    /// The declarator puts a `*` in front of the name (`void *f(...)`).
    pub returns_pointer: bool,
    pub is_static: bool,
    pub params: Vec<VarDecl>,
    pub body: Stmt,
    pub span: Span,
}

impl Function {
    pub fn returns_void(&self) -> bool {
        self.return_type.split_whitespace().any(|w| w == "void") && !self.returns_pointer
    }

    pub fn body_statements(&self) -> &[Stmt] {
        match &self.body.kind {
            StmtKind::Compound(stmts) => stmts,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Static,
    Extern,
    Typedef,
    Register,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Variable,
    Array,
    Function,
    FunctionPointer,
}

/// One declarator of a declaration statement, parameter list or global declaration.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    /// Type specifiers and qualifiers, e.g. `const unsigned long`.
    pub specifiers: String,
    /// Declarator text including the name, e.g. `*p`, `a[10]`, `(*cb)(int)`.
    pub declarator: String,
    /// Byte offset of the name inside `declarator`.
    pub name_offset: usize,
    pub kind: DeclKind,
    pub storage: Option<Storage>,
    pub init: Option<Initializer>,
    pub span: Span,
}

impl VarDecl {
    /// Declaration text of a variable of this type named `name`.
    pub fn declare_as(&self, name: &str) -> String {
        format!("{} {}", self.specifiers, self.declarator_with(name))
    }

    /// Declaration text of a pointer to this type named `name`.
    pub fn declare_pointer_to(&self, name: &str) -> String {
        format!("{} {}", self.specifiers, self.declarator_with(&format!("(*{name})")))
    }

    fn declarator_with(&self, replacement: &str) -> String {
        let end = self.name_offset + self.name.len();
        format!(
            "{}{}{}",
            &self.declarator[..self.name_offset],
            replacement,
            &self.declarator[end..]
        )
    }

    pub fn is_array(&self) -> bool {
        self.kind == DeclKind::Array
    }

    /// True for plain integer scalars, the types the atomic-combine primitive accepts.
    pub fn is_integral(&self) -> bool {
        const INTEGRAL: &[&str] = &[
            "char", "short", "int", "long", "unsigned", "signed", "_Bool", "bool", "const",
            "volatile", "size_t", "ssize_t", "int8_t", "int16_t", "int32_t", "int64_t",
            "uint8_t", "uint16_t", "uint32_t", "uint64_t",
        ];
        self.kind == DeclKind::Variable
            && self.declarator.trim() == self.name
            && self
                .specifiers
                .split_whitespace()
                .all(|word| INTEGRAL.contains(&word))
    }

    #[cfg(test)]
    pub(crate) fn synthetic(specifiers: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            specifiers: specifiers.to_string(),
            declarator: name.to_string(),
            name_offset: 0,
            kind: DeclKind::Variable,
            storage: None,
            init: None,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Initializer {
    Expr(Expr),
    List(Vec<Initializer>),
}

impl Initializer {
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        match self {
            Initializer::Expr(e) => e.walk(f),
            Initializer::List(items) => items.iter().for_each(|i| i.walk(f)),
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Initializer::Expr(e) => Some(e),
            Initializer::List(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Decl(Vec<VarDecl>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Compound(Vec<Stmt>),
    Decl(Vec<VarDecl>),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Switch {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Goto(String),
    Label,
    Empty,
}

impl Stmt {
    /// Visits this statement and every nested statement in source order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        f(self);
        match &self.kind {
            StmtKind::Compound(stmts) => stmts.iter().for_each(|s| s.walk(f)),
            StmtKind::If {
                then, otherwise, ..
            } => {
                then.walk(f);
                if let Some(otherwise) = otherwise {
                    otherwise.walk(f);
                }
            }
            StmtKind::For { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::Switch { body, .. } => body.walk(f),
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(String),
    Number(String),
    /// Adjacent literals already concatenated and unescaped.
    Str(String),
    Char(String),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Assign {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Postfix {
        op: String,
        operand: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
        arrow: bool,
    },
    Cast {
        ty: String,
        expr: Box<Expr>,
    },
    SizeofType(String),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Comma(Vec<Expr>),
    Paren(Box<Expr>),
}

impl Expr {
    /// Pre-order traversal over this expression and all sub-expressions.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Call { callee, args } => {
                callee.walk(f);
                args.iter().for_each(|a| a.walk(f));
            }
            ExprKind::Assign { lhs, rhs, .. } | ExprKind::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Postfix { operand, .. } => operand.walk(f),
            ExprKind::Index { base, index } => {
                base.walk(f);
                index.walk(f);
            }
            ExprKind::Member { base, .. } => base.walk(f),
            ExprKind::Cast { expr, .. } | ExprKind::Paren(expr) => expr.walk(f),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(f);
                then.walk(f);
                otherwise.walk(f);
            }
            ExprKind::Comma(exprs) => exprs.iter().for_each(|e| e.walk(f)),
            ExprKind::Ident(_)
            | ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::Char(_)
            | ExprKind::SizeofType(_) => {}
        }
    }

    /// Strips redundant parentheses.
    pub fn peel(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.peel(),
            _ => self,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.peel().kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}
