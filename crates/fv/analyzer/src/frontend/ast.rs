// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Abstract syntax tree
//!
//! Every identifier, expression, type expression, statement and clause
//! carries a [`NodeId`] that is unique across the whole program. Side tables
//! (types, definitions, uses, enclosing functions) are keyed by these ids
//! instead of storing back-references in the tree.

use fv_common::{FileId, Span};

/// Program-wide unique node identifier
pub type NodeId = u32;

/// A named identifier occurrence in a defining position
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// A parsed source file
#[derive(Debug, Clone)]
pub struct File {
    pub file_id: FileId,
    pub path: String,
    pub package: Ident,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
    /// Expression of a `//go:build` line, if any
    pub build_constraint: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub alias: Option<Ident>,
    pub path: String,
    pub span: Span,
}

impl Import {
    /// Name under which the import is visible in the file
    pub fn local_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.name.clone(),
            None => self.path.rsplit('/').next().unwrap_or(&self.path).to_string(),
        }
    }
}

/// Top-level declarations
#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Var(Vec<VarSpec>),
    Const(Vec<ConstSpec>),
    Type(Vec<TypeSpec>),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Ident,
    pub recv: Option<Field>,
    pub type_params: Vec<TypeParamDecl>,
    pub sig: FuncTypeExpr,
    pub body: Option<Block>,
    /// Directives attached to the declaration, e.g. `noinline`
    pub pragmas: Vec<String>,
    pub span: Span,
}

impl FuncDecl {
    pub fn has_pragma(&self, name: &str) -> bool {
        self.pragmas.iter().any(|p| p == name)
    }
}

/// A parameter, result, receiver or struct field group
#[derive(Debug, Clone)]
pub struct Field {
    /// Empty for anonymous parameters and embedded fields
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncTypeExpr {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    /// Final parameter is `...T`
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct TypeParamDecl {
    pub names: Vec<Ident>,
    pub constraint: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct VarSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    /// Empty when the previous spec's expressions are repeated
    pub values: Vec<Expr>,
    pub iota: i64,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<TypeParamDecl>,
    pub alias: bool,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Type expressions
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `T`, `pkg.T`, `T[A, B]`
    Name { pkg: Option<Ident>, name: Ident, args: Vec<TypeExpr> },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    /// `len` is `None` for `[...]T`
    Array { len: Option<Box<Expr>>, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Func(FuncTypeExpr),
    Struct(Vec<Field>),
    Interface(Vec<InterfaceElem>),
    /// Variadic parameter `...T`
    Ellipsis(Box<TypeExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone)]
pub enum InterfaceElem {
    Method { name: Ident, sig: FuncTypeExpr },
    /// Embedded interface or type-set union
    Union(Vec<UnionTerm>),
}

#[derive(Debug, Clone)]
pub struct UnionTerm {
    pub tilde: bool,
    pub ty: TypeExpr,
}

/// Statements
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Define,
    Compound(BinaryOp),
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Empty,
    Expr(Expr),
    Send { chan: Expr, value: Expr },
    IncDec { target: Expr, inc: bool },
    Assign { lhs: Vec<Expr>, op: AssignOp, rhs: Vec<Expr> },
    Var(Vec<VarSpec>),
    Const(Vec<ConstSpec>),
    Type(Vec<TypeSpec>),
    Block(Block),
    If { init: Option<Box<Stmt>>, cond: Expr, then: Block, els: Option<Box<Stmt>> },
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, post: Option<Box<Stmt>>, body: Block },
    Range { key: Option<Expr>, value: Option<Expr>, define: bool, expr: Expr, body: Block },
    Switch { init: Option<Box<Stmt>>, tag: Option<Expr>, cases: Vec<CaseClause> },
    TypeSwitch { init: Option<Box<Stmt>>, binding: Option<Ident>, subject: Expr, cases: Vec<TypeCaseClause> },
    Select { cases: Vec<CommClause> },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Break(Option<Ident>),
    Continue(Option<Ident>),
    Goto(Ident),
    Fallthrough,
    Labeled { label: Ident, stmt: Box<Stmt> },
}

#[derive(Debug, Clone)]
pub struct CaseClause {
    pub id: NodeId,
    /// Empty for `default`
    pub exprs: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeCaseClause {
    pub id: NodeId,
    /// `nil` appears as a name type expression
    pub types: Vec<TypeExpr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CommClause {
    pub id: NodeId,
    /// `None` for `default`
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl CommClause {
    pub fn is_default(&self) -> bool {
        self.comm.is_none()
    }
}

/// Expressions
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Rune,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Deref,
    AddrOf,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogAnd | BinaryOp::LogOr)
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "^",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
            UnaryOp::Recv => "<-",
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyedElement {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(String),
    BasicLit { kind: LitKind, raw: String },
    /// `ty` is `None` for elided types inside an outer literal
    CompositeLit { ty: Option<Box<TypeExpr>>, elems: Vec<KeyedElement> },
    FuncLit { sig: FuncTypeExpr, body: Block },
    Paren(Box<Expr>),
    Selector { base: Box<Expr>, field: Ident },
    /// Indexing or generic instantiation with one or more indices
    Index { base: Box<Expr>, indices: Vec<Expr> },
    Slice { base: Box<Expr>, low: Option<Box<Expr>>, high: Option<Box<Expr>>, max: Option<Box<Expr>> },
    /// `ty` is `None` for `x.(type)`
    TypeAssert { base: Box<Expr>, ty: Option<Box<TypeExpr>> },
    Call { func: Box<Expr>, args: Vec<Expr>, ellipsis: bool },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// A type used in expression position: `make([]int, n)`, `[]byte(s)`
    Type(Box<TypeExpr>),
}

impl Expr {
    /// Strip any parentheses
    pub fn unparen(&self) -> &Expr {
        let mut expr = self;
        while let ExprKind::Paren(inner) = &expr.kind {
            expr = inner;
        }
        expr
    }

    /// Identifier name if this is a plain identifier
    pub fn as_ident(&self) -> Option<&str> {
        match &self.unparen().kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_ident() == Some("_")
    }

    /// Call expression parts
    pub fn as_call(&self) -> Option<(&Expr, &[Expr])> {
        match &self.unparen().kind {
            ExprKind::Call { func, args, .. } => Some((func, args)),
            _ => None,
        }
    }
}
