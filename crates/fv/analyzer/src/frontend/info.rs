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

//! Side tables produced by the type checker
//!
//! Everything here is keyed by AST [`NodeId`]s, symbol ids or function ids,
//! and is frozen once checking completes.

use super::ast::{Expr, ExprKind, NodeId, UnaryOp};
use super::builtins::{Builtin, Stdlib, Universe};
use super::scope::{Symbol, SymbolId};
use super::types::{ConstValue, FuncId, NamedId, Signature, Type, TypeParamId, TypeTable};
use fv_common::{FileId, Span};
use std::collections::{HashMap, HashSet};

static INVALID: Type = Type::Invalid;

/// A function, method or closure with its resolved signature
#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub id: FuncId,
    /// Display name: `f`, `T.m`, `(*T).m`, `f.func1`
    pub name: String,
    pub package: usize,
    pub file: FileId,
    /// `FuncDecl` id or function literal expression id
    pub node: NodeId,
    pub span: Span,
    /// Enclosing function of a closure
    pub parent: Option<FuncId>,
    pub sig: Signature,
    /// One entry per signature parameter, `None` when unnamed or blank
    pub params: Vec<Option<SymbolId>>,
    pub results: Vec<Option<SymbolId>>,
    pub recv: Option<SymbolId>,
    pub recv_named: Option<NamedId>,
    pub pointer_recv: bool,
    pub type_params: Vec<TypeParamId>,
    /// `//go:noinline`
    pub noinline: bool,
    pub has_body: bool,
    /// Variables of enclosing functions referenced by this closure
    pub captures: Vec<SymbolId>,
    pub closures: Vec<FuncId>,
}

impl FuncInfo {
    pub fn is_closure(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn is_method(&self) -> bool {
        self.recv_named.is_some()
    }
}

/// Resolved target of a call expression
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// Function or method with source
    Func(FuncId),
    Builtin(Builtin),
    /// Function of a modeled package
    Stdlib { pkg: String, name: String },
    /// Method of a modeled type, e.g. `sync.Mutex.Lock`
    StdMethod { type_name: String, method: String },
    /// Dynamic dispatch through an interface
    Interface { method: String },
    /// Call through a function value
    Dynamic,
    /// Function of a package without source
    External,
    Conversion(Type),
}

impl Callee {
    pub fn is_std_method(&self, type_name: &str, method: &str) -> bool {
        matches!(self, Callee::StdMethod { type_name: t, method: m } if t == type_name && m == method)
    }

    pub fn is_stdlib(&self, pkg: &str, name: &str) -> bool {
        matches!(self, Callee::Stdlib { pkg: p, name: n } if p == pkg && n == name)
    }
}

/// Meaning of a selector expression
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field,
    Method {
        named: Option<NamedId>,
        func: Option<FuncId>,
        pointer_recv: bool,
        from_interface: bool,
    },
    /// Qualified identifier of an imported package
    Package { path: String },
    /// Selection on a value of unknown type
    Unknown,
}

/// A use of a generic declaration with its type arguments
#[derive(Debug, Clone)]
pub struct Instantiation {
    pub node: NodeId,
    pub span: Span,
    pub name: String,
    pub params: Vec<TypeParamId>,
    /// `None` where the argument could not be inferred
    pub args: Vec<Option<Type>>,
}

impl Instantiation {
    pub fn is_resolved(&self) -> bool {
        self.args.iter().all(Option::is_some)
    }
}

/// Name resolution failure recorded by the checker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Problem {
    pub span: Span,
    pub message: String,
}

/// Frozen type environment of a program
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub table: TypeTable,
    pub universe: Universe,
    pub stdlib: Stdlib,
    /// Types of expressions, type expressions and defining identifiers
    pub types: HashMap<NodeId, Type>,
    pub defs: HashMap<NodeId, SymbolId>,
    pub uses: HashMap<NodeId, SymbolId>,
    pub symbols: Vec<Symbol>,
    pub functions: Vec<FuncInfo>,
    pub func_of_node: HashMap<NodeId, FuncId>,
    /// Keyed by call expression
    pub callees: HashMap<NodeId, Callee>,
    /// Keyed by selector expression
    pub selections: HashMap<NodeId, Selection>,
    pub constants: HashMap<NodeId, ConstValue>,
    pub instantiations: Vec<Instantiation>,
    /// Per-clause bindings of type switches, keyed by clause id
    pub implicits: HashMap<NodeId, SymbolId>,
    /// Expressions used in a two-value (comma-ok) form
    pub comma_ok: HashSet<NodeId>,
    pub problems: Vec<Problem>,
}

impl TypeInfo {
    pub fn new(pointer_width: u32) -> Self {
        let mut table = TypeTable::new(pointer_width);
        let universe = Universe::install(&mut table);
        let stdlib = Stdlib::install(&mut table, &universe.error);
        Self {
            table,
            universe,
            stdlib,
            types: HashMap::new(),
            defs: HashMap::new(),
            uses: HashMap::new(),
            symbols: Vec::new(),
            functions: Vec::new(),
            func_of_node: HashMap::new(),
            callees: HashMap::new(),
            selections: HashMap::new(),
            constants: HashMap::new(),
            instantiations: Vec::new(),
            implicits: HashMap::new(),
            comma_ok: HashSet::new(),
            problems: Vec::new(),
        }
    }

    pub fn type_of(&self, node: NodeId) -> &Type {
        self.types.get(&node).unwrap_or(&INVALID)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    pub fn func(&self, id: FuncId) -> &FuncInfo {
        &self.functions[id as usize]
    }

    /// Symbol referenced or defined at an identifier node
    pub fn symbol_at(&self, node: NodeId) -> Option<SymbolId> {
        self.uses.get(&node).or_else(|| self.defs.get(&node)).copied()
    }

    /// Symbol of an identifier expression
    pub fn ident_symbol(&self, expr: &Expr) -> Option<SymbolId> {
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Ident(_) => self.symbol_at(expr.id),
            ExprKind::Selector { .. } if matches!(self.selections.get(&expr.id), Some(Selection::Package { .. })) => self.symbol_at(expr.id),
            _ => None,
        }
    }

    /// Variable at the root of an access path: `x`, `x.f`, `x[i]`, `*x`
    pub fn root_symbol(&self, expr: &Expr) -> Option<SymbolId> {
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Ident(_) => self.symbol_at(expr.id),
            ExprKind::Selector { base, .. } => match self.selections.get(&expr.id) {
                Some(Selection::Field) => self.root_symbol(base),
                Some(Selection::Package { .. }) => self.symbol_at(expr.id),
                _ => None,
            },
            ExprKind::Index { base, .. } | ExprKind::Slice { base, .. } => self.root_symbol(base),
            ExprKind::Unary { op: UnaryOp::Deref, operand } => self.root_symbol(operand),
            _ => None,
        }
    }

    pub fn callee(&self, call: NodeId) -> Option<&Callee> {
        self.callees.get(&call)
    }

    pub fn const_value(&self, node: NodeId) -> Option<&ConstValue> {
        self.constants.get(&node)
    }

    pub fn const_int(&self, node: NodeId) -> Option<i128> {
        self.constants.get(&node).and_then(ConstValue::as_int)
    }

    pub fn is_comma_ok(&self, node: NodeId) -> bool {
        self.comma_ok.contains(&node)
    }

    /// Function declared or defined at a node
    pub fn func_at(&self, node: NodeId) -> Option<FuncId> {
        self.func_of_node.get(&node).copied()
    }

    pub fn type_string(&self, ty: &Type) -> String {
        self.table.type_string(ty)
    }
}
