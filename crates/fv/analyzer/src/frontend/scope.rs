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

//! Symbols and lexical scopes

use super::ast::NodeId;
use super::types::{ConstValue, FuncId, Type};
use fv_common::Span;
use std::collections::HashMap;

pub type SymbolId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Var,
    Const,
    Type,
    Func,
    Package,
}

/// A declared entity
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub span: Span,
    /// Node id of the defining identifier
    pub decl: NodeId,
    /// Function whose body declares the symbol, `None` at package level
    pub owner: Option<FuncId>,
    pub is_param: bool,
    pub is_result: bool,
    /// Referenced from a closure other than its owner
    pub captured: bool,
    /// Operand of `&`
    pub address_taken: bool,
    /// Declared without an initializer (zero value)
    pub zero_init: bool,
    pub const_value: Option<ConstValue>,
    /// Declared function for `Func` symbols
    pub func: Option<FuncId>,
    /// Import path for `Package` symbols
    pub import_path: Option<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type, span: Span, decl: NodeId) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            span,
            decl,
            owner: None,
            is_param: false,
            is_result: false,
            captured: false,
            address_taken: false,
            zero_init: false,
            const_value: None,
            func: None,
            import_path: None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.owner.is_none() && matches!(self.kind, SymbolKind::Var)
    }

    pub fn is_local_var(&self) -> bool {
        self.owner.is_some() && matches!(self.kind, SymbolKind::Var)
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// Stack of lexical scopes inside a function body
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, SymbolId>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare in the innermost scope, returning a shadowed entry of that same scope
    pub fn declare(&mut self, name: &str, id: SymbolId) -> Option<SymbolId> {
        if name == "_" {
            return None;
        }
        if self.scopes.is_empty() {
            self.push();
        }
        self.scopes.last_mut().and_then(|scope| scope.insert(name.to_string(), id))
    }

    /// Innermost binding of a name
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    /// Binding in the innermost scope only
    pub fn lookup_current(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().and_then(|scope| scope.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x", 1);
        scopes.push();
        assert_eq!(scopes.lookup("x"), Some(1));
        assert_eq!(scopes.lookup_current("x"), None);
        scopes.declare("x", 2);
        assert_eq!(scopes.lookup("x"), Some(2));
        scopes.pop();
        assert_eq!(scopes.lookup("x"), Some(1));
    }

    #[test]
    fn test_blank_is_never_bound() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        assert_eq!(scopes.declare("_", 3), None);
        assert_eq!(scopes.lookup("_"), None);
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        assert_eq!(scopes.declare("y", 1), None);
        assert_eq!(scopes.declare("y", 4), Some(1));
    }
}
