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

//! Local definitions and uses of CFG nodes

use super::Payload;
use crate::frontend::ast::{AssignOp, Block, Expr, ExprKind, FuncTypeExpr, NodeId, Stmt, StmtKind};
use crate::frontend::info::TypeInfo;
use crate::frontend::scope::SymbolId;
use crate::frontend::types::FuncId;
use crate::frontend::visit::{Visitor, walk_expr};
use std::collections::BTreeSet;

/// Variables of `func` written and read when a node executes
pub fn node_effects(info: &TypeInfo, func: FuncId, payload: Payload<'_>) -> (BTreeSet<SymbolId>, BTreeSet<SymbolId>) {
    let mut effects = Effects {
        info,
        func,
        defs: BTreeSet::new(),
        uses: BTreeSet::new(),
    };
    match payload {
        Payload::None => {}
        Payload::Stmt(stmt) => effects.stmt(stmt),
        Payload::Cond(expr) | Payload::Tag(expr) | Payload::Deferred(expr) => effects.read(expr),
        Payload::Range(stmt) => {
            if let StmtKind::Range { key, value, define, expr, .. } = &stmt.kind {
                effects.read(expr);
                for target in [key, value].into_iter().flatten() {
                    if *define {
                        effects.define(target.id);
                    } else {
                        effects.write(target, false);
                    }
                }
            }
        }
        Payload::Case(case) => {
            for expr in &case.exprs {
                effects.read(expr);
            }
        }
        Payload::TypeCase(case) => {
            if let Some(&sym) = info.implicits.get(&case.id) {
                effects.def_symbol(sym);
            }
        }
        Payload::Comm(clause) => {
            if let Some(comm) = &clause.comm {
                effects.stmt(comm);
            }
        }
    }
    (effects.defs, effects.uses)
}

/// Local variables read by an expression, including closure captures
pub fn expr_uses(info: &TypeInfo, func: FuncId, expr: &Expr) -> BTreeSet<SymbolId> {
    let mut effects = Effects {
        info,
        func,
        defs: BTreeSet::new(),
        uses: BTreeSet::new(),
    };
    effects.read(expr);
    effects.uses
}

/// Expressions evaluated at a node, in evaluation order
///
/// Assignment targets are included; function literal bodies are not entered.
pub fn payload_exprs<'p>(payload: Payload<'p>) -> Vec<&'p Expr> {
    match payload {
        Payload::None | Payload::TypeCase(_) => Vec::new(),
        Payload::Stmt(stmt) => stmt_exprs(stmt),
        Payload::Cond(expr) | Payload::Tag(expr) | Payload::Deferred(expr) => vec![expr],
        Payload::Range(stmt) => match &stmt.kind {
            StmtKind::Range { key, value, expr, .. } => {
                let mut exprs = vec![expr];
                exprs.extend(key.iter().chain(value.iter()));
                exprs
            }
            _ => Vec::new(),
        },
        Payload::Case(case) => case.exprs.iter().collect(),
        Payload::Comm(clause) => clause.comm.as_deref().map(stmt_exprs).unwrap_or_default(),
    }
}

fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match &stmt.kind {
        StmtKind::Expr(expr) | StmtKind::Go(expr) | StmtKind::Defer(expr) => vec![expr],
        StmtKind::Send { chan, value } => vec![chan, value],
        StmtKind::IncDec { target, .. } => vec![target],
        StmtKind::Assign { lhs, rhs, .. } => rhs.iter().chain(lhs.iter()).collect(),
        StmtKind::Var(specs) => specs.iter().flat_map(|spec| spec.values.iter()).collect(),
        StmtKind::Return(exprs) => exprs.iter().collect(),
        _ => Vec::new(),
    }
}

struct Effects<'i> {
    info: &'i TypeInfo,
    func: FuncId,
    defs: BTreeSet<SymbolId>,
    uses: BTreeSet<SymbolId>,
}

impl Effects<'_> {
    fn is_local(&self, sym: SymbolId) -> bool {
        let symbol = self.info.symbol(sym);
        symbol.is_local_var() && symbol.owner == Some(self.func) && !symbol.is_blank()
    }

    fn def_symbol(&mut self, sym: SymbolId) {
        if self.is_local(sym) {
            self.defs.insert(sym);
        }
    }

    fn define(&mut self, node: NodeId) {
        if let Some(sym) = self.info.symbol_at(node) {
            self.def_symbol(sym);
        }
    }

    fn read(&mut self, expr: &Expr) {
        let mut reader = Reader { effects: self };
        reader.visit_expr(expr);
    }

    /// Assignment target; `compound` targets are read as well
    fn write(&mut self, target: &Expr, compound: bool) {
        let target = target.unparen();
        match &target.kind {
            ExprKind::Ident(_) => {
                if let Some(sym) = self.info.symbol_at(target.id) {
                    if self.is_local(sym) {
                        self.defs.insert(sym);
                        if compound {
                            self.uses.insert(sym);
                        }
                    }
                }
            }
            // partial writes through fields, elements and pointers read their base
            _ => self.read(target),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Go(expr) | StmtKind::Defer(expr) => self.read(expr),
            StmtKind::Send { chan, value } => {
                self.read(chan);
                self.read(value);
            }
            StmtKind::IncDec { target, .. } => self.write(target, true),
            StmtKind::Assign { lhs, op, rhs } => {
                for expr in rhs {
                    self.read(expr);
                }
                let compound = matches!(op, AssignOp::Compound(_));
                for target in lhs {
                    self.write(target, compound);
                }
            }
            StmtKind::Var(specs) => {
                for spec in specs {
                    for value in &spec.values {
                        self.read(value);
                    }
                    for name in &spec.names {
                        self.define(name.id);
                    }
                }
            }
            StmtKind::Return(exprs) => {
                for expr in exprs {
                    self.read(expr);
                }
                let results: Vec<SymbolId> = self.info.func(self.func).results.iter().flatten().copied().collect();
                for sym in results {
                    if self.is_local(sym) {
                        self.uses.insert(sym);
                    }
                }
            }
            _ => {}
        }
    }
}

struct Reader<'e, 'i> {
    effects: &'e mut Effects<'i>,
}

impl<'ast> Visitor<'ast> for Reader<'_, '_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        if let ExprKind::Ident(_) = &expr.kind {
            if let Some(sym) = self.effects.info.symbol_at(expr.id) {
                if self.effects.is_local(sym) {
                    self.effects.uses.insert(sym);
                }
            }
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {
        if let Some(closure) = self.effects.info.func_at(expr.id) {
            let captures = self.effects.info.func(closure).captures.clone();
            for sym in captures {
                if self.effects.is_local(sym) {
                    self.effects.uses.insert(sym);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{NodeLabel, build_cfg};
    use crate::frontend::Program;

    fn names(program: &Program, set: &BTreeSet<SymbolId>) -> Vec<String> {
        set.iter().map(|&s| program.info.symbol(s).name.clone()).collect()
    }

    #[test]
    fn test_assignment_effects() {
        let source = "package main\nvar g int\nfunc f(a int) int {\n\tx := a + g\n\tx += 1\n\tp := &x\n\t*p = 3\n\treturn x\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let stmts: Vec<_> = cfg.nodes.iter().filter(|n| n.label == NodeLabel::Stmt).collect();
        assert_eq!(names(&program, &stmts[0].defs), vec!["x"]);
        assert_eq!(names(&program, &stmts[0].uses), vec!["a"]);
        assert_eq!(names(&program, &stmts[1].defs), vec!["x"]);
        assert_eq!(names(&program, &stmts[1].uses), vec!["x"]);
        assert!(stmts[3].defs.is_empty());
        assert_eq!(names(&program, &stmts[3].uses), vec!["p"]);
    }

    #[test]
    fn test_closure_reads_captures() {
        let source = "package main\nfunc f() int {\n\tn := 1\n\tg := func() int { return n }\n\treturn g()\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let closure_node = cfg.nodes.iter().filter(|n| n.label == NodeLabel::Stmt).nth(1).unwrap();
        assert_eq!(names(&program, &closure_node.uses), vec!["n"]);
        assert_eq!(names(&program, &closure_node.defs), vec!["g"]);
    }
}
