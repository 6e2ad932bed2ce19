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

//! Read-only AST traversal
//!
//! Implementors override the hooks they care about and call the matching
//! `walk_*` function to continue into children. Function literal bodies are
//! entered by default; passes that analyze one function at a time override
//! [`Visitor::visit_func_lit`] to stop there.

use super::ast::*;

/// Trait for AST visitors
pub trait Visitor<'ast> {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        walk_expr(self, expr);
    }

    /// Called for `func(...) {...}` literals instead of descending directly
    fn visit_func_lit(&mut self, expr: &'ast Expr, _sig: &'ast FuncTypeExpr, body: &'ast Block) {
        let _ = expr;
        walk_block(self, body);
    }
}

pub fn walk_block<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, block: &'ast Block) {
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmts<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmts: &'ast [Stmt]) {
    for stmt in stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmt: &'ast Stmt) {
    match &stmt.kind {
        StmtKind::Empty | StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Goto(_) | StmtKind::Fallthrough | StmtKind::Type(_) => {}
        StmtKind::Expr(expr) | StmtKind::Go(expr) | StmtKind::Defer(expr) => visitor.visit_expr(expr),
        StmtKind::Send { chan, value } => {
            visitor.visit_expr(chan);
            visitor.visit_expr(value);
        }
        StmtKind::IncDec { target, .. } => visitor.visit_expr(target),
        StmtKind::Assign { lhs, rhs, .. } => {
            for expr in rhs {
                visitor.visit_expr(expr);
            }
            for expr in lhs {
                visitor.visit_expr(expr);
            }
        }
        StmtKind::Var(specs) => {
            for spec in specs {
                for value in &spec.values {
                    visitor.visit_expr(value);
                }
            }
        }
        StmtKind::Const(specs) => {
            for spec in specs {
                for value in &spec.values {
                    visitor.visit_expr(value);
                }
            }
        }
        StmtKind::Block(block) => walk_block(visitor, block),
        StmtKind::If { init, cond, then, els } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            visitor.visit_expr(cond);
            walk_block(visitor, then);
            if let Some(els) = els {
                visitor.visit_stmt(els);
            }
        }
        StmtKind::For { init, cond, post, body } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(cond);
            }
            if let Some(post) = post {
                visitor.visit_stmt(post);
            }
            walk_block(visitor, body);
        }
        StmtKind::Range { key, value, expr, body, .. } => {
            visitor.visit_expr(expr);
            if let Some(key) = key {
                visitor.visit_expr(key);
            }
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
            walk_block(visitor, body);
        }
        StmtKind::Switch { init, tag, cases } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(tag) = tag {
                visitor.visit_expr(tag);
            }
            for case in cases {
                for expr in &case.exprs {
                    visitor.visit_expr(expr);
                }
                walk_stmts(visitor, &case.body);
            }
        }
        StmtKind::TypeSwitch { init, subject, cases, .. } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            visitor.visit_expr(subject);
            for case in cases {
                walk_stmts(visitor, &case.body);
            }
        }
        StmtKind::Select { cases } => {
            for case in cases {
                if let Some(comm) = &case.comm {
                    visitor.visit_stmt(comm);
                }
                walk_stmts(visitor, &case.body);
            }
        }
        StmtKind::Return(exprs) => {
            for expr in exprs {
                visitor.visit_expr(expr);
            }
        }
        StmtKind::Labeled { stmt, .. } => visitor.visit_stmt(stmt),
    }
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, expr: &'ast Expr) {
    match &expr.kind {
        ExprKind::Ident(_) | ExprKind::BasicLit { .. } | ExprKind::Type(_) => {}
        ExprKind::CompositeLit { elems, .. } => {
            for elem in elems {
                if let Some(key) = &elem.key {
                    visitor.visit_expr(key);
                }
                visitor.visit_expr(&elem.value);
            }
        }
        ExprKind::FuncLit { sig, body } => visitor.visit_func_lit(expr, sig, body),
        ExprKind::Paren(inner) => visitor.visit_expr(inner),
        ExprKind::Selector { base, .. } => visitor.visit_expr(base),
        ExprKind::Index { base, indices } => {
            visitor.visit_expr(base);
            for index in indices {
                visitor.visit_expr(index);
            }
        }
        ExprKind::Slice { base, low, high, max } => {
            visitor.visit_expr(base);
            for part in [low, high, max].into_iter().flatten() {
                visitor.visit_expr(part);
            }
        }
        ExprKind::TypeAssert { base, .. } => visitor.visit_expr(base),
        ExprKind::Call { func, args, .. } => {
            visitor.visit_expr(func);
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
    }
}

/// Collects every expression satisfying a predicate, in source order
pub fn collect_exprs<'ast>(block: &'ast Block, enter_closures: bool, pred: impl Fn(&Expr) -> bool) -> Vec<&'ast Expr> {
    struct Collector<'ast, F> {
        found: Vec<&'ast Expr>,
        enter_closures: bool,
        pred: F,
    }

    impl<'ast, F: Fn(&Expr) -> bool> Visitor<'ast> for Collector<'ast, F> {
        fn visit_expr(&mut self, expr: &'ast Expr) {
            if (self.pred)(expr) {
                self.found.push(expr);
            }
            walk_expr(self, expr);
        }

        fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, body: &'ast Block) {
            if self.enter_closures {
                walk_block(self, body);
            }
        }
    }

    let mut collector = Collector {
        found: Vec::new(),
        enter_closures,
        pred,
    };
    walk_block(&mut collector, block);
    collector.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_file;

    fn body(source: &str) -> Block {
        let (file, _) = parse_file(source, 0, "t.go", 0).unwrap();
        match file.decls.into_iter().next() {
            Some(Decl::Func(func)) => func.body.unwrap(),
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn test_collect_calls() {
        let block = body("package p\nfunc f() {\n\tg(h(1))\n\tgo func() { k() }()\n}\n");
        let outer = collect_exprs(&block, false, |e| matches!(e.kind, ExprKind::Call { .. }));
        assert_eq!(outer.len(), 3);
        let all = collect_exprs(&block, true, |e| matches!(e.kind, ExprKind::Call { .. }));
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_visitor_counts_statements() {
        struct Counter(usize);
        impl<'ast> Visitor<'ast> for Counter {
            fn visit_stmt(&mut self, stmt: &'ast Stmt) {
                self.0 += 1;
                walk_stmt(self, stmt);
            }
        }
        let block = body("package p\nfunc f(x int) {\n\tif x > 0 {\n\t\tx++\n\t} else {\n\t\tx--\n\t}\n\tfor i := 0; i < x; i++ {\n\t}\n}\n");
        let mut counter = Counter(0);
        walk_block(&mut counter, &block);
        // if, x++, else block, x--, for, init, post
        assert_eq!(counter.0, 7);
    }
}
