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

//! Progress: a well-typed term is a value or can take a step
//!
//! Stuck terms checked statically:
//!
//! - operators applied to operands they are not defined on
//! - calls whose arity or argument types disagree with the callee
//! - conditions that are not boolean
//! - integer division by a constant zero
//! - writes through a nil map or dereferences of a nil pointer, where the
//!   variable is declared without an initializer and some path reaches the
//!   use without an assignment

use super::PROGRESS_THEORY;
use crate::analysis::FunctionContext;
use crate::cfg::effects::payload_exprs;
use crate::cfg::{Cfg, CfgNodeId, EdgeKind, Payload};
use crate::frontend::ast::{AssignOp, BinaryOp, Block, Expr, ExprKind, FuncTypeExpr, Stmt, StmtKind, UnaryOp};
use crate::frontend::checker::param_type_at;
use crate::frontend::info::{Callee, Selection};
use crate::frontend::scope::SymbolId;
use crate::frontend::types::{FuncId, Type};
use crate::frontend::visit::{Visitor, walk_expr, walk_stmt};
use crate::frontend::TypeInfo;
use fv_common::{Category, Finding, Severity, Span};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Collects Progress violations of one function body
pub struct ProgressChecker<'c, 'p> {
    ctx: &'c FunctionContext<'p>,
    info: &'p TypeInfo,
    pub findings: Vec<Finding>,
}

impl<'c, 'p> ProgressChecker<'c, 'p> {
    pub fn new(ctx: &'c FunctionContext<'p>) -> Self {
        Self {
            ctx,
            info: &ctx.program.info,
            findings: Vec::new(),
        }
    }

    pub fn run(mut self) -> Vec<Finding> {
        let (body, cfg) = (self.ctx.unit.body, self.ctx.cfg);
        for stmt in &body.stmts {
            self.visit_stmt(stmt);
        }
        for (sym, span, kind) in nil_uses(self.info, cfg, self.ctx.unit.id) {
            let name = &self.info.symbol(sym).name;
            let (message, suggestion) = match kind {
                NilUse::MapWrite => (format!("assignment to entry in nil map '{}'", name), format!("initialize '{}' with make before writing to it", name)),
                NilUse::Deref => (format!("nil pointer dereference of '{}'", name), format!("assign '{}' before dereferencing it", name)),
            };
            let finding = Finding::new(Category::Progress, Severity::Error, self.ctx.location(span), message)
                .with_suggestion(suggestion)
                .with_theory(PROGRESS_THEORY);
            self.findings.push(finding);
        }
        self.findings
    }

    fn text(&self, expr: &Expr) -> &'p str {
        self.ctx.program.sources.snippet(expr.span)
    }

    fn report(&mut self, span: Span, message: String) {
        self.findings.push(Finding::new(Category::Progress, Severity::Error, self.ctx.location(span), message).with_theory(PROGRESS_THEORY));
    }

    fn condition(&mut self, cond: &Expr, context: &str) {
        let ty = self.info.type_of(cond.id);
        if !ty.is_opaque() && !self.info.table.is_boolean(ty) {
            let message = format!("non-boolean condition in {} (type {})", context, self.info.type_string(ty));
            self.report(cond.span, message);
        }
    }

    fn binary(&mut self, span: Span, text: &str, op: BinaryOp, lhs: &Expr, rhs: &Expr) {
        let info = self.info;
        let (lhs_ty, rhs_ty) = (info.type_of(lhs.id), info.type_of(rhs.id));
        if lhs_ty.is_opaque() || rhs_ty.is_opaque() {
            return;
        }
        if let Err(reason) = info.table.binary_result(op, lhs_ty, rhs_ty) {
            self.report(span, format!("invalid operation: {} ({})", text, reason));
            return;
        }
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && info.const_int(rhs.id) == Some(0) && info.table.is_integer(lhs_ty) {
            self.report(rhs.span, format!("invalid operation: {} (division by zero)", text));
        }
    }

    fn call(&mut self, expr: &Expr, func: &Expr, args: &[Expr], ellipsis: bool) {
        let info = self.info;
        match info.callee(expr.id) {
            None | Some(Callee::Builtin(_)) | Some(Callee::Conversion(_)) => return,
            Some(_) => {}
        }
        let func_ty = info.type_of(func.id);
        if func_ty.is_opaque() {
            return;
        }
        let Some(sig) = info.table.signature_of(func_ty) else {
            return;
        };
        let name = self.text(func);

        // f(g()) spreads the results of g over the parameters
        let spread = match args {
            [single] => match info.type_of(single.id) {
                Type::Tuple(items) => Some(items.clone()),
                _ => None,
            },
            _ => None,
        };
        let arg_types: Vec<Type> = match &spread {
            Some(items) => items.clone(),
            None => args.iter().map(|arg| info.type_of(arg.id).clone()).collect(),
        };

        let (have, want) = (arg_types.len(), sig.params.len());
        let arity_ok = if sig.variadic && !ellipsis { have + 1 >= want } else { have == want };
        if !arity_ok {
            let shape = if have < want { "not enough" } else { "too many" };
            self.report(expr.span, format!("{} arguments in call to {} (have {}, want {})", shape, name, have, want));
            return;
        }

        for (i, arg_ty) in arg_types.iter().enumerate() {
            let Some(param) = param_type_at(&sig, i, ellipsis) else { continue };
            if arg_ty.is_opaque() || param.is_opaque() {
                continue;
            }
            let (span, text) = match &spread {
                Some(_) => (args[0].span, self.text(&args[0])),
                None => (args[i].span, self.text(&args[i])),
            };
            if !info.table.assignable(arg_ty, &param) {
                let message = format!(
                    "cannot use {} (type {}) as type {} in argument to {}",
                    text,
                    info.type_string(arg_ty),
                    info.type_string(&param),
                    name
                );
                self.report(span, message);
            } else if spread.is_none() && arg_ty.is_untyped() {
                if let Some(value) = info.const_value(args[i].id) {
                    if let Err(reason) = info.table.representable(value, &param) {
                        self.report(span, format!("cannot use {} as type {} in argument to {}: {}", text, info.type_string(&param), name, reason));
                    }
                }
            }
        }
    }
}

impl<'ast> Visitor<'ast> for ProgressChecker<'_, '_> {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        match &stmt.kind {
            StmtKind::If { cond, .. } => self.condition(cond, "if statement"),
            StmtKind::For { cond: Some(cond), .. } => self.condition(cond, "for statement"),
            StmtKind::Assign { lhs, op: AssignOp::Compound(op), rhs } if lhs.len() == 1 && rhs.len() == 1 => {
                let program = self.ctx.program;
                let text = program.sources.snippet(stmt.span);
                self.binary(stmt.span, text, *op, &lhs[0], &rhs[0]);
            }
            StmtKind::IncDec { target, inc } => {
                let ty = self.info.type_of(target.id);
                if !ty.is_opaque() && !self.info.table.is_numeric(ty) {
                    let op = if *inc { "++" } else { "--" };
                    let message = format!("invalid operation: {}{} (non-numeric type {})", self.text(target), op, self.info.type_string(ty));
                    self.report(stmt.span, message);
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        match &expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                let text = self.text(expr);
                self.binary(expr.span, text, *op, lhs, rhs);
            }
            ExprKind::Unary { op, operand } if *op != UnaryOp::AddrOf => {
                let ty = self.info.type_of(operand.id);
                if let Err(reason) = self.info.table.unary_result(*op, ty) {
                    let message = format!("invalid operation: {} ({})", self.text(expr), reason);
                    self.report(expr.span, message);
                }
            }
            ExprKind::Call { func, args, ellipsis } => self.call(expr, func, args, *ellipsis),
            _ => {}
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NilUse {
    MapWrite,
    Deref,
}

/// Locals declared without an initializer whose nil value may reach a use
fn nil_uses(info: &TypeInfo, cfg: &Cfg<'_>, func: FuncId) -> BTreeSet<(SymbolId, Span, NilUse)> {
    let tracked = |sym: SymbolId| {
        let symbol = info.symbol(sym);
        symbol.zero_init && symbol.owner == Some(func) && symbol.is_local_var() && !symbol.captured && !symbol.address_taken
    };

    let mut uses = BTreeSet::new();
    for node in &cfg.nodes {
        for (sym, span, kind) in node_nil_uses(info, node.payload) {
            if tracked(sym) && reachable_unassigned(info, cfg, sym, node.id) {
                uses.insert((sym, span, kind));
            }
        }
    }
    uses
}

fn node_nil_uses(info: &TypeInfo, payload: Payload<'_>) -> Vec<(SymbolId, Span, NilUse)> {
    struct Sites<'i> {
        info: &'i TypeInfo,
        found: Vec<(SymbolId, Span, NilUse)>,
    }

    impl<'ast> Visitor<'ast> for Sites<'_> {
        fn visit_expr(&mut self, expr: &'ast Expr) {
            let info = self.info;
            match &expr.kind {
                ExprKind::Unary { op: UnaryOp::Deref, operand } => {
                    if let Some(sym) = info.ident_symbol(operand) {
                        self.found.push((sym, expr.span, NilUse::Deref));
                    }
                }
                ExprKind::Selector { base, .. } if info.selections.get(&expr.id) == Some(&Selection::Field) => {
                    if let Some(sym) = info.ident_symbol(base) {
                        if matches!(info.table.underlying(info.type_of(base.id)), Type::Pointer(_)) {
                            self.found.push((sym, expr.span, NilUse::Deref));
                        }
                    }
                }
                _ => {}
            }
            walk_expr(self, expr);
        }

        fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {}
    }

    let mut sites = Sites { info, found: Vec::new() };
    if let Payload::Stmt(stmt) = payload {
        let targets: &[Expr] = match &stmt.kind {
            StmtKind::Assign { lhs, op: AssignOp::Assign | AssignOp::Compound(_), .. } => lhs,
            StmtKind::IncDec { target, .. } => std::slice::from_ref(target),
            _ => &[],
        };
        for target in targets {
            if let ExprKind::Index { base, .. } = &target.unparen().kind {
                if let Some(sym) = info.ident_symbol(base) {
                    if matches!(info.table.core_type(info.type_of(base.id)), Some(Type::Map(..))) {
                        sites.found.push((sym, target.span, NilUse::MapWrite));
                    }
                }
            }
        }
    }
    for expr in payload_exprs(payload) {
        sites.visit_expr(expr);
    }
    sites.found
}

/// Whether `target` is reachable from the declaration of `sym` without
/// passing an assignment to it
fn reachable_unassigned(info: &TypeInfo, cfg: &Cfg<'_>, sym: SymbolId, target: CfgNodeId) -> bool {
    let declared = |id: CfgNodeId| match cfg.node(id).payload {
        Payload::Stmt(stmt) => match &stmt.kind {
            StmtKind::Var(specs) => specs.iter().any(|spec| spec.values.is_empty() && spec.names.iter().any(|name| info.symbol_at(name.id) == Some(sym))),
            _ => false,
        },
        _ => false,
    };
    let Some(decl) = cfg.nodes.iter().map(|n| n.id).find(|&id| declared(id)) else {
        return false;
    };

    let mut seen = HashSet::from([decl]);
    let mut queue = VecDeque::from([decl]);
    while let Some(id) = queue.pop_front() {
        for &(succ, kind) in cfg.successors(id) {
            if nil_excluded(info, cfg, id, kind, sym) || !seen.insert(succ) {
                continue;
            }
            if succ == target {
                return true;
            }
            if !cfg.node(succ).defs.contains(&sym) {
                queue.push_back(succ);
            }
        }
    }
    false
}

/// The edge is only taken when `sym` is not nil
fn nil_excluded(info: &TypeInfo, cfg: &Cfg<'_>, from: CfgNodeId, kind: EdgeKind, sym: SymbolId) -> bool {
    let Payload::Cond(cond) = cfg.node(from).payload else {
        return false;
    };
    let ExprKind::Binary { op, lhs, rhs } = &cond.unparen().kind else {
        return false;
    };
    let compares_nil = |a: &Expr, b: &Expr| info.ident_symbol(a) == Some(sym) && info.type_of(b.id).is_nil();
    if !compares_nil(lhs, rhs) && !compares_nil(rhs, lhs) {
        return false;
    }
    matches!((op, kind), (BinaryOp::Ne, EdgeKind::True) | (BinaryOp::Eq, EdgeKind::False))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use crate::frontend::Program;

    fn progress(source: &str, func: &str) -> Vec<Finding> {
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named(func).unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        ProgressChecker::new(&ctx).run()
    }

    #[test]
    fn test_well_typed_function_is_clean() {
        let source = "package main\n\nfunc f(a, b int) int {\n\tif a > b {\n\t\treturn a - b\n\t}\n\tm := map[string]int{}\n\tm[\"k\"] = a\n\treturn g(a, b) / 2\n}\n\nfunc g(x, y int) int {\n\treturn x * y\n}\n";
        assert!(progress(source, "f").is_empty());
    }

    #[test]
    fn test_operator_on_wrong_types() {
        let source = "package main\n\nfunc f(s string, n int) bool {\n\treturn s + n > 0\n}\n";
        let found = progress(source, "f");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, Category::Progress);
        assert_eq!(found[0].severity, Severity::Error);
        assert!(found[0].message.contains("mismatched types"), "{}", found[0].message);
        assert_eq!(found[0].location.line, 4);
    }

    #[test]
    fn test_call_arity_and_argument_types() {
        let source = "package main\n\nfunc g(x int, y string) {}\n\nfunc f() {\n\tg(1)\n\tg(\"a\", \"b\")\n}\n";
        let found = progress(source, "f");
        assert_eq!(found.len(), 2);
        assert!(found[0].message.starts_with("not enough arguments in call to g"), "{}", found[0].message);
        assert!(found[1].message.contains("in argument to g"), "{}", found[1].message);
        assert_eq!(found[1].location.line, 7);
    }

    #[test]
    fn test_variadic_calls() {
        let source = "package main\n\nfunc sum(xs ...int) int {\n\treturn len(xs)\n}\n\nfunc f(v []int) int {\n\treturn sum() + sum(1, 2) + sum(v...)\n}\n";
        assert!(progress(source, "f").is_empty());
    }

    #[test]
    fn test_non_boolean_condition() {
        let source = "package main\n\nfunc f(n int) {\n\tif n {\n\t}\n}\n";
        let found = progress(source, "f");
        assert_eq!(found.len(), 1);
        assert!(found[0].message.starts_with("non-boolean condition in if statement"));
    }

    #[test]
    fn test_constant_division_by_zero() {
        let source = "package main\n\nfunc f(n int) int {\n\treturn n / 0\n}\n";
        let found = progress(source, "f");
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("division by zero"));
    }

    #[test]
    fn test_nil_map_write() {
        let source = "package main\n\nfunc f() {\n\tvar m map[string]int\n\tm[\"a\"] = 1\n}\n\nfunc g(ok bool) {\n\tvar m map[string]int\n\tif ok {\n\t\tm = make(map[string]int)\n\t} else {\n\t\tm = map[string]int{}\n\t}\n\tm[\"a\"] = 1\n}\n";
        let found = progress(source, "f");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "assignment to entry in nil map 'm'");
        assert_eq!(found[0].location.line, 5);
        assert!(progress(source, "g").is_empty());
    }

    #[test]
    fn test_nil_pointer_guarded_by_check() {
        let source = "package main\n\ntype T struct{ n int }\n\nfunc f() int {\n\tvar p *T\n\tif p != nil {\n\t\treturn p.n\n\t}\n\treturn 0\n}\n\nfunc g() int {\n\tvar p *T\n\treturn p.n\n}\n";
        assert!(progress(source, "f").is_empty());
        let found = progress(source, "g");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "nil pointer dereference of 'p'");
    }
}
