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

//! Bounds-check elimination
//!
//! An index `a[i]` needs no runtime check when `0 <= i < len(a)` is known
//! at that point: a constant index inside the bounds, the key of a `range`
//! over the same slice, facts from a dominating branch or a guarding `&&`,
//! or `len(a)-1` after a non-empty check.
//!
//! A fact from a dominating condition holds only while neither the index
//! nor the indexed variable is written on a path from the check to the
//! access; variables captured by closures or whose address is taken never
//! carry facts.

use crate::analysis::{Analyzer, FunctionContext};
use crate::cfg::effects::payload_exprs;
use crate::cfg::{Cfg, CfgNodeId, DominatorTree, EdgeKind, Payload};
use crate::frontend::ast::{AssignOp, BinaryOp, Block, Expr, ExprKind, FuncTypeExpr, Stmt, StmtKind, UnaryOp};
use crate::frontend::builtins::Builtin;
use crate::frontend::info::Callee;
use crate::frontend::scope::SymbolId;
use crate::frontend::types::Type;
use crate::frontend::visit::{Visitor, walk_expr, walk_stmt};
use crate::frontend::TypeInfo;
use fv_common::{Category, Finding, FvResult, Severity, Span};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

const THEORY: &str = "bounds-check elimination from dominating range facts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsVerdict {
    Eliminable,
    Required,
}

/// Verdict for one indexed access
#[derive(Debug, Clone, Serialize)]
pub struct BoundsRecord {
    pub span: Span,
    pub text: String,
    pub verdict: BoundsVerdict,
    pub reason: String,
    pub in_loop: bool,
}

/// Detector of statically redundant index checks
#[derive(Debug, Clone)]
pub struct BoundsCheckAnalyzer {
    /// Report required checks executed inside loops
    pub report_loops: bool,
}

impl Default for BoundsCheckAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundsCheckAnalyzer {
    pub fn new() -> Self {
        Self { report_loops: true }
    }

    pub fn with_loop_reports(mut self, report: bool) -> Self {
        self.report_loops = report;
        self
    }
}

impl Analyzer for BoundsCheckAnalyzer {
    type Result = (Vec<BoundsRecord>, Vec<Finding>);

    fn analyze(&self, ctx: &FunctionContext<'_>) -> FvResult<Self::Result> {
        let info = &ctx.program.info;
        let cfg = ctx.cfg;
        let loops = LoopFacts::collect(info, ctx.unit.body);
        let dom = DominatorTree::compute(cfg);

        let mut records = Vec::new();
        for node in &cfg.nodes {
            let mut accesses = Vec::new();
            for expr in payload_exprs(node.payload) {
                collect_indexes(info, expr, &Facts::default(), &mut accesses);
            }
            if accesses.is_empty() {
                continue;
            }
            let dominating = dominating_facts(info, cfg, &dom, node.id);
            for (access, guards) in accesses {
                let mut facts = dominating.clone();
                facts.merge(&guards);
                if let Some((verdict, reason)) = classify(info, &loops, &facts, access) {
                    records.push(BoundsRecord {
                        span: access.span,
                        text: ctx.program.sources.snippet(access.span).to_string(),
                        verdict,
                        reason,
                        in_loop: node.in_loop(),
                    });
                }
            }
        }
        records.sort_by_key(|r| (r.span.start, r.span.end));

        let mut findings = Vec::new();
        if self.report_loops {
            for record in records.iter().filter(|r| r.verdict == BoundsVerdict::Required && r.in_loop) {
                findings.push(
                    Finding::new(Category::BoundsCheck, Severity::Info, ctx.location(record.span), format!("bounds check on '{}' runs on every iteration: {}", record.text, record.reason))
                        .with_suggestion("range over the slice, or check the largest index against len once before the loop")
                        .with_theory(THEORY),
                );
            }
        }
        debug!(function = %ctx.name(), accesses = records.len(), eliminable = records.iter().filter(|r| r.verdict == BoundsVerdict::Eliminable).count(), "bounds checks classified");
        Ok((records, findings))
    }

    fn name(&self) -> &'static str {
        "bce"
    }
}

/// Known relations at a program point
#[derive(Debug, Clone, Default)]
struct Facts {
    /// `i < len(a)`
    upper: HashSet<(SymbolId, SymbolId)>,
    /// `i >= 0`
    lower: HashSet<SymbolId>,
    /// `len(a) >= n`
    min_len: HashMap<SymbolId, i128>,
}

impl Facts {
    fn merge(&mut self, other: &Facts) {
        self.upper.extend(other.upper.iter().copied());
        self.lower.extend(other.lower.iter().copied());
        for (&sym, &n) in &other.min_len {
            self.at_least(sym, n);
        }
    }

    fn at_least(&mut self, sym: SymbolId, n: i128) {
        let entry = self.min_len.entry(sym).or_insert(n);
        *entry = (*entry).max(n);
    }

    /// Keep only the facts whose variables all satisfy `keep`
    fn retain(&mut self, keep: impl Fn(SymbolId) -> bool) {
        self.upper.retain(|&(i, a)| keep(i) && keep(a));
        self.lower.retain(|&i| keep(i));
        self.min_len.retain(|&a, _| keep(a));
    }

    fn min_len(&self, sym: SymbolId) -> i128 {
        self.min_len.get(&sym).copied().unwrap_or(0)
    }

    /// Record what holds when `cond` evaluates to `truth`
    fn learn(&mut self, info: &TypeInfo, cond: &Expr, truth: bool) {
        match &cond.unparen().kind {
            ExprKind::Unary { op: UnaryOp::Not, operand } => self.learn(info, operand, !truth),
            ExprKind::Binary { op: BinaryOp::LogAnd, lhs, rhs } if truth => {
                self.learn(info, lhs, true);
                self.learn(info, rhs, true);
            }
            ExprKind::Binary { op: BinaryOp::LogOr, lhs, rhs } if !truth => {
                self.learn(info, lhs, false);
                self.learn(info, rhs, false);
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_comparison() => {
                let op = if truth { *op } else { negate(*op) };
                let (l, r) = (Operand::of(info, lhs), Operand::of(info, rhs));
                self.compare(l, op, r);
                self.compare(r, mirror(op), l);
            }
            _ => {}
        }
    }

    fn compare(&mut self, lhs: Operand, op: BinaryOp, rhs: Operand) {
        match (lhs, op, rhs) {
            (Operand::Var(i), BinaryOp::Lt, Operand::Len(a)) => {
                self.upper.insert((i, a));
            }
            (Operand::Var(i), BinaryOp::Le, Operand::LenMinus(a, k)) if k >= 1 => {
                self.upper.insert((i, a));
            }
            (Operand::Var(i), BinaryOp::Ge, Operand::Const(c)) if c >= 0 => {
                self.lower.insert(i);
            }
            (Operand::Var(i), BinaryOp::Gt, Operand::Const(c)) if c >= -1 => {
                self.lower.insert(i);
            }
            (Operand::Len(a), BinaryOp::Gt, Operand::Const(c)) => self.at_least(a, c + 1),
            (Operand::Len(a), BinaryOp::Ge, Operand::Const(c)) => self.at_least(a, c),
            (Operand::Len(a), BinaryOp::Ne, Operand::Const(0)) => self.at_least(a, 1),
            (Operand::Len(a), BinaryOp::Eq, Operand::Const(c)) => self.at_least(a, c),
            _ => {}
        }
    }
}

fn negate(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Le => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Ge => BinaryOp::Lt,
        BinaryOp::Eq => BinaryOp::Ne,
        BinaryOp::Ne => BinaryOp::Eq,
        other => other,
    }
}

/// `a op b` as `b op' a`
fn mirror(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Var(SymbolId),
    Const(i128),
    Len(SymbolId),
    /// `len(a) - k`
    LenMinus(SymbolId, i128),
    Other,
}

impl Operand {
    fn of(info: &TypeInfo, expr: &Expr) -> Self {
        if let Some(value) = info.const_int(expr.id) {
            return Operand::Const(value);
        }
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Ident(_) => match info.symbol_at(expr.id) {
                Some(sym) if info.symbol(sym).is_local_var() => Operand::Var(sym),
                _ => Operand::Other,
            },
            ExprKind::Call { args, .. } if matches!(info.callee(expr.id), Some(Callee::Builtin(Builtin::Len))) && args.len() == 1 => match args[0].unparen().kind {
                ExprKind::Ident(_) => info.symbol_at(args[0].unparen().id).map(Operand::Len).unwrap_or(Operand::Other),
                _ => Operand::Other,
            },
            ExprKind::Binary { op: BinaryOp::Sub, lhs, rhs } => match (Operand::of(info, lhs), info.const_int(rhs.id)) {
                (Operand::Len(a), Some(k)) => Operand::LenMinus(a, k),
                _ => Operand::Other,
            },
            _ => Operand::Other,
        }
    }
}

/// Facts from branches whose taken edge dominates `node`
fn dominating_facts(info: &TypeInfo, cfg: &Cfg<'_>, dom: &DominatorTree, node: CfgNodeId) -> Facts {
    let mut facts = Facts::default();
    for d in dom.dominators(node) {
        if d == node {
            continue;
        }
        let Payload::Cond(cond) = cfg.node(d).payload else {
            continue;
        };
        for &(succ, kind) in cfg.successors(d) {
            let truth = match kind {
                EdgeKind::True => true,
                EdgeKind::False => false,
                _ => continue,
            };
            if cfg.predecessors(succ) == [d] && dom.dominates(succ, node) {
                let mut learned = Facts::default();
                learned.learn(info, cond, truth);
                let written = written_between(cfg, d, succ, node);
                learned.retain(|sym| {
                    let symbol = info.symbol(sym);
                    !written.contains(&sym) && !symbol.captured && !symbol.address_taken
                });
                facts.merge(&learned);
            }
        }
    }
    facts
}

/// Variables written by nodes on some path from `from` to `to` that does
/// not pass through `guard` again
///
/// `to` itself counts only when it lies on a cycle back to itself.
fn written_between(cfg: &Cfg<'_>, guard: CfgNodeId, from: CfgNodeId, to: CfgNodeId) -> HashSet<SymbolId> {
    let mut forward = HashSet::from([from]);
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        for succ in cfg.succ_ids(id) {
            if succ != guard && forward.insert(succ) {
                stack.push(succ);
            }
        }
    }

    let mut backward = HashSet::new();
    let mut stack: Vec<CfgNodeId> = cfg.predecessors(to).to_vec();
    while let Some(id) = stack.pop() {
        if id == guard || !backward.insert(id) {
            continue;
        }
        stack.extend_from_slice(cfg.predecessors(id));
    }

    forward.intersection(&backward).flat_map(|&id| cfg.node(id).defs.iter().copied()).collect()
}

/// Index expressions with the facts established by enclosing `&&`/`||`
fn collect_indexes<'e>(info: &TypeInfo, expr: &'e Expr, guards: &Facts, out: &mut Vec<(&'e Expr, Facts)>) {
    match &expr.kind {
        ExprKind::FuncLit { .. } => {}
        ExprKind::Binary { op: op @ (BinaryOp::LogAnd | BinaryOp::LogOr), lhs, rhs } => {
            collect_indexes(info, lhs, guards, out);
            let mut inner = guards.clone();
            inner.learn(info, lhs, *op == BinaryOp::LogAnd);
            collect_indexes(info, rhs, &inner, out);
        }
        _ => {
            if let ExprKind::Index { indices, .. } = &expr.kind {
                if indices.len() == 1 {
                    out.push((expr, guards.clone()));
                }
            }
            struct Children<'e, 'o, 'i> {
                info: &'i TypeInfo,
                guards: &'o Facts,
                out: &'o mut Vec<(&'e Expr, Facts)>,
            }
            impl<'e> Visitor<'e> for Children<'e, '_, '_> {
                fn visit_expr(&mut self, expr: &'e Expr) {
                    collect_indexes(self.info, expr, self.guards, self.out);
                }

                fn visit_func_lit(&mut self, _expr: &'e Expr, _sig: &'e FuncTypeExpr, _body: &'e Block) {}
            }
            walk_expr(&mut Children { info, guards, out }, expr);
        }
    }
}

fn classify(info: &TypeInfo, loops: &LoopFacts, facts: &Facts, access: &Expr) -> Option<(BoundsVerdict, String)> {
    let ExprKind::Index { base, indices } = &access.kind else {
        return None;
    };
    let index = indices.first()?;
    let array_len = match info.table.underlying(info.type_of(base.id)) {
        Type::Array(n, _) => Some(n as i128),
        Type::Pointer(inner) => match info.table.underlying(&inner) {
            Type::Array(n, _) => Some(n as i128),
            _ => return None,
        },
        Type::Slice(_) => None,
        Type::Basic(kind) if kind.is_string() => None,
        _ => return None,
    };
    let base_sym = match base.unparen().kind {
        ExprKind::Ident(_) => info.symbol_at(base.unparen().id),
        _ => None,
    };

    use BoundsVerdict::*;
    let verdict = match (Operand::of(info, index), base_sym) {
        (Operand::Const(c), _) if c < 0 => (Required, "negative constant index".to_string()),
        (Operand::Const(c), _) if array_len.is_some() => match array_len {
            Some(n) if c < n => (Eliminable, "constant index within array length".to_string()),
            _ => (Required, "constant index beyond array length".to_string()),
        },
        (Operand::Const(c), Some(a)) if facts.min_len(a) > c => (Eliminable, "dominating length check covers constant index".to_string()),
        (Operand::Const(_), _) => (Required, "constant index without a dominating length check".to_string()),
        (Operand::LenMinus(a, k), Some(b)) if a == b && k >= 1 && facts.min_len(a) >= k => (Eliminable, "len-1 after non-empty check".to_string()),
        (Operand::LenMinus(..), _) => (Required, "len-1 without a non-empty check".to_string()),
        (Operand::Var(i), Some(a)) if loops.range_keys.get(&i) == Some(&a) => (Eliminable, "range index over the same slice".to_string()),
        (Operand::Var(i), Some(a)) if facts.upper.contains(&(i, a)) => {
            let unsigned = matches!(info.type_of(index.id), Type::Basic(kind) if kind.is_unsigned());
            if facts.lower.contains(&i) || loops.inductions.contains(&i) || unsigned {
                (Eliminable, "dominating condition establishes 0 <= i < len".to_string())
            } else {
                (Required, "index may be negative".to_string())
            }
        }
        (Operand::Var(_), _) => (Required, "no dominating bounds check".to_string()),
        _ => (Required, "index is not statically bounded".to_string()),
    };
    Some(verdict)
}

/// Loop variables with known ranges
#[derive(Debug, Default)]
struct LoopFacts {
    /// Range key variable to the slice it indexes
    range_keys: HashMap<SymbolId, SymbolId>,
    /// Counters starting at a non-negative constant and only incremented
    inductions: HashSet<SymbolId>,
}

impl LoopFacts {
    fn collect(info: &TypeInfo, body: &Block) -> Self {
        let mut collector = LoopCollector { info, facts: LoopFacts::default() };
        for stmt in &body.stmts {
            collector.visit_stmt(stmt);
        }
        collector.facts
    }
}

struct LoopCollector<'i> {
    info: &'i TypeInfo,
    facts: LoopFacts,
}

impl<'ast> Visitor<'ast> for LoopCollector<'_> {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        let info = self.info;
        match &stmt.kind {
            StmtKind::Range { key: Some(key), define: true, expr, body, .. } => {
                let indexable = matches!(info.table.underlying(info.type_of(expr.id)), Type::Slice(_) | Type::Array(..) | Type::Basic(_) | Type::Pointer(_));
                if let (Some(k), Some(a), true) = (info.symbol_at(key.id), info.ident_symbol(expr), indexable) {
                    if !assigns(info, body, k) && !assigns(info, body, a) {
                        self.facts.range_keys.insert(k, a);
                    }
                }
            }
            StmtKind::For { init: Some(init), post: Some(post), body, .. } => {
                if let Some(i) = nonnegative_init(info, init) {
                    if increments(info, post, i) && !assigns(info, body, i) {
                        self.facts.inductions.insert(i);
                    }
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {}
}

fn nonnegative_init(info: &TypeInfo, init: &Stmt) -> Option<SymbolId> {
    match &init.kind {
        StmtKind::Assign { lhs, op: AssignOp::Define | AssignOp::Assign, rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            if info.const_int(rhs[0].id).is_some_and(|c| c >= 0) { info.ident_symbol(&lhs[0]) } else { None }
        }
        _ => None,
    }
}

fn increments(info: &TypeInfo, post: &Stmt, sym: SymbolId) -> bool {
    match &post.kind {
        StmtKind::IncDec { target, inc: true } => info.ident_symbol(target) == Some(sym),
        StmtKind::Assign { lhs, op: AssignOp::Compound(BinaryOp::Add), rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            info.ident_symbol(&lhs[0]) == Some(sym) && info.const_int(rhs[0].id).is_some_and(|c| c >= 0)
        }
        _ => false,
    }
}

/// The block writes `sym` or takes its address
fn assigns(info: &TypeInfo, block: &Block, sym: SymbolId) -> bool {
    struct Writes<'i> {
        info: &'i TypeInfo,
        sym: SymbolId,
        found: bool,
    }

    impl Writes<'_> {
        fn target(&mut self, expr: &Expr) {
            if self.info.ident_symbol(expr) == Some(self.sym) {
                self.found = true;
            }
        }
    }

    impl<'ast> Visitor<'ast> for Writes<'_> {
        fn visit_stmt(&mut self, stmt: &'ast Stmt) {
            match &stmt.kind {
                StmtKind::Assign { lhs, .. } => {
                    for target in lhs {
                        self.target(target);
                    }
                }
                StmtKind::IncDec { target, .. } => self.target(target),
                StmtKind::Range { key, value, define: false, .. } => {
                    for target in [key, value].into_iter().flatten() {
                        self.target(target);
                    }
                }
                _ => {}
            }
            walk_stmt(self, stmt);
        }

        fn visit_expr(&mut self, expr: &'ast Expr) {
            if let ExprKind::Unary { op: UnaryOp::AddrOf, operand } = &expr.kind {
                if self.info.root_symbol(operand) == Some(self.sym) {
                    self.found = true;
                }
            }
            walk_expr(self, expr);
        }
    }

    let mut writes = Writes { info, sym, found: false };
    for stmt in &block.stmts {
        writes.visit_stmt(stmt);
    }
    writes.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use crate::frontend::Program;

    fn records(source: &str) -> Vec<BoundsRecord> {
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        BoundsCheckAnalyzer::new().analyze(&ctx).unwrap().0
    }

    #[test]
    fn test_range_index_is_eliminable() {
        let found = records("package main\n\nfunc f(a []int) {\n\tfor i := range a {\n\t\t_ = a[i]\n\t}\n}\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, BoundsVerdict::Eliminable);
        assert_eq!(found[0].text, "a[i]");
    }

    #[test]
    fn test_unchecked_parameter_index_is_required() {
        let found = records("package main\n\nfunc f(a []int, i int) int {\n\treturn a[i]\n}\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, BoundsVerdict::Required);
        assert!(!found[0].in_loop);
    }

    #[test]
    fn test_dominating_checks() {
        let source = "package main\n\nfunc f(a []int, i int) int {\n\tif i < 0 || i >= len(a) {\n\t\treturn 0\n\t}\n\treturn a[i]\n}\n";
        let found = records(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, BoundsVerdict::Eliminable, "{}", found[0].reason);
    }

    #[test]
    fn test_counting_loop_and_guard() {
        let source = "package main\n\nfunc f(a []int) int {\n\ts := 0\n\tfor i := 0; i < len(a); i++ {\n\t\ts += a[i]\n\t}\n\tif len(a) > 0 && a[0] > 0 {\n\t\ts++\n\t}\n\treturn s\n}\n";
        let found = records(source);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.verdict == BoundsVerdict::Eliminable), "{:?}", found);
    }

    #[test]
    fn test_last_element_and_constants() {
        let source = "package main\n\nfunc f(a []int, b [4]int) int {\n\tif len(a) == 0 {\n\t\treturn b[3]\n\t}\n\treturn a[len(a)-1] + a[1] + b[2]\n}\n";
        let found = records(source);
        let verdicts: Vec<(String, BoundsVerdict)> = found.iter().map(|r| (r.text.clone(), r.verdict)).collect();
        assert!(verdicts.contains(&("b[3]".to_string(), BoundsVerdict::Eliminable)));
        assert!(verdicts.contains(&("a[len(a)-1]".to_string(), BoundsVerdict::Eliminable)));
        assert!(verdicts.contains(&("a[1]".to_string(), BoundsVerdict::Required)));
        assert!(verdicts.contains(&("b[2]".to_string(), BoundsVerdict::Eliminable)));
    }

    #[test]
    fn test_index_written_after_guard_is_required() {
        let source = "package main\n\nfunc f(a []int, i int) int {\n\tif i >= 0 && i < len(a) {\n\t\ti++\n\t\treturn a[i]\n\t}\n\treturn 0\n}\n";
        let found = records(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, BoundsVerdict::Required, "{}", found[0].reason);
    }

    #[test]
    fn test_slice_written_after_guard_is_required() {
        for write in ["a = a[1:]", "a = nil"] {
            let source = format!("package main\n\nfunc f(a []int, i int) int {{\n\tif i >= 0 && i < len(a) {{\n\t\t{}\n\t\treturn a[i]\n\t}}\n\treturn 0\n}}\n", write);
            let found = records(&source);
            let access = found.iter().find(|r| r.text == "a[i]").unwrap();
            assert_eq!(access.verdict, BoundsVerdict::Required, "{}: {}", write, access.reason);
        }
    }

    #[test]
    fn test_unrelated_write_after_guard_keeps_fact() {
        let source = "package main\n\nfunc f(a []int, i int) int {\n\ts := 0\n\tif i >= 0 && i < len(a) {\n\t\ts = 2\n\t\treturn a[i] + s\n\t}\n\treturn s\n}\n";
        let found = records(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, BoundsVerdict::Eliminable, "{}", found[0].reason);
    }

    #[test]
    fn test_required_check_in_loop_is_reported() {
        let source = "package main\n\nfunc f(a []int, idx []int) int {\n\ts := 0\n\tfor _, i := range idx {\n\t\ts += a[i]\n\t}\n\treturn s\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        let (records, findings) = BoundsCheckAnalyzer::new().analyze(&ctx).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].in_loop);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::BoundsCheck);
    }
}
