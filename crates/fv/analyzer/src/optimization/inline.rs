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

//! Inline cost model
//!
//! Costs are summed over the AST of a function body, so they do not depend
//! on formatting or comments.

use crate::analysis::{Analyzer, FunctionContext};
use crate::frontend::ast::{Block, Expr, ExprKind, Stmt, StmtKind};
use crate::frontend::builtins::Builtin;
use crate::frontend::info::Callee;
use crate::frontend::types::FuncId;
use crate::frontend::TypeInfo;
use fv_common::{Category, Finding, FvResult, Severity};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_INLINE_THRESHOLD: u32 = 80;
pub const LEAF_THRESHOLD: u32 = 10;

const THEORY: &str = "budgeted inlining heuristic (Go compiler inline cost model)";

/// Weight of each construct
pub mod weights {
    pub const STATEMENT: u32 = 1;
    pub const OPERATOR: u32 = 1;
    pub const CALL: u32 = 20;
    pub const LOOP: u32 = 30;
    pub const SWITCH: u32 = 5;
    pub const CASE: u32 = 2;
    pub const DEFER: u32 = 10;
    pub const CLOSURE: u32 = 25;
    pub const GO: u32 = 40;
    pub const PANIC: u32 = 20;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InlineDecision {
    Inlinable,
    NotInlinable,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineRecord {
    pub func: FuncId,
    pub name: String,
    pub cost: u32,
    pub decision: InlineDecision,
    /// Leaf function far below the budget
    pub strongly_inlinable: bool,
    pub reasons: Vec<String>,
}

/// Scores a function and decides whether it can be inlined
#[derive(Debug, Clone)]
pub struct InlineAnalyzer {
    pub threshold: u32,
}

impl Default for InlineAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl InlineAnalyzer {
    pub fn new() -> Self {
        Self { threshold: DEFAULT_INLINE_THRESHOLD }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Cost and decision for one function body
    pub fn evaluate(&self, info: &TypeInfo, func: FuncId, body: &Block) -> InlineRecord {
        let mut scorer = Scorer {
            info,
            func,
            variadic: info.func(func).sig.variadic,
            cost: 0,
            calls: 0,
            disqualifiers: Vec::new(),
        };
        scorer.block(body);

        let target = info.func(func);
        let mut reasons = scorer.disqualifiers;
        if target.noinline {
            reasons.insert(0, "marked //go:noinline".to_string());
        }
        let cost = scorer.cost;
        let strongly_inlinable = reasons.is_empty() && scorer.calls == 0 && cost < LEAF_THRESHOLD;
        let decision = if !reasons.is_empty() {
            InlineDecision::NotInlinable
        } else if cost < self.threshold {
            reasons.push(if strongly_inlinable { "small leaf".to_string() } else { format!("cost {} within budget {}", cost, self.threshold) });
            InlineDecision::Inlinable
        } else {
            reasons.push(format!("cost {} exceeds budget {}", cost, self.threshold));
            InlineDecision::NotInlinable
        };
        InlineRecord {
            func,
            name: target.name.clone(),
            cost,
            decision,
            strongly_inlinable,
            reasons,
        }
    }
}

impl Analyzer for InlineAnalyzer {
    type Result = (InlineRecord, Vec<Finding>);

    fn analyze(&self, ctx: &FunctionContext<'_>) -> FvResult<Self::Result> {
        let record = self.evaluate(&ctx.program.info, ctx.unit.id, ctx.unit.body);
        debug!(function = %record.name, cost = record.cost, decision = ?record.decision, "inline cost");
        let mut findings = Vec::new();
        if record.decision == InlineDecision::NotInlinable {
            let mut finding = Finding::new(
                Category::Inlining,
                Severity::Info,
                ctx.location(ctx.func().span),
                format!("function '{}' is not inlinable (cost {}): {}", record.name, record.cost, record.reasons.join("; ")),
            )
            .with_theory(THEORY);
            if record.cost >= self.threshold {
                finding = finding.with_suggestion("move rarely executed paths into a separate function");
            }
            findings.push(finding);
        }
        Ok((record, findings))
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}

struct Scorer<'i> {
    info: &'i TypeInfo,
    func: FuncId,
    variadic: bool,
    cost: u32,
    /// Calls to functions other than builtins
    calls: u32,
    disqualifiers: Vec<String>,
}

impl Scorer<'_> {
    fn add(&mut self, cost: u32) {
        self.cost = self.cost.saturating_add(cost);
    }

    fn disqualify(&mut self, reason: String) {
        if !self.disqualifiers.contains(&reason) {
            self.disqualifiers.push(reason);
        }
    }

    fn block(&mut self, block: &Block) {
        self.stmts(&block.stmts);
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        use weights::*;
        match &stmt.kind {
            StmtKind::Empty => {}
            StmtKind::Block(block) => self.block(block),
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
            StmtKind::Expr(expr) => {
                self.add(STATEMENT);
                self.expr(expr);
            }
            StmtKind::Send { chan, value } => {
                self.add(STATEMENT);
                self.expr(chan);
                self.expr(value);
            }
            StmtKind::IncDec { target, .. } => {
                self.add(STATEMENT + OPERATOR);
                self.expr(target);
            }
            StmtKind::Assign { lhs, rhs, .. } => {
                self.add(STATEMENT);
                for expr in lhs.iter().chain(rhs) {
                    self.expr(expr);
                }
            }
            StmtKind::Var(specs) => {
                self.add(STATEMENT);
                for value in specs.iter().flat_map(|spec| &spec.values) {
                    self.expr(value);
                }
            }
            StmtKind::Const(_) | StmtKind::Type(_) => {}
            StmtKind::If { init, cond, then, els } => {
                self.add(STATEMENT);
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(cond);
                self.block(then);
                if let Some(els) = els {
                    self.stmt(els);
                }
            }
            StmtKind::For { init, cond, post, body } => {
                self.add(LOOP);
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
            }
            StmtKind::Range { expr, body, .. } => {
                self.add(LOOP);
                self.expr(expr);
                self.block(body);
            }
            StmtKind::Switch { init, tag, cases } => {
                self.add(SWITCH + CASE * cases.len() as u32);
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                for case in cases {
                    for expr in &case.exprs {
                        self.expr(expr);
                    }
                    self.stmts(&case.body);
                }
            }
            StmtKind::TypeSwitch { init, subject, cases, .. } => {
                self.add(SWITCH + CASE * cases.len() as u32);
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(subject);
                for case in cases {
                    self.stmts(&case.body);
                }
            }
            StmtKind::Select { cases } => {
                self.add(SWITCH + CASE * cases.len() as u32);
                for case in cases {
                    if let Some(comm) = &case.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&case.body);
                }
            }
            StmtKind::Go(expr) => {
                self.add(GO);
                self.expr(expr);
            }
            StmtKind::Defer(expr) => {
                self.add(DEFER);
                self.expr(expr);
            }
            StmtKind::Return(exprs) => {
                self.add(STATEMENT);
                for expr in exprs {
                    self.expr(expr);
                }
            }
            StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Goto(_) | StmtKind::Fallthrough => self.add(STATEMENT),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        use weights::*;
        match &expr.kind {
            ExprKind::Ident(_) | ExprKind::BasicLit { .. } | ExprKind::Type(_) => {}
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::CompositeLit { elems, .. } => {
                self.add(OPERATOR);
                for elem in elems {
                    if let Some(key) = &elem.key {
                        self.expr(key);
                    }
                    self.expr(&elem.value);
                }
            }
            ExprKind::FuncLit { body, .. } => {
                self.add(CLOSURE);
                self.block(body);
            }
            ExprKind::Selector { base, .. } => self.expr(base),
            ExprKind::Index { base, indices } => {
                self.add(OPERATOR);
                self.expr(base);
                for index in indices {
                    self.expr(index);
                }
            }
            ExprKind::Slice { base, low, high, max } => {
                self.add(OPERATOR);
                self.expr(base);
                for part in [low, high, max].into_iter().flatten() {
                    self.expr(part);
                }
            }
            ExprKind::TypeAssert { base, .. } => {
                self.add(OPERATOR);
                self.expr(base);
            }
            ExprKind::Unary { operand, .. } => {
                self.add(OPERATOR);
                self.expr(operand);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.add(OPERATOR);
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Call { func, args, ellipsis } => {
                self.call(expr, func, *ellipsis);
                self.expr(func);
                for arg in args {
                    self.expr(arg);
                }
            }
        }
    }

    fn call(&mut self, call: &Expr, func: &Expr, ellipsis: bool) {
        use weights::*;
        let info = self.info;
        match info.callee(call.id) {
            Some(Callee::Builtin(Builtin::Panic)) => self.add(PANIC),
            Some(Callee::Builtin(Builtin::Recover)) => {
                self.add(PANIC);
                self.disqualify("calls recover".to_string());
            }
            Some(Callee::Builtin(_)) | Some(Callee::Conversion(_)) => self.add(OPERATOR),
            Some(Callee::Func(id)) => {
                self.add(CALL);
                self.calls += 1;
                if *id == self.func {
                    self.disqualify("direct recursion".to_string());
                }
                let callee = info.func(*id);
                if ellipsis && self.variadic && callee.sig.variadic {
                    self.disqualify(format!("forwards variadic arguments to '{}'", callee.name));
                }
            }
            Some(_) | None => {
                self.add(CALL);
                self.calls += 1;
                if ellipsis && self.variadic && info.table.signature_of(info.type_of(func.id)).is_some_and(|sig| sig.variadic) {
                    self.disqualify("forwards variadic arguments".to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Program;

    fn evaluate(source: &str, func: &str) -> InlineRecord {
        let (program, _) = Program::from_source("t.go", source);
        let id = program.func_named(func).unwrap();
        let unit = program.unit(id).unwrap();
        InlineAnalyzer::new().evaluate(&program.info, id, unit.body)
    }

    #[test]
    fn test_small_leaf() {
        let record = evaluate("package main\n\nfunc add(a, b int) int {\n\treturn a + b\n}\n", "add");
        assert_eq!(record.cost, 2);
        assert_eq!(record.decision, InlineDecision::Inlinable);
        assert!(record.strongly_inlinable);
        assert_eq!(record.reasons, vec!["small leaf".to_string()]);
    }

    #[test]
    fn test_direct_recursion() {
        let record = evaluate("package main\n\nfunc fact(n int) int {\n\tif n <= 1 {\n\t\treturn 1\n\t}\n\treturn n * fact(n-1)\n}\n", "fact");
        assert_eq!(record.decision, InlineDecision::NotInlinable);
        assert_eq!(record.reasons, vec!["direct recursion".to_string()]);
    }

    #[test]
    fn test_budget_exceeded() {
        let record = evaluate(
            "package main\n\nfunc work(xs []int) int {\n\ttotal := 0\n\tfor _, x := range xs {\n\t\ttotal += x\n\t}\n\tfor i := 0; i < len(xs); i++ {\n\t\ttotal -= helper(i)\n\t}\n\treturn total\n}\n\nfunc helper(i int) int {\n\treturn i\n}\n",
            "work",
        );
        assert!(record.cost >= DEFAULT_INLINE_THRESHOLD, "{}", record.cost);
        assert_eq!(record.decision, InlineDecision::NotInlinable);
        assert!(record.reasons[0].starts_with("cost"));
    }

    #[test]
    fn test_noinline_pragma_and_variadic_forwarding() {
        let source = "package main\n\n//go:noinline\nfunc quiet() {}\n\nfunc sum(xs ...int) int {\n\treturn total(xs...)\n}\n\nfunc total(xs ...int) int {\n\treturn len(xs)\n}\n";
        let quiet = evaluate(source, "quiet");
        assert_eq!(quiet.reasons, vec!["marked //go:noinline".to_string()]);
        let sum = evaluate(source, "sum");
        assert_eq!(sum.decision, InlineDecision::NotInlinable);
        assert!(sum.reasons[0].contains("total"));
    }

    #[test]
    fn test_cost_ignores_formatting() {
        let compact = evaluate("package main\nfunc f(a int) int { if a > 0 { return a }; return -a }\n", "f");
        let spaced = evaluate("package main\n\n// f is absolute value\nfunc f(a int) int {\n\tif a > 0 {\n\t\t// positive\n\t\treturn a\n\t}\n\n\treturn -a\n}\n", "f");
        assert_eq!(compact.cost, spaced.cost);
    }
}
