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

//! Complexity metrics of a function
//!
//! [`ControlFlowComplexity`] is measured on the CFG. [`FunctionMetrics`]
//! is measured on the source: body length, parameter count and cognitive
//! complexity, where every control structure costs one plus its nesting
//! level and else branches, labeled jumps and runs of mixed `&&`/`||`
//! cost one each.

use super::dominance::DominatorTree;
use super::loops::LoopDetector;
use super::{Cfg, NodeLabel};
use crate::frontend::ast::{BinaryOp, Block, Expr, ExprKind, FuncTypeExpr, Stmt, StmtKind};
use crate::frontend::visit::{Visitor, walk_block, walk_expr, walk_stmt, walk_stmts};
use crate::frontend::{FunctionUnit, Program};
use fv_common::{Category, Finding, Severity};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COGNITIVE_THRESHOLD: u32 = 15;
pub const DEFAULT_MAX_FUNCTION_LINES: u32 = 50;
pub const DEFAULT_MAX_PARAMETERS: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlFlowComplexity {
    /// Cyclomatic complexity `E - N + 2`
    pub cyclomatic: usize,
    pub node_count: usize,
    pub edge_count: usize,
    /// Nodes with more than one successor
    pub decision_points: usize,
    pub loops: usize,
    pub max_nesting_depth: usize,
}

impl ControlFlowComplexity {
    pub fn of(cfg: &Cfg<'_>) -> Self {
        // an exit nothing reaches is not part of the flow
        let node_count = if cfg.non_terminating { cfg.len() - 1 } else { cfg.len() };
        let edge_count = cfg.edge_count();
        let cyclomatic = if edge_count + 2 > node_count { edge_count + 2 - node_count } else { 1 };
        let decision_points = cfg.nodes.iter().filter(|node| cfg.successors(node.id).len() > 1).count();
        let loops = LoopDetector::detect(cfg, &DominatorTree::compute(cfg)).len();
        let max_nesting_depth = cfg.nodes.iter().filter(|node| node.label != NodeLabel::Exit).map(|node| node.loop_depth as usize).max().unwrap_or(0);
        Self {
            cyclomatic,
            node_count,
            edge_count,
            decision_points,
            loops,
            max_nesting_depth,
        }
    }
}

/// Limits of the source metrics, zero disables a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLimits {
    pub cognitive: u32,
    pub function_lines: u32,
    pub parameters: u32,
}

impl Default for MetricLimits {
    fn default() -> Self {
        Self {
            cognitive: DEFAULT_COGNITIVE_THRESHOLD,
            function_lines: DEFAULT_MAX_FUNCTION_LINES,
            parameters: DEFAULT_MAX_PARAMETERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunctionMetrics {
    /// Lines spanned by the body, braces included
    pub lines: usize,
    pub parameters: usize,
    pub cognitive: usize,
}

impl FunctionMetrics {
    pub fn of(unit: &FunctionUnit<'_>) -> Self {
        let span = unit.body.span;
        let mut cognitive = Cognitive::default();
        walk_block(&mut cognitive, unit.body);
        Self {
            lines: span.end.line.saturating_sub(span.start.line) + 1,
            parameters: parameter_count(unit.sig),
            cognitive: cognitive.score,
        }
    }
}

fn parameter_count(sig: &FuncTypeExpr) -> usize {
    sig.params.iter().map(|field| field.names.len().max(1)).sum()
}

#[derive(Default)]
struct Cognitive {
    nesting: usize,
    score: usize,
}

impl Cognitive {
    fn structure(&mut self) {
        self.score += 1 + self.nesting;
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.nesting += 1;
        f(self);
        self.nesting -= 1;
    }

    fn if_chain<'ast>(&mut self, stmt: &'ast Stmt, is_else: bool) {
        let StmtKind::If { init, cond, then, els } = &stmt.kind else {
            return;
        };
        if is_else {
            self.score += 1;
        } else {
            self.structure();
        }
        if let Some(init) = init {
            self.visit_stmt(init);
        }
        self.visit_expr(cond);
        self.nested(|v| walk_block(v, then));
        match els.as_deref() {
            Some(next) if matches!(next.kind, StmtKind::If { .. }) => self.if_chain(next, true),
            Some(other) => {
                self.score += 1;
                self.nested(|v| v.visit_stmt(other));
            }
            None => {}
        }
    }

    fn header<'ast>(&mut self, init: &'ast Option<Box<Stmt>>, expr: Option<&'ast Expr>) {
        if let Some(init) = init {
            self.visit_stmt(init);
        }
        if let Some(expr) = expr {
            self.visit_expr(expr);
        }
    }
}

/// Operators of a chain of `&&` and `||`, left to right, and its operands
fn flatten_logical<'ast>(expr: &'ast Expr, ops: &mut Vec<BinaryOp>, operands: &mut Vec<&'ast Expr>) {
    match &expr.unparen().kind {
        ExprKind::Binary { op: op @ (BinaryOp::LogAnd | BinaryOp::LogOr), lhs, rhs } => {
            flatten_logical(lhs, ops, operands);
            ops.push(*op);
            flatten_logical(rhs, ops, operands);
        }
        _ => operands.push(expr),
    }
}

impl<'ast> Visitor<'ast> for Cognitive {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        match &stmt.kind {
            StmtKind::If { .. } => self.if_chain(stmt, false),
            StmtKind::For { init, cond, post, body } => {
                self.structure();
                self.header(init, cond.as_ref());
                if let Some(post) = post {
                    self.visit_stmt(post);
                }
                self.nested(|v| walk_block(v, body));
            }
            StmtKind::Range { expr, body, .. } => {
                self.structure();
                self.visit_expr(expr);
                self.nested(|v| walk_block(v, body));
            }
            StmtKind::Switch { init, tag, cases } => {
                self.structure();
                self.header(init, tag.as_ref());
                self.nested(|v| {
                    for case in cases {
                        for expr in &case.exprs {
                            v.visit_expr(expr);
                        }
                        walk_stmts(v, &case.body);
                    }
                });
            }
            StmtKind::TypeSwitch { init, subject, cases, .. } => {
                self.structure();
                self.header(init, Some(subject));
                self.nested(|v| {
                    for case in cases {
                        walk_stmts(v, &case.body);
                    }
                });
            }
            StmtKind::Select { cases } => {
                self.structure();
                self.nested(|v| {
                    for case in cases {
                        if let Some(comm) = &case.comm {
                            v.visit_stmt(comm);
                        }
                        walk_stmts(v, &case.body);
                    }
                });
            }
            StmtKind::Goto(_) | StmtKind::Break(Some(_)) | StmtKind::Continue(Some(_)) => self.score += 1,
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        if matches!(expr.kind, ExprKind::Binary { op: BinaryOp::LogAnd | BinaryOp::LogOr, .. }) {
            let (mut ops, mut operands) = (Vec::new(), Vec::new());
            flatten_logical(expr, &mut ops, &mut operands);
            self.score += 1 + ops.windows(2).filter(|pair| pair[0] != pair[1]).count();
            for operand in operands {
                self.visit_expr(operand);
            }
            return;
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, body: &'ast Block) {
        self.nested(|v| walk_block(v, body));
    }
}

/// Findings for functions over the source metric limits
pub fn metric_findings(unit: &FunctionUnit<'_>, program: &Program, limits: &MetricLimits) -> Vec<Finding> {
    let info = program.info.func(unit.id);
    let metrics = FunctionMetrics::of(unit);
    let location = program.location(info.span);
    let mut findings = Vec::new();
    if limits.cognitive > 0 && metrics.cognitive > limits.cognitive as usize {
        findings.push(
            Finding::new(
                Category::Complexity,
                Severity::Warning,
                location.clone(),
                format!("cognitive complexity of '{}' is {} (threshold {})", info.name, metrics.cognitive, limits.cognitive),
            )
            .with_suggestion("flatten nested control flow with early returns or helper functions")
            .with_theory("cognitive complexity"),
        );
    }
    if limits.function_lines > 0 && metrics.lines > limits.function_lines as usize {
        findings.push(
            Finding::new(Category::Complexity, Severity::Warning, location.clone(), format!("'{}' spans {} lines (limit {})", info.name, metrics.lines, limits.function_lines))
                .with_suggestion("split the function into smaller functions"),
        );
    }
    if limits.parameters > 0 && metrics.parameters > limits.parameters as usize {
        findings.push(
            Finding::new(Category::Complexity, Severity::Warning, location, format!("'{}' takes {} parameters (limit {})", info.name, metrics.parameters, limits.parameters))
                .with_suggestion("group related parameters into a struct"),
        );
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::{FunctionMetrics, MetricLimits, metric_findings};
    use crate::cfg::build_cfg;
    use crate::frontend::Program;

    fn complexity_of(source: &str, name: &str) -> super::ControlFlowComplexity {
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named(name).unwrap()).unwrap());
        cfg.complexity()
    }

    #[test]
    fn test_straight_line_is_one() {
        let c = complexity_of("package main\nfunc f() {\n\tprintln(1)\n\tprintln(2)\n}\n", "f");
        assert_eq!(c.cyclomatic, 1);
        assert_eq!(c.decision_points, 0);
    }

    #[test]
    fn test_branches_add_paths() {
        let source = "package main\nfunc f(x int) int {\n\tif x > 0 {\n\t\treturn 1\n\t}\n\tif x < 0 {\n\t\treturn -1\n\t}\n\treturn 0\n}\n";
        let c = complexity_of(source, "f");
        assert_eq!(c.cyclomatic, 3);
        assert_eq!(c.decision_points, 2);
    }

    fn metrics_of(source: &str, name: &str) -> FunctionMetrics {
        let (program, _) = Program::from_source("t.go", source);
        FunctionMetrics::of(&program.unit(program.func_named(name).unwrap()).unwrap())
    }

    #[test]
    fn test_cognitive_weights_nesting() {
        let source = "package main\nfunc f(xs []int, ok bool) int {\n\tn := 0\n\tfor _, x := range xs {\n\t\tif x > 0 && ok {\n\t\t\tn++\n\t\t} else if x < 0 {\n\t\t\tn--\n\t\t} else {\n\t\t\tcontinue\n\t\t}\n\t}\n\treturn n\n}\n";
        let m = metrics_of(source, "f");
        // range 1, nested if 2, && 1, else if 1, else 1
        assert_eq!(m.cognitive, 6);
        assert_eq!(m.parameters, 2);
        assert_eq!(m.lines, 13);
    }

    #[test]
    fn test_mixed_logical_operators() {
        let m = metrics_of("package main\nfunc f(a, b, c, d bool) bool {\n\treturn a && b || c && d\n}\n", "f");
        assert_eq!(m.cognitive, 3);
        assert_eq!(m.parameters, 4);
        let m = metrics_of("package main\nfunc f(a, b, c bool) bool {\n\treturn a && b && c\n}\n", "f");
        assert_eq!(m.cognitive, 1);
    }

    #[test]
    fn test_closures_add_nesting() {
        let source = "package main\nfunc f(xs []int) {\n\tgo func() {\n\t\tif len(xs) > 0 {\n\t\t\tprintln(xs[0])\n\t\t}\n\t}()\n}\n";
        assert_eq!(metrics_of(source, "f").cognitive, 2);
    }

    #[test]
    fn test_metric_limits() {
        let source = "package main\nfunc f(a, b, c int, d string, e, g bool) int {\n\treturn a\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let findings = metric_findings(&unit, &program, &MetricLimits::default());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("takes 6 parameters (limit 5)"));

        let strict = MetricLimits {
            cognitive: 1,
            function_lines: 2,
            parameters: 0,
        };
        let findings = metric_findings(&unit, &program, &strict);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("spans 3 lines (limit 2)"));
    }

    #[test]
    fn test_infinite_loop() {
        let c = complexity_of("package main\nfunc f() {\n\tx := 0\n\tfor {\n\t\tx++\n\t}\n}\n", "f");
        assert_eq!(c.cyclomatic, 2);
        assert_eq!(c.loops, 1);
        assert_eq!(c.max_nesting_depth, 1);
    }
}
