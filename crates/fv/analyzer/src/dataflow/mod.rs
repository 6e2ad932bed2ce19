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

//! Monotone data flow framework and its standard instances
//!
//! - [`Liveness`]: backward, union
//! - [`ReachingDefinitions`]: forward, union
//! - [`AvailableExpressions`]: forward, intersection
//!
//! [`DataFlowAnalyzer`] runs the three instances on one function and turns
//! their fixed points into findings.

pub mod available;
pub mod framework;
pub mod liveness;
pub mod reaching;

pub use available::{AvailableExpressions, ExprKey, RedundantExpr};
pub use framework::{DEFAULT_ITERATION_CAP, DataFlowAnalysis, DataFlowResults, DataFlowSolver, Direction};
pub use liveness::Liveness;
pub use reaching::{Definition, ReachingDefinitions};

use crate::analysis::{Analyzer, FunctionContext};
use crate::cfg::{NodeLabel, Payload};
use crate::frontend::ast::StmtKind;
use crate::frontend::scope::SymbolId;
use fv_common::{Category, Finding, FvResult, Severity};
use std::collections::BTreeSet;
use tracing::debug;

const THEORY: &str = "Kildall monotone data flow framework";

/// Fixed points of the three instances for one function
#[derive(Debug, Clone)]
pub struct DataFlowReport {
    pub liveness: DataFlowResults<BTreeSet<SymbolId>>,
    pub reaching: DataFlowResults<BTreeSet<Definition>>,
    pub available: DataFlowResults<BTreeSet<ExprKey>>,
    pub redundant: Vec<RedundantExpr>,
    pub findings: Vec<Finding>,
}

/// Analyzer for data flow patterns
#[derive(Debug, Clone)]
pub struct DataFlowAnalyzer {
    solver: DataFlowSolver,
    /// Whether to report assignments whose value is never read
    pub detect_unused: bool,
    /// Whether to report recomputation of available expressions
    pub detect_redundant: bool,
}

impl Default for DataFlowAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataFlowAnalyzer {
    pub fn new() -> Self {
        Self {
            solver: DataFlowSolver::default(),
            detect_unused: true,
            detect_redundant: true,
        }
    }

    pub fn with_iteration_cap(mut self, cap: usize) -> Self {
        self.solver = DataFlowSolver::new(cap);
        self
    }

    pub fn with_unused_detection(mut self, detect: bool) -> Self {
        self.detect_unused = detect;
        self
    }

    pub fn with_redundant_detection(mut self, detect: bool) -> Self {
        self.detect_redundant = detect;
        self
    }

    fn unused_assignments(&self, ctx: &FunctionContext<'_>, liveness: &DataFlowResults<BTreeSet<SymbolId>>) -> Vec<Finding> {
        let info = &ctx.program.info;
        let mut findings = Vec::new();
        for node in &ctx.cfg.nodes {
            if node.label == NodeLabel::Entry || zero_value_declaration(node.payload) || matches!(node.payload, Payload::TypeCase(_)) {
                continue;
            }
            let Some(live_out) = liveness.out_state(node.id) else {
                continue;
            };
            for &sym in &node.defs {
                let symbol = info.symbol(sym);
                if live_out.contains(&sym) || symbol.is_param || symbol.is_result || symbol.captured || symbol.address_taken {
                    continue;
                }
                findings.push(
                    Finding::new(Category::UnusedAssignment, Severity::Info, ctx.location(node.span), format!("value assigned to '{}' is never used", symbol.name))
                        .with_suggestion("remove the assignment or use the value")
                        .with_theory(format!("{} (liveness)", THEORY)),
                );
            }
        }
        findings
    }
}

impl Analyzer for DataFlowAnalyzer {
    type Result = DataFlowReport;

    fn analyze(&self, ctx: &FunctionContext<'_>) -> FvResult<DataFlowReport> {
        let cfg = ctx.cfg;
        let info = &ctx.program.info;
        let liveness = self.solver.solve(&Liveness, cfg);
        let reaching = self.solver.solve(&ReachingDefinitions, cfg);
        let available_analysis = AvailableExpressions::new(info, ctx.unit.id, cfg);
        let available = self.solver.solve(&available_analysis, cfg);

        let mut findings = Vec::new();
        for (instance, converged, iterations) in [
            ("liveness", liveness.converged, liveness.iterations),
            ("reaching definitions", reaching.converged, reaching.iterations),
            ("available expressions", available.converged, available.iterations),
        ] {
            debug!(function = %ctx.name(), instance, iterations, "data flow solved");
            if !converged {
                findings.push(
                    Finding::new(
                        Category::DataflowNonconvergent,
                        Severity::Warning,
                        ctx.location(ctx.func().span),
                        format!("{} analysis of '{}' did not converge within {} iterations", instance, ctx.name(), self.solver.iteration_cap()),
                    )
                    .with_suggestion("raise --iteration-cap; results for this function are approximate")
                    .with_theory(THEORY),
                );
            }
        }

        if self.detect_unused {
            findings.extend(self.unused_assignments(ctx, &liveness));
        }

        let redundant = if self.detect_redundant { available_analysis.redundant(info, ctx.unit.id, cfg, &available) } else { Vec::new() };
        for expr in &redundant {
            findings.push(
                Finding::new(Category::RedundantExpression, Severity::Info, ctx.location(expr.span), format!("expression '{}' is recomputed while its value is available", expr.text))
                    .with_suggestion("reuse the earlier result")
                    .with_theory(format!("{} (available expressions)", THEORY)),
            );
        }

        Ok(DataFlowReport {
            liveness,
            reaching,
            available,
            redundant,
            findings,
        })
    }

    fn name(&self) -> &'static str {
        "dataflow"
    }
}

/// `var x T` without an initializer
fn zero_value_declaration(payload: Payload<'_>) -> bool {
    match payload {
        Payload::Stmt(stmt) => matches!(&stmt.kind, StmtKind::Var(specs) if specs.iter().all(|spec| spec.values.is_empty())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use crate::frontend::Program;

    fn findings(source: &str, analyzer: DataFlowAnalyzer) -> Vec<Finding> {
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        analyzer.analyze(&ctx).unwrap().findings
    }

    #[test]
    fn test_overwritten_value_is_unused() {
        let source = "package main\nfunc f() int {\n\tx := 1\n\tx = 2\n\treturn x\n}\n";
        let found = findings(source, DataFlowAnalyzer::new());
        let unused: Vec<_> = found.iter().filter(|f| f.category == Category::UnusedAssignment).collect();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].location.line, 3);
        assert_eq!(unused[0].severity, Severity::Info);
    }

    #[test]
    fn test_captured_and_zero_values_are_skipped() {
        let source = "package main\nfunc f() int {\n\tvar n int\n\tn = 4\n\tg := func() int { return n }\n\tn = 5\n\treturn g()\n}\n";
        let found = findings(source, DataFlowAnalyzer::new());
        assert!(found.iter().all(|f| f.category != Category::UnusedAssignment), "{:?}", found);
    }

    #[test]
    fn test_detection_toggles() {
        let source = "package main\nfunc f(a, b int) int {\n\tx := 1\n\tx = a + b\n\treturn x + (a + b)\n}\n";
        let all = findings(source, DataFlowAnalyzer::new());
        assert!(all.iter().any(|f| f.category == Category::RedundantExpression));
        assert!(all.iter().any(|f| f.category == Category::UnusedAssignment));
        let none = findings(source, DataFlowAnalyzer::new().with_unused_detection(false).with_redundant_detection(false));
        assert!(none.is_empty());
    }
}
