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

//! Available expressions

use super::framework::{DataFlowAnalysis, DataFlowResults, Direction};
use crate::cfg::effects::payload_exprs;
use crate::cfg::{Cfg, CfgNode, Payload};
use crate::frontend::ast::{BinaryOp, Block, Expr, ExprKind, FuncTypeExpr};
use crate::frontend::info::TypeInfo;
use crate::frontend::scope::SymbolId;
use crate::frontend::types::FuncId;
use crate::frontend::visit::{Visitor, walk_expr};
use fv_common::Span;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical form of a pure expression over local variables
///
/// Variables are rendered with their symbol id so shadowed names do not
/// collide.
pub type ExprKey = String;

/// Forward must-analysis: `OUT(n) = gen(n) ∪ (IN(n) − kill(n))`, meet ∩
#[derive(Debug, Clone)]
pub struct AvailableExpressions {
    universe: BTreeSet<ExprKey>,
    display: BTreeMap<ExprKey, String>,
    gen_sets: Vec<BTreeSet<ExprKey>>,
    kill_sets: Vec<BTreeSet<ExprKey>>,
}

/// An expression recomputed while its value is available
#[derive(Debug, Clone, PartialEq)]
pub struct RedundantExpr {
    pub span: Span,
    pub text: String,
}

impl AvailableExpressions {
    pub fn new(info: &TypeInfo, func: FuncId, cfg: &Cfg<'_>) -> Self {
        let keys = KeyBuilder { info, func };
        let mut universe = BTreeSet::new();
        let mut display = BTreeMap::new();
        let mut operands: BTreeMap<ExprKey, BTreeSet<SymbolId>> = BTreeMap::new();
        let mut computed = Vec::with_capacity(cfg.len());

        for node in &cfg.nodes {
            let mut here = BTreeSet::new();
            for expr in payload_exprs(node.payload) {
                for candidate in candidates(expr) {
                    if let Some(key) = keys.key(candidate) {
                        display.entry(key.canonical.clone()).or_insert(key.display);
                        operands.entry(key.canonical.clone()).or_insert(key.operands);
                        universe.insert(key.canonical.clone());
                        here.insert(key.canonical);
                    }
                }
            }
            computed.push(here);
        }

        let mut gen_sets = Vec::with_capacity(cfg.len());
        let mut kill_sets = Vec::with_capacity(cfg.len());
        for (node, here) in cfg.nodes.iter().zip(computed) {
            let touches = |key: &ExprKey| operands.get(key).is_some_and(|ops| !ops.is_disjoint(&node.defs));
            kill_sets.push(universe.iter().filter(|key| touches(*key)).cloned().collect());
            gen_sets.push(here.into_iter().filter(|key| !touches(key)).collect());
        }

        Self {
            universe,
            display,
            gen_sets,
            kill_sets,
        }
    }

    pub fn universe(&self) -> &BTreeSet<ExprKey> {
        &self.universe
    }

    pub fn display(&self, key: &str) -> Option<&str> {
        self.display.get(key).map(String::as_str)
    }

    /// Outermost expressions whose value was available on entry to their node
    pub fn redundant(&self, info: &TypeInfo, func: FuncId, cfg: &Cfg<'_>, results: &DataFlowResults<BTreeSet<ExprKey>>) -> Vec<RedundantExpr> {
        let keys = KeyBuilder { info, func };
        let mut found = Vec::new();
        for node in &cfg.nodes {
            if matches!(node.payload, Payload::Deferred(_)) {
                continue;
            }
            let Some(available) = results.in_state(node.id) else {
                continue;
            };
            let mut finder = RedundantFinder {
                keys: &keys,
                available,
                found: &mut found,
            };
            for expr in payload_exprs(node.payload) {
                finder.visit_expr(expr);
            }
        }
        found.sort_by_key(|r: &RedundantExpr| r.span.start.offset);
        found
    }
}

impl DataFlowAnalysis for AvailableExpressions {
    type Lattice = BTreeSet<ExprKey>;
    const DIRECTION: Direction = Direction::Forward;

    fn boundary(&self, _cfg: &Cfg<'_>) -> Self::Lattice {
        BTreeSet::new()
    }

    fn initial(&self, _cfg: &Cfg<'_>) -> Self::Lattice {
        self.universe.clone()
    }

    fn meet(&self, into: &mut Self::Lattice, other: &Self::Lattice) {
        into.retain(|key| other.contains(key));
    }

    fn transfer(&self, node: &CfgNode<'_>, input: &Self::Lattice) -> Self::Lattice {
        let kill = &self.kill_sets[node.id];
        let mut out: BTreeSet<ExprKey> = input.iter().filter(|key| !kill.contains(*key)).cloned().collect();
        out.extend(self.gen_sets[node.id].iter().cloned());
        out
    }
}

struct Key {
    canonical: ExprKey,
    display: String,
    operands: BTreeSet<SymbolId>,
}

struct KeyBuilder<'i> {
    info: &'i TypeInfo,
    func: FuncId,
}

impl KeyBuilder<'_> {
    /// Key of a binary expression whose operands are tracked locals or constants
    fn key(&self, expr: &Expr) -> Option<Key> {
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Binary { op, lhs, rhs } if !matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr) => {
                let (l_key, l_text, mut ops) = self.operand(lhs)?;
                let (r_key, r_text, r_ops) = self.operand(rhs)?;
                ops.extend(r_ops);
                if ops.is_empty() {
                    return None;
                }
                Some(Key {
                    canonical: format!("{} {} {}", l_key, op.as_str(), r_key),
                    display: format!("{} {} {}", l_text, op.as_str(), r_text),
                    operands: ops,
                })
            }
            _ => None,
        }
    }

    fn operand(&self, expr: &Expr) -> Option<(String, String, BTreeSet<SymbolId>)> {
        let expr = expr.unparen();
        if let Some(value) = self.info.const_value(expr.id) {
            let text = match &expr.kind {
                ExprKind::BasicLit { raw, .. } => raw.clone(),
                ExprKind::Ident(name) => name.clone(),
                _ => format!("{:?}", value),
            };
            return Some((format!("{:?}", value), text, BTreeSet::new()));
        }
        match &expr.kind {
            ExprKind::Ident(name) => {
                let sym = self.info.symbol_at(expr.id)?;
                let symbol = self.info.symbol(sym);
                let tracked = symbol.is_local_var() && symbol.owner == Some(self.func) && !symbol.captured && !symbol.address_taken && !symbol.is_blank();
                tracked.then(|| (format!("{}#{}", name, sym), name.clone(), BTreeSet::from([sym])))
            }
            ExprKind::Binary { .. } => {
                let key = self.key(expr)?;
                Some((format!("({})", key.canonical), format!("({})", key.display), key.operands))
            }
            _ => None,
        }
    }
}

/// Every subexpression outside function literals
fn candidates(expr: &Expr) -> Vec<&Expr> {
    struct All<'a> {
        found: Vec<&'a Expr>,
    }

    impl<'a> Visitor<'a> for All<'a> {
        fn visit_expr(&mut self, expr: &'a Expr) {
            self.found.push(expr);
            walk_expr(self, expr);
        }

        fn visit_func_lit(&mut self, _expr: &'a Expr, _sig: &'a FuncTypeExpr, _body: &'a Block) {}
    }

    let mut all = All { found: Vec::new() };
    all.visit_expr(expr);
    all.found
}

struct RedundantFinder<'a, 'i> {
    keys: &'a KeyBuilder<'i>,
    available: &'a BTreeSet<ExprKey>,
    found: &'a mut Vec<RedundantExpr>,
}

impl<'ast> Visitor<'ast> for RedundantFinder<'_, '_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        if let Some(key) = self.keys.key(expr) {
            if self.available.contains(&key.canonical) {
                self.found.push(RedundantExpr { span: expr.span, text: key.display });
                return;
            }
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use crate::dataflow::framework::DataFlowSolver;
    use crate::frontend::Program;

    fn redundant(source: &str) -> Vec<RedundantExpr> {
        let (program, _) = Program::from_source("t.go", source);
        let id = program.func_named("f").unwrap();
        let cfg = build_cfg(&program.info, program.unit(id).unwrap());
        let analysis = AvailableExpressions::new(&program.info, id, &cfg);
        let results = DataFlowSolver::default().solve(&analysis, &cfg);
        assert!(results.converged);
        analysis.redundant(&program.info, id, &cfg, &results)
    }

    #[test]
    fn test_recomputed_expression() {
        let found = redundant("package main\nfunc f(a, b int) int {\n\tx := a + b\n\ty := a + b\n\treturn x * y\n}\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "a + b");
        assert_eq!(found[0].span.start.line, 4);
    }

    #[test]
    fn test_redefinition_kills() {
        let found = redundant("package main\nfunc f(a, b int) int {\n\tx := a + b\n\ta = 3\n\ty := a + b\n\treturn x * y\n}\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_only_one_branch_is_not_available() {
        let found = redundant("package main\nfunc f(a, b int, c bool) int {\n\tx := 0\n\tif c {\n\t\tx = a * b\n\t}\n\treturn x + a*b\n}\n");
        assert!(found.is_empty());
    }
}
