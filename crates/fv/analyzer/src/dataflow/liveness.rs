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

//! Live variables

use super::framework::{DataFlowAnalysis, Direction};
use crate::cfg::{Cfg, CfgNode};
use crate::frontend::scope::SymbolId;
use std::collections::BTreeSet;

/// Backward may-analysis: `IN(n) = use(n) ∪ (OUT(n) − def(n))`
#[derive(Debug, Default, Clone, Copy)]
pub struct Liveness;

impl DataFlowAnalysis for Liveness {
    type Lattice = BTreeSet<SymbolId>;
    const DIRECTION: Direction = Direction::Backward;

    fn boundary(&self, _cfg: &Cfg<'_>) -> Self::Lattice {
        BTreeSet::new()
    }

    fn initial(&self, _cfg: &Cfg<'_>) -> Self::Lattice {
        BTreeSet::new()
    }

    fn meet(&self, into: &mut Self::Lattice, other: &Self::Lattice) {
        into.extend(other.iter().copied());
    }

    fn transfer(&self, node: &CfgNode<'_>, output: &Self::Lattice) -> Self::Lattice {
        let mut live: BTreeSet<SymbolId> = output.difference(&node.defs).copied().collect();
        live.extend(node.uses.iter().copied());
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{NodeLabel, build_cfg};
    use crate::dataflow::framework::DataFlowSolver;
    use crate::frontend::Program;

    #[test]
    fn test_infinite_loop_keeps_variables_live() {
        let source = "package main\nfunc f() {\n\tx := 0\n\tfor {\n\t\tx++\n\t}\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());
        let result = DataFlowSolver::default().solve(&Liveness, &cfg);
        assert!(result.converged);
        let x = program.info.symbols.iter().position(|s| s.name == "x").unwrap() as SymbolId;
        for node in cfg.nodes.iter().filter(|n| n.in_loop()) {
            assert!(result.in_states[node.id].contains(&x), "x not live at {:?}", node.label);
        }
        let header = cfg.nodes.iter().find(|n| n.label == NodeLabel::ForHeader).unwrap();
        assert!(result.out_states[header.id].contains(&x));
    }

    #[test]
    fn test_dead_after_last_use() {
        let source = "package main\nfunc f(a int) int {\n\tb := a * 2\n\tc := b + 1\n\treturn c\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());
        let result = DataFlowSolver::default().solve(&Liveness, &cfg);
        let b = program.info.symbols.iter().position(|s| s.name == "b").unwrap() as SymbolId;
        let stmts: Vec<_> = cfg.nodes.iter().filter(|n| n.label == NodeLabel::Stmt).collect();
        assert!(result.out_states[stmts[0].id].contains(&b));
        assert!(!result.out_states[stmts[1].id].contains(&b));
        assert!(result.in_states[cfg.entry].is_empty());
    }
}
