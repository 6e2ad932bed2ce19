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

//! Reaching definitions

use super::framework::{DataFlowAnalysis, Direction};
use crate::cfg::{Cfg, CfgNode, CfgNodeId};
use crate::frontend::scope::SymbolId;
use std::collections::BTreeSet;

/// Assignment of a variable at a node
pub type Definition = (CfgNodeId, SymbolId);

/// Forward may-analysis: `OUT(n) = gen(n) ∪ (IN(n) − kill(n))`
#[derive(Debug, Default, Clone, Copy)]
pub struct ReachingDefinitions;

impl DataFlowAnalysis for ReachingDefinitions {
    type Lattice = BTreeSet<Definition>;
    const DIRECTION: Direction = Direction::Forward;

    fn boundary(&self, _cfg: &Cfg<'_>) -> Self::Lattice {
        BTreeSet::new()
    }

    fn initial(&self, _cfg: &Cfg<'_>) -> Self::Lattice {
        BTreeSet::new()
    }

    fn meet(&self, into: &mut Self::Lattice, other: &Self::Lattice) {
        into.extend(other.iter().copied());
    }

    fn transfer(&self, node: &CfgNode<'_>, input: &Self::Lattice) -> Self::Lattice {
        let mut out: BTreeSet<Definition> = input.iter().filter(|(_, sym)| !node.defs.contains(sym)).copied().collect();
        out.extend(node.defs.iter().map(|&sym| (node.id, sym)));
        out
    }
}

/// Definitions of `sym` reaching a node
pub fn reaching_defs_of(state: &BTreeSet<Definition>, sym: SymbolId) -> Vec<CfgNodeId> {
    state.iter().filter(|(_, s)| *s == sym).map(|&(node, _)| node).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::NodeLabel;
    use crate::cfg::build_cfg;
    use crate::dataflow::framework::DataFlowSolver;
    use crate::frontend::Program;

    #[test]
    fn test_branches_merge_definitions() {
        let source = "package main\nfunc f(c bool) int {\n\tx := 1\n\tif c {\n\t\tx = 2\n\t}\n\treturn x\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());
        let result = DataFlowSolver::default().solve(&ReachingDefinitions, &cfg);
        let x = program.info.symbols.iter().position(|s| s.name == "x").unwrap() as SymbolId;
        let ret = cfg.nodes.iter().find(|n| n.label == NodeLabel::Return).unwrap();
        assert_eq!(reaching_defs_of(&result.in_states[ret.id], x).len(), 2);

        let c = program.info.symbols.iter().position(|s| s.name == "c").unwrap() as SymbolId;
        assert_eq!(reaching_defs_of(&result.in_states[ret.id], c), vec![cfg.entry]);
    }
}
