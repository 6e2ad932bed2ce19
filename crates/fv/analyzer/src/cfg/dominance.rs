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

//! Dominance analysis (builds dominator tree)

use super::{Cfg, CfgNodeId};
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::NodeIndex;

/// Immediate dominators of every reachable node
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: CfgNodeId,
    idom: Vec<Option<CfgNodeId>>,
}

impl DominatorTree {
    pub fn compute(cfg: &Cfg<'_>) -> Self {
        let graph = cfg.graph();
        let dominators = simple_fast(&graph, NodeIndex::new(cfg.entry));
        let idom = (0..cfg.len()).map(|n| dominators.immediate_dominator(NodeIndex::new(n)).map(|d| d.index())).collect();
        Self { entry: cfg.entry, idom }
    }

    pub fn immediate_dominator(&self, node: CfgNodeId) -> Option<CfgNodeId> {
        self.idom.get(node).copied().flatten()
    }

    /// Every path from the entry to `b` passes through `a`
    pub fn dominates(&self, a: CfgNodeId, b: CfgNodeId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Dominators of `node` from the closest to the entry
    pub fn dominators(&self, node: CfgNodeId) -> Vec<CfgNodeId> {
        let mut chain = vec![node];
        let mut current = node;
        while let Some(parent) = self.immediate_dominator(current) {
            chain.push(parent);
            current = parent;
        }
        if chain.last() != Some(&self.entry) {
            return Vec::new();
        }
        chain
    }
}

/// A retreating edge whose target does not dominate its source means a loop
/// with more than one entry
pub fn is_irreducible(cfg: &Cfg<'_>, dom: &DominatorTree) -> bool {
    cfg.back_edges().iter().any(|&(from, to)| !dom.dominates(to, from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{NodeLabel, build_cfg};
    use crate::frontend::Program;

    #[test]
    fn test_condition_dominates_branches() {
        let source = "package main\nfunc f(x int) int {\n\tif x > 0 {\n\t\tx = 1\n\t} else {\n\t\tx = 2\n\t}\n\treturn x\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());
        let dom = DominatorTree::compute(&cfg);
        let cond = cfg.nodes.iter().find(|n| n.label == NodeLabel::IfCond).unwrap().id;
        let then = cfg.nodes.iter().find(|n| n.label == NodeLabel::IfThen).unwrap().id;
        let join = cfg.nodes.iter().find(|n| n.label == NodeLabel::Join).unwrap().id;
        assert!(dom.dominates(cond, then));
        assert!(dom.dominates(cond, join));
        assert!(!dom.dominates(then, join));
        assert_eq!(dom.immediate_dominator(join), Some(cond));
        assert!(dom.dominates(cfg.entry, cfg.exit));
        assert_eq!(dom.dominators(cond).last(), Some(&cfg.entry));
    }

    #[test]
    fn test_goto_into_loop_is_irreducible() {
        let source = "package main\nfunc f(n int) {\n\tif n > 0 {\n\t\tgoto inside\n\t}\ntop:\n\tn--\ninside:\n\tn--\n\tif n > 0 {\n\t\tgoto top\n\t}\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());
        assert!(cfg.irreducible);
    }
}
