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

//! Natural loop detection

use super::dominance::DominatorTree;
use super::{Cfg, CfgNodeId};
use std::collections::BTreeSet;

/// Loop formed by back edges into one header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalLoop {
    pub header: CfgNodeId,
    /// Header included
    pub body: BTreeSet<CfgNodeId>,
    pub back_edges: Vec<(CfgNodeId, CfgNodeId)>,
}

impl NaturalLoop {
    pub fn contains(&self, node: CfgNodeId) -> bool {
        self.body.contains(&node)
    }
}

pub struct LoopDetector;

impl LoopDetector {
    /// Returns discovered loops ordered by header
    ///
    /// Only edges whose target dominates their source form natural loops;
    /// the remaining retreating edges are what makes a graph irreducible.
    pub fn detect(cfg: &Cfg<'_>, dom: &DominatorTree) -> Vec<NaturalLoop> {
        let mut back_edges: Vec<(CfgNodeId, CfgNodeId)> = cfg.edges().filter(|&(from, to, _)| dom.dominates(to, from)).map(|(from, to, _)| (from, to)).collect();
        back_edges.sort_by_key(|&(from, to)| (to, from));

        let mut loops: Vec<NaturalLoop> = Vec::new();
        for (from, header) in back_edges {
            let body = Self::body(cfg, header, from);
            match loops.iter_mut().find(|l| l.header == header) {
                Some(existing) => {
                    existing.body.extend(body);
                    existing.back_edges.push((from, header));
                }
                None => loops.push(NaturalLoop {
                    header,
                    body,
                    back_edges: vec![(from, header)],
                }),
            }
        }
        loops
    }

    /// Nodes that reach `tail` without passing through `header`
    fn body(cfg: &Cfg<'_>, header: CfgNodeId, tail: CfgNodeId) -> BTreeSet<CfgNodeId> {
        let mut body = BTreeSet::from([header]);
        let mut stack = vec![tail];
        while let Some(node) = stack.pop() {
            if body.insert(node) {
                stack.extend(cfg.predecessors(node).iter().copied());
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{NodeLabel, build_cfg};
    use crate::frontend::Program;

    #[test]
    fn test_nested_loops() {
        let source = "package main\nfunc f(n int) int {\n\ts := 0\n\tfor i := 0; i < n; i++ {\n\t\tfor j := 0; j < i; j++ {\n\t\t\ts++\n\t\t}\n\t}\n\treturn s\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());
        let dom = DominatorTree::compute(&cfg);
        let loops = LoopDetector::detect(&cfg, &dom);
        assert_eq!(loops.len(), 2);
        let headers: Vec<CfgNodeId> = cfg.nodes.iter().filter(|n| n.label == NodeLabel::ForHeader).map(|n| n.id).collect();
        let outer = loops.iter().find(|l| l.header == headers[0]).unwrap();
        let inner = loops.iter().find(|l| l.header == headers[1]).unwrap();
        assert!(outer.contains(headers[1]));
        assert!(inner.body.is_subset(&outer.body));
        assert!(!outer.contains(cfg.exit));
    }
}
