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

//! Data flow analysis framework trait and iterative solver
//!
//! A concrete analysis implements [`DataFlowAnalysis`]; [`DataFlowSolver`]
//! runs Kildall's round-robin iteration over the CFG until a full pass
//! changes nothing or the iteration cap is hit.

use crate::cfg::{Cfg, CfgNode, CfgNodeId};
use std::fmt::Debug;
use tracing::warn;

/// Default cap on solver passes
pub const DEFAULT_ITERATION_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Facts flow from the entry along edges
    Forward,
    /// Facts flow from the exits against edges
    Backward,
}

/// A monotone data flow problem over a CFG
pub trait DataFlowAnalysis {
    type Lattice: Clone + PartialEq + Debug;

    const DIRECTION: Direction;

    /// Value at the entry (forward) or at the exits (backward)
    fn boundary(&self, cfg: &Cfg<'_>) -> Self::Lattice;

    /// Starting value of every other node
    fn initial(&self, cfg: &Cfg<'_>) -> Self::Lattice;

    /// Combine `other` into `into`
    fn meet(&self, into: &mut Self::Lattice, other: &Self::Lattice);

    /// Value on the far side of a node given the value on the near side
    fn transfer(&self, node: &CfgNode<'_>, input: &Self::Lattice) -> Self::Lattice;
}

/// Per-node values at fixed point
#[derive(Debug, Clone)]
pub struct DataFlowResults<L> {
    /// Value before each node executes
    pub in_states: Vec<L>,
    /// Value after each node executes
    pub out_states: Vec<L>,
    /// Full passes performed
    pub iterations: usize,
    /// `false` when the iteration cap stopped the solver
    pub converged: bool,
}

impl<L> DataFlowResults<L> {
    pub fn in_state(&self, node: CfgNodeId) -> Option<&L> {
        self.in_states.get(node)
    }

    pub fn out_state(&self, node: CfgNodeId) -> Option<&L> {
        self.out_states.get(node)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DataFlowSolver {
    iteration_cap: usize,
}

impl Default for DataFlowSolver {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATION_CAP)
    }
}

impl DataFlowSolver {
    pub fn new(iteration_cap: usize) -> Self {
        Self { iteration_cap: iteration_cap.max(1) }
    }

    pub fn iteration_cap(&self) -> usize {
        self.iteration_cap
    }

    /// Run an analysis to fixed point
    pub fn solve<A: DataFlowAnalysis>(&self, analysis: &A, cfg: &Cfg<'_>) -> DataFlowResults<A::Lattice> {
        let initial = analysis.initial(cfg);
        let boundary = analysis.boundary(cfg);
        let mut in_states = vec![initial.clone(); cfg.len()];
        let mut out_states = vec![initial.clone(); cfg.len()];

        let mut order = cfg.reverse_postorder();
        let mut listed = vec![false; cfg.len()];
        for &node in &order {
            listed[node] = true;
        }
        order.extend((0..cfg.len()).filter(|&n| !listed[n]));
        if A::DIRECTION == Direction::Backward {
            order.reverse();
        }

        let mut iterations = 0;
        let converged = loop {
            if iterations >= self.iteration_cap {
                break false;
            }
            iterations += 1;
            let mut changed = false;
            for &node in &order {
                let (near, far) = match A::DIRECTION {
                    Direction::Forward => (&mut in_states, &mut out_states),
                    Direction::Backward => (&mut out_states, &mut in_states),
                };
                let incoming = match A::DIRECTION {
                    Direction::Forward if node == cfg.entry => boundary.clone(),
                    Direction::Forward => Self::combine(analysis, cfg.predecessors(node).iter().copied(), far, &initial),
                    Direction::Backward if cfg.is_exit(node) => boundary.clone(),
                    Direction::Backward => Self::combine(analysis, cfg.succ_ids(node), far, &initial),
                };
                let outgoing = analysis.transfer(&cfg.nodes[node], &incoming);
                if near[node] != incoming {
                    near[node] = incoming;
                    changed = true;
                }
                if far[node] != outgoing {
                    far[node] = outgoing;
                    changed = true;
                }
            }
            if !changed {
                break true;
            }
        };

        if !converged {
            warn!(function = %cfg.name, cap = self.iteration_cap, "data flow did not converge");
        }
        DataFlowResults {
            in_states,
            out_states,
            iterations,
            converged,
        }
    }

    /// Meet over the far-side values of the given neighbours
    fn combine<A: DataFlowAnalysis>(analysis: &A, neighbours: impl Iterator<Item = CfgNodeId>, far: &[A::Lattice], initial: &A::Lattice) -> A::Lattice {
        let mut result: Option<A::Lattice> = None;
        for neighbour in neighbours {
            match &mut result {
                Some(value) => analysis.meet(value, &far[neighbour]),
                None => result = Some(far[neighbour].clone()),
            }
        }
        result.unwrap_or_else(|| initial.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use crate::frontend::Program;

    /// Counts nodes on the longest acyclic prefix, saturating at a bound
    struct Depth;

    impl DataFlowAnalysis for Depth {
        type Lattice = u32;
        const DIRECTION: Direction = Direction::Forward;

        fn boundary(&self, _cfg: &Cfg<'_>) -> u32 {
            0
        }

        fn initial(&self, _cfg: &Cfg<'_>) -> u32 {
            0
        }

        fn meet(&self, into: &mut u32, other: &u32) {
            *into = (*into).max(*other);
        }

        fn transfer(&self, _node: &CfgNode<'_>, input: &u32) -> u32 {
            (*input + 1).min(50)
        }
    }

    #[test]
    fn test_cap_stops_unbounded_growth() {
        let source = "package main\nfunc f() {\n\tfor {\n\t\tprintln(1)\n\t}\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("f").unwrap()).unwrap());

        let capped = DataFlowSolver::new(3).solve(&Depth, &cfg);
        assert!(!capped.converged);
        assert_eq!(capped.iterations, 3);

        let full = DataFlowSolver::default().solve(&Depth, &cfg);
        assert!(full.converged);
        assert!(full.iterations <= DEFAULT_ITERATION_CAP);
        assert_eq!(full.out_states[cfg.entry], 1);
    }
}
