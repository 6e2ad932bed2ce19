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

//! Reachability analysis and pruning of unreachable nodes

use super::{Cfg, CfgNodeId};
use fv_common::Span;
use std::collections::{HashMap, VecDeque};

pub struct ReachabilityAnalyzer;

impl ReachabilityAnalyzer {
    /// Nodes reachable from the entry
    pub fn reachable(cfg: &Cfg<'_>) -> Vec<bool> {
        let mut seen = vec![false; cfg.len()];
        let mut queue = VecDeque::from([cfg.entry]);
        seen[cfg.entry] = true;
        while let Some(node) = queue.pop_front() {
            for next in cfg.succ_ids(node) {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Returns IDs of unreachable nodes
    pub fn find_unreachable(cfg: &Cfg<'_>) -> Vec<CfgNodeId> {
        let seen = Self::reachable(cfg);
        (0..cfg.len()).filter(|&n| !seen[n]).collect()
    }

    /// Start of each unreachable region that holds code
    ///
    /// A region is a connected group of unreachable nodes.
    pub fn unreachable_regions(cfg: &Cfg<'_>) -> Vec<Span> {
        let seen = Self::reachable(cfg);
        let dead = |n: CfgNodeId| !seen[n] && !cfg.is_exit(n);
        let mut region = vec![usize::MAX; cfg.len()];
        let mut spans = Vec::new();
        for start in 0..cfg.len() {
            if !dead(start) || region[start] != usize::MAX {
                continue;
            }
            let mut first: Option<Span> = None;
            let mut stack = vec![start];
            region[start] = start;
            while let Some(node) = stack.pop() {
                let current = &cfg.nodes[node];
                if !current.payload.is_none() && first.is_none_or(|span| current.span.start.offset < span.start.offset) {
                    first = Some(current.span);
                }
                let neighbours = cfg.succ_ids(node).chain(cfg.predecessors(node).iter().copied()).collect::<Vec<_>>();
                for next in neighbours {
                    if dead(next) && region[next] == usize::MAX {
                        region[next] = start;
                        stack.push(next);
                    }
                }
            }
            spans.extend(first);
        }
        spans.sort_by_key(|span| span.start.offset);
        spans
    }
}

/// Drop unreachable nodes and renumber the rest densely
///
/// The normal exit is always kept; an unreachable exit means the function
/// never returns.
pub(crate) fn prune<'p>(cfg: Cfg<'p>) -> Cfg<'p> {
    let seen = ReachabilityAnalyzer::reachable(&cfg);
    let unreachable = ReachabilityAnalyzer::unreachable_regions(&cfg);
    let exit = cfg.exit;
    let keep = |n: CfgNodeId| seen[n] || n == exit;
    if (0..cfg.len()).all(keep) {
        let mut cfg = cfg;
        cfg.unreachable = unreachable;
        return cfg;
    }

    let mut renumber: HashMap<CfgNodeId, CfgNodeId> = HashMap::new();
    for old in (0..cfg.len()).filter(|&n| keep(n)) {
        renumber.insert(old, renumber.len());
    }
    let edges: Vec<_> = cfg
        .edges()
        .filter_map(|(from, to, kind)| match (renumber.get(&from), renumber.get(&to)) {
            (Some(&from), Some(&to)) => Some((from, to, kind)),
            _ => None,
        })
        .collect();
    let entry = renumber[&cfg.entry];
    let exit = renumber[&cfg.exit];
    let panic_exit = cfg.panic_exit.and_then(|id| renumber.get(&id).copied());
    let nodes = cfg
        .nodes
        .into_iter()
        .filter_map(|mut node| {
            let id = *renumber.get(&node.id)?;
            node.id = id;
            Some(node)
        })
        .collect();

    let mut pruned = Cfg::from_parts(cfg.func, cfg.name, cfg.file, nodes, edges, entry, exit, panic_exit);
    pruned.unreachable = unreachable;
    pruned
}
