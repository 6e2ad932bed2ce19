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

//! Lock acquisition order
//!
//! Acquiring `b` while holding `a` adds the edge `a -> b` to a graph over
//! lock classes. A strongly connected component with more than one class
//! means two code paths take the same locks in opposite orders.

use super::extract::ConcurrencyModel;
use super::events::Resource;
use super::lockset::LockSets;
use crate::frontend::TypeInfo;
use crate::frontend::types::Type;
use fv_common::Span;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Lock identity shared by every instance of a field or variable
pub fn lock_class(resource: &Resource, info: &TypeInfo) -> String {
    match resource {
        Resource::Field(base, field) => {
            if let Resource::Var(sym) = base.as_ref() {
                let ty = match &info.symbol(*sym).ty {
                    Type::Pointer(inner) => inner.as_ref().clone(),
                    other => other.clone(),
                };
                if let Type::Named(id, _) = ty {
                    return format!("{}.{}", info.table.qualified_name(id), field);
                }
            }
            resource.describe(info)
        }
        other => other.describe(info),
    }
}

/// Ordered pairs of lock classes with the first acquisition site of each
#[derive(Debug, Clone, Default)]
pub struct LockOrderGraph {
    edges: BTreeMap<(String, String), Span>,
}

impl LockOrderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the orderings observed in one model
    pub fn record(&mut self, model: &ConcurrencyModel, locks: &LockSets, info: &TypeInfo) {
        let real: BTreeSet<&Resource> = model.events.iter().filter(|e| e.kind.is_acquire()).filter_map(|e| e.resource.as_ref()).collect();
        for event in model.events.iter().filter(|e| e.kind.is_acquire()) {
            let Some(resource) = &event.resource else {
                continue;
            };
            let to = lock_class(resource, info);
            for held in locks.held(event.id).iter().map(|h| &h.resource).filter(|r| real.contains(r)) {
                let from = lock_class(held, info);
                if from == to {
                    continue;
                }
                let site = self.edges.entry((from, to.clone())).or_insert(event.span);
                if (event.span.file, event.span.start) < (site.file, site.start) {
                    *site = event.span;
                }
            }
        }
    }

    pub fn merge(&mut self, other: LockOrderGraph) {
        for (edge, span) in other.edges {
            let site = self.edges.entry(edge).or_insert(span);
            if (span.file, span.start) < (site.file, site.start) {
                *site = span;
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Classes taken in inconsistent orders, with the earliest site involved
    pub fn cycles(&self) -> Vec<(Vec<String>, Span)> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
        for (from, to) in self.edges.keys() {
            for class in [from, to] {
                if !nodes.contains_key(class.as_str()) {
                    nodes.insert(class.as_str(), graph.add_node(class.clone()));
                }
            }
            graph.add_edge(nodes[from.as_str()], nodes[to.as_str()], ());
        }

        let mut cycles = Vec::new();
        for component in tarjan_scc(&graph) {
            if component.len() < 2 {
                continue;
            }
            let mut classes: Vec<String> = component.iter().map(|&n| graph[n].clone()).collect();
            classes.sort();
            let site = self
                .edges
                .iter()
                .filter(|((from, to), _)| classes.contains(from) && classes.contains(to))
                .map(|(_, span)| *span)
                .min_by_key(|span| (span.file, span.start));
            if let Some(site) = site {
                cycles.push((classes, site));
            }
        }
        cycles.sort_by(|a, b| a.0.cmp(&b.0));
        cycles
    }
}
