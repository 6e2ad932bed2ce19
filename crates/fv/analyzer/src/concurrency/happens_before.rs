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

//! Happens-before relation
//!
//! The relation is the transitive closure of
//!
//! - program order inside each goroutine (loop back edges excluded),
//! - goroutine creation: the spawn precedes every event of the child,
//! - synchronizes-with edges of channels, mutexes, wait groups and `Once`.
//!
//! Synchronization edges are added in a fixed order and an edge that would
//! close a cycle is dropped, which keeps the relation a strict partial order.

use super::events::{Event, EventId, EventKind, Resource};
use super::extract::ConcurrencyModel;
use crate::cfg::{CfgMap, CfgNodeId};
use crate::frontend::types::FuncId;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Program order of events in one goroutine
#[derive(Debug, Clone, Default)]
pub struct ProgramOrder {
    /// Acyclic reachability per function: `reach[f][a][b]`
    reach: HashMap<FuncId, Vec<Vec<bool>>>,
}

impl ProgramOrder {
    pub fn new(model: &ConcurrencyModel, cfgs: &CfgMap<'_>) -> Self {
        let mut reach = HashMap::new();
        for frame in &model.frames {
            if reach.contains_key(&frame.func) {
                continue;
            }
            if let Some(cfg) = cfgs.get(&frame.func) {
                let back = cfg.back_edges();
                let table: Vec<Vec<bool>> = (0..cfg.len()).map(|node| cfg.reachable_from(node, &back)).collect();
                reach.insert(frame.func, table);
            }
        }
        Self { reach }
    }

    fn node_reaches(&self, func: FuncId, from: CfgNodeId, to: CfgNodeId) -> bool {
        self.reach.get(&func).and_then(|table| table.get(from)).and_then(|row| row.get(to)).copied().unwrap_or(false)
    }

    /// `a` executes before `b` in their common goroutine
    pub fn before(&self, model: &ConcurrencyModel, a: &Event, b: &Event) -> bool {
        if a.goroutine != b.goroutine || a.id == b.id {
            return false;
        }
        for (x, y) in a.path.iter().zip(&b.path) {
            if x == y {
                continue;
            }
            if x.node == y.node {
                return x.seq < y.seq;
            }
            return self.node_reaches(model.frames[x.frame].func, x.node, y.node);
        }
        false
    }
}

/// Closure of the happens-before graph
#[derive(Debug, Clone)]
pub struct HappensBefore {
    reach: Vec<Vec<bool>>,
    sync_edges: usize,
    dropped_edges: usize,
}

impl HappensBefore {
    pub fn compute(model: &ConcurrencyModel, order: &ProgramOrder) -> Self {
        let count = model.events.len();
        let mut graph: DiGraph<EventId, ()> = DiGraph::with_capacity(count, count);
        for id in 0..count {
            graph.add_node(id);
        }

        for goroutine in &model.goroutines {
            for &a in &goroutine.events {
                for &b in &goroutine.events {
                    if order.before(model, &model.events[a], &model.events[b]) {
                        graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
                    }
                }
            }
            if let Some(spawn) = goroutine.spawn_event {
                for &event in &goroutine.events {
                    graph.add_edge(NodeIndex::new(spawn), NodeIndex::new(event), ());
                }
            }
        }

        let mut sync_edges = 0;
        let mut dropped_edges = 0;
        for (from, to) in synchronizes_with(model, order) {
            let (from, to) = (NodeIndex::new(from), NodeIndex::new(to));
            if graph.contains_edge(from, to) {
                continue;
            }
            if has_path_connecting(&graph, to, from, None) {
                dropped_edges += 1;
                continue;
            }
            graph.add_edge(from, to, ());
            sync_edges += 1;
        }

        let reach = closure(&graph);
        debug!(events = count, sync_edges, dropped_edges, "happens-before computed");
        Self { reach, sync_edges, dropped_edges }
    }

    /// `a` happens before `b`
    pub fn ordered(&self, a: EventId, b: EventId) -> bool {
        self.reach.get(a).and_then(|row| row.get(b)).copied().unwrap_or(false)
    }

    /// Neither event happens before the other
    pub fn concurrent(&self, a: EventId, b: EventId) -> bool {
        a != b && !self.ordered(a, b) && !self.ordered(b, a)
    }

    pub fn sync_edges(&self) -> usize {
        self.sync_edges
    }

    /// Synchronization edges skipped because they would close a cycle
    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges
    }
}

fn closure(graph: &DiGraph<EventId, ()>) -> Vec<Vec<bool>> {
    let count = graph.node_count();
    let mut reach = vec![vec![false; count]; count];
    match toposort(graph, None) {
        Ok(order) => {
            for node in order.into_iter().rev() {
                let mut row = vec![false; count];
                for next in graph.neighbors(node) {
                    row[next.index()] = true;
                    for (slot, &reached) in row.iter_mut().zip(&reach[next.index()]) {
                        *slot |= reached;
                    }
                }
                reach[node.index()] = row;
            }
        }
        Err(cycle) => {
            warn!(node = cycle.node_id().index(), "happens-before graph has a cycle, using search");
            for (index, row) in reach.iter_mut().enumerate() {
                let mut dfs = Dfs::new(graph, NodeIndex::new(index));
                while let Some(node) = dfs.next(graph) {
                    if node.index() != index {
                        row[node.index()] = true;
                    }
                }
            }
        }
    }
    reach
}

/// Candidate synchronizes-with edges in a deterministic order
fn synchronizes_with(model: &ConcurrencyModel, order: &ProgramOrder) -> Vec<(EventId, EventId)> {
    let mut by_resource: BTreeMap<&Resource, Vec<&Event>> = BTreeMap::new();
    for event in &model.events {
        if let Some(resource) = &event.resource {
            if !event.kind.is_memory() {
                by_resource.entry(resource).or_default().push(event);
            }
        }
    }

    let mut edges = Vec::new();
    for (resource, events) in by_resource {
        let of = |kind: EventKind| events.iter().copied().filter(move |e| e.kind == kind).collect::<Vec<_>>();
        let sends = of(EventKind::ChannelSend);
        let recvs = of(EventKind::ChannelReceive);
        let unbuffered = model.channels.get(resource) == Some(&Some(0));
        for (send, recv) in channel_pairs(&sends, &recvs) {
            edges.push((send.id, recv.id));
            if unbuffered {
                // The receive completes before the send returns
                for &after in &model.goroutines[send.goroutine].events {
                    if order.before(model, send, &model.events[after]) {
                        edges.push((recv.id, after));
                    }
                }
            }
        }
        for close in of(EventKind::ChannelClose) {
            for recv in recvs.iter().filter(|r| r.goroutine != close.goroutine) {
                edges.push((close.id, recv.id));
            }
        }

        let releases: Vec<&Event> = events.iter().copied().filter(|e| e.kind.is_release()).collect();
        let acquires: Vec<&Event> = events.iter().copied().filter(|e| e.kind.is_acquire()).collect();
        for release in &releases {
            for acquire in acquires.iter().filter(|a| a.goroutine != release.goroutine) {
                let shared = release.kind == EventKind::RwMutexRUnlock && acquire.kind == EventKind::RwMutexRLock;
                if !shared {
                    edges.push((release.id, acquire.id));
                }
            }
        }

        for done in of(EventKind::WaitGroupDone) {
            for wait in of(EventKind::WaitGroupWait).into_iter().filter(|w| w.goroutine != done.goroutine) {
                edges.push((done.id, wait.id));
            }
        }

        // Whichever body runs first completes before every Do returns
        for body in of(EventKind::OnceBody) {
            for done in of(EventKind::OnceDo).into_iter().filter(|d| d.goroutine != body.goroutine) {
                edges.push((body.id, done.id));
            }
        }
    }
    edges
}

/// Sends and receives that may pair up
///
/// With a single sender or a single receiver every cross-goroutine pair may
/// communicate. With several of both, the k-th send pairs with the k-th
/// receive only when each side runs in one goroutine; otherwise no pairing is
/// assumed.
fn channel_pairs<'m>(sends: &[&'m Event], recvs: &[&'m Event]) -> Vec<(&'m Event, &'m Event)> {
    if sends.len() == 1 || recvs.len() == 1 {
        return sends.iter().flat_map(|&s| recvs.iter().filter(move |r| r.goroutine != s.goroutine).map(move |&r| (s, r))).collect();
    }
    let single = |events: &[&Event]| events.windows(2).all(|w| w[0].goroutine == w[1].goroutine && !w[0].repeated && !w[1].repeated);
    if single(sends) && single(recvs) {
        return sends.iter().zip(recvs).filter(|(s, r)| s.goroutine != r.goroutine).map(|(&s, &r)| (s, r)).collect();
    }
    Vec::new()
}
