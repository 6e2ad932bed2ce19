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

//! Channel deadlocks and goroutine leaks
//!
//! A channel operation is blocked when no goroutine can ever complete it:
//! an unbuffered send nobody receives, a receive with no sender and no
//! close, sends beyond a buffer's capacity, or a `range` over a channel that
//! is never closed. Blocked operations of the root goroutine are deadlocks;
//! blocked operations of a spawned goroutine leak it unless the goroutine
//! shows an outer termination signal.
//!
//! Operations of a `select` with a `default` case never block.

use super::events::{Event, EventId, EventKind, GoroutineId, Resource};
use super::extract::ConcurrencyModel;
use super::happens_before::ProgramOrder;
use crate::cfg::{CfgMap, DominatorTree};
use crate::frontend::types::FuncId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};

/// An operation that can never complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked {
    pub event: EventId,
    pub reason: String,
    /// Blocks on every path through the goroutine
    pub certain: bool,
}

/// Goroutines waiting on each other's channel operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitCycle {
    /// First blocking operation of each member
    pub events: Vec<EventId>,
}

/// A spawned goroutine that may never terminate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leak {
    pub goroutine: GoroutineId,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeadlockReport {
    pub deadlocks: Vec<Blocked>,
    pub cycles: Vec<WaitCycle>,
    pub leaks: Vec<Leak>,
}

pub struct DeadlockDetector<'m, 'a, 'p> {
    model: &'m ConcurrencyModel,
    order: &'m ProgramOrder,
    cfgs: &'a CfgMap<'p>,
    describe: &'m dyn Fn(&Resource) -> String,
    dominators: HashMap<FuncId, DominatorTree>,
}

impl<'m, 'a, 'p> DeadlockDetector<'m, 'a, 'p> {
    pub fn new(model: &'m ConcurrencyModel, order: &'m ProgramOrder, cfgs: &'a CfgMap<'p>, describe: &'m dyn Fn(&Resource) -> String) -> Self {
        Self {
            model,
            order,
            cfgs,
            describe,
            dominators: HashMap::new(),
        }
    }

    pub fn detect(mut self) -> DeadlockReport {
        let blocked = self.blocked();
        let mut report = DeadlockReport::default();

        let root_blocked: Vec<&Blocked> = blocked.iter().filter(|b| self.model.event(b.event).goroutine == 0).collect();
        for candidate in &root_blocked {
            let event = self.model.event(candidate.event);
            // Nothing after an operation that always blocks ever runs
            let shadowed = root_blocked.iter().any(|other| other.certain && other.event != candidate.event && self.order.before(self.model, self.model.event(other.event), event));
            if !shadowed {
                report.deadlocks.push((*candidate).clone());
            }
        }

        report.cycles = self.wait_cycles();

        for goroutine in self.model.goroutines.iter().skip(1) {
            if self.terminates_externally(goroutine.id) {
                continue;
            }
            if let Some(first) = blocked.iter().find(|b| self.model.event(b.event).goroutine == goroutine.id) {
                report.leaks.push(Leak {
                    goroutine: goroutine.id,
                    reason: first.reason.clone(),
                });
            }
        }
        report
    }

    fn capacity(&self, resource: &Resource) -> Option<Option<i128>> {
        self.model.channels.get(resource).copied()
    }

    /// Operations that may block, on channels created by the program
    fn blocking_ops(&self) -> impl Iterator<Item = &'m Event> + '_ {
        self.model.events.iter().filter(move |e| {
            e.kind.is_channel_op() && !e.is_nonblocking() && e.resource.as_ref().is_some_and(|r| *r != Resource::Cancel && self.model.channels.contains_key(r))
        })
    }

    fn counterparts(&self, event: &'m Event) -> Vec<&'m Event> {
        let Some(resource) = &event.resource else {
            return Vec::new();
        };
        let buffered = matches!(self.capacity(resource), Some(Some(n)) if n > 0) || self.capacity(resource) == Some(None);
        self.model
            .events_on(resource)
            .filter(|other| match (event.kind, other.kind) {
                (EventKind::ChannelSend, EventKind::ChannelReceive) => other.goroutine != event.goroutine || (buffered && self.order.before(self.model, event, other)),
                (EventKind::ChannelReceive, EventKind::ChannelSend) => other.goroutine != event.goroutine || (buffered && self.order.before(self.model, other, event)),
                (EventKind::ChannelReceive, EventKind::ChannelClose) => true,
                _ => false,
            })
            .collect()
    }

    fn blocked(&mut self) -> Vec<Blocked> {
        let mut blocked = Vec::new();
        let mut selects: BTreeMap<(GoroutineId, usize, usize), Vec<&'m Event>> = BTreeMap::new();

        let ops: Vec<&'m Event> = self.blocking_ops().collect();
        for event in ops {
            if let Some(case) = event.select {
                selects.entry((event.goroutine, case.select.0, case.select.1)).or_default().push(event);
                continue;
            }
            let Some(resource) = &event.resource else {
                continue;
            };
            let name = (self.describe)(resource);
            let counterparts = self.counterparts(event);
            let reason = match event.kind {
                EventKind::ChannelReceive if event.range_loop && !counterparts.iter().any(|c| c.kind == EventKind::ChannelClose) => {
                    if counterparts.is_empty() {
                        Some(format!("range over channel '{}' that is never sent to or closed", name))
                    } else {
                        Some(format!("range over channel '{}' that is never closed", name))
                    }
                }
                EventKind::ChannelReceive if counterparts.is_empty() => Some(format!("receive from channel '{}' that is never sent to or closed", name)),
                EventKind::ChannelSend if self.capacity(resource) == Some(Some(0)) && counterparts.is_empty() => Some(format!("send on unbuffered channel '{}' with no concurrent receiver", name)),
                _ => None,
            };
            if let Some(reason) = reason {
                let certain = self.on_every_path(event);
                blocked.push(Blocked { event: event.id, reason, certain });
            }
        }

        for events in selects.values() {
            let stuck = events.iter().all(|event| self.counterparts(event).is_empty());
            if stuck {
                let event = events[0];
                blocked.push(Blocked {
                    event: event.id,
                    reason: "select whose cases can never proceed".to_string(),
                    certain: self.on_every_path(event),
                });
            }
        }

        blocked.extend(self.overflows());
        blocked.sort_by_key(|b| b.event);
        blocked.dedup_by_key(|b| b.event);
        blocked
    }

    /// Sends past a constant buffer capacity with no receiver in another goroutine
    fn overflows(&mut self) -> Vec<Blocked> {
        let model = self.model;
        let mut found = Vec::new();
        let mut channels: Vec<(&'m Resource, i128)> = model.channels.iter().filter_map(|(r, c)| c.filter(|&n| n > 0).map(|n| (r, n))).collect();
        channels.sort();
        for (resource, capacity) in channels {
            let ops: Vec<&'m Event> = model.events_on(resource).filter(|e| e.kind.is_channel_op() && !e.is_nonblocking()).collect();
            for goroutine in &model.goroutines {
                let mine: Vec<&'m Event> = ops.iter().copied().filter(|e| e.goroutine == goroutine.id).collect();
                let drained = ops.iter().any(|e| e.kind == EventKind::ChannelReceive && e.goroutine != goroutine.id);
                if drained || mine.is_empty() {
                    continue;
                }
                let repeated_recv = mine.iter().any(|e| e.kind == EventKind::ChannelReceive && e.repeated);
                let mut outstanding: i128 = 0;
                for event in mine {
                    match event.kind {
                        EventKind::ChannelSend => {
                            outstanding = if event.repeated && !repeated_recv { i128::MAX } else { outstanding.saturating_add(1) };
                            if outstanding > capacity {
                                found.push(Blocked {
                                    event: event.id,
                                    reason: format!("send exceeds the capacity {} of channel '{}'", capacity, (self.describe)(resource)),
                                    certain: !event.repeated && self.on_every_path(event),
                                });
                                break;
                            }
                        }
                        _ => outstanding = (outstanding - 1).max(0),
                    }
                }
            }
        }
        found
    }

    /// Goroutines whose first blocking operations wait on each other
    fn wait_cycles(&self) -> Vec<WaitCycle> {
        let ops: Vec<&'m Event> = self.blocking_ops().filter(|e| e.select.is_none()).collect();
        let mut first: BTreeMap<GoroutineId, &'m Event> = BTreeMap::new();
        for goroutine in &self.model.goroutines {
            let mine: Vec<&'m Event> = ops.iter().copied().filter(|e| e.goroutine == goroutine.id).collect();
            if let Some(&head) = mine.iter().find(|&&candidate| mine.iter().all(|&other| other.id == candidate.id || self.order.before(self.model, candidate, other))) {
                first.insert(goroutine.id, head);
            }
        }

        let mut graph: DiGraph<GoroutineId, ()> = DiGraph::new();
        let nodes: BTreeMap<GoroutineId, NodeIndex> = first.keys().map(|&g| (g, graph.add_node(g))).collect();
        for (&g, &op) in &first {
            let counterparts: Vec<&Event> = self.counterparts(op).into_iter().filter(|c| c.goroutine != g).collect();
            let Some(target) = counterparts.first().map(|c| c.goroutine) else {
                continue;
            };
            let Some(&their_first) = first.get(&target) else {
                continue;
            };
            let waits = counterparts.iter().all(|c| c.goroutine == target && c.id != their_first.id && self.order.before(self.model, their_first, c));
            if waits {
                graph.add_edge(nodes[&g], nodes[&target], ());
            }
        }

        let mut cycles = Vec::new();
        for component in tarjan_scc(&graph) {
            if component.len() < 2 {
                continue;
            }
            let mut events: Vec<EventId> = component.iter().map(|n| first[&graph[*n]].id).collect();
            events.sort();
            cycles.push(WaitCycle { events });
        }
        cycles
    }

    /// The goroutine has a way to stop that the model cannot see through
    fn terminates_externally(&self, goroutine: GoroutineId) -> bool {
        let model = self.model;
        model.goroutine(goroutine).events.iter().map(|&id| model.event(id)).any(|event| match event.kind {
            EventKind::WaitGroupDone => true,
            EventKind::ChannelReceive => match &event.resource {
                Some(Resource::Cancel) => true,
                Some(resource) => event.select.is_some() && model.events_on(resource).any(|e| e.kind == EventKind::ChannelClose),
                None => false,
            },
            _ => false,
        })
    }

    /// Every frame on the event's path reaches it on all paths to its exit
    fn on_every_path(&mut self, event: &Event) -> bool {
        if event.repeated {
            return false;
        }
        let cfgs = self.cfgs;
        for step in &event.path {
            let func = self.model.frames[step.frame].func;
            let Some(cfg) = cfgs.get(&func) else {
                return false;
            };
            if cfg.non_terminating {
                return false;
            }
            let dom = self.dominators.entry(func).or_insert_with(|| DominatorTree::compute(cfg));
            if !dom.dominates(step.node, cfg.exit) {
                return false;
            }
        }
        true
    }
}
