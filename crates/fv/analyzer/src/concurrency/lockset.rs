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

//! Locks held at each event
//!
//! A forward must analysis per frame on the shared data flow framework:
//! the value at a point is the set of locks held on every path to it.
//! Inlined callees contribute a summary (locks still held at their exit,
//! locks they release) to the caller, and receive the caller's set at the
//! call site as their entry value. Read and write holds of an `RWMutex`
//! are tracked as separate locks.

use super::events::{EventId, HeldLock};
use super::extract::{ConcurrencyModel, LockOp};
use crate::cfg::{Cfg, CfgMap, CfgNode, CfgNodeId};
use crate::dataflow::{DataFlowAnalysis, DataFlowResults, DataFlowSolver, Direction};
use std::collections::{BTreeMap, BTreeSet};

type Ops = BTreeMap<CfgNodeId, Vec<(u32, LockOp)>>;

#[derive(Debug, Clone, Default)]
struct Summary {
    held_at_exit: BTreeSet<HeldLock>,
    released: BTreeSet<HeldLock>,
}

struct HeldLocks<'m> {
    ops: &'m Ops,
    summaries: &'m [Summary],
    entry: BTreeSet<HeldLock>,
    universe: BTreeSet<HeldLock>,
}

impl HeldLocks<'_> {
    fn apply(&self, op: &LockOp, held: &mut BTreeSet<HeldLock>) {
        apply(op, held, self.summaries);
    }
}

fn apply(op: &LockOp, held: &mut BTreeSet<HeldLock>, summaries: &[Summary]) {
    match op {
        LockOp::Acquire { lock, .. } => {
            held.insert(lock.clone());
        }
        LockOp::Release(lock) => {
            held.remove(lock);
        }
        LockOp::Call(frame) => {
            if let Some(summary) = summaries.get(*frame) {
                held.retain(|r| !summary.released.contains(r));
                held.extend(summary.held_at_exit.iter().cloned());
            }
        }
    }
}

impl DataFlowAnalysis for HeldLocks<'_> {
    type Lattice = BTreeSet<HeldLock>;

    const DIRECTION: Direction = Direction::Forward;

    fn boundary(&self, _cfg: &Cfg<'_>) -> BTreeSet<HeldLock> {
        self.entry.clone()
    }

    fn initial(&self, _cfg: &Cfg<'_>) -> BTreeSet<HeldLock> {
        self.universe.clone()
    }

    fn meet(&self, into: &mut BTreeSet<HeldLock>, other: &BTreeSet<HeldLock>) {
        into.retain(|r| other.contains(r));
    }

    fn transfer(&self, node: &CfgNode<'_>, input: &BTreeSet<HeldLock>) -> BTreeSet<HeldLock> {
        let mut held = input.clone();
        if let Some(ops) = self.ops.get(&node.id) {
            for (_, op) in ops {
                self.apply(op, &mut held);
            }
        }
        held
    }
}

/// Locks held immediately before each event
#[derive(Debug, Clone, Default)]
pub struct LockSets {
    held: Vec<BTreeSet<HeldLock>>,
}

impl LockSets {
    pub fn compute(model: &ConcurrencyModel, cfgs: &CfgMap<'_>, solver: &DataFlowSolver) -> Self {
        let frames = &model.frames;
        let mut summaries = vec![Summary::default(); frames.len()];

        // Callee frames always come after their caller
        for index in (0..frames.len()).rev() {
            let frame = &frames[index];
            let Some(cfg) = cfgs.get(&frame.func) else {
                continue;
            };
            let mut released = BTreeSet::new();
            for (_, op) in frame.ops.values().flatten() {
                match op {
                    LockOp::Release(lock) => {
                        released.insert(lock.clone());
                    }
                    LockOp::Call(child) => released.extend(summaries[*child].released.iter().cloned()),
                    LockOp::Acquire { .. } => {}
                }
            }
            let results = solver.solve(
                &HeldLocks {
                    ops: &frame.ops,
                    summaries: &summaries,
                    entry: BTreeSet::new(),
                    universe: acquired(&frame.ops, &summaries),
                },
                cfg,
            );
            let held_at_exit = if cfg.non_terminating { BTreeSet::new() } else { results.out_state(cfg.exit).cloned().unwrap_or_default() };
            summaries[index] = Summary { held_at_exit, released };
        }

        let mut results: Vec<Option<DataFlowResults<BTreeSet<HeldLock>>>> = vec![None; frames.len()];
        for (index, frame) in frames.iter().enumerate() {
            let Some(cfg) = cfgs.get(&frame.func) else {
                continue;
            };
            let entry = match (frame.parent, frame.call_path.last()) {
                (Some(parent), Some(step)) => before(&frames[parent].ops, results[parent].as_ref(), step.node, step.seq, &summaries),
                _ => BTreeSet::new(),
            };
            let mut universe = acquired(&frame.ops, &summaries);
            universe.extend(entry.iter().cloned());
            let analysis = HeldLocks {
                ops: &frame.ops,
                summaries: &summaries,
                entry,
                universe,
            };
            results[index] = Some(solver.solve(&analysis, cfg));
        }

        let held = model
            .events
            .iter()
            .map(|event| match event.path.last() {
                Some(step) => before(&frames[step.frame].ops, results[step.frame].as_ref(), step.node, step.seq, &summaries),
                None => BTreeSet::new(),
            })
            .collect();
        Self { held }
    }

    pub fn held(&self, event: EventId) -> &BTreeSet<HeldLock> {
        static EMPTY: BTreeSet<HeldLock> = BTreeSet::new();
        self.held.get(event).unwrap_or(&EMPTY)
    }

    /// Some lock held at both events excludes the other holder
    ///
    /// Two read locks of the same `RWMutex` protect nothing from each other.
    pub fn protected(&self, a: EventId, b: EventId) -> bool {
        let other = self.held(b);
        self.held(a).iter().any(|lock| other.iter().any(|held| lock.excludes(held)))
    }
}

fn acquired(ops: &Ops, summaries: &[Summary]) -> BTreeSet<HeldLock> {
    let mut set = BTreeSet::new();
    for (_, op) in ops.values().flatten() {
        match op {
            LockOp::Acquire { lock, .. } => {
                set.insert(lock.clone());
            }
            LockOp::Call(child) => set.extend(summaries[*child].held_at_exit.iter().cloned()),
            LockOp::Release(_) => {}
        }
    }
    set
}

/// Held set at a point inside a node: its input plus the node's earlier effects
fn before(ops: &Ops, results: Option<&DataFlowResults<BTreeSet<HeldLock>>>, node: CfgNodeId, seq: u32, summaries: &[Summary]) -> BTreeSet<HeldLock> {
    let mut held = results.and_then(|r| r.in_state(node)).cloned().unwrap_or_default();
    if let Some(node_ops) = ops.get(&node) {
        for (_, op) in node_ops.iter().filter(|(s, _)| *s < seq) {
            apply(op, &mut held, summaries);
        }
    }
    held
}
