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

//! Concurrency analysis
//!
//! # Pipeline
//!
//! 1. **Model**: goroutines and their events from each root function ([`extract`])
//! 2. **Order**: program order and the happens-before closure ([`happens_before`])
//! 3. **Locks**: lock sets at every event ([`lockset`])
//! 4. **Detect**: data races, channel deadlocks, goroutine leaks and lock-order cycles
//!
//! The root is `main` when the program has one; otherwise every top-level
//! function that starts goroutines is a root of its own model. Lock orders
//! are additionally collected from every function body in isolation so that
//! orders taken by code never reached from a root are still compared.

pub mod deadlock;
pub mod events;
pub mod extract;
pub mod happens_before;
pub mod lock_order;
pub mod lockset;
pub mod races;

pub use deadlock::{Blocked, DeadlockDetector, DeadlockReport, Leak, WaitCycle};
pub use events::{Event, EventId, EventKind, Goroutine, GoroutineId, Resource};
pub use extract::{ConcurrencyModel, ModelBuilder};
pub use happens_before::{HappensBefore, ProgramOrder};
pub use lock_order::LockOrderGraph;
pub use lockset::LockSets;
pub use races::{DataRace, detect_races};

use crate::cfg::{CfgMap, Payload};
use crate::dataflow::DataFlowSolver;
use crate::frontend::ast::StmtKind;
use crate::frontend::types::FuncId;
use crate::frontend::{Program, TypeInfo};
use fv_common::{Category, Finding, FvResult, Severity};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

const RACE_THEORY: &str = "Lamport happens-before (1978) with Eraser lock sets";
const DEADLOCK_THEORY: &str = "Coffman circular wait over channel communication";
const LEAK_THEORY: &str = "happens-before reachability of goroutine termination";
const LOCK_ORDER_THEORY: &str = "lock-order graph cycle (Coffman circular wait)";

/// Findings and model sizes of a concurrency run
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyReport {
    pub findings: Vec<Finding>,
    pub roots: Vec<FuncId>,
    pub goroutines: usize,
    pub events: usize,
}

/// Analyzer for goroutine interactions
#[derive(Debug, Clone)]
pub struct ConcurrencyAnalyzer {
    solver: DataFlowSolver,
    /// Resolve interface calls with a single concrete receiver type
    pub precise_dispatch: bool,
    pub detect_races: bool,
    pub detect_deadlocks: bool,
    pub detect_leaks: bool,
    pub detect_lock_order: bool,
}

impl Default for ConcurrencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

struct RootOutcome {
    findings: Vec<Finding>,
    lock_order: LockOrderGraph,
    goroutines: usize,
    events: usize,
}

impl ConcurrencyAnalyzer {
    pub fn new() -> Self {
        Self {
            solver: DataFlowSolver::default(),
            precise_dispatch: false,
            detect_races: true,
            detect_deadlocks: true,
            detect_leaks: true,
            detect_lock_order: true,
        }
    }

    pub fn with_iteration_cap(mut self, cap: usize) -> Self {
        self.solver = DataFlowSolver::new(cap);
        self
    }

    pub fn with_precise_dispatch(mut self, precise: bool) -> Self {
        self.precise_dispatch = precise;
        self
    }

    pub fn with_race_detection(mut self, detect: bool) -> Self {
        self.detect_races = detect;
        self
    }

    pub fn with_deadlock_detection(mut self, detect: bool) -> Self {
        self.detect_deadlocks = detect;
        self
    }

    pub fn with_leak_detection(mut self, detect: bool) -> Self {
        self.detect_leaks = detect;
        self
    }

    pub fn with_lock_order_detection(mut self, detect: bool) -> Self {
        self.detect_lock_order = detect;
        self
    }

    /// Functions whose executions are modeled as whole programs
    pub fn roots(program: &Program, cfgs: &CfgMap<'_>) -> Vec<FuncId> {
        let info = &program.info;
        let main = info.functions.iter().find(|f| f.name == "main" && !f.is_closure() && !f.is_method() && cfgs.contains_key(&f.id));
        if let Some(main) = main {
            return vec![main.id];
        }
        info.functions.iter().filter(|f| !f.is_closure() && spawns(info, cfgs, f.id)).map(|f| f.id).collect()
    }

    /// Goroutines and events reachable from one root
    pub fn model(&self, program: &Program, cfgs: &CfgMap<'_>, root: FuncId) -> ConcurrencyModel {
        ModelBuilder::new(program, cfgs, root).with_precise_dispatch(self.precise_dispatch).build()
    }

    pub fn analyze(&self, program: &Program, cfgs: &CfgMap<'_>) -> FvResult<ConcurrencyReport> {
        let info = &program.info;
        let roots = Self::roots(program, cfgs);
        let outcomes: Vec<RootOutcome> = roots.par_iter().map(|&root| self.analyze_root(program, cfgs, root)).collect();

        let mut report = ConcurrencyReport {
            roots: roots.clone(),
            ..Default::default()
        };
        let mut lock_order = LockOrderGraph::new();
        for outcome in outcomes {
            report.findings.extend(outcome.findings);
            report.goroutines += outcome.goroutines;
            report.events += outcome.events;
            lock_order.merge(outcome.lock_order);
        }

        if self.detect_lock_order {
            let graphs: Vec<LockOrderGraph> = info
                .functions
                .par_iter()
                .filter(|f| cfgs.contains_key(&f.id))
                .map(|f| {
                    let model = ModelBuilder::new(program, cfgs, f.id).without_spawns().with_precise_dispatch(self.precise_dispatch).build();
                    let locks = LockSets::compute(&model, cfgs, &self.solver);
                    let mut graph = LockOrderGraph::new();
                    graph.record(&model, &locks, info);
                    graph
                })
                .collect();
            for graph in graphs {
                lock_order.merge(graph);
            }
            debug!(edges = lock_order.edge_count(), "lock order graph built");
            for (classes, site) in lock_order.cycles() {
                let names = classes.iter().map(|c| format!("'{}'", c)).collect::<Vec<_>>().join(", ");
                report.findings.push(
                    Finding::new(Category::LockOrder, Severity::Warning, program.location(site), format!("locks {} are acquired in inconsistent orders", names))
                        .with_suggestion("acquire these locks in one global order")
                        .with_theory(LOCK_ORDER_THEORY),
                );
            }
        }

        info!(roots = roots.len(), goroutines = report.goroutines, events = report.events, findings = report.findings.len(), "concurrency analysis complete");
        Ok(report)
    }

    fn analyze_root(&self, program: &Program, cfgs: &CfgMap<'_>, root: FuncId) -> RootOutcome {
        let info = &program.info;
        let model = self.model(program, cfgs, root);
        let order = ProgramOrder::new(&model, cfgs);
        let locks = LockSets::compute(&model, cfgs, &self.solver);
        let mut findings = Vec::new();

        if self.detect_races {
            let hb = HappensBefore::compute(&model, &order);
            let races = detect_races(&model, &hb, &locks, info);
            findings.extend(race_findings(program, &model, &races));
        }

        if self.detect_deadlocks || self.detect_leaks {
            let describe = |resource: &Resource| resource.describe(info);
            let report = DeadlockDetector::new(&model, &order, cfgs, &describe).detect();
            if self.detect_deadlocks {
                findings.extend(deadlock_findings(program, &model, &report, info));
            }
            if self.detect_leaks {
                for leak in &report.leaks {
                    let goroutine = model.goroutine(leak.goroutine);
                    let Some(span) = goroutine.spawn_span else {
                        continue;
                    };
                    findings.push(
                        Finding::new(Category::GoroutineLeak, Severity::Warning, program.location(span), format!("goroutine may never terminate: {}", leak.reason))
                            .with_suggestion("close the channel when done, or give the goroutine a cancellation case")
                            .with_theory(LEAK_THEORY),
                    );
                }
            }
        }

        let mut lock_order = LockOrderGraph::new();
        if self.detect_lock_order {
            lock_order.record(&model, &locks, info);
        }
        debug!(root = %program.func_name(root), goroutines = model.goroutines.len(), events = model.events.len(), "root analyzed");
        RootOutcome {
            findings,
            lock_order,
            goroutines: model.goroutines.len(),
            events: model.events.len(),
        }
    }
}

/// One finding per racing location, at its earliest write
fn race_findings(program: &Program, model: &ConcurrencyModel, races: &[DataRace]) -> Vec<Finding> {
    let info = &program.info;
    let mut by_location: BTreeMap<String, &DataRace> = BTreeMap::new();
    for race in races {
        let name = race.resource.describe(info);
        let span = model.event(race.write).span;
        match by_location.get(&name) {
            Some(existing) if (model.event(existing.write).span.file, model.event(existing.write).span.start) <= (span.file, span.start) => {}
            _ => {
                by_location.insert(name, race);
            }
        }
    }
    by_location
        .into_iter()
        .map(|(name, race)| {
            let write = model.event(race.write);
            let other = model.event(race.other);
            let other_location = program.location(other.span);
            let access = if other.kind.is_write() { "write" } else { "read" };
            let message = if race.write == race.other {
                format!("data race on '{}': write from goroutines started in a loop is not synchronized", name)
            } else {
                format!("data race on '{}': write is concurrent with {} at {}:{}", name, access, other_location.line, other_location.column)
            };
            Finding::new(Category::DataRace, Severity::Error, program.location(write.span), message)
                .with_suggestion(format!("guard '{}' with a sync.Mutex or use sync/atomic", name))
                .with_theory(RACE_THEORY)
        })
        .collect()
}

fn deadlock_findings(program: &Program, model: &ConcurrencyModel, report: &DeadlockReport, info: &TypeInfo) -> Vec<Finding> {
    let mut findings = Vec::new();
    for blocked in &report.deadlocks {
        let event = model.event(blocked.event);
        let severity = if blocked.certain { Severity::Error } else { Severity::Warning };
        let suggestion = match event.kind {
            EventKind::ChannelSend => "receive from the channel in a concurrent goroutine or give it enough buffer capacity",
            _ if event.range_loop => "close the channel after the last send",
            _ => "send on or close the channel from a concurrent goroutine",
        };
        findings.push(
            Finding::new(Category::ChannelDeadlock, severity, program.location(event.span), format!("channel deadlock: {}", blocked.reason))
                .with_suggestion(suggestion)
                .with_theory(DEADLOCK_THEORY),
        );
    }
    for cycle in &report.cycles {
        let Some(&first) = cycle.events.first() else {
            continue;
        };
        let channels: Vec<String> = cycle.events.iter().filter_map(|&id| model.event(id).resource.as_ref()).map(|r| format!("'{}'", r.describe(info))).collect();
        findings.push(
            Finding::new(
                Category::ChannelDeadlock,
                Severity::Error,
                program.location(model.event(first).span),
                format!("channel deadlock: {} goroutines wait on each other through channels {}", cycle.events.len(), channels.join(", ")),
            )
            .with_suggestion("reorder the operations so one goroutine communicates before it waits")
            .with_theory(DEADLOCK_THEORY),
        );
    }
    findings
}

/// The function or one of its closures starts a goroutine
fn spawns(info: &TypeInfo, cfgs: &CfgMap<'_>, func: FuncId) -> bool {
    let Some(cfg) = cfgs.get(&func) else {
        return false;
    };
    let direct = cfg.nodes.iter().any(|node| match node.payload {
        Payload::Stmt(stmt) => match &stmt.kind {
            StmtKind::Go(_) => true,
            StmtKind::Expr(expr) => info.callee(expr.unparen().id).is_some_and(|c| c.is_std_method("sync.WaitGroup", "Go")),
            _ => false,
        },
        _ => false,
    });
    direct || info.func(func).closures.iter().any(|&closure| spawns(info, cfgs, closure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;

    fn findings(source: &str) -> Vec<Finding> {
        let (program, problems) = Program::from_source("main.go", source);
        assert!(problems.is_empty(), "{:?}", problems);
        let cfgs: CfgMap = program.units().into_iter().map(|unit| (unit.id, build_cfg(&program.info, unit))).collect();
        ConcurrencyAnalyzer::new().analyze(&program, &cfgs).unwrap().findings
    }

    #[test]
    fn test_unsynchronized_increment_races() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"sync\"\n)\n\nfunc main() {\n\tcounter := 0\n\tvar wg sync.WaitGroup\n\twg.Add(2)\n\tfor i := 0; i < 2; i++ {\n\t\tgo func() {\n\t\t\tdefer wg.Done()\n\t\t\tcounter++\n\t\t}()\n\t}\n\twg.Wait()\n\tfmt.Println(counter)\n}\n";
        let found = findings(source);
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].category, Category::DataRace);
        assert_eq!(found[0].severity, Severity::Error);
        assert_eq!(found[0].location.line, 15);
    }

    #[test]
    fn test_mutex_protects_increment() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"sync\"\n)\n\nfunc main() {\n\tcounter := 0\n\tvar mu sync.Mutex\n\tvar wg sync.WaitGroup\n\twg.Add(2)\n\tfor i := 0; i < 2; i++ {\n\t\tgo func() {\n\t\t\tdefer wg.Done()\n\t\t\tmu.Lock()\n\t\t\tcounter++\n\t\t\tmu.Unlock()\n\t\t}()\n\t}\n\twg.Wait()\n\tfmt.Println(counter)\n}\n";
        assert!(findings(source).is_empty());
    }

    #[test]
    fn test_channel_handoff_orders_accesses() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tdata := 0\n\tdone := make(chan bool)\n\tgo func() {\n\t\tdata = 42\n\t\tdone <- true\n\t}()\n\t<-done\n\tfmt.Println(data)\n}\n";
        assert!(findings(source).is_empty());
    }

    #[test]
    fn test_send_without_receiver_deadlocks() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tch := make(chan int)\n\tch <- 42\n\tfmt.Println(<-ch)\n}\n";
        let found = findings(source);
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].category, Category::ChannelDeadlock);
        assert_eq!(found[0].severity, Severity::Error);
        assert_eq!(found[0].location.line, 7);
    }

    #[test]
    fn test_range_over_unclosed_channel_leaks() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tch := make(chan int)\n\tgo func() {\n\t\tfor v := range ch {\n\t\t\tfmt.Println(v)\n\t\t}\n\t}()\n\tch <- 1\n\tch <- 2\n}\n";
        let found = findings(source);
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].category, Category::GoroutineLeak);
        assert_eq!(found[0].severity, Severity::Warning);
        assert_eq!(found[0].location.line, 7);
    }

    #[test]
    fn test_select_default_never_blocks() {
        let source = "package main\n\nfunc main() {\n\tch := make(chan int)\n\tselect {\n\tcase ch <- 1:\n\tdefault:\n\t}\n}\n";
        assert!(findings(source).is_empty());
    }

    #[test]
    fn test_opposite_lock_orders() {
        let source = "package main\n\nimport \"sync\"\n\nvar a, b sync.Mutex\n\nfunc first() {\n\ta.Lock()\n\tb.Lock()\n\tb.Unlock()\n\ta.Unlock()\n}\n\nfunc second() {\n\tb.Lock()\n\ta.Lock()\n\ta.Unlock()\n\tb.Unlock()\n}\n\nfunc main() {\n\tgo first()\n\tgo second()\n}\n";
        let found = findings(source);
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].category, Category::LockOrder);
        assert!(found[0].message.contains("'a'"));
    }

    #[test]
    fn test_goroutines_waiting_on_each_other() {
        let source = "package main\n\nfunc main() {\n\ta := make(chan int)\n\tb := make(chan int)\n\tgo func() {\n\t\t<-a\n\t\tb <- 1\n\t}()\n\t<-b\n\ta <- 1\n}\n";
        let found = findings(source);
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].category, Category::ChannelDeadlock);
        assert_eq!(found[0].severity, Severity::Error);
    }

    #[test]
    fn test_once_body_precedes_every_do_return() {
        let source = "package main\n\nimport \"sync\"\n\nvar once sync.Once\nvar cfg int\n\nfunc get() int {\n\tonce.Do(func() { cfg = 1 })\n\treturn cfg\n}\n\nfunc main() {\n\tdone := make(chan bool)\n\tgo func() {\n\t\tget()\n\t\tdone <- true\n\t}()\n\tget()\n\t<-done\n}\n";
        let found = findings(source);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_read_locks_do_not_protect_writes() {
        let source = "package main\n\nimport \"sync\"\n\nvar mu sync.RWMutex\nvar x int\n\nfunc main() {\n\tdone := make(chan bool)\n\tgo func() {\n\t\tmu.RLock()\n\t\tx = 1\n\t\tmu.RUnlock()\n\t\tdone <- true\n\t}()\n\tmu.RLock()\n\tx = 2\n\tmu.RUnlock()\n\t<-done\n}\n";
        let found = findings(source);
        assert!(!found.is_empty());
        assert!(found.iter().all(|f| f.category == Category::DataRace), "{:?}", found);
        assert!(found[0].message.contains("'x'"), "{}", found[0].message);
    }

    #[test]
    fn test_write_lock_excludes_readers() {
        let source = "package main\n\nimport \"sync\"\n\nvar mu sync.RWMutex\nvar x int\n\nfunc main() {\n\tdone := make(chan bool)\n\tgo func() {\n\t\tmu.RLock()\n\t\t_ = x\n\t\tmu.RUnlock()\n\t\tdone <- true\n\t}()\n\tmu.Lock()\n\tx = 2\n\tmu.Unlock()\n\t<-done\n}\n";
        let found = findings(source);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_wait_group_orders_accesses() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"sync\"\n)\n\nfunc main() {\n\ttotal := 0\n\tvar wg sync.WaitGroup\n\twg.Add(1)\n\tgo func() {\n\t\tdefer wg.Done()\n\t\ttotal = 5\n\t}()\n\twg.Wait()\n\tfmt.Println(total)\n}\n";
        let found = findings(source);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_buffered_channel_handoff_orders_accesses() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tdata := 0\n\tch := make(chan int, 1)\n\tgo func() {\n\t\tdata = 7\n\t\tch <- 1\n\t}()\n\t<-ch\n\tfmt.Println(data)\n}\n";
        let found = findings(source);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_close_orders_accesses() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tdata := 0\n\tdone := make(chan struct{})\n\tgo func() {\n\t\tdata = 7\n\t\tclose(done)\n\t}()\n\t<-done\n\tfmt.Println(data)\n}\n";
        let found = findings(source);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_roots_without_main() {
        let source = "package worker\n\nfunc Start(ch chan int) {\n\tgo func() {\n\t\tch <- 1\n\t}()\n}\n\nfunc helper() int {\n\treturn 1\n}\n";
        let (program, _) = Program::from_source("worker.go", source);
        let cfgs: CfgMap = program.units().into_iter().map(|unit| (unit.id, build_cfg(&program.info, unit))).collect();
        let roots = ConcurrencyAnalyzer::roots(&program, &cfgs);
        assert_eq!(roots, vec![program.func_named("Start").unwrap()]);
    }
}
