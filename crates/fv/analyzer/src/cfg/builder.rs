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

//! CFG construction from a function body
//!
//! The builder keeps a list of *pending* edges: the dangling exits of the
//! code emitted so far. Emitting a node connects every pending edge to it.
//! Jumps (`break`, `continue`, `goto`, `return`, `panic`) consume the
//! pending list so that following statements start unreachable and are
//! pruned afterwards.

use super::{Cfg, CfgNode, CfgNodeId, EdgeKind, NodeLabel, Payload, dominance, effects, reachability};
use crate::frontend::FunctionUnit;
use crate::frontend::ast::{Block, CaseClause, CommClause, Expr, ExprKind, FuncTypeExpr, Ident, Stmt, StmtKind, TypeCaseClause};
use crate::frontend::builtins::Builtin;
use crate::frontend::info::{Callee, TypeInfo};
use crate::frontend::visit::{Visitor, walk_expr};
use fv_common::Span;
use std::collections::{HashMap, HashSet};
use std::mem;
use tracing::debug;

type Pending = (CfgNodeId, EdgeKind);

/// Build the CFG of one function body
pub fn build_cfg<'p>(info: &TypeInfo, unit: FunctionUnit<'p>) -> Cfg<'p> {
    CfgBuilder::new(info, unit).build()
}

/// Target of `break` and `continue`
struct Breakable {
    label: Option<String>,
    is_loop: bool,
    breaks: Vec<Pending>,
    continue_target: Option<CfgNodeId>,
}

struct CfgBuilder<'p, 'i> {
    info: &'i TypeInfo,
    unit: FunctionUnit<'p>,
    nodes: Vec<CfgNode<'p>>,
    edges: Vec<(CfgNodeId, CfgNodeId, EdgeKind)>,
    pending: Vec<Pending>,
    entry: CfgNodeId,
    exit: CfgNodeId,
    panic_exit: Option<CfgNodeId>,
    /// Deferred calls in registration order
    defers: Vec<&'p Expr>,
    breakables: Vec<Breakable>,
    labels: HashMap<String, CfgNodeId>,
    defined_labels: HashSet<String>,
    gotos: Vec<(String, Span)>,
    /// Label of the statement about to be built
    next_label: Option<String>,
    /// Edges leaving a case body through `fallthrough`
    fallthrough: Vec<Pending>,
    loop_depth: u32,
    incomplete: Vec<(Span, String)>,
}

impl<'p, 'i> CfgBuilder<'p, 'i> {
    fn new(info: &'i TypeInfo, unit: FunctionUnit<'p>) -> Self {
        let mut builder = Self {
            info,
            unit,
            nodes: Vec::new(),
            edges: Vec::new(),
            pending: Vec::new(),
            entry: 0,
            exit: 0,
            panic_exit: None,
            defers: Vec::new(),
            breakables: Vec::new(),
            labels: HashMap::new(),
            defined_labels: HashSet::new(),
            gotos: Vec::new(),
            next_label: None,
            fallthrough: Vec::new(),
            loop_depth: 0,
            incomplete: Vec::new(),
        };
        let body = unit.body.span;
        builder.entry = builder.add(NodeLabel::Entry, Span::new(body.file, body.start, body.start), Payload::None);
        builder.exit = builder.add(NodeLabel::Exit, Span::new(body.file, body.end, body.end), Payload::None);
        builder
    }

    fn build(mut self) -> Cfg<'p> {
        let unit = self.unit;
        let info = self.info;
        self.pending = vec![(self.entry, EdgeKind::Normal)];
        self.stmts(&unit.body.stmts);
        if !self.pending.is_empty() {
            self.exit_path(false);
        }

        for (name, span) in mem::take(&mut self.gotos) {
            if !self.defined_labels.contains(&name) {
                self.incomplete.push((span, format!("goto to undefined label '{}'", name)));
                if let Some(&target) = self.labels.get(&name) {
                    self.edges.push((target, self.exit, EdgeKind::Normal));
                }
            }
        }

        let func = info.func(unit.id);
        for node in &mut self.nodes {
            let (defs, uses) = effects::node_effects(info, unit.id, node.payload);
            node.defs = defs;
            node.uses = uses;
        }
        let entry_defs = func.params.iter().chain(func.results.iter()).chain(std::iter::once(&func.recv)).flatten().copied();
        self.nodes[self.entry].defs.extend(entry_defs.filter(|&sym| !info.symbol(sym).is_blank()));

        let raw = Cfg::from_parts(unit.id, func.name.clone(), unit.file.file_id, self.nodes, self.edges, self.entry, self.exit, self.panic_exit);
        let mut cfg = reachability::prune(raw);
        cfg.incomplete = self.incomplete;
        let dom = dominance::DominatorTree::compute(&cfg);
        cfg.irreducible = dominance::is_irreducible(&cfg, &dom);
        debug!(function = %cfg.name, nodes = cfg.len(), edges = cfg.edge_count(), "built cfg");
        cfg
    }

    fn add(&mut self, label: NodeLabel, span: Span, payload: Payload<'p>) -> CfgNodeId {
        let id = self.nodes.len();
        self.nodes.push(CfgNode::new(id, label, span, payload, self.loop_depth));
        id
    }

    /// Add a node after the pending edges
    fn emit(&mut self, label: NodeLabel, span: Span, payload: Payload<'p>) -> CfgNodeId {
        let id = self.add(label, span, payload);
        self.connect(id);
        self.pending = vec![(id, EdgeKind::Normal)];
        id
    }

    /// Route every pending edge to `target`
    fn connect(&mut self, target: CfgNodeId) {
        for (from, kind) in mem::take(&mut self.pending) {
            self.edges.push((from, target, kind));
        }
    }

    fn stmts(&mut self, stmts: &'p [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, block: &'p Block) {
        self.stmts(&block.stmts);
    }

    fn stmt(&mut self, stmt: &'p Stmt) {
        match &stmt.kind {
            StmtKind::Empty => {}
            StmtKind::Expr(expr) => self.expr_stmt(stmt, expr),
            StmtKind::Send { .. } | StmtKind::IncDec { .. } | StmtKind::Assign { .. } | StmtKind::Var(_) | StmtKind::Const(_) | StmtKind::Type(_) | StmtKind::Go(_) => {
                self.simple(stmt);
            }
            StmtKind::Defer(call) => {
                self.simple(stmt);
                self.defers.push(call);
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If { init, cond, then, els } => self.if_stmt(stmt, init.as_deref(), cond, then, els.as_deref()),
            StmtKind::For { init, cond, post, body } => self.for_stmt(stmt, init.as_deref(), cond.as_ref(), post.as_deref(), body),
            StmtKind::Range { expr, body, .. } => self.range_stmt(stmt, expr, body),
            StmtKind::Switch { init, tag, cases } => self.switch_stmt(stmt, init.as_deref(), tag.as_ref(), cases),
            StmtKind::TypeSwitch { init, subject, cases, .. } => self.type_switch_stmt(init.as_deref(), subject, cases),
            StmtKind::Select { cases } => self.select_stmt(stmt, cases),
            StmtKind::Return(_) => {
                self.emit(NodeLabel::Return, stmt.span, Payload::Stmt(stmt));
                self.exit_path(false);
            }
            StmtKind::Break(label) => self.break_stmt(stmt.span, label.as_ref()),
            StmtKind::Continue(label) => self.continue_stmt(stmt.span, label.as_ref()),
            StmtKind::Goto(label) => {
                let target = self.label_node(label);
                self.connect(target);
                self.gotos.push((label.name.clone(), stmt.span));
            }
            StmtKind::Fallthrough => {
                self.fallthrough = mem::take(&mut self.pending);
            }
            StmtKind::Labeled { label, stmt: inner } => {
                let target = self.label_node(label);
                self.nodes[target].loop_depth = self.loop_depth;
                self.connect(target);
                self.pending = vec![(target, EdgeKind::Normal)];
                self.defined_labels.insert(label.name.clone());
                if matches!(inner.kind, StmtKind::For { .. } | StmtKind::Range { .. } | StmtKind::Switch { .. } | StmtKind::TypeSwitch { .. } | StmtKind::Select { .. }) {
                    self.next_label = Some(label.name.clone());
                }
                self.stmt(inner);
            }
        }
    }

    fn simple(&mut self, stmt: &'p Stmt) {
        if !self.calls_recover(stmt) {
            self.emit(NodeLabel::Stmt, stmt.span, Payload::Stmt(stmt));
            return;
        }
        // the result of recover depends on whether a panic is unwinding
        let node = self.emit(NodeLabel::Recover, stmt.span, Payload::Stmt(stmt));
        let after = Span::new(stmt.span.file, stmt.span.end, stmt.span.end);
        let panicking = self.add(NodeLabel::Join, after, Payload::None);
        let normal = self.add(NodeLabel::Join, after, Payload::None);
        self.edges.push((node, panicking, EdgeKind::Panicking));
        self.edges.push((node, normal, EdgeKind::NotPanicking));
        self.pending = vec![(panicking, EdgeKind::Normal), (normal, EdgeKind::Normal)];
    }

    fn expr_stmt(&mut self, stmt: &'p Stmt, expr: &'p Expr) {
        let info = self.info;
        let call = expr.unparen();
        if matches!(call.kind, ExprKind::Call { .. }) {
            match info.callee(call.id) {
                Some(Callee::Builtin(Builtin::Panic)) => {
                    self.emit(NodeLabel::Panic, stmt.span, Payload::Stmt(stmt));
                    self.exit_path(true);
                    return;
                }
                Some(callee) if callee.is_stdlib("os", "Exit") => {
                    self.emit(NodeLabel::Stmt, stmt.span, Payload::Stmt(stmt));
                    self.connect(self.exit);
                    return;
                }
                _ => {}
            }
        }
        self.simple(stmt);
    }

    /// Run the registered defers in reverse order, then leave the function
    fn exit_path(&mut self, panicking: bool) {
        let defers: Vec<&'p Expr> = self.defers.iter().rev().copied().collect();
        for call in defers {
            self.emit(NodeLabel::Defer, call.span, Payload::Deferred(call));
        }
        let target = if panicking { self.panic_target() } else { self.exit };
        self.connect(target);
    }

    fn panic_target(&mut self) -> CfgNodeId {
        if let Some(id) = self.panic_exit {
            return id;
        }
        let span = self.nodes[self.exit].span;
        let depth = mem::replace(&mut self.loop_depth, 0);
        let id = self.add(NodeLabel::Exit, span, Payload::None);
        self.loop_depth = depth;
        self.panic_exit = Some(id);
        id
    }

    fn label_node(&mut self, label: &Ident) -> CfgNodeId {
        if let Some(&id) = self.labels.get(&label.name) {
            return id;
        }
        let id = self.add(NodeLabel::Join, label.span, Payload::None);
        self.labels.insert(label.name.clone(), id);
        id
    }

    fn if_stmt(&mut self, stmt: &'p Stmt, init: Option<&'p Stmt>, cond: &'p Expr, then: &'p Block, els: Option<&'p Stmt>) {
        if let Some(init) = init {
            self.stmt(init);
        }
        let cond_node = self.emit(NodeLabel::IfCond, cond.span, Payload::Cond(cond));

        self.pending = vec![(cond_node, EdgeKind::True)];
        self.emit(NodeLabel::IfThen, then.span, Payload::None);
        self.block(then);
        let mut out = mem::take(&mut self.pending);

        self.pending = vec![(cond_node, EdgeKind::False)];
        if let Some(els) = els {
            self.emit(NodeLabel::IfElse, els.span, Payload::None);
            self.stmt(els);
        }
        out.append(&mut self.pending);

        self.pending = out;
        if !self.pending.is_empty() {
            self.emit(NodeLabel::Join, end_of(stmt.span), Payload::None);
        }
    }

    fn for_stmt(&mut self, stmt: &'p Stmt, init: Option<&'p Stmt>, cond: Option<&'p Expr>, post: Option<&'p Stmt>, body: &'p Block) {
        let label = self.next_label.take();
        if let Some(init) = init {
            self.stmt(init);
        }
        self.loop_depth += 1;
        let header = match cond {
            Some(cond) => self.emit(NodeLabel::ForHeader, cond.span, Payload::Cond(cond)),
            None => self.emit(NodeLabel::ForHeader, head_of(stmt.span, body.span), Payload::None),
        };
        let post_node = post.map(|post| self.add(NodeLabel::Stmt, post.span, Payload::Stmt(post)));
        self.breakables.push(Breakable {
            label,
            is_loop: true,
            breaks: Vec::new(),
            continue_target: Some(post_node.unwrap_or(header)),
        });

        let into_body = if cond.is_some() { EdgeKind::True } else { EdgeKind::Normal };
        self.pending = vec![(header, into_body)];
        self.emit(NodeLabel::ForBody, body.span, Payload::None);
        self.block(body);
        match post_node {
            Some(post_node) => {
                self.connect(post_node);
                self.edges.push((post_node, header, EdgeKind::Normal));
            }
            None => self.connect(header),
        }
        self.loop_depth -= 1;

        self.pending = self.breakables.pop().map(|b| b.breaks).unwrap_or_default();
        if cond.is_some() {
            self.pending.push((header, EdgeKind::False));
        }
    }

    fn range_stmt(&mut self, stmt: &'p Stmt, expr: &'p Expr, body: &'p Block) {
        let label = self.next_label.take();
        self.loop_depth += 1;
        let header = self.emit(NodeLabel::RangeHeader, Span::new(stmt.span.file, stmt.span.start, expr.span.end), Payload::Range(stmt));
        self.breakables.push(Breakable {
            label,
            is_loop: true,
            breaks: Vec::new(),
            continue_target: Some(header),
        });

        self.pending = vec![(header, EdgeKind::True)];
        self.emit(NodeLabel::ForBody, body.span, Payload::None);
        self.block(body);
        self.connect(header);
        self.loop_depth -= 1;

        self.pending = self.breakables.pop().map(|b| b.breaks).unwrap_or_default();
        self.pending.push((header, EdgeKind::False));
    }

    fn switch_stmt(&mut self, stmt: &'p Stmt, init: Option<&'p Stmt>, tag: Option<&'p Expr>, cases: &'p [CaseClause]) {
        let label = self.next_label.take();
        if let Some(init) = init {
            self.stmt(init);
        }
        let branch = match tag {
            Some(tag) => self.emit(NodeLabel::Branch, tag.span, Payload::Tag(tag)),
            None => self.emit(NodeLabel::Branch, Span::new(stmt.span.file, stmt.span.start, stmt.span.start), Payload::None),
        };
        let clauses = cases.iter().map(|case| (case.is_default, case.span, Payload::Case(case), case.body.as_slice()));
        self.cases(branch, label, NodeLabel::SwitchCase, clauses.collect());
    }

    fn type_switch_stmt(&mut self, init: Option<&'p Stmt>, subject: &'p Expr, cases: &'p [TypeCaseClause]) {
        let label = self.next_label.take();
        if let Some(init) = init {
            self.stmt(init);
        }
        let branch = self.emit(NodeLabel::Branch, subject.span, Payload::Tag(subject));
        let clauses = cases.iter().map(|case| (case.is_default, case.span, Payload::TypeCase(case), case.body.as_slice()));
        self.cases(branch, label, NodeLabel::SwitchCase, clauses.collect());
    }

    fn select_stmt(&mut self, stmt: &'p Stmt, cases: &'p [CommClause]) {
        let label = self.next_label.take();
        let branch = self.emit(NodeLabel::Branch, Span::new(stmt.span.file, stmt.span.start, stmt.span.start), Payload::None);
        if cases.is_empty() {
            // blocks forever
            self.pending.clear();
            return;
        }
        let clauses = cases.iter().map(|case| (case.is_default(), case.span, Payload::Comm(case), case.body.as_slice()));
        self.cases(branch, label, NodeLabel::SelectCase, clauses.collect());
    }

    /// Case heads and bodies shared by switch, type switch and select
    fn cases(&mut self, branch: CfgNodeId, label: Option<String>, case_label: NodeLabel, clauses: Vec<(bool, Span, Payload<'p>, &'p [Stmt])>) {
        self.pending.clear();
        self.breakables.push(Breakable {
            label,
            is_loop: false,
            breaks: Vec::new(),
            continue_target: None,
        });
        let mut out = Vec::new();
        let mut carried: Vec<Pending> = Vec::new();
        let mut has_default = false;
        for (is_default, span, payload, body) in clauses {
            let node = self.add(case_label, span, payload);
            self.edges.push((branch, node, if is_default { EdgeKind::Default } else { EdgeKind::Normal }));
            has_default |= is_default;
            self.pending = mem::take(&mut carried);
            self.connect(node);
            self.pending = vec![(node, EdgeKind::Normal)];
            self.stmts(body);
            out.append(&mut self.pending);
            carried = mem::take(&mut self.fallthrough);
        }
        if !carried.is_empty() {
            self.incomplete.push((self.nodes[branch].span, "fallthrough out of the final case".to_string()));
            out.append(&mut carried);
        }
        if !has_default && case_label == NodeLabel::SwitchCase {
            out.push((branch, EdgeKind::Default));
        }
        if let Some(breakable) = self.breakables.pop() {
            out.extend(breakable.breaks);
        }
        self.pending = out;
        if self.pending.len() > 1 {
            let span = end_of(self.nodes[branch].span);
            self.emit(NodeLabel::Join, span, Payload::None);
        }
    }

    fn break_stmt(&mut self, span: Span, label: Option<&Ident>) {
        let target = match label {
            Some(label) => self.breakables.iter().rposition(|b| b.label.as_deref() == Some(label.name.as_str())),
            None => self.breakables.len().checked_sub(1),
        };
        match target {
            Some(index) => {
                let pending = mem::take(&mut self.pending);
                self.breakables[index].breaks.extend(pending);
            }
            None => self.incomplete.push((span, "break outside of a loop, switch or select".to_string())),
        }
    }

    fn continue_stmt(&mut self, span: Span, label: Option<&Ident>) {
        let target = self
            .breakables
            .iter()
            .rev()
            .find(|b| b.is_loop && label.is_none_or(|label| b.label.as_deref() == Some(label.name.as_str())))
            .and_then(|b| b.continue_target);
        match target {
            Some(target) => self.connect(target),
            None => self.incomplete.push((span, "continue outside of a loop".to_string())),
        }
    }

    fn calls_recover(&self, stmt: &'p Stmt) -> bool {
        let mut finder = RecoverFinder { info: self.info, found: false };
        finder.visit_stmt(stmt);
        finder.found
    }
}

/// Direct `recover()` calls, not those inside nested function literals
struct RecoverFinder<'i> {
    info: &'i TypeInfo,
    found: bool,
}

impl<'ast> Visitor<'ast> for RecoverFinder<'_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        if matches!(self.info.callee(expr.id), Some(Callee::Builtin(Builtin::Recover))) {
            self.found = true;
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {}
}

fn end_of(span: Span) -> Span {
    Span::new(span.file, span.end, span.end)
}

/// Span from the start of a statement to the start of its body
fn head_of(stmt: Span, body: Span) -> Span {
    Span::new(stmt.file, stmt.start, body.start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::Cfg;
    use crate::frontend::Program;

    fn with_cfg(source: &str, name: &str, check: impl FnOnce(&Program, &Cfg<'_>)) {
        let (program, findings) = Program::from_source("test.go", source);
        assert!(findings.is_empty(), "{:?}", findings);
        let id = program.func_named(name).unwrap();
        let unit = program.unit(id).unwrap();
        let cfg = build_cfg(&program.info, unit);
        check(&program, &cfg);
    }

    fn labels(cfg: &Cfg<'_>) -> Vec<NodeLabel> {
        cfg.nodes.iter().map(|n| n.label).collect()
    }

    #[test]
    fn test_single_statement_chain() {
        with_cfg("package main\nfunc f() {\n\tprintln(1)\n}\n", "f", |_, cfg| {
            assert_eq!(labels(cfg), vec![NodeLabel::Entry, NodeLabel::Exit, NodeLabel::Stmt]);
            assert_eq!(cfg.successors(cfg.entry), &[(2, EdgeKind::Normal)]);
            assert_eq!(cfg.successors(2), &[(cfg.exit, EdgeKind::Normal)]);
            assert_eq!(cfg.edge_count(), 2);
            assert!(!cfg.non_terminating);
        });
    }

    #[test]
    fn test_if_without_else_joins() {
        with_cfg("package main\nfunc f(x int) int {\n\tif x > 0 {\n\t\tx = 1\n\t}\n\treturn x\n}\n", "f", |_, cfg| {
            let cond = cfg.nodes.iter().find(|n| n.label == NodeLabel::IfCond).unwrap().id;
            let kinds: Vec<EdgeKind> = cfg.successors(cond).iter().map(|&(_, k)| k).collect();
            assert_eq!(kinds, vec![EdgeKind::True, EdgeKind::False]);
            let join = cfg.nodes.iter().find(|n| n.label == NodeLabel::Join).unwrap().id;
            assert_eq!(cfg.predecessors(join).len(), 2);
            assert!(cfg.predecessors(join).contains(&cond));
        });
    }

    #[test]
    fn test_infinite_loop_has_no_exit_edge() {
        with_cfg("package main\nfunc spin() {\n\tx := 0\n\tfor {\n\t\tx++\n\t}\n}\n", "spin", |_, cfg| {
            assert!(cfg.non_terminating);
            assert!(cfg.predecessors(cfg.exit).is_empty());
            let header = cfg.nodes.iter().find(|n| n.label == NodeLabel::ForHeader).unwrap().id;
            assert!(cfg.succ_ids(header).all(|s| s != cfg.exit));
        });
    }

    #[test]
    fn test_three_clause_for() {
        with_cfg("package main\nfunc sum(n int) int {\n\ts := 0\n\tfor i := 0; i < n; i++ {\n\t\ts += i\n\t}\n\treturn s\n}\n", "sum", |_, cfg| {
            let header = cfg.nodes.iter().find(|n| n.label == NodeLabel::ForHeader).unwrap();
            assert_eq!(header.loop_depth, 1);
            let kinds: Vec<EdgeKind> = cfg.successors(header.id).iter().map(|&(_, k)| k).collect();
            assert_eq!(kinds, vec![EdgeKind::True, EdgeKind::False]);
            assert_eq!(cfg.back_edges().len(), 1);
            assert_eq!(cfg.complexity().cyclomatic, 2);
        });
    }

    #[test]
    fn test_defers_run_in_reverse_before_exit() {
        with_cfg("package main\nfunc a() {}\nfunc b() {}\nfunc f() {\n\tdefer a()\n\tdefer b()\n\tprintln(1)\n}\n", "f", |program, cfg| {
            let defers: Vec<&CfgNode<'_>> = cfg.nodes.iter().filter(|n| n.label == NodeLabel::Defer).collect();
            assert_eq!(defers.len(), 2);
            let first = match defers[0].payload {
                Payload::Deferred(call) => call,
                _ => panic!("defer without call"),
            };
            let callee = program.info.callee(first.id).unwrap();
            assert_eq!(callee, &Callee::Func(program.func_named("b").unwrap()));
            assert_eq!(cfg.successors(defers[0].id), &[(defers[1].id, EdgeKind::Normal)]);
            assert_eq!(cfg.successors(defers[1].id), &[(cfg.exit, EdgeKind::Normal)]);
        });
    }

    #[test]
    fn test_panic_unwinds_to_second_exit() {
        with_cfg("package main\nfunc cleanup() {}\nfunc f(x int) {\n\tdefer cleanup()\n\tif x < 0 {\n\t\tpanic(\"negative\")\n\t}\n}\n", "f", |_, cfg| {
            let panic_exit = cfg.panic_exit.unwrap();
            assert_eq!(cfg.node(panic_exit).label, NodeLabel::Exit);
            let panic = cfg.nodes.iter().find(|n| n.label == NodeLabel::Panic).unwrap().id;
            let (next, _) = cfg.successors(panic)[0];
            assert_eq!(cfg.node(next).label, NodeLabel::Defer);
            assert_eq!(cfg.succ_ids(next).collect::<Vec<_>>(), vec![panic_exit]);
            assert_eq!(cfg.exits().len(), 2);
        });
    }

    #[test]
    fn test_code_after_return_is_pruned() {
        with_cfg("package main\nfunc f() int {\n\treturn 1\n\tprintln(2)\n\tprintln(3)\n}\n", "f", |_, cfg| {
            assert_eq!(cfg.unreachable.len(), 1);
            assert_eq!(cfg.unreachable[0].start.line, 4);
            assert!(cfg.nodes.iter().all(|n| n.label != NodeLabel::Stmt));
            for node in &cfg.nodes {
                if node.id != cfg.entry {
                    assert!(!cfg.predecessors(node.id).is_empty());
                }
            }
        });
    }

    #[test]
    fn test_switch_with_fallthrough() {
        let source = "package main\nfunc f(x int) int {\n\tswitch x {\n\tcase 1:\n\t\tx = 10\n\t\tfallthrough\n\tcase 2:\n\t\tx = 20\n\tdefault:\n\t\tx = 0\n\t}\n\treturn x\n}\n";
        with_cfg(source, "f", |_, cfg| {
            let cases: Vec<CfgNodeId> = cfg.nodes.iter().filter(|n| n.label == NodeLabel::SwitchCase).map(|n| n.id).collect();
            assert_eq!(cases.len(), 3);
            assert_eq!(cfg.predecessors(cases[1]).len(), 2);
            let branch = cfg.nodes.iter().find(|n| n.label == NodeLabel::Branch).unwrap().id;
            assert_eq!(cfg.edge_kind(branch, cases[2]), Some(EdgeKind::Default));
            assert!(cfg.incomplete.is_empty());
        });
    }

    #[test]
    fn test_labeled_break_and_continue() {
        let source = "package main\nfunc f(n int) {\nouter:\n\tfor i := 0; i < n; i++ {\n\t\tfor j := 0; j < n; j++ {\n\t\t\tif j == 2 {\n\t\t\t\tcontinue outer\n\t\t\t}\n\t\t\tif j == 3 {\n\t\t\t\tbreak outer\n\t\t\t}\n\t\t}\n\t}\n}\n";
        with_cfg(source, "f", |_, cfg| {
            assert!(cfg.incomplete.is_empty());
            assert!(!cfg.non_terminating);
            let inner = cfg.nodes.iter().filter(|n| n.label == NodeLabel::ForHeader).nth(1).unwrap();
            assert_eq!(inner.loop_depth, 2);
        });
    }

    #[test]
    fn test_goto_and_undefined_label() {
        let source = "package main\nfunc f(n int) int {\nloop:\n\tn--\n\tif n > 0 {\n\t\tgoto loop\n\t}\n\treturn n\n}\nfunc g() {\n\tgoto missing\n}\n";
        with_cfg(source, "f", |_, cfg| {
            assert!(cfg.incomplete.is_empty());
            assert!(!cfg.irreducible);
            assert_eq!(cfg.back_edges().len(), 1);
        });
        with_cfg(source, "g", |_, cfg| {
            assert_eq!(cfg.incomplete.len(), 1);
            assert!(cfg.incomplete[0].1.contains("missing"));
        });
    }

    #[test]
    fn test_empty_select_blocks() {
        with_cfg("package main\nfunc f() {\n\tselect {}\n}\n", "f", |_, cfg| {
            assert!(cfg.non_terminating);
            let branch = cfg.nodes.iter().find(|n| n.label == NodeLabel::Branch).unwrap().id;
            assert!(cfg.successors(branch).is_empty());
        });
    }

    #[test]
    fn test_recover_node_label() {
        with_cfg("package main\nfunc f() {\n\tdefer func() {\n\t\tif r := recover(); r != nil {\n\t\t\tprintln(r)\n\t\t}\n\t}()\n}\n", "f.func1", |_, cfg| {
            let recover = cfg.nodes.iter().find(|n| n.label == NodeLabel::Recover).unwrap().id;
            let succs = cfg.successors(recover);
            assert_eq!(succs.len(), 2);
            let kinds: HashSet<EdgeKind> = succs.iter().map(|&(_, kind)| kind).collect();
            assert_eq!(kinds, HashSet::from([EdgeKind::Panicking, EdgeKind::NotPanicking]));
            let merged: HashSet<CfgNodeId> = succs.iter().flat_map(|&(succ, _)| cfg.succ_ids(succ)).collect();
            assert_eq!(merged.len(), 1);
            let cond = merged.into_iter().next().unwrap();
            assert_eq!(cfg.node(cond).label, NodeLabel::IfCond);
        });
    }

    #[test]
    fn test_entry_defines_parameters() {
        with_cfg("package main\nfunc f(a, b int) (r int) {\n\tr = a + b\n\treturn\n}\n", "f", |_, cfg| {
            assert_eq!(cfg.node(cfg.entry).defs.len(), 3);
        });
    }
}
