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

//! Control-flow graphs
//!
//! One [`Cfg`] is built per function body. Nodes are statements and the
//! synthetic points control structures need (conditions, case heads, joins);
//! edges are control transfers labeled only where a branch decides between
//! them.
//!
//! Node ids are dense and assigned in construction order, which follows the
//! source order of the body, so they are stable for a given function.

pub mod builder;
pub mod complexity;
pub mod dominance;
pub mod dot;
pub mod effects;
pub mod loops;
pub mod reachability;

pub use builder::build_cfg;
pub use complexity::{ControlFlowComplexity, FunctionMetrics, MetricLimits, metric_findings};
pub use dominance::DominatorTree;

use crate::frontend::ast::{CaseClause, CommClause, Expr, Stmt, TypeCaseClause};
use crate::frontend::scope::SymbolId;
use crate::frontend::types::FuncId;
use crate::frontend::Program;
use fv_common::{Category, FileId, Finding, Severity, Span};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

pub type CfgNodeId = usize;

/// CFGs of every function body of a program
pub type CfgMap<'p> = HashMap<FuncId, Cfg<'p>>;

/// Category of a CFG node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLabel {
    Entry,
    Exit,
    Stmt,
    IfCond,
    IfThen,
    IfElse,
    ForHeader,
    ForBody,
    RangeHeader,
    SwitchCase,
    SelectCase,
    Defer,
    Return,
    Panic,
    Recover,
    /// Head of a switch, type switch or select
    Branch,
    /// Merge point after a branch, or a label target
    Join,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Entry => "entry",
            NodeLabel::Exit => "exit",
            NodeLabel::Stmt => "stmt",
            NodeLabel::IfCond => "if_cond",
            NodeLabel::IfThen => "if_then",
            NodeLabel::IfElse => "if_else",
            NodeLabel::ForHeader => "for_header",
            NodeLabel::ForBody => "for_body",
            NodeLabel::RangeHeader => "range_header",
            NodeLabel::SwitchCase => "switch_case",
            NodeLabel::SelectCase => "select_case",
            NodeLabel::Defer => "defer",
            NodeLabel::Return => "return",
            NodeLabel::Panic => "panic",
            NodeLabel::Recover => "recover",
            NodeLabel::Branch => "branch",
            NodeLabel::Join => "join",
        }
    }

    /// Node that transfers control out of the function without a successor
    pub fn is_terminator(&self) -> bool {
        matches!(self, NodeLabel::Exit | NodeLabel::Return | NodeLabel::Panic)
    }
}

/// Label of a control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Normal,
    True,
    False,
    Default,
    /// Out of a `recover` node while a panic is being handled
    Panicking,
    NotPanicking,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Normal => "",
            EdgeKind::True => "true",
            EdgeKind::False => "false",
            EdgeKind::Default => "default",
            EdgeKind::Panicking => "panicking",
            EdgeKind::NotPanicking => "not_panicking",
        }
    }
}

/// AST fragment evaluated at a node
#[derive(Debug, Clone, Copy)]
pub enum Payload<'p> {
    None,
    /// Simple statement: expression, send, assignment, declaration, go, defer, return
    Stmt(&'p Stmt),
    /// `if` or `for` condition
    Cond(&'p Expr),
    /// `range` header; the statement carries key, value and ranged expression
    Range(&'p Stmt),
    /// Switch tag or type-switch subject
    Tag(&'p Expr),
    Case(&'p CaseClause),
    TypeCase(&'p TypeCaseClause),
    /// Select case with its communication
    Comm(&'p CommClause),
    /// Deferred call run on an exit path
    Deferred(&'p Expr),
}

impl Payload<'_> {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

#[derive(Debug, Clone)]
pub struct CfgNode<'p> {
    pub id: CfgNodeId,
    pub label: NodeLabel,
    pub span: Span,
    pub payload: Payload<'p>,
    /// Local variables written at this node
    pub defs: BTreeSet<SymbolId>,
    /// Local variables read at this node
    pub uses: BTreeSet<SymbolId>,
    /// Number of enclosing loops
    pub loop_depth: u32,
}

impl<'p> CfgNode<'p> {
    pub(crate) fn new(id: CfgNodeId, label: NodeLabel, span: Span, payload: Payload<'p>, loop_depth: u32) -> Self {
        Self {
            id,
            label,
            span,
            payload,
            defs: BTreeSet::new(),
            uses: BTreeSet::new(),
            loop_depth,
        }
    }

    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }
}

/// Control-flow graph of one function body
#[derive(Debug, Clone)]
pub struct Cfg<'p> {
    pub func: FuncId,
    pub name: String,
    pub file: FileId,
    pub nodes: Vec<CfgNode<'p>>,
    succs: Vec<Vec<(CfgNodeId, EdgeKind)>>,
    preds: Vec<Vec<CfgNodeId>>,
    pub entry: CfgNodeId,
    /// Normal exit, kept even when unreachable
    pub exit: CfgNodeId,
    /// Unwind target of `panic`, reached through the registered defers
    pub panic_exit: Option<CfgNodeId>,
    /// The normal exit has no predecessor
    pub non_terminating: bool,
    /// A `goto` created a loop with more than one entry
    pub irreducible: bool,
    /// Constructs that could not be connected faithfully
    pub incomplete: Vec<(Span, String)>,
    /// First statement of each pruned unreachable region
    pub unreachable: Vec<Span>,
}

impl<'p> Cfg<'p> {
    pub(crate) fn from_parts(func: FuncId, name: String, file: FileId, nodes: Vec<CfgNode<'p>>, edges: Vec<(CfgNodeId, CfgNodeId, EdgeKind)>, entry: CfgNodeId, exit: CfgNodeId, panic_exit: Option<CfgNodeId>) -> Self {
        let mut succs = vec![Vec::new(); nodes.len()];
        let mut preds = vec![Vec::new(); nodes.len()];
        for (from, to, kind) in edges {
            if succs[from].iter().any(|&(t, _)| t == to) {
                continue;
            }
            succs[from].push((to, kind));
            preds[to].push(from);
        }
        let non_terminating = preds[exit].is_empty();
        Self {
            func,
            name,
            file,
            nodes,
            succs,
            preds,
            entry,
            exit,
            panic_exit,
            non_terminating,
            irreducible: false,
            incomplete: Vec::new(),
            unreachable: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: CfgNodeId) -> &CfgNode<'p> {
        &self.nodes[id]
    }

    pub fn successors(&self, id: CfgNodeId) -> &[(CfgNodeId, EdgeKind)] {
        &self.succs[id]
    }

    pub fn succ_ids(&self, id: CfgNodeId) -> impl Iterator<Item = CfgNodeId> + '_ {
        self.succs[id].iter().map(|&(to, _)| to)
    }

    pub fn predecessors(&self, id: CfgNodeId) -> &[CfgNodeId] {
        &self.preds[id]
    }

    /// Kind of the edge `from -> to`
    pub fn edge_kind(&self, from: CfgNodeId, to: CfgNodeId) -> Option<EdgeKind> {
        self.succs[from].iter().find(|&&(t, _)| t == to).map(|&(_, kind)| kind)
    }

    pub fn edges(&self) -> impl Iterator<Item = (CfgNodeId, CfgNodeId, EdgeKind)> + '_ {
        self.succs.iter().enumerate().flat_map(|(from, succs)| succs.iter().map(move |&(to, kind)| (from, to, kind)))
    }

    pub fn edge_count(&self) -> usize {
        self.succs.iter().map(Vec::len).sum()
    }

    /// Exit-labeled nodes: the normal exit and the unwind target
    pub fn exits(&self) -> Vec<CfgNodeId> {
        let mut exits = vec![self.exit];
        exits.extend(self.panic_exit);
        exits
    }

    pub fn is_exit(&self, id: CfgNodeId) -> bool {
        id == self.exit || Some(id) == self.panic_exit
    }

    /// petgraph view with node weights equal to CFG ids
    pub fn graph(&self) -> DiGraph<CfgNodeId, EdgeKind> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edge_count());
        for node in &self.nodes {
            graph.add_node(node.id);
        }
        for (from, to, kind) in self.edges() {
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), kind);
        }
        graph
    }

    /// Nodes in reverse postorder from the entry
    pub fn reverse_postorder(&self) -> Vec<CfgNodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry] = true;
        while let Some((node, index)) = stack.pop() {
            if let Some(&(next, _)) = self.succs[node].get(index) {
                stack.push((node, index + 1));
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                order.push(node);
            }
        }
        order.reverse();
        order
    }

    /// Edges closing a cycle in a depth-first walk from the entry
    pub fn back_edges(&self) -> HashSet<(CfgNodeId, CfgNodeId)> {
        let mut back = HashSet::new();
        let mut state = vec![0u8; self.nodes.len()];
        let mut stack = vec![(self.entry, 0usize)];
        state[self.entry] = 1;
        while let Some((node, index)) = stack.pop() {
            if let Some(&(next, _)) = self.succs[node].get(index) {
                stack.push((node, index + 1));
                match state[next] {
                    0 => {
                        state[next] = 1;
                        stack.push((next, 0));
                    }
                    1 => {
                        back.insert((node, next));
                    }
                    _ => {}
                }
            } else {
                state[node] = 2;
            }
        }
        back
    }

    /// Nodes reachable from `from` in one or more steps, ignoring the given edges
    pub fn reachable_from(&self, from: CfgNodeId, skip: &HashSet<(CfgNodeId, CfgNodeId)>) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<CfgNodeId> = self.succ_ids(from).filter(|&to| !skip.contains(&(from, to))).collect();
        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            stack.extend(self.succ_ids(node).filter(|&to| !skip.contains(&(node, to))));
        }
        seen
    }

    pub fn complexity(&self) -> ControlFlowComplexity {
        ControlFlowComplexity::of(self)
    }
}

/// Findings about the graph itself: incomplete constructs, unreachable code, complexity
pub fn cfg_findings(cfg: &Cfg<'_>, program: &Program, complexity_threshold: u32) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (span, reason) in &cfg.incomplete {
        findings.push(
            Finding::new(Category::CfgIncomplete, Severity::Warning, program.location(*span), format!("control flow of '{}' is incomplete: {}", cfg.name, reason))
                .with_suggestion("downstream analyses of this function may be imprecise"),
        );
    }
    for span in &cfg.unreachable {
        findings.push(
            Finding::new(Category::UnreachableCode, Severity::Warning, program.location(*span), format!("unreachable code in '{}'", cfg.name))
                .with_suggestion("remove the statements or fix the control flow that skips them"),
        );
    }
    let complexity = cfg.complexity();
    if complexity.cyclomatic > complexity_threshold as usize {
        if let Some(info) = program.info.functions.get(cfg.func as usize) {
            findings.push(
                Finding::new(
                    Category::Complexity,
                    Severity::Warning,
                    program.location(info.span),
                    format!("cyclomatic complexity of '{}' is {} (threshold {})", cfg.name, complexity.cyclomatic, complexity_threshold),
                )
                .with_suggestion("split the function into smaller functions")
                .with_theory("McCabe cyclomatic complexity"),
            );
        }
    }
    findings
}
