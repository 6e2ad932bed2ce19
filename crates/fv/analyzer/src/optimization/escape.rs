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

//! Escape analysis
//!
//! A flow-insensitive points-to pass over one function body. Every
//! allocation site stays on the stack unless a reference to it reaches a
//! return, a global, a channel, a goroutine, an escaping closure or a
//! parameter that escapes in its callee. Callee behavior comes from
//! [`EscapeSummaries`], computed for the whole program to a fixed point.

use crate::analysis::{Analyzer, FunctionContext};
use crate::frontend::ast::{AssignOp, Block, Expr, ExprKind, NodeId, Stmt, StmtKind, UnaryOp};
use crate::frontend::builtins::Builtin;
use crate::frontend::info::{Callee, Selection};
use crate::frontend::scope::{SymbolId, SymbolKind};
use crate::frontend::types::{FuncId, Signature, Type};
use crate::frontend::{FunctionUnit, Program, TypeInfo};
use fv_common::{Category, Finding, FvResult, Severity, Span};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

const THEORY: &str = "escape analysis over a points-to graph (Choi et al., 1999)";
const MAX_ROUNDS: usize = 32;
const MAX_PASSES: usize = 64;

pub type SiteId = usize;

/// Ordered from most to least precise placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeVerdict {
    Stack,
    Unknown,
    Heap,
}

impl EscapeVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscapeVerdict::Stack => "stack",
            EscapeVerdict::Unknown => "unknown",
            EscapeVerdict::Heap => "heap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteKind {
    /// `&T{...}`
    AddressOfLiteral,
    /// Struct or array literal
    Literal,
    /// Slice or map literal
    CollectionLiteral,
    New,
    Make,
    Closure,
    /// Local variable whose address is taken or that a closure captures
    Variable,
}

/// Verdict for one allocation site
#[derive(Debug, Clone, Serialize)]
pub struct EscapeRecord {
    pub span: Span,
    pub kind: SiteKind,
    pub text: String,
    pub verdict: EscapeVerdict,
    pub reason: String,
    /// Steps supporting the verdict
    pub chain: Vec<String>,
}

/// What a callee does with one of its parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamFlow {
    pub escapes: bool,
    pub unknown: bool,
    /// Flows to a result
    pub returned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuncSummary {
    pub recv: ParamFlow,
    pub params: Vec<ParamFlow>,
}

/// Parameter flows of every function with a body
#[derive(Debug, Clone, Default)]
pub struct EscapeSummaries {
    funcs: HashMap<FuncId, FuncSummary>,
    rounds: usize,
}

impl EscapeSummaries {
    /// Iterate per-function analyses until no summary changes
    pub fn compute(program: &Program) -> Self {
        let units = program.units();
        let mut summaries = Self::default();
        for round in 1..=MAX_ROUNDS {
            let next: HashMap<FuncId, FuncSummary> = units.par_iter().map(|unit| (unit.id, FunctionEscapes::run(program, *unit, &summaries).summary())).collect();
            summaries.rounds = round;
            if next == summaries.funcs {
                break;
            }
            summaries.funcs = next;
        }
        debug!(functions = summaries.funcs.len(), rounds = summaries.rounds, "escape summaries computed");
        summaries
    }

    pub fn get(&self, func: FuncId) -> Option<&FuncSummary> {
        self.funcs.get(&func)
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SiteKey {
    Expr(NodeId),
    Var(SymbolId),
    /// Whatever the caller passes for a parameter
    Param(SymbolId),
}

#[derive(Debug, Clone)]
struct Site {
    key: SiteKey,
    kind: SiteKind,
    span: Span,
    text: String,
}

impl Site {
    fn is_param(&self) -> bool {
        matches!(self.key, SiteKey::Param(_))
    }
}

type Refs = BTreeSet<SiteId>;

struct FunctionEscapes<'p, 's> {
    program: &'p Program,
    info: &'p TypeInfo,
    unit: FunctionUnit<'p>,
    summaries: &'s EscapeSummaries,
    sites: Vec<Site>,
    site_of: HashMap<SiteKey, SiteId>,
    /// Sites a variable may point to
    refs: HashMap<SymbolId, Refs>,
    /// Literals stored directly in a variable
    values: HashMap<SymbolId, Refs>,
    /// Sites reachable from inside another site
    contents: BTreeMap<SiteId, Refs>,
    escapes: BTreeMap<SiteId, (EscapeVerdict, String)>,
    returned: Refs,
    changed: bool,
}

impl<'p, 's> FunctionEscapes<'p, 's> {
    fn run(program: &'p Program, unit: FunctionUnit<'p>, summaries: &'s EscapeSummaries) -> Self {
        let mut this = Self {
            program,
            info: &program.info,
            unit,
            summaries,
            sites: Vec::new(),
            site_of: HashMap::new(),
            refs: HashMap::new(),
            values: HashMap::new(),
            contents: BTreeMap::new(),
            escapes: BTreeMap::new(),
            returned: BTreeSet::new(),
            changed: false,
        };
        let func = this.info.func(unit.id);
        for sym in func.recv.iter().chain(func.params.iter().flatten()) {
            this.param_site(*sym);
        }
        for _ in 0..MAX_PASSES {
            this.changed = false;
            this.block(unit.body);
            if !this.changed {
                break;
            }
        }
        this.propagate();
        this
    }

    fn param_site(&mut self, sym: SymbolId) {
        let symbol = self.info.symbol(sym);
        if !is_reference(self.info, &symbol.ty) {
            return;
        }
        let id = self.site(SiteKey::Param(sym), SiteKind::Variable, symbol.span, symbol.name.clone());
        self.refs.entry(sym).or_default().insert(id);
    }

    fn site(&mut self, key: SiteKey, kind: SiteKind, span: Span, text: String) -> SiteId {
        if let Some(&id) = self.site_of.get(&key) {
            return id;
        }
        let id = self.sites.len();
        self.sites.push(Site { key, kind, span, text });
        self.site_of.insert(key, id);
        self.changed = true;
        id
    }

    fn expr_site(&mut self, expr: &Expr, kind: SiteKind) -> SiteId {
        let text = shorten(self.program.sources.snippet(expr.span));
        self.site(SiteKey::Expr(expr.id), kind, expr.span, text)
    }

    fn var_site(&mut self, sym: SymbolId) -> SiteId {
        let symbol = self.info.symbol(sym);
        self.site(SiteKey::Var(sym), SiteKind::Variable, symbol.span, symbol.name.clone())
    }

    fn is_local(&self, sym: SymbolId) -> bool {
        let symbol = self.info.symbol(sym);
        symbol.kind == SymbolKind::Var && symbol.owner == Some(self.unit.id)
    }

    fn mark(&mut self, sites: &Refs, verdict: EscapeVerdict, reason: &str) {
        for &site in sites {
            let weaker = self.escapes.get(&site).is_none_or(|(current, _)| *current < verdict);
            if weaker {
                self.escapes.insert(site, (verdict, reason.to_string()));
                self.changed = true;
            }
        }
    }

    fn add_contents(&mut self, site: SiteId, inner: &Refs) {
        let entry = self.contents.entry(site).or_default();
        for &s in inner {
            if s != site && entry.insert(s) {
                self.changed = true;
            }
        }
    }

    fn bind(&mut self, sym: SymbolId, refs: Refs, values: Refs) {
        let symbol = self.info.symbol(sym);
        if symbol.is_global() {
            self.mark(&refs, EscapeVerdict::Heap, &format!("stored in global '{}'", symbol.name));
            return;
        }
        if !self.is_local(sym) {
            self.mark(&refs, EscapeVerdict::Heap, &format!("stored in '{}' of an enclosing function", symbol.name));
            return;
        }
        let entry = self.refs.entry(sym).or_default();
        for s in refs {
            if entry.insert(s) {
                self.changed = true;
            }
        }
        let entry = self.values.entry(sym).or_default();
        for s in values {
            if entry.insert(s) {
                self.changed = true;
            }
        }
    }

    /// Sites reachable through one indirection
    fn load(&self, refs: Refs) -> Refs {
        let mut out = refs.clone();
        for site in &refs {
            if let Some(inner) = self.contents.get(site) {
                out.extend(inner.iter().copied());
            }
        }
        out
    }

    fn ret(&mut self, refs: Refs) {
        let (params, others): (Refs, Refs) = refs.into_iter().partition(|&s| self.sites[s].is_param());
        for site in params {
            if self.returned.insert(site) {
                self.changed = true;
            }
        }
        self.mark(&others, EscapeVerdict::Heap, "address returned");
    }

    fn block(&mut self, block: &Block) {
        self.stmts(&block.stmts);
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        let info = self.info;
        match &stmt.kind {
            StmtKind::Empty | StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Goto(_) | StmtKind::Fallthrough | StmtKind::Type(_) | StmtKind::Const(_) => {}
            StmtKind::Expr(expr) | StmtKind::Defer(expr) => {
                self.eval(expr);
            }
            StmtKind::Send { chan, value } => {
                self.eval(chan);
                let refs = self.eval(value);
                self.mark(&refs, EscapeVerdict::Heap, "sent on a channel");
            }
            StmtKind::IncDec { target, .. } => {
                self.eval(target);
            }
            StmtKind::Assign { lhs, op, rhs } => {
                if let AssignOp::Compound(_) = op {
                    for expr in rhs.iter().chain(lhs) {
                        self.eval(expr);
                    }
                } else if lhs.len() == rhs.len() {
                    for (target, value) in lhs.iter().zip(rhs) {
                        let refs = self.eval(value);
                        let values = literal_sites(self, value);
                        self.assign(target, refs, values);
                    }
                } else {
                    let mut refs = BTreeSet::new();
                    for value in rhs {
                        refs.extend(self.eval(value));
                    }
                    for target in lhs {
                        self.assign(target, refs.clone(), BTreeSet::new());
                    }
                }
            }
            StmtKind::Var(specs) => {
                for spec in specs {
                    if spec.names.len() == spec.values.len() {
                        for (name, value) in spec.names.iter().zip(&spec.values) {
                            let refs = self.eval(value);
                            let values = literal_sites(self, value);
                            if let Some(sym) = info.symbol_at(name.id) {
                                self.bind(sym, refs, values);
                            }
                        }
                    } else {
                        let mut refs = BTreeSet::new();
                        for value in &spec.values {
                            refs.extend(self.eval(value));
                        }
                        for name in &spec.names {
                            if let Some(sym) = info.symbol_at(name.id) {
                                self.bind(sym, refs.clone(), BTreeSet::new());
                            }
                        }
                    }
                }
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If { init, cond, then, els } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.eval(cond);
                self.block(then);
                if let Some(els) = els {
                    self.stmt(els);
                }
            }
            StmtKind::For { init, cond, post, body } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.eval(cond);
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
            }
            StmtKind::Range { key, value, expr, body, .. } => {
                let refs = self.eval(expr);
                let elems = self.load(refs);
                if let Some(key) = key {
                    self.assign(key, BTreeSet::new(), BTreeSet::new());
                }
                if let Some(value) = value {
                    self.assign(value, elems, BTreeSet::new());
                }
                self.block(body);
            }
            StmtKind::Switch { init, tag, cases } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.eval(tag);
                }
                for case in cases {
                    for expr in &case.exprs {
                        self.eval(expr);
                    }
                    self.stmts(&case.body);
                }
            }
            StmtKind::TypeSwitch { init, subject, cases, .. } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                let refs = self.eval(subject);
                for case in cases {
                    if let Some(&sym) = info.implicits.get(&case.id) {
                        self.bind(sym, refs.clone(), BTreeSet::new());
                    }
                    self.stmts(&case.body);
                }
            }
            StmtKind::Select { cases } => {
                for case in cases {
                    if let Some(comm) = &case.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&case.body);
                }
            }
            StmtKind::Go(expr) => self.spawn(expr),
            StmtKind::Return(exprs) => {
                if exprs.is_empty() {
                    let results: Vec<SymbolId> = info.func(self.unit.id).results.iter().flatten().copied().collect();
                    for sym in results {
                        let refs = self.refs.get(&sym).cloned().unwrap_or_default();
                        self.ret(refs);
                    }
                }
                for expr in exprs {
                    let refs = self.eval(expr);
                    self.ret(refs);
                }
            }
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
        }
    }

    fn spawn(&mut self, expr: &Expr) {
        match &expr.unparen().kind {
            ExprKind::Call { func, args, .. } => {
                let target = self.eval(func);
                self.mark(&target, EscapeVerdict::Heap, "runs as a goroutine");
                for arg in args {
                    let refs = self.eval(arg);
                    self.mark(&refs, EscapeVerdict::Heap, "passed to a goroutine");
                }
            }
            _ => {
                self.eval(expr);
            }
        }
    }

    fn assign(&mut self, target: &Expr, refs: Refs, values: Refs) {
        let info = self.info;
        let target = target.unparen();
        if target.is_blank() {
            return;
        }
        if let ExprKind::Ident(_) = &target.kind {
            if let Some(sym) = info.symbol_at(target.id) {
                self.bind(sym, refs, values);
            }
            return;
        }
        self.eval(target);
        let Some(root) = info.root_symbol(target) else {
            self.mark(&refs, EscapeVerdict::Unknown, "stored through a location that is not tracked");
            return;
        };
        if !self.is_local(root) || !self.indirect(target) {
            self.bind(root, refs, BTreeSet::new());
            return;
        }
        let pointees = self.refs.get(&root).cloned().unwrap_or_default();
        if pointees.is_empty() {
            let reason = format!("stored through '{}', whose target is not known", info.symbol(root).name);
            self.mark(&refs, EscapeVerdict::Unknown, &reason);
        }
        for site in pointees {
            self.add_contents(site, &refs);
        }
    }

    /// The access goes through a pointer, slice or map
    fn indirect(&self, expr: &Expr) -> bool {
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Unary { op: UnaryOp::Deref, .. } => true,
            ExprKind::Selector { base, .. } => self.is_pointer(base) || self.indirect(base),
            ExprKind::Index { base, .. } => !matches!(self.underlying(base), Type::Array(..)) || self.indirect(base),
            _ => false,
        }
    }

    fn underlying(&self, expr: &Expr) -> Type {
        self.info.table.underlying(self.info.type_of(expr.id))
    }

    fn is_pointer(&self, expr: &Expr) -> bool {
        matches!(self.underlying(expr), Type::Pointer(_))
    }

    fn eval(&mut self, expr: &Expr) -> Refs {
        let refs = self.eval_inner(expr);
        if matches!(self.underlying(expr), Type::Basic(_)) { BTreeSet::new() } else { refs }
    }

    fn eval_inner(&mut self, expr: &Expr) -> Refs {
        let info = self.info;
        match &expr.kind {
            ExprKind::Ident(_) => match info.symbol_at(expr.id) {
                Some(sym) => self.refs.get(&sym).cloned().unwrap_or_default(),
                None => BTreeSet::new(),
            },
            ExprKind::BasicLit { .. } | ExprKind::Type(_) => BTreeSet::new(),
            ExprKind::CompositeLit { .. } => self.composite(expr, false),
            ExprKind::FuncLit { .. } => self.closure(expr),
            ExprKind::Paren(inner) => self.eval(inner),
            ExprKind::Selector { base, .. } => match info.selections.get(&expr.id) {
                Some(Selection::Package { .. }) => BTreeSet::new(),
                Some(Selection::Method { .. }) => self.eval(base),
                _ => {
                    let refs = self.eval(base);
                    self.load(refs)
                }
            },
            ExprKind::Index { base, indices } => {
                let refs = self.eval(base);
                for index in indices {
                    self.eval(index);
                }
                self.load(refs)
            }
            ExprKind::Slice { base, low, high, max } => {
                for part in [low, high, max].into_iter().flatten() {
                    self.eval(part);
                }
                if matches!(self.underlying(base), Type::Array(..)) { self.addr(base) } else { self.eval(base) }
            }
            ExprKind::TypeAssert { base, .. } => self.eval(base),
            ExprKind::Call { .. } => self.call(expr),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::AddrOf => self.addr(operand),
                UnaryOp::Deref => {
                    let refs = self.eval(operand);
                    self.load(refs)
                }
                _ => {
                    self.eval(operand);
                    BTreeSet::new()
                }
            },
            ExprKind::Binary { lhs, rhs, .. } => {
                self.eval(lhs);
                self.eval(rhs);
                BTreeSet::new()
            }
        }
    }

    /// Sites whose storage `&expr` points into
    fn addr(&mut self, expr: &Expr) -> Refs {
        let info = self.info;
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Ident(_) => match info.symbol_at(expr.id) {
                Some(sym) if self.is_local(sym) => {
                    let mut refs = self.values.get(&sym).cloned().unwrap_or_default();
                    refs.insert(self.var_site(sym));
                    refs
                }
                _ => BTreeSet::new(),
            },
            ExprKind::CompositeLit { .. } => self.composite(expr, true),
            ExprKind::Selector { base, .. } => {
                if self.is_pointer(base) {
                    self.eval(base)
                } else {
                    self.addr(base)
                }
            }
            ExprKind::Index { base, indices } => {
                for index in indices {
                    self.eval(index);
                }
                if matches!(self.underlying(base), Type::Array(..)) { self.addr(base) } else { self.eval(base) }
            }
            ExprKind::Unary { op: UnaryOp::Deref, operand } => self.eval(operand),
            _ => self.eval(expr),
        }
    }

    fn composite(&mut self, expr: &Expr, addressed: bool) -> Refs {
        let ExprKind::CompositeLit { ty, elems } = &expr.kind else {
            return BTreeSet::new();
        };
        let mut inner = BTreeSet::new();
        for elem in elems {
            if let Some(key) = &elem.key {
                self.eval(key);
            }
            inner.extend(self.eval(&elem.value));
        }
        if ty.is_none() && !addressed {
            return inner;
        }
        let collection = matches!(self.underlying(expr), Type::Slice(_) | Type::Map(..));
        let kind = match (addressed, collection) {
            (true, _) => SiteKind::AddressOfLiteral,
            (false, true) => SiteKind::CollectionLiteral,
            (false, false) => SiteKind::Literal,
        };
        let site = self.expr_site(expr, kind);
        self.add_contents(site, &inner);
        if kind == SiteKind::Literal { inner } else { BTreeSet::from([site]) }
    }

    fn closure(&mut self, expr: &Expr) -> Refs {
        let info = self.info;
        let Some(func) = info.func_at(expr.id) else {
            return BTreeSet::new();
        };
        let captures: Vec<SymbolId> = info.func(func).captures.iter().copied().filter(|&sym| self.is_local(sym)).collect();
        if captures.is_empty() {
            return BTreeSet::new();
        }
        let site = self.expr_site(expr, SiteKind::Closure);
        let mut inner = BTreeSet::new();
        for sym in captures {
            inner.insert(self.var_site(sym));
            inner.extend(self.values.get(&sym).into_iter().flatten().copied());
            inner.extend(self.refs.get(&sym).into_iter().flatten().copied());
        }
        self.add_contents(site, &inner);
        BTreeSet::from([site])
    }

    fn call(&mut self, expr: &Expr) -> Refs {
        let info = self.info;
        let ExprKind::Call { func, args, .. } = &expr.kind else {
            return BTreeSet::new();
        };
        match info.callee(expr.id) {
            Some(Callee::Builtin(builtin)) => self.builtin(expr, *builtin, args),
            Some(Callee::Conversion(_)) => {
                let mut refs = BTreeSet::new();
                for arg in args {
                    refs.extend(self.eval(arg));
                }
                refs
            }
            Some(Callee::Func(id)) => self.call_func(func, *id, args),
            Some(Callee::Stdlib { pkg, name }) => {
                let label = format!("{}.{}", pkg.rsplit('/').next().unwrap_or(pkg), name);
                self.call_library(func, args, &label);
                BTreeSet::new()
            }
            Some(Callee::StdMethod { type_name, method }) => {
                self.eval(func);
                self.call_library(func, args, &format!("{}.{}", type_name, method));
                BTreeSet::new()
            }
            Some(Callee::Interface { method }) => {
                let recv = self.eval(func);
                let reason = format!("passed to interface method '{}'", method);
                self.mark(&recv, EscapeVerdict::Unknown, &reason);
                self.unknown_args(args, &reason);
                BTreeSet::new()
            }
            Some(Callee::External) => {
                self.eval(func);
                let reason = format!("passed to '{}', whose source is unavailable", shorten(self.program.sources.snippet(func.span)));
                self.unknown_args(args, &reason);
                BTreeSet::new()
            }
            Some(Callee::Dynamic) | None => {
                self.eval(func);
                self.unknown_args(args, "passed to a function value");
                BTreeSet::new()
            }
        }
    }

    fn unknown_args(&mut self, args: &[Expr], reason: &str) {
        for arg in args {
            let mut refs = self.eval(arg);
            refs.extend(self.stored_values(arg));
            self.mark(&refs, EscapeVerdict::Unknown, reason);
        }
    }

    /// Storage copied into an interface when `expr` is converted
    fn stored_values(&self, expr: &Expr) -> Refs {
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Ident(_) => self.info.symbol_at(expr.id).and_then(|sym| self.values.get(&sym)).cloned().unwrap_or_default(),
            _ => literal_sites(self, expr),
        }
    }

    fn call_func(&mut self, func: &Expr, id: FuncId, args: &[Expr]) -> Refs {
        let info = self.info;
        let callee = info.func(id);
        let summary = self.summaries.get(id).cloned().unwrap_or_default();
        let mut result = BTreeSet::new();

        let func = func.unparen();
        match &func.kind {
            ExprKind::Selector { base, field } if callee.is_method() && matches!(info.selections.get(&func.id), Some(Selection::Method { .. })) => {
                let recv = if callee.pointer_recv && !self.is_pointer(base) { self.addr(base) } else { self.eval(base) };
                self.pass(recv, &summary.recv, &format!("the receiver of {}", field.name), &mut result);
            }
            _ => {
                self.eval(func);
            }
        }

        for (i, arg) in args.iter().enumerate() {
            let slot = if callee.sig.variadic { i.min(callee.params.len().saturating_sub(1)) } else { i };
            let param = callee.params.get(slot).copied().flatten().map(|sym| info.symbol(sym).name.clone()).unwrap_or_else(|| "_".to_string());
            let refs = self.eval(arg);
            if param_at(&callee.sig, i).is_some_and(|ty| info.table.is_interface(ty)) {
                let mut boxed = refs.clone();
                boxed.extend(self.stored_values(arg));
                self.mark(&boxed, EscapeVerdict::Heap, &format!("converted to interface for parameter '{}' of {}", param, callee.name));
            }
            let flow = summary.params.get(slot).cloned().unwrap_or_default();
            self.pass(refs, &flow, &format!("parameter '{}' of {}", param, callee.name), &mut result);
        }
        result
    }

    fn pass(&mut self, refs: Refs, flow: &ParamFlow, target: &str, result: &mut Refs) {
        if flow.escapes {
            self.mark(&refs, EscapeVerdict::Heap, &format!("passed to {}, which escapes", target));
        } else if flow.unknown {
            self.mark(&refs, EscapeVerdict::Unknown, &format!("passed to {}, whose use is unknown", target));
        }
        if flow.returned {
            result.extend(refs);
        }
    }

    fn call_library(&mut self, func: &Expr, args: &[Expr], label: &str) {
        let info = self.info;
        let sig = info.table.signature_of(info.type_of(func.id));
        for (i, arg) in args.iter().enumerate() {
            let refs = self.eval(arg);
            let param = sig.as_ref().and_then(|sig| param_at(sig, i)).map(|ty| info.table.underlying(ty));
            match param {
                Some(Type::Interface(_)) => {
                    let mut boxed = refs;
                    boxed.extend(self.stored_values(arg));
                    self.mark(&boxed, EscapeVerdict::Heap, &format!("converted to interface for {}", label));
                }
                Some(Type::Func(_)) => self.mark(&refs, EscapeVerdict::Heap, &format!("retained by {}", label)),
                _ => {}
            }
        }
    }

    fn builtin(&mut self, expr: &Expr, builtin: Builtin, args: &[Expr]) -> Refs {
        match builtin {
            Builtin::New => BTreeSet::from([self.expr_site(expr, SiteKind::New)]),
            Builtin::Make => {
                for arg in args.iter().skip(1) {
                    self.eval(arg);
                }
                BTreeSet::from([self.expr_site(expr, SiteKind::Make)])
            }
            Builtin::Append => {
                let mut refs = BTreeSet::new();
                let mut elems = BTreeSet::new();
                for (i, arg) in args.iter().enumerate() {
                    let arg_refs = self.eval(arg);
                    if i == 0 {
                        refs.extend(arg_refs);
                    } else {
                        elems.extend(arg_refs);
                    }
                }
                for site in refs.clone() {
                    self.add_contents(site, &elems);
                }
                refs.extend(elems);
                refs
            }
            Builtin::Panic => {
                let mut refs = BTreeSet::new();
                for arg in args {
                    refs.extend(self.eval(arg));
                    refs.extend(self.stored_values(arg));
                }
                self.mark(&refs, EscapeVerdict::Heap, "passed to panic");
                BTreeSet::new()
            }
            _ => {
                for arg in args {
                    self.eval(arg);
                }
                BTreeSet::new()
            }
        }
    }

    fn propagate(&mut self) {
        for (&site, inner) in &self.contents.clone() {
            if let SiteKey::Param(sym) = self.sites[site].key {
                let reason = format!("stored through parameter '{}'", self.info.symbol(sym).name);
                self.mark(inner, EscapeVerdict::Heap, &reason);
            }
        }
        let mut worklist: Vec<SiteId> = self.escapes.keys().copied().collect();
        while let Some(site) = worklist.pop() {
            let Some((verdict, _)) = self.escapes.get(&site).cloned() else {
                continue;
            };
            let Some(inner) = self.contents.get(&site).cloned() else {
                continue;
            };
            let from = &self.sites[site];
            let reason = match (from.kind, verdict) {
                (SiteKind::Closure, EscapeVerdict::Heap) => "captured by an escaping closure".to_string(),
                (_, EscapeVerdict::Heap) => format!("referenced from escaping '{}'", from.text),
                _ => format!("referenced from '{}', whose placement is unknown", from.text),
            };
            for s in inner {
                let weaker = self.escapes.get(&s).is_none_or(|(current, _)| *current < verdict);
                if weaker {
                    self.escapes.insert(s, (verdict, reason.clone()));
                    worklist.push(s);
                }
            }
        }
    }

    fn summary(&self) -> FuncSummary {
        let func = self.info.func(self.unit.id);
        let flow = |sym: Option<SymbolId>| -> ParamFlow {
            let Some(&site) = sym.and_then(|sym| self.site_of.get(&SiteKey::Param(sym))) else {
                return ParamFlow::default();
            };
            let verdict = self.escapes.get(&site).map(|(v, _)| *v);
            ParamFlow {
                escapes: verdict == Some(EscapeVerdict::Heap),
                unknown: verdict == Some(EscapeVerdict::Unknown),
                returned: self.returned.contains(&site),
            }
        };
        FuncSummary {
            recv: flow(func.recv),
            params: func.params.iter().map(|p| flow(*p)).collect(),
        }
    }

    fn holders(&self, site: SiteId) -> Vec<String> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        if let SiteKey::Var(sym) = self.sites[site].key {
            names.insert(self.info.symbol(sym).name.as_str());
        }
        for (sym, refs) in self.refs.iter().chain(self.values.iter()) {
            if refs.contains(&site) {
                names.insert(self.info.symbol(*sym).name.as_str());
            }
        }
        names.into_iter().map(|n| format!("'{}'", n)).collect()
    }

    fn records(&self) -> Vec<EscapeRecord> {
        let mut records: Vec<EscapeRecord> = self
            .sites
            .iter()
            .enumerate()
            .filter(|(_, site)| !site.is_param())
            .map(|(id, site)| {
                let location = self.program.location(site.span);
                let allocated = format!("allocated at {}:{}", location.line, location.column);
                match self.escapes.get(&id) {
                    Some((verdict, reason)) => EscapeRecord {
                        span: site.span,
                        kind: site.kind,
                        text: site.text.clone(),
                        verdict: *verdict,
                        reason: reason.clone(),
                        chain: vec![allocated, reason.clone()],
                    },
                    None => {
                        let holders = self.holders(id);
                        let held = if holders.is_empty() { "not bound to any variable".to_string() } else { format!("referenced only by locals {}", holders.join(", ")) };
                        EscapeRecord {
                            span: site.span,
                            kind: site.kind,
                            text: site.text.clone(),
                            verdict: EscapeVerdict::Stack,
                            reason: "does not outlive the frame".to_string(),
                            chain: vec![allocated, held, "no reference reaches a return, global, channel, goroutine or escaping parameter".to_string()],
                        }
                    }
                }
            })
            .collect();
        records.sort_by_key(|r| (r.span.start, r.span.end));
        records
    }
}

fn literal_sites(this: &FunctionEscapes<'_, '_>, expr: &Expr) -> Refs {
    let expr = expr.unparen();
    match &expr.kind {
        ExprKind::CompositeLit { ty: Some(_), .. } => this.site_of.get(&SiteKey::Expr(expr.id)).filter(|&&s| this.sites[s].kind == SiteKind::Literal).map(|&s| BTreeSet::from([s])).unwrap_or_default(),
        _ => BTreeSet::new(),
    }
}

fn is_reference(info: &TypeInfo, ty: &Type) -> bool {
    matches!(info.table.underlying(ty), Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) | Type::Func(_) | Type::Interface(_) | Type::Unknown | Type::TypeParam(_))
}

/// Declared type of the parameter receiving argument `index`
fn param_at(sig: &Signature, index: usize) -> Option<&Type> {
    if sig.variadic && index + 1 >= sig.params.len() {
        return sig.params.last().map(|last| match last {
            Type::Slice(elem) => elem.as_ref(),
            other => other,
        });
    }
    sig.params.get(index)
}

fn shorten(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > 40 {
        format!("{}...", line.chars().take(37).collect::<String>())
    } else if text.contains('\n') {
        format!("{}...", line)
    } else {
        line.to_string()
    }
}

/// Escape verdicts of one function
#[derive(Debug, Clone, Default, Serialize)]
pub struct EscapeReport {
    pub records: Vec<EscapeRecord>,
    #[serde(skip)]
    pub findings: Vec<Finding>,
}

/// Per-function escape analysis backed by program-wide summaries
#[derive(Debug, Clone, Copy)]
pub struct EscapeAnalyzer<'s> {
    summaries: &'s EscapeSummaries,
}

impl<'s> EscapeAnalyzer<'s> {
    pub fn new(summaries: &'s EscapeSummaries) -> Self {
        Self { summaries }
    }
}

impl Analyzer for EscapeAnalyzer<'_> {
    type Result = EscapeReport;

    fn analyze(&self, ctx: &FunctionContext<'_>) -> FvResult<EscapeReport> {
        let run = FunctionEscapes::run(ctx.program, ctx.unit, self.summaries);
        let records = run.records();
        let mut findings = Vec::new();
        for record in &records {
            match record.verdict {
                EscapeVerdict::Stack => {}
                EscapeVerdict::Heap => findings.push(
                    Finding::new(Category::Escape, Severity::Info, ctx.location(record.span), format!("'{}' escapes to heap: {}", record.text, record.reason))
                        .with_suggestion("keep references to short-lived values inside the function to allow stack allocation")
                        .with_theory(THEORY),
                ),
                EscapeVerdict::Unknown => findings.push(
                    Finding::new(Category::AliasUnknown, Severity::Info, ctx.location(record.span), format!("escape of '{}' is unknown: {}", record.text, record.reason)).with_theory(THEORY),
                ),
            }
        }
        debug!(function = %ctx.name(), sites = records.len(), "escape analysis complete");
        Ok(EscapeReport { records, findings })
    }

    fn name(&self) -> &'static str {
        "escape"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;

    fn records(source: &str, func: &str) -> Vec<EscapeRecord> {
        let (program, problems) = Program::from_source("t.go", source);
        assert!(problems.is_empty(), "{:?}", problems);
        let summaries = EscapeSummaries::compute(&program);
        let unit = program.unit(program.func_named(func).unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        EscapeAnalyzer::new(&summaries).analyze(&ctx).unwrap().records
    }

    const TYPES: &str = "package main\n\ntype T struct{ n int }\n\nvar global *T\n\n";

    #[test]
    fn test_returned_address_escapes() {
        let source = format!("{}func build() *T {{\n\treturn &T{{n: 1}}\n}}\n", TYPES);
        let found = records(&source, "build");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, EscapeVerdict::Heap);
        assert_eq!(found[0].reason, "address returned");
        assert_eq!(found[0].kind, SiteKind::AddressOfLiteral);
    }

    #[test]
    fn test_local_value_stays_on_stack() {
        let source = format!("{}func local() int {{\n\tt := T{{n: 1}}\n\tt.n++\n\treturn t.n\n}}\n", TYPES);
        let found = records(&source, "local");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, EscapeVerdict::Stack);
        assert_eq!(found[0].kind, SiteKind::Literal);
        assert!(found[0].chain.iter().any(|step| step.contains("'t'")));
    }

    #[test]
    fn test_parameter_summaries() {
        let source = format!(
            "{}func keep(p *T) {{\n\tglobal = p\n}}\n\nfunc read(p *T) int {{\n\treturn p.n\n}}\n\nfunc caller() int {{\n\ta := &T{{}}\n\tkeep(a)\n\tb := &T{{}}\n\treturn read(b)\n}}\n",
            TYPES
        );
        let found = records(&source, "caller");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].verdict, EscapeVerdict::Heap);
        assert!(found[0].reason.contains("parameter 'p' of keep"), "{}", found[0].reason);
        assert_eq!(found[1].verdict, EscapeVerdict::Stack);
    }

    #[test]
    fn test_captured_variable_of_returned_closure() {
        let source = "package main\n\nfunc counter() func() int {\n\tn := 0\n\treturn func() int {\n\t\tn++\n\t\treturn n\n\t}\n}\n";
        let found = records(source, "counter");
        let var = found.iter().find(|r| r.kind == SiteKind::Variable).unwrap();
        assert_eq!(var.verdict, EscapeVerdict::Heap);
        assert_eq!(var.reason, "captured by an escaping closure");
        let closure = found.iter().find(|r| r.kind == SiteKind::Closure).unwrap();
        assert_eq!(closure.reason, "address returned");
    }

    #[test]
    fn test_interface_argument_escapes() {
        let source = "package main\n\nimport \"fmt\"\n\ntype T struct{ n int }\n\nfunc show() {\n\tt := &T{n: 2}\n\tfmt.Println(t)\n}\n";
        let found = records(source, "show");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, EscapeVerdict::Heap);
        assert!(found[0].reason.contains("interface"));
    }

    #[test]
    fn test_missing_source_is_unknown() {
        let source = "package main\n\nimport \"example.com/store\"\n\ntype T struct{ n int }\n\nfunc save() {\n\tt := &T{}\n\tstore.Put(t)\n}\n";
        let found = records(source, "save");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].verdict, EscapeVerdict::Unknown);
    }

    #[test]
    fn test_channel_send_escapes() {
        let source = format!("{}func produce(ch chan *T) {{\n\tch <- &T{{}}\n}}\n", TYPES);
        let found = records(&source, "produce");
        assert_eq!(found[0].verdict, EscapeVerdict::Heap);
        assert_eq!(found[0].reason, "sent on a channel");
    }
}
