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

//! Goroutine and event extraction
//!
//! Starting from a root function, every CFG node is scanned for
//! synchronization operations and memory accesses. Calls to functions with
//! source are followed up to [`MAX_CALL_DEPTH`] frames with parameter
//! bindings, so `worker(&counter)` attributes the callee's writes to
//! `counter`. Each `go` statement and `WaitGroup.Go` call starts a new
//! goroutine that is modeled the same way.

use super::events::{Event, EventId, EventKind, Goroutine, GoroutineId, HeldLock, LockMode, PathStep, Resource, SelectCase};
use crate::cfg::{Cfg, CfgMap, CfgNodeId, NodeLabel, Payload};
use crate::frontend::Program;
use crate::frontend::TypeInfo;
use crate::frontend::ast::{AssignOp, Expr, ExprKind, Ident, Stmt, StmtKind, UnaryOp};
use crate::frontend::builtins::Builtin;
use crate::frontend::info::{Callee, Selection};
use crate::frontend::scope::{SymbolId, SymbolKind};
use crate::frontend::types::{FuncId, Type};
use fv_common::Span;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::trace;

/// Callee frames followed below a goroutine's own function
pub const MAX_CALL_DEPTH: usize = 3;

/// Goroutines modeled per root
pub const MAX_GOROUTINES: usize = 64;

/// Parameters bound to the caller's resources
pub type Env = HashMap<SymbolId, Resource>;

/// Effect of a point of a frame on the held locks
#[derive(Debug, Clone, PartialEq)]
pub enum LockOp {
    /// `event` is `None` for the pseudo-lock around a `Once.Do` body
    Acquire { lock: HeldLock, event: Option<EventId> },
    Release(HeldLock),
    /// Inlined callee frame
    Call(usize),
}

/// One function body executing in a goroutine
#[derive(Debug, Clone)]
pub struct Frame {
    pub func: FuncId,
    pub goroutine: GoroutineId,
    pub parent: Option<usize>,
    /// Position of the call in the parent frame, empty for goroutine roots
    pub call_path: Vec<PathStep>,
    pub ops: BTreeMap<CfgNodeId, Vec<(u32, LockOp)>>,
}

/// Goroutines, events and frames reachable from one root function
#[derive(Debug, Clone)]
pub struct ConcurrencyModel {
    pub root: FuncId,
    pub goroutines: Vec<Goroutine>,
    pub events: Vec<Event>,
    pub frames: Vec<Frame>,
    /// Channels created by `make`, with their constant capacity
    pub channels: HashMap<Resource, Option<i128>>,
}

impl ConcurrencyModel {
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id]
    }

    pub fn goroutine(&self, id: GoroutineId) -> &Goroutine {
        &self.goroutines[id]
    }

    /// Events acting on a resource, in extraction order
    pub fn events_on<'m>(&'m self, resource: &'m Resource) -> impl Iterator<Item = &'m Event> + 'm {
        self.events.iter().filter(move |e| e.resource.as_ref() == Some(resource))
    }
}

struct Pending {
    id: GoroutineId,
    func: FuncId,
    env: Env,
    /// WaitGroup signalled when a `WaitGroup.Go` goroutine returns
    wg_done: Option<Resource>,
}

struct Cursor<'c> {
    frame: usize,
    goroutine: GoroutineId,
    prefix: &'c [PathStep],
    node: CfgNodeId,
    seq: u32,
    repeated: bool,
    select: Option<SelectCase>,
}

impl Cursor<'_> {
    fn next(&mut self) -> u32 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn path(&self, seq: u32) -> Vec<PathStep> {
        let mut path = self.prefix.to_vec();
        path.push(PathStep {
            frame: self.frame,
            node: self.node,
            seq,
        });
        path
    }
}

/// Builds the [`ConcurrencyModel`] of a root function
pub struct ModelBuilder<'a, 'p> {
    info: &'p TypeInfo,
    cfgs: &'a CfgMap<'p>,
    spawn: bool,
    precise_dispatch: bool,
    model: ConcurrencyModel,
    queue: VecDeque<Pending>,
}

impl<'a, 'p> ModelBuilder<'a, 'p> {
    pub fn new(program: &'p Program, cfgs: &'a CfgMap<'p>, root: FuncId) -> Self {
        Self {
            info: &program.info,
            cfgs,
            spawn: true,
            precise_dispatch: false,
            model: ConcurrencyModel {
                root,
                goroutines: Vec::new(),
                events: Vec::new(),
                frames: Vec::new(),
                channels: HashMap::new(),
            },
            queue: VecDeque::new(),
        }
    }

    /// Model only the root goroutine, ignoring `go` statements
    pub fn without_spawns(mut self) -> Self {
        self.spawn = false;
        self
    }

    pub fn with_precise_dispatch(mut self, precise: bool) -> Self {
        self.precise_dispatch = precise;
        self
    }

    pub fn build(mut self) -> ConcurrencyModel {
        let root = self.model.root;
        self.model.goroutines.push(Goroutine {
            id: 0,
            func: root,
            parent: None,
            spawn_span: None,
            spawn_event: None,
            repeated: false,
            funcs: Default::default(),
            events: Vec::new(),
        });
        self.queue.push_back(Pending {
            id: 0,
            func: root,
            env: Env::new(),
            wg_done: None,
        });
        while let Some(pending) = self.queue.pop_front() {
            self.run_goroutine(pending);
        }
        trace!(root, goroutines = self.model.goroutines.len(), events = self.model.events.len(), "concurrency model built");
        self.model
    }

    fn run_goroutine(&mut self, pending: Pending) {
        let cfgs = self.cfgs;
        let Some(cfg) = cfgs.get(&pending.func) else {
            return;
        };
        let repeated = self.model.goroutines[pending.id].repeated;
        let mut stack = Vec::new();
        let Some(frame) = self.run_frame(pending.func, pending.id, pending.env, Vec::new(), None, repeated, &mut stack) else {
            return;
        };
        let span = self.model.goroutines[pending.id].spawn_span.unwrap_or(self.info.func(pending.func).span);
        let mut cur = Cursor {
            frame,
            goroutine: pending.id,
            prefix: &[],
            node: cfg.exit,
            seq: 0,
            repeated,
            select: None,
        };
        if let Some(wg) = pending.wg_done {
            self.push(EventKind::WaitGroupDone, span, Some(wg), &mut cur);
        }
        self.push(EventKind::GoroutineEnd, span, None, &mut cur);
    }

    #[allow(clippy::too_many_arguments)]
    fn run_frame(&mut self, func: FuncId, goroutine: GoroutineId, mut env: Env, prefix: Vec<PathStep>, parent: Option<usize>, repeated: bool, stack: &mut Vec<FuncId>) -> Option<usize> {
        let cfgs = self.cfgs;
        let cfg = cfgs.get(&func)?;
        let frame = self.model.frames.len();
        self.model.frames.push(Frame {
            func,
            goroutine,
            parent,
            call_path: prefix.clone(),
            ops: BTreeMap::new(),
        });
        self.model.goroutines[goroutine].funcs.insert(func);
        stack.push(func);
        for node in &cfg.nodes {
            let mut cur = Cursor {
                frame,
                goroutine,
                prefix: &prefix,
                node: node.id,
                seq: 0,
                repeated: repeated || node.in_loop(),
                select: None,
            };
            self.node_events(cfg, node.payload, &mut cur, &mut env, stack);
        }
        stack.pop();
        Some(frame)
    }

    fn node_events(&mut self, cfg: &'a Cfg<'p>, payload: Payload<'p>, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        match payload {
            Payload::None | Payload::TypeCase(_) => {}
            Payload::Stmt(stmt) => self.stmt(stmt, cur, env, stack),
            Payload::Cond(expr) | Payload::Tag(expr) => self.expr(expr, cur, env, stack),
            Payload::Case(clause) => {
                for expr in &clause.exprs {
                    self.expr(expr, cur, env, stack);
                }
            }
            Payload::Range(stmt) => {
                if let StmtKind::Range { key, value, define, expr, .. } = &stmt.kind {
                    self.expr(expr, cur, env, stack);
                    if self.info.table.chan_of(self.info.type_of(expr.id)).is_some() {
                        let resource = self.resolve(expr, env);
                        let id = self.push(EventKind::ChannelReceive, stmt.span, resource, cur);
                        self.model.events[id].range_loop = true;
                        self.model.events[id].repeated = true;
                    }
                    if !*define {
                        for target in key.iter().chain(value.iter()) {
                            self.write(target, cur, env, stack);
                        }
                    }
                }
            }
            Payload::Comm(clause) => {
                let Some(comm) = &clause.comm else {
                    return;
                };
                cur.select = select_case(cfg, cur.frame, cur.node);
                match &comm.kind {
                    StmtKind::Send { chan, value } => {
                        self.expr(value, cur, env, stack);
                        let resource = self.resolve(chan, env);
                        self.push(EventKind::ChannelSend, comm.span, resource, cur);
                    }
                    StmtKind::Expr(expr) => self.expr(expr, cur, env, stack),
                    StmtKind::Assign { lhs, rhs, .. } => {
                        for expr in rhs {
                            self.expr(expr, cur, env, stack);
                        }
                        cur.select = None;
                        for target in lhs {
                            self.write(target, cur, env, stack);
                        }
                    }
                    _ => {}
                }
                cur.select = None;
            }
            Payload::Deferred(call) => self.call(call, false, cur, env, stack),
        }
    }

    fn stmt(&mut self, stmt: &'p Stmt, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr, cur, env, stack),
            StmtKind::Send { chan, value } => {
                self.expr(value, cur, env, stack);
                let resource = self.resolve(chan, env);
                self.push(EventKind::ChannelSend, stmt.span, resource, cur);
            }
            StmtKind::IncDec { target, .. } => {
                self.read(target, cur, env, stack);
                self.write(target, cur, env, stack);
            }
            StmtKind::Assign { lhs, op, rhs } => {
                for expr in rhs {
                    self.expr(expr, cur, env, stack);
                }
                if lhs.len() == rhs.len() {
                    for (target, value) in lhs.iter().zip(rhs) {
                        self.note_value(target, value, env);
                    }
                }
                for target in lhs {
                    if matches!(op, AssignOp::Compound(_)) {
                        self.read(target, cur, env, stack);
                    }
                    self.write(target, cur, env, stack);
                }
            }
            StmtKind::Var(specs) => {
                for spec in specs {
                    for value in &spec.values {
                        self.expr(value, cur, env, stack);
                    }
                    if spec.values.is_empty() {
                        continue;
                    }
                    for (name, value) in spec.names.iter().zip(&spec.values) {
                        self.note_declared(name, value, env);
                        if let Some(sym) = self.info.symbol_at(name.id) {
                            if self.tracked_symbol(sym) && !self.is_sync_type(&self.info.symbol(sym).ty) {
                                self.push(EventKind::MemoryWrite, name.span, Some(Resource::Var(sym)), cur);
                            }
                        }
                    }
                }
            }
            StmtKind::Go(call) => self.spawn(call, stmt.span, cur, env, stack),
            StmtKind::Defer(call) => {
                if let Some((_, args)) = call.as_call() {
                    for arg in args {
                        self.expr(arg, cur, env, stack);
                    }
                }
            }
            StmtKind::Return(exprs) => {
                for expr in exprs {
                    self.expr(expr, cur, env, stack);
                }
            }
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt, cur, env, stack),
            _ => {}
        }
    }

    fn expr(&mut self, expr: &'p Expr, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        match &expr.kind {
            ExprKind::Ident(_) => self.read(expr, cur, env, stack),
            ExprKind::Selector { base, .. } => match self.info.selections.get(&expr.id) {
                Some(Selection::Field) | Some(Selection::Package { .. }) => self.read(expr, cur, env, stack),
                _ => self.expr(base, cur, env, stack),
            },
            ExprKind::Index { .. } => self.read(expr, cur, env, stack),
            ExprKind::Slice { base, low, high, max } => {
                self.expr(base, cur, env, stack);
                for bound in [low, high, max].into_iter().flatten() {
                    self.expr(bound, cur, env, stack);
                }
            }
            ExprKind::Unary { op: UnaryOp::Recv, operand } => {
                self.expr(operand, cur, env, stack);
                let resource = self.resolve(operand, env);
                self.push(EventKind::ChannelReceive, expr.span, resource, cur);
            }
            ExprKind::Unary { op: UnaryOp::AddrOf, operand } => self.path_operands(operand, cur, env, stack),
            ExprKind::Unary { op: UnaryOp::Deref, .. } => self.read(expr, cur, env, stack),
            ExprKind::Unary { operand, .. } => self.expr(operand, cur, env, stack),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs, cur, env, stack);
                self.expr(rhs, cur, env, stack);
            }
            ExprKind::Call { .. } => self.call(expr, true, cur, env, stack),
            ExprKind::CompositeLit { elems, .. } => {
                for elem in elems {
                    self.expr(&elem.value, cur, env, stack);
                }
            }
            ExprKind::Paren(inner) => self.expr(inner, cur, env, stack),
            ExprKind::TypeAssert { base, .. } => self.expr(base, cur, env, stack),
            ExprKind::FuncLit { .. } | ExprKind::BasicLit { .. } | ExprKind::Type(_) => {}
        }
    }

    /// Evaluate the index and pointer operands along an access path
    fn path_operands(&mut self, expr: &'p Expr, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        match &expr.unparen().kind {
            ExprKind::Selector { base, .. } => self.path_operands(base, cur, env, stack),
            ExprKind::Index { base, indices } => {
                self.path_operands(base, cur, env, stack);
                for index in indices {
                    self.expr(index, cur, env, stack);
                }
            }
            ExprKind::Unary { op: UnaryOp::Deref, operand } => self.path_operands(operand, cur, env, stack),
            ExprKind::Call { .. } => self.expr(expr, cur, env, stack),
            _ => {}
        }
    }

    fn read(&mut self, expr: &'p Expr, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        self.path_operands(expr, cur, env, stack);
        let ty = self.info.type_of(expr.id);
        if self.is_sync_type(ty) {
            return;
        }
        // Reading a reference value itself is not an access to what it refers to
        if matches!(expr.unparen().kind, ExprKind::Ident(_)) && is_reference(self.info, ty) {
            return;
        }
        if let Some(resource) = self.resolve(expr, env) {
            if self.tracked(&resource) {
                self.push(EventKind::MemoryRead, expr.span, Some(resource), cur);
            }
        }
    }

    fn write(&mut self, target: &'p Expr, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        if target.is_blank() {
            return;
        }
        self.path_operands(target, cur, env, stack);
        if self.is_sync_type(self.info.type_of(target.id)) {
            return;
        }
        let resource = match &target.unparen().kind {
            ExprKind::Ident(_) => self.info.symbol_at(target.unparen().id).map(Resource::Var),
            _ => self.resolve(target, env),
        };
        if let Some(resource) = resource {
            if self.tracked(&resource) {
                self.push(EventKind::MemoryWrite, target.span, Some(resource), cur);
            }
        }
    }

    fn call(&mut self, expr: &'p Expr, eval_args: bool, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        let expr = expr.unparen();
        let ExprKind::Call { func, args, .. } = &expr.kind else {
            return;
        };
        let info = self.info;
        if eval_args {
            match &func.unparen().kind {
                ExprKind::Selector { base, .. } => self.path_operands(base, cur, env, stack),
                ExprKind::Ident(_) | ExprKind::FuncLit { .. } | ExprKind::Index { .. } | ExprKind::Type(_) => {}
                _ => self.expr(func, cur, env, stack),
            }
            for arg in args {
                self.expr(arg, cur, env, stack);
            }
        }
        let receiver = match &func.unparen().kind {
            ExprKind::Selector { base, .. } => Some(base.as_ref()),
            _ => None,
        };
        match info.callee(expr.id) {
            Some(Callee::StdMethod { type_name, method }) => {
                let resource = receiver.and_then(|base| self.resolve(base, env));
                self.std_method(expr, type_name, method, resource, args, cur, env, stack);
            }
            Some(Callee::Builtin(Builtin::Close)) => {
                let resource = args.first().and_then(|arg| self.resolve(arg, env));
                self.push(EventKind::ChannelClose, expr.span, resource, cur);
            }
            Some(Callee::Func(id)) => self.inline(*id, receiver, args, cur, env, stack),
            Some(Callee::Interface { method }) if self.precise_dispatch => {
                if let Some(id) = receiver.and_then(|base| self.dispatch(cur.frame, base, method)) {
                    self.inline(id, receiver, args, cur, env, stack);
                }
            }
            _ => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn std_method(&mut self, expr: &'p Expr, type_name: &str, method: &str, resource: Option<Resource>, args: &'p [Expr], cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        let span = expr.span;
        let kind = match (type_name, method) {
            ("sync.Mutex", "Lock") => EventKind::MutexLock,
            ("sync.Mutex", "Unlock") => EventKind::MutexUnlock,
            ("sync.RWMutex", "Lock") => EventKind::RwMutexWLock,
            ("sync.RWMutex", "Unlock") => EventKind::RwMutexWUnlock,
            ("sync.RWMutex", "RLock") => EventKind::RwMutexRLock,
            ("sync.RWMutex", "RUnlock") => EventKind::RwMutexRUnlock,
            ("sync.WaitGroup", "Add") => EventKind::WaitGroupAdd,
            ("sync.WaitGroup", "Done") => EventKind::WaitGroupDone,
            ("sync.WaitGroup", "Wait") => EventKind::WaitGroupWait,
            ("sync.WaitGroup", "Go") => {
                self.push(EventKind::WaitGroupAdd, span, resource.clone(), cur);
                if let Some(target) = args.first().and_then(|arg| self.func_value(arg)) {
                    let child = env.clone();
                    self.start_goroutine(target, child, span, resource, cur);
                }
                return;
            }
            ("sync.Once", "Do") => {
                let target = args.first().and_then(|arg| self.func_value(arg));
                if let (Some(once), Some(target)) = (resource.clone(), target) {
                    let lock = HeldLock::new(once, LockMode::Exclusive);
                    let seq = cur.next();
                    self.op(cur, seq, LockOp::Acquire { lock: lock.clone(), event: None });
                    self.inline(target, None, &[], cur, env, stack);
                    self.push(EventKind::OnceBody, span, resource.clone(), cur);
                    let seq = cur.next();
                    self.op(cur, seq, LockOp::Release(lock));
                }
                self.push(EventKind::OnceDo, span, resource, cur);
                return;
            }
            _ => return,
        };
        let id = self.push(kind, span, resource.clone(), cur);
        if let Some(resource) = resource {
            let seq = self.model.events[id].path.last().map(|step| step.seq).unwrap_or_default();
            let lock = HeldLock::new(resource, kind.lock_mode());
            if kind.is_acquire() {
                self.op(cur, seq, LockOp::Acquire { lock, event: Some(id) });
            } else if kind.is_release() {
                self.op(cur, seq, LockOp::Release(lock));
            }
        }
    }

    fn spawn(&mut self, call: &'p Expr, span: Span, cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        let call = call.unparen();
        let ExprKind::Call { func, args, .. } = &call.kind else {
            return;
        };
        if let ExprKind::Selector { base, .. } = &func.unparen().kind {
            self.path_operands(base, cur, env, stack);
        }
        for arg in args {
            self.expr(arg, cur, env, stack);
        }
        let Some(Callee::Func(target)) = self.info.callee(call.id) else {
            return;
        };
        let receiver = match &func.unparen().kind {
            ExprKind::Selector { base, .. } => Some(base.as_ref()),
            _ => None,
        };
        let child = self.bind(*target, receiver, args, env);
        self.start_goroutine(*target, child, span, None, cur);
    }

    fn start_goroutine(&mut self, func: FuncId, env: Env, span: Span, wg_done: Option<Resource>, cur: &mut Cursor<'_>) {
        if !self.spawn || self.model.goroutines.len() >= MAX_GOROUTINES || !self.cfgs.contains_key(&func) {
            return;
        }
        let mut ancestor = Some(cur.goroutine);
        while let Some(id) = ancestor {
            if self.model.goroutines[id].func == func && id != 0 {
                return;
            }
            ancestor = self.model.goroutines[id].parent;
        }
        let id = self.model.goroutines.len();
        let event = self.push(EventKind::GoroutineStart, span, None, cur);
        self.model.events[event].spawned = Some(id);
        let repeated = cur.repeated || self.model.goroutines[cur.goroutine].repeated;
        self.model.goroutines.push(Goroutine {
            id,
            func,
            parent: Some(cur.goroutine),
            spawn_span: Some(span),
            spawn_event: Some(event),
            repeated,
            funcs: Default::default(),
            events: Vec::new(),
        });
        self.queue.push_back(Pending { id, func, env, wg_done });
    }

    fn inline(&mut self, func: FuncId, receiver: Option<&'p Expr>, args: &'p [Expr], cur: &mut Cursor<'_>, env: &mut Env, stack: &mut Vec<FuncId>) {
        if stack.len() > MAX_CALL_DEPTH || stack.contains(&func) || !self.cfgs.contains_key(&func) {
            return;
        }
        let child = self.bind(func, receiver, args, env);
        let seq = cur.next();
        let prefix = cur.path(seq);
        if let Some(frame) = self.run_frame(func, cur.goroutine, child, prefix, Some(cur.frame), cur.repeated, stack) {
            self.op(cur, seq, LockOp::Call(frame));
        }
    }

    /// Environment of a callee: reference parameters alias the arguments
    fn bind(&self, func: FuncId, receiver: Option<&Expr>, args: &[Expr], env: &Env) -> Env {
        let info = self.info;
        let callee = info.func(func);
        let mut child = env.clone();
        let fixed = if callee.sig.variadic { callee.params.len().saturating_sub(1) } else { callee.params.len() };
        for (param, arg) in callee.params.iter().take(fixed).zip(args) {
            if let Some(param) = param {
                if is_reference(info, &info.symbol(*param).ty) {
                    if let Some(resource) = self.resolve(arg, env) {
                        child.insert(*param, resource);
                    }
                }
            }
        }
        if let (Some(recv), Some(base)) = (callee.recv, receiver) {
            if callee.pointer_recv {
                if let Some(resource) = self.resolve(base, env) {
                    child.insert(recv, resource);
                }
            }
        }
        child
    }

    /// Record channel capacities and reference aliases created by `lhs = rhs`
    fn note_value(&mut self, target: &Expr, value: &Expr, env: &mut Env) {
        let target_resource = match &target.unparen().kind {
            ExprKind::Ident(_) => self.info.symbol_at(target.unparen().id).map(Resource::Var),
            _ => self.resolve(target, env),
        };
        let Some(target_resource) = target_resource else {
            return;
        };
        if let Some(capacity) = self.make_chan(value) {
            self.model.channels.insert(target_resource, capacity);
            return;
        }
        if let Resource::Var(sym) = target_resource {
            if is_reference(self.info, &self.info.symbol(sym).ty) {
                if let Some(alias) = self.resolve(value, env) {
                    env.insert(sym, alias);
                }
            }
        }
    }

    fn note_declared(&mut self, name: &Ident, value: &Expr, env: &mut Env) {
        let Some(sym) = self.info.symbol_at(name.id) else {
            return;
        };
        if let Some(capacity) = self.make_chan(value) {
            self.model.channels.insert(Resource::Var(sym), capacity);
        } else if is_reference(self.info, &self.info.symbol(sym).ty) {
            if let Some(alias) = self.resolve(value, env) {
                env.insert(sym, alias);
            }
        }
    }

    /// Capacity of a `make(chan T[, n])` expression
    fn make_chan(&self, value: &Expr) -> Option<Option<i128>> {
        let value = value.unparen();
        if !matches!(self.info.callee(value.id), Some(Callee::Builtin(Builtin::Make))) {
            return None;
        }
        self.info.table.chan_of(self.info.type_of(value.id))?;
        let (_, args) = value.as_call()?;
        Some(match args.get(1) {
            None => Some(0),
            Some(size) => self.info.const_int(size.id),
        })
    }

    /// Abstract location denoted by an expression
    pub fn resolve(&self, expr: &Expr, env: &Env) -> Option<Resource> {
        let info = self.info;
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::Ident(_) => {
                let sym = info.symbol_at(expr.id)?;
                if info.symbol(sym).kind != SymbolKind::Var {
                    return None;
                }
                Some(env.get(&sym).cloned().unwrap_or(Resource::Var(sym)))
            }
            ExprKind::Selector { base, field } => match info.selections.get(&expr.id) {
                Some(Selection::Field) => Some(Resource::Field(Box::new(self.resolve(base, env)?), field.name.clone())),
                Some(Selection::Package { .. }) => {
                    let sym = info.symbol_at(expr.id)?;
                    (info.symbol(sym).kind == SymbolKind::Var).then_some(Resource::Var(sym))
                }
                _ => None,
            },
            ExprKind::Index { base, .. } => Some(Resource::Element(Box::new(self.resolve(base, env)?))),
            ExprKind::Slice { base, .. } => self.resolve(base, env),
            ExprKind::Unary { op: UnaryOp::Deref | UnaryOp::AddrOf, operand } => self.resolve(operand, env),
            ExprKind::Call { .. } => match info.callee(expr.id) {
                Some(callee) if callee.is_std_method("context.Context", "Done") => Some(Resource::Cancel),
                _ => None,
            },
            _ => None,
        }
    }

    fn func_value(&self, expr: &Expr) -> Option<FuncId> {
        let expr = expr.unparen();
        match &expr.kind {
            ExprKind::FuncLit { .. } => self.info.func_at(expr.id),
            ExprKind::Ident(_) => self.info.symbol_at(expr.id).and_then(|sym| self.info.symbol(sym).func),
            _ => None,
        }
    }

    /// Single concrete method reaching an interface call through local assignments
    fn dispatch(&self, frame: usize, base: &Expr, method: &str) -> Option<FuncId> {
        let info = self.info;
        let sym = info.ident_symbol(base)?;
        let cfg = self.cfgs.get(&self.model.frames[frame].func)?;
        let mut concrete: Option<Type> = None;
        for node in cfg.nodes.iter().filter(|n| n.defs.contains(&sym)) {
            let value = match node.payload {
                Payload::Stmt(stmt) => assigned_value(info, stmt, sym)?,
                _ => return None,
            };
            let ty = info.type_of(value.id).clone();
            if info.table.is_interface(&ty) {
                return None;
            }
            match &concrete {
                None => concrete = Some(ty),
                Some(existing) if info.table.identical(existing, &ty) => {}
                Some(_) => return None,
            }
        }
        info.table.lookup_method(&concrete?, method)?.func
    }

    fn tracked(&self, resource: &Resource) -> bool {
        resource.root().is_some_and(|sym| self.tracked_symbol(sym))
    }

    fn tracked_symbol(&self, sym: SymbolId) -> bool {
        let symbol = self.info.symbol(sym);
        symbol.kind == SymbolKind::Var && !symbol.is_blank()
    }

    /// Channels, synchronization objects and functions are not data
    fn is_sync_type(&self, ty: &Type) -> bool {
        let info = self.info;
        if info.table.chan_of(ty).is_some() || info.stdlib.sync_primitive(ty).is_some() {
            return true;
        }
        let target = match ty {
            Type::Pointer(inner) => inner.as_ref(),
            other => other,
        };
        if let Type::Named(id, _) = target {
            if matches!(info.table.named(*id).pkg.as_str(), "sync" | "sync/atomic" | "context") {
                return true;
            }
        }
        matches!(info.table.underlying(ty), Type::Func(_))
    }

    fn push(&mut self, kind: EventKind, span: Span, resource: Option<Resource>, cur: &mut Cursor<'_>) -> EventId {
        let id = self.model.events.len();
        let seq = cur.next();
        self.model.events.push(Event {
            id,
            kind,
            goroutine: cur.goroutine,
            span,
            resource,
            repeated: cur.repeated,
            select: cur.select,
            range_loop: false,
            spawned: None,
            path: cur.path(seq),
        });
        self.model.goroutines[cur.goroutine].events.push(id);
        id
    }

    fn op(&mut self, cur: &Cursor<'_>, seq: u32, op: LockOp) {
        self.model.frames[cur.frame].ops.entry(cur.node).or_default().push((seq, op));
    }
}

/// Value assigned to `sym` by a statement
fn assigned_value<'s>(info: &TypeInfo, stmt: &'s Stmt, sym: SymbolId) -> Option<&'s Expr> {
    match &stmt.kind {
        StmtKind::Assign { lhs, rhs, .. } if lhs.len() == rhs.len() => lhs.iter().position(|target| info.ident_symbol(target) == Some(sym)).map(|i| &rhs[i]),
        StmtKind::Var(specs) => specs.iter().find_map(|spec| {
            let i = spec.names.iter().position(|name| info.symbol_at(name.id) == Some(sym))?;
            spec.values.get(i)
        }),
        _ => None,
    }
}

/// Select membership of a communication case node
fn select_case(cfg: &Cfg<'_>, frame: usize, node: CfgNodeId) -> Option<SelectCase> {
    let branch = cfg.predecessors(node).iter().copied().find(|&p| cfg.node(p).label == NodeLabel::Branch)?;
    let has_default = cfg.succ_ids(branch).any(|s| matches!(cfg.node(s).payload, Payload::Comm(clause) if clause.is_default()));
    Some(SelectCase {
        select: (frame, branch),
        has_default,
    })
}

fn is_reference(info: &TypeInfo, ty: &Type) -> bool {
    matches!(info.table.underlying(ty), Type::Pointer(_) | Type::Chan(..) | Type::Map(..) | Type::Slice(_))
}
