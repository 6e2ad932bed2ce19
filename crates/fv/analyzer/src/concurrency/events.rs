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

//! Synchronization events and the shared resources they act on

use crate::cfg::CfgNodeId;
use crate::frontend::TypeInfo;
use crate::frontend::scope::SymbolId;
use crate::frontend::types::FuncId;
use fv_common::Span;
use serde::Serialize;
use std::collections::HashSet;

pub type EventId = usize;
pub type GoroutineId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    GoroutineStart,
    GoroutineEnd,
    ChannelSend,
    ChannelReceive,
    ChannelClose,
    MutexLock,
    MutexUnlock,
    RwMutexRLock,
    RwMutexRUnlock,
    RwMutexWLock,
    RwMutexWUnlock,
    WaitGroupAdd,
    WaitGroupDone,
    WaitGroupWait,
    /// End of the function run by the first `Once.Do`
    OnceBody,
    /// Return of a `Once.Do` call
    OnceDo,
    MemoryRead,
    MemoryWrite,
}

impl EventKind {
    pub fn is_memory(&self) -> bool {
        matches!(self, EventKind::MemoryRead | EventKind::MemoryWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, EventKind::MemoryWrite)
    }

    pub fn is_acquire(&self) -> bool {
        matches!(self, EventKind::MutexLock | EventKind::RwMutexRLock | EventKind::RwMutexWLock)
    }

    pub fn is_release(&self) -> bool {
        matches!(self, EventKind::MutexUnlock | EventKind::RwMutexRUnlock | EventKind::RwMutexWUnlock)
    }

    /// Mode of a lock acquired or released by this event
    pub fn lock_mode(&self) -> LockMode {
        match self {
            EventKind::RwMutexRLock | EventKind::RwMutexRUnlock => LockMode::Shared,
            _ => LockMode::Exclusive,
        }
    }

    /// Channel operations that can block the goroutine
    pub fn is_channel_op(&self) -> bool {
        matches!(self, EventKind::ChannelSend | EventKind::ChannelReceive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockMode {
    Exclusive,
    /// `RWMutex.RLock`
    Shared,
}

/// A lock held in some mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeldLock {
    pub resource: Resource,
    pub mode: LockMode,
}

impl HeldLock {
    pub fn new(resource: Resource, mode: LockMode) -> Self {
        Self { resource, mode }
    }

    /// Holding `self` and `other` at once is mutually exclusive
    pub fn excludes(&self, other: &HeldLock) -> bool {
        self.resource == other.resource && (self.mode == LockMode::Exclusive || other.mode == LockMode::Exclusive)
    }
}

/// Abstract memory location or synchronization object
///
/// Paths through indexing collapse to one element per base, so `a[i]` and
/// `a[j]` name the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Var(SymbolId),
    Field(Box<Resource>, String),
    Element(Box<Resource>),
    /// Channel returned by `context.Context.Done`
    Cancel,
}

impl Resource {
    /// Variable at the root of the path
    pub fn root(&self) -> Option<SymbolId> {
        match self {
            Resource::Var(sym) => Some(*sym),
            Resource::Field(base, _) | Resource::Element(base) => base.root(),
            Resource::Cancel => None,
        }
    }

    fn is_prefix_of(&self, other: &Resource) -> bool {
        if self == other {
            return true;
        }
        match other {
            Resource::Field(base, _) | Resource::Element(base) => self.is_prefix_of(base),
            _ => false,
        }
    }

    /// Accesses to the two locations may touch the same memory
    pub fn overlaps(&self, other: &Resource) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    pub fn describe(&self, info: &TypeInfo) -> String {
        match self {
            Resource::Var(sym) => info.symbol(*sym).name.clone(),
            Resource::Field(base, field) => format!("{}.{}", base.describe(info), field),
            Resource::Element(base) => format!("{}[]", base.describe(info)),
            Resource::Cancel => "ctx.Done()".to_string(),
        }
    }
}

/// One step of an event's position: the frame, the CFG node inside it and
/// the evaluation order within that node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub frame: usize,
    pub node: CfgNodeId,
    pub seq: u32,
}

/// Membership of a channel operation in a `select`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectCase {
    /// Frame and branch node of the `select`
    pub select: (usize, CfgNodeId),
    pub has_default: bool,
}

/// A synchronization or memory event of one goroutine
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub goroutine: GoroutineId,
    pub span: Span,
    pub resource: Option<Resource>,
    /// Executes inside a loop of the goroutine
    pub repeated: bool,
    pub select: Option<SelectCase>,
    /// Receive driving a `range` loop
    pub range_loop: bool,
    /// Goroutine started by this event
    pub spawned: Option<GoroutineId>,
    pub path: Vec<PathStep>,
}

impl Event {
    /// Operation of a `select` that also has a `default` case
    pub fn is_nonblocking(&self) -> bool {
        self.select.is_some_and(|case| case.has_default)
    }
}

/// A statically identified goroutine
///
/// Goroutines spawned inside a loop are modeled once and marked `repeated`;
/// their instances run concurrently with each other.
#[derive(Debug, Clone)]
pub struct Goroutine {
    pub id: GoroutineId,
    pub func: FuncId,
    pub parent: Option<GoroutineId>,
    /// `go` statement or `WaitGroup.Go` call, `None` for the root
    pub spawn_span: Option<Span>,
    pub spawn_event: Option<EventId>,
    pub repeated: bool,
    /// Functions whose bodies execute in this goroutine
    pub funcs: HashSet<FuncId>,
    pub events: Vec<EventId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_overlap() {
        let s = Resource::Var(1);
        let field = Resource::Field(Box::new(s.clone()), "count".to_string());
        let other = Resource::Field(Box::new(s.clone()), "total".to_string());
        let elem = Resource::Element(Box::new(field.clone()));
        assert!(s.overlaps(&field));
        assert!(field.overlaps(&elem));
        assert!(!field.overlaps(&other));
        assert!(!Resource::Var(2).overlaps(&s));
        assert_eq!(elem.root(), Some(1));
        assert_eq!(Resource::Cancel.root(), None);
    }

    #[test]
    fn test_read_locks_do_not_exclude_each_other() {
        let read = HeldLock::new(Resource::Var(1), LockMode::Shared);
        let write = HeldLock::new(Resource::Var(1), LockMode::Exclusive);
        let other = HeldLock::new(Resource::Var(2), LockMode::Exclusive);
        assert!(!read.excludes(&read));
        assert!(read.excludes(&write));
        assert!(write.excludes(&write));
        assert!(!write.excludes(&other));
        assert_eq!(EventKind::RwMutexRLock.lock_mode(), LockMode::Shared);
        assert_eq!(EventKind::RwMutexWLock.lock_mode(), LockMode::Exclusive);
    }

    #[test]
    fn test_event_kind_classes() {
        assert!(EventKind::RwMutexRLock.is_acquire());
        assert!(EventKind::MutexUnlock.is_release());
        assert!(EventKind::MemoryWrite.is_memory());
        assert!(!EventKind::ChannelClose.is_channel_op());
    }
}
