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

//! Data race detection
//!
//! Two accesses race when they touch overlapping locations, at least one
//! writes, neither happens before the other and no common lock is held.
//! Accesses made by atomics and channel operations never reach this pass.

use super::events::{Event, EventId, Goroutine, Resource};
use super::extract::ConcurrencyModel;
use super::happens_before::HappensBefore;
use super::lockset::LockSets;
use crate::frontend::TypeInfo;

/// A pair of conflicting accesses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRace {
    pub resource: Resource,
    /// The writing access
    pub write: EventId,
    pub other: EventId,
}

pub fn detect_races(model: &ConcurrencyModel, hb: &HappensBefore, locks: &LockSets, info: &TypeInfo) -> Vec<DataRace> {
    let accesses: Vec<&Event> = model.events.iter().filter(|e| e.kind.is_memory() && e.resource.is_some()).collect();
    let mut races = Vec::new();
    for (i, &a) in accesses.iter().enumerate() {
        for &b in &accesses[i..] {
            if let Some(race) = check_pair(model, hb, locks, info, a, b) {
                races.push(race);
            }
        }
    }
    races
}

fn check_pair(model: &ConcurrencyModel, hb: &HappensBefore, locks: &LockSets, info: &TypeInfo, a: &Event, b: &Event) -> Option<DataRace> {
    let (ra, rb) = (a.resource.as_ref()?, b.resource.as_ref()?);
    if !ra.overlaps(rb) {
        return None;
    }
    let (write, other) = match (a.kind.is_write(), b.kind.is_write()) {
        (true, _) => (a, b),
        (false, true) => (b, a),
        (false, false) => return None,
    };
    let (ga, gb) = (model.goroutine(a.goroutine), model.goroutine(b.goroutine));
    if a.goroutine == b.goroutine {
        // Only separate instances of a goroutine started in a loop
        if !ga.repeated || !shared_across_instances(info, ra, ga) {
            return None;
        }
    } else if !shared_between(info, ra, ga, gb) || !hb.concurrent(a.id, b.id) {
        return None;
    }
    if locks.protected(a.id, b.id) {
        return None;
    }
    Some(DataRace {
        resource: write.resource.clone()?,
        write: write.id,
        other: other.id,
    })
}

/// The location is the same memory in both goroutines
fn shared_between(info: &TypeInfo, resource: &Resource, a: &Goroutine, b: &Goroutine) -> bool {
    let Some(root) = resource.root() else {
        return false;
    };
    let symbol = info.symbol(root);
    match symbol.owner {
        None => true,
        // Locals of a function running in both goroutines are separate instances
        Some(owner) => !(a.funcs.contains(&owner) && b.funcs.contains(&owner)),
    }
}

fn shared_across_instances(info: &TypeInfo, resource: &Resource, goroutine: &Goroutine) -> bool {
    let Some(root) = resource.root() else {
        return false;
    };
    match info.symbol(root).owner {
        None => true,
        Some(owner) => !goroutine.funcs.contains(&owner),
    }
}
