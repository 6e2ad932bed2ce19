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

//! Common analyzer interface
//!
//! Per-function analyses receive a [`FunctionContext`] holding the frozen
//! program, the function body and its CFG. Program-wide passes (escape
//! summaries, concurrency) take the program and every CFG directly.

use crate::cfg::Cfg;
use crate::frontend::info::FuncInfo;
use crate::frontend::{FunctionUnit, Program};
use fv_common::{FvResult, Location, Span};

/// Everything a per-function analysis may look at
#[derive(Clone, Copy)]
pub struct FunctionContext<'p> {
    pub program: &'p Program,
    pub unit: FunctionUnit<'p>,
    pub cfg: &'p Cfg<'p>,
}

impl<'p> FunctionContext<'p> {
    pub fn new(program: &'p Program, unit: FunctionUnit<'p>, cfg: &'p Cfg<'p>) -> Self {
        Self { program, unit, cfg }
    }

    pub fn func(&self) -> &'p FuncInfo {
        self.program.info.func(self.unit.id)
    }

    pub fn name(&self) -> &'p str {
        &self.func().name
    }

    pub fn location(&self, span: Span) -> Location {
        self.program.location(span)
    }
}

/// Common trait for all per-function analyzers
pub trait Analyzer {
    /// The type of result this analyzer produces
    type Result;

    /// Analyze one function
    fn analyze(&self, ctx: &FunctionContext<'_>) -> FvResult<Self::Result>;

    /// Get the name of this analyzer
    fn name(&self) -> &'static str;
}
