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

//! Static analyzer and formal verifier for Go-like programs
//!
//! The [`frontend`] turns sources into a frozen [`Program`]; [`cfg`] builds
//! one control-flow graph per function; [`dataflow`], [`concurrency`],
//! [`optimization`] and [`verifier`] produce findings; [`report`] merges
//! them into a [`Report`]. The [`engine`] ties these together on a worker
//! pool.

pub mod analysis;
pub mod cache;
pub mod cfg;
pub mod concurrency;
pub mod config;
pub mod dataflow;
pub mod engine;
pub mod frontend;
pub mod optimization;
pub mod report;
pub mod verifier;

pub use analysis::{Analyzer, FunctionContext};
pub use cache::ReportCache;
pub use config::{AnalysisKind, EngineConfig, RuleToggles};
pub use engine::Engine;
pub use frontend::{BuildConfig, Program, SourceMap};
pub use report::{OutputFormat, Report, ReportAggregator, Stats};

// Re-export the shared types for convenience
pub use fv_common::{CancellationToken, Category, Finding, FvError, FvResult, Location, Severity};
