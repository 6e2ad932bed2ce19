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

//! Shared types for the formal verifier
//!
//! Positions, findings, the tool error taxonomy, progress events and the
//! cancellation token used by both the analyzer and the command-line tool.

pub mod cancellation;
pub mod error;
pub mod finding;
pub mod position;
pub mod progress;

pub use cancellation::CancellationToken;
pub use error::{FvError, FvResult};
pub use finding::{Category, Finding, Location, Severity};
pub use position::{FileId, Position, Span};
pub use progress::{DEFAULT_PROGRESS_CAPACITY, Phase, ProgressEvent, ProgressReporter};

/// Semantic version of the tool, reported in machine output
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
