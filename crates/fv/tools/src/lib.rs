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

//! fv command-line tool library
//!
//! Argument parsing, TOML configuration and report output of the `fv`
//! binary.

pub mod cli;
pub mod config;
pub mod output;

pub use cli::Cli;
pub use cli::check::{effective_config, execute};
pub use config::FvConfig;
pub use output::{ExitStatus, exit_status, write_report};
