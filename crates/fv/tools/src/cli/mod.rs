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

//! Command-line surface of `fv`

pub mod check;

use crate::config::FvConfig;
use clap::{ArgAction, Parser};
use fv_analyzer::{AnalysisKind, OutputFormat, Severity};
use std::path::PathBuf;

/// Static analyzer and formal verifier for Go programs
#[derive(Parser, Debug, Clone)]
#[command(name = "fv")]
#[command(about = "Static analysis and formal verification of Go programs")]
#[command(version)]
pub struct Cli {
    /// Source files or directories to analyze
    #[arg(value_name = "PATH", required_unless_present = "print_config")]
    pub paths: Vec<PathBuf>,

    /// Output format: text, json, markdown or html
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Drop findings below this severity: info, warning or error
    #[arg(long)]
    pub severity_min: Option<Severity>,

    /// Run only the given analyses (repeatable)
    #[arg(long, value_name = "ANALYSIS")]
    pub enable: Vec<AnalysisKind>,

    /// Skip the given analyses (repeatable)
    #[arg(long, value_name = "ANALYSIS")]
    pub disable: Vec<AnalysisKind>,

    /// Worker threads, defaults to the available processors
    #[arg(long)]
    pub workers: Option<usize>,

    /// Pass limit of the data-flow solver
    #[arg(long)]
    pub iteration_cap: Option<usize>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (TOML), overrides $FV_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Build tags considered satisfied, comma separated
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Target pointer width in bits (32 or 64)
    #[arg(long)]
    pub pointer_width: Option<u32>,

    /// Resolve interface calls reached by a single concrete type
    #[arg(long)]
    pub precise_dispatch: bool,

    /// Include `_test.go` files
    #[arg(long)]
    pub include_tests: bool,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recursive: bool,

    /// Cost budget of the inlining heuristic
    #[arg(long)]
    pub inline_threshold: Option<u32>,

    /// Cyclomatic complexity above which a function is reported
    #[arg(long)]
    pub complexity_threshold: Option<u32>,

    /// Write one Graphviz DOT file per function into this directory
    #[arg(long, value_name = "DIR")]
    pub emit_cfg: Option<PathBuf>,

    /// Reuse reports stored in this directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log progress events on stderr
    #[arg(long)]
    pub progress: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply command-line flags on top of the file configuration
    pub fn apply_to(&self, config: &mut FvConfig) {
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(severity) = self.severity_min {
            config.output.severity_min = severity;
        }
        if !self.enable.is_empty() {
            config.analysis.enable = self.enable.clone();
        }
        config.analysis.disable.extend(self.disable.iter().copied());
        if let Some(workers) = self.workers {
            config.analysis.workers = workers;
        }
        if let Some(cap) = self.iteration_cap {
            config.analysis.iteration_cap = cap;
        }
        if !self.tags.is_empty() {
            config.analysis.build_tags = self.tags.clone();
        }
        if let Some(width) = self.pointer_width {
            config.analysis.pointer_width = width;
        }
        if self.precise_dispatch {
            config.analysis.precise_dispatch = true;
        }
        if self.include_tests {
            config.project.include_tests = true;
        }
        if self.no_recursive {
            config.project.recursive = false;
        }
        if let Some(threshold) = self.inline_threshold {
            config.rules.inline_threshold = threshold;
        }
        if let Some(threshold) = self.complexity_threshold {
            config.rules.cyclomatic_threshold = threshold;
        }
        if let Some(dir) = &self.cache_dir {
            config.output.cache_dir = Some(dir.clone());
        }
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 if self.progress => "info",
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_file() {
        let cli = Cli::parse_from(["fv", "--format", "json", "--enable", "types", "--enable", "cfg", "--workers", "2", "--tags", "a,b", "src"]);
        let mut config = FvConfig::default();
        config.output.format = OutputFormat::Markdown;
        config.analysis.workers = 8;
        cli.apply_to(&mut config);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.analysis.workers, 2);
        assert_eq!(config.analysis.build_tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.enabled(), vec![AnalysisKind::Cfg, AnalysisKind::Types]);
        assert_eq!(cli.paths, vec![PathBuf::from("src")]);
    }

    #[test]
    fn test_paths_required_unless_printing_config() {
        assert!(Cli::try_parse_from(["fv"]).is_err());
        assert!(Cli::try_parse_from(["fv", "--print-config"]).is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["fv", "--format", "xml", "a.go"]).is_err());
        assert!(Cli::try_parse_from(["fv", "--enable", "lint", "a.go"]).is_err());
        assert!(Cli::try_parse_from(["fv", "--severity-min", "fatal", "a.go"]).is_err());
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(Cli::parse_from(["fv", "a.go"]).log_level(), "warn");
        assert_eq!(Cli::parse_from(["fv", "-vv", "a.go"]).log_level(), "debug");
        assert_eq!(Cli::parse_from(["fv", "--progress", "a.go"]).log_level(), "info");
    }
}
