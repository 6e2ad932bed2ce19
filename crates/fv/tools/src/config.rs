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

//! TOML configuration of the `fv` tool
//!
//! Resolution order: built-in defaults, then the file given by `--config`
//! or `$FV_CONFIG`, then command-line flags.

use anyhow::{Context, Result};
use fv_analyzer::cfg::MetricLimits;
use fv_analyzer::config::{DEFAULT_COMPLEXITY_THRESHOLD, RuleToggles};
use fv_analyzer::dataflow::DEFAULT_ITERATION_CAP;
use fv_analyzer::frontend::scanner::{ScanOptions, default_exclude_patterns};
use fv_analyzer::optimization::DEFAULT_INLINE_THRESHOLD;
use fv_analyzer::report::{DEFAULT_REPORT_TITLE, RenderOptions};
use fv_analyzer::{AnalysisKind, BuildConfig, EngineConfig, OutputFormat, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "FV_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FvConfig {
    pub project: ProjectConfig,
    pub analysis: AnalysisConfig,
    pub rules: RulesConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub recursive: bool,
    pub include_tests: bool,
    pub exclude_patterns: Vec<String>,
    pub max_file_size_kb: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            include_tests: false,
            exclude_patterns: default_exclude_patterns(),
            max_file_size_kb: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Zero uses the available processors
    pub workers: usize,
    pub iteration_cap: usize,
    /// When non-empty only these analyses run
    pub enable: Vec<AnalysisKind>,
    pub disable: Vec<AnalysisKind>,
    pub build_tags: Vec<String>,
    pub goos: String,
    pub goarch: String,
    pub pointer_width: u32,
    pub precise_dispatch: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let build = BuildConfig::default();
        Self {
            workers: 0,
            iteration_cap: DEFAULT_ITERATION_CAP,
            enable: Vec::new(),
            disable: Vec::new(),
            build_tags: build.tags,
            goos: build.goos,
            goarch: build.goarch,
            pointer_width: build.pointer_width,
            precise_dispatch: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub inline_threshold: u32,
    pub cyclomatic_threshold: u32,
    pub cognitive_threshold: u32,
    pub max_function_lines: u32,
    /// Zero disables the parameter count check
    pub max_parameters: u32,
    pub check_complexity: bool,
    pub check_unreachable_code: bool,
    pub check_unused_assignments: bool,
    pub check_redundant_expressions: bool,
    pub check_data_races: bool,
    pub check_deadlocks: bool,
    pub check_goroutine_leaks: bool,
    pub check_lock_order: bool,
    pub check_escape: bool,
    pub check_inlining: bool,
    pub check_bounds: bool,
    pub check_progress: bool,
    pub check_preservation: bool,
    pub check_generics: bool,
    pub check_type_assertions: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let limits = MetricLimits::default();
        Self {
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            cyclomatic_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
            cognitive_threshold: limits.cognitive,
            max_function_lines: limits.function_lines,
            max_parameters: limits.parameters,
            check_complexity: true,
            check_unreachable_code: true,
            check_unused_assignments: true,
            check_redundant_expressions: true,
            check_data_races: true,
            check_deadlocks: true,
            check_goroutine_leaks: true,
            check_lock_order: true,
            check_escape: true,
            check_inlining: true,
            check_bounds: true,
            check_progress: true,
            check_preservation: true,
            check_generics: true,
            check_type_assertions: true,
        }
    }
}

impl RulesConfig {
    pub fn metric_limits(&self) -> MetricLimits {
        MetricLimits {
            cognitive: self.cognitive_threshold,
            function_lines: self.max_function_lines,
            parameters: self.max_parameters,
        }
    }

    pub fn toggles(&self) -> RuleToggles {
        RuleToggles {
            complexity: self.check_complexity,
            unreachable_code: self.check_unreachable_code,
            unused_assignments: self.check_unused_assignments,
            redundant_expressions: self.check_redundant_expressions,
            data_races: self.check_data_races,
            deadlocks: self.check_deadlocks,
            goroutine_leaks: self.check_goroutine_leaks,
            lock_order: self.check_lock_order,
            escape: self.check_escape,
            inlining: self.check_inlining,
            bounds_checks: self.check_bounds,
            progress: self.check_progress,
            preservation: self.check_preservation,
            generics: self.check_generics,
            type_assertions: self.check_type_assertions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub severity_min: Severity,
    /// Exit with 1 when error findings are present
    pub fail_on_error: bool,
    /// Exit with 1 when the quality score is below this value
    pub min_quality_score: u32,
    pub cache_dir: Option<PathBuf>,
    /// Heading of Markdown and HTML reports
    pub title: String,
    pub author: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            severity_min: Severity::Info,
            fail_on_error: true,
            min_quality_score: 0,
            cache_dir: None,
            title: DEFAULT_REPORT_TITLE.to_string(),
            author: None,
        }
    }
}

impl OutputConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            title: self.title.clone(),
            author: self.author.clone().filter(|a| !a.is_empty()),
        }
    }
}

impl FvConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml()?).with_context(|| format!("failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    /// File from the command line, then `$FV_CONFIG`, then defaults
    pub fn resolve_config(cli_config: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_config {
            return Self::load_from_file(path);
        }
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }

    /// Analyses that will run
    pub fn enabled(&self) -> Vec<AnalysisKind> {
        let selected: Vec<AnalysisKind> = if self.analysis.enable.is_empty() { AnalysisKind::all().to_vec() } else { self.analysis.enable.clone() };
        let mut enabled: Vec<AnalysisKind> = selected.into_iter().filter(|kind| !self.analysis.disable.contains(kind)).collect();
        enabled.sort();
        enabled.dedup();
        enabled
    }

    pub fn engine_config(&self) -> EngineConfig {
        let build = BuildConfig::default()
            .with_tags(self.analysis.build_tags.clone())
            .with_target(self.analysis.goos.clone(), self.analysis.goarch.clone())
            .with_pointer_width(self.analysis.pointer_width);
        let scan = ScanOptions {
            recursive: self.project.recursive,
            include_tests: self.project.include_tests,
            exclude_patterns: self.project.exclude_patterns.clone(),
            max_file_size_kb: self.project.max_file_size_kb,
        };
        EngineConfig::new()
            .with_only(self.enabled())
            .with_workers(self.analysis.workers)
            .with_iteration_cap(self.analysis.iteration_cap)
            .with_severity_min(self.output.severity_min)
            .with_inline_threshold(self.rules.inline_threshold)
            .with_complexity_threshold(self.rules.cyclomatic_threshold)
            .with_metric_limits(self.rules.metric_limits())
            .with_build(build)
            .with_scan(scan)
            .with_precise_dispatch(self.analysis.precise_dispatch)
            .with_rules(self.rules.toggles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fv.toml");
        std::fs::write(&path, "[analysis]\nworkers = 3\ndisable = [\"optimization\"]\n\n[output]\nformat = \"json\"\n").unwrap();
        let config = FvConfig::load_from_file(&path).unwrap();
        assert_eq!(config.analysis.workers, 3);
        assert_eq!(config.analysis.iteration_cap, DEFAULT_ITERATION_CAP);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.project.recursive);
        assert!(!config.enabled().contains(&AnalysisKind::Optimization));
        assert_eq!(config.enabled().len(), 4);
    }

    #[test]
    fn test_report_title_and_author() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fv.toml");
        std::fs::write(&path, "[output]\nformat = \"html\"\ntitle = \"Release audit\"\nauthor = \"QA\"\n").unwrap();
        let config = FvConfig::load_from_file(&path).unwrap();
        assert_eq!(config.output.format, OutputFormat::Html);
        let options = config.output.render_options();
        assert_eq!(options.title, "Release audit");
        assert_eq!(options.author.as_deref(), Some("QA"));
        assert_eq!(FvConfig::default().output.render_options(), RenderOptions::default());
    }

    #[test]
    fn test_complexity_rule_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fv.toml");
        std::fs::write(&path, "[rules]\ncognitive_threshold = 8\nmax_function_lines = 30\nmax_parameters = 0\n").unwrap();
        let engine = FvConfig::load_from_file(&path).unwrap().engine_config();
        assert_eq!(
            engine.metric_limits,
            MetricLimits {
                cognitive: 8,
                function_lines: 30,
                parameters: 0,
            }
        );
        assert_eq!(engine.complexity_threshold, DEFAULT_COMPLEXITY_THRESHOLD);
        assert_eq!(FvConfig::default().engine_config().metric_limits, MetricLimits::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fv.toml");
        let mut config = FvConfig::default();
        config.output.cache_dir = Some(PathBuf::from("/tmp/fv-cache"));
        config.rules.check_inlining = false;
        config.save_to_file(&path).unwrap();
        assert_eq!(FvConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_enable_list_selects_analyses() {
        let mut config = FvConfig::default();
        config.analysis.enable = vec![AnalysisKind::Types, AnalysisKind::Cfg, AnalysisKind::Types];
        assert_eq!(config.enabled(), vec![AnalysisKind::Cfg, AnalysisKind::Types]);
        let engine = config.engine_config();
        assert!(engine.is_enabled(AnalysisKind::Cfg));
        assert!(!engine.is_enabled(AnalysisKind::Dataflow));
    }

    #[test]
    fn test_wrong_value_type_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fv.toml");
        std::fs::write(&path, "[analysis]\nworkers = \"many\"\n").unwrap();
        assert!(FvConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(FvConfig::load_from_file("/nonexistent/fv.toml").is_err());
    }
}
