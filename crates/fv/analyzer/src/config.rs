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

//! Engine configuration

use crate::cfg::MetricLimits;
use crate::dataflow::DEFAULT_ITERATION_CAP;
use crate::frontend::BuildConfig;
use crate::frontend::scanner::ScanOptions;
use crate::optimization::DEFAULT_INLINE_THRESHOLD;
use fv_common::{FvError, FvResult, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_COMPLEXITY_THRESHOLD: u32 = 10;

/// An analysis that can be switched on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Cfg,
    Dataflow,
    Concurrency,
    Optimization,
    Types,
}

impl AnalysisKind {
    pub fn all() -> [AnalysisKind; 5] {
        [AnalysisKind::Cfg, AnalysisKind::Dataflow, AnalysisKind::Concurrency, AnalysisKind::Optimization, AnalysisKind::Types]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Cfg => "cfg",
            AnalysisKind::Dataflow => "dataflow",
            AnalysisKind::Concurrency => "concurrency",
            AnalysisKind::Optimization => "optimization",
            AnalysisKind::Types => "types",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = FvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cfg" => Ok(AnalysisKind::Cfg),
            "dataflow" => Ok(AnalysisKind::Dataflow),
            "concurrency" => Ok(AnalysisKind::Concurrency),
            "optimization" => Ok(AnalysisKind::Optimization),
            "types" => Ok(AnalysisKind::Types),
            other => Err(FvError::InvalidConfig(format!("unknown analysis '{}'", other))),
        }
    }
}

/// Individual rules inside the enabled analyses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleToggles {
    pub complexity: bool,
    pub unreachable_code: bool,
    pub unused_assignments: bool,
    pub redundant_expressions: bool,
    pub data_races: bool,
    pub deadlocks: bool,
    pub goroutine_leaks: bool,
    pub lock_order: bool,
    pub escape: bool,
    pub inlining: bool,
    pub bounds_checks: bool,
    pub progress: bool,
    pub preservation: bool,
    pub generics: bool,
    pub type_assertions: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            complexity: true,
            unreachable_code: true,
            unused_assignments: true,
            redundant_expressions: true,
            data_races: true,
            deadlocks: true,
            goroutine_leaks: true,
            lock_order: true,
            escape: true,
            inlining: true,
            bounds_checks: true,
            progress: true,
            preservation: true,
            generics: true,
            type_assertions: true,
        }
    }
}

/// Configuration of one analysis run
///
/// Everything that can change the findings is serialized into the cache
/// key; `workers` and `emit_cfg` are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub enabled: BTreeSet<AnalysisKind>,
    /// Worker threads, zero uses the available processors
    #[serde(skip)]
    pub workers: usize,
    pub iteration_cap: usize,
    pub severity_min: Severity,
    pub inline_threshold: u32,
    pub complexity_threshold: u32,
    /// Cognitive complexity, body length and parameter count limits
    pub metric_limits: MetricLimits,
    pub build: BuildConfig,
    pub scan: ScanOptions,
    /// Resolve interface dispatch when a single concrete type reaches the call
    pub precise_dispatch: bool,
    pub rules: RuleToggles,
    /// Directory receiving one DOT file per function
    #[serde(skip)]
    pub emit_cfg: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: AnalysisKind::all().into_iter().collect(),
            workers: 0,
            iteration_cap: DEFAULT_ITERATION_CAP,
            severity_min: Severity::Info,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            complexity_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
            metric_limits: MetricLimits::default(),
            build: BuildConfig::default(),
            scan: ScanOptions::default(),
            precise_dispatch: false,
            rules: RuleToggles::default(),
            emit_cfg: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis(mut self, kind: AnalysisKind, enabled: bool) -> Self {
        if enabled {
            self.enabled.insert(kind);
        } else {
            self.enabled.remove(&kind);
        }
        self
    }

    /// Run exactly the given analyses
    pub fn with_only(mut self, kinds: impl IntoIterator<Item = AnalysisKind>) -> Self {
        self.enabled = kinds.into_iter().collect();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_iteration_cap(mut self, cap: usize) -> Self {
        self.iteration_cap = cap;
        self
    }

    pub fn with_severity_min(mut self, severity: Severity) -> Self {
        self.severity_min = severity;
        self
    }

    pub fn with_inline_threshold(mut self, threshold: u32) -> Self {
        self.inline_threshold = threshold;
        self
    }

    pub fn with_complexity_threshold(mut self, threshold: u32) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    pub fn with_metric_limits(mut self, limits: MetricLimits) -> Self {
        self.metric_limits = limits;
        self
    }

    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    pub fn with_scan(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_precise_dispatch(mut self, precise: bool) -> Self {
        self.precise_dispatch = precise;
        self
    }

    pub fn with_rules(mut self, rules: RuleToggles) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_emit_cfg(mut self, dir: Option<PathBuf>) -> Self {
        self.emit_cfg = dir;
        self
    }

    pub fn is_enabled(&self, kind: AnalysisKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Worker count after resolving the automatic default
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }

    pub fn validate(&self) -> FvResult<()> {
        if self.iteration_cap == 0 {
            return Err(FvError::InvalidConfig("iteration cap must be positive".to_string()));
        }
        if self.build.pointer_width != 32 && self.build.pointer_width != 64 {
            return Err(FvError::InvalidConfig(format!("pointer width must be 32 or 64, got {}", self.build.pointer_width)));
        }
        Ok(())
    }

    /// Stable serialization of every setting that affects findings
    pub fn fingerprint(&self) -> FvResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_everything() {
        let config = EngineConfig::default();
        for kind in AnalysisKind::all() {
            assert!(config.is_enabled(kind));
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toggle_order_does_not_matter() {
        let a = EngineConfig::new()
            .with_only([])
            .with_analysis(AnalysisKind::Types, true)
            .with_analysis(AnalysisKind::Cfg, true);
        let b = EngineConfig::new()
            .with_only([])
            .with_analysis(AnalysisKind::Cfg, true)
            .with_analysis(AnalysisKind::Types, true);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_workers_do_not_change_fingerprint() {
        let a = EngineConfig::new().with_workers(1);
        let b = EngineConfig::new().with_workers(8);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), EngineConfig::new().with_iteration_cap(5).fingerprint().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EngineConfig::new().with_iteration_cap(0).validate().is_err());
        let build = BuildConfig::default().with_pointer_width(16);
        assert!(EngineConfig::new().with_build(build).validate().is_err());
    }

    #[test]
    fn test_parse_analysis_kind() {
        assert_eq!("Dataflow".parse::<AnalysisKind>().unwrap(), AnalysisKind::Dataflow);
        assert!("lint".parse::<AnalysisKind>().is_err());
    }
}
