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

//! Report aggregation and output
//!
//! Workers flush their findings into a [`ReportAggregator`]; once every
//! function is done the aggregator produces the final [`Report`]:
//! de-duplicated, filtered by severity, stably ordered and summarized.
//! [`ReportFormatter`]s render the report as text, JSON, Markdown or HTML.

pub mod aggregator;
pub mod format;

pub use aggregator::ReportAggregator;
pub use format::{DEFAULT_REPORT_TITLE, HtmlFormatter, JsonFormatter, MarkdownFormatter, OutputFormat, RenderOptions, ReportFormatter, TextFormatter, formatter_for};

use fv_common::{Finding, FvResult, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters over the findings of a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub files: usize,
    pub functions: usize,
    /// Functions skipped after an internal failure
    pub failed_functions: usize,
}

impl Stats {
    pub fn of(findings: &[Finding], files: usize, functions: usize, failed_functions: usize) -> Self {
        let mut by_severity: BTreeMap<String, usize> = Severity::all().iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut by_category = BTreeMap::new();
        for finding in findings {
            *by_severity.entry(finding.severity.as_str().to_string()).or_insert(0) += 1;
            *by_category.entry(finding.category.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            total: findings.len(),
            by_severity,
            by_category,
            files,
            functions,
            failed_functions,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(severity.as_str()).copied().unwrap_or(0)
    }
}

/// Heuristic quality score in `0..=100`
///
/// Weighted finding density per analyzed function, scaled by the share of
/// functions that were analyzed successfully. No findings and no failures
/// score 100.
pub fn quality_score(stats: &Stats) -> u32 {
    let (errors, warnings, infos) = (stats.count(Severity::Error), stats.count(Severity::Warning), stats.count(Severity::Info));
    if errors + warnings + infos == 0 && stats.failed_functions == 0 {
        return 100;
    }
    let weighted = (errors * 10 + warnings * 3) as f64 + infos as f64 * 0.25;
    let density = weighted / stats.functions.max(1) as f64;
    let base = 100.0 - (density * 5.0).min(100.0);
    let coverage = if stats.functions == 0 {
        1.0
    } else {
        stats.functions.saturating_sub(stats.failed_functions) as f64 / stats.functions as f64
    };
    (base * coverage).round().clamp(0.0, 100.0) as u32
}

/// The final output of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub version: String,
    pub inputs: Vec<String>,
    pub findings: Vec<Finding>,
    pub stats: Stats,
    pub score: u32,
    pub cancelled: bool,
}

impl Report {
    /// Report of a run without inputs
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            inputs: Vec::new(),
            findings: Vec::new(),
            stats: Stats::of(&[], 0, 0, 0),
            score: 100,
            cancelled: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn render(&self, format: OutputFormat) -> FvResult<String> {
        self.render_with(format, &RenderOptions::default())
    }

    pub fn render_with(&self, format: OutputFormat, options: &RenderOptions) -> FvResult<String> {
        formatter_for(format, options).format(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_common::{Category, Location};

    fn finding(severity: Severity) -> Finding {
        Finding::new(Category::Complexity, severity, Location::file("a.go"), "x")
    }

    #[test]
    fn test_empty_report_scores_100() {
        let report = Report::empty("0.1.0");
        assert_eq!(report.score, 100);
        assert!(!report.has_errors());
        assert_eq!(quality_score(&Stats::of(&[], 0, 0, 0)), 100);
        assert_eq!(report.stats.count(Severity::Error), 0);
    }

    #[test]
    fn test_score_decreases_with_severity() {
        let info = quality_score(&Stats::of(&[finding(Severity::Info)], 1, 4, 0));
        let warning = quality_score(&Stats::of(&[finding(Severity::Warning)], 1, 4, 0));
        let error = quality_score(&Stats::of(&[finding(Severity::Error)], 1, 4, 0));
        assert!(info > warning && warning > error);
        assert!(error <= 100);
        let crowded = quality_score(&Stats::of(&vec![finding(Severity::Error); 50], 1, 1, 0));
        assert_eq!(crowded, 0);
    }

    #[test]
    fn test_failed_functions_reduce_coverage() {
        let full = quality_score(&Stats::of(&[finding(Severity::Info)], 1, 4, 0));
        let partial = quality_score(&Stats::of(&[finding(Severity::Info)], 1, 4, 2));
        assert!(partial < full);
        assert_eq!(quality_score(&Stats::of(&[], 1, 2, 1)), 50);
    }

    #[test]
    fn test_stats_counts() {
        let stats = Stats::of(&[finding(Severity::Error), finding(Severity::Error), finding(Severity::Info)], 1, 2, 0);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(Severity::Error), 2);
        assert_eq!(stats.count(Severity::Warning), 0);
        assert_eq!(stats.by_category.get("complexity"), Some(&3));
    }
}
