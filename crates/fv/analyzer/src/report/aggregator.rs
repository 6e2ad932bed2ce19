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

//! Thread-safe finding collection

use super::{Report, Stats, quality_score};
use fv_common::{Finding, Severity, TOOL_VERSION};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

/// Collects findings from concurrent workers
///
/// Workers accumulate findings locally and hand them over in one
/// [`flush`](Self::flush) per function.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    findings: Mutex<Vec<Finding>>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush(&self, findings: Vec<Finding>) {
        if findings.is_empty() {
            return;
        }
        self.findings.lock().extend(findings);
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the final report
    ///
    /// Exact duplicates are dropped keeping the first occurrence. Stats and
    /// score cover every unique finding; `severity_min` only limits which
    /// findings are listed. The order is file path, byte offset, category,
    /// then the most severe first. Remaining ties keep the order in which
    /// findings were flushed.
    pub fn finish(self, inputs: Vec<String>, functions: usize, failed_functions: usize, severity_min: Severity, cancelled: bool) -> Report {
        let collected = self.findings.into_inner();
        let total = collected.len();

        let mut seen = HashSet::new();
        let mut findings: Vec<Finding> = collected.into_iter().filter(|f| seen.insert(f.clone())).collect();
        let stats = Stats::of(&findings, inputs.len(), functions, failed_functions);
        let score = quality_score(&stats);

        findings.retain(|f| f.at_least(severity_min));
        sort_findings(&mut findings);
        debug!(collected = total, reported = findings.len(), score, cancelled, "report aggregated");
        Report {
            version: TOOL_VERSION.to_string(),
            inputs,
            findings,
            stats,
            score,
            cancelled,
        }
    }
}

/// Stable report order
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        (a.location.path.as_str(), a.location.offset, a.category)
            .cmp(&(b.location.path.as_str(), b.location.offset, b.category))
            .then_with(|| b.severity.cmp(&a.severity))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_common::{Category, Location};
    use std::sync::Arc;

    fn at(path: &str, offset: usize, category: Category, severity: Severity, message: &str) -> Finding {
        let mut location = Location::file(path);
        location.offset = offset;
        Finding::new(category, severity, location, message)
    }

    #[test]
    fn test_order_and_dedup() {
        let aggregator = ReportAggregator::new();
        aggregator.flush(vec![
            at("b.go", 5, Category::DataRace, Severity::Error, "race"),
            at("a.go", 40, Category::Escape, Severity::Info, "escape"),
            at("a.go", 10, Category::Progress, Severity::Error, "first"),
            at("a.go", 10, Category::DataRace, Severity::Warning, "warning"),
            at("a.go", 10, Category::DataRace, Severity::Error, "error"),
        ]);
        aggregator.flush(vec![at("b.go", 5, Category::DataRace, Severity::Error, "race")]);
        let report = aggregator.finish(vec!["a.go".into(), "b.go".into()], 3, 0, Severity::Info, false);
        let messages: Vec<&str> = report.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["error", "warning", "first", "escape", "race"]);
        assert_eq!(report.stats.total, 5);
        assert_eq!(report.stats.files, 2);
        assert_eq!(report.version, TOOL_VERSION);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let aggregator = ReportAggregator::new();
        aggregator.flush(vec![at("a.go", 1, Category::Escape, Severity::Info, "one"), at("a.go", 1, Category::Escape, Severity::Info, "two")]);
        let report = aggregator.finish(Vec::new(), 1, 0, Severity::Info, false);
        assert_eq!(report.findings[0].message, "one");
        assert_eq!(report.findings[1].message, "two");
    }

    #[test]
    fn test_severity_filter() {
        let aggregator = ReportAggregator::new();
        aggregator.flush(vec![at("a.go", 1, Category::Escape, Severity::Info, "i"), at("a.go", 2, Category::Complexity, Severity::Warning, "w")]);
        let report = aggregator.finish(Vec::new(), 1, 0, Severity::Warning, true);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Warning);
        assert!(report.cancelled);
    }

    #[test]
    fn test_stats_and_score_ignore_severity_filter() {
        let findings = vec![
            at("a.go", 1, Category::Escape, Severity::Info, "i"),
            at("a.go", 2, Category::Progress, Severity::Error, "e"),
            at("a.go", 3, Category::Complexity, Severity::Warning, "w"),
        ];
        let all = ReportAggregator::new();
        all.flush(findings.clone());
        let all = all.finish(Vec::new(), 2, 0, Severity::Info, false);
        let filtered = ReportAggregator::new();
        filtered.flush(findings);
        let filtered = filtered.finish(Vec::new(), 2, 0, Severity::Error, false);
        assert_eq!(filtered.findings.len(), 1);
        assert_eq!(filtered.stats, all.stats);
        assert_eq!(filtered.stats.total, 3);
        assert_eq!(filtered.stats.count(Severity::Info), 1);
        assert_eq!(filtered.score, all.score);
        assert!(filtered.score < 100);
    }

    #[test]
    fn test_concurrent_flushes() {
        let aggregator = Arc::new(ReportAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        aggregator.flush(vec![at("a.go", worker * 100 + i, Category::Escape, Severity::Info, "x")]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(aggregator.len(), 80);
    }
}
