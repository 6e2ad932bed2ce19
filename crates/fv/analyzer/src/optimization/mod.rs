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

//! Optimization analysis
//!
//! Three independent passes over each function:
//!
//! - [`escape`]: stack or heap placement of every allocation site
//! - [`inline`]: cost model and inlinability decision
//! - [`bce`]: bounds checks that a compiler could remove
//!
//! Escape analysis is interprocedural; its [`EscapeSummaries`] are computed
//! once per program and shared by every function.

pub mod bce;
pub mod escape;
pub mod inline;

pub use bce::{BoundsCheckAnalyzer, BoundsRecord, BoundsVerdict};
pub use escape::{EscapeAnalyzer, EscapeRecord, EscapeReport, EscapeSummaries, EscapeVerdict, SiteKind};
pub use inline::{DEFAULT_INLINE_THRESHOLD, InlineAnalyzer, InlineDecision, InlineRecord};

use crate::analysis::{Analyzer, FunctionContext};
use fv_common::{Finding, FvResult};
use serde::Serialize;
use tracing::debug;

/// Results of the optimization passes for one function
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizationReport {
    pub escapes: Vec<EscapeRecord>,
    pub inline: Option<InlineRecord>,
    pub bounds: Vec<BoundsRecord>,
    #[serde(skip)]
    pub findings: Vec<Finding>,
}

/// Runs the enabled optimization passes
#[derive(Debug, Clone)]
pub struct OptimizationAnalyzer {
    pub inline: InlineAnalyzer,
    pub bounds: BoundsCheckAnalyzer,
    pub detect_escape: bool,
    pub detect_inline: bool,
    pub detect_bce: bool,
}

impl Default for OptimizationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationAnalyzer {
    pub fn new() -> Self {
        Self {
            inline: InlineAnalyzer::new(),
            bounds: BoundsCheckAnalyzer::new(),
            detect_escape: true,
            detect_inline: true,
            detect_bce: true,
        }
    }

    pub fn with_inline_threshold(mut self, threshold: u32) -> Self {
        self.inline = self.inline.with_threshold(threshold);
        self
    }

    pub fn with_escape_analysis(mut self, enabled: bool) -> Self {
        self.detect_escape = enabled;
        self
    }

    pub fn with_inline_analysis(mut self, enabled: bool) -> Self {
        self.detect_inline = enabled;
        self
    }

    pub fn with_bounds_check_analysis(mut self, enabled: bool) -> Self {
        self.detect_bce = enabled;
        self
    }

    pub fn analyze(&self, ctx: &FunctionContext<'_>, summaries: &EscapeSummaries) -> FvResult<OptimizationReport> {
        let mut report = OptimizationReport::default();

        if self.detect_escape {
            let escapes = EscapeAnalyzer::new(summaries).analyze(ctx)?;
            report.escapes = escapes.records;
            report.findings.extend(escapes.findings);
        }
        if self.detect_inline {
            let (record, findings) = self.inline.analyze(ctx)?;
            report.inline = Some(record);
            report.findings.extend(findings);
        }
        if self.detect_bce {
            let (records, findings) = self.bounds.analyze(ctx)?;
            report.bounds = records;
            report.findings.extend(findings);
        }

        debug!(
            function = %ctx.name(),
            escapes = report.escapes.len(),
            bounds = report.bounds.len(),
            findings = report.findings.len(),
            "optimization analysis complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use crate::frontend::Program;
    use fv_common::Category;

    const SOURCE: &str = "package main\n\ntype node struct{ v int }\n\nfunc mk() *node {\n\treturn &node{v: 1}\n}\n\nfunc sum(a []int) int {\n\ts := 0\n\tfor i := range a {\n\t\ts += a[i]\n\t}\n\treturn s\n}\n";

    fn report(name: &str, analyzer: &OptimizationAnalyzer) -> OptimizationReport {
        let (program, _) = Program::from_source("t.go", SOURCE);
        let summaries = EscapeSummaries::compute(&program);
        let unit = program.unit(program.func_named(name).unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        analyzer.analyze(&ctx, &summaries).unwrap()
    }

    #[test]
    fn test_all_passes_run() {
        let mk = report("mk", &OptimizationAnalyzer::new());
        assert_eq!(mk.escapes.len(), 1);
        assert_eq!(mk.escapes[0].verdict, EscapeVerdict::Heap);
        assert!(mk.findings.iter().any(|f| f.category == Category::Escape));
        assert_eq!(mk.inline.as_ref().map(|r| r.decision), Some(InlineDecision::Inlinable));

        let sum = report("sum", &OptimizationAnalyzer::new());
        assert_eq!(sum.bounds.len(), 1);
        assert_eq!(sum.bounds[0].verdict, BoundsVerdict::Eliminable);
    }

    #[test]
    fn test_disabled_passes_are_skipped() {
        let analyzer = OptimizationAnalyzer::new().with_escape_analysis(false).with_inline_analysis(false);
        let mk = report("mk", &analyzer);
        assert!(mk.escapes.is_empty());
        assert!(mk.inline.is_none());
        assert!(mk.findings.is_empty());
    }
}
