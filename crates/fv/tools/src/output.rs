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

//! Report output and exit status

use anyhow::{Context, Result};
use fv_analyzer::report::RenderOptions;
use fv_analyzer::{Category, OutputFormat, Report};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

/// Process exit status of `fv`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// No error findings
    Clean = 0,
    /// Error findings present or the quality gate failed
    Findings = 1,
    /// Invalid invocation or configuration
    Usage = 2,
    /// The tool failed and produced nothing else
    Internal = 3,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

/// Exit status of a finished run
///
/// Internal failures only decide the status when they are the only
/// findings of the report.
pub fn exit_status(report: &Report, fail_on_error: bool, min_quality_score: u32) -> ExitStatus {
    let internal_only = !report.findings.is_empty() && report.findings.iter().all(|f| f.category == Category::InternalError);
    if report.stats.failed_functions > 0 && internal_only {
        return ExitStatus::Internal;
    }
    if fail_on_error && report.has_errors() {
        return ExitStatus::Findings;
    }
    if report.score < min_quality_score {
        return ExitStatus::Findings;
    }
    ExitStatus::Clean
}

/// Render the report and write it to `path` or stdout
pub fn write_report(report: &Report, format: OutputFormat, options: &RenderOptions, path: Option<&Path>) -> Result<()> {
    let rendered = report.render_with(format, options).context("failed to render report")?;
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
                }
            }
            std::fs::write(path, rendered).with_context(|| format!("failed to write report to {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes()).context("failed to write report to stdout")?;
            stdout.flush().context("failed to write report to stdout")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_analyzer::report::Stats;
    use fv_analyzer::{Finding, Location, Severity};

    fn report(findings: Vec<Finding>, failed: usize) -> Report {
        let mut report = Report::empty("0.1.0");
        report.stats = Stats::of(&findings, 1, 4, failed);
        report.findings = findings;
        report
    }

    fn finding(category: Category, severity: Severity) -> Finding {
        Finding::new(category, severity, Location::file("main.go"), "message")
    }

    #[test]
    fn test_clean_and_error_runs() {
        assert_eq!(exit_status(&report(Vec::new(), 0), true, 0), ExitStatus::Clean);
        let errors = report(vec![finding(Category::DataRace, Severity::Error)], 0);
        assert_eq!(exit_status(&errors, true, 0), ExitStatus::Findings);
        assert_eq!(exit_status(&errors, false, 0), ExitStatus::Clean);
    }

    #[test]
    fn test_internal_failure_only() {
        let failed = report(vec![finding(Category::InternalError, Severity::Warning)], 1);
        assert_eq!(exit_status(&failed, true, 0), ExitStatus::Internal);
        let mixed = report(vec![finding(Category::InternalError, Severity::Warning), finding(Category::Complexity, Severity::Warning)], 1);
        assert_eq!(exit_status(&mixed, true, 0), ExitStatus::Clean);
    }

    #[test]
    fn test_quality_gate() {
        let mut warned = report(vec![finding(Category::Complexity, Severity::Warning)], 0);
        warned.score = 60;
        assert_eq!(exit_status(&warned, true, 50), ExitStatus::Clean);
        assert_eq!(exit_status(&warned, true, 70), ExitStatus::Findings);
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        write_report(&Report::empty("0.1.0"), OutputFormat::Json, &RenderOptions::default(), Some(&path)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Report = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.score, 100);
    }
}
