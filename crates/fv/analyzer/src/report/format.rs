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

//! Output formats

use super::Report;
use fv_common::{FvError, FvResult, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

pub const DEFAULT_REPORT_TITLE: &str = "Verification report";

/// Document metadata of the Markdown and HTML renderings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub title: String,
    pub author: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_REPORT_TITLE.to_string(),
            author: None,
        }
    }
}

/// Trait for rendering reports
pub trait ReportFormatter {
    fn format(&self, report: &Report) -> FvResult<String>;
    fn output_format(&self) -> OutputFormat;
}

pub fn formatter_for(format: OutputFormat, options: &RenderOptions) -> Box<dyn ReportFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Markdown => Box::new(MarkdownFormatter::new(options.clone())),
        OutputFormat::Html => Box::new(HtmlFormatter::new(options.clone())),
    }
}

/// `PATH:LINE:COL: SEVERITY CATEGORY: MESSAGE`, one finding per line
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &Report) -> FvResult<String> {
        let mut out = String::new();
        for finding in &report.findings {
            let _ = writeln!(out, "{}: {} {}: {}", finding.location, finding.severity, finding.category, finding.message);
            if let Some(suggestion) = &finding.suggestion {
                let _ = writeln!(out, "    suggestion: {}", suggestion);
            }
        }
        Ok(out)
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Text
    }
}

/// Pretty-printed JSON object with a trailing newline
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> FvResult<String> {
        let mut out = serde_json::to_string_pretty(report).map_err(FvError::from)?;
        out.push('\n');
        Ok(out)
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

#[derive(Default)]
pub struct MarkdownFormatter {
    options: RenderOptions,
}

impl MarkdownFormatter {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &Report) -> FvResult<String> {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.options.title);
        if let Some(author) = &self.options.author {
            let _ = writeln!(out, "- Author: {}", author);
        }
        let _ = writeln!(out, "- Version: {}", report.version);
        let _ = writeln!(out, "- Inputs: {}", report.inputs.len());
        let _ = writeln!(out, "- Functions: {}", report.stats.functions);
        let _ = writeln!(out, "- Quality score: {}/100", report.score);
        if report.cancelled {
            let _ = writeln!(out, "- **Cancelled**: results are partial");
        }

        let _ = writeln!(out, "\n## Summary\n");
        let _ = writeln!(out, "| Severity | Count |");
        let _ = writeln!(out, "|---|---|");
        for severity in Severity::all() {
            let _ = writeln!(out, "| {} | {} |", severity, report.stats.count(severity));
        }
        if !report.stats.by_category.is_empty() {
            let _ = writeln!(out, "\n| Category | Count |");
            let _ = writeln!(out, "|---|---|");
            for (category, count) in &report.stats.by_category {
                let _ = writeln!(out, "| {} | {} |", category, count);
            }
        }

        let _ = writeln!(out, "\n## Findings\n");
        if report.findings.is_empty() {
            let _ = writeln!(out, "No findings.");
            return Ok(out);
        }
        let _ = writeln!(out, "| Location | Severity | Category | Message | Suggestion |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for finding in &report.findings {
            let _ = writeln!(
                out,
                "| `{}` | {} | {} | {} | {} |",
                finding.location,
                finding.severity,
                finding.category,
                escape_cell(&finding.message),
                finding.suggestion.as_deref().map(escape_cell).unwrap_or_default()
            );
        }
        Ok(out)
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; margin: 0; background: #f4f5f7; color: #222; }
        header { background: #2f3e66; color: #fff; padding: 24px 40px; }
        header p { margin: 4px 0 0; opacity: 0.85; }
        main { padding: 24px 40px; }
        .cards { display: flex; gap: 16px; flex-wrap: wrap; margin-bottom: 24px; }
        .card { background: #fff; border-radius: 8px; padding: 16px 24px; min-width: 140px; box-shadow: 0 1px 3px rgba(0, 0, 0, 0.12); }
        .card .value { font-size: 1.8em; font-weight: 600; }
        table { border-collapse: collapse; width: 100%; background: #fff; }
        th, td { text-align: left; padding: 8px 12px; border-bottom: 1px solid #e3e5e8; vertical-align: top; }
        .severity-error { color: #b3261e; font-weight: 600; }
        .severity-warning { color: #a15c00; font-weight: 600; }
        .severity-info { color: #1f5fa8; }
        .score-excellent { color: #1e7d32; }
        .score-good { color: #4f7d1e; }
        .score-fair { color: #a15c00; }
        .score-poor { color: #b3261e; }
        .cancelled { background: #fff4d6; padding: 12px 16px; border-radius: 6px; margin-bottom: 16px; }
        .suggestion { color: #555; font-size: 0.9em; }
    </style>
</head>
<body>
"#;

/// Standalone HTML page with summary cards and a findings table
#[derive(Default)]
pub struct HtmlFormatter {
    options: RenderOptions,
}

impl HtmlFormatter {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl ReportFormatter for HtmlFormatter {
    fn format(&self, report: &Report) -> FvResult<String> {
        let title = escape_html(&self.options.title);
        let mut out = HTML_HEAD.replace("{title}", &title);
        let _ = writeln!(out, "<header>\n    <h1>{}</h1>", title);
        let _ = write!(out, "    <p>fv {}", escape_html(&report.version));
        if let Some(author) = &self.options.author {
            let _ = write!(out, " &middot; {}", escape_html(author));
        }
        let _ = writeln!(out, "</p>\n</header>\n<main>");
        if report.cancelled {
            let _ = writeln!(out, "<div class=\"cancelled\">Analysis was cancelled; results are partial.</div>");
        }

        let _ = writeln!(out, "<section class=\"cards\">");
        let _ = writeln!(
            out,
            "    <div class=\"card\"><div>Quality score</div><div class=\"value {}\">{}/100</div><div>{}</div></div>",
            score_class(report.score),
            report.score,
            score_label(report.score)
        );
        let _ = writeln!(out, "    <div class=\"card\"><div>Inputs</div><div class=\"value\">{}</div></div>", report.inputs.len());
        let _ = writeln!(out, "    <div class=\"card\"><div>Functions</div><div class=\"value\">{}</div></div>", report.stats.functions);
        for severity in Severity::all() {
            let _ = writeln!(
                out,
                "    <div class=\"card\"><div>{}</div><div class=\"value severity-{}\">{}</div></div>",
                severity,
                severity.as_str(),
                report.stats.count(severity)
            );
        }
        let _ = writeln!(out, "</section>");

        if !report.stats.by_category.is_empty() {
            let _ = writeln!(out, "<h2>Categories</h2>\n<table>\n    <tr><th>Category</th><th>Count</th></tr>");
            for (category, count) in &report.stats.by_category {
                let _ = writeln!(out, "    <tr><td>{}</td><td>{}</td></tr>", escape_html(category), count);
            }
            let _ = writeln!(out, "</table>");
        }

        let _ = writeln!(out, "<h2>Findings</h2>");
        if report.findings.is_empty() {
            let _ = writeln!(out, "<p>No findings.</p>");
        } else {
            let _ = writeln!(out, "<table>\n    <tr><th>Location</th><th>Severity</th><th>Category</th><th>Message</th></tr>");
            for finding in &report.findings {
                let _ = write!(
                    out,
                    "    <tr><td><code>{}</code></td><td class=\"severity-{}\">{}</td><td>{}</td><td>{}",
                    escape_html(&finding.location.to_string()),
                    finding.severity.as_str(),
                    finding.severity,
                    finding.category,
                    escape_html(&finding.message)
                );
                if let Some(suggestion) = &finding.suggestion {
                    let _ = write!(out, "<div class=\"suggestion\">{}</div>", escape_html(suggestion));
                }
                let _ = writeln!(out, "</td></tr>");
            }
            let _ = writeln!(out, "</table>");
        }
        let _ = writeln!(out, "</main>\n</body>\n</html>");
        Ok(out)
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Html
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn score_class(score: u32) -> &'static str {
    match score {
        90.. => "score-excellent",
        70..=89 => "score-good",
        50..=69 => "score-fair",
        _ => "score-poor",
    }
}

fn score_label(score: u32) -> &'static str {
    match score {
        90.. => "excellent",
        70..=89 => "good",
        50..=69 => "fair",
        _ => "poor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportAggregator;
    use fv_common::{Category, Finding, Location};

    fn sample() -> Report {
        let aggregator = ReportAggregator::new();
        let mut location = Location::file("main.go");
        location.line = 12;
        location.column = 3;
        location.offset = 120;
        aggregator.flush(vec![
            Finding::new(Category::DataRace, Severity::Error, location, "conflicting accesses to 'counter' | unordered").with_suggestion("guard 'counter' with a sync.Mutex or use sync/atomic"),
            Finding::new(Category::Escape, Severity::Info, Location::file("util.go"), "'&T{}' escapes to heap: address returned"),
        ]);
        aggregator.finish(vec!["main.go".into(), "util.go".into()], 4, 0, Severity::Info, false)
    }

    #[test]
    fn test_text_lines() {
        let text = sample().render(OutputFormat::Text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "main.go:12:3: error data-race: conflicting accesses to 'counter' | unordered");
        assert_eq!(lines[1], "    suggestion: guard 'counter' with a sync.Mutex or use sync/atomic");
        assert_eq!(lines[2], "util.go:1:1: info escape: '&T{}' escapes to heap: address returned");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_fields_and_determinism() {
        let report = sample();
        let json = report.render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in ["version", "inputs", "findings", "stats", "score", "cancelled"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["findings"][0]["category"], "data-race");
        assert_eq!(value["findings"][0]["severity"], "error");
        assert_eq!(value["stats"]["by_severity"]["error"], 1);
        assert_eq!(json, report.render(OutputFormat::Json).unwrap());

        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_markdown_escapes_cells() {
        let markdown = sample().render(OutputFormat::Markdown).unwrap();
        assert!(markdown.starts_with("# Verification report"));
        assert!(markdown.contains("| error | 1 |"));
        assert!(markdown.contains("'counter' \\| unordered"));
        let empty = Report::empty("0.1.0").render(OutputFormat::Markdown).unwrap();
        assert!(empty.contains("No findings."));
    }

    #[test]
    fn test_markdown_title_and_author() {
        let options = RenderOptions {
            title: "Nightly run".to_string(),
            author: Some("CI".to_string()),
        };
        let markdown = formatter_for(OutputFormat::Markdown, &options).format(&sample()).unwrap();
        assert!(markdown.starts_with("# Nightly run\n"));
        assert!(markdown.contains("- Author: CI"));
    }

    #[test]
    fn test_html_page() {
        let options = RenderOptions {
            title: "Audit <core>".to_string(),
            author: Some("Platform & Tools".to_string()),
        };
        let html = formatter_for(OutputFormat::Html, &options).format(&sample()).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Audit &lt;core&gt;</title>"));
        assert!(html.contains("Platform &amp; Tools"));
        assert!(html.contains("<td class=\"severity-error\">error</td><td>data-race</td>"));
        assert!(html.contains("&#39;counter&#39; | unordered"));
        assert!(html.contains("guard &#39;counter&#39; with a sync.Mutex"));
        assert!(html.trim_end().ends_with("</html>"));

        let empty = Report::empty("0.1.0").render(OutputFormat::Html).unwrap();
        assert!(empty.contains("<title>Verification report</title>"));
        assert!(empty.contains("<p>No findings.</p>"));
        assert!(empty.contains("score-excellent"));
    }

    #[test]
    fn test_score_classes() {
        assert_eq!(score_class(100), "score-excellent");
        assert_eq!(score_class(75), "score-good");
        assert_eq!(score_class(50), "score-fair");
        assert_eq!(score_label(10), "poor");
    }

    #[test]
    fn test_format_names() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("html".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(formatter_for(OutputFormat::Json, &RenderOptions::default()).output_format(), OutputFormat::Json);
        assert_eq!(OutputFormat::Html.to_string(), "html");
    }
}
