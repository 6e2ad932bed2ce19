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

//! The uniform output record of every analysis

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a finding
///
/// Ordered so that `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Lowercase name used by every output format
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// All severities, most severe first
    pub fn all() -> [Severity; 3] {
        [Severity::Error, Severity::Warning, Severity::Info]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Category of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    // Input problems
    ParseError,
    IoError,
    BuildConstraint,
    InternalError,

    // Control flow
    CfgIncomplete,
    UnreachableCode,
    Complexity,

    // Data flow
    UnusedAssignment,
    RedundantExpression,
    DataflowNonconvergent,

    // Concurrency
    DataRace,
    ChannelDeadlock,
    GoroutineLeak,
    LockOrder,

    // Optimization
    Escape,
    AliasUnknown,
    Inlining,
    BoundsCheck,

    // Type safety
    Progress,
    Preservation,
    UncheckedTypeAssertion,
    GenericInstantiationUnresolved,
}

impl Category {
    /// Kebab-case name used by every output format
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ParseError => "parse-error",
            Category::IoError => "io-error",
            Category::BuildConstraint => "build-constraint",
            Category::InternalError => "internal-error",
            Category::CfgIncomplete => "cfg-incomplete",
            Category::UnreachableCode => "unreachable-code",
            Category::Complexity => "complexity",
            Category::UnusedAssignment => "unused-assignment",
            Category::RedundantExpression => "redundant-expression",
            Category::DataflowNonconvergent => "dataflow-nonconvergent",
            Category::DataRace => "data-race",
            Category::ChannelDeadlock => "channel-deadlock",
            Category::GoroutineLeak => "goroutine-leak",
            Category::LockOrder => "lock-order",
            Category::Escape => "escape",
            Category::AliasUnknown => "alias-unknown",
            Category::Inlining => "inlining",
            Category::BoundsCheck => "bounds-check",
            Category::Progress => "progress",
            Category::Preservation => "preservation",
            Category::UncheckedTypeAssertion => "unchecked-type-assertion",
            Category::GenericInstantiationUnresolved => "generic-instantiation-unresolved",
        }
    }

    /// The analysis family that produces this category
    pub fn family(&self) -> &'static str {
        match self {
            Category::ParseError | Category::IoError | Category::BuildConstraint | Category::InternalError => "input",
            Category::CfgIncomplete | Category::UnreachableCode | Category::Complexity => "cfg",
            Category::UnusedAssignment | Category::RedundantExpression | Category::DataflowNonconvergent => "dataflow",
            Category::DataRace | Category::ChannelDeadlock | Category::GoroutineLeak | Category::LockOrder => "concurrency",
            Category::Escape | Category::AliasUnknown | Category::Inlining | Category::BoundsCheck => "optimization",
            Category::Progress | Category::Preservation | Category::UncheckedTypeAssertion | Category::GenericInstantiationUnresolved => "types",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved source location of a finding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Path of the file as given on input
    pub path: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// End line (inclusive)
    pub end_line: usize,
    /// End column (exclusive)
    pub end_column: usize,
    /// Byte offset of the start
    pub offset: usize,
}

impl Location {
    /// Location that only names a file
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: 1,
            column: 1,
            end_line: 1,
            end_column: 1,
            offset: 0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

/// A single observation reported by an analysis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub theory_reference: Option<String>,
}

impl Finding {
    /// Create a finding without suggestion or theory reference
    pub fn new(category: Category, severity: Severity, location: Location, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            location,
            message: message.into(),
            suggestion: None,
            theory_reference: None,
        }
    }

    /// Attach a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a theory reference
    pub fn with_theory(mut self, reference: impl Into<String>) -> Self {
        self.theory_reference = Some(reference.into());
        self
    }

    /// Check whether the finding meets a severity threshold
    pub fn at_least(&self, threshold: Severity) -> bool {
        self.severity >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_and_parsing() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_category_serialization_matches_name() {
        for category in [Category::DataRace, Category::GenericInstantiationUnresolved, Category::CfgIncomplete] {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_finding_builder() {
        let finding = Finding::new(Category::DataRace, Severity::Error, Location::file("main.go"), "race on counter")
            .with_suggestion("guard counter with a mutex")
            .with_theory("Lamport happens-before");

        assert!(finding.at_least(Severity::Warning));
        assert_eq!(finding.suggestion.as_deref(), Some("guard counter with a mutex"));

        let json = serde_json::to_string(&finding).unwrap();
        assert!(json.contains("\"category\":\"data-race\""));
        assert!(json.contains("\"severity\":\"error\""));
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let finding = Finding::new(Category::Escape, Severity::Info, Location::file("a.go"), "moved to heap");
        let json = serde_json::to_string(&finding).unwrap();
        assert!(!json.contains("suggestion"));
        assert!(!json.contains("theory_reference"));
    }
}
