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

//! Type-safety verification
//!
//! Type safety is the conjunction of two obligations from small-step
//! operational semantics:
//!
//! - **Progress** ([`progress`]): a well-typed term is a value or can step
//! - **Preservation** ([`preservation`]): stepping keeps the term's type
//!
//! Both are approximated statically per function. Package-level
//! initializers, generic instantiations and unresolved names are checked
//! once per program by [`TypeVerifier::verify_program`].

pub mod preservation;
pub mod progress;

pub use preservation::{PreservationChecker, check_instantiations};
pub use progress::ProgressChecker;

use crate::analysis::{Analyzer, FunctionContext};
use crate::frontend::Program;
use fv_common::{Category, Finding, FvResult, Severity};
use tracing::debug;

pub(crate) const PROGRESS_THEORY: &str = "Progress theorem (Wright and Felleisen, 1994)";
pub(crate) const PRESERVATION_THEORY: &str = "Preservation theorem (Wright and Felleisen, 1994)";
pub(crate) const GENERICS_THEORY: &str = "type-set constraint satisfaction";
pub(crate) const ASSERTION_THEORY: &str = "Progress theorem: dynamic type assertion may be stuck";

/// Verification outcome of one function
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub findings: Vec<Finding>,
}

impl VerificationReport {
    pub fn progress_violations(&self) -> usize {
        self.findings.iter().filter(|f| f.category == Category::Progress).count()
    }

    pub fn preservation_violations(&self) -> usize {
        self.findings.iter().filter(|f| f.category == Category::Preservation).count()
    }

    /// Both obligations hold
    pub fn is_type_safe(&self) -> bool {
        self.progress_violations() == 0 && self.preservation_violations() == 0
    }
}

/// Verifier of the Progress and Preservation obligations
#[derive(Debug, Clone)]
pub struct TypeVerifier {
    pub check_progress: bool,
    pub check_preservation: bool,
    pub check_generics: bool,
    pub check_type_assertions: bool,
}

impl Default for TypeVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeVerifier {
    pub fn new() -> Self {
        Self {
            check_progress: true,
            check_preservation: true,
            check_generics: true,
            check_type_assertions: true,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.check_progress = enabled;
        self
    }

    pub fn with_preservation(mut self, enabled: bool) -> Self {
        self.check_preservation = enabled;
        self
    }

    pub fn with_generics(mut self, enabled: bool) -> Self {
        self.check_generics = enabled;
        self
    }

    pub fn with_type_assertions(mut self, enabled: bool) -> Self {
        self.check_type_assertions = enabled;
        self
    }

    /// Program-wide obligations: resolution problems, global initializers
    /// and generic instantiations
    pub fn verify_program(&self, program: &Program) -> Vec<Finding> {
        let mut findings = Vec::new();
        if self.check_progress {
            for problem in &program.info.problems {
                findings.push(Finding::new(Category::Progress, Severity::Error, program.location(problem.span), problem.message.clone()).with_theory(PROGRESS_THEORY));
            }
        }
        if self.check_preservation {
            findings.extend(PreservationChecker::new(program).with_assertion_checks(self.check_type_assertions).check_globals());
        }
        if self.check_generics {
            findings.extend(check_instantiations(program));
        }
        debug!(problems = program.info.problems.len(), instantiations = program.info.instantiations.len(), findings = findings.len(), "program obligations verified");
        findings
    }
}

impl Analyzer for TypeVerifier {
    type Result = VerificationReport;

    fn analyze(&self, ctx: &FunctionContext<'_>) -> FvResult<VerificationReport> {
        let mut report = VerificationReport::default();
        if self.check_progress {
            report.findings.extend(ProgressChecker::new(ctx).run());
        }
        if self.check_preservation || self.check_type_assertions {
            let checker = PreservationChecker::new(ctx.program).with_assertion_checks(self.check_type_assertions);
            let findings = checker.check_function(ctx.unit);
            let keep_preservation = self.check_preservation;
            report.findings.extend(findings.into_iter().filter(|f| keep_preservation || f.category == Category::UncheckedTypeAssertion));
        }
        debug!(
            function = %ctx.name(),
            progress = report.progress_violations(),
            preservation = report.preservation_violations(),
            "type obligations verified"
        );
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "types"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;

    fn verify(source: &str, func: &str, verifier: &TypeVerifier) -> VerificationReport {
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named(func).unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        verifier.analyze(&ctx).unwrap()
    }

    #[test]
    fn test_infinite_loop_is_type_safe() {
        let report = verify("package main\n\nfunc spin() {\n\tn := 0\n\tfor {\n\t\tn++\n\t}\n}\n", "spin", &TypeVerifier::new());
        assert!(report.is_type_safe());
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_both_obligations_counted() {
        let source = "package main\n\nfunc f(s string) int {\n\tx := s * 2\n\treturn s\n}\n";
        let report = verify(source, "f", &TypeVerifier::new());
        assert_eq!(report.progress_violations(), 1);
        assert_eq!(report.preservation_violations(), 1);
        assert!(!report.is_type_safe());

        let report = verify(source, "f", &TypeVerifier::new().with_preservation(false));
        assert_eq!(report.preservation_violations(), 0);
        assert_eq!(report.progress_violations(), 1);
    }

    #[test]
    fn test_resolution_problems_are_progress_errors() {
        let (program, _) = Program::from_source("t.go", "package main\n\nfunc f() int {\n\treturn missing\n}\n");
        let findings = TypeVerifier::new().verify_program(&program);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::Progress);
        assert_eq!(findings[0].message, "undefined: missing");
        assert_eq!(findings[0].location.line, 4);
    }
}
