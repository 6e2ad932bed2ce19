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

//! AST and type frontend
//!
//! Turns source files into a frozen [`Program`]: parsed files, packages and
//! the [`TypeInfo`] environment. The pipeline is
//!
//! 1. **Scan**: expand input paths into source files ([`scanner`])
//! 2. **Lex/Parse**: build the AST of each file ([`lexer`], [`parser`])
//! 3. **Filter**: drop files whose `//go:build` constraint does not match
//! 4. **Check**: resolve names and infer types ([`checker`])
//!
//! Parse errors stop processing of the affected file only; they are
//! reported as `parse-error` findings and the remaining files are still
//! checked and analyzed.

pub mod ast;
pub mod builtins;
pub mod checker;
pub mod error;
pub mod info;
pub mod lexer;
pub mod parser;
pub mod scanner;
pub mod scope;
pub mod source;
pub mod token;
pub mod types;
pub mod visit;

pub use checker::Package;
pub use info::TypeInfo;
pub use source::{BuildConfig, SourceMap};

use ast::{Block, Decl, Expr, File, FuncDecl, FuncTypeExpr, NodeId};
use fv_common::{Category, FileId, FvError, FvResult, Finding, Location, Severity, Span};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use types::FuncId;
use visit::{Visitor, walk_block};

/// A loaded, parsed and type-checked program
#[derive(Debug, Clone)]
pub struct Program {
    pub sources: SourceMap,
    /// Files that parsed and matched the build configuration
    pub files: Vec<File>,
    pub packages: Vec<Package>,
    pub info: TypeInfo,
    pub build: BuildConfig,
}

/// A function body analyzed as one unit: a declaration or a function literal
#[derive(Debug, Clone, Copy)]
pub struct FunctionUnit<'p> {
    pub id: FuncId,
    pub file: &'p File,
    pub sig: &'p FuncTypeExpr,
    pub body: &'p Block,
    /// Declaration, `None` for closures
    pub decl: Option<&'p FuncDecl>,
    /// Node id of the declaration or function literal
    pub node: NodeId,
}

impl Program {
    /// Read source files from disk and build the program
    ///
    /// Unreadable files become `io-error` findings; the rest are analyzed.
    pub fn load(paths: &[PathBuf], build: &BuildConfig) -> (Program, Vec<Finding>) {
        let mut sources = SourceMap::new();
        let mut findings = Vec::new();
        for path in paths {
            match read_source(path) {
                Ok(text) => {
                    sources.add(path.display().to_string(), text);
                }
                Err(err) => {
                    findings.push(Finding::new(Category::IoError, Severity::Error, Location::file(path.display().to_string()), err.to_string()));
                }
            }
        }
        let (program, mut more) = Program::build(sources, build);
        findings.append(&mut more);
        (program, findings)
    }

    /// Parse and check sources already in memory
    pub fn build(sources: SourceMap, build: &BuildConfig) -> (Program, Vec<Finding>) {
        let mut findings = Vec::new();
        let mut files = Vec::new();
        let mut next_id: NodeId = 0;

        for source in sources.files() {
            match parser::parse_file(&source.text, source.id, &source.path, next_id) {
                Ok((file, next)) => {
                    next_id = next;
                    if let Some(constraint) = &file.build_constraint {
                        match build.matches(constraint) {
                            Ok(true) => {}
                            Ok(false) => {
                                debug!(file = %source.path, constraint = %constraint, "excluded by build constraint");
                                findings.push(Finding::new(
                                    Category::BuildConstraint,
                                    Severity::Info,
                                    Location::file(source.path.clone()),
                                    format!("file excluded by build constraint '{}'", constraint),
                                ));
                                continue;
                            }
                            Err(message) => {
                                findings.push(Finding::new(Category::BuildConstraint, Severity::Warning, Location::file(source.path.clone()), message));
                            }
                        }
                    }
                    files.push(file);
                }
                Err(err) => {
                    let mut location = Location::file(source.path.clone());
                    location.line = err.position.line.max(1);
                    location.column = err.position.column.max(1);
                    location.end_line = location.line;
                    location.end_column = location.column;
                    location.offset = err.position.offset;
                    let mut finding = Finding::new(Category::ParseError, Severity::Error, location, err.user_message());
                    if let Some(context) = &err.context {
                        finding = finding.with_suggestion(context.clone());
                    }
                    findings.push(finding);
                }
            }
        }

        let (packages, info) = checker::check_program(&files, build.pointer_width);
        info!(files = files.len(), packages = packages.len(), functions = info.functions.len(), "frontend complete");

        (
            Program {
                sources,
                files,
                packages,
                info,
                build: build.clone(),
            },
            findings,
        )
    }

    /// Build a single-file program from text
    pub fn from_source(path: &str, text: &str) -> (Program, Vec<Finding>) {
        let mut sources = SourceMap::new();
        sources.add(path, text);
        Program::build(sources, &BuildConfig::default())
    }

    /// Every function body of the program, ordered by function id
    pub fn units(&self) -> Vec<FunctionUnit<'_>> {
        let mut units = Vec::new();
        for file in &self.files {
            let mut collector = ClosureCollector {
                info: &self.info,
                file,
                units: Vec::new(),
            };
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) => {
                        if let (Some(body), Some(id)) = (&func.body, self.info.func_at(func.id)) {
                            units.push(FunctionUnit {
                                id,
                                file,
                                sig: &func.sig,
                                body,
                                decl: Some(func),
                                node: func.id,
                            });
                            walk_block(&mut collector, body);
                        }
                    }
                    Decl::Var(specs) => {
                        for value in specs.iter().flat_map(|spec| &spec.values) {
                            collector.visit_expr(value);
                        }
                    }
                    Decl::Const(_) | Decl::Type(_) => {}
                }
            }
            units.append(&mut collector.units);
        }
        units.sort_by_key(|unit| unit.id);
        units
    }

    /// Unit of a single function
    pub fn unit(&self, id: FuncId) -> Option<FunctionUnit<'_>> {
        self.units().into_iter().find(|unit| unit.id == id)
    }

    /// Finding location of a span
    pub fn location(&self, span: Span) -> Location {
        self.sources.location(span)
    }

    pub fn path(&self, file: FileId) -> &str {
        self.sources.path(file)
    }

    /// Input paths in load order
    pub fn inputs(&self) -> Vec<String> {
        self.sources.files().iter().map(|f| f.path.clone()).collect()
    }

    /// Function id by display name, e.g. `add` or `(*T).m`
    pub fn func_named(&self, name: &str) -> Option<FuncId> {
        self.info.functions.iter().find(|f| f.name == name).map(|f| f.id)
    }

    pub fn func_name(&self, id: FuncId) -> &str {
        &self.info.func(id).name
    }
}

fn read_source(path: &Path) -> FvResult<String> {
    let bytes = fs::read(path).map_err(|err| FvError::io(path, err))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

struct ClosureCollector<'p> {
    info: &'p TypeInfo,
    file: &'p File,
    units: Vec<FunctionUnit<'p>>,
}

impl<'p> Visitor<'p> for ClosureCollector<'p> {
    fn visit_func_lit(&mut self, expr: &'p Expr, sig: &'p FuncTypeExpr, body: &'p Block) {
        if let Some(id) = self.info.func_at(expr.id) {
            self.units.push(FunctionUnit {
                id,
                file: self.file,
                sig,
                body,
                decl: None,
                node: expr.id,
            });
        }
        walk_block(self, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_include_closures() {
        let source = "package main\nvar handler = func() int { return 1 }\nfunc main() {\n\tgo func() {\n\t\tdefer func() {}()\n\t}()\n}\n";
        let (program, findings) = Program::from_source("main.go", source);
        assert!(findings.is_empty());
        let units = program.units();
        assert_eq!(units.len(), 4);
        assert_eq!(units.iter().filter(|u| u.decl.is_some()).count(), 1);
        let ids: Vec<FuncId> = units.iter().map(|u| u.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_parse_error_becomes_finding() {
        let mut sources = SourceMap::new();
        sources.add("bad.go", "package main\nfunc f( {\n");
        sources.add("good.go", "package main\nfunc g() {}\n");
        let (program, findings) = Program::build(sources, &BuildConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::ParseError);
        assert_eq!(findings[0].location.path, "bad.go");
        assert_eq!(program.files.len(), 1);
        assert!(program.func_named("g").is_some());
    }

    #[test]
    fn test_build_constraint_excludes_file() {
        let mut sources = SourceMap::new();
        sources.add("win.go", "//go:build windows\n\npackage main\nfunc w() {}\n");
        sources.add("all.go", "package main\nfunc a() {}\n");
        let (program, findings) = Program::build(sources, &BuildConfig::default());
        assert_eq!(program.files.len(), 1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::BuildConstraint);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("ok.go");
        fs::write(&present, "package main\nfunc ok() {}\n").unwrap();
        let missing = dir.path().join("missing.go");
        let (program, findings) = Program::load(&[present, missing], &BuildConfig::default());
        assert_eq!(program.files.len(), 1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::IoError);
    }
}
