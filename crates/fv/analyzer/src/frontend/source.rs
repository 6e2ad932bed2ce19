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

//! Loaded sources and build configuration

use fv_common::{FileId, Location, Span};
use serde::{Deserialize, Serialize};

/// A loaded source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: FileId,
    /// Path as given on input
    pub path: String,
    pub text: String,
}

/// All source files of a run, indexed by [`FileId`]
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id
    pub fn add(&mut self, path: impl Into<String>, text: impl Into<String>) -> FileId {
        let id = self.files.len() as FileId;
        self.files.push(SourceFile {
            id,
            path: path.into(),
            text: text.into(),
        });
        id
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id as usize)
    }

    pub fn path(&self, id: FileId) -> &str {
        self.get(id).map(|f| f.path.as_str()).unwrap_or("<unknown>")
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve a span into a finding location
    pub fn location(&self, span: Span) -> Location {
        Location {
            path: self.path(span.file).to_string(),
            line: span.start.line.max(1),
            column: span.start.column.max(1),
            end_line: span.end.line.max(span.start.line).max(1),
            end_column: span.end.column.max(1),
            offset: span.start.offset,
        }
    }

    /// Source text covered by a span
    pub fn snippet(&self, span: Span) -> &str {
        self.get(span.file).and_then(|f| f.text.get(span.start.offset..span.end.offset)).unwrap_or("")
    }
}

/// Build configuration for file selection and target sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Extra build tags considered satisfied
    pub tags: Vec<String>,
    pub goos: String,
    pub goarch: String,
    /// Pointer width in bits (32 or 64), sizes `int`, `uint` and `uintptr`
    pub pointer_width: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            goos: "linux".to_string(),
            goarch: "amd64".to_string(),
            pointer_width: 64,
        }
    }
}

const UNIX_SYSTEMS: &[&str] = &["aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux", "netbsd", "openbsd", "solaris"];

impl BuildConfig {
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_pointer_width(mut self, width: u32) -> Self {
        self.pointer_width = width;
        self
    }

    pub fn with_target(mut self, goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        self.goos = goos.into();
        self.goarch = goarch.into();
        self
    }

    fn has_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || tag == "gc" || self.tags.iter().any(|t| t == tag) {
            return true;
        }
        if tag == "unix" {
            return UNIX_SYSTEMS.contains(&self.goos.as_str());
        }
        // Release tags are all satisfied
        tag.starts_with("go1.")
    }

    /// Evaluate a `//go:build` expression
    pub fn matches(&self, expr: &str) -> Result<bool, String> {
        let tokens = tokenize_constraint(expr)?;
        let mut eval = ConstraintEval { tokens: &tokens, pos: 0, config: self };
        let value = eval.or_expr()?;
        if eval.pos != tokens.len() {
            return Err(format!("unexpected '{}' in build constraint", tokens[eval.pos]));
        }
        Ok(value)
    }
}

fn tokenize_constraint(expr: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '(' | ')' | '!' => {
                tokens.push(ch.to_string());
                chars.next();
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(ch) {
                    return Err(format!("expected '{}{}' in build constraint", ch, ch));
                }
                tokens.push(format!("{}{}", ch, ch));
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(word);
            }
            other => return Err(format!("invalid character '{}' in build constraint", other)),
        }
    }
    Ok(tokens)
}

struct ConstraintEval<'a> {
    tokens: &'a [String],
    pos: usize,
    config: &'a BuildConfig,
}

impl ConstraintEval<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut value = self.and_expr()?;
        while self.peek() == Some("||") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut value = self.unary()?;
        while self.peek() == Some("&&") {
            self.pos += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<bool, String> {
        match self.peek() {
            Some("!") => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some("(") => {
                self.pos += 1;
                let value = self.or_expr()?;
                if self.peek() != Some(")") {
                    return Err("missing ')' in build constraint".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(tag) if tag != ")" && tag != "&&" && tag != "||" => {
                let satisfied = self.config.has_tag(tag);
                self.pos += 1;
                Ok(satisfied)
            }
            _ => Err("incomplete build constraint".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_common::Position;

    #[test]
    fn test_build_constraints() {
        let config = BuildConfig::default().with_tags(vec!["integration".to_string()]);
        assert!(config.matches("linux").unwrap());
        assert!(config.matches("linux && amd64").unwrap());
        assert!(!config.matches("windows").unwrap());
        assert!(config.matches("windows || (unix && !386)").unwrap());
        assert!(config.matches("integration && go1.21").unwrap());
        assert!(!config.matches("!integration").unwrap());
    }

    #[test]
    fn test_invalid_build_constraints() {
        let config = BuildConfig::default();
        assert!(config.matches("linux &").is_err());
        assert!(config.matches("(linux").is_err());
        assert!(config.matches("linux darwin").is_err());
        assert!(config.matches("").is_err());
    }

    #[test]
    fn test_source_map_location() {
        let mut map = SourceMap::new();
        let id = map.add("main.go", "package main\nfunc f() {}\n");
        let span = Span::new(id, Position::new(13, 2, 1), Position::new(17, 2, 5));
        let location = map.location(span);
        assert_eq!(location.path, "main.go");
        assert_eq!(location.line, 2);
        assert_eq!(location.end_column, 5);
        assert_eq!(map.snippet(span), "func");
    }
}
