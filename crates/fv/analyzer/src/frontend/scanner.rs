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

//! Project scanner: expands input paths into the list of source files

use fv_common::{Category, Finding, Location, Severity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Include `_test.go` files
    pub include_tests: bool,
    /// Path components or globs that are skipped
    pub exclude_patterns: Vec<String>,
    /// Files above this size are skipped, zero disables the limit
    pub max_file_size_kb: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_tests: false,
            exclude_patterns: default_exclude_patterns(),
            max_file_size_kb: 1024,
        }
    }
}

pub fn default_exclude_patterns() -> Vec<String> {
    vec!["vendor".to_string(), "testdata".to_string(), ".git".to_string(), "node_modules".to_string()]
}

/// Result of a scan: files to analyze and notes about skipped inputs
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<PathBuf>,
    pub findings: Vec<Finding>,
    pub excluded: usize,
}

/// Expand input paths into source files
///
/// Explicit file arguments are always taken. Directories are walked in
/// sorted order; a path that cannot be read becomes an `io-error` finding.
pub fn scan_paths(paths: &[PathBuf], options: &ScanOptions) -> ScanResult {
    let mut result = ScanResult::default();
    for path in paths {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => scan_directory(path, path, options, &mut result),
            Ok(meta) => {
                if check_size(path, meta.len(), options, &mut result) {
                    result.files.push(path.clone());
                }
            }
            Err(err) => {
                result
                    .findings
                    .push(Finding::new(Category::IoError, Severity::Error, Location::file(path.display().to_string()), format!("cannot read input: {}", err)));
            }
        }
    }
    result.files.dedup();
    debug!(files = result.files.len(), excluded = result.excluded, "scan complete");
    result
}

fn scan_directory(root: &Path, dir: &Path, options: &ScanOptions, result: &mut ScanResult) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            result
                .findings
                .push(Finding::new(Category::IoError, Severity::Error, Location::file(dir.display().to_string()), format!("cannot read directory: {}", err)));
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in paths {
        if is_excluded(root, &path, &options.exclude_patterns) {
            result.excluded += 1;
            continue;
        }
        let Ok(meta) = fs::metadata(&path) else { continue };
        if meta.is_dir() {
            if options.recursive {
                scan_directory(root, &path, options, result);
            }
        } else if is_source_file(&path, options.include_tests) && check_size(&path, meta.len(), options, result) {
            result.files.push(path);
        }
    }
}

fn check_size(path: &Path, len: u64, options: &ScanOptions, result: &mut ScanResult) -> bool {
    if options.max_file_size_kb > 0 && len > options.max_file_size_kb * 1024 {
        result.excluded += 1;
        result.findings.push(Finding::new(
            Category::IoError,
            Severity::Info,
            Location::file(path.display().to_string()),
            format!("skipped: file is larger than {} KiB", options.max_file_size_kb),
        ));
        return false;
    }
    true
}

fn is_source_file(path: &Path, include_tests: bool) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
    name.ends_with(".go") && (include_tests || !name.ends_with("_test.go"))
}

fn is_excluded(root: &Path, path: &Path, patterns: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative_str = relative.to_string_lossy().replace('\\', "/");
    patterns.iter().any(|pattern| {
        let pattern = pattern.trim_start_matches("**/").trim_end_matches("/*").trim_end_matches('/');
        if pattern.contains('/') {
            return glob_match(pattern, &relative_str);
        }
        relative.components().any(|c| glob_match(pattern, &c.as_os_str().to_string_lossy()))
    })
}

/// Match `text` against a pattern where `*` matches any run of characters
/// and `?` a single character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.go", "main.go"));
        assert!(glob_match("vendor", "vendor"));
        assert!(glob_match("gen_*", "gen_types"));
        assert!(!glob_match("*.go", "main.rs"));
        assert!(glob_match("a?c", "abc"));
    }

    #[test]
    fn test_scan_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.go", "package main");
        write(dir.path(), "main_test.go", "package main");
        write(dir.path(), "pkg/util.go", "package pkg");
        write(dir.path(), "vendor/dep/dep.go", "package dep");
        write(dir.path(), "README.md", "docs");

        let result = scan_paths(&[dir.path().to_path_buf()], &ScanOptions::default());
        let names: Vec<String> = result.files.iter().map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/")).collect();
        assert_eq!(names, vec!["main.go", "pkg/util.go"]);
        assert_eq!(result.excluded, 1);
    }

    #[test]
    fn test_scan_options() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.go", "package a");
        write(dir.path(), "a_test.go", "package a");
        write(dir.path(), "sub/b.go", "package b");

        let options = ScanOptions {
            recursive: false,
            include_tests: true,
            ..ScanOptions::default()
        };
        let result = scan_paths(&[dir.path().to_path_buf()], &options);
        assert_eq!(result.files.len(), 2);
    }

    #[test]
    fn test_missing_path_is_reported() {
        let result = scan_paths(&[PathBuf::from("/definitely/not/here.go")], &ScanOptions::default());
        assert!(result.files.is_empty());
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].category, Category::IoError);
    }

    #[test]
    fn test_large_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "big.go", &"x".repeat(4096));
        let options = ScanOptions {
            max_file_size_kb: 1,
            ..ScanOptions::default()
        };
        let result = scan_paths(&[dir.path().to_path_buf()], &options);
        assert!(result.files.is_empty());
        assert_eq!(result.findings[0].severity, Severity::Info);
    }
}
