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

//! Tests of the `fv` binary

use fv_analyzer::Report;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const RACE: &str = "package main\n\nimport (\n\t\"fmt\"\n\t\"sync\"\n)\n\nfunc main() {\n\tcounter := 0\n\tvar wg sync.WaitGroup\n\twg.Add(2)\n\tfor i := 0; i < 2; i++ {\n\t\tgo func() {\n\t\t\tdefer wg.Done()\n\t\t\tcounter++\n\t\t}()\n\t}\n\twg.Wait()\n\tfmt.Println(counter)\n}\n";

const CLEAN: &str = "package main\n\nfunc add(a, b int) int {\n\treturn a + b\n}\n";

fn fv(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fv"))
        .args(args)
        .current_dir(dir)
        .env_remove("FV_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_race_exits_with_findings() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("race.go"), RACE).unwrap();
    let output = fv(&["race.go"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("race.go:15:"), "{}", stdout);
    assert!(stdout.contains("error data-race:"), "{}", stdout);
}

#[test]
fn test_clean_source_exits_zero() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("add.go"), CLEAN).unwrap();
    let output = fv(&["--severity-min", "warning", "add.go"], dir.path());
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stdout));
}

#[test]
fn test_empty_directory_scores_100() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("empty")).unwrap();
    let output = fv(&["--format", "json", "empty"], dir.path());
    assert_eq!(output.status.code(), Some(0));
    let report: Report = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report.findings.is_empty());
    assert_eq!(report.score, 100);
    assert!(!report.cancelled);
}

#[test]
fn test_json_output_is_reproducible() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("race.go"), RACE).unwrap();
    fs::write(dir.path().join("add.go"), CLEAN).unwrap();
    fv(&["--format", "json", "--output", "first.json", "race.go", "add.go"], dir.path());
    fv(&["--format", "json", "--output", "second.json", "--workers", "3", "race.go", "add.go"], dir.path());
    let first = fs::read(dir.path().join("first.json")).unwrap();
    assert_eq!(first, fs::read(dir.path().join("second.json")).unwrap());
    let report: Report = serde_json::from_slice(&first).unwrap();
    assert_eq!(report.inputs, vec!["race.go".to_string(), "add.go".to_string()]);
    assert!(report.has_errors());
}

#[test]
fn test_invocation_errors_exit_two() {
    let dir = tempdir().unwrap();
    assert_eq!(fv(&[], dir.path()).status.code(), Some(2));
    assert_eq!(fv(&["--format", "xml", "a.go"], dir.path()).status.code(), Some(2));
    assert_eq!(fv(&["--config", "missing.toml", "a.go"], dir.path()).status.code(), Some(2));
    assert_eq!(fv(&["--pointer-width", "16", "a.go"], dir.path()).status.code(), Some(2));
}

#[test]
fn test_print_config_merges_file_and_flags() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("fv.toml"), "[analysis]\nworkers = 5\n\n[output]\nformat = \"markdown\"\n").unwrap();
    let output = fv(&["--config", "fv.toml", "--format", "json", "--print-config"], dir.path());
    assert_eq!(output.status.code(), Some(0));
    let printed: fv_tools::FvConfig = toml::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(printed.analysis.workers, 5);
    assert_eq!(printed.output.format, fv_analyzer::OutputFormat::Json);
}

#[test]
fn test_quality_gate_from_config() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("race.go"), RACE).unwrap();
    fs::write(dir.path().join("fv.toml"), "[output]\nfail_on_error = false\nmin_quality_score = 101\n").unwrap();
    let output = fv(&["--config", "fv.toml", "race.go"], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_emit_cfg_and_cache() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("add.go"), CLEAN).unwrap();
    let output = fv(&["--emit-cfg", "graphs", "--cache-dir", "cache", "add.go"], dir.path());
    assert_eq!(output.status.code(), Some(0));
    let graphs: Vec<_> = fs::read_dir(dir.path().join("graphs")).unwrap().collect();
    assert_eq!(graphs.len(), 1);
    let dot = fs::read_to_string(graphs[0].as_ref().unwrap().path()).unwrap();
    assert!(dot.starts_with("digraph"));
    assert_eq!(fs::read_dir(dir.path().join("cache")).unwrap().count(), 1);

    let again = fv(&["--cache-dir", "cache", "add.go"], dir.path());
    assert_eq!(again.stdout, output.stdout);
}
