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

//! End-to-end scenarios through the public API

use fv_analyzer::cfg::build_cfg;
use fv_analyzer::optimization::{BoundsVerdict, EscapeSummaries, EscapeVerdict, InlineDecision, OptimizationAnalyzer, OptimizationReport};
use fv_analyzer::{Category, Engine, EngineConfig, FunctionContext, OutputFormat, Program, Report, Severity, SourceMap};
use std::fs;

fn analyze(text: &str) -> Report {
    let mut sources = SourceMap::new();
    sources.add("main.go", text);
    Engine::new(EngineConfig::default().with_workers(2)).run_sources(sources).unwrap()
}

fn count(report: &Report, category: Category) -> usize {
    report.findings.iter().filter(|f| f.category == category).count()
}

fn optimize(text: &str, func: &str) -> OptimizationReport {
    let (program, _) = Program::from_source("t.go", text);
    let summaries = EscapeSummaries::compute(&program);
    let unit = program.unit(program.func_named(func).unwrap()).unwrap();
    let cfg = build_cfg(&program.info, unit);
    let ctx = FunctionContext::new(&program, unit, &cfg);
    OptimizationAnalyzer::new().analyze(&ctx, &summaries).unwrap()
}

const RACE: &str = "package main\n\nimport (\n\t\"fmt\"\n\t\"sync\"\n)\n\nfunc main() {\n\tcounter := 0\n\tvar wg sync.WaitGroup\n\twg.Add(2)\n\tfor i := 0; i < 2; i++ {\n\t\tgo func() {\n\t\t\tdefer wg.Done()\n\t\t\tcounter++\n\t\t}()\n\t}\n\twg.Wait()\n\tfmt.Println(counter)\n}\n";

#[test]
fn test_race_on_shared_counter() {
    let report = analyze(RACE);
    assert_eq!(count(&report, Category::DataRace), 1, "{:?}", report.findings);
    let race = report.findings.iter().find(|f| f.category == Category::DataRace).unwrap();
    assert_eq!(race.severity, Severity::Error);
    assert_eq!(race.location.line, 15);
    assert!(report.has_errors());
}

#[test]
fn test_unbuffered_send_deadlocks() {
    let report = analyze("package main\n\nimport \"fmt\"\n\nfunc main() {\n\tch := make(chan int)\n\tch <- 42\n\tfmt.Println(<-ch)\n}\n");
    assert_eq!(count(&report, Category::ChannelDeadlock), 1, "{:?}", report.findings);
    let deadlock = report.findings.iter().find(|f| f.category == Category::ChannelDeadlock).unwrap();
    assert_eq!(deadlock.location.line, 7);
    assert!(report.has_errors());
}

#[test]
fn test_goroutine_leak_on_unclosed_channel() {
    let report = analyze("package main\n\nimport \"fmt\"\n\nfunc main() {\n\tch := make(chan int)\n\tgo func() {\n\t\tfor v := range ch {\n\t\t\tfmt.Println(v)\n\t\t}\n\t}()\n\tch <- 1\n\tch <- 2\n}\n");
    let leaks: Vec<_> = report.findings.iter().filter(|f| f.category == Category::GoroutineLeak).collect();
    assert_eq!(leaks.len(), 1, "{:?}", report.findings);
    assert_eq!(leaks[0].severity, Severity::Warning);
    assert_eq!(leaks[0].location.line, 7);
}

#[test]
fn test_inline_decisions() {
    let add = optimize("package main\n\nfunc add(a, b int) int {\n\treturn a + b\n}\n", "add").inline.unwrap();
    assert_eq!(add.cost, 2);
    assert_eq!(add.decision, InlineDecision::Inlinable);
    assert_eq!(add.reasons, vec!["small leaf".to_string()]);

    let fact = optimize("package main\n\nfunc fact(n int) int {\n\tif n <= 1 {\n\t\treturn 1\n\t}\n\treturn n * fact(n-1)\n}\n", "fact").inline.unwrap();
    assert_eq!(fact.decision, InlineDecision::NotInlinable);
    assert_eq!(fact.reasons, vec!["direct recursion".to_string()]);
}

#[test]
fn test_escape_verdicts() {
    let types = "package main\n\ntype T struct{ n int }\n\n";
    let heap = optimize(&format!("{}func build() *T {{\n\treturn &T{{n: 1}}\n}}\n", types), "build");
    assert_eq!(heap.escapes.len(), 1);
    assert_eq!(heap.escapes[0].verdict, EscapeVerdict::Heap);
    assert_eq!(heap.escapes[0].reason, "address returned");

    let stack = optimize(&format!("{}func local() int {{\n\tt := T{{n: 1}}\n\tt.n++\n\treturn t.n\n}}\n", types), "local");
    assert_eq!(stack.escapes.len(), 1);
    assert_eq!(stack.escapes[0].verdict, EscapeVerdict::Stack);
    assert!(!stack.escapes[0].chain.is_empty());
}

#[test]
fn test_bounds_checks() {
    let ranged = optimize("package main\n\nfunc f(a []int) {\n\tfor i := range a {\n\t\t_ = a[i]\n\t}\n}\n", "f");
    assert_eq!(ranged.bounds.len(), 1);
    assert_eq!(ranged.bounds[0].verdict, BoundsVerdict::Eliminable);

    let unchecked = optimize("package main\n\nfunc f(a []int, i int) int {\n\treturn a[i]\n}\n", "f");
    assert_eq!(unchecked.bounds.len(), 1);
    assert_eq!(unchecked.bounds[0].verdict, BoundsVerdict::Required);
}

#[test]
fn test_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let report = Engine::new(EngineConfig::default().with_workers(1)).run(&[dir.path().to_path_buf()]).unwrap();
    assert!(report.findings.is_empty());
    assert!(report.inputs.is_empty());
    assert_eq!(report.score, 100);
    assert!(!report.has_errors());
}

#[test]
fn test_infinite_loop_is_not_a_type_error() {
    let source = "package main\n\nfunc spin() {\n\tn := 0\n\tfor {\n\t\tn++\n\t}\n}\n";
    let report = analyze(source);
    assert_eq!(count(&report, Category::Progress), 0);
    assert_eq!(count(&report, Category::Preservation), 0);

    let (program, _) = Program::from_source("main.go", source);
    let unit = program.unit(program.func_named("spin").unwrap()).unwrap();
    let cfg = build_cfg(&program.info, unit);
    assert!(cfg.non_terminating);
    assert!(cfg.predecessors(cfg.exit).is_empty());
}

#[test]
fn test_repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("race.go"), RACE).unwrap();
    fs::write(dir.path().join("util.go"), "package main\n\nfunc get(a []int, i int) int {\n\treturn a[i]\n}\n\nfunc fact(n int) int {\n\tif n <= 1 {\n\t\treturn 1\n\t}\n\treturn n * fact(n-1)\n}\n").unwrap();
    let paths = [dir.path().to_path_buf()];

    let single = Engine::new(EngineConfig::default().with_workers(1)).run(&paths).unwrap();
    let parallel = Engine::new(EngineConfig::default().with_workers(4)).run(&paths).unwrap();
    let again = Engine::new(EngineConfig::default().with_workers(4)).run(&paths).unwrap();
    let json = single.render(OutputFormat::Json).unwrap();
    assert_eq!(json, parallel.render(OutputFormat::Json).unwrap());
    assert_eq!(json, again.render(OutputFormat::Json).unwrap());
}

#[test]
fn test_comments_and_whitespace_do_not_change_findings() {
    let plain = "package main\n\nfunc f(a []int, i int) int {\n\tx := 1\n\tx = 2\n\treturn a[i] + x\n}\n\nfunc g(s string) int {\n\treturn s\n}\n";
    let noisy = "package main   \n\nfunc f(a []int, i int) int { // index\n\tx := 1   \n\tx = 2\t\n\treturn a[i] + x\n}\n\nfunc g(s string) int { // mismatch\n\treturn s  \n}\n";
    let key = |report: &Report| -> Vec<(usize, usize, Category, Severity, String)> {
        report
            .findings
            .iter()
            .map(|f| (f.location.line, f.location.column, f.category, f.severity, f.message.clone()))
            .collect()
    };
    let before = analyze(plain);
    assert!(!before.findings.is_empty());
    assert_eq!(key(&before), key(&analyze(noisy)));
}

#[test]
fn test_enable_order_does_not_change_findings() {
    use fv_analyzer::AnalysisKind;
    let mut sources = SourceMap::new();
    sources.add("main.go", RACE);
    let first = EngineConfig::default()
        .with_only([])
        .with_analysis(AnalysisKind::Concurrency, true)
        .with_analysis(AnalysisKind::Dataflow, true);
    let second = EngineConfig::default()
        .with_only([])
        .with_analysis(AnalysisKind::Dataflow, true)
        .with_analysis(AnalysisKind::Concurrency, true);
    let a = Engine::new(first.with_workers(2)).run_sources(sources.clone()).unwrap();
    let b = Engine::new(second.with_workers(2)).run_sources(sources).unwrap();
    assert_eq!(a.findings, b.findings);
}

#[test]
fn test_severity_filter() {
    let mut sources = SourceMap::new();
    sources.add("main.go", RACE);
    let report = Engine::new(EngineConfig::default().with_severity_min(Severity::Error).with_workers(1)).run_sources(sources).unwrap();
    assert!(!report.findings.is_empty());
    assert!(report.findings.iter().all(|f| f.severity == Severity::Error));
}

#[test]
fn test_cache_hit_reproduces_report() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("main.go"), RACE).unwrap();
    let cache = fv_analyzer::ReportCache::new(dir.path().join("cache"));
    let engine = Engine::new(EngineConfig::default().with_workers(1)).with_cache(Some(cache));

    let first = engine.run(&[src.clone()]).unwrap();
    assert_eq!(fs::read_dir(dir.path().join("cache")).unwrap().count(), 1);
    let second = engine.run(&[src]).unwrap();
    assert_eq!(first, second);
}
