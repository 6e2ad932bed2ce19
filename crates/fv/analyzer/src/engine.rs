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

//! Analysis engine
//!
//! Drives one run: scan and load the inputs, build every CFG, run the
//! enabled analyses on a worker pool and aggregate the findings.
//!
//! The whole run, parsing included, happens on a `rayon` pool whose threads
//! get [`WORKER_STACK_SIZE`] bytes of stack, so nesting up to the parser's
//! depth limit is safe in every recursive pass.
//!
//! Per-function work is distributed over that pool. Each analysis of a
//! function runs under `catch_unwind`; a crash becomes an `internal-error`
//! finding and the function is skipped by the remaining phases. Results of a
//! phase are flushed to the aggregator in function id order so repeated runs
//! produce the same report.

use crate::analysis::{Analyzer, FunctionContext};
use crate::cache::ReportCache;
use crate::cfg::{Cfg, CfgMap, build_cfg, cfg_findings, dot, metric_findings};
use crate::concurrency::ConcurrencyAnalyzer;
use crate::config::{AnalysisKind, EngineConfig};
use crate::dataflow::DataFlowAnalyzer;
use crate::frontend::scanner::scan_paths;
use crate::frontend::types::FuncId;
use crate::frontend::{FunctionUnit, Program, SourceMap};
use crate::optimization::{EscapeSummaries, OptimizationAnalyzer};
use crate::report::{Report, ReportAggregator};
use crate::verifier::TypeVerifier;
use fv_common::{CancellationToken, Category, Finding, FvError, FvResult, Location, Phase, ProgressReporter, Severity};
use rayon::prelude::*;
use std::any::Any;
use std::collections::BTreeSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

/// Stack size of the engine's worker threads
pub const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Runs the analyses configured by an [`EngineConfig`]
pub struct Engine {
    config: EngineConfig,
    progress: ProgressReporter,
    cancel: CancellationToken,
    cache: Option<ReportCache>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            progress: ProgressReporter::disabled(),
            cancel: CancellationToken::new(),
            cache: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_cache(mut self, cache: Option<ReportCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Analyze files and directories
    pub fn run(&self, paths: &[PathBuf]) -> FvResult<Report> {
        self.config.validate()?;
        self.in_pool(|| self.run_in_pool(paths))
    }

    fn run_in_pool(&self, paths: &[PathBuf]) -> FvResult<Report> {
        let scan = scan_paths(paths, &self.config.scan);
        info!(files = scan.files.len(), excluded = scan.excluded, "inputs scanned");

        let key = match &self.cache {
            Some(cache) => Some(cache.key(&scan.files, &self.config)?),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(report) = cache.load(key) {
                info!(key = %key, "report cache hit");
                return Ok(report);
            }
        }

        let total = scan.files.len();
        self.progress.emit(Phase::Parse, 0, total, "parsing sources");
        let (program, mut loaded) = Program::load(&scan.files, &self.config.build);
        self.progress.emit(Phase::Parse, total, total, "sources parsed");

        let mut findings = scan.findings;
        findings.append(&mut loaded);
        let inputs = scan.files.iter().map(|path| path.display().to_string()).collect();
        let report = self.analyze_in_pool(&program, findings, inputs)?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if !report.cancelled {
                if let Err(err) = cache.store(key, &report) {
                    warn!(error = %err, "failed to store report in cache");
                }
            }
        }
        Ok(report)
    }

    /// Analyze sources held in memory
    pub fn run_sources(&self, sources: SourceMap) -> FvResult<Report> {
        self.config.validate()?;
        self.in_pool(|| {
            let total = sources.len();
            self.progress.emit(Phase::Parse, 0, total, "parsing sources");
            let (program, findings) = Program::build(sources, &self.config.build);
            self.progress.emit(Phase::Parse, total, total, "sources parsed");
            let inputs = program.inputs();
            self.analyze_in_pool(&program, findings, inputs)
        })
    }

    /// Analyze a loaded program; `findings` are frontend findings to keep
    pub fn analyze(&self, program: &Program, findings: Vec<Finding>) -> FvResult<Report> {
        self.in_pool(|| self.analyze_in_pool(program, findings, program.inputs()))
    }

    fn in_pool<T: Send>(&self, job: impl FnOnce() -> FvResult<T> + Send) -> FvResult<T> {
        let workers = self.config.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .stack_size(WORKER_STACK_SIZE)
            .thread_name(|index| format!("fv-worker-{}", index))
            .build()
            .map_err(|err| FvError::internal("engine", format!("failed to start worker pool: {}", err)))?;
        debug!(workers, "worker pool started");
        pool.install(job)
    }

    fn analyze_in_pool(&self, program: &Program, findings: Vec<Finding>, inputs: Vec<String>) -> FvResult<Report> {
        let config = &self.config;
        let aggregator = ReportAggregator::new();
        aggregator.flush(findings);

        let units = program.units();
        let mut failed: BTreeSet<FuncId> = BTreeSet::new();
        self.progress.emit(Phase::Type, units.len(), units.len(), "types checked");

        let cfgs = self.build_cfgs(program, &units, &aggregator, &mut failed);
        if let Some(dir) = &config.emit_cfg {
            write_dot_files(dir, program, &units, &cfgs)?;
        }

        if config.is_enabled(AnalysisKind::Cfg) {
            let rules = &config.rules;
            self.sweep(Phase::Cfg, AnalysisKind::Cfg, program, &units, &cfgs, &aggregator, &mut failed, |ctx| {
                let mut findings = cfg_findings(ctx.cfg, ctx.program, config.complexity_threshold);
                findings.extend(metric_findings(&ctx.unit, ctx.program, &config.metric_limits));
                Ok(findings
                    .into_iter()
                    .filter(|f| match f.category {
                        Category::Complexity => rules.complexity,
                        Category::UnreachableCode => rules.unreachable_code,
                        _ => true,
                    })
                    .collect())
            });
        }

        if config.is_enabled(AnalysisKind::Dataflow) {
            let analyzer = DataFlowAnalyzer::new()
                .with_iteration_cap(config.iteration_cap)
                .with_unused_detection(config.rules.unused_assignments)
                .with_redundant_detection(config.rules.redundant_expressions);
            self.sweep(Phase::Dataflow, AnalysisKind::Dataflow, program, &units, &cfgs, &aggregator, &mut failed, |ctx| {
                analyzer.analyze(ctx).map(|report| report.findings)
            });
        }

        if config.is_enabled(AnalysisKind::Concurrency) && !self.cancel.is_cancelled() {
            self.progress.emit(Phase::Concurrency, 0, 1, "modeling goroutines");
            let analyzer = ConcurrencyAnalyzer::new()
                .with_iteration_cap(config.iteration_cap)
                .with_precise_dispatch(config.precise_dispatch)
                .with_race_detection(config.rules.data_races)
                .with_deadlock_detection(config.rules.deadlocks)
                .with_leak_detection(config.rules.goroutine_leaks)
                .with_lock_order_detection(config.rules.lock_order);
            match guarded(|| analyzer.analyze(program, &cfgs)) {
                Ok(report) => {
                    info!(roots = report.roots.len(), goroutines = report.goroutines, events = report.events, "concurrency analysis complete");
                    aggregator.flush(report.findings);
                }
                Err(message) => aggregator.flush(vec![program_failure(AnalysisKind::Concurrency, &inputs, message)]),
            }
            self.progress.emit(Phase::Concurrency, 1, 1, "concurrency analyzed");
        }

        if config.is_enabled(AnalysisKind::Optimization) && !self.cancel.is_cancelled() {
            match guarded(|| Ok(EscapeSummaries::compute(program))) {
                Ok(summaries) => {
                    debug!(rounds = summaries.rounds(), "escape summaries computed");
                    let analyzer = OptimizationAnalyzer::new()
                        .with_inline_threshold(config.inline_threshold)
                        .with_escape_analysis(config.rules.escape)
                        .with_inline_analysis(config.rules.inlining)
                        .with_bounds_check_analysis(config.rules.bounds_checks);
                    self.sweep(Phase::Optimization, AnalysisKind::Optimization, program, &units, &cfgs, &aggregator, &mut failed, |ctx| {
                        analyzer.analyze(ctx, &summaries).map(|report| report.findings)
                    });
                }
                Err(message) => aggregator.flush(vec![program_failure(AnalysisKind::Optimization, &inputs, message)]),
            }
        }

        if config.is_enabled(AnalysisKind::Types) && !self.cancel.is_cancelled() {
            let verifier = TypeVerifier::new()
                .with_progress(config.rules.progress)
                .with_preservation(config.rules.preservation)
                .with_generics(config.rules.generics)
                .with_type_assertions(config.rules.type_assertions);
            match guarded(|| Ok(verifier.verify_program(program))) {
                Ok(findings) => aggregator.flush(findings),
                Err(message) => aggregator.flush(vec![program_failure(AnalysisKind::Types, &inputs, message)]),
            }
            self.sweep(Phase::Verify, AnalysisKind::Types, program, &units, &cfgs, &aggregator, &mut failed, |ctx| {
                verifier.analyze(ctx).map(|report| report.findings)
            });
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            warn!(reason = ?self.cancel.reason(), "analysis cancelled, report holds completed functions only");
        }
        self.progress.emit(Phase::Aggregate, 0, 1, "aggregating findings");
        let report = aggregator.finish(inputs, units.len(), failed.len(), config.severity_min, cancelled);
        self.progress.emit(Phase::Aggregate, 1, 1, "report ready");
        info!(findings = report.findings.len(), score = report.score, failed = failed.len(), "analysis complete");
        Ok(report)
    }

    fn build_cfgs<'p>(&self, program: &'p Program, units: &[FunctionUnit<'p>], aggregator: &ReportAggregator, failed: &mut BTreeSet<FuncId>) -> CfgMap<'p> {
        let built: Vec<Result<Cfg<'p>, String>> = units.par_iter().map(|unit| guarded(|| Ok(build_cfg(&program.info, *unit)))).collect();
        let mut cfgs = CfgMap::new();
        for (unit, outcome) in units.iter().zip(built) {
            match outcome {
                Ok(cfg) => {
                    cfgs.insert(unit.id, cfg);
                }
                Err(message) => {
                    failed.insert(unit.id);
                    aggregator.flush(vec![function_failure(program, unit.id, AnalysisKind::Cfg, message)]);
                }
            }
        }
        self.progress.emit(Phase::Cfg, cfgs.len(), units.len(), "control-flow graphs built");
        cfgs
    }

    /// Run one per-function analysis over every unit
    ///
    /// Functions that failed in an earlier phase are skipped. After
    /// cancellation no new function is started.
    #[allow(clippy::too_many_arguments)]
    fn sweep<F>(
        &self,
        phase: Phase,
        kind: AnalysisKind,
        program: &Program,
        units: &[FunctionUnit<'_>],
        cfgs: &CfgMap<'_>,
        aggregator: &ReportAggregator,
        failed: &mut BTreeSet<FuncId>,
        work: F,
    ) where
        F: Fn(&FunctionContext<'_>) -> FvResult<Vec<Finding>> + Sync,
    {
        let total = units.len();
        let done = AtomicUsize::new(0);
        let skipped: &BTreeSet<FuncId> = failed;
        let results: Vec<Option<(FuncId, Result<Vec<Finding>, String>)>> = units
            .par_iter()
            .map(|unit| {
                if self.cancel.is_cancelled() || skipped.contains(&unit.id) {
                    return None;
                }
                let cfg = cfgs.get(&unit.id)?;
                let ctx = FunctionContext::new(program, *unit, cfg);
                let outcome = guarded(|| work(&ctx));
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                self.progress.emit(phase, current, total, ctx.name());
                Some((unit.id, outcome))
            })
            .collect();

        for (func, outcome) in results.into_iter().flatten() {
            match outcome {
                Ok(findings) => aggregator.flush(findings),
                Err(message) => {
                    failed.insert(func);
                    aggregator.flush(vec![function_failure(program, func, kind, message)]);
                }
            }
        }
        debug!(phase = %phase.as_str(), functions = total, analyzed = done.load(Ordering::Relaxed), "phase complete");
    }
}

/// Run analysis code, turning errors and panics into a message
fn guarded<T>(work: impl FnOnce() -> FvResult<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

fn function_failure(program: &Program, func: FuncId, kind: AnalysisKind, message: String) -> Finding {
    let info = program.info.func(func);
    let location = program.location(info.span);
    error!(
        function = %info.name,
        file = %location.path,
        analysis = %kind,
        error = %message,
        "internal failure, function skipped; reproduce with `fv --enable {} {}`",
        kind,
        location.path
    );
    Finding::new(Category::InternalError, Severity::Warning, location.clone(), format!("{} analysis of '{}' failed: {}", kind, info.name, message))
        .with_suggestion(format!("reproduce with `fv --enable {} {}`", kind, location.path))
}

fn program_failure(kind: AnalysisKind, inputs: &[String], message: String) -> Finding {
    let path = inputs.first().cloned().unwrap_or_default();
    error!(analysis = %kind, error = %message, "internal failure in program-wide analysis");
    Finding::new(Category::InternalError, Severity::Warning, Location::file(path), format!("{} analysis failed: {}", kind, message))
        .with_suggestion(format!("reproduce with `fv --enable {} {}`", kind, inputs.join(" ")))
}

fn write_dot_files(dir: &Path, program: &Program, units: &[FunctionUnit<'_>], cfgs: &CfgMap<'_>) -> FvResult<()> {
    fs::create_dir_all(dir).map_err(|err| FvError::io(dir, err))?;
    for unit in units {
        if let Some(cfg) = cfgs.get(&unit.id) {
            let path = dir.join(dot::dot_file_name(cfg));
            fs::write(&path, dot::to_dot(cfg, program)).map_err(|err| FvError::io(&path, err))?;
        }
    }
    info!(dir = %dir.display(), functions = cfgs.len(), "control-flow graphs written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, config: EngineConfig) -> Report {
        let mut sources = SourceMap::new();
        sources.add("main.go", text);
        Engine::new(config.with_workers(2)).run_sources(sources).unwrap()
    }

    #[test]
    fn test_empty_program_scores_100() {
        let report = Engine::new(EngineConfig::default().with_workers(1)).run_sources(SourceMap::new()).unwrap();
        assert!(report.findings.is_empty());
        assert_eq!(report.score, 100);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_disabled_analysis_produces_no_findings() {
        let source = "package main\n\nfunc f(s string) int {\n\treturn s\n}\n";
        let report = run(source, EngineConfig::default());
        assert!(report.findings.iter().any(|f| f.category == Category::Preservation));

        let report = run(source, EngineConfig::default().with_analysis(AnalysisKind::Types, false));
        assert!(report.findings.iter().all(|f| f.category != Category::Preservation));
    }

    #[test]
    fn test_metric_limits_report_complexity() {
        let source = "package main\n\nfunc f(a, b, c, d, e, g int) int {\n\treturn a + b + c + d + e + g\n}\n";
        let report = run(source, EngineConfig::default());
        let complexity: Vec<&Finding> = report.findings.iter().filter(|f| f.category == Category::Complexity).collect();
        assert_eq!(complexity.len(), 1);
        assert!(complexity[0].message.contains("takes 6 parameters"));

        let rules = crate::config::RuleToggles {
            complexity: false,
            ..Default::default()
        };
        let report = run(source, EngineConfig::default().with_rules(rules));
        assert!(report.findings.iter().all(|f| f.category != Category::Complexity));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel(Some("test"));
        let mut sources = SourceMap::new();
        sources.add("main.go", "package main\n\nfunc f(s string) int {\n\treturn s\n}\n");
        let report = Engine::new(EngineConfig::default().with_workers(1)).with_cancellation(cancel).run_sources(sources).unwrap();
        assert!(report.cancelled);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_guarded_catches_panics() {
        let outcome: Result<(), String> = guarded(|| panic!("unexpected shape"));
        assert_eq!(outcome.unwrap_err(), "unexpected shape");
        let outcome: Result<u32, String> = guarded(|| Err(FvError::internal("f", "bad")));
        assert!(outcome.unwrap_err().contains("bad"));
    }

    #[test]
    fn test_progress_events_cover_phases() {
        let progress = ProgressReporter::new(1024);
        let mut receiver = progress.subscribe().unwrap();
        let mut sources = SourceMap::new();
        sources.add("main.go", "package main\n\nfunc main() {\n\tx := 1\n\t_ = x\n}\n");
        Engine::new(EngineConfig::default().with_workers(1)).with_progress(progress).run_sources(sources).unwrap();
        let mut phases = std::collections::HashSet::new();
        while let Ok(event) = receiver.try_recv() {
            phases.insert(event.phase);
        }
        assert!(phases.contains(&Phase::Parse));
        assert!(phases.contains(&Phase::Dataflow));
        assert!(phases.contains(&Phase::Verify));
        assert!(phases.contains(&Phase::Aggregate));
    }

    #[test]
    fn test_deeply_nested_expression_is_analyzed() {
        let nested = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        let source = format!("package main\n\nfunc f() int {{\n\tx := {}\n\treturn x\n}}\n", nested);
        let report = run(&source, EngineConfig::default());
        assert!(report.findings.iter().all(|f| f.category != Category::ParseError && f.category != Category::InternalError), "{:?}", report.findings);
        assert_eq!(report.stats.failed_functions, 0);
    }

    #[test]
    fn test_nesting_past_the_limit_is_a_parse_error() {
        let nested = format!("{}1{}", "(".repeat(2000), ")".repeat(2000));
        let source = format!("package main\n\nfunc f() int {{\n\treturn {}\n}}\n", nested);
        let report = run(&source, EngineConfig::default());
        assert!(report.findings.iter().any(|f| f.category == Category::ParseError));
    }

    #[test]
    fn test_emit_cfg_writes_dot_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cfg");
        run("package main\n\nfunc a() {}\n\nfunc b() {}\n", EngineConfig::default().with_emit_cfg(Some(target.clone())));
        let count = fs::read_dir(&target).unwrap().count();
        assert_eq!(count, 2);
    }
}
