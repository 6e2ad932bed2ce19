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

//! Property tests over generated programs

use fv_analyzer::cfg::{CfgMap, build_cfg};
use fv_analyzer::concurrency::{ConcurrencyAnalyzer, HappensBefore, ProgramOrder};
use fv_analyzer::dataflow::{DEFAULT_ITERATION_CAP, DataFlowAnalyzer};
use fv_analyzer::optimization::InlineAnalyzer;
use fv_analyzer::{Analyzer, FunctionContext, Program};
use proptest::prelude::*;

const OPS: [&str; 7] = ["x++", "ch <- 1", "<-ch", "mu.Lock()", "mu.Unlock()", "_ = x", "wg.Done()"];

fn concurrent_program(main_ops: &[usize], workers: &[Vec<usize>], buffered: bool) -> String {
    let mut out = String::from("package main\n\nimport \"sync\"\n\nfunc main() {\n\tx := 0\n");
    out.push_str(if buffered { "\tch := make(chan int, 1)\n" } else { "\tch := make(chan int)\n" });
    out.push_str("\tvar mu sync.Mutex\n\tvar wg sync.WaitGroup\n");
    out.push_str(&format!("\twg.Add({})\n", workers.len()));
    for ops in workers {
        out.push_str("\tgo func() {\n");
        for &op in ops {
            out.push_str(&format!("\t\t{}\n", OPS[op]));
        }
        out.push_str("\t}()\n");
    }
    for &op in main_ops {
        out.push_str(&format!("\t{}\n", OPS[op]));
    }
    out.push_str("\twg.Wait()\n}\n");
    out
}

const STMTS: [&str; 6] = ["s += a", "if a > s {\n\t\ts = a\n\t}", "for i := 0; i < a; i++ {\n\t\ts += i\n\t}", "s = s * 2", "a--", "s = helper(s)"];

fn function_body(stmts: &[usize], layout: u8) -> String {
    let mut out = String::from("package main\n\nfunc helper(v int) int {\n\treturn v\n}\n\n");
    if layout & 1 == 1 {
        out.push_str("// f is generated\n");
    }
    out.push_str("func f(a int) int {\n\ts := 0\n");
    for (index, &stmt) in stmts.iter().enumerate() {
        if layout & 2 == 2 {
            out.push_str(&format!("\t// step {}\n", index));
        }
        if layout & 4 == 4 {
            out.push('\n');
        }
        out.push('\t');
        out.push_str(STMTS[stmt]);
        out.push('\n');
    }
    out.push_str("\treturn s\n}\n");
    out
}

fn cfgs(program: &Program) -> CfgMap<'_> {
    program.units().into_iter().map(|unit| (unit.id, build_cfg(&program.info, unit))).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn happens_before_is_strict_partial_order(
        main_ops in prop::collection::vec(0..OPS.len(), 0..5),
        workers in prop::collection::vec(prop::collection::vec(0..OPS.len(), 1..5), 1..3),
        buffered in any::<bool>(),
    ) {
        let source = concurrent_program(&main_ops, &workers, buffered);
        let (program, problems) = Program::from_source("main.go", &source);
        prop_assert!(problems.is_empty(), "{:?}", problems);
        let cfgs = cfgs(&program);
        let root = program.func_named("main").unwrap();
        let model = ConcurrencyAnalyzer::new().model(&program, &cfgs, root);
        let order = ProgramOrder::new(&model, &cfgs);
        let hb = HappensBefore::compute(&model, &order);
        let count = model.events.len();
        for a in 0..count {
            prop_assert!(!hb.ordered(a, a));
            for b in 0..count {
                if hb.ordered(a, b) {
                    prop_assert!(!hb.ordered(b, a));
                    for c in 0..count {
                        if hb.ordered(b, c) {
                            prop_assert!(hb.ordered(a, c));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn inline_cost_ignores_layout(stmts in prop::collection::vec(0..STMTS.len(), 0..8), layout in 1u8..8) {
        let cost = |source: &str| {
            let (program, _) = Program::from_source("t.go", source);
            let id = program.func_named("f").unwrap();
            let unit = program.unit(id).unwrap();
            InlineAnalyzer::new().evaluate(&program.info, id, unit.body)
        };
        let plain = cost(&function_body(&stmts, 0));
        let spaced = cost(&function_body(&stmts, layout));
        prop_assert_eq!(plain.cost, spaced.cost);
        prop_assert_eq!(plain.decision, spaced.decision);
    }

    #[test]
    fn dataflow_converges_within_cap(stmts in prop::collection::vec(0..STMTS.len(), 0..10)) {
        let source = function_body(&stmts, 0);
        let (program, _) = Program::from_source("t.go", &source);
        let unit = program.unit(program.func_named("f").unwrap()).unwrap();
        let cfg = build_cfg(&program.info, unit);
        let ctx = FunctionContext::new(&program, unit, &cfg);
        let report = DataFlowAnalyzer::new().analyze(&ctx).unwrap();
        prop_assert!(report.liveness.converged);
        prop_assert!(report.reaching.converged);
        prop_assert!(report.available.converged);
        prop_assert!(report.liveness.iterations <= DEFAULT_ITERATION_CAP);
    }
}
