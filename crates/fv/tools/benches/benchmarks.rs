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

use criterion::{Criterion, criterion_group, criterion_main};
use fv_analyzer::{Engine, EngineConfig, SourceMap};
use std::hint::black_box;

const PROGRAM: &str = "package main

import (
\t\"fmt\"
\t\"sync\"
)

type Point struct{ x, y int }

func add(a, b int) int {
\treturn a + b
}

func sum(xs []int) int {
\ttotal := 0
\tfor i := range xs {
\t\ttotal = add(total, xs[i])
\t}
\treturn total
}

func origin() *Point {
\treturn &Point{}
}

func main() {
\tvar mu sync.Mutex
\tvar wg sync.WaitGroup
\tcounter := 0
\tresults := make(chan int, 4)
\tfor i := 0; i < 4; i++ {
\t\twg.Add(1)
\t\tgo func(n int) {
\t\t\tdefer wg.Done()
\t\t\tmu.Lock()
\t\t\tcounter += n
\t\t\tmu.Unlock()
\t\t\tresults <- sum([]int{n, n})
\t\t}(i)
\t}
\twg.Wait()
\tclose(results)
\tfor r := range results {
\t\tfmt.Println(r, origin().x)
\t}
}
";

fn sources(copies: usize) -> SourceMap {
    let mut sources = SourceMap::new();
    for index in 0..copies {
        let text = PROGRAM.replace("package main", &format!("package p{}", index));
        sources.add(format!("p{}/main.go", index), text);
    }
    sources
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::default());
    c.bench_function("pipeline_single_file", |b| {
        b.iter(|| engine.run_sources(black_box(sources(1))));
    });
    c.bench_function("pipeline_eight_files", |b| {
        b.iter(|| engine.run_sources(black_box(sources(8))));
    });
}

fn benchmark_single_worker(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::default().with_workers(1));
    c.bench_function("pipeline_one_worker", |b| {
        b.iter(|| engine.run_sources(black_box(sources(4))));
    });
}

criterion_group!(pipeline_benches, benchmark_full_pipeline, benchmark_single_worker);
criterion_main!(pipeline_benches);
