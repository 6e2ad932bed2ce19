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

//! Graphviz rendering of CFGs

use super::{Cfg, EdgeKind, NodeLabel};
use crate::frontend::Program;
use std::fmt::Write;

/// Render a CFG as a DOT digraph
pub fn to_dot(cfg: &Cfg<'_>, program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", escape(&cfg.name));
    let _ = writeln!(out, "    node [shape=box, fontname=\"monospace\"];");
    for node in &cfg.nodes {
        let text = if node.span.is_valid() {
            let location = program.location(node.span);
            format!("{} {}\\n{}:{}", node.id, node.label.as_str(), location.line, location.column)
        } else {
            format!("{} {}", node.id, node.label.as_str())
        };
        let style = match node.label {
            NodeLabel::Entry => ", shape=ellipse, style=filled, fillcolor=\"#d5f5d5\"",
            NodeLabel::Exit => ", shape=ellipse, style=filled, fillcolor=\"#f5d5d5\"",
            NodeLabel::IfCond | NodeLabel::ForHeader | NodeLabel::RangeHeader | NodeLabel::Branch => ", shape=diamond",
            NodeLabel::Panic => ", color=red",
            _ => "",
        };
        let _ = writeln!(out, "    n{} [label=\"{}\"{}];", node.id, escape(&text), style);
    }
    for (from, to, kind) in cfg.edges() {
        match kind {
            EdgeKind::Normal => {
                let _ = writeln!(out, "    n{} -> n{};", from, to);
            }
            _ => {
                let _ = writeln!(out, "    n{} -> n{} [label=\"{}\"];", from, to, kind.as_str());
            }
        }
    }
    out.push_str("}\n");
    out
}

/// File name for the DOT file of a function
pub fn dot_file_name(cfg: &Cfg<'_>) -> String {
    let name: String = cfg.name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' }).collect();
    format!("{:04}_{}.dot", cfg.func, name)
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;

    #[test]
    fn test_dot_output() {
        let source = "package main\ntype T struct{}\nfunc (t *T) check(x int) bool {\n\tif x > 0 {\n\t\treturn true\n\t}\n\treturn false\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let cfg = build_cfg(&program.info, program.unit(program.func_named("(*T).check").unwrap()).unwrap());
        let dot = to_dot(&cfg, &program);
        assert!(dot.starts_with("digraph \"(*T).check\" {"));
        assert!(dot.contains("[label=\"true\"]"));
        assert!(dot.contains("[label=\"false\"]"));
        assert!(dot.contains("entry"));
        assert!(dot.trim_end().ends_with('}'));
        assert_eq!(dot_file_name(&cfg), format!("{:04}___T_.check.dot", cfg.func));
    }
}
