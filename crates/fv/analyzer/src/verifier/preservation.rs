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

//! Preservation: evaluation never changes the type of a term
//!
//! Every value flowing into a typed slot must be assignable to it:
//! assignments, variable initializers, returned values, channel sends,
//! composite literal elements and constant conversions. Generic
//! instantiations must satisfy their constraints.

use super::{ASSERTION_THEORY, GENERICS_THEORY, PRESERVATION_THEORY};
use crate::frontend::ast::{AssignOp, Block, ChanDir, Decl, Expr, ExprKind, FuncTypeExpr, KeyedElement, Stmt, StmtKind, VarSpec};
use crate::frontend::info::Callee;
use crate::frontend::types::{FuncId, Type};
use crate::frontend::visit::{Visitor, walk_expr, walk_stmt};
use crate::frontend::{FunctionUnit, Program, TypeInfo};
use fv_common::{Category, Finding, Severity, Span};

/// Collects Preservation violations of a function body or of package-level declarations
pub struct PreservationChecker<'p> {
    program: &'p Program,
    info: &'p TypeInfo,
    func: Option<FuncId>,
    check_assertions: bool,
    pub findings: Vec<Finding>,
}

impl<'p> PreservationChecker<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            info: &program.info,
            func: None,
            check_assertions: true,
            findings: Vec::new(),
        }
    }

    pub fn with_assertion_checks(mut self, enabled: bool) -> Self {
        self.check_assertions = enabled;
        self
    }

    /// Check one function body; closures are separate units
    pub fn check_function(mut self, unit: FunctionUnit<'p>) -> Vec<Finding> {
        self.func = Some(unit.id);
        for stmt in &unit.body.stmts {
            self.visit_stmt(stmt);
        }
        self.findings
    }

    /// Check package-level variable initializers
    pub fn check_globals(mut self) -> Vec<Finding> {
        let program = self.program;
        for file in &program.files {
            for decl in &file.decls {
                if let Decl::Var(specs) = decl {
                    for spec in specs {
                        self.var_spec(spec);
                        for value in &spec.values {
                            self.visit_expr(value);
                        }
                    }
                }
            }
        }
        self.findings
    }

    fn text(&self, expr: &Expr) -> &'p str {
        self.program.sources.snippet(expr.span)
    }

    fn report(&mut self, span: Span, message: String) {
        self.findings.push(Finding::new(Category::Preservation, Severity::Error, self.program.location(span), message).with_theory(PRESERVATION_THEORY));
    }

    /// A value of type `from` flows into a slot of type `to`
    fn flow(&mut self, value: &Expr, from: &Type, to: &Type, context: &str) {
        let info = self.info;
        if from.is_opaque() || to.is_opaque() {
            return;
        }
        let text = self.text(value);
        if !info.table.assignable(from, to) {
            let message = format!("cannot use {} (type {}) as type {} in {}", text, info.type_string(from), info.type_string(to), context);
            self.report(value.span, message);
        } else if from.is_untyped() {
            if let Some(constant) = info.const_value(value.id) {
                if let Err(reason) = info.table.representable(constant, to) {
                    self.report(value.span, format!("cannot use {} as type {} in {}: {}", text, info.type_string(to), context, reason));
                }
            }
        }
    }

    /// Tuple results of a single multi-value expression flowing into slots
    fn flow_tuple(&mut self, value: &Expr, slots: &[Option<Type>], context: &str) {
        let info = self.info;
        let Type::Tuple(items) = info.type_of(value.id) else {
            return;
        };
        if items.len() != slots.len() {
            return;
        }
        for (item, slot) in items.iter().zip(slots) {
            if let Some(slot) = slot {
                if !item.is_opaque() && !slot.is_opaque() && !info.table.assignable(item, slot) {
                    let message = format!("cannot use {} value of type {} as type {} in {}", self.text(value), info.type_string(item), info.type_string(slot), context);
                    self.report(value.span, message);
                }
            }
        }
    }

    fn var_spec(&mut self, spec: &VarSpec) {
        if spec.ty.is_none() {
            self.untyped_defaults(spec.values.iter());
            return;
        }
        let info = self.info;
        let slots: Vec<Option<Type>> = spec.names.iter().map(|name| info.symbol_at(name.id).map(|sym| info.symbol(sym).ty.clone())).collect();
        if spec.values.len() == spec.names.len() {
            for (value, slot) in spec.values.iter().zip(&slots) {
                if let Some(slot) = slot {
                    self.flow(value, info.type_of(value.id), slot, "variable declaration");
                }
            }
        } else if let [value] = spec.values.as_slice() {
            if !info.is_comma_ok(value.unparen().id) {
                self.flow_tuple(value, &slots, "variable declaration");
            }
        }
    }

    /// Untyped constants bound without a declared type take their default type
    fn untyped_defaults<'e>(&mut self, values: impl Iterator<Item = &'e Expr>) {
        let info = self.info;
        for value in values {
            let ty = info.type_of(value.id);
            if !ty.is_untyped() || ty.is_nil() {
                continue;
            }
            if let Some(constant) = info.const_value(value.id) {
                let target = info.table.default_type(ty);
                if let Err(reason) = info.table.representable(constant, &target) {
                    self.report(value.span, format!("cannot use {} as type {}: {}", self.text(value), info.type_string(&target), reason));
                }
            }
        }
    }

    fn assign(&mut self, lhs: &[Expr], op: AssignOp, rhs: &[Expr]) {
        let info = self.info;
        match op {
            AssignOp::Define => {
                if lhs.len() == rhs.len() {
                    self.untyped_defaults(rhs.iter());
                }
            }
            AssignOp::Assign => {
                let slots: Vec<Option<Type>> = lhs.iter().map(|target| if target.is_blank() { None } else { Some(info.type_of(target.id).clone()) }).collect();
                if lhs.len() == rhs.len() {
                    for (value, slot) in rhs.iter().zip(&slots) {
                        if let Some(slot) = slot {
                            self.flow(value, info.type_of(value.id), slot, "assignment");
                        }
                    }
                } else if let [value] = rhs {
                    if !info.is_comma_ok(value.unparen().id) {
                        self.flow_tuple(value, &slots, "assignment");
                    }
                }
            }
            AssignOp::Compound(op) => {
                if let ([target], [value]) = (lhs, rhs) {
                    let target_ty = info.type_of(target.id);
                    if !op.is_shift() && info.type_of(value.id).is_untyped() && !target_ty.is_opaque() {
                        if let Some(constant) = info.const_value(value.id) {
                            if let Err(reason) = info.table.representable(constant, target_ty) {
                                self.report(value.span, format!("cannot use {} as type {} in assignment: {}", self.text(value), info.type_string(target_ty), reason));
                            }
                        }
                    }
                }
            }
        }
    }

    fn returns(&mut self, span: Span, exprs: &[Expr]) {
        let info = self.info;
        let Some(func) = self.func.map(|id| info.func(id)) else {
            return;
        };
        let want = &func.sig.results;
        match exprs {
            [] => {
                let named = !func.results.is_empty() && func.results.iter().all(Option::is_some);
                if !want.is_empty() && !named {
                    self.report(span, format!("not enough return values (have 0, want {})", want.len()));
                }
            }
            [single] if want.len() > 1 => match info.type_of(single.id) {
                Type::Tuple(items) if items.len() == want.len() => {
                    let slots: Vec<Option<Type>> = want.iter().cloned().map(Some).collect();
                    self.flow_tuple(single, &slots, "return statement");
                }
                ty if ty.is_opaque() => {}
                _ => self.report(span, format!("not enough return values (have 1, want {})", want.len())),
            },
            _ if exprs.len() != want.len() => {
                let shape = if exprs.len() < want.len() { "not enough" } else { "too many" };
                self.report(span, format!("{} return values (have {}, want {})", shape, exprs.len(), want.len()));
            }
            _ => {
                for (value, slot) in exprs.iter().zip(want) {
                    self.flow(value, info.type_of(value.id), slot, "return statement");
                }
            }
        }
    }

    fn send(&mut self, span: Span, chan: &Expr, value: &Expr) {
        let info = self.info;
        let chan_ty = info.type_of(chan.id);
        if chan_ty.is_opaque() {
            return;
        }
        match info.table.chan_of(chan_ty) {
            Some((ChanDir::Recv, _)) => {
                let message = format!("invalid operation: cannot send to receive-only channel {} (type {})", self.text(chan), info.type_string(chan_ty));
                self.report(span, message);
            }
            Some((_, elem)) => self.flow(value, info.type_of(value.id), &elem, "send"),
            None => {
                let message = format!("invalid operation: cannot send to non-channel {} (type {})", self.text(chan), info.type_string(chan_ty));
                self.report(span, message);
            }
        }
    }

    fn composite(&mut self, expr: &Expr, explicit: bool, elems: &[KeyedElement]) {
        let info = self.info;
        let mut lit_ty = info.type_of(expr.id).clone();
        if !explicit {
            if let Type::Pointer(inner) = lit_ty {
                lit_ty = *inner;
            }
        }
        match info.table.core_type(&lit_ty) {
            Some(Type::Struct(fields)) => {
                for (i, elem) in elems.iter().enumerate() {
                    let slot = match &elem.key {
                        Some(key) => info.types.get(&key.id).cloned(),
                        None => fields.get(i).map(|f| f.ty.clone()),
                    };
                    if let Some(slot) = slot {
                        self.flow(&elem.value, info.type_of(elem.value.id), &slot, "struct literal");
                    }
                }
            }
            Some(Type::Slice(elem_ty)) | Some(Type::Array(_, elem_ty)) => {
                for elem in elems {
                    self.flow(&elem.value, info.type_of(elem.value.id), &elem_ty, "slice literal");
                }
            }
            Some(Type::Map(key_ty, value_ty)) => {
                for elem in elems {
                    if let Some(key) = &elem.key {
                        self.flow(key, info.type_of(key.id), &key_ty, "map literal key");
                    }
                    self.flow(&elem.value, info.type_of(elem.value.id), &value_ty, "map literal");
                }
            }
            _ => {}
        }
    }

    fn conversion(&mut self, expr: &Expr, target: &Type, args: &[Expr]) {
        let info = self.info;
        let [arg] = args else { return };
        let from = info.type_of(arg.id);
        if !from.is_untyped() || !info.table.is_numeric(target) {
            return;
        }
        if let Some(constant) = info.const_value(arg.id) {
            if let Err(reason) = info.table.representable(constant, target) {
                self.report(expr.span, format!("cannot convert {} to type {}: {}", self.text(arg), info.type_string(target), reason));
            }
        }
    }

    fn assertion(&mut self, expr: &Expr, base: &Expr) {
        let info = self.info;
        let base_ty = info.type_of(base.id);
        let asserted = info.type_of(expr.id);
        if base_ty.is_opaque() || asserted.is_opaque() {
            return;
        }
        let Some(iface) = info.table.interface_of(base_ty) else {
            let message = format!("invalid operation: {} (type {}) is not an interface", self.text(base), info.type_string(base_ty));
            self.report(expr.span, message);
            return;
        };
        if !info.table.is_interface(asserted) {
            if let Err(reason) = info.table.implements(asserted, &iface) {
                let message = format!("impossible type assertion: {} does not implement {} ({})", info.type_string(asserted), info.type_string(base_ty), reason);
                self.report(expr.span, message);
                return;
            }
        }
        if self.check_assertions && !info.is_comma_ok(expr.id) {
            self.findings.push(
                Finding::new(
                    Category::UncheckedTypeAssertion,
                    Severity::Warning,
                    self.program.location(expr.span),
                    format!("type assertion {} panics if {} does not hold a {}", self.text(expr), self.text(base), info.type_string(asserted)),
                )
                .with_suggestion(format!("use the two-value form: v, ok := {}", self.text(expr)))
                .with_theory(ASSERTION_THEORY),
            );
        }
    }
}

impl<'ast> Visitor<'ast> for PreservationChecker<'_> {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        match &stmt.kind {
            StmtKind::Assign { lhs, op, rhs } => self.assign(lhs, *op, rhs),
            StmtKind::Var(specs) => {
                for spec in specs {
                    self.var_spec(spec);
                }
            }
            StmtKind::Return(exprs) => self.returns(stmt.span, exprs),
            StmtKind::Send { chan, value } => self.send(stmt.span, chan, value),
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        match &expr.kind {
            ExprKind::CompositeLit { ty, elems } => self.composite(expr, ty.is_some(), elems),
            ExprKind::Call { args, .. } => {
                if let Some(Callee::Conversion(target)) = self.info.callee(expr.id) {
                    self.conversion(expr, target, args);
                }
            }
            ExprKind::TypeAssert { base, ty: Some(_) } => self.assertion(expr, base),
            _ => {}
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, _expr: &'ast Expr, _sig: &'ast FuncTypeExpr, _body: &'ast Block) {}
}

/// Constraint satisfaction of every generic instantiation
pub fn check_instantiations(program: &Program) -> Vec<Finding> {
    let info = &program.info;
    let mut findings = Vec::new();
    for inst in &info.instantiations {
        let location = program.location(inst.span);
        if !inst.is_resolved() {
            let missing: Vec<String> = inst
                .params
                .iter()
                .zip(&inst.args)
                .filter(|(_, arg)| arg.is_none())
                .map(|(&param, _)| info.type_string(&Type::TypeParam(param)))
                .collect();
            findings.push(
                Finding::new(
                    Category::GenericInstantiationUnresolved,
                    Severity::Info,
                    location,
                    format!("cannot infer type argument {} of {}", missing.join(", "), inst.name),
                )
                .with_suggestion(format!("instantiate {} explicitly", inst.name))
                .with_theory(GENERICS_THEORY),
            );
            continue;
        }
        for (&param, arg) in inst.params.iter().zip(&inst.args) {
            let Some(arg) = arg else { continue };
            if arg.is_opaque() {
                continue;
            }
            let constraint = info.table.constraint(param);
            if let Err(reason) = info.table.satisfies(arg, constraint) {
                let message = format!(
                    "{} does not satisfy {} for type parameter {} of {}: {}",
                    info.type_string(arg),
                    info.type_string(constraint),
                    info.type_string(&Type::TypeParam(param)),
                    inst.name,
                    reason
                );
                findings.push(Finding::new(Category::Preservation, Severity::Error, location.clone(), message).with_theory(GENERICS_THEORY));
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preservation(source: &str, func: &str) -> Vec<Finding> {
        let (program, _) = Program::from_source("t.go", source);
        let unit = program.unit(program.func_named(func).unwrap()).unwrap();
        PreservationChecker::new(&program).check_function(unit)
    }

    #[test]
    fn test_assignments_and_returns() {
        let source = "package main\n\nfunc f(n int) (int, string) {\n\tvar s string = n\n\tvar k int8 = 300\n\tn = \"x\"\n\treturn n\n}\n";
        let found = preservation(source, "f");
        let messages: Vec<&str> = found.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(found.len(), 4, "{:?}", messages);
        assert!(messages[0].starts_with("cannot use n (type int) as type string in variable declaration"));
        assert!(messages[1].contains("constant 300 overflows int8"));
        assert!(messages[2].contains("in assignment"));
        assert!(messages[3].starts_with("not enough return values (have 1, want 2)"));
        assert!(found.iter().all(|f| f.category == Category::Preservation && f.severity == Severity::Error));
    }

    #[test]
    fn test_multi_value_return_and_named_results() {
        let source = "package main\n\nfunc pair() (int, error) {\n\treturn 1, nil\n}\n\nfunc f() (n int, err error) {\n\tn, err = pair()\n\treturn\n}\n\nfunc g() (int, error) {\n\treturn pair()\n}\n";
        assert!(preservation(source, "f").is_empty());
        assert!(preservation(source, "g").is_empty());
        assert!(preservation(source, "pair").is_empty());
    }

    #[test]
    fn test_channel_sends() {
        let source = "package main\n\nfunc f(out chan<- int, in <-chan int) {\n\tout <- 1\n\tout <- \"x\"\n\tin <- 2\n}\n";
        let found = preservation(source, "f");
        assert_eq!(found.len(), 2);
        assert!(found[0].message.contains("in send"));
        assert!(found[1].message.contains("receive-only channel"));
    }

    #[test]
    fn test_composite_literal_elements() {
        let source = "package main\n\ntype P struct {\n\tx int\n\tname string\n}\n\nfunc f() {\n\t_ = P{x: 1, name: 2}\n\t_ = []int{1, \"a\"}\n\t_ = map[string]int{\"a\": 1}\n}\n";
        let found = preservation(source, "f");
        assert_eq!(found.len(), 2);
        assert!(found[0].message.contains("struct literal"));
        assert!(found[1].message.contains("slice literal"));
    }

    #[test]
    fn test_unchecked_type_assertion() {
        let source = "package main\n\nfunc f(v any) int {\n\tif n, ok := v.(int); ok {\n\t\treturn n\n\t}\n\tswitch v.(type) {\n\tcase string:\n\t}\n\treturn v.(int)\n}\n";
        let found = preservation(source, "f");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, Category::UncheckedTypeAssertion);
        assert_eq!(found[0].severity, Severity::Warning);
        assert_eq!(found[0].location.line, 10);
    }

    #[test]
    fn test_constant_conversion_overflow() {
        let source = "package main\n\nfunc f() int8 {\n\treturn int8(200)\n}\n";
        let found = preservation(source, "f");
        assert_eq!(found.len(), 1);
        assert!(found[0].message.starts_with("cannot convert 200 to type int8"));
    }

    #[test]
    fn test_errors_inside_endless_loop_are_reported() {
        let source = "package main\n\nfunc f() {\n\tfor {\n\t\tvar k int8 = 300\n\t\t_ = k\n\t}\n}\n";
        let found = preservation(source, "f");
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].location.line, 5);
    }

    #[test]
    fn test_untyped_constant_overflows_only_when_typed() {
        let source = "package main\n\nconst Big = 1 << 200\n\nfunc f() int {\n\tsmall := Big >> 198\n\tx := 99999999999999999999999999999999999999999\n\treturn small + x\n}\n";
        let found = preservation(source, "f");
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].location.line, 7);
        assert!(found[0].message.contains("overflows int"));
    }

    #[test]
    fn test_generic_constraints() {
        let source = "package main\n\ntype Number interface {\n\t~int | ~float64\n}\n\nfunc Sum[T Number](xs []T) T {\n\tvar s T\n\tfor _, x := range xs {\n\t\ts += x\n\t}\n\treturn s\n}\n\nfunc Zero[T any]() T {\n\tvar z T\n\treturn z\n}\n\nfunc main() {\n\t_ = Sum([]int{1})\n\t_ = Sum([]string{\"a\"})\n\t_ = Zero()\n}\n";
        let (program, _) = Program::from_source("t.go", source);
        let found = check_instantiations(&program);
        let errors: Vec<&Finding> = found.iter().filter(|f| f.category == Category::Preservation).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location.line, 22);
        let unresolved: Vec<&Finding> = found.iter().filter(|f| f.category == Category::GenericInstantiationUnresolved).collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].severity, Severity::Info);
    }

    #[test]
    fn test_global_initializers() {
        let source = "package main\n\nvar limit uint8 = 256\nvar name string = \"ok\"\n";
        let (program, _) = Program::from_source("t.go", source);
        let found = PreservationChecker::new(&program).check_globals();
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("overflows uint8"));
    }
}
