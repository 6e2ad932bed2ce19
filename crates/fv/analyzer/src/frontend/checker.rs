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

//! Name resolution and type inference
//!
//! The checker is lenient: it assigns a type to every expression it can and
//! records name-resolution failures as [`Problem`]s. Operator, assignment and
//! call rules are enforced afterwards by the verifier, which reads the types
//! computed here.
//!
//! Package-level declarations are order independent. Declarations are
//! collected first, type declarations are resolved in a few passes so that
//! forward references settle, then signatures, package variables and
//! finally function bodies are checked.

use super::ast::*;
use super::builtins::{Builtin, StdMember, UniverseEntry};
use super::info::{Callee, FuncInfo, Instantiation, Problem, Selection, TypeInfo};
use super::lexer::{unquote_rune, unquote_string};
use super::parser::expr_to_type;
use super::scope::{ScopeStack, Symbol, SymbolId, SymbolKind};
use super::types::{
    const_binary, const_unary, BasicKind, ConstValue, FuncId, InterfaceType, MethodInfo, NamedId, Signature, StructField, Term, Type, TypeParamId,
};
use fv_common::Span;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

const TYPE_PASSES: usize = 3;
const GLOBAL_PASSES: usize = 2;

/// Files of one directory sharing a package clause
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub dir: String,
    /// Indices into the program's file list
    pub files: Vec<usize>,
}

#[derive(Debug, Clone)]
enum ImportTarget {
    Std(String),
    Local(usize),
    Missing(String),
}

enum Resolved {
    Symbol(SymbolId),
    Universe(UniverseEntry),
    Import(ImportTarget),
    Undefined,
}

struct FuncCtx {
    id: FuncId,
    results: Vec<Type>,
}

/// Type-check parsed files and build the frozen type environment
pub fn check_program(files: &[File], pointer_width: u32) -> (Vec<Package>, TypeInfo) {
    let mut checker = Checker::new(files, pointer_width);
    checker.run();
    checker.finish()
}

struct Checker<'a> {
    files: &'a [File],
    info: TypeInfo,
    packages: Vec<Package>,
    package_of_file: Vec<usize>,
    pkg_scopes: Vec<HashMap<String, SymbolId>>,
    imports: Vec<HashMap<String, ImportTarget>>,
    current_pkg: usize,
    current_file: usize,
    scopes: ScopeStack,
    funcs: Vec<FuncCtx>,
    iota: Option<i128>,
    /// Type parameter symbols of generic declarations, keyed by declaration node
    tparams: HashMap<NodeId, Vec<SymbolId>>,
    named_of_spec: HashMap<NodeId, NamedId>,
    recv_types: HashMap<FuncId, Type>,
    closure_counter: HashMap<FuncId, usize>,
}

impl<'a> Checker<'a> {
    fn new(files: &'a [File], pointer_width: u32) -> Self {
        Self {
            files,
            info: TypeInfo::new(pointer_width),
            packages: Vec::new(),
            package_of_file: Vec::new(),
            pkg_scopes: Vec::new(),
            imports: Vec::new(),
            current_pkg: 0,
            current_file: 0,
            scopes: ScopeStack::new(),
            funcs: Vec::new(),
            iota: None,
            tparams: HashMap::new(),
            named_of_spec: HashMap::new(),
            recv_types: HashMap::new(),
            closure_counter: HashMap::new(),
        }
    }

    fn run(&mut self) {
        self.group_packages();
        self.resolve_imports();
        self.collect_declarations();
        for _ in 0..TYPE_PASSES {
            self.resolve_type_decls();
        }
        self.resolve_signatures();
        for _ in 0..GLOBAL_PASSES {
            self.check_globals();
        }
        self.check_bodies();
        debug!(
            packages = self.packages.len(),
            functions = self.info.functions.len(),
            symbols = self.info.symbols.len(),
            problems = self.info.problems.len(),
            "type checking complete"
        );
    }

    fn finish(mut self) -> (Vec<Package>, TypeInfo) {
        let mut seen = HashSet::new();
        self.info.problems.retain(|p| seen.insert(p.clone()));

        let mut latest: HashMap<NodeId, usize> = HashMap::new();
        for (index, inst) in self.info.instantiations.iter().enumerate() {
            latest.insert(inst.node, index);
        }
        let mut index = 0;
        self.info.instantiations.retain(|inst| {
            let keep = latest.get(&inst.node) == Some(&index);
            index += 1;
            keep
        });
        (self.packages, self.info)
    }

    // ---------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------

    fn group_packages(&mut self) {
        let files = self.files;
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for (i, file) in files.iter().enumerate() {
            let dir = Path::new(&file.path).parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
            let key = (dir.clone(), file.package.name.clone());
            let pkg = *index.entry(key).or_insert_with(|| {
                self.packages.push(Package {
                    name: file.package.name.clone(),
                    dir,
                    files: Vec::new(),
                });
                self.pkg_scopes.push(HashMap::new());
                self.packages.len() - 1
            });
            self.packages[pkg].files.push(i);
            self.package_of_file.push(pkg);
        }
    }

    fn resolve_imports(&mut self) {
        let files = self.files;
        for (i, file) in files.iter().enumerate() {
            let own = self.package_of_file[i];
            let mut map = HashMap::new();
            for import in &file.imports {
                let name = import.local_name();
                if name == "_" || name == "." {
                    continue;
                }
                let last = import.path.rsplit('/').next().unwrap_or(&import.path);
                let target = if self.info.stdlib.is_modeled(&import.path) {
                    ImportTarget::Std(import.path.clone())
                } else if let Some(local) = self
                    .packages
                    .iter()
                    .enumerate()
                    .position(|(p, pkg)| p != own && pkg.name == last && Path::new(&pkg.dir).file_name().is_some_and(|d| d == last))
                {
                    ImportTarget::Local(local)
                } else {
                    ImportTarget::Missing(import.path.clone())
                };
                map.insert(name, target);
            }
            self.imports.push(map);
        }
    }

    fn enter_file(&mut self, file: usize) {
        self.current_file = file;
        self.current_pkg = self.package_of_file[file];
    }

    fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = self.info.symbols.len() as SymbolId;
        self.info.symbols.push(symbol);
        id
    }

    fn declare_global(&mut self, name: &Ident, symbol: Symbol) -> SymbolId {
        let id = self.add_symbol(symbol);
        self.info.defs.insert(name.id, id);
        if !name.is_blank() {
            if self.pkg_scopes[self.current_pkg].insert(name.name.clone(), id).is_some() {
                self.problem(name.span, format!("{} redeclared in this block", name.name));
            }
        }
        id
    }

    fn collect_declarations(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            self.enter_file(fi);
            for decl in &file.decls {
                match decl {
                    Decl::Type(specs) => {
                        for spec in specs {
                            let ty = if spec.alias {
                                Type::Invalid
                            } else {
                                let id = self.info.table.add_named(spec.name.name.clone(), "");
                                self.named_of_spec.insert(spec.name.id, id);
                                Type::Named(id, vec![])
                            };
                            let symbol = Symbol::new(spec.name.name.clone(), SymbolKind::Type, ty, spec.name.span, spec.name.id);
                            self.declare_global(&spec.name, symbol);
                        }
                    }
                    Decl::Func(func) => {
                        let id = self.new_function(func.id, func.span, None, func.name.name.clone());
                        self.info.functions[id as usize].noinline = func.has_pragma("noinline");
                        self.info.functions[id as usize].has_body = func.body.is_some();
                        if func.recv.is_none() && func.name.name != "init" {
                            let mut symbol = Symbol::new(func.name.name.clone(), SymbolKind::Func, Type::Invalid, func.name.span, func.name.id);
                            symbol.func = Some(id);
                            self.declare_global(&func.name, symbol);
                        }
                    }
                    Decl::Var(specs) => {
                        for spec in specs {
                            for name in &spec.names {
                                let mut symbol = Symbol::new(name.name.clone(), SymbolKind::Var, Type::Invalid, name.span, name.id);
                                symbol.zero_init = spec.values.is_empty();
                                self.declare_global(name, symbol);
                            }
                        }
                    }
                    Decl::Const(specs) => {
                        for spec in specs {
                            for name in &spec.names {
                                let symbol = Symbol::new(name.name.clone(), SymbolKind::Const, Type::Invalid, name.span, name.id);
                                self.declare_global(name, symbol);
                            }
                        }
                    }
                }
            }
        }
    }

    fn new_function(&mut self, node: NodeId, span: Span, parent: Option<FuncId>, name: String) -> FuncId {
        if let Some(&existing) = self.info.func_of_node.get(&node) {
            return existing;
        }
        let id = self.info.functions.len() as FuncId;
        self.info.functions.push(FuncInfo {
            id,
            name,
            package: self.current_pkg,
            file: span.file,
            node,
            span,
            parent,
            sig: Signature::new(vec![], vec![]),
            params: Vec::new(),
            results: Vec::new(),
            recv: None,
            recv_named: None,
            pointer_recv: false,
            type_params: Vec::new(),
            noinline: false,
            has_body: true,
            captures: Vec::new(),
            closures: Vec::new(),
        });
        self.info.func_of_node.insert(node, id);
        if let Some(parent) = parent {
            self.info.functions[parent as usize].closures.push(id);
        }
        id
    }

    /// Create (once) and declare the type parameters of a generic declaration
    fn declare_type_params(&mut self, owner: NodeId, decls: &[TypeParamDecl]) -> Vec<TypeParamId> {
        if !self.tparams.contains_key(&owner) {
            let mut symbols = Vec::new();
            for decl in decls {
                for name in &decl.names {
                    let param = self.info.table.add_type_param(name.name.clone(), Type::empty_interface());
                    let symbol = Symbol::new(name.name.clone(), SymbolKind::Type, Type::TypeParam(param), name.span, name.id);
                    let id = self.add_symbol(symbol);
                    self.info.defs.insert(name.id, id);
                    symbols.push(id);
                }
            }
            self.tparams.insert(owner, symbols);
        }
        let symbols = self.tparams.get(&owner).cloned().unwrap_or_default();
        let mut params = Vec::new();
        for &symbol in &symbols {
            let name = self.info.symbol(symbol).name.clone();
            self.scopes.declare(&name, symbol);
            if let Type::TypeParam(param) = self.info.symbol(symbol).ty {
                params.push(param);
            }
        }
        // Constraints may mention any parameter of the list
        let mut index = 0;
        for decl in decls {
            let constraint = self.resolve_type(&decl.constraint);
            for _ in &decl.names {
                if let Some(&param) = params.get(index) {
                    self.info.table.params[param as usize].constraint = constraint.clone();
                }
                index += 1;
            }
        }
        params
    }

    fn resolve_type_decls(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            self.enter_file(fi);
            for decl in &file.decls {
                if let Decl::Type(specs) = decl {
                    for spec in specs {
                        self.resolve_type_spec(spec, true);
                    }
                }
            }
        }
    }

    fn resolve_type_spec(&mut self, spec: &TypeSpec, global: bool) {
        self.scopes.push();
        let params = self.declare_type_params(spec.name.id, &spec.type_params);
        let resolved = self.resolve_type(&spec.ty);
        self.scopes.pop();

        let symbol = if global { self.pkg_scopes[self.current_pkg].get(&spec.name.name).copied() } else { self.info.defs.get(&spec.name.id).copied() };
        if spec.alias {
            if let Some(symbol) = symbol {
                self.info.symbols[symbol as usize].ty = resolved.clone();
            }
        } else if let Some(&named) = self.named_of_spec.get(&spec.name.id) {
            let underlying = match &resolved {
                Type::TypeParam(_) => {
                    self.problem(spec.ty.span, "cannot use a type parameter as the underlying type".to_string());
                    Type::Invalid
                }
                other => self.info.table.underlying(other),
            };
            let entry = self.info.table.named_mut(named);
            entry.underlying = underlying;
            entry.type_params = params;
        }
        self.info.types.insert(spec.name.id, resolved);
    }

    fn resolve_signatures(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            self.enter_file(fi);
            for decl in &file.decls {
                if let Decl::Func(func) = decl {
                    self.resolve_func_decl(func);
                }
            }
        }
    }

    fn resolve_func_decl(&mut self, func: &FuncDecl) {
        let Some(&id) = self.info.func_of_node.get(&func.id) else { return };
        self.scopes.push();
        let mut type_params = self.declare_type_params(func.id, &func.type_params);

        let mut recv_named = None;
        let mut pointer_recv = false;
        if let Some(recv) = &func.recv {
            let (pointer, base) = match &recv.ty.kind {
                TypeExprKind::Pointer(inner) => (true, inner.as_ref()),
                _ => (false, &recv.ty),
            };
            pointer_recv = pointer;
            let mut recv_ty = Type::Invalid;
            if let TypeExprKind::Name { pkg: None, name, args } = &base.kind {
                let named = self.pkg_scopes[self.current_pkg].get(&name.name).and_then(|&s| match self.info.symbol(s).ty {
                    Type::Named(id, _) => Some(id),
                    _ => None,
                });
                match named {
                    Some(named) => {
                        let declared = self.info.table.named(named).type_params.clone();
                        if !self.tparams.contains_key(&func.id) || type_params.is_empty() {
                            let mut symbols = Vec::new();
                            for (i, arg) in args.iter().enumerate() {
                                if let (TypeExprKind::Name { name: pname, .. }, Some(&param)) = (&arg.kind, declared.get(i)) {
                                    let symbol = Symbol::new(pname.name.clone(), SymbolKind::Type, Type::TypeParam(param), pname.span, pname.id);
                                    let sid = self.add_symbol(symbol);
                                    self.info.defs.insert(pname.id, sid);
                                    self.info.types.insert(arg.id, Type::TypeParam(param));
                                    symbols.push(sid);
                                }
                            }
                            for &sid in &symbols {
                                let pname = self.info.symbol(sid).name.clone();
                                self.scopes.declare(&pname, sid);
                            }
                            self.tparams.insert(func.id, symbols);
                        }
                        let args: Vec<Type> = declared.iter().take(args.len()).map(|&p| Type::TypeParam(p)).collect();
                        type_params = declared.iter().take(args.len()).copied().collect();
                        recv_ty = Type::Named(named, args);
                        self.info.types.insert(base.id, recv_ty.clone());
                        recv_named = Some(named);
                    }
                    None => self.problem(recv.ty.span, format!("invalid receiver type {}", name.name)),
                }
            } else {
                self.problem(recv.ty.span, "invalid receiver type".to_string());
            }
            if pointer && !recv_ty.is_invalid() {
                recv_ty = Type::pointer(recv_ty);
            }
            self.info.types.insert(recv.ty.id, recv_ty.clone());
            self.recv_types.insert(id, recv_ty);
        }

        let sig = self.resolve_sig(&func.sig);
        self.scopes.pop();

        let name = match recv_named {
            Some(named) => {
                let type_name = self.info.table.named(named).name.clone();
                if pointer_recv { format!("(*{}).{}", type_name, func.name.name) } else { format!("{}.{}", type_name, func.name.name) }
            }
            None => func.name.name.clone(),
        };

        if let Some(named) = recv_named {
            let entry = self.info.table.named_mut(named);
            if entry.methods.iter().any(|m| m.name == func.name.name) {
                let span = func.name.span;
                self.problem(span, format!("method {} redeclared", name));
            } else {
                entry.methods.push(MethodInfo {
                    name: func.name.name.clone(),
                    sig: sig.clone(),
                    pointer_recv,
                    func: Some(id),
                });
            }
        } else if let Some(&symbol) = self.info.defs.get(&func.name.id) {
            self.info.symbols[symbol as usize].ty = Type::func(sig.clone());
        }

        let info = &mut self.info.functions[id as usize];
        info.name = name;
        info.sig = sig;
        info.recv_named = recv_named;
        info.pointer_recv = pointer_recv;
        info.type_params = type_params;
    }

    fn check_globals(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            self.enter_file(fi);
            for decl in &file.decls {
                match decl {
                    Decl::Var(specs) => {
                        for spec in specs {
                            self.var_spec(spec, true);
                        }
                    }
                    Decl::Const(specs) => self.const_specs(specs, true),
                    _ => {}
                }
            }
        }
    }

    fn check_bodies(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            self.enter_file(fi);
            for decl in &file.decls {
                if let Decl::Func(func) = decl {
                    let (Some(body), Some(&id)) = (&func.body, self.info.func_of_node.get(&func.id)) else { continue };
                    self.scopes.push();
                    if let Some(symbols) = self.tparams.get(&func.id).cloned() {
                        for symbol in symbols {
                            let name = self.info.symbol(symbol).name.clone();
                            self.scopes.declare(&name, symbol);
                        }
                    }
                    self.check_body(id, func.recv.as_ref(), &func.sig, body);
                    self.scopes.pop();
                }
            }
        }
    }

    /// Check a function or closure body in a fresh parameter scope
    fn check_body(&mut self, id: FuncId, recv: Option<&Field>, sig: &FuncTypeExpr, body: &Block) {
        let resolved = self.info.functions[id as usize].sig.clone();
        self.funcs.push(FuncCtx {
            id,
            results: resolved.results.clone(),
        });
        self.scopes.push();

        if let Some(recv) = recv {
            if let Some(name) = recv.names.first() {
                let ty = self.recv_types.get(&id).cloned().unwrap_or(Type::Invalid);
                let symbol = self.define_var(&name.name, name.id, name.span, ty);
                self.info.symbols[symbol as usize].is_param = true;
                self.info.functions[id as usize].recv = Some(symbol);
            }
        }

        let params = self.bind_fields(&sig.params, &resolved.params, false);
        let results = self.bind_fields(&sig.results, &resolved.results, true);
        let info = &mut self.info.functions[id as usize];
        info.params = params;
        info.results = results;

        for stmt in &body.stmts {
            self.stmt(stmt);
        }

        self.scopes.pop();
        self.funcs.pop();
    }

    fn bind_fields(&mut self, fields: &[Field], types: &[Type], results: bool) -> Vec<Option<SymbolId>> {
        let mut bound = Vec::new();
        let mut index = 0;
        for field in fields {
            if field.names.is_empty() {
                bound.push(None);
                index += 1;
                continue;
            }
            for name in &field.names {
                let ty = types.get(index).cloned().unwrap_or(Type::Invalid);
                index += 1;
                if name.is_blank() {
                    bound.push(None);
                    continue;
                }
                let symbol = self.define_var(&name.name, name.id, name.span, ty);
                let entry = &mut self.info.symbols[symbol as usize];
                entry.is_param = !results;
                entry.is_result = results;
                entry.zero_init = results;
                bound.push(Some(symbol));
            }
        }
        bound
    }

    // ---------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------

    fn resolve_sig(&mut self, sig: &FuncTypeExpr) -> Signature {
        let mut params = Vec::new();
        for field in &sig.params {
            let ty = self.resolve_type(&field.ty);
            for _ in 0..field.names.len().max(1) {
                params.push(ty.clone());
            }
        }
        let mut results = Vec::new();
        for field in &sig.results {
            let ty = self.resolve_type(&field.ty);
            for _ in 0..field.names.len().max(1) {
                results.push(ty.clone());
            }
        }
        Signature {
            params,
            results,
            variadic: sig.variadic,
        }
    }

    fn resolve_type(&mut self, te: &TypeExpr) -> Type {
        let ty = self.resolve_type_inner(te);
        self.info.types.insert(te.id, ty.clone());
        ty
    }

    fn resolve_type_inner(&mut self, te: &TypeExpr) -> Type {
        match &te.kind {
            TypeExprKind::Name { pkg: None, name, args } => {
                if name.is_blank() {
                    return Type::Invalid;
                }
                let base = match self.resolve_name(&name.name) {
                    Resolved::Symbol(id) => {
                        self.info.uses.insert(name.id, id);
                        let symbol = self.info.symbol(id);
                        if symbol.kind != SymbolKind::Type {
                            self.problem(name.span, format!("{} is not a type", name.name));
                            return Type::Invalid;
                        }
                        symbol.ty.clone()
                    }
                    Resolved::Universe(UniverseEntry::Type(ty)) => ty,
                    Resolved::Universe(_) | Resolved::Import(_) => {
                        self.problem(name.span, format!("{} is not a type", name.name));
                        return Type::Invalid;
                    }
                    Resolved::Undefined => {
                        self.problem(name.span, format!("undefined: {}", name.name));
                        return Type::Invalid;
                    }
                };
                self.instantiate_named(te, &name.name, base, args)
            }
            TypeExprKind::Name { pkg: Some(pkg), name, args } => {
                let base = match self.resolve_name(&pkg.name) {
                    Resolved::Import(ImportTarget::Std(path)) => match self.info.stdlib.member(&path, &name.name) {
                        Some(StdMember::Type(ty)) => ty.clone(),
                        _ => {
                            self.problem(name.span, format!("undefined: {}.{}", pkg.name, name.name));
                            return Type::Invalid;
                        }
                    },
                    Resolved::Import(ImportTarget::Local(p)) => match self.pkg_scopes[p].get(&name.name).copied() {
                        Some(id) if self.info.symbol(id).kind == SymbolKind::Type => {
                            self.info.uses.insert(name.id, id);
                            self.info.symbol(id).ty.clone()
                        }
                        _ => {
                            self.problem(name.span, format!("undefined: {}.{}", pkg.name, name.name));
                            return Type::Invalid;
                        }
                    },
                    Resolved::Import(ImportTarget::Missing(_)) => return Type::Unknown,
                    _ => {
                        self.problem(pkg.span, format!("undefined: {}", pkg.name));
                        return Type::Invalid;
                    }
                };
                self.instantiate_named(te, &name.name, base, args)
            }
            TypeExprKind::Pointer(inner) => Type::pointer(self.resolve_type(inner)),
            TypeExprKind::Slice(inner) | TypeExprKind::Ellipsis(inner) => Type::slice(self.resolve_type(inner)),
            TypeExprKind::Array { len, elem } => {
                let elem = self.resolve_type(elem);
                let len = match len {
                    Some(expr) => {
                        self.expr(expr, Some(&Type::int()));
                        match self.info.const_int(expr.id) {
                            Some(n) if n >= 0 => n as u64,
                            _ => {
                                self.problem(expr.span, "array length must be a non-negative constant".to_string());
                                0
                            }
                        }
                    }
                    None => 0,
                };
                Type::Array(len, Box::new(elem))
            }
            TypeExprKind::Map { key, value } => Type::Map(Box::new(self.resolve_type(key)), Box::new(self.resolve_type(value))),
            TypeExprKind::Chan { dir, elem } => Type::chan(*dir, self.resolve_type(elem)),
            TypeExprKind::Func(sig) => Type::func(self.resolve_sig(sig)),
            TypeExprKind::Struct(fields) => {
                let mut resolved = Vec::new();
                for field in fields {
                    let ty = self.resolve_type(&field.ty);
                    if field.names.is_empty() {
                        resolved.push(StructField {
                            name: embedded_name(&field.ty),
                            ty,
                            embedded: true,
                        });
                    } else {
                        for name in &field.names {
                            resolved.push(StructField {
                                name: name.name.clone(),
                                ty: ty.clone(),
                                embedded: false,
                            });
                        }
                    }
                }
                Type::Struct(resolved)
            }
            TypeExprKind::Interface(elems) => self.resolve_interface(elems),
        }
    }

    fn instantiate_named(&mut self, te: &TypeExpr, name: &str, base: Type, args: &[TypeExpr]) -> Type {
        if args.is_empty() {
            return base;
        }
        let resolved: Vec<Type> = args.iter().map(|a| self.resolve_type(a)).collect();
        match base {
            Type::Named(id, _) => {
                let params = self.info.table.named(id).type_params.clone();
                if !params.is_empty() && params.len() != resolved.len() {
                    self.problem(te.span, format!("wrong number of type arguments for {}", name));
                }
                self.info.instantiations.push(Instantiation {
                    node: te.id,
                    span: te.span,
                    name: name.to_string(),
                    params,
                    args: resolved.iter().cloned().map(Some).collect(),
                });
                Type::Named(id, resolved)
            }
            Type::Unknown => Type::Unknown,
            _ => {
                self.problem(te.span, format!("{} is not a generic type", name));
                Type::Invalid
            }
        }
    }

    fn resolve_interface(&mut self, elems: &[InterfaceElem]) -> Type {
        let mut iface = InterfaceType::default();
        for elem in elems {
            match elem {
                InterfaceElem::Method { name, sig } => {
                    let sig = self.resolve_sig(sig);
                    iface.methods.push((name.name.clone(), sig));
                }
                InterfaceElem::Union(terms) => {
                    if terms.len() == 1 && !terms[0].tilde {
                        let ty = self.resolve_type(&terms[0].ty);
                        if !matches!(ty, Type::TypeParam(_)) {
                            if let Type::Interface(embedded) = self.info.table.underlying(&ty) {
                                iface.methods.extend(embedded.methods.iter().cloned());
                                iface.comparable |= embedded.comparable;
                                if let Some(terms) = embedded.terms {
                                    restrict_terms(&mut iface, terms);
                                }
                                continue;
                            }
                        }
                        restrict_terms(&mut iface, vec![Term { tilde: false, ty }]);
                    } else {
                        let resolved = terms
                            .iter()
                            .map(|t| Term {
                                tilde: t.tilde,
                                ty: self.resolve_type(&t.ty),
                            })
                            .collect();
                        restrict_terms(&mut iface, resolved);
                    }
                }
            }
        }
        iface.methods.sort_by(|a, b| a.0.cmp(&b.0));
        iface.methods.dedup_by(|a, b| a.0 == b.0);
        Type::Interface(Box::new(iface))
    }

    /// Whether an expression denotes a type rather than a value
    fn denotes_type(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Ident(name) => match self.resolve_name(name) {
                Resolved::Symbol(id) => self.info.symbol(id).kind == SymbolKind::Type,
                Resolved::Universe(UniverseEntry::Type(_)) => true,
                _ => false,
            },
            ExprKind::Selector { base, field } => match &base.kind {
                ExprKind::Ident(pkg) => match self.resolve_name(pkg) {
                    Resolved::Import(ImportTarget::Std(path)) => matches!(self.info.stdlib.member(&path, &field.name), Some(StdMember::Type(_))),
                    Resolved::Import(ImportTarget::Local(p)) => self.pkg_scopes[p].get(&field.name).is_some_and(|&id| self.info.symbol(id).kind == SymbolKind::Type),
                    _ => false,
                },
                _ => false,
            },
            ExprKind::Type(_) => true,
            ExprKind::Paren(inner) => self.denotes_type(inner),
            ExprKind::Unary { op: UnaryOp::Deref, operand } => self.denotes_type(operand),
            ExprKind::Index { base, .. } => self.denotes_type(base),
            _ => false,
        }
    }

    fn expr_as_type(&mut self, expr: &Expr) -> Option<Type> {
        if !self.denotes_type(expr) {
            return None;
        }
        let te = expr_to_type(expr.clone());
        let ty = self.resolve_type(&te);
        self.info.types.insert(expr.id, ty.clone());
        Some(ty)
    }

    // ---------------------------------------------------------------------
    // Names
    // ---------------------------------------------------------------------

    fn resolve_name(&self, name: &str) -> Resolved {
        if let Some(id) = self.scopes.lookup(name) {
            return Resolved::Symbol(id);
        }
        if let Some(&id) = self.pkg_scopes.get(self.current_pkg).and_then(|scope| scope.get(name)) {
            return Resolved::Symbol(id);
        }
        if let Some(target) = self.imports.get(self.current_file).and_then(|imports| imports.get(name)) {
            return Resolved::Import(target.clone());
        }
        match self.info.universe.lookup(name) {
            Some(entry) => Resolved::Universe(entry.clone()),
            None => Resolved::Undefined,
        }
    }

    fn current_func(&self) -> Option<FuncId> {
        self.funcs.last().map(|ctx| ctx.id)
    }

    fn define_var(&mut self, name: &str, node: NodeId, span: Span, ty: Type) -> SymbolId {
        let mut symbol = Symbol::new(name, SymbolKind::Var, ty.clone(), span, node);
        symbol.owner = self.current_func();
        let id = self.add_symbol(symbol);
        if name != "_" {
            self.scopes.declare(name, id);
        }
        self.info.defs.insert(node, id);
        self.info.types.insert(node, ty);
        id
    }

    /// Record a reference from the current function to a variable declared elsewhere
    fn note_capture(&mut self, symbol: SymbolId) {
        let Some(owner) = self.info.symbol(symbol).owner else { return };
        if self.current_func() == Some(owner) {
            return;
        }
        self.info.symbols[symbol as usize].captured = true;
        for ctx in self.funcs.iter().rev() {
            if ctx.id == owner {
                break;
            }
            let captures = &mut self.info.functions[ctx.id as usize].captures;
            if !captures.contains(&symbol) {
                captures.push(symbol);
            }
        }
    }

    fn problem(&mut self, span: Span, message: String) {
        self.info.problems.push(Problem { span, message });
    }

    fn set_const(&mut self, node: NodeId, value: Option<ConstValue>) {
        if let Some(value) = value {
            self.info.constants.insert(node, value);
        }
    }

    fn const_of(&self, node: NodeId) -> Option<ConstValue> {
        self.info.constants.get(&node).cloned()
    }

    // ---------------------------------------------------------------------
    // Declarations inside bodies and at package level
    // ---------------------------------------------------------------------

    fn var_spec(&mut self, spec: &VarSpec, global: bool) {
        let declared = spec.ty.as_ref().map(|t| self.resolve_type(t));
        let values: Vec<Type> = if spec.values.len() == spec.names.len() {
            spec.values.iter().map(|v| self.expr(v, declared.as_ref())).collect()
        } else if spec.values.len() == 1 {
            self.multi_value(&spec.values[0], spec.names.len())
        } else {
            for value in &spec.values {
                self.expr(value, None);
            }
            if !spec.values.is_empty() {
                self.problem(spec.span, format!("assignment mismatch: {} variables but {} values", spec.names.len(), spec.values.len()));
            }
            Vec::new()
        };

        for (i, name) in spec.names.iter().enumerate() {
            let ty = match &declared {
                Some(ty) => ty.clone(),
                None => values.get(i).map(|t| self.info.table.default_type(t)).unwrap_or(Type::Invalid),
            };
            if global {
                if let Some(&symbol) = self.info.defs.get(&name.id) {
                    self.info.symbols[symbol as usize].ty = ty.clone();
                }
                self.info.types.insert(name.id, ty);
            } else {
                let symbol = self.define_var(&name.name, name.id, name.span, ty);
                self.info.symbols[symbol as usize].zero_init = spec.values.is_empty();
            }
        }
    }

    fn const_specs(&mut self, specs: &[ConstSpec], global: bool) {
        let mut previous: Option<(Option<&TypeExpr>, &[Expr])> = None;
        for spec in specs {
            let (ty_expr, values) = if spec.values.is_empty() {
                previous.unwrap_or((spec.ty.as_ref(), spec.values.as_slice()))
            } else {
                (spec.ty.as_ref(), spec.values.as_slice())
            };
            previous = Some((ty_expr, values));

            self.iota = Some(i128::from(spec.iota));
            let declared = ty_expr.map(|t| self.resolve_type(t));
            for (i, name) in spec.names.iter().enumerate() {
                let (ty, value) = match values.get(i) {
                    Some(expr) => {
                        let ty = self.expr(expr, declared.as_ref());
                        let value = self.const_of(expr.id);
                        if value.is_none() && !ty.is_opaque() {
                            self.problem(expr.span, format!("{} is not constant", name.name));
                        }
                        (declared.clone().unwrap_or(ty), value)
                    }
                    None => {
                        self.problem(name.span, format!("missing init expr for const {}", name.name));
                        (Type::Invalid, None)
                    }
                };
                let symbol = if global {
                    self.info.defs.get(&name.id).copied()
                } else {
                    let symbol = Symbol::new(name.name.clone(), SymbolKind::Const, ty.clone(), name.span, name.id);
                    let id = self.add_symbol(symbol);
                    self.scopes.declare(&name.name, id);
                    self.info.defs.insert(name.id, id);
                    Some(id)
                };
                if let Some(symbol) = symbol {
                    let entry = &mut self.info.symbols[symbol as usize];
                    entry.ty = ty.clone();
                    entry.const_value = value.clone();
                    entry.owner = self.funcs.last().map(|ctx| ctx.id);
                }
                self.info.types.insert(name.id, ty);
                self.set_const(name.id, value);
            }
            self.iota = None;
        }
    }

    fn local_types(&mut self, specs: &[TypeSpec]) {
        for spec in specs {
            let ty = if spec.alias {
                Type::Invalid
            } else {
                let id = self.info.table.add_named(spec.name.name.clone(), "");
                self.named_of_spec.insert(spec.name.id, id);
                Type::Named(id, vec![])
            };
            let symbol = Symbol::new(spec.name.name.clone(), SymbolKind::Type, ty, spec.name.span, spec.name.id);
            let id = self.add_symbol(symbol);
            self.scopes.declare(&spec.name.name, id);
            self.info.defs.insert(spec.name.id, id);
            self.resolve_type_spec(spec, false);
        }
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, block: &Block) {
        self.scopes.push();
        self.stmts(&block.stmts);
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Empty | StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Goto(_) | StmtKind::Fallthrough => {}
            StmtKind::Expr(expr) | StmtKind::Go(expr) | StmtKind::Defer(expr) => {
                self.expr(expr, None);
            }
            StmtKind::Send { chan, value } => {
                let chan_ty = self.expr(chan, None);
                let elem = self.info.table.chan_of(&chan_ty).map(|(_, elem)| elem);
                self.expr(value, elem.as_ref());
            }
            StmtKind::IncDec { target, .. } => {
                self.expr(target, None);
            }
            StmtKind::Assign { lhs, op, rhs } => self.assign(stmt, lhs, *op, rhs),
            StmtKind::Var(specs) => {
                for spec in specs {
                    self.var_spec(spec, false);
                }
            }
            StmtKind::Const(specs) => self.const_specs(specs, false),
            StmtKind::Type(specs) => self.local_types(specs),
            StmtKind::Block(block) => self.block(block),
            StmtKind::If { init, cond, then, els } => {
                self.scopes.push();
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(cond, Some(&Type::bool()));
                self.block(then);
                if let Some(els) = els {
                    self.stmt(els);
                }
                self.scopes.pop();
            }
            StmtKind::For { init, cond, post, body } => {
                self.scopes.push();
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond, Some(&Type::bool()));
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
                self.scopes.pop();
            }
            StmtKind::Range { key, value, define, expr, body } => self.range_stmt(key.as_ref(), value.as_ref(), *define, expr, body),
            StmtKind::Switch { init, tag, cases } => {
                self.scopes.push();
                if let Some(init) = init {
                    self.stmt(init);
                }
                let tag_ty = tag.as_ref().map(|t| {
                    let ty = self.expr(t, None);
                    self.info.table.default_type(&ty)
                });
                for case in cases {
                    for expr in &case.exprs {
                        match &tag_ty {
                            Some(ty) => self.expr(expr, Some(ty)),
                            None => self.expr(expr, Some(&Type::bool())),
                        };
                    }
                    self.scopes.push();
                    self.stmts(&case.body);
                    self.scopes.pop();
                }
                self.scopes.pop();
            }
            StmtKind::TypeSwitch { init, binding, subject, cases } => {
                self.scopes.push();
                if let Some(init) = init {
                    self.stmt(init);
                }
                let subject_ty = self.expr(subject, None);
                for case in cases {
                    let mut case_types = Vec::new();
                    for te in &case.types {
                        let ty = match &te.kind {
                            TypeExprKind::Name { pkg: None, name, args } if name.name == "nil" && args.is_empty() && matches!(self.resolve_name("nil"), Resolved::Universe(UniverseEntry::Nil)) => {
                                Type::Basic(BasicKind::UntypedNil)
                            }
                            _ => self.resolve_type(te),
                        };
                        self.info.types.insert(te.id, ty.clone());
                        case_types.push(ty);
                    }
                    self.scopes.push();
                    if let Some(binding) = binding {
                        let ty = match case_types.as_slice() {
                            [single] if !case.is_default && !single.is_nil() => single.clone(),
                            _ => subject_ty.clone(),
                        };
                        let mut symbol = Symbol::new(binding.name.clone(), SymbolKind::Var, ty, binding.span, binding.id);
                        symbol.owner = self.current_func();
                        let id = self.add_symbol(symbol);
                        self.scopes.declare(&binding.name, id);
                        self.info.implicits.insert(case.id, id);
                    }
                    self.stmts(&case.body);
                    self.scopes.pop();
                }
                self.scopes.pop();
            }
            StmtKind::Select { cases } => {
                for case in cases {
                    self.scopes.push();
                    if let Some(comm) = &case.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&case.body);
                    self.scopes.pop();
                }
            }
            StmtKind::Return(exprs) => {
                let results = self.funcs.last().map(|ctx| ctx.results.clone()).unwrap_or_default();
                if exprs.len() == 1 && results.len() > 1 {
                    self.expr(&exprs[0], None);
                } else {
                    for (i, expr) in exprs.iter().enumerate() {
                        self.expr(expr, results.get(i));
                    }
                }
            }
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
        }
    }

    fn assign(&mut self, stmt: &Stmt, lhs: &[Expr], op: AssignOp, rhs: &[Expr]) {
        match op {
            AssignOp::Define => {
                let types = self.rhs_types(lhs.len(), rhs, stmt.span);
                let mut fresh = false;
                for (i, target) in lhs.iter().enumerate() {
                    let ty = self.info.table.default_type(types.get(i).unwrap_or(&Type::Invalid));
                    match &target.kind {
                        ExprKind::Ident(name) if name == "_" => {
                            self.info.types.insert(target.id, ty);
                        }
                        ExprKind::Ident(name) => match self.scopes.lookup_current(name) {
                            Some(existing) if self.info.symbol(existing).kind == SymbolKind::Var => {
                                self.info.uses.insert(target.id, existing);
                                let declared = self.info.symbol(existing).ty.clone();
                                self.info.types.insert(target.id, declared);
                            }
                            _ => {
                                fresh = true;
                                self.define_var(name, target.id, target.span, ty);
                            }
                        },
                        _ => {
                            self.problem(target.span, "non-name on left side of :=".to_string());
                            self.expr(target, None);
                        }
                    }
                }
                if !fresh && lhs.iter().any(|t| !t.is_blank()) {
                    self.problem(stmt.span, "no new variables on left side of :=".to_string());
                }
            }
            AssignOp::Assign => {
                let targets: Vec<Option<Type>> = lhs
                    .iter()
                    .map(|target| {
                        if target.is_blank() {
                            self.info.types.insert(target.id, Type::Invalid);
                            None
                        } else {
                            Some(self.expr(target, None))
                        }
                    })
                    .collect();
                if lhs.len() == rhs.len() {
                    for (i, value) in rhs.iter().enumerate() {
                        self.expr(value, targets[i].as_ref());
                    }
                } else {
                    self.rhs_types(lhs.len(), rhs, stmt.span);
                }
            }
            AssignOp::Compound(op) => {
                let target = lhs.first().map(|t| self.expr(t, None));
                for value in rhs {
                    let expected = if op.is_shift() { None } else { target.as_ref() };
                    self.expr(value, expected);
                }
            }
        }
    }

    fn rhs_types(&mut self, count: usize, rhs: &[Expr], span: Span) -> Vec<Type> {
        if rhs.len() == count {
            rhs.iter().map(|value| self.expr(value, None)).collect()
        } else if rhs.len() == 1 {
            self.multi_value(&rhs[0], count)
        } else {
            for value in rhs {
                self.expr(value, None);
            }
            self.problem(span, format!("assignment mismatch: {} variables but {} values", count, rhs.len()));
            vec![Type::Invalid; count]
        }
    }

    /// Types of a single expression assigned to several targets
    fn multi_value(&mut self, expr: &Expr, count: usize) -> Vec<Type> {
        let ty = self.expr(expr, None);
        let inner = expr.unparen();
        let comma_ok = count == 2
            && match &inner.kind {
                ExprKind::Index { base, .. } => matches!(self.info.table.core_type(self.info.type_of(base.id)), Some(Type::Map(..))),
                ExprKind::Unary { op: UnaryOp::Recv, .. } => true,
                ExprKind::TypeAssert { ty: Some(_), .. } => true,
                _ => false,
            };
        if comma_ok {
            self.info.comma_ok.insert(inner.id);
            return vec![ty, Type::bool()];
        }
        match ty {
            Type::Tuple(items) => {
                if items.len() != count {
                    self.problem(expr.span, format!("assignment mismatch: {} variables but {} values", count, items.len()));
                }
                let mut items = items;
                items.resize(count, Type::Invalid);
                items
            }
            other if other.is_opaque() => vec![other; count],
            _ => {
                self.problem(expr.span, format!("assignment mismatch: {} variables but 1 value", count));
                vec![Type::Invalid; count]
            }
        }
    }

    fn range_stmt(&mut self, key: Option<&Expr>, value: Option<&Expr>, define: bool, expr: &Expr, body: &Block) {
        self.scopes.push();
        let ty = self.expr(expr, None);
        let (key_ty, value_ty) = match self.info.table.core_type(&ty) {
            Some(Type::Slice(elem)) | Some(Type::Array(_, elem)) => (Type::int(), *elem),
            Some(Type::Pointer(inner)) => match self.info.table.underlying(&inner) {
                Type::Array(_, elem) => (Type::int(), *elem),
                _ => (Type::Invalid, Type::Invalid),
            },
            Some(Type::Basic(kind)) if kind.is_string() => (Type::int(), Type::Basic(BasicKind::Int32)),
            Some(Type::Basic(kind)) if kind.is_integer() => (self.info.table.default_type(&ty), Type::Invalid),
            Some(Type::Map(k, v)) => (*k, *v),
            Some(Type::Chan(_, elem)) => (*elem, Type::Invalid),
            Some(Type::Func(_)) | Some(Type::Unknown) | None => (Type::Unknown, Type::Unknown),
            Some(other) => {
                if !other.is_invalid() {
                    let shown = self.info.table.type_string(&ty);
                    self.problem(expr.span, format!("cannot range over {}", shown));
                }
                (Type::Invalid, Type::Invalid)
            }
        };
        for (target, ty) in [(key, key_ty), (value, value_ty)] {
            let Some(target) = target else { continue };
            if define {
                match &target.kind {
                    ExprKind::Ident(name) => {
                        self.define_var(name, target.id, target.span, ty);
                    }
                    _ => {
                        self.problem(target.span, "non-name on left side of :=".to_string());
                    }
                }
            } else if !target.is_blank() {
                self.expr(target, None);
            }
        }
        self.block(body);
        self.scopes.pop();
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Type an expression; `expected` guides untyped constants and elided literal types
    fn expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        let ty = self.expr_inner(expr, expected);
        self.info.types.insert(expr.id, ty.clone());
        ty
    }

    fn expr_inner(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::Ident(name) => self.ident(expr, name),
            ExprKind::BasicLit { kind, raw } => self.basic_lit(expr, *kind, raw),
            ExprKind::CompositeLit { ty, elems } => self.composite_lit(expr, ty.as_deref(), elems, expected),
            ExprKind::FuncLit { sig, body } => self.func_lit(expr, sig, body),
            ExprKind::Paren(inner) => {
                let ty = self.expr(inner, expected);
                let value = self.const_of(inner.id);
                self.set_const(expr.id, value);
                ty
            }
            ExprKind::Selector { base, field } => self.selector(expr, base, field),
            ExprKind::Index { base, indices } => self.index(expr, base, indices),
            ExprKind::Slice { base, low, high, max } => {
                let base_ty = self.expr(base, None);
                for part in [low, high, max].into_iter().flatten() {
                    self.expr(part, Some(&Type::int()));
                }
                match self.info.table.core_type(&base_ty) {
                    Some(Type::Basic(kind)) if kind.is_string() => Type::string(),
                    Some(Type::Slice(_)) => base_ty,
                    Some(Type::Array(_, elem)) => Type::Slice(elem),
                    Some(Type::Pointer(inner)) => match self.info.table.underlying(&inner) {
                        Type::Array(_, elem) => Type::Slice(elem),
                        _ => Type::Invalid,
                    },
                    Some(Type::Unknown) | None => Type::Unknown,
                    _ => Type::Invalid,
                }
            }
            ExprKind::TypeAssert { base, ty } => {
                self.expr(base, None);
                match ty {
                    Some(te) => self.resolve_type(te),
                    None => {
                        self.problem(expr.span, "use of .(type) outside type switch".to_string());
                        Type::Invalid
                    }
                }
            }
            ExprKind::Call { func, args, ellipsis } => self.call(expr, func, args, *ellipsis),
            ExprKind::Unary { op, operand } => self.unary(expr, *op, operand, expected),
            ExprKind::Binary { op, lhs, rhs } => self.binary(expr, *op, lhs, rhs, expected),
            ExprKind::Type(te) => {
                let ty = self.resolve_type(te);
                self.problem(expr.span, format!("{} is not an expression", self.info.table.type_string(&ty)));
                Type::Invalid
            }
        }
    }

    fn ident(&mut self, expr: &Expr, name: &str) -> Type {
        if name == "_" {
            self.problem(expr.span, "cannot use _ as value".to_string());
            return Type::Invalid;
        }
        match self.resolve_name(name) {
            Resolved::Symbol(id) => {
                self.info.uses.insert(expr.id, id);
                self.note_capture(id);
                let symbol = self.info.symbol(id);
                match symbol.kind {
                    SymbolKind::Var | SymbolKind::Func => symbol.ty.clone(),
                    SymbolKind::Const => {
                        let (ty, value) = (symbol.ty.clone(), symbol.const_value.clone());
                        self.set_const(expr.id, value);
                        ty
                    }
                    SymbolKind::Type | SymbolKind::Package => {
                        self.problem(expr.span, format!("{} is not an expression", name));
                        Type::Invalid
                    }
                }
            }
            Resolved::Universe(UniverseEntry::Const(ty, value)) => {
                self.set_const(expr.id, Some(value));
                ty
            }
            Resolved::Universe(UniverseEntry::Nil) => Type::Basic(BasicKind::UntypedNil),
            Resolved::Universe(UniverseEntry::Iota) => match self.iota {
                Some(value) => {
                    self.set_const(expr.id, Some(ConstValue::int(value)));
                    Type::Basic(BasicKind::UntypedInt)
                }
                None => {
                    self.problem(expr.span, "cannot use iota outside constant declaration".to_string());
                    Type::Invalid
                }
            },
            Resolved::Universe(UniverseEntry::Builtin(builtin)) => {
                self.problem(expr.span, format!("{} must be called", builtin.name()));
                Type::Invalid
            }
            Resolved::Universe(UniverseEntry::Type(_)) => {
                self.problem(expr.span, format!("{} is not an expression", name));
                Type::Invalid
            }
            Resolved::Import(_) => {
                self.problem(expr.span, format!("use of package {} without selector", name));
                Type::Invalid
            }
            Resolved::Undefined => {
                self.problem(expr.span, format!("undefined: {}", name));
                Type::Invalid
            }
        }
    }

    fn basic_lit(&mut self, expr: &Expr, kind: LitKind, raw: &str) -> Type {
        match kind {
            LitKind::Int => {
                self.set_const(expr.id, parse_int_literal(raw).map(ConstValue::Int));
                Type::Basic(BasicKind::UntypedInt)
            }
            LitKind::Float => {
                self.set_const(expr.id, raw.replace('_', "").parse::<f64>().ok().map(ConstValue::Float));
                Type::Basic(BasicKind::UntypedFloat)
            }
            LitKind::Imag => Type::Basic(BasicKind::Complex128),
            LitKind::Rune => {
                self.set_const(expr.id, unquote_rune(raw).map(|c| ConstValue::int(u32::from(c))));
                Type::Basic(BasicKind::UntypedRune)
            }
            LitKind::String => {
                self.set_const(expr.id, Some(ConstValue::String(unquote_string(raw))));
                Type::Basic(BasicKind::UntypedString)
            }
        }
    }

    fn composite_lit(&mut self, expr: &Expr, ty: Option<&TypeExpr>, elems: &[KeyedElement], expected: Option<&Type>) -> Type {
        let (lit_ty, result) = match ty {
            Some(te) => {
                let mut resolved = self.resolve_type(te);
                if let (TypeExprKind::Array { len: None, .. }, Type::Array(_, elem)) = (&te.kind, &resolved) {
                    let count = self.literal_length(elems);
                    resolved = Type::Array(count, elem.clone());
                    self.info.types.insert(te.id, resolved.clone());
                }
                (resolved.clone(), resolved)
            }
            None => match expected {
                Some(Type::Pointer(inner)) => ((**inner).clone(), Type::Pointer(inner.clone())),
                Some(expected) => (expected.clone(), expected.clone()),
                None => {
                    self.problem(expr.span, "missing type in composite literal".to_string());
                    (Type::Invalid, Type::Invalid)
                }
            },
        };

        match self.info.table.core_type(&lit_ty) {
            Some(Type::Struct(fields)) => {
                let keyed = elems.first().is_some_and(|e| e.key.is_some());
                for (i, elem) in elems.iter().enumerate() {
                    let field_ty = if keyed {
                        match elem.key.as_ref().and_then(|k| k.as_ident().map(|n| (k, n.to_string()))) {
                            Some((key, name)) => {
                                self.info.selections.insert(key.id, Selection::Field);
                                match fields.iter().find(|f| f.name == name) {
                                    Some(field) => {
                                        self.info.types.insert(key.id, field.ty.clone());
                                        Some(field.ty.clone())
                                    }
                                    None => {
                                        let shown = self.info.table.type_string(&lit_ty);
                                        self.problem(key.span, format!("unknown field {} in struct literal of type {}", name, shown));
                                        None
                                    }
                                }
                            }
                            None => {
                                self.problem(elem.value.span, "mixture of field:value and value elements in struct literal".to_string());
                                None
                            }
                        }
                    } else {
                        if i == fields.len() {
                            self.problem(elem.value.span, "too many values in struct literal".to_string());
                        }
                        fields.get(i).map(|f| f.ty.clone())
                    };
                    self.expr(&elem.value, field_ty.as_ref());
                }
            }
            Some(Type::Slice(elem_ty)) | Some(Type::Array(_, elem_ty)) => {
                for elem in elems {
                    if let Some(key) = &elem.key {
                        self.expr(key, Some(&Type::int()));
                    }
                    self.expr(&elem.value, Some(&elem_ty));
                }
            }
            Some(Type::Map(key_ty, value_ty)) => {
                for elem in elems {
                    match &elem.key {
                        Some(key) => {
                            self.expr(key, Some(&key_ty));
                        }
                        None => self.problem(elem.value.span, "missing key in map literal".to_string()),
                    }
                    self.expr(&elem.value, Some(&value_ty));
                }
            }
            other => {
                if !matches!(other, Some(Type::Invalid) | Some(Type::Unknown) | None) {
                    let shown = self.info.table.type_string(&lit_ty);
                    self.problem(expr.span, format!("invalid composite literal type {}", shown));
                }
                for elem in elems {
                    if let Some(key) = &elem.key {
                        if key.as_ident().is_none() {
                            self.expr(key, None);
                        }
                    }
                    self.expr(&elem.value, None);
                }
            }
        }
        result
    }

    fn literal_length(&self, elems: &[KeyedElement]) -> u64 {
        let mut next = 0u64;
        let mut max = 0u64;
        for elem in elems {
            if let Some(index) = elem.key.as_ref().and_then(|k| match &k.kind {
                ExprKind::BasicLit { kind: LitKind::Int, raw } => parse_int_literal(raw).and_then(|v| v.to_u64()),
                _ => None,
            }) {
                next = index;
            }
            next += 1;
            max = max.max(next);
        }
        max
    }

    fn func_lit(&mut self, expr: &Expr, sig: &FuncTypeExpr, body: &Block) -> Type {
        let parent = self.current_func();
        let name = match parent {
            Some(parent) => {
                let counter = self.closure_counter.entry(parent).or_insert(0);
                if !self.info.func_of_node.contains_key(&expr.id) {
                    *counter += 1;
                }
                format!("{}.func{}", self.info.functions[parent as usize].name, counter)
            }
            None => "glob.func".to_string(),
        };
        let id = self.new_function(expr.id, expr.span, parent, name);
        let resolved = self.resolve_sig(sig);
        self.info.functions[id as usize].sig = resolved.clone();
        self.check_body(id, None, sig, body);
        Type::func(resolved)
    }

    fn selector(&mut self, expr: &Expr, base: &Expr, field: &Ident) -> Type {
        if let ExprKind::Ident(pkg) = &base.kind {
            if let Resolved::Import(target) = self.resolve_name(pkg) {
                return self.package_member(expr, pkg, target, field);
            }
        }

        let base_ty = self.expr(base, None);
        if base_ty.is_opaque() {
            self.info.selections.insert(expr.id, Selection::Unknown);
            return if base_ty == Type::Unknown { Type::Unknown } else { Type::Invalid };
        }
        if let Some(ty) = self.info.table.lookup_field(&base_ty, &field.name) {
            self.info.selections.insert(expr.id, Selection::Field);
            return ty;
        }
        if let Some(found) = self.info.table.lookup_method(&base_ty, &field.name) {
            let named = match &base_ty {
                Type::Pointer(inner) => match inner.as_ref() {
                    Type::Named(id, _) => Some(*id),
                    _ => None,
                },
                Type::Named(id, _) => Some(*id),
                _ => None,
            };
            self.info.selections.insert(
                expr.id,
                Selection::Method {
                    named: found.named.or(named),
                    func: found.func,
                    pointer_recv: found.pointer_recv,
                    from_interface: found.from_interface,
                },
            );
            return Type::func(found.sig);
        }
        let shown = self.info.table.type_string(&base_ty);
        self.problem(field.span, format!("{}.{} undefined (type {} has no field or method {})", shown, field.name, shown, field.name));
        Type::Invalid
    }

    fn package_member(&mut self, expr: &Expr, pkg: &str, target: ImportTarget, field: &Ident) -> Type {
        match target {
            ImportTarget::Std(path) => {
                self.info.selections.insert(expr.id, Selection::Package { path: path.clone() });
                match self.info.stdlib.member(&path, &field.name).cloned() {
                    Some(StdMember::Func(sig)) => Type::func(sig),
                    Some(StdMember::Var(ty)) => ty,
                    Some(StdMember::Const(ty, value)) => {
                        self.set_const(expr.id, Some(value));
                        ty
                    }
                    Some(StdMember::Type(_)) => {
                        self.problem(expr.span, format!("{}.{} is not an expression", pkg, field.name));
                        Type::Invalid
                    }
                    None => {
                        self.problem(field.span, format!("undefined: {}.{}", pkg, field.name));
                        Type::Invalid
                    }
                }
            }
            ImportTarget::Local(p) => {
                let path = self.packages[p].dir.clone();
                self.info.selections.insert(expr.id, Selection::Package { path });
                match self.pkg_scopes[p].get(&field.name).copied() {
                    Some(id) => {
                        self.info.uses.insert(expr.id, id);
                        self.info.uses.insert(field.id, id);
                        let symbol = self.info.symbol(id);
                        let (kind, ty, value) = (symbol.kind, symbol.ty.clone(), symbol.const_value.clone());
                        if kind == SymbolKind::Const {
                            self.set_const(expr.id, value);
                        }
                        if kind == SymbolKind::Type {
                            self.problem(expr.span, format!("{}.{} is not an expression", pkg, field.name));
                            return Type::Invalid;
                        }
                        ty
                    }
                    None => {
                        self.problem(field.span, format!("undefined: {}.{}", pkg, field.name));
                        Type::Invalid
                    }
                }
            }
            ImportTarget::Missing(path) => {
                self.info.selections.insert(expr.id, Selection::Package { path });
                Type::Unknown
            }
        }
    }

    /// Generic function named by an expression
    fn generic_func(&self, expr: &Expr) -> Option<FuncId> {
        let symbol = match &expr.unparen().kind {
            ExprKind::Ident(name) => match self.resolve_name(name) {
                Resolved::Symbol(id) => id,
                _ => return None,
            },
            ExprKind::Selector { base, field } => match &base.kind {
                ExprKind::Ident(pkg) => match self.resolve_name(pkg) {
                    Resolved::Import(ImportTarget::Local(p)) => *self.pkg_scopes[p].get(&field.name)?,
                    _ => return None,
                },
                _ => return None,
            },
            _ => return None,
        };
        let func = self.info.symbol(symbol).func?;
        self.info.func(func).is_generic().then_some(func)
    }

    fn index(&mut self, expr: &Expr, base: &Expr, indices: &[Expr]) -> Type {
        if let Some(func) = self.generic_func(base) {
            let fty = self.expr(base, None);
            let args: Vec<Type> = indices
                .iter()
                .map(|index| {
                    let te = expr_to_type(index.clone());
                    let ty = self.resolve_type(&te);
                    self.info.types.insert(index.id, ty.clone());
                    ty
                })
                .collect();
            let info = self.info.func(func);
            let (params, name) = (info.type_params.clone(), info.name.clone());
            if args.len() > params.len() {
                self.problem(expr.span, format!("got {} type arguments but {} has {} type parameters", args.len(), name, params.len()));
            }
            let mut map = HashMap::new();
            let mut recorded = Vec::new();
            for (i, &param) in params.iter().enumerate() {
                let arg = args.get(i).cloned();
                map.insert(param, arg.clone().unwrap_or(Type::Unknown));
                recorded.push(arg);
            }
            self.info.instantiations.push(Instantiation {
                node: expr.id,
                span: expr.span,
                name,
                params,
                args: recorded,
            });
            return self.info.table.substitute(&fty, &map);
        }

        let base_ty = self.expr(base, None);
        let core = self.info.table.core_type(&base_ty);
        let key_ty = match &core {
            Some(Type::Map(key, _)) => Some((**key).clone()),
            _ => None,
        };
        for index in indices {
            match &key_ty {
                Some(key) => self.expr(index, Some(key)),
                None => self.expr(index, Some(&Type::int())),
            };
        }
        match core {
            Some(Type::Slice(elem)) | Some(Type::Array(_, elem)) => *elem,
            Some(Type::Pointer(inner)) => match self.info.table.underlying(&inner) {
                Type::Array(_, elem) => *elem,
                _ => {
                    let shown = self.info.table.type_string(&base_ty);
                    self.problem(expr.span, format!("cannot index {}", shown));
                    Type::Invalid
                }
            },
            Some(Type::Basic(kind)) if kind.is_string() => {
                if let (Some(ConstValue::String(s)), Some(i)) = (self.const_of(base.id), indices.first().and_then(|i| self.info.const_int(i.id))) {
                    let byte = usize::try_from(i).ok().and_then(|i| s.as_bytes().get(i).copied());
                    self.set_const(expr.id, byte.map(|b| ConstValue::int(b)));
                }
                Type::Basic(BasicKind::Uint8)
            }
            Some(Type::Map(_, value)) => *value,
            Some(Type::Unknown) | None => Type::Unknown,
            Some(Type::Invalid) => Type::Invalid,
            Some(_) => {
                let shown = self.info.table.type_string(&base_ty);
                self.problem(expr.span, format!("cannot index {}", shown));
                Type::Invalid
            }
        }
    }

    fn builtin_of(&self, func: &Expr) -> Option<Builtin> {
        match &func.unparen().kind {
            ExprKind::Ident(name) => match self.resolve_name(name) {
                Resolved::Universe(UniverseEntry::Builtin(builtin)) => Some(builtin),
                _ => None,
            },
            _ => None,
        }
    }

    /// Classify the target of a call from its (already typed) function expression
    fn callee_of(&self, func: &Expr) -> Callee {
        let func = func.unparen();
        match &func.kind {
            ExprKind::Ident(_) => match self.info.uses.get(&func.id).map(|&id| self.info.symbol(id)) {
                Some(symbol) if symbol.kind == SymbolKind::Func => symbol.func.map(Callee::Func).unwrap_or(Callee::Dynamic),
                Some(symbol) if symbol.ty == Type::Unknown => Callee::External,
                _ => Callee::Dynamic,
            },
            ExprKind::FuncLit { .. } => self.info.func_of_node.get(&func.id).map(|&id| Callee::Func(id)).unwrap_or(Callee::Dynamic),
            ExprKind::Index { base, .. } => self.callee_of(base),
            ExprKind::Selector { field, .. } => match self.info.selections.get(&func.id) {
                Some(Selection::Package { path }) => {
                    if self.info.stdlib.is_modeled(path) {
                        Callee::Stdlib {
                            pkg: path.clone(),
                            name: field.name.clone(),
                        }
                    } else {
                        match self.info.uses.get(&func.id).map(|&id| self.info.symbol(id)) {
                            Some(symbol) if symbol.kind == SymbolKind::Func => symbol.func.map(Callee::Func).unwrap_or(Callee::Dynamic),
                            Some(_) => Callee::Dynamic,
                            None => Callee::External,
                        }
                    }
                }
                Some(Selection::Method { named, func: target, from_interface, .. }) => {
                    if let Some(id) = target {
                        return Callee::Func(*id);
                    }
                    if let Some(named) = named {
                        if !self.info.table.named(*named).pkg.is_empty() {
                            return Callee::StdMethod {
                                type_name: self.info.table.qualified_name(*named),
                                method: field.name.clone(),
                            };
                        }
                    }
                    if *from_interface {
                        Callee::Interface { method: field.name.clone() }
                    } else {
                        Callee::External
                    }
                }
                Some(Selection::Unknown) => Callee::External,
                _ => Callee::Dynamic,
            },
            _ => Callee::Dynamic,
        }
    }

    fn call(&mut self, expr: &Expr, func: &Expr, args: &[Expr], ellipsis: bool) -> Type {
        if let Some(target) = self.expr_as_type(func) {
            self.info.callees.insert(expr.id, Callee::Conversion(target.clone()));
            if args.len() != 1 {
                self.problem(expr.span, format!("conversion to {} needs exactly one argument", self.info.table.type_string(&target)));
            }
            for arg in args {
                let arg_ty = self.expr(arg, None);
                if let Some(value) = self.const_of(arg.id) {
                    if let Some(converted) = convert_const(&value, &self.info.table.underlying(&target), &arg_ty) {
                        self.set_const(expr.id, Some(converted));
                    }
                }
            }
            return target;
        }

        if let Some(builtin) = self.builtin_of(func) {
            self.info.callees.insert(expr.id, Callee::Builtin(builtin));
            return self.builtin_call(expr, builtin, args, ellipsis);
        }

        let generic = if matches!(func.unparen().kind, ExprKind::Index { .. }) { None } else { self.generic_func(func) };
        let func_ty = self.expr(func, None);
        let callee = self.callee_of(func);
        self.info.callees.insert(expr.id, callee);

        if func_ty.is_opaque() {
            for arg in args {
                self.expr(arg, None);
            }
            return if func_ty == Type::Unknown { Type::Unknown } else { Type::Invalid };
        }
        let Some(sig) = self.info.table.signature_of(&func_ty) else {
            let shown = self.info.table.type_string(&func_ty);
            self.problem(func.span, format!("cannot call non-function (type {})", shown));
            for arg in args {
                self.expr(arg, None);
            }
            return Type::Invalid;
        };

        let sig = match generic {
            Some(generic) => {
                let arg_types: Vec<Type> = args.iter().map(|arg| self.expr(arg, None)).collect();
                let info = self.info.func(generic);
                let (params, name) = (info.type_params.clone(), info.name.clone());
                let inferred = self.infer(&params, &sig, &arg_types, ellipsis);
                let mut map = HashMap::new();
                let mut recorded = Vec::new();
                for &param in &params {
                    let arg = inferred.get(&param).cloned();
                    map.insert(param, arg.clone().unwrap_or(Type::Unknown));
                    recorded.push(arg);
                }
                self.info.instantiations.push(Instantiation {
                    node: expr.id,
                    span: expr.span,
                    name,
                    params,
                    args: recorded,
                });
                self.info.types.insert(func.id, Type::func(self.info.table.substitute_sig(&sig, &map)));
                self.info.table.substitute_sig(&sig, &map)
            }
            None => {
                for (i, arg) in args.iter().enumerate() {
                    let expected = param_type_at(&sig, i, ellipsis);
                    self.expr(arg, expected.as_ref());
                }
                sig
            }
        };
        sig.result_type()
    }

    fn infer(&self, params: &[TypeParamId], sig: &Signature, args: &[Type], ellipsis: bool) -> HashMap<TypeParamId, Type> {
        let mut map = HashMap::new();
        // Typed arguments first, untyped constants only fill what is left
        for untyped_pass in [false, true] {
            for (i, arg) in args.iter().enumerate() {
                if arg.is_untyped() != untyped_pass || arg.is_opaque() || arg.is_nil() {
                    continue;
                }
                let Some(param) = param_type_at(sig, i, ellipsis) else { continue };
                let arg = self.info.table.default_type(arg);
                self.unify(&param, &arg, params, &mut map, 0);
            }
        }
        map
    }

    fn unify(&self, param: &Type, arg: &Type, params: &[TypeParamId], map: &mut HashMap<TypeParamId, Type>, depth: usize) {
        if depth > 8 {
            return;
        }
        match (param, arg) {
            (Type::TypeParam(id), _) if params.contains(id) => {
                map.entry(*id).or_insert_with(|| arg.clone());
            }
            (Type::Pointer(p), Type::Pointer(a)) | (Type::Slice(p), Type::Slice(a)) | (Type::Array(_, p), Type::Array(_, a)) | (Type::Chan(_, p), Type::Chan(_, a)) => {
                self.unify(p, a, params, map, depth + 1)
            }
            (Type::Map(pk, pv), Type::Map(ak, av)) => {
                self.unify(pk, ak, params, map, depth + 1);
                self.unify(pv, av, params, map, depth + 1);
            }
            (Type::Func(p), Type::Func(a)) => {
                for (pp, ap) in p.params.iter().zip(&a.params) {
                    self.unify(pp, ap, params, map, depth + 1);
                }
                for (pr, ar) in p.results.iter().zip(&a.results) {
                    self.unify(pr, ar, params, map, depth + 1);
                }
            }
            (Type::Named(p, pargs), Type::Named(a, aargs)) if p == a => {
                for (pa, aa) in pargs.iter().zip(aargs) {
                    self.unify(pa, aa, params, map, depth + 1);
                }
            }
            (Type::Named(..), _) => {}
            (_, Type::Named(..)) => {
                let under = self.info.table.underlying(arg);
                self.unify(param, &under, params, map, depth + 1);
            }
            _ => {}
        }
    }

    fn builtin_call(&mut self, expr: &Expr, builtin: Builtin, args: &[Expr], ellipsis: bool) -> Type {
        let first_type = if builtin.takes_type() {
            args.first().map(|arg| match self.expr_as_type(arg) {
                Some(ty) => ty,
                None => {
                    self.problem(arg.span, format!("{} expects a type argument", builtin.name()));
                    self.expr(arg, None)
                }
            })
        } else {
            None
        };
        let rest = if builtin.takes_type() { args.get(1..).unwrap_or(&[]) } else { args };

        match builtin {
            Builtin::Make => {
                for arg in rest {
                    self.expr(arg, Some(&Type::int()));
                }
                first_type.unwrap_or(Type::Invalid)
            }
            Builtin::New => Type::pointer(first_type.unwrap_or(Type::Invalid)),
            Builtin::Len | Builtin::Cap => {
                let arg_ty = rest.first().map(|arg| self.expr(arg, None));
                if let Some(arg) = rest.first() {
                    match (self.const_of(arg.id), arg_ty.as_ref().map(|t| self.info.table.underlying(t))) {
                        (Some(ConstValue::String(s)), _) if builtin == Builtin::Len => self.set_const(expr.id, Some(ConstValue::int(s.len()))),
                        (_, Some(Type::Array(n, _))) => self.set_const(expr.id, Some(ConstValue::int(n))),
                        _ => {}
                    }
                }
                Type::int()
            }
            Builtin::Append => {
                let slice_ty = rest.first().map(|arg| self.expr(arg, None)).unwrap_or(Type::Invalid);
                let elem = match self.info.table.core_type(&slice_ty) {
                    Some(Type::Slice(elem)) => Some(*elem),
                    _ => None,
                };
                for arg in rest.iter().skip(1) {
                    if ellipsis {
                        self.expr(arg, Some(&slice_ty));
                    } else {
                        self.expr(arg, elem.as_ref());
                    }
                }
                slice_ty
            }
            Builtin::Copy => {
                for arg in rest {
                    self.expr(arg, None);
                }
                Type::int()
            }
            Builtin::Delete => {
                let map_ty = rest.first().map(|arg| self.expr(arg, None));
                let key = map_ty.and_then(|t| match self.info.table.core_type(&t) {
                    Some(Type::Map(key, _)) => Some(*key),
                    _ => None,
                });
                for arg in rest.iter().skip(1) {
                    self.expr(arg, key.as_ref());
                }
                Type::Tuple(vec![])
            }
            Builtin::Close | Builtin::Clear | Builtin::Print | Builtin::Println => {
                for arg in rest {
                    self.expr(arg, None);
                }
                Type::Tuple(vec![])
            }
            Builtin::Panic => {
                for arg in rest {
                    self.expr(arg, Some(&Type::empty_interface()));
                }
                Type::Tuple(vec![])
            }
            Builtin::Recover => Type::empty_interface(),
            Builtin::Min | Builtin::Max => {
                let types: Vec<Type> = rest.iter().map(|arg| self.expr(arg, None)).collect();
                let typed = types.iter().find(|t| !t.is_untyped()).cloned();
                let result = typed.or_else(|| types.first().cloned()).unwrap_or(Type::Invalid);
                let values: Option<Vec<ConstValue>> = rest.iter().map(|arg| self.const_of(arg.id)).collect();
                if let Some(values) = values {
                    let folded = values.into_iter().reduce(|a, b| {
                        let pick_b = match const_binary(BinaryOp::Lt, &b, &a) {
                            Some(ConstValue::Bool(less)) => less == (builtin == Builtin::Min),
                            _ => false,
                        };
                        if pick_b { b } else { a }
                    });
                    self.set_const(expr.id, folded);
                }
                result
            }
            Builtin::Complex => {
                for arg in rest {
                    self.expr(arg, None);
                }
                Type::Basic(BasicKind::Complex128)
            }
            Builtin::Real | Builtin::Imag => {
                for arg in rest {
                    self.expr(arg, None);
                }
                Type::Basic(BasicKind::Float64)
            }
        }
    }

    fn unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr, expected: Option<&Type>) -> Type {
        match op {
            UnaryOp::AddrOf => {
                let pointee = match expected {
                    Some(Type::Pointer(inner)) => Some((**inner).clone()),
                    _ => None,
                };
                let ty = self.expr(operand, pointee.as_ref());
                if let Some(symbol) = self.info.root_symbol(operand) {
                    if !matches!(operand.unparen().kind, ExprKind::Unary { op: UnaryOp::Deref, .. }) {
                        self.info.symbols[symbol as usize].address_taken = true;
                    }
                }
                if ty.is_opaque() { ty } else { Type::pointer(ty) }
            }
            _ => {
                let guide = if matches!(op, UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot) { expected } else { None };
                let ty = self.expr(operand, guide);
                let result = self.info.table.unary_result(op, &ty).unwrap_or(Type::Invalid);
                if let Some(value) = self.const_of(operand.id) {
                    self.set_const(expr.id, const_unary(op, &value));
                }
                result
            }
        }
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr, expected: Option<&Type>) -> Type {
        let guide = if op.is_comparison() || op.is_logical() { None } else { expected };
        let lhs_ty = self.expr(lhs, guide);
        let rhs_ty = if op.is_shift() { self.expr(rhs, None) } else { self.expr(rhs, guide) };
        let result = self.info.table.binary_result(op, &lhs_ty, &rhs_ty).unwrap_or(Type::Invalid);
        if let (Some(a), Some(b)) = (self.const_of(lhs.id), self.const_of(rhs.id)) {
            self.set_const(expr.id, const_binary(op, &a, &b));
        }
        result
    }
}

/// Expected parameter type for the argument at `index`
pub(crate) fn param_type_at(sig: &Signature, index: usize, ellipsis: bool) -> Option<Type> {
    if sig.variadic && !sig.params.is_empty() && index + 1 >= sig.params.len() {
        let last = sig.params.last()?;
        if ellipsis {
            return Some(last.clone());
        }
        return match last {
            Type::Slice(elem) => Some((**elem).clone()),
            other => Some(other.clone()),
        };
    }
    sig.params.get(index).cloned()
}

fn restrict_terms(iface: &mut InterfaceType, terms: Vec<Term>) {
    iface.terms = match iface.terms.take() {
        None => Some(terms),
        Some(existing) => Some(existing.into_iter().filter(|t| terms.iter().any(|n| n.ty == t.ty)).collect()),
    };
}

fn embedded_name(te: &TypeExpr) -> String {
    match &te.kind {
        TypeExprKind::Pointer(inner) => embedded_name(inner),
        TypeExprKind::Name { name, .. } => name.name.clone(),
        _ => "_".to_string(),
    }
}

/// Parse an integer literal in any base, with digit separators
pub fn parse_int_literal(raw: &str) -> Option<BigInt> {
    let digits = raw.replace('_', "");
    let lower = digits.to_ascii_lowercase();
    let (body, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    BigInt::parse_bytes(body.as_bytes(), radix)
}

fn convert_const(value: &ConstValue, target: &Type, from: &Type) -> Option<ConstValue> {
    let Type::Basic(kind) = target else { return None };
    match value {
        ConstValue::Int(v) if kind.is_integer() => Some(ConstValue::Int(v.clone())),
        ConstValue::Int(v) if kind.is_float() => v.to_f64().map(ConstValue::Float),
        ConstValue::Int(v) if kind.is_string() && from.is_untyped() => char::from_u32(v.to_u32()?).map(|c| ConstValue::String(c.to_string())),
        ConstValue::Float(f) if kind.is_float() => Some(ConstValue::Float(*f)),
        ConstValue::Float(f) if kind.is_integer() && f.fract() == 0.0 => BigInt::from_f64(*f).map(ConstValue::Int),
        ConstValue::String(s) if kind.is_string() => Some(ConstValue::String(s.clone())),
        ConstValue::Bool(b) if kind.is_boolean() => Some(ConstValue::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_file;

    fn check(source: &str) -> (Vec<File>, TypeInfo) {
        let (file, _) = parse_file(source, 0, "pkg/main.go", 0).unwrap();
        let files = vec![file];
        let (_, info) = check_program(&files, 64);
        (files, info)
    }

    fn func_named<'i>(info: &'i TypeInfo, name: &str) -> &'i FuncInfo {
        info.functions.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn test_resolves_signatures_and_locals() {
        let (_, info) = check("package main\nfunc add(a, b int) int {\n\tc := a + b\n\treturn c\n}\n");
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        let add = func_named(&info, "add");
        assert_eq!(add.sig, Signature::new(vec![Type::int(), Type::int()], vec![Type::int()]));
        assert_eq!(add.params.len(), 2);
        let c = info.symbols.iter().find(|s| s.name == "c").unwrap();
        assert_eq!(c.ty, Type::int());
        assert_eq!(c.owner, Some(add.id));
    }

    #[test]
    fn test_undefined_names_are_problems() {
        let (_, info) = check("package main\nfunc f() int {\n\treturn missing + 1\n}\n");
        assert_eq!(info.problems.len(), 1);
        assert!(info.problems[0].message.contains("undefined: missing"));
    }

    #[test]
    fn test_methods_and_pointer_receivers() {
        let source = "package main\ntype Counter struct{ n int }\nfunc (c *Counter) Inc() { c.n++ }\nfunc (c Counter) Value() int { return c.n }\nfunc use() int {\n\tvar c Counter\n\tc.Inc()\n\treturn c.Value()\n}\n";
        let (_, info) = check(source);
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        assert!(info.functions.iter().any(|f| f.name == "(*Counter).Inc"));
        assert!(info.functions.iter().any(|f| f.name == "Counter.Value" && !f.pointer_recv));
        let calls: Vec<&Callee> = info.callees.values().collect();
        assert_eq!(calls.iter().filter(|c| matches!(c, Callee::Func(_))).count(), 2);
    }

    #[test]
    fn test_stdlib_calls_are_classified() {
        let source = "package main\nimport (\n\t\"fmt\"\n\t\"sync\"\n\t\"github.com/x/y\"\n)\nfunc f() {\n\tvar mu sync.Mutex\n\tmu.Lock()\n\tfmt.Println(\"hi\")\n\ty.Do()\n}\n";
        let (_, info) = check(source);
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        let callees: Vec<&Callee> = info.callees.values().collect();
        assert!(callees.iter().any(|c| c.is_std_method("sync.Mutex", "Lock")));
        assert!(callees.iter().any(|c| c.is_stdlib("fmt", "Println")));
        assert!(callees.iter().any(|c| matches!(c, Callee::External)));
    }

    #[test]
    fn test_closure_captures() {
        let source = "package main\nfunc f() int {\n\tx := 0\n\tg := func() { x++ }\n\tg()\n\treturn x\n}\n";
        let (_, info) = check(source);
        let x = info.symbols.iter().position(|s| s.name == "x").unwrap() as SymbolId;
        assert!(info.symbol(x).captured);
        let closure = info.functions.iter().find(|f| f.is_closure()).unwrap();
        assert_eq!(closure.captures, vec![x]);
        assert_eq!(closure.name, "f.func1");
    }

    #[test]
    fn test_constants_and_iota() {
        let source = "package main\nconst (\n\tA = iota\n\tB\n\tC\n)\nconst Big = 1 << 40\nvar x = C\n";
        let (_, info) = check(source);
        let c = info.symbols.iter().find(|s| s.name == "C").unwrap();
        assert_eq!(c.const_value, Some(ConstValue::int(2)));
        let big = info.symbols.iter().find(|s| s.name == "Big").unwrap();
        assert_eq!(big.const_value, Some(ConstValue::int(1i64 << 40)));
        let x = info.symbols.iter().find(|s| s.name == "x").unwrap();
        assert_eq!(x.ty, Type::int());
    }

    #[test]
    fn test_type_parameter_is_not_an_underlying_type() {
        let (_, info) = check("package main\ntype Box[T any] T\ntype Named int\nvar n Named = 1\n");
        assert_eq!(info.problems.len(), 1, "{:?}", info.problems);
        assert!(info.problems[0].message.contains("cannot use a type parameter as the underlying type"));
    }

    #[test]
    fn test_constants_wider_than_machine_words() {
        let (_, info) = check("package main\nconst Big = 1 << 200\nconst Two = Big >> 199\nvar f = Big * 1.0\n");
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        let two = info.symbols.iter().find(|s| s.name == "Two").unwrap();
        assert_eq!(two.const_value, Some(ConstValue::int(2)));
        let big = info.symbols.iter().find(|s| s.name == "Big").unwrap();
        assert_eq!(big.const_value, Some(ConstValue::Int(BigInt::from(1) << 200usize)));
    }

    #[test]
    fn test_generic_inference() {
        let source = "package main\ntype Number interface{ ~int | ~float64 }\nfunc Sum[T Number](xs []T) T {\n\tvar s T\n\tfor _, x := range xs {\n\t\ts += x\n\t}\n\treturn s\n}\nfunc f() float64 {\n\treturn Sum([]float64{1, 2})\n}\n";
        let (_, info) = check(source);
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        assert_eq!(info.instantiations.len(), 1);
        assert_eq!(info.instantiations[0].args, vec![Some(Type::Basic(BasicKind::Float64))]);
    }

    #[test]
    fn test_comma_ok_forms() {
        let source = "package main\nfunc f(m map[string]int, ch chan int, v any) {\n\ta, ok := m[\"k\"]\n\tb, ok2 := <-ch\n\ts, ok3 := v.(string)\n\t_, _, _, _, _, _ = a, ok, b, ok2, s, ok3\n}\n";
        let (_, info) = check(source);
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        assert_eq!(info.comma_ok.len(), 3);
        let s = info.symbols.iter().find(|s| s.name == "s").unwrap();
        assert_eq!(s.ty, Type::string());
    }

    #[test]
    fn test_forward_type_references() {
        let source = "package main\ntype A struct{ b B }\ntype B struct{ n int }\ntype RW interface{ R; W }\ntype R interface{ Read() int }\ntype W interface{ Write(int) }\n";
        let (_, info) = check(source);
        assert!(info.problems.is_empty(), "{:?}", info.problems);
        let rw = info.table.find_named("", "RW").unwrap();
        let Type::Interface(iface) = &info.table.named(rw).underlying else { panic!("not an interface") };
        assert_eq!(iface.methods.len(), 2);
    }

    #[test]
    fn test_address_taken() {
        let (_, info) = check("package main\ntype T struct{ n int }\nfunc f() *T {\n\tt := T{}\n\treturn &t\n}\n");
        let t = info.symbols.iter().find(|s| s.name == "t").unwrap();
        assert!(t.address_taken);
    }

    #[test]
    fn test_parse_int_literal() {
        assert_eq!(parse_int_literal("0x_FF"), Some(BigInt::from(255)));
        assert_eq!(parse_int_literal("0b101"), Some(BigInt::from(5)));
        assert_eq!(parse_int_literal("0o17"), Some(BigInt::from(15)));
        assert_eq!(parse_int_literal("017"), Some(BigInt::from(15)));
        assert_eq!(parse_int_literal("1_000"), Some(BigInt::from(1000)));
        assert_eq!(parse_int_literal("0"), Some(BigInt::from(0)));
    }
}
