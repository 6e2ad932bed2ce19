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

//! Predeclared identifiers and modeled standard-library packages
//!
//! Standard-library packages are described by signatures only. Imports of
//! any package not listed here have no source and resolve to the unknown
//! type.

use super::ast::ChanDir;
use super::types::{BasicKind, ConstValue, InterfaceType, MethodInfo, NamedId, Signature, StructField, Type, TypeTable};
use std::collections::HashMap;

/// Builtin functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Cap,
    Make,
    New,
    Append,
    Copy,
    Delete,
    Close,
    Panic,
    Recover,
    Print,
    Println,
    Min,
    Max,
    Clear,
    Complex,
    Real,
    Imag,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "len" => Builtin::Len,
            "cap" => Builtin::Cap,
            "make" => Builtin::Make,
            "new" => Builtin::New,
            "append" => Builtin::Append,
            "copy" => Builtin::Copy,
            "delete" => Builtin::Delete,
            "close" => Builtin::Close,
            "panic" => Builtin::Panic,
            "recover" => Builtin::Recover,
            "print" => Builtin::Print,
            "println" => Builtin::Println,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "clear" => Builtin::Clear,
            "complex" => Builtin::Complex,
            "real" => Builtin::Real,
            "imag" => Builtin::Imag,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Cap => "cap",
            Builtin::Make => "make",
            Builtin::New => "new",
            Builtin::Append => "append",
            Builtin::Copy => "copy",
            Builtin::Delete => "delete",
            Builtin::Close => "close",
            Builtin::Panic => "panic",
            Builtin::Recover => "recover",
            Builtin::Print => "print",
            Builtin::Println => "println",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Clear => "clear",
            Builtin::Complex => "complex",
            Builtin::Real => "real",
            Builtin::Imag => "imag",
        }
    }

    /// Builtins that take a type as their first argument
    pub fn takes_type(&self) -> bool {
        matches!(self, Builtin::Make | Builtin::New)
    }
}

/// A predeclared identifier
#[derive(Debug, Clone, PartialEq)]
pub enum UniverseEntry {
    Type(Type),
    Const(Type, ConstValue),
    Nil,
    Iota,
    Builtin(Builtin),
}

/// Predeclared identifiers with the ids of `error` and `comparable`
#[derive(Debug, Clone)]
pub struct Universe {
    pub entries: HashMap<&'static str, UniverseEntry>,
    pub error: Type,
    pub comparable: Type,
}

impl Universe {
    pub fn install(table: &mut TypeTable) -> Self {
        let mut entries = HashMap::new();
        let basics = [
            ("bool", BasicKind::Bool),
            ("int", BasicKind::Int),
            ("int8", BasicKind::Int8),
            ("int16", BasicKind::Int16),
            ("int32", BasicKind::Int32),
            ("rune", BasicKind::Int32),
            ("int64", BasicKind::Int64),
            ("uint", BasicKind::Uint),
            ("uint8", BasicKind::Uint8),
            ("byte", BasicKind::Uint8),
            ("uint16", BasicKind::Uint16),
            ("uint32", BasicKind::Uint32),
            ("uint64", BasicKind::Uint64),
            ("uintptr", BasicKind::Uintptr),
            ("float32", BasicKind::Float32),
            ("float64", BasicKind::Float64),
            ("complex64", BasicKind::Complex64),
            ("complex128", BasicKind::Complex128),
            ("string", BasicKind::String),
        ];
        for (name, kind) in basics {
            entries.insert(name, UniverseEntry::Type(Type::Basic(kind)));
        }

        let error_id = table.add_named("error", "");
        table.named_mut(error_id).underlying = Type::Interface(Box::new(InterfaceType {
            methods: vec![("Error".to_string(), Signature::new(vec![], vec![Type::string()]))],
            terms: None,
            comparable: false,
        }));
        let error = Type::Named(error_id, vec![]);
        entries.insert("error", UniverseEntry::Type(error.clone()));

        let comparable_id = table.add_named("comparable", "");
        table.named_mut(comparable_id).underlying = Type::Interface(Box::new(InterfaceType {
            methods: vec![],
            terms: None,
            comparable: true,
        }));
        let comparable = Type::Named(comparable_id, vec![]);
        entries.insert("comparable", UniverseEntry::Type(comparable.clone()));
        entries.insert("any", UniverseEntry::Type(Type::empty_interface()));

        entries.insert("true", UniverseEntry::Const(Type::Basic(BasicKind::UntypedBool), ConstValue::Bool(true)));
        entries.insert("false", UniverseEntry::Const(Type::Basic(BasicKind::UntypedBool), ConstValue::Bool(false)));
        entries.insert("nil", UniverseEntry::Nil);
        entries.insert("iota", UniverseEntry::Iota);

        for name in [
            "len", "cap", "make", "new", "append", "copy", "delete", "close", "panic", "recover", "print", "println", "min", "max", "clear", "complex", "real", "imag",
        ] {
            if let Some(builtin) = Builtin::lookup(name) {
                entries.insert(name, UniverseEntry::Builtin(builtin));
            }
        }

        Self { entries, error, comparable }
    }

    pub fn lookup(&self, name: &str) -> Option<&UniverseEntry> {
        self.entries.get(name)
    }
}

/// A member of a modeled package
#[derive(Debug, Clone, PartialEq)]
pub enum StdMember {
    Func(Signature),
    Type(Type),
    Const(Type, ConstValue),
    Var(Type),
}

/// Members of one modeled package
#[derive(Debug, Clone, Default)]
pub struct PackageModel {
    members: HashMap<String, StdMember>,
}

impl PackageModel {
    fn add(&mut self, name: impl Into<String>, member: StdMember) {
        self.members.insert(name.into(), member);
    }

    pub fn get(&self, name: &str) -> Option<&StdMember> {
        self.members.get(name)
    }
}

/// Synchronization primitives recognized by the concurrency analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPrimitive {
    Mutex,
    RWMutex,
    WaitGroup,
    Once,
}

/// Modeled standard-library packages
#[derive(Debug, Clone, Default)]
pub struct Stdlib {
    packages: HashMap<&'static str, PackageModel>,
    sync_types: HashMap<NamedId, SyncPrimitive>,
}

fn sig(params: Vec<Type>, results: Vec<Type>) -> Signature {
    Signature::new(params, results)
}

fn variadic(params: Vec<Type>, results: Vec<Type>) -> Signature {
    Signature::new(params, results).variadic()
}

fn method(name: &str, sig: Signature, pointer_recv: bool) -> MethodInfo {
    MethodInfo {
        name: name.to_string(),
        sig,
        pointer_recv,
        func: None,
    }
}

fn sorted_interface(mut methods: Vec<(String, Signature)>) -> Type {
    methods.sort_by(|a, b| a.0.cmp(&b.0));
    Type::Interface(Box::new(InterfaceType {
        methods,
        terms: None,
        comparable: false,
    }))
}

impl Stdlib {
    /// Register the modeled packages in a type table
    pub fn install(table: &mut TypeTable, error: &Type) -> Self {
        let mut stdlib = Stdlib::default();
        let int = Type::int;
        let int64 = || Type::Basic(BasicKind::Int64);
        let int32 = || Type::Basic(BasicKind::Int32);
        let string = Type::string;
        let boolean = Type::bool;
        let float64 = || Type::Basic(BasicKind::Float64);
        let any = Type::empty_interface;
        let bytes = || Type::slice(Type::Basic(BasicKind::Uint8));
        let err = || error.clone();

        // time
        let duration_id = table.add_named("Duration", "time");
        table.named_mut(duration_id).underlying = int64();
        let duration = Type::Named(duration_id, vec![]);
        table.named_mut(duration_id).methods = vec![
            method("Seconds", sig(vec![], vec![float64()]), false),
            method("Milliseconds", sig(vec![], vec![int64()]), false),
            method("String", sig(vec![], vec![string()]), false),
        ];
        let time_id = table.add_named("Time", "time");
        table.named_mut(time_id).underlying = Type::empty_struct();
        let time = Type::Named(time_id, vec![]);
        table.named_mut(time_id).methods = vec![
            method("Sub", sig(vec![time.clone()], vec![duration.clone()]), false),
            method("Add", sig(vec![duration.clone()], vec![time.clone()]), false),
            method("Before", sig(vec![time.clone()], vec![boolean()]), false),
            method("After", sig(vec![time.clone()], vec![boolean()]), false),
            method("Unix", sig(vec![], vec![int64()]), false),
            method("String", sig(vec![], vec![string()]), false),
        ];
        let time_chan = Type::chan(ChanDir::Recv, time.clone());
        let timer_id = table.add_named("Timer", "time");
        table.named_mut(timer_id).underlying = Type::Struct(vec![StructField {
            name: "C".to_string(),
            ty: time_chan.clone(),
            embedded: false,
        }]);
        table.named_mut(timer_id).methods = vec![
            method("Stop", sig(vec![], vec![boolean()]), true),
            method("Reset", sig(vec![duration.clone()], vec![boolean()]), true),
        ];
        let ticker_id = table.add_named("Ticker", "time");
        table.named_mut(ticker_id).underlying = table.named(timer_id).underlying.clone();
        table.named_mut(ticker_id).methods = vec![
            method("Stop", sig(vec![], vec![]), true),
            method("Reset", sig(vec![duration.clone()], vec![]), true),
        ];
        let mut time_pkg = PackageModel::default();
        time_pkg.add("Duration", StdMember::Type(duration.clone()));
        time_pkg.add("Time", StdMember::Type(time.clone()));
        time_pkg.add("Timer", StdMember::Type(Type::Named(timer_id, vec![])));
        time_pkg.add("Ticker", StdMember::Type(Type::Named(ticker_id, vec![])));
        for (name, nanos) in [
            ("Nanosecond", 1i128),
            ("Microsecond", 1_000),
            ("Millisecond", 1_000_000),
            ("Second", 1_000_000_000),
            ("Minute", 60_000_000_000),
            ("Hour", 3_600_000_000_000),
        ] {
            time_pkg.add(name, StdMember::Const(duration.clone(), ConstValue::int(nanos)));
        }
        time_pkg.add("Sleep", StdMember::Func(sig(vec![duration.clone()], vec![])));
        time_pkg.add("Now", StdMember::Func(sig(vec![], vec![time.clone()])));
        time_pkg.add("Since", StdMember::Func(sig(vec![time.clone()], vec![duration.clone()])));
        time_pkg.add("After", StdMember::Func(sig(vec![duration.clone()], vec![time_chan.clone()])));
        time_pkg.add("Tick", StdMember::Func(sig(vec![duration.clone()], vec![time_chan])));
        time_pkg.add("NewTimer", StdMember::Func(sig(vec![duration.clone()], vec![Type::pointer(Type::Named(timer_id, vec![]))])));
        time_pkg.add("NewTicker", StdMember::Func(sig(vec![duration.clone()], vec![Type::pointer(Type::Named(ticker_id, vec![]))])));
        stdlib.packages.insert("time", time_pkg);

        // sync
        let mut sync_pkg = PackageModel::default();
        let mutex_id = table.add_named("Mutex", "sync");
        table.named_mut(mutex_id).underlying = Type::empty_struct();
        table.named_mut(mutex_id).methods = vec![
            method("Lock", sig(vec![], vec![]), true),
            method("Unlock", sig(vec![], vec![]), true),
            method("TryLock", sig(vec![], vec![boolean()]), true),
        ];
        let rwmutex_id = table.add_named("RWMutex", "sync");
        table.named_mut(rwmutex_id).underlying = Type::empty_struct();
        table.named_mut(rwmutex_id).methods = vec![
            method("Lock", sig(vec![], vec![]), true),
            method("Unlock", sig(vec![], vec![]), true),
            method("RLock", sig(vec![], vec![]), true),
            method("RUnlock", sig(vec![], vec![]), true),
            method("TryLock", sig(vec![], vec![boolean()]), true),
            method("TryRLock", sig(vec![], vec![boolean()]), true),
        ];
        let waitgroup_id = table.add_named("WaitGroup", "sync");
        table.named_mut(waitgroup_id).underlying = Type::empty_struct();
        table.named_mut(waitgroup_id).methods = vec![
            method("Add", sig(vec![int()], vec![]), true),
            method("Done", sig(vec![], vec![]), true),
            method("Wait", sig(vec![], vec![]), true),
            method("Go", sig(vec![Type::func(sig(vec![], vec![]))], vec![]), true),
        ];
        let once_id = table.add_named("Once", "sync");
        table.named_mut(once_id).underlying = Type::empty_struct();
        table.named_mut(once_id).methods = vec![method("Do", sig(vec![Type::func(sig(vec![], vec![]))], vec![]), true)];
        let map_id = table.add_named("Map", "sync");
        table.named_mut(map_id).underlying = Type::empty_struct();
        table.named_mut(map_id).methods = vec![
            method("Load", sig(vec![any()], vec![any(), boolean()]), true),
            method("Store", sig(vec![any(), any()], vec![]), true),
            method("Delete", sig(vec![any()], vec![]), true),
            method("LoadOrStore", sig(vec![any(), any()], vec![any(), boolean()]), true),
            method("Range", sig(vec![Type::func(sig(vec![any(), any()], vec![boolean()]))], vec![]), true),
        ];
        let pool_id = table.add_named("Pool", "sync");
        table.named_mut(pool_id).underlying = Type::Struct(vec![StructField {
            name: "New".to_string(),
            ty: Type::func(sig(vec![], vec![any()])),
            embedded: false,
        }]);
        table.named_mut(pool_id).methods = vec![method("Get", sig(vec![], vec![any()]), true), method("Put", sig(vec![any()], vec![]), true)];
        for (name, id) in [("Mutex", mutex_id), ("RWMutex", rwmutex_id), ("WaitGroup", waitgroup_id), ("Once", once_id), ("Map", map_id), ("Pool", pool_id)] {
            sync_pkg.add(name, StdMember::Type(Type::Named(id, vec![])));
        }
        stdlib.sync_types.insert(mutex_id, SyncPrimitive::Mutex);
        stdlib.sync_types.insert(rwmutex_id, SyncPrimitive::RWMutex);
        stdlib.sync_types.insert(waitgroup_id, SyncPrimitive::WaitGroup);
        stdlib.sync_types.insert(once_id, SyncPrimitive::Once);
        stdlib.packages.insert("sync", sync_pkg);

        // sync/atomic
        let mut atomic_pkg = PackageModel::default();
        for (suffix, ty) in [("Int32", int32()), ("Int64", int64()), ("Uint32", Type::Basic(BasicKind::Uint32)), ("Uint64", Type::Basic(BasicKind::Uint64))] {
            let ptr = Type::pointer(ty.clone());
            atomic_pkg.add(format!("Add{}", suffix), StdMember::Func(sig(vec![ptr.clone(), ty.clone()], vec![ty.clone()])));
            atomic_pkg.add(format!("Load{}", suffix), StdMember::Func(sig(vec![ptr.clone()], vec![ty.clone()])));
            atomic_pkg.add(format!("Store{}", suffix), StdMember::Func(sig(vec![ptr.clone(), ty.clone()], vec![])));
            atomic_pkg.add(format!("Swap{}", suffix), StdMember::Func(sig(vec![ptr.clone(), ty.clone()], vec![ty.clone()])));
            atomic_pkg.add(format!("CompareAndSwap{}", suffix), StdMember::Func(sig(vec![ptr, ty.clone(), ty.clone()], vec![boolean()])));

            let id = table.add_named(suffix, "sync/atomic");
            table.named_mut(id).underlying = Type::empty_struct();
            table.named_mut(id).methods = vec![
                method("Add", sig(vec![ty.clone()], vec![ty.clone()]), true),
                method("Load", sig(vec![], vec![ty.clone()]), true),
                method("Store", sig(vec![ty.clone()], vec![]), true),
                method("Swap", sig(vec![ty.clone()], vec![ty.clone()]), true),
                method("CompareAndSwap", sig(vec![ty.clone(), ty.clone()], vec![boolean()]), true),
            ];
            atomic_pkg.add(suffix, StdMember::Type(Type::Named(id, vec![])));
        }
        let atomic_bool = table.add_named("Bool", "sync/atomic");
        table.named_mut(atomic_bool).underlying = Type::empty_struct();
        table.named_mut(atomic_bool).methods = vec![method("Load", sig(vec![], vec![boolean()]), true), method("Store", sig(vec![boolean()], vec![]), true)];
        atomic_pkg.add("Bool", StdMember::Type(Type::Named(atomic_bool, vec![])));
        let atomic_value = table.add_named("Value", "sync/atomic");
        table.named_mut(atomic_value).underlying = Type::empty_struct();
        table.named_mut(atomic_value).methods = vec![method("Load", sig(vec![], vec![any()]), true), method("Store", sig(vec![any()], vec![]), true)];
        atomic_pkg.add("Value", StdMember::Type(Type::Named(atomic_value, vec![])));
        stdlib.packages.insert("sync/atomic", atomic_pkg);

        // context
        let context_id = table.add_named("Context", "context");
        let done_chan = Type::chan(ChanDir::Recv, Type::empty_struct());
        table.named_mut(context_id).underlying = sorted_interface(vec![
            ("Deadline".to_string(), sig(vec![], vec![time.clone(), boolean()])),
            ("Done".to_string(), sig(vec![], vec![done_chan])),
            ("Err".to_string(), sig(vec![], vec![err()])),
            ("Value".to_string(), sig(vec![any()], vec![any()])),
        ]);
        let context = Type::Named(context_id, vec![]);
        let cancel_id = table.add_named("CancelFunc", "context");
        table.named_mut(cancel_id).underlying = Type::func(sig(vec![], vec![]));
        let cancel = Type::Named(cancel_id, vec![]);
        let mut context_pkg = PackageModel::default();
        context_pkg.add("Context", StdMember::Type(context.clone()));
        context_pkg.add("CancelFunc", StdMember::Type(cancel.clone()));
        context_pkg.add("Background", StdMember::Func(sig(vec![], vec![context.clone()])));
        context_pkg.add("TODO", StdMember::Func(sig(vec![], vec![context.clone()])));
        context_pkg.add("WithCancel", StdMember::Func(sig(vec![context.clone()], vec![context.clone(), cancel.clone()])));
        context_pkg.add("WithTimeout", StdMember::Func(sig(vec![context.clone(), duration.clone()], vec![context.clone(), cancel.clone()])));
        context_pkg.add("WithDeadline", StdMember::Func(sig(vec![context.clone(), time.clone()], vec![context.clone(), cancel])));
        context_pkg.add("WithValue", StdMember::Func(sig(vec![context.clone(), any(), any()], vec![context])));
        context_pkg.add("Canceled", StdMember::Var(err()));
        context_pkg.add("DeadlineExceeded", StdMember::Var(err()));
        stdlib.packages.insert("context", context_pkg);

        // fmt
        let mut fmt_pkg = PackageModel::default();
        let anys = || Type::slice(Type::empty_interface());
        fmt_pkg.add("Println", StdMember::Func(variadic(vec![anys()], vec![int(), err()])));
        fmt_pkg.add("Print", StdMember::Func(variadic(vec![anys()], vec![int(), err()])));
        fmt_pkg.add("Printf", StdMember::Func(variadic(vec![string(), anys()], vec![int(), err()])));
        fmt_pkg.add("Sprintf", StdMember::Func(variadic(vec![string(), anys()], vec![string()])));
        fmt_pkg.add("Sprint", StdMember::Func(variadic(vec![anys()], vec![string()])));
        fmt_pkg.add("Sprintln", StdMember::Func(variadic(vec![anys()], vec![string()])));
        fmt_pkg.add("Errorf", StdMember::Func(variadic(vec![string(), anys()], vec![err()])));
        fmt_pkg.add("Fprintf", StdMember::Func(variadic(vec![Type::Unknown, string(), anys()], vec![int(), err()])));
        fmt_pkg.add("Fprintln", StdMember::Func(variadic(vec![Type::Unknown, anys()], vec![int(), err()])));
        fmt_pkg.add("Sscanf", StdMember::Func(variadic(vec![string(), string(), anys()], vec![int(), err()])));
        stdlib.packages.insert("fmt", fmt_pkg);

        // errors
        let mut errors_pkg = PackageModel::default();
        errors_pkg.add("New", StdMember::Func(sig(vec![string()], vec![err()])));
        errors_pkg.add("Is", StdMember::Func(sig(vec![err(), err()], vec![boolean()])));
        errors_pkg.add("As", StdMember::Func(sig(vec![err(), any()], vec![boolean()])));
        errors_pkg.add("Unwrap", StdMember::Func(sig(vec![err()], vec![err()])));
        errors_pkg.add("Join", StdMember::Func(variadic(vec![Type::slice(err())], vec![err()])));
        stdlib.packages.insert("errors", errors_pkg);

        // strings
        let mut strings_pkg = PackageModel::default();
        for name in ["Contains", "HasPrefix", "HasSuffix", "EqualFold", "ContainsAny"] {
            strings_pkg.add(name, StdMember::Func(sig(vec![string(), string()], vec![boolean()])));
        }
        for name in ["Index", "LastIndex", "Count", "Compare"] {
            strings_pkg.add(name, StdMember::Func(sig(vec![string(), string()], vec![int()])));
        }
        for name in ["ToUpper", "ToLower", "TrimSpace", "Title"] {
            strings_pkg.add(name, StdMember::Func(sig(vec![string()], vec![string()])));
        }
        for name in ["TrimPrefix", "TrimSuffix", "Trim", "TrimLeft", "TrimRight"] {
            strings_pkg.add(name, StdMember::Func(sig(vec![string(), string()], vec![string()])));
        }
        strings_pkg.add("Split", StdMember::Func(sig(vec![string(), string()], vec![Type::slice(string())])));
        strings_pkg.add("Fields", StdMember::Func(sig(vec![string()], vec![Type::slice(string())])));
        strings_pkg.add("Join", StdMember::Func(sig(vec![Type::slice(string()), string()], vec![string()])));
        strings_pkg.add("Repeat", StdMember::Func(sig(vec![string(), int()], vec![string()])));
        strings_pkg.add("Replace", StdMember::Func(sig(vec![string(), string(), string(), int()], vec![string()])));
        strings_pkg.add("ReplaceAll", StdMember::Func(sig(vec![string(), string(), string()], vec![string()])));
        let builder_id = table.add_named("Builder", "strings");
        table.named_mut(builder_id).underlying = Type::empty_struct();
        table.named_mut(builder_id).methods = vec![
            method("WriteString", sig(vec![string()], vec![int(), err()]), true),
            method("WriteByte", sig(vec![Type::Basic(BasicKind::Uint8)], vec![err()]), true),
            method("WriteRune", sig(vec![int32()], vec![int(), err()]), true),
            method("String", sig(vec![], vec![string()]), true),
            method("Len", sig(vec![], vec![int()]), true),
            method("Reset", sig(vec![], vec![]), true),
            method("Grow", sig(vec![int()], vec![]), true),
        ];
        strings_pkg.add("Builder", StdMember::Type(Type::Named(builder_id, vec![])));
        stdlib.packages.insert("strings", strings_pkg);

        // strconv
        let mut strconv_pkg = PackageModel::default();
        strconv_pkg.add("Itoa", StdMember::Func(sig(vec![int()], vec![string()])));
        strconv_pkg.add("Atoi", StdMember::Func(sig(vec![string()], vec![int(), err()])));
        strconv_pkg.add("FormatInt", StdMember::Func(sig(vec![int64(), int()], vec![string()])));
        strconv_pkg.add("ParseInt", StdMember::Func(sig(vec![string(), int(), int()], vec![int64(), err()])));
        strconv_pkg.add("ParseFloat", StdMember::Func(sig(vec![string(), int()], vec![float64(), err()])));
        strconv_pkg.add("ParseBool", StdMember::Func(sig(vec![string()], vec![boolean(), err()])));
        strconv_pkg.add("FormatBool", StdMember::Func(sig(vec![boolean()], vec![string()])));
        strconv_pkg.add("Quote", StdMember::Func(sig(vec![string()], vec![string()])));
        stdlib.packages.insert("strconv", strconv_pkg);

        // os
        let file_id = table.add_named("File", "os");
        table.named_mut(file_id).underlying = Type::empty_struct();
        table.named_mut(file_id).methods = vec![
            method("Write", sig(vec![bytes()], vec![int(), err()]), true),
            method("WriteString", sig(vec![string()], vec![int(), err()]), true),
            method("Read", sig(vec![bytes()], vec![int(), err()]), true),
            method("Close", sig(vec![], vec![err()]), true),
            method("Name", sig(vec![], vec![string()]), true),
        ];
        let file = Type::pointer(Type::Named(file_id, vec![]));
        let mut os_pkg = PackageModel::default();
        os_pkg.add("File", StdMember::Type(Type::Named(file_id, vec![])));
        os_pkg.add("Exit", StdMember::Func(sig(vec![int()], vec![])));
        os_pkg.add("Getenv", StdMember::Func(sig(vec![string()], vec![string()])));
        os_pkg.add("Setenv", StdMember::Func(sig(vec![string(), string()], vec![err()])));
        os_pkg.add("ReadFile", StdMember::Func(sig(vec![string()], vec![bytes(), err()])));
        os_pkg.add("WriteFile", StdMember::Func(sig(vec![string(), bytes(), Type::Unknown], vec![err()])));
        os_pkg.add("Open", StdMember::Func(sig(vec![string()], vec![file.clone(), err()])));
        os_pkg.add("Create", StdMember::Func(sig(vec![string()], vec![file.clone(), err()])));
        os_pkg.add("Remove", StdMember::Func(sig(vec![string()], vec![err()])));
        os_pkg.add("Args", StdMember::Var(Type::slice(string())));
        os_pkg.add("Stdin", StdMember::Var(file.clone()));
        os_pkg.add("Stdout", StdMember::Var(file.clone()));
        os_pkg.add("Stderr", StdMember::Var(file));
        stdlib.packages.insert("os", os_pkg);

        // math
        let mut math_pkg = PackageModel::default();
        for name in ["Sqrt", "Abs", "Floor", "Ceil", "Log", "Exp", "Sin", "Cos", "Round", "Trunc"] {
            math_pkg.add(name, StdMember::Func(sig(vec![float64()], vec![float64()])));
        }
        for name in ["Max", "Min", "Pow", "Mod", "Hypot"] {
            math_pkg.add(name, StdMember::Func(sig(vec![float64(), float64()], vec![float64()])));
        }
        math_pkg.add("Inf", StdMember::Func(sig(vec![int()], vec![float64()])));
        math_pkg.add("NaN", StdMember::Func(sig(vec![], vec![float64()])));
        math_pkg.add("IsNaN", StdMember::Func(sig(vec![float64()], vec![boolean()])));
        let untyped_int = || Type::Basic(BasicKind::UntypedInt);
        let word = i128::from(table.pointer_width);
        for (name, value) in [
            ("MaxInt8", i128::from(i8::MAX)),
            ("MinInt8", i128::from(i8::MIN)),
            ("MaxInt16", i128::from(i16::MAX)),
            ("MinInt16", i128::from(i16::MIN)),
            ("MaxInt32", i128::from(i32::MAX)),
            ("MinInt32", i128::from(i32::MIN)),
            ("MaxInt64", i128::from(i64::MAX)),
            ("MinInt64", i128::from(i64::MIN)),
            ("MaxUint8", i128::from(u8::MAX)),
            ("MaxUint16", i128::from(u16::MAX)),
            ("MaxUint32", i128::from(u32::MAX)),
            ("MaxUint64", i128::from(u64::MAX)),
            ("MaxInt", (1i128 << (word - 1)) - 1),
            ("MinInt", -(1i128 << (word - 1))),
            ("MaxUint", (1i128 << word) - 1),
        ] {
            math_pkg.add(name, StdMember::Const(untyped_int(), ConstValue::int(value)));
        }
        math_pkg.add("Pi", StdMember::Const(Type::Basic(BasicKind::UntypedFloat), ConstValue::Float(std::f64::consts::PI)));
        math_pkg.add("E", StdMember::Const(Type::Basic(BasicKind::UntypedFloat), ConstValue::Float(std::f64::consts::E)));
        math_pkg.add("MaxFloat64", StdMember::Const(Type::Basic(BasicKind::UntypedFloat), ConstValue::Float(f64::MAX)));
        stdlib.packages.insert("math", math_pkg);

        stdlib
    }

    pub fn is_modeled(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    pub fn member(&self, path: &str, name: &str) -> Option<&StdMember> {
        self.packages.get(path)?.get(name)
    }

    /// Synchronization primitive behind a value or pointer type
    pub fn sync_primitive(&self, ty: &Type) -> Option<SyncPrimitive> {
        let target = match ty {
            Type::Pointer(inner) => inner.as_ref(),
            other => other,
        };
        match target {
            Type::Named(id, _) => self.sync_types.get(id).copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install() -> (TypeTable, Universe, Stdlib) {
        let mut table = TypeTable::new(64);
        let universe = Universe::install(&mut table);
        let stdlib = Stdlib::install(&mut table, &universe.error);
        (table, universe, stdlib)
    }

    #[test]
    fn test_universe() {
        let (table, universe, _) = install();
        assert_eq!(universe.lookup("byte"), Some(&UniverseEntry::Type(Type::Basic(BasicKind::Uint8))));
        assert_eq!(universe.lookup("len"), Some(&UniverseEntry::Builtin(Builtin::Len)));
        assert!(table.is_interface(&universe.error));
        assert!(universe.lookup("undefined").is_none());
    }

    #[test]
    fn test_sync_primitives() {
        let (table, _, stdlib) = install();
        let Some(StdMember::Type(mutex)) = stdlib.member("sync", "Mutex") else { panic!("missing sync.Mutex") };
        assert_eq!(stdlib.sync_primitive(mutex), Some(SyncPrimitive::Mutex));
        assert_eq!(stdlib.sync_primitive(&Type::pointer(mutex.clone())), Some(SyncPrimitive::Mutex));
        assert_eq!(table.type_string(mutex), "sync.Mutex");
        let lock = table.lookup_method(&Type::pointer(mutex.clone()), "Lock").unwrap();
        assert!(lock.pointer_recv);
    }

    #[test]
    fn test_context_model() {
        let (table, _, stdlib) = install();
        let Some(StdMember::Func(with_cancel)) = stdlib.member("context", "WithCancel") else { panic!() };
        assert_eq!(with_cancel.results.len(), 2);
        let done = table.lookup_method(&with_cancel.results[0], "Done").unwrap();
        assert!(done.from_interface);
        assert!(!stdlib.is_modeled("net/http"));
        assert!(stdlib.is_modeled("sync/atomic"));
    }

    #[test]
    fn test_error_implementation() {
        let (table, universe, stdlib) = install();
        let Some(StdMember::Func(new)) = stdlib.member("errors", "New") else { panic!() };
        assert!(table.assignable(&new.results[0], &universe.error));
    }
}
