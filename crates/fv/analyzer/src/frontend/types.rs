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

//! Semantic types, type identity, assignability and method sets
//!
//! Defined types live in a [`TypeTable`] and are referred to by
//! [`NamedId`]. Instantiations of generic defined types carry their type
//! arguments and are expanded only when their underlying type is requested.

use super::ast::{BinaryOp, ChanDir, UnaryOp};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::collections::HashMap;
use std::fmt::Write;

pub type NamedId = u32;
pub type TypeParamId = u32;
pub type FuncId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, BasicKind::Uint | BasicKind::Uint8 | BasicKind::Uint16 | BasicKind::Uint32 | BasicKind::Uint64 | BasicKind::Uintptr)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, BasicKind::Complex64 | BasicKind::Complex128)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool | BasicKind::UntypedInt | BasicKind::UntypedRune | BasicKind::UntypedFloat | BasicKind::UntypedString | BasicKind::UntypedNil
        )
    }

    pub fn is_ordered(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_string()
    }

    pub fn name(&self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    /// Size in bytes for a target pointer width
    pub fn size(&self, pointer_width: u32) -> Option<u64> {
        let word = u64::from(pointer_width / 8);
        let size = match self {
            BasicKind::Bool | BasicKind::Int8 | BasicKind::Uint8 => 1,
            BasicKind::Int16 | BasicKind::Uint16 => 2,
            BasicKind::Int32 | BasicKind::Uint32 | BasicKind::Float32 => 4,
            BasicKind::Int64 | BasicKind::Uint64 | BasicKind::Float64 | BasicKind::Complex64 => 8,
            BasicKind::Complex128 => 16,
            BasicKind::Int | BasicKind::Uint | BasicKind::Uintptr | BasicKind::UnsafePointer => word,
            BasicKind::String => 2 * word,
            _ => return None,
        };
        Some(size)
    }

    /// Inclusive integer range for a target pointer width
    pub fn int_range(&self, pointer_width: u32) -> Option<(i128, i128)> {
        let bits = match self {
            BasicKind::Int8 | BasicKind::Uint8 => 8,
            BasicKind::Int16 | BasicKind::Uint16 => 16,
            BasicKind::Int32 | BasicKind::Uint32 => 32,
            BasicKind::Int64 | BasicKind::Uint64 => 64,
            BasicKind::Int | BasicKind::Uint | BasicKind::Uintptr => pointer_width,
            _ => return None,
        };
        if self.is_unsigned() {
            Some((0, (1i128 << bits) - 1))
        } else {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    /// Final parameter is a slice that accepts `...` arguments
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self { params, results, variadic: false }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Type of the call expression
    pub fn result_type(&self) -> Type {
        match self.results.len() {
            0 => Type::Tuple(Vec::new()),
            1 => self.results[0].clone(),
            _ => Type::Tuple(self.results.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub tilde: bool,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceType {
    /// Sorted by name
    pub methods: Vec<(String, Signature)>,
    /// Type set restriction for constraint interfaces
    pub terms: Option<Vec<Term>>,
    pub comparable: bool,
}

impl InterfaceType {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.terms.is_none() && !self.comparable
    }

    pub fn method(&self, name: &str) -> Option<&Signature> {
        self.methods.iter().find(|(n, _)| n == name).map(|(_, sig)| sig)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The result of an ill-typed construct
    Invalid,
    /// Members of packages whose source is missing
    Unknown,
    Basic(BasicKind),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(u64, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Func(Box<Signature>),
    Struct(Vec<StructField>),
    Interface(Box<InterfaceType>),
    /// Multiple results
    Tuple(Vec<Type>),
    Named(NamedId, Vec<Type>),
    TypeParam(TypeParamId),
}

impl Type {
    pub fn int() -> Type {
        Type::Basic(BasicKind::Int)
    }

    pub fn bool() -> Type {
        Type::Basic(BasicKind::Bool)
    }

    pub fn string() -> Type {
        Type::Basic(BasicKind::String)
    }

    pub fn empty_interface() -> Type {
        Type::Interface(Box::default())
    }

    pub fn empty_struct() -> Type {
        Type::Struct(Vec::new())
    }

    pub fn pointer(to: Type) -> Type {
        Type::Pointer(Box::new(to))
    }

    pub fn slice(of: Type) -> Type {
        Type::Slice(Box::new(of))
    }

    pub fn chan(dir: ChanDir, elem: Type) -> Type {
        Type::Chan(dir, Box::new(elem))
    }

    pub fn func(sig: Signature) -> Type {
        Type::Func(Box::new(sig))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// Invalid or unknown types never produce secondary errors
    pub fn is_opaque(&self) -> bool {
        matches!(self, Type::Invalid | Type::Unknown)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Basic(kind) if kind.is_untyped())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::UntypedNil))
    }

    /// Predeclared and defined types are named
    pub fn is_named(&self) -> bool {
        matches!(self, Type::Named(..)) || matches!(self, Type::Basic(kind) if !kind.is_untyped())
    }
}

/// A compile-time constant value
///
/// Integer constants have arbitrary precision; range checks happen only
/// when a value is converted to a typed slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(BigInt),
    Float(f64),
    String(String),
}

/// Largest shift count folded in a constant expression
const MAX_CONST_SHIFT: usize = 10_000;

impl ConstValue {
    pub fn int(value: impl Into<BigInt>) -> Self {
        ConstValue::Int(value.into())
    }

    /// Integer value when it fits in `i128`
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(v) => v.to_i128(),
            ConstValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e30 => Some(*f as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstValue::Int(v) => v.to_f64(),
            ConstValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

fn shift_count(count: &BigInt) -> Option<usize> {
    count.to_usize().filter(|&n| n <= MAX_CONST_SHIFT)
}

/// Fold a binary operation on constants
pub fn const_binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    let value = match (lhs, rhs) {
        (Int(a), Int(b)) => match op {
            BinaryOp::Add => Int(a + b),
            BinaryOp::Sub => Int(a - b),
            BinaryOp::Mul => Int(a * b),
            BinaryOp::Div if !b.is_zero() => Int(a / b),
            BinaryOp::Rem if !b.is_zero() => Int(a % b),
            BinaryOp::Div | BinaryOp::Rem => return None,
            BinaryOp::And => Int(a & b),
            BinaryOp::Or => Int(a | b),
            BinaryOp::Xor => Int(a ^ b),
            BinaryOp::AndNot => Int(a & !b),
            BinaryOp::Shl => Int(a << shift_count(b)?),
            BinaryOp::Shr => Int(a >> shift_count(b)?),
            BinaryOp::Eq => Bool(a == b),
            BinaryOp::Ne => Bool(a != b),
            BinaryOp::Lt => Bool(a < b),
            BinaryOp::Le => Bool(a <= b),
            BinaryOp::Gt => Bool(a > b),
            BinaryOp::Ge => Bool(a >= b),
            BinaryOp::LogAnd | BinaryOp::LogOr => return None,
        },
        (Int(_) | Float(_), Int(_) | Float(_)) => {
            let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
            match op {
                BinaryOp::Add => Float(a + b),
                BinaryOp::Sub => Float(a - b),
                BinaryOp::Mul => Float(a * b),
                BinaryOp::Div if b != 0.0 => Float(a / b),
                BinaryOp::Eq => Bool(a == b),
                BinaryOp::Ne => Bool(a != b),
                BinaryOp::Lt => Bool(a < b),
                BinaryOp::Le => Bool(a <= b),
                BinaryOp::Gt => Bool(a > b),
                BinaryOp::Ge => Bool(a >= b),
                _ => return None,
            }
        }
        (String(a), String(b)) => match op {
            BinaryOp::Add => String(format!("{}{}", a, b)),
            BinaryOp::Eq => Bool(a == b),
            BinaryOp::Ne => Bool(a != b),
            BinaryOp::Lt => Bool(a < b),
            BinaryOp::Le => Bool(a <= b),
            BinaryOp::Gt => Bool(a > b),
            BinaryOp::Ge => Bool(a >= b),
            _ => return None,
        },
        (Bool(a), Bool(b)) => match op {
            BinaryOp::LogAnd => Bool(*a && *b),
            BinaryOp::LogOr => Bool(*a || *b),
            BinaryOp::Eq => Bool(a == b),
            BinaryOp::Ne => Bool(a != b),
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}

/// Fold a unary operation on a constant
pub fn const_unary(op: UnaryOp, value: &ConstValue) -> Option<ConstValue> {
    match (op, value) {
        (UnaryOp::Plus, v) => Some(v.clone()),
        (UnaryOp::Neg, ConstValue::Int(v)) => Some(ConstValue::Int(-v)),
        (UnaryOp::Neg, ConstValue::Float(v)) => Some(ConstValue::Float(-v)),
        (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (UnaryOp::BitNot, ConstValue::Int(v)) => Some(ConstValue::Int(!v)),
        _ => None,
    }
}

/// A method declared on a defined type
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    pub sig: Signature,
    pub pointer_recv: bool,
    /// Declaring function when the source is available
    pub func: Option<FuncId>,
}

/// A defined (named) type
#[derive(Debug, Clone)]
pub struct NamedType {
    pub name: String,
    /// Package path, empty for types of the analyzed sources
    pub pkg: String,
    pub underlying: Type,
    pub type_params: Vec<TypeParamId>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone)]
pub struct TypeParamInfo {
    pub name: String,
    pub constraint: Type,
}

/// Result of a method lookup
#[derive(Debug, Clone, PartialEq)]
pub struct MethodLookup {
    pub sig: Signature,
    pub pointer_recv: bool,
    pub func: Option<FuncId>,
    /// Defined type declaring the method, `None` for interface methods
    pub named: Option<NamedId>,
    pub from_interface: bool,
}

/// Registry of defined types and type parameters
#[derive(Debug, Clone)]
pub struct TypeTable {
    pub named: Vec<NamedType>,
    pub params: Vec<TypeParamInfo>,
    pub pointer_width: u32,
}

const MAX_EMBED_DEPTH: usize = 4;

impl TypeTable {
    pub fn new(pointer_width: u32) -> Self {
        Self {
            named: Vec::new(),
            params: Vec::new(),
            pointer_width,
        }
    }

    pub fn add_named(&mut self, name: impl Into<String>, pkg: impl Into<String>) -> NamedId {
        let id = self.named.len() as NamedId;
        self.named.push(NamedType {
            name: name.into(),
            pkg: pkg.into(),
            underlying: Type::Invalid,
            type_params: Vec::new(),
            methods: Vec::new(),
        });
        id
    }

    pub fn add_type_param(&mut self, name: impl Into<String>, constraint: Type) -> TypeParamId {
        let id = self.params.len() as TypeParamId;
        self.params.push(TypeParamInfo { name: name.into(), constraint });
        id
    }

    pub fn named(&self, id: NamedId) -> &NamedType {
        &self.named[id as usize]
    }

    pub fn named_mut(&mut self, id: NamedId) -> &mut NamedType {
        &mut self.named[id as usize]
    }

    /// Find a defined type by package path and name
    pub fn find_named(&self, pkg: &str, name: &str) -> Option<NamedId> {
        self.named.iter().position(|n| n.pkg == pkg && n.name == name).map(|i| i as NamedId)
    }

    /// Qualified name of a defined type, e.g. `sync.Mutex`
    pub fn qualified_name(&self, id: NamedId) -> String {
        let named = self.named(id);
        if named.pkg.is_empty() {
            named.name.clone()
        } else {
            let short = named.pkg.rsplit('/').next().unwrap_or(&named.pkg);
            format!("{}.{}", short, named.name)
        }
    }

    pub fn constraint(&self, id: TypeParamId) -> &Type {
        &self.params[id as usize].constraint
    }

    /// Replace type parameters according to a mapping
    pub fn substitute(&self, ty: &Type, map: &HashMap<TypeParamId, Type>) -> Type {
        if map.is_empty() {
            return ty.clone();
        }
        match ty {
            Type::TypeParam(id) => map.get(id).cloned().unwrap_or_else(|| ty.clone()),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.substitute(inner, map))),
            Type::Slice(inner) => Type::Slice(Box::new(self.substitute(inner, map))),
            Type::Array(len, inner) => Type::Array(*len, Box::new(self.substitute(inner, map))),
            Type::Map(k, v) => Type::Map(Box::new(self.substitute(k, map)), Box::new(self.substitute(v, map))),
            Type::Chan(dir, inner) => Type::Chan(*dir, Box::new(self.substitute(inner, map))),
            Type::Func(sig) => Type::Func(Box::new(self.substitute_sig(sig, map))),
            Type::Struct(fields) => Type::Struct(
                fields
                    .iter()
                    .map(|f| StructField {
                        name: f.name.clone(),
                        ty: self.substitute(&f.ty, map),
                        embedded: f.embedded,
                    })
                    .collect(),
            ),
            Type::Interface(iface) => Type::Interface(Box::new(InterfaceType {
                methods: iface.methods.iter().map(|(n, s)| (n.clone(), self.substitute_sig(s, map))).collect(),
                terms: iface.terms.as_ref().map(|terms| {
                    terms
                        .iter()
                        .map(|t| Term {
                            tilde: t.tilde,
                            ty: self.substitute(&t.ty, map),
                        })
                        .collect()
                }),
                comparable: iface.comparable,
            })),
            Type::Tuple(items) => Type::Tuple(items.iter().map(|t| self.substitute(t, map)).collect()),
            Type::Named(id, args) => Type::Named(*id, args.iter().map(|t| self.substitute(t, map)).collect()),
            other => other.clone(),
        }
    }

    pub fn substitute_sig(&self, sig: &Signature, map: &HashMap<TypeParamId, Type>) -> Signature {
        Signature {
            params: sig.params.iter().map(|t| self.substitute(t, map)).collect(),
            results: sig.results.iter().map(|t| self.substitute(t, map)).collect(),
            variadic: sig.variadic,
        }
    }

    /// Type-argument mapping of an instantiated defined type
    pub fn instance_map(&self, id: NamedId, args: &[Type]) -> HashMap<TypeParamId, Type> {
        self.named(id).type_params.iter().copied().zip(args.iter().cloned()).collect()
    }

    /// Underlying type, expanding generic instantiations
    pub fn underlying(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        for _ in 0..16 {
            match current {
                Type::Named(id, ref args) => {
                    let named = self.named(id);
                    current = if args.is_empty() { named.underlying.clone() } else { self.substitute(&named.underlying, &self.instance_map(id, args)) };
                }
                _ => return current,
            }
        }
        Type::Invalid
    }

    /// Core type: the underlying type, or for a type parameter the single
    /// underlying type shared by all terms of its constraint
    pub fn core_type(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::TypeParam(id) => {
                let constraint = self.underlying(self.constraint(*id));
                let Type::Interface(iface) = constraint else { return None };
                let terms = iface.terms.as_ref()?;
                let mut core: Option<Type> = None;
                for term in terms {
                    let under = self.underlying(&term.ty);
                    match &core {
                        None => core = Some(under),
                        Some(existing) if *existing == under => {}
                        Some(_) => return None,
                    }
                }
                core
            }
            other => Some(self.underlying(other)),
        }
    }

    /// Type-set terms of a type parameter, `None` when unrestricted
    pub fn type_param_terms(&self, id: TypeParamId) -> Option<Vec<Term>> {
        match self.underlying(self.constraint(id)) {
            Type::Interface(iface) => iface.terms.clone(),
            _ => None,
        }
    }

    pub fn is_interface(&self, ty: &Type) -> bool {
        !matches!(ty, Type::TypeParam(_)) && matches!(self.underlying(ty), Type::Interface(_))
    }

    pub fn interface_of(&self, ty: &Type) -> Option<InterfaceType> {
        match ty {
            Type::TypeParam(id) => match self.underlying(self.constraint(*id)) {
                Type::Interface(iface) => Some(*iface),
                _ => None,
            },
            other => match self.underlying(other) {
                Type::Interface(iface) => Some(*iface),
                _ => None,
            },
        }
    }

    /// Check a property on a type, or on every term of a type parameter
    fn all_terms(&self, ty: &Type, pred: &dyn Fn(&Type) -> bool) -> bool {
        match ty {
            Type::TypeParam(id) => match self.type_param_terms(*id) {
                Some(terms) => !terms.is_empty() && terms.iter().all(|t| pred(&self.underlying(&t.ty))),
                None => false,
            },
            other => pred(&self.underlying(other)),
        }
    }

    pub fn is_integer(&self, ty: &Type) -> bool {
        self.all_terms(ty, &|t| matches!(t, Type::Basic(k) if k.is_integer()))
    }

    pub fn is_numeric(&self, ty: &Type) -> bool {
        self.all_terms(ty, &|t| matches!(t, Type::Basic(k) if k.is_numeric()))
    }

    pub fn is_string(&self, ty: &Type) -> bool {
        self.all_terms(ty, &|t| matches!(t, Type::Basic(k) if k.is_string()))
    }

    pub fn is_boolean(&self, ty: &Type) -> bool {
        self.all_terms(ty, &|t| matches!(t, Type::Basic(k) if k.is_boolean()))
    }

    pub fn is_ordered(&self, ty: &Type) -> bool {
        self.all_terms(ty, &|t| matches!(t, Type::Basic(k) if k.is_ordered()))
    }

    pub fn is_addable(&self, ty: &Type) -> bool {
        self.all_terms(ty, &|t| matches!(t, Type::Basic(k) if k.is_numeric() || k.is_string()))
    }

    /// Whether values of the type support `==`
    pub fn is_comparable(&self, ty: &Type) -> bool {
        self.is_comparable_depth(ty, 0)
    }

    fn is_comparable_depth(&self, ty: &Type, depth: usize) -> bool {
        if depth > 8 {
            return true;
        }
        match ty {
            Type::TypeParam(id) => match self.interface_of(ty) {
                Some(iface) if iface.comparable => true,
                Some(iface) => iface.terms.as_ref().is_some_and(|terms| terms.iter().all(|t| self.is_comparable_depth(&t.ty, depth + 1))) || self.constraint_is_comparable(*id),
                None => false,
            },
            _ => match self.underlying(ty) {
                Type::Slice(_) | Type::Map(..) | Type::Func(_) => false,
                Type::Struct(fields) => fields.iter().all(|f| self.is_comparable_depth(&f.ty, depth + 1)),
                Type::Array(_, elem) => self.is_comparable_depth(&elem, depth + 1),
                Type::Invalid | Type::Tuple(_) => false,
                _ => true,
            },
        }
    }

    fn constraint_is_comparable(&self, id: TypeParamId) -> bool {
        matches!(self.constraint(id), Type::Named(nid, _) if self.named(*nid).name == "comparable" && self.named(*nid).pkg.is_empty())
    }

    /// Identity of two types
    pub fn identical(&self, a: &Type, b: &Type) -> bool {
        a == b
    }

    /// Default type of an untyped constant type
    pub fn default_type(&self, ty: &Type) -> Type {
        match ty {
            Type::Basic(BasicKind::UntypedBool) => Type::bool(),
            Type::Basic(BasicKind::UntypedInt) => Type::int(),
            Type::Basic(BasicKind::UntypedRune) => Type::Basic(BasicKind::Int32),
            Type::Basic(BasicKind::UntypedFloat) => Type::Basic(BasicKind::Float64),
            Type::Basic(BasicKind::UntypedString) => Type::string(),
            other => other.clone(),
        }
    }

    /// Assignability of a value of type `from` to a variable of type `to`
    pub fn assignable(&self, from: &Type, to: &Type) -> bool {
        if from.is_opaque() || to.is_opaque() {
            return true;
        }
        if self.identical(from, to) {
            return true;
        }
        if let Type::Basic(kind) = from {
            if kind.is_untyped() {
                return self.untyped_assignable(*kind, to);
            }
        }
        if let Type::TypeParam(_) = to {
            return false;
        }
        let from_under = self.underlying(from);
        let to_under = self.underlying(to);
        if !matches!(from, Type::TypeParam(_)) && self.identical(&from_under, &to_under) && (!from.is_named() || !to.is_named()) {
            return true;
        }
        if let (Type::Chan(ChanDir::Both, from_elem), Type::Chan(_, to_elem)) = (&from_under, &to_under) {
            if self.identical(from_elem, to_elem) && (!from.is_named() || !to.is_named()) {
                return true;
            }
        }
        if let Type::Interface(iface) = &to_under {
            return self.implements(from, iface).is_ok();
        }
        false
    }

    fn untyped_assignable(&self, kind: BasicKind, to: &Type) -> bool {
        if let Type::TypeParam(id) = to {
            return match self.type_param_terms(*id) {
                Some(terms) => !terms.is_empty() && terms.iter().all(|t| self.untyped_assignable(kind, &t.ty)),
                None => false,
            };
        }
        let under = self.underlying(to);
        match under {
            Type::Interface(ref iface) => kind != BasicKind::UntypedNil || iface.terms.is_none(),
            Type::Basic(target) => match kind {
                BasicKind::UntypedBool => target.is_boolean(),
                BasicKind::UntypedInt | BasicKind::UntypedRune => target.is_numeric(),
                BasicKind::UntypedFloat => target.is_float() || target.is_complex(),
                BasicKind::UntypedString => target.is_string(),
                BasicKind::UntypedNil => target == BasicKind::UnsafePointer,
                _ => false,
            },
            Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) | Type::Func(_) => kind == BasicKind::UntypedNil,
            _ => false,
        }
    }

    /// Whether a constant value fits the target type
    pub fn representable(&self, value: &ConstValue, to: &Type) -> Result<(), String> {
        let Type::Basic(kind) = self.underlying(to) else { return Ok(()) };
        match value {
            ConstValue::Int(v) => {
                if let Some((lo, hi)) = kind.int_range(self.pointer_width) {
                    if *v < BigInt::from(lo) || *v > BigInt::from(hi) {
                        return Err(format!("constant {} overflows {}", v, kind.name()));
                    }
                } else if kind.is_float() {
                    let limit = if kind == BasicKind::Float32 { f64::from(f32::MAX) } else { f64::MAX };
                    if v.to_f64().is_none_or(|f| !f.is_finite() || f.abs() > limit) {
                        return Err(format!("constant {} overflows {}", v, kind.name()));
                    }
                }
                Ok(())
            }
            ConstValue::Float(f) => {
                if let Some((lo, hi)) = kind.int_range(self.pointer_width) {
                    if f.fract() != 0.0 {
                        return Err(format!("constant {} truncated to integer", f));
                    }
                    if *f < lo as f64 || *f > hi as f64 {
                        return Err(format!("constant {} overflows {}", f, kind.name()));
                    }
                } else if kind == BasicKind::Float32 && f.abs() > f32::MAX as f64 {
                    return Err(format!("constant {} overflows float32", f));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Look up a struct field, following embedded fields and pointers
    pub fn lookup_field(&self, ty: &Type, name: &str) -> Option<Type> {
        self.lookup_field_depth(ty, name, 0)
    }

    fn lookup_field_depth(&self, ty: &Type, name: &str, depth: usize) -> Option<Type> {
        if depth > MAX_EMBED_DEPTH {
            return None;
        }
        let base = match self.underlying(ty) {
            Type::Pointer(inner) => self.underlying(&inner),
            other => other,
        };
        let Type::Struct(fields) = base else { return None };
        if let Some(field) = fields.iter().find(|f| f.name == name) {
            return Some(field.ty.clone());
        }
        fields.iter().filter(|f| f.embedded).find_map(|f| self.lookup_field_depth(&f.ty, name, depth + 1))
    }

    /// Look up a method, following embedded fields
    pub fn lookup_method(&self, ty: &Type, name: &str) -> Option<MethodLookup> {
        self.lookup_method_depth(ty, name, 0)
    }

    fn lookup_method_depth(&self, ty: &Type, name: &str, depth: usize) -> Option<MethodLookup> {
        if depth > MAX_EMBED_DEPTH {
            return None;
        }
        if let Some(iface) = self.interface_of(ty) {
            return iface.method(name).map(|sig| MethodLookup {
                sig: sig.clone(),
                pointer_recv: false,
                func: None,
                named: None,
                from_interface: true,
            });
        }
        let target = match ty {
            Type::Pointer(inner) => inner.as_ref(),
            other => other,
        };
        if let Type::Named(id, args) = target {
            if let Some(method) = self.named(*id).methods.iter().find(|m| m.name == name) {
                let sig = if args.is_empty() { method.sig.clone() } else { self.substitute_sig(&method.sig, &self.instance_map(*id, args)) };
                return Some(MethodLookup {
                    sig,
                    pointer_recv: method.pointer_recv,
                    func: method.func,
                    named: Some(*id),
                    from_interface: false,
                });
            }
        }
        let Type::Struct(fields) = self.underlying(target) else { return None };
        fields.iter().filter(|f| f.embedded).find_map(|f| self.lookup_method_depth(&f.ty, name, depth + 1))
    }

    /// Method-set membership: value receivers see only value methods
    pub fn has_method(&self, ty: &Type, name: &str, sig: &Signature) -> Result<(), String> {
        match self.lookup_method(ty, name) {
            Some(found) => {
                if found.pointer_recv && !matches!(ty, Type::Pointer(_)) {
                    return Err(format!("method {} has pointer receiver", name));
                }
                if found.sig != *sig {
                    return Err(format!("method {} has wrong signature", name));
                }
                Ok(())
            }
            None => Err(format!("missing method {}", name)),
        }
    }

    /// Interface satisfaction, including the type set of constraints
    pub fn implements(&self, ty: &Type, iface: &InterfaceType) -> Result<(), String> {
        if ty.is_opaque() {
            return Ok(());
        }
        if let Some(terms) = &iface.terms {
            let in_set = terms.iter().any(|term| {
                if term.tilde {
                    self.identical(&self.underlying(ty), &self.underlying(&term.ty))
                } else {
                    self.identical(ty, &term.ty)
                }
            });
            if !in_set {
                return Err(format!("{} is not in the type set", self.type_string(ty)));
            }
        }
        if iface.comparable && !self.is_comparable(ty) {
            return Err(format!("{} is not comparable", self.type_string(ty)));
        }
        for (name, sig) in &iface.methods {
            self.has_method(ty, name, sig).map_err(|reason| format!("{} does not implement interface ({})", self.type_string(ty), reason))?;
        }
        Ok(())
    }

    /// Constraint satisfaction for a type argument
    pub fn satisfies(&self, ty: &Type, constraint: &Type) -> Result<(), String> {
        if let Type::Named(id, _) = constraint {
            let named = self.named(*id);
            if named.pkg.is_empty() && named.name == "comparable" && named.underlying == Type::Invalid {
                return if self.is_comparable(ty) { Ok(()) } else { Err(format!("{} is not comparable", self.type_string(ty))) };
            }
        }
        match self.underlying(constraint) {
            Type::Interface(iface) => self.implements(ty, &iface),
            Type::Invalid | Type::Unknown => Ok(()),
            other => {
                if self.identical(ty, &other) || self.identical(&self.underlying(ty), &other) {
                    Ok(())
                } else {
                    Err(format!("{} does not satisfy {}", self.type_string(ty), self.type_string(constraint)))
                }
            }
        }
    }

    /// Element type of a channel, with its direction
    pub fn chan_of(&self, ty: &Type) -> Option<(ChanDir, Type)> {
        match self.core_type(ty)? {
            Type::Chan(dir, elem) => Some((dir, *elem)),
            _ => None,
        }
    }

    /// Signature of a callable value
    pub fn signature_of(&self, ty: &Type) -> Option<Signature> {
        match self.core_type(ty)? {
            Type::Func(sig) => Some(*sig),
            _ => None,
        }
    }

    /// Size in bytes, when statically known
    pub fn size_of(&self, ty: &Type) -> Option<u64> {
        self.size_of_depth(ty, 0)
    }

    fn size_of_depth(&self, ty: &Type, depth: usize) -> Option<u64> {
        if depth > 16 {
            return None;
        }
        let word = u64::from(self.pointer_width / 8);
        match self.underlying(ty) {
            Type::Basic(kind) => kind.size(self.pointer_width),
            Type::Pointer(_) | Type::Map(..) | Type::Chan(..) | Type::Func(_) => Some(word),
            Type::Slice(_) => Some(3 * word),
            Type::Interface(_) => Some(2 * word),
            Type::Array(len, elem) => self.size_of_depth(&elem, depth + 1)?.checked_mul(len),
            Type::Struct(fields) => fields.iter().try_fold(0u64, |acc, f| Some(acc + self.size_of_depth(&f.ty, depth + 1)?)),
            _ => None,
        }
    }

    /// Result type of a binary operation
    pub fn binary_result(&self, op: BinaryOp, lhs: &Type, rhs: &Type) -> Result<Type, String> {
        if lhs.is_opaque() || rhs.is_opaque() {
            return Ok(Type::Unknown);
        }
        if op.is_shift() {
            if !self.is_integer(rhs) && !matches!(rhs, Type::Basic(BasicKind::UntypedFloat)) {
                return Err(format!("shift count type {} must be integer", self.type_string(rhs)));
            }
            if !self.is_integer(lhs) {
                return Err(format!("operator {} not defined on {}", op.as_str(), self.type_string(lhs)));
            }
            return Ok(lhs.clone());
        }

        let operand = self.unify_operands(lhs, rhs).ok_or_else(|| format!("mismatched types {} and {}", self.type_string(lhs), self.type_string(rhs)))?;

        if op.is_comparison() {
            let ok = match op {
                BinaryOp::Eq | BinaryOp::Ne => {
                    lhs.is_nil() && self.nil_comparable(rhs) || rhs.is_nil() && self.nil_comparable(lhs) || self.is_comparable(&operand) || self.is_interface(&operand)
                }
                _ => self.is_ordered(&operand),
            };
            if !ok {
                return Err(format!("operator {} not defined on {}", op.as_str(), self.type_string(&operand)));
            }
            return Ok(Type::Basic(BasicKind::UntypedBool));
        }

        let ok = match op {
            BinaryOp::Add => self.is_addable(&operand),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => self.is_numeric(&operand),
            BinaryOp::Rem | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::AndNot => self.is_integer(&operand),
            BinaryOp::LogAnd | BinaryOp::LogOr => self.is_boolean(&operand),
            _ => false,
        };
        if !ok {
            return Err(format!("operator {} not defined on {}", op.as_str(), self.type_string(&operand)));
        }
        Ok(operand)
    }

    fn nil_comparable(&self, ty: &Type) -> bool {
        matches!(self.underlying(ty), Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) | Type::Func(_) | Type::Interface(_))
            || matches!(ty, Type::Basic(BasicKind::UntypedNil))
    }

    /// Common operand type after converting untyped operands
    fn unify_operands(&self, lhs: &Type, rhs: &Type) -> Option<Type> {
        match (lhs, rhs) {
            (Type::Basic(a), Type::Basic(b)) if a.is_untyped() && b.is_untyped() => {
                if *a == BasicKind::UntypedNil || *b == BasicKind::UntypedNil {
                    return if a == b { Some(lhs.clone()) } else { None };
                }
                let rank = |k: &BasicKind| match k {
                    BasicKind::UntypedInt => 1,
                    BasicKind::UntypedRune => 2,
                    BasicKind::UntypedFloat => 3,
                    _ => 0,
                };
                if a.is_numeric() && b.is_numeric() {
                    Some(if rank(a) >= rank(b) { lhs.clone() } else { rhs.clone() })
                } else if a == b {
                    Some(lhs.clone())
                } else {
                    None
                }
            }
            (Type::Basic(a), _) if a.is_untyped() => {
                if self.assignable(lhs, rhs) || (*a == BasicKind::UntypedNil && self.nil_comparable(rhs)) {
                    Some(rhs.clone())
                } else {
                    None
                }
            }
            (_, Type::Basic(b)) if b.is_untyped() => {
                if self.assignable(rhs, lhs) || (*b == BasicKind::UntypedNil && self.nil_comparable(lhs)) {
                    Some(lhs.clone())
                } else {
                    None
                }
            }
            _ => {
                if self.identical(lhs, rhs) {
                    Some(lhs.clone())
                } else if self.is_interface(lhs) && self.assignable(rhs, lhs) {
                    Some(lhs.clone())
                } else if self.is_interface(rhs) && self.assignable(lhs, rhs) {
                    Some(rhs.clone())
                } else {
                    None
                }
            }
        }
    }

    /// Result type of a unary operation
    pub fn unary_result(&self, op: UnaryOp, operand: &Type) -> Result<Type, String> {
        if operand.is_opaque() {
            return Ok(Type::Unknown);
        }
        let fail = || Err(format!("operator {} not defined on {}", op.as_str(), self.type_string(operand)));
        match op {
            UnaryOp::Neg | UnaryOp::Plus => {
                if self.is_numeric(operand) {
                    Ok(operand.clone())
                } else {
                    fail()
                }
            }
            UnaryOp::Not => {
                if self.is_boolean(operand) {
                    Ok(operand.clone())
                } else {
                    fail()
                }
            }
            UnaryOp::BitNot => {
                if self.is_integer(operand) {
                    Ok(operand.clone())
                } else {
                    fail()
                }
            }
            UnaryOp::Deref => match self.core_type(operand) {
                Some(Type::Pointer(inner)) => Ok(*inner),
                _ => Err(format!("invalid indirect of {}", self.type_string(operand))),
            },
            UnaryOp::AddrOf => Ok(Type::pointer(operand.clone())),
            UnaryOp::Recv => match self.chan_of(operand) {
                Some((ChanDir::Send, _)) => Err(format!("receive from send-only channel {}", self.type_string(operand))),
                Some((_, elem)) => Ok(elem),
                None => Err(format!("receive from non-channel {}", self.type_string(operand))),
            },
        }
    }

    /// Human-readable type
    pub fn type_string(&self, ty: &Type) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty, 0);
        out
    }

    fn write_type(&self, out: &mut String, ty: &Type, depth: usize) {
        if depth > 12 {
            out.push_str("...");
            return;
        }
        match ty {
            Type::Invalid => out.push_str("invalid type"),
            Type::Unknown => out.push_str("unknown"),
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Pointer(inner) => {
                out.push('*');
                self.write_type(out, inner, depth + 1);
            }
            Type::Slice(inner) => {
                out.push_str("[]");
                self.write_type(out, inner, depth + 1);
            }
            Type::Array(len, inner) => {
                let _ = write!(out, "[{}]", len);
                self.write_type(out, inner, depth + 1);
            }
            Type::Map(k, v) => {
                out.push_str("map[");
                self.write_type(out, k, depth + 1);
                out.push(']');
                self.write_type(out, v, depth + 1);
            }
            Type::Chan(dir, inner) => {
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.write_type(out, inner, depth + 1);
            }
            Type::Func(sig) => {
                out.push_str("func");
                self.write_signature(out, sig, depth);
            }
            Type::Struct(fields) => {
                out.push_str("struct{");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    self.write_type(out, &field.ty, depth + 1);
                }
                out.push('}');
            }
            Type::Interface(iface) => {
                if iface.is_empty() {
                    out.push_str("any");
                    return;
                }
                out.push_str("interface{");
                let mut first = true;
                for (name, sig) in &iface.methods {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    out.push_str(name);
                    self.write_signature(out, sig, depth);
                }
                if let Some(terms) = &iface.terms {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    for (i, term) in terms.iter().enumerate() {
                        if i > 0 {
                            out.push_str(" | ");
                        }
                        if term.tilde {
                            out.push('~');
                        }
                        self.write_type(out, &term.ty, depth + 1);
                    }
                }
                if iface.comparable {
                    if !first {
                        out.push_str("; ");
                    }
                    out.push_str("comparable");
                }
                out.push('}');
            }
            Type::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, item, depth + 1);
                }
                out.push(')');
            }
            Type::Named(id, args) => {
                out.push_str(&self.qualified_name(*id));
                if !args.is_empty() {
                    out.push('[');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_type(out, arg, depth + 1);
                    }
                    out.push(']');
                }
            }
            Type::TypeParam(id) => out.push_str(&self.params[*id as usize].name),
        }
    }

    fn write_signature(&self, out: &mut String, sig: &Signature, depth: usize) {
        out.push('(');
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if sig.variadic && i + 1 == sig.params.len() {
                out.push_str("...");
                if let Type::Slice(elem) = param {
                    self.write_type(out, elem, depth + 1);
                    continue;
                }
            }
            self.write_type(out, param, depth + 1);
        }
        out.push(')');
        match sig.results.len() {
            0 => {}
            1 => {
                out.push(' ');
                self.write_type(out, &sig.results[0], depth + 1);
            }
            _ => {
                out.push_str(" (");
                for (i, result) in sig.results.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, result, depth + 1);
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_stringer() -> (TypeTable, NamedId, Type) {
        let mut table = TypeTable::new(64);
        let id = table.add_named("Celsius", "");
        table.named_mut(id).underlying = Type::Basic(BasicKind::Float64);
        table.named_mut(id).methods.push(MethodInfo {
            name: "String".to_string(),
            sig: Signature::new(vec![], vec![Type::string()]),
            pointer_recv: false,
            func: None,
        });
        let stringer = Type::Interface(Box::new(InterfaceType {
            methods: vec![("String".to_string(), Signature::new(vec![], vec![Type::string()]))],
            terms: None,
            comparable: false,
        }));
        (table, id, stringer)
    }

    #[test]
    fn test_untyped_constant_assignability() {
        let table = TypeTable::new(64);
        assert!(table.assignable(&Type::Basic(BasicKind::UntypedInt), &Type::Basic(BasicKind::Float64)));
        assert!(!table.assignable(&Type::Basic(BasicKind::UntypedString), &Type::int()));
        assert!(table.assignable(&Type::Basic(BasicKind::UntypedNil), &Type::slice(Type::int())));
        assert!(!table.assignable(&Type::Basic(BasicKind::UntypedNil), &Type::int()));
    }

    #[test]
    fn test_named_type_assignability() {
        let (table, id, stringer) = table_with_stringer();
        let celsius = Type::Named(id, vec![]);
        assert!(!table.assignable(&Type::Basic(BasicKind::Float64), &celsius));
        assert!(table.assignable(&Type::Basic(BasicKind::UntypedFloat), &celsius));
        assert!(table.assignable(&celsius, &stringer));
        assert!(!table.assignable(&Type::int(), &stringer));
        assert!(table.assignable(&Type::Unknown, &Type::int()));
    }

    #[test]
    fn test_pointer_receiver_method_sets() {
        let mut table = TypeTable::new(64);
        let id = table.add_named("Buffer", "");
        table.named_mut(id).underlying = Type::empty_struct();
        table.named_mut(id).methods.push(MethodInfo {
            name: "Reset".to_string(),
            sig: Signature::new(vec![], vec![]),
            pointer_recv: true,
            func: None,
        });
        let resetter = InterfaceType {
            methods: vec![("Reset".to_string(), Signature::new(vec![], vec![]))],
            terms: None,
            comparable: false,
        };
        let value = Type::Named(id, vec![]);
        assert!(table.implements(&value, &resetter).is_err());
        assert!(table.implements(&Type::pointer(value), &resetter).is_ok());
    }

    #[test]
    fn test_binary_operators() {
        let table = TypeTable::new(64);
        let int = Type::int();
        assert_eq!(table.binary_result(BinaryOp::Add, &int, &Type::Basic(BasicKind::UntypedInt)).unwrap(), int);
        assert!(table.binary_result(BinaryOp::Add, &int, &Type::string()).is_err());
        assert!(table.binary_result(BinaryOp::Rem, &Type::Basic(BasicKind::Float64), &Type::Basic(BasicKind::Float64)).is_err());
        assert_eq!(table.binary_result(BinaryOp::Lt, &int, &int).unwrap(), Type::Basic(BasicKind::UntypedBool));
        assert!(table.binary_result(BinaryOp::Eq, &Type::slice(int.clone()), &Type::slice(int.clone())).is_err());
        assert!(table.binary_result(BinaryOp::Eq, &Type::slice(int.clone()), &Type::Basic(BasicKind::UntypedNil)).is_ok());
        assert!(table.binary_result(BinaryOp::LogAnd, &int, &int).is_err());
    }

    #[test]
    fn test_generic_constraints() {
        let mut table = TypeTable::new(64);
        let number = Type::Interface(Box::new(InterfaceType {
            methods: vec![],
            terms: Some(vec![Term { tilde: true, ty: Type::int() }, Term { tilde: true, ty: Type::Basic(BasicKind::Float64) }]),
            comparable: false,
        }));
        let t = table.add_type_param("T", number.clone());
        let param = Type::TypeParam(t);

        assert!(table.binary_result(BinaryOp::Add, &param, &param).is_ok());
        assert!(table.binary_result(BinaryOp::Lt, &param, &param).is_ok());
        assert!(table.binary_result(BinaryOp::Rem, &param, &param).is_err());

        let id = table.add_named("MyInt", "");
        table.named_mut(id).underlying = Type::int();
        assert!(table.satisfies(&Type::Named(id, vec![]), &number).is_ok());
        assert!(table.satisfies(&Type::string(), &number).is_err());
    }

    #[test]
    fn test_generic_instantiation_is_lazy() {
        let mut table = TypeTable::new(64);
        let t = table.add_type_param("T", Type::empty_interface());
        let list = table.add_named("List", "");
        table.named_mut(list).type_params = vec![t];
        table.named_mut(list).underlying = Type::Struct(vec![StructField {
            name: "items".to_string(),
            ty: Type::slice(Type::TypeParam(t)),
            embedded: false,
        }]);

        let instance = Type::Named(list, vec![Type::string()]);
        assert_eq!(table.lookup_field(&instance, "items"), Some(Type::slice(Type::string())));
        assert_eq!(table.type_string(&instance), "List[string]");
    }

    #[test]
    fn test_constant_folding_and_overflow() {
        let table = TypeTable::new(32);
        let sum = const_binary(BinaryOp::Add, &ConstValue::int(1 << 30), &ConstValue::int(1 << 30)).unwrap();
        assert!(table.representable(&sum, &Type::int()).is_err());
        assert!(table.representable(&ConstValue::int(255), &Type::Basic(BasicKind::Uint8)).is_ok());
        assert!(table.representable(&ConstValue::int(-1), &Type::Basic(BasicKind::Uint)).is_err());
        assert!(table.representable(&ConstValue::Float(1.5), &Type::int()).is_err());
        assert_eq!(const_unary(UnaryOp::Neg, &ConstValue::int(3)), Some(ConstValue::int(-3)));
        assert_eq!(const_binary(BinaryOp::Div, &ConstValue::int(1), &ConstValue::int(0)), None);
    }

    #[test]
    fn test_untyped_constants_exceed_machine_words() {
        let table = TypeTable::new(64);
        let big = const_binary(BinaryOp::Shl, &ConstValue::int(1), &ConstValue::int(200)).unwrap();
        assert_eq!(big.as_int(), None);
        assert!(table.representable(&big, &Type::int()).is_err());
        assert!(table.representable(&big, &Type::Basic(BasicKind::Float64)).is_ok());
        let back = const_binary(BinaryOp::Shr, &big, &ConstValue::int(198)).unwrap();
        assert_eq!(back, ConstValue::int(4));
        assert_eq!(const_binary(BinaryOp::Shl, &ConstValue::int(1), &ConstValue::int(1i64 << 40)), None);
        assert_eq!(const_unary(UnaryOp::BitNot, &ConstValue::int(5)), Some(ConstValue::int(-6)));
        assert_eq!(const_binary(BinaryOp::Div, &ConstValue::int(-7), &ConstValue::int(2)), Some(ConstValue::int(-3)));
    }

    #[test]
    fn test_sizes() {
        let table = TypeTable::new(64);
        assert_eq!(table.size_of(&Type::Array(10, Box::new(Type::Basic(BasicKind::Int64)))), Some(80));
        assert_eq!(table.size_of(&Type::slice(Type::int())), Some(24));
        assert_eq!(TypeTable::new(32).size_of(&Type::int()), Some(4));
    }
}
