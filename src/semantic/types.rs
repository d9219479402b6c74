//! The semantic type model
//!
//! Types live in a [`TypeArena`] and are addressed by [`TypeId`]. Struct and
//! impl types hold method tables that reference function types, which in
//! turn reference other types; the arena breaks those cycles by storing
//! plain indices instead of ownership pointers. Each entry carries its
//! structural kind plus the extension tables the type binder fills in:
//! methods, associated functions, associated constants, evaluated constant
//! values and the name set guarding one impl against duplicate members.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Handle to a type in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// A value known at analysis time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstValue {
    Integer(i64),
    Text(String),
}

impl ConstValue {
    /// The integer payload, if this is an integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConstValue::Integer(v) => Some(*v),
            ConstValue::Text(_) => None,
        }
    }
}

/// A named struct member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeId,
}

/// Signature of a function type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSig {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    /// Whether the function takes a shorthand self parameter
    pub has_receiver: bool,
    pub receiver_is_ref: bool,
    pub receiver_is_mut: bool,
}

impl FunctionSig {
    /// A receiver-less signature
    pub fn free(params: Vec<TypeId>, ret: TypeId) -> Self {
        Self {
            params,
            ret,
            has_receiver: false,
            receiver_is_ref: false,
            receiver_is_mut: false,
        }
    }
}

/// Structural kind of a type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeKind {
    /// Builtin scalar type, identified by name
    Primitive(String),
    Function(FunctionSig),
    Struct {
        name: String,
        members: Vec<StructMember>,
    },
    Enumeration {
        name: String,
        variants: Vec<String>,
    },
    Tuple(Vec<TypeId>),
    Slice(TypeId),
    Array {
        elem: TypeId,
        len: u32,
    },
    /// The unit type, spelled `()` or `void`
    Unit,
    Reference {
        inner: TypeId,
        is_mut: bool,
    },
}

/// A type together with its extension tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeData {
    pub kind: TypeKind,
    /// Receiver-taking functions, reachable through member access
    pub methods: Vec<(String, TypeId)>,
    /// Receiver-less functions, reachable as `Type::f`
    pub associated_functions: Vec<(String, TypeId)>,
    /// Associated constants, reachable as `Type::C`
    pub associated_constants: Vec<(String, TypeId)>,
    /// Evaluated constant values, keyed by associated-constant or variant name
    pub value_map: HashMap<String, ConstValue>,
    /// All member names seen so far within one impl, for duplicate detection
    pub name_set: HashSet<String>,
}

impl TypeData {
    fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            methods: Vec::new(),
            associated_functions: Vec::new(),
            associated_constants: Vec::new(),
            value_map: HashMap::new(),
            name_set: HashSet::new(),
        }
    }
}

/// Arena of all types created during analysis
#[derive(Debug, Default, Clone)]
pub struct TypeArena {
    types: Vec<TypeData>,
    interned: HashMap<String, TypeId>,
}

/// The names of the four integer primitives
pub const INTEGER_PRIMITIVES: [&str; 4] = ["i32", "u32", "isize", "usize"];

impl TypeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new type
    pub fn alloc(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeData::new(kind));
        id
    }

    /// Intern a builtin type by name; `void` maps to the unit type
    pub fn primitive(&mut self, name: &str) -> TypeId {
        if let Some(id) = self.interned.get(name) {
            return *id;
        }
        let kind = if name == "void" {
            TypeKind::Unit
        } else {
            TypeKind::Primitive(name.to_string())
        };
        let id = self.alloc(kind);
        self.interned.insert(name.to_string(), id);
        id
    }

    /// Shared access to a type entry
    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    /// Mutable access to a type entry
    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.0 as usize]
    }

    /// The structural kind of a type
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.get(id).kind
    }

    /// Replace the structural kind in place, refining a skeleton type
    pub fn refine(&mut self, id: TypeId, kind: TypeKind) {
        self.get_mut(id).kind = kind;
    }

    /// Whether the type is the primitive with the given name
    pub fn is_primitive_named(&self, id: TypeId, name: &str) -> bool {
        matches!(self.kind(id), TypeKind::Primitive(n) if n == name)
    }

    /// Whether the type is one of the four integer primitives
    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Primitive(n) if INTEGER_PRIMITIVES.contains(&n.as_str())
        )
    }

    /// Whether the type is a signed integer primitive
    pub fn is_signed_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Primitive(n) if n == "i32" || n == "isize"
        )
    }

    /// Look up a method by name
    pub fn method(&self, id: TypeId, name: &str) -> Option<TypeId> {
        self.get(id)
            .methods
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Look up an associated function by name
    pub fn associated_function(&self, id: TypeId, name: &str) -> Option<TypeId> {
        self.get(id)
            .associated_functions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Look up an associated constant by name
    pub fn associated_constant(&self, id: TypeId, name: &str) -> Option<TypeId> {
        self.get(id)
            .associated_constants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Register a builtin method on a type
    pub fn add_method(&mut self, id: TypeId, name: &str, fn_ty: TypeId) {
        self.get_mut(id).methods.push((name.to_string(), fn_ty));
    }

    /// Structural equality
    ///
    /// `Primitive`, `Struct` and `Enumeration` compare by name; `Function`,
    /// `Tuple`, `Slice` and `Array` compare recursively. For references the
    /// left side's mutability must satisfy the right side's: a `&mut T`
    /// candidate matches a `&T` expectation but not the other way around.
    pub fn equal(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Primitive(x), TypeKind::Primitive(y)) => x == y,
            (TypeKind::Unit, TypeKind::Unit) => true,
            (TypeKind::Struct { name: x, .. }, TypeKind::Struct { name: y, .. }) => x == y,
            (TypeKind::Enumeration { name: x, .. }, TypeKind::Enumeration { name: y, .. }) => {
                x == y
            }
            (TypeKind::Function(x), TypeKind::Function(y)) => {
                x.params.len() == y.params.len()
                    && self.equal(x.ret, y.ret)
                    && x.params
                        .iter()
                        .zip(y.params.iter())
                        .all(|(p, q)| self.equal(*p, *q))
            }
            (TypeKind::Tuple(x), TypeKind::Tuple(y)) => {
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| self.equal(*p, *q))
            }
            (TypeKind::Slice(x), TypeKind::Slice(y)) => self.equal(*x, *y),
            (
                TypeKind::Array { elem: x, len: n },
                TypeKind::Array { elem: y, len: m },
            ) => n == m && self.equal(*x, *y),
            (
                TypeKind::Reference {
                    inner: x,
                    is_mut: xm,
                },
                TypeKind::Reference {
                    inner: y,
                    is_mut: ym,
                },
            ) => self.equal(*x, *y) && (*xm || !*ym),
            _ => false,
        }
    }

    /// Render the type for diagnostics
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Primitive(name) => name.clone(),
            TypeKind::Unit => "()".to_string(),
            TypeKind::Struct { name, .. } => name.clone(),
            TypeKind::Enumeration { name, .. } => name.clone(),
            TypeKind::Function(sig) => {
                let params: Vec<String> = sig.params.iter().map(|p| self.display(*p)).collect();
                format!("fn({}) -> {}", params.join(", "), self.display(sig.ret))
            }
            TypeKind::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|e| self.display(*e)).collect();
                format!("({})", elems.join(", "))
            }
            TypeKind::Slice(elem) => format!("[{}]", self.display(*elem)),
            TypeKind::Array { elem, len } => format!("[{}; {}]", self.display(*elem), len),
            TypeKind::Reference { inner, is_mut } => {
                if *is_mut {
                    format!("&mut {}", self.display(*inner))
                } else {
                    format!("&{}", self.display(*inner))
                }
            }
        }
    }
}
